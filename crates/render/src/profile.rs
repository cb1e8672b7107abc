use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use voxelcore_persist::{SettingsStore, StoreError};

use crate::culling::{CullingConfig, CullingEngine};

/// Settings key holding the persisted tier name.
pub const PROFILE_KEY: &str = "render.profile";

/// Named render quality tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderTier {
    Minimal,
    #[default]
    Balanced,
    Quality,
    /// Culling off; every stored block is rendered.
    Disabled,
}

impl RenderTier {
    pub const ALL: [RenderTier; 4] = [
        RenderTier::Minimal,
        RenderTier::Balanced,
        RenderTier::Quality,
        RenderTier::Disabled,
    ];

    pub fn name(self) -> &'static str {
        match self {
            RenderTier::Minimal => "minimal",
            RenderTier::Balanced => "balanced",
            RenderTier::Quality => "quality",
            RenderTier::Disabled => "disabled",
        }
    }
}

impl fmt::Display for RenderTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown render profile {0:?} (expected minimal, balanced, quality or disabled)")]
pub struct ParseTierError(pub String);

impl FromStr for RenderTier {
    type Err = ParseTierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseTierError(s.to_string()))
    }
}

/// Culling parameters bundled under a tier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderProfile {
    pub tier: RenderTier,
    pub underground_depth: i32,
    pub aboveground_height: Option<i32>,
    pub ray_count: u32,
    pub scan_hz: f32,
    pub surface_buffer: i32,
}

impl RenderProfile {
    pub fn for_tier(tier: RenderTier) -> Self {
        let (underground_depth, aboveground_height, ray_count, scan_hz, surface_buffer) =
            match tier {
                RenderTier::Minimal => (8, Some(32), 8, 1.0, 2),
                RenderTier::Balanced => (16, Some(64), 16, 2.0, 3),
                RenderTier::Quality => (32, None, 32, 4.0, 4),
                RenderTier::Disabled => (16, Some(64), 0, 0.0, 0),
            };
        Self {
            tier,
            underground_depth,
            aboveground_height,
            ray_count,
            scan_hz,
            surface_buffer,
        }
    }

    /// Write this profile's tunables and enable flags into `config`, keeping
    /// settings the profile does not own.
    pub fn apply_to(&self, config: &mut CullingConfig) {
        let enabled = self.tier != RenderTier::Disabled;
        config.vertical_enabled = enabled;
        config.adaptive_enabled = enabled;
        if !enabled {
            return;
        }
        config.underground_depth = self.underground_depth;
        config.aboveground_height = self.aboveground_height;
        config.ray_count = self.ray_count;
        config.scan_hz = self.scan_hz;
        config.surface_buffer = self.surface_buffer;
    }
}

/// Owns the active tier and its persistence.
pub struct ProfileManager<S> {
    settings: S,
    active: RenderTier,
}

impl<S: SettingsStore> ProfileManager<S> {
    pub fn new(settings: S) -> Self {
        Self {
            settings,
            active: RenderTier::default(),
        }
    }

    pub fn active(&self) -> RenderTier {
        self.active
    }

    pub fn profile(&self) -> RenderProfile {
        RenderProfile::for_tier(self.active)
    }

    pub fn settings(&self) -> &S {
        &self.settings
    }

    /// The persisted tier, if one is stored and readable.
    pub fn persisted(&self) -> Option<RenderTier> {
        match self.settings.get(PROFILE_KEY) {
            Ok(Some(raw)) => match raw.parse() {
                Ok(tier) => Some(tier),
                Err(err) => {
                    warn!(%err, "ignoring persisted render profile");
                    None
                }
            },
            Ok(None) => None,
            Err(err) => {
                warn!(%err, "could not read persisted render profile");
                None
            }
        }
    }

    /// Load the persisted tier, falling back to `balanced`, and push it into
    /// the culling engine. Both modes end up enabled unless the tier is
    /// `disabled`.
    pub fn initialize(&mut self, culling: &mut CullingEngine) -> RenderTier {
        let tier = self.persisted().unwrap_or_default();
        self.activate(tier, culling);
        info!(%tier, "render profile initialized");
        tier
    }

    /// Switch tiers live and persist the choice. The engine is updated even
    /// if persisting fails.
    pub fn apply_profile(
        &mut self,
        tier: RenderTier,
        culling: &mut CullingEngine,
    ) -> Result<(), StoreError> {
        self.activate(tier, culling);
        info!(%tier, "render profile applied");
        self.settings.set(PROFILE_KEY, tier.name())
    }

    fn activate(&mut self, tier: RenderTier, culling: &mut CullingEngine) {
        let mut config = culling.config().clone();
        RenderProfile::for_tier(tier).apply_to(&mut config);
        culling.set_config(config);
        self.active = tier;
    }
}

use std::time::Duration;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};
use voxelcore_common::{BlockCoord, WORLD_HEIGHT};
use voxelcore_kernel::BlockStore;

use crate::camera::direction;
use crate::raycast::{cast, Ray};

/// Elevation bands (degrees) the adaptive scan cycles through.
const SCAN_ELEVATIONS_DEG: [f32; 4] = [-35.0, -15.0, 0.0, 20.0];

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CullingConfigError {
    #[error("ray_range must be finite and positive (got {0})")]
    InvalidRayRange(f32),
    #[error("recompute_threshold must be finite and non-negative (got {0})")]
    InvalidThreshold(f32),
    #[error("{field} must not be negative (got {value})")]
    Negative { field: &'static str, value: i32 },
    #[error("scan_hz must be finite and non-negative (got {0})")]
    InvalidScanRate(f32),
}

/// Culling parameters.
///
/// The enable flags, depth, height cap, ray count, scan rate and surface
/// buffer belong to the active render profile and are not read from config
/// files; a file that names them is rejected. The flags are also toggled from
/// the debug console.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CullingConfig {
    #[serde(skip)]
    pub vertical_enabled: bool,
    #[serde(skip)]
    pub adaptive_enabled: bool,
    /// Blocks rendered below the player's feet.
    #[serde(skip)]
    pub underground_depth: i32,
    /// Blocks rendered above the player; `None` renders up to the world top.
    #[serde(skip)]
    pub aboveground_height: Option<i32>,
    #[serde(skip)]
    pub ray_count: u32,
    /// Adaptive scans per second.
    #[serde(skip)]
    pub scan_hz: f32,
    /// Blocks of slack around detected surfaces.
    #[serde(skip)]
    pub surface_buffer: i32,
    /// Maximum ray length in blocks.
    pub ray_range: f32,
    /// Vertical player movement that triggers a recompute.
    pub recompute_threshold: f32,
}

impl Default for CullingConfig {
    fn default() -> Self {
        Self {
            vertical_enabled: true,
            adaptive_enabled: true,
            underground_depth: 16,
            aboveground_height: Some(64),
            ray_count: 16,
            scan_hz: 2.0,
            surface_buffer: 3,
            ray_range: 96.0,
            recompute_threshold: 0.5,
        }
    }
}

impl CullingConfig {
    pub fn validate(&self) -> Result<(), CullingConfigError> {
        if !(self.ray_range.is_finite() && self.ray_range > 0.0) {
            return Err(CullingConfigError::InvalidRayRange(self.ray_range));
        }
        if !(self.recompute_threshold.is_finite() && self.recompute_threshold >= 0.0) {
            return Err(CullingConfigError::InvalidThreshold(self.recompute_threshold));
        }
        if !(self.scan_hz.is_finite() && self.scan_hz >= 0.0) {
            return Err(CullingConfigError::InvalidScanRate(self.scan_hz));
        }
        for (field, value) in [
            ("underground_depth", self.underground_depth),
            ("aboveground_height", self.aboveground_height.unwrap_or(0)),
            ("surface_buffer", self.surface_buffer),
        ] {
            if value < 0 {
                return Err(CullingConfigError::Negative { field, value });
            }
        }
        Ok(())
    }
}

/// One ray's first hit during an adaptive scan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceSample {
    /// World azimuth of the ray in radians.
    pub azimuth: f32,
    pub elevation: f32,
    pub y: i32,
    pub distance_sq: f32,
}

/// Surfaces detected by the last adaptive scan.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceProfile {
    pub samples: Vec<SurfaceSample>,
    pub min_y: i32,
    pub max_y: i32,
}

impl SurfaceProfile {
    fn from_samples(samples: Vec<SurfaceSample>) -> Option<Self> {
        let min_y = samples.iter().map(|s| s.y).min()?;
        let max_y = samples.iter().map(|s| s.y).max()?;
        Some(Self {
            samples,
            min_y,
            max_y,
        })
    }
}

/// Y range of blocks that should be rendered.
#[derive(Debug, Clone, PartialEq)]
pub struct VisibilityBounds {
    pub min_y: i32,
    pub max_y: i32,
    pub surfaces: Option<SurfaceProfile>,
}

impl VisibilityBounds {
    pub fn unbounded() -> Self {
        Self {
            min_y: i32::MIN,
            max_y: i32::MAX,
            surfaces: None,
        }
    }

    pub fn contains_y(&self, y: i32) -> bool {
        (self.min_y..=self.max_y).contains(&y)
    }

    pub fn contains(&self, coord: BlockCoord) -> bool {
        self.contains_y(coord.y)
    }

    pub fn is_superset_of(&self, other: &VisibilityBounds) -> bool {
        self.min_y <= other.min_y && self.max_y >= other.max_y
    }
}

/// What an update changed in the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CullingUpdate {
    pub recomputed: bool,
    pub scanned: bool,
    pub shown: usize,
    pub hidden: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CullingStats {
    pub recomputes: u64,
    pub scans: u64,
    pub rays_cast: u64,
    pub ray_hits: u64,
}

/// Decides which stored blocks are rendered.
///
/// Bounds are derived from the player's Y (vertical mode) and from surfaces
/// found by periodic rays (adaptive mode). The only side effect is
/// `BlockStore::set_rendered`.
pub struct CullingEngine {
    config: CullingConfig,
    bounds: VisibilityBounds,
    /// Player Y at the last vertical recompute.
    anchor_y: Option<f32>,
    surfaces: Option<SurfaceProfile>,
    last_scan: Option<Duration>,
    dirty: bool,
    stats: CullingStats,
}

impl CullingEngine {
    pub fn new(config: CullingConfig) -> Self {
        Self {
            config,
            bounds: VisibilityBounds::unbounded(),
            anchor_y: None,
            surfaces: None,
            last_scan: None,
            dirty: true,
            stats: CullingStats::default(),
        }
    }

    pub fn config(&self) -> &CullingConfig {
        &self.config
    }

    /// Replace all parameters. Takes effect on the next update.
    pub fn set_config(&mut self, config: CullingConfig) {
        if !config.adaptive_enabled {
            self.surfaces = None;
        }
        self.config = config;
        self.last_scan = None;
        self.dirty = true;
    }

    pub fn set_vertical_enabled(&mut self, enabled: bool) {
        let mut config = self.config.clone();
        config.vertical_enabled = enabled;
        self.set_config(config);
    }

    pub fn set_adaptive_enabled(&mut self, enabled: bool) {
        let mut config = self.config.clone();
        config.adaptive_enabled = enabled;
        self.set_config(config);
    }

    pub fn bounds(&self) -> &VisibilityBounds {
        &self.bounds
    }

    pub fn stats(&self) -> CullingStats {
        self.stats
    }

    /// Vertical-only bounds for a player standing at `player_y`.
    pub fn vertical_bounds(&self, player_y: f32) -> VisibilityBounds {
        if !self.config.vertical_enabled {
            return VisibilityBounds::unbounded();
        }
        let feet = player_y.floor() as i32;
        VisibilityBounds {
            min_y: feet - self.config.underground_depth,
            max_y: match self.config.aboveground_height {
                Some(cap) => feet + cap,
                None => WORLD_HEIGHT,
            },
            surfaces: None,
        }
    }

    /// Per-frame entry point. Recomputes bounds when the player moved far
    /// enough vertically, a scan is due, or parameters changed, and then
    /// re-applies them to every stored block.
    pub fn update(
        &mut self,
        eye: Vec3,
        yaw: f32,
        now: Duration,
        store: &mut BlockStore,
    ) -> CullingUpdate {
        let mut update = CullingUpdate::default();
        let mut changed = self.dirty;

        let moved = self
            .anchor_y
            .is_none_or(|y| (eye.y - y).abs() > self.config.recompute_threshold);
        if moved || self.dirty {
            self.anchor_y = Some(eye.y);
            changed = true;
        }

        if self.config.adaptive_enabled && self.scan_due(now) {
            self.last_scan = Some(now);
            update.scanned = true;
            changed |= self.scan(eye, yaw, store);
        }

        if changed {
            update.recomputed = true;
            self.recompute();
            let (shown, hidden) = self.apply(store);
            update.shown = shown;
            update.hidden = hidden;
        }
        update
    }

    /// Scan immediately regardless of the scan rate and re-apply bounds.
    pub fn force_scan(&mut self, eye: Vec3, yaw: f32, store: &mut BlockStore) -> CullingUpdate {
        self.anchor_y = Some(eye.y);
        let scanned = self.config.adaptive_enabled;
        if scanned {
            self.scan(eye, yaw, store);
        }
        self.recompute();
        let (shown, hidden) = self.apply(store);
        CullingUpdate {
            recomputed: true,
            scanned,
            shown,
            hidden,
        }
    }

    /// Apply the current bounds to freshly inserted blocks.
    pub fn classify(
        &self,
        coords: impl IntoIterator<Item = BlockCoord>,
        store: &mut BlockStore,
    ) -> usize {
        let mut shown = 0;
        for coord in coords {
            let visible = self.bounds.contains(coord);
            store.set_rendered(coord, visible);
            shown += visible as usize;
        }
        shown
    }

    fn scan_due(&self, now: Duration) -> bool {
        if self.config.scan_hz <= 0.0 {
            return self.last_scan.is_none();
        }
        match self.last_scan {
            None => true,
            Some(last) => now.saturating_sub(last).as_secs_f32() >= 1.0 / self.config.scan_hz,
        }
    }

    /// Cast the configured rays. Returns whether the surface range changed.
    fn scan(&mut self, eye: Vec3, yaw: f32, store: &BlockStore) -> bool {
        let rays = self.config.ray_count.max(1);
        let range = self.config.ray_range;
        let range_sq = range * range;
        let mut samples = Vec::new();

        for i in 0..rays {
            let azimuth = yaw + std::f32::consts::TAU * i as f32 / rays as f32;
            let band = SCAN_ELEVATIONS_DEG[i as usize % SCAN_ELEVATIONS_DEG.len()];
            let elevation = band.to_radians();
            let ray = Ray::new(eye, direction(azimuth, elevation));
            self.stats.rays_cast += 1;
            let Some(hit) = cast(store, &ray, range) else {
                continue;
            };
            let distance_sq = (hit.coord.center() - eye).length_squared();
            if distance_sq > range_sq {
                continue;
            }
            self.stats.ray_hits += 1;
            samples.push(SurfaceSample {
                azimuth,
                elevation,
                y: hit.coord.y,
                distance_sq,
            });
        }
        self.stats.scans += 1;

        let profile = SurfaceProfile::from_samples(samples);
        let range_changed = match (&self.surfaces, &profile) {
            (Some(a), Some(b)) => a.min_y != b.min_y || a.max_y != b.max_y,
            (None, None) => false,
            _ => true,
        };
        trace!(
            hits = profile.as_ref().map_or(0, |p| p.samples.len()),
            range_changed,
            "adaptive scan"
        );
        self.surfaces = profile;
        range_changed
    }

    fn recompute(&mut self) {
        self.dirty = false;
        self.stats.recomputes += 1;
        let player_y = self.anchor_y.unwrap_or(0.0);
        let vertical = self.vertical_bounds(player_y);
        let surfaces = if self.config.adaptive_enabled {
            self.surfaces.clone()
        } else {
            None
        };

        // Surfaces only ever widen the vertical window. With vertical culling
        // off that window is already unbounded.
        self.bounds = match surfaces {
            None => vertical,
            Some(profile) => VisibilityBounds {
                min_y: vertical
                    .min_y
                    .min(profile.min_y - self.config.surface_buffer),
                max_y: vertical
                    .max_y
                    .max(profile.max_y + self.config.surface_buffer),
                surfaces: Some(profile),
            },
        };
        debug!(
            min_y = self.bounds.min_y,
            max_y = self.bounds.max_y,
            adaptive = self.bounds.surfaces.is_some(),
            "visibility bounds recomputed"
        );
    }

    fn apply(&self, store: &mut BlockStore) -> (usize, usize) {
        let flips: Vec<(BlockCoord, bool)> = store
            .iter()
            .filter_map(|(coord, record)| {
                let visible = self.bounds.contains(*coord);
                (visible != record.rendered()).then_some((*coord, visible))
            })
            .collect();
        let shown = flips.iter().filter(|(_, v)| *v).count();
        let hidden = flips.len() - shown;
        for (coord, visible) in flips {
            store.set_rendered(coord, visible);
        }
        (shown, hidden)
    }
}

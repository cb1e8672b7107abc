use serde::{Deserialize, Serialize};
use voxelcore_common::WORLD_HEIGHT;

use crate::error::GenError;

/// Biome parameters consumed from the world-generation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BiomeParams {
    /// Mean surface height in blocks.
    pub base_height: i32,
    /// Peak deviation from `base_height`.
    pub amplitude: f64,
    /// Horizontal noise frequency (per block).
    pub frequency: f64,
    pub octaves: usize,
    /// Columns whose surface is below this are flooded up to it.
    pub water_level: i32,
    /// Solid layers stored under each surface block.
    pub soil_depth: i32,
    /// Per-column placement probabilities.
    pub tree_density: f32,
    pub bush_density: f32,
    pub flower_density: f32,
    pub rock_density: f32,
}

impl Default for BiomeParams {
    fn default() -> Self {
        Self {
            base_height: 64,
            amplitude: 18.0,
            frequency: 0.012,
            octaves: 4,
            water_level: 58,
            soil_depth: 4,
            tree_density: 0.015,
            bush_density: 0.03,
            flower_density: 0.05,
            rock_density: 0.008,
        }
    }
}

/// Generation configuration handed to both workers at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenConfig {
    pub seed: u64,
    pub biome: BiomeParams,
    /// Chunks further than this from the origin fail with `OutOfBounds`.
    /// `None` means unbounded.
    pub world_radius_chunks: Option<i32>,
}

impl Default for GenConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            biome: BiomeParams::default(),
            world_radius_chunks: None,
        }
    }
}

impl GenConfig {
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), GenError> {
        let b = &self.biome;
        if b.octaves == 0 {
            return Err(GenError::InvalidConfig("octaves must be at least 1".into()));
        }
        if b.frequency <= 0.0 {
            return Err(GenError::InvalidConfig("frequency must be positive".into()));
        }
        if !(1..WORLD_HEIGHT).contains(&b.soil_depth) {
            return Err(GenError::InvalidConfig(format!(
                "soil_depth must lie in 1..{WORLD_HEIGHT} (got {})",
                b.soil_depth
            )));
        }
        let densities = [
            b.tree_density,
            b.bush_density,
            b.flower_density,
            b.rock_density,
        ];
        if densities.iter().any(|d| !(0.0..=1.0).contains(d)) {
            return Err(GenError::InvalidConfig(
                "placement densities must lie in [0, 1]".into(),
            ));
        }
        if densities.iter().sum::<f32>() > 1.0 {
            return Err(GenError::InvalidConfig(
                "placement densities must sum to at most 1".into(),
            ));
        }
        if self.world_radius_chunks.is_some_and(|r| r < 0) {
            return Err(GenError::InvalidConfig(
                "world_radius_chunks must not be negative".into(),
            ));
        }
        Ok(())
    }
}

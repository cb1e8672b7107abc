use noise::{Fbm, MultiFractal, NoiseFn, Perlin};
use serde::{Deserialize, Serialize};
use voxelcore_common::{ChunkKey, CHUNK_SIZE, WORLD_HEIGHT};

use crate::config::{BiomeParams, GenConfig};
use crate::error::GenError;

const COLUMNS: usize = (CHUNK_SIZE * CHUNK_SIZE) as usize;

/// Column surface heights and flooding for one chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerrainData {
    pub key: ChunkKey,
    /// Surface Y per column, indexed `lz * CHUNK_SIZE + lx`.
    pub heights: Vec<i32>,
    /// Whether each column is flooded up to `water_level`.
    pub water: Vec<bool>,
    pub water_level: i32,
    /// Stored solid layers per column, surface block included.
    pub soil_depth: i32,
}

impl TerrainData {
    fn index(lx: i32, lz: i32) -> usize {
        debug_assert!((0..CHUNK_SIZE).contains(&lx) && (0..CHUNK_SIZE).contains(&lz));
        (lz * CHUNK_SIZE + lx) as usize
    }

    /// Surface height of a chunk-local column.
    pub fn height(&self, lx: i32, lz: i32) -> i32 {
        self.heights[Self::index(lx, lz)]
    }

    pub fn is_water(&self, lx: i32, lz: i32) -> bool {
        self.water[Self::index(lx, lz)]
    }

    pub fn max_height(&self) -> i32 {
        self.heights.iter().copied().max().unwrap_or(0)
    }
}

/// Heightmap generator: fractal Perlin noise sampled per column.
pub struct TerrainGenerator {
    noise: Fbm<Perlin>,
    biome: BiomeParams,
    world_radius_chunks: Option<i32>,
}

impl TerrainGenerator {
    pub fn new(config: &GenConfig) -> Self {
        // Perlin seeds are 32-bit; fold the high half in so distinct 64-bit
        // seeds rarely collide.
        let seed = (config.seed ^ (config.seed >> 32)) as u32;
        Self {
            noise: Fbm::<Perlin>::new(seed).set_octaves(config.biome.octaves),
            biome: config.biome.clone(),
            world_radius_chunks: config.world_radius_chunks,
        }
    }

    /// Surface height of a world column.
    pub fn surface_height(&self, x: i32, z: i32) -> i32 {
        let b = &self.biome;
        let n = self
            .noise
            .get([x as f64 * b.frequency, z as f64 * b.frequency]);
        let h = b.base_height + (n * b.amplitude).round() as i32;
        h.max(b.soil_depth).min(WORLD_HEIGHT - 1)
    }

    pub fn generate(&self, key: ChunkKey) -> Result<TerrainData, GenError> {
        if let Some(radius) = self.world_radius_chunks {
            if key.distance(ChunkKey::new(0, 0)) > radius {
                return Err(GenError::OutOfBounds(key));
            }
        }

        let mut heights = Vec::with_capacity(COLUMNS);
        let mut water = Vec::with_capacity(COLUMNS);
        for lz in 0..CHUNK_SIZE {
            for lx in 0..CHUNK_SIZE {
                let h = self.surface_height(key.origin_x() + lx, key.origin_z() + lz);
                heights.push(h);
                water.push(h < self.biome.water_level);
            }
        }

        Ok(TerrainData {
            key,
            heights,
            water,
            water_level: self.biome.water_level,
            soil_depth: self.biome.soil_depth,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_is_deterministic() {
        let config = GenConfig::with_seed(1234);
        let a = TerrainGenerator::new(&config).generate(ChunkKey::new(3, -2)).unwrap();
        let b = TerrainGenerator::new(&config).generate(ChunkKey::new(3, -2)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.heights.len(), COLUMNS);
        assert_eq!(a.water.len(), COLUMNS);
    }

    #[test]
    fn heights_stay_in_range() {
        let config = GenConfig::default();
        let generator = TerrainGenerator::new(&config);
        let data = generator.generate(ChunkKey::new(-5, 9)).unwrap();
        let b = &config.biome;
        for &h in &data.heights {
            assert!(h >= b.soil_depth && h < WORLD_HEIGHT);
            assert!((h - b.base_height).abs() as f64 <= b.amplitude * 2.0 + 1.0);
        }
    }

    #[test]
    fn water_flags_follow_water_level() {
        let config = GenConfig::default();
        let data = TerrainGenerator::new(&config).generate(ChunkKey::new(0, 0)).unwrap();
        for lz in 0..CHUNK_SIZE {
            for lx in 0..CHUNK_SIZE {
                assert_eq!(data.is_water(lx, lz), data.height(lx, lz) < data.water_level);
            }
        }
    }

    #[test]
    fn adjacent_chunks_share_a_continuous_surface() {
        let generator = TerrainGenerator::new(&GenConfig::default());
        let left = generator.generate(ChunkKey::new(0, 0)).unwrap();
        let right = generator.generate(ChunkKey::new(1, 0)).unwrap();
        for lz in 0..CHUNK_SIZE {
            let step = (left.height(CHUNK_SIZE - 1, lz) - right.height(0, lz)).abs();
            assert!(step <= 6, "seam step {step} at row {lz}");
        }
    }

    #[test]
    fn out_of_bounds_keys_fail() {
        let config = GenConfig {
            world_radius_chunks: Some(4),
            ..GenConfig::default()
        };
        let generator = TerrainGenerator::new(&config);
        assert!(generator.generate(ChunkKey::new(4, -4)).is_ok());
        assert!(matches!(
            generator.generate(ChunkKey::new(5, 0)),
            Err(GenError::OutOfBounds(_))
        ));
    }
}

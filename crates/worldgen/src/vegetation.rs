use serde::{Deserialize, Serialize};
use voxelcore_common::{column_hash, unit_f32, BlockCoord, CHUNK_SIZE};

use crate::config::{BiomeParams, GenConfig};
use crate::error::GenError;
use crate::terrain::TerrainData;

const PLACEMENT_SALT: u64 = 0x7ee5;
const TRUNK_SALT: u64 = 0x7a11;

/// Trees keep this many columns away from the chunk edge so their canopy
/// stays inside the owning chunk column.
pub const TREE_EDGE_MARGIN: i32 = 2;

/// What a vegetation placement point grows into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlacementKind {
    Tree { trunk_height: u8 },
    Bush,
    Flower,
    Rock,
}

/// A decoration anchored on the block above a column's surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlacementPoint {
    pub coord: BlockCoord,
    pub kind: PlacementKind,
}

/// Places trees, bushes, flowers and rocks on generated terrain.
///
/// Each column is decided by a seeded hash of its world position, so the same
/// terrain always yields the same placement points.
pub struct VegetationGenerator {
    seed: u64,
    biome: BiomeParams,
}

impl VegetationGenerator {
    pub fn new(config: &GenConfig) -> Self {
        Self {
            seed: config.seed,
            biome: config.biome.clone(),
        }
    }

    pub fn generate(&self, terrain: &TerrainData) -> Result<Vec<PlacementPoint>, GenError> {
        let b = &self.biome;
        let mut points = Vec::new();
        for lz in 0..CHUNK_SIZE {
            for lx in 0..CHUNK_SIZE {
                if terrain.is_water(lx, lz) {
                    continue;
                }
                let h = terrain.height(lx, lz);
                let beach = h <= terrain.water_level + 1;
                let x = terrain.key.origin_x() + lx;
                let z = terrain.key.origin_z() + lz;
                let roll = unit_f32(column_hash(self.seed, x, z, PLACEMENT_SALT));
                let coord = BlockCoord::new(x, h + 1, z);

                let tree_ok = !beach
                    && (TREE_EDGE_MARGIN..CHUNK_SIZE - TREE_EDGE_MARGIN).contains(&lx)
                    && (TREE_EDGE_MARGIN..CHUNK_SIZE - TREE_EDGE_MARGIN).contains(&lz);

                // Cumulative bands over one roll: tree, bush, flower, rock.
                let bands = [
                    b.tree_density,
                    b.bush_density,
                    b.flower_density,
                    b.rock_density,
                ];
                let mut upper = 0.0;
                let band = bands.iter().position(|d| {
                    upper += d;
                    roll < upper
                });
                let kind = match band {
                    Some(0) if tree_ok => Some(PlacementKind::Tree {
                        trunk_height: 4 + (column_hash(self.seed, x, z, TRUNK_SALT) % 3) as u8,
                    }),
                    Some(1) if !beach => Some(PlacementKind::Bush),
                    Some(2) if !beach => Some(PlacementKind::Flower),
                    Some(3) => Some(PlacementKind::Rock),
                    _ => None,
                };

                if let Some(kind) = kind {
                    points.push(PlacementPoint { coord, kind });
                }
            }
        }
        Ok(points)
    }
}

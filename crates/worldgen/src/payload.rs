use voxelcore_common::{BlockCoord, BlockKind, ChunkKey, CHUNK_SIZE};

use crate::terrain::TerrainData;
use crate::vegetation::{PlacementKind, PlacementPoint};

/// Everything generated for one chunk: terrain plus vegetation.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkPayload {
    pub terrain: TerrainData,
    pub points: Vec<PlacementPoint>,
}

impl ChunkPayload {
    pub fn key(&self) -> ChunkKey {
        self.terrain.key
    }

    /// Expand the payload into concrete blocks.
    ///
    /// Each column stores its surface block, soil beneath it down to the soil
    /// depth, and a stone floor; deeper voxels are implied and never stored.
    /// Flooded columns are filled with water up to the water level.
    pub fn blocks(&self) -> Vec<(BlockCoord, BlockKind)> {
        let t = &self.terrain;
        let mut out = Vec::new();
        let soil_depth = t.soil_depth;

        for lz in 0..CHUNK_SIZE {
            for lx in 0..CHUNK_SIZE {
                let x = t.key.origin_x() + lx;
                let z = t.key.origin_z() + lz;
                let h = t.height(lx, lz);
                let sandy = h <= t.water_level + 1;

                out.push((
                    BlockCoord::new(x, h, z),
                    if sandy { BlockKind::Sand } else { BlockKind::Grass },
                ));
                for y in (h - soil_depth + 1)..h {
                    let kind = if sandy { BlockKind::Sand } else { BlockKind::Dirt };
                    out.push((BlockCoord::new(x, y, z), kind));
                }
                out.push((BlockCoord::new(x, h - soil_depth, z), BlockKind::Stone));

                if t.is_water(lx, lz) {
                    for y in (h + 1)..=t.water_level {
                        out.push((BlockCoord::new(x, y, z), BlockKind::Water));
                    }
                }
            }
        }

        for point in &self.points {
            match point.kind {
                PlacementKind::Tree { trunk_height } => {
                    expand_tree(point.coord, trunk_height as i32, &mut out)
                }
                PlacementKind::Bush => out.push((point.coord, BlockKind::Bush)),
                PlacementKind::Flower => out.push((point.coord, BlockKind::Flower)),
                PlacementKind::Rock => out.push((point.coord, BlockKind::Rock)),
            }
        }
        out
    }
}

fn expand_tree(base: BlockCoord, trunk_height: i32, out: &mut Vec<(BlockCoord, BlockKind)>) {
    let top = base.y + trunk_height - 1;
    for y in base.y..=top {
        out.push((BlockCoord::new(base.x, y, base.z), BlockKind::Wood));
    }
    for y in [top - 1, top] {
        for dz in -2..=2i32 {
            for dx in -2..=2i32 {
                let corner = dx.abs() == 2 && dz.abs() == 2;
                if corner || (dx == 0 && dz == 0) {
                    continue;
                }
                out.push((base.offset(dx, y - base.y, dz), BlockKind::Leaves));
            }
        }
    }
    for dz in -1..=1 {
        for dx in -1..=1 {
            out.push((base.offset(dx, top + 1 - base.y, dz), BlockKind::Leaves));
        }
    }
}

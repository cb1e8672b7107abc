//! Shared types for the voxelcore engine: voxel and chunk coordinates, block
//! and entity kinds, and deterministic hashing used by generation.

mod rng;
mod types;

pub use rng::{column_hash, splitmix64, unit_f32};
pub use types::{
    BlockCoord, BlockKind, ChunkKey, EntityKind, ParseChunkKeyError, UnknownBlockId, CHUNK_SIZE,
    WORLD_HEIGHT,
};

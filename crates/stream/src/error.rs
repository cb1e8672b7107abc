use voxelcore_common::ChunkKey;
use voxelcore_persist::StoreError;
use voxelcore_render::CullingConfigError;
use voxelcore_worldgen::GenError;

/// Errors from chunk streaming and the world session.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error(
        "radii must satisfy load < cleanup < unload (got load={load}, cleanup={cleanup}, unload={unload})"
    )]
    InvalidRadii { load: i32, cleanup: i32, unload: i32 },
    #[error("visit radius must not be negative (got {0})")]
    InvalidVisitRadius(i32),
    #[error("chunk {0} is already loaded")]
    AlreadyLoaded(ChunkKey),
    #[error("chunk {0} already has a generation request in flight")]
    AlreadyPending(ChunkKey),
    #[error("generation: {0}")]
    Generation(#[from] GenError),
    #[error("settings: {0}")]
    Settings(#[from] StoreError),
    #[error("culling: {0}")]
    Culling(#[from] CullingConfigError),
}

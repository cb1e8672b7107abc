use voxelcore_common::ChunkKey;

/// Errors from chunk generation and worker management.
#[derive(Debug, thiserror::Error)]
pub enum GenError {
    #[error("chunk {0} lies outside the generated world")]
    OutOfBounds(ChunkKey),
    #[error("failed to spawn {name} worker: {source}")]
    Spawn {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("{0} worker is not running")]
    WorkerUnavailable(&'static str),
    #[error("{0} worker disconnected")]
    WorkerDisconnected(&'static str),
    #[error("invalid generation config: {0}")]
    InvalidConfig(String),
}

//! Chunk generation: seeded terrain and vegetation generators running on two
//! persistent worker threads, and the coordinator that chains them.
//!
//! # Invariants
//! - At most one request per chunk key is in flight, across both stages.
//! - Vegetation for a key is requested only after that key's terrain arrived.
//! - Continuations run on the thread that calls `poll`, never on a worker.
//! - Identical seed and biome parameters yield identical payloads.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod payload;
pub mod terrain;
pub mod vegetation;
pub mod worker;

pub use config::{BiomeParams, GenConfig};
pub use coordinator::{
    CoordinatorStats, OnReady, PollReport, RequestOutcome, Stage, TerrainFn, VegetationFn,
    WorkerCoordinator,
};
pub use error::GenError;
pub use payload::ChunkPayload;
pub use terrain::{TerrainData, TerrainGenerator};
pub use vegetation::{PlacementKind, PlacementPoint, VegetationGenerator};
pub use worker::Worker;

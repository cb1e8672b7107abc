//! Streaming: the chunk lifecycle state machine and the world session that
//! drives generation, culling and entities from it.
//!
//! # Invariants
//! - A key stays in `loaded_chunks` through cleanup; only crossing the unload
//!   radius removes it, and only then may it be generated again.
//! - `load_radius < cleanup_radius < unload_radius`, checked at construction.
//! - Dormant chunks come back from their retained blocks, never from the
//!   generators.
//! - Late generation results are activated and then streamed out normally.

pub mod config;
mod error;
mod grid;
mod lifecycle;
mod world;

pub use config::{ConfigError, EngineConfig, SpawnConfig};
pub use error::StreamError;
pub use grid::chunks_in_radius;
pub use lifecycle::{ChunkLifecycle, ChunkState, StreamConfig, StreamPlan, StreamStats};
pub use world::{TickReport, World, WorldState};

//! Developer tooling: a read-only world inspector and the text debug console.
//!
//! # Invariants
//! - The inspector never mutates the world.
//! - Console commands go through the same `World` entry points as the engine.

mod console;
mod inspector;

pub use console::{ConsoleCommand, ConsoleError, CullingMode, DebugConsole};
pub use inspector::{ChunkInfo, WorldInspector, WorldSummary};

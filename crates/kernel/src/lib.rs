//! Block kernel: the authoritative sparse voxel store.
//!
//! # Invariants
//! - A record exists iff its voxel is solid; `rendered == false` means hidden,
//!   not absent.
//! - The live counter changes exactly once per logical add/remove and is never
//!   recomputed by enumeration.
//! - Render handles are created and destroyed only here.

pub mod store;

pub use store::{BlockRecord, BlockStore, RemovedBlock, RenderHandle, StoreEvent};

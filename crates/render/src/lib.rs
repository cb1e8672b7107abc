//! Visibility: which stored blocks become renderable geometry.
//!
//! # Invariants
//! - Visibility bounds are derived state; the block store stays authoritative.
//! - Culling only ever calls `BlockStore::set_rendered`.
//! - Adaptive bounds always contain the vertical-only bounds.
//! - A benchmark leaves the block count and camera orientation as it found them.

mod benchmark;
mod camera;
mod culling;
mod profile;
mod raycast;

pub use benchmark::{
    recommend_tier, run_benchmark, BenchmarkReport, BenchmarkTarget, FrameDriver, FrameTimer,
    NullFrameDriver,
};
pub use camera::{direction, Camera};
pub use culling::{
    CullingConfig, CullingConfigError, CullingEngine, CullingStats, CullingUpdate,
    SurfaceProfile, SurfaceSample, VisibilityBounds,
};
pub use profile::{ParseTierError, ProfileManager, RenderProfile, RenderTier, PROFILE_KEY};
pub use raycast::{cast, Ray, RayHit};

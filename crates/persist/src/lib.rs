//! Persistence for engine settings such as the active render profile.
//!
//! # Invariants
//! - Settings files carry a schema version; a mismatch fails closed.
//! - A successful `set` is durable before it returns.

mod store;

pub use store::{JsonSettingsStore, MemorySettingsStore, SettingsMeta, SettingsStore, StoreError};

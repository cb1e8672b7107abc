use std::path::{Path, PathBuf};

use glam::Vec3;
use serde::{Deserialize, Serialize};
use voxelcore_ecs::PoolConfig;
use voxelcore_render::{CullingConfig, CullingConfigError};
use voxelcore_worldgen::{GenConfig, GenError};

use crate::error::StreamError;
use crate::lifecycle::StreamConfig;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported config format {0:?} (expected .yaml, .yml or .json)")]
    UnsupportedFormat(String),
    #[error(transparent)]
    Stream(#[from] StreamError),
    #[error(transparent)]
    Generation(#[from] GenError),
    #[error(transparent)]
    Culling(#[from] CullingConfigError),
}

/// Ambient animal spawning on first visit to a chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnConfig {
    pub animals_per_chunk: usize,
    /// Spawned entities are released after this many ticks.
    pub max_age_ticks: u64,
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self {
            animals_per_chunk: 2,
            max_age_ticks: 3600,
        }
    }
}

/// Everything a [`World`](crate::World) session is built from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub stream: StreamConfig,
    pub generation: GenConfig,
    pub culling: CullingConfig,
    pub pool: PoolConfig,
    pub spawn: SpawnConfig,
    /// Player start. `None` places the player just above the terrain at the
    /// centre of the origin chunk.
    pub spawn_position: Option<Vec3>,
    /// Directory holding `settings.json`. `None` keeps settings in memory.
    pub settings_dir: Option<PathBuf>,
}

impl EngineConfig {
    /// Load from a `.yaml`/`.yml` or `.json` file. Missing fields take their
    /// defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let config: Self = match ext.as_str() {
            "yaml" | "yml" => serde_yaml::from_str(&text)?,
            "json" => serde_json::from_str(&text)?,
            _ => return Err(ConfigError::UnsupportedFormat(ext)),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.stream.validate()?;
        self.generation.validate()?;
        self.culling.validate()?;
        Ok(())
    }
}

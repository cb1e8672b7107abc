use std::fmt;

use glam::Vec3;
use voxelcore_common::ChunkKey;
use voxelcore_render::RenderTier;
use voxelcore_stream::{ChunkState, World};

/// Read-only queries against a running [`World`] for debugging.
pub struct WorldInspector;

impl WorldInspector {
    pub fn summary(world: &World) -> WorldSummary {
        let lifecycle = world.lifecycle();
        let stats = lifecycle.stats();
        let bounds = world.culling().bounds();
        WorldSummary {
            tick: lifecycle.tick(),
            player: world.player_position(),
            player_chunk: world.player_chunk(),
            blocks: world.block_count(),
            rendered: world.store().rendered_count(),
            loaded_chunks: world.loaded_chunk_count(),
            active_chunks: stats.total_active,
            dormant_chunks: stats.total_dormant,
            pending_requests: world.pending_requests(),
            entities_active: world.pool().active_count(),
            entities_pooled: world.pool().pooled_count(),
            profile: world.active_profile(),
            visible_y: (bounds.min_y, bounds.max_y),
            degraded: world.is_degraded(),
        }
    }

    pub fn inspect_chunk(world: &World, key: ChunkKey) -> ChunkInfo {
        let lifecycle = world.lifecycle();
        ChunkInfo {
            key,
            state: lifecycle.state(key),
            loaded: lifecycle.is_loaded(key),
            visited: lifecycle.visited_chunks().contains(&key),
            blocks: world.store().chunk_block_count(key),
            placements: world.placements(key).map_or(0, <[_]>::len),
            entities: world.entities_in(key).len(),
            requests: lifecycle.request_count(key),
        }
    }

    /// Loaded chunk keys, nearest to the player first.
    pub fn list_chunks(world: &World) -> Vec<ChunkKey> {
        let player = world.player_chunk();
        let mut keys: Vec<ChunkKey> = world.lifecycle().loaded_chunks().iter().copied().collect();
        keys.sort_by_key(|k| (k.distance(player), *k));
        keys
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorldSummary {
    pub tick: u64,
    pub player: Vec3,
    pub player_chunk: ChunkKey,
    pub blocks: usize,
    pub rendered: usize,
    pub loaded_chunks: usize,
    pub active_chunks: usize,
    pub dormant_chunks: usize,
    pub pending_requests: usize,
    pub entities_active: usize,
    pub entities_pooled: usize,
    pub profile: RenderTier,
    pub visible_y: (i32, i32),
    pub degraded: bool,
}

fn fmt_y(y: i32) -> String {
    match y {
        i32::MIN => "-inf".into(),
        i32::MAX => "+inf".into(),
        y => y.to_string(),
    }
}

impl fmt::Display for WorldSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "World: tick={} player=({:.1}, {:.1}, {:.1}) chunk={}",
            self.tick, self.player.x, self.player.y, self.player.z, self.player_chunk
        )?;
        writeln!(
            f,
            "Blocks: {} stored, {} rendered, visible y {}..{}",
            self.blocks,
            self.rendered,
            fmt_y(self.visible_y.0),
            fmt_y(self.visible_y.1)
        )?;
        writeln!(
            f,
            "Chunks: {} loaded ({} active, {} dormant), {} pending{}",
            self.loaded_chunks,
            self.active_chunks,
            self.dormant_chunks,
            self.pending_requests,
            if self.degraded { ", workers degraded" } else { "" }
        )?;
        write!(
            f,
            "Entities: {} active, {} pooled; profile={}",
            self.entities_active, self.entities_pooled, self.profile
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChunkInfo {
    pub key: ChunkKey,
    pub state: ChunkState,
    pub loaded: bool,
    pub visited: bool,
    pub blocks: usize,
    pub placements: usize,
    pub entities: usize,
    pub requests: u32,
}

impl fmt::Display for ChunkInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Chunk [{}] {:?} loaded={} visited={} blocks={} placements={} entities={} requests={}",
            self.key,
            self.state,
            self.loaded,
            self.visited,
            self.blocks,
            self.placements,
            self.entities,
            self.requests
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use voxelcore_stream::{EngineConfig, StreamConfig};

    fn world() -> World {
        let mut config = EngineConfig::default();
        config.stream = StreamConfig {
            load_radius: 1,
            cleanup_radius: 2,
            unload_radius: 3,
            ..StreamConfig::default()
        };
        config.spawn_position = Some(Vec3::new(8.0, 90.0, 8.0));
        World::new(config).unwrap()
    }

    #[test]
    fn summary_of_fresh_world() {
        let world = world();
        let summary = WorldInspector::summary(&world);
        assert_eq!(summary.tick, 0);
        assert_eq!(summary.blocks, 0);
        assert_eq!(summary.loaded_chunks, 0);
        assert_eq!(summary.player_chunk, ChunkKey::new(0, 0));
        assert_eq!(summary.profile, RenderTier::Balanced);
    }

    #[test]
    fn summary_after_streaming() {
        let mut world = world();
        world.tick(Duration::from_millis(16));
        world.settle(Duration::from_secs(10));
        world.tick(Duration::from_millis(16));

        let summary = WorldInspector::summary(&world);
        assert_eq!(summary.loaded_chunks, 9);
        assert_eq!(summary.active_chunks, 9);
        assert!(summary.blocks > 0);
        assert!(summary.rendered <= summary.blocks);

        let info = WorldInspector::inspect_chunk(&world, ChunkKey::new(0, 0));
        assert_eq!(info.state, ChunkState::Active);
        assert!(info.loaded);
        assert_eq!(info.requests, 1);
        assert!(info.blocks > 0);

        let keys = WorldInspector::list_chunks(&world);
        assert_eq!(keys.len(), 9);
        assert_eq!(keys[0], ChunkKey::new(0, 0));
    }

    #[test]
    fn unknown_chunk_is_unrequested() {
        let world = world();
        let info = WorldInspector::inspect_chunk(&world, ChunkKey::new(40, 40));
        assert_eq!(info.state, ChunkState::Unrequested);
        assert!(!info.loaded);
        assert_eq!(info.blocks, 0);
    }

    #[test]
    fn summary_display() {
        let world = world();
        let text = WorldInspector::summary(&world).to_string();
        assert!(text.contains("tick=0"));
        assert!(text.contains("profile=balanced"));
        assert!(text.contains("-inf..+inf"));
    }
}

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info_span, trace, warn};
use voxelcore_common::ChunkKey;

use crate::error::StreamError;
use crate::grid::chunks_in_radius;

/// Streaming radii (chunk units, Chebyshev) and per-tick budgets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Chunks within this radius are generated or rehydrated.
    pub load_radius: i32,
    /// Active chunks beyond this radius lose their blocks but stay loaded.
    pub cleanup_radius: i32,
    /// Loaded chunks beyond this radius are forgotten entirely.
    pub unload_radius: i32,
    /// Active chunks within this radius count as visited.
    pub visit_radius: i32,
    /// Generation requests plus rehydrations per tick.
    pub request_budget: usize,
    pub cleanup_budget: usize,
    pub unload_budget: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            load_radius: 4,
            cleanup_radius: 6,
            unload_radius: 10,
            visit_radius: 2,
            request_budget: 8,
            cleanup_budget: 4,
            unload_budget: 4,
        }
    }
}

impl StreamConfig {
    pub fn validate(&self) -> Result<(), StreamError> {
        let ordered = 0 <= self.load_radius
            && self.load_radius < self.cleanup_radius
            && self.cleanup_radius < self.unload_radius;
        if !ordered {
            return Err(StreamError::InvalidRadii {
                load: self.load_radius,
                cleanup: self.cleanup_radius,
                unload: self.unload_radius,
            });
        }
        if self.visit_radius < 0 {
            return Err(StreamError::InvalidVisitRadius(self.visit_radius));
        }
        Ok(())
    }
}

/// Where a chunk is in its life.
///
/// `Unrequested` and `Unloaded` are never stored: a key with no entry is
/// eligible for a fresh request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChunkState {
    Unrequested,
    TerrainPending,
    TerrainReady,
    VegetationPending,
    /// Blocks are in the store.
    Active,
    /// Blocks were cleaned up; the key stays loaded and is rehydrated, never
    /// regenerated.
    Dormant,
    Unloaded,
}

impl ChunkState {
    pub fn is_pending(self) -> bool {
        matches!(
            self,
            ChunkState::TerrainPending | ChunkState::TerrainReady | ChunkState::VegetationPending
        )
    }
}

/// Work decided by one [`ChunkLifecycle::update`]. Cleanup, rehydration and
/// unload transitions are already applied; requests still have to be
/// dispatched through [`ChunkLifecycle::begin_request`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamPlan {
    pub to_request: Vec<ChunkKey>,
    pub to_cleanup: Vec<ChunkKey>,
    pub to_rehydrate: Vec<ChunkKey>,
    pub to_unload: Vec<ChunkKey>,
    /// Keys visited for the first time this tick.
    pub newly_visited: Vec<ChunkKey>,
}

impl StreamPlan {
    pub fn is_idle(&self) -> bool {
        self.to_request.is_empty()
            && self.to_cleanup.is_empty()
            && self.to_rehydrate.is_empty()
            && self.to_unload.is_empty()
    }
}

/// Per-tick streaming statistics for instrumentation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamStats {
    pub requests_this_tick: usize,
    pub cleanups_this_tick: usize,
    pub rehydrations_this_tick: usize,
    pub unloads_this_tick: usize,
    pub total_loaded: usize,
    pub total_active: usize,
    pub total_dormant: usize,
    pub total_pending: usize,
    pub total_failed: usize,
    pub update_time: Duration,
}

/// The chunk state machine.
///
/// `loaded_chunks` holds every key whose generation has completed and that
/// has not crossed the unload radius since. Cleanup never touches it; only
/// unload removes a key, and only a key outside it can be requested again.
pub struct ChunkLifecycle {
    config: StreamConfig,
    states: HashMap<ChunkKey, ChunkState>,
    loaded_chunks: HashSet<ChunkKey>,
    visited_chunks: HashSet<ChunkKey>,
    spawn_timestamps: HashMap<ChunkKey, u64>,
    failed: HashSet<ChunkKey>,
    /// Per-key requests, kept only while the key is tracked.
    request_counts: HashMap<ChunkKey, u32>,
    total_requests: u64,
    tick: u64,
    stats: StreamStats,
}

impl ChunkLifecycle {
    pub fn new(config: StreamConfig) -> Result<Self, StreamError> {
        config.validate()?;
        Ok(Self {
            config,
            states: HashMap::new(),
            loaded_chunks: HashSet::new(),
            visited_chunks: HashSet::new(),
            spawn_timestamps: HashMap::new(),
            failed: HashSet::new(),
            request_counts: HashMap::new(),
            total_requests: 0,
            tick: 0,
            stats: StreamStats::default(),
        })
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn stats(&self) -> &StreamStats {
        &self.stats
    }

    pub fn state(&self, key: ChunkKey) -> ChunkState {
        self.states
            .get(&key)
            .copied()
            .unwrap_or(ChunkState::Unrequested)
    }

    pub fn is_loaded(&self, key: ChunkKey) -> bool {
        self.loaded_chunks.contains(&key)
    }

    pub fn loaded_chunks(&self) -> &HashSet<ChunkKey> {
        &self.loaded_chunks
    }

    pub fn visited_chunks(&self) -> &HashSet<ChunkKey> {
        &self.visited_chunks
    }

    pub fn spawn_timestamp(&self, key: ChunkKey) -> Option<u64> {
        self.spawn_timestamps.get(&key).copied()
    }

    pub fn is_failed(&self, key: ChunkKey) -> bool {
        self.failed.contains(&key)
    }

    /// Generation requests dispatched for `key` since it was last forgotten.
    /// A key is forgotten when it unloads, or when it failed and the player
    /// moved out of the load radius.
    pub fn request_count(&self, key: ChunkKey) -> u32 {
        self.request_counts.get(&key).copied().unwrap_or(0)
    }

    /// Generation requests dispatched over the whole session.
    pub fn total_requests(&self) -> u64 {
        self.total_requests
    }

    /// Number of keys with any per-key bookkeeping.
    pub fn tracked_keys(&self) -> usize {
        self.request_counts.len()
    }

    pub fn count_in(&self, state: ChunkState) -> usize {
        self.states.values().filter(|s| **s == state).count()
    }

    /// Advance one tick for a player standing in `player`.
    pub fn update(&mut self, player: ChunkKey) -> StreamPlan {
        let _span = info_span!("stream_update", tick = self.tick).entered();
        let started = Instant::now();
        let cfg = &self.config;
        let mut plan = StreamPlan::default();

        // Unload first so a chunk that jumped straight past the unload radius
        // is not cleaned up in the same tick.
        let mut far: Vec<ChunkKey> = self
            .loaded_chunks
            .iter()
            .filter(|k| k.distance(player) > cfg.unload_radius)
            .copied()
            .collect();
        far.sort_by_key(|k| std::cmp::Reverse((k.distance(player), *k)));
        far.truncate(cfg.unload_budget);
        plan.to_unload = far;

        let mut stale: Vec<ChunkKey> = self
            .states
            .iter()
            .filter(|(k, s)| {
                **s == ChunkState::Active
                    && k.distance(player) > cfg.cleanup_radius
                    && !plan.to_unload.contains(*k)
            })
            .map(|(k, _)| *k)
            .collect();
        stale.sort_by_key(|k| std::cmp::Reverse((k.distance(player), *k)));
        stale.truncate(cfg.cleanup_budget);
        plan.to_cleanup = stale;

        // Failed keys become eligible again once the player has left them.
        self.failed.retain(|k| k.distance(player) <= cfg.load_radius);

        let mut budget = cfg.request_budget;
        for key in chunks_in_radius(player, cfg.load_radius) {
            if budget == 0 {
                break;
            }
            match self.states.get(&key) {
                Some(ChunkState::Dormant) => {
                    plan.to_rehydrate.push(key);
                    budget -= 1;
                }
                None if !self.failed.contains(&key) && !self.loaded_chunks.contains(&key) => {
                    plan.to_request.push(key);
                    budget -= 1;
                }
                _ => {}
            }
        }

        for key in &plan.to_unload {
            self.loaded_chunks.remove(key);
            self.states.remove(key);
            self.visited_chunks.remove(key);
            self.spawn_timestamps.remove(key);
            debug!(%key, "chunk unloaded");
        }
        for key in &plan.to_cleanup {
            self.states.insert(*key, ChunkState::Dormant);
            self.visited_chunks.remove(key);
            self.spawn_timestamps.remove(key);
            debug!(%key, "chunk cleaned up");
        }
        for key in &plan.to_rehydrate {
            self.states.insert(*key, ChunkState::Active);
            debug!(%key, "chunk rehydrated");
        }

        let (states, loaded, failed) = (&self.states, &self.loaded_chunks, &self.failed);
        self.request_counts
            .retain(|k, _| states.contains_key(k) || loaded.contains(k) || failed.contains(k));

        for key in chunks_in_radius(player, self.config.visit_radius) {
            if self.states.get(&key) == Some(&ChunkState::Active)
                && self.visited_chunks.insert(key)
            {
                self.spawn_timestamps.entry(key).or_insert(self.tick);
                plan.newly_visited.push(key);
            }
        }

        self.stats = StreamStats {
            requests_this_tick: plan.to_request.len(),
            cleanups_this_tick: plan.to_cleanup.len(),
            rehydrations_this_tick: plan.to_rehydrate.len(),
            unloads_this_tick: plan.to_unload.len(),
            total_loaded: self.loaded_chunks.len(),
            total_active: self.count_in(ChunkState::Active),
            total_dormant: self.count_in(ChunkState::Dormant),
            total_pending: self.states.values().filter(|s| s.is_pending()).count(),
            total_failed: self.failed.len(),
            update_time: started.elapsed(),
        };
        trace!(
            requested = plan.to_request.len(),
            cleaned = plan.to_cleanup.len(),
            rehydrated = plan.to_rehydrate.len(),
            unloaded = plan.to_unload.len(),
            loaded = self.loaded_chunks.len(),
            "stream update complete"
        );
        self.tick += 1;
        plan
    }

    /// Mark `key` as requested. Rejects loaded or already pending keys.
    pub fn begin_request(&mut self, key: ChunkKey) -> Result<(), StreamError> {
        if self.loaded_chunks.contains(&key) {
            warn!(%key, "refusing to regenerate a loaded chunk");
            return Err(StreamError::AlreadyLoaded(key));
        }
        if self.state(key).is_pending() {
            return Err(StreamError::AlreadyPending(key));
        }
        self.states.insert(key, ChunkState::TerrainPending);
        *self.request_counts.entry(key).or_default() += 1;
        self.total_requests += 1;
        Ok(())
    }

    /// Undo `begin_request` when the dispatch itself was refused.
    pub fn cancel_request(&mut self, key: ChunkKey) {
        if self.state(key) == ChunkState::TerrainPending {
            self.states.remove(&key);
            if let Some(n) = self.request_counts.get_mut(&key) {
                *n = n.saturating_sub(1);
            }
            self.total_requests = self.total_requests.saturating_sub(1);
        }
    }

    /// Terrain arrived on the main thread.
    pub fn mark_terrain_ready(&mut self, key: ChunkKey) {
        if self.state(key) == ChunkState::TerrainPending {
            self.states.insert(key, ChunkState::TerrainReady);
        }
    }

    /// Terrain was handed to the vegetation stage.
    pub fn mark_vegetation_pending(&mut self, key: ChunkKey) {
        if matches!(
            self.state(key),
            ChunkState::TerrainPending | ChunkState::TerrainReady
        ) {
            self.states.insert(key, ChunkState::VegetationPending);
        }
    }

    /// Generation finished and the blocks are in the store.
    pub fn mark_active(&mut self, key: ChunkKey) {
        self.loaded_chunks.insert(key);
        self.states.insert(key, ChunkState::Active);
        self.failed.remove(&key);
    }

    /// Generation failed; the key waits until the player leaves and returns.
    pub fn mark_failed(&mut self, key: ChunkKey) {
        if self.state(key).is_pending() {
            self.states.remove(&key);
        }
        self.failed.insert(key);
    }

    /// Chunks whose dynamic content is older than `max_age` ticks at `now`.
    pub fn expired_spawns(&self, now: u64, max_age: u64) -> Vec<ChunkKey> {
        let mut keys: Vec<ChunkKey> = self
            .spawn_timestamps
            .iter()
            .filter(|(_, t)| now.saturating_sub(**t) > max_age)
            .map(|(k, _)| *k)
            .collect();
        keys.sort();
        keys
    }

    /// Forget a chunk's spawn timestamp after its content was despawned.
    pub fn clear_spawn(&mut self, key: ChunkKey) {
        self.spawn_timestamps.remove(&key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(load: i32, cleanup: i32, unload: i32) -> StreamConfig {
        StreamConfig {
            load_radius: load,
            cleanup_radius: cleanup,
            unload_radius: unload,
            visit_radius: 0,
            request_budget: 1000,
            cleanup_budget: 1000,
            unload_budget: 1000,
        }
    }

    /// Request, then immediately complete, everything the plan asks for.
    fn step(lc: &mut ChunkLifecycle, player: ChunkKey) -> StreamPlan {
        let plan = lc.update(player);
        for key in &plan.to_request {
            lc.begin_request(*key).unwrap();
            lc.mark_terrain_ready(*key);
            lc.mark_vegetation_pending(*key);
            lc.mark_active(*key);
        }
        plan
    }

    #[test]
    fn radii_must_be_ordered() {
        assert!(ChunkLifecycle::new(config(2, 4, 6)).is_ok());
        for (l, c, u) in [(4, 4, 6), (2, 6, 6), (5, 3, 8), (-1, 3, 8)] {
            assert!(matches!(
                ChunkLifecycle::new(config(l, c, u)),
                Err(StreamError::InvalidRadii { .. })
            ));
        }
    }

    #[test]
    fn requests_cover_load_radius_once() {
        let mut lc = ChunkLifecycle::new(config(1, 3, 5)).unwrap();
        let plan = lc.update(ChunkKey::new(0, 0));
        assert_eq!(plan.to_request.len(), 9);
        for key in &plan.to_request {
            lc.begin_request(*key).unwrap();
        }
        // Still pending: nothing new to request.
        assert!(lc.update(ChunkKey::new(0, 0)).to_request.is_empty());
        assert_eq!(lc.state(ChunkKey::new(1, 1)), ChunkState::TerrainPending);
    }

    #[test]
    fn request_budget_is_respected() {
        let mut cfg = config(2, 3, 5);
        cfg.request_budget = 3;
        let mut lc = ChunkLifecycle::new(cfg).unwrap();
        let plan = lc.update(ChunkKey::new(0, 0));
        assert_eq!(plan.to_request.len(), 3);
        assert_eq!(plan.to_request[0], ChunkKey::new(0, 0));
    }

    #[test]
    fn cleanup_keeps_key_loaded() {
        let mut lc = ChunkLifecycle::new(config(0, 2, 4)).unwrap();
        let origin = ChunkKey::new(0, 0);
        step(&mut lc, origin);
        assert_eq!(lc.state(origin), ChunkState::Active);

        let plan = step(&mut lc, ChunkKey::new(3, 0));
        assert_eq!(plan.to_cleanup, vec![origin]);
        assert_eq!(lc.state(origin), ChunkState::Dormant);
        assert!(lc.is_loaded(origin));
    }

    #[test]
    fn loaded_keys_are_never_rerequested() {
        let mut lc = ChunkLifecycle::new(config(1, 8, 12)).unwrap();
        let origin = ChunkKey::new(0, 0);
        step(&mut lc, origin);
        for x in (0..=9).chain((0..9).rev()) {
            let plan = step(&mut lc, ChunkKey::new(x, 0));
            assert!(!plan.to_request.contains(&origin), "re-requested at x={x}");
        }
        assert_eq!(lc.request_count(origin), 1);
        assert_eq!(lc.state(origin), ChunkState::Active);
        assert!(matches!(
            lc.begin_request(origin),
            Err(StreamError::AlreadyLoaded(_))
        ));
    }

    #[test]
    fn dormant_chunks_rehydrate_inside_load_radius() {
        let mut lc = ChunkLifecycle::new(config(1, 3, 6)).unwrap();
        let origin = ChunkKey::new(0, 0);
        step(&mut lc, origin);
        step(&mut lc, ChunkKey::new(4, 0));
        assert_eq!(lc.state(origin), ChunkState::Dormant);

        // Back within cleanup but outside load radius: stays dormant.
        let plan = step(&mut lc, ChunkKey::new(2, 0));
        assert!(!plan.to_rehydrate.contains(&origin));

        let plan = step(&mut lc, ChunkKey::new(1, 0));
        assert!(plan.to_rehydrate.contains(&origin));
        assert!(!plan.to_request.contains(&origin));
        assert_eq!(lc.state(origin), ChunkState::Active);
    }

    #[test]
    fn unload_then_rerequest() {
        let mut lc = ChunkLifecycle::new(config(0, 2, 4)).unwrap();
        let origin = ChunkKey::new(0, 0);
        step(&mut lc, origin);
        step(&mut lc, ChunkKey::new(3, 0));
        let plan = step(&mut lc, ChunkKey::new(5, 0));
        assert_eq!(plan.to_unload, vec![origin]);
        assert!(!lc.is_loaded(origin));
        assert_eq!(lc.state(origin), ChunkState::Unrequested);

        assert_eq!(lc.request_count(origin), 0);

        let before = lc.total_requests();
        let plan = step(&mut lc, origin);
        assert_eq!(plan.to_request, vec![origin]);
        assert_eq!(lc.request_count(origin), 1);
        assert_eq!(lc.total_requests(), before + 1);
    }

    #[test]
    fn bookkeeping_stays_bounded_on_a_long_walk() {
        let mut lc = ChunkLifecycle::new(config(0, 1, 2)).unwrap();
        for x in 0..40 {
            step(&mut lc, ChunkKey::new(x, 0));
        }
        assert_eq!(lc.total_requests(), 40);
        assert_eq!(lc.loaded_chunks().len(), 3);
        assert_eq!(lc.tracked_keys(), 3);
        assert!(lc.states.len() <= 3);
        assert!(lc.visited_chunks().len() <= 3);
    }

    #[test]
    fn active_chunk_past_unload_radius_unloads_without_cleanup() {
        let mut lc = ChunkLifecycle::new(config(0, 2, 4)).unwrap();
        let origin = ChunkKey::new(0, 0);
        step(&mut lc, origin);
        let plan = step(&mut lc, ChunkKey::new(10, 0));
        assert_eq!(plan.to_unload, vec![origin]);
        assert!(plan.to_cleanup.is_empty());
    }

    #[test]
    fn failed_keys_wait_for_the_player_to_leave() {
        let mut lc = ChunkLifecycle::new(config(0, 2, 4)).unwrap();
        let origin = ChunkKey::new(0, 0);
        let plan = lc.update(origin);
        lc.begin_request(plan.to_request[0]).unwrap();
        lc.mark_failed(origin);

        assert!(lc.update(origin).to_request.is_empty());
        assert!(lc.is_failed(origin));
        lc.update(ChunkKey::new(1, 0));
        assert!(!lc.is_failed(origin));
        assert_eq!(lc.update(origin).to_request, vec![origin]);
    }

    #[test]
    fn generation_stages_advance_in_order() {
        let mut lc = ChunkLifecycle::new(config(0, 2, 4)).unwrap();
        let origin = ChunkKey::new(0, 0);
        lc.update(origin);
        lc.begin_request(origin).unwrap();
        assert_eq!(lc.state(origin), ChunkState::TerrainPending);

        // Out of order calls are ignored.
        lc.mark_terrain_ready(ChunkKey::new(5, 5));
        assert_eq!(lc.state(ChunkKey::new(5, 5)), ChunkState::Unrequested);

        lc.mark_terrain_ready(origin);
        assert_eq!(lc.state(origin), ChunkState::TerrainReady);
        assert!(lc.state(origin).is_pending());
        assert_eq!(lc.stats().total_pending, 0);
        lc.update(origin);
        assert_eq!(lc.stats().total_pending, 1);

        lc.mark_vegetation_pending(origin);
        assert_eq!(lc.state(origin), ChunkState::VegetationPending);
        lc.mark_terrain_ready(origin);
        assert_eq!(lc.state(origin), ChunkState::VegetationPending);

        lc.mark_active(origin);
        assert_eq!(lc.state(origin), ChunkState::Active);
        assert!(lc.is_loaded(origin));
    }

    #[test]
    fn cancelled_request_is_eligible_again() {
        let mut lc = ChunkLifecycle::new(config(0, 2, 4)).unwrap();
        let origin = ChunkKey::new(0, 0);
        lc.update(origin);
        lc.begin_request(origin).unwrap();
        assert!(matches!(
            lc.begin_request(origin),
            Err(StreamError::AlreadyPending(_))
        ));
        lc.cancel_request(origin);
        assert_eq!(lc.request_count(origin), 0);
        assert_eq!(lc.update(origin).to_request, vec![origin]);
    }

    #[test]
    fn visits_record_spawn_ticks_and_cleanup_clears_them() {
        let mut cfg = config(1, 3, 6);
        cfg.visit_radius = 1;
        let mut lc = ChunkLifecycle::new(cfg).unwrap();
        let origin = ChunkKey::new(0, 0);
        step(&mut lc, origin);
        let plan = step(&mut lc, origin);
        assert!(plan.newly_visited.contains(&origin));
        assert_eq!(lc.spawn_timestamp(origin), Some(1));
        assert!(lc.visited_chunks().contains(&origin));

        assert!(lc.expired_spawns(5, 10).is_empty());
        assert!(lc.expired_spawns(20, 10).contains(&origin));

        step(&mut lc, ChunkKey::new(4, 0));
        assert!(!lc.visited_chunks().contains(&origin));
        assert_eq!(lc.spawn_timestamp(origin), None);
    }

    #[test]
    fn stats_reflect_last_tick() {
        let mut lc = ChunkLifecycle::new(config(1, 3, 6)).unwrap();
        step(&mut lc, ChunkKey::new(0, 0));
        lc.update(ChunkKey::new(0, 0));
        let stats = lc.stats();
        assert_eq!(stats.requests_this_tick, 0);
        assert_eq!(stats.total_loaded, 9);
        assert_eq!(stats.total_active, 9);
    }
}

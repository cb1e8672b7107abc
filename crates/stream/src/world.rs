use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use glam::Vec3;
use tracing::{debug, info, info_span, warn};
use voxelcore_common::{BlockCoord, BlockKind, ChunkKey, EntityKind};
use voxelcore_ecs::{EntityHandle, EntityPool, PoolEvent};
use voxelcore_kernel::{BlockStore, RemovedBlock, StoreEvent};
use voxelcore_persist::{JsonSettingsStore, MemorySettingsStore, SettingsStore};
use voxelcore_render::{
    BenchmarkReport, BenchmarkTarget, Camera, CullingEngine, CullingUpdate, FrameDriver,
    ProfileManager, RenderTier,
};
use voxelcore_worldgen::{
    ChunkPayload, CoordinatorStats, PlacementKind, PlacementPoint, PollReport, RequestOutcome,
    TerrainGenerator, WorkerCoordinator,
};

use crate::config::EngineConfig;
use crate::error::StreamError;
use crate::lifecycle::{ChunkLifecycle, StreamPlan};

/// Everything generation continuations may touch. Lives on the main thread.
pub struct WorldState {
    store: BlockStore,
    lifecycle: ChunkLifecycle,
    culling: CullingEngine,
    /// Blocks removed at cleanup, restored on rehydration.
    dormant: HashMap<ChunkKey, Vec<RemovedBlock>>,
    placements: HashMap<ChunkKey, Vec<PlacementPoint>>,
}

impl WorldState {
    fn activate(&mut self, payload: ChunkPayload) {
        let key = payload.key();
        let added: Vec<BlockCoord> = payload
            .blocks()
            .into_iter()
            .filter(|(coord, kind)| self.store.add(*coord, *kind))
            .map(|(coord, _)| coord)
            .collect();
        let shown = self.culling.classify(added.iter().copied(), &mut self.store);
        self.placements.insert(key, payload.points);
        self.lifecycle.mark_active(key);
        debug!(%key, blocks = added.len(), shown, "chunk activated");
    }
}

/// What one [`World::tick`] did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub tick: u64,
    pub plan: StreamPlan,
    pub dispatched: usize,
    pub completed: Vec<ChunkKey>,
    pub failed: Vec<ChunkKey>,
    pub spawned: usize,
    pub despawned: usize,
    pub culling: CullingUpdate,
}

/// A running world session. Owns the block store, the chunk lifecycle, the
/// generation workers, culling, render profiles and the entity pool.
pub struct World {
    state: WorldState,
    coordinator: WorkerCoordinator<WorldState>,
    pool: EntityPool,
    camera: Camera,
    profiles: ProfileManager<Box<dyn SettingsStore>>,
    chunk_entities: HashMap<ChunkKey, Vec<EntityHandle>>,
    clock: Duration,
    config: EngineConfig,
}

impl World {
    /// Start a session with settings from `config.settings_dir`, or in memory
    /// when none is configured.
    pub fn new(config: EngineConfig) -> Result<Self, StreamError> {
        let settings: Box<dyn SettingsStore> = match &config.settings_dir {
            Some(dir) => Box::new(JsonSettingsStore::open(dir)?),
            None => Box::new(MemorySettingsStore::new()),
        };
        Self::with_settings(config, settings)
    }

    pub fn with_settings(
        config: EngineConfig,
        settings: Box<dyn SettingsStore>,
    ) -> Result<Self, StreamError> {
        config.generation.validate()?;
        let coordinator = WorkerCoordinator::new(&config.generation)?;
        Self::with_coordinator(config, settings, coordinator)
    }

    /// Assemble a session around an existing coordinator.
    pub fn with_coordinator(
        config: EngineConfig,
        settings: Box<dyn SettingsStore>,
        coordinator: WorkerCoordinator<WorldState>,
    ) -> Result<Self, StreamError> {
        config.generation.validate()?;
        config.culling.validate()?;
        let lifecycle = ChunkLifecycle::new(config.stream.clone())?;
        let mut culling = CullingEngine::new(config.culling.clone());
        let mut profiles = ProfileManager::new(settings);
        let tier = profiles.initialize(&mut culling);

        let spawn = config.spawn_position.unwrap_or_else(|| {
            let ground = TerrainGenerator::new(&config.generation).surface_height(8, 8);
            Vec3::new(8.5, ground as f32 + 2.0, 8.5)
        });
        info!(%tier, x = spawn.x, y = spawn.y, z = spawn.z, "world session started");

        Ok(Self {
            state: WorldState {
                store: BlockStore::with_event_log(),
                lifecycle,
                culling,
                dormant: HashMap::new(),
                placements: HashMap::new(),
            },
            coordinator,
            pool: EntityPool::new(config.pool.clone()),
            camera: Camera::at(spawn),
            profiles,
            chunk_entities: HashMap::new(),
            clock: Duration::ZERO,
            config,
        })
    }

    /// Advance the session by `dt`: absorb finished generation, stream chunks
    /// around the player, manage ambient entities and refresh culling.
    pub fn tick(&mut self, dt: Duration) -> TickReport {
        let _span = info_span!("world_tick", tick = self.state.lifecycle.tick()).entered();
        self.clock += dt;
        let mut report = TickReport {
            tick: self.state.lifecycle.tick(),
            ..TickReport::default()
        };

        let poll = self.coordinator.poll(&mut self.state);
        self.absorb(poll, &mut report);

        let player = ChunkKey::from_world(self.camera.position);
        let plan = self.state.lifecycle.update(player);

        for key in &plan.to_unload {
            self.state.store.remove_chunk(*key);
            self.state.dormant.remove(key);
            self.state.placements.remove(key);
            report.despawned += self.despawn_chunk(*key);
        }
        for key in &plan.to_cleanup {
            let removed = self.state.store.remove_chunk(*key);
            self.state.dormant.insert(*key, removed);
            report.despawned += self.despawn_chunk(*key);
        }
        for key in &plan.to_rehydrate {
            let blocks = self.state.dormant.remove(key).unwrap_or_default();
            let restored = self.state.store.restore(&blocks);
            self.state
                .culling
                .classify(blocks.iter().map(|b| b.coord), &mut self.state.store);
            debug!(%key, restored, "dormant chunk restored");
        }
        for key in &plan.to_request {
            report.dispatched += self.request(*key) as usize;
        }

        for key in &plan.newly_visited {
            report.spawned += self.spawn_animals(*key);
        }
        let now = self.state.lifecycle.tick();
        for key in self
            .state
            .lifecycle
            .expired_spawns(now, self.config.spawn.max_age_ticks)
        {
            report.despawned += self.despawn_chunk(key);
            self.state.lifecycle.clear_spawn(key);
        }

        let (yaw, _) = self.camera.orientation();
        report.culling = self.state.culling.update(
            self.camera.position,
            yaw,
            self.clock,
            &mut self.state.store,
        );
        report.plan = plan;
        report
    }

    fn request(&mut self, key: ChunkKey) -> bool {
        if let Err(err) = self.state.lifecycle.begin_request(key) {
            warn!(%key, %err, "generation request rejected");
            return false;
        }
        let outcome = self.coordinator.request_chunk(
            key,
            Box::new(|state: &mut WorldState, payload: ChunkPayload| state.activate(payload)),
        );
        match outcome {
            RequestOutcome::Dispatched => true,
            RequestOutcome::Coalesced => false,
            RequestOutcome::WorkerUnavailable => {
                self.state.lifecycle.cancel_request(key);
                self.state.lifecycle.mark_failed(key);
                false
            }
        }
    }

    fn absorb(&mut self, poll: PollReport, report: &mut TickReport) {
        for key in &poll.terrain_ready {
            self.state.lifecycle.mark_terrain_ready(*key);
        }
        for key in &poll.vegetation_dispatched {
            self.state.lifecycle.mark_vegetation_pending(*key);
        }
        for (key, err) in poll.failed {
            warn!(%key, %err, "chunk left ungenerated");
            self.state.lifecycle.mark_failed(key);
            report.failed.push(key);
        }
        report.completed.extend(poll.completed);
    }

    /// Block until in-flight generation finishes or `timeout` passes, then
    /// absorb the results. Streaming itself advances only in `tick`.
    pub fn settle(&mut self, timeout: Duration) -> TickReport {
        let mut report = TickReport {
            tick: self.state.lifecycle.tick(),
            ..TickReport::default()
        };
        let poll = self.coordinator.drain_blocking(&mut self.state, timeout);
        self.absorb(poll, &mut report);
        report
    }

    fn spawn_animals(&mut self, key: ChunkKey) -> usize {
        let Some(points) = self.state.placements.get(&key) else {
            return 0;
        };
        let spots: Vec<Vec3> = points
            .iter()
            .filter(|p| matches!(p.kind, PlacementKind::Bush | PlacementKind::Flower))
            .take(self.config.spawn.animals_per_chunk)
            .map(|p| p.coord.center())
            .collect();
        let handles = self.chunk_entities.entry(key).or_default();
        for spot in &spots {
            handles.push(self.pool.acquire(EntityKind::Animal, *spot));
        }
        spots.len()
    }

    fn despawn_chunk(&mut self, key: ChunkKey) -> usize {
        let Some(handles) = self.chunk_entities.remove(&key) else {
            return 0;
        };
        handles
            .into_iter()
            .filter(|h| self.pool.release(*h))
            .count()
    }

    /// Player placement. The new block is classified against current bounds.
    pub fn place_block(&mut self, coord: BlockCoord, kind: BlockKind) -> bool {
        if !self.state.store.place(coord, kind) {
            return false;
        }
        self.state
            .culling
            .classify([coord], &mut self.state.store);
        true
    }

    pub fn remove_block(&mut self, coord: BlockCoord) -> bool {
        self.state.store.remove(coord)
    }

    pub fn set_player_position(&mut self, position: Vec3) {
        self.camera.position = position;
    }

    pub fn player_position(&self) -> Vec3 {
        self.camera.position
    }

    pub fn player_chunk(&self) -> ChunkKey {
        ChunkKey::from_world(self.camera.position)
    }

    /// Switch render tier live and persist it.
    pub fn apply_profile(&mut self, tier: RenderTier) -> Result<(), StreamError> {
        self.profiles
            .apply_profile(tier, &mut self.state.culling)?;
        Ok(())
    }

    pub fn active_profile(&self) -> RenderTier {
        self.profiles.active()
    }

    /// Stress the current scene and recommend a tier. Does not apply it.
    pub fn run_benchmark(
        &mut self,
        duration: Duration,
        driver: &mut dyn FrameDriver,
        cancel: Option<&AtomicBool>,
    ) -> BenchmarkReport {
        voxelcore_render::run_benchmark(
            BenchmarkTarget {
                store: &mut self.state.store,
                camera: &mut self.camera,
                culling: &mut self.state.culling,
            },
            driver,
            duration,
            cancel,
        )
    }

    pub fn block_count(&self) -> usize {
        self.state.store.count()
    }

    pub fn is_solid(&self, coord: BlockCoord) -> bool {
        self.state.store.is_solid(coord)
    }

    pub fn loaded_chunk_count(&self) -> usize {
        self.state.lifecycle.loaded_chunks().len()
    }

    pub fn placements(&self, key: ChunkKey) -> Option<&[PlacementPoint]> {
        self.state.placements.get(&key).map(Vec::as_slice)
    }

    pub fn entities_in(&self, key: ChunkKey) -> &[EntityHandle] {
        self.chunk_entities
            .get(&key)
            .map_or(&[], Vec::as_slice)
    }

    pub fn store(&self) -> &BlockStore {
        &self.state.store
    }

    pub fn lifecycle(&self) -> &ChunkLifecycle {
        &self.state.lifecycle
    }

    pub fn culling(&self) -> &CullingEngine {
        &self.state.culling
    }

    pub fn culling_mut(&mut self) -> &mut CullingEngine {
        &mut self.state.culling
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn pool(&self) -> &EntityPool {
        &self.pool
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn coordinator_stats(&self) -> CoordinatorStats {
        self.coordinator.stats()
    }

    pub fn pending_requests(&self) -> usize {
        self.coordinator.pending_count()
    }

    pub fn is_degraded(&self) -> bool {
        self.coordinator.is_degraded()
    }

    pub fn clock(&self) -> Duration {
        self.clock
    }

    /// Renderer-facing handle changes since the last drain.
    pub fn drain_store_events(&mut self) -> Vec<StoreEvent> {
        self.state.store.drain_events()
    }

    /// Scene attach/detach changes since the last drain.
    pub fn drain_pool_events(&mut self) -> Vec<PoolEvent> {
        self.pool.drain_events()
    }

    /// Stop both generation workers. Pending chunks are abandoned.
    pub fn shutdown(&mut self) {
        self.coordinator.shutdown();
    }
}

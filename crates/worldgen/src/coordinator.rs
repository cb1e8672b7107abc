use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};
use voxelcore_common::ChunkKey;

use crate::config::GenConfig;
use crate::error::GenError;
use crate::payload::ChunkPayload;
use crate::terrain::{TerrainData, TerrainGenerator};
use crate::vegetation::{PlacementPoint, VegetationGenerator};
use crate::worker::Worker;

/// Terrain generation run on the terrain worker thread.
pub type TerrainFn = Box<dyn FnMut(ChunkKey) -> Result<TerrainData, GenError> + Send>;
/// Vegetation placement run on the vegetation worker thread.
pub type VegetationFn = Box<dyn FnMut(&TerrainData) -> Result<Vec<PlacementPoint>, GenError> + Send>;
/// Continuation run on the polling thread once a chunk is fully generated.
pub type OnReady<Ctx> = Box<dyn FnOnce(&mut Ctx, ChunkPayload)>;

type TerrainJob = ChunkKey;
type TerrainReply = (ChunkKey, Result<TerrainData, GenError>);
type VegetationJob = (ChunkKey, Arc<TerrainData>);
type VegetationReply = (ChunkKey, Result<Vec<PlacementPoint>, GenError>);

/// Generation stage a pending request is waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Terrain,
    Vegetation,
}

struct PendingRequest<Ctx> {
    stage: Stage,
    /// Terrain result carried into the vegetation stage.
    terrain: Option<Arc<TerrainData>>,
    on_ready: OnReady<Ctx>,
    dispatched_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    Dispatched,
    /// A request for the key is already in flight; nothing was sent.
    Coalesced,
    WorkerUnavailable,
}

/// What one [`WorkerCoordinator::poll`] observed.
#[derive(Debug, Default)]
pub struct PollReport {
    pub terrain_ready: Vec<ChunkKey>,
    /// Keys whose terrain was handed to the vegetation worker.
    pub vegetation_dispatched: Vec<ChunkKey>,
    pub completed: Vec<ChunkKey>,
    pub failed: Vec<(ChunkKey, GenError)>,
}

impl PollReport {
    pub fn is_empty(&self) -> bool {
        self.terrain_ready.is_empty()
            && self.vegetation_dispatched.is_empty()
            && self.completed.is_empty()
            && self.failed.is_empty()
    }

    fn merge(&mut self, other: PollReport) {
        self.terrain_ready.extend(other.terrain_ready);
        self.vegetation_dispatched
            .extend(other.vegetation_dispatched);
        self.completed.extend(other.completed);
        self.failed.extend(other.failed);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoordinatorStats {
    pub dispatched: u64,
    pub coalesced: u64,
    pub rejected: u64,
    pub completed: u64,
    pub failed: u64,
}

/// Routes chunk requests through the terrain worker, then the vegetation
/// worker, and hands the combined payload to the requester's continuation.
///
/// `Ctx` is whatever the main loop owns; continuations get `&mut Ctx` during
/// [`poll`](Self::poll) on the main thread, so no state is shared with the
/// workers.
pub struct WorkerCoordinator<Ctx> {
    terrain: Worker<TerrainJob, TerrainReply>,
    vegetation: Worker<VegetationJob, VegetationReply>,
    pending: HashMap<ChunkKey, PendingRequest<Ctx>>,
    terrain_down: bool,
    vegetation_down: bool,
    degraded: bool,
    shut_down: bool,
    stats: CoordinatorStats,
}

impl<Ctx> WorkerCoordinator<Ctx> {
    /// Start both workers with the seeded generators for `config`.
    pub fn new(config: &GenConfig) -> Result<Self, GenError> {
        config.validate()?;
        let terrain = TerrainGenerator::new(config);
        let vegetation = VegetationGenerator::new(config);
        info!(seed = config.seed, "starting generation workers");
        Self::with_generators(
            Box::new(move |key| terrain.generate(key)),
            Box::new(move |data| vegetation.generate(data)),
        )
    }

    pub fn with_generators(
        mut terrain_fn: TerrainFn,
        mut vegetation_fn: VegetationFn,
    ) -> Result<Self, GenError> {
        let terrain = Worker::spawn("terrain", move |key: TerrainJob| (key, terrain_fn(key)))?;
        let vegetation = Worker::spawn("vegetation", move |(key, data): VegetationJob| {
            (key, vegetation_fn(&data))
        })?;
        Ok(Self {
            terrain,
            vegetation,
            pending: HashMap::new(),
            terrain_down: false,
            vegetation_down: false,
            degraded: false,
            shut_down: false,
            stats: CoordinatorStats::default(),
        })
    }

    pub fn request_chunk(&mut self, key: ChunkKey, on_ready: OnReady<Ctx>) -> RequestOutcome {
        if self.pending.contains_key(&key) {
            self.stats.coalesced += 1;
            debug!(%key, "request coalesced");
            return RequestOutcome::Coalesced;
        }
        if self.shut_down || !self.workers_available() {
            self.stats.rejected += 1;
            return RequestOutcome::WorkerUnavailable;
        }
        if let Err(err) = self.terrain.send(key) {
            warn!(%key, %err, "terrain dispatch failed");
            self.terrain_down = true;
            self.degraded = true;
            self.stats.rejected += 1;
            return RequestOutcome::WorkerUnavailable;
        }
        self.pending.insert(
            key,
            PendingRequest {
                stage: Stage::Terrain,
                terrain: None,
                on_ready,
                dispatched_at: Instant::now(),
            },
        );
        self.stats.dispatched += 1;
        debug!(%key, "terrain requested");
        RequestOutcome::Dispatched
    }

    /// Drain both workers without blocking and run continuations for every
    /// chunk whose vegetation finished.
    pub fn poll(&mut self, ctx: &mut Ctx) -> PollReport {
        let mut report = PollReport::default();
        if self.shut_down {
            return report;
        }

        loop {
            match self.terrain.try_recv() {
                Ok(Some((key, result))) => self.on_terrain(key, result, &mut report),
                Ok(None) => break,
                Err(err) => {
                    if !self.terrain_down {
                        self.terrain_down = true;
                        self.fail_stage(Stage::Terrain, err, &mut report);
                    }
                    break;
                }
            }
        }

        loop {
            match self.vegetation.try_recv() {
                Ok(Some((key, result))) => self.on_vegetation(key, result, ctx, &mut report),
                Ok(None) => break,
                Err(err) => {
                    if !self.vegetation_down {
                        self.vegetation_down = true;
                        self.fail_stage(Stage::Vegetation, err, &mut report);
                    }
                    break;
                }
            }
        }
        report
    }

    fn on_terrain(
        &mut self,
        key: ChunkKey,
        result: Result<TerrainData, GenError>,
        report: &mut PollReport,
    ) {
        let Some(pending) = self.pending.get_mut(&key) else {
            debug!(%key, "terrain reply without pending request");
            return;
        };
        if pending.stage != Stage::Terrain {
            debug!(%key, "terrain reply for a request past that stage");
            return;
        }
        let data = match result {
            Ok(data) => Arc::new(data),
            Err(err) => {
                self.fail(key, err, report);
                return;
            }
        };
        report.terrain_ready.push(key);
        if self.vegetation_down {
            self.fail(key, GenError::WorkerUnavailable(self.vegetation.name()), report);
            return;
        }
        if let Err(err) = self.vegetation.send((key, Arc::clone(&data))) {
            self.vegetation_down = true;
            self.degraded = true;
            self.fail(key, err, report);
            return;
        }
        pending.stage = Stage::Vegetation;
        pending.terrain = Some(data);
        report.vegetation_dispatched.push(key);
        debug!(%key, "vegetation requested");
    }

    fn on_vegetation(
        &mut self,
        key: ChunkKey,
        result: Result<Vec<PlacementPoint>, GenError>,
        ctx: &mut Ctx,
        report: &mut PollReport,
    ) {
        let is_vegetation = self
            .pending
            .get(&key)
            .is_some_and(|p| p.stage == Stage::Vegetation);
        if !is_vegetation {
            debug!(%key, "vegetation reply without pending request");
            return;
        }
        let points = match result {
            Ok(points) => points,
            Err(err) => {
                self.fail(key, err, report);
                return;
            }
        };
        let Some(PendingRequest {
            terrain: Some(terrain),
            on_ready,
            dispatched_at,
            ..
        }) = self.pending.remove(&key)
        else {
            return;
        };
        let terrain = Arc::try_unwrap(terrain).unwrap_or_else(|shared| (*shared).clone());
        let payload = ChunkPayload { terrain, points };
        on_ready(ctx, payload);
        self.stats.completed += 1;
        report.completed.push(key);
        debug!(%key, elapsed_ms = dispatched_at.elapsed().as_millis() as u64, "chunk generated");
    }

    fn fail(&mut self, key: ChunkKey, err: GenError, report: &mut PollReport) {
        self.pending.remove(&key);
        self.stats.failed += 1;
        warn!(%key, %err, "chunk generation failed");
        report.failed.push((key, err));
    }

    /// A worker went away: every key waiting on it fails.
    fn fail_stage(&mut self, stage: Stage, err: GenError, report: &mut PollReport) {
        self.degraded = true;
        warn!(?stage, %err, "generation worker lost");
        let name = match stage {
            Stage::Terrain => self.terrain.name(),
            Stage::Vegetation => self.vegetation.name(),
        };
        let mut keys: Vec<ChunkKey> = self
            .pending
            .iter()
            .filter(|(_, p)| p.stage == stage)
            .map(|(k, _)| *k)
            .collect();
        keys.sort();
        for key in keys {
            self.fail(key, GenError::WorkerDisconnected(name), report);
        }
    }

    /// Both stages can still take work. A chunk needs both, so losing either
    /// worker stops new dispatches.
    fn workers_available(&self) -> bool {
        !self.terrain_down
            && !self.vegetation_down
            && self.terrain.is_running()
            && self.vegetation.is_running()
    }

    /// Poll until nothing is pending or `timeout` elapses.
    pub fn drain_blocking(&mut self, ctx: &mut Ctx, timeout: Duration) -> PollReport {
        let start = Instant::now();
        let mut report = self.poll(ctx);
        while !self.pending.is_empty() && start.elapsed() < timeout {
            thread::sleep(Duration::from_millis(1));
            report.merge(self.poll(ctx));
        }
        report
    }

    /// Terminate and join both workers. Pending requests are dropped without
    /// running their continuations.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        self.terrain.terminate();
        self.vegetation.terminate();
        if !self.pending.is_empty() {
            debug!(dropped = self.pending.len(), "pending requests dropped at shutdown");
        }
        self.pending.clear();
        info!("generation workers shut down");
    }

    pub fn is_pending(&self, key: ChunkKey) -> bool {
        self.pending.contains_key(&key)
    }

    pub fn pending_stage(&self, key: ChunkKey) -> Option<Stage> {
        self.pending.get(&key).map(|p| p.stage)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Age of the longest-waiting request.
    pub fn oldest_pending(&self) -> Option<Duration> {
        self.pending.values().map(|p| p.dispatched_at.elapsed()).max()
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    pub fn stats(&self) -> CoordinatorStats {
        self.stats
    }
}

impl<Ctx> Drop for WorkerCoordinator<Ctx> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

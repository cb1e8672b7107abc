use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::{info, info_span};
use voxelcore_common::{BlockCoord, BlockKind};
use voxelcore_kernel::BlockStore;

use crate::camera::Camera;
use crate::culling::CullingEngine;
use crate::profile::RenderTier;

/// Shortest frame the benchmark will account for, so a driver reporting
/// zero-length frames still advances the run.
const MIN_FRAME: Duration = Duration::from_millis(1);

const RING_RADIUS: i32 = 12;
const TOWER_OFFSET: i32 = 8;
const TOWER_HEIGHT: i32 = 10;

/// Ring buffer of recent frame times.
#[derive(Debug)]
pub struct FrameTimer {
    history: Vec<Duration>,
    capacity: usize,
    index: usize,
    filled: bool,
}

impl FrameTimer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            history: vec![Duration::ZERO; capacity],
            capacity,
            index: 0,
            filled: false,
        }
    }

    pub fn record(&mut self, dt: Duration) {
        self.history[self.index] = dt;
        self.index = (self.index + 1) % self.capacity;
        if self.index == 0 {
            self.filled = true;
        }
    }

    fn samples(&self) -> &[Duration] {
        &self.history[..self.count()]
    }

    pub fn average(&self) -> Duration {
        let count = self.count();
        if count == 0 {
            return Duration::ZERO;
        }
        self.samples().iter().sum::<Duration>() / count as u32
    }

    pub fn max(&self) -> Duration {
        self.samples().iter().copied().max().unwrap_or(Duration::ZERO)
    }

    pub fn min(&self) -> Duration {
        self.samples().iter().copied().min().unwrap_or(Duration::ZERO)
    }

    pub fn count(&self) -> usize {
        if self.filled {
            self.capacity
        } else {
            self.index
        }
    }

    /// Frames per second from the average frame time, if any were recorded.
    pub fn fps(&self) -> Option<f32> {
        let avg = self.average().as_secs_f32();
        (self.count() > 0 && avg > 0.0).then(|| 1.0 / avg)
    }
}

/// Renders one benchmark frame and reports how long it took.
///
/// Returning `ControlFlow::Break` aborts the run.
pub trait FrameDriver {
    fn frame(&mut self, store: &BlockStore, camera: &Camera) -> ControlFlow<(), Duration>;
}

/// Renders nothing; frame time is the wall-clock time between calls, which
/// covers the culling work done for each frame.
#[derive(Debug, Default)]
pub struct NullFrameDriver {
    last: Option<Instant>,
}

impl FrameDriver for NullFrameDriver {
    fn frame(&mut self, _store: &BlockStore, _camera: &Camera) -> ControlFlow<(), Duration> {
        let now = Instant::now();
        let dt = self.last.map_or(Duration::ZERO, |last| now - last);
        self.last = Some(now);
        ControlFlow::Continue(dt)
    }
}

/// What the benchmark operates on.
pub struct BenchmarkTarget<'a> {
    pub store: &'a mut BlockStore,
    pub camera: &'a mut Camera,
    pub culling: &'a mut CullingEngine,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkReport {
    pub frames: usize,
    pub average_fps: Option<f32>,
    pub worst_frame: Duration,
    pub best_frame: Duration,
    pub synthetic_blocks: usize,
    pub aborted: bool,
    pub recommended: RenderTier,
}

/// Tier for a measured frame rate; no measurement means `balanced`.
pub fn recommend_tier(fps: Option<f32>) -> RenderTier {
    match fps {
        Some(f) if f >= 55.0 => RenderTier::Quality,
        Some(f) if f >= 30.0 => RenderTier::Balanced,
        Some(_) => RenderTier::Minimal,
        None => RenderTier::Balanced,
    }
}

/// Stress culling with synthetic structures while spinning the camera once
/// around over `duration`, then recommend a tier.
///
/// Synthetic blocks go only where nothing exists and are all removed again;
/// the camera orientation is restored. Both hold on early abort too.
pub fn run_benchmark(
    target: BenchmarkTarget<'_>,
    driver: &mut dyn FrameDriver,
    duration: Duration,
    cancel: Option<&AtomicBool>,
) -> BenchmarkReport {
    let _span = info_span!("benchmark", secs = duration.as_secs_f32()).entered();
    let BenchmarkTarget {
        store,
        camera,
        culling,
    } = target;

    let saved = camera.orientation();
    let synthetic = spawn_structures(store, BlockCoord::from_world(camera.position));
    culling.classify(synthetic.iter().copied(), store);
    info!(blocks = synthetic.len(), "synthetic structures placed");

    let mut timer = FrameTimer::new(1024);
    let mut frames = 0;
    let mut elapsed = Duration::ZERO;
    let mut aborted = false;
    while elapsed < duration {
        if cancel.is_some_and(|c| c.load(Ordering::Relaxed)) {
            aborted = true;
            break;
        }
        let turn = elapsed.as_secs_f32() / duration.as_secs_f32();
        camera.yaw = saved.0 + std::f32::consts::TAU * turn;
        culling.force_scan(camera.position, camera.yaw, store);

        match driver.frame(store, camera) {
            ControlFlow::Continue(dt) => {
                let dt = dt.max(MIN_FRAME);
                timer.record(dt);
                frames += 1;
                elapsed += dt;
            }
            ControlFlow::Break(()) => {
                aborted = true;
                break;
            }
        }
    }

    for coord in &synthetic {
        store.remove(*coord);
    }
    camera.set_orientation(saved);
    culling.force_scan(camera.position, camera.yaw, store);

    let average_fps = timer.fps();
    let report = BenchmarkReport {
        frames,
        average_fps,
        worst_frame: timer.max(),
        best_frame: timer.min(),
        synthetic_blocks: synthetic.len(),
        aborted,
        recommended: recommend_tier(average_fps),
    };
    info!(
        frames = report.frames,
        fps = report.average_fps.unwrap_or(0.0),
        recommended = %report.recommended,
        aborted,
        "benchmark finished"
    );
    report
}

/// A ring at the player's feet plus four towers. Returns only the
/// coordinates that were actually added.
fn spawn_structures(store: &mut BlockStore, center: BlockCoord) -> Vec<BlockCoord> {
    let mut candidates = Vec::new();
    let r_sq = RING_RADIUS * RING_RADIUS;
    for dz in -RING_RADIUS..=RING_RADIUS {
        for dx in -RING_RADIUS..=RING_RADIUS {
            let d_sq = dx * dx + dz * dz;
            if (r_sq - RING_RADIUS..=r_sq + RING_RADIUS).contains(&d_sq) {
                candidates.push(center.offset(dx, -1, dz));
            }
        }
    }
    for (sx, sz) in [(1, 1), (1, -1), (-1, 1), (-1, -1)] {
        for dy in 0..TOWER_HEIGHT {
            candidates.push(center.offset(sx * TOWER_OFFSET, dy, sz * TOWER_OFFSET));
        }
    }
    candidates
        .into_iter()
        .filter(|c| store.add(*c, BlockKind::Stone))
        .collect()
}

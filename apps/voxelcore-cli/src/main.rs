use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use glam::Vec3;
use tracing_subscriber::EnvFilter;
use voxelcore_common::{CHUNK_SIZE, WORLD_HEIGHT};
use voxelcore_render::NullFrameDriver;
use voxelcore_stream::{EngineConfig, World};
use voxelcore_tools::{DebugConsole, WorldInspector};

const TICK: Duration = Duration::from_millis(16);
const SETTLE: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(name = "voxelcore-cli", about = "Headless driver for the voxelcore engine")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Engine config file (.yaml, .yml or .json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the world seed
    #[arg(long, global = true)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print engine version and the effective configuration, including the
    /// culling parameters set by the active render profile
    Info,
    /// Walk the player along +X, streaming chunks as it goes
    Walk {
        /// Distance to walk, in chunks
        #[arg(short, long, default_value = "12")]
        chunks: i32,
        /// Walk back to the start afterwards
        #[arg(short, long)]
        back: bool,
        /// Ticks spent in each chunk
        #[arg(short, long, default_value = "4")]
        ticks_per_chunk: u32,
    },
    /// Stream the spawn area, run the render benchmark and print the result
    Benchmark {
        /// Benchmark duration in seconds
        #[arg(short, long, default_value = "5")]
        seconds: f32,
        /// Apply and persist the recommended profile
        #[arg(short, long)]
        apply: bool,
    },
    /// Read debug console commands from stdin
    Console,
}

fn load_config(cli: &Cli) -> anyhow::Result<EngineConfig> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    if let Some(seed) = cli.seed {
        config.generation.seed = seed;
    }
    Ok(config)
}

/// Stream the area around the player until generation catches up.
fn warm_up(world: &mut World) {
    world.tick(TICK);
    world.settle(SETTLE);
    world.tick(TICK);
}

fn chunk_center(x: i32, y: f32) -> Vec3 {
    let half = CHUNK_SIZE as f32 / 2.0;
    Vec3::new((x * CHUNK_SIZE) as f32 + half, y, half)
}

fn walk(world: &mut World, chunks: i32, back: bool, ticks_per_chunk: u32) {
    let y = world.player_position().y;
    let mut path: Vec<i32> = (0..=chunks).collect();
    if back {
        path.extend((0..chunks).rev());
    }

    let mut store_events = 0;
    for x in path {
        world.set_player_position(chunk_center(x, y));
        for _ in 0..ticks_per_chunk {
            let report = world.tick(TICK);
            if !report.failed.is_empty() {
                tracing::warn!(failed = report.failed.len(), "chunks failed to generate");
            }
        }
        world.settle(SETTLE);
        world.tick(TICK);
        store_events += world.drain_store_events().len();
        world.drain_pool_events();

        let stats = world.lifecycle().stats();
        println!(
            "x={x:>3} loaded={:>3} active={:>3} dormant={:>3} blocks={:>7} rendered={:>7}",
            stats.total_loaded,
            stats.total_active,
            stats.total_dormant,
            world.block_count(),
            world.store().rendered_count()
        );
    }
    println!("\n{}", WorldInspector::summary(world));
    println!("render handle events: {store_events}");
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    let config = load_config(&cli)?;

    match cli.command {
        Commands::Info => {
            println!("voxelcore-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("chunk size: {CHUNK_SIZE}, world height: {WORLD_HEIGHT}");
            println!(
                "radii: load={} cleanup={} unload={} visit={}",
                config.stream.load_radius,
                config.stream.cleanup_radius,
                config.stream.unload_radius,
                config.stream.visit_radius
            );
            println!(
                "generation: seed={} base_height={} water_level={}",
                config.generation.seed,
                config.generation.biome.base_height,
                config.generation.biome.water_level
            );
            let mut world = World::new(config).context("starting world")?;
            let culling = world.culling().config().clone();
            println!(
                "culling ({} profile): vertical={} adaptive={} depth={} cap={} rays={} @ {} Hz, range={}",
                world.active_profile(),
                culling.vertical_enabled,
                culling.adaptive_enabled,
                culling.underground_depth,
                culling
                    .aboveground_height
                    .map_or_else(|| "none".to_string(), |h| h.to_string()),
                culling.ray_count,
                culling.scan_hz,
                culling.ray_range
            );
            world.shutdown();
        }
        Commands::Walk {
            chunks,
            back,
            ticks_per_chunk,
        } => {
            anyhow::ensure!(chunks >= 0, "chunks must not be negative");
            let mut world = World::new(config).context("starting world")?;
            println!("Walking {chunks} chunks{}", if back { " and back" } else { "" });
            walk(&mut world, chunks, back, ticks_per_chunk.max(1));
            world.shutdown();
        }
        Commands::Benchmark { seconds, apply } => {
            anyhow::ensure!(
                seconds.is_finite() && seconds >= 0.0,
                "seconds must be a non-negative number"
            );
            let mut world = World::new(config).context("starting world")?;
            warm_up(&mut world);
            let report = world.run_benchmark(
                Duration::from_secs_f32(seconds),
                &mut NullFrameDriver::default(),
                None,
            );
            println!(
                "Benchmark: {} frames, avg fps {}, best {:?}, worst {:?}, synthetic blocks {}",
                report.frames,
                report
                    .average_fps
                    .map_or_else(|| "n/a".to_string(), |f| format!("{f:.1}")),
                report.best_frame,
                report.worst_frame,
                report.synthetic_blocks
            );
            println!("Recommended profile: {}", report.recommended);
            if apply {
                world
                    .apply_profile(report.recommended)
                    .context("persisting render profile")?;
                println!("Applied profile: {}", world.active_profile());
            }
            world.shutdown();
        }
        Commands::Console => {
            let mut world = World::new(config).context("starting world")?;
            warm_up(&mut world);
            let mut console = DebugConsole::new();
            println!("voxelcore console; type `help` for commands, EOF to quit");

            let stdin = io::stdin();
            let mut stdout = io::stdout();
            for line in stdin.lock().lines() {
                let line = line.context("reading stdin")?;
                match console.execute(&line, &mut world) {
                    Ok(out) => out.iter().for_each(|l| println!("{l}")),
                    Err(err) => println!("error: {err}"),
                }
                world.tick(TICK);
                stdout.flush().ok();
            }
            world.shutdown();
        }
    }

    Ok(())
}

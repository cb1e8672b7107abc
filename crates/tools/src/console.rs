use std::collections::VecDeque;
use std::str::FromStr;
use std::time::Duration;

use voxelcore_render::{NullFrameDriver, ParseTierError, RenderTier};
use voxelcore_stream::{StreamError, World};

use crate::inspector::WorldInspector;

const MAX_LOG_LINES: usize = 96;
const MAX_BENCHMARK_SECS: f32 = 120.0;

#[derive(Debug, thiserror::Error)]
pub enum ConsoleError {
    #[error("unknown command {0:?}; try `help`")]
    UnknownCommand(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error(transparent)]
    Profile(#[from] ParseTierError),
    #[error("invalid duration {0:?}")]
    Duration(String),
    #[error(transparent)]
    World(#[from] StreamError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullingMode {
    Vertical,
    Adaptive,
}

/// A parsed console line.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Culling { mode: CullingMode, enabled: bool },
    Profile(RenderTier),
    Benchmark(Duration),
    Report,
    Help,
}

const CULLING_USAGE: &str = "culling vertical|adaptive on|off";

impl FromStr for ConsoleCommand {
    type Err = ConsoleError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let line = line.strip_prefix('/').unwrap_or(line);
        let mut parts = line.split_whitespace();
        let Some(name) = parts.next() else {
            return Err(ConsoleError::Usage("help"));
        };
        let args: Vec<&str> = parts.collect();

        match name.to_ascii_lowercase().as_str() {
            "help" | "?" => Ok(Self::Help),
            "report" | "status" => Ok(Self::Report),
            "culling" => {
                let [mode, state] = args.as_slice() else {
                    return Err(ConsoleError::Usage(CULLING_USAGE));
                };
                let mode = match mode.to_ascii_lowercase().as_str() {
                    "vertical" => CullingMode::Vertical,
                    "adaptive" => CullingMode::Adaptive,
                    _ => return Err(ConsoleError::Usage(CULLING_USAGE)),
                };
                let enabled = match state.to_ascii_lowercase().as_str() {
                    "on" | "true" | "1" => true,
                    "off" | "false" | "0" => false,
                    _ => return Err(ConsoleError::Usage(CULLING_USAGE)),
                };
                Ok(Self::Culling { mode, enabled })
            }
            "profile" => match args.as_slice() {
                [tier] => Ok(Self::Profile(tier.parse()?)),
                _ => Err(ConsoleError::Usage("profile minimal|balanced|quality|disabled")),
            },
            "benchmark" => {
                let raw = args.first().copied().unwrap_or("5");
                let secs: f32 = raw
                    .parse()
                    .map_err(|_| ConsoleError::Duration(raw.to_string()))?;
                if !(0.0..=MAX_BENCHMARK_SECS).contains(&secs) {
                    return Err(ConsoleError::Duration(raw.to_string()));
                }
                Ok(Self::Benchmark(Duration::from_secs_f32(secs)))
            }
            other => Err(ConsoleError::UnknownCommand(other.to_string())),
        }
    }
}

/// Text console driving a [`World`]. Keeps a bounded scrollback.
#[derive(Debug, Default)]
pub struct DebugConsole {
    log: VecDeque<String>,
}

impl DebugConsole {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> impl Iterator<Item = &str> {
        self.log.iter().map(String::as_str)
    }

    /// Parse and run one line. Output and errors are appended to the log and
    /// the output lines are returned.
    pub fn execute(&mut self, line: &str, world: &mut World) -> Result<Vec<String>, ConsoleError> {
        if line.trim().is_empty() {
            return Ok(Vec::new());
        }
        self.push(format!("> {}", line.trim()));
        let result = line
            .parse::<ConsoleCommand>()
            .and_then(|cmd| Self::run(cmd, world));
        match &result {
            Ok(lines) => lines.iter().for_each(|l| self.push(l.clone())),
            Err(err) => self.push(format!("error: {err}")),
        }
        result
    }

    fn run(cmd: ConsoleCommand, world: &mut World) -> Result<Vec<String>, ConsoleError> {
        tracing::debug!(?cmd, "console command");
        let out = match cmd {
            ConsoleCommand::Help => vec![
                "Commands:".to_string(),
                format!("  {CULLING_USAGE}"),
                "  profile minimal|balanced|quality|disabled".to_string(),
                "  benchmark [seconds]".to_string(),
                "  report".to_string(),
            ],
            ConsoleCommand::Report => {
                let culling = world.culling().stats();
                let generation = world.coordinator_stats();
                let mut lines: Vec<String> = WorldInspector::summary(world)
                    .to_string()
                    .lines()
                    .map(str::to_string)
                    .collect();
                lines.push(format!(
                    "Culling: {} recomputes, {} scans, {}/{} rays hit",
                    culling.recomputes, culling.scans, culling.ray_hits, culling.rays_cast
                ));
                lines.push(format!(
                    "Generation: {} dispatched, {} completed, {} failed, {} coalesced, {} rejected",
                    generation.dispatched,
                    generation.completed,
                    generation.failed,
                    generation.coalesced,
                    generation.rejected
                ));
                lines
            }
            ConsoleCommand::Culling { mode, enabled } => {
                let culling = world.culling_mut();
                match mode {
                    CullingMode::Vertical => culling.set_vertical_enabled(enabled),
                    CullingMode::Adaptive => culling.set_adaptive_enabled(enabled),
                }
                vec![format!(
                    "{} culling {}",
                    match mode {
                        CullingMode::Vertical => "vertical",
                        CullingMode::Adaptive => "adaptive",
                    },
                    if enabled { "on" } else { "off" }
                )]
            }
            ConsoleCommand::Profile(tier) => {
                world.apply_profile(tier)?;
                vec![format!("render profile set to {tier}")]
            }
            ConsoleCommand::Benchmark(duration) => {
                let report = world.run_benchmark(duration, &mut NullFrameDriver::default(), None);
                let fps = report
                    .average_fps
                    .map_or_else(|| "n/a".to_string(), |f| format!("{f:.1}"));
                vec![
                    format!(
                        "Benchmark: {} frames, avg fps {fps}, worst {:?}{}",
                        report.frames,
                        report.worst_frame,
                        if report.aborted { " (aborted)" } else { "" }
                    ),
                    format!(
                        "Recommended profile: {} (apply with `profile {}`)",
                        report.recommended, report.recommended
                    ),
                ]
            }
        };
        Ok(out)
    }

    fn push(&mut self, line: String) {
        if self.log.len() == MAX_LOG_LINES {
            self.log.pop_front();
        }
        self.log.push_back(line);
    }
}

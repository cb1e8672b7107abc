use anyhow::Result;
use clap::{Parser, Subcommand};
use std::process::Command;

#[derive(Parser)]
#[command(name = "xtask", about = "Workspace automation for voxelcore")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// fmt, clippy and tests, stopping at the first failure
    Check,
    /// Run all workspace tests
    Test,
    /// Run the chunk lifecycle bench
    Bench,
    /// Walk the headless CLI out and back as an end-to-end smoke test
    Smoke {
        /// Chunks to walk in each direction
        #[arg(short, long, default_value = "10")]
        chunks: u32,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check => {
            cargo("fmt", &["fmt", "--all", "--", "--check"])?;
            cargo(
                "clippy",
                &["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"],
            )?;
            cargo("test", &["test", "--workspace"])?;
        }
        Commands::Test => cargo("test", &["test", "--workspace"])?,
        Commands::Bench => cargo(
            "bench",
            &["bench", "-p", "voxelcore-stream", "--bench", "bench_lifecycle"],
        )?,
        Commands::Smoke { chunks } => {
            let chunks = chunks.to_string();
            cargo(
                "smoke walk",
                &[
                    "run", "-p", "voxelcore-cli", "--", "walk", "--chunks", &chunks, "--back",
                ],
            )?;
        }
    }

    Ok(())
}

fn cargo(label: &str, args: &[&str]) -> Result<()> {
    println!("==> cargo {}", args.join(" "));
    let status = Command::new("cargo").args(args).status()?;
    if !status.success() {
        anyhow::bail!("{label} failed ({status})");
    }
    Ok(())
}

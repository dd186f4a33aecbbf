#![doc = include_str!("../README.md")]

mod commands;
mod config;
mod telemetry;

use clap::Parser;
use commands::Command;
use config::CliArgs;
use seedmint::EngineConfig;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// Inspect and maintain a seedmint job store.
#[derive(Parser, Debug)]
#[command(name = "seedmint", version, about)]
struct Cli {
    #[command(flatten)]
    config: CliArgs,

    #[command(subcommand)]
    command: Command,
}

fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    let config = EngineConfig::try_from(cli.config)?;

    telemetry::init_tracing()?;
    tracing::debug!("Effective configuration: {config:?}");

    let stdout = std::io::stdout();
    commands::run(&cli.command, &config, &mut stdout.lock())
}

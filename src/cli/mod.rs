//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了CLI命令行接口。

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "multiflight")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[arg(long, global = true, help = "Emit logs as JSON")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        name = "stress",
        about = "Run concurrent overlapping batch loads against one group"
    )]
    Stress(StressArgs),

    #[command(name = "validate", about = "Validate a group configuration file")]
    Validate(ValidateArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct StressArgs {
    #[arg(short, long, default_value_t = 1000, help = "Number of concurrent workers")]
    pub workers: usize,

    #[arg(short, long, default_value_t = 5, help = "Sequential batches per worker")]
    pub loops: usize,

    #[arg(short, long, default_value_t = 20, help = "Keys per batch")]
    pub batch_size: usize,

    #[arg(short, long, default_value_t = 500, help = "Size of the key pool")]
    pub keys: usize,

    #[arg(long, default_value_t = 20, help = "Upper bound of the simulated loader latency (ms)")]
    pub max_sleep_ms: u64,

    #[arg(short, long, help = "Group configuration file (TOML)")]
    pub config: Option<PathBuf>,

    #[arg(long, help = "Output in JSON format", conflicts_with = "prometheus")]
    pub json: bool,

    #[arg(long, help = "Output in Prometheus format")]
    pub prometheus: bool,
}

#[derive(Parser, Debug)]
pub struct ValidateArgs {
    #[arg(help = "Configuration file to validate; prints the defaults when omitted")]
    pub path: Option<PathBuf>,
}

mod stress;
mod validate;

pub use stress::{run_stress, StressReport};

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    crate::telemetry::init_tracing("multiflight", cli.json_logs);

    let result = match &cli.command {
        Commands::Stress(args) => stress::execute(args).await,
        Commands::Validate(args) => validate::execute(args),
    };

    crate::telemetry::shutdown_tracing();
    result
}

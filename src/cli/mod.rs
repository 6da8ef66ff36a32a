//! CLI module for research-cache
//!
//! Provides subcommands for:
//! - `worker`: run one experiment over the stdio worker protocol
//! - `run`: execute a batch of experiment tasks from a JSON file
//! - `cache`: inspect and maintain the cache registry

pub mod cache;
pub mod run;
pub mod worker;

use clap::{Parser, Subcommand};

use crate::config::AppConfig;
use crate::infrastructure::logging::init_logging;
use crate::infrastructure::observability::{init_metrics, PrometheusMetrics};

/// research-cache - Tiered caching and parallel experiment execution
#[derive(Parser)]
#[command(name = "research-cache")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Read one task from stdin, run it and write the outcome to stdout
    Worker,

    /// Execute a batch of tasks and print the results
    Run(run::RunArgs),

    /// Inspect or maintain the cache registry
    Cache {
        #[command(subcommand)]
        action: cache::CacheAction,
    },
}

/// Loads `.env` and configuration, then installs logging and metrics
pub(crate) fn bootstrap() -> (AppConfig, Option<PrometheusMetrics>) {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().unwrap_or_else(|e| {
        eprintln!("Invalid configuration, using defaults: {}", e);
        AppConfig::default()
    });
    init_logging(&config.logging);
    let metrics = init_metrics(&config.metrics);

    (config, metrics)
}

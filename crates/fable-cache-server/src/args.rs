//! CLI argument definitions using clap

use clap::Parser;
use std::path::PathBuf;

/// Default snapshot file name
pub const DEFAULT_SNAPSHOT_FILE: &str = "fable_cache.json";

#[derive(Debug, Parser)]
#[command(name = "fable-cache-server")]
#[command(about = "Shared story cache for Fable clients")]
#[command(version)]
pub struct Args {
    /// Port to listen on
    #[arg(long, short = 'p', default_value_t = 3001, env = "FABLE_CACHE_PORT")]
    pub port: u16,

    /// Path of the durable snapshot file
    #[arg(long, default_value = DEFAULT_SNAPSHOT_FILE, env = "FABLE_CACHE_SNAPSHOT")]
    pub snapshot_path: PathBuf,

    /// Approximate cache size budget in bytes before eviction kicks in
    #[arg(long, default_value_t = 1024 * 1024 * 1024, env = "FABLE_CACHE_BUDGET_BYTES")]
    pub byte_budget: u64,

    /// Seconds between durable snapshots
    #[arg(long, default_value_t = 60, env = "FABLE_CACHE_SNAPSHOT_INTERVAL")]
    pub snapshot_interval_secs: u64,
}

//! Fable cache server
//!
//! A small HTTP key-value service that acts as the shared remote tier for
//! Fable clients. Entries are evicted oldest-first when a heuristic size
//! estimate exceeds the configured budget, and the full map is snapshotted
//! to disk on a fixed interval.

mod args;
mod persistence;
mod routes;
mod store;

use args::Args;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use store::CacheStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Set RUST_LOG=debug for verbose logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let store = Arc::new(CacheStore::new(args.byte_budget));
    if let Some(snapshot) = persistence::load_snapshot(&args.snapshot_path).await {
        store.restore(snapshot).await;
        tracing::info!(entries = store.len().await, "restored cache from snapshot");
    }

    spawn_snapshot_loop(
        Arc::clone(&store),
        args.snapshot_path.clone(),
        Duration::from_secs(args.snapshot_interval_secs.max(1)),
    );

    let routes = routes::routes(Arc::clone(&store));
    tracing::info!(port = args.port, "cache server listening");
    warp::serve(routes).run(([0, 0, 0, 0], args.port)).await;

    Ok(())
}

/// Snapshot the store on a fixed interval, independent of request traffic.
/// Persistence failures are logged; the store keeps serving from memory.
fn spawn_snapshot_loop(store: Arc<CacheStore>, path: std::path::PathBuf, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick fires immediately; skip it so the initial
        // snapshot lands one interval after startup.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let snapshot = store.snapshot().await;
            if let Err(e) = persistence::save_snapshot(&path, &snapshot).await {
                tracing::warn!(error = %e, "snapshot failed, continuing in-memory");
            }
        }
    });
}

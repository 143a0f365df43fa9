//! Durable snapshotting for the cache store
//!
//! The full key-to-entry map is written as a single JSON object on a fixed
//! interval and reloaded at startup. Load is lenient: a missing or corrupt
//! file yields an empty store, never a startup failure.

use fable_core::error::{FableError, FableResult};
use serde_json::{Map, Value};
use std::path::Path;
use tokio::fs;

/// Load a snapshot file. Returns `None` when the file is absent or
/// unreadable or does not parse as a JSON object.
pub async fn load_snapshot(path: &Path) -> Option<Map<String, Value>> {
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) => {
            tracing::info!(path = %path.display(), error = %e, "no snapshot to load, starting empty");
            return None;
        }
    };

    match serde_json::from_str::<Value>(&content) {
        Ok(Value::Object(map)) => {
            tracing::info!(path = %path.display(), entries = map.len(), "loaded cache snapshot");
            Some(map)
        }
        Ok(_) => {
            tracing::warn!(path = %path.display(), "snapshot is not a JSON object, starting empty");
            None
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "corrupt snapshot, starting empty");
            None
        }
    }
}

/// Write the snapshot map to disk, creating parent directories as needed.
pub async fn save_snapshot(path: &Path, snapshot: &Map<String, Value>) -> FableResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await.map_err(|e| {
                FableError::storage(format!("failed to create snapshot directory: {}", e))
            })?;
        }
    }

    let content = serde_json::to_string(snapshot)?;
    fs::write(path, content)
        .await
        .map_err(|e| FableError::storage(format!("failed to write snapshot: {}", e)))?;

    tracing::debug!(path = %path.display(), entries = snapshot.len(), "saved cache snapshot");
    Ok(())
}

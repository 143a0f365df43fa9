//! Two-tier cache with fallback semantics
//!
//! Reads check the local tier, then the shared remote tier; remote
//! transport failures are misses. Writes land locally and propagate to the
//! remote tier as detached best-effort tasks. No cache-tier failure ever
//! escapes this type.

use crate::cache::key::CacheKey;
use crate::cache::storage::{CacheEntry, CacheStorage, MemoryStorage, RemoteStorage};
use crate::config::CacheConfig;
use crate::error::{FableError, FableResult};
use std::sync::Arc;
use std::time::Duration;

/// Local + shared remote cache.
///
/// Constructed from an injected [`CacheConfig`]; when the remote tier is
/// disabled, remote lookups and writes are skipped entirely.
pub struct TieredCache {
    local: Arc<dyn CacheStorage>,
    remote: Option<Arc<RemoteStorage>>,
}

impl TieredCache {
    pub fn new(config: &CacheConfig) -> FableResult<Self> {
        let local = Arc::new(MemoryStorage::new(
            config.local_capacity,
            config.max_entry_size,
        ));
        let remote = if config.enable_remote_cache {
            Some(Arc::new(RemoteStorage::new(
                config.remote_base_url.clone(),
                Duration::from_secs(config.remote_timeout_secs),
            )?))
        } else {
            None
        };
        Ok(Self { local, remote })
    }

    /// Build a tiered cache over an explicit local backend. Used by tests
    /// to exercise failure policies with instrumented storage.
    pub fn with_local(local: Arc<dyn CacheStorage>, remote: Option<Arc<RemoteStorage>>) -> Self {
        Self { local, remote }
    }

    /// Look up a key, local tier first.
    ///
    /// A remote hit populates the local tier before returning. Failures in
    /// either tier degrade to a miss.
    pub async fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        match self.local.get(key).await {
            Ok(Some(entry)) => {
                tracing::debug!(key = %key, "local cache hit");
                return Some(entry);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "local cache read failed");
            }
        }

        let remote = self.remote.as_ref()?;
        match remote.get(key).await {
            Ok(Some(entry)) => {
                tracing::debug!(key = %key, "remote cache hit");
                self.store_local(key, entry.clone()).await;
                Some(entry)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "remote cache read failed, treating as miss");
                None
            }
        }
    }

    /// Store an entry: local tier synchronously, remote tier as a detached
    /// best-effort write.
    pub async fn set(&self, key: &CacheKey, entry: CacheEntry) {
        self.store_local(key, entry.clone()).await;

        if let Some(remote) = &self.remote {
            let remote = Arc::clone(remote);
            let key = key.clone();
            tokio::spawn(async move {
                if let Err(e) = remote.set(&key, &entry).await {
                    tracing::warn!(key = %key, error = %e, "remote cache write dropped");
                }
            });
        }
    }

    /// Clear the local tier. The remote store is shared across processes
    /// and is left untouched.
    pub async fn reset(&self) {
        if let Err(e) = self.local.clear().await {
            tracing::warn!(error = %e, "failed to clear local cache");
        }
    }

    /// Whether the remote tier is configured
    pub fn remote_enabled(&self) -> bool {
        self.remote.is_some()
    }

    /// Write to the local tier, recovering from a capacity rejection by
    /// clearing the store and retrying once. A second failure drops the
    /// write silently.
    async fn store_local(&self, key: &CacheKey, entry: CacheEntry) {
        match self.local.set(key, entry.clone()).await {
            Ok(()) => {}
            Err(FableError::Capacity { message }) => {
                tracing::warn!(key = %key, %message, "local store full, clearing and retrying");
                if let Err(e) = self.local.clear().await {
                    tracing::warn!(error = %e, "failed to clear local store");
                    return;
                }
                if let Err(e) = self.local.set(key, entry).await {
                    tracing::warn!(key = %key, error = %e, "local cache write dropped after retry");
                }
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "local cache write failed");
            }
        }
    }
}

impl std::fmt::Debug for TieredCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TieredCache")
            .field("remote_enabled", &self.remote.is_some())
            .finish_non_exhaustive()
    }
}

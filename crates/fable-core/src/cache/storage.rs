//! Cache storage tiers
//!
//! The local tier is a bounded in-memory store; the remote tier is an HTTP
//! client for the shared cache server. Entries are opaque JSON values,
//! immutable once stored.

use crate::cache::key::CacheKey;
use crate::cache::protocol::{ApiResponse, PutRequest};
use crate::error::{FableError, FableResult};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::Mutex;

/// An opaque cached payload
pub type CacheEntry = serde_json::Value;

/// Local storage backend interface
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Get a cache entry
    async fn get(&self, key: &CacheKey) -> FableResult<Option<CacheEntry>>;

    /// Set a cache entry. May fail with [`FableError::Capacity`] when the
    /// backing store rejects the write.
    async fn set(&self, key: &CacheKey, entry: CacheEntry) -> FableResult<()>;

    /// Remove a cache entry
    async fn remove(&self, key: &CacheKey) -> FableResult<()>;

    /// Clear all entries
    async fn clear(&self) -> FableResult<()>;

    /// Number of stored entries
    async fn len(&self) -> usize;
}

struct MemoryInner {
    entries: HashMap<String, CacheEntry>,
    /// Insertion order, oldest first. Re-inserting a key moves it to the
    /// back; reads do not.
    order: VecDeque<String>,
}

/// Bounded in-memory store with FIFO-with-refresh-on-write eviction.
///
/// This is deliberately not an LRU: only writes refresh a key's position,
/// so eviction follows insertion order.
pub struct MemoryStorage {
    inner: Mutex<MemoryInner>,
    capacity: usize,
    max_entry_size: usize,
}

impl MemoryStorage {
    pub fn new(capacity: usize, max_entry_size: usize) -> Self {
        Self {
            inner: Mutex::new(MemoryInner {
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
            capacity: capacity.max(1),
            max_entry_size,
        }
    }

}

#[async_trait]
impl CacheStorage for MemoryStorage {
    async fn get(&self, key: &CacheKey) -> FableResult<Option<CacheEntry>> {
        let inner = self.inner.lock().await;
        Ok(inner.entries.get(key.as_str()).cloned())
    }

    async fn set(&self, key: &CacheKey, entry: CacheEntry) -> FableResult<()> {
        let size = entry.to_string().len();
        if size > self.max_entry_size {
            return Err(FableError::capacity(format!(
                "entry of {} bytes exceeds limit of {} bytes",
                size, self.max_entry_size
            )));
        }

        let mut inner = self.inner.lock().await;
        if inner.entries.contains_key(key.as_str()) {
            // Refresh insertion order; the new value fully replaces the old.
            inner.order.retain(|k| k != key.as_str());
        } else {
            while inner.entries.len() >= self.capacity {
                if let Some(oldest) = inner.order.pop_front() {
                    inner.entries.remove(&oldest);
                    tracing::debug!(key = %oldest, "evicted oldest local entry");
                } else {
                    break;
                }
            }
        }
        inner.entries.insert(key.as_str().to_string(), entry);
        inner.order.push_back(key.as_str().to_string());
        Ok(())
    }

    async fn remove(&self, key: &CacheKey) -> FableResult<()> {
        let mut inner = self.inner.lock().await;
        if inner.entries.remove(key.as_str()).is_some() {
            inner.order.retain(|k| k != key.as_str());
        }
        Ok(())
    }

    async fn clear(&self) -> FableResult<()> {
        let mut inner = self.inner.lock().await;
        inner.entries.clear();
        inner.order.clear();
        Ok(())
    }

    async fn len(&self) -> usize {
        self.inner.lock().await.entries.len()
    }
}

/// HTTP client for the shared remote cache server
pub struct RemoteStorage {
    client: reqwest::Client,
    base_url: String,
}

impl RemoteStorage {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> FableResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FableError::http(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/api/cache", self.base_url)
    }

    /// Look up a key in the remote store. `Ok(None)` is a clean miss;
    /// transport failures surface as errors for the tiered layer to absorb.
    pub async fn get(&self, key: &CacheKey) -> FableResult<Option<CacheEntry>> {
        let url = self.endpoint();
        let response = self
            .client
            .get(&url)
            .query(&[("key", key.as_str())])
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(FableError::Http {
                message: format!("remote cache returned {}", response.status()),
                url: Some(url),
                status_code: Some(response.status().as_u16()),
            });
        }

        let body: ApiResponse = response.json().await?;
        Ok(body.data)
    }

    /// Upsert a key in the remote store
    pub async fn set(&self, key: &CacheKey, entry: &CacheEntry) -> FableResult<()> {
        let url = self.endpoint();
        let request = PutRequest {
            key: Some(key.as_str().to_string()),
            data: Some(entry.clone()),
        };
        let response = self.client.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            return Err(FableError::Http {
                message: format!("remote cache write returned {}", response.status()),
                url: Some(url),
                status_code: Some(response.status().as_u16()),
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for RemoteStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteStorage")
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::key::derive_image;
    use serde_json::json;

    #[tokio::test]
    async fn test_memory_set_get_round_trip() {
        let storage = MemoryStorage::new(10, 1024);
        let key = derive_image("k");
        storage.set(&key, json!({"narrative": "hello"})).await.unwrap();
        let entry = storage.get(&key).await.unwrap();
        assert_eq!(entry, Some(json!({"narrative": "hello"})));
    }

    #[tokio::test]
    async fn test_memory_replaces_never_merges() {
        let storage = MemoryStorage::new(10, 1024);
        let key = derive_image("k");
        storage.set(&key, json!({"a": 1, "b": 2})).await.unwrap();
        storage.set(&key, json!({"a": 3})).await.unwrap();
        assert_eq!(storage.get(&key).await.unwrap(), Some(json!({"a": 3})));
        assert_eq!(storage.len().await, 1);
    }

    #[tokio::test]
    async fn test_memory_evicts_oldest_inserted_first() {
        let storage = MemoryStorage::new(3, 1024);
        let keys: Vec<_> = (0..4).map(|i| derive_image(&format!("k{}", i))).collect();
        for (i, key) in keys.iter().enumerate() {
            storage.set(key, json!(i)).await.unwrap();
        }

        assert_eq!(storage.len().await, 3);
        assert!(storage.get(&keys[0]).await.unwrap().is_none());
        for key in &keys[1..] {
            assert!(storage.get(key).await.unwrap().is_some());
        }
    }

    #[tokio::test]
    async fn test_memory_rewrite_refreshes_position_reads_do_not() {
        let storage = MemoryStorage::new(2, 1024);
        let k0 = derive_image("k0");
        let k1 = derive_image("k1");
        let k2 = derive_image("k2");

        storage.set(&k0, json!(0)).await.unwrap();
        storage.set(&k1, json!(1)).await.unwrap();

        // A read must not protect k0 from eviction.
        let _ = storage.get(&k0).await.unwrap();
        // A rewrite of k0 moves it to the back, so k1 is now oldest.
        storage.set(&k0, json!(10)).await.unwrap();
        storage.set(&k2, json!(2)).await.unwrap();

        assert!(storage.get(&k1).await.unwrap().is_none());
        assert_eq!(storage.get(&k0).await.unwrap(), Some(json!(10)));
        assert_eq!(storage.get(&k2).await.unwrap(), Some(json!(2)));
    }

    #[tokio::test]
    async fn test_memory_size_never_exceeds_bound() {
        let storage = MemoryStorage::new(5, 1024);
        for i in 0..50 {
            let key = derive_image(&format!("k{}", i));
            storage.set(&key, json!(i)).await.unwrap();
            assert!(storage.len().await <= 5);
        }
    }

    #[tokio::test]
    async fn test_memory_oversized_entry_is_a_capacity_error() {
        let storage = MemoryStorage::new(10, 16);
        let key = derive_image("big");
        let result = storage.set(&key, json!("x".repeat(64))).await;
        assert!(matches!(result, Err(FableError::Capacity { .. })));
    }
}

//! Insertion-ordered key-value store with heuristic capacity eviction

use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use tokio::sync::Mutex;

/// Assumed average serialized size of one entry. Capacity is estimated as
/// `entry count x this constant` rather than measured per payload; the
/// budget is a soft bound, not an accounting guarantee.
pub const ESTIMATED_ENTRY_BYTES: u64 = 64 * 1024;

struct StoreInner {
    entries: HashMap<String, Value>,
    /// Insertion order, oldest first. Writes refresh position
    /// (delete-then-insert); reads never do.
    order: VecDeque<String>,
}

/// The shared cache map. Last write wins on concurrent same-key writers;
/// insertion order is the sole eviction signal.
pub struct CacheStore {
    inner: Mutex<StoreInner>,
    byte_budget: u64,
}

impl CacheStore {
    pub fn new(byte_budget: u64) -> Self {
        Self {
            inner: Mutex::new(StoreInner {
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
            byte_budget,
        }
    }

    pub async fn get(&self, key: &str) -> Option<Value> {
        self.inner.lock().await.entries.get(key).cloned()
    }

    /// Upsert an entry, refreshing its insertion position, then run the
    /// capacity check. Returns the number of evicted entries.
    pub async fn insert(&self, key: String, value: Value) -> usize {
        let mut inner = self.inner.lock().await;
        if inner.entries.contains_key(&key) {
            inner.order.retain(|k| k != &key);
        }
        inner.order.push_back(key.clone());
        inner.entries.insert(key, value);
        Self::evict_if_over_budget(&mut inner, self.byte_budget)
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.entries.len()
    }

    /// Full key-to-entry mapping in insertion order, oldest first
    pub async fn snapshot(&self) -> serde_json::Map<String, Value> {
        let inner = self.inner.lock().await;
        let mut map = serde_json::Map::with_capacity(inner.entries.len());
        for key in &inner.order {
            if let Some(value) = inner.entries.get(key) {
                map.insert(key.clone(), value.clone());
            }
        }
        map
    }

    /// Replace the store contents with a loaded snapshot. The map's
    /// iteration order becomes the insertion order.
    pub async fn restore(&self, snapshot: serde_json::Map<String, Value>) {
        let mut inner = self.inner.lock().await;
        inner.entries.clear();
        inner.order.clear();
        for (key, value) in snapshot {
            inner.order.push_back(key.clone());
            inner.entries.insert(key, value);
        }
        let evicted = Self::evict_if_over_budget(&mut inner, self.byte_budget);
        if evicted > 0 {
            tracing::info!(evicted, "snapshot exceeded budget, trimmed oldest entries");
        }
    }

    /// When the size estimate exceeds the budget, evict the oldest ~10% of
    /// keys in one pass.
    fn evict_if_over_budget(inner: &mut StoreInner, byte_budget: u64) -> usize {
        let estimated = inner.entries.len() as u64 * ESTIMATED_ENTRY_BYTES;
        if estimated <= byte_budget {
            return 0;
        }

        let to_remove = (inner.entries.len() / 10).max(1);
        let mut removed = 0;
        for _ in 0..to_remove {
            match inner.order.pop_front() {
                Some(oldest) => {
                    inner.entries.remove(&oldest);
                    removed += 1;
                }
                None => break,
            }
        }
        removed
    }
}

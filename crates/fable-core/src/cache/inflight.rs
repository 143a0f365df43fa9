//! In-flight request deduplication
//!
//! Concurrent callers racing on the same cache key must share one
//! execution of the underlying operation. The registry keeps a shared
//! handle per key, inserted before the work starts and removed
//! unconditionally once the operation settles, so a later call is a fresh
//! retry.

use crate::cache::key::CacheKey;
use crate::error::FableResult;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;

type PendingHandle<T> = Shared<BoxFuture<'static, FableResult<T>>>;

/// Keyed registry of pending operations.
///
/// At most one pending operation exists per key at any instant. Results
/// (and failures) are delivered identically to every joined caller. The
/// map uses a synchronous `parking_lot::Mutex`: it is never held across an
/// await, and the starter's drop guard must be able to lock it in `Drop`.
pub struct InFlightRegistry<T>
where
    T: Clone + Send + Sync + 'static,
{
    pending: Mutex<HashMap<String, PendingHandle<T>>>,
}

/// Removes the starter's map entry when the starter stops awaiting, whether
/// the operation settled or the starter's own future was dropped first.
/// Without this, a cancelled starter would leave a key pinned to a handle
/// nobody drives.
struct PendingEntryGuard<'a, T>
where
    T: Clone + Send + Sync + 'static,
{
    pending: &'a Mutex<HashMap<String, PendingHandle<T>>>,
    key: String,
}

impl<T> Drop for PendingEntryGuard<'_, T>
where
    T: Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        self.pending.lock().remove(&self.key);
    }
}

impl<T> InFlightRegistry<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Join an existing in-flight operation for `key`, or start `operation`
    /// as the one execution for it.
    ///
    /// If a pending handle exists the caller awaits it and `operation` is
    /// dropped unexecuted. Otherwise the operation runs, and its entry is
    /// removed whether it succeeds, fails, or the starting caller is
    /// dropped before it settles.
    pub async fn join_or_start<F>(&self, key: &CacheKey, operation: F) -> FableResult<T>
    where
        F: Future<Output = FableResult<T>> + Send + 'static,
    {
        let (handle, _guard) = {
            let mut pending = self.pending.lock();
            if let Some(existing) = pending.get(key.as_str()) {
                tracing::debug!(key = %key, "joining in-flight operation");
                (existing.clone(), None)
            } else {
                let handle = operation.boxed().shared();
                pending.insert(key.as_str().to_string(), handle.clone());
                let guard = PendingEntryGuard {
                    pending: &self.pending,
                    key: key.as_str().to_string(),
                };
                (handle, Some(guard))
            }
        };

        handle.await
    }

    /// Whether an operation is currently in flight for `key`
    pub fn is_pending(&self, key: &CacheKey) -> bool {
        self.pending.lock().contains_key(key.as_str())
    }

    /// Number of operations currently in flight
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}

impl<T> Default for InFlightRegistry<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for InFlightRegistry<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InFlightRegistry").finish_non_exhaustive()
    }
}

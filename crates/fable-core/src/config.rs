//! Cache configuration

use serde::{Deserialize, Serialize};

/// Configuration for the tiered cache.
///
/// Injected into [`crate::story::StoryService`] at construction; changing a
/// setting means building a fresh service (there is no global cache state).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of entries held in the local tier
    pub local_capacity: usize,
    /// Maximum serialized size of a single local entry in bytes
    pub max_entry_size: usize,
    /// Whether the shared remote tier is consulted at all
    pub enable_remote_cache: bool,
    /// Base URL of the remote cache server
    pub remote_base_url: String,
    /// Timeout for remote cache requests, in seconds
    pub remote_timeout_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            local_capacity: 200,
            max_entry_size: 1024 * 1024, // 1MB
            enable_remote_cache: false,
            remote_base_url: "http://127.0.0.1:3001".to_string(),
            remote_timeout_secs: 10,
        }
    }
}

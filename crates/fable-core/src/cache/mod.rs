//! Caching core for Fable
//!
//! Turns the expensive, non-idempotent "generate next content" call into a
//! cheap, memoized, deduplicated operation:
//!
//! - **Key derivation**: request fingerprints hashed into stable
//!   content-addressable keys
//! - **In-flight dedup**: concurrent identical requests share one execution
//! - **Tiered storage**: bounded local tier plus shared remote tier with
//!   best-effort propagation

pub mod inflight;
pub mod key;
pub mod protocol;
pub mod storage;
pub mod tiered;

pub use inflight::InFlightRegistry;
pub use key::{derive, derive_image, CacheKey, RequestFingerprint};
pub use protocol::{ApiResponse, PutRequest};
pub use storage::{CacheEntry, CacheStorage, MemoryStorage, RemoteStorage};
pub use tiered::TieredCache;

//! Fable Core Library
//!
//! The caching heart of the Fable interactive-fiction engine: request
//! fingerprinting, in-flight request deduplication, a two-tier
//! (local + shared remote) cache, and speculative prefetch of likely next
//! story beats. The narrative and image generators themselves are opaque
//! collaborators behind the traits in [`story`].

pub mod cache;
pub mod config;
pub mod error;
pub mod model;
pub mod prefetch;
pub mod story;

// Re-export commonly used types
pub use cache::{CacheEntry, CacheKey, InFlightRegistry, RequestFingerprint, TieredCache};
pub use config::CacheConfig;
pub use error::{FableError, FableResult};
pub use model::{ConversationState, ImageBlob, Speaker, StoryPayload, Turn};
pub use prefetch::Prefetcher;
pub use story::{ImageGenerator, StoryGenerator, StoryService};

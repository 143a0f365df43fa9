//! Story generation pipeline
//!
//! [`StoryService`] is the fetch-or-cache front door: key derivation,
//! in-flight dedup, tiered cache lookup, and only then a call to the
//! generation collaborators. Both the foreground path and the prefetcher
//! go through it.

use crate::cache::{self, InFlightRegistry, TieredCache};
use crate::config::CacheConfig;
use crate::error::{FableError, FableResult};
use crate::model::{ConversationState, ImageBlob, StoryPayload};
use async_trait::async_trait;
use std::sync::Arc;

/// Remote narrative generator. Implemented outside the core; may fail with
/// a transport error or with [`FableError::MalformedResponse`] when its
/// output does not parse as a structured payload.
#[async_trait]
pub trait StoryGenerator: Send + Sync {
    async fn generate(
        &self,
        state: &ConversationState,
        action: &str,
        inventory: &[String],
    ) -> FableResult<StoryPayload>;
}

/// Remote image generator. `Ok(None)` means no image was produced, which
/// is distinct from a transport failure.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate_image(&self, prompt: &str) -> FableResult<Option<ImageBlob>>;
}

/// Cache-fronted story service.
///
/// Holds all mutable cache state explicitly; construct one per
/// configuration and rebuild (or [`reset`](Self::reset)) when settings
/// change.
pub struct StoryService {
    generator: Arc<dyn StoryGenerator>,
    images: Arc<dyn ImageGenerator>,
    cache: Arc<TieredCache>,
    stories: Arc<InFlightRegistry<StoryPayload>>,
    image_requests: Arc<InFlightRegistry<Option<ImageBlob>>>,
}

impl StoryService {
    pub fn new(
        config: &CacheConfig,
        generator: Arc<dyn StoryGenerator>,
        images: Arc<dyn ImageGenerator>,
    ) -> FableResult<Self> {
        Ok(Self {
            generator,
            images,
            cache: Arc::new(TieredCache::new(config)?),
            stories: Arc::new(InFlightRegistry::new()),
            image_requests: Arc::new(InFlightRegistry::new()),
        })
    }

    /// Fetch the next story beat for `action`, consulting the cache tiers
    /// before invoking the generator.
    ///
    /// Concurrent calls with an identical fingerprint share a single
    /// generator invocation. Malformed generator output is replaced by the
    /// fallback payload, which is not cached so a retry generates afresh.
    /// Only generation failures propagate; cache-tier failures never do.
    pub async fn fetch_story(
        &self,
        state: &ConversationState,
        action: &str,
        inventory: &[String],
    ) -> FableResult<StoryPayload> {
        let fingerprint = cache::RequestFingerprint::new(state, action, inventory);
        let key = cache::derive(&fingerprint)?;

        let cache = Arc::clone(&self.cache);
        let generator = Arc::clone(&self.generator);
        let state = state.clone();
        let action = action.to_string();
        let inventory = inventory.to_vec();
        let op_key = key.clone();

        self.stories
            .join_or_start(&key, async move {
                if let Some(value) = cache.get(&op_key).await {
                    match serde_json::from_value::<StoryPayload>(value) {
                        Ok(payload) => return Ok(payload),
                        Err(e) => {
                            tracing::warn!(key = %op_key, error = %e, "cached story entry unreadable, regenerating");
                        }
                    }
                }

                let payload = match generator.generate(&state, &action, &inventory).await {
                    Ok(payload) => payload,
                    Err(FableError::MalformedResponse { message }) => {
                        tracing::warn!(%message, "malformed generator output, substituting fallback");
                        return Ok(StoryPayload::fallback());
                    }
                    Err(e) => return Err(e),
                };

                match serde_json::to_value(&payload) {
                    Ok(value) => cache.set(&op_key, value).await,
                    Err(e) => {
                        tracing::warn!(key = %op_key, error = %e, "story payload not serializable, skipping cache");
                    }
                }
                Ok(payload)
            })
            .await
    }

    /// Fetch the illustration for a rendered prompt through the same
    /// pipeline, keyed in the image namespace.
    pub async fn fetch_image(&self, prompt: &str) -> FableResult<Option<ImageBlob>> {
        let key = cache::derive_image(prompt);

        let cache = Arc::clone(&self.cache);
        let images = Arc::clone(&self.images);
        let prompt = prompt.to_string();
        let op_key = key.clone();

        self.image_requests
            .join_or_start(&key, async move {
                if let Some(value) = cache.get(&op_key).await {
                    match serde_json::from_value::<ImageBlob>(value) {
                        Ok(blob) => return Ok(Some(blob)),
                        Err(e) => {
                            tracing::warn!(key = %op_key, error = %e, "cached image entry unreadable, regenerating");
                        }
                    }
                }

                let blob = images.generate_image(&prompt).await?;
                // "No image" is a valid outcome but is not cached, so a
                // later request gets another chance at an illustration.
                if let Some(blob) = &blob {
                    match serde_json::to_value(blob) {
                        Ok(value) => cache.set(&op_key, value).await,
                        Err(e) => {
                            tracing::warn!(key = %op_key, error = %e, "image blob not serializable, skipping cache");
                        }
                    }
                }
                Ok(blob)
            })
            .await
    }

    /// Clear local cache state, e.g. after a settings change
    pub async fn reset(&self) {
        self.cache.reset().await;
    }

    /// The underlying tiered cache (shared with the prefetcher and tests)
    pub fn cache(&self) -> &Arc<TieredCache> {
        &self.cache
    }
}

impl std::fmt::Debug for StoryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoryService")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{ScriptedGenerator, StubImages};
    use super::*;
    use crate::model::Turn;
    use std::time::Duration;

    fn service_with(generator: Arc<ScriptedGenerator>) -> (StoryService, Arc<StubImages>) {
        let images = Arc::new(StubImages::new());
        let service = StoryService::new(
            &CacheConfig::default(),
            generator,
            Arc::clone(&images) as Arc<dyn ImageGenerator>,
        )
        .unwrap();
        (service, images)
    }

    #[tokio::test]
    async fn test_first_call_generates_repeat_call_hits_cache() {
        let generator = Arc::new(ScriptedGenerator::new());
        let (service, _) = service_with(Arc::clone(&generator));
        let state = ConversationState::new();

        let first = service.fetch_story(&state, "START_GAME", &[]).await.unwrap();
        assert_eq!(first.narrative, "You chose: START_GAME");
        assert_eq!(generator.count(), 1);

        let second = service.fetch_story(&state, "START_GAME", &[]).await.unwrap();
        assert_eq!(second, first);
        assert_eq!(generator.count(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_identical_requests_invoke_generator_once() {
        let generator =
            Arc::new(ScriptedGenerator::new().with_delay(Duration::from_millis(50)));
        let (service, _) = service_with(Arc::clone(&generator));
        let service = Arc::new(service);
        let state: ConversationState = [Turn::system("The shrine is silent.")].into_iter().collect();
        let inventory = vec!["talisman".to_string()];

        let (a, b) = tokio::join!(
            service.fetch_story(&state, "烧符", &inventory),
            service.fetch_story(&state, "烧符", &inventory),
        );

        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(generator.count(), 1);
    }

    #[tokio::test]
    async fn test_inventory_order_shares_a_cache_slot() {
        let generator = Arc::new(ScriptedGenerator::new());
        let (service, _) = service_with(Arc::clone(&generator));
        let state = ConversationState::new();

        let a = vec!["rope".to_string(), "match".to_string()];
        let b = vec!["match".to_string(), "rope".to_string()];
        service.fetch_story(&state, "dig", &a).await.unwrap();
        service.fetch_story(&state, "dig", &b).await.unwrap();
        assert_eq!(generator.count(), 1);
    }

    #[tokio::test]
    async fn test_malformed_output_yields_uncached_fallback() {
        let generator = Arc::new(ScriptedGenerator::new().malformed_on("whisper"));
        let (service, _) = service_with(Arc::clone(&generator));
        let state = ConversationState::new();

        let payload = service.fetch_story(&state, "whisper", &[]).await.unwrap();
        assert_eq!(payload, StoryPayload::fallback());

        // The fallback was not cached: a retry reaches the generator again.
        let payload = service.fetch_story(&state, "whisper", &[]).await.unwrap();
        assert_eq!(payload, StoryPayload::fallback());
        assert_eq!(generator.count(), 2);
    }

    #[tokio::test]
    async fn test_generation_failure_propagates_and_allows_retry() {
        let generator = Arc::new(ScriptedGenerator::new().failing_on("leap"));
        let (service, _) = service_with(Arc::clone(&generator));
        let state = ConversationState::new();

        let result = service.fetch_story(&state, "leap", &[]).await;
        assert!(matches!(result, Err(FableError::Generator { .. })));

        // The pending operation was removed, so the retry re-executes.
        let result = service.fetch_story(&state, "leap", &[]).await;
        assert!(result.is_err());
        assert_eq!(generator.count(), 2);
    }

    #[tokio::test]
    async fn test_image_pipeline_caches_produced_blobs() {
        let generator = Arc::new(ScriptedGenerator::new());
        let (service, images) = service_with(generator);

        let blob = service.fetch_image("a moonlit shrine").await.unwrap();
        assert!(blob.is_some());
        assert_eq!(images.count(), 1);

        let again = service.fetch_image("a moonlit shrine").await.unwrap();
        assert_eq!(again, blob);
        assert_eq!(images.count(), 1);
    }

    #[tokio::test]
    async fn test_absent_image_is_not_cached() {
        let generator = Arc::new(ScriptedGenerator::new());
        let images = Arc::new(StubImages {
            produce_nothing: true,
            ..StubImages::new()
        });
        let service = StoryService::new(
            &CacheConfig::default(),
            generator,
            Arc::clone(&images) as Arc<dyn ImageGenerator>,
        )
        .unwrap();

        assert!(service.fetch_image("nothing").await.unwrap().is_none());
        assert!(service.fetch_image("nothing").await.unwrap().is_none());
        assert_eq!(images.count(), 2);
    }

    #[tokio::test]
    async fn test_reset_forces_regeneration() {
        let generator = Arc::new(ScriptedGenerator::new());
        let (service, _) = service_with(Arc::clone(&generator));
        let state = ConversationState::new();

        service.fetch_story(&state, "START_GAME", &[]).await.unwrap();
        service.reset().await;
        service.fetch_story(&state, "START_GAME", &[]).await.unwrap();
        assert_eq!(generator.count(), 2);
    }
}

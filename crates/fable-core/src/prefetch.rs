//! Speculative prefetch
//!
//! After a story beat has been presented, the likely next actions are
//! already known. The prefetcher runs the same fetch-or-cache pipeline for
//! each candidate in the background so that the player's actual choice is
//! usually a cache hit.

use crate::model::ConversationState;
use crate::story::StoryService;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Fires the story pipeline speculatively for candidate actions.
pub struct Prefetcher {
    service: Arc<StoryService>,
}

impl Prefetcher {
    pub fn new(service: Arc<StoryService>) -> Self {
        Self { service }
    }

    /// Launch one detached pipeline per candidate action.
    ///
    /// Each candidate independently derives its key, joins or starts the
    /// in-flight operation, and chains image generation after its
    /// narrative resolves. Failures are logged and swallowed; one
    /// candidate failing never affects its siblings or the foreground.
    ///
    /// The returned handles exist so tests can await quiescence; callers
    /// normally drop them, and the results are discarded either way — the
    /// only observable effect is cache population.
    pub fn prefetch(
        &self,
        state: &ConversationState,
        candidate_actions: &[String],
        inventory: &[String],
    ) -> Vec<JoinHandle<()>> {
        candidate_actions
            .iter()
            .map(|action| {
                let service = Arc::clone(&self.service);
                let state = state.clone();
                let action = action.clone();
                let inventory = inventory.to_vec();
                tokio::spawn(async move {
                    match service.fetch_story(&state, &action, &inventory).await {
                        Ok(payload) => {
                            tracing::debug!(%action, "prefetched story beat");
                            if let Some(prompt) = payload.image_prompt {
                                if let Err(e) = service.fetch_image(&prompt).await {
                                    tracing::debug!(%action, error = %e, "prefetch image stage failed");
                                }
                            }
                        }
                        Err(e) => {
                            tracing::debug!(%action, error = %e, "prefetch failed");
                        }
                    }
                })
            })
            .collect()
    }
}

impl std::fmt::Debug for Prefetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Prefetcher").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use crate::story::testing::{ScriptedGenerator, StubImages};
    use crate::story::ImageGenerator;
    use std::time::Duration;

    fn build(generator: Arc<ScriptedGenerator>) -> (Arc<StoryService>, Prefetcher) {
        let images = Arc::new(StubImages::new()) as Arc<dyn ImageGenerator>;
        let service = Arc::new(
            StoryService::new(&CacheConfig::default(), generator, images).unwrap(),
        );
        (Arc::clone(&service), Prefetcher::new(service))
    }

    #[tokio::test]
    async fn test_prefetch_populates_the_cache() {
        let generator = Arc::new(ScriptedGenerator::new());
        let (service, prefetcher) = build(Arc::clone(&generator));
        let state = ConversationState::new();
        let candidates = vec!["烧符".to_string(), "离开".to_string()];

        for handle in prefetcher.prefetch(&state, &candidates, &[]) {
            handle.await.unwrap();
        }
        assert_eq!(generator.count(), 2);

        // The foreground request for a prefetched action is a cache hit.
        let payload = service.fetch_story(&state, "烧符", &[]).await.unwrap();
        assert_eq!(payload.narrative, "You chose: 烧符");
        assert_eq!(generator.count(), 2);
    }

    #[tokio::test]
    async fn test_failed_candidate_does_not_affect_siblings() {
        let generator = Arc::new(ScriptedGenerator::new().failing_on("离开"));
        let (service, prefetcher) = build(Arc::clone(&generator));
        let state = ConversationState::new();
        let candidates = vec!["烧符".to_string(), "离开".to_string()];

        for handle in prefetcher.prefetch(&state, &candidates, &[]) {
            // Panics would surface here; swallowed errors do not.
            handle.await.unwrap();
        }

        // The surviving candidate is cached and served without another
        // generator call.
        let payload = service.fetch_story(&state, "烧符", &[]).await.unwrap();
        assert_eq!(payload.narrative, "You chose: 烧符");
        assert_eq!(
            generator
                .seen_actions
                .lock()
                .await
                .iter()
                .filter(|a| a.as_str() == "烧符")
                .count(),
            1
        );

        // The failed candidate stays uncached, so the foreground retry
        // reaches the generator.
        assert!(service.fetch_story(&state, "离开", &[]).await.is_err());
    }

    #[tokio::test]
    async fn test_prefetch_joins_foreground_in_flight_request() {
        let generator =
            Arc::new(ScriptedGenerator::new().with_delay(Duration::from_millis(50)));
        let (service, prefetcher) = build(Arc::clone(&generator));
        let state = ConversationState::new();
        let candidates = vec!["open door".to_string()];

        let foreground = {
            let service = Arc::clone(&service);
            let state = state.clone();
            tokio::spawn(async move { service.fetch_story(&state, "open door", &[]).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        let handles = prefetcher.prefetch(&state, &candidates, &[]);

        assert!(foreground.await.unwrap().is_ok());
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(generator.count(), 1);
    }

    #[tokio::test]
    async fn test_prefetch_chains_image_generation() {
        let generator = Arc::new(ScriptedGenerator::new());
        let images = Arc::new(StubImages::new());
        let service = Arc::new(
            StoryService::new(
                &CacheConfig::default(),
                Arc::clone(&generator) as Arc<dyn crate::story::StoryGenerator>,
                Arc::clone(&images) as Arc<dyn ImageGenerator>,
            )
            .unwrap(),
        );
        let prefetcher = Prefetcher::new(Arc::clone(&service));
        let state = ConversationState::new();

        for handle in prefetcher.prefetch(&state, &["listen".to_string()], &[]) {
            handle.await.unwrap();
        }
        assert_eq!(images.count(), 1);

        // Foreground image fetch for the prefetched scene is a hit.
        let blob = service.fetch_image("scene after listen").await.unwrap();
        assert!(blob.is_some());
        assert_eq!(images.count(), 1);
    }
}

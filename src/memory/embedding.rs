//! Embedding providers and the fallback chain
//!
//! Every provider sits behind [`EmbeddingProvider`]. [`EmbeddingService`]
//! owns the ordered provider list, the selected [`BackendState`] and the
//! [`EmbeddingCache`], and turns text into a backend-tagged [`Embedding`].

use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::cache::EmbeddingCache;
use super::selector::{Availability, Backend, BackendState};
use crate::error::{Error, Result};

/// A vector together with the backend that produced it.
///
/// Vectors are only comparable with vectors of the same backend.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    pub backend: Backend,
    pub vector: Vec<f32>,
}

impl Embedding {
    pub fn new(backend: Backend, vector: Vec<f32>) -> Self {
        Embedding { backend, vector }
    }

    pub fn dimensions(&self) -> usize {
        self.vector.len()
    }
}

/// Abstract interface for embedding backends
///
/// Implementations hide their own retry and timeout behavior and report
/// recoverable failures as `Err` rather than panicking.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Which backend this provider implements
    fn backend(&self) -> Backend;

    /// Check whether the provider can serve requests
    async fn probe(&self) -> bool;

    /// Turn text into a vector
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Embedding generation with cache and provider fallback
#[derive(Clone)]
pub struct EmbeddingService {
    providers: Vec<Arc<dyn EmbeddingProvider>>,
    state: BackendState,
    cache: EmbeddingCache,
}

impl EmbeddingService {
    /// Probe every provider concurrently and select the active backend
    pub async fn initialize(
        providers: Vec<Arc<dyn EmbeddingProvider>>,
        preferred: Backend,
        cache: EmbeddingCache,
    ) -> Self {
        let probes =
            join_all(providers.iter().map(|p| async move { (p.backend(), p.probe().await) }))
                .await;

        let mut availability = Availability::default();
        for (backend, available) in probes {
            debug!(%backend, available, "probed embedding provider");
            if available {
                availability.set(backend, true);
            }
        }

        let state = BackendState::new(preferred, availability);
        info!(
            preferred = %preferred,
            backend = %state.backend,
            http = availability.http,
            local_model = availability.local_model,
            cache = cache.is_enabled(),
            "embedding backend selected"
        );

        Self::with_state(providers, state, cache)
    }

    /// Build from an already-decided backend state
    pub fn with_state(
        providers: Vec<Arc<dyn EmbeddingProvider>>,
        state: BackendState,
        cache: EmbeddingCache,
    ) -> Self {
        EmbeddingService {
            providers,
            state,
            cache,
        }
    }

    pub fn state(&self) -> &BackendState {
        &self.state
    }

    /// The active backend
    pub fn backend(&self) -> Backend {
        self.state.backend
    }

    pub fn cache(&self) -> &EmbeddingCache {
        &self.cache
    }

    /// Embed `text`, consulting the cache first.
    ///
    /// Returns `None` when every provider in the attempt order failed; that
    /// outcome is logged and never cached.
    pub async fn embed(&self, text: &str) -> Option<Embedding> {
        match self.cache.get_or_try_insert(text, self.embed_uncached(text)).await {
            Ok(embedding) => Some(embedding),
            Err(e) => {
                warn!("Failed to create embedding: {}", e);
                None
            }
        }
    }

    /// Walk the attempt order until a provider returns a vector
    async fn embed_uncached(&self, text: &str) -> Result<Embedding> {
        let mut failures = Vec::new();

        for backend in self.state.attempt_order() {
            let Some(provider) = self.provider(backend) else {
                continue;
            };

            match call_provider(provider.as_ref(), text).await {
                Ok(vector) => {
                    if backend != self.state.backend {
                        info!(
                            %backend,
                            active = %self.state.backend,
                            "embedding served by fallback backend"
                        );
                    }
                    return Ok(Embedding::new(backend, vector));
                }
                Err(e) => {
                    warn!(%backend, "embedding attempt failed: {}", e);
                    failures.push(format!("{}: {}", backend, e));
                }
            }
        }

        Err(Error::EmbeddingUnavailable(if failures.is_empty() {
            format!("no provider configured for backend {}", self.state.backend)
        } else {
            failures.join("; ")
        }))
    }

    /// Embed `text` with exactly `backend`, bypassing cache and fallback.
    ///
    /// Used to compare a query against vectors indexed by a backend other
    /// than the one that answered the cached lookup.
    pub async fn embed_with(&self, backend: Backend, text: &str) -> Option<Embedding> {
        let provider = self.provider(backend)?;
        match call_provider(provider.as_ref(), text).await {
            Ok(vector) => Some(Embedding::new(backend, vector)),
            Err(e) => {
                warn!(%backend, "embedding attempt failed: {}", e);
                None
            }
        }
    }

    fn provider(&self, backend: Backend) -> Option<&Arc<dyn EmbeddingProvider>> {
        self.providers.iter().find(|p| p.backend() == backend)
    }
}

/// One provider call; empty or non-finite vectors count as failures
async fn call_provider(provider: &dyn EmbeddingProvider, text: &str) -> Result<Vec<f32>> {
    let backend = provider.backend();
    let vector = provider.embed(text).await?;
    if vector.is_empty() {
        return Err(Error::provider(backend, "empty embedding"));
    }
    if vector.iter().any(|v| !v.is_finite()) {
        return Err(Error::provider(backend, "embedding has non-finite components"));
    }
    Ok(vector)
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scriptable providers for engine tests

    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Provider returning fixed vectors per text, counting calls
    pub struct StubProvider {
        backend: Backend,
        available: bool,
        failing: bool,
        failing_texts: HashSet<String>,
        vectors: HashMap<String, Vec<f32>>,
        fallback: Option<Vec<f32>>,
        calls: AtomicUsize,
    }

    impl StubProvider {
        pub fn new(backend: Backend) -> Self {
            StubProvider {
                backend,
                available: true,
                failing: false,
                failing_texts: HashSet::new(),
                vectors: HashMap::new(),
                fallback: None,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn with_vector(mut self, text: &str, vector: Vec<f32>) -> Self {
            self.vectors.insert(text.to_string(), vector);
            self
        }

        /// Vector returned for texts without an explicit entry
        pub fn with_default(mut self, vector: Vec<f32>) -> Self {
            self.fallback = Some(vector);
            self
        }

        pub fn unavailable(mut self) -> Self {
            self.available = false;
            self
        }

        pub fn failing(mut self) -> Self {
            self.failing = true;
            self
        }

        /// Fail only for `text`
        pub fn failing_for(mut self, text: &str) -> Self {
            self.failing_texts.insert(text.to_string());
            self
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl EmbeddingProvider for StubProvider {
        fn backend(&self) -> Backend {
            self.backend
        }

        async fn probe(&self) -> bool {
            self.available
        }

        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing || self.failing_texts.contains(text) {
                return Err(Error::provider(self.backend, "scripted failure"));
            }
            self.vectors
                .get(text)
                .or(self.fallback.as_ref())
                .cloned()
                .ok_or_else(|| Error::provider(self.backend, format!("no vector for {:?}", text)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::StubProvider;
    use super::*;
    use std::time::Duration;

    fn cache() -> EmbeddingCache {
        EmbeddingCache::new(Duration::from_secs(3600), 100)
    }

    #[tokio::test]
    async fn test_initialize_selects_preferred() {
        let http = Arc::new(StubProvider::new(Backend::Http));
        let local = Arc::new(StubProvider::new(Backend::LocalModel));
        let service =
            EmbeddingService::initialize(vec![http, local], Backend::LocalModel, cache()).await;
        assert_eq!(service.backend(), Backend::LocalModel);
        assert!(service.state().availability.http);
    }

    #[tokio::test]
    async fn test_initialize_skips_unavailable_preferred() {
        let http = Arc::new(StubProvider::new(Backend::Http).unavailable());
        let local = Arc::new(StubProvider::new(Backend::LocalModel));
        let service = EmbeddingService::initialize(vec![http, local], Backend::Http, cache()).await;
        assert_eq!(service.backend(), Backend::LocalModel);
    }

    #[tokio::test]
    async fn test_second_call_within_ttl_hits_cache() {
        let http = Arc::new(StubProvider::new(Backend::Http).with_default(vec![1.0, 2.0]));
        let service =
            EmbeddingService::initialize(vec![http.clone()], Backend::Http, cache()).await;

        let first = service.embed("hello").await.unwrap();
        let second = service.embed("hello").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(http.calls(), 1);
    }

    #[tokio::test]
    async fn test_expired_entry_triggers_fresh_call() {
        let http = Arc::new(StubProvider::new(Backend::Http).with_default(vec![1.0]));
        let service = EmbeddingService::initialize(
            vec![http.clone()],
            Backend::Http,
            EmbeddingCache::new(Duration::from_millis(40), 100),
        )
        .await;

        service.embed("hello").await.unwrap();
        tokio::time::sleep(Duration::from_millis(70)).await;
        service.embed("hello").await.unwrap();

        assert_eq!(http.calls(), 2);
    }

    #[tokio::test]
    async fn test_failing_primary_falls_back() {
        let http = Arc::new(StubProvider::new(Backend::Http).failing());
        let local = Arc::new(StubProvider::new(Backend::LocalModel).with_default(vec![0.0, 1.0]));
        let service =
            EmbeddingService::initialize(vec![http.clone(), local.clone()], Backend::Http, cache())
                .await;
        assert_eq!(service.backend(), Backend::Http);

        let embedding = service.embed("hello").await.unwrap();
        assert_eq!(embedding.backend, Backend::LocalModel);
        assert_eq!(embedding.vector, vec![0.0, 1.0]);

        // The primary is not demoted: the next miss tries it again
        service.embed("another").await.unwrap();
        assert_eq!(http.calls(), 2);
        assert_eq!(local.calls(), 2);
    }

    #[tokio::test]
    async fn test_all_failing_returns_none_and_caches_nothing() {
        let http = Arc::new(StubProvider::new(Backend::Http).failing());
        let local = Arc::new(StubProvider::new(Backend::LocalModel).failing());
        let service =
            EmbeddingService::initialize(vec![http.clone(), local.clone()], Backend::Http, cache())
                .await;

        assert!(service.embed("hello").await.is_none());
        assert!(service.embed("hello").await.is_none());
        assert_eq!(http.calls(), 2);
        assert_eq!(local.calls(), 2);
        assert!(service.cache().get("hello").await.is_none());
    }

    #[tokio::test]
    async fn test_fallback_skips_providers_unavailable_at_startup() {
        let http = Arc::new(StubProvider::new(Backend::Http).failing());
        let local = Arc::new(
            StubProvider::new(Backend::LocalModel)
                .with_default(vec![1.0])
                .unavailable(),
        );
        let service =
            EmbeddingService::initialize(vec![http, local.clone()], Backend::Http, cache()).await;

        assert!(service.embed("hello").await.is_none());
        assert_eq!(local.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_vector_counts_as_failure() {
        let http = Arc::new(StubProvider::new(Backend::Http).with_default(vec![]));
        let service = EmbeddingService::initialize(vec![http], Backend::Http, cache()).await;
        assert!(service.embed("hello").await.is_none());
    }

    #[tokio::test]
    async fn test_non_finite_vector_counts_as_failure() {
        let http =
            Arc::new(StubProvider::new(Backend::Http).with_default(vec![f32::INFINITY, 1.0]));
        let local = Arc::new(StubProvider::new(Backend::LocalModel).with_default(vec![0.5, 0.5]));
        let service =
            EmbeddingService::initialize(vec![http, local], Backend::Http, cache()).await;

        let embedding = service.embed("hello").await.unwrap();
        assert_eq!(embedding.backend, Backend::LocalModel);

        let nan = Arc::new(StubProvider::new(Backend::Http).with_default(vec![f32::NAN]));
        let service = EmbeddingService::initialize(vec![nan], Backend::Http, cache()).await;
        assert!(service.embed("hello").await.is_none());
    }

    #[tokio::test]
    async fn test_embed_with_targets_one_backend() {
        let http = Arc::new(StubProvider::new(Backend::Http).with_default(vec![1.0]));
        let local = Arc::new(StubProvider::new(Backend::LocalModel).with_default(vec![0.0, 1.0]));
        let service =
            EmbeddingService::initialize(vec![http.clone(), local], Backend::Http, cache()).await;

        let embedding = service.embed_with(Backend::LocalModel, "hello").await.unwrap();
        assert_eq!(embedding.backend, Backend::LocalModel);
        assert_eq!(embedding.vector, vec![0.0, 1.0]);
        assert_eq!(http.calls(), 0);
        assert!(service.cache().get("hello").await.is_none());
        assert!(service.embed_with(Backend::Simple, "hello").await.is_none());
    }
}

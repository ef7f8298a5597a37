//! Memory engine facade
//!
//! Composes the store, embedding index, embedding service and search
//! engine behind `store` / `search`, and gates both on `enable()`.

use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::cache::EmbeddingCache;
use super::embedding::{Embedding, EmbeddingProvider, EmbeddingService};
use super::http::HttpEmbeddingProvider;
use super::index::EmbeddingIndex;
use super::local::LocalEmbeddingProvider;
use super::retrieval::{SearchHit, SimilaritySearchEngine};
use super::selector::{Availability, Backend};
use super::store::{InMemoryStore, KeyValueStore};
use crate::config::SearchConfig;
use crate::error::{Error, Result};

/// Snapshot of engine state
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub enabled: bool,
    pub backend: Backend,
    pub availability: Availability,
    pub memories: usize,
    pub embeddings: usize,
    pub cached_embeddings: u64,
}

/// Namespaced semantic memory
pub struct MemoryEngine {
    enabled: AtomicBool,
    store: Arc<dyn KeyValueStore>,
    index: Arc<EmbeddingIndex>,
    embeddings: EmbeddingService,
    retriever: SimilaritySearchEngine,
}

impl MemoryEngine {
    /// Build the default engine: in-memory store, HTTP and local providers
    pub async fn from_config(config: &SearchConfig) -> Result<Self> {
        let providers: Vec<Arc<dyn EmbeddingProvider>> = vec![
            Arc::new(HttpEmbeddingProvider::new(&config.http)?),
            Arc::new(LocalEmbeddingProvider::new(&config.local)?),
        ];
        Ok(Self::new(config, Arc::new(InMemoryStore::new()), providers).await)
    }

    /// Build an engine over an injected store and provider list.
    ///
    /// Probes the providers once; the selected backend is fixed afterwards.
    pub async fn new(
        config: &SearchConfig,
        store: Arc<dyn KeyValueStore>,
        providers: Vec<Arc<dyn EmbeddingProvider>>,
    ) -> Self {
        let cache = if config.cache_embeddings {
            EmbeddingCache::new(
                Duration::from_secs(config.cache_ttl_seconds),
                config.cache_max_entries,
            )
        } else {
            EmbeddingCache::disabled()
        };

        let embeddings =
            EmbeddingService::initialize(providers, config.preferred_backend, cache).await;
        Self::with_service(store, embeddings)
    }

    /// Build an engine around an already-initialized embedding service
    pub fn with_service(store: Arc<dyn KeyValueStore>, embeddings: EmbeddingService) -> Self {
        let index = Arc::new(EmbeddingIndex::new());
        let retriever =
            SimilaritySearchEngine::new(store.clone(), index.clone(), embeddings.clone());

        MemoryEngine {
            enabled: AtomicBool::new(false),
            store,
            index,
            embeddings,
            retriever,
        }
    }

    /// Enable the engine; idempotent
    pub fn enable(&self) {
        if !self.enabled.swap(true, Ordering::SeqCst) {
            info!(backend = %self.backend(), "Memory engine enabled");
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// The backend selected at construction
    pub fn backend(&self) -> Backend {
        self.embeddings.backend()
    }

    /// Store `content` under `key`.
    ///
    /// The record is always written. With a semantic backend the content is
    /// embedded as well; an embedding failure is logged and leaves the
    /// record reachable through substring search only. The embedding runs in
    /// its own task, so a caller that goes away does not cancel it.
    pub async fn store(&self, key: &str, content: &str) -> Result<()> {
        self.ensure_enabled()?;

        self.store.put(key, content).await?;
        info!("Stored memory with key: {}", key);

        if !self.backend().is_semantic() {
            return Ok(());
        }

        // Any vector for the previous content is stale now
        self.index.remove(key).await;

        let task = tokio::spawn(index_content(
            self.store.clone(),
            self.index.clone(),
            self.embeddings.clone(),
            key.to_string(),
            content.to_string(),
        ));
        task.await
            .map_err(|e| Error::Internal(format!("Embedding task join error: {}", e)))?
    }

    /// Retrieve up to `limit` memories for `query`, best first.
    ///
    /// Never fails for "no matches"; the result is simply empty.
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        self.ensure_enabled()?;
        info!("Retrieving context for query: '{}' with limit: {}", query, limit);
        self.retriever.search(query, limit).await
    }

    /// Embed `text` through the cache and fallback chain
    pub async fn create_embedding(&self, text: &str) -> Option<Embedding> {
        self.embeddings.embed(text).await
    }

    pub async fn status(&self) -> Result<EngineStatus> {
        Ok(EngineStatus {
            enabled: self.is_enabled(),
            backend: self.backend(),
            availability: self.embeddings.state().availability,
            memories: self.store.len().await?,
            embeddings: self.index.len().await,
            cached_embeddings: self.embeddings.cache().entry_count(),
        })
    }

    fn ensure_enabled(&self) -> Result<()> {
        if self.is_enabled() {
            Ok(())
        } else {
            Err(Error::NotEnabled)
        }
    }
}

/// Embed `content` and index it under `key` if the record still holds it
async fn index_content(
    store: Arc<dyn KeyValueStore>,
    index: Arc<EmbeddingIndex>,
    embeddings: EmbeddingService,
    key: String,
    content: String,
) -> Result<()> {
    let Some(embedding) = embeddings.embed(&content).await else {
        warn!("Failed to create embedding for key: {}", key);
        return Ok(());
    };

    let backend = embedding.backend;
    let dims = embedding.dimensions();

    // A newer store for the same key wins over this late result
    let still_current = async { Ok(store.get(&key).await?.as_deref() == Some(content.as_str())) };
    if index.insert_if(&key, embedding, still_current).await? {
        debug!(%backend, dims, "Created and stored embedding for key: {}", key);
    } else {
        debug!("Discarding embedding for overwritten key: {}", key);
    }
    Ok(())
}

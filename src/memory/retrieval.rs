//! Memory retrieval
//!
//! Ranks stored keys by cosine similarity against the query embedding and
//! falls back to literal substring search whenever semantic search is not
//! possible or finds nothing.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::embedding::EmbeddingService;
use super::index::EmbeddingIndex;
use super::store::{KeyValueStore, MemoryRecord};
use crate::error::Result;

/// One search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub key: String,
    pub content: String,
    /// Cosine similarity; only set for semantic matches
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

impl From<MemoryRecord> for SearchHit {
    fn from(record: MemoryRecord) -> Self {
        SearchHit {
            key: record.key,
            content: record.content,
            score: None,
        }
    }
}

/// Cosine similarity of two vectors.
///
/// `None` when the dimensions differ; `0.0` when either norm is zero or the
/// result is not finite.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() {
        return None;
    }

    let (dot, norm_a, norm_b) = a
        .iter()
        .zip(b)
        .fold((0.0f32, 0.0f32, 0.0f32), |(dot, na, nb), (x, y)| {
            (dot + x * y, na + x * x, nb + y * y)
        });

    if norm_a == 0.0 || norm_b == 0.0 {
        return Some(0.0);
    }
    let score = dot / (norm_a.sqrt() * norm_b.sqrt());
    Some(if score.is_finite() { score } else { 0.0 })
}

/// Score every candidate against `query`, best first, keeping `limit`.
///
/// The sort is stable, so equal scores keep candidate order. Candidates of
/// a different dimension are skipped.
pub fn rank(
    query: &[f32],
    candidates: Vec<(String, Vec<f32>)>,
    limit: usize,
) -> Vec<(String, f32)> {
    let mut scored: Vec<(String, f32)> = candidates
        .into_iter()
        .filter_map(|(key, vector)| match cosine_similarity(query, &vector) {
            Some(score) => Some((key, score)),
            None => {
                debug!(%key, "skipping vector with mismatched dimensions");
                None
            }
        })
        .collect();

    sort_by_score(&mut scored);
    scored.truncate(limit);
    scored
}

fn sort_by_score(scored: &mut [(String, f32)]) {
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
}

/// Semantic search with substring fallback
#[derive(Clone)]
pub struct SimilaritySearchEngine {
    store: Arc<dyn KeyValueStore>,
    index: Arc<EmbeddingIndex>,
    embeddings: EmbeddingService,
}

impl SimilaritySearchEngine {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        index: Arc<EmbeddingIndex>,
        embeddings: EmbeddingService,
    ) -> Self {
        SimilaritySearchEngine {
            store,
            index,
            embeddings,
        }
    }

    /// Retrieve up to `limit` memories for `query`, best first
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let backend = self.embeddings.backend();
        if backend.is_semantic() && !self.index.is_empty().await {
            info!(%backend, "Using semantic search for query: '{}'", query);
            let hits = self.semantic_search(query, limit).await?;
            if !hits.is_empty() {
                info!("Semantic search found {} matches", hits.len());
                return Ok(hits);
            }
        }

        info!("Using substring search for query: '{}'", query);
        let hits = self.substring_search(query, limit).await?;
        info!("Substring search found {} matches", hits.len());
        Ok(hits)
    }

    /// Rank indexed vectors against the query.
    ///
    /// Vectors are only compared with a query embedding from their own
    /// backend: the cached query embedding covers its backend, and every
    /// other backend present in the index embeds the query once more. Groups
    /// are merged by score, the query's own backend first on ties.
    ///
    /// Empty when the query cannot be embedded.
    pub async fn semantic_search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let Some(query_embedding) = self.embeddings.embed(query).await else {
            warn!("Failed to create query embedding, falling back to substring search");
            return Ok(Vec::new());
        };

        let mut scored = rank(
            &query_embedding.vector,
            self.index.snapshot(query_embedding.backend).await,
            limit,
        );

        for backend in self.index.backends().await {
            if backend == query_embedding.backend {
                continue;
            }
            let Some(embedding) = self.embeddings.embed_with(backend, query).await else {
                debug!(%backend, "cannot embed query for vectors of this backend");
                continue;
            };
            scored.extend(rank(&embedding.vector, self.index.snapshot(backend).await, limit));
        }

        sort_by_score(&mut scored);
        scored.truncate(limit);

        let mut hits = Vec::new();
        for (key, score) in scored {
            match self.store.get(&key).await? {
                Some(content) => hits.push(SearchHit {
                    key,
                    content,
                    score: Some(score),
                }),
                None => debug!(%key, "indexed key missing from store"),
            }
        }
        Ok(hits)
    }

    /// Records whose key or content contains `query`, in storage order
    pub async fn substring_search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        Ok(self
            .store
            .find_substring(query, limit)
            .await?
            .into_iter()
            .map(SearchHit::from)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::cache::EmbeddingCache;
    use crate::memory::embedding::testing::StubProvider;
    use crate::memory::embedding::{Embedding, EmbeddingProvider};
    use crate::memory::store::InMemoryStore;
    use crate::memory::Backend;
    use std::time::Duration;

    fn candidates(items: &[(&str, &[f32])]) -> Vec<(String, Vec<f32>)> {
        items.iter().map(|(k, v)| (k.to_string(), v.to_vec())).collect()
    }

    #[test]
    fn test_cosine_similarity() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]), Some(1.0));
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), Some(0.0));
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]), Some(-1.0));
        let s = cosine_similarity(&[1.0, 1.0], &[2.0, 2.0]).unwrap();
        assert!((s - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_norm_is_zero_similarity() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), Some(0.0));
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 0.0]), Some(0.0));
    }

    #[test]
    fn test_dimension_mismatch_is_not_compared() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]), None);
    }

    #[test]
    fn test_rank_orders_and_keeps_ties_stable() {
        let ranked = rank(
            &[1.0, 0.0],
            candidates(&[("c", &[0.0, 1.0]), ("a", &[1.0, 0.0]), ("b", &[1.0, 0.0])]),
            10,
        );
        assert_eq!(
            ranked,
            vec![("a".to_string(), 1.0), ("b".to_string(), 1.0), ("c".to_string(), 0.0)]
        );
    }

    #[test]
    fn test_rank_truncates_and_skips_mismatched() {
        let ranked = rank(
            &[1.0, 0.0],
            candidates(&[("a", &[1.0, 0.0]), ("odd", &[1.0, 0.0, 0.0]), ("b", &[0.5, 0.5])]),
            1,
        );
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].0, "a");
        assert!(rank(&[1.0], candidates(&[("a", &[1.0])]), 0).is_empty());
    }

    type Fixture = (SimilaritySearchEngine, Arc<InMemoryStore>, Arc<EmbeddingIndex>);

    async fn engine(provider: StubProvider, backend: Backend) -> Fixture {
        engine_over(vec![Arc::new(provider)], backend).await
    }

    async fn engine_over(providers: Vec<Arc<dyn EmbeddingProvider>>, backend: Backend) -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let index = Arc::new(EmbeddingIndex::new());
        let embeddings = EmbeddingService::initialize(
            providers,
            backend,
            EmbeddingCache::new(Duration::from_secs(60), 100),
        )
        .await;
        (
            SimilaritySearchEngine::new(store.clone(), index.clone(), embeddings),
            store,
            index,
        )
    }

    #[test]
    fn test_non_finite_inputs_rank_as_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[f32::INFINITY, 1.0]), Some(0.0));
        assert_eq!(cosine_similarity(&[f32::NAN, 0.0], &[1.0, 0.0]), Some(0.0));

        let ranked = rank(
            &[1.0, 0.0],
            candidates(&[
                ("low", &[0.0, 1.0]),
                ("mid", &[0.5, 0.5]),
                ("huge", &[f32::INFINITY, 1.0]),
                ("best", &[1.0, 0.0]),
            ]),
            10,
        );
        let keys: Vec<_> = ranked.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["best", "mid", "low", "huge"]);

        let top = rank(&[1.0, 0.0], candidates(&[("mid", &[0.5, 0.5]), ("best", &[1.0, 0.0])]), 1);
        assert_eq!(top[0].0, "best");
    }

    #[tokio::test]
    async fn test_each_backend_group_gets_its_own_query_embedding() {
        let http = StubProvider::new(Backend::Http).with_vector("query", vec![1.0, 0.0]);
        let local =
            StubProvider::new(Backend::LocalModel).with_vector("query", vec![0.0, 0.0, 1.0]);
        let (search, store, index) =
            engine_over(vec![Arc::new(http), Arc::new(local)], Backend::Http).await;

        store.put("h", "http record").await.unwrap();
        store.put("l", "local record").await.unwrap();
        index.insert("h", Embedding::new(Backend::Http, vec![0.6, 0.8])).await;
        index.insert("l", Embedding::new(Backend::LocalModel, vec![0.0, 0.0, 1.0])).await;

        let hits = search.semantic_search("query", 5).await.unwrap();
        let keys: Vec<_> = hits.iter().map(|h| h.key.as_str()).collect();
        assert_eq!(keys, vec!["l", "h"]);
        assert_eq!(hits[0].score, Some(1.0));

        let top = search.semantic_search("query", 1).await.unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].key, "l");
    }

    #[tokio::test]
    async fn test_semantic_search_scores_and_order() {
        let provider = StubProvider::new(Backend::Http).with_vector("query", vec![1.0, 0.0]);
        let (search, store, index) = engine(provider, Backend::Http).await;

        for (key, vector) in [("a", [1.0, 0.0]), ("b", [1.0, 0.0]), ("c", [0.0, 1.0])] {
            store.put(key, &format!("content {}", key)).await.unwrap();
            index.insert(key, Embedding::new(Backend::Http, vector.to_vec())).await;
        }

        let hits = search.search("query", 3).await.unwrap();
        let keys: Vec<_> = hits.iter().map(|h| h.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
        assert_eq!(hits[0].score, Some(1.0));
        assert_eq!(hits[1].score, Some(1.0));
        assert_eq!(hits[2].score, Some(0.0));
        assert_eq!(hits[0].content, "content a");
    }

    #[tokio::test]
    async fn test_missing_store_entry_is_skipped() {
        let provider = StubProvider::new(Backend::Http).with_default(vec![1.0, 0.0]);
        let (search, store, index) = engine(provider, Backend::Http).await;

        store.put("kept", "kept content").await.unwrap();
        index.insert("ghost", Embedding::new(Backend::Http, vec![1.0, 0.0])).await;
        index.insert("kept", Embedding::new(Backend::Http, vec![0.5, 0.5])).await;

        let hits = search.semantic_search("anything", 5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].key, "kept");
    }

    #[tokio::test]
    async fn test_falls_back_to_substring_when_query_embedding_fails() {
        let provider = StubProvider::new(Backend::Http).with_vector("stored", vec![1.0]);
        let (search, store, index) = engine(provider, Backend::Http).await;

        store.put("k1", "the sky is blue").await.unwrap();
        index.insert("k1", Embedding::new(Backend::Http, vec![1.0])).await;

        let hits = search.search("sky", 5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].key, "k1");
        assert_eq!(hits[0].score, None);
    }

    #[tokio::test]
    async fn test_vectors_from_other_backends_are_never_compared() {
        let provider = StubProvider::new(Backend::Http).with_default(vec![1.0, 0.0]);
        let (search, store, index) = engine(provider, Backend::Http).await;

        store.put("k1", "the sky is blue").await.unwrap();
        index.insert("k1", Embedding::new(Backend::LocalModel, vec![1.0, 0.0])).await;

        assert!(search.semantic_search("sky", 5).await.unwrap().is_empty());
        // Falls through to substring search
        let hits = search.search("sky", 5).await.unwrap();
        assert_eq!(hits[0].score, None);
    }

    #[tokio::test]
    async fn test_simple_backend_uses_substring_search() {
        let provider = StubProvider::new(Backend::Http).with_default(vec![1.0]);
        let (search, store, index) = engine(provider, Backend::Simple).await;

        store.put("k1", "grass is green").await.unwrap();
        index.insert("k1", Embedding::new(Backend::Http, vec![1.0])).await;

        let hits = search.search("green", 5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].score, None);
        assert!(search.search("purple", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_zero_limit_is_empty() {
        let provider = StubProvider::new(Backend::Http).with_default(vec![1.0]);
        let (search, store, _index) = engine(provider, Backend::Http).await;
        store.put("k1", "anything").await.unwrap();
        assert!(search.search("anything", 0).await.unwrap().is_empty());
    }
}

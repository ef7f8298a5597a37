//! Embedding index: storage key -> backend-tagged vector

use std::collections::{HashMap, HashSet};
use std::future::Future;
use tokio::sync::RwLock;

use super::embedding::Embedding;
use super::selector::Backend;
use crate::error::Result;

#[derive(Debug, Default)]
struct Inner {
    order: Vec<String>,
    seen: HashSet<String>,
    entries: HashMap<String, Embedding>,
}

impl Inner {
    fn put(&mut self, key: &str, embedding: Embedding) {
        if self.seen.insert(key.to_string()) {
            self.order.push(key.to_string());
        }
        self.entries.insert(key.to_string(), embedding);
    }
}

/// Vectors of successfully embedded records.
///
/// Iterates in first-insertion order so ranking ties stay deterministic.
#[derive(Debug, Default)]
pub struct EmbeddingIndex {
    inner: RwLock<Inner>,
}

impl EmbeddingIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the vector for `key`
    pub async fn insert(&self, key: &str, embedding: Embedding) {
        let mut inner = self.inner.write().await;
        inner.put(key, embedding);
    }

    /// Insert the vector for `key` only if `still_current` resolves true.
    ///
    /// The check runs under the write lock, so a `remove` issued after the
    /// check cannot be overtaken by this insert.
    pub async fn insert_if<F>(
        &self,
        key: &str,
        embedding: Embedding,
        still_current: F,
    ) -> Result<bool>
    where
        F: Future<Output = Result<bool>>,
    {
        let mut inner = self.inner.write().await;
        if !still_current.await? {
            return Ok(false);
        }
        inner.put(key, embedding);
        Ok(true)
    }

    /// Drop the vector for `key`, keeping its ordering slot
    pub async fn remove(&self, key: &str) -> Option<Embedding> {
        self.inner.write().await.entries.remove(key)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.entries.is_empty()
    }

    /// Backends with at least one indexed vector, in fallback order
    pub async fn backends(&self) -> Vec<Backend> {
        let inner = self.inner.read().await;
        Backend::FALLBACK_ORDER
            .into_iter()
            .filter(|backend| inner.entries.values().any(|e| e.backend == *backend))
            .collect()
    }

    /// Vectors produced by `backend`, in insertion order
    pub async fn snapshot(&self, backend: Backend) -> Vec<(String, Vec<f32>)> {
        let inner = self.inner.read().await;
        inner
            .order
            .iter()
            .filter_map(|key| {
                inner
                    .entries
                    .get(key)
                    .filter(|e| e.backend == backend)
                    .map(|e| (key.clone(), e.vector.clone()))
            })
            .collect()
    }
}

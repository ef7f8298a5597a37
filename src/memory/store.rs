//! Key-value storage for memory records
//!
//! The engine only sees [`KeyValueStore`]; [`InMemoryStore`] is the default
//! process-lifetime implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::error::Result;

/// A stored memory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub key: String,
    pub content: String,
}

/// Storage backend for memory records.
///
/// Records iterate in first-insertion order; storing an existing key
/// replaces its content in place.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Insert or overwrite a record
    async fn put(&self, key: &str, content: &str) -> Result<()>;

    /// Look up a record's content
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// All records in insertion order
    async fn records(&self) -> Result<Vec<MemoryRecord>>;

    /// Number of records
    async fn len(&self) -> Result<usize>;

    /// Records whose key or content contains `query`, in insertion order
    async fn find_substring(&self, query: &str, limit: usize) -> Result<Vec<MemoryRecord>> {
        Ok(self
            .records()
            .await?
            .into_iter()
            .filter(|r| r.key.contains(query) || r.content.contains(query))
            .take(limit)
            .collect())
    }
}

#[derive(Debug, Default)]
struct Inner {
    order: Vec<String>,
    records: HashMap<String, String>,
}

/// In-process store, no persistence
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn put(&self, key: &str, content: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner
            .records
            .insert(key.to_string(), content.to_string())
            .is_none()
        {
            inner.order.push(key.to_string());
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.inner.read().await.records.get(key).cloned())
    }

    async fn records(&self) -> Result<Vec<MemoryRecord>> {
        let inner = self.inner.read().await;
        Ok(inner
            .order
            .iter()
            .filter_map(|key| {
                inner.records.get(key).map(|content| MemoryRecord {
                    key: key.clone(),
                    content: content.clone(),
                })
            })
            .collect())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.inner.read().await.records.len())
    }

    async fn find_substring(&self, query: &str, limit: usize) -> Result<Vec<MemoryRecord>> {
        let inner = self.inner.read().await;
        Ok(inner
            .order
            .iter()
            .filter_map(|key| inner.records.get(key).map(|content| (key, content)))
            .filter(|(key, content)| key.contains(query) || content.contains(query))
            .take(limit)
            .map(|(key, content)| MemoryRecord {
                key: key.clone(),
                content: content.clone(),
            })
            .collect())
    }
}

//! In-process embedding cache
//!
//! Uses a moka async cache keyed by a SHA-256 content fingerprint, so the
//! same text stored under two keys shares one entry. Entries expire after
//! the configured TTL; moka treats an expired entry as absent on read.

use moka::future::Cache;
use sha2::{Digest, Sha256};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::embedding::Embedding;
use crate::error::{Error, Result};

/// Stable content identity of a text.
///
/// SHA-256 of the text with surrounding whitespace trimmed. Collisions are
/// assumed negligible; two texts that collide would share a vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn of(text: &str) -> Self {
        Fingerprint(Sha256::digest(text.trim().as_bytes()).into())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// TTL-bounded embedding cache
#[derive(Clone)]
pub struct EmbeddingCache {
    entries: Option<Cache<Fingerprint, Embedding>>,
}

impl EmbeddingCache {
    /// Create a cache holding at most `max_capacity` vectors for `ttl`.
    ///
    /// A zero TTL yields a disabled cache.
    pub fn new(ttl: Duration, max_capacity: u64) -> Self {
        if ttl.is_zero() {
            return Self::disabled();
        }
        EmbeddingCache {
            entries: Some(
                Cache::builder()
                    .max_capacity(max_capacity)
                    .time_to_live(ttl)
                    .build(),
            ),
        }
    }

    /// A cache that never stores anything
    pub fn disabled() -> Self {
        EmbeddingCache { entries: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.entries.is_some()
    }

    /// Get a cached embedding; expired entries are absent
    pub async fn get(&self, text: &str) -> Option<Embedding> {
        self.entries.as_ref()?.get(&Fingerprint::of(text)).await
    }

    /// Store an embedding; `None` is never cached
    pub async fn put(&self, text: &str, embedding: Option<Embedding>) {
        let (Some(entries), Some(embedding)) = (&self.entries, embedding) else {
            return;
        };
        entries.insert(Fingerprint::of(text), embedding).await;
    }

    /// Return the cached embedding for `text` or compute it with `init`.
    ///
    /// Concurrent misses for the same fingerprint await one shared `init`;
    /// an `Err` from `init` is handed to every waiter and not cached.
    pub async fn get_or_try_insert<F>(
        &self,
        text: &str,
        init: F,
    ) -> std::result::Result<Embedding, Arc<Error>>
    where
        F: Future<Output = Result<Embedding>>,
    {
        let Some(entries) = &self.entries else {
            return init.await.map_err(Arc::new);
        };

        let fingerprint = Fingerprint::of(text);
        let entry = entries.entry(fingerprint).or_try_insert_with(init).await?;
        if entry.is_fresh() {
            debug!(%fingerprint, "embedding cache miss");
        } else {
            debug!(%fingerprint, "embedding cache hit");
        }
        Ok(entry.into_value())
    }

    /// Approximate number of stored entries
    pub fn entry_count(&self) -> u64 {
        self.entries.as_ref().map_or(0, |e| e.entry_count())
    }
}

//! Memory module - embedding generation, caching, and retrieval
//!
//! Orchestrates backend selection, the embedding fallback chain, a
//! fingerprint-keyed embedding cache, and cosine-ranked search with a
//! substring fallback over an injected key-value store.

pub mod cache;
pub mod embedding;
pub mod engine;
pub mod http;
pub mod index;
pub mod local;
pub mod retrieval;
pub mod selector;
pub mod store;

pub use cache::{EmbeddingCache, Fingerprint};
pub use embedding::{Embedding, EmbeddingProvider, EmbeddingService};
pub use engine::{EngineStatus, MemoryEngine};
pub use http::HttpEmbeddingProvider;
pub use index::EmbeddingIndex;
pub use local::LocalEmbeddingProvider;
pub use retrieval::{cosine_similarity, SearchHit, SimilaritySearchEngine};
pub use selector::{select_backend, Availability, Backend, BackendState};
pub use store::{InMemoryStore, KeyValueStore, MemoryRecord};

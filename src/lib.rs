//! # Memori
//!
//! A small semantic-memory engine: store namespaced text fragments under a
//! key and retrieve the fragments most relevant to a query.
//!
//! ## Features
//!
//! - **Backend selection:** HTTP (OpenAI-compatible) or local fastembed embeddings,
//!   with a fixed fallback order and an explicit `simple` opt-out
//! - **Embedding cache:** content-fingerprinted, TTL-bounded, single-flight
//! - **Similarity search:** cosine ranking with a deterministic substring fallback
//! - **MCP server:** JSON-RPC `store_memory` / `search_memory` tools over HTTP

pub mod config;
pub mod error;
pub mod mcp;
pub mod memory;

pub use config::Config;
pub use error::{Error, Result};
pub use memory::{MemoryEngine, SearchHit};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const NAME: &str = env!("CARGO_PKG_NAME");

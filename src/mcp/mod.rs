//! MCP (Model Context Protocol) module
//!
//! Exposes the memory engine to MCP clients as two tools over JSON-RPC.
//!
//! ## Architecture
//!
//! - **protocol**: Wire protocol types (JSON-RPC based)
//! - **namespace**: `[project][agent]` key and query conventions
//! - **server**: axum router dispatching `initialize`, `tools/list` and `tools/call`
//!
//! ## Usage
//!
//! ```rust,no_run
//! use memori::config::SearchConfig;
//! use memori::MemoryEngine;
//! use std::sync::Arc;
//!
//! # async fn example() -> memori::Result<()> {
//! let engine = MemoryEngine::from_config(&SearchConfig::default()).await?;
//! engine.enable();
//!
//! let app = memori::mcp::router(Arc::new(engine));
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:4004").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

pub mod namespace;
pub mod protocol;
mod server;

pub use namespace::{memory_key, scoped_query, SearchScope};
pub use protocol::{McpRequest, McpResponse, McpTool, McpToolInput, McpToolResult};
pub use server::{dispatch, router};

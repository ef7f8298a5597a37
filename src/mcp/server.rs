//! MCP HTTP endpoint
//!
//! Translates `store_memory` / `search_memory` tool calls into engine calls.

use axum::{extract::State, routing::{get, post}, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{debug, warn};

use super::namespace::{memory_key, scoped_query, SearchScope};
use super::protocol::{
    McpRequest, McpResponse, McpTool, McpToolInput, McpToolResult, ToolCallParams,
    INTERNAL_ERROR, INVALID_PARAMS, METHOD_NOT_FOUND, PROTOCOL_VERSION,
};
use crate::memory::{MemoryEngine, SearchHit};
use crate::NAME;

/// Longest content excerpt echoed back by `store_memory`
const PREVIEW_CHARS: usize = 120;

#[derive(Debug, Deserialize)]
struct StoreMemoryArgs {
    #[serde(default)]
    content: String,
    #[serde(default = "default_project")]
    project_id: String,
    #[serde(default = "default_agent")]
    agent_role: String,
}

#[derive(Debug, Deserialize)]
struct SearchMemoryArgs {
    #[serde(default)]
    query: String,
    #[serde(default = "default_project")]
    project_id: String,
    #[serde(default)]
    agent_role: String,
    #[serde(default = "default_scope")]
    scope: String,
    #[serde(default = "default_limit")]
    limit: usize,
}

fn default_project() -> String {
    "default".to_string()
}

fn default_agent() -> String {
    "unknown".to_string()
}

fn default_scope() -> String {
    "agent".to_string()
}

fn default_limit() -> usize {
    5
}

/// Build the MCP router
pub fn router(engine: Arc<MemoryEngine>) -> Router {
    Router::new()
        .route("/mcp", post(handle_mcp))
        .route("/health", get(health))
        .with_state(engine)
        .layer(CorsLayer::permissive())
}

async fn handle_mcp(
    State(engine): State<Arc<MemoryEngine>>,
    Json(request): Json<McpRequest>,
) -> Json<McpResponse> {
    Json(dispatch(&engine, request).await)
}

async fn health(State(engine): State<Arc<MemoryEngine>>) -> Json<Value> {
    match engine.status().await {
        Ok(status) => Json(json!({
            "status": "healthy",
            "service": NAME,
            "engine": status,
        })),
        Err(e) => Json(json!({
            "status": "degraded",
            "service": NAME,
            "error": e.to_string(),
        })),
    }
}

/// Handle one JSON-RPC request
pub async fn dispatch(engine: &MemoryEngine, request: McpRequest) -> McpResponse {
    debug!("MCP request: method={}", request.method);
    let id = request.id;

    match request.method.as_str() {
        "initialize" => McpResponse::success(
            id,
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": { "tools": {} },
                "serverInfo": {
                    "name": NAME,
                    "version": env!("CARGO_PKG_VERSION")
                }
            }),
        ),
        "tools/list" => McpResponse::success(id, json!({ "tools": tool_definitions() })),
        "tools/call" => {
            let params = request.params.unwrap_or(Value::Null);
            let params: ToolCallParams = match serde_json::from_value(params) {
                Ok(params) => params,
                Err(e) => {
                    let message = format!("Invalid params: {}", e);
                    return McpResponse::failure(id, INVALID_PARAMS, message);
                }
            };
            call_tool(engine, id, params).await
        }
        other => McpResponse::failure(id, METHOD_NOT_FOUND, format!("Method not found: {}", other)),
    }
}

async fn call_tool(
    engine: &MemoryEngine,
    id: Option<Value>,
    params: ToolCallParams,
) -> McpResponse {
    match params.name.as_str() {
        "store_memory" => {
            let args: StoreMemoryArgs = match parse_args(params.arguments) {
                Ok(args) => args,
                Err(e) => return McpResponse::failure(id, INVALID_PARAMS, e),
            };

            let key = memory_key(&args.project_id, &args.agent_role, &args.content);
            if let Err(e) = engine.store(&key, &args.content).await {
                warn!("store_memory failed: {}", e);
                return McpResponse::failure(id, INTERNAL_ERROR, format!("Internal error: {}", e));
            }

            let text = format!(
                "✅ Stored memory for [{}] in [{}]: {}",
                args.agent_role,
                args.project_id,
                preview(&args.content)
            );
            tool_response(id, McpToolResult::text(text))
        }
        "search_memory" => {
            let args: SearchMemoryArgs = match parse_args(params.arguments) {
                Ok(args) => args,
                Err(e) => return McpResponse::failure(id, INVALID_PARAMS, e),
            };

            let query = scoped_query(
                &args.query,
                &args.project_id,
                Some(&args.agent_role),
                SearchScope::from_name(&args.scope),
            );

            let text = match engine.search(&query, args.limit).await {
                Ok(hits) if hits.is_empty() => format!(
                    "🔍 No memories found in [{}] for query: '{}'",
                    args.project_id, args.query
                ),
                Ok(hits) => format!(
                    "🔍 Found {} memory entries in [{}] for: '{}'\n\n{}",
                    hits.len(),
                    args.project_id,
                    args.query,
                    format_hits(&hits)
                ),
                Err(e) => {
                    warn!("search_memory failed: {}", e);
                    format!("❌ Memory search error: {}", e)
                }
            };
            tool_response(id, McpToolResult::text(text))
        }
        other => McpResponse::failure(id, METHOD_NOT_FOUND, format!("Unknown tool: {}", other)),
    }
}

fn parse_args<T: for<'de> Deserialize<'de>>(arguments: Value) -> Result<T, String> {
    let arguments = if arguments.is_null() { json!({}) } else { arguments };
    serde_json::from_value(arguments).map_err(|e| format!("Invalid tool arguments: {}", e))
}

fn tool_response(id: Option<Value>, result: McpToolResult) -> McpResponse {
    match serde_json::to_value(result) {
        Ok(value) => McpResponse::success(id, value),
        Err(e) => McpResponse::failure(id, INTERNAL_ERROR, format!("Internal error: {}", e)),
    }
}

fn preview(content: &str) -> String {
    let mut chars = content.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

/// Render hits as `Key` / `Content` / `Similarity` blocks
fn format_hits(hits: &[SearchHit]) -> String {
    hits.iter()
        .map(|hit| {
            let mut block = format!("Key: {}\nContent: {}\n", hit.key, hit.content);
            if let Some(score) = hit.score {
                block.push_str(&format!("Similarity: {:.4}\n", score));
            }
            block
        })
        .collect::<Vec<_>>()
        .join("\n---\n")
}

fn tool_definitions() -> Vec<McpTool> {
    vec![
        McpTool {
            name: "store_memory".to_string(),
            description: "Store information with agent memory namespacing".to_string(),
            input_schema: McpToolInput {
                schema_type: "object".to_string(),
                properties: json!({
                    "content": { "type": "string", "description": "Content to remember" },
                    "project_id": { "type": "string", "description": "Project identifier" },
                    "agent_role": {
                        "type": "string",
                        "description": "Agent role for partitioning memory"
                    }
                }),
                required: vec!["content".to_string(), "project_id".to_string()],
            },
        },
        McpTool {
            name: "search_memory".to_string(),
            description: "Search stored memories by project and agent context".to_string(),
            input_schema: McpToolInput {
                schema_type: "object".to_string(),
                properties: json!({
                    "query": { "type": "string", "description": "Search query" },
                    "project_id": { "type": "string", "description": "Project identifier" },
                    "agent_role": {
                        "type": "string",
                        "description": "Agent role for agent-isolated search"
                    },
                    "scope": {
                        "type": "string",
                        "description": "Scope: agent (default), project, or global",
                        "default": "agent"
                    },
                    "limit": {
                        "type": "integer",
                        "description": "Maximum number of results",
                        "default": 5
                    }
                }),
                required: vec!["query".to_string(), "project_id".to_string()],
            },
        },
    ]
}

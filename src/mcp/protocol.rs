//! MCP wire protocol types
//!
//! Server side of the Model Context Protocol (JSON-RPC 2.0).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Protocol revision advertised by `initialize`
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// JSON-RPC error codes
pub const INVALID_PARAMS: i64 = -32602;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INTERNAL_ERROR: i64 = -32603;

fn default_jsonrpc() -> String {
    "2.0".to_string()
}

/// JSON-RPC request from an MCP client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpRequest {
    #[serde(default = "default_jsonrpc")]
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl McpRequest {
    /// Create a new MCP request
    pub fn new(id: u64, method: impl Into<String>, params: Option<Value>) -> Self {
        McpRequest {
            jsonrpc: default_jsonrpc(),
            id: Some(Value::from(id)),
            method: method.into(),
            params,
        }
    }

    /// Create a tools/call request
    pub fn call_tool(id: u64, name: impl Into<String>, arguments: Value) -> Self {
        Self::new(
            id,
            "tools/call",
            Some(serde_json::json!({
                "name": name.into(),
                "arguments": arguments
            })),
        )
    }
}

/// JSON-RPC response to an MCP client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpResponse {
    pub jsonrpc: String,
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<McpError>,
}

impl McpResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        McpResponse {
            jsonrpc: default_jsonrpc(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Option<Value>, code: i64, message: impl Into<String>) -> Self {
        McpResponse {
            jsonrpc: default_jsonrpc(),
            id,
            result: None,
            error: Some(McpError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }
}

/// MCP error
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Tool definition advertised by `tools/list`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpTool {
    /// Tool name
    pub name: String,
    /// Tool description
    #[serde(default)]
    pub description: String,
    /// Input schema (JSON Schema)
    #[serde(rename = "inputSchema")]
    pub input_schema: McpToolInput,
}

/// Tool input schema
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpToolInput {
    #[serde(rename = "type")]
    pub schema_type: String,
    #[serde(default)]
    pub properties: Value,
    #[serde(default)]
    pub required: Vec<String>,
}

/// Content block returned by a tool call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpContent {
    #[serde(rename = "type")]
    pub content_type: String,
    #[serde(default)]
    pub text: Option<String>,
}

impl McpContent {
    pub fn text(text: impl Into<String>) -> Self {
        McpContent {
            content_type: "text".to_string(),
            text: Some(text.into()),
        }
    }
}

/// Result of a tools/call request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpToolResult {
    pub content: Vec<McpContent>,
    #[serde(rename = "isError", default)]
    pub is_error: bool,
}

impl McpToolResult {
    pub fn text(text: impl Into<String>) -> Self {
        McpToolResult {
            content: vec![McpContent::text(text)],
            is_error: false,
        }
    }
}

/// Parameters of a tools/call request
#[derive(Debug, Clone, Deserialize)]
pub struct ToolCallParams {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

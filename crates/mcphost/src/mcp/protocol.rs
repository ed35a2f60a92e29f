//! JSON-RPC 2.0 framing and the few MCP payloads the host understands
use serde::Deserialize;
use serde_json::{json, Value};

use crate::models::content::Content;

pub const PROTOCOL_VERSION: &str = "2024-11-05";
pub const METHOD_NOT_FOUND: i64 = -32601;

pub fn request(id: u64, method: &str, params: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
        "params": params
    })
}

pub fn notification(method: &str, params: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "method": method,
        "params": params
    })
}

pub fn response(id: Value, result: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result
    })
}

pub fn error_response(id: Value, code: i64, message: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {"code": code, "message": message}
    })
}

pub fn initialize_params() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "clientInfo": {
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION")
        },
        "capabilities": {}
    })
}

/// A message received from a server, sorted by what the client must do with it
#[derive(Debug, PartialEq)]
pub enum Incoming {
    Response {
        id: u64,
        result: Result<Value, (i64, String)>,
    },
    Request {
        id: Value,
        method: String,
    },
    Notification {
        method: String,
    },
    Unrecognized,
}

impl Incoming {
    pub fn classify(value: Value) -> Self {
        let method = value
            .get("method")
            .and_then(Value::as_str)
            .map(str::to_string);

        match (value.get("id"), method) {
            (Some(id), Some(method)) => Incoming::Request {
                id: id.clone(),
                method,
            },
            (None, Some(method)) => Incoming::Notification { method },
            (Some(id), None) => {
                let id = match id {
                    Value::Number(n) => n.as_u64(),
                    Value::String(s) => s.parse().ok(),
                    _ => None,
                };
                let Some(id) = id else {
                    return Incoming::Unrecognized;
                };
                let result = match value.get("error") {
                    Some(error) => Err((
                        error.get("code").and_then(Value::as_i64).unwrap_or(-32000),
                        error
                            .get("message")
                            .and_then(Value::as_str)
                            .unwrap_or("unknown error")
                            .to_string(),
                    )),
                    None => Ok(value.get("result").cloned().unwrap_or(Value::Null)),
                };
                Incoming::Response { id, result }
            }
            (None, None) => Incoming::Unrecognized,
        }
    }
}

fn empty_schema() -> Value {
    json!({"type": "object", "properties": {}})
}

/// A tool as the server reports it, before namespacing
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInfo {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "empty_schema")]
    pub input_schema: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListToolsResult {
    #[serde(default)]
    pub tools: Vec<ToolInfo>,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCallToolResult {
    #[serde(default)]
    content: Vec<Value>,
    #[serde(default)]
    is_error: bool,
}

/// Output of `tools/call`
#[derive(Debug, Clone, PartialEq)]
pub struct CallToolResult {
    pub content: Vec<Content>,
    pub is_error: bool,
}

impl CallToolResult {
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        let raw: RawCallToolResult = serde_json::from_value(value)?;
        Ok(Self {
            content: raw.content.into_iter().map(Content::from_value).collect(),
            is_error: raw.is_error,
        })
    }
}

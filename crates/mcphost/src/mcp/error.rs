use std::time::Duration;
use thiserror::Error;

/// Failures of a single request to a connected tool server
#[derive(Debug, Error)]
pub enum McpError {
    #[error("MCP server '{server}' transport error: {message}")]
    Transport { server: String, message: String },

    #[error("MCP server '{server}' returned JSON-RPC error {code}: {message}")]
    Rpc {
        server: String,
        code: i64,
        message: String,
    },

    #[error("MCP server '{server}' sent an unexpected result: {message}")]
    InvalidResult { server: String, message: String },

    #[error("MCP server '{server}' did not answer '{method}' within {timeout:?}")]
    Timeout {
        server: String,
        method: String,
        timeout: Duration,
    },

    #[error("MCP server '{server}' connection closed")]
    Closed { server: String },
}

/// Failures while bringing a tool server up. Any of these aborts startup.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("failed to spawn MCP server '{server}': {source}")]
    Spawn {
        server: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to connect to MCP server '{server}': {message}")]
    Connect { server: String, message: String },

    #[error("MCP server '{server}' failed to initialize: {source}")]
    Handshake {
        server: String,
        #[source]
        source: McpError,
    },

    #[error("MCP server '{server}' did not connect within {timeout:?}")]
    Timeout { server: String, timeout: Duration },
}

impl ConnectionError {
    pub fn server(&self) -> &str {
        match self {
            ConnectionError::Spawn { server, .. }
            | ConnectionError::Connect { server, .. }
            | ConnectionError::Handshake { server, .. }
            | ConnectionError::Timeout { server, .. } => server,
        }
    }
}

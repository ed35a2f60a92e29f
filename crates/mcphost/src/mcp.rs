//! Client side of the Model Context Protocol, over a spawned process or an SSE stream
use std::time::Duration;

use crate::config::ServerConfig;

pub mod client;
pub mod error;
pub mod protocol;
pub mod sse;
pub mod stdio;

#[cfg(test)]
pub mod mock;

pub use client::{McpClient, RpcClient};
pub use error::{ConnectionError, McpError};

/// Connect to a configured server and complete the handshake
pub async fn connect(
    name: &str,
    config: &ServerConfig,
    request_timeout: Duration,
) -> Result<RpcClient, ConnectionError> {
    match config {
        ServerConfig::Stdio(stdio) => stdio::connect_stdio(name, stdio, request_timeout).await,
        ServerConfig::Sse(sse) => sse::connect_sse(name, sse, request_timeout).await,
    }
}

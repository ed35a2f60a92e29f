use std::time::Duration;

use thiserror::Error;

use crate::providers::errors::ProviderError;

/// Failures that end the current user turn. The session survives all of them.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Model call failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("Model still overloaded after {retries} retries: {source}")]
    RetriesExhausted {
        retries: u32,
        #[source]
        source: ProviderError,
    },

    #[error("Model call timed out after {0:?}")]
    ModelTimeout(Duration),

    #[error("Stopped after {0} tool-calling rounds without a final answer")]
    ToolRoundLimit(usize),
}

pub type AgentResult<T> = Result<T, AgentError>;

/// Failures while dispatching a single tool call. These never end a turn.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolError {
    #[error("Invalid tool name format: {0}")]
    InvalidToolName(String),

    #[error("Server not found: {0}")]
    ServerNotFound(String),

    #[error("Tool execution failed: {0}")]
    ExecutionError(String),

    #[error("Tool call timed out after {0:?}")]
    Timeout(Duration),
}

pub type ToolResult<T> = Result<T, ToolError>;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::errors::ProviderError;
use crate::models::message::Message;
use crate::models::tool::Tool;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: Option<i32>,
    pub output_tokens: Option<i32>,
    pub total_tokens: Option<i32>,
}

impl Usage {
    pub fn new(
        input_tokens: Option<i32>,
        output_tokens: Option<i32>,
        total_tokens: Option<i32>,
    ) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens,
        }
    }

    /// Whether the backend reported any token counts for the turn
    pub fn is_reported(&self) -> bool {
        self.input_tokens.unwrap_or(0) > 0 || self.output_tokens.unwrap_or(0) > 0
    }
}

/// Base trait for AI providers (OpenAI, Anthropic, etc)
///
/// A provider is bound to one backend, model and system prompt when it is built,
/// and the agent never swaps it during a session.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Short backend name, e.g. `anthropic`
    fn name(&self) -> &str;

    /// The model this provider sends requests to
    fn model(&self) -> &str;

    /// Generate the next assistant message for the history, offering the given tools
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<(Message, Usage), ProviderError>;
}

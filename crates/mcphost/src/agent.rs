use serde_json::Value;
use tracing::{debug, info};

use crate::config::AgentConfig;
use crate::errors::{AgentError, AgentResult, ToolError};
use crate::history::prune_messages;
use crate::models::message::{Message, ToolRequest, ToolResponse};
use crate::models::tool::Tool;
use crate::output::{render_assistant_text, AgentEvent, Output};
use crate::providers::base::{Provider, Usage};
use crate::registry::ToolRegistry;

/// Agent integrates a foundational LLM with the tool servers it needs to pilot
pub struct Agent {
    provider: Box<dyn Provider>,
    registry: ToolRegistry,
    config: AgentConfig,
    messages: Vec<Message>,
}

impl Agent {
    pub fn new(provider: Box<dyn Provider>, registry: ToolRegistry, config: AgentConfig) -> Self {
        Self {
            provider,
            registry,
            config,
            messages: Vec::new(),
        }
    }

    /// The conversation so far
    pub fn history(&self) -> &[Message] {
        &self.messages
    }

    /// The namespaced tools offered to the model
    pub fn tools(&self) -> &[Tool] {
        self.registry.tools()
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Run one user turn to completion: call the model, run the tools it asks
    /// for, feed the results back, and repeat until it stops asking.
    ///
    /// An empty prompt continues the conversation without adding a user message.
    pub async fn handle_user_turn(
        &mut self,
        prompt: &str,
        output: &mut dyn Output,
    ) -> AgentResult<()> {
        self.messages = prune_messages(&self.messages, self.config.message_window);

        if !prompt.is_empty() {
            output.user_prompt(prompt);
            self.messages.push(Message::user().with_text(prompt));
        }

        let mut rounds = 0;
        loop {
            let (response, usage) = self.call_model(output).await?;
            if usage.is_reported() {
                info!(
                    input = usage.input_tokens.unwrap_or(0),
                    output = usage.output_tokens.unwrap_or(0),
                    total = usage.total_tokens.unwrap_or(0),
                    "Token usage"
                );
                output.event(&AgentEvent::Usage(usage));
            }

            let text = response.text();
            let mut assistant = Message::assistant();
            if !text.is_empty() {
                render_assistant_text(output, &text);
                assistant = assistant.with_text(text);
            }

            let mut results = Vec::new();
            for request in response.tool_requests() {
                assistant =
                    assistant.with_tool_request(request.id.clone(), request.tool_call.clone());
                if let Some(result) = self.run_tool(request, output).await {
                    results.push(result);
                }
            }
            self.messages.push(assistant);

            if results.is_empty() {
                return Ok(());
            }
            for result in results {
                self.messages.push(Message::tool().with_tool_response(result));
            }

            rounds += 1;
            if rounds >= self.config.max_tool_rounds {
                return Err(AgentError::ToolRoundLimit(rounds));
            }
            debug!(round = rounds, "Continuing with tool results");
        }
    }

    /// Close every tool server connection. Safe to call more than once.
    pub async fn shutdown(&mut self) {
        self.registry.close_all().await;
    }

    async fn call_model(&self, output: &mut dyn Output) -> AgentResult<(Message, Usage)> {
        output.event(&AgentEvent::ModelCall {
            provider: self.provider.name().to_string(),
            model: self.provider.model().to_string(),
        });

        let timeout = self.config.model_timeout;
        let provider = self.provider.as_ref();
        let messages = self.messages.as_slice();
        let tools = self.registry.tools();

        output.show_busy();
        let result = self
            .config
            .retry
            .run(
                move || async move {
                    match tokio::time::timeout(timeout, provider.complete(messages, tools)).await {
                        Ok(result) => result.map_err(AgentError::from),
                        Err(_) => Err(AgentError::ModelTimeout(timeout)),
                    }
                },
                |attempt, delay, error| {
                    output.event(&AgentEvent::RetryScheduled {
                        attempt,
                        delay,
                        reason: error.to_string(),
                    })
                },
            )
            .await;
        output.hide_busy();
        result
    }

    /// Run one requested tool. Returns the result to feed back to the model, or
    /// nothing when the request cannot be attributed to a tool at all.
    async fn run_tool(
        &self,
        request: &ToolRequest,
        output: &mut dyn Output,
    ) -> Option<ToolResponse> {
        let call = &request.tool_call;
        info!(name = %call.name, id = %request.id, "Calling tool");

        if !matches!(call.arguments, Value::Object(_) | Value::Null) {
            output.error(&format!(
                "Failed to parse tool arguments for {}: {}",
                call.name, call.arguments
            ));
            return None;
        }

        output.event(&AgentEvent::ToolCallStarted {
            name: call.name.clone(),
        });
        output.show_busy();
        let result = self.registry.dispatch(call, self.config.tool_timeout).await;
        output.hide_busy();

        match result {
            Ok(result) => {
                output.event(&AgentEvent::ToolCallFinished {
                    name: call.name.clone(),
                    is_error: result.is_error,
                });
                Some(
                    ToolResponse::success(request.id.clone(), result.content)
                        .with_error_flag(result.is_error),
                )
            }
            Err(err @ ToolError::InvalidToolName(_)) => {
                output.error(&err.to_string());
                None
            }
            Err(err) => {
                let message = format!("Error calling tool {}: {}", call.name, err);
                output.error(&message);
                output.event(&AgentEvent::ToolCallFinished {
                    name: call.name.clone(),
                    is_error: true,
                });
                Some(ToolResponse::error(request.id.clone(), message))
            }
        }
    }
}

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

use super::base::{Provider, Usage};
use super::configs::AnthropicProviderConfig;
use super::errors::ProviderError;
use super::utils::{convert_image, handle_response, ImageFormat};
use crate::models::content::Content;
use crate::models::message::{Message, MessageContent};
use crate::models::role::Role;
use crate::models::tool::{Tool, ToolCall};

const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    client: Client,
    config: AnthropicProviderConfig,
}

impl AnthropicProvider {
    pub fn new(config: AnthropicProviderConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()?;

        Ok(Self { client, config })
    }

    fn get_usage(data: &Value) -> Usage {
        let usage = &data["usage"];
        let input_tokens = usage["input_tokens"].as_i64().and_then(|v| i32::try_from(v).ok());
        let output_tokens = usage["output_tokens"].as_i64().and_then(|v| i32::try_from(v).ok());
        let total_tokens = match (input_tokens, output_tokens) {
            (Some(input), Some(output)) => input.checked_add(output),
            _ => None,
        };
        Usage::new(input_tokens, output_tokens, total_tokens)
    }

    fn content_to_anthropic_spec(content: &Content) -> Value {
        match content {
            Content::Text(text) => json!({"type": "text", "text": text.text}),
            Content::Image(image) => convert_image(image, &ImageFormat::Anthropic),
            Content::Resource(_) => json!({"type": "text", "text": content.summary()}),
        }
    }

    /// Tool results travel as user messages, and the API wants roles to
    /// alternate, so consecutive messages with the same role are merged.
    fn messages_to_anthropic_spec(messages: &[Message]) -> Vec<Value> {
        let mut anthropic_messages: Vec<Value> = Vec::new();

        for message in messages {
            let role = match message.role {
                Role::Assistant => "assistant",
                Role::User | Role::Tool => "user",
                Role::System => continue,
            };

            let mut blocks = Vec::new();
            for content in &message.content {
                match content {
                    MessageContent::Text(text) => {
                        if !text.text.is_empty() {
                            blocks.push(json!({"type": "text", "text": text.text}));
                        }
                    }
                    MessageContent::ToolRequest(request) => {
                        let input = match &request.tool_call.arguments {
                            Value::Object(_) => request.tool_call.arguments.clone(),
                            _ => json!({}),
                        };
                        blocks.push(json!({
                            "type": "tool_use",
                            "id": request.id,
                            "name": request.tool_call.name,
                            "input": input,
                        }));
                    }
                    MessageContent::ToolResponse(response) => {
                        let content: Vec<Value> = response
                            .content
                            .iter()
                            .map(Self::content_to_anthropic_spec)
                            .collect();
                        blocks.push(json!({
                            "type": "tool_result",
                            "tool_use_id": response.id,
                            "content": content,
                            "is_error": response.is_error,
                        }));
                    }
                }
            }

            if blocks.is_empty() {
                continue;
            }

            match anthropic_messages.last_mut() {
                Some(last) if last["role"] == role => {
                    if let Some(existing) = last["content"].as_array_mut() {
                        existing.extend(blocks);
                    }
                }
                _ => anthropic_messages.push(json!({"role": role, "content": blocks})),
            }
        }

        anthropic_messages
    }

    fn tools_to_anthropic_spec(tools: &[Tool]) -> Vec<Value> {
        tools
            .iter()
            .map(|tool| {
                json!({
                    "name": tool.name,
                    "description": tool.description,
                    "input_schema": tool.input_schema,
                })
            })
            .collect()
    }

    fn response_to_message(response: &Value) -> Result<Message, ProviderError> {
        let blocks = response
            .get("content")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                ProviderError::InvalidResponse("missing content in Anthropic response".to_string())
            })?;

        let mut message = Message::assistant();
        for block in blocks {
            match block["type"].as_str() {
                Some("text") => {
                    if let Some(text) = block["text"].as_str() {
                        message = message.with_text(text);
                    }
                }
                Some("tool_use") => {
                    let id = block["id"].as_str().unwrap_or_default();
                    let name = block["name"].as_str().unwrap_or_default();
                    let input = block.get("input").cloned().unwrap_or_else(|| json!({}));
                    message = message.with_tool_request(id, ToolCall::new(name, input));
                }
                _ => {}
            }
        }
        Ok(message)
    }

    async fn post(&self, payload: Value) -> Result<Value, ProviderError> {
        let url = format!("{}/v1/messages", self.config.host.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&payload)
            .send()
            .await?;

        handle_response(response).await
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn complete(
        &self,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<(Message, Usage), ProviderError> {
        let mut payload = json!({
            "model": self.config.model,
            "messages": Self::messages_to_anthropic_spec(messages),
            "max_tokens": self.config.max_tokens,
        });

        if !self.config.system_prompt.is_empty() {
            payload["system"] = json!(self.config.system_prompt);
        }
        if !tools.is_empty() {
            payload["tools"] = json!(Self::tools_to_anthropic_spec(tools));
        }
        if let Some(temp) = self.config.temperature {
            payload["temperature"] = json!(temp);
        }

        let response = self.post(payload).await?;

        let message = Self::response_to_message(&response)?;
        let usage = Self::get_usage(&response);

        Ok((message, usage))
    }
}

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

use super::base::{Provider, Usage};
use super::configs::GoogleProviderConfig;
use super::errors::ProviderError;
use super::utils::handle_response;
use crate::models::message::{Message, MessageContent};
use crate::models::role::Role;
use crate::models::tool::{Tool, ToolCall};

/// JSON schema keys the gemini function declarations reject
const UNSUPPORTED_SCHEMA_KEYS: &[&str] = &["$schema", "additionalProperties"];

pub struct GoogleProvider {
    client: Client,
    config: GoogleProviderConfig,
}

impl GoogleProvider {
    pub fn new(config: GoogleProviderConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()?;

        Ok(Self { client, config })
    }

    fn get_usage(data: &Value) -> Usage {
        let usage = &data["usageMetadata"];
        Usage::new(
            usage["promptTokenCount"].as_i64().and_then(|v| i32::try_from(v).ok()),
            usage["candidatesTokenCount"].as_i64().and_then(|v| i32::try_from(v).ok()),
            usage["totalTokenCount"].as_i64().and_then(|v| i32::try_from(v).ok()),
        )
    }

    /// Gemini has no call ids, so function responses are matched back to the
    /// name of the request that produced them.
    fn messages_to_google_spec(messages: &[Message]) -> Vec<Value> {
        let names: HashMap<&str, &str> = messages
            .iter()
            .flat_map(|message| message.tool_requests())
            .map(|request| (request.id.as_str(), request.tool_call.name.as_str()))
            .collect();

        let mut contents: Vec<Value> = Vec::new();
        for message in messages {
            let role = match message.role {
                Role::Assistant => "model",
                Role::User | Role::Tool => "user",
                Role::System => continue,
            };

            let mut parts = Vec::new();
            for content in &message.content {
                match content {
                    MessageContent::Text(text) => {
                        if !text.text.is_empty() {
                            parts.push(json!({"text": text.text}));
                        }
                    }
                    MessageContent::ToolRequest(request) => {
                        let args = match &request.tool_call.arguments {
                            Value::Object(_) => request.tool_call.arguments.clone(),
                            _ => json!({}),
                        };
                        parts.push(json!({
                            "functionCall": {"name": request.tool_call.name, "args": args}
                        }));
                    }
                    MessageContent::ToolResponse(response) => {
                        let name = names.get(response.id.as_str()).copied().unwrap_or_default();
                        let key = if response.is_error { "error" } else { "content" };
                        let mut body = Map::new();
                        body.insert(key.to_string(), json!(response.text));
                        parts.push(json!({
                            "functionResponse": {"name": name, "response": body}
                        }));
                    }
                }
            }

            if parts.is_empty() {
                continue;
            }

            match contents.last_mut() {
                Some(last) if last["role"] == role => {
                    if let Some(existing) = last["parts"].as_array_mut() {
                        existing.extend(parts);
                    }
                }
                _ => contents.push(json!({"role": role, "parts": parts})),
            }
        }
        contents
    }

    fn strip_unsupported_keys(schema: &Value) -> Value {
        match schema {
            Value::Object(map) => {
                let cleaned: Map<String, Value> = map
                    .iter()
                    .filter(|(key, _)| !UNSUPPORTED_SCHEMA_KEYS.contains(&key.as_str()))
                    .map(|(key, value)| (key.clone(), Self::strip_unsupported_keys(value)))
                    .collect();
                Value::Object(cleaned)
            }
            Value::Array(items) => {
                Value::Array(items.iter().map(Self::strip_unsupported_keys).collect())
            }
            other => other.clone(),
        }
    }

    fn tools_to_google_spec(tools: &[Tool]) -> Vec<Value> {
        let declarations: Vec<Value> = tools
            .iter()
            .map(|tool| {
                let mut declaration = json!({
                    "name": tool.name,
                    "description": tool.description,
                });
                let has_properties = tool.input_schema["properties"]
                    .as_object()
                    .is_some_and(|properties| !properties.is_empty());
                // an object schema without properties is rejected
                if has_properties {
                    declaration["parameters"] = Self::strip_unsupported_keys(&tool.input_schema);
                }
                declaration
            })
            .collect();
        vec![json!({"functionDeclarations": declarations})]
    }

    fn response_to_message(response: &Value) -> Result<Message, ProviderError> {
        let parts = response["candidates"][0]["content"]["parts"]
            .as_array()
            .ok_or_else(|| {
                ProviderError::InvalidResponse("no candidates in Gemini response".to_string())
            })?;

        let mut message = Message::assistant();
        for part in parts {
            if let Some(text) = part["text"].as_str() {
                message = message.with_text(text);
            } else if let Some(call) = part.get("functionCall") {
                let name = call["name"].as_str().unwrap_or_default();
                let args = call.get("args").cloned().unwrap_or_else(|| json!({}));
                message = message
                    .with_tool_request(Uuid::new_v4().to_string(), ToolCall::new(name, args));
            }
        }
        Ok(message)
    }

    async fn post(&self, payload: Value) -> Result<Value, ProviderError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.host.trim_end_matches('/'),
            self.config.model
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(&payload)
            .send()
            .await?;

        handle_response(response).await
    }
}

#[async_trait]
impl Provider for GoogleProvider {
    fn name(&self) -> &str {
        "google"
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
            "contents": Self::messages_to_google_spec(messages),
        });
        if !self.config.system_prompt.is_empty() {
            payload["systemInstruction"] = json!({"parts": [{"text": self.config.system_prompt}]});
        }
        if !tools.is_empty() {
            payload["tools"] = json!(Self::tools_to_google_spec(tools));
        }

        let response = self.post(payload).await?;

        let message = Self::response_to_message(&response)?;
        let usage = Self::get_usage(&response);

        Ok((message, usage))
    }
}

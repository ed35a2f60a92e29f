use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

use super::base::{Provider, Usage};
use super::configs::OpenAiProviderConfig;
use super::errors::ProviderError;
use super::utils::{
    get_openai_usage, handle_response, messages_to_openai_spec, openai_response_to_message,
    tools_to_openai_spec, ImageFormat,
};
use crate::models::message::Message;
use crate::models::tool::Tool;

pub struct OpenAiProvider {
    client: Client,
    config: OpenAiProviderConfig,
}

impl OpenAiProvider {
    pub fn new(config: OpenAiProviderConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()?;

        Ok(Self { client, config })
    }

    async fn post(&self, payload: Value) -> Result<Value, ProviderError> {
        let url = format!(
            "{}/v1/chat/completions",
            self.config.host.trim_end_matches('/')
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&payload)
            .send()
            .await?;

        handle_response(response).await
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn complete(
        &self,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<(Message, Usage), ProviderError> {
        let mut messages_array = Vec::new();
        if !self.config.system_prompt.is_empty() {
            messages_array.push(json!({
                "role": "system",
                "content": self.config.system_prompt
            }));
        }
        messages_array.extend(messages_to_openai_spec(messages, &ImageFormat::OpenAi));

        let mut payload = json!({
            "model": self.config.model,
            "messages": messages_array
        });

        if !tools.is_empty() {
            payload["tools"] = json!(tools_to_openai_spec(tools)?);
        }
        if let Some(temp) = self.config.temperature {
            payload["temperature"] = json!(temp);
        }
        if let Some(tokens) = self.config.max_tokens {
            payload["max_tokens"] = json!(tokens);
        }

        let response = self.post(payload).await?;

        let message = openai_response_to_message(&response, tools)?;
        let usage = get_openai_usage(&response);

        Ok((message, usage))
    }
}

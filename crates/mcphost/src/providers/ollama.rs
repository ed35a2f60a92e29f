use super::base::{Provider, Usage};
use super::configs::OllamaProviderConfig;
use super::errors::ProviderError;
use super::utils::{
    get_openai_usage, handle_response, messages_to_openai_spec, openai_response_to_message,
    tools_to_openai_spec, ImageFormat,
};
use crate::models::message::Message;
use crate::models::tool::Tool;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

/// Talks to a local ollama server through its OpenAI compatible endpoint
pub struct OllamaProvider {
    client: Client,
    config: OllamaProviderConfig,
}

impl OllamaProvider {
    pub fn new(config: OllamaProviderConfig) -> Result<Self, ProviderError> {
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

        let response = self.client.post(&url).json(&payload).send().await?;

        handle_response(response).await
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
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

        let response = self.post(payload).await?;

        let message = openai_response_to_message(&response, tools)?;
        let usage = get_openai_usage(&response);

        Ok((message, usage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_complete_with_tools() -> Result<()> {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(json!({"model": "qwen2.5:3b"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{
                    "message": {
                        "role": "assistant",
                        "content": "",
                        "tool_calls": [{
                            "id": "call_0",
                            "type": "function",
                            "function": {"name": "fs__list", "arguments": "{\"path\":\"/tmp\"}"}
                        }]
                    }
                }]
            })))
            .mount(&mock_server)
            .await;

        let provider = OllamaProvider::new(OllamaProviderConfig {
            host: mock_server.uri(),
            model: "qwen2.5:3b".to_string(),
            system_prompt: String::new(),
        })?;

        let tool = Tool::new("fs__list", "List a directory", json!({"type": "object"}));
        let (message, usage) = provider
            .complete(&[Message::user().with_text("ls /tmp")], &[tool])
            .await?;

        assert_eq!(provider.model(), "qwen2.5:3b");
        assert!(!message.has_text());
        assert_eq!(message.tool_requests().count(), 1);
        assert_eq!(usage, Usage::default());
        Ok(())
    }
}

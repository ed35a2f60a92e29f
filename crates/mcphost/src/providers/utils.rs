use regex::Regex;
use reqwest::Response;
use serde_json::{json, Map, Value};
use std::sync::OnceLock;

use super::base::Usage;
use super::errors::ProviderError;
use crate::models::content::{Content, ImageContent};
use crate::models::message::{Message, MessageContent};
use crate::models::role::Role;
use crate::models::tool::{Tool, ToolCall};

#[derive(Debug, Copy, Clone)]
pub enum ImageFormat {
    OpenAi,
    Anthropic,
}

/// Turn an HTTP response into its JSON body, or the provider error it describes
pub async fn handle_response(response: Response) -> Result<Value, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ProviderError::from_response(status.as_u16(), &body))
}

/// Convert internal Message format to OpenAI's API message specification
pub fn messages_to_openai_spec(messages: &[Message], image_format: &ImageFormat) -> Vec<Value> {
    let mut messages_spec = Vec::new();

    for message in messages {
        let role = match message.role {
            Role::Tool => Role::User,
            role => role,
        };
        let mut converted = Map::new();
        converted.insert("role".to_string(), json!(role.as_str()));

        let mut text = Vec::new();
        let mut tool_calls = Vec::new();
        let mut output = Vec::new();

        for content in &message.content {
            match content {
                MessageContent::Text(t) => {
                    if !t.text.is_empty() {
                        text.push(t.text.as_str());
                    }
                }
                MessageContent::ToolRequest(request) => {
                    tool_calls.push(json!({
                        "id": request.id,
                        "type": "function",
                        "function": {
                            "name": sanitize_function_name(&request.tool_call.name),
                            "arguments": request.tool_call.arguments.to_string(),
                        }
                    }));
                }
                MessageContent::ToolResponse(response) => {
                    let mut tool_content = Vec::new();
                    let mut image_messages = Vec::new();

                    for content in &response.content {
                        match content {
                            Content::Image(image) => {
                                tool_content.push("This tool result included an image that is uploaded in the next message.".to_string());
                                image_messages.push(json!({
                                    "role": "user",
                                    "content": [convert_image(image, image_format)]
                                }));
                            }
                            other => tool_content.push(other.summary()),
                        }
                    }

                    let body = tool_content.join("\n");
                    let body = if response.is_error {
                        format!("The tool call returned the following error:\n{}", body)
                    } else {
                        body
                    };

                    output.push(json!({
                        "role": "tool",
                        "content": body,
                        "tool_call_id": response.id
                    }));
                    output.extend(image_messages);
                }
            }
        }

        if !text.is_empty() {
            converted.insert("content".to_string(), json!(text.join("\n")));
        }
        if !tool_calls.is_empty() {
            converted.insert("tool_calls".to_string(), json!(tool_calls));
        }
        if converted.contains_key("content") || converted.contains_key("tool_calls") {
            output.insert(0, Value::Object(converted));
        }
        messages_spec.extend(output);
    }

    messages_spec
}

/// Convert an image content into an image json based on format
pub fn convert_image(image: &ImageContent, image_format: &ImageFormat) -> Value {
    match image_format {
        ImageFormat::OpenAi => json!({
            "type": "image_url",
            "image_url": {
                "url": format!("data:{};base64,{}", image.mime_type, image.data)
            }
        }),
        ImageFormat::Anthropic => json!({
            "type": "image",
            "source": {
                "type": "base64",
                "media_type": image.mime_type,
                "data": image.data,
            }
        }),
    }
}

/// Convert internal Tool format to OpenAI's API tool specification
pub fn tools_to_openai_spec(tools: &[Tool]) -> Result<Vec<Value>, ProviderError> {
    let mut tool_names = std::collections::HashSet::new();
    let mut result = Vec::new();

    for tool in tools {
        let name = sanitize_function_name(&tool.name);
        if !tool_names.insert(name.clone()) {
            return Err(ProviderError::InvalidResponse(format!(
                "Duplicate tool name: {}",
                tool.name
            )));
        }

        result.push(json!({
            "type": "function",
            "function": {
                "name": name,
                "description": tool.description,
                "parameters": tool.input_schema,
            }
        }));
    }

    Ok(result)
}

/// Convert OpenAI's API response to internal Message format
///
/// Function names are mapped back to the catalogue names in `tools` they were
/// sanitized from. Tool arguments that are not valid JSON are kept as a raw string,
/// which the agent reports instead of dispatching.
pub fn openai_response_to_message(
    response: &Value,
    tools: &[Tool],
) -> Result<Message, ProviderError> {
    let original = response
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("message"))
        .ok_or_else(|| ProviderError::InvalidResponse("no choices in response".to_string()))?;

    let mut message = Message::assistant();

    if let Some(text) = original.get("content").and_then(Value::as_str) {
        if !text.is_empty() {
            message = message.with_text(text);
        }
    }

    if let Some(tool_calls) = original.get("tool_calls").and_then(Value::as_array) {
        for tool_call in tool_calls {
            let id = tool_call["id"].as_str().unwrap_or_default();
            let function_name = tool_call["function"]["name"].as_str().unwrap_or_default();
            let arguments = match &tool_call["function"]["arguments"] {
                Value::String(raw) if raw.trim().is_empty() => json!({}),
                Value::String(raw) => {
                    serde_json::from_str::<Value>(raw).unwrap_or_else(|_| json!(raw))
                }
                // some compatible servers send the arguments as an object already
                Value::Object(map) => Value::Object(map.clone()),
                _ => json!({}),
            };
            let name = catalogue_name(function_name, tools);
            message = message.with_tool_request(id, ToolCall::new(name, arguments));
        }
    }

    Ok(message)
}

/// Usage counters as reported by OpenAI compatible endpoints
pub fn get_openai_usage(data: &Value) -> Usage {
    let Some(usage) = data.get("usage") else {
        return Usage::default();
    };

    let input_tokens = usage
        .get("prompt_tokens")
        .and_then(Value::as_i64)
        .and_then(|v| i32::try_from(v).ok());

    let output_tokens = usage
        .get("completion_tokens")
        .and_then(Value::as_i64)
        .and_then(|v| i32::try_from(v).ok());

    let total_tokens = usage
        .get("total_tokens")
        .and_then(Value::as_i64)
        .and_then(|v| i32::try_from(v).ok())
        .or_else(|| match (input_tokens, output_tokens) {
            (Some(input), Some(output)) => input.checked_add(output),
            _ => None,
        });

    Usage::new(input_tokens, output_tokens, total_tokens)
}

/// The catalogue name whose sanitized form is `function_name`
fn catalogue_name<'a>(function_name: &'a str, tools: &'a [Tool]) -> &'a str {
    tools
        .iter()
        .map(|tool| tool.name.as_str())
        .find(|name| sanitize_function_name(name) == function_name)
        .unwrap_or(function_name)
}

pub fn sanitize_function_name(name: &str) -> String {
    static INVALID: OnceLock<Option<Regex>> = OnceLock::new();
    match INVALID.get_or_init(|| Regex::new(r"[^a-zA-Z0-9_-]").ok()) {
        Some(re) => re.replace_all(name, "_").to_string(),
        None => name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::message::ToolResponse;
    use anyhow::Result;

    const OPENAI_TOOL_USE_RESPONSE: &str = r#"{
        "choices": [{
            "role": "assistant",
            "message": {
                "tool_calls": [{
                    "id": "1",
                    "function": {
                        "name": "example__fn",
                        "arguments": "{\"param\": \"value\"}"
                    }
                }]
            }
        }],
        "usage": {
            "prompt_tokens": 10,
            "completion_tokens": 25,
            "total_tokens": 35
        }
    }"#;

    #[test]
    fn test_messages_to_openai_spec() -> Result<()> {
        let message = Message::user().with_text("Hello");
        let spec = messages_to_openai_spec(&[message], &ImageFormat::OpenAi);

        assert_eq!(spec.len(), 1);
        assert_eq!(spec[0]["role"], "user");
        assert_eq!(spec[0]["content"], "Hello");
        Ok(())
    }

    #[test]
    fn test_tools_to_openai_spec() -> Result<()> {
        let tool = Tool::new(
            "test__tool",
            "A test tool",
            json!({
                "type": "object",
                "properties": {
                    "input": {
                        "type": "string",
                        "description": "Test parameter"
                    }
                },
                "required": ["input"]
            }),
        );

        let spec = tools_to_openai_spec(&[tool])?;

        assert_eq!(spec.len(), 1);
        assert_eq!(spec[0]["type"], "function");
        assert_eq!(spec[0]["function"]["name"], "test__tool");
        Ok(())
    }

    #[test]
    fn test_tools_to_openai_spec_duplicate() {
        let schema = json!({"type": "object", "properties": {}});
        let tools = [
            Tool::new("a__b", "first", schema.clone()),
            Tool::new("a__b", "second", schema),
        ];
        assert!(tools_to_openai_spec(&tools).is_err());
    }

    #[test]
    fn test_sanitize_function_name() {
        assert_eq!(sanitize_function_name("hello-world"), "hello-world");
        assert_eq!(sanitize_function_name("hello world"), "hello_world");
        assert_eq!(sanitize_function_name("fs__read.file"), "fs__read_file");
    }

    #[test]
    fn test_messages_to_openai_spec_tool_round_trip() -> Result<()> {
        let messages = vec![
            Message::user().with_text("How are you?"),
            Message::assistant()
                .with_text("Let me look")
                .with_tool_request("tool1", ToolCall::new("ex__ample", json!({"param1": "value1"}))),
            Message::tool().with_tool_response(ToolResponse::success(
                "tool1",
                vec![Content::text("Result")],
            )),
        ];

        let spec = messages_to_openai_spec(&messages, &ImageFormat::OpenAi);

        assert_eq!(spec.len(), 3);
        assert_eq!(spec[1]["role"], "assistant");
        assert_eq!(spec[1]["content"], "Let me look");
        assert_eq!(spec[1]["tool_calls"][0]["function"]["name"], "ex__ample");
        assert_eq!(
            spec[1]["tool_calls"][0]["function"]["arguments"],
            "{\"param1\":\"value1\"}"
        );
        assert_eq!(spec[2]["role"], "tool");
        assert_eq!(spec[2]["content"], "Result");
        assert_eq!(spec[2]["tool_call_id"], "tool1");
        Ok(())
    }

    #[test]
    fn test_messages_to_openai_spec_error_and_image_results() {
        let messages = vec![Message::tool()
            .with_tool_response(ToolResponse::error("t1", "boom"))
            .with_tool_response(ToolResponse::success(
                "t2",
                vec![Content::image("aGk=", "image/png")],
            ))];

        let spec = messages_to_openai_spec(&messages, &ImageFormat::OpenAi);

        assert_eq!(spec.len(), 3);
        assert_eq!(
            spec[0]["content"],
            "The tool call returned the following error:\nboom"
        );
        assert_eq!(spec[1]["tool_call_id"], "t2");
        assert_eq!(spec[2]["role"], "user");
        assert_eq!(
            spec[2]["content"][0]["image_url"]["url"],
            "data:image/png;base64,aGk="
        );
    }

    #[test]
    fn test_openai_response_to_message_tool_use() -> Result<()> {
        let response: Value = serde_json::from_str(OPENAI_TOOL_USE_RESPONSE)?;
        let message = openai_response_to_message(&response, &[])?;

        let request = message
            .tool_requests()
            .next()
            .ok_or_else(|| anyhow::anyhow!("expected a tool request"))?;
        assert_eq!(request.id, "1");
        assert_eq!(request.tool_call.name, "example__fn");
        assert_eq!(request.tool_call.arguments, json!({"param": "value"}));

        let usage = get_openai_usage(&response);
        assert_eq!(usage.input_tokens, Some(10));
        assert_eq!(usage.output_tokens, Some(25));
        Ok(())
    }

    #[test]
    fn test_openai_response_invalid_arguments_kept_raw() -> Result<()> {
        let mut response: Value = serde_json::from_str(OPENAI_TOOL_USE_RESPONSE)?;
        response["choices"][0]["message"]["tool_calls"][0]["function"]["arguments"] =
            json!("{invalid json}");

        let message = openai_response_to_message(&response, &[])?;
        let request = message
            .tool_requests()
            .next()
            .ok_or_else(|| anyhow::anyhow!("expected a tool request"))?;
        assert_eq!(request.tool_call.arguments, json!("{invalid json}"));
        Ok(())
    }

    #[test]
    fn test_openai_response_without_choices() {
        assert!(openai_response_to_message(&json!({"choices": []}), &[]).is_err());
    }

    #[test]
    fn test_sanitized_names_map_back_to_catalogue() -> Result<()> {
        let tools = vec![
            Tool::new("my.fs__read.file", "Read a file", json!({"type": "object"})),
            Tool::new("calc__add", "Add", json!({"type": "object"})),
        ];
        let spec = tools_to_openai_spec(&tools)?;
        let offered = spec[0]["function"]["name"].as_str().unwrap_or_default();
        assert_eq!(offered, "my_fs__read_file");

        let mut response: Value = serde_json::from_str(OPENAI_TOOL_USE_RESPONSE)?;
        response["choices"][0]["message"]["tool_calls"][0]["function"]["name"] = json!(offered);
        let message = openai_response_to_message(&response, &tools)?;

        let request = message
            .tool_requests()
            .next()
            .ok_or_else(|| anyhow::anyhow!("expected a tool request"))?;
        assert_eq!(request.tool_call.name, "my.fs__read.file");
        assert_eq!(
            crate::registry::split_tool_name(&request.tool_call.name)?,
            ("my.fs", "read.file")
        );
        Ok(())
    }

    #[test]
    fn test_unknown_function_name_kept() -> Result<()> {
        let tools = vec![Tool::new("calc__add", "Add", json!({}))];
        let response: Value = serde_json::from_str(OPENAI_TOOL_USE_RESPONSE)?;
        let message = openai_response_to_message(&response, &tools)?;
        assert_eq!(message.tool_requests().count(), 1);
        assert_eq!(
            message.tool_requests().map(|r| r.tool_call.name.as_str()).next(),
            Some("example__fn")
        );
        Ok(())
    }

    #[test]
    fn test_oversized_usage_is_dropped() {
        let usage = get_openai_usage(&json!({
            "usage": {"prompt_tokens": 5_000_000_000i64, "completion_tokens": 7}
        }));
        assert_eq!(usage.input_tokens, None);
        assert_eq!(usage.output_tokens, Some(7));
        assert_eq!(usage.total_tokens, None);
    }
}

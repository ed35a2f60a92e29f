use super::content::{Content, TextContent};
use super::role::Role;
use super::tool::ToolCall;
use chrono::Utc;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRequest {
    pub id: String,
    pub tool_call: ToolCall,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResponse {
    /// Id of the tool request this result answers
    pub id: String,
    /// Structured output exactly as the tool server reported it
    pub content: Vec<Content>,
    /// The text blocks of `content`, trimmed and joined
    pub text: String,
    #[serde(default)]
    pub is_error: bool,
}

impl ToolResponse {
    pub fn success<S: Into<String>>(id: S, content: Vec<Content>) -> Self {
        let text = content
            .iter()
            .filter_map(Content::as_text)
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        Self {
            id: id.into(),
            content,
            text,
            is_error: false,
        }
    }

    /// A result carrying a failure message, so the model learns the call did not succeed
    pub fn error<S: Into<String>, M: Into<String>>(id: S, message: M) -> Self {
        let message = message.into();
        Self {
            id: id.into(),
            content: vec![Content::text(message.clone())],
            text: message,
            is_error: true,
        }
    }

    pub fn with_error_flag(mut self, is_error: bool) -> Self {
        self.is_error = is_error;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
/// Content passed inside a message, which can be both simple content and tool content
pub enum MessageContent {
    Text(TextContent),
    #[serde(rename = "tool_use")]
    ToolRequest(ToolRequest),
    #[serde(rename = "tool_result")]
    ToolResponse(ToolResponse),
}

impl MessageContent {
    pub fn text<S: Into<String>>(text: S) -> Self {
        MessageContent::Text(TextContent { text: text.into() })
    }

    pub fn tool_request<S: Into<String>>(id: S, tool_call: ToolCall) -> Self {
        MessageContent::ToolRequest(ToolRequest {
            id: id.into(),
            tool_call,
        })
    }

    pub fn tool_response(response: ToolResponse) -> Self {
        MessageContent::ToolResponse(response)
    }

    pub fn as_tool_request(&self) -> Option<&ToolRequest> {
        if let MessageContent::ToolRequest(ref tool_request) = self {
            Some(tool_request)
        } else {
            None
        }
    }

    pub fn as_tool_response(&self) -> Option<&ToolResponse> {
        if let MessageContent::ToolResponse(ref tool_response) = self {
            Some(tool_response)
        } else {
            None
        }
    }

    /// Get the text content if this is a TextContent variant
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessageContent::Text(text) => Some(&text.text),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// A message to or from an LLM
pub struct Message {
    pub role: Role,
    pub created: i64,
    pub content: Vec<MessageContent>,
}

impl Message {
    fn with_role(role: Role) -> Self {
        Message {
            role,
            created: Utc::now().timestamp(),
            content: Vec::new(),
        }
    }

    /// Create a new user message with the current timestamp
    pub fn user() -> Self {
        Self::with_role(Role::User)
    }

    /// Create a new assistant message with the current timestamp
    pub fn assistant() -> Self {
        Self::with_role(Role::Assistant)
    }

    /// Create a new tool message with the current timestamp
    pub fn tool() -> Self {
        Self::with_role(Role::Tool)
    }

    pub fn system() -> Self {
        Self::with_role(Role::System)
    }

    /// Add any MessageContent to the message
    pub fn with_content(mut self, content: MessageContent) -> Self {
        self.content.push(content);
        self
    }

    /// Add text content to the message
    pub fn with_text<S: Into<String>>(self, text: S) -> Self {
        self.with_content(MessageContent::text(text))
    }

    /// Add a tool request to the message
    pub fn with_tool_request<S: Into<String>>(self, id: S, tool_call: ToolCall) -> Self {
        self.with_content(MessageContent::tool_request(id, tool_call))
    }

    /// Add a tool response to the message
    pub fn with_tool_response(self, response: ToolResponse) -> Self {
        self.with_content(MessageContent::tool_response(response))
    }

    /// All text blocks of the message joined together
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(MessageContent::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn tool_requests(&self) -> impl Iterator<Item = &ToolRequest> {
        self.content.iter().filter_map(MessageContent::as_tool_request)
    }

    pub fn tool_responses(&self) -> impl Iterator<Item = &ToolResponse> {
        self.content
            .iter()
            .filter_map(MessageContent::as_tool_response)
    }

    pub fn has_text(&self) -> bool {
        self.content
            .iter()
            .any(|content| matches!(content, MessageContent::Text(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_response_summary_joins_trimmed_text() {
        let response = ToolResponse::success(
            "call_1",
            vec![
                Content::text("  first "),
                Content::image("aGk=", "image/png"),
                Content::text("second\n"),
            ],
        );
        assert_eq!(response.text, "first second");
        assert_eq!(response.content.len(), 3);
        assert!(!response.is_error);
    }

    #[test]
    fn test_tool_response_error_is_single_text_block() {
        let response = ToolResponse::error("call_1", "boom");
        assert_eq!(response.content, vec![Content::text("boom")]);
        assert!(response.is_error);
    }

    #[test]
    fn test_message_serializes_with_block_tags() -> anyhow::Result<()> {
        let message = Message::assistant()
            .with_text("let me check")
            .with_tool_request("1", ToolCall::new("calc__add", json!({"a": 1, "b": 2})));
        let value = serde_json::to_value(&message)?;

        assert_eq!(value["role"], "assistant");
        assert_eq!(value["content"][0]["type"], "text");
        assert_eq!(value["content"][1]["type"], "tool_use");
        assert_eq!(value["content"][1]["tool_call"]["name"], "calc__add");

        let back: Message = serde_json::from_value(value)?;
        assert_eq!(back, message);
        Ok(())
    }

    #[test]
    fn test_message_accessors() {
        let message = Message::assistant()
            .with_text("a")
            .with_tool_request("1", ToolCall::new("x__y", json!({})))
            .with_text("b");
        assert_eq!(message.text(), "a\nb");
        assert_eq!(message.tool_requests().count(), 1);
        assert!(message.has_text());
        assert!(!Message::tool().has_text());
    }
}

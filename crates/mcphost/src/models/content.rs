use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextContent {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageContent {
    pub data: String,
    pub mime_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceContents {
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blob: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddedResource {
    pub resource: ResourceContents,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
/// Content produced by a tool server, or passed to an LLM
pub enum Content {
    Text(TextContent),
    Image(ImageContent),
    Resource(EmbeddedResource),
}

impl Content {
    pub fn text<S: Into<String>>(text: S) -> Self {
        Content::Text(TextContent { text: text.into() })
    }

    pub fn image<S: Into<String>, T: Into<String>>(data: S, mime_type: T) -> Self {
        Content::Image(ImageContent {
            data: data.into(),
            mime_type: mime_type.into(),
        })
    }

    /// Parse one content item as reported by a tool server. Items in a shape we
    /// do not model are kept as text holding their raw JSON.
    pub fn from_value(value: Value) -> Self {
        match serde_json::from_value::<Content>(value.clone()) {
            Ok(content) => content,
            Err(_) => Content::text(value.to_string()),
        }
    }

    /// Get the text content if this is a TextContent variant
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Content::Text(text) => Some(&text.text),
            _ => None,
        }
    }

    /// Get the image content if this is an ImageContent variant
    pub fn as_image(&self) -> Option<(&str, &str)> {
        match self {
            Content::Image(image) => Some((&image.data, &image.mime_type)),
            _ => None,
        }
    }

    /// A plain-text rendition for backends that only accept strings
    pub fn summary(&self) -> String {
        match self {
            Content::Text(text) => text.text.clone(),
            Content::Image(image) => format!("[image: {}]", image.mime_type),
            Content::Resource(embedded) => match &embedded.resource.text {
                Some(text) => text.clone(),
                None => format!("[resource: {}]", embedded.resource.uri),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value_known_shapes() {
        let text = Content::from_value(json!({"type": "text", "text": "3"}));
        assert_eq!(text, Content::text("3"));

        let image = Content::from_value(json!({
            "type": "image",
            "data": "aGVsbG8=",
            "mimeType": "image/png",
            "annotations": {"priority": 0.5}
        }));
        assert_eq!(image.as_image(), Some(("aGVsbG8=", "image/png")));

        let resource = Content::from_value(json!({
            "type": "resource",
            "resource": {"uri": "file:///tmp/a.txt", "mimeType": "text/plain", "text": "body"}
        }));
        assert_eq!(resource.summary(), "body");
    }

    #[test]
    fn test_from_value_unknown_shape_is_kept_as_text() {
        let raw = json!({"type": "audio", "data": "AAAA"});
        let content = Content::from_value(raw.clone());
        assert_eq!(content.as_text(), Some(raw.to_string().as_str()));
    }
}

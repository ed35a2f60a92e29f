use serde_json::Value;
use thiserror::Error;

/// Error types the backends use to signal that they are overloaded or rate limiting us
const TRANSIENT_ERROR_TYPES: &[&str] = &["overloaded_error", "rate_limit_error"];

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Request failed with status {status}: {message}")]
    Http {
        status: u16,
        error_type: Option<String>,
        message: String,
    },

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Build an error from a non-success status and the raw response body.
    ///
    /// The body is inspected for the usual `{"error": {"type"|"status", "message"}}`
    /// shape shared (with small differences) by the anthropic, openai and gemini APIs.
    pub fn from_response(status: u16, body: &str) -> Self {
        let parsed: Option<Value> = serde_json::from_str(body).ok();
        let error = parsed.as_ref().and_then(|value| value.get("error"));

        let error_type = error
            .and_then(|e| e.get("type").or_else(|| e.get("status")))
            .and_then(Value::as_str)
            .map(str::to_string);
        let message = error
            .and_then(|e| e.get("message"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| body.trim().to_string());

        ProviderError::Http {
            status,
            error_type,
            message,
        }
    }

    /// Whether the backend reported a recoverable overload or rate limit
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Http {
                status, error_type, ..
            } => {
                matches!(status, 429 | 503 | 529)
                    || error_type
                        .as_deref()
                        .is_some_and(|t| TRANSIENT_ERROR_TYPES.contains(&t))
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anthropic_overloaded_is_transient() {
        let body = r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#;
        let error = ProviderError::from_response(529, body);
        assert!(error.is_transient());
        assert_eq!(
            error.to_string(),
            "Request failed with status 529: Overloaded"
        );
    }

    #[test]
    fn test_rate_limit_type_is_transient_regardless_of_status() {
        let body = r#"{"error":{"type":"rate_limit_error","message":"slow down"}}"#;
        assert!(ProviderError::from_response(400, body).is_transient());
    }

    #[test]
    fn test_status_codes() {
        assert!(ProviderError::from_response(429, "").is_transient());
        assert!(ProviderError::from_response(503, "unavailable").is_transient());
        assert!(!ProviderError::from_response(500, "boom").is_transient());
        assert!(!ProviderError::from_response(401, "{\"error\":{\"message\":\"bad key\"}}").is_transient());
        assert!(!ProviderError::InvalidResponse("empty".into()).is_transient());
    }

    #[test]
    fn test_plain_body_becomes_message() {
        let error = ProviderError::from_response(500, "  internal  ");
        match error {
            ProviderError::Http {
                error_type,
                message,
                ..
            } => {
                assert_eq!(error_type, None);
                assert_eq!(message, "internal");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}

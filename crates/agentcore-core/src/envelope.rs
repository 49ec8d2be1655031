//! Invocation payload and response envelope shared by the agent service and
//! its callers.
//!
//! Success: `{"output": {"message": {...}, "request_timestamp", "response_timestamp"}}`
//! Failure: `{"output": {"error": "...", "request_timestamp"}}`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Prompt used when the payload carries none.
pub const DEFAULT_PROMPT: &str = "Hello";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayloadError {
    #[error("payload must be a JSON object")]
    NotAnObject,

    #[error("'{field}' must be a string")]
    PromptNotString { field: &'static str },
}

/// Pick the prompt out of an invocation payload.
///
/// `input.prompt` wins over a top-level `prompt`; with neither present the
/// prompt is [`DEFAULT_PROMPT`].
pub fn extract_prompt(payload: &Value) -> Result<String, PayloadError> {
    let object = payload.as_object().ok_or(PayloadError::NotAnObject)?;

    let nested = object.get("input").and_then(|input| input.get("prompt"));
    if let Some(prompt) = nested {
        return prompt
            .as_str()
            .map(str::to_string)
            .ok_or(PayloadError::PromptNotString {
                field: "input.prompt",
            });
    }
    match object.get("prompt") {
        Some(prompt) => prompt
            .as_str()
            .map(str::to_string)
            .ok_or(PayloadError::PromptNotString { field: "prompt" }),
        None => Ok(DEFAULT_PROMPT.to_string()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentBlock {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssistantMessage {
    pub role: String,
    pub content: Vec<ContentBlock>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseOutput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<AssistantMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub request_timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub output: ResponseOutput,
}

impl ResponseEnvelope {
    pub fn success(
        text: impl Into<String>,
        request_timestamp: DateTime<Utc>,
        response_timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            output: ResponseOutput {
                message: Some(AssistantMessage {
                    role: "assistant".to_string(),
                    content: vec![ContentBlock { text: text.into() }],
                }),
                error: None,
                request_timestamp,
                response_timestamp: Some(response_timestamp),
            },
        }
    }

    pub fn failure(error: impl Into<String>, request_timestamp: DateTime<Utc>) -> Self {
        Self {
            output: ResponseOutput {
                message: None,
                error: Some(error.into()),
                request_timestamp,
                response_timestamp: None,
            },
        }
    }

    pub fn is_error(&self) -> bool {
        self.output.error.is_some()
    }

    /// All content text concatenated; `None` for error envelopes.
    pub fn text(&self) -> Option<String> {
        self.output
            .message
            .as_ref()
            .map(|m| m.content.iter().map(|c| c.text.as_str()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_prompt_wins() {
        let payload = json!({"prompt": "outer", "input": {"prompt": "inner"}});
        assert_eq!(extract_prompt(&payload).unwrap(), "inner");
    }

    #[test]
    fn test_top_level_prompt() {
        assert_eq!(extract_prompt(&json!({"prompt": "hi"})).unwrap(), "hi");
    }

    #[test]
    fn test_missing_prompt_defaults() {
        assert_eq!(extract_prompt(&json!({})).unwrap(), DEFAULT_PROMPT);
        assert_eq!(
            extract_prompt(&json!({"input": {}})).unwrap(),
            DEFAULT_PROMPT
        );
    }

    #[test]
    fn test_non_string_prompt_rejected() {
        assert_eq!(
            extract_prompt(&json!({"prompt": 42})),
            Err(PayloadError::PromptNotString { field: "prompt" })
        );
        assert_eq!(
            extract_prompt(&json!([1, 2])),
            Err(PayloadError::NotAnObject)
        );
    }

    #[test]
    fn test_success_shape() {
        let t = Utc::now();
        let value = serde_json::to_value(ResponseEnvelope::success("hey", t, t)).unwrap();
        assert_eq!(value["output"]["message"]["role"], "assistant");
        assert_eq!(value["output"]["message"]["content"][0]["text"], "hey");
        assert!(value["output"]["response_timestamp"].is_string());
        assert!(value["output"].get("error").is_none());
    }

    #[test]
    fn test_failure_shape() {
        let value =
            serde_json::to_value(ResponseEnvelope::failure("boom", Utc::now())).unwrap();
        assert_eq!(value["output"]["error"], "boom");
        assert!(value["output"].get("message").is_none());
        assert!(value["output"].get("response_timestamp").is_none());
    }

    #[test]
    fn test_text_concatenates_blocks() {
        let raw = json!({"output": {
            "message": {"role": "assistant", "content": [{"text": "a"}, {"text": "b"}]},
            "request_timestamp": "2024-01-01T00:00:00Z",
            "response_timestamp": "2024-01-01T00:00:01Z"
        }});
        let envelope: ResponseEnvelope = serde_json::from_value(raw).unwrap();
        assert_eq!(envelope.text().as_deref(), Some("ab"));
        assert!(!envelope.is_error());
    }
}

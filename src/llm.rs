use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::LlmConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// One chat-completion request, serialized as the provider expects it.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
}

impl CompletionRequest {
    /// A request carrying a single user message and no prior context.
    pub fn single_turn(model: &str, text: &str) -> Self {
        Self {
            model: model.to_string(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: text.to_string(),
            }],
        }
    }
}

/// Everything the completion boundary can fail with. `Display` is the
/// human-readable description shown in diagnostic replies and logs.
#[derive(Debug, Clone, Error)]
pub enum CompletionError {
    #[error("request timed out")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("rate limit exceeded: {0}")]
    RateLimit(String),
    #[error("api error ({status}): {body}")]
    Api { status: u16, body: String },
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// The completion provider seam. The relay only ever talks to this trait,
/// so tests substitute scripted implementations.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Returns the first completion choice's message content.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError>;
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

fn classify_status(status: StatusCode, body: String) -> CompletionError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => CompletionError::Auth(body),
        StatusCode::TOO_MANY_REQUESTS => CompletionError::RateLimit(body),
        _ => CompletionError::Api {
            status: status.as_u16(),
            body,
        },
    }
}

fn first_choice_text(response: ChatResponse) -> Result<String, CompletionError> {
    response
        .choices
        .into_iter()
        .next()
        .map(|c| c.message.content.unwrap_or_default())
        .ok_or_else(|| CompletionError::Malformed("response contained no choices".to_string()))
}

pub struct LlmClient {
    client: reqwest::Client,
    config: LlmConfig,
}

impl LlmClient {
    pub fn new(config: LlmConfig) -> Result<Self> {
        // Client-level timeout bounds the whole round-trip; expiry surfaces
        // as CompletionError::Timeout.
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl CompletionClient for LlmClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let url = format!("{}/chat/completions", self.config.effective_base_url());

        debug!("Sending completion request to {}", url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CompletionError::Timeout
                } else {
                    CompletionError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, body));
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::Malformed(e.to_string()))?;

        first_choice_text(chat_response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_single_turn_request_shape() {
        let request = CompletionRequest::single_turn("gpt-3.5-turbo", "Hello");
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({
                "model": "gpt-3.5-turbo",
                "messages": [{ "role": "user", "content": "Hello" }]
            })
        );
    }

    #[test]
    fn test_classify_auth_statuses() {
        for status in [StatusCode::UNAUTHORIZED, StatusCode::FORBIDDEN] {
            let err = classify_status(status, "bad key".to_string());
            assert!(matches!(err, CompletionError::Auth(_)), "{:?}", err);
        }
    }

    #[test]
    fn test_classify_rate_limit() {
        let err = classify_status(StatusCode::TOO_MANY_REQUESTS, "slow down".to_string());
        assert!(err.to_string().contains("rate limit exceeded"));
    }

    #[test]
    fn test_classify_other_statuses_keep_code_and_body() {
        let err = classify_status(StatusCode::INTERNAL_SERVER_ERROR, "boom".to_string());
        match err {
            CompletionError::Api { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "boom");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_first_choice_text() {
        let response = ChatResponse {
            choices: vec![
                Choice {
                    message: ResponseMessage {
                        content: Some(" Hi there! ".to_string()),
                    },
                },
                Choice {
                    message: ResponseMessage {
                        content: Some("ignored".to_string()),
                    },
                },
            ],
        };
        assert_eq!(first_choice_text(response).unwrap(), " Hi there! ");
    }

    #[test]
    fn test_no_choices_is_malformed() {
        let response = ChatResponse { choices: vec![] };
        let err = first_choice_text(response).unwrap_err();
        assert!(matches!(err, CompletionError::Malformed(_)));
    }
}

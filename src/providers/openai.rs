//! OpenAI-compatible chat-completions client.
//!
//! Talks to `POST {base}/chat/completions` directly, or to any proxy that
//! forwards the same request/response shape (an app server or edge function
//! holding the real key). See:
//! <https://platform.openai.com/docs/api-reference/chat>

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::traits::ContentProvider;
use crate::types::{Completion, GenerationOptions, Message, Usage};
use crate::{EduBuddyError, Result};

/// Default base URL for the OpenAI API
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Client for an OpenAI-compatible chat-completions endpoint.
#[derive(Clone)]
pub struct OpenAiClient {
    name: String,
    api_key: Option<String>,
    http: Client,
    endpoint: String,
}

impl OpenAiClient {
    /// Create a client for the public OpenAI API.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Create a client with a custom base URL (for testing with wiremock).
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl AsRef<str>) -> Self {
        Self {
            name: "openai".to_string(),
            api_key: Some(api_key.into()),
            http: Client::new(),
            endpoint: format!("{}/chat/completions", base_url.as_ref().trim_end_matches('/')),
        }
    }

    /// Create a client for a proxy endpoint that accepts the chat-completions
    /// body at `url` and injects its own credentials.
    pub fn proxy(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            api_key: None,
            http: Client::new(),
            endpoint: url.into(),
        }
    }

    /// Override the provider name used in logs and metrics.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Full URL requests are posted to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Map non-2xx responses onto the error taxonomy.
    async fn check_status(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(EduBuddyError::AuthenticationFailed)
            }
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = response
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.trim().parse::<u64>().ok())
                    .map(Duration::from_secs);
                Err(EduBuddyError::RateLimited { retry_after })
            }
            _ => {
                let body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<ErrorEnvelope>(&body)
                    .map(|e| e.error.message)
                    .unwrap_or_else(|_| body.chars().take(200).collect());
                Err(EduBuddyError::Api {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }
}

#[async_trait]
impl ContentProvider for OpenAiClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, turns: &[Message], options: &GenerationOptions) -> Result<Completion> {
        let body = ChatRequest {
            model: &options.model,
            messages: turns,
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            response_format: options
                .json_response
                .then_some(ResponseFormat { kind: "json_object" }),
        };

        debug!(provider = %self.name, endpoint = %self.endpoint, model = %options.model, turns = turns.len(), "posting chat completion");

        let mut request = self.http.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request
            .send()
            .await
            .map_err(|e| EduBuddyError::Http(e.to_string()))?;
        let response = Self::check_status(response).await?;

        let text = response
            .text()
            .await
            .map_err(|e| EduBuddyError::Http(e.to_string()))?;
        let parsed: ChatResponse = serde_json::from_str(&text).map_err(|e| {
            EduBuddyError::MalformedResponse(format!("unexpected completion envelope: {e}"))
        })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(EduBuddyError::EmptyResponse)?;

        Ok(Completion {
            content,
            model: parsed.model,
            usage: parsed.usage,
        })
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = OpenAiClient::with_base_url("k", "http://localhost:8080/v1/");
        assert_eq!(client.endpoint(), "http://localhost:8080/v1/chat/completions");
        assert_eq!(client.name(), "openai");
    }

    #[test]
    fn request_body_shape() {
        let turns = [Message::system("be kind"), Message::user("hi")];
        let body = ChatRequest {
            model: "gpt-4o-mini",
            messages: &turns,
            max_tokens: Some(100),
            temperature: None,
            response_format: Some(ResponseFormat { kind: "json_object" }),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["response_format"]["type"], "json_object");
        assert!(json.get("temperature").is_none());
    }
}

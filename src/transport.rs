//! Transport boundary to the target server.
//!
//! The completion client does not care how a payload reaches the endpoint;
//! it talks to a [`ChatTransport`] and nothing else. [`HttpTransport`] is
//! the reqwest-backed implementation for real servers; tests inject their
//! own capturing implementations.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::config::ClientConfig;
use crate::error::TransportError;
use crate::params::GenerationParams;

/// One-shot dispatch of an assembled chat-completion payload.
///
/// Implementations perform exactly one request per call: no retries, no
/// status-code interpretation beyond surfacing it, no response rewriting.
/// Bounded-latency requirements (timeouts) live here, not in the client.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send `payload` to the chat completions endpoint and decode the reply.
    async fn send(
        &self,
        payload: &GenerationParams,
    ) -> Result<ChatCompletionResponse, TransportError>;
}

// OpenAI-compatible Chat Completions response types

#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub id: Option<String>,
    pub choices: Vec<ChatCompletionChoice>,
    pub usage: ChatCompletionUsage,
}

#[derive(Debug, Deserialize)]
pub struct ChatCompletionChoice {
    pub message: ChatCompletionResponseMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponseMessage {
    pub role: String,
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChatCompletionUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

/// HTTP transport for any endpoint speaking the OpenAI Chat Completions API.
pub struct HttpTransport {
    client: Client,
    base_url: String,
    api_key: Option<SecretString>,
}

impl HttpTransport {
    /// Build a transport from client configuration.
    ///
    /// The request timeout lives here so callers relying on bounded latency
    /// get it at the transport boundary.
    pub fn new(config: &ClientConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
        })
    }

    /// Construct API URL for a given path.
    /// Uses the base_url as-is and appends `/v1/{path}`.
    /// Strips trailing `/v1` from base_url to avoid double `/v1` issues.
    fn api_url(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let base = base.strip_suffix("/v1").unwrap_or(base);
        format!("{}/v1/{}", base, path.trim_start_matches('/'))
    }

    /// Add Authorization header if an API key is configured.
    fn add_auth_header(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("Authorization", format!("Bearer {}", key.expose_secret())),
            None => request,
        }
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn send(
        &self,
        payload: &GenerationParams,
    ) -> Result<ChatCompletionResponse, TransportError> {
        let url = self.api_url("chat/completions");

        tracing::debug!("Sending request to OpenAI-compatible endpoint: {}", url);

        let request = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(payload);
        let request = self.add_auth_header(request);

        let response = request.send().await.map_err(|e| {
            tracing::error!("Chat completion request failed: {}", e);
            TransportError::Http(e)
        })?;

        let status = response.status();
        let response_text = response.text().await?;

        tracing::debug!("Chat completion response status: {}", status);

        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: truncate_body(&response_text, 200).to_string(),
            });
        }

        serde_json::from_str(&response_text).map_err(|e| TransportError::InvalidResponse {
            reason: format!(
                "JSON parse error: {}. Raw: {}",
                e,
                truncate_body(&response_text, 200)
            ),
        })
    }
}

/// Truncate a response body for error reporting.
///
/// Bounded at `limit` bytes but never splits a UTF-8 character; server
/// error bodies are not guaranteed to be ASCII.
fn truncate_body(body: &str, limit: usize) -> &str {
    if body.len() <= limit {
        return body;
    }
    let mut end = limit;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport_with_base_url(base_url: &str) -> HttpTransport {
        let config = ClientConfig::new(base_url);
        HttpTransport::new(&config).unwrap()
    }

    #[test]
    fn api_url_trailing_slash() {
        // trailing slash: https://api.example.com/ -> https://api.example.com/v1/chat/completions
        let transport = transport_with_base_url("https://api.example.com/");
        let url = transport.api_url("chat/completions");
        assert_eq!(url, "https://api.example.com/v1/chat/completions");
    }

    #[test]
    fn api_url_no_trailing_slash() {
        let transport = transport_with_base_url("https://api.example.com");
        let url = transport.api_url("chat/completions");
        assert_eq!(url, "https://api.example.com/v1/chat/completions");
    }

    #[test]
    fn api_url_already_has_v1() {
        // already has /v1: should NOT produce /v1/v1
        let transport = transport_with_base_url("http://10.138.16.219:8666/v1");
        let url = transport.api_url("chat/completions");
        assert_eq!(url, "http://10.138.16.219:8666/v1/chat/completions");
    }

    #[test]
    fn api_url_strips_leading_slash_from_path() {
        let transport = transport_with_base_url("https://api.example.com");
        let url = transport.api_url("/chat/completions");
        assert_eq!(url, "https://api.example.com/v1/chat/completions");
    }

    #[test]
    fn truncate_body_passes_short_bodies_through() {
        assert_eq!(truncate_body("model loading", 200), "model loading");
    }

    #[test]
    fn truncate_body_cuts_long_ascii_at_the_limit() {
        let body = "x".repeat(300);
        assert_eq!(truncate_body(&body, 200).len(), 200);
    }

    #[test]
    fn truncate_body_backs_off_mid_character_cuts() {
        // byte 200 lands inside the two-byte 'é'; truncation must not panic
        // and must stop at the previous boundary
        let body = format!("{}é and more", "x".repeat(199));
        let truncated = truncate_body(&body, 200);
        assert_eq!(truncated, "x".repeat(199));
    }

    #[test]
    fn truncate_body_handles_fully_multibyte_bodies() {
        let body = "ошибка загрузки модели ".repeat(20);
        let truncated = truncate_body(&body, 200);
        assert!(truncated.len() <= 200);
        assert!(body.starts_with(truncated));
    }

    #[test]
    fn response_decodes_without_optional_fields() {
        let raw = r#"{
            "choices": [{"message": {"role": "assistant", "content": "hi"}}],
            "usage": {"prompt_tokens": 3, "completion_tokens": 1}
        }"#;
        let response: ChatCompletionResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(response.choices.len(), 1);
        assert_eq!(response.usage.completion_tokens, 1);
        assert_eq!(response.choices[0].finish_reason, None);
    }
}

//! Completion client: request assembly, dispatch, and metric derivation.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::config::ClientConfig;
use crate::error::{CompletionError, TransportError};
use crate::params::{self, GenerationParams};
use crate::transport::{ChatTransport, HttpTransport};

/// A message in a conversation.
///
/// `role` and `content` are both required on the wire; [`CompletionClient::complete`]
/// rejects a conversation where either is missing before touching the
/// network. Extra fields (`name`, `tool_call_id`, ...) pass through as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(default)]
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(flatten)]
    pub extra: GenerationParams,
}

impl ChatMessage {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role("system", content)
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role("user", content)
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role("assistant", content)
    }

    fn with_role(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: Some(content.into()),
            extra: GenerationParams::new(),
        }
    }
}

/// Per-call overrides for [`CompletionClient::complete`].
///
/// Every field left `None` falls back to the client configuration; a field
/// that is `Some` wins even when the value is "falsy" (a temperature of
/// `0.0` or an empty stop list is a deliberate choice, not an absence).
/// `extra` carries free-form parameters that go through
/// [`params::reconcile`] before dispatch.
#[derive(Debug, Clone, Default)]
pub struct CompletionOptions {
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub stop: Option<Vec<String>>,
    pub seed: Option<i64>,
    pub extra: GenerationParams,
}

impl CompletionOptions {
    /// Override the model for this call.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Override max tokens for this call.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Override temperature for this call.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Override stop sequences for this call.
    pub fn with_stop(mut self, stop: Vec<String>) -> Self {
        self.stop = Some(stop);
        self
    }

    /// Override the sampling seed for this call.
    pub fn with_seed(mut self, seed: i64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Add a free-form parameter, forwarded through reconciliation.
    pub fn with_param(mut self, name: impl Into<String>, value: Value) -> Self {
        self.extra.insert(name.into(), value);
        self
    }
}

/// Result of one completion call. Owned by the caller, never mutated.
#[derive(Debug, Clone)]
pub struct CompletionResult {
    /// Generated text from the first choice.
    pub text: String,
    /// Completion-token count reported by the server.
    pub completion_tokens: u32,
    /// Wall-clock duration of the transport call only.
    pub elapsed: Duration,
    /// Derived throughput, zero when the measured window is not positive.
    pub tokens_per_second: f64,
}

/// Completion-token throughput over a measured window.
///
/// Guarded against non-positive durations (clock granularity, mocked
/// transports): those report 0.0 rather than an infinite or undefined rate.
pub fn throughput(completion_tokens: u32, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        f64::from(completion_tokens) / secs
    } else {
        0.0
    }
}

/// Chat-completion client for one OpenAI-compatible endpoint.
///
/// Holds connection configuration and the transport. Configuration is
/// read-only for the client's lifetime, so one instance may be shared
/// across concurrent tasks without coordination.
pub struct CompletionClient {
    config: ClientConfig,
    transport: Arc<dyn ChatTransport>,
}

impl CompletionClient {
    /// Create a client with the reqwest-backed [`HttpTransport`].
    pub fn new(config: ClientConfig) -> Result<Self, TransportError> {
        let transport = Arc::new(HttpTransport::new(&config)?);
        Ok(Self { config, transport })
    }

    /// Create a client with an injected transport.
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn ChatTransport>) -> Self {
        Self { config, transport }
    }

    /// The configuration this client was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Run one chat completion.
    ///
    /// Validates the conversation and resolves the model locally (failing
    /// with [`CompletionError::MalformedConversation`] or
    /// [`CompletionError::MissingModel`] before any network activity), then
    /// assembles the payload, dispatches it once, and reduces the response
    /// to a [`CompletionResult`]. Transport failures propagate unmodified;
    /// nothing is retried.
    pub async fn complete(
        &self,
        messages: &[ChatMessage],
        options: CompletionOptions,
    ) -> Result<CompletionResult, CompletionError> {
        validate_conversation(messages)?;

        let model = options
            .model
            .clone()
            .or_else(|| self.config.model.clone())
            .ok_or(CompletionError::MissingModel)?;

        let payload = self.assemble_payload(messages, &options, model);
        params::log_request(&payload);

        // Timing window covers the dispatch boundary only.
        let start = Instant::now();
        let response = self.transport.send(&payload).await?;
        let elapsed = start.elapsed();

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| TransportError::InvalidResponse {
                reason: "no choices in response".to_string(),
            })?;

        let completion_tokens = response.usage.completion_tokens;
        Ok(CompletionResult {
            text: choice.message.content.unwrap_or_default(),
            completion_tokens,
            elapsed,
            tokens_per_second: throughput(completion_tokens, elapsed),
        })
    }

    /// Build the outgoing payload.
    ///
    /// Free-form parameters are reconciled first; the typed fields are then
    /// resolved call-over-config by presence (`Some(0.0)` beats a config
    /// default) and written on top, so a resolved typed value always wins
    /// over a table fallback. A field with no call value and no config
    /// default is omitted entirely.
    fn assemble_payload(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
        model: String,
    ) -> GenerationParams {
        let mut payload = params::reconcile(&options.extra);

        payload.insert("model".to_string(), Value::String(model));
        payload.insert(
            "messages".to_string(),
            Value::Array(messages.iter().map(message_to_value).collect()),
        );

        if let Some(max_tokens) = options.max_tokens.or(self.config.max_tokens) {
            payload.insert("max_tokens".to_string(), json!(max_tokens));
        }
        if let Some(temperature) = options.temperature.or(self.config.temperature) {
            payload.insert("temperature".to_string(), json!(temperature));
        }
        if let Some(stop) = options.stop.as_ref().or(self.config.stop.as_ref()) {
            payload.insert("stop".to_string(), json!(stop));
        }
        if let Some(seed) = options.seed.or(self.config.seed) {
            payload.insert("seed".to_string(), json!(seed));
        }

        payload
    }
}

fn validate_conversation(messages: &[ChatMessage]) -> Result<(), CompletionError> {
    if messages.is_empty() {
        return Err(CompletionError::MalformedConversation {
            reason: "conversation is empty".to_string(),
        });
    }
    for (index, message) in messages.iter().enumerate() {
        if message.role.is_empty() {
            return Err(CompletionError::MalformedConversation {
                reason: format!("message {index} is missing 'role'"),
            });
        }
        if message.content.is_none() {
            return Err(CompletionError::MalformedConversation {
                reason: format!("message {index} is missing 'content'"),
            });
        }
    }
    Ok(())
}

fn message_to_value(message: &ChatMessage) -> Value {
    let mut wire = serde_json::Map::new();
    wire.insert("role".to_string(), Value::String(message.role.clone()));
    if let Some(content) = &message.content {
        wire.insert("content".to_string(), Value::String(content.clone()));
    }
    for (name, value) in &message.extra {
        // role/content always win over a colliding extra field
        wire.entry(name.clone()).or_insert_with(|| value.clone());
    }
    Value::Object(wire)
}

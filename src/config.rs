//! Client configuration.

use secrecy::SecretString;

use crate::error::ConfigError;

/// Connection configuration for one [`crate::CompletionClient`].
///
/// Owned by exactly one client and treated as read-only for the client's
/// lifetime. Callers that need different settings construct a new client;
/// per-call overrides go through [`crate::CompletionOptions`] instead.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the OpenAI-compatible endpoint, e.g. `http://host:8666/v1`.
    pub base_url: String,
    /// Bearer credential. Many local servers require a non-empty dummy key.
    pub api_key: Option<SecretString>,
    /// Default model identifier. A call without a model override fails if
    /// this is `None`.
    pub model: Option<String>,
    /// Default output-length cap, applied when the call doesn't override it.
    pub max_tokens: Option<u32>,
    /// Default sampling temperature.
    pub temperature: Option<f32>,
    /// Default stop sequences.
    pub stop: Option<Vec<String>>,
    /// Context-window ceiling for the target model. Informational for
    /// callers sizing their prompts; not sent on the wire.
    pub max_context_length: Option<u32>,
    /// Default sampling seed.
    pub seed: Option<i64>,
}

impl ClientConfig {
    /// Create a configuration for `base_url` with the standard defaults for
    /// a local vLLM-class server: dummy API key, 500 output tokens,
    /// temperature 0.1, no stop sequences, 8192-token context, seed 42.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: Some(SecretString::from("1".to_string())),
            model: None,
            max_tokens: Some(500),
            temperature: Some(0.1),
            stop: None,
            max_context_length: Some(8192),
            seed: Some(42),
        }
    }

    /// Set the default model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Load configuration from environment variables.
    ///
    /// `VLLM_BASE_URL` is required; `VLLM_API_KEY`, `VLLM_MODEL`,
    /// `VLLM_MAX_TOKENS`, `VLLM_TEMPERATURE`, `VLLM_STOP` (comma-separated),
    /// `VLLM_MAX_CONTEXT_LENGTH` and `VLLM_SEED` override the [`Self::new`]
    /// defaults when present. Empty variables count as unset. The numeric
    /// variables also accept the literal `none` to clear the default
    /// entirely, so the corresponding field is omitted from requests.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let base_url =
            optional_env("VLLM_BASE_URL")?.ok_or_else(|| ConfigError::MissingRequired {
                key: "VLLM_BASE_URL".to_string(),
                hint: "Set VLLM_BASE_URL to the server endpoint, e.g. http://localhost:8000/v1"
                    .to_string(),
            })?;

        let mut config = Self::new(base_url);
        if let Some(key) = optional_env("VLLM_API_KEY")? {
            config.api_key = Some(SecretString::from(key));
        }
        config.model = optional_env("VLLM_MODEL")?;
        config.max_tokens = parse_clearable_env("VLLM_MAX_TOKENS", config.max_tokens)?;
        config.temperature = parse_clearable_env("VLLM_TEMPERATURE", config.temperature)?;
        config.stop = optional_env("VLLM_STOP")?
            .map(|s| s.split(',').map(|part| part.trim().to_string()).collect());
        config.max_context_length =
            parse_clearable_env("VLLM_MAX_CONTEXT_LENGTH", config.max_context_length)?;
        config.seed = parse_clearable_env("VLLM_SEED", config.seed)?;
        Ok(config)
    }
}

// Helper functions

pub(crate) fn optional_env(key: &str) -> Result<Option<String>, ConfigError> {
    match std::env::var(key) {
        Ok(val) if val.is_empty() => Ok(None),
        Ok(val) => Ok(Some(val)),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("{e}"),
        }),
    }
}

/// Parse an optional env var, keeping `default` when it is unset.
///
/// The literal value `none` (case-insensitive) clears the default, so an
/// environment-sourced config can express "no value, omit the field" and
/// not just override it.
pub(crate) fn parse_clearable_env<T>(key: &str, default: Option<T>) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match optional_env(key)? {
        None => Ok(default),
        Some(s) if s.eq_ignore_ascii_case("none") => Ok(None),
        Some(s) => s.parse().map(Some).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("{e}"),
        }),
    }
}

//! Chat-completion client for OpenAI-compatible inference servers with a
//! reduced parameter surface.
//!
//! Self-hosted endpoints (vLLM, LM Studio, Ollama in OpenAI mode) speak the
//! Chat Completions wire format but reject a chunk of the hosted API's
//! parameters. This crate reconciles a caller's desired request against that
//! reality before dispatch:
//!
//! - [`params::reconcile`] strips denylisted parameters and fills defaults
//!   for omitted ones — by key presence, never value truthiness.
//! - [`CompletionClient::complete`] merges per-call overrides with the
//!   client's configured defaults, validates the conversation, performs one
//!   request, and derives latency and tokens/second from the response.
//!
//! ```no_run
//! use vllm_compat::{ChatMessage, ClientConfig, CompletionClient, CompletionOptions};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::new("http://localhost:8000/v1").with_model("mistral-24B");
//! let client = CompletionClient::new(config)?;
//!
//! let result = client
//!     .complete(
//!         &[ChatMessage::user("Hello!")],
//!         CompletionOptions::default().with_temperature(0.2),
//!     )
//!     .await?;
//! println!("{} ({:.1} tok/s)", result.text, result.tokens_per_second);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod params;
pub mod transport;

pub use client::{ChatMessage, CompletionClient, CompletionOptions, CompletionResult, throughput};
pub use config::ClientConfig;
pub use error::{CompletionError, ConfigError, TransportError};
pub use params::{DEFAULT_PARAMS, GenerationParams, INCOMPATIBLE_PARAMS, reconcile};
pub use transport::{ChatCompletionResponse, ChatTransport, HttpTransport};

//! Error types for the compatibility client.

/// Errors from a single completion call.
///
/// All variants surface directly to the caller: there is no retry, no
/// recovery, and no partial success. A call either yields a full
/// [`crate::CompletionResult`] or fails with one of these.
#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    /// A message in the conversation is missing `role` or `content`, or the
    /// conversation is empty. Detected locally; no network call is made.
    #[error("malformed conversation: {reason}")]
    MalformedConversation { reason: String },

    /// No model identifier resolvable from the call or the client defaults.
    /// Detected locally; no network call is made.
    #[error("no model specified at call time and no default model configured")]
    MissingModel,

    /// The transport call failed. The underlying cause is preserved verbatim.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Errors from the transport boundary.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid response from server: {reason}")]
    InvalidResponse { reason: String },
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

//! # Error Types for the Agent Loom Runtime
//!
//! This module defines all error types used throughout the crate, providing comprehensive
//! error handling with detailed context for different failure scenarios.
//!
//! ## Design Philosophy
//!
//! - **Explicit Error Handling**: Uses Rust's `Result<T>` type for all fallible operations
//! - **No Silent Failures**: All errors are propagated explicitly to the caller
//! - **Rich Context**: Each error variant provides specific information about what went wrong
//! - **Easy Conversion**: Automatic conversion from common error types (reqwest, serde_json)
//! - **Classifiable**: Every variant maps to exactly one [`ErrorKind`], the taxonomy the
//!   retry handler and the ReAct loop switch on (never on the variant itself)
//!
//! ## Usage
//!
//! ```ignore
//! use agent_loom::{Error, Result};
//!
//! fn example() -> Result<()> {
//!     if some_condition {
//!         return Err(Error::config("Invalid model name"));
//!     }
//!
//!     let response = http_client.get(url).send().await?; // Auto-converts to Error::Http
//!     let json = serde_json::from_str(data)?; // Auto-converts to Error::Json
//!
//!     Ok(())
//! }
//! ```

use thiserror::Error;

// ============================================================================
// TYPE ALIASES
// ============================================================================

/// Type alias for `Result<T, Error>` used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

// ============================================================================
// ERROR KIND TAXONOMY
// ============================================================================

/// The abstract error taxonomy from which retry classification and loop
/// termination policy are derived. Every [`Error`] maps to exactly one kind
/// via [`Error::kind`].
///
/// Kinds are not error types themselves — they are the dimension the retry
/// handler and ReAct loop switch on, so callers can match on a small closed
/// set instead of the full variant list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Missing required field, invalid schema, bad builder input.
    Configuration,
    /// Bad tool input, unknown tool, malformed message envelope.
    Validation,
    /// Network, timeout, 5xx from the model transport.
    Transport,
    /// 429 from the model transport.
    RateLimit,
    /// 401/403 from the model transport.
    Auth,
    /// Malformed model response, unexpected stop reason.
    ModelProtocol,
    /// Tool handler threw, or returned an error result.
    Tool,
    /// Max iterations or token budget reached.
    Budget,
    /// Operation was cooperatively cancelled.
    Cancelled,
}

impl ErrorKind {
    /// Whether an error of this kind should be retried by [`crate::retry::RetryHandler`].
    ///
    /// Only [`ErrorKind::Transport`] and [`ErrorKind::RateLimit`] are retriable;
    /// everything else is either non-retriable (client-caused) or fatal
    /// (terminal by construction), and both propagate immediately.
    pub fn is_retriable(self) -> bool {
        matches!(self, ErrorKind::Transport | ErrorKind::RateLimit)
    }
}

// ============================================================================
// ERROR ENUM
// ============================================================================

/// Comprehensive error type covering all failure modes in the crate.
///
/// This enum uses the `thiserror` crate to automatically implement
/// `std::error::Error` and provide well-formatted error messages. Each variant
/// represents a different category of failure that can occur during a run.
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request failed due to network issues, connection problems, or HTTP errors.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization or deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid configuration provided when building `AgentConfig`, `RetryConfig`, etc.
    ///
    /// # Example
    ///
    /// ```rust
    /// use agent_loom::Error;
    ///
    /// let err = Error::config("max_iterations must be >= 0");
    /// assert_eq!(err.to_string(), "Invalid configuration: max_iterations must be >= 0");
    /// ```
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Bad tool input, unknown tool name, or a malformed message envelope.
    ///
    /// # Example
    ///
    /// ```rust
    /// use agent_loom::Error;
    ///
    /// let err = Error::validation("tool input missing required field 'a'");
    /// assert_eq!(err.to_string(), "Validation error: tool input missing required field 'a'");
    /// ```
    #[error("Validation error: {0}")]
    Validation(String),

    /// Error response received from the model transport's API (5xx, network
    /// failure classified as transient).
    ///
    /// # Example
    ///
    /// ```rust
    /// use agent_loom::Error;
    ///
    /// let err = Error::transport("connection reset by peer");
    /// assert_eq!(err.to_string(), "Transport error: connection reset by peer");
    /// ```
    #[error("Transport error: {0}")]
    Transport(String),

    /// The model transport responded with HTTP 429.
    ///
    /// # Example
    ///
    /// ```rust
    /// use agent_loom::Error;
    ///
    /// let err = Error::rate_limit("too many requests");
    /// assert_eq!(err.to_string(), "Rate limited: too many requests");
    /// ```
    #[error("Rate limited: {0}")]
    RateLimit(String),

    /// The model transport responded with HTTP 401/403.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// The model transport returned a malformed response or an unexpected
    /// stop reason the loop does not know how to interpret.
    #[error("Model protocol error: {0}")]
    ModelProtocol(String),

    /// A tool handler threw, returned an error, or was not found.
    ///
    /// # Example
    ///
    /// ```rust
    /// use agent_loom::Error;
    ///
    /// let err = Error::tool("Calculator tool failed: division by zero");
    /// assert_eq!(err.to_string(), "Tool execution error: Calculator tool failed: division by zero");
    /// ```
    #[error("Tool execution error: {0}")]
    Tool(String),

    /// Max iterations or token budget was reached.
    #[error("Budget exhausted: {0}")]
    Budget(String),

    /// The run was cooperatively cancelled (e.g. lost a `race`, or was paused
    /// and never resumed).
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// Miscellaneous error that doesn't fit other categories.
    #[error("Error: {0}")]
    Other(String),
}

// ============================================================================
// CONVENIENCE CONSTRUCTORS
// ============================================================================

impl Error {
    /// Create a new configuration error with a descriptive message.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a new validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    /// Create a new transport error.
    pub fn transport(msg: impl Into<String>) -> Self {
        Error::Transport(msg.into())
    }

    /// Create a new rate-limit error.
    pub fn rate_limit(msg: impl Into<String>) -> Self {
        Error::RateLimit(msg.into())
    }

    /// Create a new authentication error.
    pub fn auth(msg: impl Into<String>) -> Self {
        Error::Auth(msg.into())
    }

    /// Create a new model-protocol error.
    pub fn model_protocol(msg: impl Into<String>) -> Self {
        Error::ModelProtocol(msg.into())
    }

    /// Create a new tool execution error.
    pub fn tool(msg: impl Into<String>) -> Self {
        Error::Tool(msg.into())
    }

    /// Create a new budget-exhausted error.
    pub fn budget(msg: impl Into<String>) -> Self {
        Error::Budget(msg.into())
    }

    /// Create a new cancellation error.
    pub fn cancelled(msg: impl Into<String>) -> Self {
        Error::Cancelled(msg.into())
    }

    /// Create a new miscellaneous error.
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Classify this error into the abstract [`ErrorKind`] taxonomy used by
    /// the retry handler and the loop's termination policy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Http(_) => ErrorKind::Transport,
            Error::Json(_) => ErrorKind::ModelProtocol,
            Error::Config(_) => ErrorKind::Configuration,
            Error::Validation(_) => ErrorKind::Validation,
            Error::Transport(_) => ErrorKind::Transport,
            Error::RateLimit(_) => ErrorKind::RateLimit,
            Error::Auth(_) => ErrorKind::Auth,
            Error::ModelProtocol(_) => ErrorKind::ModelProtocol,
            Error::Tool(_) => ErrorKind::Tool,
            Error::Budget(_) => ErrorKind::Budget,
            Error::Cancelled(_) => ErrorKind::Cancelled,
            Error::Other(_) => ErrorKind::Validation,
        }
    }

    /// Whether [`crate::retry::RetryHandler`] should retry an operation that
    /// failed with this error.
    pub fn is_retriable(&self) -> bool {
        self.kind().is_retriable()
    }
}

// ============================================================================
// TESTS
// ============================================================================

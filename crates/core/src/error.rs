//! Error types for the taskweave domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for taskweave operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Capability errors ---
    #[error("Capability error: {0}")]
    Capability(#[from] CapabilityError),

    // --- Registry errors ---
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    // --- Agent errors ---
    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Raised by a capability body. The Environment never lets one of these
/// escape; it becomes a failure envelope instead.
#[derive(Debug, Clone, Error)]
pub enum CapabilityError {
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("{0}")]
    Failed(String),

    #[error("Capability panicked: {0}")]
    Panicked(String),
}

impl CapabilityError {
    /// Shorthand for a plain execution failure.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed(reason.into())
    }

    /// Stable snake_case label used in result envelopes.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidArguments(_) => "invalid_arguments",
            Self::Failed(_) => "execution_failed",
            Self::Panicked(_) => "panicked",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Capability '{0}' is registered more than once")]
    DuplicateCapability(String),

    #[error("Agent '{0}' is already registered")]
    DuplicateAgent(String),

    #[error("No terminal capability was designated in the catalog")]
    MissingTerminal,

    #[error("Capability '{0}' has no handler")]
    MissingHandler(String),
}

/// Failure of a runnable agent as seen by whoever invoked it.
#[derive(Debug, Clone, Error)]
pub enum AgentError {
    #[error("Agent '{agent}' failed: {reason}")]
    ExecutionFailed { agent: String, reason: String },

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
}

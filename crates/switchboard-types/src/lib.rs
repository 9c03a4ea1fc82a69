//! Shared error taxonomy for the switchboard provider adapters.
//!
//! Every adapter, the client factory and the CLI report failures through
//! [`SwitchboardError`]. Errors are surfaced to the caller as-is: nothing in
//! the workspace retries or recovers from them.

/// Unified error type for all switchboard crates.
#[derive(Debug, thiserror::Error)]
pub enum SwitchboardError {
    // === Configuration Errors ===
    #[error("Missing credential '{field}' for provider {provider}")]
    MissingCredentials {
        provider: String,
        field: &'static str,
    },

    #[error("Unsupported provider: {0}")]
    UnsupportedProvider(String),

    #[error("Provider {provider} used before initialize")]
    NotInitialized { provider: String },

    // === Transport / Provider Errors ===
    #[error("Request to {provider} failed: {message}")]
    Transport { provider: String, message: String },

    #[error("Provider {provider} returned HTTP {status}: {message}")]
    ProviderError {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("Authentication failed for provider {provider}")]
    AuthError { provider: String },

    // === Unsupported Operations ===
    #[error("{operation} is not implemented for provider {provider}")]
    NotImplemented {
        provider: String,
        operation: &'static str,
    },

    // === Caller Input ===
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // === Generic ===
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// Coarse classification of a [`SwitchboardError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing credentials, unknown provider, or an adapter used out of order.
    Configuration,
    /// Network, SDK or provider-side failure, including malformed responses.
    Transport,
    /// The provider adapter does not implement the requested operation.
    Unsupported,
    /// The caller supplied input the adapter cannot send.
    InvalidRequest,
    Other,
}

impl SwitchboardError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SwitchboardError::MissingCredentials { .. }
            | SwitchboardError::UnsupportedProvider(_)
            | SwitchboardError::NotInitialized { .. } => ErrorKind::Configuration,
            SwitchboardError::Transport { .. }
            | SwitchboardError::ProviderError { .. }
            | SwitchboardError::AuthError { .. }
            | SwitchboardError::Json(_) => ErrorKind::Transport,
            SwitchboardError::NotImplemented { .. } => ErrorKind::Unsupported,
            SwitchboardError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            SwitchboardError::Io(_) | SwitchboardError::Other(_) => ErrorKind::Other,
        }
    }

    /// HTTP status reported by the provider, if the failure carried one.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            SwitchboardError::ProviderError { status, .. } => Some(*status),
            SwitchboardError::AuthError { .. } => Some(401),
            _ => None,
        }
    }
}

/// A convenience alias for `Result<T, SwitchboardError>`.
pub type Result<T> = std::result::Result<T, SwitchboardError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

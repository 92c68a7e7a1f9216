// Error handling module
// Defines the error taxonomy surfaced by the SDK

use thiserror::Error;

/// Errors that can occur while talking to the Digiventures API
#[derive(Error, Debug)]
pub enum ApiError {
    /// Invalid or incomplete client configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Token fetch failed or returned no usable token
    #[error("Authentication failed: {0}")]
    AuthError(String),

    /// Non-2xx response from the Digiventures API
    #[error("Digiventures API error: {status} - {message}")]
    DigiApiError { status: u16, message: String },

    /// Network-level failure (connection refused, timeout, ...)
    #[error("HTTP request failed: {message} (kind: {kind})")]
    Transport { kind: &'static str, message: String },

    /// A successful response whose body did not match the expected model
    #[error("Failed to decode response: {0}")]
    DecodeError(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    /// HTTP status carried by the error, if it came from a response
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::DigiApiError { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True for errors raised while obtaining a token
    pub fn is_auth_error(&self) -> bool {
        matches!(self, ApiError::AuthError(_))
    }

    /// True for failures the generic retry policy would have retried
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Transport { .. } => true,
            ApiError::DigiApiError { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Result type alias for SDK operations
pub type Result<T> = std::result::Result<T, ApiError>;

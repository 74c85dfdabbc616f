//! Error types for SMS delivery.

use thiserror::Error;

/// Result type for SMS operations.
pub type SmsResult<T> = Result<T, SmsError>;

/// Errors that can occur when sending an SMS through a provider.
#[derive(Debug, Error)]
pub enum SmsError {
    /// Transport-level failure talking to the provider API
    #[error("Network error: {0}")]
    Network(String),

    /// The destination number was rejected as unreachable or malformed
    #[error("Invalid destination: {0}")]
    InvalidDestination(String),

    /// The provider refused the message (content, sender, or account state)
    #[error("Message rejected: {0}")]
    Rejected(String),

    /// Credentials were missing or rejected
    #[error("Authentication failed")]
    AuthenticationFailed,

    /// The provider throttled the request
    #[error("Rate limit exceeded")]
    RateLimited,

    /// The provider is not configured (missing credentials or unknown vendor)
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    /// The provider response was missing an expected field
    #[error("Missing field in provider response: {0}")]
    MissingField(&'static str),
}

impl From<reqwest::Error> for SmsError {
    fn from(err: reqwest::Error) -> Self {
        SmsError::Network(err.to_string())
    }
}

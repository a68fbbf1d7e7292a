//! Outcomes of the authentication and key lifecycle paths

use thiserror::Error;

use super::validation::ApiKeyValidationError;
use crate::domain::DomainError;

/// Errors produced while authenticating, authorizing or managing API keys
#[derive(Debug, Error)]
pub enum ApiKeyError {
    #[error("Missing credential")]
    MissingCredential,

    #[error("Malformed credential")]
    MalformedCredential,

    /// No matching key, or the key has expired
    #[error("Invalid credential")]
    InvalidCredential,

    #[error("Key is not allowed to access this scope")]
    ScopeDenied,

    #[error("Rate limit exceeded, retry after {retry_after_secs} seconds")]
    RateLimited { retry_after_secs: u64 },

    #[error("Key store unavailable: {0}")]
    GatewayUnavailable(String),

    #[error(transparent)]
    Validation(#[from] ApiKeyValidationError),

    #[error("API key not found")]
    NotFound,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<DomainError> for ApiKeyError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::NotFound { .. } => Self::NotFound,
            DomainError::Internal { message }
            | DomainError::Conflict { message }
            | DomainError::Configuration { message } => Self::Internal(message),
            DomainError::Storage { message } => Self::GatewayUnavailable(message),
        }
    }
}

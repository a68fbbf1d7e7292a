//! HTTP request and response types

pub mod error;
pub mod json;

pub use error::{ApiError, ApiErrorResponse, ApiErrorType, INVALID_CREDENTIAL_MESSAGE};
pub use json::Json;

//! API key input validation

use thiserror::Error;

/// Errors that can occur while validating API key input
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ApiKeyValidationError {
    #[error("Name must be at least {0} characters")]
    NameTooShort(usize),

    #[error("Name exceeds maximum length of {0} characters")]
    NameTooLong(usize),

    #[error("Expiry must be between {min} and {max} days, got {value}")]
    ExpiryOutOfRange { min: u32, max: u32, value: u32 },

    #[error("{kind} cannot be empty")]
    EmptyIdentifier { kind: &'static str },

    #[error("{kind} exceeds maximum length of {max} characters")]
    IdentifierTooLong { kind: &'static str, max: usize },

    #[error("{kind} contains invalid character: '{ch}'")]
    InvalidIdentifierCharacter { kind: &'static str, ch: char },
}

pub const MIN_KEY_NAME_LENGTH: usize = 3;
pub const MAX_KEY_NAME_LENGTH: usize = 50;
pub const MIN_EXPIRY_DAYS: u32 = 1;
pub const MAX_EXPIRY_DAYS: u32 = 365;

const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Validate a human-readable key name
///
/// Leading and trailing whitespace is ignored; the remaining name must be
/// 3 to 50 characters long.
pub fn validate_key_name(name: &str) -> Result<(), ApiKeyValidationError> {
    let length = name.trim().chars().count();

    if length < MIN_KEY_NAME_LENGTH {
        return Err(ApiKeyValidationError::NameTooShort(MIN_KEY_NAME_LENGTH));
    }

    if length > MAX_KEY_NAME_LENGTH {
        return Err(ApiKeyValidationError::NameTooLong(MAX_KEY_NAME_LENGTH));
    }

    Ok(())
}

/// Validate a requested lifetime in days
pub fn validate_expiry_days(days: u32) -> Result<(), ApiKeyValidationError> {
    if !(MIN_EXPIRY_DAYS..=MAX_EXPIRY_DAYS).contains(&days) {
        return Err(ApiKeyValidationError::ExpiryOutOfRange {
            min: MIN_EXPIRY_DAYS,
            max: MAX_EXPIRY_DAYS,
            value: days,
        });
    }

    Ok(())
}

/// Validate an opaque identifier (key, owner or scope id)
///
/// Identifiers come from other systems, so only the shape is constrained:
/// non-empty, bounded, and free of whitespace and control characters.
pub fn validate_identifier(kind: &'static str, id: &str) -> Result<(), ApiKeyValidationError> {
    if id.is_empty() {
        return Err(ApiKeyValidationError::EmptyIdentifier { kind });
    }

    if id.len() > MAX_IDENTIFIER_LENGTH {
        return Err(ApiKeyValidationError::IdentifierTooLong {
            kind,
            max: MAX_IDENTIFIER_LENGTH,
        });
    }

    if let Some(ch) = id.chars().find(|c| c.is_whitespace() || c.is_control()) {
        return Err(ApiKeyValidationError::InvalidIdentifierCharacter { kind, ch });
    }

    Ok(())
}

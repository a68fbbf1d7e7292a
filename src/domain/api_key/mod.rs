//! API Key domain
//!
//! This module provides domain types and traits for programmatic API key
//! authentication: key records, the authenticated principal, scope
//! enforcement and the key store gateway.

mod entity;
mod error;
mod principal;
mod repository;
mod scope;
mod validation;

pub use entity::{ApiKey, ApiKeyId, KeyLookup, KeyOwner, OwnerId, ScopeId};
pub use error::ApiKeyError;
pub use principal::{AuthenticatedPrincipal, PrincipalKind};
pub use repository::ApiKeyRepository;
#[cfg(test)]
pub use repository::MockApiKeyRepository;
pub use scope::{enforce_scope, is_scope_allowed, ScopeDirectory};
pub use validation::{
    validate_expiry_days, validate_identifier, validate_key_name, ApiKeyValidationError,
    MAX_EXPIRY_DAYS, MAX_KEY_NAME_LENGTH, MIN_EXPIRY_DAYS, MIN_KEY_NAME_LENGTH,
};

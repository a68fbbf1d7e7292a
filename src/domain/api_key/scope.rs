//! Scope enforcement and the scope directory collaborator

use std::fmt::Debug;

use async_trait::async_trait;

use super::entity::{OwnerId, ScopeId};
use super::error::ApiKeyError;
use super::principal::AuthenticatedPrincipal;
use crate::domain::DomainError;

/// Decide whether a key's scope binding admits the requested scope
///
/// A scoped key only admits its own scope. An unscoped key has no binding
/// to check; its owner's rights are looked up in the [`ScopeDirectory`].
pub fn is_scope_allowed(principal: &AuthenticatedPrincipal, requested: &ScopeId) -> bool {
    match &principal.scope_id {
        None => true,
        Some(bound) => bound == requested,
    }
}

/// Like [`is_scope_allowed`], failing with `ScopeDenied`
pub fn enforce_scope(
    principal: &AuthenticatedPrincipal,
    requested: &ScopeId,
) -> Result<(), ApiKeyError> {
    if is_scope_allowed(principal, requested) {
        Ok(())
    } else {
        Err(ApiKeyError::ScopeDenied)
    }
}

/// Rights lookup for tenant scopes, backed by the agency tables
#[async_trait]
pub trait ScopeDirectory: Send + Sync + Debug {
    /// Whether the owner owns the scope or is one of its admins
    async fn can_manage(&self, owner_id: &OwnerId, scope_id: &ScopeId)
        -> Result<bool, DomainError>;
}

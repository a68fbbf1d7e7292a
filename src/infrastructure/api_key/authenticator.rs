//! Bearer credential authentication
//!
//! Turns an `Authorization` header into an [`AuthenticatedPrincipal`].
//! Every attempt emits exactly one audit event. The caller only learns the
//! coarse outcome; the audit trail records the precise cause.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::domain::api_key::{
    enforce_scope, ApiKeyError, ApiKeyRepository, AuthenticatedPrincipal, KeyLookup,
    ScopeDirectory, ScopeId,
};
use crate::domain::audit::{AuditEvent, AuthFailureReason, RequestMetadata};
use crate::domain::clock::Clock;
use crate::infrastructure::audit::AuditEmitter;
use crate::infrastructure::observability::record_auth_outcome;

use super::generator::{display_prefix, KeyMaterialGenerator};
use super::hasher::KeyHasher;

const BEARER_SCHEME: &str = "Bearer ";

struct AuthFailure {
    reason: AuthFailureReason,
    error: ApiKeyError,
}

impl AuthFailure {
    fn new(reason: AuthFailureReason, error: ApiKeyError) -> Self {
        Self { reason, error }
    }

    fn invalid(reason: AuthFailureReason) -> Self {
        Self::new(reason, ApiKeyError::InvalidCredential)
    }
}

/// Validates bearer credentials against the key store
#[derive(Debug, Clone)]
pub struct Authenticator {
    repository: Arc<dyn ApiKeyRepository>,
    scopes: Arc<dyn ScopeDirectory>,
    generator: KeyMaterialGenerator,
    hasher: KeyHasher,
    clock: Arc<dyn Clock>,
    audit: AuditEmitter,
}

impl Authenticator {
    pub fn new(
        repository: Arc<dyn ApiKeyRepository>,
        scopes: Arc<dyn ScopeDirectory>,
        generator: KeyMaterialGenerator,
        hasher: KeyHasher,
        clock: Arc<dyn Clock>,
        audit: AuditEmitter,
    ) -> Self {
        Self {
            repository,
            scopes,
            generator,
            hasher,
            clock,
            audit,
        }
    }

    /// Authenticate the raw `Authorization` header value
    ///
    /// On success the last-used timestamp is updated in the background; a
    /// failure to do so is only logged.
    pub async fn authenticate(
        &self,
        authorization: Option<&str>,
        request: &RequestMetadata,
    ) -> Result<AuthenticatedPrincipal, ApiKeyError> {
        match self.resolve(authorization).await {
            Ok(lookup) => {
                let now = self.clock.now();
                self.touch_in_background(&lookup, now);

                self.audit
                    .emit(AuditEvent::key_used(&lookup.key, now, request.clone()));
                record_auth_outcome("success");

                debug!(
                    key_id = %lookup.key.id(),
                    key_prefix = lookup.key.display_prefix(),
                    "API key authenticated"
                );

                Ok(AuthenticatedPrincipal::from_key(&lookup))
            }
            Err(failure) => {
                self.audit.emit(AuditEvent::auth_failed(
                    failure.reason,
                    self.clock.now(),
                    request.clone(),
                ));
                record_auth_outcome(failure.reason.as_str());

                Err(failure.error)
            }
        }
    }

    /// Check that the principal may act on `requested`, auditing a denial
    ///
    /// A scoped key reaches only its own scope. An unscoped key reaches the
    /// scopes its owner owns or administers right now.
    pub async fn authorize_scope(
        &self,
        principal: &AuthenticatedPrincipal,
        requested: &ScopeId,
        request: &RequestMetadata,
    ) -> Result<(), ApiKeyError> {
        let outcome = match &principal.scope_id {
            Some(_) => enforce_scope(principal, requested),
            None => {
                let allowed = self
                    .scopes
                    .can_manage(&principal.id, requested)
                    .await
                    .inspect_err(|e| warn!(error = %e, "Scope directory lookup failed"))?;

                if allowed {
                    Ok(())
                } else {
                    Err(ApiKeyError::ScopeDenied)
                }
            }
        };

        outcome.inspect_err(|_| {
            self.audit.emit(AuditEvent::scope_denied(
                &principal.id,
                principal.key_id.clone(),
                requested,
                self.clock.now(),
                request.clone(),
            ));
        })
    }

    async fn resolve(&self, authorization: Option<&str>) -> Result<KeyLookup, AuthFailure> {
        let header = authorization.ok_or_else(|| {
            AuthFailure::new(AuthFailureReason::Missing, ApiKeyError::MissingCredential)
        })?;

        let secret = parse_bearer(header)
            .filter(|secret| self.generator.is_well_formed(secret))
            .ok_or_else(|| {
                AuthFailure::new(AuthFailureReason::Malformed, ApiKeyError::MalformedCredential)
            })?;

        let digest = self.hasher.lookup_digest(secret);

        let lookup = self
            .repository
            .find_by_lookup_hash(&digest)
            .await
            .map_err(|e| {
                warn!(error = %e, "Key store lookup failed");
                AuthFailure::new(
                    AuthFailureReason::GatewayError,
                    ApiKeyError::GatewayUnavailable(e.to_string()),
                )
            })?
            .ok_or_else(|| {
                debug!(key_prefix = display_prefix(secret), "No API key matches credential");
                AuthFailure::invalid(AuthFailureReason::NotFound)
            })?;

        if !self.verify(secret, lookup.key.secret_hash()).await? {
            return Err(AuthFailure::invalid(AuthFailureReason::HashMismatch));
        }

        if lookup.key.is_expired_at(self.clock.now()) {
            return Err(AuthFailure::invalid(AuthFailureReason::Expired));
        }

        Ok(lookup)
    }

    /// Run the slow hash comparison on the blocking pool
    async fn verify(&self, secret: &str, stored_hash: &str) -> Result<bool, AuthFailure> {
        let hasher = self.hasher.clone();
        let secret = secret.to_string();
        let stored_hash = stored_hash.to_string();

        tokio::task::spawn_blocking(move || hasher.verify(&secret, &stored_hash))
            .await
            .map_err(|e| {
                AuthFailure::new(
                    AuthFailureReason::Internal,
                    ApiKeyError::Internal(format!("Hash verification task failed: {}", e)),
                )
            })
    }

    fn touch_in_background(&self, lookup: &KeyLookup, at: chrono::DateTime<chrono::Utc>) {
        let repository = self.repository.clone();
        let key_id = lookup.key.id().clone();

        tokio::spawn(async move {
            if let Err(e) = repository.touch_last_used(&key_id, at).await {
                warn!(key_id = %key_id, error = %e, "Failed to update API key last-used time");
            }
        });
    }
}

/// Extract the secret from `Bearer <secret>`
///
/// The scheme is case-sensitive and exactly one space separates it from a
/// non-empty secret without whitespace.
pub fn parse_bearer(header: &str) -> Option<&str> {
    let secret = header.strip_prefix(BEARER_SCHEME)?;

    if secret.is_empty() || secret.chars().any(char::is_whitespace) {
        return None;
    }

    Some(secret)
}

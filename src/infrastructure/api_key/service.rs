//! API Key service
//!
//! Key lifecycle: creation behind a per-owner rate limit, listing, owned
//! deletion and the expired-key cleanup pass.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::domain::api_key::{
    validate_expiry_days, validate_key_name, ApiKey, ApiKeyError, ApiKeyId, ApiKeyRepository,
    OwnerId, ScopeDirectory, ScopeId,
};
use crate::domain::audit::{AuditEvent, RequestMetadata};
use crate::domain::clock::Clock;
use crate::domain::rate_limit::{key_creation_subject, RateLimitDecision, RateLimiter};
use crate::infrastructure::audit::AuditEmitter;
use crate::infrastructure::observability::record_rate_limited;

use super::generator::KeyMaterialGenerator;
use super::hasher::KeyHasher;

/// Key creation throttle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyCreationLimit {
    pub max_count: u32,
    pub window: Duration,
}

impl Default for KeyCreationLimit {
    fn default() -> Self {
        Self {
            max_count: 5,
            window: Duration::from_secs(3600),
        }
    }
}

/// Input for creating a key
#[derive(Debug, Clone)]
pub struct CreateApiKeyRequest {
    pub name: String,
    pub scope_id: Option<ScopeId>,
    pub expires_in_days: Option<u32>,
}

impl CreateApiKeyRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scope_id: None,
            expires_in_days: None,
        }
    }

    pub fn with_scope(mut self, scope_id: ScopeId) -> Self {
        self.scope_id = Some(scope_id);
        self
    }

    pub fn with_expiry_days(mut self, days: u32) -> Self {
        self.expires_in_days = Some(days);
        self
    }
}

/// Result of creating a new API key
///
/// The secret is returned here and nowhere else.
pub struct CreatedApiKey {
    pub key: ApiKey,
    pub secret: String,
}

impl std::fmt::Debug for CreatedApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreatedApiKey")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

/// API Key service for managing API keys
#[derive(Debug, Clone)]
pub struct ApiKeyService {
    repository: Arc<dyn ApiKeyRepository>,
    scopes: Arc<dyn ScopeDirectory>,
    rate_limiter: Arc<dyn RateLimiter>,
    generator: KeyMaterialGenerator,
    hasher: KeyHasher,
    clock: Arc<dyn Clock>,
    audit: AuditEmitter,
    creation_limit: KeyCreationLimit,
}

impl ApiKeyService {
    pub fn new(
        repository: Arc<dyn ApiKeyRepository>,
        scopes: Arc<dyn ScopeDirectory>,
        rate_limiter: Arc<dyn RateLimiter>,
        hasher: KeyHasher,
        clock: Arc<dyn Clock>,
        audit: AuditEmitter,
    ) -> Self {
        Self {
            repository,
            scopes,
            rate_limiter,
            generator: KeyMaterialGenerator::default(),
            hasher,
            clock,
            audit,
            creation_limit: KeyCreationLimit::default(),
        }
    }

    /// Create with a custom generator
    pub fn with_generator(mut self, generator: KeyMaterialGenerator) -> Self {
        self.generator = generator;
        self
    }

    /// Create with a custom creation throttle
    pub fn with_creation_limit(mut self, limit: KeyCreationLimit) -> Self {
        self.creation_limit = limit;
        self
    }

    /// Create a new API key for `owner_id`
    pub async fn create(
        &self,
        owner_id: &OwnerId,
        request: CreateApiKeyRequest,
        metadata: &RequestMetadata,
    ) -> Result<CreatedApiKey, ApiKeyError> {
        self.check_creation_limit(owner_id, metadata).await?;

        validate_key_name(&request.name)?;
        if let Some(days) = request.expires_in_days {
            validate_expiry_days(days)?;
        }

        if let Some(scope_id) = &request.scope_id {
            self.ensure_can_manage(owner_id, scope_id, metadata).await?;
        }

        let generated = self.generator.generate()?;
        let secret_hash = self.hash_in_background(&generated.secret).await?;
        let lookup_hash = self.hasher.lookup_digest(&generated.secret);

        let now = self.clock.now();
        let mut key = ApiKey::new(
            ApiKeyId::generate(),
            request.name.trim(),
            secret_hash,
            lookup_hash,
            generated.display_prefix.clone(),
            owner_id.clone(),
            now,
        );

        if let Some(scope_id) = request.scope_id {
            key = key.with_scope(scope_id);
        }

        if let Some(days) = request.expires_in_days {
            key = key.with_expiration(now + chrono::Duration::days(i64::from(days)));
        }

        self.repository.insert(&key).await?;

        self.audit
            .emit(AuditEvent::key_created(&key, now, metadata.clone()));

        info!(
            key_id = %key.id(),
            key_prefix = key.display_prefix(),
            owner_id = %owner_id,
            "API key created"
        );

        Ok(CreatedApiKey {
            key,
            secret: generated.secret,
        })
    }

    /// List an owner's keys, optionally within one scope
    pub async fn list(
        &self,
        owner_id: &OwnerId,
        scope_id: Option<ScopeId>,
        metadata: &RequestMetadata,
    ) -> Result<Vec<ApiKey>, ApiKeyError> {
        if let Some(scope_id) = &scope_id {
            self.ensure_can_manage(owner_id, scope_id, metadata).await?;
        }

        Ok(self.repository.list_by_owner(owner_id, scope_id).await?)
    }

    /// Delete a key the owner holds
    ///
    /// A foreign key and a nonexistent key both yield `NotFound`.
    pub async fn delete(
        &self,
        owner_id: &OwnerId,
        id: &ApiKeyId,
        metadata: &RequestMetadata,
    ) -> Result<ApiKey, ApiKeyError> {
        let deleted = self
            .repository
            .delete_owned(id, owner_id)
            .await?
            .ok_or(ApiKeyError::NotFound)?;

        self.audit.emit(AuditEvent::key_deleted(
            &deleted,
            self.clock.now(),
            metadata.clone(),
        ));

        info!(key_id = %deleted.id(), owner_id = %owner_id, "API key deleted");

        Ok(deleted)
    }

    /// Remove every expired key, returning how many were deleted
    pub async fn cleanup_expired(&self) -> Result<u64, ApiKeyError> {
        let removed = self.repository.delete_expired(self.clock.now()).await?;

        if removed > 0 {
            info!(removed, "Cleaned up expired API keys");
        } else {
            debug!("No expired API keys to clean up");
        }

        Ok(removed)
    }

    async fn check_creation_limit(
        &self,
        owner_id: &OwnerId,
        metadata: &RequestMetadata,
    ) -> Result<(), ApiKeyError> {
        let decision = self
            .rate_limiter
            .check(
                &key_creation_subject(owner_id),
                self.creation_limit.max_count,
                self.creation_limit.window,
            )
            .await?;

        match decision {
            RateLimitDecision::Allowed => Ok(()),
            RateLimitDecision::Limited { retry_after_secs } => {
                self.audit.emit(AuditEvent::creation_rate_limited(
                    owner_id,
                    self.clock.now(),
                    metadata.clone(),
                ));
                record_rate_limited("key_creation");

                warn!(owner_id = %owner_id, retry_after_secs, "API key creation rate limited");

                Err(ApiKeyError::RateLimited { retry_after_secs })
            }
        }
    }

    async fn ensure_can_manage(
        &self,
        owner_id: &OwnerId,
        scope_id: &ScopeId,
        metadata: &RequestMetadata,
    ) -> Result<(), ApiKeyError> {
        if self.scopes.can_manage(owner_id, scope_id).await? {
            return Ok(());
        }

        self.audit.emit(AuditEvent::scope_denied(
            owner_id,
            None,
            scope_id,
            self.clock.now(),
            metadata.clone(),
        ));

        Err(ApiKeyError::ScopeDenied)
    }

    async fn hash_in_background(&self, secret: &str) -> Result<String, ApiKeyError> {
        let hasher = self.hasher.clone();
        let secret = secret.to_string();

        tokio::task::spawn_blocking(move || hasher.hash(&secret))
            .await
            .map_err(|e| ApiKeyError::Internal(format!("Hashing task failed: {}", e)))?
            .map_err(ApiKeyError::from)
    }
}

//! Key store gateway
//!
//! The only interface the authentication core uses to reach persisted keys.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::entity::{ApiKey, ApiKeyId, KeyLookup, OwnerId, ScopeId};
use crate::domain::DomainError;

#[cfg(test)]
use mockall::automock;

/// Repository trait for API key storage
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ApiKeyRepository: Send + Sync {
    /// Find a key and its owner by lookup digest
    ///
    /// Expired records are still returned; the caller decides.
    async fn find_by_lookup_hash(&self, lookup_hash: &str)
        -> Result<Option<KeyLookup>, DomainError>;

    /// Insert a freshly created key
    async fn insert(&self, key: &ApiKey) -> Result<(), DomainError>;

    /// Delete a key only if it belongs to the owner
    ///
    /// Returns `None` both when the key does not exist and when it belongs to
    /// someone else.
    async fn delete_owned(
        &self,
        id: &ApiKeyId,
        owner_id: &OwnerId,
    ) -> Result<Option<ApiKey>, DomainError>;

    /// Best-effort update of the last-used timestamp
    async fn touch_last_used(&self, id: &ApiKeyId, at: DateTime<Utc>) -> Result<(), DomainError>;

    /// List an owner's keys, optionally restricted to one scope, oldest first
    async fn list_by_owner(
        &self,
        owner_id: &OwnerId,
        scope_id: Option<ScopeId>,
    ) -> Result<Vec<ApiKey>, DomainError>;

    /// Remove every key expired at `now`, returning the count
    ///
    /// Uses the same boundary as [`ApiKey::is_expired_at`].
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, DomainError>;
}

impl std::fmt::Debug for dyn ApiKeyRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("<ApiKeyRepository>")
    }
}

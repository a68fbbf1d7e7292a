//! In-memory API key repository implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::api_key::{
    ApiKey, ApiKeyId, ApiKeyRepository, KeyLookup, KeyOwner, OwnerId, ScopeId,
};
use crate::domain::DomainError;

#[derive(Debug, Default)]
struct Store {
    keys: HashMap<String, ApiKey>,
    lookup_index: HashMap<String, String>,
    owners: HashMap<String, KeyOwner>,
}

/// In-memory implementation of ApiKeyRepository
///
/// Owners must be registered with [`upsert_owner`](Self::upsert_owner)
/// before their keys can be resolved, mirroring the user table join of the
/// Postgres store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryApiKeyRepository {
    store: Arc<RwLock<Store>>,
}

impl InMemoryApiKeyRepository {
    /// Create a new in-memory repository
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or update the identity of a key owner
    pub async fn upsert_owner(&self, owner: KeyOwner) {
        let mut store = self.store.write().await;
        store.owners.insert(owner.id.as_str().to_string(), owner);
    }

    /// Fetch a key by id, whatever its owner
    pub async fn get(&self, id: &ApiKeyId) -> Option<ApiKey> {
        let store = self.store.read().await;
        store.keys.get(id.as_str()).cloned()
    }

    pub async fn count(&self) -> usize {
        self.store.read().await.keys.len()
    }
}

#[async_trait]
impl ApiKeyRepository for InMemoryApiKeyRepository {
    async fn find_by_lookup_hash(
        &self,
        lookup_hash: &str,
    ) -> Result<Option<KeyLookup>, DomainError> {
        let store = self.store.read().await;

        let Some(key) = store
            .lookup_index
            .get(lookup_hash)
            .and_then(|id| store.keys.get(id))
        else {
            return Ok(None);
        };

        Ok(store
            .owners
            .get(key.owner_id().as_str())
            .map(|owner| KeyLookup {
                key: key.clone(),
                owner: owner.clone(),
            }))
    }

    async fn insert(&self, key: &ApiKey) -> Result<(), DomainError> {
        let mut store = self.store.write().await;

        let id = key.id().as_str().to_string();
        if store.keys.contains_key(&id) {
            return Err(DomainError::conflict(format!(
                "API key with ID '{}' already exists",
                id
            )));
        }

        if store.lookup_index.contains_key(key.lookup_hash())
            || store
                .keys
                .values()
                .any(|existing| existing.secret_hash() == key.secret_hash())
        {
            return Err(DomainError::conflict("API key hash already exists"));
        }

        store
            .lookup_index
            .insert(key.lookup_hash().to_string(), id.clone());
        store.keys.insert(id, key.clone());

        Ok(())
    }

    async fn delete_owned(
        &self,
        id: &ApiKeyId,
        owner_id: &OwnerId,
    ) -> Result<Option<ApiKey>, DomainError> {
        let mut store = self.store.write().await;

        let owned = store
            .keys
            .get(id.as_str())
            .is_some_and(|key| key.owner_id() == owner_id);
        if !owned {
            return Ok(None);
        }

        let removed = store.keys.remove(id.as_str());
        if let Some(key) = &removed {
            store.lookup_index.remove(key.lookup_hash());
        }

        Ok(removed)
    }

    async fn touch_last_used(&self, id: &ApiKeyId, at: DateTime<Utc>) -> Result<(), DomainError> {
        let mut store = self.store.write().await;

        // A key deleted between lookup and touch is not an error
        if let Some(key) = store.keys.get_mut(id.as_str()) {
            key.record_usage(at);
        }

        Ok(())
    }

    async fn list_by_owner(
        &self,
        owner_id: &OwnerId,
        scope_id: Option<ScopeId>,
    ) -> Result<Vec<ApiKey>, DomainError> {
        let store = self.store.read().await;

        let mut keys: Vec<ApiKey> = store
            .keys
            .values()
            .filter(|k| k.owner_id() == owner_id)
            .filter(|k| match &scope_id {
                Some(scope) => k.scope_id() == Some(scope),
                None => true,
            })
            .cloned()
            .collect();

        keys.sort_by(|a, b| {
            a.created_at()
                .cmp(&b.created_at())
                .then_with(|| a.id().as_str().cmp(b.id().as_str()))
        });

        Ok(keys)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, DomainError> {
        let mut store = self.store.write().await;

        let expired: Vec<ApiKey> = store
            .keys
            .values()
            .filter(|k| k.is_expired_at(now))
            .cloned()
            .collect();

        for key in &expired {
            store.keys.remove(key.id().as_str());
            store.lookup_index.remove(key.lookup_hash());
        }

        Ok(expired.len() as u64)
    }
}

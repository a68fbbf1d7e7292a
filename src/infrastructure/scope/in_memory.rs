//! In-memory scope directory

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::api_key::{OwnerId, ScopeDirectory, ScopeId};
use crate::domain::DomainError;

#[derive(Debug, Default)]
struct Scopes {
    owners: HashMap<String, String>,
    admins: HashMap<String, HashSet<String>>,
}

/// Scope rights held in memory
///
/// An owner can manage a scope it owns or administers.
#[derive(Debug, Clone, Default)]
pub struct InMemoryScopeDirectory {
    scopes: Arc<RwLock<Scopes>>,
}

impl InMemoryScopeDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a scope and its owning user
    pub async fn add_scope(&self, scope_id: &ScopeId, owner_id: &OwnerId) {
        let mut scopes = self.scopes.write().await;
        scopes
            .owners
            .insert(scope_id.as_str().to_string(), owner_id.as_str().to_string());
    }

    /// Grant admin rights on a scope
    pub async fn add_admin(&self, scope_id: &ScopeId, owner_id: &OwnerId) {
        let mut scopes = self.scopes.write().await;
        scopes
            .admins
            .entry(scope_id.as_str().to_string())
            .or_default()
            .insert(owner_id.as_str().to_string());
    }
}

#[async_trait]
impl ScopeDirectory for InMemoryScopeDirectory {
    async fn can_manage(
        &self,
        owner_id: &OwnerId,
        scope_id: &ScopeId,
    ) -> Result<bool, DomainError> {
        let scopes = self.scopes.read().await;

        let is_owner = scopes
            .owners
            .get(scope_id.as_str())
            .is_some_and(|o| o == owner_id.as_str());
        let is_admin = scopes
            .admins
            .get(scope_id.as_str())
            .is_some_and(|admins| admins.contains(owner_id.as_str()));

        Ok(is_owner || is_admin)
    }
}

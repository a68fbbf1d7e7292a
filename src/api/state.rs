//! Application state for shared services

use std::sync::Arc;

use crate::infrastructure::api_key::{ApiKeyService, Authenticator, InMemoryApiKeyRepository};

/// Application state shared by every handler and extractor
#[derive(Debug, Clone)]
pub struct AppState {
    pub api_key_service: Arc<ApiKeyService>,
    pub authenticator: Arc<Authenticator>,
    /// Accept owner identity from `X-Owner-*` headers on management routes
    pub trust_owner_headers: bool,
    /// Owner table of the in-memory key store, fed from trusted owner headers
    pub local_owners: Option<InMemoryApiKeyRepository>,
}

impl AppState {
    pub fn new(
        api_key_service: Arc<ApiKeyService>,
        authenticator: Arc<Authenticator>,
        trust_owner_headers: bool,
    ) -> Self {
        Self {
            api_key_service,
            authenticator,
            trust_owner_headers,
            local_owners: None,
        }
    }

    /// Register owners seen on management routes in an in-memory key store
    pub fn with_local_owners(mut self, repository: InMemoryApiKeyRepository) -> Self {
        self.local_owners = Some(repository);
        self
    }
}

//! Shared wiring for integration tests

#![allow(dead_code)]

use std::sync::Arc;

use coldflow_api_keys::api::state::AppState;
use coldflow_api_keys::config::HashingConfig;
use coldflow_api_keys::domain::api_key::{KeyOwner, OwnerId, ScopeId};
use coldflow_api_keys::domain::audit::RequestMetadata;
use coldflow_api_keys::domain::clock::ManualClock;
use coldflow_api_keys::infrastructure::api_key::InMemoryApiKeyRepository;
use coldflow_api_keys::infrastructure::audit::{AuditEmitter, InMemoryAuditSink};
use coldflow_api_keys::infrastructure::rate_limit::InMemoryRateLimiter;
use coldflow_api_keys::infrastructure::scope::InMemoryScopeDirectory;
use coldflow_api_keys::{build_services, AppConfig, Backends, Services};

pub struct TestHarness {
    pub services: Services,
    pub clock: Arc<ManualClock>,
    pub audit: InMemoryAuditSink,
    pub owners: InMemoryApiKeyRepository,
    pub scopes: InMemoryScopeDirectory,
}

impl TestHarness {
    pub async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    pub async fn with_config(config: AppConfig) -> Self {
        let clock = Arc::new(ManualClock::starting_now());
        let audit = InMemoryAuditSink::new();
        let owners = InMemoryApiKeyRepository::new();
        let scopes = InMemoryScopeDirectory::new();

        let backends = Backends {
            repository: Arc::new(owners.clone()),
            scopes: Arc::new(scopes.clone()),
            rate_limiter: Arc::new(InMemoryRateLimiter::new(clock.clone())),
            local_owners: Some(owners.clone()),
            memory_limiter: None,
        };

        let services = build_services(
            &config,
            &backends,
            clock.clone(),
            AuditEmitter::new(Arc::new(audit.clone())),
        )
        .unwrap();

        Self {
            services,
            clock,
            audit,
            owners,
            scopes,
        }
    }

    /// Register an owner in the in-memory user table
    pub async fn add_owner(&self, id: &str) -> KeyOwner {
        let owner = KeyOwner::new(
            OwnerId::new(id).unwrap(),
            format!("{}@example.com", id),
            id.to_uppercase(),
        );
        self.owners.upsert_owner(owner.clone()).await;
        owner
    }

    /// Register a scope owned by `owner`
    pub async fn add_scope(&self, scope: &str, owner: &KeyOwner) -> ScopeId {
        let scope_id = ScopeId::new(scope).unwrap();
        self.scopes.add_scope(&scope_id, &owner.id).await;
        scope_id
    }

    /// Grant `admin` rights on an existing scope
    pub async fn add_admin(&self, scope: &ScopeId, admin: &KeyOwner) {
        self.scopes.add_admin(scope, &admin.id).await;
    }

    pub fn app_state(&self, trust_owner_headers: bool) -> AppState {
        AppState::new(
            self.services.api_key_service.clone(),
            self.services.authenticator.clone(),
            trust_owner_headers,
        )
        .with_local_owners(self.owners.clone())
    }
}

/// In-memory backends with the cheapest argon2 cost
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.hashing = HashingConfig {
        memory_kib: 8,
        iterations: 1,
        parallelism: 1,
    };
    config.keys.lookup_pepper = "integration-test-pepper".to_string();
    config.metrics.enabled = false;
    config
}

pub fn request_meta() -> RequestMetadata {
    RequestMetadata::new(Some("203.0.113.7".to_string()), Some("it/1.0".to_string()))
}

pub fn bearer(secret: &str) -> String {
    format!("Bearer {}", secret)
}

//! Coldflow API key service
//!
//! Programmatic authentication for the Coldflow back end:
//! - Bearer API keys resolved to an authenticated principal
//! - Optional binding of a key to a single scope
//! - Throttled key creation with a fixed-window limiter
//! - Audit events for every authentication and lifecycle change

pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use crate::config::AppConfig;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use rand::{rngs::OsRng, RngCore};
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

use crate::api::state::AppState;
use crate::config::{RateLimitBackend, ScopeGrant, StorageBackend};
use crate::domain::api_key::{ApiKeyRepository, OwnerId, ScopeDirectory, ScopeId};
use crate::domain::clock::{Clock, SystemClock};
use crate::domain::rate_limit::RateLimiter;
use crate::infrastructure::api_key::{
    ApiKeyService, Authenticator, HashingParams, InMemoryApiKeyRepository, KeyCreationLimit,
    KeyHasher, KeyMaterialGenerator, PostgresApiKeyRepository,
};
use crate::infrastructure::audit::AuditEmitter;
use crate::infrastructure::rate_limit::{InMemoryRateLimiter, RedisRateLimiter, RedisRateLimiterConfig};
use crate::infrastructure::scope::{InMemoryScopeDirectory, PostgresScopeDirectory};

const DEV_PEPPER_BYTES: usize = 32;
const MAX_DB_CONNECTIONS: u32 = 10;

/// Key store, scope directory and counters selected by configuration
#[derive(Debug, Clone)]
pub struct Backends {
    pub repository: Arc<dyn ApiKeyRepository>,
    pub scopes: Arc<dyn ScopeDirectory>,
    pub rate_limiter: Arc<dyn RateLimiter>,
    /// Owner table of the memory store, fed from trusted owner headers
    pub local_owners: Option<InMemoryApiKeyRepository>,
    /// Set for the memory limiter, whose table needs a periodic sweep
    pub memory_limiter: Option<Arc<InMemoryRateLimiter>>,
}

/// Services wired on top of the backends
#[derive(Debug, Clone)]
pub struct Services {
    pub api_key_service: Arc<ApiKeyService>,
    pub authenticator: Arc<Authenticator>,
}

/// Build the application state from configuration
pub async fn create_app_state(config: &AppConfig) -> anyhow::Result<(AppState, Backends)> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let backends = connect_backends(config, &clock).await?;
    let services = build_services(config, &backends, clock, AuditEmitter::default())?;

    let mut state = AppState::new(
        services.api_key_service,
        services.authenticator,
        config.auth.trust_owner_headers,
    );
    if let Some(owners) = &backends.local_owners {
        state = state.with_local_owners(owners.clone());
    }

    Ok((state, backends))
}

/// Connect the configured key store and rate limiter
pub async fn connect_backends(
    config: &AppConfig,
    clock: &Arc<dyn Clock>,
) -> anyhow::Result<Backends> {
    let mut local_owners = None;

    let (repository, scopes): (Arc<dyn ApiKeyRepository>, Arc<dyn ScopeDirectory>) =
        match config.storage.backend {
            StorageBackend::Memory => {
                info!("Using in-memory key store");
                let repository = InMemoryApiKeyRepository::new();
                let scopes = seeded_scopes(&config.storage.scopes).await?;
                local_owners = Some(repository.clone());

                let repository: Arc<dyn ApiKeyRepository> = Arc::new(repository);
                let scopes: Arc<dyn ScopeDirectory> = Arc::new(scopes);
                (repository, scopes)
            }
            StorageBackend::Postgres => {
                let url = config
                    .storage
                    .database_url
                    .as_deref()
                    .context("storage.database_url is required for the postgres backend")?;

                if !config.storage.scopes.is_empty() {
                    warn!("storage.scopes is ignored by the postgres backend");
                }

                let pool = PgPoolOptions::new()
                    .max_connections(MAX_DB_CONNECTIONS)
                    .connect(url)
                    .await
                    .context("Failed to connect to PostgreSQL")?;

                info!("Using PostgreSQL key store");

                let repository: Arc<dyn ApiKeyRepository> =
                    Arc::new(PostgresApiKeyRepository::new(pool.clone()));
                let scopes: Arc<dyn ScopeDirectory> = Arc::new(PostgresScopeDirectory::new(pool));
                (repository, scopes)
            }
        };

    let mut memory_limiter = None;
    let rate_limiter: Arc<dyn RateLimiter> = match config.rate_limit.backend {
        RateLimitBackend::Memory => {
            let limiter = Arc::new(InMemoryRateLimiter::new(Arc::clone(clock)));
            memory_limiter = Some(Arc::clone(&limiter));

            let limiter: Arc<dyn RateLimiter> = limiter;
            limiter
        }
        RateLimitBackend::Redis => {
            let url = config
                .rate_limit
                .redis_url
                .as_deref()
                .context("rate_limit.redis_url is required for the redis backend")?;

            Arc::new(RedisRateLimiter::new(RedisRateLimiterConfig::new(url)).await?)
        }
    };

    Ok(Backends {
        repository,
        scopes,
        rate_limiter,
        local_owners,
        memory_limiter,
    })
}

/// Build every service with an injected clock and audit emitter
pub fn build_services(
    config: &AppConfig,
    backends: &Backends,
    clock: Arc<dyn Clock>,
    audit: AuditEmitter,
) -> anyhow::Result<Services> {
    let hasher = build_hasher(config)?;
    let generator = KeyMaterialGenerator::new(config.keys.secret_prefix.clone());
    let creation_limit = creation_limit(config)?;

    let api_key_service = ApiKeyService::new(
        Arc::clone(&backends.repository),
        Arc::clone(&backends.scopes),
        Arc::clone(&backends.rate_limiter),
        hasher.clone(),
        Arc::clone(&clock),
        audit.clone(),
    )
    .with_generator(generator.clone())
    .with_creation_limit(creation_limit);

    let authenticator = Authenticator::new(
        Arc::clone(&backends.repository),
        Arc::clone(&backends.scopes),
        generator,
        hasher,
        clock,
        audit,
    );

    Ok(Services {
        api_key_service: Arc::new(api_key_service),
        authenticator: Arc::new(authenticator),
    })
}

/// Validated key creation limit
///
/// A zero window would restart on every call and never throttle, and a zero
/// maximum would refuse every creation.
fn creation_limit(config: &AppConfig) -> anyhow::Result<KeyCreationLimit> {
    let limits = &config.rate_limit;

    if limits.key_creation_max == 0 {
        anyhow::bail!("rate_limit.key_creation_max must be at least 1");
    }
    if limits.key_creation_window_secs == 0 {
        anyhow::bail!("rate_limit.key_creation_window_secs must be at least 1");
    }

    let window = Duration::from_secs(limits.key_creation_window_secs);
    chrono::Duration::from_std(window)
        .ok()
        .and_then(|window| chrono::Utc::now().checked_add_signed(window))
        .context("rate_limit.key_creation_window_secs is out of range")?;

    Ok(KeyCreationLimit {
        max_count: limits.key_creation_max,
        window,
    })
}

/// Load configured scope rights into a fresh in-memory directory
async fn seeded_scopes(grants: &[ScopeGrant]) -> anyhow::Result<InMemoryScopeDirectory> {
    let scopes = InMemoryScopeDirectory::new();

    for grant in grants {
        let scope_id = ScopeId::new(grant.scope_id.as_str())
            .with_context(|| format!("Invalid scope id '{}'", grant.scope_id))?;
        let owner_id = OwnerId::new(grant.owner_id.as_str())
            .with_context(|| format!("Invalid owner id '{}'", grant.owner_id))?;
        scopes.add_scope(&scope_id, &owner_id).await;

        for admin in &grant.admins {
            let admin_id = OwnerId::new(admin.as_str())
                .with_context(|| format!("Invalid admin id '{}'", admin))?;
            scopes.add_admin(&scope_id, &admin_id).await;
        }
    }

    if !grants.is_empty() {
        info!(count = grants.len(), "Loaded scope rights");
    }

    Ok(scopes)
}

/// Build the key hasher
///
/// Durable storage requires a configured pepper. The in-memory store gets a
/// random one per process, since its keys do not outlive it anyway.
fn build_hasher(config: &AppConfig) -> anyhow::Result<KeyHasher> {
    let params = HashingParams {
        memory_kib: config.hashing.memory_kib,
        iterations: config.hashing.iterations,
        parallelism: config.hashing.parallelism,
    };

    let pepper = if config.keys.lookup_pepper.is_empty() {
        if config.storage.backend == StorageBackend::Postgres {
            anyhow::bail!("keys.lookup_pepper must be set for the postgres backend");
        }

        warn!("keys.lookup_pepper is not set, using a random per-process pepper");
        random_pepper()?
    } else {
        config.keys.lookup_pepper.clone()
    };

    Ok(KeyHasher::new(params, pepper)?)
}

fn random_pepper() -> anyhow::Result<String> {
    let mut bytes = [0u8; DEV_PEPPER_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("Operating system randomness unavailable")?;

    Ok(hex::encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::clock::ManualClock;

    fn memory_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.keys.lookup_pepper = "pepper".to_string();
        config
    }

    #[test]
    fn test_creation_limit_from_config() {
        let limit = creation_limit(&memory_config()).unwrap();

        assert_eq!(limit.max_count, 5);
        assert_eq!(limit.window, Duration::from_secs(3600));
    }

    #[test]
    fn test_creation_limit_rejects_zero_window_and_max() {
        let mut config = memory_config();
        config.rate_limit.key_creation_window_secs = 0;
        assert!(creation_limit(&config).is_err());

        let mut config = memory_config();
        config.rate_limit.key_creation_max = 0;
        assert!(creation_limit(&config).is_err());
    }

    #[test]
    fn test_creation_limit_rejects_out_of_range_window() {
        let mut config = memory_config();
        config.rate_limit.key_creation_window_secs = 10_000_000_000_000;

        let err = creation_limit(&config).unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[tokio::test]
    async fn test_build_services_refuses_zero_window() {
        let mut config = memory_config();
        config.rate_limit.key_creation_window_secs = 0;
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::starting_now());

        let backends = connect_backends(&config, &clock).await.unwrap();

        assert!(build_services(&config, &backends, clock, AuditEmitter::default()).is_err());
    }

    #[tokio::test]
    async fn test_memory_backend_loads_scope_rights() {
        let mut config = memory_config();
        config.storage.scopes = vec![ScopeGrant {
            scope_id: "agency-1".to_string(),
            owner_id: "alice".to_string(),
            admins: vec!["bob".to_string()],
        }];
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::starting_now());

        let backends = connect_backends(&config, &clock).await.unwrap();

        let scope = ScopeId::new("agency-1").unwrap();
        for (owner, expected) in [("alice", true), ("bob", true), ("carol", false)] {
            let allowed = backends
                .scopes
                .can_manage(&OwnerId::new(owner).unwrap(), &scope)
                .await
                .unwrap();
            assert_eq!(allowed, expected, "rights of {}", owner);
        }
        assert!(backends.local_owners.is_some());
        assert!(backends.memory_limiter.is_some());
    }

    #[tokio::test]
    async fn test_invalid_scope_grant_is_rejected() {
        let mut config = memory_config();
        config.storage.scopes = vec![ScopeGrant {
            scope_id: String::new(),
            owner_id: "alice".to_string(),
            admins: Vec::new(),
        }];
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::starting_now());

        assert!(connect_backends(&config, &clock).await.is_err());
    }
}

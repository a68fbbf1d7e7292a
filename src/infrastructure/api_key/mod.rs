//! API Key infrastructure implementations
//!
//! Secret generation and hashing, key stores, bearer authentication and the
//! key lifecycle service.

mod authenticator;
mod generator;
mod hasher;
mod postgres_repository;
mod repository;
mod service;

pub use authenticator::{parse_bearer, Authenticator};
pub use generator::{
    display_prefix, GeneratedSecret, KeyMaterialGenerator, DEFAULT_SECRET_PREFIX,
    DISPLAY_PREFIX_LENGTH, SECRET_RANDOM_BYTES,
};
pub use hasher::{HashingParams, KeyHasher};
pub use postgres_repository::PostgresApiKeyRepository;
pub use repository::InMemoryApiKeyRepository;
pub use service::{ApiKeyService, CreateApiKeyRequest, CreatedApiKey, KeyCreationLimit};

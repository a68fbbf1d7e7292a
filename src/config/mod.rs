//! Application configuration

mod app_config;

pub use app_config::{
    AppConfig, AuthConfig, HashingConfig, KeysConfig, LogFormat, LoggingConfig, RateLimitBackend,
    RateLimitConfig, ScopeGrant, ServerConfig, StorageBackend, StorageConfig,
};

//! Redis-backed fixed-window rate limiter
//!
//! Shares counters between processes. Increment, expiry and remaining time
//! are read in one Lua script so check-and-increment stays atomic.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{Client, Script};

use crate::domain::rate_limit::{RateLimitDecision, RateLimiter};
use crate::domain::DomainError;

const FIXED_WINDOW_SCRIPT: &str = r#"
local count = redis.call('INCR', KEYS[1])
if count == 1 then
  redis.call('PEXPIRE', KEYS[1], ARGV[1])
end
local ttl = redis.call('PTTL', KEYS[1])
if ttl < 0 then
  redis.call('PEXPIRE', KEYS[1], ARGV[1])
  ttl = tonumber(ARGV[1])
end
return {count, ttl}
"#;

/// Configuration for the Redis limiter
#[derive(Debug, Clone)]
pub struct RedisRateLimiterConfig {
    /// Redis connection URL (e.g., "redis://127.0.0.1:6379")
    pub url: String,
    /// Namespace prepended to every counter key
    pub key_prefix: String,
}

impl RedisRateLimiterConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }
}

impl Default for RedisRateLimiterConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            key_prefix: "ratelimit".to_string(),
        }
    }
}

/// Fixed-window limiter on a shared Redis counter
///
/// Errors reaching Redis surface as storage errors; callers treat them as
/// a denial rather than letting the request through.
#[derive(Clone)]
pub struct RedisRateLimiter {
    connection: ConnectionManager,
    script: Script,
    config: RedisRateLimiterConfig,
}

impl fmt::Debug for RedisRateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisRateLimiter")
            .field("config", &self.config)
            .field("connection", &"<ConnectionManager>")
            .finish()
    }
}

impl RedisRateLimiter {
    /// Connect to Redis
    pub async fn new(config: RedisRateLimiterConfig) -> Result<Self, DomainError> {
        let client = Client::open(config.url.as_str()).map_err(|e| {
            DomainError::configuration(format!("Failed to create Redis client: {}", e))
        })?;

        let connection = ConnectionManager::new(client)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to connect to Redis: {}", e)))?;

        Ok(Self {
            connection,
            script: Script::new(FIXED_WINDOW_SCRIPT),
            config,
        })
    }

    fn counter_key(&self, subject: &str) -> String {
        counter_key(&self.config.key_prefix, subject)
    }
}

#[async_trait]
impl RateLimiter for RedisRateLimiter {
    async fn check(
        &self,
        subject: &str,
        max_count: u32,
        window: Duration,
    ) -> Result<RateLimitDecision, DomainError> {
        let window_ms = window_millis(window)?;
        let mut conn = self.connection.clone();

        let (count, ttl_ms): (i64, i64) = self
            .script
            .key(self.counter_key(subject))
            .arg(window_ms)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| {
                DomainError::storage(format!("Rate limit check failed for '{}': {}", subject, e))
            })?;

        Ok(decide(count, ttl_ms, max_count))
    }
}

fn counter_key(prefix: &str, subject: &str) -> String {
    if prefix.is_empty() {
        subject.to_string()
    } else {
        format!("{}:{}", prefix, subject)
    }
}

fn window_millis(window: Duration) -> Result<u64, DomainError> {
    if window.is_zero() {
        return Err(DomainError::configuration("Rate limit window must be positive"));
    }

    u64::try_from(window.as_millis())
        .map_err(|_| DomainError::configuration("Rate limit window is out of range"))
}

fn decide(count: i64, ttl_ms: i64, max_count: u32) -> RateLimitDecision {
    if count <= i64::from(max_count) {
        return RateLimitDecision::Allowed;
    }

    let ttl_ms = ttl_ms.max(0) as u64;
    RateLimitDecision::Limited {
        retry_after_secs: ttl_ms.div_ceil(1000).max(1),
    }
}

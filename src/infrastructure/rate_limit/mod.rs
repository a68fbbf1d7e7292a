//! Rate limiter implementations
//!
//! Fixed-window counting, either in process or shared through Redis.

mod in_memory;
mod redis;

pub use self::redis::{RedisRateLimiter, RedisRateLimiterConfig};
pub use in_memory::{InMemoryRateLimiter, SweeperHandle};

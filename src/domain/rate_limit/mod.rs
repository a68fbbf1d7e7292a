//! Rate limiting domain
//!
//! Fixed-window throttling of sensitive operations, keyed by a subject such
//! as `key-creation:<owner_id>`.

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::api_key::OwnerId;
use crate::domain::DomainError;

/// Outcome of a rate limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    Limited { retry_after_secs: u64 },
}

impl RateLimitDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }

    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Self::Allowed => None,
            Self::Limited { retry_after_secs } => Some(*retry_after_secs),
        }
    }
}

/// Fixed-window counting limiter
///
/// `check` is a single check-and-increment step: the first call for a
/// subject (or the first after its window elapsed) opens a window with a
/// count of 1; later calls increment and are allowed while the count stays
/// at or below `max_count`.
#[async_trait]
pub trait RateLimiter: Send + Sync + Debug {
    async fn check(
        &self,
        subject: &str,
        max_count: u32,
        window: Duration,
    ) -> Result<RateLimitDecision, DomainError>;
}

/// Subject used to throttle key creation per owner
pub fn key_creation_subject(owner_id: &OwnerId) -> String {
    format!("key-creation:{}", owner_id)
}

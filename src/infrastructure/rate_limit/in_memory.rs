//! In-process fixed-window rate limiter

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;

use crate::domain::clock::{Clock, SystemClock};
use crate::domain::rate_limit::{RateLimitDecision, RateLimiter};
use crate::domain::DomainError;

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    reset_at: DateTime<Utc>,
}

/// Fixed-window limiter keeping its counters in a single locked table
///
/// Counters are a cache: losing them on restart only restarts windows.
#[derive(Debug)]
pub struct InMemoryRateLimiter {
    windows: Mutex<HashMap<String, Window>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryRateLimiter {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Check and count one call in a single locked step
    ///
    /// A zero window, or one too large to add to the current time, is a
    /// configuration error and leaves the table untouched.
    pub fn check_now(
        &self,
        subject: &str,
        max_count: u32,
        window: Duration,
    ) -> Result<RateLimitDecision, DomainError> {
        if window.is_zero() {
            return Err(DomainError::configuration("Rate limit window must be positive"));
        }

        let window = chrono::Duration::from_std(window)
            .map_err(|e| DomainError::configuration(format!("Invalid rate limit window: {}", e)))?;
        let now = self.clock.now();
        let next_reset = now
            .checked_add_signed(window)
            .ok_or_else(|| DomainError::configuration("Rate limit window is out of range"))?;

        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());

        let entry = windows
            .entry(subject.to_string())
            .and_modify(|w| {
                if w.reset_at <= now {
                    *w = Window {
                        count: 0,
                        reset_at: next_reset,
                    };
                }
            })
            .or_insert(Window {
                count: 0,
                reset_at: next_reset,
            });

        entry.count = entry.count.saturating_add(1);

        if entry.count <= max_count {
            return Ok(RateLimitDecision::Allowed);
        }

        Ok(RateLimitDecision::Limited {
            retry_after_secs: retry_after_secs(entry.reset_at - now),
        })
    }

    /// Evict counters whose window has elapsed, returning how many were removed
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());

        let before = windows.len();
        windows.retain(|_, w| w.reset_at > now);
        before - windows.len()
    }

    /// Forget the counter of one subject
    pub fn reset(&self, subject: &str) {
        self.windows
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(subject);
    }

    pub fn clear(&self) {
        self.windows
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    /// Number of tracked subjects
    pub fn tracked(&self) -> usize {
        self.windows.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Spawn a background task sweeping the table every `interval`
    ///
    /// The task stops on its own once the limiter is dropped, and is aborted
    /// when the returned handle is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> SweeperHandle {
        let limiter: Weak<Self> = Arc::downgrade(self);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // First tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;

                let Some(limiter) = limiter.upgrade() else {
                    tracing::debug!("Rate limiter dropped, stopping sweeper");
                    break;
                };

                let evicted = limiter.sweep();
                if evicted > 0 {
                    tracing::debug!(evicted, "Swept elapsed rate limit windows");
                }
            }
        });

        SweeperHandle { handle }
    }
}

impl Default for InMemoryRateLimiter {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

#[async_trait]
impl RateLimiter for InMemoryRateLimiter {
    async fn check(
        &self,
        subject: &str,
        max_count: u32,
        window: Duration,
    ) -> Result<RateLimitDecision, DomainError> {
        self.check_now(subject, max_count, window)
    }
}

/// Owner of the background sweep task
#[derive(Debug)]
pub struct SweeperHandle {
    handle: JoinHandle<()>,
}

impl SweeperHandle {
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Whole seconds until the window resets, rounded up, never below 1
fn retry_after_secs(remaining: chrono::Duration) -> u64 {
    let millis = remaining.num_milliseconds().max(0) as u64;
    millis.div_ceil(1000).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::clock::ManualClock;

    const HOUR: Duration = Duration::from_secs(3600);

    fn limiter() -> (Arc<ManualClock>, InMemoryRateLimiter) {
        let clock = Arc::new(ManualClock::starting_now());
        let limiter = InMemoryRateLimiter::new(clock.clone());
        (clock, limiter)
    }

    #[tokio::test]
    async fn test_allows_up_to_max_then_denies() {
        let (_clock, limiter) = limiter();

        for _ in 0..5 {
            assert!(limiter.check("s", 5, HOUR).await.unwrap().is_allowed());
        }

        let denied = limiter.check("s", 5, HOUR).await.unwrap();
        assert_eq!(
            denied,
            RateLimitDecision::Limited {
                retry_after_secs: 3600
            }
        );
    }

    #[tokio::test]
    async fn test_new_window_after_elapsed() {
        let (clock, limiter) = limiter();

        for _ in 0..6 {
            limiter.check("s", 5, HOUR).await.unwrap();
        }
        assert!(!limiter.check("s", 5, HOUR).await.unwrap().is_allowed());

        clock.advance(chrono::Duration::seconds(3600));
        assert!(limiter.check("s", 5, HOUR).await.unwrap().is_allowed());
    }

    #[tokio::test]
    async fn test_retry_after_rounds_up() {
        let (clock, limiter) = limiter();

        limiter.check("s", 1, HOUR).await.unwrap();
        clock.advance(chrono::Duration::milliseconds(3_598_500));

        let denied = limiter.check("s", 1, HOUR).await.unwrap();
        assert_eq!(denied.retry_after_secs(), Some(2));
    }

    #[tokio::test]
    async fn test_subjects_are_independent() {
        let (_clock, limiter) = limiter();

        assert!(limiter.check("a", 1, HOUR).await.unwrap().is_allowed());
        assert!(!limiter.check("a", 1, HOUR).await.unwrap().is_allowed());
        assert!(limiter.check("b", 1, HOUR).await.unwrap().is_allowed());
    }

    #[tokio::test]
    async fn test_sweep_evicts_only_elapsed_windows() {
        let (clock, limiter) = limiter();

        limiter.check("old", 5, Duration::from_secs(60)).await.unwrap();
        limiter.check("young", 5, HOUR).await.unwrap();

        clock.advance(chrono::Duration::seconds(61));
        assert_eq!(limiter.sweep(), 1);
        assert_eq!(limiter.tracked(), 1);

        // An evicted subject starts a fresh window
        assert!(limiter.check("old", 1, Duration::from_secs(60)).await.unwrap().is_allowed());
    }

    #[tokio::test]
    async fn test_reset_and_clear() {
        let (_clock, limiter) = limiter();

        limiter.check("a", 1, HOUR).await.unwrap();
        limiter.check("b", 1, HOUR).await.unwrap();

        limiter.reset("a");
        assert!(limiter.check("a", 1, HOUR).await.unwrap().is_allowed());

        limiter.clear();
        assert_eq!(limiter.tracked(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_checks_never_exceed_max() {
        let limiter = Arc::new(InMemoryRateLimiter::default());
        let max = 5;
        let callers = 64;

        let tasks: Vec<_> = (0..callers)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move { limiter.check("shared", max, HOUR).await.unwrap() })
            })
            .collect();

        let mut allowed = 0;
        for task in tasks {
            if task.await.unwrap().is_allowed() {
                allowed += 1;
            }
        }

        assert_eq!(allowed, max as usize);
    }

    #[tokio::test]
    async fn test_sweeper_stops_when_limiter_dropped() {
        let limiter = Arc::new(InMemoryRateLimiter::default());
        let handle = limiter.spawn_sweeper(Duration::from_millis(10));

        drop(limiter);
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(handle.is_finished());
    }

    #[tokio::test]
    async fn test_rejects_zero_window() {
        let (_clock, limiter) = limiter();

        let result = limiter.check("s", 5, Duration::ZERO).await;

        assert!(matches!(result, Err(DomainError::Configuration { .. })));
        assert_eq!(limiter.tracked(), 0);
    }

    #[tokio::test]
    async fn test_out_of_range_window_is_an_error() {
        let (_clock, limiter) = limiter();
        let huge = Duration::from_secs(10_000_000_000_000);

        for _ in 0..3 {
            let result = limiter.check("s", 5, huge).await;
            assert!(matches!(result, Err(DomainError::Configuration { .. })));
        }

        // The table stays usable afterwards
        assert!(limiter.check("s", 5, HOUR).await.unwrap().is_allowed());
        assert_eq!(limiter.tracked(), 1);
    }

    #[test]
    fn test_retry_after_secs() {
        assert_eq!(retry_after_secs(chrono::Duration::milliseconds(1)), 1);
        assert_eq!(retry_after_secs(chrono::Duration::milliseconds(1000)), 1);
        assert_eq!(retry_after_secs(chrono::Duration::milliseconds(1001)), 2);
        assert_eq!(retry_after_secs(chrono::Duration::zero()), 1);
    }
}

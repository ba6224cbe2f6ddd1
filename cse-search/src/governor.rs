//! Sliding-window admission control for upstream calls.
//!
//! A single [`RateGovernor`] is shared by every search kind so that one
//! budget protects the one upstream quota. Only cache misses ask for
//! admission; cache hits never touch the governor.
//!
//! # Algorithm
//!
//! ```text
//! admit():  drop ledger timestamps older than (now - window)
//!           len < limit  → record now, return Permit
//!           len >= limit → RateLimited { retry_after = oldest + window - now }
//! ```
//!
//! Timestamps use [`tokio::time::Instant`] so tests can drive the window
//! with a paused clock.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::Instant;

use crate::config::SearchConfig;
use crate::error::{Result, SearchError};

/// Smallest retry hint handed out, so a waiting caller never spins.
const MIN_RETRY_AFTER: Duration = Duration::from_millis(1);

/// Proof that an upstream call was admitted.
#[derive(Debug, Clone, Copy)]
pub struct Permit {
    admitted_at: Instant,
}

impl Permit {
    /// When the admission was recorded.
    pub fn admitted_at(&self) -> Instant {
        self.admitted_at
    }
}

/// Process-wide sliding-window rate governor.
#[derive(Debug)]
pub struct RateGovernor {
    limit: usize,
    window: Duration,
    ledger: Mutex<VecDeque<Instant>>,
}

impl RateGovernor {
    /// Create a governor admitting `limit` calls per rolling `window`.
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit: limit as usize,
            window,
            ledger: Mutex::new(VecDeque::with_capacity(limit as usize)),
        }
    }

    /// Create a governor from the configured budget.
    pub fn from_config(config: &SearchConfig) -> Self {
        Self::new(config.rate_limit_requests, config.rate_limit_window())
    }

    /// Try to admit one upstream call right now.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::RateLimited`] with the time until the oldest
    /// admission leaves the window when the budget is exhausted.
    pub fn admit(&self) -> Result<Permit> {
        let now = Instant::now();
        let mut ledger = self.lock();
        self.trim(&mut ledger, now);

        if ledger.len() < self.limit {
            ledger.push_back(now);
            return Ok(Permit { admitted_at: now });
        }

        let retry_after = ledger
            .front()
            .and_then(|oldest| oldest.checked_add(self.window))
            .map(|frees_at| frees_at.saturating_duration_since(now))
            .unwrap_or(self.window)
            .max(MIN_RETRY_AFTER);
        tracing::warn!(
            limit = self.limit,
            retry_after_ms = retry_after.as_millis() as u64,
            "upstream admission rejected"
        );
        Err(SearchError::RateLimited { retry_after })
    }

    /// Admit one call, queueing for at most `max_wait` if the budget is
    /// currently exhausted.
    ///
    /// Nothing is recorded while waiting, so dropping this future (caller
    /// cancellation) never consumes a slot.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::RateLimited`] if no slot frees up within
    /// `max_wait`.
    pub async fn admit_within(&self, max_wait: Duration) -> Result<Permit> {
        // An unrepresentable deadline means the wait is effectively unbounded.
        let deadline = Instant::now().checked_add(max_wait);
        loop {
            match self.admit() {
                Ok(permit) => return Ok(permit),
                Err(SearchError::RateLimited { retry_after }) => {
                    let past_deadline = deadline.is_some_and(|deadline| {
                        Instant::now()
                            .checked_add(retry_after)
                            .is_none_or(|ready| ready > deadline)
                    });
                    if past_deadline {
                        return Err(SearchError::RateLimited { retry_after });
                    }
                    tracing::debug!(
                        wait_ms = retry_after.as_millis() as u64,
                        "queueing for upstream admission"
                    );
                    tokio::time::sleep(retry_after).await;
                }
                Err(other) => return Err(other),
            }
        }
    }

    /// Number of admissions inside the current window.
    pub fn recent_admissions(&self) -> usize {
        let mut ledger = self.lock();
        self.trim(&mut ledger, Instant::now());
        ledger.len()
    }

    /// Admissions still available in the current window.
    pub fn remaining(&self) -> usize {
        self.limit.saturating_sub(self.recent_admissions())
    }

    /// Configured admissions per window.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Configured window length.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Forget every recorded admission.
    pub fn reset(&self) {
        self.lock().clear();
    }

    fn trim(&self, ledger: &mut VecDeque<Instant>, now: Instant) {
        while let Some(front) = ledger.front() {
            if now.saturating_duration_since(*front) >= self.window {
                ledger.pop_front();
            } else {
                break;
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Instant>> {
        // The ledger is always left consistent, so a poisoned lock is safe to reuse.
        self.ledger
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn retry_after(err: SearchError) -> Duration {
        match err {
            SearchError::RateLimited { retry_after } => retry_after,
            other => panic!("expected rate limit, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn admits_up_to_limit_then_rejects() {
        let governor = RateGovernor::new(3, Duration::from_secs(60));
        for _ in 0..3 {
            assert!(governor.admit().is_ok());
        }
        let err = governor.admit().unwrap_err();
        assert_eq!(retry_after(err), Duration::from_secs(60));
        assert_eq!(governor.recent_admissions(), 3);
        assert_eq!(governor.remaining(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_after_tracks_oldest_admission() {
        let governor = RateGovernor::new(2, Duration::from_secs(60));
        governor.admit().expect("first");
        tokio::time::advance(Duration::from_secs(20)).await;
        governor.admit().expect("second");
        tokio::time::advance(Duration::from_secs(10)).await;

        let err = governor.admit().unwrap_err();
        assert_eq!(retry_after(err), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn window_slides() {
        let governor = RateGovernor::new(1, Duration::from_secs(60));
        governor.admit().expect("first");
        assert!(governor.admit().is_err());

        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(governor.admit().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn rejection_does_not_consume_a_slot() {
        let governor = RateGovernor::new(1, Duration::from_secs(10));
        governor.admit().expect("first");
        for _ in 0..5 {
            assert!(governor.admit().is_err());
        }
        assert_eq!(governor.recent_admissions(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn admit_within_waits_for_a_slot() {
        let governor = RateGovernor::new(1, Duration::from_secs(2));
        governor.admit().expect("first");

        let started = Instant::now();
        let permit = governor
            .admit_within(Duration::from_secs(5))
            .await
            .expect("slot frees after 2s");
        assert!(permit.admitted_at() - started >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn admit_within_rejects_when_wait_too_long() {
        let governor = RateGovernor::new(1, Duration::from_secs(60));
        governor.admit().expect("first");

        let err = governor
            .admit_within(Duration::from_secs(1))
            .await
            .unwrap_err();
        assert_eq!(retry_after(err), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_wait_behaves_like_admit() {
        let governor = RateGovernor::new(1, Duration::from_secs(60));
        governor.admit_within(Duration::ZERO).await.expect("first");
        assert!(governor.admit_within(Duration::ZERO).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_wait_does_not_consume_a_slot() {
        let governor = RateGovernor::new(1, Duration::from_secs(10));
        governor.admit().expect("first");

        let waited = tokio::time::timeout(
            Duration::from_secs(1),
            governor.admit_within(Duration::from_secs(30)),
        )
        .await;
        assert!(waited.is_err(), "wait should have been cut short");
        assert_eq!(governor.recent_admissions(), 1);

        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(governor.admit().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn reset_clears_ledger() {
        let governor = RateGovernor::new(1, Duration::from_secs(60));
        governor.admit().expect("first");
        governor.reset();
        assert_eq!(governor.recent_admissions(), 0);
        assert!(governor.admit().is_ok());
    }

    #[test]
    fn from_config_uses_budget() {
        let config = SearchConfig {
            rate_limit_requests: 7,
            rate_limit_window_seconds: 30,
            ..Default::default()
        };
        let governor = RateGovernor::from_config(&config);
        assert_eq!(governor.limit(), 7);
        assert_eq!(governor.window(), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn unrepresentable_window_rejects_without_overflow() {
        let governor = RateGovernor::new(1, Duration::MAX);
        governor.admit().expect("first");
        let err = governor.admit().unwrap_err();
        assert_eq!(retry_after(err), Duration::MAX);
    }

    #[tokio::test(start_paused = true)]
    async fn unbounded_wait_still_admits_when_slot_frees() {
        let governor = RateGovernor::new(1, Duration::from_secs(5));
        governor.admit().expect("first");
        let start = Instant::now();
        governor
            .admit_within(Duration::MAX)
            .await
            .expect("admitted after the window");
        assert!(start.elapsed() >= Duration::from_secs(5));
    }

    #[test]
    fn governor_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RateGovernor>();
    }
}

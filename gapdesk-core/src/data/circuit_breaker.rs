//! Circuit breaker for the primary feed.
//!
//! A broker API that keeps timing out or rejecting the token costs a full
//! request timeout on every analyzer. After `failure_threshold` consecutive
//! failures (or one 401/403) the breaker opens and the resolver skips the feed
//! until the cooldown expires.

use crate::config::BreakerConfig;
use log::warn;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Requests flow normally.
    Closed,
    /// All requests are refused until cooldown expires.
    Open { tripped_at: Instant },
}

#[derive(Debug)]
struct BreakerInner {
    state: BreakerState,
    consecutive_failures: u32,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    inner: Mutex<BreakerInner>,
    cooldown: Duration,
    failure_threshold: u32,
}

impl CircuitBreaker {
    pub fn new(cooldown: Duration, failure_threshold: u32) -> Self {
        Self {
            inner: Mutex::new(BreakerInner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
            }),
            cooldown,
            failure_threshold: failure_threshold.max(1),
        }
    }

    pub fn from_config(config: &BreakerConfig) -> Self {
        Self::new(
            Duration::from_secs(config.cooldown_secs),
            config.failure_threshold,
        )
    }

    /// Check if requests are currently allowed.
    pub fn is_allowed(&self) -> bool {
        self.is_allowed_at(Instant::now())
    }

    fn is_allowed_at(&self, now: Instant) -> bool {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            BreakerState::Closed => true,
            BreakerState::Open { tripped_at } => {
                if now.saturating_duration_since(tripped_at) >= self.cooldown {
                    inner.state = BreakerState::Closed;
                    inner.consecutive_failures = 0;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self) {
        self.inner.lock().unwrap().consecutive_failures = 0;
    }

    /// Record a failure, opening the breaker once the threshold is reached.
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.consecutive_failures += 1;
        if inner.consecutive_failures >= self.failure_threshold
            && inner.state == BreakerState::Closed
        {
            warn!(
                "circuit breaker open after {} consecutive failures",
                inner.consecutive_failures
            );
            inner.state = BreakerState::Open {
                tripped_at: Instant::now(),
            };
        }
    }

    /// Open the breaker immediately (rejected credentials).
    pub fn trip(&self) {
        warn!("circuit breaker tripped");
        self.inner.lock().unwrap().state = BreakerState::Open {
            tripped_at: Instant::now(),
        };
    }

    pub fn state(&self) -> BreakerState {
        self.inner.lock().unwrap().state
    }

    /// Remaining cooldown time (zero if closed).
    pub fn remaining_cooldown(&self) -> Duration {
        match self.state() {
            BreakerState::Closed => Duration::ZERO,
            BreakerState::Open { tripped_at } => self.cooldown.saturating_sub(tripped_at.elapsed()),
        }
    }
}

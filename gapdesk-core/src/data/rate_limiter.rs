//! Request throttle for the secondary feed.
//!
//! The free chart API bans aggressive clients, so every request is admitted
//! through a [`Throttle`]. [`RateLimiter`] enforces a per-symbol minimum
//! interval (scaled by a backoff multiplier that doubles on every 429), an
//! hourly request cap, and a small random jitter. Tests inject [`NoThrottle`].

use super::provider::DataError;
use crate::config::RateLimitConfig;
use log::{debug, warn};
use rand::Rng;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

const HOUR: Duration = Duration::from_secs(3600);

/// Admission control for outbound requests.
pub trait Throttle: Send + Sync {
    /// Block until a request for `symbol` may be sent. Fails fast with
    /// `RateLimited` when the hourly budget is exhausted.
    fn acquire(&self, symbol: &str) -> Result<(), DataError>;

    /// Record that a request for `symbol` was sent.
    fn record(&self, symbol: &str);

    /// The upstream answered "too many requests".
    fn on_rate_limited(&self);

    /// Delay before retry number `attempt` (0-based).
    fn retry_delay(&self, attempt: u32) -> Duration;
}

/// Throttle that admits everything immediately.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoThrottle;

impl Throttle for NoThrottle {
    fn acquire(&self, _symbol: &str) -> Result<(), DataError> {
        Ok(())
    }

    fn record(&self, _symbol: &str) {}

    fn on_rate_limited(&self) {}

    fn retry_delay(&self, _attempt: u32) -> Duration {
        Duration::ZERO
    }
}

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Admission {
    Ready,
    Wait(Duration),
    Exhausted { retry_after: Duration },
}

#[derive(Debug)]
struct LimiterState {
    last_request: HashMap<String, Instant>,
    window_start: Instant,
    request_count: u32,
    backoff: f64,
}

#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    retry_base_delay: Duration,
    state: Mutex<LimiterState>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig, retry_base_delay: Duration) -> Self {
        Self {
            config,
            retry_base_delay,
            state: Mutex::new(LimiterState {
                last_request: HashMap::new(),
                window_start: Instant::now(),
                request_count: 0,
                backoff: 1.0,
            }),
        }
    }

    pub fn backoff(&self) -> f64 {
        self.state.lock().unwrap().backoff
    }

    /// Admission decision for `symbol` at `now`. Rolls the hourly window (and
    /// resets backoff) once it has elapsed.
    pub fn check_at(&self, symbol: &str, now: Instant) -> Admission {
        let mut state = self.state.lock().unwrap();

        if now.saturating_duration_since(state.window_start) >= HOUR {
            state.window_start = now;
            state.request_count = 0;
            state.backoff = 1.0;
        }

        if state.request_count >= self.config.max_requests_per_hour {
            let elapsed = now.saturating_duration_since(state.window_start);
            return Admission::Exhausted {
                retry_after: HOUR.saturating_sub(elapsed),
            };
        }

        if let Some(&last) = state.last_request.get(symbol) {
            let required =
                Duration::from_secs_f64(self.config.min_interval_secs * state.backoff);
            let since = now.saturating_duration_since(last);
            if since < required {
                return Admission::Wait(required - since);
            }
        }

        Admission::Ready
    }

    pub fn record_at(&self, symbol: &str, now: Instant) {
        let mut state = self.state.lock().unwrap();
        state.last_request.insert(symbol.to_string(), now);
        state.request_count += 1;
    }

    fn jitter(&self) -> Duration {
        let (lo, hi) = (self.config.jitter_min_secs, self.config.jitter_max_secs);
        if hi <= lo {
            return Duration::from_secs_f64(lo.max(0.0));
        }
        Duration::from_secs_f64(rand::thread_rng().gen_range(lo..hi))
    }
}

impl Throttle for RateLimiter {
    fn acquire(&self, symbol: &str) -> Result<(), DataError> {
        loop {
            match self.check_at(symbol, Instant::now()) {
                Admission::Ready => break,
                Admission::Wait(delay) => {
                    debug!("throttling {symbol} for {:.1}s", delay.as_secs_f64());
                    std::thread::sleep(delay);
                }
                Admission::Exhausted { retry_after } => {
                    warn!("hourly request budget exhausted; {symbol} refused");
                    return Err(DataError::RateLimited {
                        retry_after_secs: retry_after.as_secs(),
                    });
                }
            }
        }
        std::thread::sleep(self.jitter());
        Ok(())
    }

    fn record(&self, symbol: &str) {
        self.record_at(symbol, Instant::now());
    }

    fn on_rate_limited(&self) {
        let mut state = self.state.lock().unwrap();
        state.backoff = (state.backoff * 2.0).min(self.config.max_backoff);
        warn!("rate limited upstream; backoff now {:.1}x", state.backoff);
    }

    fn retry_delay(&self, attempt: u32) -> Duration {
        let exp = 2u32.saturating_pow(attempt);
        self.retry_base_delay.saturating_mul(exp) + self.jitter()
    }
}

//! Market-data feed trait, request/payload types and structured error types.
//!
//! The `MarketFeed` trait abstracts over the live feeds (Tradier, Yahoo, an
//! in-memory fixture) so the resolver can iterate tiers and tests can mock them.

use crate::domain::{Bar, DataSource, OptionContract, Quote};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Structured error types for feed operations.
///
/// None of these reach the caller of the engine: the resolver turns every
/// variant into "advance to the next tier".
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("request timed out after {secs}s: {context}")]
    Timeout { context: String, secs: u64 },

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("HTTP {status} from {feed}")]
    HttpStatus { feed: String, status: u16 },

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("empty payload for {0}")]
    Empty(String),

    #[error("{feed} does not serve {request}")]
    Unsupported { feed: String, request: String },

    #[error("hard stop: feed has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("fixture error: {0}")]
    Fixture(String),
}

impl DataError {
    pub fn from_reqwest(err: reqwest::Error, context: &str, timeout: Duration) -> Self {
        if err.is_timeout() {
            DataError::Timeout {
                context: context.to_string(),
                secs: timeout.as_secs(),
            }
        } else if err.is_decode() {
            DataError::ResponseFormatChanged(format!("{context}: {err}"))
        } else {
            DataError::NetworkUnreachable(format!("{context}: {err}"))
        }
    }
}

/// Bar spacing for history requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BarInterval {
    OneMinute,
    FiveMinute,
    Daily,
}

impl BarInterval {
    pub fn is_intraday(self) -> bool {
        !matches!(self, BarInterval::Daily)
    }
}

impl fmt::Display for BarInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BarInterval::OneMinute => write!(f, "1m"),
            BarInterval::FiveMinute => write!(f, "5m"),
            BarInterval::Daily => write!(f, "1d"),
        }
    }
}

/// What a caller needs from a feed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeedRequest {
    Quotes {
        symbols: Vec<String>,
    },
    Bars {
        symbol: String,
        interval: BarInterval,
        /// Calendar days of history to cover, counting today.
        days: u32,
    },
    Chain {
        symbol: String,
        expiration: NaiveDate,
    },
}

/// Request discriminant, used for call accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Quotes,
    Bars,
    Chain,
}

impl FeedRequest {
    pub fn quote(symbol: &str) -> Self {
        FeedRequest::Quotes {
            symbols: vec![symbol.to_string()],
        }
    }

    pub fn quotes<S: AsRef<str>>(symbols: &[S]) -> Self {
        FeedRequest::Quotes {
            symbols: symbols.iter().map(|s| s.as_ref().to_string()).collect(),
        }
    }

    /// Today's intraday bars.
    pub fn intraday(symbol: &str, interval: BarInterval) -> Self {
        FeedRequest::Bars {
            symbol: symbol.to_string(),
            interval,
            days: 1,
        }
    }

    pub fn daily(symbol: &str, days: u32) -> Self {
        FeedRequest::Bars {
            symbol: symbol.to_string(),
            interval: BarInterval::Daily,
            days,
        }
    }

    pub fn chain(symbol: &str, expiration: NaiveDate) -> Self {
        FeedRequest::Chain {
            symbol: symbol.to_string(),
            expiration,
        }
    }

    pub fn kind(&self) -> RequestKind {
        match self {
            FeedRequest::Quotes { .. } => RequestKind::Quotes,
            FeedRequest::Bars { .. } => RequestKind::Bars,
            FeedRequest::Chain { .. } => RequestKind::Chain,
        }
    }

    /// Stable key for the response cache.
    pub fn cache_key(&self) -> String {
        match self {
            FeedRequest::Quotes { symbols } => format!("quotes:{}", symbols.join(",")),
            FeedRequest::Bars {
                symbol,
                interval,
                days,
            } => format!("bars:{symbol}:{interval}:{days}"),
            FeedRequest::Chain { symbol, expiration } => format!("chain:{symbol}:{expiration}"),
        }
    }
}

impl fmt::Display for FeedRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.cache_key())
    }
}

/// A feed's answer to a [`FeedRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FeedPayload {
    Quotes(Vec<Quote>),
    Bars(Vec<Bar>),
    Chain(Vec<OptionContract>),
}

impl FeedPayload {
    pub fn is_empty(&self) -> bool {
        match self {
            FeedPayload::Quotes(q) => q.is_empty(),
            FeedPayload::Bars(b) => b.is_empty(),
            FeedPayload::Chain(c) => c.is_empty(),
        }
    }

    pub fn into_quotes(self) -> Option<Vec<Quote>> {
        match self {
            FeedPayload::Quotes(q) => Some(q),
            _ => None,
        }
    }

    pub fn into_bars(self) -> Option<Vec<Bar>> {
        match self {
            FeedPayload::Bars(b) => Some(b),
            _ => None,
        }
    }

    pub fn into_chain(self) -> Option<Vec<OptionContract>> {
        match self {
            FeedPayload::Chain(c) => Some(c),
            _ => None,
        }
    }
}

/// Trait for live market-data feeds.
///
/// Implementations handle the specifics of a particular upstream. The cache and
/// the proxy tier sit above this trait; feeds don't know about either.
pub trait MarketFeed: Send + Sync {
    /// Human-readable name of this feed.
    fn name(&self) -> &str;

    /// Which resolver tier this feed occupies.
    fn tier(&self) -> DataSource;

    /// Fetch a payload, giving up after `timeout`.
    fn fetch(&self, request: &FeedRequest, timeout: Duration) -> Result<FeedPayload, DataError>;

    /// Check if the feed is currently available (not rate-limited, not blocked).
    fn is_available(&self) -> bool {
        true
    }
}

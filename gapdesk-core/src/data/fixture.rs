//! In-memory replay feed.
//!
//! Serves a captured [`MarketFixture`] as if it were a live feed. Used by the
//! CLI's `--fixture` offline mode and by tests, which can force it to fail and
//! inspect how often each request kind was made.

use super::provider::{BarInterval, DataError, FeedPayload, FeedRequest, MarketFeed, RequestKind};
use crate::domain::{Bar, DataSource, OptionContract, Quote};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// A captured market state, keyed by symbol.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketFixture {
    pub quotes: BTreeMap<String, Quote>,
    /// Today's intraday bars (served for any intraday interval).
    pub intraday: BTreeMap<String, Vec<Bar>>,
    pub daily: BTreeMap<String, Vec<Bar>>,
    pub chains: BTreeMap<String, Vec<OptionContract>>,
}

impl MarketFixture {
    pub fn from_file(path: &Path) -> Result<Self, DataError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| DataError::Fixture(format!("read {}: {e}", path.display())))?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, DataError> {
        serde_json::from_str(content).map_err(|e| DataError::Fixture(format!("parse: {e}")))
    }
}

pub struct FixtureFeed {
    name: String,
    tier: DataSource,
    fixture: MarketFixture,
    failing: AtomicBool,
    calls: Mutex<HashMap<RequestKind, usize>>,
}

impl FixtureFeed {
    pub fn new(name: &str, tier: DataSource, fixture: MarketFixture) -> Self {
        Self {
            name: name.to_string(),
            tier,
            fixture,
            failing: AtomicBool::new(false),
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// Make every subsequent fetch fail with a network error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of fetches made for a request kind.
    pub fn calls(&self, kind: RequestKind) -> usize {
        self.calls.lock().unwrap().get(&kind).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }
}

impl MarketFeed for FixtureFeed {
    fn name(&self) -> &str {
        &self.name
    }

    fn tier(&self) -> DataSource {
        self.tier
    }

    fn fetch(&self, request: &FeedRequest, _timeout: Duration) -> Result<FeedPayload, DataError> {
        *self.calls.lock().unwrap().entry(request.kind()).or_insert(0) += 1;

        if self.failing.load(Ordering::SeqCst) {
            return Err(DataError::NetworkUnreachable(format!(
                "{} is set to fail",
                self.name
            )));
        }

        let payload = match request {
            FeedRequest::Quotes { symbols } => FeedPayload::Quotes(
                symbols
                    .iter()
                    .filter_map(|s| self.fixture.quotes.get(s).cloned())
                    .collect(),
            ),
            FeedRequest::Bars {
                symbol, interval, ..
            } => {
                let source = if *interval == BarInterval::Daily {
                    &self.fixture.daily
                } else {
                    &self.fixture.intraday
                };
                FeedPayload::Bars(source.get(symbol).cloned().unwrap_or_default())
            }
            FeedRequest::Chain { symbol, .. } => {
                FeedPayload::Chain(self.fixture.chains.get(symbol).cloned().unwrap_or_default())
            }
        };
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"{
        "quotes": {
            "SPY": {"symbol": "SPY", "last": 531.2, "change_pct": 0.4, "volume": 100, "avg_volume": 80}
        },
        "daily": {
            "SPY": [
                {"timestamp": "2024-05-31T00:00:00", "open": 525.0, "high": 528.0, "low": 524.0, "close": 527.4, "volume": 1000},
                {"timestamp": "2024-06-03T00:00:00", "open": 529.0, "high": 532.0, "low": 528.5, "close": 531.2, "volume": 900}
            ]
        }
    }"#;

    #[test]
    fn parses_partial_fixture() {
        let f = MarketFixture::from_json(FIXTURE).unwrap();
        assert_eq!(f.quotes["SPY"].last, 531.2);
        assert_eq!(f.daily["SPY"].len(), 2);
        assert!(f.intraday.is_empty());
    }

    #[test]
    fn serves_and_counts_requests() {
        let feed = FixtureFeed::new(
            "fx",
            DataSource::Primary,
            MarketFixture::from_json(FIXTURE).unwrap(),
        );
        let t = Duration::from_secs(1);
        let q = feed.fetch(&FeedRequest::quotes(&["SPY", "QQQ"]), t).unwrap();
        assert_eq!(q.into_quotes().unwrap().len(), 1);
        let bars = feed.fetch(&FeedRequest::daily("SPY", 5), t).unwrap();
        assert_eq!(bars.into_bars().unwrap().len(), 2);
        let intraday = feed
            .fetch(&FeedRequest::intraday("SPY", BarInterval::OneMinute), t)
            .unwrap();
        assert!(intraday.is_empty());
        assert_eq!(feed.calls(RequestKind::Quotes), 1);
        assert_eq!(feed.calls(RequestKind::Bars), 2);
        assert_eq!(feed.total_calls(), 3);
    }

    #[test]
    fn failing_feed_errors_but_counts() {
        let feed = FixtureFeed::new("fx", DataSource::Fallback, MarketFixture::default());
        feed.set_failing(true);
        let err = feed
            .fetch(&FeedRequest::quote("SPY"), Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(err, DataError::NetworkUnreachable(_)));
        assert_eq!(feed.calls(RequestKind::Quotes), 1);
    }

    #[test]
    fn bad_json_is_fixture_error() {
        assert!(matches!(
            MarketFixture::from_json("{not json"),
            Err(DataError::Fixture(_))
        ));
    }
}

//! Secondary feed: Yahoo Finance v8 chart API.
//!
//! Serves intraday and daily OHLCV bars, and derives quotes from today's
//! one-minute bars. Every request is admitted through the injected
//! [`Throttle`]; HTTP 429 widens the throttle's backoff and is retried with
//! exponential delay. Option chains are not available here.

use super::provider::{BarInterval, DataError, FeedPayload, FeedRequest, MarketFeed};
use super::rate_limiter::Throttle;
use crate::domain::{Bar, DataSource, Quote};
use crate::window::MARKET_TZ;
use log::{debug, warn};
use reqwest::StatusCode;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// Yahoo Finance v8 chart API response.
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<u64>>,
}

/// Parse a chart response into exchange-local bars. Rows with any missing
/// price are skipped.
pub(crate) fn parse_chart(symbol: &str, body: &str) -> Result<Vec<Bar>, DataError> {
    let resp: ChartResponse = serde_json::from_str(body).map_err(|e| {
        DataError::ResponseFormatChanged(format!("yahoo chart for {symbol}: {e}"))
    })?;

    let result = resp.chart.result.ok_or_else(|| match resp.chart.error {
        Some(err) => {
            DataError::ResponseFormatChanged(format!("{}: {}", err.code, err.description))
        }
        None => DataError::ResponseFormatChanged("empty result with no error".into()),
    })?;

    let Some(data) = result.into_iter().next() else {
        return Err(DataError::Empty(format!("yahoo chart for {symbol}")));
    };
    let timestamps = data.timestamp.unwrap_or_default();
    let Some(quote) = data.indicators.quote.into_iter().next() else {
        return Err(DataError::ResponseFormatChanged("no quote data".into()));
    };

    let mut bars = Vec::with_capacity(timestamps.len());
    for (i, &ts) in timestamps.iter().enumerate() {
        let timestamp = chrono::DateTime::from_timestamp(ts, 0)
            .map(|dt| dt.with_timezone(&MARKET_TZ).naive_local())
            .ok_or_else(|| DataError::ResponseFormatChanged(format!("invalid timestamp: {ts}")))?;

        let field = |v: &Vec<Option<f64>>| v.get(i).copied().flatten();
        let (Some(open), Some(high), Some(low), Some(close)) = (
            field(&quote.open),
            field(&quote.high),
            field(&quote.low),
            field(&quote.close),
        ) else {
            continue;
        };

        bars.push(Bar {
            timestamp,
            open,
            high,
            low,
            close,
            volume: quote.volume.get(i).copied().flatten().unwrap_or(0),
        });
    }

    if bars.is_empty() {
        return Err(DataError::Empty(format!("yahoo chart for {symbol}")));
    }
    Ok(bars)
}

/// Summarise a session's bars as a quote: last close, change versus the first
/// open, last-bar volume against the mean bar volume.
pub(crate) fn quote_from_bars(symbol: &str, bars: &[Bar]) -> Option<Quote> {
    let first = bars.first()?;
    let last = bars.last()?;
    if first.open <= 0.0 {
        return None;
    }
    let change = last.close - first.open;
    let mean_volume = bars.iter().map(|b| b.volume).sum::<u64>() / bars.len() as u64;
    Some(Quote {
        symbol: symbol.to_string(),
        last: last.close,
        change,
        change_pct: change / first.open * 100.0,
        volume: last.volume,
        avg_volume: mean_volume,
        bid: None,
        ask: None,
    })
}

fn range_for(interval: BarInterval, days: u32) -> &'static str {
    match (interval, days) {
        (_, 0..=1) => "1d",
        (_, 2..=5) => "5d",
        (BarInterval::Daily, 6..=30) => "1mo",
        (BarInterval::Daily, _) => "3mo",
        _ => "5d",
    }
}

pub struct YahooFeed {
    client: reqwest::blocking::Client,
    base_url: String,
    throttle: Arc<dyn Throttle>,
    max_retries: u32,
}

impl YahooFeed {
    pub fn new(
        base_url: &str,
        throttle: Arc<dyn Throttle>,
        max_retries: u32,
    ) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| DataError::NetworkUnreachable(format!("build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            throttle,
            max_retries,
        })
    }

    fn chart_url(&self, symbol: &str, interval: BarInterval, days: u32) -> String {
        format!(
            "{}/v8/finance/chart/{symbol}?range={}&interval={interval}&includePrePost=false",
            self.base_url,
            range_for(interval, days)
        )
    }

    /// One chart request with throttling and 429 retry.
    fn fetch_chart(
        &self,
        symbol: &str,
        interval: BarInterval,
        days: u32,
        timeout: Duration,
    ) -> Result<Vec<Bar>, DataError> {
        let url = self.chart_url(symbol, interval, days);
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            self.throttle.acquire(symbol)?;
            let sent = self.client.get(&url).timeout(timeout).send();
            self.throttle.record(symbol);

            let resp = sent.map_err(|e| DataError::from_reqwest(e, symbol, timeout))?;
            let status = resp.status();

            if status == StatusCode::TOO_MANY_REQUESTS {
                self.throttle.on_rate_limited();
                let delay = self.throttle.retry_delay(attempt);
                warn!(
                    "yahoo rate limited on {symbol} (attempt {}), retrying in {:.1}s",
                    attempt + 1,
                    delay.as_secs_f64()
                );
                last_error = Some(DataError::RateLimited {
                    retry_after_secs: delay.as_secs(),
                });
                if attempt < self.max_retries {
                    std::thread::sleep(delay);
                }
                continue;
            }
            if !status.is_success() {
                return Err(DataError::HttpStatus {
                    feed: "yahoo".into(),
                    status: status.as_u16(),
                });
            }

            let body = resp
                .text()
                .map_err(|e| DataError::from_reqwest(e, symbol, timeout))?;
            return parse_chart(symbol, &body);
        }

        Err(last_error.unwrap_or_else(|| DataError::Empty(format!("yahoo chart for {symbol}"))))
    }
}

impl MarketFeed for YahooFeed {
    fn name(&self) -> &str {
        "yahoo"
    }

    fn tier(&self) -> DataSource {
        DataSource::Fallback
    }

    fn fetch(&self, request: &FeedRequest, timeout: Duration) -> Result<FeedPayload, DataError> {
        match request {
            FeedRequest::Quotes { symbols } => {
                let mut quotes = Vec::with_capacity(symbols.len());
                for symbol in symbols {
                    match self.fetch_chart(symbol, BarInterval::OneMinute, 1, timeout) {
                        Ok(bars) => quotes.extend(quote_from_bars(symbol, &bars)),
                        Err(e @ DataError::RateLimited { .. }) => return Err(e),
                        Err(e) => debug!("yahoo quote for {symbol} failed: {e}"),
                    }
                }
                if quotes.is_empty() {
                    return Err(DataError::Empty(request.to_string()));
                }
                Ok(FeedPayload::Quotes(quotes))
            }
            FeedRequest::Bars {
                symbol,
                interval,
                days,
            } => self
                .fetch_chart(symbol, *interval, *days, timeout)
                .map(FeedPayload::Bars),
            FeedRequest::Chain { .. } => Err(DataError::Unsupported {
                feed: "yahoo".into(),
                request: request.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::rate_limiter::NoThrottle;

    const CHART: &str = r#"{"chart":{"result":[{
        "timestamp":[1717421400,1717421460,1717421520],
        "indicators":{"quote":[{
            "open":[530.0,530.2,null],
            "high":[530.4,530.6,null],
            "low":[529.9,530.1,null],
            "close":[530.2,530.5,null],
            "volume":[300,100,null]
        }]}
    }],"error":null}}"#;

    #[test]
    fn parses_chart_into_local_bars() {
        let bars = parse_chart("SPY", CHART).unwrap();
        assert_eq!(bars.len(), 2);
        // 1717421400 = 2024-06-03 13:30 UTC = 09:30 New York
        assert_eq!(bars[0].timestamp.to_string(), "2024-06-03 09:30:00");
        assert_eq!(bars[1].volume, 100);
    }

    #[test]
    fn chart_error_is_reported() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found"}}}"#;
        let err = parse_chart("NOPE", body).unwrap_err();
        assert!(err.to_string().contains("Not Found"));
    }

    #[test]
    fn all_null_rows_are_empty() {
        let body = r#"{"chart":{"result":[{"timestamp":[1717421400],
            "indicators":{"quote":[{"open":[null],"high":[null],"low":[null],"close":[null],"volume":[null]}]}}],
            "error":null}}"#;
        assert!(matches!(parse_chart("SPY", body), Err(DataError::Empty(_))));
    }

    #[test]
    fn quote_derived_from_session_bars() {
        let bars = parse_chart("SPY", CHART).unwrap();
        let q = quote_from_bars("SPY", &bars).unwrap();
        assert_eq!(q.last, 530.5);
        assert!((q.change_pct - 0.5 / 530.0 * 100.0).abs() < 1e-12);
        assert_eq!(q.volume, 100);
        assert_eq!(q.avg_volume, 200);
    }

    #[test]
    fn ranges_cover_requested_days() {
        assert_eq!(range_for(BarInterval::OneMinute, 1), "1d");
        assert_eq!(range_for(BarInterval::Daily, 5), "5d");
        assert_eq!(range_for(BarInterval::Daily, 20), "1mo");
        assert_eq!(range_for(BarInterval::Daily, 60), "3mo");
    }

    #[test]
    fn chains_are_unsupported() {
        let feed = YahooFeed::new("http://127.0.0.1:9", Arc::new(NoThrottle), 0).unwrap();
        let today = chrono::NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
        let err = feed
            .fetch(&FeedRequest::chain("SPY", today), Duration::from_millis(10))
            .unwrap_err();
        assert!(matches!(err, DataError::Unsupported { .. }));
        assert_eq!(feed.tier(), DataSource::Fallback);
    }
}

//! Primary feed: Tradier brokerage market-data REST API.
//!
//! Bearer-token JSON endpoints for quotes, intraday time & sales, daily
//! history and option chains (with greeks). Tradier collapses single-element
//! arrays into bare objects and empty results into `null`, so every list is
//! parsed through [`OneOrMany`]. Failures feed the circuit breaker; a rejected
//! token trips it outright.

use super::circuit_breaker::CircuitBreaker;
use super::provider::{BarInterval, DataError, FeedPayload, FeedRequest, MarketFeed};
use crate::domain::{Bar, DataSource, Greeks, OptionContract, OptionType, Quote};
use crate::window::market_now;
use chrono::{Duration as ChronoDuration, NaiveDate, NaiveDateTime, NaiveTime};
use reqwest::StatusCode;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(t) => vec![t],
            OneOrMany::Many(v) => v,
        }
    }
}

fn list<T>(v: Option<OneOrMany<T>>) -> Vec<T> {
    v.map(OneOrMany::into_vec).unwrap_or_default()
}

#[derive(Debug, Deserialize)]
struct QuotesResponse {
    quotes: Option<QuotesBody>,
}

#[derive(Debug, Deserialize)]
struct QuotesBody {
    quote: Option<OneOrMany<TradierQuote>>,
}

#[derive(Debug, Deserialize)]
struct TradierQuote {
    symbol: String,
    last: Option<f64>,
    change: Option<f64>,
    change_percentage: Option<f64>,
    volume: Option<u64>,
    average_volume: Option<u64>,
    bid: Option<f64>,
    ask: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct HistoryResponse {
    history: Option<HistoryBody>,
}

#[derive(Debug, Deserialize)]
struct HistoryBody {
    day: Option<OneOrMany<HistoryDay>>,
}

#[derive(Debug, Deserialize)]
struct HistoryDay {
    date: NaiveDate,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: u64,
}

#[derive(Debug, Deserialize)]
struct TimesalesResponse {
    series: Option<SeriesBody>,
}

#[derive(Debug, Deserialize)]
struct SeriesBody {
    data: Option<OneOrMany<SeriesPoint>>,
}

#[derive(Debug, Deserialize)]
struct SeriesPoint {
    time: NaiveDateTime,
    price: Option<f64>,
    open: Option<f64>,
    high: Option<f64>,
    low: Option<f64>,
    close: Option<f64>,
    volume: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ChainResponse {
    options: Option<ChainBody>,
}

#[derive(Debug, Deserialize)]
struct ChainBody {
    option: Option<OneOrMany<TradierOption>>,
}

#[derive(Debug, Deserialize)]
struct TradierOption {
    symbol: String,
    strike: f64,
    option_type: String,
    expiration_date: NaiveDate,
    bid: Option<f64>,
    ask: Option<f64>,
    last: Option<f64>,
    greeks: Option<TradierGreeks>,
}

#[derive(Debug, Deserialize)]
struct TradierGreeks {
    delta: Option<f64>,
    gamma: Option<f64>,
    theta: Option<f64>,
    vega: Option<f64>,
    mid_iv: Option<f64>,
}

fn malformed(what: &str, e: serde_json::Error) -> DataError {
    DataError::ResponseFormatChanged(format!("tradier {what}: {e}"))
}

pub(crate) fn parse_quotes(body: &str) -> Result<Vec<Quote>, DataError> {
    let resp: QuotesResponse = serde_json::from_str(body).map_err(|e| malformed("quotes", e))?;
    let quotes = resp
        .quotes
        .map(|q| list(q.quote))
        .unwrap_or_default()
        .into_iter()
        .filter_map(|q| {
            let last = q.last?;
            Some(Quote {
                symbol: q.symbol,
                last,
                change: q.change.unwrap_or(0.0),
                change_pct: q.change_percentage.unwrap_or(0.0),
                volume: q.volume.unwrap_or(0),
                avg_volume: q.average_volume.unwrap_or(0),
                bid: q.bid,
                ask: q.ask,
            })
        })
        .collect();
    Ok(quotes)
}

pub(crate) fn parse_history(body: &str) -> Result<Vec<Bar>, DataError> {
    let resp: HistoryResponse = serde_json::from_str(body).map_err(|e| malformed("history", e))?;
    Ok(resp
        .history
        .map(|h| list(h.day))
        .unwrap_or_default()
        .into_iter()
        .map(|d| Bar {
            timestamp: d.date.and_time(NaiveTime::MIN),
            open: d.open,
            high: d.high,
            low: d.low,
            close: d.close,
            volume: d.volume,
        })
        .collect())
}

pub(crate) fn parse_timesales(body: &str) -> Result<Vec<Bar>, DataError> {
    let resp: TimesalesResponse =
        serde_json::from_str(body).map_err(|e| malformed("timesales", e))?;
    Ok(resp
        .series
        .map(|s| list(s.data))
        .unwrap_or_default()
        .into_iter()
        .filter_map(|p| {
            let close = p.close.or(p.price)?;
            Some(Bar {
                timestamp: p.time,
                open: p.open.unwrap_or(close),
                high: p.high.unwrap_or(close),
                low: p.low.unwrap_or(close),
                close,
                volume: p.volume.unwrap_or(0),
            })
        })
        .collect())
}

pub(crate) fn parse_chain(body: &str) -> Result<Vec<OptionContract>, DataError> {
    let resp: ChainResponse = serde_json::from_str(body).map_err(|e| malformed("chain", e))?;
    Ok(resp
        .options
        .map(|o| list(o.option))
        .unwrap_or_default()
        .into_iter()
        .filter_map(|o| {
            let option_type = match o.option_type.as_str() {
                "call" => OptionType::Call,
                "put" => OptionType::Put,
                _ => return None,
            };
            Some(OptionContract {
                symbol: o.symbol,
                strike: o.strike,
                option_type,
                expiration: o.expiration_date,
                bid: o.bid.unwrap_or(0.0),
                ask: o.ask.unwrap_or(0.0),
                last: o.last,
                greeks: o.greeks.map(|g| Greeks {
                    delta: g.delta.unwrap_or(0.0),
                    gamma: g.gamma.unwrap_or(0.0),
                    theta: g.theta.unwrap_or(0.0),
                    vega: g.vega.unwrap_or(0.0),
                    mid_iv: g.mid_iv.unwrap_or(0.0),
                }),
            })
        })
        .collect())
}

pub struct TradierFeed {
    client: reqwest::blocking::Client,
    base_url: String,
    token: String,
    circuit_breaker: Arc<CircuitBreaker>,
}

impl TradierFeed {
    pub fn new(
        base_url: &str,
        token: &str,
        circuit_breaker: Arc<CircuitBreaker>,
    ) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .build()
            .map_err(|e| DataError::NetworkUnreachable(format!("build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            circuit_breaker,
        })
    }

    /// GET a JSON endpoint, mapping transport and status failures.
    fn get(
        &self,
        path: &str,
        params: &[(&str, String)],
        timeout: Duration,
    ) -> Result<String, DataError> {
        if !self.circuit_breaker.is_allowed() {
            return Err(DataError::CircuitBreakerTripped);
        }

        let url = format!("{}{path}", self.base_url);
        let resp = self
            .client
            .get(&url)
            .query(params)
            .bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, "application/json")
            .timeout(timeout)
            .send()
            .map_err(|e| {
                self.circuit_breaker.record_failure();
                DataError::from_reqwest(e, path, timeout)
            })?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            self.circuit_breaker.trip();
            return Err(DataError::AuthenticationRequired(format!(
                "tradier rejected the token ({status})"
            )));
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            self.circuit_breaker.record_failure();
            let retry_after = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(DataError::RateLimited {
                retry_after_secs: retry_after,
            });
        }
        if !status.is_success() {
            self.circuit_breaker.record_failure();
            return Err(DataError::HttpStatus {
                feed: "tradier".into(),
                status: status.as_u16(),
            });
        }

        resp.text().map_err(|e| {
            self.circuit_breaker.record_failure();
            DataError::from_reqwest(e, path, timeout)
        })
    }

    fn fetch_payload(
        &self,
        request: &FeedRequest,
        timeout: Duration,
    ) -> Result<FeedPayload, DataError> {
        match request {
            FeedRequest::Quotes { symbols } => {
                let body = self.get(
                    "/markets/quotes",
                    &[("symbols", symbols.join(","))],
                    timeout,
                )?;
                parse_quotes(&body).map(FeedPayload::Quotes)
            }
            FeedRequest::Bars {
                symbol,
                interval,
                days,
            } => {
                let today = market_now().date_naive();
                if interval.is_intraday() {
                    let step = if *interval == BarInterval::OneMinute { "1min" } else { "5min" };
                    let start = today - ChronoDuration::days(i64::from(days.saturating_sub(1)));
                    let body = self.get(
                        "/markets/timesales",
                        &[
                            ("symbol", symbol.clone()),
                            ("interval", step.to_string()),
                            ("start", format!("{start} 09:30")),
                            ("end", format!("{today} 16:00")),
                            ("session_filter", "open".to_string()),
                        ],
                        timeout,
                    )?;
                    parse_timesales(&body).map(FeedPayload::Bars)
                } else {
                    let start = today - ChronoDuration::days(i64::from(*days));
                    let body = self.get(
                        "/markets/history",
                        &[
                            ("symbol", symbol.clone()),
                            ("interval", "daily".to_string()),
                            ("start", start.to_string()),
                            ("end", today.to_string()),
                        ],
                        timeout,
                    )?;
                    parse_history(&body).map(FeedPayload::Bars)
                }
            }
            FeedRequest::Chain { symbol, expiration } => {
                let body = self.get(
                    "/markets/options/chains",
                    &[
                        ("symbol", symbol.clone()),
                        ("expiration", expiration.to_string()),
                        ("greeks", "true".to_string()),
                    ],
                    timeout,
                )?;
                parse_chain(&body).map(FeedPayload::Chain)
            }
        }
    }
}

impl MarketFeed for TradierFeed {
    fn name(&self) -> &str {
        "tradier"
    }

    fn tier(&self) -> DataSource {
        DataSource::Primary
    }

    fn fetch(&self, request: &FeedRequest, timeout: Duration) -> Result<FeedPayload, DataError> {
        match self.fetch_payload(request, timeout) {
            Ok(payload) if payload.is_empty() => {
                self.circuit_breaker.record_success();
                Err(DataError::Empty(request.to_string()))
            }
            Ok(payload) => {
                self.circuit_breaker.record_success();
                Ok(payload)
            }
            Err(e @ DataError::ResponseFormatChanged(_)) => {
                self.circuit_breaker.record_failure();
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    fn is_available(&self) -> bool {
        self.circuit_breaker.is_allowed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_quote_object() {
        let body = r#"{"quotes":{"quote":{"symbol":"SPY","last":531.2,"change":2.1,
            "change_percentage":0.4,"volume":1200000,"average_volume":60000000,
            "bid":531.19,"ask":531.21}}}"#;
        let quotes = parse_quotes(body).unwrap();
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].change_pct, 0.4);
        assert_eq!(quotes[0].ask, Some(531.21));
    }

    #[test]
    fn parses_quote_array_and_drops_unpriced() {
        let body = r#"{"quotes":{"quote":[
            {"symbol":"$TICK","last":412.0},
            {"symbol":"$TRIN","last":null},
            {"symbol":"$NYAD","last":-850.0}
        ]}}"#;
        let quotes = parse_quotes(body).unwrap();
        let symbols: Vec<_> = quotes.iter().map(|q| q.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["$TICK", "$NYAD"]);
    }

    #[test]
    fn null_quotes_body_is_empty() {
        assert!(parse_quotes(r#"{"quotes":null}"#).unwrap().is_empty());
    }

    #[test]
    fn malformed_body_is_format_error() {
        assert!(matches!(
            parse_quotes("<html>maintenance</html>"),
            Err(DataError::ResponseFormatChanged(_))
        ));
    }

    #[test]
    fn parses_daily_history() {
        let body = r#"{"history":{"day":[
            {"date":"2024-05-31","open":525.0,"high":528.0,"low":524.0,"close":527.4,"volume":1000},
            {"date":"2024-06-03","open":529.0,"high":532.0,"low":528.5,"close":531.2,"volume":900}
        ]}}"#;
        let bars = parse_history(body).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[1].open, 529.0);
        assert_eq!(bars[0].timestamp.time(), NaiveTime::MIN);
    }

    #[test]
    fn parses_single_day_history() {
        let body = r#"{"history":{"day":{"date":"2024-06-03","open":1.0,"high":2.0,"low":0.5,"close":1.5,"volume":3}}}"#;
        assert_eq!(parse_history(body).unwrap().len(), 1);
        assert!(parse_history(r#"{"history":null}"#).unwrap().is_empty());
    }

    #[test]
    fn parses_timesales_series() {
        let body = r#"{"series":{"data":[
            {"time":"2024-06-03T09:30:00","timestamp":1717421400,"price":530.1,
             "open":530.0,"high":530.4,"low":529.9,"close":530.2,"volume":250000,"vwap":530.1},
            {"time":"2024-06-03T09:31:00","timestamp":1717421460,"price":530.3,"volume":120000}
        ]}}"#;
        let bars = parse_timesales(body).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].close, 530.2);
        assert_eq!(bars[1].open, 530.3);
    }

    #[test]
    fn parses_chain_with_greeks() {
        let body = r#"{"options":{"option":[
            {"symbol":"SPY240603C00530000","strike":530.0,"option_type":"call",
             "expiration_date":"2024-06-03","bid":1.10,"ask":1.20,"last":1.15,
             "greeks":{"delta":0.55,"gamma":0.1,"theta":-0.9,"vega":0.05,"mid_iv":0.12}},
            {"symbol":"SPY240603P00530000","strike":530.0,"option_type":"put",
             "expiration_date":"2024-06-03","bid":null,"ask":0.95,"last":null,"greeks":null}
        ]}}"#;
        let chain = parse_chain(body).unwrap();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[0].option_type, OptionType::Call);
        assert_eq!(chain[0].greeks.as_ref().unwrap().delta, 0.55);
        assert_eq!(chain[1].bid, 0.0);
        assert!(chain[1].greeks.is_none());
    }

    #[test]
    fn open_breaker_refuses_without_network() {
        let breaker = Arc::new(CircuitBreaker::new(Duration::from_secs(60), 3));
        breaker.trip();
        let feed = TradierFeed::new("http://127.0.0.1:9", "t", breaker).unwrap();
        assert!(!feed.is_available());
        let err = feed
            .fetch(&FeedRequest::quote("SPY"), Duration::from_millis(50))
            .unwrap_err();
        assert!(matches!(err, DataError::CircuitBreakerTripped));
    }
}

//! Static proxy tier.
//!
//! Deterministic estimates served when neither live feed answers. Always
//! succeeds, and everything it returns is tagged `Proxy` by the resolver.

use super::provider::{FeedPayload, FeedRequest};
use super::universe::SectorUniverse;
use crate::config::FallbackConstants;
use crate::domain::Quote;
use crate::window::MarketTime;
use chrono::Timelike;

/// Volume used to express a sector's canned volume ratio.
const PROXY_AVG_VOLUME: u64 = 1_000_000;

#[derive(Debug, Clone)]
pub struct ProxyFeed {
    underlying: String,
    constants: FallbackConstants,
    sectors: SectorUniverse,
}

impl ProxyFeed {
    pub fn new(underlying: &str, constants: FallbackConstants, sectors: SectorUniverse) -> Self {
        Self {
            underlying: underlying.to_string(),
            constants,
            sectors,
        }
    }

    fn market_hours(now: &MarketTime) -> bool {
        (9..16).contains(&now.hour())
    }

    /// Nominal underlying price, drifting slightly through the session.
    pub fn underlying_price(&self, now: &MarketTime) -> f64 {
        if Self::market_hours(now) {
            self.constants.proxy_price
                + (now.hour() as f64 - 12.0) * self.constants.proxy_price_drift
        } else {
            self.constants.proxy_price
        }
    }

    pub fn underlying_quote(&self, now: &MarketTime) -> Quote {
        let volume = if Self::market_hours(now) {
            self.constants.proxy_volume
        } else {
            self.constants.proxy_volume_closed
        };
        let last = self.underlying_price(now);
        let change_pct = self.constants.proxy_benchmark_change_pct;
        Quote {
            symbol: self.underlying.clone(),
            last,
            change: last * change_pct / 100.0,
            change_pct,
            volume,
            avg_volume: volume / 10 * 9,
            bid: None,
            ask: None,
        }
    }

    pub fn quote(&self, symbol: &str, now: &MarketTime) -> Quote {
        if symbol == self.underlying {
            return self.underlying_quote(now);
        }
        match self.sectors.get(symbol) {
            Some(sector) => Quote {
                symbol: symbol.to_string(),
                last: self.constants.nominal_price,
                change: self.constants.nominal_price * sector.proxy_change_pct / 100.0,
                change_pct: sector.proxy_change_pct,
                volume: (PROXY_AVG_VOLUME as f64 * sector.proxy_volume_ratio) as u64,
                avg_volume: PROXY_AVG_VOLUME,
                bid: None,
                ask: None,
            },
            None => Quote {
                symbol: symbol.to_string(),
                last: self.constants.nominal_price,
                change: 0.0,
                change_pct: 0.0,
                volume: 0,
                avg_volume: 0,
                bid: None,
                ask: None,
            },
        }
    }

    /// Proxy answer to any request. Bars and chains have no meaningful
    /// estimate and come back empty.
    pub fn payload(&self, request: &FeedRequest, now: &MarketTime) -> FeedPayload {
        match request {
            FeedRequest::Quotes { symbols } => {
                FeedPayload::Quotes(symbols.iter().map(|s| self.quote(s, now)).collect())
            }
            FeedRequest::Bars { .. } => FeedPayload::Bars(Vec::new()),
            FeedRequest::Chain { .. } => FeedPayload::Chain(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::at;

    fn proxy() -> ProxyFeed {
        ProxyFeed::new("SPY", FallbackConstants::default(), SectorUniverse::default_spdr())
    }

    #[test]
    fn price_drifts_during_session() {
        let p = proxy();
        assert!((p.underlying_price(&at(2024, 6, 3, 14, 10)) - 640.47).abs() < 1e-9);
        assert!((p.underlying_price(&at(2024, 6, 3, 9, 40)) - 639.97).abs() < 1e-9);
        assert_eq!(p.underlying_price(&at(2024, 6, 3, 18, 0)), 640.27);
    }

    #[test]
    fn closed_market_uses_lower_volume() {
        let p = proxy();
        assert_eq!(p.underlying_quote(&at(2024, 6, 3, 10, 0)).volume, 50_000_000);
        let q = p.underlying_quote(&at(2024, 6, 3, 20, 0));
        assert_eq!(q.volume, 45_000_000);
        assert_eq!(q.avg_volume, 40_500_000);
    }

    #[test]
    fn sector_quotes_carry_canned_rotation() {
        let q = proxy().quote("XLRE", &at(2024, 6, 3, 10, 0));
        assert_eq!(q.change_pct, -1.71);
        assert!((q.volume_ratio(1.0) - 1.3).abs() < 1e-9);
    }

    #[test]
    fn unknown_symbol_gets_nominal_price() {
        let q = proxy().quote("ZZZ", &at(2024, 6, 3, 10, 0));
        assert_eq!(q.last, 100.0);
        assert_eq!(q.change_pct, 0.0);
    }

    #[test]
    fn bars_and_chains_are_empty() {
        let p = proxy();
        let now = at(2024, 6, 3, 10, 0);
        assert!(p.payload(&FeedRequest::daily("SPY", 5), &now).is_empty());
        let chain = FeedRequest::chain("SPY", now.date_naive());
        assert!(p.payload(&chain, &now).is_empty());
    }
}

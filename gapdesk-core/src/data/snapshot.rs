//! Current-state view of the underlying: price, volume, intraday history and VWAP.

use super::provider::{BarInterval, FeedRequest};
use super::resolver::DataResolver;
use crate::domain::{Bar, DataSource, Quote};
use crate::indicators::{distance_pct, vwap_close, vwap_typical};
use crate::window::MarketTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VwapBasis {
    Close,
    TypicalPrice,
    /// No usable intraday volume; VWAP is pinned to the price.
    Proxy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VwapReading {
    pub vwap: f64,
    pub distance_pct: f64,
    pub basis: VwapBasis,
    pub source: DataSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub symbol: String,
    pub price: f64,
    pub volume: u64,
    pub avg_volume: u64,
    pub change_pct: f64,
    /// Today's one-minute bars, chronological. Empty on the proxy tier.
    pub history: Vec<Bar>,
    pub vwap: VwapReading,
    pub quote_source: DataSource,
    /// Worst tier among the quote and VWAP parts.
    pub source: DataSource,
}

impl MarketSnapshot {
    /// Resolve a fresh snapshot. Never fails: missing parts come from the proxy tier.
    pub fn resolve(resolver: &DataResolver, symbol: &str, now: &MarketTime) -> Self {
        let quote = resolver.resolve_with(
            &FeedRequest::quote(symbol),
            |payload, _| {
                payload
                    .into_quotes()?
                    .into_iter()
                    .find(|q| q.symbol == symbol && q.is_usable())
            },
            |proxy| proxy.quote(symbol, now),
        );

        let intraday = resolver.resolve_with(
            &FeedRequest::intraday(symbol, BarInterval::OneMinute),
            |payload, tier| {
                let mut bars = payload.into_bars()?;
                bars.retain(Bar::is_sane);
                let (vwap, basis) = match tier {
                    DataSource::Primary => (vwap_close(&bars)?, VwapBasis::Close),
                    _ => (vwap_typical(&bars)?, VwapBasis::TypicalPrice),
                };
                Some((bars, vwap, basis))
            },
            |_| (Vec::new(), f64::NAN, VwapBasis::Proxy),
        );

        Self::assemble(quote.value, quote.source, intraday.value, intraday.source)
    }

    fn assemble(
        quote: Quote,
        quote_source: DataSource,
        (history, vwap, basis): (Vec<Bar>, f64, VwapBasis),
        vwap_source: DataSource,
    ) -> Self {
        // A proxy price next to a live VWAP would invent a distance; use the
        // last live close instead.
        let (price, quote_source) = match (quote_source, history.last()) {
            (DataSource::Proxy, Some(last)) => (last.close, vwap_source),
            _ => (quote.last, quote_source),
        };

        let vwap = if basis == VwapBasis::Proxy {
            VwapReading {
                vwap: price,
                distance_pct: 0.0,
                basis,
                source: DataSource::Proxy,
            }
        } else {
            VwapReading {
                vwap,
                distance_pct: distance_pct(price, vwap),
                basis,
                source: vwap_source,
            }
        };

        Self {
            symbol: quote.symbol,
            price,
            volume: quote.volume,
            avg_volume: quote.avg_volume,
            change_pct: quote.change_pct,
            history,
            source: quote_source.worst(vwap.source),
            vwap,
            quote_source,
        }
    }

    /// Current volume over average volume, `default` when the average is unknown.
    pub fn volume_ratio(&self, default: f64) -> f64 {
        if self.avg_volume > 0 {
            self.volume as f64 / self.avg_volume as f64
        } else {
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FallbackConstants;
    use crate::data::fixture::{FixtureFeed, MarketFixture};
    use crate::data::proxy::ProxyFeed;
    use crate::data::universe::SectorUniverse;
    use crate::indicators::make_bars_with_volume;
    use crate::window::at;
    use std::sync::Arc;
    use std::time::Duration;

    fn resolver() -> DataResolver {
        DataResolver::new(
            ProxyFeed::new("SPY", FallbackConstants::default(), SectorUniverse::default_spdr()),
            Duration::from_secs(30),
            Duration::from_secs(1),
        )
    }

    fn spy_quote(last: f64) -> Quote {
        Quote {
            symbol: "SPY".into(),
            last,
            change: 0.0,
            change_pct: 0.3,
            volume: 2_000,
            avg_volume: 1_000,
            bid: None,
            ask: None,
        }
    }

    #[test]
    fn proxy_snapshot_pins_vwap_to_price() {
        let snap = MarketSnapshot::resolve(&resolver(), "SPY", &at(2024, 6, 3, 20, 0));
        assert_eq!(snap.source, DataSource::Proxy);
        assert_eq!(snap.price, 640.27);
        assert_eq!(snap.vwap.vwap, 640.27);
        assert_eq!(snap.vwap.distance_pct, 0.0);
        assert!(snap.history.is_empty());
    }

    #[test]
    fn primary_snapshot_uses_close_vwap() {
        let mut fixture = MarketFixture::default();
        fixture.quotes.insert("SPY".into(), spy_quote(101.0));
        fixture.intraday.insert(
            "SPY".into(),
            make_bars_with_volume(&[(100.0, 1), (100.0, 1)]),
        );
        let feed = Arc::new(FixtureFeed::new("fx", DataSource::Primary, fixture));
        let snap =
            MarketSnapshot::resolve(&resolver().with_primary(feed), "SPY", &at(2024, 6, 3, 10, 0));
        assert_eq!(snap.source, DataSource::Primary);
        assert_eq!(snap.vwap.basis, VwapBasis::Close);
        assert!((snap.vwap.distance_pct - 1.0).abs() < 1e-9);
        assert_eq!(snap.volume_ratio(1.0), 2.0);
    }

    #[test]
    fn zero_volume_falls_through_to_next_tier() {
        let mut primary = MarketFixture::default();
        primary.quotes.insert("SPY".into(), spy_quote(101.0));
        primary
            .intraday
            .insert("SPY".into(), make_bars_with_volume(&[(100.0, 0)]));
        let mut secondary = MarketFixture::default();
        secondary
            .intraday
            .insert("SPY".into(), make_bars_with_volume(&[(100.0, 5)]));
        let r = resolver()
            .with_primary(Arc::new(FixtureFeed::new("p", DataSource::Primary, primary)))
            .with_secondary(Arc::new(FixtureFeed::new("s", DataSource::Fallback, secondary)));
        let snap = MarketSnapshot::resolve(&r, "SPY", &at(2024, 6, 3, 10, 0));
        assert_eq!(snap.vwap.basis, VwapBasis::TypicalPrice);
        assert_eq!(snap.vwap.source, DataSource::Fallback);
        assert_eq!(snap.quote_source, DataSource::Primary);
        assert_eq!(snap.source, DataSource::Fallback);
    }

    #[test]
    fn proxy_quote_with_live_bars_uses_last_close() {
        let mut fixture = MarketFixture::default();
        fixture
            .intraday
            .insert("SPY".into(), make_bars_with_volume(&[(530.0, 5), (531.0, 5)]));
        let feed = Arc::new(FixtureFeed::new("fx", DataSource::Fallback, fixture));
        let snap =
            MarketSnapshot::resolve(&resolver().with_secondary(feed), "SPY", &at(2024, 6, 3, 10, 0));
        assert_eq!(snap.price, 531.0);
        assert_eq!(snap.source, DataSource::Fallback);
    }
}

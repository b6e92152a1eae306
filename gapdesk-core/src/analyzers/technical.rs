//! Price location against VWAP and yesterday's range, plus volume confirmation.

use super::trend::{dynamic_vwap, trend_stats, DynamicVwap};
use super::{ensure_finite, AnalysisContext, AnalysisError, Analyzer, Scored};
use crate::data::{FeedRequest, MarketSnapshot};
use crate::domain::{AnalyzerResult, Bar, DataSource};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct YesterdayLevels {
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub source: DataSource,
}

impl YesterdayLevels {
    /// Levels of the second-to-last daily bar (the last one is today).
    pub fn from_daily(bars: &[Bar], source: DataSource) -> Option<Self> {
        let [.., yesterday, _today] = bars else {
            return None;
        };
        yesterday.is_sane().then_some(Self {
            high: yesterday.high,
            low: yesterday.low,
            close: yesterday.close,
            source,
        })
    }

    /// Estimated range around the current price.
    pub fn proxy(price: f64) -> Self {
        Self {
            high: price * 1.015,
            low: price * 0.985,
            close: price * 1.005,
            source: DataSource::Proxy,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalAnalysis {
    pub price: f64,
    pub vwap: f64,
    pub vwap_distance_pct: f64,
    pub vwap_signal_strength: String,
    pub levels: YesterdayLevels,
    pub pct_vs_yesterday_high: f64,
    pub pct_vs_yesterday_low: f64,
    pub volume_ratio: f64,
    pub volume_signal: String,
    /// Present when VWAP was scored with the trend-adjusted threshold.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dynamic_vwap: Option<DynamicVwap>,
    pub result: AnalyzerResult,
}

impl Scored for TechnicalAnalysis {
    fn result(&self) -> &AnalyzerResult {
        &self.result
    }
}

pub fn vwap_signal_strength(distance_pct: f64) -> &'static str {
    let d = distance_pct.abs();
    if d > 0.3 {
        "STRONG"
    } else if d > 0.15 {
        "MODERATE"
    } else if d > 0.05 {
        "WEAK"
    } else {
        "NEUTRAL"
    }
}

/// Fixed-bucket VWAP points; the sign follows the distance.
pub fn vwap_points(d: f64) -> (f64, String) {
    let sign = if d > 0.0 { 1.0 } else { -1.0 };
    match vwap_signal_strength(d) {
        "STRONG" => {
            let p = 2.0 * sign;
            (p, format!("Strong VWAP distance {d:+.3}% (>0.3%) = {p:+.1} pts"))
        }
        "MODERATE" => {
            let p = sign;
            (p, format!("Moderate VWAP distance {d:+.3}% (0.15-0.3%) = {p:+.1} pts"))
        }
        "WEAK" => {
            let p = 0.5 * sign;
            (p, format!("Weak VWAP distance {d:+.3}% (0.05-0.15%) = {p:+.1} pts"))
        }
        _ => (0.0, format!("Neutral VWAP distance {d:+.3}% (≤0.05%) = 0.0 pts")),
    }
}

pub fn support_resistance_points(price: f64, levels: &YesterdayLevels) -> (f64, String) {
    if price > levels.high {
        (
            1.0,
            format!("Breakout above yesterday high ${:.2} = +1.0 pts", levels.high),
        )
    } else if price < levels.low {
        (
            -1.0,
            format!("Breakdown below yesterday low ${:.2} = -1.0 pts", levels.low),
        )
    } else {
        (
            0.0,
            format!(
                "Price within yesterday range ${:.2}-${:.2} = 0.0 pts",
                levels.low, levels.high
            ),
        )
    }
}

pub fn volume_points(ratio: f64) -> (f64, String) {
    if ratio > 1.5 {
        (0.5, format!("Strong volume {ratio:.1}x average (>1.5x) = +0.5 pts"))
    } else if ratio < 0.8 {
        (-0.5, format!("Weak volume {ratio:.1}x average (<0.8x) = -0.5 pts"))
    } else {
        (0.0, format!("Normal volume {ratio:.1}x average (0.8-1.5x) = 0.0 pts"))
    }
}

fn volume_signal(ratio: f64) -> &'static str {
    if ratio > 1.5 {
        "STRONG"
    } else if ratio < 0.8 {
        "WEAK"
    } else {
        "NORMAL"
    }
}

fn pct_vs(price: f64, level: f64) -> f64 {
    if level > 0.0 {
        (price - level) / level * 100.0
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TechnicalAnalyzer;

impl TechnicalAnalyzer {
    /// The fixed estimate: neutral VWAP, price below resistance, weak volume.
    fn fixed(price: f64) -> TechnicalAnalysis {
        let levels = YesterdayLevels::proxy(price);
        let result = AnalyzerResult::new(DataSource::Proxy)
            .with_component("vwap", 0.0, "Neutral VWAP (proxy estimate)")
            .with_component(
                "support_resistance",
                -0.5,
                "Below resistance level (proxy estimate)",
            )
            .with_component("volume", -0.5, "Weak volume (proxy estimate)");
        TechnicalAnalysis {
            price,
            vwap: price,
            vwap_distance_pct: 0.0,
            vwap_signal_strength: "NEUTRAL".into(),
            pct_vs_yesterday_high: pct_vs(price, levels.high),
            pct_vs_yesterday_low: pct_vs(price, levels.low),
            levels,
            volume_ratio: 1.0,
            volume_signal: "NORMAL".into(),
            dynamic_vwap: None,
            result,
        }
    }
}

impl Analyzer for TechnicalAnalyzer {
    type Output = TechnicalAnalysis;

    fn name(&self) -> &'static str {
        "technical"
    }

    fn try_analyze(&self, ctx: &AnalysisContext<'_>) -> Result<TechnicalAnalysis, AnalysisError> {
        let symbol = ctx.underlying();
        let snapshot = MarketSnapshot::resolve(ctx.resolver, symbol, &ctx.now);
        if snapshot.source == DataSource::Proxy {
            return Ok(Self::fixed(snapshot.price));
        }

        let price = snapshot.price;
        let distance = snapshot.vwap.distance_pct;
        let volume_ratio = snapshot.volume_ratio(1.0);
        ensure_finite("technical inputs", &[price, distance, volume_ratio])?;

        let levels = ctx
            .resolver
            .resolve_live(&FeedRequest::daily(symbol, 5), |payload, tier| {
                YesterdayLevels::from_daily(&payload.into_bars()?, tier)
            })
            .map(|r| r.value)
            .unwrap_or_else(|| YesterdayLevels::proxy(price));

        let mut result = AnalyzerResult::new(snapshot.source.worst(levels.source));
        let dynamic = ctx.config.technical.use_dynamic_vwap.then(|| {
            let strength = trend_stats(&snapshot.history).map_or(0.0, |s| s.trend_strength);
            dynamic_vwap(distance, strength)
        });
        match &dynamic {
            Some(d) => result.push("vwap", d.points, d.reason.clone()),
            None => {
                let (p, reason) = vwap_points(distance);
                result.push("vwap", p, reason);
            }
        }
        let (p, reason) = support_resistance_points(price, &levels);
        result.push("support_resistance", p, reason);
        let (p, reason) = volume_points(volume_ratio);
        result.push("volume", p, reason);

        Ok(TechnicalAnalysis {
            price,
            vwap: snapshot.vwap.vwap,
            vwap_distance_pct: distance,
            vwap_signal_strength: vwap_signal_strength(distance).into(),
            pct_vs_yesterday_high: pct_vs(price, levels.high),
            pct_vs_yesterday_low: pct_vs(price, levels.low),
            levels,
            volume_ratio,
            volume_signal: volume_signal(volume_ratio).into(),
            dynamic_vwap: dynamic,
            result,
        })
    }

    fn fallback(&self, ctx: &AnalysisContext<'_>, err: &AnalysisError) -> TechnicalAnalysis {
        let price = ctx.resolver.proxy().underlying_price(&ctx.now);
        let mut out = Self::fixed(price);
        out.result = out.result.with_error(err.to_string());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::testing::proxy_resolver;
    use crate::config::EngineConfig;
    use crate::data::{FixtureFeed, MarketFixture};
    use crate::domain::Quote;
    use crate::indicators::{assert_approx, make_bars, make_bars_with_volume, DEFAULT_EPSILON};
    use crate::window::at;
    use std::sync::Arc;

    #[test]
    fn vwap_buckets_are_signed() {
        assert_eq!(vwap_points(0.31).0, 2.0);
        assert_eq!(vwap_points(-0.31).0, -2.0);
        assert_eq!(vwap_points(0.3).0, 1.0);
        assert_eq!(vwap_points(-0.16).0, -1.0);
        assert_eq!(vwap_points(0.06).0, 0.5);
        assert_eq!(vwap_points(0.05).0, 0.0);
    }

    #[test]
    fn range_breaks() {
        let levels = YesterdayLevels {
            high: 101.0,
            low: 99.0,
            close: 100.0,
            source: DataSource::Primary,
        };
        assert_eq!(support_resistance_points(101.5, &levels).0, 1.0);
        assert_eq!(support_resistance_points(98.5, &levels).0, -1.0);
        assert_eq!(support_resistance_points(101.0, &levels).0, 0.0);
    }

    #[test]
    fn volume_confirmation() {
        assert_eq!(volume_points(1.6).0, 0.5);
        assert_eq!(volume_points(0.7).0, -0.5);
        assert_eq!(volume_points(1.5).0, 0.0);
    }

    #[test]
    fn levels_come_from_second_to_last_bar() {
        let bars = make_bars(&[100.0, 102.0, 103.0]);
        let levels = YesterdayLevels::from_daily(&bars, DataSource::Fallback).unwrap();
        assert_eq!(levels.close, 102.0);
        assert_eq!(levels.high, 102.05);
        assert!(YesterdayLevels::from_daily(&bars[..1], DataSource::Fallback).is_none());
    }

    #[test]
    fn proxy_snapshot_returns_fixed_estimate() {
        let config = EngineConfig::default();
        let resolver = proxy_resolver(&config);
        let ctx = AnalysisContext::new(&resolver, &config, at(2024, 6, 3, 10, 0));
        let out = TechnicalAnalyzer.analyze(&ctx);
        assert_approx(out.result.total_points(), -1.0, DEFAULT_EPSILON);
        assert_eq!(out.result.data_source(), DataSource::Proxy);
        assert!(out.result.error().is_none());
    }

    fn live_fixture() -> MarketFixture {
        let mut fixture = MarketFixture::default();
        fixture.quotes.insert(
            "SPY".into(),
            Quote {
                symbol: "SPY".into(),
                last: 100.2,
                change: 0.0,
                change_pct: 0.0,
                volume: 1_600,
                avg_volume: 1_000,
                bid: None,
                ask: None,
            },
        );
        fixture
            .intraday
            .insert("SPY".into(), make_bars_with_volume(&[(100.0, 10), (100.0, 10)]));
        fixture
            .daily
            .insert("SPY".into(), make_bars(&[99.0, 100.0, 100.1]));
        fixture
    }

    #[test]
    fn live_scoring_sums_components() {
        let config = EngineConfig::default();
        let resolver = proxy_resolver(&config).with_primary(Arc::new(FixtureFeed::new(
            "fx",
            DataSource::Primary,
            live_fixture(),
        )));
        let ctx = AnalysisContext::new(&resolver, &config, at(2024, 6, 3, 10, 0));
        let out = TechnicalAnalyzer.analyze(&ctx);
        // distance +0.2% ⇒ +1; 100.2 > yesterday high 100.05 ⇒ +1; 1.6x ⇒ +0.5
        assert_approx(out.result.total_points(), 2.5, 1e-9);
        assert_eq!(out.result.data_source(), DataSource::Primary);
        assert!(out.dynamic_vwap.is_none());
    }

    #[test]
    fn dynamic_vwap_replaces_fixed_buckets() {
        let mut config = EngineConfig::default();
        config.technical.use_dynamic_vwap = true;
        let resolver = proxy_resolver(&config).with_primary(Arc::new(FixtureFeed::new(
            "fx",
            DataSource::Primary,
            live_fixture(),
        )));
        let ctx = AnalysisContext::new(&resolver, &config, at(2024, 6, 3, 10, 0));
        let out = TechnicalAnalyzer.analyze(&ctx);
        // Two bars: ranging, threshold 0.15; 0.2% ⇒ +1 either way.
        let dynamic = out.dynamic_vwap.unwrap();
        assert_eq!(dynamic.points, 1.0);
        assert_eq!(out.result.points_of("vwap"), 1.0);
    }
}

//! Short-term trend strength and momentum-shift detection over today's
//! one-minute bars, plus the trend-adjusted VWAP threshold.

use super::{ensure_finite, AnalysisContext, AnalysisError, Analyzer, Scored};
use crate::config::MomentumThresholds;
use crate::data::MarketSnapshot;
use crate::domain::{AnalyzerResult, Bar, DataSource};
use crate::indicators::{ewm_of_closes, pct_change_over, volume_acceleration};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Bars needed for the EMA(20) trend reading.
pub const MIN_TREND_BARS: usize = 20;
/// Bars needed for momentum-shift detection.
pub const MIN_SHIFT_BARS: usize = 10;

const BASE_VWAP_THRESHOLD: f64 = 0.15;

/// EMA-derived trend figures, all in percent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TrendStats {
    pub ema9: f64,
    pub ema20: f64,
    pub ema_separation_pct: f64,
    pub price_vs_ema9_pct: f64,
    pub trend_acceleration_pct: f64,
    pub trend_strength: f64,
}

/// `None` below [`MIN_TREND_BARS`] bars or when the EMAs are undefined.
pub fn trend_stats(bars: &[Bar]) -> Option<TrendStats> {
    if bars.len() < MIN_TREND_BARS {
        return None;
    }
    let ema9 = ewm_of_closes(bars, 9);
    let ema20 = ewm_of_closes(bars, 20);
    let price = bars.last()?.close;
    let e9 = *ema9.last()?;
    let e20 = *ema20.last()?;
    if !(e9.is_finite() && e20.is_finite()) || e9 == 0.0 || e20 == 0.0 {
        return None;
    }
    let separation = (e9 - e20) / e20 * 100.0;
    Some(TrendStats {
        ema9: e9,
        ema20: e20,
        ema_separation_pct: separation,
        price_vs_ema9_pct: (price - e9) / e9 * 100.0,
        trend_acceleration_pct: pct_change_over(&ema9, 5).unwrap_or(0.0),
        trend_strength: separation.abs(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShiftStrength {
    None,
    Moderate,
    Strong,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MomentumShift {
    pub detected: bool,
    pub strength: ShiftStrength,
    pub points: f64,
    pub momentum_5: f64,
    pub momentum_10: f64,
    pub divergence: f64,
    pub volume_acceleration: f64,
}

impl MomentumShift {
    fn none() -> Self {
        Self {
            detected: false,
            strength: ShiftStrength::None,
            points: 0.0,
            momentum_5: 0.0,
            momentum_10: 0.0,
            divergence: 0.0,
            volume_acceleration: 1.0,
        }
    }
}

/// Compare 5-bar and 10-bar momentum. A shift needs both divergence and
/// rising volume; its sign follows the faster momentum.
pub fn detect_momentum_shift(bars: &[Bar], t: &MomentumThresholds) -> MomentumShift {
    if bars.len() < MIN_SHIFT_BARS {
        return MomentumShift::none();
    }
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let (Some(m5), Some(m10)) = (pct_change_over(&closes, 5), pct_change_over(&closes, 10)) else {
        return MomentumShift::none();
    };
    let divergence = (m5 - m10).abs();
    let vol_acc = volume_acceleration(bars);
    let sign = if m5 > m10 { 1.0 } else { -1.0 };

    let (strength, points) = if divergence > t.strong_divergence && vol_acc > t.strong_volume {
        (ShiftStrength::Strong, 2.0 * sign)
    } else if divergence > t.moderate_divergence && vol_acc > t.moderate_volume {
        (ShiftStrength::Moderate, sign)
    } else {
        (ShiftStrength::None, 0.0)
    };
    MomentumShift {
        detected: strength != ShiftStrength::None,
        strength,
        points,
        momentum_5: m5,
        momentum_10: m10,
        divergence,
        volume_acceleration: vol_acc,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrendRegime {
    StrongTrend,
    ModerateTrend,
    Ranging,
}

impl TrendRegime {
    pub fn of(trend_strength: f64) -> Self {
        if trend_strength > 0.2 {
            TrendRegime::StrongTrend
        } else if trend_strength > 0.1 {
            TrendRegime::ModerateTrend
        } else {
            TrendRegime::Ranging
        }
    }

    /// Strong trends lower the VWAP threshold.
    pub fn threshold_multiplier(self) -> f64 {
        match self {
            TrendRegime::StrongTrend => 0.6,
            TrendRegime::ModerateTrend => 0.8,
            TrendRegime::Ranging => 1.0,
        }
    }
}

impl fmt::Display for TrendRegime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TrendRegime::StrongTrend => "STRONG TREND",
            TrendRegime::ModerateTrend => "MODERATE TREND",
            TrendRegime::Ranging => "RANGING",
        })
    }
}

/// VWAP scoring with a trend-adjusted threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicVwap {
    pub regime: TrendRegime,
    pub threshold_multiplier: f64,
    pub adjusted_threshold: f64,
    pub points: f64,
    pub signal_strength: String,
    pub reason: String,
}

pub fn dynamic_vwap(vwap_distance_pct: f64, trend_strength: f64) -> DynamicVwap {
    let regime = TrendRegime::of(trend_strength);
    let multiplier = regime.threshold_multiplier();
    let threshold = BASE_VWAP_THRESHOLD * multiplier;
    let d = vwap_distance_pct;
    let sign = if d > 0.0 { 1.0 } else { -1.0 };
    let (points, strength) = if d.abs() > threshold * 2.0 {
        (2.0 * sign, "STRONG")
    } else if d.abs() > threshold {
        (sign, "MODERATE")
    } else {
        (0.0, "NEUTRAL")
    };
    DynamicVwap {
        regime,
        threshold_multiplier: multiplier,
        adjusted_threshold: threshold,
        points,
        signal_strength: strength.to_string(),
        reason: format!(
            "{regime}: VWAP distance {d:+.3}% vs threshold {threshold:.3}% = {points:+.1} pts"
        ),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendAnalysis {
    pub bars: usize,
    /// `None` below [`MIN_TREND_BARS`] bars.
    pub stats: Option<TrendStats>,
    pub momentum_shift: MomentumShift,
    pub dynamic_vwap: DynamicVwap,
    pub result: AnalyzerResult,
}

impl TrendAnalysis {
    pub fn trend_strength(&self) -> f64 {
        self.stats.map_or(0.0, |s| s.trend_strength)
    }
}

impl Scored for TrendAnalysis {
    fn result(&self) -> &AnalyzerResult {
        &self.result
    }
}

/// Score the trend over `bars`. Fewer than [`MIN_TREND_BARS`] bars give an
/// all-zero neutral result.
pub fn score_trend(
    bars: &[Bar],
    vwap_distance_pct: f64,
    thresholds: &MomentumThresholds,
    source: DataSource,
) -> TrendAnalysis {
    let mut result = AnalyzerResult::new(source);
    let Some(stats) = trend_stats(bars) else {
        let reason = format!("Insufficient history ({} bars < {MIN_TREND_BARS})", bars.len());
        result.push("ema_trend", 0.0, reason);
        return TrendAnalysis {
            bars: bars.len(),
            stats: None,
            momentum_shift: MomentumShift::none(),
            dynamic_vwap: dynamic_vwap(vwap_distance_pct, 0.0),
            result,
        };
    };

    let sep = stats.ema_separation_pct;
    let sign = if sep >= 0.0 { 1.0 } else { -1.0 };
    let points = match TrendRegime::of(stats.trend_strength) {
        TrendRegime::StrongTrend => sign,
        TrendRegime::ModerateTrend => 0.5 * sign,
        TrendRegime::Ranging => 0.0,
    };
    result.push(
        "ema_trend",
        points,
        format!("EMA9/EMA20 separation {sep:+.3}% = {points:+.1} pts"),
    );

    let acc = stats.trend_acceleration_pct;
    let points = if acc.abs() > 0.1 { 0.5 * acc.signum() } else { 0.0 };
    result.push(
        "acceleration",
        points,
        format!("EMA9 5-bar change {acc:+.3}% = {points:+.1} pts"),
    );

    let shift = detect_momentum_shift(bars, thresholds);
    if shift.detected {
        let label = match shift.strength {
            ShiftStrength::Strong => "Strong",
            _ => "Moderate",
        };
        result.push(
            "momentum_shift",
            shift.points,
            format!(
                "{label} momentum shift: 5-bar {:+.2}% vs 10-bar {:+.2}%, volume {:.2}x = {:+.1} pts",
                shift.momentum_5, shift.momentum_10, shift.volume_acceleration, shift.points
            ),
        );
    }

    TrendAnalysis {
        bars: bars.len(),
        stats: Some(stats),
        momentum_shift: shift,
        dynamic_vwap: dynamic_vwap(vwap_distance_pct, stats.trend_strength),
        result,
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TrendAnalyzer;

impl Analyzer for TrendAnalyzer {
    type Output = TrendAnalysis;

    fn name(&self) -> &'static str {
        "trend"
    }

    fn try_analyze(&self, ctx: &AnalysisContext<'_>) -> Result<TrendAnalysis, AnalysisError> {
        let snapshot = MarketSnapshot::resolve(ctx.resolver, ctx.underlying(), &ctx.now);
        let out = score_trend(
            &snapshot.history,
            snapshot.vwap.distance_pct,
            &ctx.config.momentum,
            snapshot.vwap.source,
        );
        if let Some(stats) = out.stats {
            ensure_finite(
                "trend stats",
                &[stats.ema_separation_pct, stats.trend_acceleration_pct],
            )?;
        }
        Ok(out)
    }

    fn fallback(&self, ctx: &AnalysisContext<'_>, err: &AnalysisError) -> TrendAnalysis {
        let mut out = score_trend(&[], 0.0, &ctx.config.momentum, DataSource::Proxy);
        out.result = out.result.with_error(err.to_string());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::testing::proxy_resolver;
    use crate::config::EngineConfig;
    use crate::indicators::{assert_approx, make_bars, make_bars_with_volume, DEFAULT_EPSILON};
    use crate::window::at;

    fn thresholds() -> MomentumThresholds {
        MomentumThresholds::default()
    }

    #[test]
    fn short_history_is_neutral() {
        let bars = make_bars(&[100.0; 19]);
        let out = score_trend(&bars, 0.5, &thresholds(), DataSource::Primary);
        assert!(out.stats.is_none());
        assert_eq!(out.result.total_points(), 0.0);
        assert!(!out.momentum_shift.detected);
    }

    #[test]
    fn flat_series_has_no_trend() {
        let bars = make_bars(&[100.0; 30]);
        let stats = trend_stats(&bars).unwrap();
        assert_approx(stats.ema_separation_pct, 0.0, DEFAULT_EPSILON);
        assert_approx(stats.trend_acceleration_pct, 0.0, DEFAULT_EPSILON);
        let out = score_trend(&bars, 0.0, &thresholds(), DataSource::Primary);
        assert_eq!(out.result.total_points(), 0.0);
    }

    #[test]
    fn rising_series_scores_bullish() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + i as f64 * 0.1).collect();
        let out = score_trend(&make_bars(&closes), 0.0, &thresholds(), DataSource::Primary);
        let stats = out.stats.unwrap();
        assert!(stats.ema_separation_pct > 0.0);
        assert!(out.result.points_of("ema_trend") > 0.0);
        assert_eq!(out.result.points_of("acceleration"), 0.5);
    }

    #[test]
    fn late_step_in_short_history_stays_ranging() {
        let mut closes = vec![100.0; 19];
        closes.push(101.0);
        let out = score_trend(&make_bars(&closes), 0.0, &thresholds(), DataSource::Primary);
        let stats = out.stats.unwrap();
        assert_approx(stats.ema_separation_pct, 0.092_115_510_788_906, 1e-9);
        assert_eq!(TrendRegime::of(stats.trend_strength), TrendRegime::Ranging);
        assert_eq!(out.result.points_of("ema_trend"), 0.0);
        assert_eq!(out.dynamic_vwap.regime, TrendRegime::Ranging);
    }

    #[test]
    fn strong_shift_needs_divergence_and_volume() {
        // Flat for 25 bars, then a sharp rally on heavy volume over the last 5.
        let mut rows: Vec<(f64, u64)> = (0..25).map(|_| (100.0, 1_000)).collect();
        rows.extend([(100.2, 3_000), (100.4, 3_000), (100.6, 3_000), (100.8, 3_000), (101.0, 3_000)]);
        let bars = make_bars_with_volume(&rows);
        let shift = detect_momentum_shift(&bars, &thresholds());
        // 5-bar: 100.2 → 101.0; 10-bar: 100.0 → 101.0
        assert_approx(shift.momentum_5, 0.8 / 100.2 * 100.0, 1e-9);
        assert_approx(shift.momentum_10, 1.0, 1e-9);
        // Decelerating rally: divergence just over 0.2, so only moderate, and bearish.
        assert!(shift.divergence > 0.2 && shift.divergence < 0.3);
        assert_eq!(shift.strength, ShiftStrength::Moderate);
        assert_eq!(shift.points, -1.0);

        // Pullback then rally: 10-bar change negative, 5-bar positive.
        let mut rows: Vec<(f64, u64)> = (0..20).map(|_| (101.0, 1_000)).collect();
        rows.extend([(100.6, 1_000), (100.3, 1_000), (100.0, 1_000), (99.8, 1_000), (99.6, 1_000)]);
        rows.extend([(99.7, 3_000), (99.8, 3_000), (99.9, 3_000), (100.0, 3_000), (100.1, 3_000)]);
        let bars = make_bars_with_volume(&rows);
        let shift = detect_momentum_shift(&bars, &thresholds());
        assert_eq!(shift.strength, ShiftStrength::Strong);
        assert_eq!(shift.points, 2.0);
        assert_approx(shift.volume_acceleration, 3.0, DEFAULT_EPSILON);
    }

    #[test]
    fn dynamic_threshold_by_regime() {
        let v = dynamic_vwap(0.2, 0.25);
        assert_eq!(v.regime, TrendRegime::StrongTrend);
        assert_approx(v.adjusted_threshold, 0.09, 1e-12);
        assert_eq!(v.points, 2.0);
        let v = dynamic_vwap(-0.2, 0.15);
        assert_eq!(v.regime, TrendRegime::ModerateTrend);
        assert_eq!(v.points, -1.0);
        let v = dynamic_vwap(0.2, 0.0);
        assert_eq!(v.regime, TrendRegime::Ranging);
        assert_eq!(v.points, 1.0);
        assert_eq!(dynamic_vwap(0.1, 0.0).points, 0.0);
    }

    #[test]
    fn proxy_cycle_is_neutral() {
        let config = EngineConfig::default();
        let resolver = proxy_resolver(&config);
        let ctx = AnalysisContext::new(&resolver, &config, at(2024, 6, 3, 10, 0));
        let out = TrendAnalyzer.analyze(&ctx);
        assert_eq!(out.bars, 0);
        assert_eq!(out.result.total_points(), 0.0);
        assert_eq!(out.result.data_source(), DataSource::Proxy);
    }
}

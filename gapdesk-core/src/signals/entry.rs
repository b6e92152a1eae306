//! Entry decision: sum the analyzers, classify the net score, gate on the clock.

use crate::config::DecisionThresholds;
use crate::domain::{AnalyzerResult, Confidence, Signal, TradeDecision};
use crate::window::{TradingWindowState, WindowRegime};
use serde::{Deserialize, Serialize};

/// The five analyzer results the aggregator consumes.
#[derive(Debug, Clone, Copy)]
pub struct AnalyzerScores<'a> {
    pub gap: &'a AnalyzerResult,
    pub internals: &'a AnalyzerResult,
    pub sectors: &'a AnalyzerResult,
    pub technicals: &'a AnalyzerResult,
    pub trend: &'a AnalyzerResult,
}

impl AnalyzerScores<'_> {
    fn all(&self) -> [&AnalyzerResult; 5] {
        [self.gap, self.internals, self.sectors, self.technicals, self.trend]
    }
}

/// Signed totals per analyzer plus the bullish/bearish split.
///
/// Both split totals are non-negative; `net == bullish_total - bearish_total`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointsBreakdown {
    pub gap: f64,
    pub internals: f64,
    pub sectors: f64,
    pub technicals: f64,
    pub trend: f64,
    pub bullish_total: f64,
    pub bearish_total: f64,
    pub net: f64,
    pub decision_logic: String,
}

impl PointsBreakdown {
    pub fn from_scores(scores: &AnalyzerScores<'_>) -> Self {
        let bullish_total: f64 = scores.all().iter().map(|r| r.bullish_part()).sum();
        let bearish_total: f64 = scores.all().iter().map(|r| r.bearish_part()).sum();
        Self {
            gap: scores.gap.total_points(),
            internals: scores.internals.total_points(),
            sectors: scores.sectors.total_points(),
            technicals: scores.technicals.total_points(),
            trend: scores.trend.total_points(),
            bullish_total,
            bearish_total,
            net: bullish_total - bearish_total,
            decision_logic: format!("Bullish: {bullish_total:.1} vs Bearish: {bearish_total:.1}"),
        }
    }
}

/// Map a net score onto a signal and confidence. Bounds are inclusive.
pub fn classify(net: f64, thresholds: DecisionThresholds) -> (Signal, Confidence) {
    if net >= thresholds.strong {
        (Signal::StrongLong, Confidence::High)
    } else if net >= thresholds.moderate {
        (Signal::ModerateLong, Confidence::Medium)
    } else if net <= -thresholds.strong {
        (Signal::StrongShort, Confidence::High)
    } else if net <= -thresholds.moderate {
        (Signal::ModerateShort, Confidence::Medium)
    } else {
        (Signal::NoTrade, Confidence::Low)
    }
}

/// Apply the trading-window gate to a raw signal.
///
/// Inside the prime window the raw signal passes through untouched. Anywhere
/// else the decision becomes `NO TRADE - OUTSIDE WINDOW` and a warning names
/// what the indicators would have said.
pub fn gate(raw: Signal, window: &TradingWindowState) -> (TradeDecision, Option<String>) {
    if window.is_prime() {
        return (raw.into(), None);
    }

    let warning = match window.regime {
        WindowRegime::OpeningVolatility => format!(
            "TIMING WARNING: Indicators show {raw}, but opening volatility makes execution risky. Wait for 9:45 AM."
        ),
        WindowRegime::PostWindow => format!(
            "TIMING WARNING: Indicators show {raw}, but gap edge has diminished. Consider waiting for tomorrow."
        ),
        WindowRegime::Lunch => format!(
            "TIMING WARNING: Indicators show {raw}, but low volume makes fills poor. Avoid lunch hours."
        ),
        WindowRegime::DangerZone => format!(
            "TIMING WARNING: Indicators show {raw}, but theta burn is extreme. Exit existing positions only."
        ),
        WindowRegime::Weekend => format!(
            "ANALYSIS ONLY: Indicators would suggest {raw} if market were open. Review for Monday."
        ),
        _ => format!("TIMING WARNING: Indicators show {raw}, but market timing is suboptimal."),
    };
    (TradeDecision::NoTradeOutsideWindow, Some(warning))
}

/// Gated entry decision with the raw signal kept alongside.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub decision: TradeDecision,
    /// Classification before the window gate.
    pub raw_signal: Signal,
    pub confidence: Confidence,
    pub breakdown: PointsBreakdown,
    pub window: TradingWindowState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timing_warning: Option<String>,
}

impl Decision {
    /// True when the indicators show an edge but the clock vetoed it.
    pub fn is_timing_blocked(&self) -> bool {
        self.decision == TradeDecision::NoTradeOutsideWindow && self.raw_signal != Signal::NoTrade
    }
}

pub fn final_decision(
    scores: &AnalyzerScores<'_>,
    thresholds: DecisionThresholds,
    window: TradingWindowState,
) -> Decision {
    let breakdown = PointsBreakdown::from_scores(scores);
    let (raw_signal, confidence) = classify(breakdown.net, thresholds);
    let (decision, timing_warning) = gate(raw_signal, &window);
    Decision {
        decision,
        raw_signal,
        confidence,
        breakdown,
        window,
        timing_warning,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DataSource;
    use crate::window::{at, check_trading_window};

    fn scored(points: f64) -> AnalyzerResult {
        AnalyzerResult::new(DataSource::Primary).with_component("x", points, "")
    }

    fn thresholds() -> DecisionThresholds {
        DecisionThresholds {
            strong: 7.0,
            moderate: 5.0,
        }
    }

    #[test]
    fn breakdown_splits_signs() {
        let (g, i, s, t, tr) = (scored(3.0), scored(-2.0), scored(1.5), scored(-0.5), scored(0.0));
        let scores = AnalyzerScores {
            gap: &g,
            internals: &i,
            sectors: &s,
            technicals: &t,
            trend: &tr,
        };
        let b = PointsBreakdown::from_scores(&scores);
        assert_eq!(b.bullish_total, 4.5);
        assert_eq!(b.bearish_total, 2.5);
        assert_eq!(b.net, 2.0);
        assert_eq!(b.internals, -2.0);
        assert_eq!(b.decision_logic, "Bullish: 4.5 vs Bearish: 2.5");
    }

    #[test]
    fn classification_bounds_are_inclusive() {
        let t = thresholds();
        assert_eq!(classify(7.0, t), (Signal::StrongLong, Confidence::High));
        assert_eq!(classify(6.99, t), (Signal::ModerateLong, Confidence::Medium));
        assert_eq!(classify(5.0, t), (Signal::ModerateLong, Confidence::Medium));
        assert_eq!(classify(4.99, t), (Signal::NoTrade, Confidence::Low));
        assert_eq!(classify(-4.99, t), (Signal::NoTrade, Confidence::Low));
        assert_eq!(classify(-5.0, t), (Signal::ModerateShort, Confidence::Medium));
        assert_eq!(classify(-6.99, t), (Signal::ModerateShort, Confidence::Medium));
        assert_eq!(classify(-7.0, t), (Signal::StrongShort, Confidence::High));
    }

    #[test]
    fn thresholds_are_configurable() {
        let t = DecisionThresholds {
            strong: 4.0,
            moderate: 2.0,
        };
        assert_eq!(classify(4.5, t).0, Signal::StrongLong);
        assert_eq!(classify(-2.5, t).0, Signal::ModerateShort);
    }

    #[test]
    fn prime_window_passes_signal() {
        let window = check_trading_window(&at(2024, 6, 3, 10, 15));
        let (decision, warning) = gate(Signal::ModerateShort, &window);
        assert_eq!(decision, TradeDecision::ModerateShort);
        assert!(warning.is_none());
    }

    #[test]
    fn lunch_blocks_with_warning() {
        let window = check_trading_window(&at(2024, 6, 3, 12, 30));
        let (decision, warning) = gate(Signal::StrongLong, &window);
        assert_eq!(decision, TradeDecision::NoTradeOutsideWindow);
        assert_eq!(
            warning.as_deref(),
            Some("TIMING WARNING: Indicators show STRONG LONG, but low volume makes fills poor. Avoid lunch hours.")
        );
    }

    #[test]
    fn warnings_follow_regime() {
        let cases = [
            ((9, 35), "opening volatility"),
            ((11, 15), "gap edge has diminished"),
            ((15, 0), "theta burn is extreme"),
            ((8, 0), "market timing is suboptimal"),
            ((16, 30), "market timing is suboptimal"),
        ];
        for ((h, m), needle) in cases {
            let window = check_trading_window(&at(2024, 6, 3, h, m));
            let (_, warning) = gate(Signal::NoTrade, &window);
            assert!(warning.unwrap().contains(needle), "at {h}:{m}");
        }
        let saturday = check_trading_window(&at(2024, 6, 8, 10, 30));
        let (_, warning) = gate(Signal::StrongShort, &saturday);
        assert!(warning.unwrap().starts_with("ANALYSIS ONLY: Indicators would suggest STRONG SHORT"));
    }

    #[test]
    fn final_decision_keeps_raw_signal() {
        let (g, i, s, t, tr) = (scored(4.0), scored(2.0), scored(1.0), scored(0.5), scored(0.0));
        let scores = AnalyzerScores {
            gap: &g,
            internals: &i,
            sectors: &s,
            technicals: &t,
            trend: &tr,
        };
        let d = final_decision(&scores, thresholds(), check_trading_window(&at(2024, 6, 3, 15, 0)));
        assert_eq!(d.raw_signal, Signal::StrongLong);
        assert_eq!(d.confidence, Confidence::High);
        assert_eq!(d.decision, TradeDecision::NoTradeOutsideWindow);
        assert!(d.is_timing_blocked());
    }
}

//! Opening gap analysis.
//!
//! Sizes the open-vs-prior-close gap, confirms it against volume and the
//! VWAP side, and signs the total by gap direction. Large gaps (1.5–2.5%)
//! score above monster gaps: past 2.5% the follow-through is unreliable.

use super::{ensure_finite, AnalysisContext, AnalysisError, Analyzer, Scored};
use crate::data::{FeedRequest, MarketSnapshot};
use crate::domain::{AnalyzerResult, Bar, DataSource};
use crate::window::is_weekend;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Futures alignment is assumed, not measured.
const FUTURES_ALIGNMENT_POINTS: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GapCategory {
    Monster,
    Large,
    Medium,
    Small,
    Minimal,
    Weekend,
}

impl GapCategory {
    /// Bucket an absolute gap. Lower bounds are inclusive.
    pub fn of(abs_gap: f64) -> Self {
        if abs_gap >= 2.5 {
            GapCategory::Monster
        } else if abs_gap >= 1.5 {
            GapCategory::Large
        } else if abs_gap >= 0.75 {
            GapCategory::Medium
        } else if abs_gap >= 0.5 {
            GapCategory::Small
        } else {
            GapCategory::Minimal
        }
    }

    pub fn points(self) -> f64 {
        match self {
            GapCategory::Monster => 1.0,
            GapCategory::Large => 2.0,
            GapCategory::Medium => 1.5,
            GapCategory::Small => 1.0,
            GapCategory::Minimal | GapCategory::Weekend => 0.0,
        }
    }

    fn reason(self, abs_gap: f64) -> String {
        match self {
            GapCategory::Monster => {
                format!("Monster gap {abs_gap:.2}% (≥2.5%) = 1.0 pts (high unpredictability)")
            }
            GapCategory::Large => {
                format!("Large gap {abs_gap:.2}% (1.5-2.5%) = 2.0 pts (optimal risk/reward)")
            }
            GapCategory::Medium => {
                format!("Medium gap {abs_gap:.2}% (0.75-1.5%) = 1.5 pts (good probability)")
            }
            GapCategory::Small => {
                format!("Small gap {abs_gap:.2}% (0.5-0.75%) = 1.0 pts (moderate edge)")
            }
            GapCategory::Minimal => {
                format!("Minimal gap {abs_gap:.2}% (<0.5%) = 0.0 pts (no edge)")
            }
            GapCategory::Weekend => "Weekend - Monday gap unknown until market opens".into(),
        }
    }
}

impl fmt::Display for GapCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GapCategory::Monster => "MONSTER",
            GapCategory::Large => "LARGE",
            GapCategory::Medium => "MEDIUM",
            GapCategory::Small => "SMALL",
            GapCategory::Minimal => "MINIMAL",
            GapCategory::Weekend => "WEEKEND",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Significance {
    Moderate,
    Low,
    Pending,
}

impl Significance {
    pub fn of(abs_gap: f64) -> Self {
        if abs_gap >= 1.5 {
            Significance::Moderate
        } else {
            Significance::Low
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VwapStatus {
    AtVwap,
    StrongAbove,
    Above,
    StrongBelow,
    Below,
    Weekend,
}

impl VwapStatus {
    pub fn of(distance_pct: f64) -> Self {
        if distance_pct.abs() < 0.05 {
            VwapStatus::AtVwap
        } else if distance_pct > 0.25 {
            VwapStatus::StrongAbove
        } else if distance_pct > 0.05 {
            VwapStatus::Above
        } else if distance_pct < -0.25 {
            VwapStatus::StrongBelow
        } else {
            VwapStatus::Below
        }
    }
}

impl fmt::Display for VwapStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VwapStatus::AtVwap => "AT VWAP",
            VwapStatus::StrongAbove => "STRONG ABOVE",
            VwapStatus::Above => "ABOVE",
            VwapStatus::StrongBelow => "STRONG BELOW",
            VwapStatus::Below => "BELOW",
            VwapStatus::Weekend => "WEEKEND",
        };
        f.write_str(s)
    }
}

/// Full gap-analyzer output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapAnalysis {
    pub gap_pct: f64,
    pub category: GapCategory,
    pub significance: Significance,
    pub volume_surge_ratio: f64,
    pub vwap_distance_pct: f64,
    pub vwap_status: VwapStatus,
    pub futures_aligned: bool,
    /// ±1.0 when the gap and VWAP side agree, ±0.5 when they fight.
    pub direction_multiplier: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weekend_message: Option<String>,
    pub result: AnalyzerResult,
}

impl Scored for GapAnalysis {
    fn result(&self) -> &AnalyzerResult {
        &self.result
    }
}

/// Direction multiplier. A zero gap counts as a gap up.
pub fn direction_multiplier(gap_pct: f64, vwap_distance: f64) -> f64 {
    if gap_pct < 0.0 {
        if vwap_distance < 0.0 {
            -1.0
        } else {
            -0.5
        }
    } else if vwap_distance > 0.0 {
        1.0
    } else {
        0.5
    }
}

/// Points breakdown for a gap. The final component, `direction_adjustment`,
/// carries the difference between the signed final score and the unsigned
/// base, so the components always sum to the final score.
pub fn score_gap(
    gap_pct: f64,
    vwap_distance: f64,
    volume_surge: f64,
    source: DataSource,
) -> AnalyzerResult {
    let abs_gap = gap_pct.abs();
    let category = GapCategory::of(abs_gap);
    let mut result = AnalyzerResult::new(source);
    result.push("gap_size", category.points(), category.reason(abs_gap));

    let (points, reason) = match Significance::of(abs_gap) {
        Significance::Moderate => (
            0.5,
            format!("Gap {abs_gap:.2}% shows moderate significance = 0.5 pts"),
        ),
        _ => (
            0.0,
            format!("Gap {abs_gap:.2}% shows low significance = 0.0 pts"),
        ),
    };
    result.push("statistical_significance", points, reason);

    let (points, reason) = if volume_surge >= 2.0 {
        (
            1.0,
            format!("Strong volume surge {volume_surge:.2}x (≥2.0x) = 1.0 pts"),
        )
    } else if volume_surge >= 1.5 {
        (
            0.5,
            format!("Moderate volume surge {volume_surge:.2}x (1.5-2.0x) = 0.5 pts"),
        )
    } else {
        (
            0.0,
            format!("Weak volume {volume_surge:.2}x (<1.5x) = 0.0 pts"),
        )
    };
    result.push("volume_confirmation", points, reason);

    let (points, reason) = if vwap_distance.abs() > 0.25 {
        (
            1.0,
            format!("Strong VWAP distance {vwap_distance:+.3}% (>0.25%) = 1.0 pts"),
        )
    } else if vwap_distance.abs() > 0.1 {
        (
            0.5,
            format!("Moderate VWAP distance {vwap_distance:+.3}% (>0.1%) = 0.5 pts"),
        )
    } else {
        (
            0.0,
            format!("Neutral VWAP distance {vwap_distance:+.3}% (≤0.1%) = 0.0 pts"),
        )
    };
    result.push("vwap_alignment", points, reason);

    result.push(
        "es_alignment",
        FUTURES_ALIGNMENT_POINTS,
        "ES futures alignment (assumed)",
    );

    let base = result.total_points();
    let multiplier = direction_multiplier(gap_pct, vwap_distance);
    let side = if gap_pct < 0.0 { "Gap down" } else { "Gap up" };
    let agreement = if multiplier.abs() == 1.0 {
        "aligned with VWAP side"
    } else {
        "fighting VWAP side"
    };
    result.push(
        "direction_adjustment",
        base * multiplier - base,
        format!("{side} {agreement}: base {base:.1} × {multiplier:+.1}"),
    );
    result
}

/// `(today open − yesterday close) / yesterday close × 100` from daily bars.
pub fn gap_pct_from_daily(bars: &[Bar]) -> Option<f64> {
    let [.., yesterday, today] = bars else {
        return None;
    };
    if yesterday.close <= 0.0 || today.open <= 0.0 {
        return None;
    }
    Some((today.open - yesterday.close) / yesterday.close * 100.0)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GapAnalyzer;

impl GapAnalyzer {
    fn weekend(&self, ctx: &AnalysisContext<'_>) -> GapAnalysis {
        let symbol = ctx.underlying();
        let friday_close = ctx.resolver.resolve_with(
            &FeedRequest::daily(symbol, 5),
            |payload, _| payload.into_bars()?.last().map(|b| b.close),
            |proxy| proxy.underlying_price(&ctx.now),
        );
        let result = AnalyzerResult::new(DataSource::Proxy).with_component(
            "gap_size",
            0.0,
            GapCategory::Weekend.reason(0.0),
        );
        GapAnalysis {
            gap_pct: 0.0,
            category: GapCategory::Weekend,
            significance: Significance::Pending,
            volume_surge_ratio: 0.0,
            vwap_distance_pct: 0.0,
            vwap_status: VwapStatus::Weekend,
            futures_aligned: false,
            direction_multiplier: 0.0,
            weekend_message: Some(format!(
                "Market closed for weekend. Friday close: ${:.2}. Gap will be calculated Monday at 9:30 AM ET.",
                friday_close.value
            )),
            result,
        }
    }
}

impl Analyzer for GapAnalyzer {
    type Output = GapAnalysis;

    fn name(&self) -> &'static str {
        "gap"
    }

    fn try_analyze(&self, ctx: &AnalysisContext<'_>) -> Result<GapAnalysis, AnalysisError> {
        if is_weekend(&ctx.now) {
            return Ok(self.weekend(ctx));
        }

        let symbol = ctx.underlying();
        let fallbacks = &ctx.config.fallbacks;
        let snapshot = MarketSnapshot::resolve(ctx.resolver, symbol, &ctx.now);
        let gap = ctx.resolver.resolve_with(
            &FeedRequest::daily(symbol, 5),
            |payload, _| gap_pct_from_daily(&payload.into_bars()?),
            |_| fallbacks.default_gap_pct,
        );

        let gap_pct = gap.value;
        let distance = snapshot.vwap.distance_pct;
        let surge = snapshot.volume_ratio(fallbacks.proxy_volume_surge);
        ensure_finite("gap inputs", &[gap_pct, distance, surge])?;

        let source = snapshot.source.worst(gap.source);
        let abs_gap = gap_pct.abs();
        Ok(GapAnalysis {
            gap_pct,
            category: GapCategory::of(abs_gap),
            significance: Significance::of(abs_gap),
            volume_surge_ratio: surge,
            vwap_distance_pct: distance,
            vwap_status: VwapStatus::of(distance),
            futures_aligned: true,
            direction_multiplier: direction_multiplier(gap_pct, distance),
            weekend_message: None,
            result: score_gap(gap_pct, distance, surge, source),
        })
    }

    fn fallback(&self, ctx: &AnalysisContext<'_>, err: &AnalysisError) -> GapAnalysis {
        let fallbacks = &ctx.config.fallbacks;
        let result = AnalyzerResult::new(DataSource::Proxy)
            .with_component("gap_size", 1.5, "Medium gap (proxy estimate)")
            .with_component("es_alignment", FUTURES_ALIGNMENT_POINTS, "ES futures alignment (assumed)")
            .with_component("direction_adjustment", -4.0, "Gap down, fixed fallback estimate")
            .with_error(err.to_string());
        GapAnalysis {
            gap_pct: fallbacks.fallback_gap_pct,
            category: GapCategory::Medium,
            significance: Significance::Low,
            volume_surge_ratio: fallbacks.proxy_volume_surge,
            vwap_distance_pct: 0.0,
            vwap_status: VwapStatus::AtVwap,
            futures_aligned: true,
            direction_multiplier: -1.0,
            weekend_message: None,
            result,
        }
    }
}

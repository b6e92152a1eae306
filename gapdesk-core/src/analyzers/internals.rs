//! Market internals (breadth) analysis.
//!
//! Real breadth tickers are tried first with a short timeout. When fewer than
//! two answer, breadth is approximated from the fraction of broad index ETFs
//! trading up. The same thresholds score both paths.

use super::{ensure_finite, AnalysisContext, AnalysisError, Analyzer, Scored};
use crate::data::{FeedRequest, SectorUniverse};
use crate::domain::{AnalyzerResult, DataSource, Quote};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where the breadth figures came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BreadthQuality {
    Real,
    IndexProxy { indices: usize },
    StaticFallback,
}

impl fmt::Display for BreadthQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BreadthQuality::Real => write!(f, "REAL BREADTH DATA"),
            BreadthQuality::IndexProxy { indices } => write!(f, "INDEX PROXY ({indices} ETFs)"),
            BreadthQuality::StaticFallback => write!(f, "STATIC FALLBACK"),
        }
    }
}

/// One breadth indicator reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreadthReading {
    pub value: f64,
    pub signal: String,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InternalsAnalysis {
    pub tick: BreadthReading,
    pub trin: BreadthReading,
    pub nyad: BreadthReading,
    pub vold: BreadthReading,
    pub quality: BreadthQuality,
    pub breadth_score: f64,
    pub result: AnalyzerResult,
}

impl Scored for InternalsAnalysis {
    fn result(&self) -> &AnalyzerResult {
        &self.result
    }
}

struct Scoring {
    points: f64,
    signal: &'static str,
    reason: String,
}

fn scoring(points: f64, signal: &'static str, reason: String) -> Scoring {
    Scoring {
        points,
        signal,
        reason,
    }
}

fn tick_scoring(v: f64) -> Scoring {
    if v >= 1000.0 {
        scoring(2.0, "EXTREME BULLISH", format!("$TICK {v:.0} ≥ +1000 (Extreme Bullish) = +2.0 pts"))
    } else if v >= 200.0 {
        scoring(1.0, "MODERATE BULLISH", format!("$TICK {v:.0} ≥ +200 (Moderate Bullish) = +1.0 pts"))
    } else if v <= -1000.0 {
        scoring(-2.0, "EXTREME BEARISH", format!("$TICK {v:.0} ≤ -1000 (Extreme Bearish) = -2.0 pts"))
    } else if v <= -200.0 {
        scoring(-1.0, "MODERATE BEARISH", format!("$TICK {v:.0} ≤ -200 (Moderate Bearish) = -1.0 pts"))
    } else {
        scoring(0.0, "NEUTRAL", format!("$TICK {v:.0} in neutral range = 0.0 pts"))
    }
}

/// Low TRIN is bullish.
fn trin_scoring(v: f64) -> Scoring {
    if v <= 0.8 {
        scoring(1.0, "BULLISH", format!("$TRIN {v:.3} ≤ 0.8 (Bullish volume flow) = +1.0 pts"))
    } else if v >= 1.2 {
        scoring(-1.0, "BEARISH", format!("$TRIN {v:.3} ≥ 1.2 (Bearish volume flow) = -1.0 pts"))
    } else {
        scoring(0.0, "NEUTRAL", format!("$TRIN {v:.3} neutral = 0.0 pts"))
    }
}

fn nyad_scoring(v: f64) -> Scoring {
    if v > 1000.0 {
        scoring(1.0, "BULLISH", format!("NYAD {v:.0} > +1000 = +1.0 pts"))
    } else if v < -1000.0 {
        scoring(-1.0, "BEARISH", format!("NYAD {v:.0} < -1000 = -1.0 pts"))
    } else {
        scoring(0.0, "NEUTRAL", format!("NYAD {v:.0} neutral = 0.0 pts"))
    }
}

fn vold_scoring(v: f64) -> Scoring {
    if v > 1.5 {
        scoring(1.0, "BULLISH", format!("Volume Flow {v:.2} > 1.5 = +1.0 pts"))
    } else if v < 0.7 {
        scoring(-1.0, "BEARISH", format!("Volume Flow {v:.2} < 0.7 = -1.0 pts"))
    } else {
        scoring(0.0, "NEUTRAL", format!("Volume Flow {v:.2} neutral = 0.0 pts"))
    }
}

fn signal_from_points(points: f64) -> &'static str {
    if points >= 1.0 {
        "BULLISH"
    } else if points <= -1.0 {
        "BEARISH"
    } else {
        "NEUTRAL"
    }
}

/// Breadth-like values derived from an advancing fraction in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProxyBreadth {
    pub tick: f64,
    pub trin: f64,
    pub nyad: f64,
    pub vold: f64,
}

impl ProxyBreadth {
    pub fn from_advance_fraction(fraction: f64) -> Self {
        let a = (fraction - 0.5) * 2.0;
        Self {
            tick: a * 1000.0,
            trin: if a > -0.9 { 1.0 / (1.0 + a) } else { 2.0 },
            nyad: a * 2000.0,
            vold: 1.0 + a,
        }
    }
}

/// Volume flow estimated from TICK and TRIN when no VOLD feed exists.
pub fn estimate_volume_flow(tick: Option<f64>, trin: Option<f64>) -> f64 {
    match (tick, trin) {
        (Some(tick), Some(trin)) if tick > 500.0 && trin < 0.9 => 1.8,
        (Some(tick), Some(trin)) if tick < -500.0 && trin > 1.1 => 0.4,
        _ => 1.0,
    }
}

/// Score index-proxy breadth. Every reason is prefixed with the proxy label.
pub fn score_index_proxy(breadth: ProxyBreadth, indices: usize, source: DataSource) -> InternalsAnalysis {
    let label = format!("INDEX PROXY ({indices} ETFs)");
    let source_label = format!("Index Proxy ({indices} ETFs)");
    let mut result = AnalyzerResult::new(source);
    let mut reading = |name: &str, value: f64, s: Scoring| {
        result.push(name, s.points, format!("{label}: {}", s.reason));
        BreadthReading {
            value,
            signal: s.signal.to_string(),
            source: source_label.clone(),
        }
    };
    let tick = reading("tick", breadth.tick, tick_scoring(breadth.tick));
    let trin = reading("trin", breadth.trin, trin_scoring(breadth.trin));
    let nyad = reading("nyad", breadth.nyad, nyad_scoring(breadth.nyad));
    let vold = reading("vold", breadth.vold, vold_scoring(breadth.vold));
    InternalsAnalysis {
        tick,
        trin,
        nyad,
        vold,
        quality: BreadthQuality::IndexProxy { indices },
        breadth_score: result.total_points(),
        result,
    }
}

/// Real breadth values by indicator. Absent indicators score zero.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RealBreadth {
    pub tick: Option<f64>,
    pub trin: Option<f64>,
    pub nyad: Option<f64>,
}

impl RealBreadth {
    pub fn found(&self) -> usize {
        [self.tick, self.trin, self.nyad]
            .iter()
            .filter(|v| v.is_some())
            .count()
    }
}

pub fn score_real_breadth(breadth: RealBreadth, source: DataSource) -> InternalsAnalysis {
    let mut result = AnalyzerResult::new(source);
    let mut reading = |name: &str, value: Option<f64>, default: f64, score: fn(f64) -> Scoring| {
        let Some(v) = value else {
            result.push(name, 0.0, format!("{name} unavailable"));
            return BreadthReading {
                value: default,
                signal: "NEUTRAL".into(),
                source: "Unavailable".into(),
            };
        };
        let s = score(v);
        result.push(name, s.points, s.reason);
        BreadthReading {
            value: v,
            signal: signal_from_points(s.points).to_string(),
            source: source.to_string(),
        }
    };
    let tick = reading("tick", breadth.tick, 0.0, tick_scoring);
    let trin = reading("trin", breadth.trin, 1.0, trin_scoring);
    let nyad = reading("nyad", breadth.nyad, 0.0, nyad_scoring);

    let flow = estimate_volume_flow(breadth.tick, breadth.trin);
    let s = vold_scoring(flow);
    result.push("vold", s.points, s.reason);
    let vold = BreadthReading {
        value: flow,
        signal: s.signal.to_string(),
        source: "Estimated from real breadth".into(),
    };

    InternalsAnalysis {
        tick,
        trin,
        nyad,
        vold,
        quality: BreadthQuality::Real,
        breadth_score: result.total_points(),
        result,
    }
}

/// Fixed mildly bearish estimate, with values shaped by the sector proxy table.
pub fn static_fallback(sectors: &SectorUniverse) -> InternalsAnalysis {
    let total = sectors.len().max(1) as f64;
    let positive = sectors
        .etfs
        .iter()
        .filter(|s| s.proxy_change_pct > 0.0)
        .count() as f64;
    let ratio = positive / total;
    let leaning = if ratio < 0.4 { "BEARISH" } else { "NEUTRAL" };
    let reading = |value: f64, signal: &str| BreadthReading {
        value,
        signal: signal.to_string(),
        source: "Static Fallback".into(),
    };

    let result = AnalyzerResult::new(DataSource::Proxy)
        .with_component("tick", -0.5, "STATIC FALLBACK: Bearish proxy estimate")
        .with_component("trin", 0.0, "STATIC FALLBACK: Neutral proxy estimate")
        .with_component("nyad", -1.0, "STATIC FALLBACK: Bearish proxy estimate")
        .with_component("vold", -0.5, "STATIC FALLBACK: Bearish proxy estimate");
    InternalsAnalysis {
        tick: reading((ratio - 0.5) * 2000.0, leaning),
        trin: reading(1.0 / (0.8 + ratio * 0.4), "NEUTRAL"),
        nyad: reading((ratio - 0.5) * 4000.0, leaning),
        vold: reading(0.3 + ratio * 0.4, leaning),
        quality: BreadthQuality::StaticFallback,
        breadth_score: result.total_points(),
        result,
    }
}

fn finite_last(quotes: &[Quote], symbol: &str) -> Option<f64> {
    quotes
        .iter()
        .find(|q| q.symbol == symbol)
        .map(|q| q.last)
        .filter(|v| v.is_finite())
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InternalsAnalyzer;

impl InternalsAnalyzer {
    fn real_breadth(&self, ctx: &AnalysisContext<'_>) -> Option<(RealBreadth, DataSource)> {
        let symbols = &ctx.config.internals.breadth_symbols;
        let [tick, trin, nyad] = symbols.as_slice() else {
            debug!("internals: expected three breadth symbols, got {}", symbols.len());
            return None;
        };
        let resolved = ctx.resolver.resolve_live_within(
            &FeedRequest::quotes(symbols),
            ctx.config.feeds.breadth_timeout(),
            |payload, _| {
                let quotes = payload.into_quotes()?;
                let breadth = RealBreadth {
                    tick: finite_last(&quotes, tick),
                    trin: finite_last(&quotes, trin),
                    nyad: finite_last(&quotes, nyad),
                };
                (breadth.found() >= 2).then_some(breadth)
            },
        )?;
        Some((resolved.value, resolved.source))
    }

    fn index_proxy(&self, ctx: &AnalysisContext<'_>) -> Option<(usize, usize, DataSource)> {
        let symbols = &ctx.config.internals.index_symbols;
        let resolved = ctx
            .resolver
            .resolve_live(&FeedRequest::quotes(symbols), |payload, _| {
                let usable: Vec<Quote> = payload
                    .into_quotes()?
                    .into_iter()
                    .filter(|q| symbols.contains(&q.symbol) && q.change_pct.is_finite())
                    .collect();
                if usable.is_empty() {
                    return None;
                }
                let advancing = usable.iter().filter(|q| q.advancing()).count();
                Some((advancing, usable.len()))
            })?;
        let (advancing, total) = resolved.value;
        Some((advancing, total, resolved.source))
    }
}

impl Analyzer for InternalsAnalyzer {
    type Output = InternalsAnalysis;

    fn name(&self) -> &'static str {
        "internals"
    }

    fn try_analyze(&self, ctx: &AnalysisContext<'_>) -> Result<InternalsAnalysis, AnalysisError> {
        if let Some((breadth, source)) = self.real_breadth(ctx) {
            debug!("internals: real breadth ({} indicators)", breadth.found());
            return Ok(score_real_breadth(breadth, source));
        }

        match self.index_proxy(ctx) {
            Some((advancing, total, source)) => {
                let fraction = advancing as f64 / total as f64;
                let breadth = ProxyBreadth::from_advance_fraction(fraction);
                ensure_finite(
                    "index proxy breadth",
                    &[breadth.tick, breadth.trin, breadth.nyad, breadth.vold],
                )?;
                debug!("internals: index proxy {advancing}/{total} advancing");
                Ok(score_index_proxy(breadth, total, source))
            }
            None => {
                debug!("internals: no live breadth or index quotes, static fallback");
                Ok(static_fallback(&ctx.config.sectors))
            }
        }
    }

    fn fallback(&self, ctx: &AnalysisContext<'_>, err: &AnalysisError) -> InternalsAnalysis {
        let mut out = static_fallback(&ctx.config.sectors);
        out.result = out.result.with_error(err.to_string());
        out
    }
}

//! Sector rotation analysis: relative strength of the sector ETFs against the
//! underlying, weighted by each sector's index influence.

use super::{AnalysisContext, AnalysisError, Analyzer, Scored};
use crate::data::yahoo::quote_from_bars;
use crate::data::{BarInterval, FeedRequest, SectorSpec};
use crate::domain::{AnalyzerResult, DataSource, Quote};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RotationSignal {
    RiskOn,
    RiskOff,
    Neutral,
}

impl RotationSignal {
    pub fn from_leadership(score: i32) -> Self {
        if score >= 2 {
            RotationSignal::RiskOn
        } else if score <= -2 {
            RotationSignal::RiskOff
        } else {
            RotationSignal::Neutral
        }
    }

    fn logic(self, score: i32) -> String {
        match self {
            RotationSignal::RiskOn => {
                format!("Leadership score {score} ≥ 2 = RISK ON (growth/cyclical leading)")
            }
            RotationSignal::RiskOff => {
                format!("Leadership score {score} ≤ -2 = RISK OFF (defensive leading)")
            }
            RotationSignal::Neutral => {
                format!("Leadership score {score} in neutral range (-2 to +2) = NEUTRAL")
            }
        }
    }
}

impl fmt::Display for RotationSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RotationSignal::RiskOn => "RISK ON",
            RotationSignal::RiskOff => "RISK OFF",
            RotationSignal::Neutral => "NEUTRAL",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorReading {
    pub symbol: String,
    pub name: String,
    pub change_pct: f64,
    pub relative_strength: f64,
    pub volume_ratio: f64,
    pub strength_score: i32,
    pub weight: f64,
    pub weighted_score: f64,
    pub reason: String,
    pub source: DataSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorAnalysis {
    pub benchmark_change_pct: f64,
    pub sectors: Vec<SectorReading>,
    pub leadership_score: i32,
    pub rotation: RotationSignal,
    pub leadership_calculation: String,
    pub rotation_logic: String,
    pub result: AnalyzerResult,
}

impl Scored for SectorAnalysis {
    fn result(&self) -> &AnalyzerResult {
        &self.result
    }
}

/// Bucket a sector's relative strength (percentage points versus the benchmark).
pub fn strength_score(relative_strength: f64, volume_ratio: f64) -> (i32, String) {
    let rs = relative_strength;
    if rs > 0.5 && volume_ratio > 1.2 {
        (
            2,
            format!("Strong leader: +{rs:.2}% vs benchmark, {volume_ratio:.1}x volume = +2 pts"),
        )
    } else if rs > 0.2 {
        (1, format!("Moderate leader: +{rs:.2}% vs benchmark = +1 pts"))
    } else if rs < -0.5 && volume_ratio > 1.2 {
        (
            -2,
            format!("Strong laggard: {rs:.2}% vs benchmark, {volume_ratio:.1}x volume = -2 pts"),
        )
    } else if rs < -0.2 {
        (-1, format!("Moderate laggard: {rs:.2}% vs benchmark = -1 pts"))
    } else {
        (0, format!("Neutral: {rs:.2}% vs benchmark = 0 pts"))
    }
}

/// Score one sector from its change and volume ratio.
pub fn read_sector(
    spec: &SectorSpec,
    change_pct: f64,
    volume_ratio: f64,
    benchmark_change_pct: f64,
    source: DataSource,
) -> SectorReading {
    let relative_strength = change_pct - benchmark_change_pct;
    let (strength_score, reason) = strength_score(relative_strength, volume_ratio);
    SectorReading {
        symbol: spec.symbol.clone(),
        name: spec.name.clone(),
        change_pct,
        relative_strength,
        volume_ratio,
        strength_score,
        weight: spec.weight,
        weighted_score: strength_score as f64 * spec.weight,
        reason,
        source,
    }
}

/// Combine sector readings into the analyzer output.
pub fn summarize(benchmark_change_pct: f64, sectors: Vec<SectorReading>, source: DataSource) -> SectorAnalysis {
    let mut result = AnalyzerResult::new(source);
    for s in &sectors {
        result.push(
            s.symbol.as_str(),
            s.weighted_score,
            format!("{} ({}): {} × {:.2} weight", s.name, s.symbol, s.reason, s.weight),
        );
    }
    let strong = sectors.iter().filter(|s| s.strength_score >= 2).count() as i32;
    let weak = sectors.iter().filter(|s| s.strength_score <= -2).count() as i32;
    let leadership_score = strong - weak;
    let rotation = RotationSignal::from_leadership(leadership_score);
    SectorAnalysis {
        benchmark_change_pct,
        leadership_calculation: format!(
            "Strong sectors ({strong}) - Weak sectors ({weak}) = {leadership_score}"
        ),
        rotation_logic: rotation.logic(leadership_score),
        sectors,
        leadership_score,
        rotation,
        result,
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SectorAnalyzer;

impl SectorAnalyzer {
    fn benchmark_change(&self, ctx: &AnalysisContext<'_>) -> (f64, DataSource) {
        let symbol = ctx.underlying();
        let resolved = ctx.resolver.resolve_with(
            &FeedRequest::quote(symbol),
            |payload, _| {
                payload
                    .into_quotes()?
                    .into_iter()
                    .find(|q| q.symbol == symbol && q.change_pct.is_finite())
                    .map(|q| q.change_pct)
            },
            |_| ctx.config.fallbacks.proxy_benchmark_change_pct,
        );
        (resolved.value, resolved.source)
    }

    /// Bulk quotes for every sector in one request.
    fn bulk_quotes(&self, ctx: &AnalysisContext<'_>) -> (HashMap<String, Quote>, DataSource) {
        let symbols = ctx.config.sectors.symbols();
        ctx.resolver
            .resolve_live(&FeedRequest::quotes(&symbols), |payload, _| {
                let quotes: HashMap<String, Quote> = payload
                    .into_quotes()?
                    .into_iter()
                    .filter(|q| q.change_pct.is_finite())
                    .map(|q| (q.symbol.clone(), q))
                    .collect();
                (!quotes.is_empty()).then_some(quotes)
            })
            .map(|r| (r.value, r.source))
            .unwrap_or_else(|| (HashMap::new(), DataSource::Proxy))
    }

    /// Change and volume ratio for one sector: bulk quote, then its own
    /// intraday history, then the proxy table.
    fn sector_figures(
        &self,
        ctx: &AnalysisContext<'_>,
        spec: &SectorSpec,
        bulk: &HashMap<String, Quote>,
        bulk_source: DataSource,
    ) -> (f64, f64, DataSource) {
        if let Some(q) = bulk.get(&spec.symbol) {
            return (q.change_pct, q.volume_ratio(1.0), bulk_source);
        }
        let resolved = ctx.resolver.resolve_with(
            &FeedRequest::intraday(&spec.symbol, BarInterval::FiveMinute),
            |payload, _| quote_from_bars(&spec.symbol, &payload.into_bars()?),
            |proxy| proxy.quote(&spec.symbol, &ctx.now),
        );
        debug!("sector {}: resolved from {}", spec.symbol, resolved.source);
        let q = resolved.value;
        (q.change_pct, q.volume_ratio(1.0), resolved.source)
    }
}

impl Analyzer for SectorAnalyzer {
    type Output = SectorAnalysis;

    fn name(&self) -> &'static str {
        "sector"
    }

    fn try_analyze(&self, ctx: &AnalysisContext<'_>) -> Result<SectorAnalysis, AnalysisError> {
        let universe = &ctx.config.sectors;
        if universe.is_empty() {
            return Err(AnalysisError::InsufficientData {
                what: "sector universe",
                needed: 1,
                available: 0,
            });
        }

        let (benchmark, mut source) = self.benchmark_change(ctx);
        let (bulk, bulk_source) = self.bulk_quotes(ctx);

        let mut sectors = Vec::with_capacity(universe.len());
        for spec in &universe.etfs {
            let (change, volume_ratio, tier) = self.sector_figures(ctx, spec, &bulk, bulk_source);
            if !(change.is_finite() && volume_ratio.is_finite()) {
                return Err(AnalysisError::NonFinite("sector change"));
            }
            source = source.worst(tier);
            sectors.push(read_sector(spec, change, volume_ratio, benchmark, tier));
        }
        Ok(summarize(benchmark, sectors, source))
    }

    fn fallback(&self, ctx: &AnalysisContext<'_>, err: &AnalysisError) -> SectorAnalysis {
        let result = AnalyzerResult::new(DataSource::Proxy)
            .with_component("sectors", 0.0, "Sector data unavailable, neutral estimate")
            .with_error(err.to_string());
        SectorAnalysis {
            benchmark_change_pct: ctx.config.fallbacks.proxy_benchmark_change_pct,
            sectors: Vec::new(),
            leadership_score: 0,
            rotation: RotationSignal::Neutral,
            leadership_calculation: "Using proxy estimates".into(),
            rotation_logic: "Neutral due to data limitations".into(),
            result,
        }
    }
}

//! Analyzers — each reduces noisy, possibly missing market data into a bounded
//! points score with a human-readable breakdown.
//!
//! Analyzers are independent: each resolves its own inputs through the shared
//! [`DataResolver`] and never sees another analyzer's output. The aggregator in
//! [`crate::signals`] is the only place their scores meet.
//!
//! # Failure contract
//! [`Analyzer::analyze`] never fails. Internal problems surface from
//! [`Analyzer::try_analyze`] as an [`AnalysisError`], which `analyze` converts
//! into the analyzer's fixed fallback result with the error text recorded on it.

pub mod gap;
pub mod internals;
pub mod sector;
pub mod technical;
pub mod trend;

pub use gap::{GapAnalysis, GapAnalyzer, GapCategory, Significance, VwapStatus};
pub use internals::{BreadthQuality, BreadthReading, InternalsAnalysis, InternalsAnalyzer};
pub use sector::{RotationSignal, SectorAnalysis, SectorAnalyzer, SectorReading};
pub use technical::{TechnicalAnalysis, TechnicalAnalyzer, YesterdayLevels};
pub use trend::{DynamicVwap, MomentumShift, TrendAnalysis, TrendAnalyzer, TrendRegime};

use crate::config::EngineConfig;
use crate::data::DataResolver;
use crate::domain::AnalyzerResult;
use crate::window::MarketTime;
use log::warn;
use thiserror::Error;

/// Everything an analyzer may read during one cycle.
#[derive(Clone, Copy)]
pub struct AnalysisContext<'a> {
    pub resolver: &'a DataResolver,
    pub config: &'a EngineConfig,
    pub now: MarketTime,
}

impl<'a> AnalysisContext<'a> {
    pub fn new(resolver: &'a DataResolver, config: &'a EngineConfig, now: MarketTime) -> Self {
        Self {
            resolver,
            config,
            now,
        }
    }

    pub fn underlying(&self) -> &str {
        &self.config.underlying.symbol
    }
}

/// Analyzer-internal failures. Never escapes [`Analyzer::analyze`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    #[error("insufficient data for {what}: need {needed}, have {available}")]
    InsufficientData {
        what: &'static str,
        needed: usize,
        available: usize,
    },

    #[error("non-finite value in {0}")]
    NonFinite(&'static str),
}

/// Returns `Err(NonFinite)` unless every value is finite.
pub(crate) fn ensure_finite(what: &'static str, values: &[f64]) -> Result<(), AnalysisError> {
    if values.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(AnalysisError::NonFinite(what))
    }
}

/// An analyzer output that carries an [`AnalyzerResult`].
pub trait Scored {
    fn result(&self) -> &AnalyzerResult;
}

/// A single scoring stage of the entry pipeline.
pub trait Analyzer: Send + Sync {
    type Output: Scored;

    /// Human-readable name (e.g., "gap").
    fn name(&self) -> &'static str;

    /// Score the current market. May fail; callers should prefer [`Analyzer::analyze`].
    fn try_analyze(&self, ctx: &AnalysisContext<'_>) -> Result<Self::Output, AnalysisError>;

    /// The fixed result used when `try_analyze` fails. Tagged `Proxy`.
    fn fallback(&self, ctx: &AnalysisContext<'_>, err: &AnalysisError) -> Self::Output;

    /// Never-failing boundary.
    fn analyze(&self, ctx: &AnalysisContext<'_>) -> Self::Output {
        let err = match self.try_analyze(ctx) {
            Ok(out) if out.result().total_points().is_finite() => return out,
            Ok(_) => AnalysisError::NonFinite("total points"),
            Err(err) => err,
        };
        warn!("{} analyzer fell back: {err}", self.name());
        self.fallback(ctx, &err)
    }
}

//! Entry points: one full analysis cycle, and one exit evaluation.
//!
//! Both are functions of the clock and whatever the resolver can reach. They
//! never fail: every analyzer degrades to its fallback, and the report carries
//! a data-quality tag so callers can discount proxy-driven results.

use crate::analyzers::{
    AnalysisContext, Analyzer, GapAnalysis, GapAnalyzer, InternalsAnalysis, InternalsAnalyzer,
    SectorAnalysis, SectorAnalyzer, Scored, TechnicalAnalysis, TechnicalAnalyzer, TrendAnalysis,
    TrendAnalyzer,
};
use crate::config::EngineConfig;
use crate::data::{
    CircuitBreaker, DataError, DataResolver, FixtureFeed, MarketFixture, ProxyFeed, RateLimiter,
    TradierFeed, YahooFeed,
};
use crate::domain::{DataSource, PositionRecord, PriceTargets};
use crate::fingerprint::Fingerprint;
use crate::premium::{premium_efficiency, PremiumEfficiency};
use crate::signals::exit::{score_exit, value_position, ExitClock, ExitEvaluation};
use crate::signals::{final_decision, AnalyzerScores, Decision};
use crate::window::{check_trading_window, MarketTime};
use chrono::{DateTime, FixedOffset};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Where live market data comes from.
#[derive(Debug, Clone)]
pub enum FeedMode {
    /// Tradier (when a token is configured) then Yahoo.
    Live,
    /// No live feeds; everything comes from the proxy tier.
    Offline,
    /// Replay a captured market state as the primary feed.
    Fixture(MarketFixture),
}

/// Build the three-tier resolver for `mode`.
pub fn build_resolver(config: &EngineConfig, mode: FeedMode) -> Result<DataResolver, DataError> {
    let proxy = ProxyFeed::new(
        &config.underlying.symbol,
        config.fallbacks,
        config.sectors.clone(),
    );
    let resolver = DataResolver::new(proxy, config.cache.ttl(), config.feeds.request_timeout());

    match mode {
        FeedMode::Offline => Ok(resolver),
        FeedMode::Fixture(fixture) => Ok(resolver.with_primary(Arc::new(FixtureFeed::new(
            "fixture",
            DataSource::Primary,
            fixture,
        )))),
        FeedMode::Live => {
            let mut resolver = resolver;
            match config.feeds.resolved_token() {
                Some(token) => {
                    let breaker = Arc::new(CircuitBreaker::from_config(&config.breaker));
                    let tradier = TradierFeed::new(config.feeds.tradier_url(), &token, breaker)?;
                    resolver = resolver.with_primary(Arc::new(tradier));
                }
                None => warn!("no Tradier token configured; primary feed disabled"),
            }
            let limiter = RateLimiter::new(
                config.rate_limit,
                Duration::from_secs_f64(config.feeds.retry_base_delay_secs.max(0.0)),
            );
            let yahoo = YahooFeed::new(
                &config.feeds.yahoo_base_url,
                Arc::new(limiter),
                config.feeds.retries,
            )?;
            Ok(resolver.with_secondary(Arc::new(yahoo)))
        }
    }
}

/// Everything one analysis cycle produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionReport {
    pub symbol: String,
    pub evaluated_at: DateTime<FixedOffset>,
    pub decision: Decision,
    pub gap: GapAnalysis,
    pub internals: InternalsAnalysis,
    pub sectors: SectorAnalysis,
    pub technicals: TechnicalAnalysis,
    pub trend: TrendAnalysis,
    /// Internals total scaled by the time-of-day breadth reliability. Advisory only.
    pub weighted_breadth_score: f64,
    pub targets: PriceTargets,
    #[serde(default)]
    pub premium: Option<PremiumEfficiency>,
    /// Worst tier across the five analyzers.
    pub data_quality: DataSource,
}

impl DecisionReport {
    pub fn fingerprint(&self) -> Result<Fingerprint, serde_json::Error> {
        Fingerprint::of(self)
    }

    /// Analyzer results that were served (at least partly) by the proxy tier.
    pub fn proxied_analyzers(&self) -> Vec<&'static str> {
        [
            ("gap", self.gap.result()),
            ("internals", self.internals.result()),
            ("sectors", self.sectors.result()),
            ("technicals", self.technicals.result()),
            ("trend", self.trend.result()),
        ]
        .into_iter()
        .filter(|(_, r)| !r.data_source().is_live())
        .map(|(name, _)| name)
        .collect()
    }
}

/// Run all five analyzers, aggregate and gate. Analyzers run sequentially.
pub fn run_full_analysis(
    resolver: &DataResolver,
    config: &EngineConfig,
    now: MarketTime,
) -> DecisionReport {
    let ctx = AnalysisContext::new(resolver, config, now);

    let gap = GapAnalyzer.analyze(&ctx);
    let internals = InternalsAnalyzer.analyze(&ctx);
    let sectors = SectorAnalyzer.analyze(&ctx);
    let technicals = TechnicalAnalyzer.analyze(&ctx);
    let trend = TrendAnalyzer.analyze(&ctx);

    let scores = AnalyzerScores {
        gap: gap.result(),
        internals: internals.result(),
        sectors: sectors.result(),
        technicals: technicals.result(),
        trend: trend.result(),
    };
    let data_quality = [scores.gap, scores.internals, scores.sectors, scores.technicals, scores.trend]
        .iter()
        .map(|r| r.data_source())
        .fold(DataSource::Primary, DataSource::worst);

    let decision = final_decision(&scores, config.decision, check_trading_window(&now));
    let weighted_breadth_score = internals.result.total_points() * decision.window.breadth.weight;
    let targets = PriceTargets::project(
        decision.breakdown.bullish_total,
        decision.breakdown.bearish_total,
        technicals.price,
    );
    let premium = premium_efficiency(resolver, config, &now);

    info!(
        "{} analysis: {} (raw {}, net {:+.1}, {}), data {}",
        config.underlying.symbol,
        decision.decision,
        decision.raw_signal,
        decision.breakdown.net,
        decision.window.regime,
        data_quality
    );

    DecisionReport {
        symbol: config.underlying.symbol.clone(),
        evaluated_at: now.fixed_offset(),
        decision,
        gap,
        internals,
        sectors,
        technicals,
        trend,
        weighted_breadth_score,
        targets,
        premium,
        data_quality,
    }
}

/// Value and score an open position.
pub fn evaluate_exit(
    resolver: &DataResolver,
    config: &EngineConfig,
    position: &PositionRecord,
    now: MarketTime,
) -> ExitEvaluation {
    let valuation = value_position(resolver, config, position, &now);
    let evaluation = score_exit(position, &valuation, ExitClock::at(position, &now));
    info!(
        "exit check: {} ({}), score {}/10, P&L {:+.1}% via {}",
        evaluation.signal,
        evaluation.urgency,
        evaluation.exit_score,
        evaluation.pnl_pct,
        evaluation.calculation_method
    );
    evaluation
}

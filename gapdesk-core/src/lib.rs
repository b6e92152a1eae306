//! GapDesk Core — a rule-based 0DTE signal engine for an index ETF.
//!
//! This crate contains:
//! - Domain types (bars, quotes, option contracts, analyzer results, positions)
//! - A three-tier data resolver (primary feed, secondary feed, static proxy)
//! - Five independent analyzers: gap, internals, sectors, technicals, trend
//! - The entry aggregator with its trading-window gate
//! - The exit evaluator for open positions
//! - Price targets, premium efficiency and report fingerprints

pub mod analyzers;
pub mod config;
pub mod data;
pub mod domain;
pub mod engine;
pub mod fingerprint;
pub mod indicators;
pub mod premium;
pub mod signals;
pub mod window;

pub use config::{ConfigError, EngineConfig};
pub use engine::{build_resolver, evaluate_exit, run_full_analysis, DecisionReport, FeedMode};
pub use window::{check_trading_window, market_now, MarketTime, TradingWindowState, WindowRegime};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: the resolver, its feeds and every report type can
    /// cross threads.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<data::DataResolver>();
        require_sync::<data::DataResolver>();
        require_send::<data::TradierFeed>();
        require_sync::<data::TradierFeed>();
        require_send::<data::YahooFeed>();
        require_sync::<data::YahooFeed>();
        require_send::<data::FixtureFeed>();
        require_sync::<data::FixtureFeed>();
        require_send::<data::RateLimiter>();
        require_sync::<data::RateLimiter>();
        require_send::<data::CircuitBreaker>();
        require_sync::<data::CircuitBreaker>();

        require_send::<DecisionReport>();
        require_sync::<DecisionReport>();
        require_send::<signals::ExitEvaluation>();
        require_sync::<signals::ExitEvaluation>();
        require_send::<domain::PositionRecord>();
        require_sync::<domain::PositionRecord>();
        require_send::<EngineConfig>();
        require_sync::<EngineConfig>();
    }

    #[test]
    fn analyzers_are_send_sync() {
        fn check<A: analyzers::Analyzer>(_: &A) {}
        check(&analyzers::GapAnalyzer);
        check(&analyzers::InternalsAnalyzer);
        check(&analyzers::SectorAnalyzer);
        check(&analyzers::TechnicalAnalyzer);
        check(&analyzers::TrendAnalyzer);
    }
}

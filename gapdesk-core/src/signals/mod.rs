//! Decisions built on top of the analyzers.
//!
//! - `entry`: aggregate analyzer scores into a gated trade decision.
//! - `exit`: score an open position for exit.
//! - `targets`: project session price targets from the point totals.
//!
//! Entry and exit never feed into each other.

pub mod entry;
pub mod exit;
pub mod targets;

pub use entry::{classify, final_decision, gate, AnalyzerScores, Decision, PointsBreakdown};
pub use exit::{
    score_exit, value_position, ExitClock, ExitEvaluation, ExitSignal, Urgency, Valuation,
    ValuationMethod,
};

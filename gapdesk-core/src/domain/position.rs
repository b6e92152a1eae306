//! The externally owned open-position record read by the exit evaluator.

use super::signal::{Direction, Signal};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeType {
    Options,
    Stock,
}

/// Projected underlying price levels for the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceTargets {
    pub upside_target: f64,
    pub downside_target: f64,
    /// Likelihood of the upside target, in percent.
    #[serde(default = "even_odds")]
    pub upside_probability: f64,
    #[serde(default = "even_odds")]
    pub downside_probability: f64,
    #[serde(default)]
    pub reasoning: Vec<String>,
}

fn even_odds() -> f64 {
    50.0
}

impl PriceTargets {
    /// Symmetric ±1% levels around an entry price.
    pub fn around(entry_price: f64) -> Self {
        Self {
            upside_target: entry_price * 1.01,
            downside_target: entry_price * 0.99,
            upside_probability: 50.0,
            downside_probability: 50.0,
            reasoning: Vec::new(),
        }
    }
}

/// An open position. Replaced wholesale, never mutated field by field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionRecord {
    /// The entry decision this position was opened on.
    pub signal: Signal,
    pub entry_price: f64,
    pub entry_time: DateTime<Utc>,
    pub trade_type: TradeType,
    #[serde(default)]
    pub strike: Option<f64>,
    /// Entry price of the underlying, for option positions.
    #[serde(default)]
    pub underlying_entry: Option<f64>,
    #[serde(default)]
    pub targets: Option<PriceTargets>,
}

impl PositionRecord {
    /// Short positions are those opened on a SHORT signal; anything else is treated as long.
    pub fn direction(&self) -> Direction {
        self.signal.direction().unwrap_or(Direction::Long)
    }

    pub fn is_short(&self) -> bool {
        self.direction() == Direction::Short
    }

    /// Recorded targets, or ±1% around the underlying entry price.
    pub fn targets_or_default(&self) -> PriceTargets {
        self.targets.clone().unwrap_or_else(|| {
            PriceTargets::around(self.underlying_entry.unwrap_or(self.entry_price))
        })
    }
}

//! Option contracts as returned by an options-chain lookup.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    Call,
    Put,
}

impl fmt::Display for OptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionType::Call => write!(f, "call"),
            OptionType::Put => write!(f, "put"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Greeks {
    #[serde(default)]
    pub delta: f64,
    #[serde(default)]
    pub gamma: f64,
    #[serde(default)]
    pub theta: f64,
    #[serde(default)]
    pub vega: f64,
    #[serde(default)]
    pub mid_iv: f64,
}

/// A single contract in an options chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionContract {
    pub symbol: String,
    pub strike: f64,
    pub option_type: OptionType,
    pub expiration: NaiveDate,
    #[serde(default)]
    pub bid: f64,
    #[serde(default)]
    pub ask: f64,
    #[serde(default)]
    pub last: Option<f64>,
    #[serde(default)]
    pub greeks: Option<Greeks>,
}

impl OptionContract {
    /// Mid price when both sides are quoted, otherwise the last trade.
    pub fn mid(&self) -> Option<f64> {
        if self.bid > 0.0 && self.ask > 0.0 {
            Some((self.bid + self.ask) / 2.0)
        } else {
            self.last.filter(|p| p.is_finite() && *p > 0.0)
        }
    }

    pub fn spread(&self) -> f64 {
        self.ask - self.bid
    }

    /// Strike comparison tolerant of feed rounding (strikes are quoted in cents).
    pub fn matches(&self, strike: f64, option_type: OptionType) -> bool {
        self.option_type == option_type && (self.strike - strike).abs() < 0.005
    }
}

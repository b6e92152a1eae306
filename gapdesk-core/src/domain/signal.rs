//! Categorical entry signals and confidence levels.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Side of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Long,
    Short,
}

/// Raw classification of a net score, before the trading-window gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Signal {
    #[serde(rename = "STRONG LONG")]
    StrongLong,
    #[serde(rename = "MODERATE LONG")]
    ModerateLong,
    #[serde(rename = "STRONG SHORT")]
    StrongShort,
    #[serde(rename = "MODERATE SHORT")]
    ModerateShort,
    #[serde(rename = "NO TRADE")]
    NoTrade,
}

impl Signal {
    pub fn direction(self) -> Option<Direction> {
        match self {
            Signal::StrongLong | Signal::ModerateLong => Some(Direction::Long),
            Signal::StrongShort | Signal::ModerateShort => Some(Direction::Short),
            Signal::NoTrade => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Signal::StrongLong => "STRONG LONG",
            Signal::ModerateLong => "MODERATE LONG",
            Signal::StrongShort => "STRONG SHORT",
            Signal::ModerateShort => "MODERATE SHORT",
            Signal::NoTrade => "NO TRADE",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Gated decision: either the raw signal or a timing override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeDecision {
    #[serde(rename = "STRONG LONG")]
    StrongLong,
    #[serde(rename = "MODERATE LONG")]
    ModerateLong,
    #[serde(rename = "STRONG SHORT")]
    StrongShort,
    #[serde(rename = "MODERATE SHORT")]
    ModerateShort,
    #[serde(rename = "NO TRADE")]
    NoTrade,
    #[serde(rename = "NO TRADE - OUTSIDE WINDOW")]
    NoTradeOutsideWindow,
}

impl TradeDecision {
    pub fn as_str(self) -> &'static str {
        match self {
            TradeDecision::StrongLong => "STRONG LONG",
            TradeDecision::ModerateLong => "MODERATE LONG",
            TradeDecision::StrongShort => "STRONG SHORT",
            TradeDecision::ModerateShort => "MODERATE SHORT",
            TradeDecision::NoTrade => "NO TRADE",
            TradeDecision::NoTradeOutsideWindow => "NO TRADE - OUTSIDE WINDOW",
        }
    }

    pub fn is_actionable(self) -> bool {
        !matches!(
            self,
            TradeDecision::NoTrade | TradeDecision::NoTradeOutsideWindow
        )
    }
}

impl From<Signal> for TradeDecision {
    fn from(signal: Signal) -> Self {
        match signal {
            Signal::StrongLong => TradeDecision::StrongLong,
            Signal::ModerateLong => TradeDecision::ModerateLong,
            Signal::StrongShort => TradeDecision::StrongShort,
            Signal::ModerateShort => TradeDecision::ModerateShort,
            Signal::NoTrade => TradeDecision::NoTrade,
        }
    }
}

impl fmt::Display for TradeDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Confidence::Low => write!(f, "LOW"),
            Confidence::Medium => write!(f, "MEDIUM"),
            Confidence::High => write!(f, "HIGH"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_serializes_as_label() {
        let json = serde_json::to_string(&Signal::StrongLong).unwrap();
        assert_eq!(json, "\"STRONG LONG\"");
        let gated = serde_json::to_string(&TradeDecision::NoTradeOutsideWindow).unwrap();
        assert_eq!(gated, "\"NO TRADE - OUTSIDE WINDOW\"");
    }

    #[test]
    fn signal_direction() {
        assert_eq!(Signal::ModerateShort.direction(), Some(Direction::Short));
        assert_eq!(Signal::NoTrade.direction(), None);
    }

    #[test]
    fn gated_decision_from_signal() {
        assert_eq!(TradeDecision::from(Signal::StrongShort).as_str(), "STRONG SHORT");
        assert!(!TradeDecision::NoTradeOutsideWindow.is_actionable());
    }
}

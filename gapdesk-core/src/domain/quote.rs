//! Point-in-time quote for a single symbol.

use serde::{Deserialize, Serialize};

/// Last-trade quote as surfaced by a market-data feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub last: f64,
    /// Absolute change versus the prior close.
    #[serde(default)]
    pub change: f64,
    /// Percent change versus the prior close.
    #[serde(default)]
    pub change_pct: f64,
    #[serde(default)]
    pub volume: u64,
    #[serde(default)]
    pub avg_volume: u64,
    #[serde(default)]
    pub bid: Option<f64>,
    #[serde(default)]
    pub ask: Option<f64>,
}

impl Quote {
    /// A quote is usable when it carries a finite, positive last price.
    pub fn is_usable(&self) -> bool {
        self.last.is_finite() && self.last > 0.0
    }

    /// Current volume relative to average volume, or `default` when the
    /// average is unknown.
    pub fn volume_ratio(&self, default: f64) -> f64 {
        if self.avg_volume > 0 {
            self.volume as f64 / self.avg_volume as f64
        } else {
            default
        }
    }

    pub fn advancing(&self) -> bool {
        self.change_pct > 0.0
    }
}

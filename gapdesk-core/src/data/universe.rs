//! Sector universe — the ETFs used for rotation analysis and their weights.
//!
//! Stored in the `[[sectors.etfs]]` tables of the engine config. Each entry
//! also carries the canned change/volume figures the proxy tier serves when no
//! live feed answers.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorSpec {
    pub symbol: String,
    pub name: String,
    /// Importance weight; weights across the universe sum to 1.0.
    pub weight: f64,
    pub proxy_change_pct: f64,
    pub proxy_volume_ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorUniverse {
    pub etfs: Vec<SectorSpec>,
}

impl Default for SectorUniverse {
    fn default() -> Self {
        Self::default_spdr()
    }
}

impl SectorUniverse {
    /// The nine Select Sector SPDR funds, weighted by typical index influence.
    pub fn default_spdr() -> Self {
        let table: [(&str, &str, f64, f64, f64); 9] = [
            ("XLK", "Technology", 0.25, -1.01, 1.5),
            ("XLF", "Financials", 0.15, -0.75, 1.1),
            ("XLV", "Healthcare", 0.15, 0.10, 1.0),
            ("XLY", "Consumer Discretionary", 0.12, -0.75, 1.4),
            ("XLI", "Industrials", 0.10, -0.96, 0.9),
            ("XLP", "Consumer Staples", 0.08, -0.17, 1.1),
            ("XLE", "Energy", 0.05, 0.15, 0.7),
            ("XLU", "Utilities", 0.05, -0.34, 0.9),
            ("XLRE", "Real Estate", 0.05, -1.71, 1.3),
        ];
        Self {
            etfs: table
                .iter()
                .map(|&(symbol, name, weight, change, volume)| SectorSpec {
                    symbol: symbol.into(),
                    name: name.into(),
                    weight,
                    proxy_change_pct: change,
                    proxy_volume_ratio: volume,
                })
                .collect(),
        }
    }

    pub fn get(&self, symbol: &str) -> Option<&SectorSpec> {
        self.etfs.iter().find(|s| s.symbol == symbol)
    }

    pub fn symbols(&self) -> Vec<&str> {
        self.etfs.iter().map(|s| s.symbol.as_str()).collect()
    }

    pub fn weight_sum(&self) -> f64 {
        self.etfs.iter().map(|s| s.weight).sum()
    }

    pub fn len(&self) -> usize {
        self.etfs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.etfs.is_empty()
    }
}

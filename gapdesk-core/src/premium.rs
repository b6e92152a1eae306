//! Premium efficiency: how far the underlying must move for the nearest
//! in-the-money 0DTE contracts to break even.
//!
//! Needs a live quote and a live chain. There is no proxy for option premiums,
//! so without both the analysis is simply absent.

use crate::config::EngineConfig;
use crate::data::{DataResolver, FeedRequest};
use crate::domain::{DataSource, OptionContract, OptionType};
use crate::window::MarketTime;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PremiumAssessment {
    Reasonable,
    Moderate,
    Large,
}

impl PremiumAssessment {
    /// Grade the percentage move needed to break even.
    pub fn of(move_needed_pct: f64) -> Self {
        if move_needed_pct <= 0.33 {
            PremiumAssessment::Reasonable
        } else if move_needed_pct <= 0.67 {
            PremiumAssessment::Moderate
        } else {
            PremiumAssessment::Large
        }
    }
}

impl fmt::Display for PremiumAssessment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PremiumAssessment::Reasonable => write!(f, "REASONABLE"),
            PremiumAssessment::Moderate => write!(f, "MODERATE"),
            PremiumAssessment::Large => write!(f, "LARGE"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakevenAnalysis {
    pub option_type: OptionType,
    pub strike: f64,
    pub premium: f64,
    pub breakeven_price: f64,
    pub move_needed_pct: f64,
    pub bid_ask_spread: f64,
    pub assessment: PremiumAssessment,
}

impl BreakevenAnalysis {
    /// `None` unless the contract has a two-sided market.
    pub fn for_contract(contract: &OptionContract, price: f64) -> Option<Self> {
        if !(contract.bid > 0.0 && contract.ask > 0.0) || price <= 0.0 {
            return None;
        }
        let premium = (contract.bid + contract.ask) / 2.0;
        let (breakeven_price, move_needed_pct) = match contract.option_type {
            OptionType::Call => {
                let be = contract.strike + premium;
                (be, (be - price) / price * 100.0)
            }
            OptionType::Put => {
                let be = contract.strike - premium;
                (be, (price - be) / price * 100.0)
            }
        };
        Some(Self {
            option_type: contract.option_type,
            strike: contract.strike,
            premium,
            breakeven_price,
            move_needed_pct,
            bid_ask_spread: contract.spread(),
            assessment: PremiumAssessment::of(move_needed_pct),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PremiumEfficiency {
    pub underlying_price: f64,
    pub call: Option<BreakevenAnalysis>,
    pub put: Option<BreakevenAnalysis>,
    pub source: DataSource,
}

/// Highest-strike call at or below `price` and lowest-strike put at or above it.
pub fn closest_itm(chain: &[OptionContract], price: f64) -> (Option<&OptionContract>, Option<&OptionContract>) {
    let call = chain
        .iter()
        .filter(|c| c.option_type == OptionType::Call && c.strike <= price)
        .max_by(|a, b| a.strike.total_cmp(&b.strike));
    let put = chain
        .iter()
        .filter(|c| c.option_type == OptionType::Put && c.strike >= price)
        .min_by(|a, b| a.strike.total_cmp(&b.strike));
    (call, put)
}

/// Breakeven analysis of a chain at a given underlying price. `None` when
/// neither side yields a usable contract.
pub fn analyze_chain(chain: &[OptionContract], price: f64, source: DataSource) -> Option<PremiumEfficiency> {
    let (call, put) = closest_itm(chain, price);
    let call = call.and_then(|c| BreakevenAnalysis::for_contract(c, price));
    let put = put.and_then(|c| BreakevenAnalysis::for_contract(c, price));
    if call.is_none() && put.is_none() {
        return None;
    }
    Some(PremiumEfficiency {
        underlying_price: price,
        call,
        put,
        source,
    })
}

pub fn premium_efficiency(
    resolver: &DataResolver,
    config: &EngineConfig,
    now: &MarketTime,
) -> Option<PremiumEfficiency> {
    let symbol = config.underlying.symbol.as_str();
    let quote = resolver.resolve_live(&FeedRequest::quote(symbol), |payload, _| {
        payload
            .into_quotes()?
            .into_iter()
            .find(|q| q.symbol == symbol && q.is_usable())
    });
    let Some(quote) = quote else {
        debug!("premium: no live quote for {symbol}");
        return None;
    };

    let chain = resolver.resolve_live(&FeedRequest::chain(symbol, now.date_naive()), |payload, _| {
        payload.into_chain()
    });
    let Some(chain) = chain else {
        debug!("premium: no live chain for {symbol}");
        return None;
    };

    analyze_chain(&chain.value, quote.value.last, quote.source.worst(chain.source))
}

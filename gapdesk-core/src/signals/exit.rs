//! Exit evaluation for an open position.
//!
//! Four additive checks (time to close, profit, loss, target) build an exit
//! score capped at 10. Time and loss tiers may set the signal directly; the
//! final score can only escalate it.

use crate::config::EngineConfig;
use crate::data::{DataResolver, FeedRequest};
use crate::domain::{DataSource, OptionType, PositionRecord, PriceTargets, TradeType};
use crate::window::{minutes_to_close, MarketTime};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const MAX_EXIT_SCORE: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ExitSignal {
    #[serde(rename = "HOLD")]
    Hold,
    #[serde(rename = "CONSIDER EXIT")]
    ConsiderExit,
    #[serde(rename = "STRONG EXIT")]
    StrongExit,
    #[serde(rename = "IMMEDIATE EXIT")]
    ImmediateExit,
}

impl fmt::Display for ExitSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExitSignal::Hold => "HOLD",
            ExitSignal::ConsiderExit => "CONSIDER EXIT",
            ExitSignal::StrongExit => "STRONG EXIT",
            ExitSignal::ImmediateExit => "IMMEDIATE EXIT",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Urgency {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Urgency::Low => "LOW",
            Urgency::Medium => "MEDIUM",
            Urgency::High => "HIGH",
            Urgency::Critical => "CRITICAL",
        })
    }
}

/// How the position's current value was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValuationMethod {
    #[serde(rename = "Stock Price Comparison")]
    StockPrice,
    #[serde(rename = "Live Options Data")]
    LiveOption,
    #[serde(rename = "Estimated Options Value")]
    Estimated,
}

impl fmt::Display for ValuationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ValuationMethod::StockPrice => "Stock Price Comparison",
            ValuationMethod::LiveOption => "Live Options Data",
            ValuationMethod::Estimated => "Estimated Options Value",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Valuation {
    pub current_value: f64,
    pub underlying_price: f64,
    pub method: ValuationMethod,
    pub source: DataSource,
}

/// Time-dependent inputs to the exit score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExitClock {
    pub minutes_to_close: f64,
    pub hours_in_trade: f64,
}

impl ExitClock {
    pub fn at(position: &PositionRecord, now: &MarketTime) -> Self {
        let held = now.with_timezone(&Utc) - position.entry_time;
        Self {
            minutes_to_close: minutes_to_close(now),
            hours_in_trade: (held.num_seconds() as f64 / 3600.0).max(0.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitEvaluation {
    pub signal: ExitSignal,
    pub urgency: Urgency,
    pub exit_score: u32,
    pub should_exit: bool,
    pub pnl_pct: f64,
    pub entry_value: f64,
    pub current_value: f64,
    pub underlying_price: f64,
    pub minutes_to_close: f64,
    pub hours_in_trade: f64,
    pub reasons: Vec<String>,
    pub time_warnings: Vec<String>,
    pub price_source: DataSource,
    pub calculation_method: ValuationMethod,
}

/// P&L in percent. A non-positive current value counts as a total loss.
pub fn pnl_pct(entry_value: f64, current_value: f64) -> f64 {
    if current_value <= 0.0 {
        -100.0
    } else if entry_value <= 0.0 {
        0.0
    } else {
        (current_value - entry_value) / entry_value * 100.0
    }
}

/// Option value multiplier from where the underlying sits relative to the
/// favoured target: 2.5 at or past it, 1.2 past the halfway mark from the
/// reference price, 0.6 otherwise.
pub fn moneyness_multiplier(position: &PositionRecord, targets: &PriceTargets, underlying: f64) -> f64 {
    let reference = position
        .underlying_entry
        .unwrap_or((targets.upside_target + targets.downside_target) / 2.0);
    if position.is_short() {
        let target = targets.downside_target;
        if underlying <= target {
            2.5
        } else if underlying <= (reference + target) / 2.0 {
            1.2
        } else {
            0.6
        }
    } else {
        let target = targets.upside_target;
        if underlying >= target {
            2.5
        } else if underlying >= (reference + target) / 2.0 {
            1.2
        } else {
            0.6
        }
    }
}

/// Model value for an option with no live quote.
pub fn estimate_option_value(position: &PositionRecord, underlying: f64, hours_in_trade: f64) -> f64 {
    let targets = position.targets_or_default();
    let time_decay = (1.0 - hours_in_trade * 0.15).max(0.1);
    let value = position.entry_price * moneyness_multiplier(position, &targets, underlying) * time_decay;
    value.max(0.01)
}

/// Current value of the position. Never fails: options fall back to the model
/// estimate, the underlying price to the proxy tier.
pub fn value_position(
    resolver: &DataResolver,
    config: &EngineConfig,
    position: &PositionRecord,
    now: &MarketTime,
) -> Valuation {
    let symbol = config.underlying.symbol.as_str();
    let underlying = resolver.resolve_with(
        &FeedRequest::quote(symbol),
        |payload, _| {
            payload
                .into_quotes()?
                .into_iter()
                .find(|q| q.symbol == symbol && q.is_usable())
                .map(|q| q.last)
        },
        |proxy| proxy.underlying_price(now),
    );

    if position.trade_type == TradeType::Stock {
        return Valuation {
            current_value: underlying.value,
            underlying_price: underlying.value,
            method: ValuationMethod::StockPrice,
            source: underlying.source,
        };
    }

    let option_type = if position.is_short() {
        OptionType::Put
    } else {
        OptionType::Call
    };
    let live = position.strike.and_then(|strike| {
        resolver.resolve_live(&FeedRequest::chain(symbol, now.date_naive()), |payload, _| {
            payload
                .into_chain()?
                .into_iter()
                .find(|c| c.matches(strike, option_type))?
                .mid()
        })
    });

    match live {
        Some(mid) => Valuation {
            current_value: mid.value,
            underlying_price: underlying.value,
            method: ValuationMethod::LiveOption,
            source: mid.source,
        },
        None => {
            let hours = ExitClock::at(position, now).hours_in_trade;
            Valuation {
                current_value: estimate_option_value(position, underlying.value, hours),
                underlying_price: underlying.value,
                method: ValuationMethod::Estimated,
                source: underlying.source,
            }
        }
    }
}

struct ExitState {
    score: u32,
    signal: ExitSignal,
    urgency: Urgency,
    reasons: Vec<String>,
    time_warnings: Vec<String>,
}

impl ExitState {
    fn raise(&mut self, signal: ExitSignal, urgency: Urgency) {
        self.signal = self.signal.max(signal);
        self.urgency = self.urgency.max(urgency);
    }
}

fn check_time(state: &mut ExitState, minutes_left: f64) {
    if minutes_left <= 30.0 {
        state.score += 8;
        state.raise(ExitSignal::ImmediateExit, Urgency::Critical);
        state
            .time_warnings
            .push("FINAL 30 MINUTES - Theta burn accelerating".into());
    } else if minutes_left <= 60.0 {
        state.score += 5;
        state.raise(ExitSignal::StrongExit, Urgency::High);
        state
            .time_warnings
            .push("Final hour - Start looking for exit".into());
    } else if minutes_left <= 90.0 {
        state.score += 3;
        state
            .time_warnings
            .push("90 minutes left - Prepare for exit".into());
    }
}

fn check_profit(state: &mut ExitState, pnl: f64) {
    let (points, reason) = if pnl >= 100.0 {
        (6, format!("MASSIVE WIN: {pnl:.1}% profit - Take it!"))
    } else if pnl >= 50.0 {
        (4, format!("STRONG PROFIT: {pnl:.1}% - Consider taking profits"))
    } else if pnl >= 25.0 {
        (2, format!("Good profit: {pnl:.1}% - Watch for reversal"))
    } else {
        return;
    };
    state.score += points;
    state.reasons.push(reason);
}

fn check_loss(state: &mut ExitState, pnl: f64) {
    if pnl <= -70.0 {
        state.score += 8;
        state.raise(ExitSignal::ImmediateExit, Urgency::Critical);
        state.reasons.push(format!("MAJOR STOP LOSS: {pnl:.1}% loss"));
    } else if pnl <= -50.0 {
        state.score += 6;
        state.raise(ExitSignal::StrongExit, Urgency::High);
        state.reasons.push(format!("STOP LOSS HIT: {pnl:.1}% loss"));
    } else if pnl <= -30.0 {
        state.score += 4;
        state
            .reasons
            .push(format!("Significant loss: {pnl:.1}% - Consider exit"));
    }
}

fn check_target(state: &mut ExitState, position: &PositionRecord, underlying: f64) {
    let targets = position.targets_or_default();
    if position.signal.direction().is_none() {
        return;
    }
    if position.is_short() {
        if underlying <= targets.downside_target {
            state.score += 5;
            state.reasons.push(format!(
                "TARGET HIT: ${underlying:.2} <= ${:.2}",
                targets.downside_target
            ));
        }
    } else if underlying >= targets.upside_target {
        state.score += 5;
        state.reasons.push(format!(
            "TARGET HIT: ${underlying:.2} >= ${:.2}",
            targets.upside_target
        ));
    }
}

/// Score a valued position. Pure: all market inputs come in through
/// `valuation` and `clock`.
pub fn score_exit(position: &PositionRecord, valuation: &Valuation, clock: ExitClock) -> ExitEvaluation {
    let pnl = pnl_pct(position.entry_price, valuation.current_value);
    let mut state = ExitState {
        score: 0,
        signal: ExitSignal::Hold,
        urgency: Urgency::Low,
        reasons: Vec::new(),
        time_warnings: Vec::new(),
    };

    check_time(&mut state, clock.minutes_to_close);
    check_profit(&mut state, pnl);
    check_loss(&mut state, pnl);
    check_target(&mut state, position, valuation.underlying_price);

    let score = state.score.min(MAX_EXIT_SCORE);
    if score >= 8 {
        state.raise(ExitSignal::ImmediateExit, Urgency::Critical);
    } else if score >= 5 {
        state.raise(ExitSignal::StrongExit, Urgency::High);
    } else if score >= 3 {
        state.raise(ExitSignal::ConsiderExit, Urgency::Medium);
    }

    ExitEvaluation {
        signal: state.signal,
        urgency: state.urgency,
        exit_score: score,
        should_exit: score >= 5,
        pnl_pct: pnl,
        entry_value: position.entry_price,
        current_value: valuation.current_value,
        underlying_price: valuation.underlying_price,
        minutes_to_close: clock.minutes_to_close,
        hours_in_trade: clock.hours_in_trade,
        reasons: state.reasons,
        time_warnings: state.time_warnings,
        price_source: valuation.source,
        calculation_method: valuation.method,
    }
}

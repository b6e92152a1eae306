//! Trading-window state machine.
//!
//! A pure function of the exchange-local clock. The day is partitioned twice:
//! once into the gating regimes (only the prime window is tradeable), and once
//! into finer breadth-reliability phases that weight how much the internals
//! reading can be trusted at that time of day.

use chrono::{DateTime, Datelike, NaiveDateTime, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Exchange timezone.
pub const MARKET_TZ: Tz = chrono_tz::America::New_York;

/// Wall-clock time at the exchange.
pub type MarketTime = DateTime<Tz>;

pub fn market_now() -> MarketTime {
    Utc::now().with_timezone(&MARKET_TZ)
}

/// Interpret a naive timestamp as exchange-local time. Ambiguous (fall-back)
/// times resolve to the earlier instant; nonexistent ones yield `None`.
pub fn market_time_from_local(local: NaiveDateTime) -> Option<MarketTime> {
    MARKET_TZ.from_local_datetime(&local).earliest()
}

fn hm(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap_or(NaiveTime::MIN)
}

fn market_open() -> NaiveTime {
    hm(9, 30)
}
fn prime_start() -> NaiveTime {
    hm(9, 45)
}
fn prime_end() -> NaiveTime {
    hm(11, 0)
}
fn lunch_start() -> NaiveTime {
    hm(11, 30)
}
fn danger_start() -> NaiveTime {
    hm(14, 30)
}
pub(crate) fn market_close() -> NaiveTime {
    hm(16, 0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WindowRegime {
    PreMarket,
    OpeningVolatility,
    PrimeWindow,
    PostWindow,
    Lunch,
    DangerZone,
    Closed,
    Weekend,
}

impl fmt::Display for WindowRegime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            WindowRegime::PreMarket => "PRE-MARKET",
            WindowRegime::OpeningVolatility => "OPENING VOLATILITY",
            WindowRegime::PrimeWindow => "PRIME 0DTE WINDOW",
            WindowRegime::PostWindow => "POST-WINDOW",
            WindowRegime::Lunch => "LUNCH DOLDRUMS",
            WindowRegime::DangerZone => "DANGER ZONE",
            WindowRegime::Closed => "MARKET CLOSED",
            WindowRegime::Weekend => "WEEKEND",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Reliability {
    Low,
    Medium,
    High,
    AnalysisOnly,
}

/// Intraday phases for breadth weighting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BreadthPhase {
    OpeningBell,
    EarlyPrime,
    Optimal,
    PostOptimal,
    Lunch,
    PivotWatch,
    DangerZone,
    Closed,
}

impl BreadthPhase {
    /// Boundaries are inclusive and the first matching phase wins.
    pub fn at(time: NaiveTime) -> Self {
        let between = |a: NaiveTime, b: NaiveTime| a <= time && time <= b;
        if between(prime_start(), hm(10, 30)) {
            BreadthPhase::EarlyPrime
        } else if between(hm(10, 30), prime_end()) {
            BreadthPhase::Optimal
        } else if between(prime_end(), lunch_start()) {
            BreadthPhase::PostOptimal
        } else if between(hm(13, 30), hm(14, 0)) {
            BreadthPhase::PivotWatch
        } else if between(danger_start(), market_close()) {
            BreadthPhase::DangerZone
        } else if between(market_open(), prime_start()) {
            BreadthPhase::OpeningBell
        } else if time >= market_close() || time <= market_open() {
            BreadthPhase::Closed
        } else {
            BreadthPhase::Lunch
        }
    }

    pub fn weight(self) -> f64 {
        match self {
            BreadthPhase::OpeningBell => 0.2,
            BreadthPhase::EarlyPrime => 0.3,
            BreadthPhase::Optimal => 1.0,
            BreadthPhase::PostOptimal => 0.8,
            BreadthPhase::Lunch => 0.6,
            BreadthPhase::PivotWatch => 0.7,
            BreadthPhase::DangerZone => 0.5,
            BreadthPhase::Closed => 1.0,
        }
    }

    pub fn reliability(self) -> Reliability {
        match self {
            BreadthPhase::Optimal => Reliability::High,
            BreadthPhase::PostOptimal | BreadthPhase::PivotWatch => Reliability::Medium,
            BreadthPhase::Closed => Reliability::AnalysisOnly,
            _ => Reliability::Low,
        }
    }

    pub fn note(self) -> &'static str {
        match self {
            BreadthPhase::OpeningBell => "Market opening - wait for initial volatility to settle.",
            BreadthPhase::EarlyPrime => {
                "Opening imbalances may reduce breadth reliability. Use price action confirmation."
            }
            BreadthPhase::Optimal => "Peak breadth reliability window. Full signal confidence.",
            BreadthPhase::PostOptimal => {
                "Past optimal window but signals still valid with reduced gap edge."
            }
            BreadthPhase::Lunch => "Low volume lunch period - reduced signal reliability.",
            BreadthPhase::PivotWatch => {
                "Historical breadth pivot zone. Monitor for afternoon reversal patterns."
            }
            BreadthPhase::DangerZone => "Extreme theta burn period for 0DTE options. High risk.",
            BreadthPhase::Closed => "Market closed - analysis for planning only.",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreadthWeighting {
    pub phase: BreadthPhase,
    pub weight: f64,
    pub reliability: Reliability,
    pub note: String,
}

impl BreadthWeighting {
    fn for_phase(phase: BreadthPhase) -> Self {
        Self {
            phase,
            weight: phase.weight(),
            reliability: phase.reliability(),
            note: phase.note().to_string(),
        }
    }
}

/// Where the clock sits in the trading day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingWindowState {
    pub regime: WindowRegime,
    /// Only the prime window is tradeable.
    pub tradeable: bool,
    pub message: String,
    pub breadth: BreadthWeighting,
}

impl TradingWindowState {
    pub fn is_prime(&self) -> bool {
        self.tradeable && self.regime == WindowRegime::PrimeWindow
    }
}

fn minutes_between(from: NaiveTime, to: NaiveTime) -> f64 {
    (to - from).num_seconds() as f64 / 60.0
}

pub fn is_weekend(now: &MarketTime) -> bool {
    matches!(now.weekday(), Weekday::Sat | Weekday::Sun)
}

pub fn check_trading_window(now: &MarketTime) -> TradingWindowState {
    let weekday = now.weekday();
    if is_weekend(now) {
        let day = if weekday == Weekday::Sat { "Saturday" } else { "Sunday" };
        return TradingWindowState {
            regime: WindowRegime::Weekend,
            tradeable: false,
            message: format!("Weekend ({day}) - Market opens Monday at 9:30 AM ET"),
            breadth: BreadthWeighting::for_phase(BreadthPhase::Closed),
        };
    }

    let t = now.time();
    let (regime, message) = if t < market_open() {
        let hours = minutes_between(t, market_open()) / 60.0;
        (
            WindowRegime::PreMarket,
            format!("Market opens in {hours:.1} hours (9:30 AM ET)"),
        )
    } else if t < prime_start() {
        let mins = minutes_between(t, prime_start());
        (
            WindowRegime::OpeningVolatility,
            format!("OPENING VOLATILITY - Trading window opens in {mins:.0} minutes (9:45 AM)"),
        )
    } else if t <= prime_end() {
        let mins = minutes_between(t, prime_end());
        (
            WindowRegime::PrimeWindow,
            format!("PRIME 0DTE WINDOW - {mins:.0} minutes left in optimal zone"),
        )
    } else if t < lunch_start() {
        (
            WindowRegime::PostWindow,
            "POST-WINDOW - Gap edge diminished, wait for tomorrow".to_string(),
        )
    } else if t < danger_start() {
        (
            WindowRegime::Lunch,
            "LUNCH DOLDRUMS - Low volume, avoid 0DTE trades".to_string(),
        )
    } else if t < market_close() {
        let mins = minutes_between(t, market_close());
        (
            WindowRegime::DangerZone,
            format!("DANGER ZONE - Extreme theta burn, exit only ({mins:.0} min to close)"),
        )
    } else {
        let next = if weekday == Weekday::Fri { "Monday" } else { "Tomorrow" };
        (
            WindowRegime::Closed,
            format!("Market closed - Next 0DTE window: {next} 9:45-11:00 AM"),
        )
    };

    TradingWindowState {
        regime,
        tradeable: regime == WindowRegime::PrimeWindow,
        message,
        breadth: BreadthWeighting::for_phase(BreadthPhase::at(t)),
    }
}

/// Minutes until the 16:00 close (negative after the close).
pub fn minutes_to_close(now: &MarketTime) -> f64 {
    minutes_between(now.time(), market_close())
}

#[cfg(test)]
pub(crate) fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> MarketTime {
    let local = chrono::NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(h, min, 0)
        .unwrap();
    market_time_from_local(local).unwrap()
}

//! Indicator math used by the analyzers.
//!
//! Plain functions over slices: the analyzers compute a handful of values per
//! cycle from at most a session of one-minute bars.

pub mod ema;
pub mod momentum;
pub mod vwap;

pub use ema::{ewm_adjusted, ewm_of_closes};
pub use momentum::{pct_change_over, volume_acceleration};
pub use vwap::{distance_pct, vwap_close, vwap_typical};

/// Create synthetic one-minute bars from close prices for testing.
///
/// Generates plausible OHLV: open = prev_close (or close for first bar),
/// high = max(open,close) + 0.05, low = min(open,close) - 0.05, volume = 1000.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<crate::domain::Bar> {
    let rows: Vec<(f64, u64)> = closes.iter().map(|&c| (c, 1000)).collect();
    make_bars_with_volume(&rows)
}

/// Like [`make_bars`], with an explicit volume per bar.
#[cfg(test)]
pub fn make_bars_with_volume(rows: &[(f64, u64)]) -> Vec<crate::domain::Bar> {
    use crate::domain::Bar;
    let start = chrono::NaiveDate::from_ymd_opt(2024, 6, 3)
        .unwrap()
        .and_hms_opt(9, 30, 0)
        .unwrap();
    rows.iter()
        .enumerate()
        .map(|(i, &(close, volume))| {
            let open = if i == 0 { close } else { rows[i - 1].0 };
            Bar {
                timestamp: start + chrono::Duration::minutes(i as i64),
                open,
                high: open.max(close) + 0.05,
                low: open.min(close) - 0.05,
                close,
                volume,
            }
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;

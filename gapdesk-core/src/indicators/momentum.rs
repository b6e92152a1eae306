//! Short-horizon momentum and volume acceleration.

use crate::domain::Bar;

/// Percent change from the first to the last of the final `window` values.
///
/// `window` counts both endpoints, so a 5-bar window compares `values[n-1]`
/// with `values[n-5]`. `None` if there are too few values or the base is zero.
pub fn pct_change_over(values: &[f64], window: usize) -> Option<f64> {
    if window < 2 || values.len() < window {
        return None;
    }
    let last = *values.last()?;
    let base = values[values.len() - window];
    if base == 0.0 || base.is_nan() || last.is_nan() {
        return None;
    }
    Some((last - base) / base * 100.0)
}

/// Mean volume of the last 5 bars over the mean of the 5 before them.
/// Returns 1.0 when fewer than 10 bars or the earlier mean is zero.
pub fn volume_acceleration(bars: &[Bar]) -> f64 {
    if bars.len() < 10 {
        return 1.0;
    }
    let last10 = &bars[bars.len() - 10..];
    let mean = |s: &[Bar]| s.iter().map(|b| b.volume as f64).sum::<f64>() / s.len() as f64;
    let earlier = mean(&last10[..5]);
    if earlier > 0.0 {
        mean(&last10[5..]) / earlier
    } else {
        1.0
    }
}

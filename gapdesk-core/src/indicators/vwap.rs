//! Volume-weighted average price.
//!
//! Two bases are in use: last-trade close (the broker feed's bars are built
//! from trades) and typical price (H+L+C)/3 for the chart feed's aggregates.
//! Bars with a non-positive close or zero volume are ignored. `None` means no
//! usable volume.

use crate::domain::Bar;

fn weighted(bars: &[Bar], price: impl Fn(&Bar) -> f64) -> Option<f64> {
    let (pv, vol) = bars
        .iter()
        .filter(|b| b.close > 0.0 && b.volume > 0 && !b.is_void())
        .fold((0.0, 0.0), |(pv, vol), b| {
            let v = b.volume as f64;
            (pv + price(b) * v, vol + v)
        });
    (vol > 0.0).then(|| pv / vol)
}

/// Σ(close × volume) / Σ(volume)
pub fn vwap_close(bars: &[Bar]) -> Option<f64> {
    weighted(bars, |b| b.close)
}

/// Σ(typical × volume) / Σ(volume)
pub fn vwap_typical(bars: &[Bar]) -> Option<f64> {
    weighted(bars, Bar::typical_price)
}

/// (price − vwap) / vwap × 100
pub fn distance_pct(price: f64, vwap: f64) -> f64 {
    if vwap == 0.0 {
        return 0.0;
    }
    (price - vwap) / vwap * 100.0
}

//! Session price targets projected from the bullish/bearish point totals.

use crate::domain::PriceTargets;

/// One-sigma-ish intraday move used as the unit for projections.
const BASE_MOVE_PCT: f64 = 0.01;

impl PriceTargets {
    /// Project upside/downside levels around `price`.
    ///
    /// Strong conviction on one side stretches that side's target and pulls
    /// the opposite one in; mixed readings give a symmetric range.
    pub fn project(bullish_total: f64, bearish_total: f64, price: f64) -> Self {
        let unit = price * BASE_MOVE_PCT;
        let (up, down, up_prob, reason) = if bullish_total >= 8.0 {
            (1.4, 0.6, 75.0, "Strong bullish signals suggest larger upside move")
        } else if bullish_total >= 6.0 {
            (1.1, 0.7, 65.0, "Moderate bullish signals")
        } else if bearish_total >= 8.0 {
            (0.6, 1.4, 25.0, "Strong bearish signals suggest larger downside move")
        } else if bearish_total >= 6.0 {
            (0.7, 1.1, 35.0, "Moderate bearish signals")
        } else {
            (0.8, 0.8, 50.0, "Mixed signals - wider neutral range")
        };

        Self {
            upside_target: price + unit * up,
            downside_target: price - unit * down,
            upside_probability: up_prob,
            downside_probability: 100.0 - up_prob,
            reasoning: vec![
                reason.to_string(),
                format!("Bullish {bullish_total:.1} vs bearish {bearish_total:.1} points"),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{a} != {b}");
    }

    #[test]
    fn strong_bullish_stretches_upside() {
        let t = PriceTargets::project(9.0, 1.0, 500.0);
        approx(t.upside_target, 507.0);
        approx(t.downside_target, 497.0);
        assert_eq!(t.upside_probability, 75.0);
        assert_eq!(t.downside_probability, 25.0);
    }

    #[test]
    fn moderate_bearish_mirrors() {
        let t = PriceTargets::project(2.0, 6.5, 500.0);
        approx(t.upside_target, 503.5);
        approx(t.downside_target, 494.5);
        assert_eq!(t.downside_probability, 65.0);
    }

    #[test]
    fn bullish_checked_before_bearish() {
        let t = PriceTargets::project(8.0, 8.0, 100.0);
        assert_eq!(t.upside_probability, 75.0);
    }

    #[test]
    fn mixed_is_symmetric() {
        let t = PriceTargets::project(3.0, 3.0, 100.0);
        approx(t.upside_target - 100.0, 100.0 - t.downside_target);
        assert!(t.reasoning[0].starts_with("Mixed"));
    }
}

//! Exponentially weighted moving average, span-parameterised.
//!
//! Adjusted form, defined from the first value:
//! EWM[t] = sum(w_i * x[t-i]) / sum(w_i), w_i = (1 - alpha)^i, alpha = 2 / (span + 1).
//! Kept as two running sums: num = x + (1 - alpha) * num, den = 1 + (1 - alpha) * den.
//! A NaN input decays both sums without adding an observation, so its slot
//! repeats the previous value; slots before the first finite value are NaN.

use crate::domain::Bar;

pub fn ewm_adjusted(values: &[f64], span: usize) -> Vec<f64> {
    let mut result = vec![f64::NAN; values.len()];
    if span == 0 {
        return result;
    }

    let decay = 1.0 - 2.0 / (span as f64 + 1.0);
    let mut num = 0.0;
    let mut den = 0.0;
    for (slot, &x) in result.iter_mut().zip(values) {
        num *= decay;
        den *= decay;
        if !x.is_nan() {
            num += x;
            den += 1.0;
        }
        if den > 0.0 {
            *slot = num / den;
        }
    }

    result
}

/// EWM of bar closes.
pub fn ewm_of_closes(bars: &[Bar], span: usize) -> Vec<f64> {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    ewm_adjusted(&closes, span)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars, DEFAULT_EPSILON};

    #[test]
    fn span_1_equals_input() {
        let result = ewm_adjusted(&[100.0, 200.0, 300.0], 1);
        assert_approx(result[0], 100.0, DEFAULT_EPSILON);
        assert_approx(result[2], 300.0, DEFAULT_EPSILON);
    }

    #[test]
    fn span_3_known_values() {
        // alpha = 0.5; pandas Series.ewm(span=3).mean()
        let result = ewm_adjusted(&[10.0, 11.0, 12.0, 13.0, 14.0], 3);
        assert_approx(result[0], 10.0, DEFAULT_EPSILON);
        assert_approx(result[1], 32.0 / 3.0, DEFAULT_EPSILON);
        assert_approx(result[2], 80.0 / 7.0, DEFAULT_EPSILON);
        assert_approx(result[3], 12.266_666_666_666_667, 1e-12);
        assert_approx(result[4], 13.161_290_322_580_646, 1e-12);
    }

    #[test]
    fn defined_from_first_value() {
        let result = ewm_adjusted(&[5.0, 7.0], 20);
        assert!(result.iter().all(|v| v.is_finite()));
        assert_approx(result[0], 5.0, DEFAULT_EPSILON);
    }

    #[test]
    fn step_after_flat_run_matches_reference() {
        // 19 closes at 100 then one at 101, as pandas computes it.
        let mut closes = vec![100.0; 19];
        closes.push(101.0);
        let e9 = *ewm_adjusted(&closes, 9).last().unwrap();
        let e20 = *ewm_adjusted(&closes, 20).last().unwrap();
        assert_approx(e9, 100.202_332_737_643_13, 1e-9);
        assert_approx(e20, 100.110_115_793_128_93, 1e-9);
        assert_approx((e9 - e20) / e20 * 100.0, 0.092_115_510_788_906, 1e-9);
    }

    #[test]
    fn empty_and_zero_span() {
        assert!(ewm_adjusted(&[], 9).is_empty());
        assert!(ewm_adjusted(&[1.0, 2.0], 0).iter().all(|v| v.is_nan()));
    }

    #[test]
    fn nan_slot_repeats_previous_value() {
        let result = ewm_adjusted(&[f64::NAN, 10.0, f64::NAN, 12.0], 3);
        assert!(result[0].is_nan());
        assert_approx(result[1], 10.0, DEFAULT_EPSILON);
        assert_approx(result[2], 10.0, DEFAULT_EPSILON);
        // weights 1 (12.0) and 0.25 (10.0, two steps back)
        assert_approx(result[3], (12.0 + 0.25 * 10.0) / 1.25, DEFAULT_EPSILON);
    }

    #[test]
    fn closes_match_series() {
        let closes = [10.0, 11.0, 12.0, 13.0, 14.0, 15.0];
        let from_bars = ewm_of_closes(&make_bars(&closes), 3);
        let from_series = ewm_adjusted(&closes, 3);
        for (a, b) in from_bars.iter().zip(&from_series) {
            assert_approx(*a, *b, DEFAULT_EPSILON);
        }
    }

    #[test]
    fn constant_series_is_flat() {
        let result = ewm_adjusted(&[50.0; 30], 9);
        assert!(result.iter().all(|v| (v - 50.0).abs() < DEFAULT_EPSILON));
    }
}

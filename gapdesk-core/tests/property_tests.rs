//! Property tests for scoring invariants.
//!
//! Uses proptest to verify:
//! 1. Gap scoring — totals equal the component sum; the sign follows the gap
//! 2. Classification — monotone in the net score, symmetric around zero
//! 3. Breakdown — split totals are non-negative and reconstruct the net
//! 4. Exit scoring — capped at 10, `should_exit` iff score ≥ 5
//! 5. Window — weekends are never tradeable

use chrono::NaiveDate;
use gapdesk_core::analyzers::gap::{direction_multiplier, score_gap, GapCategory};
use gapdesk_core::config::DecisionThresholds;
use gapdesk_core::domain::{
    AnalyzerResult, DataSource, PositionRecord, Signal, TradeType,
};
use gapdesk_core::signals::exit::{score_exit, ExitClock, Valuation, ValuationMethod};
use gapdesk_core::signals::{classify, AnalyzerScores, PointsBreakdown};
use gapdesk_core::window::{check_trading_window, market_time_from_local};
use proptest::prelude::*;

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_gap() -> impl Strategy<Value = f64> {
    -5.0..5.0_f64
}

fn arb_points() -> impl Strategy<Value = f64> {
    (-6.0..6.0_f64).prop_map(|p| (p * 10.0).round() / 10.0)
}

fn arb_signal() -> impl Strategy<Value = Signal> {
    prop_oneof![
        Just(Signal::StrongLong),
        Just(Signal::ModerateLong),
        Just(Signal::StrongShort),
        Just(Signal::ModerateShort),
        Just(Signal::NoTrade),
    ]
}

fn scored(points: f64) -> AnalyzerResult {
    AnalyzerResult::new(DataSource::Primary).with_component("x", points, "")
}

// ── 1. Gap scoring ───────────────────────────────────────────────────

proptest! {
    #[test]
    fn gap_total_is_component_sum(
        gap in arb_gap(),
        vwap in -1.0..1.0_f64,
        surge in 0.0..4.0_f64,
    ) {
        let r = score_gap(gap, vwap, surge, DataSource::Primary);
        let sum: f64 = r.components().iter().map(|c| c.points).sum();
        prop_assert!((sum - r.total_points()).abs() < 1e-9);
    }

    #[test]
    fn gap_sign_follows_direction(
        gap in arb_gap(),
        vwap in -1.0..1.0_f64,
        surge in 0.0..4.0_f64,
    ) {
        let r = score_gap(gap, vwap, surge, DataSource::Primary);
        if gap < 0.0 {
            prop_assert!(r.total_points() <= 0.0);
        } else {
            prop_assert!(r.total_points() >= 0.0);
        }
        let m = direction_multiplier(gap, vwap);
        prop_assert!(m == 1.0 || m == 0.5 || m == -1.0 || m == -0.5);
    }

    #[test]
    fn gap_buckets_are_monotone(a in 0.0..5.0_f64, b in 0.0..5.0_f64) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        // Larger gaps never fall into a smaller bucket.
        let rank = |c: GapCategory| match c {
            GapCategory::Minimal | GapCategory::Weekend => 0,
            GapCategory::Small => 1,
            GapCategory::Medium => 2,
            GapCategory::Large => 3,
            GapCategory::Monster => 4,
        };
        prop_assert!(rank(GapCategory::of(lo)) <= rank(GapCategory::of(hi)));
    }
}

// ── 2. Classification ────────────────────────────────────────────────

proptest! {
    #[test]
    fn classification_is_symmetric(net in -15.0..15.0_f64) {
        let t = DecisionThresholds::default();
        let (up, up_conf) = classify(net, t);
        let (down, down_conf) = classify(-net, t);
        prop_assert_eq!(up_conf, down_conf);
        let mirrored = match up {
            Signal::StrongLong => Signal::StrongShort,
            Signal::ModerateLong => Signal::ModerateShort,
            Signal::StrongShort => Signal::StrongLong,
            Signal::ModerateShort => Signal::ModerateLong,
            Signal::NoTrade => Signal::NoTrade,
        };
        prop_assert_eq!(down, mirrored);
    }

    #[test]
    fn confidence_tracks_magnitude(a in 0.0..15.0_f64, b in 0.0..15.0_f64) {
        let t = DecisionThresholds::default();
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(classify(lo, t).1 <= classify(hi, t).1);
    }
}

// ── 3. Breakdown ─────────────────────────────────────────────────────

proptest! {
    #[test]
    fn breakdown_reconstructs_net(
        g in arb_points(),
        i in arb_points(),
        s in arb_points(),
        t in arb_points(),
        tr in arb_points(),
    ) {
        let (g, i, s, t, tr) = (scored(g), scored(i), scored(s), scored(t), scored(tr));
        let scores = AnalyzerScores {
            gap: &g,
            internals: &i,
            sectors: &s,
            technicals: &t,
            trend: &tr,
        };
        let b = PointsBreakdown::from_scores(&scores);
        prop_assert!(b.bullish_total >= 0.0);
        prop_assert!(b.bearish_total >= 0.0);
        let signed = g.total_points() + i.total_points() + s.total_points()
            + t.total_points() + tr.total_points();
        prop_assert!((b.net - signed).abs() < 1e-9);
    }
}

// ── 4. Exit scoring ──────────────────────────────────────────────────

proptest! {
    #[test]
    fn exit_score_is_capped(
        signal in arb_signal(),
        entry in 0.5..10.0_f64,
        current in 0.0..25.0_f64,
        underlying in 500.0..560.0_f64,
        minutes in -30.0..400.0_f64,
    ) {
        let position = PositionRecord {
            signal,
            entry_price: entry,
            entry_time: "2024-06-03T14:00:00Z".parse().unwrap(),
            trade_type: TradeType::Options,
            strike: Some(530.0),
            underlying_entry: Some(530.0),
            targets: None,
        };
        let valuation = Valuation {
            current_value: current,
            underlying_price: underlying,
            method: ValuationMethod::LiveOption,
            source: DataSource::Primary,
        };
        let clock = ExitClock { minutes_to_close: minutes, hours_in_trade: 1.0 };
        let e = score_exit(&position, &valuation, clock);
        prop_assert!(e.exit_score <= 10);
        prop_assert_eq!(e.should_exit, e.exit_score >= 5);
        if minutes <= 30.0 {
            prop_assert!(e.should_exit);
        }
    }
}

// ── 5. Window ────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn weekends_are_never_tradeable(day in 8u32..=9, minute in 0u32..1440) {
        // 2024-06-08/09 are Saturday and Sunday.
        let local = NaiveDate::from_ymd_opt(2024, 6, day)
            .unwrap()
            .and_hms_opt(minute / 60, minute % 60, 0)
            .unwrap();
        let now = market_time_from_local(local).unwrap();
        let state = check_trading_window(&now);
        prop_assert!(!state.tradeable);
        prop_assert!(state.message.contains("Monday"));
    }
}

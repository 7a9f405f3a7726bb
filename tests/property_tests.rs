//! Property tests for sizing, simulation and aggregation invariants.
//!
//! 1. Degenerate volatility always sizes to a flat position
//! 2. Sized targets stay within the clip, live targets within the risk cap
//! 3. Equity accounting: each equity step equals that bar's net P&L
//! 4. The simulator is a pure function of its inputs
//! 5. In-order sub-bars over M minutes emit M - 1 minute bars with max/min/last
//! 6. The sticky signal never returns to 0 once a breakout has fired

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use trendbot::backtest::{simulate, CostModel};
use trendbot::config::TradingCalendar;
use trendbot::execution::MinuteAggregator;
use trendbot::indicators::sticky;
use trendbot::risk::{clamp_to_risk_cap, PositionSizer, MIN_VOLATILITY};
use trendbot::Bar;

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_signal() -> impl Strategy<Value = i8> {
    -1i8..=1
}

fn arb_degenerate_vol() -> impl Strategy<Value = f64> {
    prop_oneof![
        Just(0.0),
        Just(f64::NAN),
        Just(f64::INFINITY),
        Just(-1.0),
        0.0..=MIN_VOLATILITY,
    ]
}

fn arb_closes(max_len: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(100.0..20_000.0_f64, 1..max_len)
        .prop_map(|v| v.into_iter().map(|p| (p * 4.0).round() / 4.0).collect())
}

fn bars_from_closes(closes: &[f64]) -> Vec<Bar> {
    let start = Utc.with_ymd_and_hms(2024, 1, 2, 14, 30, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| Bar::new(start + Duration::minutes(i as i64), c, c, c, c, 1))
        .collect()
}

fn default_sizer(scale: f64) -> PositionSizer {
    PositionSizer::new(0.10, scale, &TradingCalendar::default()).unwrap()
}

// ── 1-2. Position sizing ─────────────────────────────────────────────

proptest! {
    /// Zero, negative, non-finite or near-zero volatility never faults and sizes to 0.
    #[test]
    fn degenerate_vol_is_flat(signal in arb_signal(), vol in arb_degenerate_vol()) {
        prop_assert_eq!(default_sizer(1.0).target_for(signal, vol), 0);
    }

    /// |target| <= round(10 * scale); live targets are within the risk cap.
    #[test]
    fn targets_are_bounded(
        signal in arb_signal(),
        vol in 1e-9..1.0_f64,
        scale in 0.1..5.0_f64,
        max_contracts in 0i64..20,
    ) {
        let target = default_sizer(scale).target_for(signal, vol);
        prop_assert!((target.abs() as f64) <= (10.0 * scale).round() + 1e-9);
        if signal == 0 {
            prop_assert_eq!(target, 0);
        }

        let capped = clamp_to_risk_cap(target, max_contracts);
        prop_assert!(capped.abs() <= max_contracts);
    }
}

// ── 3-4. Simulation ──────────────────────────────────────────────────

proptest! {
    /// equity[t] - equity[t-1] == pnl_after_costs[t], with equity starting at 0.
    #[test]
    fn equity_identity(
        (closes, positions) in arb_closes(200).prop_flat_map(|closes| {
            let n = closes.len();
            (Just(closes), prop::collection::vec(-10i64..=10, n))
        })
    ) {
        let bars = bars_from_closes(&closes);
        let curve = simulate(&bars, &positions, &CostModel::default()).unwrap();

        let mut prev = 0.0;
        for row in &curve.rows {
            prop_assert!((row.equity - prev - row.pnl_after_costs).abs() < 1e-6);
            prev = row.equity;
        }
        prop_assert_eq!(curve.rows[0].pnl_dollars, 0.0);
    }

    /// Identical inputs give identical output.
    #[test]
    fn simulation_is_deterministic(
        (closes, positions) in arb_closes(100).prop_flat_map(|closes| {
            let n = closes.len();
            (Just(closes), prop::collection::vec(-3i64..=3, n))
        })
    ) {
        let bars = bars_from_closes(&closes);
        let a = simulate(&bars, &positions, &CostModel::default()).unwrap();
        let b = simulate(&bars, &positions, &CostModel::default()).unwrap();
        prop_assert_eq!(a, b);
    }
}

// ── 5. Minute aggregation ────────────────────────────────────────────

proptest! {
    #[test]
    fn aggregation_emits_all_but_last_minute(
        minutes in prop::collection::vec(
            prop::collection::vec((100.0..200.0_f64, 0.0..2.0_f64, 0.0..2.0_f64, 0u64..100), 1..12),
            1..8,
        )
    ) {
        let start = Utc.with_ymd_and_hms(2024, 3, 4, 15, 0, 0).unwrap();
        let mut agg = MinuteAggregator::new();
        let mut emitted = Vec::new();

        for (m, subs) in minutes.iter().enumerate() {
            for (k, &(close, up, down, volume)) in subs.iter().enumerate() {
                let ts = start + Duration::minutes(m as i64) + Duration::seconds(5 * k as i64);
                let sub = Bar::new(ts, close, close + up, close - down, close, volume);
                if let Some(bar) = agg.push(&sub) {
                    emitted.push(bar);
                }
            }
        }

        prop_assert_eq!(emitted.len(), minutes.len() - 1);

        for (m, bar) in emitted.iter().enumerate() {
            let subs = &minutes[m];
            let high = subs.iter().map(|s| s.0 + s.1).fold(f64::MIN, f64::max);
            let low = subs.iter().map(|s| s.0 - s.2).fold(f64::MAX, f64::min);
            let volume: u64 = subs.iter().map(|s| s.3).sum();

            prop_assert_eq!(bar.timestamp, start + Duration::minutes(m as i64));
            prop_assert_eq!(bar.open, subs[0].0);
            prop_assert_eq!(bar.high, high);
            prop_assert_eq!(bar.low, low);
            prop_assert_eq!(bar.close, subs[subs.len() - 1].0);
            prop_assert_eq!(bar.volume, volume);
        }
    }
}

// ── 6. Sticky signal ─────────────────────────────────────────────────

proptest! {
    #[test]
    fn sticky_holds_last_breakout(raw in prop::collection::vec(-1i8..=1, 0..200)) {
        let out = sticky(&raw);
        prop_assert_eq!(out.len(), raw.len());

        let mut last = 0i8;
        for (r, o) in raw.iter().zip(&out) {
            if *r != 0 {
                last = *r;
            }
            prop_assert_eq!(*o, last);
        }
    }
}

#[test]
fn sticky_example() {
    assert_eq!(sticky(&[0, 0, 1, 1, 0, -1]), vec![0, 0, 1, 1, 1, -1]);
}

#[test]
fn aggregation_example() {
    let at = |m: u32, s: u32| Utc.with_ymd_and_hms(2024, 3, 4, 9, m, s).unwrap();
    let mut agg = MinuteAggregator::new();

    assert!(agg.push(&Bar::new(at(30, 0), 10.0, 11.0, 9.0, 10.0, 5)).is_none());
    assert!(agg.push(&Bar::new(at(30, 5), 10.0, 12.0, 10.0, 11.0, 3)).is_none());
    let bar = agg.push(&Bar::new(at(31, 0), 11.0, 11.0, 11.0, 11.0, 1)).unwrap();

    assert_eq!(bar, Bar::new(at(30, 0), 10.0, 12.0, 9.0, 11.0, 8));
}

#[test]
fn cost_example() {
    let model = CostModel::new(1.20, 1, 1.25, 0.25);
    assert!((model.cost(2) - 4.90).abs() < 1e-12);
    assert!((model.cost(-2) - 4.90).abs() < 1e-12);
    assert_eq!(model.cost(0), 0.0);
}

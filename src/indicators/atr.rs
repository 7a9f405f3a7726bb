/// Average True Range (ATR) indicator
///
/// True Range is the greatest of:
/// - Current High - Current Low
/// - Abs(Current High - Previous Close)
/// - Abs(Current Low - Previous Close)
///
/// The first bar has no previous close, so its true range is High - Low.
/// ATR here is a simple rolling mean of true ranges over `period` bars.

use crate::models::Bar;

/// True range per bar, aligned with `bars`
pub fn true_range_series(bars: &[Bar]) -> Vec<f64> {
    bars.iter()
        .enumerate()
        .map(|(i, bar)| {
            let range = bar.high - bar.low;
            match i.checked_sub(1).map(|p| bars[p].close) {
                Some(prev_close) => range
                    .max((bar.high - prev_close).abs())
                    .max((bar.low - prev_close).abs()),
                None => range.abs(),
            }
        })
        .collect()
}

/// ATR per bar, aligned with `bars`; NaN until `period` true ranges are available
pub fn calculate_atr_series(bars: &[Bar], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; bars.len()];
    if period == 0 || bars.len() < period {
        return out;
    }

    let tr = true_range_series(bars);
    let mut window_sum: f64 = tr.iter().take(period).sum();
    out[period - 1] = window_sum / period as f64;

    for i in period..tr.len() {
        window_sum += tr[i] - tr[i - period];
        out[i] = window_sum / period as f64;
    }

    out
}

/// Latest ATR value, or None if insufficient data
pub fn calculate_atr(bars: &[Bar], period: usize) -> Option<f64> {
    calculate_atr_series(bars, period)
        .last()
        .copied()
        .filter(|v| v.is_finite())
}

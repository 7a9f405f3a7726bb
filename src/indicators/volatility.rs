//! Rolling volatility of simple close-to-close returns
//!
//! The first return is taken as 0. Each value is the sample standard deviation
//! (n - 1) of the last `window` returns. Leading bars without a full window are
//! back-filled with the first defined value so the series is dense from bar 0.
//! A series shorter than `window` has no defined value and stays NaN throughout,
//! which the position sizer reads as "no tradable signal".

use crate::models::Bar;

/// Simple returns per bar, aligned with `closes` (first element 0)
pub fn pct_returns(closes: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(closes.len());
    for (i, close) in closes.iter().enumerate() {
        if i == 0 {
            out.push(0.0);
            continue;
        }
        let prev = closes[i - 1];
        let ret = if prev != 0.0 { close / prev - 1.0 } else { 0.0 };
        out.push(if ret.is_finite() { ret } else { 0.0 });
    }
    out
}

/// Sample standard deviation; NaN for fewer than two values
pub fn sample_std(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return f64::NAN;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    var.sqrt()
}

/// Rolling return volatility aligned with `bars`
pub fn rolling_volatility(bars: &[Bar], window: usize) -> Vec<f64> {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    rolling_volatility_from_closes(&closes, window)
}

pub fn rolling_volatility_from_closes(closes: &[f64], window: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; closes.len()];
    if window < 2 || closes.len() < window {
        return out;
    }

    let returns = pct_returns(closes);
    for i in (window - 1)..returns.len() {
        out[i] = sample_std(&returns[i + 1 - window..=i]);
    }

    // Back-fill the warmup region with the first full-window value
    let first = out[window - 1];
    for v in out.iter_mut().take(window - 1) {
        *v = first;
    }

    out
}

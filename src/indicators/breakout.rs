use crate::models::Bar;

/// Raw channel-breakout readings per bar
///
/// +1 when the close exceeds the highest high of the previous `lookback` bars,
/// -1 when it falls below the lowest low of that window, 0 otherwise (including
/// every bar before a full window exists). A bar that breaks both sides reads 0.
pub fn raw_breakouts(bars: &[Bar], lookback: usize) -> Vec<i8> {
    let mut out = vec![0i8; bars.len()];
    if lookback == 0 {
        return out;
    }

    for t in lookback..bars.len() {
        let window = &bars[t - lookback..t];
        let highest = window.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
        let lowest = window.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
        let close = bars[t].close;

        let long = i8::from(close > highest);
        let short = i8::from(close < lowest);
        out[t] = long - short;
    }

    out
}

/// Sticky signal: holds the last nonzero reading until a new one fires
///
/// Seeded at 0, so leading zeros stay 0.
pub fn sticky(raw: &[i8]) -> Vec<i8> {
    raw.iter()
        .scan(0i8, |last, &reading| {
            if reading != 0 {
                *last = reading.signum();
            }
            Some(*last)
        })
        .collect()
}

/// Sticky breakout signal per bar
pub fn breakout_signal(bars: &[Bar], lookback: usize) -> Vec<i8> {
    sticky(&raw_breakouts(bars, lookback))
}

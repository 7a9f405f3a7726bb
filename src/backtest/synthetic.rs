use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::models::{Bar, SubBar};

/// Default first session for synthetic runs
const DEFAULT_START: (i32, u32, u32) = (2022, 1, 3);

/// Generates seeded synthetic minute bars and sub-minute bars
///
/// Prices follow a geometric random walk with normally distributed returns,
/// one bar per minute between 14:30 and 21:00 UTC (inclusive) on weekdays.
pub struct SyntheticDataGenerator {
    rng: StdRng,
    base_price: f64,
    drift: f64,
    sigma: f64,
}

impl SyntheticDataGenerator {
    /// Create a new generator with a seed for reproducibility
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            base_price: 4800.0,
            drift: 0.00002,
            sigma: 0.0007,
        }
    }

    pub fn with_base_price(mut self, base_price: f64) -> Self {
        self.base_price = base_price;
        self
    }

    pub fn with_sigma(mut self, sigma: f64) -> Self {
        self.sigma = sigma;
        self
    }

    /// Minute bars for every weekday session in `[start, end]`
    pub fn minute_bars(&mut self, start: NaiveDate, end: NaiveDate) -> Vec<Bar> {
        let mut bars = Vec::new();
        let mut price = self.base_price;
        let mut prev_close: Option<f64> = None;

        let mut day = start;
        while day <= end {
            if !matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
                for timestamp in session_minutes(day) {
                    price *= 1.0 + self.normal(self.drift, self.sigma);

                    let high = price * (1.0 + self.rng.gen::<f64>() * 0.0005);
                    let low = price * (1.0 - self.rng.gen::<f64>() * 0.0005);
                    let open = prev_close.unwrap_or(price);
                    let volume = self.rng.gen_range(1..50);

                    bars.push(Bar {
                        timestamp,
                        open,
                        // Keep the bar internally consistent when open gaps outside the range
                        high: high.max(open),
                        low: low.min(open),
                        close: price,
                        volume,
                    });
                    prev_close = Some(price);
                }
            }
            day = match day.succ_opt() {
                Some(next) => next,
                None => break,
            };
        }

        bars
    }

    /// Minute bars for `days` consecutive weekday sessions from the default start
    pub fn minute_bars_for_days(&mut self, days: usize) -> Vec<Bar> {
        if days == 0 {
            return Vec::new();
        }
        let (y, m, d) = DEFAULT_START;
        let start = NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default();

        let mut end = start;
        let mut sessions = 0;
        while sessions < days {
            if !matches!(end.weekday(), Weekday::Sat | Weekday::Sun) {
                sessions += 1;
            }
            if sessions < days {
                end = end.succ_opt().unwrap_or(end);
            }
        }

        self.minute_bars(start, end)
    }

    /// Box-Muller draw from N(mean, std)
    fn normal(&mut self, mean: f64, std: f64) -> f64 {
        let u1: f64 = self.rng.gen_range(f64::EPSILON..1.0);
        let u2: f64 = self.rng.gen();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std * z
    }
}

/// Split a minute bar into `per_minute` sub-bars whose aggregate reproduces it
///
/// The path walks linearly from open to close, touches the high a third of the
/// way through and the low two thirds through. Volume is spread evenly with the
/// remainder on the last sub-bar.
pub fn split_into_sub_bars(bar: &Bar, per_minute: usize) -> Vec<SubBar> {
    let n = per_minute.max(1);
    let step = Duration::seconds(60 / n as i64);
    let base_volume = bar.volume / n as u64;
    let minute = bar.minute();

    let mut out = Vec::with_capacity(n);
    let mut prev = bar.open;
    for k in 0..n {
        let close = bar.open + (bar.close - bar.open) * (k + 1) as f64 / n as f64;
        let mut high = prev.max(close);
        let mut low = prev.min(close);
        if k == n / 3 {
            high = bar.high;
        }
        if k == (2 * n) / 3 {
            low = bar.low;
        }
        let volume = if k == n - 1 {
            bar.volume - base_volume * (n as u64 - 1)
        } else {
            base_volume
        };

        out.push(SubBar {
            timestamp: minute + step * k as i32,
            open: prev,
            high,
            low,
            close,
            volume,
        });
        prev = close;
    }

    // Pin the final close to the minute close exactly
    if let Some(last) = out.last_mut() {
        last.close = bar.close;
    }

    out
}

/// Sub-bars for a whole series of minute bars, in order
pub fn sub_bars_for(bars: &[Bar], per_minute: usize) -> Vec<SubBar> {
    bars.iter()
        .flat_map(|b| split_into_sub_bars(b, per_minute))
        .collect()
}

fn session_minutes(day: NaiveDate) -> Vec<DateTime<Utc>> {
    let (Some(open), Some(close)) = (
        NaiveTime::from_hms_opt(14, 30, 0),
        NaiveTime::from_hms_opt(21, 0, 0),
    ) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    let mut t = Utc.from_utc_datetime(&day.and_time(open));
    let end = Utc.from_utc_datetime(&day.and_time(close));
    while t <= end {
        out.push(t);
        t += Duration::minutes(1);
    }
    out
}

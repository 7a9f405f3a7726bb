use super::{Features, Strategy};
use crate::config::StrategyConfig;
use crate::indicators::{breakout_signal, calculate_atr_series, rolling_volatility};
use crate::models::Bar;

/// Channel-breakout trend strategy
///
/// Direction comes from a sticky breakout of the `lookback`-bar high/low
/// channel; volatility is the rolling std-dev of returns over `vol_window` bars.
/// ATR is computed alongside for reporting.
#[derive(Debug, Clone)]
pub struct BreakoutStrategy {
    lookback: usize,
    atr_period: usize,
    vol_window: usize,
}

impl BreakoutStrategy {
    pub fn new(lookback: usize, atr_period: usize, vol_window: usize) -> Self {
        Self {
            lookback,
            atr_period,
            vol_window,
        }
    }

    pub fn from_config(config: &StrategyConfig) -> Self {
        Self::new(config.lookback, config.atr_period, config.vol_window)
    }

    pub fn lookback(&self) -> usize {
        self.lookback
    }
}

impl Default for BreakoutStrategy {
    fn default() -> Self {
        Self::from_config(&StrategyConfig::default())
    }
}

impl Strategy for BreakoutStrategy {
    fn features(&self, bars: &[Bar]) -> Features {
        Features {
            signal: breakout_signal(bars, self.lookback),
            volatility: rolling_volatility(bars, self.vol_window),
            atr: calculate_atr_series(bars, self.atr_period),
        }
    }

    fn name(&self) -> &str {
        "BreakoutStrategy"
    }

    fn min_bars_required(&self) -> usize {
        // Channel window plus a small buffer
        self.lookback + 5
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn trending_bars(n: usize) -> Vec<Bar> {
        let start = Utc.with_ymd_and_hms(2024, 1, 2, 14, 30, 0).unwrap();
        (0..n)
            .map(|i| {
                let c = 100.0 + i as f64 * 0.5 + if i % 2 == 0 { 0.1 } else { -0.1 };
                Bar::new(start + chrono::Duration::minutes(i as i64), c, c + 0.2, c - 0.2, c, 5)
            })
            .collect()
    }

    #[test]
    fn test_features_are_aligned() {
        let bars = trending_bars(80);
        let strategy = BreakoutStrategy::new(20, 14, 60);
        let f = strategy.features(&bars);

        assert_eq!(f.signal.len(), 80);
        assert_eq!(f.volatility.len(), 80);
        assert_eq!(f.atr.len(), 80);
        assert!(f.volatility.iter().all(|v| v.is_finite() && *v > 0.0));
    }

    #[test]
    fn test_uptrend_goes_long() {
        let bars = trending_bars(60);
        let strategy = BreakoutStrategy::new(10, 14, 20);
        let (signal, _) = strategy.features(&bars).last().unwrap();
        assert_eq!(signal, 1);
    }

    #[test]
    fn test_min_bars_required() {
        let strategy = BreakoutStrategy::new(20, 14, 60);
        assert_eq!(strategy.min_bars_required(), 25);
        assert_eq!(strategy.name(), "BreakoutStrategy");
    }

    #[test]
    fn test_empty_history() {
        let f = BreakoutStrategy::default().features(&[]);
        assert!(f.is_empty());
        assert!(f.last().is_none());
    }
}

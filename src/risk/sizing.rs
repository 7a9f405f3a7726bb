use crate::config::{AppConfig, TradingCalendar};
use crate::error::TrendError;
use crate::Result;

/// Bound on |target_bar_vol / volatility| before scaling
pub const DEFAULT_CLIP: f64 = 10.0;

/// Volatility at or below this is treated as degenerate (flat position)
pub const MIN_VOLATILITY: f64 = 1e-12;

/// Volatility-targeting position sizer
///
/// `target = round(k * signal * clip(target_bar_vol / vol, -C, C))` where
/// `target_bar_vol = target_annual_vol * sqrt(1 / bars_per_year)`. Zero, NaN or
/// non-finite volatility sizes to 0. Rounding is half-to-even.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionSizer {
    target_annual_vol: f64,
    scale: f64,
    clip: f64,
    bars_per_year: f64,
}

impl PositionSizer {
    pub fn new(target_annual_vol: f64, scale: f64, calendar: &TradingCalendar) -> Result<Self> {
        if !(target_annual_vol > 0.0) {
            return Err(TrendError::Config(format!(
                "target annual volatility must be positive, got {}",
                target_annual_vol
            )));
        }
        if !(calendar.bars_per_year > 0.0) {
            return Err(TrendError::Config(format!(
                "bars_per_year must be positive, got {}",
                calendar.bars_per_year
            )));
        }

        Ok(Self {
            target_annual_vol,
            scale,
            clip: DEFAULT_CLIP,
            bars_per_year: calendar.bars_per_year,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Self::new(
            config.strategy.vol_target_annual,
            config.strategy.scale,
            &config.calendar,
        )
    }

    /// Per-bar volatility target
    pub fn target_bar_vol(&self) -> f64 {
        self.target_annual_vol * (1.0 / self.bars_per_year).sqrt()
    }

    /// Target contracts for a single bar
    pub fn target_for(&self, signal: i8, volatility: f64) -> i64 {
        if !volatility.is_finite() || volatility <= MIN_VOLATILITY {
            return 0;
        }

        let leverage = (self.target_bar_vol() / volatility).clamp(-self.clip, self.clip);
        let raw = self.scale * f64::from(signal) * leverage;
        let rounded = raw.round_ties_even();
        if rounded.is_finite() {
            rounded as i64
        } else {
            0
        }
    }

    /// Target contracts per bar for aligned signal and volatility series
    pub fn target_positions(&self, signals: &[i8], volatility: &[f64]) -> Result<Vec<i64>> {
        if signals.len() != volatility.len() {
            return Err(TrendError::Data(format!(
                "signal length {} does not match volatility length {}",
                signals.len(),
                volatility.len()
            )));
        }

        Ok(signals
            .iter()
            .zip(volatility)
            .map(|(&s, &v)| self.target_for(s, v))
            .collect())
    }
}

/// Hard risk cap applied to live targets
pub fn clamp_to_risk_cap(target: i64, max_contracts: i64) -> i64 {
    let cap = max_contracts.abs();
    target.clamp(-cap, cap)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sizer() -> PositionSizer {
        PositionSizer::new(0.10, 1.0, &TradingCalendar::default()).unwrap()
    }

    #[test]
    fn test_zero_and_undefined_volatility_are_flat() {
        let s = sizer();
        assert_eq!(s.target_for(1, 0.0), 0);
        assert_eq!(s.target_for(-1, f64::NAN), 0);
        assert_eq!(s.target_for(1, f64::INFINITY), 0);
        assert_eq!(s.target_for(1, 1e-15), 0);
    }

    #[test]
    fn test_clip_bounds_position() {
        let s = sizer();
        // Tiny but valid volatility -> ratio clipped at 10
        assert_eq!(s.target_for(1, 1e-9), 10);
        assert_eq!(s.target_for(-1, 1e-9), -10);
    }

    #[test]
    fn test_vol_targeting_scales_inversely() {
        let s = sizer();
        let bar_vol = s.target_bar_vol();
        assert_eq!(s.target_for(1, bar_vol), 1);
        assert_eq!(s.target_for(1, bar_vol / 3.0), 3);
        assert_eq!(s.target_for(-1, bar_vol / 3.0), -3);
        // Ratio 0.4 rounds to 0
        assert_eq!(s.target_for(1, bar_vol / 0.4), 0);
    }

    #[test]
    fn test_round_half_to_even() {
        // bars_per_year = 4 keeps every quantity exactly representable
        let cal = TradingCalendar { bars_per_year: 4.0 };

        // bar vol 0.625 / 0.25 = 2.5 -> 2
        let s = PositionSizer::new(1.25, 1.0, &cal).unwrap();
        assert_eq!(s.target_for(1, 0.25), 2);

        // bar vol 0.875 / 0.25 = 3.5 -> 4
        let s = PositionSizer::new(1.75, 1.0, &cal).unwrap();
        assert_eq!(s.target_for(1, 0.25), 4);
        assert_eq!(s.target_for(-1, 0.25), -4);
    }

    #[test]
    fn test_zero_signal_is_flat() {
        assert_eq!(sizer().target_for(0, 1e-6), 0);
    }

    #[test]
    fn test_scale_factor() {
        let s = PositionSizer::new(0.10, 2.0, &TradingCalendar::default()).unwrap();
        assert_eq!(s.target_for(1, 1e-9), 20);
    }

    #[test]
    fn test_target_bar_vol_uses_calendar() {
        let cal = TradingCalendar { bars_per_year: 100.0 };
        let s = PositionSizer::new(0.5, 1.0, &cal).unwrap();
        assert!((s.target_bar_vol() - 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_bad_parameters() {
        assert!(PositionSizer::new(0.0, 1.0, &TradingCalendar::default()).is_err());
        let cal = TradingCalendar { bars_per_year: 0.0 };
        assert!(PositionSizer::new(0.1, 1.0, &cal).is_err());
    }

    #[test]
    fn test_series_length_mismatch() {
        let result = sizer().target_positions(&[1, 1], &[0.001]);
        assert!(matches!(result, Err(TrendError::Data(_))));
    }

    #[test]
    fn test_risk_cap() {
        assert_eq!(clamp_to_risk_cap(7, 1), 1);
        assert_eq!(clamp_to_risk_cap(-7, 2), -2);
        assert_eq!(clamp_to_risk_cap(0, 0), 0);
        assert_eq!(clamp_to_risk_cap(1, 0), 0);
    }
}

use chrono::Utc;

use crate::error::TrendError;
use crate::models::Bar;
use crate::Result;

/// Validates OHLCV bar data for sanity and correctness
#[derive(Debug, Default, Clone, Copy)]
pub struct BarValidator;

impl BarValidator {
    pub fn new() -> Self {
        Self
    }

    /// Validate a bar for correctness
    pub fn validate(&self, bar: &Bar) -> Result<()> {
        self.validate_prices(bar)?;
        self.validate_timestamp(bar)?;
        self.validate_ohlc_relationship(bar)?;
        Ok(())
    }

    /// Validate that all prices are positive and finite
    fn validate_prices(&self, bar: &Bar) -> Result<()> {
        for (name, value) in [
            ("open", bar.open),
            ("high", bar.high),
            ("low", bar.low),
            ("close", bar.close),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(TrendError::Data(format!(
                    "Invalid {} price {} at {}",
                    name, value, bar.timestamp
                )));
            }
        }
        Ok(())
    }

    /// Validate that timestamp is not in the future
    fn validate_timestamp(&self, bar: &Bar) -> Result<()> {
        let now = Utc::now();
        if bar.timestamp > now {
            return Err(TrendError::Data(format!(
                "Bar timestamp is in the future: {} (now: {})",
                bar.timestamp, now
            )));
        }
        Ok(())
    }

    /// Validate OHLC relationships (high >= low, open/close inside the range)
    fn validate_ohlc_relationship(&self, bar: &Bar) -> Result<()> {
        if bar.high < bar.low {
            return Err(TrendError::Data(format!(
                "High ({}) is less than low ({}) at {}",
                bar.high, bar.low, bar.timestamp
            )));
        }
        if bar.open > bar.high || bar.open < bar.low {
            return Err(TrendError::Data(format!(
                "Open ({}) outside [{}, {}] at {}",
                bar.open, bar.low, bar.high, bar.timestamp
            )));
        }
        if bar.close > bar.high || bar.close < bar.low {
            return Err(TrendError::Data(format!(
                "Close ({}) outside [{}, {}] at {}",
                bar.close, bar.low, bar.high, bar.timestamp
            )));
        }
        Ok(())
    }
}

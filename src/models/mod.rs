use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// One-minute OHLCV bar
///
/// Also used for sub-minute bars streamed by the broker; the aggregator decides
/// which minute a bar belongs to from its timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

/// Sub-minute bar from the real-time stream (nominally 5 seconds)
pub type SubBar = Bar;

impl Bar {
    pub fn new(
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: u64,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Timestamp floored to the start of its minute
    pub fn minute(&self) -> DateTime<Utc> {
        floor_to_minute(self.timestamp)
    }
}

pub fn floor_to_minute(ts: DateTime<Utc>) -> DateTime<Utc> {
    // Rounding only fails for out-of-range timestamps; fall back to the raw value.
    ts.duration_trunc(TimeDelta::minutes(1)).unwrap_or(ts)
}

/// Order direction
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Side that moves a position by `delta` contracts (`None` when delta is zero)
    pub fn for_delta(delta: i64) -> Option<Self> {
        match delta.signum() {
            1 => Some(OrderSide::Buy),
            -1 => Some(OrderSide::Sell),
            _ => None,
        }
    }

    pub fn sign(&self) -> i64 {
        match self {
            OrderSide::Buy => 1,
            OrderSide::Sell => -1,
        }
    }
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

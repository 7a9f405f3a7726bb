// Trading strategy module
pub mod breakout;

pub use breakout::BreakoutStrategy;

use crate::models::Bar;

/// Per-bar feature series produced by a strategy, aligned with the input bars
///
/// `signal` is in {-1, 0, +1}. `volatility` may hold NaN or zero where no
/// estimate exists; the sizer turns those into a flat position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Features {
    pub signal: Vec<i8>,
    pub volatility: Vec<f64>,
    pub atr: Vec<f64>,
}

impl Features {
    pub fn len(&self) -> usize {
        self.signal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signal.is_empty()
    }

    /// Signal and volatility of the most recent bar
    pub fn last(&self) -> Option<(i8, f64)> {
        Some((*self.signal.last()?, *self.volatility.last()?))
    }

    pub fn last_atr(&self) -> Option<f64> {
        self.atr.last().copied().filter(|v| v.is_finite())
    }
}

/// Pluggable signal source shared by the batch and live paths
///
/// Both paths must call the same implementation so a live decision on bar t
/// reproduces the batch target for bar t.
pub trait Strategy: Send + Sync {
    /// Compute features over the full bar history
    fn features(&self, bars: &[Bar]) -> Features;

    /// Get strategy name
    fn name(&self) -> &str;

    /// Minimum bars before the live loop starts acting on signals
    fn min_bars_required(&self) -> usize;
}

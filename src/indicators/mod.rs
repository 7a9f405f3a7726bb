// Technical indicators module
// ATR, channel breakout (with sticky fold) and rolling return volatility

pub mod atr;
pub mod breakout;
pub mod volatility;

pub use atr::{calculate_atr, calculate_atr_series, true_range_series};
pub use breakout::{breakout_signal, raw_breakouts, sticky};
pub use volatility::{pct_returns, rolling_volatility, sample_std};

// Risk management module
pub mod sizing;

pub use sizing::{clamp_to_risk_cap, PositionSizer, DEFAULT_CLIP, MIN_VOLATILITY};

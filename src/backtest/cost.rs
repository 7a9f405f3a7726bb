use serde::{Deserialize, Serialize};

use crate::config::AppConfig;

/// Transaction cost model for futures contracts
///
/// cost = (fee_per_contract + slippage_ticks * tick_value) * |contracts traded|
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostModel {
    pub fee_per_contract: f64,
    pub slippage_ticks: u32,
    pub tick_value: f64,
    pub tick_size: f64,
}

impl Default for CostModel {
    fn default() -> Self {
        Self {
            fee_per_contract: 1.20,
            slippage_ticks: 1,
            tick_value: 1.25,
            tick_size: 0.25,
        }
    }
}

impl CostModel {
    pub fn new(fee_per_contract: f64, slippage_ticks: u32, tick_value: f64, tick_size: f64) -> Self {
        Self {
            fee_per_contract,
            slippage_ticks,
            tick_value,
            tick_size,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.backtest.fees_per_contract,
            config.backtest.slippage_ticks,
            config.instrument.tick_value,
            config.instrument.tick_size,
        )
    }

    pub fn frictionless(tick_value: f64, tick_size: f64) -> Self {
        Self::new(0.0, 0, tick_value, tick_size)
    }

    /// Dollar cost of changing the position by `trade` contracts
    pub fn cost(&self, trade: i64) -> f64 {
        let turnover = trade.unsigned_abs() as f64;
        let fees = self.fee_per_contract * turnover;
        let slippage = f64::from(self.slippage_ticks) * self.tick_value * turnover;
        fees + slippage
    }
}

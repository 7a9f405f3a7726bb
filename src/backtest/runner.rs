use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::backtest::cost::CostModel;
use crate::backtest::metrics::{summarize, PerformanceSummary};
use crate::config::AppConfig;
use crate::error::TrendError;
use crate::models::Bar;
use crate::risk::PositionSizer;
use crate::strategy::Strategy;
use crate::Result;

/// One row of the per-bar equity breakdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityRow {
    pub timestamp: DateTime<Utc>,
    pub close: f64,
    /// Target decided at the close of this bar (held during the next one)
    pub position: i64,
    pub trade: i64,
    pub pnl_dollars: f64,
    pub costs: f64,
    pub pnl_after_costs: f64,
    pub equity: f64,
}

/// Per-bar equity curve of a simulated run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EquityCurve {
    pub rows: Vec<EquityRow>,
}

impl EquityCurve {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn final_equity(&self) -> f64 {
        self.rows.last().map(|r| r.equity).unwrap_or(0.0)
    }

    pub fn pnl_after_costs(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.pnl_after_costs).collect()
    }

    pub fn equity(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.equity).collect()
    }
}

/// Replay closes against a target-position series
///
/// The position decided at the close of bar t-1 earns bar t's price move; the
/// first bar enters from flat and earns nothing.
pub fn simulate(bars: &[Bar], positions: &[i64], cost_model: &CostModel) -> Result<EquityCurve> {
    if bars.len() != positions.len() {
        return Err(TrendError::Data(format!(
            "{} bars but {} positions",
            bars.len(),
            positions.len()
        )));
    }

    let mut rows = Vec::with_capacity(bars.len());
    let mut prev_close: Option<f64> = None;
    let mut prev_position = 0i64;
    let mut equity = 0.0;

    for (bar, &position) in bars.iter().zip(positions) {
        let move_ticks = prev_close
            .map(|pc| (bar.close - pc) / cost_model.tick_size)
            .unwrap_or(0.0);
        let pnl_dollars = prev_position as f64 * move_ticks * cost_model.tick_value;

        let trade = position - prev_position;
        let costs = cost_model.cost(trade);
        let pnl_after_costs = pnl_dollars - costs;
        equity += pnl_after_costs;

        rows.push(EquityRow {
            timestamp: bar.timestamp,
            close: bar.close,
            position,
            trade,
            pnl_dollars,
            costs,
            pnl_after_costs,
            equity,
        });

        prev_close = Some(bar.close);
        prev_position = position;
    }

    Ok(EquityCurve { rows })
}

/// Output of a full batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    pub strategy: String,
    pub curve: EquityCurve,
    pub summary: PerformanceSummary,
}

/// Batch pipeline: features -> sizer -> simulator -> metrics
pub struct BacktestRunner {
    sizer: PositionSizer,
    cost_model: CostModel,
    annualization_bars: f64,
}

impl BacktestRunner {
    pub fn new(sizer: PositionSizer, cost_model: CostModel, annualization_bars: f64) -> Self {
        Self {
            sizer,
            cost_model,
            annualization_bars,
        }
    }

    /// Sizer, costs and annualization from config
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Ok(Self::new(
            PositionSizer::from_config(config)?,
            CostModel::from_config(config),
            config.calendar.bars_per_year,
        ))
    }

    /// Run a backtest of `strategy` over `bars`
    pub fn run<S: Strategy>(&self, strategy: &S, bars: &[Bar]) -> Result<BacktestResult> {
        if bars.is_empty() {
            return Err(TrendError::Data("no bars to backtest".into()));
        }

        tracing::info!(
            strategy = strategy.name(),
            bars = bars.len(),
            "Starting backtest"
        );

        let features = strategy.features(bars);
        let positions = self
            .sizer
            .target_positions(&features.signal, &features.volatility)?;
        let curve = simulate(bars, &positions, &self.cost_model)?;
        let summary = summarize(&curve, self.annualization_bars);

        tracing::info!(
            "Backtest complete: {} trades, P&L: ${:.2}, max DD: ${:.2}",
            summary.num_trades,
            summary.total_pnl,
            summary.max_drawdown
        );

        Ok(BacktestResult {
            strategy: strategy.name().to_string(),
            curve,
            summary,
        })
    }
}

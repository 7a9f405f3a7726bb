use serde::{Deserialize, Serialize};

use crate::backtest::runner::EquityCurve;
use crate::indicators::sample_std;

/// Guard against a zero denominator in the Sharpe ratio
const SHARPE_EPSILON: f64 = 1e-9;

/// Summary statistics of a simulated equity curve
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub sharpe_approx: f64,
    #[serde(rename = "max_drawdown_$")]
    pub max_drawdown: f64,
    #[serde(rename = "total_pnl_$")]
    pub total_pnl: f64,
    pub num_trades: usize,
}

/// Summarize an equity curve
///
/// `annualization_bars` is the number of bars per year; the Sharpe ratio is
/// scaled by its square root. Drawdown is reported as a non-positive dollar
/// amount.
pub fn summarize(curve: &EquityCurve, annualization_bars: f64) -> PerformanceSummary {
    let pnl = curve.pnl_after_costs();
    let equity = curve.equity();

    PerformanceSummary {
        sharpe_approx: sharpe_approx(&pnl, annualization_bars),
        max_drawdown: max_drawdown(&equity),
        total_pnl: curve.final_equity(),
        num_trades: curve.rows.iter().filter(|r| r.trade != 0).count(),
    }
}

/// mean / (std + eps) * sqrt(annualization); 0 for fewer than two observations
pub fn sharpe_approx(pnl: &[f64], annualization_bars: f64) -> f64 {
    if pnl.len() < 2 {
        return 0.0;
    }

    let mean = pnl.iter().sum::<f64>() / pnl.len() as f64;
    let std = sample_std(pnl);

    (mean / (std + SHARPE_EPSILON)) * annualization_bars.max(0.0).sqrt()
}

/// Most negative distance of equity below its running peak
pub fn max_drawdown(equity: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut worst = 0.0_f64;

    for &value in equity {
        peak = peak.max(value);
        worst = worst.min(value - peak);
    }

    worst
}

impl PerformanceSummary {
    /// Print a formatted report to stdout
    pub fn print_report(&self) {
        println!("\n| Metric         | Value        |");
        println!("|----------------|--------------|");
        println!("| sharpe_approx  | {:>12.4} |", self.sharpe_approx);
        println!("| max_drawdown_$ | {:>12.2} |", self.max_drawdown);
        println!("| total_pnl_$    | {:>12.2} |", self.total_pnl);
        println!("| num_trades     | {:>12} |", self.num_trades);
    }
}

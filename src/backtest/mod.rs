pub mod cost;
pub mod metrics;
pub mod report;
pub mod runner;
pub mod synthetic;

pub use cost::CostModel;
pub use metrics::{max_drawdown, sharpe_approx, summarize, PerformanceSummary};
pub use report::{save_artifacts, write_equity_csv};
pub use runner::{simulate, BacktestResult, BacktestRunner, EquityCurve, EquityRow};
pub use synthetic::{split_into_sub_bars, sub_bars_for, SyntheticDataGenerator};

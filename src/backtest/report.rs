use std::path::{Path, PathBuf};

use crate::backtest::runner::{BacktestResult, EquityCurve};
use crate::Result;

pub const EQUITY_FILE: &str = "equity_curve.csv";
pub const METRICS_FILE: &str = "metrics.json";

/// Write the per-bar equity breakdown as CSV
pub fn write_equity_csv<W: std::io::Write>(curve: &EquityCurve, writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for row in &curve.rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Save `equity_curve.csv` and `metrics.json` under `dir`
///
/// Returns the paths written, equity file first.
pub fn save_artifacts(result: &BacktestResult, dir: &Path) -> Result<(PathBuf, PathBuf)> {
    std::fs::create_dir_all(dir)?;

    let equity_path = dir.join(EQUITY_FILE);
    let file = std::fs::File::create(&equity_path)?;
    write_equity_csv(&result.curve, file)?;

    let metrics_path = dir.join(METRICS_FILE);
    let json = serde_json::to_string_pretty(&result.summary)?;
    std::fs::write(&metrics_path, json)?;

    tracing::info!(
        dir = %dir.display(),
        rows = result.curve.len(),
        "Saved backtest artifacts"
    );

    Ok((equity_path, metrics_path))
}

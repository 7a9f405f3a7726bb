//! Bar-table loading
//!
//! Reads a CSV with `timestamp,open,high,low,close,volume` columns (any order,
//! case-insensitive, extra columns ignored), anchors every timestamp in UTC,
//! sorts ascending, drops duplicate timestamps keeping the first occurrence and
//! trims to the requested date range. An unparseable row, or an invalid bar that
//! survives de-duplication and trimming, aborts the load.

use std::io::Read;
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

use crate::backtest::synthetic::SyntheticDataGenerator;
use crate::config::AppConfig;
use crate::data::validator::BarValidator;
use crate::error::TrendError;
use crate::execution::session::SessionGate;
use crate::models::Bar;
use crate::Result;

/// Seed for the synthetic fallback series
pub const SYNTHETIC_SEED: u64 = 42;

pub const REQUIRED_COLUMNS: [&str; 6] = ["timestamp", "open", "high", "low", "close", "volume"];

/// Post-load normalization options
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// First date kept (inclusive, UTC)
    pub start: Option<NaiveDate>,
    /// Last date kept (UTC). The whole day is kept through 23:59:59.999, not
    /// just the bar stamped at midnight.
    pub end: Option<NaiveDate>,
    /// Keep only bars inside this session window
    pub session: Option<SessionGate>,
}

impl LoadOptions {
    /// Date range and (when `market.rth_only`) session filter from config
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let session = if config.market.rth_only {
            Some(SessionGate::from_market(&config.market)?)
        } else {
            None
        };
        Ok(Self {
            start: config.backtest.start,
            end: config.backtest.end,
            session,
        })
    }
}

/// Bars for a backtest run
///
/// Reads `backtest.data_path` when set (a missing file is an error); otherwise
/// generates a seeded synthetic series over the configured date range.
pub fn load_backtest_bars(config: &AppConfig) -> Result<Vec<Bar>> {
    let options = LoadOptions::from_config(config)?;

    if let Some(path) = config.backtest.data_path.as_deref() {
        return load_minute_bars(Path::new(path), &options);
    }

    let start = config
        .backtest
        .start
        .or_else(|| NaiveDate::from_ymd_opt(2022, 1, 3))
        .ok_or_else(|| TrendError::Data("invalid synthetic start date".to_string()))?;
    let end = config
        .backtest
        .end
        .or_else(|| NaiveDate::from_ymd_opt(2022, 12, 30))
        .ok_or_else(|| TrendError::Data("invalid synthetic end date".to_string()))?;

    let bars = SyntheticDataGenerator::new(SYNTHETIC_SEED).minute_bars(start, end);
    let raw_count = bars.len();
    let bars = normalize(bars, &options);

    tracing::info!(
        %start,
        %end,
        raw = raw_count,
        kept = bars.len(),
        "No data_path configured, using synthetic minute bars"
    );

    Ok(bars)
}

/// Load minute bars from a CSV file
pub fn load_minute_bars(path: &Path, options: &LoadOptions) -> Result<Vec<Bar>> {
    let file = std::fs::File::open(path).map_err(|e| {
        TrendError::Data(format!("cannot open bar table {}: {}", path.display(), e))
    })?;
    let bars = read_bars(file)?;
    let raw_count = bars.len();
    let bars = normalize(bars, options);
    validate_bars(&bars)?;

    tracing::info!(
        path = %path.display(),
        raw = raw_count,
        kept = bars.len(),
        "Loaded minute bars"
    );

    Ok(bars)
}

/// Parse every row of a bar table
///
/// Rows are only parsed here; `validate_bars` runs once duplicates are gone.
pub fn read_bars<R: Read>(reader: R) -> Result<Vec<Bar>> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

    let headers = rdr.headers()?.clone();
    let lowered: Vec<String> = headers.iter().map(|h| h.to_ascii_lowercase()).collect();
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|c| !lowered.iter().any(|h| h == c))
        .collect();
    if !missing.is_empty() {
        return Err(TrendError::Data(format!(
            "Data missing required columns: {:?}. Found: {:?}",
            missing,
            headers.iter().collect::<Vec<_>>()
        )));
    }

    let index_of = |name: &str| lowered.iter().position(|h| h == name).unwrap_or(usize::MAX);
    let [ts_i, open_i, high_i, low_i, close_i, vol_i] = REQUIRED_COLUMNS.map(index_of);

    let mut bars = Vec::new();

    for (line, record) in rdr.records().enumerate() {
        let record = record?;
        // Header is line 1
        let row = line + 2;
        let field = |i: usize| record.get(i).unwrap_or("");

        let bar = Bar {
            timestamp: parse_timestamp(field(ts_i))
                .map_err(|e| TrendError::Data(format!("row {}: {}", row, e)))?,
            open: parse_number(field(open_i), "open", row)?,
            high: parse_number(field(high_i), "high", row)?,
            low: parse_number(field(low_i), "low", row)?,
            close: parse_number(field(close_i), "close", row)?,
            volume: parse_volume(field(vol_i), row)?,
        };
        bars.push(bar);
    }

    Ok(bars)
}

/// Check every bar for sane prices and OHLC ordering
pub fn validate_bars(bars: &[Bar]) -> Result<()> {
    let validator = BarValidator::new();
    bars.iter().try_for_each(|bar| validator.validate(bar))
}

/// Sort, de-duplicate and trim loaded bars
pub fn normalize(mut bars: Vec<Bar>, options: &LoadOptions) -> Vec<Bar> {
    // Stable sort keeps file order among equal timestamps, so dedup keeps the first
    bars.sort_by_key(|b| b.timestamp);
    bars.dedup_by_key(|b| b.timestamp);

    let start = options
        .start
        .map(|d| Utc.from_utc_datetime(&d.and_time(NaiveTime::MIN)));
    let end = options.end.and_then(|d| {
        NaiveTime::from_hms_nano_opt(23, 59, 59, 999_999_999)
            .map(|t| Utc.from_utc_datetime(&d.and_time(t)))
    });

    bars.retain(|b| {
        start.map_or(true, |s| b.timestamp >= s)
            && end.map_or(true, |e| b.timestamp <= e)
            && options
                .session
                .as_ref()
                .map_or(true, |gate| gate.is_open(b.timestamp))
    });

    bars
}

/// Parse a timestamp into UTC
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM[:SS][+HH:MM]`, naive forms (taken as UTC)
/// and integer epoch seconds.
pub fn parse_timestamp(s: &str) -> std::result::Result<DateTime<Utc>, String> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%:z", "%Y-%m-%d %H:%M:%S%z", "%Y-%m-%d %H:%M%:z"] {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Ok(dt.with_timezone(&Utc));
        }
    }
    for fmt in [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(secs) = s.parse::<i64>() {
        if let Some(dt) = DateTime::from_timestamp(secs, 0) {
            return Ok(dt);
        }
    }
    Err(format!("unparsable timestamp {:?}", s))
}

fn parse_number(s: &str, column: &str, row: usize) -> Result<f64> {
    s.parse::<f64>()
        .map_err(|_| TrendError::Data(format!("row {}: invalid {} value {:?}", row, column, s)))
}

fn parse_volume(s: &str, row: usize) -> Result<u64> {
    let value = parse_number(s, "volume", row)?;
    if !value.is_finite() || value < 0.0 {
        return Err(TrendError::Data(format!(
            "row {}: invalid volume {}",
            row, value
        )));
    }
    Ok(value.round() as u64)
}

use std::path::Path;

use chrono::{NaiveDate, NaiveTime};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::TrendError;
use crate::Result;

/// Minute bars in a regular session over a trading year (252 days x 6.5h x 60)
pub const RTH_BARS_PER_YEAR: f64 = 252.0 * 6.5 * 60.0;

/// Prefix for environment overrides, e.g. `TRENDBOT__RISK__MAX_CONTRACTS=2`
pub const ENV_PREFIX: &str = "TRENDBOT";

/// Full application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub strategy: StrategyConfig,
    pub market: MarketConfig,
    pub risk: RiskConfig,
    pub backtest: BacktestConfig,
    pub instrument: InstrumentConfig,
    pub calendar: TradingCalendar,
    pub broker: BrokerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    pub atr_period: usize,
    pub lookback: usize,
    pub vol_target_annual: f64,
    /// Rolling window (bars) for the return std-dev volatility estimate
    pub vol_window: usize,
    /// Scale factor k applied to the vol-targeted position
    pub scale: f64,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            atr_period: 14,
            lookback: 20,
            vol_target_annual: 0.10,
            vol_window: 60,
            scale: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    pub symbol: String,
    pub exchange: String,
    pub timezone: String,
    pub rth_only: bool,
    pub rth_start: String,
    pub rth_end: String,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            symbol: "MNQ".to_string(),
            exchange: "CME".to_string(),
            timezone: "America/Chicago".to_string(),
            rth_only: true,
            rth_start: "08:30".to_string(),
            rth_end: "15:00".to_string(),
        }
    }
}

impl MarketConfig {
    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| TrendError::Config(format!("unknown timezone {}: {}", self.timezone, e)))
    }

    pub fn session_start(&self) -> Result<NaiveTime> {
        parse_hhmm(&self.rth_start)
    }

    pub fn session_end(&self) -> Result<NaiveTime> {
        parse_hhmm(&self.rth_end)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub max_contracts: i64,
    pub flatten_at_end: bool,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_contracts: 1,
            flatten_at_end: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub fees_per_contract: f64,
    pub slippage_ticks: u32,
    /// CSV bar table; synthetic bars are generated when unset
    pub data_path: Option<String>,
    pub artifacts_dir: String,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            start: None,
            end: None,
            fees_per_contract: 1.20,
            slippage_ticks: 1,
            data_path: None,
            artifacts_dir: "artifacts".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InstrumentConfig {
    pub tick_value: f64,
    pub tick_size: f64,
}

impl Default for InstrumentConfig {
    fn default() -> Self {
        Self {
            tick_value: 1.25,
            tick_size: 0.25,
        }
    }
}

/// Trading-calendar constants used for per-bar vol targeting and annualization
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TradingCalendar {
    pub bars_per_year: f64,
}

impl Default for TradingCalendar {
    fn default() -> Self {
        Self {
            bars_per_year: RTH_BARS_PER_YEAR,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub client_id: u32,
    /// Upper bound on waiting for an order to reach a terminal state
    pub fill_timeout_secs: u64,
    pub poll_interval_ms: u64,
    /// Minute bars requested to seed the live history
    pub history_bars: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 7497,
            client_id: 123,
            fill_timeout_secs: 30,
            poll_interval_ms: 100,
            history_bars: 2880,
        }
    }
}

impl AppConfig {
    /// Load config from a TOML/YAML file layered with `TRENDBOT__*` env overrides
    ///
    /// A missing file is only an error when `required` is set; every field has a
    /// default.
    pub fn load(path: &Path, required: bool) -> Result<Self> {
        dotenvy::dotenv().ok();

        let settings = config::Config::builder()
            .add_source(config::File::from(path).required(required))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let cfg: AppConfig = settings.try_deserialize()?;
        cfg.validate()?;

        tracing::debug!(path = %path.display(), symbol = %cfg.market.symbol, "Loaded config");
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.strategy.lookback == 0 {
            return Err(TrendError::Config("strategy.lookback must be >= 1".into()));
        }
        if self.strategy.atr_period == 0 {
            return Err(TrendError::Config("strategy.atr_period must be >= 1".into()));
        }
        if self.strategy.vol_window < 2 {
            return Err(TrendError::Config("strategy.vol_window must be >= 2".into()));
        }
        if self.strategy.vol_target_annual <= 0.0 {
            return Err(TrendError::Config(
                "strategy.vol_target_annual must be positive".into(),
            ));
        }
        if self.instrument.tick_size <= 0.0 || self.instrument.tick_value <= 0.0 {
            return Err(TrendError::Config(
                "instrument.tick_size and tick_value must be positive".into(),
            ));
        }
        if self.calendar.bars_per_year <= 0.0 {
            return Err(TrendError::Config("calendar.bars_per_year must be positive".into()));
        }
        if self.risk.max_contracts < 0 {
            return Err(TrendError::Config("risk.max_contracts must be >= 0".into()));
        }
        if self.backtest.fees_per_contract < 0.0 {
            return Err(TrendError::Config("backtest.fees_per_contract must be >= 0".into()));
        }
        if let (Some(start), Some(end)) = (self.backtest.start, self.backtest.end) {
            if start > end {
                return Err(TrendError::Config(format!(
                    "backtest.start {} is after backtest.end {}",
                    start, end
                )));
            }
        }

        self.market.tz()?;
        let start = self.market.session_start()?;
        let end = self.market.session_end()?;
        if start > end {
            return Err(TrendError::Config(format!(
                "market.rth_start {} is after market.rth_end {}",
                self.market.rth_start, self.market.rth_end
            )));
        }

        Ok(())
    }
}

fn parse_hhmm(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s.trim(), "%H:%M:%S"))
        .map_err(|e| TrendError::Config(format!("invalid session time {:?}: {}", s, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = AppConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.calendar.bars_per_year, 98_280.0);
        assert_eq!(cfg.market.session_start().unwrap(), NaiveTime::from_hms_opt(8, 30, 0).unwrap());
    }

    #[test]
    fn test_rejects_inverted_session() {
        let mut cfg = AppConfig::default();
        cfg.market.rth_start = "16:00".to_string();
        assert!(matches!(cfg.validate(), Err(TrendError::Config(_))));
    }

    #[test]
    fn test_rejects_unknown_timezone() {
        let mut cfg = AppConfig::default();
        cfg.market.timezone = "Mars/Olympus".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_rejects_non_positive_vol_target() {
        let mut cfg = AppConfig::default();
        cfg.strategy.vol_target_annual = 0.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_load_partial_toml() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[strategy]\nlookback = 30\n\n[risk]\nmax_contracts = 3\n\n[backtest]\nstart = \"2022-01-03\""
        )
        .unwrap();

        let cfg = AppConfig::load(file.path(), true).unwrap();
        assert_eq!(cfg.strategy.lookback, 30);
        assert_eq!(cfg.strategy.atr_period, 14);
        assert_eq!(cfg.risk.max_contracts, 3);
        assert_eq!(cfg.backtest.start, NaiveDate::from_ymd_opt(2022, 1, 3));
        assert_eq!(cfg.instrument.tick_size, 0.25);
    }

    #[test]
    fn test_missing_optional_file_uses_defaults() {
        let cfg = AppConfig::load(Path::new("does/not/exist.toml"), false).unwrap();
        assert_eq!(cfg.market.symbol, "MNQ");
    }
}

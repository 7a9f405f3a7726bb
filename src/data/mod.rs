// Historical bar-table ingestion
pub mod loader;
pub mod validator;

pub use loader::{
    load_backtest_bars, load_minute_bars, normalize, parse_timestamp, read_bars, validate_bars,
    LoadOptions,
};
pub use validator::BarValidator;

use thiserror::Error;

/// Errors surfaced by the trading core
///
/// Data and config errors are fatal at load. Broker errors are reported by the
/// live loop and convergence is retried on the next bar.
#[derive(Debug, Error)]
pub enum TrendError {
    #[error("data error: {0}")]
    Data(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("broker connectivity error: {0}")]
    BrokerConnectivity(String),

    #[error("order submission error: {0}")]
    OrderSubmission(String),

    #[error("contract resolution error: {0}")]
    ContractResolution(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl From<config::ConfigError> for TrendError {
    fn from(e: config::ConfigError) -> Self {
        TrendError::Config(e.to_string())
    }
}

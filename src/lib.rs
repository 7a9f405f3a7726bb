// Core modules
pub mod backtest;
pub mod config;
pub mod data;
pub mod error;
pub mod execution;
pub mod indicators;
pub mod models;
pub mod risk;
pub mod strategy;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::TrendError;
pub use models::*;
pub use strategy::Strategy;

// Error handling
pub type Result<T> = std::result::Result<T, TrendError>;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TrendError;
use crate::Result;

/// Futures contract as described by the broker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractSpec {
    pub symbol: String,
    pub exchange: String,
    /// Broker-local contract id
    pub con_id: i64,
    /// `YYYYMM` or `YYYYMMDD`
    pub expiry: String,
    pub currency: String,
}

impl ContractSpec {
    pub fn new(symbol: &str, exchange: &str, con_id: i64, expiry: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            exchange: exchange.to_string(),
            con_id,
            expiry: expiry.to_string(),
            currency: "USD".to_string(),
        }
    }

    pub fn expiry_date(&self) -> Option<NaiveDate> {
        parse_expiry(&self.expiry)
    }
}

impl std::fmt::Display for ContractSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} @{}", self.symbol, self.expiry, self.exchange)
    }
}

/// Parse a contract expiry; month-only expiries are taken as the 28th
pub fn parse_expiry(expiry: &str) -> Option<NaiveDate> {
    let expiry = expiry.trim();
    if !expiry.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    match expiry.len() {
        8 => NaiveDate::parse_from_str(expiry, "%Y%m%d").ok(),
        6 => {
            let year = expiry[..4].parse().ok()?;
            let month = expiry[4..].parse().ok()?;
            NaiveDate::from_ymd_opt(year, month, 28)
        }
        _ => None,
    }
}

/// Pick the front month: the nearest expiry on or after `now`, else the earliest listed
pub fn select_front_contract(
    candidates: &[ContractSpec],
    now: DateTime<Utc>,
) -> Result<ContractSpec> {
    let today = now.date_naive();

    let dated: Vec<(NaiveDate, &ContractSpec)> = candidates
        .iter()
        .filter_map(|c| c.expiry_date().map(|d| (d, c)))
        .collect();

    let upcoming = dated
        .iter()
        .filter(|(d, _)| *d >= today)
        .min_by_key(|(d, _)| *d);
    let chosen = upcoming.or_else(|| dated.iter().min_by_key(|(d, _)| *d));

    match chosen {
        Some((_, contract)) => Ok((*contract).clone()),
        None => candidates.first().cloned().ok_or_else(|| {
            TrendError::ContractResolution("no contracts returned for symbol".to_string())
        }),
    }
}

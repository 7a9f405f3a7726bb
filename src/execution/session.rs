use chrono::{DateTime, NaiveTime, Utc};
use chrono_tz::Tz;

use crate::config::MarketConfig;
use crate::Result;

/// Regular-trading-hours window evaluated in the venue timezone
#[derive(Debug, Clone)]
pub struct SessionGate {
    tz: Tz,
    start: NaiveTime,
    end: NaiveTime,
    rth_only: bool,
}

impl SessionGate {
    pub fn new(tz: Tz, start: NaiveTime, end: NaiveTime, rth_only: bool) -> Self {
        Self {
            tz,
            start,
            end,
            rth_only,
        }
    }

    pub fn from_market(market: &MarketConfig) -> Result<Self> {
        Ok(Self::new(
            market.tz()?,
            market.session_start()?,
            market.session_end()?,
            market.rth_only,
        ))
    }

    /// Whether `ts` falls inside `[start, end]` local time (always true when not RTH-only)
    pub fn is_open(&self, ts: DateTime<Utc>) -> bool {
        if !self.rth_only {
            return true;
        }
        let local = ts.with_timezone(&self.tz).time();
        local >= self.start && local <= self.end
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }
}

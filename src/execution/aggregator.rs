use crate::models::{floor_to_minute, Bar, SubBar};

/// Folds a stream of sub-minute bars into one-minute bars
///
/// A minute is emitted only when the first sub-bar of a later minute arrives, so the
/// last minute of a stream stays in progress until `reset` or another sub-bar.
#[derive(Debug, Default, Clone)]
pub struct MinuteAggregator {
    // None while empty, otherwise the minute being accumulated
    current: Option<Bar>,
    dropped_late: u64,
}

impl MinuteAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one sub-bar, returning the finished bar when a new minute starts
    pub fn push(&mut self, sub_bar: &SubBar) -> Option<Bar> {
        let minute = floor_to_minute(sub_bar.timestamp);

        let Some(current) = self.current.as_mut() else {
            self.current = Some(Self::seed(minute, sub_bar));
            return None;
        };

        if minute == current.timestamp {
            current.high = current.high.max(sub_bar.high);
            current.low = current.low.min(sub_bar.low);
            current.close = sub_bar.close;
            current.volume += sub_bar.volume;
            return None;
        }

        if minute < current.timestamp {
            // The minute it belongs to has already been emitted
            self.dropped_late += 1;
            tracing::debug!(
                sub_bar = %sub_bar.timestamp,
                current = %current.timestamp,
                "Dropping late sub-bar"
            );
            return None;
        }

        self.current.replace(Self::seed(minute, sub_bar))
    }

    /// The in-progress minute, if any
    pub fn current(&self) -> Option<&Bar> {
        self.current.as_ref()
    }

    /// Number of sub-bars discarded because their minute was already closed
    pub fn dropped_late(&self) -> u64 {
        self.dropped_late
    }

    /// Discard any partial minute
    pub fn reset(&mut self) {
        self.current = None;
    }

    fn seed(minute: chrono::DateTime<chrono::Utc>, sub_bar: &SubBar) -> Bar {
        Bar::new(
            minute,
            sub_bar.open,
            sub_bar.high,
            sub_bar.low,
            sub_bar.close,
            sub_bar.volume,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, h, m, s).unwrap()
    }

    fn create_sub_bar(ts: DateTime<Utc>, o: f64, h: f64, l: f64, c: f64, v: u64) -> SubBar {
        Bar::new(ts, o, h, l, c, v)
    }

    #[test]
    fn test_first_sub_bar_is_adopted() {
        let mut agg = MinuteAggregator::new();
        assert!(agg
            .push(&create_sub_bar(at(9, 30, 5), 10.0, 11.0, 9.5, 10.5, 3))
            .is_none());

        let current = agg.current().unwrap();
        assert_eq!(current.timestamp, at(9, 30, 0));
        assert_eq!(current.open, 10.0);
    }

    #[test]
    fn test_minute_example() {
        let mut agg = MinuteAggregator::new();
        assert!(agg
            .push(&create_sub_bar(at(9, 30, 0), 10.0, 11.0, 9.0, 10.0, 5))
            .is_none());
        assert!(agg
            .push(&create_sub_bar(at(9, 30, 5), 10.0, 12.0, 10.0, 11.0, 3))
            .is_none());

        let bar = agg
            .push(&create_sub_bar(at(9, 31, 0), 11.0, 11.0, 11.0, 11.0, 1))
            .unwrap();

        assert_eq!(bar, Bar::new(at(9, 30, 0), 10.0, 12.0, 9.0, 11.0, 8));
        assert_eq!(agg.current().unwrap().timestamp, at(9, 31, 0));
    }

    #[test]
    fn test_gap_emits_previous_minute_only() {
        let mut agg = MinuteAggregator::new();
        agg.push(&create_sub_bar(at(9, 30, 0), 1.0, 1.0, 1.0, 1.0, 1));
        let bar = agg
            .push(&create_sub_bar(at(9, 45, 0), 2.0, 2.0, 2.0, 2.0, 1))
            .unwrap();

        // Missing minutes are never filled
        assert_eq!(bar.timestamp, at(9, 30, 0));
        assert_eq!(agg.current().unwrap().timestamp, at(9, 45, 0));
    }

    #[test]
    fn test_late_sub_bar_is_dropped() {
        let mut agg = MinuteAggregator::new();
        agg.push(&create_sub_bar(at(9, 30, 0), 10.0, 10.0, 10.0, 10.0, 1));
        agg.push(&create_sub_bar(at(9, 31, 0), 11.0, 11.0, 11.0, 11.0, 1));

        assert!(agg
            .push(&create_sub_bar(at(9, 30, 55), 50.0, 50.0, 1.0, 50.0, 9))
            .is_none());

        let current = agg.current().unwrap();
        assert_eq!(current.high, 11.0);
        assert_eq!(current.volume, 1);
        assert_eq!(agg.dropped_late(), 1);
    }

    #[test]
    fn test_reset() {
        let mut agg = MinuteAggregator::new();
        agg.push(&create_sub_bar(at(9, 30, 0), 10.0, 10.0, 10.0, 10.0, 1));
        agg.reset();
        assert!(agg.current().is_none());
    }
}

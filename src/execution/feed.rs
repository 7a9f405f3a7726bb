use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::execution::aggregator::MinuteAggregator;
use crate::models::{Bar, SubBar};

/// Counters reported by the minute feed when its input stream ends
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedStats {
    pub sub_bars: u64,
    pub bars_emitted: u64,
    pub late_dropped: u64,
}

/// Spawn the producer task that turns sub-bars into completed minute bars
///
/// Finished bars go to an unbounded queue so the producer never waits on the
/// consumer. The task ends when the sub-bar stream closes or the consumer hangs up;
/// a partial final minute is not emitted.
pub fn spawn_minute_feed(
    mut sub_bars: mpsc::Receiver<SubBar>,
) -> (mpsc::UnboundedReceiver<Bar>, JoinHandle<FeedStats>) {
    let (tx, rx) = mpsc::unbounded_channel();

    let handle = tokio::spawn(async move {
        let mut aggregator = MinuteAggregator::new();
        let mut stats = FeedStats::default();

        while let Some(sub_bar) = sub_bars.recv().await {
            stats.sub_bars += 1;
            if let Some(bar) = aggregator.push(&sub_bar) {
                tracing::debug!(minute = %bar.timestamp, close = bar.close, "Minute bar complete");
                if tx.send(bar).is_err() {
                    tracing::warn!("Bar consumer closed, stopping minute feed");
                    break;
                }
                stats.bars_emitted += 1;
            }
        }

        stats.late_dropped = aggregator.dropped_late();
        tracing::info!(
            sub_bars = stats.sub_bars,
            bars = stats.bars_emitted,
            late_dropped = stats.late_dropped,
            "Minute feed finished"
        );
        stats
    });

    (rx, handle)
}

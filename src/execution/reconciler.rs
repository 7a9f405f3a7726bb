use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, watch};

use crate::config::AppConfig;
use crate::error::TrendError;
use crate::execution::broker::{Broker, OrderHandle, OrderStatus};
use crate::execution::contract::ContractSpec;
use crate::execution::feed::spawn_minute_feed;
use crate::execution::session::SessionGate;
use crate::models::{Bar, OrderSide};
use crate::risk::sizing::{clamp_to_risk_cap, PositionSizer};
use crate::strategy::breakout::BreakoutStrategy;
use crate::strategy::Strategy;
use crate::Result;

/// What the reconciler decided to do with one completed bar
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionAction {
    /// Drive the account to this many contracts
    Adjust { target: i64 },
    Skip,
}

#[derive(Debug, Clone)]
pub struct ExecutionDecision {
    pub action: ExecutionAction,
    pub reason: String,
}

/// Account view owned by the reconciler
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LiveAccountState {
    /// Net position as last reported by the broker
    pub confirmed_net_position: i64,
    /// Order still working at the broker; resolved before any new order goes out
    pub pending_order: Option<OrderHandle>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcilerStats {
    pub bars_seen: u64,
    pub orders_submitted: u64,
    pub errors: u64,
}

/// Side and size of the market order that moves `confirmed` to `target`
pub fn order_for_target(target: i64, confirmed: i64) -> Option<(OrderSide, u64)> {
    let delta = target - confirmed;
    OrderSide::for_delta(delta).map(|side| (side, delta.unsigned_abs()))
}

/// Live consumer loop: one completed minute bar in, at most one market order out
pub struct Reconciler<B: Broker, S: Strategy = BreakoutStrategy> {
    broker: B,
    contract: ContractSpec,
    strategy: S,
    sizer: PositionSizer,
    session: SessionGate,
    /// Every bar seen this session; the sticky signal depends on the whole series
    history: Vec<Bar>,
    max_contracts: i64,
    flatten_at_end: bool,
    fill_timeout: Duration,
    poll_interval: Duration,
    state: LiveAccountState,
    stats: ReconcilerStats,
}

impl<B: Broker, S: Strategy> Reconciler<B, S> {
    pub fn new(broker: B, contract: ContractSpec, strategy: S, config: &AppConfig) -> Result<Self> {
        Ok(Self {
            broker,
            contract,
            strategy,
            sizer: PositionSizer::from_config(config)?,
            session: SessionGate::from_market(&config.market)?,
            history: Vec::new(),
            max_contracts: config.risk.max_contracts,
            flatten_at_end: config.risk.flatten_at_end,
            fill_timeout: Duration::from_secs(config.broker.fill_timeout_secs),
            poll_interval: Duration::from_millis(config.broker.poll_interval_ms),
            state: LiveAccountState::default(),
            stats: ReconcilerStats::default(),
        })
    }

    /// Override the order-status polling cadence and deadline
    pub fn with_fill_timing(mut self, fill_timeout: Duration, poll_interval: Duration) -> Self {
        self.fill_timeout = fill_timeout;
        self.poll_interval = poll_interval;
        self
    }

    /// Preload history so decisions can start on the first streamed bar
    pub fn seed_history(&mut self, bars: Vec<Bar>) {
        let count = bars.len();
        self.history.extend(bars);
        tracing::info!(seeded = count, buffered = self.history.len(), "Seeded bar history");
    }

    /// Append a completed bar without acting on it
    pub fn append_bar(&mut self, bar: Bar) {
        self.history.push(bar);
    }

    pub fn state(&self) -> &LiveAccountState {
        &self.state
    }

    pub fn stats(&self) -> &ReconcilerStats {
        &self.stats
    }

    pub fn history(&self) -> &[Bar] {
        &self.history
    }

    pub fn broker(&self) -> &B {
        &self.broker
    }

    /// Consume minute bars until shutdown is signalled or the queue closes
    ///
    /// Shutdown is only observed between bars. On exit the position is flattened
    /// once (best effort) and the broker is disconnected.
    pub async fn run(
        &mut self,
        mut bars: mpsc::UnboundedReceiver<Bar>,
        mut shutdown: watch::Receiver<bool>,
    ) -> ReconcilerStats {
        tracing::info!(contract = %self.contract, "Reconciler started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    // A dropped sender can no longer signal, so treat it as shutdown
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                next = bars.recv() => match next {
                    Some(bar) => self.on_bar(bar).await,
                    None => {
                        tracing::info!("Bar queue closed");
                        break;
                    }
                },
            }
        }

        self.shutdown().await;
        self.stats.clone()
    }

    /// Process one completed minute bar
    pub async fn on_bar(&mut self, bar: Bar) {
        self.stats.bars_seen += 1;
        let timestamp = bar.timestamp;
        self.append_bar(bar);

        let decision = self.evaluate(timestamp);
        match decision.action {
            ExecutionAction::Skip => {
                tracing::info!(bar = %timestamp, reason = %decision.reason, "Skipping bar");
            }
            ExecutionAction::Adjust { target } => {
                tracing::debug!(bar = %timestamp, target, reason = %decision.reason, "Adjusting");
                if let Err(e) = self.adjust_to_target(target).await {
                    self.stats.errors += 1;
                    tracing::error!(
                        bar = %timestamp,
                        target,
                        error = %e,
                        "Reconciliation failed, retrying on next bar"
                    );
                }
            }
        }
    }

    /// Decide the target for the bar just appended to history
    pub fn evaluate(&self, timestamp: DateTime<Utc>) -> ExecutionDecision {
        if !self.session.is_open(timestamp) {
            return if self.flatten_at_end {
                ExecutionDecision {
                    action: ExecutionAction::Adjust { target: 0 },
                    reason: "Outside trading session, flattening".to_string(),
                }
            } else {
                ExecutionDecision {
                    action: ExecutionAction::Skip,
                    reason: "Outside trading session, holding".to_string(),
                }
            };
        }

        let required = self.strategy.min_bars_required();
        let available = self.history.len();
        if available < required {
            return ExecutionDecision {
                action: ExecutionAction::Skip,
                reason: format!("Need more history ({}/{} bars)", available, required),
            };
        }

        let features = self.strategy.features(&self.history);
        let Some((signal, volatility)) = features.last() else {
            return ExecutionDecision {
                action: ExecutionAction::Skip,
                reason: "No features".to_string(),
            };
        };

        let raw = self.sizer.target_for(signal, volatility);
        let target = clamp_to_risk_cap(raw, self.max_contracts);

        tracing::info!(
            signal,
            volatility,
            atr = features.last_atr().unwrap_or(f64::NAN),
            raw_target = raw,
            target,
            "Signal computed"
        );

        ExecutionDecision {
            action: ExecutionAction::Adjust { target },
            reason: format!("{} signal {} sized to {}", self.strategy.name(), signal, target),
        }
    }

    /// Move the broker position to `target` with at most one market order
    ///
    /// An order left working by an earlier timeout is polled to a terminal status
    /// first; while it is still working no new order is sent.
    pub async fn adjust_to_target(&mut self, target: i64) -> Result<()> {
        self.resolve_pending().await?;

        let confirmed = self.broker.net_position(&self.contract).await?;
        self.state.confirmed_net_position = confirmed;

        let Some((side, quantity)) = order_for_target(target, confirmed) else {
            tracing::debug!(target, confirmed, "Position already at target");
            return Ok(());
        };

        tracing::info!(
            target,
            confirmed,
            side = %side,
            quantity,
            "Submitting market order"
        );
        let handle = self
            .broker
            .submit_market_order(&self.contract, side, quantity)
            .await?;
        self.stats.orders_submitted += 1;
        self.state.pending_order = Some(handle.clone());

        match self.await_terminal(&handle).await? {
            Some(OrderStatus::Filled) => {
                self.state.pending_order = None;
                tracing::info!(order = %handle.id, side = %side, quantity, "Order filled");
            }
            Some(status) => {
                self.state.pending_order = None;
                tracing::warn!(order = %handle.id, status = ?status, "Order ended without fill");
            }
            None => {
                tracing::warn!(
                    order = %handle.id,
                    timeout_secs = self.fill_timeout.as_secs_f64(),
                    "Order not terminal before timeout, left working"
                );
            }
        }

        self.state.confirmed_net_position = self.broker.net_position(&self.contract).await?;
        tracing::info!(
            target,
            confirmed = self.state.confirmed_net_position,
            "Position reconciled"
        );
        Ok(())
    }

    /// Wait (bounded) for a previously timed-out order to finish
    async fn resolve_pending(&mut self) -> Result<()> {
        let Some(working) = self.state.pending_order.clone() else {
            return Ok(());
        };

        match self.await_terminal(&working).await? {
            Some(status) => {
                tracing::info!(order = %working.id, status = ?status, "Working order resolved");
                self.state.pending_order = None;
                Ok(())
            }
            None => Err(TrendError::OrderSubmission(format!(
                "order {} ({} {}) still working",
                working.id, working.side, working.quantity
            ))),
        }
    }

    /// Poll until the order is terminal; `None` if the fill timeout passes first
    async fn await_terminal(&mut self, handle: &OrderHandle) -> Result<Option<OrderStatus>> {
        let deadline = self.fill_timeout;
        match tokio::time::timeout(deadline, self.poll_until_terminal(handle)).await {
            Ok(status) => status.map(Some),
            Err(_) => Ok(None),
        }
    }

    async fn poll_until_terminal(&mut self, handle: &OrderHandle) -> Result<OrderStatus> {
        loop {
            let status = self.broker.order_status(handle).await?;
            if status.is_terminal() {
                return Ok(status);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn shutdown(&mut self) {
        tracing::info!("Shutting down, flattening position");
        match self.adjust_to_target(0).await {
            Ok(()) => tracing::info!("Shutdown flatten complete"),
            Err(e) => {
                self.stats.errors += 1;
                tracing::warn!(error = %e, "Shutdown flatten failed");
            }
        }

        if let Err(e) = self.broker.disconnect().await {
            tracing::warn!(error = %e, "Broker disconnect failed");
        }

        tracing::info!(
            bars = self.stats.bars_seen,
            orders = self.stats.orders_submitted,
            errors = self.stats.errors,
            "Reconciler stopped"
        );
    }
}

/// Full live session: connect, resolve the front month, seed history, then stream
///
/// Startup failures (connection, contract resolution, subscription) are returned;
/// everything after that is handled inside the loop.
pub async fn run_live<B: Broker>(
    mut broker: B,
    config: &AppConfig,
    shutdown: watch::Receiver<bool>,
) -> Result<ReconcilerStats> {
    broker.connect().await?;

    let contract = broker
        .resolve_front_contract(&config.market.symbol, &config.market.exchange)
        .await?;

    let history = match broker
        .historical_bars(&contract, config.broker.history_bars)
        .await
    {
        Ok(bars) => bars,
        Err(e) => {
            tracing::warn!(error = %e, "History request failed, starting cold");
            Vec::new()
        }
    };

    let sub_bars = broker.subscribe_sub_bars(&contract).await?;
    let (minute_bars, feed) = spawn_minute_feed(sub_bars);

    let strategy = BreakoutStrategy::from_config(&config.strategy);
    let mut reconciler = Reconciler::new(broker, contract, strategy, config)?;
    reconciler.seed_history(history);

    let stats = reconciler.run(minute_bars, shutdown).await;
    feed.abort();

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backtest::SyntheticDataGenerator;
    use crate::execution::paper::PaperBroker;
    use chrono::TimeZone;

    fn create_test_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.market.rth_only = false;
        config.broker.poll_interval_ms = 1;
        config.broker.fill_timeout_secs = 1;
        config
    }

    fn create_test_reconciler(broker: PaperBroker) -> Reconciler<PaperBroker> {
        let config = create_test_config();
        let contract = ContractSpec::new("MNQ", "CME", 1, "209912");
        Reconciler::new(broker, contract, BreakoutStrategy::default(), &config).unwrap()
    }

    async fn connected_broker() -> PaperBroker {
        let mut broker = PaperBroker::new(vec![ContractSpec::new("MNQ", "CME", 1, "209912")]);
        broker.connect().await.unwrap();
        broker
    }

    #[test]
    fn test_order_for_target() {
        assert_eq!(order_for_target(1, 0), Some((OrderSide::Buy, 1)));
        assert_eq!(order_for_target(-2, 1), Some((OrderSide::Sell, 3)));
        assert_eq!(order_for_target(1, 1), None);
    }

    #[tokio::test]
    async fn test_flat_to_long_submits_one_buy() {
        let broker = connected_broker().await;
        let mut reconciler = create_test_reconciler(broker.clone());

        reconciler.adjust_to_target(1).await.unwrap();

        let orders = broker.submitted_orders();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].side, OrderSide::Buy);
        assert_eq!(orders[0].quantity, 1);
        assert_eq!(reconciler.state().confirmed_net_position, 1);
        assert!(reconciler.state().pending_order.is_none());
    }

    #[tokio::test]
    async fn test_at_target_submits_nothing() {
        let broker = connected_broker().await.with_position(1);
        let mut reconciler = create_test_reconciler(broker.clone());

        reconciler.adjust_to_target(1).await.unwrap();

        assert!(broker.submitted_orders().is_empty());
        assert_eq!(reconciler.stats().orders_submitted, 0);
    }

    #[tokio::test]
    async fn test_timeout_keeps_order_pending() {
        let broker = connected_broker().await.with_fill_after_polls(u32::MAX);
        let mut reconciler = create_test_reconciler(broker.clone())
            .with_fill_timing(Duration::from_millis(20), Duration::from_millis(1));

        reconciler.adjust_to_target(1).await.unwrap();

        let orders = broker.submitted_orders();
        assert_eq!(orders.len(), 1);
        assert_eq!(reconciler.state().pending_order.as_ref(), Some(&orders[0]));
        assert_eq!(reconciler.state().confirmed_net_position, 0);

        // Still working, so the next cycle refuses to stack a second order
        let result = reconciler.adjust_to_target(1).await;
        assert!(matches!(result, Err(TrendError::OrderSubmission(_))));
        assert_eq!(broker.submitted_orders().len(), 1);
        assert!(reconciler.state().pending_order.is_some());
    }

    #[tokio::test]
    async fn test_history_gate() {
        let broker = connected_broker().await;
        let mut reconciler = create_test_reconciler(broker.clone());
        let bars = SyntheticDataGenerator::new(5).minute_bars_for_days(1);

        // lookback 20 needs 25 bars
        for bar in bars.iter().take(24).cloned() {
            reconciler.on_bar(bar).await;
        }
        let last = bars[23].timestamp;
        assert_eq!(reconciler.evaluate(last).action, ExecutionAction::Skip);

        reconciler.on_bar(bars[24].clone()).await;
        assert!(matches!(
            reconciler.evaluate(bars[24].timestamp).action,
            ExecutionAction::Adjust { .. }
        ));
    }

    #[tokio::test]
    async fn test_outside_session_flattens() {
        let broker = connected_broker().await.with_position(1);
        let mut config = create_test_config();
        config.market.rth_only = true;
        let contract = ContractSpec::new("MNQ", "CME", 1, "209912");
        let mut reconciler =
            Reconciler::new(broker.clone(), contract, BreakoutStrategy::default(), &config)
                .unwrap();

        // 03:00 UTC is overnight in Chicago
        let ts = Utc.with_ymd_and_hms(2024, 1, 10, 3, 0, 0).unwrap();
        reconciler.on_bar(Bar::new(ts, 1.0, 1.0, 1.0, 1.0, 1)).await;

        assert_eq!(broker.position(), 0);
        assert_eq!(broker.submitted_orders()[0].side, OrderSide::Sell);
    }
}

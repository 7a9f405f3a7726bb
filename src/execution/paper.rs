use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Utc};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::TrendError;
use crate::execution::broker::{Broker, OrderHandle, OrderStatus};
use crate::execution::contract::ContractSpec;
use crate::models::{Bar, OrderSide, SubBar};
use crate::Result;

const SUB_BAR_CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug)]
struct PaperOrder {
    handle: OrderHandle,
    polls_remaining: u32,
    status: OrderStatus,
}

#[derive(Debug, Default)]
struct PaperState {
    connected: bool,
    position: i64,
    orders: HashMap<Uuid, PaperOrder>,
    submitted: Vec<OrderHandle>,
    fail_submissions: u32,
    fail_position_queries: u32,
    reject_orders: u32,
}

/// In-process broker that fills market orders after a fixed number of status polls
///
/// Clones share state, so a test can keep a handle for inspection after moving the
/// broker into a reconciler.
#[derive(Debug, Clone)]
pub struct PaperBroker {
    state: Arc<Mutex<PaperState>>,
    contracts: Vec<ContractSpec>,
    history: Vec<Bar>,
    sub_bars: Vec<SubBar>,
    sub_bar_interval: Duration,
    fill_after_polls: u32,
}

impl PaperBroker {
    pub fn new(contracts: Vec<ContractSpec>) -> Self {
        Self {
            state: Arc::new(Mutex::new(PaperState::default())),
            contracts,
            history: Vec::new(),
            sub_bars: Vec::new(),
            sub_bar_interval: Duration::ZERO,
            fill_after_polls: 0,
        }
    }

    /// Paper broker listing the next four quarterly contracts for `symbol`
    pub fn for_symbol(symbol: &str, exchange: &str) -> Self {
        Self::new(quarterly_contracts(symbol, exchange, Utc::now().date_naive(), 4))
    }

    /// Bars returned by `historical_bars`
    pub fn with_history(mut self, bars: Vec<Bar>) -> Self {
        self.history = bars;
        self
    }

    /// Sub-bars replayed on `subscribe_sub_bars`
    pub fn with_sub_bars(mut self, sub_bars: Vec<SubBar>, interval: Duration) -> Self {
        self.sub_bars = sub_bars;
        self.sub_bar_interval = interval;
        self
    }

    /// Number of `order_status` polls reporting `Submitted` before the fill
    pub fn with_fill_after_polls(mut self, polls: u32) -> Self {
        self.fill_after_polls = polls;
        self
    }

    pub fn with_position(self, position: i64) -> Self {
        self.lock().position = position;
        self
    }

    /// Make the next `n` order submissions fail
    pub fn fail_next_submissions(&self, n: u32) {
        self.lock().fail_submissions = n;
    }

    /// Make the next `n` position queries fail
    pub fn fail_next_position_queries(&self, n: u32) {
        self.lock().fail_position_queries = n;
    }

    /// Make the next `n` orders end `Rejected` instead of filling
    pub fn reject_next_orders(&self, n: u32) {
        self.lock().reject_orders = n;
    }

    pub fn position(&self) -> i64 {
        self.lock().position
    }

    pub fn is_connected(&self) -> bool {
        self.lock().connected
    }

    /// Every order accepted so far, in submission order
    pub fn submitted_orders(&self) -> Vec<OrderHandle> {
        self.lock().submitted.clone()
    }

    fn lock(&self) -> MutexGuard<'_, PaperState> {
        // State stays consistent even if a holder panicked mid-test
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.lock().connected {
            Ok(())
        } else {
            Err(TrendError::BrokerConnectivity(
                "paper broker not connected".to_string(),
            ))
        }
    }
}

#[async_trait]
impl Broker for PaperBroker {
    async fn connect(&mut self) -> Result<()> {
        self.lock().connected = true;
        tracing::info!("Paper broker connected");
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.lock().connected = false;
        tracing::info!("Paper broker disconnected");
        Ok(())
    }

    async fn contract_details(
        &mut self,
        symbol: &str,
        exchange: &str,
    ) -> Result<Vec<ContractSpec>> {
        self.ensure_connected()?;
        Ok(self
            .contracts
            .iter()
            .filter(|c| c.symbol == symbol && c.exchange == exchange)
            .cloned()
            .collect())
    }

    async fn historical_bars(&mut self, _contract: &ContractSpec, count: usize) -> Result<Vec<Bar>> {
        self.ensure_connected()?;
        let skip = self.history.len().saturating_sub(count);
        Ok(self.history[skip..].to_vec())
    }

    async fn subscribe_sub_bars(
        &mut self,
        contract: &ContractSpec,
    ) -> Result<mpsc::Receiver<SubBar>> {
        self.ensure_connected()?;
        let (tx, rx) = mpsc::channel(SUB_BAR_CHANNEL_CAPACITY);
        let sub_bars = self.sub_bars.clone();
        let interval = self.sub_bar_interval;

        tracing::info!(
            contract = %contract,
            count = sub_bars.len(),
            "Replaying paper sub-bars"
        );

        tokio::spawn(async move {
            for sub_bar in sub_bars {
                if !interval.is_zero() {
                    tokio::time::sleep(interval).await;
                }
                if tx.send(sub_bar).await.is_err() {
                    break;
                }
            }
        });

        Ok(rx)
    }

    async fn net_position(&mut self, _contract: &ContractSpec) -> Result<i64> {
        self.ensure_connected()?;
        let mut state = self.lock();
        if state.fail_position_queries > 0 {
            state.fail_position_queries -= 1;
            return Err(TrendError::BrokerConnectivity(
                "paper position query failed".to_string(),
            ));
        }
        Ok(state.position)
    }

    async fn submit_market_order(
        &mut self,
        contract: &ContractSpec,
        side: OrderSide,
        quantity: u64,
    ) -> Result<OrderHandle> {
        self.ensure_connected()?;
        let fill_after_polls = self.fill_after_polls;
        let mut state = self.lock();
        if state.fail_submissions > 0 {
            state.fail_submissions -= 1;
            return Err(TrendError::OrderSubmission(format!(
                "paper submission of {} {} {} failed",
                side, quantity, contract.symbol
            )));
        }

        let handle = OrderHandle::new(side, quantity);
        let status = if state.reject_orders > 0 {
            state.reject_orders -= 1;
            OrderStatus::Rejected("paper rejection".to_string())
        } else {
            OrderStatus::Submitted
        };

        state.orders.insert(
            handle.id,
            PaperOrder {
                handle: handle.clone(),
                polls_remaining: fill_after_polls,
                status,
            },
        );
        state.submitted.push(handle.clone());
        Ok(handle)
    }

    async fn order_status(&mut self, handle: &OrderHandle) -> Result<OrderStatus> {
        self.ensure_connected()?;
        let mut state = self.lock();
        let Some(order) = state.orders.get_mut(&handle.id) else {
            return Err(TrendError::OrderSubmission(format!(
                "unknown order {}",
                handle.id
            )));
        };

        if order.status.is_terminal() {
            return Ok(order.status.clone());
        }
        if order.polls_remaining > 0 {
            order.polls_remaining -= 1;
            return Ok(order.status.clone());
        }

        order.status = OrderStatus::Filled;
        let fill = order.handle.side.sign() * order.handle.quantity as i64;
        state.position += fill;
        Ok(OrderStatus::Filled)
    }
}

/// Quarterly (Mar/Jun/Sep/Dec) contracts starting from the quarter containing `from`
pub fn quarterly_contracts(
    symbol: &str,
    exchange: &str,
    from: NaiveDate,
    count: usize,
) -> Vec<ContractSpec> {
    let mut year = from.year();
    let mut month = ((from.month() - 1) / 3 + 1) * 3;

    (0..count)
        .map(|i| {
            let contract = ContractSpec::new(
                symbol,
                exchange,
                i as i64 + 1,
                &format!("{:04}{:02}", year, month),
            );
            month += 3;
            if month > 12 {
                month -= 12;
                year += 1;
            }
            contract
        })
        .collect()
}

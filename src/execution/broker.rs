use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::execution::contract::{select_front_contract, ContractSpec};
use crate::models::{Bar, OrderSide, SubBar};
use crate::Result;

/// Handle to a submitted order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderHandle {
    pub id: Uuid,
    pub side: OrderSide,
    pub quantity: u64,
}

impl OrderHandle {
    pub fn new(side: OrderSide, quantity: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            side,
            quantity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Submitted,
    PartiallyFilled { filled: u64 },
    Filled,
    Cancelled,
    Rejected(String),
}

impl OrderStatus {
    /// No further state changes will be reported
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Cancelled | OrderStatus::Rejected(_)
        )
    }
}

/// Brokerage session used by the live loop
///
/// Positions are always read back from the broker; callers must not cache them
/// between decisions.
#[async_trait]
pub trait Broker: Send {
    async fn connect(&mut self) -> Result<()>;

    async fn disconnect(&mut self) -> Result<()>;

    /// All listed contracts for a symbol
    async fn contract_details(&mut self, symbol: &str, exchange: &str)
        -> Result<Vec<ContractSpec>>;

    /// Resolve the front-month contract for a symbol
    async fn resolve_front_contract(&mut self, symbol: &str, exchange: &str) -> Result<ContractSpec> {
        let candidates = self.contract_details(symbol, exchange).await?;
        let contract = select_front_contract(&candidates, Utc::now())?;
        tracing::info!(contract = %contract, "Resolved front contract");
        Ok(contract)
    }

    /// Most recent `count` completed minute bars, oldest first
    async fn historical_bars(&mut self, contract: &ContractSpec, count: usize) -> Result<Vec<Bar>>;

    /// Start the real-time sub-bar stream
    async fn subscribe_sub_bars(&mut self, contract: &ContractSpec)
        -> Result<mpsc::Receiver<SubBar>>;

    /// Signed net position in contracts
    async fn net_position(&mut self, contract: &ContractSpec) -> Result<i64>;

    async fn submit_market_order(
        &mut self,
        contract: &ContractSpec,
        side: OrderSide,
        quantity: u64,
    ) -> Result<OrderHandle>;

    async fn order_status(&mut self, handle: &OrderHandle) -> Result<OrderStatus>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_statuses() {
        assert!(!OrderStatus::Submitted.is_terminal());
        assert!(!OrderStatus::PartiallyFilled { filled: 1 }.is_terminal());
        assert!(OrderStatus::Filled.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(OrderStatus::Rejected("margin".into()).is_terminal());
    }

    #[test]
    fn test_order_handles_are_unique() {
        let a = OrderHandle::new(OrderSide::Buy, 1);
        let b = OrderHandle::new(OrderSide::Buy, 1);
        assert_ne!(a.id, b.id);
    }
}

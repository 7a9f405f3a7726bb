// Live execution: sub-bar aggregation, broker access and position reconciliation
pub mod aggregator;
pub mod broker;
pub mod contract;
pub mod feed;
pub mod paper;
pub mod reconciler;
pub mod session;

pub use aggregator::MinuteAggregator;
pub use broker::{Broker, OrderHandle, OrderStatus};
pub use contract::{parse_expiry, select_front_contract, ContractSpec};
pub use feed::{spawn_minute_feed, FeedStats};
pub use paper::{quarterly_contracts, PaperBroker};
pub use reconciler::{
    order_for_target, run_live, ExecutionAction, ExecutionDecision, LiveAccountState, Reconciler,
    ReconcilerStats,
};
pub use session::SessionGate;

//! Synthex Exchanger
//!
//! Converts one synthetic-asset balance into another at oracle prices, charging
//! the destination asset's fee and holding every acquisition in a settlement
//! queue until its waiting period has passed.
//!
//! # Architecture
//!
//! ```text
//!   ExchangeGateway ──► Exchanger ──► SuspensionGate
//!                          │      ──► PriceOracle (rates, staleness)
//!                          │      ──► FeeRateTable
//!                          │      ──► SettlementReconciler ──► QueueStore
//!                          │      ──► LedgerAdapter (one batch per operation)
//!                          └──────► FeeDistribution, EventBus
//! ```
//!
//! Price drift between an exchange and the end of its waiting period is
//! reconciled later: a holder who gained is reclaimed from, one who lost is
//! rebated.

pub mod access;
pub mod config;
pub mod delegation;
pub mod engine;
pub mod error;
pub mod events;
pub mod fee_pool;
pub mod fees;
pub mod gateway;
pub mod metrics;
pub mod queue;
pub mod reconciler;
pub mod sandbox;
pub mod suspension;

pub use access::{Authority, CallerId, Ownership};
pub use config::{ConfigStore, ExchangerConfig};
pub use delegation::{DelegateApprovals, InMemoryDelegateApprovals};
pub use engine::{Collaborators, ExchangeReceipt, Exchanger, SettlementOutcome};
pub use error::{ExchangeError, ExchangeResult};
pub use events::{EventBus, ExchangeEvent};
pub use fee_pool::{FeeDistribution, FeePool};
pub use fees::{ExchangeAmounts, FeeRateTable};
pub use gateway::ExchangeGateway;
pub use metrics::{ExchangerMetrics, MetricsSnapshot};
pub use queue::{QueueStore, SettlementEntry};
pub use reconciler::{Adjustment, SettlementOwing, SettlementPlan, SettlementReconciler};
pub use sandbox::Sandbox;
pub use suspension::{Suspension, SuspensionGate, SuspensionScope, SystemStatus};

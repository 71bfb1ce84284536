//! Exchange and settlement events.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use synthex_common::{AccountId, AssetKey, Timestamp};
use tokio::sync::broadcast;
use tracing::debug;

/// Observable effect of a committed operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExchangeEvent {
    Exchanged {
        account: AccountId,
        src: AssetKey,
        amount_debited: Decimal,
        dest: AssetKey,
        amount_received: Decimal,
        recipient: AccountId,
        fee: Decimal,
        timestamp: Timestamp,
    },
    Reclaimed {
        account: AccountId,
        asset: AssetKey,
        amount: Decimal,
        timestamp: Timestamp,
    },
    Rebated {
        account: AccountId,
        asset: AssetKey,
        amount: Decimal,
        timestamp: Timestamp,
    },
}

impl ExchangeEvent {
    /// Short event name, for logs.
    pub fn name(&self) -> &'static str {
        match self {
            ExchangeEvent::Exchanged { .. } => "exchanged",
            ExchangeEvent::Reclaimed { .. } => "reclaimed",
            ExchangeEvent::Rebated { .. } => "rebated",
        }
    }

    /// Account whose balances the event changed.
    pub fn account(&self) -> &AccountId {
        match self {
            ExchangeEvent::Exchanged { account, .. }
            | ExchangeEvent::Reclaimed { account, .. }
            | ExchangeEvent::Rebated { account, .. } => account,
        }
    }
}

/// Fan-out of events to any number of subscribers.
///
/// Slow subscribers lag and lose the oldest events; publishing never blocks.
pub struct EventBus {
    sender: broadcast::Sender<ExchangeEvent>,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ExchangeEvent> {
        self.sender.subscribe()
    }

    /// Publish an event. Returns how many subscribers received it.
    pub fn publish(&self, event: ExchangeEvent) -> usize {
        let name = event.name();
        match self.sender.send(event) {
            Ok(receivers) => receivers,
            Err(_) => {
                debug!(event = name, "No subscribers for event");
                0
            }
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

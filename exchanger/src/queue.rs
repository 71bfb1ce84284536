//! Settlement queues.
//!
//! Every exchange into an asset leaves a [`SettlementEntry`] in the recipient's
//! queue for that asset. Entries are replayed at settlement time and the whole
//! queue is cleared at once.

use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use synthex_common::{secs_between, AccountId, AssetKey, EntryId, FeeRate, Timestamp};
use tracing::debug;

use crate::error::{ExchangeError, ExchangeResult};

/// A completed exchange awaiting settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementEntry {
    pub id: EntryId,
    /// Holder of the acquired asset.
    pub account: AccountId,
    pub src: AssetKey,
    /// Amount exchanged, in source units.
    pub amount: Decimal,
    pub dest: AssetKey,
    /// Amount credited, in destination units.
    pub amount_received: Decimal,
    /// Units of `dest` per unit of `src` at execution.
    pub exchange_rate: Decimal,
    /// Fee rate charged at execution.
    pub exchange_fee_rate: FeeRate,
    pub timestamp: Timestamp,
}

type QueueKey = (AccountId, AssetKey);

/// All settlement queues, keyed by holder and asset.
#[derive(Default)]
pub struct QueueStore {
    queues: DashMap<QueueKey, Vec<SettlementEntry>>,
}

impl QueueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries of one queue, oldest first.
    pub fn entries(&self, account: &AccountId, asset: &AssetKey) -> Vec<SettlementEntry> {
        self.queues
            .get(&(account.clone(), asset.clone()))
            .map(|q| q.clone())
            .unwrap_or_default()
    }

    pub fn len(&self, account: &AccountId, asset: &AssetKey) -> usize {
        self.queues
            .get(&(account.clone(), asset.clone()))
            .map(|q| q.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self, account: &AccountId, asset: &AssetKey) -> bool {
        self.len(account, asset) == 0
    }

    /// Fail if one more entry would exceed `max`.
    pub fn ensure_capacity(
        &self,
        account: &AccountId,
        asset: &AssetKey,
        max: Option<usize>,
    ) -> ExchangeResult<()> {
        match max {
            Some(max) if self.len(account, asset) >= max => Err(ExchangeError::QueueOverflow {
                account: account.clone(),
                asset: asset.clone(),
                max,
            }),
            _ => Ok(()),
        }
    }

    /// Append an entry to its holder's queue for the destination asset.
    pub fn push(&self, entry: SettlementEntry) {
        let key = (entry.account.clone(), entry.dest.clone());
        let mut queue = self.queues.entry(key).or_default();
        debug!(
            account = %entry.account,
            asset = %entry.dest,
            entry_id = %entry.id,
            position = queue.len(),
            "Settlement entry queued"
        );
        queue.push(entry);
    }

    /// Remove a whole queue, returning its entries.
    pub fn clear(&self, account: &AccountId, asset: &AssetKey) -> Vec<SettlementEntry> {
        self.queues
            .remove(&(account.clone(), asset.clone()))
            .map(|(_, entries)| entries)
            .unwrap_or_default()
    }

    /// Timestamp of the newest entry.
    pub fn most_recent_timestamp(&self, account: &AccountId, asset: &AssetKey) -> Option<Timestamp> {
        self.queues
            .get(&(account.clone(), asset.clone()))
            .and_then(|q| q.iter().map(|e| e.timestamp).max())
    }

    /// Seconds until the queue matures, measured from its newest entry.
    pub fn seconds_remaining(
        &self,
        account: &AccountId,
        asset: &AssetKey,
        waiting_period_secs: u64,
        now: Timestamp,
    ) -> u64 {
        match self.most_recent_timestamp(account, asset) {
            Some(latest) => waiting_period_secs.saturating_sub(secs_between(latest, now)),
            None => 0,
        }
    }
}

//! The exchange engine.

use std::sync::Arc;

use dashmap::DashSet;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use synthex_common::{AccountId, AssetKey, Clock, EntryId, FeeRate, Timestamp};
use synthex_ledger::{LedgerAdapter, Posting, PostingBatch};
use synthex_oracle::PriceOracle;
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};

use crate::access::{Authority, CallerId};
use crate::config::{ConfigStore, ExchangerConfig};
use crate::delegation::DelegateApprovals;
use crate::error::{ExchangeError, ExchangeResult};
use crate::events::{EventBus, ExchangeEvent};
use crate::fee_pool::FeeDistribution;
use crate::fees::{ExchangeAmounts, FeeRateTable};
use crate::metrics::{ExchangerMetrics, MetricsSnapshot};
use crate::queue::{QueueStore, SettlementEntry};
use crate::reconciler::{amount_after_settlement, SettlementOwing, SettlementPlan, SettlementReconciler};
use crate::suspension::SuspensionGate;

/// External services the engine depends on.
#[derive(Clone)]
pub struct Collaborators {
    pub oracle: Arc<dyn PriceOracle>,
    pub ledger: Arc<dyn LedgerAdapter>,
    pub suspension: Arc<dyn SuspensionGate>,
    pub delegates: Arc<dyn DelegateApprovals>,
    pub fee_pool: Arc<dyn FeeDistribution>,
    pub authority: Arc<dyn Authority>,
    pub clock: Arc<dyn Clock>,
}

/// Result of a committed exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeReceipt {
    pub entry_id: EntryId,
    /// Source amount debited; differs from the request after a settlement.
    pub amount_debited: Decimal,
    pub amount_received: Decimal,
    /// Fee in destination units.
    pub fee: Decimal,
    pub exchange_fee_rate: FeeRate,
    /// Settlement of the source queue applied first, if there was one.
    pub settlement: Option<SettlementOutcome>,
}

/// Result of settling a queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementOutcome {
    pub reclaimed: Decimal,
    pub rebated: Decimal,
    pub num_entries: usize,
}

impl From<&SettlementPlan> for SettlementOutcome {
    fn from(plan: &SettlementPlan) -> Self {
        Self {
            reclaimed: plan.reclaimed(),
            rebated: plan.rebated(),
            num_entries: plan.owing.num_entries,
        }
    }
}

/// Synthetic-asset exchange and settlement engine.
///
/// Operations run one at a time under an engine-wide sequencer; each reads the
/// clock and the configuration once, validates everything, then commits a
/// single ledger batch. Nothing after the commit can fail.
pub struct Exchanger {
    config: ConfigStore,
    fees: FeeRateTable,
    queues: QueueStore,
    oracle: Arc<dyn PriceOracle>,
    ledger: Arc<dyn LedgerAdapter>,
    suspension: Arc<dyn SuspensionGate>,
    delegates: Arc<dyn DelegateApprovals>,
    fee_pool: Arc<dyn FeeDistribution>,
    authority: Arc<dyn Authority>,
    clock: Arc<dyn Clock>,
    boundaries: DashSet<CallerId>,
    events: EventBus,
    metrics: ExchangerMetrics,
    sequencer: Mutex<()>,
}

impl Exchanger {
    /// Create a new exchanger.
    pub fn new(config: ExchangerConfig, collaborators: Collaborators) -> ExchangeResult<Self> {
        config.validate().map_err(ExchangeError::InvalidConfiguration)?;
        if collaborators.oracle.base_asset() != &config.base_asset {
            return Err(ExchangeError::InvalidConfiguration(format!(
                "Oracle quotes in {}, configured base asset is {}",
                collaborators.oracle.base_asset(),
                config.base_asset
            )));
        }

        info!(
            waiting_period_secs = config.waiting_period_secs,
            max_entries_in_queue = ?config.max_entries_in_queue,
            base_asset = %config.base_asset,
            "Exchanger created"
        );

        Ok(Self {
            config: ConfigStore::new(config),
            fees: FeeRateTable::new(),
            queues: QueueStore::new(),
            oracle: collaborators.oracle,
            ledger: collaborators.ledger,
            suspension: collaborators.suspension,
            delegates: collaborators.delegates,
            fee_pool: collaborators.fee_pool,
            authority: collaborators.authority,
            clock: collaborators.clock,
            boundaries: DashSet::new(),
            events: EventBus::default(),
            metrics: ExchangerMetrics::new(),
            sequencer: Mutex::new(()),
        })
    }

    fn reconciler(&self) -> SettlementReconciler<'_> {
        SettlementReconciler::new(self.oracle.as_ref(), self.ledger.as_ref(), &self.queues)
    }

    // ---- Exchanges ----

    /// Exchange `amount` of `src` held by `from` into `dest`, credited to `recipient`.
    #[instrument(skip_all, fields(from = %from, src = %src, dest = %dest, amount = %amount))]
    pub fn exchange(
        &self,
        caller: &CallerId,
        from: &AccountId,
        src: &AssetKey,
        amount: Decimal,
        dest: &AssetKey,
        recipient: &AccountId,
    ) -> ExchangeResult<ExchangeReceipt> {
        let _sequenced = self.sequencer.lock();
        let result = self
            .require_boundary(caller)
            .and_then(|_| self.execute_exchange(from, src, amount, dest, recipient));
        self.track(result)
    }

    /// Exchange on behalf of `authoriser`, triggered by an approved `delegate`.
    #[instrument(skip_all, fields(authoriser = %authoriser, delegate = %delegate, src = %src, dest = %dest))]
    pub fn exchange_on_behalf(
        &self,
        caller: &CallerId,
        authoriser: &AccountId,
        delegate: &AccountId,
        src: &AssetKey,
        amount: Decimal,
        dest: &AssetKey,
    ) -> ExchangeResult<ExchangeReceipt> {
        let _sequenced = self.sequencer.lock();
        let result = self
            .require_boundary(caller)
            .and_then(|_| {
                if self.delegates.can_exchange_for(authoriser, delegate) {
                    Ok(())
                } else {
                    Err(ExchangeError::NotApproved {
                        authoriser: authoriser.clone(),
                        delegate: delegate.clone(),
                    })
                }
            })
            .and_then(|_| self.execute_exchange(authoriser, src, amount, dest, authoriser));
        self.track(result)
    }

    fn track(&self, result: ExchangeResult<ExchangeReceipt>) -> ExchangeResult<ExchangeReceipt> {
        match &result {
            Ok(_) => self.metrics.exchange_completed(),
            Err(e) => {
                warn!(error = %e, code = e.error_code(), "Exchange rejected");
                self.metrics.exchange_failed(e);
            }
        }
        result
    }

    fn require_boundary(&self, caller: &CallerId) -> ExchangeResult<()> {
        if self.boundaries.contains(caller) {
            Ok(())
        } else {
            Err(ExchangeError::UnauthorizedCaller)
        }
    }

    fn execute_exchange(
        &self,
        from: &AccountId,
        src: &AssetKey,
        amount: Decimal,
        dest: &AssetKey,
        recipient: &AccountId,
    ) -> ExchangeResult<ExchangeReceipt> {
        let now = self.clock.now();
        let config = self.config.snapshot();

        if amount <= Decimal::ZERO {
            return Err(ExchangeError::InvalidAmount(amount));
        }
        if src == dest {
            return Err(ExchangeError::SameAsset(src.clone()));
        }

        self.suspension.check_system_active()?;
        self.suspension.check_exchange_active()?;
        self.suspension.check_asset_active(src)?;
        self.suspension.check_asset_active(dest)?;

        if let Some(asset) = self.oracle.first_stale(&[src, dest]) {
            return Err(ExchangeError::StaleRate(asset.clone()));
        }

        let settlement = self.reconcile_if_mature(from, src, now, &config)?;
        let usable = match &settlement {
            Some(plan) => plan.usable_amount(amount),
            None => {
                let balance = self.ledger.balance_of(from, src);
                if amount > balance {
                    return Err(ExchangeError::InsufficientBalance {
                        account: from.clone(),
                        asset: src.clone(),
                        required: amount,
                        available: balance,
                    });
                }
                amount
            }
        };
        if usable <= Decimal::ZERO {
            return Err(ExchangeError::InsufficientBalance {
                account: from.clone(),
                asset: src.clone(),
                required: amount,
                available: Decimal::ZERO,
            });
        }

        let amounts = self.fees.get_amounts_for_exchange(
            self.oracle.as_ref(),
            usable,
            src,
            dest,
            config.default_fee_rate,
        )?;
        self.queues
            .ensure_capacity(recipient, dest, config.max_entries_in_queue)?;
        let exchange_rate = self.oracle.exchange_rate(src, dest)?;
        let fee_value = self
            .oracle
            .effective_value(dest, amounts.fee, &config.base_asset)?;

        let mut batch = PostingBatch::new("exchange");
        if let Some(plan) = &settlement {
            batch.extend(plan.postings());
        }
        batch.add(Posting::debit(from.clone(), src.clone(), usable));
        batch.add(Posting::credit(
            recipient.clone(),
            dest.clone(),
            amounts.amount_received,
        ));
        self.ledger.apply_batch(&batch)?;

        // Committed: the remaining steps are infallible
        let settlement = settlement.map(|plan| self.finish_settlement(&plan, now));

        if fee_value > Decimal::ZERO {
            self.fee_pool.record_fee(&config.base_asset, fee_value);
        }

        let entry = SettlementEntry {
            id: EntryId::new(),
            account: recipient.clone(),
            src: src.clone(),
            amount: usable,
            dest: dest.clone(),
            amount_received: amounts.amount_received,
            exchange_rate,
            exchange_fee_rate: amounts.exchange_fee_rate,
            timestamp: now,
        };
        let entry_id = entry.id;
        self.queues.push(entry);

        self.events.publish(ExchangeEvent::Exchanged {
            account: from.clone(),
            src: src.clone(),
            amount_debited: usable,
            dest: dest.clone(),
            amount_received: amounts.amount_received,
            recipient: recipient.clone(),
            fee: amounts.fee,
            timestamp: now,
        });

        info!(
            entry_id = %entry_id,
            amount_debited = %usable,
            amount_received = %amounts.amount_received,
            fee = %amounts.fee,
            "Exchange committed"
        );

        Ok(ExchangeReceipt {
            entry_id,
            amount_debited: usable,
            amount_received: amounts.amount_received,
            fee: amounts.fee,
            exchange_fee_rate: amounts.exchange_fee_rate,
            settlement,
        })
    }

    /// Plan the settlement an exchange out of `asset` must apply first.
    ///
    /// `None` when the queue is empty; [`ExchangeError::WaitingPeriod`] while it
    /// is immature. The plan is committed in the caller's ledger batch.
    pub fn reconcile_if_mature(
        &self,
        account: &AccountId,
        asset: &AssetKey,
        now: Timestamp,
        config: &ExchangerConfig,
    ) -> ExchangeResult<Option<SettlementPlan>> {
        if self.queues.is_empty(account, asset) {
            return Ok(None);
        }
        self.reconciler()
            .plan(account, asset, now, config.waiting_period_secs)
            .map(Some)
    }

    fn finish_settlement(&self, plan: &SettlementPlan, now: Timestamp) -> SettlementOutcome {
        let cleared = self.queues.clear(&plan.account, &plan.asset);
        if let Some(event) = plan.event(now) {
            self.events.publish(event);
        }
        let outcome = SettlementOutcome::from(plan);
        self.metrics
            .settled(outcome.reclaimed > Decimal::ZERO, outcome.rebated > Decimal::ZERO);

        info!(
            account = %plan.account,
            asset = %plan.asset,
            entries = cleared.len(),
            reclaimed = %outcome.reclaimed,
            rebated = %outcome.rebated,
            "Queue settled"
        );
        outcome
    }

    // ---- Settlement ----

    /// Settle a holder's queue for `asset`, applying the net reclaim or rebate.
    #[instrument(skip_all, fields(account = %account, asset = %asset))]
    pub fn settle(&self, account: &AccountId, asset: &AssetKey) -> ExchangeResult<SettlementOutcome> {
        let _sequenced = self.sequencer.lock();
        let now = self.clock.now();
        let config = self.config.snapshot();

        let result = self.execute_settle(account, asset, now, &config);
        if let Err(e) = &result {
            warn!(error = %e, code = e.error_code(), "Settle rejected");
            self.metrics.rejected(e);
        }
        result
    }

    fn execute_settle(
        &self,
        account: &AccountId,
        asset: &AssetKey,
        now: Timestamp,
        config: &ExchangerConfig,
    ) -> ExchangeResult<SettlementOutcome> {
        self.suspension.check_system_active()?;
        self.suspension.check_exchange_active()?;
        self.suspension.check_asset_active(asset)?;

        let plan = self
            .reconciler()
            .plan(account, asset, now, config.waiting_period_secs)?;
        if plan.owing.num_entries == 0 {
            debug!("Nothing to settle");
            return Ok(SettlementOutcome::default());
        }

        let mut batch = PostingBatch::new("settle");
        batch.extend(plan.postings());
        self.ledger.apply_batch(&batch)?;

        Ok(self.finish_settlement(&plan, now))
    }

    // ---- Queries ----

    /// Reclaim and rebate a queue would owe if settled now.
    pub fn settlement_owing(&self, account: &AccountId, asset: &AssetKey) -> ExchangeResult<SettlementOwing> {
        let _sequenced = self.sequencer.lock();
        let config = self.config.snapshot();
        self.reconciler()
            .settlement_owing(account, asset, self.clock.now(), config.waiting_period_secs)
    }

    /// `min(requested, balance) + rebate`, against the holder's current balance.
    pub fn calculate_amount_after_settlement(
        &self,
        account: &AccountId,
        asset: &AssetKey,
        requested: Decimal,
        rebate: Decimal,
    ) -> Decimal {
        let _sequenced = self.sequencer.lock();
        amount_after_settlement(requested, self.ledger.balance_of(account, asset), rebate)
    }

    /// Seconds until the holder's queue for `asset` matures; 0 when empty.
    pub fn max_secs_left_in_waiting_period(&self, account: &AccountId, asset: &AssetKey) -> u64 {
        let _sequenced = self.sequencer.lock();
        let config = self.config.snapshot();
        self.queues
            .seconds_remaining(account, asset, config.waiting_period_secs, self.clock.now())
    }

    pub fn fee_rate_for_exchange(&self, src: &AssetKey, dest: &AssetKey) -> FeeRate {
        let default = self.config.snapshot().default_fee_rate;
        self.fees.fee_rate_for_exchange(src, dest, default)
    }

    /// Amount received and fee for exchanging `amount` of `src` into `dest` now.
    pub fn get_amounts_for_exchange(
        &self,
        amount: Decimal,
        src: &AssetKey,
        dest: &AssetKey,
    ) -> ExchangeResult<ExchangeAmounts> {
        let default = self.config.snapshot().default_fee_rate;
        self.fees
            .get_amounts_for_exchange(self.oracle.as_ref(), amount, src, dest, default)
    }

    /// Pending entries of a holder's queue, oldest first.
    pub fn settlement_entries(&self, account: &AccountId, asset: &AssetKey) -> Vec<SettlementEntry> {
        self.queues.entries(account, asset)
    }

    pub fn config(&self) -> ExchangerConfig {
        self.config.snapshot()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ExchangeEvent> {
        self.events.subscribe()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    // ---- Administration ----

    pub fn set_waiting_period_secs(&self, caller: &AccountId, secs: u64) -> ExchangeResult<()> {
        self.authority.require_owner(caller)?;
        let _sequenced = self.sequencer.lock();
        self.config.set_waiting_period_secs(secs);
        info!(secs, "Waiting period updated");
        Ok(())
    }

    pub fn set_max_entries_in_queue(&self, caller: &AccountId, max: Option<usize>) -> ExchangeResult<()> {
        self.authority.require_owner(caller)?;
        let _sequenced = self.sequencer.lock();
        self.config
            .set_max_entries_in_queue(max)
            .map_err(ExchangeError::InvalidConfiguration)?;
        info!(max = ?max, "Max entries in queue updated");
        Ok(())
    }

    pub fn set_exchange_fee_rates(&self, caller: &AccountId, rates: &[(AssetKey, FeeRate)]) -> ExchangeResult<()> {
        self.authority.require_owner(caller)?;
        let _sequenced = self.sequencer.lock();
        self.fees.set_exchange_fee_rates(rates);
        Ok(())
    }

    pub fn set_default_fee_rate(&self, caller: &AccountId, rate: FeeRate) -> ExchangeResult<()> {
        self.authority.require_owner(caller)?;
        let _sequenced = self.sequencer.lock();
        self.config.set_default_fee_rate(rate);
        Ok(())
    }

    /// Issue a new boundary capability allowed to call the exchange entry points.
    pub fn register_boundary(&self, caller: &AccountId) -> ExchangeResult<CallerId> {
        self.authority.require_owner(caller)?;
        let capability = CallerId::new();
        self.boundaries.insert(capability);
        info!(capability = %capability, "Exchange boundary registered");
        Ok(capability)
    }

    pub fn revoke_boundary(&self, caller: &AccountId, capability: &CallerId) -> ExchangeResult<bool> {
        self.authority.require_owner(caller)?;
        Ok(self.boundaries.remove(capability).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::Ownership;
    use crate::delegation::InMemoryDelegateApprovals;
    use crate::fee_pool::FeePool;
    use crate::suspension::SystemStatus;
    use rust_decimal_macros::dec;
    use synthex_common::ManualClock;
    use synthex_ledger::InMemoryLedger;
    use synthex_oracle::provider::MockPriceOracle;

    struct Harness {
        exchanger: Exchanger,
        oracle: Arc<MockPriceOracle>,
        ledger: Arc<InMemoryLedger>,
        clock: Arc<ManualClock>,
        fee_pool: Arc<FeePool>,
        boundary: CallerId,
        owner: AccountId,
    }

    fn harness() -> Harness {
        let oracle = Arc::new(MockPriceOracle::new(AssetKey::susd()));
        oracle.set_rate(AssetKey::seur(), dec!(2));
        let ledger = Arc::new(InMemoryLedger::new());
        let clock = Arc::new(ManualClock::starting_now());
        let fee_pool = Arc::new(FeePool::new());
        let owner = AccountId::new("owner");

        let exchanger = Exchanger::new(
            ExchangerConfig::default(),
            Collaborators {
                oracle: oracle.clone(),
                ledger: ledger.clone(),
                suspension: Arc::new(SystemStatus::new()),
                delegates: Arc::new(InMemoryDelegateApprovals::new()),
                fee_pool: fee_pool.clone(),
                authority: Arc::new(Ownership::new(owner.clone())),
                clock: clock.clone(),
            },
        )
        .unwrap();
        exchanger
            .set_exchange_fee_rates(&owner, &[(AssetKey::seur(), FeeRate::new(dec!(0.01)).unwrap())])
            .unwrap();
        let boundary = exchanger.register_boundary(&owner).unwrap();

        Harness {
            exchanger,
            oracle,
            ledger,
            clock,
            fee_pool,
            boundary,
            owner,
        }
    }

    fn alice() -> AccountId {
        AccountId::new("alice")
    }

    #[test]
    fn test_exchange_moves_balances_and_queues_entry() {
        let h = harness();
        h.ledger.issue(&alice(), &AssetKey::susd(), dec!(100)).unwrap();

        let receipt = h
            .exchanger
            .exchange(&h.boundary, &alice(), &AssetKey::susd(), dec!(100), &AssetKey::seur(), &alice())
            .unwrap();

        assert_eq!(receipt.amount_debited, dec!(100));
        assert_eq!(receipt.amount_received, dec!(49.5));
        assert_eq!(receipt.fee, dec!(0.5));
        assert!(receipt.settlement.is_none());
        assert_eq!(h.ledger.balance_of(&alice(), &AssetKey::susd()), Decimal::ZERO);
        assert_eq!(h.ledger.balance_of(&alice(), &AssetKey::seur()), dec!(49.5));

        let entries = h.exchanger.settlement_entries(&alice(), &AssetKey::seur());
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].exchange_rate, dec!(0.5));
        assert_eq!(entries[0].timestamp, h.clock.now());

        // 0.5 sEUR fee is worth 1 sUSD
        assert_eq!(h.fee_pool.fees_to_distribute(&AssetKey::susd()), dec!(1));
    }

    #[test]
    fn test_exchange_requires_registered_boundary() {
        let h = harness();
        h.ledger.issue(&alice(), &AssetKey::susd(), dec!(100)).unwrap();

        let result = h.exchanger.exchange(
            &CallerId::new(),
            &alice(),
            &AssetKey::susd(),
            dec!(100),
            &AssetKey::seur(),
            &alice(),
        );
        assert_eq!(result, Err(ExchangeError::UnauthorizedCaller));

        h.exchanger.revoke_boundary(&h.owner, &h.boundary).unwrap();
        let result = h.exchanger.exchange(
            &h.boundary,
            &alice(),
            &AssetKey::susd(),
            dec!(100),
            &AssetKey::seur(),
            &alice(),
        );
        assert_eq!(result, Err(ExchangeError::UnauthorizedCaller));
        assert_eq!(h.exchanger.metrics().exchanges_failed, 2);
    }

    #[test]
    fn test_rejects_bad_requests() {
        let h = harness();
        h.ledger.issue(&alice(), &AssetKey::susd(), dec!(100)).unwrap();
        let exchange = |amount, dest: &AssetKey| {
            h.exchanger
                .exchange(&h.boundary, &alice(), &AssetKey::susd(), amount, dest, &alice())
        };

        assert_eq!(exchange(dec!(0), &AssetKey::seur()), Err(ExchangeError::InvalidAmount(dec!(0))));
        assert_eq!(
            exchange(dec!(10), &AssetKey::susd()),
            Err(ExchangeError::SameAsset(AssetKey::susd()))
        );
        assert!(matches!(
            exchange(dec!(101), &AssetKey::seur()),
            Err(ExchangeError::InsufficientBalance { .. })
        ));
        assert!(matches!(
            exchange(dec!(1), &AssetKey::sbtc()),
            Err(ExchangeError::StaleRate(asset)) if asset == AssetKey::sbtc()
        ));
        assert_eq!(h.ledger.balance_of(&alice(), &AssetKey::susd()), dec!(100));
    }

    #[test]
    fn test_admin_setters_require_owner() {
        let h = harness();
        let mallory = AccountId::new("mallory");

        assert!(matches!(
            h.exchanger.set_waiting_period_secs(&mallory, 1),
            Err(ExchangeError::OnlyOwner(_))
        ));
        assert!(h.exchanger.set_max_entries_in_queue(&mallory, Some(1)).is_err());
        assert!(h.exchanger.register_boundary(&mallory).is_err());

        h.exchanger.set_waiting_period_secs(&h.owner, 60).unwrap();
        assert_eq!(h.exchanger.config().waiting_period_secs, 60);
        assert!(matches!(
            h.exchanger.set_max_entries_in_queue(&h.owner, Some(0)),
            Err(ExchangeError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_oracle_base_asset_must_match() {
        let h = harness();
        let config = ExchangerConfig {
            base_asset: AssetKey::seur(),
            ..ExchangerConfig::default()
        };
        let collaborators = Collaborators {
            oracle: h.oracle.clone(),
            ledger: h.ledger.clone(),
            suspension: Arc::new(SystemStatus::new()),
            delegates: Arc::new(InMemoryDelegateApprovals::new()),
            fee_pool: h.fee_pool.clone(),
            authority: Arc::new(Ownership::new(h.owner.clone())),
            clock: h.clock.clone(),
        };
        assert!(matches!(
            Exchanger::new(config, collaborators),
            Err(ExchangeError::InvalidConfiguration(_))
        ));
    }
}

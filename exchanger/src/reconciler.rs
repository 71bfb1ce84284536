//! Settlement reconciliation.
//!
//! Each queued entry locked an exchange rate when it was created. Settling a
//! queue replays every entry against the rate in force when its waiting period
//! ended (or now, if that is earlier):
//!
//! ```text
//! drift = locked_rate - settlement_rate
//! delta = amount * (1 - fee_rate) * drift      (destination units)
//! ```
//!
//! Positive deltas were over-credited and are reclaimed; negative deltas were
//! under-credited and are rebated. The two sides are totalled separately and
//! only their net is applied.

use chrono::Duration;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use synthex_common::{round_unit, AccountId, AssetKey, Timestamp};
use synthex_ledger::{LedgerAdapter, Posting};
use synthex_oracle::PriceOracle;
use tracing::debug;

use crate::error::{ExchangeError, ExchangeResult};
use crate::events::ExchangeEvent;
use crate::queue::{QueueStore, SettlementEntry};

/// What a queue owes or is owed, before netting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementOwing {
    pub reclaim_amount: Decimal,
    pub rebate_amount: Decimal,
    pub num_entries: usize,
}

impl SettlementOwing {
    /// Reclaim minus rebate.
    pub fn net(&self) -> Decimal {
        self.reclaim_amount - self.rebate_amount
    }
}

/// Net balance change a settlement applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Adjustment {
    None,
    Reclaim(Decimal),
    Rebate(Decimal),
}

/// A settlement computed against current balances, ready to commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementPlan {
    pub account: AccountId,
    pub asset: AssetKey,
    pub owing: SettlementOwing,
    pub adjustment: Adjustment,
    /// Holder's balance before the adjustment.
    pub balance_before: Decimal,
}

impl SettlementPlan {
    pub fn reclaimed(&self) -> Decimal {
        match self.adjustment {
            Adjustment::Reclaim(amount) => amount,
            _ => Decimal::ZERO,
        }
    }

    pub fn rebated(&self) -> Decimal {
        match self.adjustment {
            Adjustment::Rebate(amount) => amount,
            _ => Decimal::ZERO,
        }
    }

    pub fn balance_after(&self) -> Decimal {
        self.balance_before - self.reclaimed() + self.rebated()
    }

    /// How much of `requested` can be exchanged out once this plan is applied.
    pub fn usable_amount(&self, requested: Decimal) -> Decimal {
        let usable = amount_after_settlement(
            requested,
            self.balance_before - self.reclaimed(),
            self.rebated(),
        );
        usable.min(self.balance_after())
    }

    /// Ledger postings applying the adjustment.
    pub fn postings(&self) -> Vec<Posting> {
        match self.adjustment {
            Adjustment::Reclaim(amount) if amount > Decimal::ZERO => vec![Posting::debit(
                self.account.clone(),
                self.asset.clone(),
                amount,
            )],
            Adjustment::Rebate(amount) if amount > Decimal::ZERO => vec![Posting::credit(
                self.account.clone(),
                self.asset.clone(),
                amount,
            )],
            _ => Vec::new(),
        }
    }

    /// The single event describing the adjustment, if it moved anything.
    pub fn event(&self, timestamp: Timestamp) -> Option<ExchangeEvent> {
        match self.adjustment {
            Adjustment::Reclaim(amount) if amount > Decimal::ZERO => Some(ExchangeEvent::Reclaimed {
                account: self.account.clone(),
                asset: self.asset.clone(),
                amount,
                timestamp,
            }),
            Adjustment::Rebate(amount) if amount > Decimal::ZERO => Some(ExchangeEvent::Rebated {
                account: self.account.clone(),
                asset: self.asset.clone(),
                amount,
                timestamp,
            }),
            _ => None,
        }
    }
}

/// Usable amount when exchanging out of a settled queue.
///
/// The request is capped at the balance left after any reclaim; a pending
/// rebate is added on top since it is credited in the same operation.
pub fn amount_after_settlement(requested: Decimal, balance: Decimal, rebate: Decimal) -> Decimal {
    requested.min(balance).max(Decimal::ZERO) + rebate
}

/// Computes settlements for queued entries.
pub struct SettlementReconciler<'a> {
    oracle: &'a dyn PriceOracle,
    ledger: &'a dyn LedgerAdapter,
    queues: &'a QueueStore,
}

impl<'a> SettlementReconciler<'a> {
    pub fn new(oracle: &'a dyn PriceOracle, ledger: &'a dyn LedgerAdapter, queues: &'a QueueStore) -> Self {
        Self {
            oracle,
            ledger,
            queues,
        }
    }

    /// Reclaim and rebate owed by a queue, each summed over its entries.
    pub fn settlement_owing(
        &self,
        account: &AccountId,
        asset: &AssetKey,
        now: Timestamp,
        waiting_period_secs: u64,
    ) -> ExchangeResult<SettlementOwing> {
        let entries = self.queues.entries(account, asset);
        let mut owing = SettlementOwing {
            num_entries: entries.len(),
            ..SettlementOwing::default()
        };

        for entry in &entries {
            let delta = self.entry_delta(entry, now, waiting_period_secs)?;
            if delta > Decimal::ZERO {
                owing.reclaim_amount += delta;
            } else {
                owing.rebate_amount -= delta;
            }
        }

        Ok(owing)
    }

    fn entry_delta(
        &self,
        entry: &SettlementEntry,
        now: Timestamp,
        waiting_period_secs: u64,
    ) -> ExchangeResult<Decimal> {
        let settle_at = settlement_time(entry.timestamp, waiting_period_secs, now);
        let settlement_rate = self.oracle.exchange_rate_at(&entry.src, &entry.dest, settle_at)?;
        let drift = entry.exchange_rate - settlement_rate;
        let delta = round_unit(entry.amount * entry.exchange_fee_rate.complement() * drift);

        debug!(
            entry_id = %entry.id,
            locked_rate = %entry.exchange_rate,
            settlement_rate = %settlement_rate,
            delta = %delta,
            "Entry replayed"
        );
        Ok(delta)
    }

    /// Plan the settlement of a mature queue.
    ///
    /// Fails with [`ExchangeError::WaitingPeriod`] while the queue is immature.
    /// An empty queue yields a plan with no adjustment.
    pub fn plan(
        &self,
        account: &AccountId,
        asset: &AssetKey,
        now: Timestamp,
        waiting_period_secs: u64,
    ) -> ExchangeResult<SettlementPlan> {
        let secs_left = self
            .queues
            .seconds_remaining(account, asset, waiting_period_secs, now);
        if secs_left > 0 {
            return Err(ExchangeError::WaitingPeriod {
                account: account.clone(),
                asset: asset.clone(),
                secs_left,
            });
        }

        let owing = self.settlement_owing(account, asset, now, waiting_period_secs)?;
        let balance_before = self.ledger.balance_of(account, asset);
        let net = owing.net();
        let adjustment = if net > Decimal::ZERO {
            // Never reclaim more than is held
            Adjustment::Reclaim(net.min(balance_before))
        } else if net < Decimal::ZERO {
            Adjustment::Rebate(-net)
        } else {
            Adjustment::None
        };

        Ok(SettlementPlan {
            account: account.clone(),
            asset: asset.clone(),
            owing,
            adjustment,
            balance_before,
        })
    }
}

/// Instant whose rate settles an entry: the end of its waiting period, or `now` if earlier.
fn settlement_time(entry_timestamp: Timestamp, waiting_period_secs: u64, now: Timestamp) -> Timestamp {
    i64::try_from(waiting_period_secs)
        .ok()
        .and_then(Duration::try_seconds)
        .and_then(|window| entry_timestamp.checked_add_signed(window))
        .map_or(now, |end| end.min(now))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use synthex_common::{EntryId, FeeRate};
    use synthex_ledger::InMemoryLedger;
    use synthex_oracle::provider::MockPriceOracle;

    struct Fixture {
        oracle: MockPriceOracle,
        ledger: InMemoryLedger,
        queues: QueueStore,
        now: Timestamp,
    }

    impl Fixture {
        fn new() -> Self {
            let oracle = MockPriceOracle::new(AssetKey::susd());
            oracle.set_rate(AssetKey::seur(), dec!(2));
            Self {
                oracle,
                ledger: InMemoryLedger::new(),
                queues: QueueStore::new(),
                now: synthex_common::now(),
            }
        }

        fn reconciler(&self) -> SettlementReconciler<'_> {
            SettlementReconciler::new(&self.oracle, &self.ledger, &self.queues)
        }

        /// 100 sUSD into sEUR at 2, 1% fee: 49.5 sEUR credited.
        fn exchange_into_eur(&self, timestamp: Timestamp) {
            let alice = AccountId::new("alice");
            self.ledger.issue(&alice, &AssetKey::seur(), dec!(49.5)).unwrap();
            self.queues.push(SettlementEntry {
                id: EntryId::new(),
                account: alice,
                src: AssetKey::susd(),
                amount: dec!(100),
                dest: AssetKey::seur(),
                amount_received: dec!(49.5),
                exchange_rate: dec!(0.5),
                exchange_fee_rate: FeeRate::new(dec!(0.01)).unwrap(),
                timestamp,
            });
        }
    }

    fn alice() -> AccountId {
        AccountId::new("alice")
    }

    #[test]
    fn test_reclaim_when_price_rises() {
        let fx = Fixture::new();
        fx.exchange_into_eur(fx.now);
        fx.oracle.set_rate(AssetKey::seur(), dec!(4));

        let owing = fx
            .reconciler()
            .settlement_owing(&alice(), &AssetKey::seur(), fx.now, 180)
            .unwrap();
        assert_eq!(owing.reclaim_amount, dec!(24.75));
        assert_eq!(owing.rebate_amount, Decimal::ZERO);
        assert_eq!(owing.num_entries, 1);
    }

    #[test]
    fn test_rebate_when_price_falls() {
        let fx = Fixture::new();
        fx.exchange_into_eur(fx.now);
        fx.oracle.set_rate(AssetKey::seur(), dec!(1));

        let owing = fx
            .reconciler()
            .settlement_owing(&alice(), &AssetKey::seur(), fx.now, 180)
            .unwrap();
        assert_eq!(owing.reclaim_amount, Decimal::ZERO);
        assert_eq!(owing.rebate_amount, dec!(49.5));
    }

    #[test]
    fn test_plan_refuses_immature_queue() {
        let fx = Fixture::new();
        fx.exchange_into_eur(fx.now);

        let result = fx.reconciler().plan(&alice(), &AssetKey::seur(), fx.now, 180);
        assert!(matches!(
            result,
            Err(ExchangeError::WaitingPeriod { secs_left: 180, .. })
        ));
    }

    #[test]
    fn test_plan_for_empty_queue() {
        let fx = Fixture::new();
        let plan = fx
            .reconciler()
            .plan(&alice(), &AssetKey::seur(), fx.now, 180)
            .unwrap();

        assert_eq!(plan.adjustment, Adjustment::None);
        assert!(plan.postings().is_empty());
        assert!(plan.event(fx.now).is_none());
    }

    #[test]
    fn test_reclaim_capped_at_balance() {
        let fx = Fixture::new();
        let past = fx.now - Duration::seconds(200);
        fx.exchange_into_eur(past);
        fx.ledger
            .burn(&alice(), &AssetKey::seur(), dec!(40))
            .unwrap();
        fx.oracle.set_rate(AssetKey::seur(), dec!(4));

        let plan = fx
            .reconciler()
            .plan(&alice(), &AssetKey::seur(), fx.now, 180)
            .unwrap();
        assert_eq!(plan.owing.reclaim_amount, dec!(24.75));
        assert_eq!(plan.adjustment, Adjustment::Reclaim(dec!(9.5)));
        assert_eq!(plan.balance_after(), Decimal::ZERO);
    }

    #[test]
    fn test_usable_amount() {
        let plan = |adjustment| SettlementPlan {
            account: alice(),
            asset: AssetKey::seur(),
            owing: SettlementOwing::default(),
            adjustment,
            balance_before: dec!(49.5),
        };

        assert_eq!(plan(Adjustment::Reclaim(dec!(24.75))).usable_amount(dec!(30)), dec!(24.75));
        assert_eq!(plan(Adjustment::Rebate(dec!(49.5))).usable_amount(dec!(10)), dec!(59.5));
        assert_eq!(plan(Adjustment::Rebate(dec!(49.5))).usable_amount(dec!(49.5)), dec!(99));
        assert_eq!(plan(Adjustment::None).usable_amount(dec!(60)), dec!(49.5));
    }

    #[test]
    fn test_amount_after_settlement() {
        assert_eq!(amount_after_settlement(dec!(500), dec!(1000), dec!(0)), dec!(500));
        assert_eq!(amount_after_settlement(dec!(500), dec!(1000), dec!(25)), dec!(525));
        assert_eq!(amount_after_settlement(dec!(1200), dec!(1000), dec!(0)), dec!(1000));
        assert_eq!(amount_after_settlement(dec!(1200), dec!(1000), dec!(50)), dec!(1050));
    }

    #[test]
    fn test_settlement_time_is_end_of_waiting_period() {
        let t0 = synthex_common::now();
        let now = t0 + Duration::seconds(500);
        assert_eq!(settlement_time(t0, 180, now), t0 + Duration::seconds(180));
        assert_eq!(settlement_time(t0, 600, now), now);
        assert_eq!(settlement_time(t0, u64::MAX, now), now);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_amount_after_settlement_bounds(
                requested in 0u64..1_000_000,
                balance in 0u64..1_000_000,
                rebate in 0u64..1_000_000,
            ) {
                let (requested, balance, rebate) =
                    (Decimal::from(requested), Decimal::from(balance), Decimal::from(rebate));
                let usable = amount_after_settlement(requested, balance, rebate);

                prop_assert!(usable >= rebate);
                prop_assert!(usable <= balance + rebate);
                prop_assert!(usable <= requested + rebate);
            }
        }
    }
}

//! In-memory ledger implementation.

use std::collections::HashMap;

use parking_lot::RwLock;
use rust_decimal::Decimal;
use synthex_common::{AccountId, AssetKey};
use tracing::{debug, info, instrument};

use crate::adapter::LedgerAdapter;
use crate::balance::AccountBalance;
use crate::error::{LedgerError, LedgerResult};
use crate::journal::{JournalEntry, Posting, PostingBatch};

type BalanceKey = (AccountId, AssetKey);

#[derive(Default)]
struct LedgerState {
    balances: HashMap<BalanceKey, AccountBalance>,
    journal: Vec<JournalEntry>,
}

/// Ledger keeping balances and the journal in memory.
///
/// Batches are checked against a scratch copy of the touched balances and
/// committed under one write lock, so readers never see half a batch.
#[derive(Default)]
pub struct InMemoryLedger {
    state: RwLock<LedgerState>,
}

impl InMemoryLedger {
    /// Create a new, empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint `amount` of `asset` to `account`.
    #[instrument(skip(self))]
    pub fn issue(&self, account: &AccountId, asset: &AssetKey, amount: Decimal) -> LedgerResult<()> {
        let batch = PostingBatch::new("issue").with(Posting::credit(
            account.clone(),
            asset.clone(),
            amount,
        ));
        self.commit(&batch)?;
        info!(account = %account, asset = %asset, amount = %amount, "Issued");
        Ok(())
    }

    /// Burn `amount` of `asset` from `account`.
    #[instrument(skip(self))]
    pub fn burn(&self, account: &AccountId, asset: &AssetKey, amount: Decimal) -> LedgerResult<()> {
        let batch = PostingBatch::new("burn").with(Posting::debit(
            account.clone(),
            asset.clone(),
            amount,
        ));
        self.commit(&batch)
    }

    /// Sum of all balances of an asset.
    pub fn total_supply(&self, asset: &AssetKey) -> Decimal {
        self.state
            .read()
            .balances
            .values()
            .filter(|b| &b.asset == asset)
            .map(|b| b.balance)
            .sum()
    }

    /// Every non-zero balance held by an account.
    pub fn balances(&self, account: &AccountId) -> Vec<AccountBalance> {
        let mut balances: Vec<AccountBalance> = self
            .state
            .read()
            .balances
            .values()
            .filter(|b| &b.account == account && !b.is_empty())
            .cloned()
            .collect();
        balances.sort_by(|a, b| a.asset.cmp(&b.asset));
        balances
    }

    /// Journal entries touching an account, oldest first.
    pub fn entries_for(&self, account: &AccountId) -> Vec<JournalEntry> {
        self.state
            .read()
            .journal
            .iter()
            .filter(|e| &e.account == account)
            .cloned()
            .collect()
    }

    /// Number of journal entries recorded.
    pub fn journal_len(&self) -> usize {
        self.state.read().journal.len()
    }

    fn commit(&self, batch: &PostingBatch) -> LedgerResult<()> {
        if let Some(bad) = batch.postings.iter().find(|p| p.amount < Decimal::ZERO) {
            return Err(LedgerError::InvalidAmount(bad.amount));
        }

        let mut state = self.state.write();

        // Dry run against a scratch copy of the touched balances
        let mut scratch: HashMap<BalanceKey, Decimal> = HashMap::new();
        let mut balances_after = Vec::with_capacity(batch.postings.len());
        for posting in &batch.postings {
            let key = (posting.account.clone(), posting.asset.clone());
            let current = match scratch.get(&key) {
                Some(balance) => *balance,
                None => state.balances.get(&key).map(|b| b.balance).unwrap_or_default(),
            };
            let next = current + posting.balance_delta();
            if next < Decimal::ZERO {
                return Err(LedgerError::InsufficientBalance {
                    account: posting.account.clone(),
                    asset: posting.asset.clone(),
                    required: posting.amount,
                    available: current,
                });
            }
            scratch.insert(key, next);
            balances_after.push(next);
        }

        let now = chrono::Utc::now();
        for (key, balance) in scratch {
            let entry = state
                .balances
                .entry(key.clone())
                .or_insert_with(|| AccountBalance::zero(key.0, key.1));
            entry.balance = balance;
            entry.updated_at = now;
        }
        for (posting, balance_after) in batch.postings.iter().zip(balances_after) {
            state
                .journal
                .push(JournalEntry::from_posting(batch, posting, balance_after));
        }

        debug!(
            batch_id = %batch.id,
            reference = %batch.reference,
            postings = batch.len(),
            "Batch committed"
        );
        Ok(())
    }
}

impl LedgerAdapter for InMemoryLedger {
    fn balance_of(&self, account: &AccountId, asset: &AssetKey) -> Decimal {
        self.state
            .read()
            .balances
            .get(&(account.clone(), asset.clone()))
            .map(|b| b.balance)
            .unwrap_or_default()
    }

    fn debit(&self, account: &AccountId, asset: &AssetKey, amount: Decimal) -> LedgerResult<()> {
        self.commit(&PostingBatch::new("debit").with(Posting::debit(
            account.clone(),
            asset.clone(),
            amount,
        )))
    }

    fn credit(&self, account: &AccountId, asset: &AssetKey, amount: Decimal) -> LedgerResult<()> {
        self.commit(&PostingBatch::new("credit").with(Posting::credit(
            account.clone(),
            asset.clone(),
            amount,
        )))
    }

    fn apply_batch(&self, batch: &PostingBatch) -> LedgerResult<()> {
        self.commit(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn alice() -> AccountId {
        AccountId::new("alice")
    }

    #[test]
    fn test_issue_and_balance() {
        let ledger = InMemoryLedger::new();
        ledger.issue(&alice(), &AssetKey::susd(), dec!(100)).unwrap();

        assert_eq!(ledger.balance_of(&alice(), &AssetKey::susd()), dec!(100));
        assert_eq!(ledger.balance_of(&alice(), &AssetKey::seur()), Decimal::ZERO);
        assert_eq!(ledger.total_supply(&AssetKey::susd()), dec!(100));
    }

    #[test]
    fn test_debit_insufficient() {
        let ledger = InMemoryLedger::new();
        ledger.issue(&alice(), &AssetKey::susd(), dec!(10)).unwrap();

        let result = ledger.debit(&alice(), &AssetKey::susd(), dec!(11));
        assert!(matches!(
            result,
            Err(LedgerError::InsufficientBalance { available, .. }) if available == dec!(10)
        ));
        assert_eq!(ledger.balance_of(&alice(), &AssetKey::susd()), dec!(10));
    }

    #[test]
    fn test_batch_is_all_or_nothing() {
        let ledger = InMemoryLedger::new();
        ledger.issue(&alice(), &AssetKey::susd(), dec!(100)).unwrap();

        let batch = PostingBatch::new("exchange")
            .with(Posting::debit(alice(), AssetKey::susd(), dec!(100)))
            .with(Posting::credit(alice(), AssetKey::seur(), dec!(50)))
            .with(Posting::debit(alice(), AssetKey::sbtc(), dec!(1)));

        assert!(ledger.apply_batch(&batch).is_err());
        assert_eq!(ledger.balance_of(&alice(), &AssetKey::susd()), dec!(100));
        assert_eq!(ledger.balance_of(&alice(), &AssetKey::seur()), Decimal::ZERO);
        assert_eq!(ledger.journal_len(), 1);
    }

    #[test]
    fn test_batch_sees_its_own_earlier_postings() {
        let ledger = InMemoryLedger::new();
        ledger.issue(&alice(), &AssetKey::seur(), dec!(10)).unwrap();

        // Rebate credited then spent within the same batch
        let batch = PostingBatch::new("exchange")
            .with(Posting::credit(alice(), AssetKey::seur(), dec!(5)))
            .with(Posting::debit(alice(), AssetKey::seur(), dec!(15)));

        ledger.apply_batch(&batch).unwrap();
        assert_eq!(ledger.balance_of(&alice(), &AssetKey::seur()), Decimal::ZERO);

        let entries = ledger.entries_for(&alice());
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[1].balance_after, dec!(15));
    }

    #[test]
    fn test_negative_amount_rejected() {
        let ledger = InMemoryLedger::new();
        let result = ledger.credit(&alice(), &AssetKey::susd(), dec!(-1));
        assert!(matches!(result, Err(LedgerError::InvalidAmount(_))));
    }

    #[test]
    fn test_balances_listing() {
        let ledger = InMemoryLedger::new();
        ledger.issue(&alice(), &AssetKey::susd(), dec!(1)).unwrap();
        ledger.issue(&alice(), &AssetKey::seur(), dec!(2)).unwrap();
        ledger.burn(&alice(), &AssetKey::seur(), dec!(2)).unwrap();

        let balances = ledger.balances(&alice());
        assert_eq!(balances.len(), 1);
        assert_eq!(balances[0].asset, AssetKey::susd());
    }

    struct SequentialLedger(InMemoryLedger);

    impl LedgerAdapter for SequentialLedger {
        fn balance_of(&self, account: &AccountId, asset: &AssetKey) -> Decimal {
            self.0.balance_of(account, asset)
        }

        fn debit(&self, account: &AccountId, asset: &AssetKey, amount: Decimal) -> LedgerResult<()> {
            self.0.debit(account, asset, amount)
        }

        fn credit(&self, account: &AccountId, asset: &AssetKey, amount: Decimal) -> LedgerResult<()> {
            self.0.credit(account, asset, amount)
        }
    }

    #[test]
    fn test_default_batch_reverses_on_failure() {
        let ledger = SequentialLedger(InMemoryLedger::new());
        ledger.0.issue(&alice(), &AssetKey::susd(), dec!(100)).unwrap();

        let batch = PostingBatch::new("exchange")
            .with(Posting::debit(alice(), AssetKey::susd(), dec!(100)))
            .with(Posting::credit(alice(), AssetKey::seur(), dec!(50)))
            .with(Posting::debit(alice(), AssetKey::sbtc(), dec!(1)));

        assert!(ledger.apply_batch(&batch).is_err());
        assert_eq!(ledger.balance_of(&alice(), &AssetKey::susd()), dec!(100));
        assert_eq!(ledger.balance_of(&alice(), &AssetKey::seur()), Decimal::ZERO);
    }

    proptest! {
        #[test]
        fn prop_supply_is_conserved_by_transfers(amount in 0u64..1_000_000, moved in 0u64..1_000_000) {
            let ledger = InMemoryLedger::new();
            let bob = AccountId::new("bob");
            let amount = Decimal::from(amount);
            let moved = Decimal::from(moved);
            ledger.issue(&alice(), &AssetKey::susd(), amount).unwrap();

            let batch = PostingBatch::new("transfer")
                .with(Posting::debit(alice(), AssetKey::susd(), moved))
                .with(Posting::credit(bob.clone(), AssetKey::susd(), moved));
            let result = ledger.apply_batch(&batch);

            prop_assert_eq!(result.is_ok(), moved <= amount);
            prop_assert_eq!(ledger.total_supply(&AssetKey::susd()), amount);
        }
    }
}

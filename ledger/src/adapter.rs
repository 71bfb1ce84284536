//! The ledger trait consumed by the exchange engine.

use rust_decimal::Decimal;
use synthex_common::{AccountId, AssetKey};
use tracing::warn;

use crate::error::LedgerResult;
use crate::journal::{EntryType, PostingBatch};

/// Balance store for synthetic assets.
pub trait LedgerAdapter: Send + Sync {
    /// Current balance; zero for unknown accounts.
    fn balance_of(&self, account: &AccountId, asset: &AssetKey) -> Decimal;

    /// Decrease a balance. Fails without effect if the balance is too small.
    fn debit(&self, account: &AccountId, asset: &AssetKey, amount: Decimal) -> LedgerResult<()>;

    /// Increase a balance.
    fn credit(&self, account: &AccountId, asset: &AssetKey, amount: Decimal) -> LedgerResult<()>;

    /// Apply every posting of `batch` or none of them.
    ///
    /// The default applies postings in order and reverses the applied prefix
    /// when one fails. Stores with native transactions should override it.
    fn apply_batch(&self, batch: &PostingBatch) -> LedgerResult<()> {
        for (applied, posting) in batch.postings.iter().enumerate() {
            let result = match posting.entry_type {
                EntryType::Debit => self.debit(&posting.account, &posting.asset, posting.amount),
                EntryType::Credit => self.credit(&posting.account, &posting.asset, posting.amount),
            };

            if let Err(e) = result {
                warn!(batch_id = %batch.id, error = %e, "Posting failed, reversing batch");
                for done in batch.postings[..applied].iter().rev() {
                    let undo = done.reversed();
                    let reverted = match undo.entry_type {
                        EntryType::Debit => self.debit(&undo.account, &undo.asset, undo.amount),
                        EntryType::Credit => self.credit(&undo.account, &undo.asset, undo.amount),
                    };
                    if let Err(undo_err) = reverted {
                        warn!(batch_id = %batch.id, error = %undo_err, "Failed to reverse posting");
                    }
                }
                return Err(e);
            }
        }
        Ok(())
    }
}

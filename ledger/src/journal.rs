//! Postings and journal entries.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use synthex_common::{AccountId, AssetKey};
use uuid::Uuid;

/// Direction of a balance movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryType {
    /// Debit (decreases the holder's balance).
    Debit,
    /// Credit (increases the holder's balance).
    Credit,
}

/// A requested balance movement, not yet applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub account: AccountId,
    pub asset: AssetKey,
    pub entry_type: EntryType,
    pub amount: Decimal,
}

impl Posting {
    /// Create a debit posting.
    pub fn debit(account: AccountId, asset: AssetKey, amount: Decimal) -> Self {
        Self {
            account,
            asset,
            entry_type: EntryType::Debit,
            amount,
        }
    }

    /// Create a credit posting.
    pub fn credit(account: AccountId, asset: AssetKey, amount: Decimal) -> Self {
        Self {
            account,
            asset,
            entry_type: EntryType::Credit,
            amount,
        }
    }

    /// Signed change to the holder's balance.
    pub fn balance_delta(&self) -> Decimal {
        match self.entry_type {
            EntryType::Debit => -self.amount,
            EntryType::Credit => self.amount,
        }
    }

    /// The posting that undoes this one.
    pub fn reversed(&self) -> Self {
        let entry_type = match self.entry_type {
            EntryType::Debit => EntryType::Credit,
            EntryType::Credit => EntryType::Debit,
        };
        Self {
            entry_type,
            ..self.clone()
        }
    }
}

/// A posting as recorded in the journal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Unique entry ID.
    pub id: Uuid,
    /// Batch this entry was applied in.
    pub batch_id: Uuid,
    /// Free-form reference supplied with the batch.
    pub reference: String,
    /// Account affected.
    pub account: AccountId,
    /// Asset affected.
    pub asset: AssetKey,
    /// Entry type (debit or credit).
    pub entry_type: EntryType,
    /// Amount.
    pub amount: Decimal,
    /// Balance after this entry.
    pub balance_after: Decimal,
    /// When this entry was created.
    pub created_at: DateTime<Utc>,
}

impl JournalEntry {
    /// Record `posting` as applied in `batch`.
    pub fn from_posting(batch: &PostingBatch, posting: &Posting, balance_after: Decimal) -> Self {
        Self {
            id: Uuid::now_v7(),
            batch_id: batch.id,
            reference: batch.reference.clone(),
            account: posting.account.clone(),
            asset: posting.asset.clone(),
            entry_type: posting.entry_type,
            amount: posting.amount,
            balance_after,
            created_at: Utc::now(),
        }
    }
}

/// A set of postings that must be applied together.
#[derive(Debug, Clone)]
pub struct PostingBatch {
    /// Batch ID.
    pub id: Uuid,
    /// What the batch is for, e.g. `exchange` or `settle`.
    pub reference: String,
    /// Postings in application order.
    pub postings: Vec<Posting>,
}

impl PostingBatch {
    /// Create a new batch.
    pub fn new(reference: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            reference: reference.into(),
            postings: Vec::new(),
        }
    }

    /// Add a posting to the batch. Zero amounts are dropped.
    pub fn add(&mut self, posting: Posting) {
        if !posting.amount.is_zero() {
            self.postings.push(posting);
        }
    }

    /// Builder form of [`PostingBatch::add`].
    pub fn with(mut self, posting: Posting) -> Self {
        self.add(posting);
        self
    }

    /// Append every posting of another batch.
    pub fn extend(&mut self, postings: impl IntoIterator<Item = Posting>) {
        for posting in postings {
            self.add(posting);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.postings.len()
    }

    /// Net change the batch makes to one balance.
    pub fn net_change(&self, account: &AccountId, asset: &AssetKey) -> Decimal {
        self.postings
            .iter()
            .filter(|p| &p.account == account && &p.asset == asset)
            .map(Posting::balance_delta)
            .sum()
    }

    /// Get total debits of an asset.
    pub fn total_debits(&self, asset: &AssetKey) -> Decimal {
        self.total(asset, EntryType::Debit)
    }

    /// Get total credits of an asset.
    pub fn total_credits(&self, asset: &AssetKey) -> Decimal {
        self.total(asset, EntryType::Credit)
    }

    fn total(&self, asset: &AssetKey, entry_type: EntryType) -> Decimal {
        self.postings
            .iter()
            .filter(|p| &p.asset == asset && p.entry_type == entry_type)
            .map(|p| p.amount)
            .sum()
    }
}

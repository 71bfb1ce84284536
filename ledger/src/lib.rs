//! Synthex Ledger
//!
//! Per-account synthetic-asset balances with journaled postings.
//!
//! The exchange engine talks to balances only through [`LedgerAdapter`];
//! [`InMemoryLedger`] is the reference implementation used by tests and the
//! simulator. A [`PostingBatch`] is applied all-or-nothing.

pub mod adapter;
pub mod balance;
pub mod engine;
pub mod error;
pub mod journal;

pub use adapter::LedgerAdapter;
pub use balance::AccountBalance;
pub use engine::InMemoryLedger;
pub use error::{LedgerError, LedgerResult};
pub use journal::{EntryType, JournalEntry, Posting, PostingBatch};

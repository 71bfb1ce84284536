//! Delegate approvals.

use dashmap::DashSet;
use synthex_common::AccountId;
use tracing::info;

/// Registry of accounts allowed to exchange on another account's behalf.
pub trait DelegateApprovals: Send + Sync {
    fn can_exchange_for(&self, authoriser: &AccountId, delegate: &AccountId) -> bool;
}

/// In-memory approval registry.
#[derive(Default)]
pub struct InMemoryDelegateApprovals {
    approvals: DashSet<(AccountId, AccountId)>,
}

impl InMemoryDelegateApprovals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow `delegate` to exchange for `authoriser`.
    pub fn approve(&self, authoriser: &AccountId, delegate: &AccountId) {
        info!(authoriser = %authoriser, delegate = %delegate, "Exchange delegate approved");
        self.approvals.insert((authoriser.clone(), delegate.clone()));
    }

    /// Withdraw an approval. Returns whether one existed.
    pub fn remove(&self, authoriser: &AccountId, delegate: &AccountId) -> bool {
        self.approvals
            .remove(&(authoriser.clone(), delegate.clone()))
            .is_some()
    }
}

impl DelegateApprovals for InMemoryDelegateApprovals {
    fn can_exchange_for(&self, authoriser: &AccountId, delegate: &AccountId) -> bool {
        self.approvals
            .contains(&(authoriser.clone(), delegate.clone()))
    }
}

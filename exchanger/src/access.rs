//! Caller capabilities and ownership.

use std::fmt;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use synthex_common::AccountId;
use tracing::info;
use uuid::Uuid;

use crate::error::{ExchangeError, ExchangeResult};

/// Capability handed to a registered exchange boundary.
///
/// Exchange entry points only accept capabilities the engine itself issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallerId(Uuid);

impl CallerId {
    /// Mint a fresh, unregistered capability.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CallerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CallerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Authorization check for configuration changes.
pub trait Authority: Send + Sync {
    fn is_owner(&self, account: &AccountId) -> bool;

    fn require_owner(&self, account: &AccountId) -> ExchangeResult<()> {
        if self.is_owner(account) {
            Ok(())
        } else {
            Err(ExchangeError::OnlyOwner(account.clone()))
        }
    }
}

/// Single owner with two-step transfer (nominate, then accept).
pub struct Ownership {
    owner: RwLock<AccountId>,
    nominated: RwLock<Option<AccountId>>,
}

impl Ownership {
    /// Create with an initial owner.
    pub fn new(owner: AccountId) -> Self {
        Self {
            owner: RwLock::new(owner),
            nominated: RwLock::new(None),
        }
    }

    pub fn owner(&self) -> AccountId {
        self.owner.read().clone()
    }

    /// Nominate the next owner. Only the current owner may nominate.
    pub fn nominate(&self, caller: &AccountId, nominee: AccountId) -> ExchangeResult<()> {
        self.require_owner(caller)?;
        info!(nominee = %nominee, "Owner nominated");
        *self.nominated.write() = Some(nominee);
        Ok(())
    }

    /// Accept a nomination. Only the nominee may accept.
    pub fn accept(&self, caller: &AccountId) -> ExchangeResult<()> {
        let mut nominated = self.nominated.write();
        if nominated.as_ref() != Some(caller) {
            return Err(ExchangeError::OnlyOwner(caller.clone()));
        }
        *self.owner.write() = caller.clone();
        *nominated = None;
        info!(owner = %caller, "Ownership accepted");
        Ok(())
    }
}

impl Authority for Ownership {
    fn is_owner(&self, account: &AccountId) -> bool {
        &*self.owner.read() == account
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_check() {
        let ownership = Ownership::new(AccountId::new("owner"));
        assert!(ownership.require_owner(&AccountId::new("owner")).is_ok());
        assert_eq!(
            ownership.require_owner(&AccountId::new("mallory")),
            Err(ExchangeError::OnlyOwner(AccountId::new("mallory")))
        );
    }

    #[test]
    fn test_two_step_transfer() {
        let owner = AccountId::new("owner");
        let next = AccountId::new("next");
        let ownership = Ownership::new(owner.clone());

        assert!(ownership.nominate(&next, next.clone()).is_err());
        ownership.nominate(&owner, next.clone()).unwrap();
        assert!(ownership.accept(&AccountId::new("mallory")).is_err());

        ownership.accept(&next).unwrap();
        assert_eq!(ownership.owner(), next);
        assert!(!ownership.is_owner(&owner));
    }

    #[test]
    fn test_caller_ids_are_unique() {
        assert_ne!(CallerId::new(), CallerId::new());
    }
}

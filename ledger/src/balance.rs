//! Account balance snapshots.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use synthex_common::{AccountId, AssetKey};

/// Balance of one asset held by one account, at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountBalance {
    /// Account identifier.
    pub account: AccountId,
    /// Asset held.
    pub asset: AssetKey,
    /// Amount held.
    pub balance: Decimal,
    /// When this balance was last changed.
    pub updated_at: DateTime<Utc>,
}

impl AccountBalance {
    /// Create a new zero balance.
    pub fn zero(account: AccountId, asset: AssetKey) -> Self {
        Self {
            account,
            asset,
            balance: Decimal::ZERO,
            updated_at: Utc::now(),
        }
    }

    /// Check if the account can cover a debit of `amount`.
    pub fn has_sufficient_funds(&self, amount: Decimal) -> bool {
        self.balance >= amount
    }

    pub fn is_empty(&self) -> bool {
        self.balance.is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balance_operations() {
        let mut balance = AccountBalance::zero(AccountId::new("alice"), AssetKey::susd());
        assert!(balance.is_empty());

        balance.balance = Decimal::from(100);
        assert!(balance.has_sufficient_funds(Decimal::from(100)));
        assert!(!balance.has_sufficient_funds(Decimal::from(101)));
    }
}

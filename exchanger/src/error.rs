//! Exchange engine error types.

use rust_decimal::Decimal;
use synthex_common::{AccountId, AssetKey, CommonError};
use synthex_ledger::LedgerError;
use synthex_oracle::OracleError;
use thiserror::Error;

use crate::suspension::SuspensionScope;

/// Errors returned by exchange and settlement operations.
///
/// Every error aborts its operation before any balance, queue or fee effect.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExchangeError {
    /// System, exchange subsystem or an asset is suspended.
    #[error("Operation prohibited: {0} suspended")]
    Suspended(SuspensionScope),

    /// A required price is missing or too old.
    #[error("Src/dest rate stale or not found: {0}")]
    StaleRate(AssetKey),

    /// The settlement queue has not matured yet.
    #[error("Cannot settle during waiting period: {secs_left}s left for {account}/{asset}")]
    WaitingPeriod {
        account: AccountId,
        asset: AssetKey,
        secs_left: u64,
    },

    /// Appending would exceed the queue limit.
    #[error("Max queue length reached for {account}/{asset} ({max})")]
    QueueOverflow {
        account: AccountId,
        asset: AssetKey,
        max: usize,
    },

    /// Delegate is not approved to exchange for the authoriser.
    #[error("Not approved to act on behalf of {authoriser}: {delegate}")]
    NotApproved {
        authoriser: AccountId,
        delegate: AccountId,
    },

    /// Call did not come through a registered boundary.
    #[error("Unauthorized caller")]
    UnauthorizedCaller,

    /// Caller is not the owner.
    #[error("Only the owner may perform this action: {0}")]
    OnlyOwner(AccountId),

    /// Requested amount exceeds holdings.
    #[error("Insufficient {asset} balance for {account}: required {required}, available {available}")]
    InsufficientBalance {
        account: AccountId,
        asset: AssetKey,
        required: Decimal,
        available: Decimal,
    },

    /// Amount is zero or negative.
    #[error("Invalid amount: {0}")]
    InvalidAmount(Decimal),

    /// Source and destination are the same asset.
    #[error("Can't exchange {0} into itself")]
    SameAsset(AssetKey),

    /// Configuration rejected.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Oracle failure.
    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),

    /// Ledger failure.
    #[error("Ledger error: {0}")]
    Ledger(LedgerError),

    /// Malformed input.
    #[error("Validation error: {0}")]
    Validation(#[from] CommonError),
}

impl From<LedgerError> for ExchangeError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientBalance {
                account,
                asset,
                required,
                available,
            } => ExchangeError::InsufficientBalance {
                account,
                asset,
                required,
                available,
            },
            other => ExchangeError::Ledger(other),
        }
    }
}

impl ExchangeError {
    /// Check if retrying later can succeed without any other change.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ExchangeError::WaitingPeriod { .. } | ExchangeError::StaleRate(_)
        )
    }

    /// Get error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            ExchangeError::Suspended(_) => "SUSPENDED",
            ExchangeError::StaleRate(_) => "STALE_RATE",
            ExchangeError::WaitingPeriod { .. } => "WAITING_PERIOD",
            ExchangeError::QueueOverflow { .. } => "QUEUE_OVERFLOW",
            ExchangeError::NotApproved { .. } => "NOT_APPROVED",
            ExchangeError::UnauthorizedCaller => "UNAUTHORIZED_CALLER",
            ExchangeError::OnlyOwner(_) => "ONLY_OWNER",
            ExchangeError::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            ExchangeError::InvalidAmount(_) => "INVALID_AMOUNT",
            ExchangeError::SameAsset(_) => "SAME_ASSET",
            ExchangeError::InvalidConfiguration(_) => "INVALID_CONFIGURATION",
            ExchangeError::Oracle(_) => "ORACLE_ERROR",
            ExchangeError::Ledger(_) => "LEDGER_ERROR",
            ExchangeError::Validation(_) => "VALIDATION_ERROR",
        }
    }
}

/// Result type for exchange operations.
pub type ExchangeResult<T> = Result<T, ExchangeError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_ledger_shortfall_maps_to_insufficient_balance() {
        let err: ExchangeError = LedgerError::InsufficientBalance {
            account: AccountId::new("alice"),
            asset: AssetKey::seur(),
            required: dec!(10),
            available: dec!(5),
        }
        .into();

        assert_eq!(err.error_code(), "INSUFFICIENT_BALANCE");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_retryable_errors() {
        let waiting = ExchangeError::WaitingPeriod {
            account: AccountId::new("alice"),
            asset: AssetKey::seur(),
            secs_left: 10,
        };
        assert!(waiting.is_retryable());
        assert!(ExchangeError::StaleRate(AssetKey::seur()).is_retryable());
        assert!(!ExchangeError::Suspended(SuspensionScope::System).is_retryable());
        assert!(!ExchangeError::UnauthorizedCaller.is_retryable());
    }

    #[test]
    fn test_suspended_message() {
        let err = ExchangeError::Suspended(SuspensionScope::Asset(AssetKey::seur()));
        assert_eq!(err.to_string(), "Operation prohibited: asset sEUR suspended");
    }
}

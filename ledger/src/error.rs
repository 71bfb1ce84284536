//! Ledger error types.

use rust_decimal::Decimal;
use synthex_common::{AccountId, AssetKey};
use thiserror::Error;

/// Errors that can occur when moving balances.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    /// Debit larger than the available balance.
    #[error("Insufficient {asset} balance for {account}: required {required}, available {available}")]
    InsufficientBalance {
        account: AccountId,
        asset: AssetKey,
        required: Decimal,
        available: Decimal,
    },

    /// Negative posting amount.
    #[error("Invalid posting amount: {0}")]
    InvalidAmount(Decimal),
}

impl LedgerError {
    /// Get error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            LedgerError::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            LedgerError::InvalidAmount(_) => "INVALID_AMOUNT",
        }
    }
}

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

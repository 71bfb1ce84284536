//! Validation errors shared by the Synthex crates.

use rust_decimal::Decimal;
use thiserror::Error;

/// Errors raised when constructing shared types from untrusted input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommonError {
    /// Malformed account identifier.
    #[error("Invalid account id: {0:?}")]
    InvalidAccountId(String),

    /// Malformed asset key.
    #[error("Invalid asset key: {0:?}")]
    InvalidAssetKey(String),

    /// Fee rate outside `[0, 1]`.
    #[error("Invalid fee rate {0}: must be within [0, 1]")]
    InvalidFeeRate(Decimal),
}

impl CommonError {
    /// Get error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            CommonError::InvalidAccountId(_) => "INVALID_ACCOUNT_ID",
            CommonError::InvalidAssetKey(_) => "INVALID_ASSET_KEY",
            CommonError::InvalidFeeRate(_) => "INVALID_FEE_RATE",
        }
    }
}

/// Result type alias for shared validation.
pub type CommonResult<T> = std::result::Result<T, CommonError>;

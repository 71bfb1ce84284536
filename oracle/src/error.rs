//! Oracle error types.

use rust_decimal::Decimal;
use synthex_common::{AssetKey, Timestamp};
use thiserror::Error;

/// Errors that can occur in the price oracle.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OracleError {
    /// No rate has ever been recorded for the asset (or none at the requested time).
    #[error("Rate not available for {0}")]
    RateNotAvailable(AssetKey),

    /// Rate is zero or negative.
    #[error("Invalid rate {rate} for {asset}")]
    InvalidRate { asset: AssetKey, rate: Decimal },

    /// The base asset's rate is fixed at 1.
    #[error("Rate of base asset {0} cannot be updated")]
    BaseAssetUpdate(AssetKey),

    /// Update timestamped too far ahead of the oracle clock.
    #[error("Rate update timestamp {timestamp} is too far in the future")]
    FutureTimestamp { timestamp: Timestamp },

    /// Inverse pricing parameters violate `0 < lower < entry < upper`.
    #[error("Invalid inverse pricing for {asset}: {reason}")]
    InvalidInversePricing { asset: AssetKey, reason: String },
}

impl OracleError {
    /// Get error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            OracleError::RateNotAvailable(_) => "RATE_NOT_AVAILABLE",
            OracleError::InvalidRate { .. } => "INVALID_RATE",
            OracleError::BaseAssetUpdate(_) => "BASE_ASSET_UPDATE",
            OracleError::FutureTimestamp { .. } => "FUTURE_TIMESTAMP",
            OracleError::InvalidInversePricing { .. } => "INVALID_INVERSE_PRICING",
        }
    }
}

/// Result type for oracle operations.
pub type OracleResult<T> = Result<T, OracleError>;

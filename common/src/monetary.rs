//! Monetary types for Synthex.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CommonError;

/// Decimal places carried by every synthetic-asset amount.
pub const UNIT_DECIMALS: u32 = 18;

/// Round a computed amount to synthetic-asset unit precision.
pub fn round_unit(value: Decimal) -> Decimal {
    value.round_dp(UNIT_DECIMALS)
}

/// Fraction of an exchanged value kept as fee, within `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct FeeRate(Decimal);

impl FeeRate {
    pub const ZERO: FeeRate = FeeRate(Decimal::ZERO);

    /// Create a fee rate, rejecting values outside `[0, 1]`.
    pub fn new(rate: Decimal) -> Result<Self, CommonError> {
        if rate < Decimal::ZERO || rate > Decimal::ONE {
            return Err(CommonError::InvalidFeeRate(rate));
        }
        Ok(Self(rate))
    }

    /// Create a fee rate from basis points, saturating at 100%.
    pub fn from_basis_points(bps: u16) -> Self {
        Self(Decimal::new(i64::from(bps.min(10_000)), 4))
    }

    /// Get the raw fraction.
    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Fraction of the value left after the fee.
    pub fn complement(&self) -> Decimal {
        Decimal::ONE - self.0
    }

    /// Fee charged on `amount`, rounded to unit precision.
    pub fn fee_on(&self, amount: Decimal) -> Decimal {
        round_unit(amount * self.0)
    }
}

impl TryFrom<Decimal> for FeeRate {
    type Error = CommonError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<FeeRate> for Decimal {
    fn from(rate: FeeRate) -> Self {
        rate.0
    }
}

impl fmt::Display for FeeRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_fee_rate_bounds() {
        assert!(FeeRate::new(dec!(0.005)).is_ok());
        assert!(FeeRate::new(Decimal::ONE).is_ok());
        assert!(FeeRate::new(dec!(-0.01)).is_err());
        assert!(FeeRate::new(dec!(1.01)).is_err());
    }

    #[test]
    fn test_fee_on_amount() {
        let rate = FeeRate::new(dec!(0.01)).unwrap();
        assert_eq!(rate.fee_on(dec!(50)), dec!(0.5));
        assert_eq!(rate.complement(), dec!(0.99));
    }

    #[test]
    fn test_fee_rate_from_basis_points() {
        assert_eq!(FeeRate::from_basis_points(30).value(), dec!(0.003));
        assert_eq!(FeeRate::from_basis_points(20_000).value(), Decimal::ONE);
    }

    #[test]
    fn test_round_unit_keeps_eighteen_places() {
        let third = Decimal::ONE / Decimal::from(3);
        assert_eq!(round_unit(third).scale(), UNIT_DECIMALS);
    }
}

//! Inverse pricing.
//!
//! An inverse asset tracks the mirror image of its underlying price around an
//! entry point. Once the mirrored rate touches a bound it freezes there and
//! ignores further price updates until the pricing is reset.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use synthex_common::AssetKey;

use crate::error::{OracleError, OracleResult};

/// Bound at which an inverse rate froze.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrozenBound {
    Upper,
    Lower,
}

/// Inverse pricing parameters of one asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InversePricing {
    pub entry_point: Decimal,
    pub upper_limit: Decimal,
    pub lower_limit: Decimal,
    pub frozen: Option<FrozenBound>,
}

impl InversePricing {
    /// Create inverse pricing, validating `0 < lower < entry < upper`.
    pub fn new(
        asset: &AssetKey,
        entry_point: Decimal,
        upper_limit: Decimal,
        lower_limit: Decimal,
    ) -> OracleResult<Self> {
        let invalid = |reason: &str| OracleError::InvalidInversePricing {
            asset: asset.clone(),
            reason: reason.to_string(),
        };

        if entry_point <= Decimal::ZERO {
            return Err(invalid("entry point must be above 0"));
        }
        if lower_limit <= Decimal::ZERO || lower_limit >= entry_point {
            return Err(invalid("lower limit must be above 0 and below the entry point"));
        }
        if upper_limit <= entry_point {
            return Err(invalid("upper limit must be above the entry point"));
        }
        if upper_limit >= entry_point * Decimal::TWO {
            return Err(invalid("upper limit must be less than double the entry point"));
        }

        Ok(Self {
            entry_point,
            upper_limit,
            lower_limit,
            frozen: None,
        })
    }

    /// Start frozen at the given bound.
    pub fn frozen_at(mut self, bound: Option<FrozenBound>) -> Self {
        self.frozen = bound;
        self
    }

    /// Rate of a frozen asset.
    pub fn frozen_rate(&self) -> Option<Decimal> {
        self.frozen.map(|bound| self.bound_rate(bound))
    }

    fn bound_rate(&self, bound: FrozenBound) -> Decimal {
        match bound {
            FrozenBound::Upper => self.upper_limit,
            FrozenBound::Lower => self.lower_limit,
        }
    }

    /// Mirror a raw price around the entry point, freezing at a bound when touched.
    pub fn invert(&mut self, raw: Decimal) -> Decimal {
        if let Some(rate) = self.frozen_rate() {
            return rate;
        }

        let inverted = self.entry_point * Decimal::TWO - raw;
        if inverted >= self.upper_limit {
            self.frozen = Some(FrozenBound::Upper);
            self.upper_limit
        } else if inverted <= self.lower_limit {
            self.frozen = Some(FrozenBound::Lower);
            self.lower_limit
        } else {
            inverted
        }
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn ibtc() -> InversePricing {
        InversePricing::new(&AssetKey::ibtc(), dec!(4000), dec!(6500), dec!(1000)).unwrap()
    }

    #[test]
    fn test_inverts_within_bounds() {
        let mut pricing = ibtc();
        assert_eq!(pricing.invert(dec!(6000)), dec!(2000));
        assert_eq!(pricing.invert(dec!(3000)), dec!(5000));
        assert!(!pricing.is_frozen());
    }

    #[test]
    fn test_freezes_at_lower_limit() {
        let mut pricing = ibtc();
        assert_eq!(pricing.invert(dec!(7500)), dec!(1000));
        assert_eq!(pricing.frozen, Some(FrozenBound::Lower));

        // Later prices are ignored while frozen
        assert_eq!(pricing.invert(dec!(4000)), dec!(1000));
    }

    #[test]
    fn test_freezes_at_upper_limit() {
        let mut pricing = ibtc();
        assert_eq!(pricing.invert(dec!(1500)), dec!(6500));
        assert_eq!(pricing.frozen, Some(FrozenBound::Upper));
    }

    #[test]
    fn test_start_frozen() {
        let pricing = ibtc().frozen_at(Some(FrozenBound::Upper));
        assert_eq!(pricing.frozen_rate(), Some(dec!(6500)));
    }

    #[test]
    fn test_rejects_invalid_bounds() {
        let asset = AssetKey::ibtc();
        assert!(InversePricing::new(&asset, dec!(4000), dec!(3000), dec!(1000)).is_err());
        assert!(InversePricing::new(&asset, dec!(4000), dec!(6500), dec!(5000)).is_err());
        assert!(InversePricing::new(&asset, dec!(4000), dec!(8000), dec!(1000)).is_err());
        assert!(InversePricing::new(&asset, dec!(0), dec!(6500), dec!(1000)).is_err());
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_inverted_rate_stays_within_limits(prices in proptest::collection::vec(1u64..20_000, 1..20)) {
                let mut pricing = ibtc();
                for price in prices {
                    let rate = pricing.invert(Decimal::from(price));
                    prop_assert!(rate >= pricing.lower_limit);
                    prop_assert!(rate <= pricing.upper_limit);
                }
            }
        }
    }
}

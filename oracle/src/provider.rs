//! The price oracle trait consumed by the exchange engine.

use rust_decimal::Decimal;
use synthex_common::{round_unit, AssetKey, Timestamp};

use crate::error::{OracleError, OracleResult};

/// Source of asset prices quoted in the base asset.
///
/// Implementations only supply raw rates; conversions are derived from them.
pub trait PriceOracle: Send + Sync {
    /// The asset every rate is quoted in. Its rate is always 1.
    fn base_asset(&self) -> &AssetKey;

    /// Latest rate of `asset`.
    fn rate(&self, asset: &AssetKey) -> OracleResult<Decimal>;

    /// Rate of `asset` in force at `at`: the latest update at or before that instant.
    fn rate_at(&self, asset: &AssetKey, at: Timestamp) -> OracleResult<Decimal>;

    /// Whether the latest rate of `asset` is too old (or missing) to trade on.
    fn is_stale(&self, asset: &AssetKey) -> bool;

    /// First of the given assets that is stale, if any.
    fn first_stale<'a>(&self, assets: &[&'a AssetKey]) -> Option<&'a AssetKey> {
        assets.iter().copied().find(|asset| self.is_stale(asset))
    }

    /// Current units of `dest` per unit of `src`.
    fn exchange_rate(&self, src: &AssetKey, dest: &AssetKey) -> OracleResult<Decimal> {
        ratio(src, self.rate(src)?, dest, self.rate(dest)?)
    }

    /// Units of `dest` per unit of `src` in force at `at`.
    fn exchange_rate_at(
        &self,
        src: &AssetKey,
        dest: &AssetKey,
        at: Timestamp,
    ) -> OracleResult<Decimal> {
        ratio(src, self.rate_at(src, at)?, dest, self.rate_at(dest, at)?)
    }

    /// Value of `amount` of `src` expressed in `dest`, at current rates.
    fn effective_value(
        &self,
        src: &AssetKey,
        amount: Decimal,
        dest: &AssetKey,
    ) -> OracleResult<Decimal> {
        if src == dest {
            return Ok(amount);
        }
        let value = amount * self.rate(src)?;
        let dest_rate = self.rate(dest)?;
        value
            .checked_div(dest_rate)
            .map(round_unit)
            .ok_or_else(|| OracleError::InvalidRate {
                asset: dest.clone(),
                rate: dest_rate,
            })
    }
}

fn ratio(
    src: &AssetKey,
    src_rate: Decimal,
    dest: &AssetKey,
    dest_rate: Decimal,
) -> OracleResult<Decimal> {
    if src == dest {
        return Ok(Decimal::ONE);
    }
    src_rate
        .checked_div(dest_rate)
        .ok_or_else(|| OracleError::InvalidRate {
            asset: dest.clone(),
            rate: dest_rate,
        })
}

/// Mock oracle with fixed, never-stale rates, for testing.
#[cfg(any(test, feature = "test-utils"))]
pub struct MockPriceOracle {
    base: AssetKey,
    rates: dashmap::DashMap<AssetKey, Decimal>,
    stale: dashmap::DashSet<AssetKey>,
}

#[cfg(any(test, feature = "test-utils"))]
impl MockPriceOracle {
    /// Create a new mock oracle quoting in `base`.
    pub fn new(base: AssetKey) -> Self {
        Self {
            base,
            rates: dashmap::DashMap::new(),
            stale: dashmap::DashSet::new(),
        }
    }

    /// Set a rate.
    pub fn set_rate(&self, asset: AssetKey, rate: Decimal) {
        self.rates.insert(asset, rate);
    }

    /// Mark an asset stale.
    pub fn set_stale(&self, asset: AssetKey) {
        self.stale.insert(asset);
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl PriceOracle for MockPriceOracle {
    fn base_asset(&self) -> &AssetKey {
        &self.base
    }

    fn rate(&self, asset: &AssetKey) -> OracleResult<Decimal> {
        if asset == &self.base {
            return Ok(Decimal::ONE);
        }
        self.rates
            .get(asset)
            .map(|r| *r)
            .ok_or_else(|| OracleError::RateNotAvailable(asset.clone()))
    }

    fn rate_at(&self, asset: &AssetKey, _at: Timestamp) -> OracleResult<Decimal> {
        self.rate(asset)
    }

    fn is_stale(&self, asset: &AssetKey) -> bool {
        asset != &self.base && (self.stale.contains(asset) || !self.rates.contains_key(asset))
    }
}

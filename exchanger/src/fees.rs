//! Exchange fee rates.

use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use synthex_common::{AssetKey, FeeRate};
use synthex_oracle::PriceOracle;
use tracing::info;

use crate::error::ExchangeResult;

/// Amounts produced by an exchange, in destination units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeAmounts {
    /// What the recipient is credited.
    pub amount_received: Decimal,
    /// What is kept as fee.
    pub fee: Decimal,
    /// Fee rate applied.
    pub exchange_fee_rate: FeeRate,
}

/// Per-asset fee rates. An exchange pays the rate of its destination asset.
#[derive(Default)]
pub struct FeeRateTable {
    rates: DashMap<AssetKey, FeeRate>,
}

impl FeeRateTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the fee rates of several assets at once.
    pub fn set_exchange_fee_rates(&self, rates: &[(AssetKey, FeeRate)]) {
        for (asset, rate) in rates {
            info!(asset = %asset, rate = %rate, "Exchange fee rate updated");
            self.rates.insert(asset.clone(), *rate);
        }
    }

    /// Configured rate of `asset`, or `default` when unset.
    pub fn fee_rate_for(&self, asset: &AssetKey, default: FeeRate) -> FeeRate {
        self.rates.get(asset).map(|r| *r).unwrap_or(default)
    }

    /// Fee rate charged for exchanging `src` into `dest`.
    pub fn fee_rate_for_exchange(&self, src: &AssetKey, dest: &AssetKey, default: FeeRate) -> FeeRate {
        let rate = self.fee_rate_for(dest, default);
        let multiplier = swing_trade_multiplier(src, dest);
        if multiplier == Decimal::ONE {
            return rate;
        }
        FeeRate::new(rate.value() * multiplier).unwrap_or(rate)
    }

    /// Value `amount` of `src` in `dest` and split it into received amount and fee.
    pub fn get_amounts_for_exchange(
        &self,
        oracle: &dyn PriceOracle,
        amount: Decimal,
        src: &AssetKey,
        dest: &AssetKey,
        default: FeeRate,
    ) -> ExchangeResult<ExchangeAmounts> {
        let dest_value = oracle.effective_value(src, amount, dest)?;
        let exchange_fee_rate = self.fee_rate_for_exchange(src, dest, default);
        let fee = exchange_fee_rate.fee_on(dest_value);

        Ok(ExchangeAmounts {
            amount_received: dest_value - fee,
            fee,
            exchange_fee_rate,
        })
    }
}

/// Fee multiplier for trading between an asset and its inverse counterpart.
///
/// Always 1: crossing between long and inverse assets is charged like any other trade.
pub fn swing_trade_multiplier(_src: &AssetKey, _dest: &AssetKey) -> Decimal {
    Decimal::ONE
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;
    use synthex_oracle::provider::MockPriceOracle;

    fn table() -> FeeRateTable {
        let table = FeeRateTable::new();
        table.set_exchange_fee_rates(&[
            (AssetKey::seur(), FeeRate::new(dec!(0.01)).unwrap()),
            (AssetKey::ibtc(), FeeRate::new(dec!(0.005)).unwrap()),
        ]);
        table
    }

    #[test]
    fn test_fee_rate_is_destination_rate() {
        let table = table();
        let default = FeeRate::from_basis_points(30);

        assert_eq!(
            table.fee_rate_for_exchange(&AssetKey::susd(), &AssetKey::seur(), default).value(),
            dec!(0.01)
        );
        assert_eq!(
            table.fee_rate_for_exchange(&AssetKey::sbtc(), &AssetKey::ibtc(), default).value(),
            dec!(0.005)
        );
        assert_eq!(
            table.fee_rate_for_exchange(&AssetKey::ibtc(), &AssetKey::sbtc(), default),
            default
        );
    }

    #[test]
    fn test_get_amounts_for_exchange() {
        let oracle = MockPriceOracle::new(AssetKey::susd());
        oracle.set_rate(AssetKey::seur(), dec!(2));

        let amounts = table()
            .get_amounts_for_exchange(
                &oracle,
                dec!(100),
                &AssetKey::susd(),
                &AssetKey::seur(),
                FeeRate::ZERO,
            )
            .unwrap();

        assert_eq!(amounts.fee, dec!(0.5));
        assert_eq!(amounts.amount_received, dec!(49.5));
        assert_eq!(amounts.exchange_fee_rate.value(), dec!(0.01));
    }

    #[test]
    fn test_missing_rate_propagates() {
        let oracle = MockPriceOracle::new(AssetKey::susd());
        let result = table().get_amounts_for_exchange(
            &oracle,
            dec!(1),
            &AssetKey::susd(),
            &AssetKey::seur(),
            FeeRate::ZERO,
        );
        assert!(result.is_err());
    }

    fn asset() -> impl Strategy<Value = AssetKey> {
        prop::sample::select(vec!["sUSD", "sEUR", "sBTC", "iBTC", "sAUD", "iETH"])
            .prop_map(|key| AssetKey::new(key))
    }

    proptest! {
        #[test]
        fn prop_fee_rate_ignores_source(src in asset(), dest in asset(), bps in 0u16..=10_000) {
            let table = FeeRateTable::new();
            let rate = FeeRate::from_basis_points(bps);
            table.set_exchange_fee_rates(&[(dest.clone(), rate)]);

            prop_assert_eq!(
                table.fee_rate_for_exchange(&src, &dest, FeeRate::from_basis_points(30)),
                rate
            );
        }
    }
}

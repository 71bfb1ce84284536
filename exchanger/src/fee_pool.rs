//! Fee distribution.

use dashmap::DashMap;
use rust_decimal::Decimal;
use synthex_common::AssetKey;
use tracing::debug;

/// Receives exchange fees. Recording cannot fail.
pub trait FeeDistribution: Send + Sync {
    fn record_fee(&self, asset: &AssetKey, amount: Decimal);
}

/// In-memory fee pool accumulating fees for the current period.
#[derive(Default)]
pub struct FeePool {
    fees: DashMap<AssetKey, Decimal>,
}

impl FeePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fees recorded in `asset` and not yet distributed.
    pub fn fees_to_distribute(&self, asset: &AssetKey) -> Decimal {
        self.fees.get(asset).map(|f| *f).unwrap_or_default()
    }

    /// Close the period, returning what was accumulated per asset.
    pub fn close_period(&self) -> Vec<(AssetKey, Decimal)> {
        let mut closed: Vec<(AssetKey, Decimal)> = self
            .fees
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();
        self.fees.clear();
        closed.sort_by(|a, b| a.0.cmp(&b.0));
        closed
    }
}

impl FeeDistribution for FeePool {
    fn record_fee(&self, asset: &AssetKey, amount: Decimal) {
        let mut total = self.fees.entry(asset.clone()).or_default();
        *total += amount;
        debug!(asset = %asset, amount = %amount, total = %*total, "Fee recorded");
    }
}

//! In-memory exchange rates with per-asset history.

use std::sync::Arc;

use chrono::Duration;
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use synthex_common::time::constants;
use synthex_common::{AssetKey, Clock, Timestamp};
use tracing::{debug, info, instrument, warn};

use crate::error::{OracleError, OracleResult};
use crate::inverse::{FrozenBound, InversePricing};
use crate::provider::PriceOracle;

/// A rate and the instant it took effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatePoint {
    pub rate: Decimal,
    pub updated_at: Timestamp,
}

/// Configuration for the exchange rates oracle.
#[derive(Debug, Clone)]
pub struct ExchangeRatesConfig {
    /// Age after which a rate is stale.
    pub rate_stale_period: Duration,
    /// How far ahead of the clock an update may be timestamped.
    pub future_tolerance: Duration,
}

impl Default for ExchangeRatesConfig {
    fn default() -> Self {
        Self {
            rate_stale_period: constants::default_rate_stale_period(),
            future_tolerance: constants::future_rate_tolerance(),
        }
    }
}

/// Thread-safe oracle keeping every accepted rate update.
pub struct ExchangeRates {
    base: AssetKey,
    history: DashMap<AssetKey, Vec<RatePoint>>,
    inverse: DashMap<AssetKey, InversePricing>,
    config: ExchangeRatesConfig,
    clock: Arc<dyn Clock>,
}

impl ExchangeRates {
    /// Create a new oracle with default configuration.
    pub fn new(base: AssetKey, clock: Arc<dyn Clock>) -> Self {
        Self::with_config(base, ExchangeRatesConfig::default(), clock)
    }

    /// Create a new oracle with custom configuration.
    pub fn with_config(base: AssetKey, config: ExchangeRatesConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            base,
            history: DashMap::new(),
            inverse: DashMap::new(),
            config,
            clock,
        }
    }

    /// Record a batch of raw prices observed at `timestamp`.
    ///
    /// The batch is validated as a whole before anything is recorded. Updates
    /// older than an asset's latest rate are skipped. Returns how many were applied.
    #[instrument(skip(self, updates, timestamp), fields(count = updates.len(), timestamp = %timestamp))]
    pub fn update_rates(
        &self,
        updates: &[(AssetKey, Decimal)],
        timestamp: Timestamp,
    ) -> OracleResult<usize> {
        if timestamp > self.clock.now() + self.config.future_tolerance {
            warn!("Rejected rate update from the future");
            return Err(OracleError::FutureTimestamp { timestamp });
        }
        for (asset, rate) in updates {
            if asset == &self.base {
                return Err(OracleError::BaseAssetUpdate(asset.clone()));
            }
            if *rate <= Decimal::ZERO {
                return Err(OracleError::InvalidRate {
                    asset: asset.clone(),
                    rate: *rate,
                });
            }
        }

        let mut applied = 0;
        for (asset, raw) in updates {
            if let Some(latest) = self.latest(asset) {
                if timestamp < latest.updated_at {
                    debug!(asset = %asset, "Skipping out-of-date rate");
                    continue;
                }
            }

            let rate = match self.inverse.get_mut(asset) {
                Some(mut pricing) => {
                    let was_frozen = pricing.is_frozen();
                    let rate = pricing.invert(*raw);
                    if !was_frozen && pricing.is_frozen() {
                        info!(asset = %asset, rate = %rate, "Inverse rate frozen");
                    }
                    rate
                }
                None => *raw,
            };

            self.record(asset, rate, timestamp);
            applied += 1;
        }

        debug!(applied, "Rates updated");
        Ok(applied)
    }

    /// Insert a point keeping the history ordered by `updated_at`.
    fn record(&self, asset: &AssetKey, rate: Decimal, updated_at: Timestamp) {
        let mut points = self.history.entry(asset.clone()).or_default();
        let at = points.partition_point(|p| p.updated_at <= updated_at);
        match at.checked_sub(1).and_then(|i| points.get_mut(i)) {
            Some(previous) if previous.updated_at == updated_at => previous.rate = rate,
            _ => points.insert(at, RatePoint { rate, updated_at }),
        }
    }

    /// Configure inverse pricing for `asset`, optionally starting frozen.
    ///
    /// Replaces (and so unfreezes) any previous pricing of the asset.
    pub fn set_inverse_pricing(
        &self,
        asset: AssetKey,
        entry_point: Decimal,
        upper_limit: Decimal,
        lower_limit: Decimal,
        freeze_at_upper: bool,
        freeze_at_lower: bool,
    ) -> OracleResult<()> {
        let frozen = if freeze_at_upper {
            Some(FrozenBound::Upper)
        } else if freeze_at_lower {
            Some(FrozenBound::Lower)
        } else {
            None
        };
        let pricing =
            InversePricing::new(&asset, entry_point, upper_limit, lower_limit)?.frozen_at(frozen);

        if let Some(rate) = pricing.frozen_rate() {
            self.record(&asset, rate, self.clock.now());
        }

        info!(asset = %asset, entry_point = %entry_point, ?frozen, "Inverse pricing set");
        self.inverse.insert(asset, pricing);
        Ok(())
    }

    /// Remove inverse pricing; later updates for the asset are recorded as-is.
    pub fn remove_inverse_pricing(&self, asset: &AssetKey) -> Option<InversePricing> {
        self.inverse.remove(asset).map(|(_, pricing)| pricing)
    }

    /// Get the inverse pricing of an asset.
    pub fn inverse_pricing(&self, asset: &AssetKey) -> Option<InversePricing> {
        self.inverse.get(asset).map(|p| p.clone())
    }

    /// Latest recorded rate point, possibly stamped ahead of the clock.
    pub fn latest(&self, asset: &AssetKey) -> Option<RatePoint> {
        self.history.get(asset).and_then(|points| points.last().copied())
    }

    /// Point in force at `at`: the latest one stamped at or before it.
    pub fn point_at(&self, asset: &AssetKey, at: Timestamp) -> Option<RatePoint> {
        self.history.get(asset).and_then(|points| {
            let end = points.partition_point(|p| p.updated_at <= at);
            end.checked_sub(1).map(|i| points[i])
        })
    }

    /// When the asset's rate was last updated.
    pub fn last_updated(&self, asset: &AssetKey) -> Option<Timestamp> {
        self.latest(asset).map(|p| p.updated_at)
    }

    /// All recorded points for an asset, oldest first.
    pub fn rate_history(&self, asset: &AssetKey) -> Vec<RatePoint> {
        self.history
            .get(asset)
            .map(|points| points.clone())
            .unwrap_or_default()
    }

    pub fn config(&self) -> &ExchangeRatesConfig {
        &self.config
    }
}

impl PriceOracle for ExchangeRates {
    fn base_asset(&self) -> &AssetKey {
        &self.base
    }

    fn rate(&self, asset: &AssetKey) -> OracleResult<Decimal> {
        if asset == &self.base {
            return Ok(Decimal::ONE);
        }
        // Future-stamped points only take effect once the clock reaches them
        self.rate_at(asset, self.clock.now())
    }

    fn rate_at(&self, asset: &AssetKey, at: Timestamp) -> OracleResult<Decimal> {
        if asset == &self.base {
            return Ok(Decimal::ONE);
        }
        self.point_at(asset, at)
            .map(|p| p.rate)
            .ok_or_else(|| OracleError::RateNotAvailable(asset.clone()))
    }

    fn is_stale(&self, asset: &AssetKey) -> bool {
        if asset == &self.base {
            return false;
        }
        let now = self.clock.now();
        match self.point_at(asset, now) {
            Some(point) => point.updated_at + self.config.rate_stale_period < now,
            None => true,
        }
    }
}

//! Exchanger configuration.

use parking_lot::RwLock;
use rust_decimal::Decimal;
use synthex_common::time::constants;
use synthex_common::{AssetKey, FeeRate};

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangerConfig {
    /// Seconds an acquired asset must be held before it can be settled or exchanged out.
    pub waiting_period_secs: u64,
    /// Maximum entries per settlement queue; `None` is unbounded.
    pub max_entries_in_queue: Option<usize>,
    /// Fee rate for assets without a configured one.
    pub default_fee_rate: FeeRate,
    /// Asset all rates are quoted in; fees are recorded in it.
    pub base_asset: AssetKey,
}

impl Default for ExchangerConfig {
    fn default() -> Self {
        Self {
            waiting_period_secs: constants::default_waiting_period().num_seconds().unsigned_abs(),
            max_entries_in_queue: None,
            default_fee_rate: FeeRate::from_basis_points(30),
            base_asset: AssetKey::susd(),
        }
    }
}

impl ExchangerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(secs) = std::env::var("SYNTHEX_WAITING_PERIOD_SECS") {
            if let Ok(secs) = secs.parse() {
                config.waiting_period_secs = secs;
            }
        }

        if let Ok(max) = std::env::var("SYNTHEX_MAX_QUEUE_ENTRIES") {
            // 0 means unbounded
            if let Ok(max) = max.parse::<usize>() {
                config.max_entries_in_queue = (max > 0).then_some(max);
            }
        }

        if let Ok(rate) = std::env::var("SYNTHEX_DEFAULT_FEE_RATE") {
            if let Some(rate) = rate
                .parse::<Decimal>()
                .ok()
                .and_then(|r| FeeRate::new(r).ok())
            {
                config.default_fee_rate = rate;
            }
        }

        if let Ok(base) = std::env::var("SYNTHEX_BASE_ASSET") {
            if let Ok(base) = AssetKey::parse(base) {
                config.base_asset = base;
            }
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_entries_in_queue == Some(0) {
            return Err("Max entries in queue must be at least 1".to_string());
        }

        if AssetKey::parse(self.base_asset.as_str()).is_err() {
            return Err(format!("Invalid base asset: {}", self.base_asset));
        }

        Ok(())
    }
}

/// Live configuration, read as one snapshot per operation.
pub struct ConfigStore {
    inner: RwLock<ExchangerConfig>,
}

impl ConfigStore {
    pub fn new(config: ExchangerConfig) -> Self {
        Self {
            inner: RwLock::new(config),
        }
    }

    /// Copy of the current configuration.
    pub fn snapshot(&self) -> ExchangerConfig {
        self.inner.read().clone()
    }

    pub fn set_waiting_period_secs(&self, secs: u64) {
        self.inner.write().waiting_period_secs = secs;
    }

    pub fn set_max_entries_in_queue(&self, max: Option<usize>) -> Result<(), String> {
        if max == Some(0) {
            return Err("Max entries in queue must be at least 1".to_string());
        }
        self.inner.write().max_entries_in_queue = max;
        Ok(())
    }

    pub fn set_default_fee_rate(&self, rate: FeeRate) {
        self.inner.write().default_fee_rate = rate;
    }
}

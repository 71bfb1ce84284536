//! Synthex Price Oracle
//!
//! Price source consumed by the exchange engine.
//!
//! # Features
//!
//! - `PriceOracle` trait: current rate, historical rate, staleness, effective value
//! - `ExchangeRates`: in-memory oracle with per-asset rate history
//! - Inverse pricing with entry point, bounds and freezing
//!
//! Every rate is the price of one unit of an asset in units of the base asset.
//!
//! # Example
//!
//! ```rust,ignore
//! use synthex_oracle::{ExchangeRates, PriceOracle};
//!
//! let rates = ExchangeRates::new(AssetKey::susd(), clock);
//! rates.update_rates(&[(AssetKey::seur(), dec!(2))], clock.now())?;
//!
//! // 100 sUSD buys 50 sEUR
//! let value = rates.effective_value(&AssetKey::susd(), dec!(100), &AssetKey::seur())?;
//! ```

pub mod error;
pub mod inverse;
pub mod provider;
pub mod rates;

pub use error::{OracleError, OracleResult};
pub use inverse::{FrozenBound, InversePricing};
pub use provider::PriceOracle;
pub use rates::{ExchangeRates, ExchangeRatesConfig, RatePoint};

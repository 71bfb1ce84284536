//! Suspension gating.
//!
//! The system as a whole, the exchange subsystem and individual assets can each
//! be suspended. A suspended scope fails every operation that touches it with
//! [`ExchangeError::Suspended`].

use std::fmt;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use synthex_common::AssetKey;
use tracing::{info, warn};

use crate::error::{ExchangeError, ExchangeResult};

/// What a suspension applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SuspensionScope {
    System,
    Exchange,
    Asset(AssetKey),
}

impl fmt::Display for SuspensionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SuspensionScope::System => write!(f, "system"),
            SuspensionScope::Exchange => write!(f, "exchange"),
            SuspensionScope::Asset(asset) => write!(f, "asset {}", asset),
        }
    }
}

/// An active suspension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suspension {
    pub reason: String,
    pub since: DateTime<Utc>,
}

/// Suspension registry consulted by the engine.
pub trait SuspensionGate: Send + Sync {
    fn check_system_active(&self) -> ExchangeResult<()>;

    fn check_exchange_active(&self) -> ExchangeResult<()>;

    fn check_asset_active(&self, asset: &AssetKey) -> ExchangeResult<()>;
}

/// In-memory suspension registry.
#[derive(Default)]
pub struct SystemStatus {
    suspensions: DashMap<SuspensionScope, Suspension>,
}

impl SystemStatus {
    /// Create a registry with nothing suspended.
    pub fn new() -> Self {
        Self::default()
    }

    /// Suspend a scope. Replaces the reason of an existing suspension.
    pub fn suspend(&self, scope: SuspensionScope, reason: impl Into<String>) {
        let reason = reason.into();
        warn!(scope = %scope, reason = %reason, "Suspended");
        self.suspensions.insert(
            scope,
            Suspension {
                reason,
                since: Utc::now(),
            },
        );
    }

    /// Lift a suspension. Returns the suspension that was active, if any.
    pub fn resume(&self, scope: &SuspensionScope) -> Option<Suspension> {
        let removed = self.suspensions.remove(scope).map(|(_, s)| s);
        if removed.is_some() {
            info!(scope = %scope, "Resumed");
        }
        removed
    }

    pub fn suspension(&self, scope: &SuspensionScope) -> Option<Suspension> {
        self.suspensions.get(scope).map(|s| s.clone())
    }

    pub fn is_suspended(&self, scope: &SuspensionScope) -> bool {
        self.suspensions.contains_key(scope)
    }

    fn require_active(&self, scope: SuspensionScope) -> ExchangeResult<()> {
        if self.is_suspended(&scope) {
            return Err(ExchangeError::Suspended(scope));
        }
        Ok(())
    }
}

impl SuspensionGate for SystemStatus {
    fn check_system_active(&self) -> ExchangeResult<()> {
        self.require_active(SuspensionScope::System)
    }

    fn check_exchange_active(&self) -> ExchangeResult<()> {
        self.require_active(SuspensionScope::Exchange)
    }

    fn check_asset_active(&self, asset: &AssetKey) -> ExchangeResult<()> {
        self.require_active(SuspensionScope::Asset(asset.clone()))
    }
}

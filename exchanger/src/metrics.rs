//! Counters for exchange engine monitoring.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::ExchangeError;

/// Exchange engine metrics.
pub struct ExchangerMetrics {
    /// Committed exchanges.
    pub exchanges_total: AtomicU64,
    /// Rejected exchanges.
    pub exchanges_failed: AtomicU64,
    /// Queues settled (explicitly or before an exchange out).
    pub settlements_total: AtomicU64,
    /// Settlements that reclaimed.
    pub reclaims_total: AtomicU64,
    /// Settlements that rebated.
    pub rebates_total: AtomicU64,
    /// Appends refused by the queue limit.
    pub queue_overflows: AtomicU64,
    /// Operations refused during the waiting period.
    pub waiting_period_rejections: AtomicU64,
    /// Operations refused by a suspension.
    pub suspended_rejections: AtomicU64,
    /// Operations refused for a stale rate.
    pub stale_rate_rejections: AtomicU64,
}

impl ExchangerMetrics {
    /// Create new metrics instance.
    pub fn new() -> Self {
        Self {
            exchanges_total: AtomicU64::new(0),
            exchanges_failed: AtomicU64::new(0),
            settlements_total: AtomicU64::new(0),
            reclaims_total: AtomicU64::new(0),
            rebates_total: AtomicU64::new(0),
            queue_overflows: AtomicU64::new(0),
            waiting_period_rejections: AtomicU64::new(0),
            suspended_rejections: AtomicU64::new(0),
            stale_rate_rejections: AtomicU64::new(0),
        }
    }

    pub fn exchange_completed(&self) {
        self.exchanges_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn exchange_failed(&self, error: &ExchangeError) {
        self.exchanges_failed.fetch_add(1, Ordering::Relaxed);
        self.rejected(error);
    }

    /// Record a settlement and which way it went.
    pub fn settled(&self, reclaimed: bool, rebated: bool) {
        self.settlements_total.fetch_add(1, Ordering::Relaxed);
        if reclaimed {
            self.reclaims_total.fetch_add(1, Ordering::Relaxed);
        }
        if rebated {
            self.rebates_total.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Count a rejection under its cause.
    pub fn rejected(&self, error: &ExchangeError) {
        let counter = match error {
            ExchangeError::QueueOverflow { .. } => &self.queue_overflows,
            ExchangeError::WaitingPeriod { .. } => &self.waiting_period_rejections,
            ExchangeError::Suspended(_) => &self.suspended_rejections,
            ExchangeError::StaleRate(_) => &self.stale_rate_rejections,
            _ => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            exchanges_total: self.exchanges_total.load(Ordering::Relaxed),
            exchanges_failed: self.exchanges_failed.load(Ordering::Relaxed),
            settlements_total: self.settlements_total.load(Ordering::Relaxed),
            reclaims_total: self.reclaims_total.load(Ordering::Relaxed),
            rebates_total: self.rebates_total.load(Ordering::Relaxed),
            queue_overflows: self.queue_overflows.load(Ordering::Relaxed),
            waiting_period_rejections: self.waiting_period_rejections.load(Ordering::Relaxed),
            suspended_rejections: self.suspended_rejections.load(Ordering::Relaxed),
            stale_rate_rejections: self.stale_rate_rejections.load(Ordering::Relaxed),
        }
    }
}

impl Default for ExchangerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub exchanges_total: u64,
    pub exchanges_failed: u64,
    pub settlements_total: u64,
    pub reclaims_total: u64,
    pub rebates_total: u64,
    pub queue_overflows: u64,
    pub waiting_period_rejections: u64,
    pub suspended_rejections: u64,
    pub stale_rate_rejections: u64,
}

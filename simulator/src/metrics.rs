//! Simulation metrics.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;
use synthex_exchanger::{ExchangeError, ExchangeReceipt, SettlementOutcome};

/// Simulation metrics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SimulationMetrics {
    /// Exchanges attempted.
    pub exchanges_attempted: u64,
    /// Exchanges committed.
    pub exchanges_succeeded: u64,
    /// Rejections by error code.
    pub rejections: BTreeMap<String, u64>,
    /// Queues settled, explicitly or ahead of an exchange.
    pub settlements: u64,
    /// Total reclaimed, summed across assets.
    pub reclaimed: Decimal,
    /// Total rebated, summed across assets.
    pub rebated: Decimal,
    /// Events seen by the event logger.
    pub events_logged: u64,
}

impl SimulationMetrics {
    /// Create new metrics.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_exchange(&mut self, result: &Result<ExchangeReceipt, ExchangeError>) {
        self.exchanges_attempted += 1;
        match result {
            Ok(_) => self.exchanges_succeeded += 1,
            Err(e) => *self.rejections.entry(e.error_code().to_string()).or_default() += 1,
        }
    }

    pub fn record_settlement(&mut self, outcome: &SettlementOutcome) {
        if outcome.num_entries == 0 {
            return;
        }
        self.settlements += 1;
        self.reclaimed += outcome.reclaimed;
        self.rebated += outcome.rebated;
    }

    pub fn record_events(&mut self, count: u64) {
        self.events_logged += count;
    }

    /// Get success rate.
    pub fn success_rate(&self) -> f64 {
        if self.exchanges_attempted == 0 {
            return 0.0;
        }

        self.exchanges_succeeded as f64 / self.exchanges_attempted as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use synthex_common::{AccountId, AssetKey, EntryId, FeeRate};

    fn receipt() -> ExchangeReceipt {
        ExchangeReceipt {
            entry_id: EntryId::new(),
            amount_debited: dec!(100),
            amount_received: dec!(49.5),
            fee: dec!(0.5),
            exchange_fee_rate: FeeRate::from_basis_points(100),
            settlement: None,
        }
    }

    #[test]
    fn test_metrics() {
        let mut metrics = SimulationMetrics::new();

        metrics.record_exchange(&Ok(receipt()));
        metrics.record_exchange(&Ok(receipt()));
        metrics.record_exchange(&Ok(receipt()));
        metrics.record_exchange(&Err(ExchangeError::WaitingPeriod {
            account: AccountId::new("alice"),
            asset: AssetKey::seur(),
            secs_left: 10,
        }));

        assert_eq!(metrics.exchanges_attempted, 4);
        assert_eq!(metrics.exchanges_succeeded, 3);
        assert_eq!(metrics.rejections.get("WAITING_PERIOD"), Some(&1));
        assert_eq!(metrics.success_rate(), 0.75);
    }

    #[test]
    fn test_empty_settlements_are_not_counted() {
        let mut metrics = SimulationMetrics::new();
        metrics.record_settlement(&SettlementOutcome::default());
        metrics.record_settlement(&SettlementOutcome {
            reclaimed: dec!(1.5),
            rebated: Decimal::ZERO,
            num_entries: 2,
        });

        assert_eq!(metrics.settlements, 1);
        assert_eq!(metrics.reclaimed, dec!(1.5));
    }
}

//! Simulation controller.

use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::{anyhow, bail};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use synthex_common::{AccountId, AssetKey, FeeRate};
use synthex_exchanger::{ExchangeError, ExchangeEvent, ExchangerConfig, Sandbox};
use synthex_ledger::LedgerAdapter;
use synthex_oracle::PriceOracle;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::metrics::SimulationMetrics;
use crate::scenario::{Scenario, ScenarioStep};

/// Drives a sandbox through scenario steps.
pub struct SimulationController {
    /// Deployment under test.
    sandbox: Arc<Sandbox>,
    /// Random number generator.
    rng: StdRng,
    /// Simulation metrics.
    metrics: SimulationMetrics,
    /// Holders seen so far; random trades pick from these.
    accounts: BTreeSet<AccountId>,
    /// Assets with a published rate, plus the base asset.
    assets: BTreeSet<AssetKey>,
}

impl SimulationController {
    /// Create a new simulation controller.
    pub fn new(config: ExchangerConfig, seed: Option<u64>) -> anyhow::Result<Self> {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        let base = config.base_asset.clone();
        let sandbox = Sandbox::new(config)?;

        Ok(Self {
            sandbox: Arc::new(sandbox),
            rng,
            metrics: SimulationMetrics::new(),
            accounts: BTreeSet::new(),
            assets: BTreeSet::from([base]),
        })
    }

    pub fn sandbox(&self) -> &Arc<Sandbox> {
        &self.sandbox
    }

    /// Run a scenario to completion, logging every engine event as it happens.
    pub async fn run_scenario(&mut self, scenario: &Scenario) -> anyhow::Result<()> {
        info!("Running scenario: {} - {}", scenario.name, scenario.description);

        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let logger = spawn_event_logger(self.sandbox.exchanger.subscribe(), shutdown_rx);

        let mut outcome = Ok(());
        for (index, step) in scenario.steps.iter().enumerate() {
            if let Err(e) = self.execute_step(step) {
                outcome = Err(e.context(format!("step {} of {}", index + 1, scenario.name)));
                break;
            }
            // Let the logger keep up with the engine
            tokio::task::yield_now().await;
        }

        let _ = shutdown_tx.send(()).await;
        let logged = logger.await?;
        self.metrics.record_events(logged);
        outcome
    }

    /// Execute a single scenario step.
    fn execute_step(&mut self, step: &ScenarioStep) -> anyhow::Result<()> {
        let sandbox = Arc::clone(&self.sandbox);
        match step {
            ScenarioStep::UpdateRates { rates } => {
                let quotes: Vec<_> = rates.iter().map(|q| (q.asset.clone(), q.rate)).collect();
                sandbox.update_rates(&quotes)?;
                self.assets.extend(quotes.into_iter().map(|(asset, _)| asset));
            }
            ScenarioStep::SetInversePricing {
                asset,
                entry_point,
                upper_limit,
                lower_limit,
            } => {
                sandbox.rates.set_inverse_pricing(
                    asset.clone(),
                    *entry_point,
                    *upper_limit,
                    *lower_limit,
                    false,
                    false,
                )?;
            }
            ScenarioStep::SetFeeRate { asset, rate } => {
                sandbox.set_fee_rates(&[(asset.clone(), FeeRate::new(*rate)?)])?;
            }
            ScenarioStep::SetWaitingPeriod { secs } => {
                sandbox
                    .exchanger
                    .set_waiting_period_secs(&sandbox.owner, *secs)?;
            }
            ScenarioStep::SetMaxEntries { max } => {
                sandbox
                    .exchanger
                    .set_max_entries_in_queue(&sandbox.owner, *max)?;
            }
            ScenarioStep::Issue {
                account,
                asset,
                amount,
            } => {
                sandbox.issue(account, asset, *amount)?;
                self.accounts.insert(account.clone());
                self.assets.insert(asset.clone());
            }
            ScenarioStep::Exchange {
                account,
                src,
                amount,
                dest,
                expect_error,
            } => {
                let result = sandbox.gateway.exchange(account, src, *amount, dest);
                self.metrics.record_exchange(&result);
                if let Ok(receipt) = &result {
                    info!(
                        account = %account,
                        "{} {} -> {} {} (fee {})",
                        receipt.amount_debited, src, receipt.amount_received, dest, receipt.fee
                    );
                    if let Some(settlement) = &receipt.settlement {
                        self.metrics.record_settlement(settlement);
                    }
                }
                check_expectation(result.map(|_| ()), expect_error.as_deref())?;
                self.accounts.insert(account.clone());
            }
            ScenarioStep::Settle {
                account,
                asset,
                expect_error,
            } => {
                let result = sandbox.gateway.settle(account, asset);
                if let Ok(outcome) = &result {
                    self.metrics.record_settlement(outcome);
                }
                check_expectation(result.map(|_| ()), expect_error.as_deref())?;
            }
            ScenarioStep::Wait { seconds } => {
                sandbox.advance_secs(*seconds);
            }
            ScenarioStep::Suspend { scope, reason } => {
                sandbox.status.suspend(scope.clone(), reason.clone());
            }
            ScenarioStep::Resume { scope } => {
                sandbox.status.resume(scope);
            }
            ScenarioStep::ExpectBalance {
                account,
                asset,
                amount,
            } => {
                let actual = sandbox.ledger.balance_of(account, asset);
                if actual != *amount {
                    bail!("{} holds {} {}, expected {}", account, actual, asset, amount);
                }
            }
            ScenarioStep::RandomTrades { count } => {
                for _ in 0..*count {
                    self.random_trade()?;
                }
            }
        }
        Ok(())
    }

    /// One random step: drift prices, pass time, then exchange or settle.
    fn random_trade(&mut self) -> anyhow::Result<()> {
        let sandbox = Arc::clone(&self.sandbox);
        let accounts: Vec<_> = self.accounts.iter().cloned().collect();
        let assets: Vec<_> = self.assets.iter().cloned().collect();
        if accounts.is_empty() || assets.len() < 2 {
            return Err(anyhow!("random trades need an account and two priced assets"));
        }

        self.drift_prices(&assets)?;
        sandbox.advance_secs(self.rng.gen_range(0..=120));

        let account = &accounts[self.rng.gen_range(0..accounts.len())];
        let held: Vec<_> = assets
            .iter()
            .filter(|asset| sandbox.ledger.balance_of(account, asset) > Decimal::ZERO)
            .collect();
        let Some(src) = held.get(self.rng.gen_range(0..held.len().max(1))).copied() else {
            debug!(account = %account, "Nothing to trade");
            return Ok(());
        };

        if self.rng.gen_bool(0.2) {
            let result = sandbox.gateway.settle(account, src);
            if let Ok(outcome) = &result {
                self.metrics.record_settlement(outcome);
            }
            return tolerate(result.map(|_| ()));
        }

        let dest = loop {
            let candidate = &assets[self.rng.gen_range(0..assets.len())];
            if candidate != src {
                break candidate;
            }
        };
        let balance = sandbox.ledger.balance_of(account, src);
        let share = Decimal::new(self.rng.gen_range(1..=100), 2);
        let amount = (balance * share).round_dp(8);
        if amount <= Decimal::ZERO {
            return Ok(());
        }

        let result = sandbox.gateway.exchange(account, src, amount, dest);
        self.metrics.record_exchange(&result);
        if let Ok(receipt) = &result {
            if let Some(settlement) = &receipt.settlement {
                self.metrics.record_settlement(settlement);
            }
        }
        tolerate(result.map(|_| ()))
    }

    /// Move every non-base rate by up to 5% either way.
    fn drift_prices(&mut self, assets: &[AssetKey]) -> anyhow::Result<()> {
        let base = self.sandbox.exchanger.config().base_asset;
        let mut quotes = Vec::new();
        for asset in assets.iter().filter(|asset| **asset != base) {
            let Ok(current) = self.sandbox.rates.rate(asset) else {
                continue;
            };
            let change = Decimal::new(self.rng.gen_range(-500..=500), 4);
            quotes.push((asset.clone(), (current * (Decimal::ONE + change)).round_dp(8)));
        }
        self.sandbox.update_rates(&quotes)?;
        Ok(())
    }

    /// Get simulation metrics.
    pub fn metrics(&self) -> &SimulationMetrics {
        &self.metrics
    }
}

/// Rejections the engine is expected to produce during random trading.
fn tolerate(result: Result<(), ExchangeError>) -> anyhow::Result<()> {
    match result {
        Err(e)
            if e.is_retryable()
                || matches!(
                    e,
                    ExchangeError::QueueOverflow { .. } | ExchangeError::InsufficientBalance { .. }
                ) =>
        {
            debug!(error = %e, "Random trade rejected");
            Ok(())
        }
        other => Ok(other?),
    }
}

fn check_expectation(result: Result<(), ExchangeError>, expected: Option<&str>) -> anyhow::Result<()> {
    match (result, expected) {
        (Ok(()), None) => Ok(()),
        (Err(e), Some(code)) if e.error_code() == code => {
            info!(code, "Rejected as expected");
            Ok(())
        }
        (Ok(()), Some(code)) => bail!("expected {} but the operation succeeded", code),
        (Err(e), _) => Err(e.into()),
    }
}

/// Log events until told to stop. Returns how many were seen.
fn spawn_event_logger(
    mut events: broadcast::Receiver<ExchangeEvent>,
    mut shutdown: mpsc::Receiver<()>,
) -> JoinHandle<u64> {
    tokio::spawn(async move {
        let mut seen = 0;
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Ok(event) => {
                        seen += 1;
                        info!(event = event.name(), account = %event.account(), "{}", describe(&event));
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "Event logger lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                _ = shutdown.recv() => {
                    // Drain what was published before shutdown
                    while let Ok(event) = events.try_recv() {
                        seen += 1;
                        info!(event = event.name(), account = %event.account(), "{}", describe(&event));
                    }
                    break;
                }
            }
        }
        seen
    })
}

fn describe(event: &ExchangeEvent) -> String {
    serde_json::to_string(event).unwrap_or_else(|_| event.name().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> SimulationController {
        SimulationController::new(ExchangerConfig::default(), Some(7)).unwrap()
    }

    #[tokio::test]
    async fn test_built_in_scenarios_pass() {
        for name in ["reclaim", "rebate", "queue-limit", "inverse"] {
            let mut controller = controller();
            let scenario = Scenario::load(name).unwrap();
            controller.run_scenario(&scenario).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_reclaim_scenario_logs_events() {
        let mut controller = controller();
        controller
            .run_scenario(&Scenario::load("reclaim").unwrap())
            .await
            .unwrap();

        let metrics = controller.metrics();
        assert_eq!(metrics.exchanges_succeeded, 2);
        assert_eq!(metrics.settlements, 1);
        // Two exchanges and the reclaim
        assert_eq!(metrics.events_logged, 3);
        assert_eq!(controller.sandbox().exchanger.metrics().reclaims_total, 1);
    }

    #[tokio::test]
    async fn test_random_trading_is_reproducible() {
        let mut first = controller();
        let mut second = controller();
        let scenario = Scenario::load("random").unwrap();

        first.run_scenario(&scenario).await.unwrap();
        second.run_scenario(&scenario).await.unwrap();

        assert_eq!(
            first.metrics().exchanges_attempted,
            second.metrics().exchanges_attempted
        );
        assert_eq!(
            first.metrics().exchanges_succeeded,
            second.metrics().exchanges_succeeded
        );
        assert!(first.metrics().exchanges_attempted > 0);
    }

    #[tokio::test]
    async fn test_unexpected_balance_fails_the_run() {
        let mut controller = controller();
        let scenario = Scenario {
            name: "bad".to_string(),
            description: String::new(),
            steps: vec![ScenarioStep::ExpectBalance {
                account: AccountId::new("alice"),
                asset: AssetKey::susd(),
                amount: Decimal::ONE,
            }],
        };
        assert!(controller.run_scenario(&scenario).await.is_err());
    }
}

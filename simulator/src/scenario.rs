//! Simulation scenarios.

use std::path::Path;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use synthex_common::{AccountId, AssetKey};
use synthex_exchanger::SuspensionScope;

/// A scripted run against a fresh sandbox.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Description.
    #[serde(default)]
    pub description: String,
    /// Steps in the scenario.
    pub steps: Vec<ScenarioStep>,
}

/// One rate in a price update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateQuote {
    pub asset: AssetKey,
    pub rate: Decimal,
}

/// A step in a scenario.
///
/// Exchanges and settlements may name the error code they are expected to fail
/// with; an unexpected outcome aborts the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ScenarioStep {
    /// Publish prices stamped with the current sandbox time.
    UpdateRates { rates: Vec<RateQuote> },
    /// Price an asset as the mirror of its underlying.
    SetInversePricing {
        asset: AssetKey,
        entry_point: Decimal,
        upper_limit: Decimal,
        lower_limit: Decimal,
    },
    SetFeeRate { asset: AssetKey, rate: Decimal },
    SetWaitingPeriod { secs: u64 },
    SetMaxEntries { max: Option<usize> },
    /// Mint a balance.
    Issue {
        account: AccountId,
        asset: AssetKey,
        amount: Decimal,
    },
    Exchange {
        account: AccountId,
        src: AssetKey,
        amount: Decimal,
        dest: AssetKey,
        #[serde(default)]
        expect_error: Option<String>,
    },
    Settle {
        account: AccountId,
        asset: AssetKey,
        #[serde(default)]
        expect_error: Option<String>,
    },
    /// Advance the sandbox clock.
    Wait { seconds: i64 },
    Suspend { scope: SuspensionScope, reason: String },
    Resume { scope: SuspensionScope },
    /// Abort unless a balance matches exactly.
    ExpectBalance {
        account: AccountId,
        asset: AssetKey,
        amount: Decimal,
    },
    /// Run seeded random trades over the accounts and assets seen so far.
    RandomTrades { count: usize },
}

impl Scenario {
    /// Names of the built-in scenarios.
    pub const BUILT_IN: [&'static str; 5] = ["reclaim", "rebate", "queue-limit", "inverse", "random"];

    /// Load a built-in scenario by name.
    pub fn load(name: &str) -> anyhow::Result<Self> {
        match name {
            "reclaim" => Ok(Self::reclaim()),
            "rebate" => Ok(Self::rebate()),
            "queue-limit" => Ok(Self::queue_limit()),
            "inverse" => Ok(Self::inverse()),
            "random" => Ok(Self::random()),
            _ => Err(anyhow::anyhow!("Unknown scenario: {}", name)),
        }
    }

    /// Load a scenario from a JSON file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Buy sEUR, let the price double inside the waiting period, sell.
    fn reclaim() -> Self {
        let alice = AccountId::new("alice");
        Self {
            name: "reclaim".to_string(),
            description: "Price rises during the waiting period and the gain is reclaimed".to_string(),
            steps: vec![
                setup_step(),
                fee_step(AssetKey::seur()),
                issue(&alice, AssetKey::susd(), dec!(100)),
                exchange(&alice, AssetKey::susd(), dec!(100), AssetKey::seur()),
                ScenarioStep::Wait { seconds: 10 },
                rates(&[(AssetKey::seur(), dec!(4))]),
                ScenarioStep::Wait { seconds: 171 },
                exchange(&alice, AssetKey::seur(), dec!(30), AssetKey::susd()),
                ScenarioStep::ExpectBalance {
                    account: alice.clone(),
                    asset: AssetKey::seur(),
                    amount: Decimal::ZERO,
                },
            ],
        }
    }

    /// Buy sEUR, let the price halve, settle explicitly.
    fn rebate() -> Self {
        let alice = AccountId::new("alice");
        Self {
            name: "rebate".to_string(),
            description: "Price falls during the waiting period and the loss is rebated".to_string(),
            steps: vec![
                setup_step(),
                fee_step(AssetKey::seur()),
                issue(&alice, AssetKey::susd(), dec!(100)),
                exchange(&alice, AssetKey::susd(), dec!(100), AssetKey::seur()),
                ScenarioStep::Wait { seconds: 10 },
                rates(&[(AssetKey::seur(), dec!(1))]),
                ScenarioStep::Settle {
                    account: alice.clone(),
                    asset: AssetKey::seur(),
                    expect_error: Some("WAITING_PERIOD".to_string()),
                },
                ScenarioStep::Wait { seconds: 171 },
                ScenarioStep::Settle {
                    account: alice.clone(),
                    asset: AssetKey::seur(),
                    expect_error: None,
                },
                ScenarioStep::ExpectBalance {
                    account: alice,
                    asset: AssetKey::seur(),
                    amount: dec!(99),
                },
            ],
        }
    }

    /// Fill a queue to its limit, overflow, settle, refill.
    fn queue_limit() -> Self {
        let alice = AccountId::new("alice");
        let mut steps = vec![
            setup_step(),
            ScenarioStep::SetMaxEntries { max: Some(3) },
            issue(&alice, AssetKey::susd(), dec!(1000)),
        ];
        for _ in 0..3 {
            steps.push(exchange(&alice, AssetKey::susd(), dec!(10), AssetKey::seur()));
        }
        steps.push(ScenarioStep::Exchange {
            account: alice.clone(),
            src: AssetKey::susd(),
            amount: dec!(10),
            dest: AssetKey::seur(),
            expect_error: Some("QUEUE_OVERFLOW".to_string()),
        });
        steps.push(ScenarioStep::Wait { seconds: 181 });
        steps.push(ScenarioStep::Settle {
            account: alice.clone(),
            asset: AssetKey::seur(),
            expect_error: None,
        });
        steps.push(exchange(&alice, AssetKey::susd(), dec!(10), AssetKey::seur()));

        Self {
            name: "queue-limit".to_string(),
            description: "A full settlement queue refuses new entries until settled".to_string(),
            steps,
        }
    }

    /// Trade an inverse asset through a freeze at its lower bound.
    fn inverse() -> Self {
        let alice = AccountId::new("alice");
        let ibtc = AssetKey::ibtc();
        Self {
            name: "inverse".to_string(),
            description: "An inverse asset freezes at its lower bound and stays tradeable".to_string(),
            steps: vec![
                setup_step(),
                ScenarioStep::SetInversePricing {
                    asset: ibtc.clone(),
                    entry_point: dec!(4000),
                    upper_limit: dec!(6500),
                    lower_limit: dec!(1000),
                },
                rates(&[(ibtc.clone(), dec!(6000))]),
                issue(&alice, AssetKey::susd(), dec!(1000)),
                exchange(&alice, AssetKey::susd(), dec!(1000), ibtc.clone()),
                ScenarioStep::Wait { seconds: 500 },
                rates(&[(ibtc.clone(), dec!(7500))]),
                exchange(&alice, ibtc.clone(), dec!(0.4985), AssetKey::susd()),
                ScenarioStep::ExpectBalance {
                    account: alice,
                    asset: ibtc,
                    amount: Decimal::ZERO,
                },
            ],
        }
    }

    /// Several holders trading at random while prices drift.
    fn random() -> Self {
        let mut steps = vec![setup_step(), fee_step(AssetKey::seur()), fee_step(AssetKey::sbtc())];
        for name in ["alice", "bob", "carol", "dave"] {
            steps.push(issue(&AccountId::new(name), AssetKey::susd(), dec!(10000)));
        }
        steps.push(ScenarioStep::RandomTrades { count: 200 });

        Self {
            name: "random".to_string(),
            description: "Seeded random trading with drifting prices".to_string(),
            steps,
        }
    }
}

fn setup_step() -> ScenarioStep {
    rates(&[(AssetKey::seur(), dec!(2)), (AssetKey::sbtc(), dec!(10000))])
}

fn fee_step(asset: AssetKey) -> ScenarioStep {
    ScenarioStep::SetFeeRate {
        asset,
        rate: dec!(0.01),
    }
}

fn rates(quotes: &[(AssetKey, Decimal)]) -> ScenarioStep {
    ScenarioStep::UpdateRates {
        rates: quotes
            .iter()
            .map(|(asset, rate)| RateQuote {
                asset: asset.clone(),
                rate: *rate,
            })
            .collect(),
    }
}

fn issue(account: &AccountId, asset: AssetKey, amount: Decimal) -> ScenarioStep {
    ScenarioStep::Issue {
        account: account.clone(),
        asset,
        amount,
    }
}

fn exchange(account: &AccountId, src: AssetKey, amount: Decimal, dest: AssetKey) -> ScenarioStep {
    ScenarioStep::Exchange {
        account: account.clone(),
        src,
        amount,
        dest,
        expect_error: None,
    }
}

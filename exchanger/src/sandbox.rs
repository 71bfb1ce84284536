//! A fully wired in-memory deployment.
//!
//! Bundles the reference oracle, ledger, suspension switches, approvals and fee
//! pool around one exchanger, all driven by a manual clock. The simulator and
//! the integration tests run on it.

use std::sync::Arc;

use rust_decimal::Decimal;
use synthex_common::{AccountId, AssetKey, Clock, FeeRate, ManualClock, Timestamp};
use synthex_ledger::InMemoryLedger;
use synthex_oracle::ExchangeRates;
use tracing::debug;

use crate::access::Ownership;
use crate::config::ExchangerConfig;
use crate::delegation::InMemoryDelegateApprovals;
use crate::engine::{Collaborators, Exchanger};
use crate::error::ExchangeResult;
use crate::fee_pool::FeePool;
use crate::gateway::ExchangeGateway;
use crate::suspension::SystemStatus;

/// In-memory exchanger with handles to every collaborator.
pub struct Sandbox {
    pub owner: AccountId,
    pub clock: Arc<ManualClock>,
    pub rates: Arc<ExchangeRates>,
    pub ledger: Arc<InMemoryLedger>,
    pub status: Arc<SystemStatus>,
    pub approvals: Arc<InMemoryDelegateApprovals>,
    pub fee_pool: Arc<FeePool>,
    pub ownership: Arc<Ownership>,
    pub exchanger: Arc<Exchanger>,
    pub gateway: ExchangeGateway,
}

impl Sandbox {
    /// Account that owns every sandbox.
    pub const OWNER: &'static str = "owner";

    /// Build a sandbox starting at the current wall-clock time.
    pub fn new(config: ExchangerConfig) -> ExchangeResult<Self> {
        Self::starting_at(config, synthex_common::now())
    }

    /// Build a sandbox whose clock starts at `start`.
    pub fn starting_at(config: ExchangerConfig, start: Timestamp) -> ExchangeResult<Self> {
        let owner = AccountId::new(Self::OWNER);
        let clock = Arc::new(ManualClock::new(start));
        let rates = Arc::new(ExchangeRates::new(config.base_asset.clone(), clock.clone()));
        let ledger = Arc::new(InMemoryLedger::new());
        let status = Arc::new(SystemStatus::new());
        let approvals = Arc::new(InMemoryDelegateApprovals::new());
        let fee_pool = Arc::new(FeePool::new());
        let ownership = Arc::new(Ownership::new(owner.clone()));

        let exchanger = Arc::new(Exchanger::new(
            config,
            Collaborators {
                oracle: rates.clone(),
                ledger: ledger.clone(),
                suspension: status.clone(),
                delegates: approvals.clone(),
                fee_pool: fee_pool.clone(),
                authority: ownership.clone(),
                clock: clock.clone(),
            },
        )?);
        let gateway = ExchangeGateway::new(exchanger.clone(), &owner)?;

        Ok(Self {
            owner,
            clock,
            rates,
            ledger,
            status,
            approvals,
            fee_pool,
            ownership,
            exchanger,
            gateway,
        })
    }

    /// Publish rates stamped with the current sandbox time.
    pub fn update_rates(&self, rates: &[(AssetKey, Decimal)]) -> ExchangeResult<usize> {
        Ok(self.rates.update_rates(rates, self.clock.now())?)
    }

    pub fn issue(&self, account: &AccountId, asset: &AssetKey, amount: Decimal) -> ExchangeResult<()> {
        Ok(self.ledger.issue(account, asset, amount)?)
    }

    pub fn set_fee_rates(&self, rates: &[(AssetKey, FeeRate)]) -> ExchangeResult<()> {
        self.exchanger.set_exchange_fee_rates(&self.owner, rates)
    }

    pub fn advance_secs(&self, secs: i64) {
        self.clock.advance_secs(secs);
        debug!(secs, now = %self.clock.now(), "Sandbox clock advanced");
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }
}

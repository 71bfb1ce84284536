//! Holder-facing entry point to the exchanger.

use std::sync::Arc;

use rust_decimal::Decimal;
use synthex_common::{AccountId, AssetKey};
use tracing::instrument;

use crate::access::CallerId;
use crate::engine::{ExchangeReceipt, Exchanger, SettlementOutcome};
use crate::error::ExchangeResult;

/// The boundary holders trade through.
///
/// Owns a capability registered with the exchanger; holders exchange their
/// own balances into their own account, or delegates trade on their behalf.
pub struct ExchangeGateway {
    /// Engine behind the gateway.
    exchanger: Arc<Exchanger>,
    /// Capability presented on every exchange.
    capability: CallerId,
}

impl ExchangeGateway {
    /// Register a new gateway with the exchanger. Requires the owner.
    pub fn new(exchanger: Arc<Exchanger>, owner: &AccountId) -> ExchangeResult<Self> {
        let capability = exchanger.register_boundary(owner)?;
        Ok(Self {
            exchanger,
            capability,
        })
    }

    /// Exchange `amount` of `src` into `dest` for `from`'s own account.
    #[instrument(skip(self))]
    pub fn exchange(
        &self,
        from: &AccountId,
        src: &AssetKey,
        amount: Decimal,
        dest: &AssetKey,
    ) -> ExchangeResult<ExchangeReceipt> {
        self.exchanger
            .exchange(&self.capability, from, src, amount, dest, from)
    }

    /// Exchange for `authoriser`, who must have approved `delegate`.
    #[instrument(skip(self))]
    pub fn exchange_on_behalf(
        &self,
        authoriser: &AccountId,
        delegate: &AccountId,
        src: &AssetKey,
        amount: Decimal,
        dest: &AssetKey,
    ) -> ExchangeResult<ExchangeReceipt> {
        self.exchanger
            .exchange_on_behalf(&self.capability, authoriser, delegate, src, amount, dest)
    }

    pub fn settle(&self, account: &AccountId, asset: &AssetKey) -> ExchangeResult<SettlementOutcome> {
        self.exchanger.settle(account, asset)
    }

    pub fn capability(&self) -> CallerId {
        self.capability
    }

    pub fn exchanger(&self) -> &Arc<Exchanger> {
        &self.exchanger
    }
}

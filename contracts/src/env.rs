//! Execution context shared by one top-level call.
//!
//! The vault and the queue never own the external ledgers. Every call
//! borrows them through an [`Env`] along with the oracle, the timestamp of
//! the call, and a buffer the components push events into. The host
//! commits that buffer only if the call returns `Ok`.

use yieldvault_protocol::events::Event;
use yieldvault_protocol::oracle::{Price, PriceOracle};
use yieldvault_protocol::TokenLedger;

use crate::error::VaultError;

pub struct Env<'a> {
    /// Unix seconds at which the call executes.
    pub now: u64,
    /// The stable asset users deposit and claim.
    pub base: &'a mut TokenLedger,
    /// On-ledger mirror of the off-chain yield position.
    pub yield_token: &'a mut TokenLedger,
    pub oracle: &'a PriceOracle,
    pub events: &'a mut Vec<Event>,
}

impl<'a> Env<'a> {
    pub fn new(
        now: u64,
        base: &'a mut TokenLedger,
        yield_token: &'a mut TokenLedger,
        oracle: &'a PriceOracle,
        events: &'a mut Vec<Event>,
    ) -> Self {
        Self {
            now,
            base,
            yield_token,
            oracle,
            events,
        }
    }

    /// Validated oracle price as of `now`.
    pub fn price(&self) -> Result<Price, VaultError> {
        Ok(self.oracle.get_price(self.now)?)
    }

    /// Buffers an event for commit.
    pub fn emit(&mut self, event: Event) {
        tracing::trace!(?event, "event buffered");
        self.events.push(event);
    }
}

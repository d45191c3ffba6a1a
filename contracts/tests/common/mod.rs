//! Shared harness for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use yieldvault_contracts::{SystemConfig, VaultSystem};
use yieldvault_protocol::clock::ManualClock;
use yieldvault_protocol::config::VaultParams;
use yieldvault_protocol::{Address, ManualPriceSource};

/// 1.0 at 8 decimals.
pub const PRICE_ONE: u128 = 100_000_000;
pub const DAY: u64 = 86_400;
pub const GENESIS: u64 = 1_700_000_000;

pub fn addr(s: &str) -> Address {
    Address::new(s)
}

pub struct Harness {
    pub system: VaultSystem,
    pub source: ManualPriceSource,
    pub clock: ManualClock,
}

impl Harness {
    pub fn new(fee_bps: u16) -> Self {
        let clock = ManualClock::new(GENESIS);
        let source = ManualPriceSource::with_price(PRICE_ONE as i128, 8, GENESIS);
        let config = SystemConfig {
            params: VaultParams {
                deposit_fee_bps: fee_bps,
                ..VaultParams::default()
            },
            ..SystemConfig::default()
        };
        let system = VaultSystem::new(config, Arc::new(source.clone()), Arc::new(clock.clone())).unwrap();
        Self { system, source, clock }
    }

    pub fn fund(&mut self, who: &str, amount: u128) {
        self.system.mint_base(&addr("issuer"), &addr(who), amount).unwrap();
    }

    /// Funds `who` and deposits everything, returning the shares minted.
    pub fn deposit(&mut self, who: &str, amount: u128) -> u128 {
        self.fund(who, amount);
        self.system.deposit(&addr(who), amount, &addr(who)).unwrap()
    }

    /// Moves time forward and republishes the price at the new time.
    pub fn advance(&mut self, secs: u64) {
        self.clock.advance(secs);
        let answer = self.source_answer();
        self.source.set_price(answer, 8, self.clock_now());
    }

    pub fn set_price(&self, answer: u128) {
        self.source.set_price(answer as i128, 8, self.clock_now());
    }

    pub fn clock_now(&self) -> u64 {
        use yieldvault_protocol::clock::Clock;
        self.clock.now()
    }

    fn source_answer(&self) -> i128 {
        use yieldvault_protocol::PriceSource;
        self.source.latest_round().map(|r| r.answer).unwrap_or(PRICE_ONE as i128)
    }

    /// Moves all tracked base into the yield position at 1.0.
    pub fn convert_all(&mut self) -> u128 {
        let base = self.system.vault().tracked_base();
        self.system
            .convert_from_base(&addr("processor"), base, PRICE_ONE)
            .unwrap()
    }

    /// Requests, locks and processes one ticket per `(owner, shares)`
    /// at 1.0, with proceeds equal to total shares.
    pub fn settle(&mut self, tickets: &[(&str, u128)]) -> Vec<u64> {
        let ids: Vec<u64> = tickets
            .iter()
            .map(|(owner, shares)| self.system.request_redeem(&addr(owner), *shares, 0).unwrap())
            .collect();
        let total: u128 = tickets.iter().map(|(_, s)| *s).sum();
        let processor = addr("processor");
        self.system.lock_requests(&processor, &ids).unwrap();
        self.system
            .process_requests(&processor, &ids, total, total, PRICE_ONE)
            .unwrap();
        ids
    }
}

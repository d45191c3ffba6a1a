//! # Devnet
//!
//! One in-process [`VaultSystem`] driven by a manual price feed and a
//! manual clock, so that RPC callers can publish prices and move time.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use yieldvault_contracts::{SettlementReport, SystemConfig, VaultSystem};
use yieldvault_protocol::clock::{Clock, ManualClock};
use yieldvault_protocol::{Address, ManualPriceSource, PriceSource};

/// Seed balance of base asset for one address.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisAllocation {
    pub address: Address,
    pub amount: u128,
}

/// Devnet configuration file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DevnetConfig {
    pub network: String,
    pub system: SystemConfig,
    /// Unix time the clock starts at. Wall time when absent.
    pub genesis_time: Option<u64>,
    /// First published answer, in feed units.
    pub initial_price: u128,
    pub price_decimals: u8,
    pub allocations: Vec<GenesisAllocation>,
}

impl Default for DevnetConfig {
    fn default() -> Self {
        Self {
            network: "devnet".to_string(),
            system: SystemConfig::default(),
            genesis_time: None,
            initial_price: 100_000_000,
            price_decimals: 8,
            allocations: Vec::new(),
        }
    }
}

impl DevnetConfig {
    /// Reads and validates a JSON config file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config
            .system
            .params
            .validate()
            .with_context(|| format!("invalid vault parameters in {}", path.display()))?;
        Ok(config)
    }

    /// Loads `path` if given, otherwise the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}

// ---------------------------------------------------------------------------
// Devnet
// ---------------------------------------------------------------------------

pub struct Devnet {
    pub network: String,
    pub system: VaultSystem,
    source: ManualPriceSource,
    clock: ManualClock,
    decimals: u8,
}

impl Devnet {
    /// Deploys the system, publishes the first price and pays out the
    /// genesis allocations.
    pub fn new(config: &DevnetConfig) -> Result<Self> {
        let genesis = config
            .genesis_time
            .unwrap_or_else(|| u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0));
        let answer = i128::try_from(config.initial_price).context("initial price out of range")?;

        let clock = ManualClock::new(genesis);
        let source = ManualPriceSource::with_price(answer, config.price_decimals, genesis);
        let mut system = VaultSystem::new(
            config.system.clone(),
            Arc::new(source.clone()),
            Arc::new(clock.clone()),
        )
        .context("failed to deploy vault system")?;

        let issuer = config.system.base_issuer.clone();
        for alloc in &config.allocations {
            system
                .mint_base(&issuer, &alloc.address, alloc.amount)
                .with_context(|| format!("genesis allocation to {} failed", alloc.address))?;
        }

        tracing::info!(
            network = %config.network,
            genesis,
            price = config.initial_price,
            allocations = config.allocations.len(),
            "devnet initialized"
        );
        Ok(Self {
            network: config.network.clone(),
            system,
            source,
            clock,
            decimals: config.price_decimals,
        })
    }

    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    /// Latest published answer in feed units.
    pub fn price(&self) -> Option<u128> {
        self.source
            .latest_round()
            .and_then(|round| u128::try_from(round.answer).ok())
    }

    /// Publishes `answer` at the current time.
    pub fn set_price(&self, answer: u128) -> Result<()> {
        let answer = i128::try_from(answer).context("price answer out of range")?;
        self.source.set_price(answer, self.decimals, self.clock.now());
        tracing::info!(answer, "price published");
        Ok(())
    }

    /// Moves the clock forward. The last answer is republished at the new
    /// time so the feed does not go stale on its own.
    pub fn advance(&self, secs: u64) -> u64 {
        self.clock.advance(secs);
        let now = self.clock.now();
        if let Some(round) = self.source.latest_round() {
            self.source.set_price(round.answer, round.decimals, now);
        }
        tracing::debug!(secs, now, "clock advanced");
        now
    }
}

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

/// Outcome of one full withdrawal round.
#[derive(Debug, Serialize)]
pub struct SimulationReport {
    pub holders: Vec<Address>,
    pub shares_minted: Vec<u128>,
    pub yield_bought: u128,
    pub settlement: SettlementReport,
    pub claimed: Vec<u128>,
    pub snapshot: serde_json::Value,
}

/// Deposits `deposit` for each of `holders` fresh accounts, converts the
/// pool into the yield asset at the current price, then requests, locks,
/// processes and claims a full exit for everyone.
pub fn simulate(devnet: &mut Devnet, holders: u32, deposit: u128) -> Result<SimulationReport> {
    let config = devnet.system.config().clone();
    let processor = config
        .processors
        .first()
        .cloned()
        .context("configuration names no processor")?;
    let issuer = config.base_issuer;
    let price = devnet.price().context("price feed has no answer")?;
    let system = &mut devnet.system;

    let accounts: Vec<Address> = (0..holders)
        .map(|i| Address::new(format!("holder-{i}")))
        .collect();
    let mut shares_minted = Vec::with_capacity(accounts.len());
    for holder in &accounts {
        system.mint_base(&issuer, holder, deposit)?;
        shares_minted.push(system.deposit(holder, deposit, holder)?);
    }

    let tracked = system.vault().tracked_base();
    let yield_bought = system.convert_from_base(&processor, tracked, price)?;

    let mut ids = Vec::with_capacity(accounts.len());
    for (holder, shares) in accounts.iter().zip(&shares_minted) {
        ids.push(system.request_redeem(holder, *shares, 0)?);
    }
    system.lock_requests(&processor, &ids)?;

    let total_shares: u128 = shares_minted.iter().sum();
    let proceeds = system.convert_to_assets(total_shares)?;
    let sold = system.vested_yield_balance();
    let settlement = system.process_requests(&processor, &ids, proceeds, sold, price)?;

    let mut claimed = Vec::with_capacity(accounts.len());
    for holder in &accounts {
        claimed.push(system.claim_withdrawals(holder)?);
    }

    let snapshot = system.snapshot_json().context("failed to serialize snapshot")?;
    Ok(SimulationReport {
        holders: accounts,
        shares_minted,
        yield_bought,
        settlement,
        claimed,
        snapshot,
    })
}

//! # Vault System
//!
//! Wires the vault, the withdrawal queue, the two external token ledgers
//! and the price oracle into one deployable unit and gives every entry
//! point all-or-nothing semantics.
//!
//! Each call runs inside [`VaultSystem::transact`]: the mutable state is
//! checkpointed, the call executes against an [`Env`], and on error the
//! checkpoint is restored and the buffered events are discarded. On
//! success the events are appended to the hash-chained [`EventLog`].

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use yieldvault_protocol::clock::Clock;
use yieldvault_protocol::config::{VaultParams, ASSET_DECIMALS};
use yieldvault_protocol::events::Event;
use yieldvault_protocol::oracle::PriceSource;
use yieldvault_protocol::{Address, EventLog, PriceOracle, Role, TokenLedger};

use crate::env::Env;
use crate::error::VaultError;
use crate::vault::Vault;
use crate::withdrawal_queue::{SettlementReport, WithdrawalQueue};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Addresses and parameters for a deployment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    pub vault_address: Address,
    pub queue_address: Address,
    /// Issuer of the base asset; the only address that can mint it or
    /// edit its blacklist.
    pub base_issuer: Address,
    pub admin: Address,
    pub processors: Vec<Address>,
    pub compliance: Vec<Address>,
    pub base_symbol: String,
    pub yield_symbol: String,
    pub params: VaultParams,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            vault_address: Address::new("vault"),
            queue_address: Address::new("withdrawal_queue"),
            base_issuer: Address::new("issuer"),
            admin: Address::new("admin"),
            processors: vec![Address::new("processor")],
            compliance: vec![Address::new("compliance")],
            base_symbol: "USDX".to_string(),
            yield_symbol: "yTRACK".to_string(),
            params: VaultParams::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Everything a call may mutate. Cloned as the rollback checkpoint.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SystemState {
    pub base: TokenLedger,
    pub yield_token: TokenLedger,
    pub vault: Vault,
    pub queue: WithdrawalQueue,
}

/// Serializable view of the whole system.
#[derive(Debug, Serialize)]
pub struct Snapshot<'a> {
    pub now: u64,
    pub state: &'a SystemState,
    pub event_count: usize,
    pub event_head: String,
}

pub struct VaultSystem {
    config: SystemConfig,
    state: SystemState,
    oracle: PriceOracle,
    clock: Arc<dyn Clock>,
    events: EventLog,
}

impl fmt::Debug for VaultSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultSystem")
            .field("vault", &self.state.vault.address())
            .field("queue", &self.state.queue.address())
            .field("now", &self.clock.now())
            .field("events", &self.events.len())
            .finish()
    }
}

impl VaultSystem {
    /// Deploys a fresh system and grants the configured roles on both
    /// components.
    pub fn new(config: SystemConfig, source: Arc<dyn PriceSource>, clock: Arc<dyn Clock>) -> Result<Self, VaultError> {
        let oracle = PriceOracle::new(source, config.params.oracle.clone())?;
        let vault = Vault::new(
            config.vault_address.clone(),
            config.queue_address.clone(),
            config.admin.clone(),
            &config.params,
        )?;
        let queue = WithdrawalQueue::new(
            config.queue_address.clone(),
            config.vault_address.clone(),
            config.admin.clone(),
        )?;
        let state = SystemState {
            base: TokenLedger::new(config.base_symbol.clone(), ASSET_DECIMALS, config.base_issuer.clone()),
            yield_token: TokenLedger::new(config.yield_symbol.clone(), ASSET_DECIMALS, config.vault_address.clone()),
            vault,
            queue,
        };

        let mut system = Self {
            config,
            state,
            oracle,
            clock,
            events: EventLog::new(),
        };

        let admin = system.config.admin.clone();
        let grants: Vec<(Role, Address)> = system
            .config
            .processors
            .iter()
            .map(|a| (Role::Processor, a.clone()))
            .chain(system.config.compliance.iter().map(|a| (Role::Compliance, a.clone())))
            .collect();
        for (role, who) in grants {
            system.grant_role(&admin, role, &who)?;
        }

        info!(
            vault = %system.config.vault_address,
            queue = %system.config.queue_address,
            "vault system deployed"
        );
        Ok(system)
    }

    /// Runs `op` with all-or-nothing semantics.
    pub fn transact<T>(
        &mut self,
        name: &'static str,
        op: impl FnOnce(&mut Env<'_>, &mut Vault, &mut WithdrawalQueue) -> Result<T, VaultError>,
    ) -> Result<T, VaultError> {
        let now = self.clock.now();
        let checkpoint = self.state.clone();
        let mut pending = Vec::new();

        let result = {
            let SystemState {
                base,
                yield_token,
                vault,
                queue,
            } = &mut self.state;
            let mut env = Env::new(now, base, yield_token, &self.oracle, &mut pending);
            op(&mut env, vault, queue)
        };

        match result {
            Ok(value) => {
                self.events.extend(pending, now);
                Ok(value)
            }
            Err(err) => {
                self.state = checkpoint;
                warn!(op = name, kind = %err.kind(), error = %err, "call rejected");
                Err(err)
            }
        }
    }

    // -- Queries ------------------------------------------------------------

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    pub fn state(&self) -> &SystemState {
        &self.state
    }

    pub fn vault(&self) -> &Vault {
        &self.state.vault
    }

    pub fn queue(&self) -> &WithdrawalQueue {
        &self.state.queue
    }

    pub fn base(&self) -> &TokenLedger {
        &self.state.base
    }

    pub fn yield_token(&self) -> &TokenLedger {
        &self.state.yield_token
    }

    pub fn oracle(&self) -> &PriceOracle {
        &self.oracle
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Runs a read-only closure against a scratch [`Env`].
    fn view<T>(&self, f: impl FnOnce(&Env<'_>, &Vault) -> Result<T, VaultError>) -> Result<T, VaultError> {
        let mut base = self.state.base.clone();
        let mut yield_token = self.state.yield_token.clone();
        let mut scratch = Vec::new();
        let env = Env::new(self.clock.now(), &mut base, &mut yield_token, &self.oracle, &mut scratch);
        f(&env, &self.state.vault)
    }

    pub fn total_assets(&self) -> Result<u128, VaultError> {
        self.view(|env, vault| vault.total_assets(env))
    }

    pub fn unvested_amount(&self) -> u128 {
        self.state.vault.unvested_amount(self.clock.now())
    }

    pub fn vested_yield_balance(&self) -> u128 {
        self.state.vault.vested_yield_balance(self.clock.now())
    }

    pub fn convert_to_shares(&self, assets: u128) -> Result<u128, VaultError> {
        self.view(|env, vault| vault.convert_to_shares(env, assets))
    }

    pub fn convert_to_assets(&self, shares: u128) -> Result<u128, VaultError> {
        self.view(|env, vault| vault.convert_to_assets(env, shares))
    }

    pub fn preview_deposit(&self, assets: u128) -> Result<u128, VaultError> {
        self.view(|env, vault| vault.preview_deposit(env, assets))
    }

    pub fn preview_mint(&self, shares: u128) -> Result<u128, VaultError> {
        self.view(|env, vault| vault.preview_mint(env, shares))
    }

    pub fn preview_redeem(&self, shares: u128) -> Result<u128, VaultError> {
        self.view(|env, vault| vault.preview_redeem(env, shares))
    }

    /// JSON dump of all ledger state plus the event-log head.
    pub fn snapshot_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(Snapshot {
            now: self.clock.now(),
            state: &self.state,
            event_count: self.events.len(),
            event_head: self.events.head_hash(),
        })
    }

    // -- Base asset ---------------------------------------------------------

    /// Issues base asset. Issuer only.
    pub fn mint_base(&mut self, caller: &Address, to: &Address, amount: u128) -> Result<(), VaultError> {
        self.transact("mint_base", |env, _, _| Ok(env.base.mint(caller, to, amount)?))
    }

    pub fn transfer_base(&mut self, caller: &Address, to: &Address, amount: u128) -> Result<(), VaultError> {
        self.transact("transfer_base", |env, _, _| Ok(env.base.transfer(caller, to, amount)?))
    }

    /// Edits the base asset's own blacklist. Issuer only.
    pub fn set_base_blacklisted(&mut self, caller: &Address, who: &Address, blacklisted: bool) -> Result<(), VaultError> {
        self.transact("set_base_blacklisted", |env, _, _| {
            if caller != env.base.minter() {
                return Err(yieldvault_protocol::AccessError::UnauthorizedCaller {
                    caller: caller.clone(),
                    expected: env.base.minter().clone(),
                }
                .into());
            }
            env.base.set_blacklisted(who.clone(), blacklisted);
            Ok(())
        })
    }

    // -- Vault --------------------------------------------------------------

    pub fn deposit(&mut self, caller: &Address, assets: u128, receiver: &Address) -> Result<u128, VaultError> {
        self.transact("deposit", |env, vault, _| vault.deposit(env, caller, assets, receiver))
    }

    pub fn mint(&mut self, caller: &Address, shares: u128, receiver: &Address) -> Result<u128, VaultError> {
        self.transact("mint", |env, vault, _| vault.mint(env, caller, shares, receiver))
    }

    pub fn withdraw(&mut self, assets: u128, receiver: &Address, owner: &Address) -> Result<u128, VaultError> {
        self.transact("withdraw", |_, vault, _| vault.withdraw(assets, receiver, owner))
    }

    pub fn redeem(&mut self, shares: u128, receiver: &Address, owner: &Address) -> Result<u128, VaultError> {
        self.transact("redeem", |_, vault, _| vault.redeem(shares, receiver, owner))
    }

    pub fn transfer_shares(&mut self, caller: &Address, to: &Address, shares: u128) -> Result<(), VaultError> {
        self.transact("transfer_shares", |env, vault, _| vault.transfer_shares(env, caller, to, shares))
    }

    pub fn request_redeem(&mut self, caller: &Address, shares: u128, min_base_received: u128) -> Result<u64, VaultError> {
        self.transact("request_redeem", |env, vault, queue| {
            vault.request_redeem(env, queue, caller, shares, min_base_received)
        })
    }

    pub fn claim_withdrawals(&mut self, caller: &Address) -> Result<u128, VaultError> {
        self.transact("claim_withdrawals", |env, vault, queue| vault.claim_withdrawals(env, queue, caller))
    }

    pub fn claim_withdrawal_batch(&mut self, caller: &Address, request_ids: &[u64]) -> Result<u128, VaultError> {
        self.transact("claim_withdrawal_batch", |env, vault, queue| {
            vault.claim_withdrawal_batch(env, queue, caller, request_ids)
        })
    }

    pub fn convert_from_base(&mut self, caller: &Address, base_amount: u128, execution_price: u128) -> Result<u128, VaultError> {
        self.transact("convert_from_base", |env, vault, _| {
            vault.convert_from_base(env, caller, base_amount, execution_price)
        })
    }

    pub fn convert_from_yield_asset(&mut self, caller: &Address, yield_amount: u128, execution_price: u128) -> Result<u128, VaultError> {
        self.transact("convert_from_yield_asset", |env, vault, _| {
            vault.convert_from_yield_asset(env, caller, yield_amount, execution_price)
        })
    }

    pub fn transfer_in_rewards(&mut self, caller: &Address, amount: u128) -> Result<(), VaultError> {
        self.transact("transfer_in_rewards", |env, vault, _| vault.transfer_in_rewards(env, caller, amount))
    }

    pub fn add_to_blacklist(&mut self, caller: &Address, who: &Address) -> Result<(), VaultError> {
        self.transact("add_to_blacklist", |env, vault, _| vault.add_to_blacklist(env, caller, who))
    }

    pub fn remove_from_blacklist(&mut self, caller: &Address, who: &Address) -> Result<(), VaultError> {
        self.transact("remove_from_blacklist", |env, vault, _| vault.remove_from_blacklist(env, caller, who))
    }

    pub fn redistribute_locked_shares(&mut self, caller: &Address, from: &Address, to: Option<&Address>) -> Result<u128, VaultError> {
        self.transact("redistribute_locked_shares", |env, vault, _| {
            vault.redistribute_locked_shares(env, caller, from, to)
        })
    }

    pub fn pause_vault(&mut self, caller: &Address) -> Result<(), VaultError> {
        self.transact("pause_vault", |env, vault, _| vault.pause(env, caller))
    }

    pub fn unpause_vault(&mut self, caller: &Address) -> Result<(), VaultError> {
        self.transact("unpause_vault", |env, vault, _| vault.unpause(env, caller))
    }

    pub fn set_tolerance_bps(&mut self, caller: &Address, bps: u16) -> Result<(), VaultError> {
        self.transact("set_tolerance_bps", |env, vault, _| vault.set_tolerance_bps(env, caller, bps))
    }

    pub fn set_fee_recipient(&mut self, caller: &Address, recipient: &Address) -> Result<(), VaultError> {
        self.transact("set_fee_recipient", |env, vault, _| vault.set_fee_recipient(env, caller, recipient))
    }

    pub fn set_deposit_fee_bps(&mut self, caller: &Address, bps: u16) -> Result<(), VaultError> {
        self.transact("set_deposit_fee_bps", |env, vault, _| vault.set_deposit_fee_bps(env, caller, bps))
    }

    pub fn set_vesting_period(&mut self, caller: &Address, secs: u64) -> Result<(), VaultError> {
        self.transact("set_vesting_period", |env, vault, _| vault.set_vesting_period(env, caller, secs))
    }

    /// Grants `role` on both the vault and the queue.
    pub fn grant_role(&mut self, caller: &Address, role: Role, who: &Address) -> Result<(), VaultError> {
        self.transact("grant_role", |env, vault, queue| {
            vault.grant_role(env, caller, role, who)?;
            queue.grant_role(env, caller, role, who)
        })
    }

    /// Revokes `role` on both the vault and the queue.
    pub fn revoke_role(&mut self, caller: &Address, role: Role, who: &Address) -> Result<(), VaultError> {
        self.transact("revoke_role", |env, vault, queue| {
            vault.revoke_role(env, caller, role, who)?;
            queue.revoke_role(env, caller, role, who)
        })
    }

    // -- Queue --------------------------------------------------------------

    pub fn update_min_base_received(&mut self, caller: &Address, request_id: u64, new_min: u128) -> Result<(), VaultError> {
        self.transact("update_min_base_received", |env, vault, queue| {
            queue.update_min_base_received(env, vault, caller, request_id, new_min)
        })
    }

    pub fn transfer_ticket(&mut self, caller: &Address, request_id: u64, to: &Address) -> Result<(), VaultError> {
        self.transact("transfer_ticket", |env, vault, queue| {
            queue.transfer_ticket(env, vault, caller, request_id, to)
        })
    }

    pub fn lock_requests(&mut self, caller: &Address, request_ids: &[u64]) -> Result<(), VaultError> {
        self.transact("lock_requests", |env, _, queue| queue.lock_requests(env, caller, request_ids))
    }

    pub fn unlock_requests(&mut self, caller: &Address, request_ids: &[u64]) -> Result<(), VaultError> {
        self.transact("unlock_requests", |env, _, queue| queue.unlock_requests(env, caller, request_ids))
    }

    pub fn process_requests(
        &mut self,
        caller: &Address,
        request_ids: &[u64],
        total_proceeds: u128,
        total_yield_sold: u128,
        execution_price: u128,
    ) -> Result<SettlementReport, VaultError> {
        self.transact("process_requests", |env, vault, queue| {
            queue.process_requests(env, vault, caller, request_ids, total_proceeds, total_yield_sold, execution_price)
        })
    }

    pub fn claim(&mut self, caller: &Address, request_id: u64) -> Result<u128, VaultError> {
        self.transact("claim", |env, vault, queue| queue.claim(env, vault, caller, request_id))
    }

    pub fn claim_batch(&mut self, caller: &Address, request_ids: &[u64]) -> Result<u128, VaultError> {
        self.transact("claim_batch", |env, vault, queue| queue.claim_batch(env, vault, caller, request_ids))
    }

    pub fn claim_all_for(&mut self, caller: &Address, owner: &Address) -> Result<u128, VaultError> {
        self.transact("claim_all_for", |env, vault, queue| queue.claim_all_for(env, vault, caller, owner))
    }

    pub fn claim_batch_for(&mut self, caller: &Address, owner: &Address, request_ids: &[u64]) -> Result<u128, VaultError> {
        self.transact("claim_batch_for", |env, vault, queue| {
            queue.claim_batch_for(env, vault, caller, owner, request_ids)
        })
    }

    pub fn seize_requests(&mut self, caller: &Address, request_ids: &[u64], from: &Address, to: &Address) -> Result<(), VaultError> {
        self.transact("seize_requests", |env, vault, queue| {
            queue.seize_requests(env, vault, caller, request_ids, from, to)
        })
    }

    pub fn seize_blacklisted_funds(&mut self, caller: &Address, request_ids: &[u64], from: &Address, to: &Address) -> Result<u128, VaultError> {
        self.transact("seize_blacklisted_funds", |env, vault, queue| {
            queue.seize_blacklisted_funds(env, vault, caller, request_ids, from, to)
        })
    }

    pub fn pause_queue(&mut self, caller: &Address) -> Result<(), VaultError> {
        self.transact("pause_queue", |env, _, queue| queue.pause(env, caller))
    }

    pub fn unpause_queue(&mut self, caller: &Address) -> Result<(), VaultError> {
        self.transact("unpause_queue", |env, _, queue| queue.unpause(env, caller))
    }

    // -- Oracle -------------------------------------------------------------

    /// Points the oracle at a different feed. Vault admin only.
    pub fn set_price_source(&mut self, caller: &Address, source: Arc<dyn PriceSource>) -> Result<(), VaultError> {
        self.state.vault.access().require(Role::Admin, caller)?;
        self.oracle.set_source(source);
        self.record(parameter_event("oracle_source", "rotated"));
        Ok(())
    }

    pub fn set_oracle_staleness_window(&mut self, caller: &Address, secs: u64) -> Result<(), VaultError> {
        self.state.vault.access().require(Role::Admin, caller)?;
        self.oracle.set_staleness_window(secs)?;
        self.record(parameter_event("oracle_staleness_window", secs));
        Ok(())
    }

    pub fn set_oracle_bounds(&mut self, caller: &Address, min_price: u128, max_price: u128) -> Result<(), VaultError> {
        self.state.vault.access().require(Role::Admin, caller)?;
        self.oracle.set_bounds(min_price, max_price)?;
        self.record(parameter_event("oracle_bounds", format!("{min_price}..={max_price}")));
        Ok(())
    }

    fn record(&mut self, event: Event) {
        let now = self.clock.now();
        self.events.append(event, now);
    }
}

fn parameter_event(name: &str, value: impl ToString) -> Event {
    Event::ParameterChanged {
        name: name.to_string(),
        value: value.to_string(),
    }
}

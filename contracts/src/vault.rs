//! # Yield Vault
//!
//! Share-based vault over a base asset. Depositors receive shares; the
//! processor moves base into an off-chain yield position and back; exits
//! are asynchronous through the [`WithdrawalQueue`].
//!
//! ## Accounting
//!
//! The vault never reads its raw token balances. It keeps its own
//! `tracked_base` and `tracked_yield`, so unsolicited transfers cannot move
//! the exchange rate:
//!
//! ```text
//! total_assets = tracked_base + price × (tracked_yield − unvested)
//! shares_out   = floor(assets × (supply + 10^offset) / (total_assets + 1))
//! assets_out   = floor(shares × (total_assets + 1) / (supply + 10^offset))
//! ```
//!
//! The virtual offset makes the first depositor's rate well defined and
//! defeats inflation attacks on an empty vault.
//!
//! ## Roles
//!
//! - `Processor`: conversions, rewards, fee and vesting tuning.
//! - `Compliance`: blacklist and pause.
//! - `Admin`: unpause, tolerance, fee recipient, locked-share redistribution.
//! - The queue (by address): burning escrowed shares and returning dust.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use yieldvault_protocol::access::{self, AccessControl, Role};
use yieldvault_protocol::config::{self, VaultParams, ASSET_DECIMALS, DECIMALS_OFFSET, VIRTUAL_ASSETS, VIRTUAL_SHARES};
use yieldvault_protocol::events::Event;
use yieldvault_protocol::guard::ReentrancyGuard;
use yieldvault_protocol::math::{self, Rounding};
use yieldvault_protocol::{Address, Price, TokenLedger};

use crate::env::Env;
use crate::error::{EconomicError, VaultError};
use crate::fees;
use crate::settlement;
use crate::vesting::VestingSchedule;
use crate::withdrawal_queue::WithdrawalQueue;

const COMPONENT: &str = "vault";

/// Symbol of the vault's share token.
pub const SHARE_SYMBOL: &str = "yvUSD";

// ---------------------------------------------------------------------------
// Vault
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Vault {
    address: Address,
    /// The only address allowed to burn escrowed shares or return dust.
    queue: Address,
    shares: TokenLedger,
    tracked_base: u128,
    tracked_yield: u128,
    vesting: VestingSchedule,
    /// Period applied to the next reward schedule.
    vesting_period: u64,
    deposit_fee_bps: u16,
    fee_recipient: Address,
    tolerance_bps: u16,
    blacklist: BTreeSet<Address>,
    paused: bool,
    access: AccessControl,
    guard: ReentrancyGuard,
}

impl Vault {
    /// Creates an empty vault whose only role holder is `admin`.
    pub fn new(address: Address, queue: Address, admin: Address, params: &VaultParams) -> Result<Self, VaultError> {
        params.validate()?;
        if address.is_zero() || queue.is_zero() || admin.is_zero() {
            return Err(VaultError::ZeroAddress);
        }
        let share_decimals = ASSET_DECIMALS + DECIMALS_OFFSET as u8;
        Ok(Self {
            shares: TokenLedger::new(SHARE_SYMBOL, share_decimals, address.clone()),
            address,
            queue,
            tracked_base: 0,
            tracked_yield: 0,
            vesting: VestingSchedule::default(),
            vesting_period: params.vesting_period_secs,
            deposit_fee_bps: params.deposit_fee_bps,
            fee_recipient: params.fee_recipient.clone(),
            tolerance_bps: params.tolerance_bps,
            blacklist: BTreeSet::new(),
            paused: false,
            access: AccessControl::new(admin),
            guard: ReentrancyGuard::new(),
        })
    }

    // -- Accessors ----------------------------------------------------------

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn queue_address(&self) -> &Address {
        &self.queue
    }

    pub fn shares(&self) -> &TokenLedger {
        &self.shares
    }

    pub fn total_supply(&self) -> u128 {
        self.shares.total_supply()
    }

    pub fn share_balance(&self, holder: &Address) -> u128 {
        self.shares.balance_of(holder)
    }

    pub fn tracked_base(&self) -> u128 {
        self.tracked_base
    }

    pub fn tracked_yield(&self) -> u128 {
        self.tracked_yield
    }

    pub fn vesting(&self) -> &VestingSchedule {
        &self.vesting
    }

    pub fn vesting_period(&self) -> u64 {
        self.vesting_period
    }

    pub fn deposit_fee_bps(&self) -> u16 {
        self.deposit_fee_bps
    }

    pub fn fee_recipient(&self) -> &Address {
        &self.fee_recipient
    }

    pub fn tolerance_bps(&self) -> u16 {
        self.tolerance_bps
    }

    pub fn is_blacklisted(&self, who: &Address) -> bool {
        self.blacklist.contains(who)
    }

    pub fn blacklist(&self) -> impl Iterator<Item = &Address> {
        self.blacklist.iter()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn access(&self) -> &AccessControl {
        &self.access
    }

    // -- Valuation ----------------------------------------------------------

    /// Reward amount still held back from valuation at `now`.
    pub fn unvested_amount(&self, now: u64) -> u128 {
        self.vesting.unvested(now).min(self.tracked_yield)
    }

    /// Yield balance the vault may value or sell at `now`.
    pub fn vested_yield_balance(&self, now: u64) -> u128 {
        self.tracked_yield - self.unvested_amount(now)
    }

    /// Reported total value in base-asset terms.
    ///
    /// The price feed is consulted only when there is vested yield to
    /// value; a vault holding nothing but base never depends on it.
    pub fn total_assets(&self, env: &Env) -> Result<u128, VaultError> {
        let vested = self.vested_yield_balance(env.now);
        if vested == 0 {
            return Ok(self.tracked_base);
        }
        let price = env.price()?;
        let yield_value = price.yield_to_base(vested, Rounding::Floor)?;
        Ok(math::checked_add(self.tracked_base, yield_value)?)
    }

    fn to_shares(&self, assets: u128, total_assets: u128, rounding: Rounding) -> Result<u128, VaultError> {
        let supply = math::checked_add(self.shares.total_supply(), VIRTUAL_SHARES)?;
        let value = math::checked_add(total_assets, VIRTUAL_ASSETS)?;
        Ok(math::mul_div(assets, supply, value, rounding)?)
    }

    fn to_assets(&self, shares: u128, total_assets: u128, rounding: Rounding) -> Result<u128, VaultError> {
        let supply = math::checked_add(self.shares.total_supply(), VIRTUAL_SHARES)?;
        let value = math::checked_add(total_assets, VIRTUAL_ASSETS)?;
        Ok(math::mul_div(shares, value, supply, rounding)?)
    }

    /// Shares `assets` is worth at the current rate, rounded down.
    pub fn convert_to_shares(&self, env: &Env, assets: u128) -> Result<u128, VaultError> {
        let total = self.total_assets(env)?;
        self.to_shares(assets, total, Rounding::Floor)
    }

    /// Base value of `shares` at the current rate, rounded down.
    pub fn convert_to_assets(&self, env: &Env, shares: u128) -> Result<u128, VaultError> {
        let total = self.total_assets(env)?;
        self.to_assets(shares, total, Rounding::Floor)
    }

    /// Shares a deposit of `assets` would mint after the fee.
    pub fn preview_deposit(&self, env: &Env, assets: u128) -> Result<u128, VaultError> {
        let fee = fees::fee_on_total(assets, self.deposit_fee_bps)?;
        let total = self.total_assets(env)?;
        self.to_shares(assets - fee, total, Rounding::Floor)
    }

    /// Gross assets needed to mint exactly `shares`, fee included.
    pub fn preview_mint(&self, env: &Env, shares: u128) -> Result<u128, VaultError> {
        let total = self.total_assets(env)?;
        let net = self.to_assets(shares, total, Rounding::Ceil)?;
        let fee = fees::fee_on_raw(net, self.deposit_fee_bps)?;
        Ok(math::checked_add(net, fee)?)
    }

    /// Base value a redemption of `shares` would settle near.
    pub fn preview_redeem(&self, env: &Env, shares: u128) -> Result<u128, VaultError> {
        self.convert_to_assets(env, shares)
    }

    /// Deposit capacity for `receiver`. Zero while paused or blacklisted.
    pub fn max_deposit(&self, receiver: &Address) -> u128 {
        if self.paused || self.is_blacklisted(receiver) {
            0
        } else {
            u128::MAX
        }
    }

    /// Mint capacity for `receiver`. Zero while paused or blacklisted.
    pub fn max_mint(&self, receiver: &Address) -> u128 {
        self.max_deposit(receiver)
    }

    /// Always zero: there is no synchronous exit.
    pub fn max_withdraw(&self, _owner: &Address) -> u128 {
        0
    }

    /// Always zero: there is no synchronous exit.
    pub fn max_redeem(&self, _owner: &Address) -> u128 {
        0
    }

    // -- Deposits -----------------------------------------------------------

    /// Deposits `assets` of base from `caller`, minting shares to
    /// `receiver`. The fee is carved out of `assets`.
    pub fn deposit(&mut self, env: &mut Env, caller: &Address, assets: u128, receiver: &Address) -> Result<u128, VaultError> {
        self.guarded(|vault| {
            vault.ensure_can_enter(caller, receiver)?;
            if assets == 0 {
                return Err(VaultError::ZeroAmount);
            }
            let total = vault.total_assets(env)?;
            let fee = fees::fee_on_total(assets, vault.deposit_fee_bps)?;
            let net = assets - fee;
            let shares = vault.to_shares(net, total, Rounding::Floor)?;
            if shares == 0 {
                return Err(EconomicError::ZeroShares { assets }.into());
            }

            vault.settle_entry(env, caller, receiver, net, fee, shares)?;
            info!(%caller, %receiver, assets, fee, shares, "deposit");
            Ok(shares)
        })
    }

    /// Mints exactly `shares` to `receiver`, pulling the required base plus
    /// fee from `caller`. Returns the gross amount pulled.
    pub fn mint(&mut self, env: &mut Env, caller: &Address, shares: u128, receiver: &Address) -> Result<u128, VaultError> {
        self.guarded(|vault| {
            vault.ensure_can_enter(caller, receiver)?;
            if shares == 0 {
                return Err(VaultError::ZeroAmount);
            }
            let total = vault.total_assets(env)?;
            let net = vault.to_assets(shares, total, Rounding::Ceil)?;
            let fee = fees::fee_on_raw(net, vault.deposit_fee_bps)?;
            let assets = math::checked_add(net, fee)?;

            vault.settle_entry(env, caller, receiver, net, fee, shares)?;
            info!(%caller, %receiver, assets, fee, shares, "mint");
            Ok(assets)
        })
    }

    fn ensure_can_enter(&self, caller: &Address, receiver: &Address) -> Result<(), VaultError> {
        self.ensure_not_paused()?;
        if receiver.is_zero() {
            return Err(VaultError::ZeroAddress);
        }
        self.ensure_not_blacklisted(caller)?;
        self.ensure_not_blacklisted(receiver)
    }

    /// Pulls `net + fee` from `payer` and mints `shares`. Every leg is
    /// checked before the first one moves.
    fn settle_entry(
        &mut self,
        env: &mut Env,
        payer: &Address,
        receiver: &Address,
        net: u128,
        fee: u128,
        shares: u128,
    ) -> Result<(), VaultError> {
        let gross = math::checked_add(net, fee)?;
        env.base.check_transfer(payer, &self.address, gross)?;
        if fee > 0 {
            self.ensure_not_blacklisted(&self.fee_recipient)?;
            env.base.check_transfer(payer, &self.fee_recipient, 0)?;
        }
        let new_base = math::checked_add(self.tracked_base, net)?;
        math::checked_add(self.shares.total_supply(), shares)?;

        env.base.transfer(payer, &self.address, net)?;
        if fee > 0 {
            env.base.transfer(payer, &self.fee_recipient, fee)?;
        }
        self.shares.mint(&self.address, receiver, shares)?;
        self.tracked_base = new_base;

        env.emit(Event::Deposit {
            caller: payer.clone(),
            receiver: receiver.clone(),
            assets: gross,
            shares,
            fee,
        });
        Ok(())
    }

    // -- Exits --------------------------------------------------------------

    /// Synchronous withdrawal is not offered.
    pub fn withdraw(&self, _assets: u128, _receiver: &Address, _owner: &Address) -> Result<u128, VaultError> {
        Err(VaultError::SynchronousExitDisabled)
    }

    /// Synchronous redemption is not offered.
    pub fn redeem(&self, _shares: u128, _receiver: &Address, _owner: &Address) -> Result<u128, VaultError> {
        Err(VaultError::SynchronousExitDisabled)
    }

    /// Escrows `shares` from `caller` with the queue and opens a ticket.
    pub fn request_redeem(
        &mut self,
        env: &mut Env,
        queue: &mut WithdrawalQueue,
        caller: &Address,
        shares: u128,
        min_base_received: u128,
    ) -> Result<u64, VaultError> {
        self.guarded(|vault| {
            vault.ensure_not_paused()?;
            if shares == 0 {
                return Err(VaultError::ZeroAmount);
            }
            vault.ensure_not_blacklisted(caller)?;
            vault.ensure_queue(queue)?;
            vault.shares.check_transfer(caller, &vault.queue, shares)?;

            let id = queue.create_request(env, &vault.address, caller.clone(), shares, min_base_received)?;
            vault.shares.transfer(caller, &vault.queue, shares)?;
            info!(request_id = id, owner = %caller, shares, min_base_received, "redeem requested");
            Ok(id)
        })
    }

    /// Claims every processed ticket `caller` holds.
    pub fn claim_withdrawals(&mut self, env: &mut Env, queue: &mut WithdrawalQueue, caller: &Address) -> Result<u128, VaultError> {
        self.guarded(|vault| {
            vault.ensure_queue(queue)?;
            let this = vault.address.clone();
            queue.claim_all_for(env, vault, &this, caller)
        })
    }

    /// Claims the listed processed tickets `caller` holds.
    pub fn claim_withdrawal_batch(
        &mut self,
        env: &mut Env,
        queue: &mut WithdrawalQueue,
        caller: &Address,
        request_ids: &[u64],
    ) -> Result<u128, VaultError> {
        self.guarded(|vault| {
            vault.ensure_queue(queue)?;
            let this = vault.address.clone();
            queue.claim_batch_for(env, vault, &this, caller, request_ids)
        })
    }

    fn ensure_queue(&self, queue: &WithdrawalQueue) -> Result<(), VaultError> {
        access::require_caller(queue.address(), &self.queue)?;
        Ok(())
    }

    // -- Share transfers ----------------------------------------------------

    pub fn transfer_shares(&mut self, env: &mut Env, caller: &Address, to: &Address, shares: u128) -> Result<(), VaultError> {
        self.guarded(|vault| {
            vault.ensure_not_paused()?;
            if shares == 0 {
                return Err(VaultError::ZeroAmount);
            }
            vault.ensure_not_blacklisted(caller)?;
            vault.ensure_not_blacklisted(to)?;
            vault.shares.transfer(caller, to, shares)?;
            debug!(from = %caller, %to, shares, "shares transferred");
            env.emit(Event::SharesTransferred {
                from: caller.clone(),
                to: to.clone(),
                shares,
            });
            Ok(())
        })
    }

    // -- Processor conversions ----------------------------------------------

    /// Sends `base_amount` of tracked base to the processor to buy yield
    /// asset at `execution_price` (in oracle decimals). Returns the yield
    /// amount credited.
    pub fn convert_from_base(&mut self, env: &mut Env, caller: &Address, base_amount: u128, execution_price: u128) -> Result<u128, VaultError> {
        self.guarded(|vault| {
            vault.access.require(Role::Processor, caller)?;
            vault.ensure_not_paused()?;
            if base_amount == 0 || execution_price == 0 {
                return Err(VaultError::ZeroAmount);
            }
            if base_amount > vault.tracked_base {
                return Err(EconomicError::InsufficientTrackedBase {
                    requested: base_amount,
                    available: vault.tracked_base,
                }
                .into());
            }

            let oracle = env.price()?;
            let execution = Price::new(execution_price, oracle.decimals);
            settlement::check_execution_price(execution, oracle, vault.tolerance_bps)?;
            let yield_amount = execution.base_to_yield(base_amount, Rounding::Floor)?;
            if yield_amount == 0 {
                return Err(VaultError::ZeroAmount);
            }
            settlement::check_execution_value(base_amount, yield_amount, oracle, vault.tolerance_bps)?;

            env.base.check_transfer(&vault.address, caller, base_amount)?;
            let new_yield = math::checked_add(vault.tracked_yield, yield_amount)?;

            env.base.transfer(&vault.address, caller, base_amount)?;
            env.yield_token.mint(&vault.address, &vault.address, yield_amount)?;
            vault.tracked_base -= base_amount;
            vault.tracked_yield = new_yield;

            info!(base_amount, yield_amount, execution_price, "converted base to yield");
            env.emit(Event::ConvertedFromBase {
                base_amount,
                yield_amount,
                execution_price,
            });
            Ok(yield_amount)
        })
    }

    /// Retires `yield_amount` of vested yield against base the processor
    /// pays back at `execution_price`. Returns the base amount credited.
    pub fn convert_from_yield_asset(
        &mut self,
        env: &mut Env,
        caller: &Address,
        yield_amount: u128,
        execution_price: u128,
    ) -> Result<u128, VaultError> {
        self.guarded(|vault| {
            vault.access.require(Role::Processor, caller)?;
            vault.ensure_not_paused()?;
            if yield_amount == 0 || execution_price == 0 {
                return Err(VaultError::ZeroAmount);
            }
            let vested = vault.vested_yield_balance(env.now);
            if yield_amount > vested {
                return Err(EconomicError::ExceedsVestedBalance {
                    requested: yield_amount,
                    available: vested,
                }
                .into());
            }

            let oracle = env.price()?;
            let execution = Price::new(execution_price, oracle.decimals);
            settlement::check_execution_price(execution, oracle, vault.tolerance_bps)?;
            let base_amount = execution.yield_to_base(yield_amount, Rounding::Floor)?;
            if base_amount == 0 {
                return Err(VaultError::ZeroAmount);
            }
            settlement::check_execution_value(base_amount, yield_amount, oracle, vault.tolerance_bps)?;

            env.base.check_transfer(caller, &vault.address, base_amount)?;
            let new_base = math::checked_add(vault.tracked_base, base_amount)?;

            env.base.transfer(caller, &vault.address, base_amount)?;
            env.yield_token.burn(&vault.address, yield_amount)?;
            vault.tracked_yield -= yield_amount;
            vault.tracked_base = new_base;

            info!(yield_amount, base_amount, execution_price, "converted yield to base");
            env.emit(Event::ConvertedFromYield {
                yield_amount,
                base_amount,
                execution_price,
            });
            Ok(base_amount)
        })
    }

    /// Credits `amount` of yield asset as rewards and starts a new vesting
    /// schedule. Rejected while a previous schedule is still releasing.
    pub fn transfer_in_rewards(&mut self, env: &mut Env, caller: &Address, amount: u128) -> Result<(), VaultError> {
        self.guarded(|vault| {
            vault.access.require(Role::Processor, caller)?;
            vault.ensure_not_paused()?;
            if amount == 0 {
                return Err(VaultError::ZeroAmount);
            }
            let unvested = vault.unvested_amount(env.now);
            if unvested > 0 {
                return Err(EconomicError::StillVesting { unvested }.into());
            }
            let new_yield = math::checked_add(vault.tracked_yield, amount)?;

            env.yield_token.mint(&vault.address, &vault.address, amount)?;
            vault.tracked_yield = new_yield;
            vault.vesting = VestingSchedule::new(amount, env.now, vault.vesting_period);

            info!(amount, vesting_period = vault.vesting_period, "rewards received");
            env.emit(Event::RewardsReceived {
                amount,
                vesting_start: env.now,
                vesting_period: vault.vesting_period,
            });
            Ok(())
        })
    }

    // -- Queue callbacks ----------------------------------------------------

    /// Burns `shares` out of the queue's escrow and retires the
    /// `yield_amount` sold to fund them. Queue only.
    pub fn burn_queued_shares(&mut self, env: &mut Env, caller: &Address, shares: u128, yield_amount: u128) -> Result<(), VaultError> {
        access::require_caller(caller, &self.queue)?;
        self.guarded(|vault| {
            if shares == 0 {
                return Err(VaultError::ZeroAmount);
            }
            let vested = vault.vested_yield_balance(env.now);
            if yield_amount > vested {
                return Err(EconomicError::ExceedsVestedBalance {
                    requested: yield_amount,
                    available: vested,
                }
                .into());
            }

            vault.shares.burn(&vault.queue, shares)?;
            env.yield_token.burn(&vault.address, yield_amount)?;
            vault.tracked_yield -= yield_amount;

            debug!(shares, yield_amount, "queued shares burned");
            env.emit(Event::QueuedSharesBurned { shares, yield_amount });
            Ok(())
        })
    }

    /// Credits settlement dust the queue has already transferred in.
    /// Queue only.
    pub fn receive_settlement_dust(&mut self, env: &mut Env, caller: &Address, amount: u128) -> Result<(), VaultError> {
        self.guarded(|vault| {
            access::require_caller(caller, &vault.queue)?;
            if amount == 0 {
                return Ok(());
            }
            vault.tracked_base = math::checked_add(vault.tracked_base, amount)?;
            debug!(amount, "settlement dust returned");
            env.emit(Event::SettlementDustReturned { amount });
            Ok(())
        })
    }

    // -- Compliance ---------------------------------------------------------

    pub fn add_to_blacklist(&mut self, env: &mut Env, caller: &Address, who: &Address) -> Result<(), VaultError> {
        self.guarded(|vault| {
            vault.access.require(Role::Compliance, caller)?;
            if who.is_zero() {
                return Err(VaultError::ZeroAddress);
            }
            vault.blacklist.insert(who.clone());
            warn!(address = %who, "address blacklisted");
            env.emit(Event::BlacklistUpdated {
                address: who.clone(),
                blacklisted: true,
            });
            Ok(())
        })
    }

    pub fn remove_from_blacklist(&mut self, env: &mut Env, caller: &Address, who: &Address) -> Result<(), VaultError> {
        self.guarded(|vault| {
            vault.access.require(Role::Compliance, caller)?;
            if !vault.blacklist.remove(who) {
                return Err(VaultError::NotBlacklisted(who.clone()));
            }
            info!(address = %who, "address removed from blacklist");
            env.emit(Event::BlacklistUpdated {
                address: who.clone(),
                blacklisted: false,
            });
            Ok(())
        })
    }

    pub fn pause(&mut self, env: &mut Env, caller: &Address) -> Result<(), VaultError> {
        self.guarded(|vault| {
            vault.access.require(Role::Compliance, caller)?;
            vault.ensure_not_paused()?;
            vault.paused = true;
            warn!(by = %caller, "vault paused");
            env.emit(Event::PauseChanged {
                component: COMPONENT.to_string(),
                paused: true,
                by: caller.clone(),
            });
            Ok(())
        })
    }

    pub fn unpause(&mut self, env: &mut Env, caller: &Address) -> Result<(), VaultError> {
        self.guarded(|vault| {
            vault.access.require(Role::Admin, caller)?;
            if !vault.paused {
                return Err(VaultError::NotPaused(COMPONENT));
            }
            vault.paused = false;
            info!(by = %caller, "vault unpaused");
            env.emit(Event::PauseChanged {
                component: COMPONENT.to_string(),
                paused: false,
                by: caller.clone(),
            });
            Ok(())
        })
    }

    /// Moves (or burns, when `to` is `None`) every share a blacklisted
    /// holder owns. Returns the amount moved.
    pub fn redistribute_locked_shares(
        &mut self,
        env: &mut Env,
        caller: &Address,
        from: &Address,
        to: Option<&Address>,
    ) -> Result<u128, VaultError> {
        self.guarded(|vault| {
            vault.access.require(Role::Admin, caller)?;
            if !vault.is_blacklisted(from) {
                return Err(VaultError::NotBlacklisted(from.clone()));
            }
            if let Some(to) = to {
                if to.is_zero() {
                    return Err(VaultError::ZeroAddress);
                }
                vault.ensure_not_blacklisted(to)?;
            }
            let amount = vault.shares.balance_of(from);
            if amount == 0 {
                return Err(VaultError::ZeroAmount);
            }

            // Burn-and-remint bypasses the share ledger's transfer checks,
            // which a blacklisted source would otherwise fail.
            vault.shares.burn(from, amount)?;
            if let Some(to) = to {
                vault.shares.mint(&vault.address, to, amount)?;
            }

            warn!(%from, to = ?to, amount, "locked shares redistributed");
            env.emit(Event::LockedSharesRedistributed {
                from: from.clone(),
                to: to.cloned(),
                shares: amount,
            });
            Ok(amount)
        })
    }

    // -- Parameters ---------------------------------------------------------

    pub fn set_tolerance_bps(&mut self, env: &mut Env, caller: &Address, bps: u16) -> Result<(), VaultError> {
        self.guarded(|vault| {
            vault.access.require(Role::Admin, caller)?;
            config::validate_tolerance(bps)?;
            vault.tolerance_bps = bps;
            info!(tolerance_bps = bps, "tolerance updated");
            env.emit(parameter_changed("tolerance_bps", bps));
            Ok(())
        })
    }

    pub fn set_fee_recipient(&mut self, env: &mut Env, caller: &Address, recipient: &Address) -> Result<(), VaultError> {
        self.guarded(|vault| {
            vault.access.require(Role::Admin, caller)?;
            if recipient.is_zero() {
                return Err(VaultError::ZeroAddress);
            }
            vault.ensure_not_blacklisted(recipient)?;
            vault.fee_recipient = recipient.clone();
            info!(%recipient, "fee recipient updated");
            env.emit(parameter_changed("fee_recipient", recipient));
            Ok(())
        })
    }

    pub fn set_deposit_fee_bps(&mut self, env: &mut Env, caller: &Address, bps: u16) -> Result<(), VaultError> {
        self.guarded(|vault| {
            vault.access.require(Role::Processor, caller)?;
            config::validate_deposit_fee(bps)?;
            vault.deposit_fee_bps = bps;
            info!(deposit_fee_bps = bps, "deposit fee updated");
            env.emit(parameter_changed("deposit_fee_bps", bps));
            Ok(())
        })
    }

    /// Sets the period for the next reward schedule. A schedule already in
    /// flight keeps the period it started with.
    pub fn set_vesting_period(&mut self, env: &mut Env, caller: &Address, secs: u64) -> Result<(), VaultError> {
        self.guarded(|vault| {
            vault.access.require(Role::Processor, caller)?;
            config::validate_vesting_period(secs)?;
            vault.vesting_period = secs;
            info!(vesting_period = secs, "vesting period updated");
            env.emit(parameter_changed("vesting_period", secs));
            Ok(())
        })
    }

    pub fn grant_role(&mut self, env: &mut Env, caller: &Address, role: Role, who: &Address) -> Result<(), VaultError> {
        self.guarded(|vault| {
            vault.access.grant(caller, role, who.clone())?;
            env.emit(Event::RoleChanged {
                role,
                account: who.clone(),
                granted: true,
            });
            Ok(())
        })
    }

    pub fn revoke_role(&mut self, env: &mut Env, caller: &Address, role: Role, who: &Address) -> Result<(), VaultError> {
        self.guarded(|vault| {
            vault.access.revoke(caller, role, who)?;
            env.emit(Event::RoleChanged {
                role,
                account: who.clone(),
                granted: false,
            });
            Ok(())
        })
    }

    // -- Helpers ------------------------------------------------------------

    fn ensure_not_paused(&self) -> Result<(), VaultError> {
        if self.paused {
            Err(VaultError::Paused(COMPONENT))
        } else {
            Ok(())
        }
    }

    fn ensure_not_blacklisted(&self, who: &Address) -> Result<(), VaultError> {
        if self.is_blacklisted(who) {
            Err(VaultError::Blacklisted(who.clone()))
        } else {
            Ok(())
        }
    }

    /// Runs `f` with the reentrancy flag held.
    fn guarded<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T, VaultError>) -> Result<T, VaultError> {
        self.guard.enter(COMPONENT)?;
        let result = f(self);
        self.guard.exit();
        result
    }
}

fn parameter_changed(name: &str, value: impl ToString) -> Event {
    Event::ParameterChanged {
        name: name.to_string(),
        value: value.to_string(),
    }
}

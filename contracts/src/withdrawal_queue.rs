//! # Withdrawal Queue
//!
//! Asynchronous exit path for vault shareholders.
//!
//! 1. **Request**: the vault escrows the owner's shares here and a ticket
//!    is minted in `Requested`.
//! 2. **Lock**: the processor freezes a set of tickets before selling the
//!    matching yield position off-chain.
//! 3. **Process**: the processor reports the sale. The batch is validated
//!    (see [`crate::settlement`]), the escrowed shares are burned, and the
//!    proceeds are split pro rata across the tickets. Rounding dust goes
//!    back to the vault.
//! 4. **Claim**: the ticket owner (or the vault on their behalf) collects
//!    the allocation; the ticket is burned.
//!
//! Compliance may reassign pending tickets, or confiscate processed
//! proceeds, belonging to a blacklisted holder.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use yieldvault_protocol::access::{self, AccessControl, AccessError, Role};
use yieldvault_protocol::config::MAX_BATCH_SIZE;
use yieldvault_protocol::events::Event;
use yieldvault_protocol::guard::ReentrancyGuard;
use yieldvault_protocol::math;
use yieldvault_protocol::{Address, Price};

use crate::env::Env;
use crate::error::VaultError;
use crate::settlement::{self, Allocation, SettlementInputs, TicketShare};
use crate::ticket::{RequestStatus, TicketBook, WithdrawalRequest};
use crate::vault::Vault;

const COMPONENT: &str = "withdrawal_queue";

/// Outcome of a processed batch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementReport {
    pub request_ids: Vec<u64>,
    pub allocation: Allocation,
    pub total_proceeds: u128,
    pub total_yield_sold: u128,
    pub execution_price: u128,
}

// ---------------------------------------------------------------------------
// WithdrawalQueue
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WithdrawalQueue {
    address: Address,
    vault: Address,
    book: TicketBook,
    paused: bool,
    access: AccessControl,
    guard: ReentrancyGuard,
}

impl WithdrawalQueue {
    pub fn new(address: Address, vault: Address, admin: Address) -> Result<Self, VaultError> {
        if address.is_zero() || vault.is_zero() || admin.is_zero() {
            return Err(VaultError::ZeroAddress);
        }
        Ok(Self {
            address,
            vault,
            book: TicketBook::new(),
            paused: false,
            access: AccessControl::new(admin),
            guard: ReentrancyGuard::new(),
        })
    }

    // -- Queries ------------------------------------------------------------

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn vault_address(&self) -> &Address {
        &self.vault
    }

    pub fn book(&self) -> &TicketBook {
        &self.book
    }

    pub fn request(&self, id: u64) -> Option<&WithdrawalRequest> {
        self.book.get(id)
    }

    pub fn owner_of(&self, id: u64) -> Option<&Address> {
        self.book.owner_of(id)
    }

    pub fn tickets_of(&self, owner: &Address) -> Vec<u64> {
        self.book.tickets_of(owner)
    }

    pub fn pending_count(&self) -> u64 {
        self.book.pending_count()
    }

    pub fn next_request_id(&self) -> u64 {
        self.book.next_id()
    }

    /// Sum of proceeds `owner` could claim right now.
    pub fn claimable_amount(&self, owner: &Address) -> u128 {
        self.book
            .tickets_of(owner)
            .into_iter()
            .filter_map(|id| self.book.get(id))
            .filter(|r| r.status == RequestStatus::Processed)
            .map(|r| r.proceeds)
            .sum()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn access(&self) -> &AccessControl {
        &self.access
    }

    // -- Requests -----------------------------------------------------------

    /// Mints a ticket for shares the vault has escrowed. Vault only.
    pub fn create_request(
        &mut self,
        env: &mut Env,
        caller: &Address,
        owner: Address,
        shares: u128,
        min_base_received: u128,
    ) -> Result<u64, VaultError> {
        self.guarded(|queue| {
            access::require_caller(caller, &queue.vault)?;
            queue.ensure_not_paused()?;
            if shares == 0 {
                return Err(VaultError::ZeroAmount);
            }
            if owner.is_zero() {
                return Err(VaultError::ZeroAddress);
            }
            let id = queue.book.mint(owner.clone(), shares, min_base_received, env.now);
            env.emit(Event::RedeemRequested {
                request_id: id,
                owner,
                shares,
                min_base_received,
            });
            Ok(id)
        })
    }

    /// Changes the slippage floor of a live request. Once locked, the
    /// floor may only go down.
    pub fn update_min_base_received(
        &mut self,
        env: &mut Env,
        vault: &Vault,
        caller: &Address,
        request_id: u64,
        new_min: u128,
    ) -> Result<(), VaultError> {
        self.guarded(|queue| {
            queue.ensure_not_paused()?;
            let request = queue.owned_request(request_id, caller)?;
            if vault.is_blacklisted(caller) {
                return Err(VaultError::Blacklisted(caller.clone()));
            }
            let old = request.min_base_received;
            match request.status {
                RequestStatus::Requested => {}
                RequestStatus::Locked if new_min <= old => {}
                RequestStatus::Locked => return Err(VaultError::MinIncreaseWhileLocked { request_id }),
                actual => {
                    return Err(VaultError::InvalidRequestStatus {
                        request_id,
                        actual,
                        expected: "Requested or Locked",
                    })
                }
            }

            queue.book.set_min_base_received(request_id, new_min, env.now)?;
            debug!(request_id, old, new = new_min, "min base received updated");
            env.emit(Event::MinBaseReceivedUpdated {
                request_id,
                old,
                new: new_min,
            });
            Ok(())
        })
    }

    /// Hands a live ticket to `to`.
    pub fn transfer_ticket(
        &mut self,
        env: &mut Env,
        vault: &Vault,
        caller: &Address,
        request_id: u64,
        to: &Address,
    ) -> Result<(), VaultError> {
        self.guarded(|queue| {
            queue.ensure_not_paused()?;
            if to.is_zero() {
                return Err(VaultError::ZeroAddress);
            }
            queue.owned_request(request_id, caller)?;
            for party in [caller, to] {
                if vault.is_blacklisted(party) {
                    return Err(VaultError::Blacklisted(party.clone()));
                }
            }
            if caller == to {
                return Ok(());
            }

            queue.book.reassign(request_id, to.clone(), env.now)?;
            debug!(request_id, from = %caller, %to, "ticket transferred");
            env.emit(Event::TicketTransferred {
                request_id,
                from: caller.clone(),
                to: to.clone(),
            });
            Ok(())
        })
    }

    // -- Processor ----------------------------------------------------------

    /// Moves every listed ticket from `Requested` to `Locked`.
    pub fn lock_requests(&mut self, env: &mut Env, caller: &Address, request_ids: &[u64]) -> Result<(), VaultError> {
        self.transition_all(env, caller, request_ids, RequestStatus::Requested, RequestStatus::Locked)?;
        info!(count = request_ids.len(), "requests locked");
        Ok(())
    }

    /// Moves every listed ticket from `Locked` back to `Requested`.
    pub fn unlock_requests(&mut self, env: &mut Env, caller: &Address, request_ids: &[u64]) -> Result<(), VaultError> {
        self.transition_all(env, caller, request_ids, RequestStatus::Locked, RequestStatus::Requested)?;
        info!(count = request_ids.len(), "requests unlocked");
        Ok(())
    }

    fn transition_all(
        &mut self,
        env: &mut Env,
        caller: &Address,
        request_ids: &[u64],
        from: RequestStatus,
        to: RequestStatus,
    ) -> Result<(), VaultError> {
        self.guarded(|queue| {
            queue.access.require(Role::Processor, caller)?;
            queue.ensure_not_paused()?;
            validate_batch(request_ids)?;
            for &id in request_ids {
                queue.book.require(id)?.ensure_status(from)?;
            }
            for &id in request_ids {
                queue.book.set_status(id, to, env.now)?;
                env.emit(match to {
                    RequestStatus::Locked => Event::RequestLocked { request_id: id },
                    _ => Event::RequestUnlocked { request_id: id },
                });
            }
            Ok(())
        })
    }

    /// Settles a batch of locked tickets.
    ///
    /// The processor has sold `total_yield_sold` of yield asset at
    /// `execution_price` (oracle decimals) for `total_proceeds` of base,
    /// which it transfers in here. Any failed check aborts the batch with
    /// no ticket changed.
    #[allow(clippy::too_many_arguments)]
    pub fn process_requests(
        &mut self,
        env: &mut Env,
        vault: &mut Vault,
        caller: &Address,
        request_ids: &[u64],
        total_proceeds: u128,
        total_yield_sold: u128,
        execution_price: u128,
    ) -> Result<SettlementReport, VaultError> {
        self.access.require(Role::Processor, caller)?;
        self.ensure_not_paused()?;
        access::require_caller(vault.address(), &self.vault)?;
        validate_batch(request_ids)?;
        if total_proceeds == 0 || total_yield_sold == 0 || execution_price == 0 {
            return Err(VaultError::ZeroAmount);
        }

        self.guarded(|queue| {
            let mut tickets = Vec::with_capacity(request_ids.len());
            for &id in request_ids {
                let request = queue.book.require(id)?;
                request.ensure_status(RequestStatus::Locked)?;
                tickets.push(TicketShare {
                    id,
                    shares: request.shares,
                    min_base_received: request.min_base_received,
                });
            }
            let total_shares = tickets
                .iter()
                .try_fold(0u128, |acc, t| math::checked_add(acc, t.shares))?;

            let oracle = env.price()?;
            let inputs = SettlementInputs {
                total_proceeds,
                total_yield_sold,
                execution_price: Price::new(execution_price, oracle.decimals),
                oracle_price: oracle,
                vested_yield: vault.vested_yield_balance(env.now),
                share_value: vault.convert_to_assets(env, total_shares)?,
                tolerance_bps: vault.tolerance_bps(),
            };
            settlement::validate_settlement(&inputs)?;
            let allocation = settlement::allocate_pro_rata(total_proceeds, &tickets)?;

            env.base.check_transfer(caller, &queue.address, total_proceeds)?;
            if allocation.dust > 0 {
                env.base.check_transfer(&queue.address, vault.address(), 0)?;
            }

            vault.burn_queued_shares(env, &queue.address, allocation.total_shares, total_yield_sold)?;
            env.base.transfer(caller, &queue.address, total_proceeds)?;
            for (ticket, &amount) in tickets.iter().zip(&allocation.amounts) {
                queue.book.set_proceeds(ticket.id, amount)?;
                queue.book.set_status(ticket.id, RequestStatus::Processed, env.now)?;
                env.emit(Event::RequestProcessed {
                    request_id: ticket.id,
                    proceeds: amount,
                });
            }
            if allocation.dust > 0 {
                env.base.transfer(&queue.address, vault.address(), allocation.dust)?;
                vault.receive_settlement_dust(env, &queue.address, allocation.dust)?;
            }

            info!(
                count = request_ids.len(),
                total_shares = allocation.total_shares,
                total_proceeds,
                total_yield_sold,
                execution_price,
                dust = allocation.dust,
                "batch processed"
            );
            env.emit(Event::BatchProcessed {
                request_ids: request_ids.to_vec(),
                total_shares: allocation.total_shares,
                total_proceeds,
                total_yield_sold,
                execution_price,
                dust: allocation.dust,
            });

            Ok(SettlementReport {
                request_ids: request_ids.to_vec(),
                allocation,
                total_proceeds,
                total_yield_sold,
                execution_price,
            })
        })
    }

    // -- Claims -------------------------------------------------------------

    /// Claims a single processed ticket held by `caller`.
    pub fn claim(&mut self, env: &mut Env, vault: &Vault, caller: &Address, request_id: u64) -> Result<u128, VaultError> {
        self.claim_many(env, vault, caller, &[request_id])
    }

    /// Claims several processed tickets held by `caller`.
    pub fn claim_batch(&mut self, env: &mut Env, vault: &Vault, caller: &Address, request_ids: &[u64]) -> Result<u128, VaultError> {
        validate_batch(request_ids)?;
        self.claim_many(env, vault, caller, request_ids)
    }

    /// Claims every processed ticket `owner` holds. `caller` must be the
    /// owner or the vault.
    pub fn claim_all_for(&mut self, env: &mut Env, vault: &Vault, caller: &Address, owner: &Address) -> Result<u128, VaultError> {
        self.ensure_owner_or_vault(caller, owner)?;
        let ids: Vec<u64> = self
            .book
            .tickets_of(owner)
            .into_iter()
            .filter(|id| {
                self.book
                    .get(*id)
                    .map(|r| r.status == RequestStatus::Processed)
                    .unwrap_or(false)
            })
            .collect();
        if ids.is_empty() {
            return Ok(0);
        }
        self.claim_many(env, vault, owner, &ids)
    }

    /// Claims the listed tickets for `owner`. `caller` must be the owner
    /// or the vault.
    pub fn claim_batch_for(
        &mut self,
        env: &mut Env,
        vault: &Vault,
        caller: &Address,
        owner: &Address,
        request_ids: &[u64],
    ) -> Result<u128, VaultError> {
        self.ensure_owner_or_vault(caller, owner)?;
        validate_batch(request_ids)?;
        self.claim_many(env, vault, owner, request_ids)
    }

    fn claim_many(&mut self, env: &mut Env, vault: &Vault, owner: &Address, request_ids: &[u64]) -> Result<u128, VaultError> {
        self.ensure_not_paused()?;
        self.guarded(|queue| {
            let mut total = 0u128;
            for &id in request_ids {
                let request = queue.owned_request(id, owner)?;
                request.ensure_status(RequestStatus::Processed)?;
                total = math::checked_add(total, request.proceeds)?;
            }
            if vault.is_blacklisted(owner) || env.base.is_blacklisted(owner) {
                warn!(%owner, "claim by blacklisted owner rejected");
                return Err(VaultError::Blacklisted(owner.clone()));
            }

            env.base.transfer(&queue.address, owner, total)?;
            for &id in request_ids {
                let amount = queue.book.require(id)?.proceeds;
                queue.book.set_status(id, RequestStatus::Claimed, env.now)?;
                env.emit(Event::RequestClaimed {
                    request_id: id,
                    owner: owner.clone(),
                    amount,
                });
            }
            info!(%owner, count = request_ids.len(), amount = total, "withdrawals claimed");
            Ok(total)
        })
    }

    // -- Compliance ---------------------------------------------------------

    /// Reassigns pending tickets of a blacklisted holder to `to`.
    pub fn seize_requests(
        &mut self,
        env: &mut Env,
        vault: &Vault,
        caller: &Address,
        request_ids: &[u64],
        from: &Address,
        to: &Address,
    ) -> Result<(), VaultError> {
        self.guarded(|queue| {
            queue.access.require(Role::Compliance, caller)?;
            validate_batch(request_ids)?;
            ensure_seizable(env, vault, from, to)?;
            for &id in request_ids {
                let request = queue.owned_request(id, from)?;
                if !request.status.is_pending() {
                    return Err(VaultError::InvalidRequestStatus {
                        request_id: id,
                        actual: request.status,
                        expected: "Requested or Locked",
                    });
                }
            }

            for &id in request_ids {
                queue.book.reassign(id, to.clone(), env.now)?;
                env.emit(Event::RequestSeized {
                    request_id: id,
                    from: from.clone(),
                    to: to.clone(),
                });
            }
            warn!(%from, %to, count = request_ids.len(), "requests seized");
            Ok(())
        })
    }

    /// Pays the proceeds of a blacklisted holder's processed tickets to
    /// `to` and burns the tickets.
    pub fn seize_blacklisted_funds(
        &mut self,
        env: &mut Env,
        vault: &Vault,
        caller: &Address,
        request_ids: &[u64],
        from: &Address,
        to: &Address,
    ) -> Result<u128, VaultError> {
        self.access.require(Role::Compliance, caller)?;
        validate_batch(request_ids)?;
        ensure_seizable(env, vault, from, to)?;

        self.guarded(|queue| {
            let mut total = 0u128;
            for &id in request_ids {
                let request = queue.owned_request(id, from)?;
                request.ensure_status(RequestStatus::Processed)?;
                total = math::checked_add(total, request.proceeds)?;
            }

            env.base.transfer(&queue.address, to, total)?;
            for &id in request_ids {
                let amount = queue.book.require(id)?.proceeds;
                queue.book.set_status(id, RequestStatus::Seized, env.now)?;
                env.emit(Event::ProceedsSeized {
                    request_id: id,
                    from: from.clone(),
                    to: to.clone(),
                    amount,
                });
            }
            warn!(%from, %to, amount = total, "blacklisted proceeds seized");
            Ok(total)
        })
    }

    pub fn pause(&mut self, env: &mut Env, caller: &Address) -> Result<(), VaultError> {
        self.guarded(|queue| {
            queue.access.require(Role::Compliance, caller)?;
            queue.ensure_not_paused()?;
            queue.paused = true;
            warn!(by = %caller, "withdrawal queue paused");
            env.emit(Event::PauseChanged {
                component: COMPONENT.to_string(),
                paused: true,
                by: caller.clone(),
            });
            Ok(())
        })
    }

    pub fn unpause(&mut self, env: &mut Env, caller: &Address) -> Result<(), VaultError> {
        self.guarded(|queue| {
            queue.access.require(Role::Admin, caller)?;
            if !queue.paused {
                return Err(VaultError::NotPaused(COMPONENT));
            }
            queue.paused = false;
            info!(by = %caller, "withdrawal queue unpaused");
            env.emit(Event::PauseChanged {
                component: COMPONENT.to_string(),
                paused: false,
                by: caller.clone(),
            });
            Ok(())
        })
    }

    pub fn grant_role(&mut self, env: &mut Env, caller: &Address, role: Role, who: &Address) -> Result<(), VaultError> {
        self.guarded(|queue| {
            queue.access.grant(caller, role, who.clone())?;
            env.emit(Event::RoleChanged {
                role,
                account: who.clone(),
                granted: true,
            });
            Ok(())
        })
    }

    pub fn revoke_role(&mut self, env: &mut Env, caller: &Address, role: Role, who: &Address) -> Result<(), VaultError> {
        self.guarded(|queue| {
            queue.access.revoke(caller, role, who)?;
            env.emit(Event::RoleChanged {
                role,
                account: who.clone(),
                granted: false,
            });
            Ok(())
        })
    }

    // -- Helpers ------------------------------------------------------------

    /// The request if `who` currently holds it.
    fn owned_request(&self, request_id: u64, who: &Address) -> Result<&WithdrawalRequest, VaultError> {
        let request = self.book.require(request_id)?;
        if self.book.owner_of(request_id) != Some(who) {
            return Err(VaultError::NotRequestOwner {
                request_id,
                caller: who.clone(),
            });
        }
        Ok(request)
    }

    fn ensure_owner_or_vault(&self, caller: &Address, owner: &Address) -> Result<(), VaultError> {
        if caller == owner || caller == &self.vault {
            Ok(())
        } else {
            Err(AccessError::UnauthorizedCaller {
                caller: caller.clone(),
                expected: owner.clone(),
            }
            .into())
        }
    }

    fn ensure_not_paused(&self) -> Result<(), VaultError> {
        if self.paused {
            Err(VaultError::Paused(COMPONENT))
        } else {
            Ok(())
        }
    }

    fn guarded<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T, VaultError>) -> Result<T, VaultError> {
        self.guard.enter(COMPONENT)?;
        let result = f(self);
        self.guard.exit();
        result
    }
}

/// Rejects empty, oversized or duplicated id lists.
fn validate_batch(request_ids: &[u64]) -> Result<(), VaultError> {
    if request_ids.is_empty() {
        return Err(VaultError::EmptyBatch);
    }
    if request_ids.len() > MAX_BATCH_SIZE {
        return Err(VaultError::BatchTooLarge {
            len: request_ids.len(),
            max: MAX_BATCH_SIZE,
        });
    }
    let mut seen = BTreeSet::new();
    for &id in request_ids {
        if !seen.insert(id) {
            return Err(VaultError::DuplicateRequest(id));
        }
    }
    Ok(())
}

/// `from` must be blacklisted by the vault or the base asset; `to` must be
/// a clean, non-empty address.
fn ensure_seizable(env: &Env, vault: &Vault, from: &Address, to: &Address) -> Result<(), VaultError> {
    if !vault.is_blacklisted(from) && !env.base.is_blacklisted(from) {
        return Err(VaultError::NotBlacklisted(from.clone()));
    }
    if to.is_zero() {
        return Err(VaultError::ZeroAddress);
    }
    if vault.is_blacklisted(to) || env.base.is_blacklisted(to) {
        return Err(VaultError::Blacklisted(to.clone()));
    }
    Ok(())
}

//! # Withdrawal Tickets
//!
//! Each redemption request is a transferable ticket with a unique id that
//! is never reused. A ticket moves through:
//!
//! ```text
//!            lock            process            claim
//! Requested ------> Locked ----------> Processed ------> Claimed
//!     ^               |                    |
//!     +---- unlock ---+                    +-- seize --> Seized
//! ```
//!
//! `Claimed` and `Seized` are terminal: the ticket is burned, it drops out
//! of its owner's index and [`TicketBook::owner_of`] returns `None`. The
//! record itself is kept for auditing.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use yieldvault_protocol::Address;

use crate::error::VaultError;

// ---------------------------------------------------------------------------
// RequestStatus
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestStatus {
    /// Awaiting processor action; owner may still tweak it.
    Requested,
    /// Selected for an in-flight batch sale.
    Locked,
    /// Proceeds allocated and held by the queue.
    Processed,
    /// Proceeds paid to the owner. Terminal.
    Claimed,
    /// Proceeds confiscated by compliance. Terminal.
    Seized,
}

impl RequestStatus {
    /// Still waiting for settlement.
    pub fn is_pending(self) -> bool {
        matches!(self, RequestStatus::Requested | RequestStatus::Locked)
    }

    /// The ticket has been burned.
    pub fn is_terminal(self) -> bool {
        matches!(self, RequestStatus::Claimed | RequestStatus::Seized)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(status_name(*self))
    }
}

// ---------------------------------------------------------------------------
// WithdrawalRequest
// ---------------------------------------------------------------------------

/// A single redemption request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    pub id: u64,
    /// Current holder of the ticket (last holder once burned).
    pub owner: Address,
    /// Vault shares escrowed by the queue for this request.
    pub shares: u128,
    /// Slippage floor on the base-asset allocation.
    pub min_base_received: u128,
    /// Base-asset allocation; zero until processed.
    pub proceeds: u128,
    pub status: RequestStatus,
    pub created_at: u64,
    pub updated_at: u64,
}

impl WithdrawalRequest {
    /// Fails unless the request is currently in `expected`.
    pub fn ensure_status(&self, expected: RequestStatus) -> Result<(), VaultError> {
        if self.status == expected {
            Ok(())
        } else {
            Err(VaultError::InvalidRequestStatus {
                request_id: self.id,
                actual: self.status,
                expected: status_name(expected),
            })
        }
    }
}

fn status_name(status: RequestStatus) -> &'static str {
    match status {
        RequestStatus::Requested => "Requested",
        RequestStatus::Locked => "Locked",
        RequestStatus::Processed => "Processed",
        RequestStatus::Claimed => "Claimed",
        RequestStatus::Seized => "Seized",
    }
}

// ---------------------------------------------------------------------------
// TicketBook
// ---------------------------------------------------------------------------

/// Request records plus an owner → live ticket index.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TicketBook {
    requests: BTreeMap<u64, WithdrawalRequest>,
    owners: BTreeMap<Address, BTreeSet<u64>>,
    next_id: u64,
    pending: u64,
}

impl Default for TicketBook {
    fn default() -> Self {
        Self {
            requests: BTreeMap::new(),
            owners: BTreeMap::new(),
            next_id: 1,
            pending: 0,
        }
    }
}

impl TicketBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues a new ticket in `Requested` and returns its id.
    pub fn mint(&mut self, owner: Address, shares: u128, min_base_received: u128, now: u64) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.owners.entry(owner.clone()).or_default().insert(id);
        self.requests.insert(
            id,
            WithdrawalRequest {
                id,
                owner,
                shares,
                min_base_received,
                proceeds: 0,
                status: RequestStatus::Requested,
                created_at: now,
                updated_at: now,
            },
        );
        self.pending += 1;
        id
    }

    pub fn get(&self, id: u64) -> Option<&WithdrawalRequest> {
        self.requests.get(&id)
    }

    /// Like [`get`](Self::get) but maps a miss to [`VaultError::UnknownRequest`].
    pub fn require(&self, id: u64) -> Result<&WithdrawalRequest, VaultError> {
        self.requests.get(&id).ok_or(VaultError::UnknownRequest(id))
    }

    /// Live owner of a ticket; `None` if it never existed or was burned.
    pub fn owner_of(&self, id: u64) -> Option<&Address> {
        self.requests
            .get(&id)
            .filter(|r| !r.status.is_terminal())
            .map(|r| &r.owner)
    }

    /// Live ticket ids held by `owner`, ascending.
    pub fn tickets_of(&self, owner: &Address) -> Vec<u64> {
        self.owners
            .get(owner)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Requests in `Requested` or `Locked`.
    pub fn pending_count(&self) -> u64 {
        self.pending
    }

    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &WithdrawalRequest> {
        self.requests.values()
    }

    /// Moves a live ticket to a new status, keeping the pending counter
    /// and the owner index in step. Burning statuses drop the ticket
    /// from the index.
    pub(crate) fn set_status(&mut self, id: u64, status: RequestStatus, now: u64) -> Result<(), VaultError> {
        let request = self
            .requests
            .get_mut(&id)
            .ok_or(VaultError::UnknownRequest(id))?;
        let was_pending = request.status.is_pending();
        request.status = status;
        request.updated_at = now;
        let owner = request.owner.clone();

        match (was_pending, status.is_pending()) {
            (true, false) => self.pending -= 1,
            (false, true) => self.pending += 1,
            _ => {}
        }
        if status.is_terminal() {
            self.unindex(&owner, id);
        }
        Ok(())
    }

    pub(crate) fn set_proceeds(&mut self, id: u64, proceeds: u128) -> Result<(), VaultError> {
        let request = self
            .requests
            .get_mut(&id)
            .ok_or(VaultError::UnknownRequest(id))?;
        request.proceeds = proceeds;
        Ok(())
    }

    pub(crate) fn set_min_base_received(&mut self, id: u64, min: u128, now: u64) -> Result<(), VaultError> {
        let request = self
            .requests
            .get_mut(&id)
            .ok_or(VaultError::UnknownRequest(id))?;
        request.min_base_received = min;
        request.updated_at = now;
        Ok(())
    }

    /// Reassigns a live ticket to `to`.
    pub(crate) fn reassign(&mut self, id: u64, to: Address, now: u64) -> Result<(), VaultError> {
        let request = self
            .requests
            .get_mut(&id)
            .ok_or(VaultError::UnknownRequest(id))?;
        let from = std::mem::replace(&mut request.owner, to.clone());
        request.updated_at = now;
        self.unindex(&from, id);
        self.owners.entry(to).or_default().insert(id);
        Ok(())
    }

    fn unindex(&mut self, owner: &Address, id: u64) {
        if let Some(ids) = self.owners.get_mut(owner) {
            ids.remove(&id);
            if ids.is_empty() {
                self.owners.remove(owner);
            }
        }
    }
}

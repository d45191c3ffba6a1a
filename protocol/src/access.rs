//! # Role-Based Access Control
//!
//! Each component keeps an explicit role → members map and checks it at the
//! top of every privileged entry point. There is no inheritance; an entry
//! point names the single [`Role`] it needs and calls
//! [`AccessControl::require`].
//!
//! | Role         | Grants                                                         |
//! |--------------|----------------------------------------------------------------|
//! | `Admin`      | unpause, tolerance, fee recipient, redistribution, role admin |
//! | `Processor`  | conversions, rewards, lock/unlock/process, fee & vesting tuning |
//! | `Compliance` | blacklist, seizure, pause                                      |

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::address::Address;

/// Capability a caller must hold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    Admin,
    Processor,
    Compliance,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Admin => write!(f, "ADMIN"),
            Role::Processor => write!(f, "PROCESSOR"),
            Role::Compliance => write!(f, "COMPLIANCE"),
        }
    }
}

/// Access-control failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AccessError {
    /// The caller lacks the role the entry point requires.
    #[error("{caller} is missing role {role}")]
    MissingRole { caller: Address, role: Role },

    /// The caller is not the specific component allowed to call here.
    #[error("{caller} is not the authorized caller {expected}")]
    UnauthorizedCaller { caller: Address, expected: Address },

    /// Revoking would leave no admin at all.
    #[error("cannot revoke the last admin")]
    LastAdmin,
}

/// Role membership for one component.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AccessControl {
    members: BTreeMap<Role, BTreeSet<Address>>,
}

impl AccessControl {
    /// Creates a registry with a single initial admin.
    pub fn new(admin: Address) -> Self {
        let mut acl = Self::default();
        acl.members.entry(Role::Admin).or_default().insert(admin);
        acl
    }

    /// Returns `true` if `who` holds `role`.
    pub fn has_role(&self, role: Role, who: &Address) -> bool {
        self.members
            .get(&role)
            .map(|set| set.contains(who))
            .unwrap_or(false)
    }

    /// Fails with [`AccessError::MissingRole`] unless `caller` holds `role`.
    pub fn require(&self, role: Role, caller: &Address) -> Result<(), AccessError> {
        if self.has_role(role, caller) {
            Ok(())
        } else {
            tracing::warn!(%caller, %role, "privileged call rejected");
            Err(AccessError::MissingRole {
                caller: caller.clone(),
                role,
            })
        }
    }

    /// Grants `role` to `who`. Admin only.
    pub fn grant(&mut self, caller: &Address, role: Role, who: Address) -> Result<(), AccessError> {
        self.require(Role::Admin, caller)?;
        tracing::info!(%who, %role, "role granted");
        self.members.entry(role).or_default().insert(who);
        Ok(())
    }

    /// Revokes `role` from `who`. Admin only; the last admin stays.
    pub fn revoke(&mut self, caller: &Address, role: Role, who: &Address) -> Result<(), AccessError> {
        self.require(Role::Admin, caller)?;
        if role == Role::Admin && self.has_role(Role::Admin, who) && self.members_of(Role::Admin).len() == 1 {
            return Err(AccessError::LastAdmin);
        }
        if let Some(set) = self.members.get_mut(&role) {
            set.remove(who);
        }
        tracing::info!(%who, %role, "role revoked");
        Ok(())
    }

    /// Current holders of `role`.
    pub fn members_of(&self, role: Role) -> Vec<Address> {
        self.members
            .get(&role)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }
}

/// Fails unless `caller` is exactly `expected`. Used for the narrow
/// vault ↔ queue callbacks, which are gated on component identity rather
/// than on a role.
pub fn require_caller(caller: &Address, expected: &Address) -> Result<(), AccessError> {
    if caller == expected {
        Ok(())
    } else {
        tracing::warn!(%caller, %expected, "component callback from unexpected caller");
        Err(AccessError::UnauthorizedCaller {
            caller: caller.clone(),
            expected: expected.clone(),
        })
    }
}

//! # Account Addresses
//!
//! Every participant in the ledger (users, processors, the vault itself,
//! the withdrawal queue) is identified by an [`Address`]. Components are
//! independently addressable services, so the vault and the queue each
//! have an address of their own and use it as caller identity when they
//! call into one another.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque account identifier.
///
/// Serialized as a bare string so JSON snapshots stay readable.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    /// Wraps a string identifier as an address.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the underlying identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if this is the empty address, which is never a valid
    /// recipient.
    pub fn is_zero(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Address {
    fn from(s: String) -> Self {
        Self(s)
    }
}

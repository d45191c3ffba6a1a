//! # yieldvault Contracts
//!
//! Ledger logic for a yield-bearing vault with an asynchronous exit queue.
//!
//! - **Vault**: share accounting over a stable base asset, processor-driven
//!   conversion into an off-chain yield position, linear reward vesting,
//!   deposit fees, and a compliance blacklist.
//! - **Withdrawal Queue**: transferable redemption tickets that are locked,
//!   settled in batches against a reported sale, and claimed pro rata.
//! - **Vault System**: the host that wires both to the token ledgers and the
//!   price oracle and makes every call all-or-nothing.
//!
//! ## Design Principles
//!
//! 1. Internal accounting only. Balances the vault did not book itself
//!    never move its exchange rate.
//! 2. Every processor report is checked against the oracle before a single
//!    unit moves.
//! 3. Rounding favours the pool; the remainder is dust and returns to the
//!    vault.
//! 4. Every public type is serializable (serde) for snapshots and the RPC
//!    surface.

pub mod env;
pub mod error;
pub mod fees;
pub mod settlement;
pub mod system;
pub mod ticket;
pub mod vault;
pub mod vesting;
pub mod withdrawal_queue;

pub use env::Env;
pub use error::{EconomicError, ErrorKind, VaultError};
pub use system::{SystemConfig, SystemState, VaultSystem};
pub use ticket::{RequestStatus, WithdrawalRequest};
pub use vault::Vault;
pub use withdrawal_queue::{SettlementReport, WithdrawalQueue};

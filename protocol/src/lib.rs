// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # yieldvault Protocol: Shared Primitives
//!
//! The building blocks the vault ledger and the withdrawal queue are made
//! of. Nothing in here knows about shares, tickets or settlement; it only
//! knows how to count money safely and who is allowed to move it.
//!
//! ## Architecture
//!
//! - **address**: Opaque account identifiers.
//! - **config**: Protocol constants and the tunable [`config::VaultParams`].
//! - **math**: 256-bit `mul_div` with explicit rounding direction.
//! - **tolerance**: Symmetric basis-point tolerance bands.
//! - **oracle**: Staleness- and bounds-checked price feed wrapper.
//! - **token**: Minimal fungible ledger with a minter and a blacklist.
//! - **access**: Role to members map checked per entry point.
//! - **clock**: Injectable time source.
//! - **events**: Hash-chained audit event log.
//! - **guard**: Reentrancy guard.
//!
//! ## Design Philosophy
//!
//! 1. No floating point. Ever. Amounts are `u128` at 18 decimals.
//! 2. Every division states which way it rounds.
//! 3. Every fallible operation returns a typed error; nothing panics on
//!    user input.

pub mod access;
pub mod address;
pub mod clock;
pub mod config;
pub mod events;
pub mod guard;
pub mod math;
pub mod oracle;
pub mod token;
pub mod tolerance;

pub use access::{AccessControl, AccessError, Role};
pub use address::Address;
pub use events::{Event, EventLog};
pub use oracle::{ManualPriceSource, Price, PriceOracle, PriceSource};
pub use token::{TokenError, TokenLedger};

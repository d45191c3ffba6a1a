//! # Error Taxonomy
//!
//! Every entry point of the vault and the withdrawal queue returns
//! [`VaultError`]. Each variant belongs to exactly one [`ErrorKind`]:
//!
//! | Kind                        | Examples                                          |
//! |-----------------------------|---------------------------------------------------|
//! | `PreconditionViolation`     | zero amount, empty or duplicated batch            |
//! | `AuthorizationFailure`      | missing role, wrong component caller, blacklisted |
//! | `StateConflict`             | ticket in the wrong status, paused component      |
//! | `EconomicValidationFailure` | slippage floor, tolerance breach, still vesting   |
//! | `ExternalDependencyFailure` | price feed unset, stale, out of bounds            |
//!
//! A failed call never leaves partial state behind, so every kind means the
//! same thing to a caller: fix the inputs (or wait) and resubmit.

use std::fmt;

use thiserror::Error;
use yieldvault_protocol::access::AccessError;
use yieldvault_protocol::config::ConfigError;
use yieldvault_protocol::guard::ReentrancyError;
use yieldvault_protocol::math::MathError;
use yieldvault_protocol::oracle::OracleError;
use yieldvault_protocol::token::TokenError;
use yieldvault_protocol::Address;

use crate::ticket::RequestStatus;

/// Coarse classification of a failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    PreconditionViolation,
    AuthorizationFailure,
    StateConflict,
    EconomicValidationFailure,
    ExternalDependencyFailure,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::PreconditionViolation => "precondition_violation",
            ErrorKind::AuthorizationFailure => "authorization_failure",
            ErrorKind::StateConflict => "state_conflict",
            ErrorKind::EconomicValidationFailure => "economic_validation_failure",
            ErrorKind::ExternalDependencyFailure => "external_dependency_failure",
        };
        f.write_str(s)
    }
}

/// Typed reasons for economic rejections.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EconomicError {
    /// A ticket's pro-rata allocation fell below its floor. Fails the batch.
    #[error("request {request_id} allocation {allocation} below minimum {min_base_received}")]
    SlippageExceeded {
        request_id: u64,
        allocation: u128,
        min_base_received: u128,
    },

    /// The execution price strays too far from the oracle.
    #[error("execution price {execution_price} outside {tolerance_bps} bps of oracle price {oracle_price}")]
    OraclePriceMismatch {
        execution_price: u128,
        oracle_price: u128,
        tolerance_bps: u16,
    },

    /// Reported proceeds do not match the amount sold at the execution price.
    #[error("value {actual} outside {tolerance_bps} bps of {expected} implied by the execution price")]
    ExecutionValueMismatch {
        actual: u128,
        expected: u128,
        tolerance_bps: u16,
    },

    /// Reported proceeds do not match what the redeemed shares are worth.
    #[error("proceeds {proceeds} outside {tolerance_bps} bps of share value {expected}")]
    ShareValueMismatch {
        proceeds: u128,
        expected: u128,
        tolerance_bps: u16,
    },

    /// More yield asset sold than has vested.
    #[error("yield amount {requested} exceeds vested balance {available}")]
    ExceedsVestedBalance { requested: u128, available: u128 },

    /// A reward schedule is still releasing value.
    #[error("rewards still vesting: {unvested} unvested")]
    StillVesting { unvested: u128 },

    /// Rounding produced allocations larger than the proceeds.
    #[error("allocations {allocated} exceed proceeds {total}")]
    OverAllocation { allocated: u128, total: u128 },

    /// A conversion asks for more base than the vault tracks.
    #[error("base amount {requested} exceeds tracked base {available}")]
    InsufficientTrackedBase { requested: u128, available: u128 },

    /// A deposit too small to mint a single share.
    #[error("deposit of {assets} mints zero shares")]
    ZeroShares { assets: u128 },
}

/// Every failure the core can report.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VaultError {
    // -- Preconditions ------------------------------------------------------
    #[error("amount must be non-zero")]
    ZeroAmount,

    #[error("request batch is empty")]
    EmptyBatch,

    #[error("request batch of {len} exceeds maximum {max}")]
    BatchTooLarge { len: usize, max: usize },

    #[error("request {0} appears more than once in batch")]
    DuplicateRequest(u64),

    #[error("request {0} does not exist")]
    UnknownRequest(u64),

    #[error("address must not be empty")]
    ZeroAddress,

    #[error("invalid parameter: {0}")]
    InvalidParameter(#[from] ConfigError),

    #[error("arithmetic: {0}")]
    Math(#[from] MathError),

    #[error("token: {0}")]
    Token(#[from] TokenError),

    // -- Authorization ------------------------------------------------------
    #[error("access: {0}")]
    Access(#[from] AccessError),

    #[error("{0} is blacklisted")]
    Blacklisted(Address),

    #[error("{caller} does not own request {request_id}")]
    NotRequestOwner { request_id: u64, caller: Address },

    #[error("synchronous withdraw and redeem are disabled; use request_redeem")]
    SynchronousExitDisabled,

    #[error(transparent)]
    Reentrancy(#[from] ReentrancyError),

    // -- State conflicts ----------------------------------------------------
    #[error("request {request_id} is {actual}, expected {expected}")]
    InvalidRequestStatus {
        request_id: u64,
        actual: RequestStatus,
        expected: &'static str,
    },

    #[error("request {request_id} is locked; its minimum may only be lowered")]
    MinIncreaseWhileLocked { request_id: u64 },

    #[error("{0} is not blacklisted")]
    NotBlacklisted(Address),

    #[error("{0} is paused")]
    Paused(&'static str),

    #[error("{0} is not paused")]
    NotPaused(&'static str),

    // -- Economic -----------------------------------------------------------
    #[error("economic validation failed: {0}")]
    Economic(#[from] EconomicError),

    // -- External -----------------------------------------------------------
    #[error("price feed: {0}")]
    Oracle(#[from] OracleError),
}

impl VaultError {
    /// Classifies the error into the five-kind taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            VaultError::ZeroAmount
            | VaultError::EmptyBatch
            | VaultError::BatchTooLarge { .. }
            | VaultError::DuplicateRequest(_)
            | VaultError::UnknownRequest(_)
            | VaultError::ZeroAddress
            | VaultError::InvalidParameter(_)
            | VaultError::Math(_) => ErrorKind::PreconditionViolation,

            VaultError::Token(TokenError::UnauthorizedMint { .. })
            | VaultError::Token(TokenError::Blacklisted { .. }) => ErrorKind::AuthorizationFailure,
            VaultError::Token(_) => ErrorKind::PreconditionViolation,

            VaultError::Access(_)
            | VaultError::Blacklisted(_)
            | VaultError::NotRequestOwner { .. }
            | VaultError::SynchronousExitDisabled
            | VaultError::Reentrancy(_) => ErrorKind::AuthorizationFailure,

            VaultError::InvalidRequestStatus { .. }
            | VaultError::MinIncreaseWhileLocked { .. }
            | VaultError::NotBlacklisted(_)
            | VaultError::Paused(_)
            | VaultError::NotPaused(_) => ErrorKind::StateConflict,

            VaultError::Economic(_) => ErrorKind::EconomicValidationFailure,

            VaultError::Oracle(_) => ErrorKind::ExternalDependencyFailure,
        }
    }
}

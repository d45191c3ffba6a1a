//! # Fixed-Point Arithmetic
//!
//! All vault amounts are `u128` values at 18 decimals. Products of two such
//! values overflow `u128` long before realistic balances do, so every
//! `a * b / c` goes through a 256-bit intermediate and the caller picks the
//! rounding direction explicitly.
//!
//! Rounding rules used across the ledger:
//!
//! - **Floor** for anything owed *to* a user (shares minted on deposit,
//!   assets paid on redemption, pro-rata allocations).
//! - **Ceil** for anything owed *to* the protocol (fees, unvested holdback,
//!   assets required to mint a given number of shares).

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uint::construct_uint;

use crate::config::BPS_DENOMINATOR;

construct_uint! {
    /// 256-bit unsigned integer used for intermediate products.
    pub struct U256(4);
}

/// Errors from fixed-point helpers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MathError {
    /// Division by zero in a `mul_div`.
    #[error("division by zero")]
    DivisionByZero,

    /// The result does not fit in `u128`.
    #[error("arithmetic overflow")]
    Overflow,

    /// A subtraction would go negative.
    #[error("arithmetic underflow: {lhs} - {rhs}")]
    Underflow { lhs: u128, rhs: u128 },
}

/// Direction to round a quotient that is not exact.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rounding {
    /// Toward zero.
    Floor,
    /// Away from zero.
    Ceil,
}

/// Computes `a * b / c` with a 256-bit intermediate.
pub fn mul_div(a: u128, b: u128, c: u128, rounding: Rounding) -> Result<u128, MathError> {
    if c == 0 {
        return Err(MathError::DivisionByZero);
    }

    let product = U256::from(a) * U256::from(b);
    let divisor = U256::from(c);
    let (mut quotient, remainder) = product.div_mod(divisor);

    if rounding == Rounding::Ceil && !remainder.is_zero() {
        quotient += U256::one();
    }

    if quotient > U256::from(u128::MAX) {
        return Err(MathError::Overflow);
    }
    Ok(quotient.as_u128())
}

/// Applies a basis-point rate: `amount * bps / 10_000`.
pub fn apply_bps(amount: u128, bps: u16, rounding: Rounding) -> Result<u128, MathError> {
    mul_div(amount, bps as u128, BPS_DENOMINATOR, rounding)
}

/// Checked addition that reports overflow as a [`MathError`].
pub fn checked_add(a: u128, b: u128) -> Result<u128, MathError> {
    a.checked_add(b).ok_or(MathError::Overflow)
}

/// Checked subtraction that reports underflow with both operands.
pub fn checked_sub(a: u128, b: u128) -> Result<u128, MathError> {
    a.checked_sub(b)
        .ok_or(MathError::Underflow { lhs: a, rhs: b })
}

/// `10^decimals` as `u128`.
pub fn pow10(decimals: u8) -> Result<u128, MathError> {
    10u128
        .checked_pow(decimals as u32)
        .ok_or(MathError::Overflow)
}

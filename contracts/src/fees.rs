//! Deposit fee arithmetic.
//!
//! Two directions, both rounding up in the protocol's favour:
//!
//! - [`fee_on_total`]: the caller names the gross amount (deposit). The fee
//!   is the slice of the gross that leaves `net + fee == gross`.
//! - [`fee_on_raw`]: the caller names the net amount (mint). The fee is
//!   added on top.

use yieldvault_protocol::config::BPS_DENOMINATOR;
use yieldvault_protocol::math::{self, MathError, Rounding};

/// Fee contained in a gross `assets` amount: `ceil(assets * bps / (bps + 10_000))`.
pub fn fee_on_total(assets: u128, fee_bps: u16) -> Result<u128, MathError> {
    if fee_bps == 0 {
        return Ok(0);
    }
    let bps = fee_bps as u128;
    math::mul_div(assets, bps, bps + BPS_DENOMINATOR, Rounding::Ceil)
}

/// Fee charged on top of a net `assets` amount: `ceil(assets * bps / 10_000)`.
pub fn fee_on_raw(assets: u128, fee_bps: u16) -> Result<u128, MathError> {
    if fee_bps == 0 {
        return Ok(0);
    }
    math::apply_bps(assets, fee_bps, Rounding::Ceil)
}

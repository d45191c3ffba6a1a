//! # Tolerance Bands
//!
//! Every settlement value reported by a processor is checked against a
//! reference (oracle price, expected redemption value, implied proceeds)
//! and accepted only if it falls inside a symmetric band around it:
//!
//! ```text
//! expected * (1 - t) <= value <= expected * (1 + t),   t = tolerance_bps / 10_000
//! ```
//!
//! Both sides are scaled by 10_000 before comparing so nothing is divided.

use crate::config::BPS_DENOMINATOR;
use crate::math::U256;

/// Returns `true` if `value` lies within `tolerance_bps` of `expected`.
///
/// `is_within_tolerance(x, x, _)` is always true and
/// `is_within_tolerance(x, y, 0)` holds only when `x == y`.
pub fn is_within_tolerance(value: u128, expected: u128, tolerance_bps: u16) -> bool {
    let denom = U256::from(BPS_DENOMINATOR);
    let bps = U256::from(tolerance_bps);
    let scaled_value = U256::from(value) * denom;
    let expected = U256::from(expected);

    let lower_factor = denom.saturating_sub(bps);
    let upper_factor = denom + bps;

    let lower = expected * lower_factor;
    let upper = expected * upper_factor;

    scaled_value >= lower && scaled_value <= upper
}

/// Signed deviation of `value` from `expected` in basis points, for logs.
/// Returns `None` when `expected` is zero.
pub fn deviation_bps(value: u128, expected: u128) -> Option<i128> {
    if expected == 0 {
        return None;
    }
    let (diff, negative) = if value >= expected {
        (value - expected, false)
    } else {
        (expected - value, true)
    };
    let magnitude = crate::math::mul_div(diff, BPS_DENOMINATOR, expected, crate::math::Rounding::Floor)
        .ok()
        .and_then(|m| i128::try_from(m).ok())?;
    Some(if negative { -magnitude } else { magnitude })
}

//! # Reward Vesting
//!
//! Rewards enter the vault as yield asset but release into the reported
//! total value linearly over a period, so an instantaneous reward cannot be
//! captured by a deposit placed just before it.
//!
//! ```text
//! unvested(t) = ceil(amount * (period - elapsed) / period)   for elapsed < period
//!             = 0                                             otherwise
//! ```
//!
//! Rounding up keeps the holdback conservative: reported value never runs
//! ahead of what has actually vested.

use serde::{Deserialize, Serialize};
use yieldvault_protocol::math::{self, Rounding};

/// One linear release schedule.
///
/// The period is captured when the schedule starts, so tuning the vault's
/// vesting period never changes a schedule already in flight.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VestingSchedule {
    pub amount: u128,
    pub start: u64,
    pub period: u64,
}

impl VestingSchedule {
    pub fn new(amount: u128, start: u64, period: u64) -> Self {
        Self { amount, start, period }
    }

    /// Portion of `amount` still held back at `now`.
    pub fn unvested(&self, now: u64) -> u128 {
        if self.amount == 0 || self.period == 0 {
            return 0;
        }
        let elapsed = now.saturating_sub(self.start);
        if elapsed >= self.period {
            return 0;
        }
        let remaining = (self.period - elapsed) as u128;
        // remaining < period, so the quotient never exceeds `amount`.
        math::mul_div(self.amount, remaining, self.period as u128, Rounding::Ceil)
            .unwrap_or(self.amount)
    }

    /// Portion of `amount` released at `now`.
    pub fn vested(&self, now: u64) -> u128 {
        self.amount - self.unvested(now)
    }
}

//! # Batch Settlement
//!
//! Validation and allocation for a processed batch of withdrawal tickets.
//! Everything in here is pure: the queue gathers inputs, calls
//! [`validate_settlement`] and [`allocate_pro_rata`], and only mutates
//! state once both succeed.
//!
//! ## Checks
//!
//! A batch is accepted only if all of these hold (every band is the vault's
//! `tolerance_bps`, inclusive):
//!
//! 1. `total_yield_sold <= vested yield balance`
//! 2. `execution_price ≈ oracle_price`
//! 3. `total_proceeds ≈ total_yield_sold × execution_price`
//! 4. `total_proceeds ≈ value of the redeemed shares at the current rate`
//!
//! ## Allocation
//!
//! `allocation_i = floor(total_proceeds × shares_i / Σ shares)`. Rounding
//! always favours the pool; the remainder (strictly less than one unit
//! per ticket) is returned to the vault as dust.

use serde::{Deserialize, Serialize};
use tracing::warn;
use yieldvault_protocol::math::{self, Rounding};
use yieldvault_protocol::tolerance::{deviation_bps, is_within_tolerance};
use yieldvault_protocol::Price;

use crate::error::{EconomicError, VaultError};

// ---------------------------------------------------------------------------
// Tolerance checks
// ---------------------------------------------------------------------------

/// Fails if `execution` deviates from `oracle` by more than `tolerance_bps`.
///
/// Both prices are expressed in the oracle's decimals.
pub fn check_execution_price(execution: Price, oracle: Price, tolerance_bps: u16) -> Result<(), EconomicError> {
    if is_within_tolerance(execution.answer, oracle.answer, tolerance_bps) {
        Ok(())
    } else {
        warn!(
            execution_price = execution.answer,
            oracle_price = oracle.answer,
            deviation_bps = ?deviation_bps(execution.answer, oracle.answer),
            tolerance_bps,
            "execution price outside oracle band"
        );
        Err(EconomicError::OraclePriceMismatch {
            execution_price: execution.answer,
            oracle_price: oracle.answer,
            tolerance_bps,
        })
    }
}

/// Fails if `base_value` deviates from `yield_amount` priced at
/// `execution` by more than `tolerance_bps`.
pub fn check_execution_value(
    base_value: u128,
    yield_amount: u128,
    execution: Price,
    tolerance_bps: u16,
) -> Result<(), VaultError> {
    let expected = execution.yield_to_base(yield_amount, Rounding::Floor)?;
    if is_within_tolerance(base_value, expected, tolerance_bps) {
        Ok(())
    } else {
        warn!(
            actual = base_value,
            expected,
            deviation_bps = ?deviation_bps(base_value, expected),
            tolerance_bps,
            "execution value outside band"
        );
        Err(EconomicError::ExecutionValueMismatch {
            actual: base_value,
            expected,
            tolerance_bps,
        }
        .into())
    }
}

/// Inputs to [`validate_settlement`].
#[derive(Clone, Copy, Debug)]
pub struct SettlementInputs {
    pub total_proceeds: u128,
    pub total_yield_sold: u128,
    pub execution_price: Price,
    pub oracle_price: Price,
    /// Vault's yield balance net of unvested rewards.
    pub vested_yield: u128,
    /// Base value of the batch's shares at the current exchange rate.
    pub share_value: u128,
    pub tolerance_bps: u16,
}

/// Runs every settlement check in order, failing on the first breach.
pub fn validate_settlement(inputs: &SettlementInputs) -> Result<(), VaultError> {
    if inputs.total_yield_sold > inputs.vested_yield {
        return Err(EconomicError::ExceedsVestedBalance {
            requested: inputs.total_yield_sold,
            available: inputs.vested_yield,
        }
        .into());
    }

    check_execution_price(inputs.execution_price, inputs.oracle_price, inputs.tolerance_bps)?;

    check_execution_value(
        inputs.total_proceeds,
        inputs.total_yield_sold,
        inputs.execution_price,
        inputs.tolerance_bps,
    )?;

    if !is_within_tolerance(inputs.total_proceeds, inputs.share_value, inputs.tolerance_bps) {
        warn!(
            proceeds = inputs.total_proceeds,
            share_value = inputs.share_value,
            deviation_bps = ?deviation_bps(inputs.total_proceeds, inputs.share_value),
            tolerance_bps = inputs.tolerance_bps,
            "proceeds outside share value band"
        );
        return Err(EconomicError::ShareValueMismatch {
            proceeds: inputs.total_proceeds,
            expected: inputs.share_value,
            tolerance_bps: inputs.tolerance_bps,
        }
        .into());
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Pro-rata allocation
// ---------------------------------------------------------------------------

/// One ticket's stake in a batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TicketShare {
    pub id: u64,
    pub shares: u128,
    pub min_base_received: u128,
}

/// Result of splitting proceeds across a batch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    /// Per-ticket amounts, in input order.
    pub amounts: Vec<u128>,
    pub total_shares: u128,
    pub allocated: u128,
    /// `total_proceeds - allocated`.
    pub dust: u128,
}

/// Splits `total_proceeds` across `tickets` by share weight.
///
/// Any ticket whose allocation is below its `min_base_received` fails the
/// whole batch.
pub fn allocate_pro_rata(total_proceeds: u128, tickets: &[TicketShare]) -> Result<Allocation, VaultError> {
    let total_shares = tickets
        .iter()
        .try_fold(0u128, |acc, t| math::checked_add(acc, t.shares))?;
    if total_shares == 0 {
        return Err(VaultError::ZeroAmount);
    }

    let mut amounts = Vec::with_capacity(tickets.len());
    let mut allocated = 0u128;
    for ticket in tickets {
        let amount = math::mul_div(total_proceeds, ticket.shares, total_shares, Rounding::Floor)?;
        if amount < ticket.min_base_received {
            return Err(EconomicError::SlippageExceeded {
                request_id: ticket.id,
                allocation: amount,
                min_base_received: ticket.min_base_received,
            }
            .into());
        }
        allocated = math::checked_add(allocated, amount)?;
        amounts.push(amount);
    }

    if allocated > total_proceeds {
        return Err(EconomicError::OverAllocation {
            allocated,
            total: total_proceeds,
        }
        .into());
    }

    Ok(Allocation {
        amounts,
        total_shares,
        allocated,
        dust: total_proceeds - allocated,
    })
}

//! # Protocol Configuration & Constants
//!
//! Every magic number in the vault lives here. Fee caps, tolerance bounds,
//! vesting limits and oracle staleness caps: if a value bounds what an admin
//! or processor can set at runtime, it is declared in this file.
//!
//! [`VaultParams`] holds the tunable values that a deployment starts with.
//! It is deserializable so the node can load it from a config file, and
//! [`VaultParams::validate`] enforces the same bounds the runtime setters do.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::address::Address;

// ---------------------------------------------------------------------------
// Fixed-Point Units
// ---------------------------------------------------------------------------

/// Basis-point denominator. 10_000 bps = 100%.
pub const BPS_DENOMINATOR: u128 = 10_000;

/// Decimal precision of the base asset, the yield-asset tracker and vault
/// shares. All three use 18 decimals so that no rescaling happens between
/// them; only oracle prices carry their own decimal count.
pub const ASSET_DECIMALS: u8 = 18;

/// One whole unit at [`ASSET_DECIMALS`].
pub const ONE_UNIT: u128 = 1_000_000_000_000_000_000;

/// Exponent of the virtual share offset. Share conversions behave as if
/// `10^DECIMALS_OFFSET` shares and [`VIRTUAL_ASSETS`] assets always exist,
/// which makes donating assets to inflate the first depositor's share price
/// unprofitable.
pub const DECIMALS_OFFSET: u32 = 0;

/// Virtual shares added to the supply in every conversion.
pub const VIRTUAL_SHARES: u128 = 10u128.pow(DECIMALS_OFFSET);

/// Virtual assets added to total assets in every conversion.
pub const VIRTUAL_ASSETS: u128 = 1;

// ---------------------------------------------------------------------------
// Fees
// ---------------------------------------------------------------------------

/// Default deposit fee: 10 bps = 0.10%.
pub const DEFAULT_DEPOSIT_FEE_BPS: u16 = 10;

/// Hard cap on the deposit fee: 500 bps = 5%.
pub const MAX_DEPOSIT_FEE_BPS: u16 = 500;

// ---------------------------------------------------------------------------
// Tolerance
// ---------------------------------------------------------------------------

/// Tightest tolerance band an admin may configure: 1%.
pub const MIN_TOLERANCE_BPS: u16 = 100;

/// Loosest tolerance band an admin may configure: 100%. Only meant for
/// extreme market dislocation.
pub const MAX_TOLERANCE_BPS: u16 = 10_000;

/// Tolerance band applied out of the box: 5%.
pub const DEFAULT_TOLERANCE_BPS: u16 = 500;

// ---------------------------------------------------------------------------
// Vesting
// ---------------------------------------------------------------------------

/// Default linear vesting window for reward transfers: 30 days.
pub const DEFAULT_VESTING_PERIOD: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Shortest vesting window a processor may configure: 1 hour.
pub const MIN_VESTING_PERIOD: Duration = Duration::from_secs(60 * 60);

/// Longest vesting window a processor may configure: 90 days.
pub const MAX_VESTING_PERIOD: Duration = Duration::from_secs(90 * 24 * 60 * 60);

// ---------------------------------------------------------------------------
// Oracle
// ---------------------------------------------------------------------------

/// Default maximum age of an oracle answer before it is considered stale.
pub const DEFAULT_STALENESS_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

/// Upper bound on the staleness window. An admin cannot configure the
/// oracle to accept answers older than this.
pub const MAX_STALENESS_WINDOW: Duration = Duration::from_secs(7 * 24 * 60 * 60);

// ---------------------------------------------------------------------------
// Queue Limits
// ---------------------------------------------------------------------------

/// Maximum number of tickets in a single lock/unlock/process/claim batch.
/// Keeps a single settlement call bounded.
pub const MAX_BATCH_SIZE: usize = 256;

// ---------------------------------------------------------------------------
// Runtime Parameters
// ---------------------------------------------------------------------------

/// Errors raised when a parameter set falls outside protocol bounds.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("deposit fee {0} bps exceeds cap of {max} bps", max = MAX_DEPOSIT_FEE_BPS)]
    FeeTooHigh(u16),

    #[error("tolerance {0} bps outside [{min}, {max}]", min = MIN_TOLERANCE_BPS, max = MAX_TOLERANCE_BPS)]
    ToleranceOutOfRange(u16),

    #[error("vesting period {0}s outside allowed range")]
    VestingPeriodOutOfRange(u64),

    #[error("staleness window {0}s must be positive and at most {max}s", max = MAX_STALENESS_WINDOW.as_secs())]
    StalenessWindowOutOfRange(u64),

    #[error("price bounds inverted: min {min} > max {max}")]
    InvertedPriceBounds { min: u128, max: u128 },

    #[error("fee recipient must be a non-empty address")]
    EmptyFeeRecipient,
}

/// Oracle guard settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleParams {
    /// Maximum accepted answer age, in seconds.
    pub staleness_window_secs: u64,
    /// Lowest accepted answer (in feed units).
    pub min_price: u128,
    /// Highest accepted answer (in feed units).
    pub max_price: u128,
}

impl Default for OracleParams {
    fn default() -> Self {
        Self {
            staleness_window_secs: DEFAULT_STALENESS_WINDOW.as_secs(),
            min_price: 1,
            max_price: u128::MAX,
        }
    }
}

/// Tunable vault parameters.
///
/// Every field has a runtime setter gated by a role; this struct is only the
/// starting point for a deployment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultParams {
    /// Fee charged on deposits and mints, in basis points.
    pub deposit_fee_bps: u16,
    /// Address that receives deposit fees.
    pub fee_recipient: Address,
    /// Width of the tolerance band used by every settlement check.
    pub tolerance_bps: u16,
    /// Length of the linear vesting window for rewards, in seconds.
    pub vesting_period_secs: u64,
    /// Oracle guard settings.
    pub oracle: OracleParams,
}

impl Default for VaultParams {
    fn default() -> Self {
        Self {
            deposit_fee_bps: DEFAULT_DEPOSIT_FEE_BPS,
            fee_recipient: Address::new("treasury"),
            tolerance_bps: DEFAULT_TOLERANCE_BPS,
            vesting_period_secs: DEFAULT_VESTING_PERIOD.as_secs(),
            oracle: OracleParams::default(),
        }
    }
}

impl VaultParams {
    /// Checks every field against protocol bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_deposit_fee(self.deposit_fee_bps)?;
        validate_tolerance(self.tolerance_bps)?;
        validate_vesting_period(self.vesting_period_secs)?;
        validate_staleness_window(self.oracle.staleness_window_secs)?;
        if self.oracle.min_price > self.oracle.max_price {
            return Err(ConfigError::InvertedPriceBounds {
                min: self.oracle.min_price,
                max: self.oracle.max_price,
            });
        }
        if self.fee_recipient.is_zero() {
            return Err(ConfigError::EmptyFeeRecipient);
        }
        Ok(())
    }
}

/// Rejects fees above [`MAX_DEPOSIT_FEE_BPS`].
pub fn validate_deposit_fee(bps: u16) -> Result<(), ConfigError> {
    if bps > MAX_DEPOSIT_FEE_BPS {
        return Err(ConfigError::FeeTooHigh(bps));
    }
    Ok(())
}

/// Rejects tolerances outside `[MIN_TOLERANCE_BPS, MAX_TOLERANCE_BPS]`.
pub fn validate_tolerance(bps: u16) -> Result<(), ConfigError> {
    if !(MIN_TOLERANCE_BPS..=MAX_TOLERANCE_BPS).contains(&bps) {
        return Err(ConfigError::ToleranceOutOfRange(bps));
    }
    Ok(())
}

/// Rejects vesting periods outside `[MIN_VESTING_PERIOD, MAX_VESTING_PERIOD]`.
pub fn validate_vesting_period(secs: u64) -> Result<(), ConfigError> {
    if secs < MIN_VESTING_PERIOD.as_secs() || secs > MAX_VESTING_PERIOD.as_secs() {
        return Err(ConfigError::VestingPeriodOutOfRange(secs));
    }
    Ok(())
}

/// Rejects a zero staleness window or one above [`MAX_STALENESS_WINDOW`].
pub fn validate_staleness_window(secs: u64) -> Result<(), ConfigError> {
    if secs == 0 || secs > MAX_STALENESS_WINDOW.as_secs() {
        return Err(ConfigError::StalenessWindowOutOfRange(secs));
    }
    Ok(())
}

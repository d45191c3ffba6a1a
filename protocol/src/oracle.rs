//! # Price Oracle
//!
//! The yield asset has no on-ledger market; its value in base-asset terms
//! comes from an external feed. [`PriceOracle`] wraps a raw
//! [`PriceSource`] and only hands out a [`Price`] after it passes every
//! guard:
//!
//! 1. An answer exists at all.
//! 2. The answer is strictly positive.
//! 3. The answer is younger than the staleness window.
//! 4. The answer lies within the configured `[min_price, max_price]` bounds.
//!
//! Any failed guard is an [`OracleError`], which callers treat as a hard
//! failure of the whole operation.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{self, ConfigError, OracleParams};
use crate::math::{self, MathError, Rounding};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Reasons a price read can be refused.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OracleError {
    /// The source has never published an answer.
    #[error("price feed has no answer")]
    Unset,

    /// The answer is zero or negative.
    #[error("price feed answer is not positive: {0}")]
    NonPositive(i128),

    /// The answer is older than the staleness window.
    #[error("price feed answer is stale: age {age}s exceeds {max}s")]
    Stale { age: u64, max: u64 },

    /// The answer lies outside the configured sanity bounds.
    #[error("price feed answer {answer} outside bounds [{min}, {max}]")]
    OutOfBounds { answer: u128, min: u128, max: u128 },

    /// The feed's decimals cannot be represented.
    #[error("price feed decimals unsupported: {0}")]
    UnsupportedDecimals(u8),
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// A single raw feed observation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundData {
    /// Raw answer in feed units.
    pub answer: i128,
    /// Decimal places of `answer`.
    pub decimals: u8,
    /// Unix timestamp (seconds) the answer was published.
    pub updated_at: u64,
}

/// A raw, unvalidated price feed.
pub trait PriceSource: Send + Sync + fmt::Debug {
    /// Returns the most recent observation, if any.
    fn latest_round(&self) -> Option<RoundData>;
}

/// An in-process feed whose answer is set by hand.
///
/// Clones share the same underlying answer, so a test (or the devnet node)
/// can keep a handle and move the price while the oracle holds another.
#[derive(Clone, Debug, Default)]
pub struct ManualPriceSource {
    round: Arc<RwLock<Option<RoundData>>>,
}

impl ManualPriceSource {
    /// Creates a source with no answer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a source pre-loaded with an answer.
    pub fn with_price(answer: i128, decimals: u8, updated_at: u64) -> Self {
        let source = Self::new();
        source.set_price(answer, decimals, updated_at);
        source
    }

    /// Publishes a new answer.
    pub fn set_price(&self, answer: i128, decimals: u8, updated_at: u64) {
        *self.round.write() = Some(RoundData {
            answer,
            decimals,
            updated_at,
        });
    }

    /// Removes the current answer.
    pub fn clear(&self) {
        *self.round.write() = None;
    }
}

impl PriceSource for ManualPriceSource {
    fn latest_round(&self) -> Option<RoundData> {
        *self.round.read()
    }
}

// ---------------------------------------------------------------------------
// Price
// ---------------------------------------------------------------------------

/// A validated price of one unit of yield asset in base-asset terms.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Price in feed units.
    pub answer: u128,
    /// Decimal places of `answer`.
    pub decimals: u8,
}

impl Price {
    /// Constructs a price directly. Used for processor-supplied execution
    /// prices, which share the oracle's decimals.
    pub fn new(answer: u128, decimals: u8) -> Self {
        Self { answer, decimals }
    }

    /// Base-asset value of `yield_amount` at this price.
    pub fn yield_to_base(&self, yield_amount: u128, rounding: Rounding) -> Result<u128, MathError> {
        math::mul_div(yield_amount, self.answer, math::pow10(self.decimals)?, rounding)
    }

    /// Yield-asset amount purchasable with `base_amount` at this price.
    pub fn base_to_yield(&self, base_amount: u128, rounding: Rounding) -> Result<u128, MathError> {
        math::mul_div(base_amount, math::pow10(self.decimals)?, self.answer, rounding)
    }
}

// ---------------------------------------------------------------------------
// PriceOracle
// ---------------------------------------------------------------------------

/// Staleness- and bounds-checked view over a [`PriceSource`].
#[derive(Clone)]
pub struct PriceOracle {
    source: Arc<dyn PriceSource>,
    params: OracleParams,
}

impl fmt::Debug for PriceOracle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PriceOracle")
            .field("source", &self.source)
            .field("params", &self.params)
            .finish()
    }
}

impl PriceOracle {
    /// Wraps `source` with the given guard settings.
    pub fn new(source: Arc<dyn PriceSource>, params: OracleParams) -> Result<Self, ConfigError> {
        config::validate_staleness_window(params.staleness_window_secs)?;
        if params.min_price > params.max_price {
            return Err(ConfigError::InvertedPriceBounds {
                min: params.min_price,
                max: params.max_price,
            });
        }
        Ok(Self { source, params })
    }

    /// Returns the current guard settings.
    pub fn params(&self) -> &OracleParams {
        &self.params
    }

    /// Reads and validates the latest answer as of `now`.
    pub fn get_price(&self, now: u64) -> Result<Price, OracleError> {
        let round = self.source.latest_round().ok_or(OracleError::Unset)?;

        if round.answer <= 0 {
            return Err(OracleError::NonPositive(round.answer));
        }
        if round.decimals > 36 {
            return Err(OracleError::UnsupportedDecimals(round.decimals));
        }

        let age = now.saturating_sub(round.updated_at);
        if age > self.params.staleness_window_secs {
            return Err(OracleError::Stale {
                age,
                max: self.params.staleness_window_secs,
            });
        }

        let answer = round.answer as u128;
        if answer < self.params.min_price || answer > self.params.max_price {
            return Err(OracleError::OutOfBounds {
                answer,
                min: self.params.min_price,
                max: self.params.max_price,
            });
        }

        Ok(Price {
            answer,
            decimals: round.decimals,
        })
    }

    /// Rotates the underlying feed.
    pub fn set_source(&mut self, source: Arc<dyn PriceSource>) {
        self.source = source;
        tracing::info!("price source rotated");
    }

    /// Adjusts the staleness window, capped at
    /// [`MAX_STALENESS_WINDOW`](config::MAX_STALENESS_WINDOW).
    pub fn set_staleness_window(&mut self, secs: u64) -> Result<(), ConfigError> {
        config::validate_staleness_window(secs)?;
        self.params.staleness_window_secs = secs;
        tracing::info!(staleness_window_secs = secs, "oracle staleness window updated");
        Ok(())
    }

    /// Adjusts the accepted answer range.
    pub fn set_bounds(&mut self, min_price: u128, max_price: u128) -> Result<(), ConfigError> {
        if min_price > max_price {
            return Err(ConfigError::InvertedPriceBounds {
                min: min_price,
                max: max_price,
            });
        }
        self.params.min_price = min_price;
        self.params.max_price = max_price;
        tracing::info!(min_price, max_price, "oracle bounds updated");
        Ok(())
    }
}

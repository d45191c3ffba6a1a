//! # Reentrancy Guard
//!
//! A component holds one [`ReentrancyGuard`] and wraps each state-mutating
//! entry point in [`ReentrancyGuard::enter`] / [`ReentrancyGuard::exit`].
//! A second `enter` before the matching `exit` fails, so an asset-transfer
//! hook cannot call back into deposit/claim while an update is half done.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("reentrant call into {component}")]
pub struct ReentrancyError {
    pub component: String,
}

/// Single-flag guard. Serialized so snapshots capture it, though a
/// committed snapshot always has it cleared.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ReentrancyGuard {
    entered: bool,
}

impl ReentrancyGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the component as executing.
    pub fn enter(&mut self, component: &str) -> Result<(), ReentrancyError> {
        if self.entered {
            tracing::warn!(component, "reentrant call rejected");
            return Err(ReentrancyError {
                component: component.to_string(),
            });
        }
        self.entered = true;
        Ok(())
    }

    /// Clears the executing flag.
    pub fn exit(&mut self) {
        self.entered = false;
    }

    pub fn is_entered(&self) -> bool {
        self.entered
    }
}

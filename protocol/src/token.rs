//! # Fungible Token Ledger
//!
//! A minimal balance book used for three assets:
//!
//! - the **base asset** (the stable asset users deposit),
//! - the **yield-asset tracker** (an on-ledger mirror of the off-chain
//!   position, minted only by the vault),
//! - the vault's own **share** token.
//!
//! Minting is restricted to a single minter address. The base asset also
//! carries its own blacklist registry, which the withdrawal queue consults
//! before paying a claim.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::address::Address;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from token ledger operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// The caller is not this token's minter.
    #[error("{caller} is not the minter of {symbol}")]
    UnauthorizedMint { symbol: String, caller: Address },

    /// Debit exceeds the holder's balance.
    #[error("insufficient {symbol} balance for {holder}: has {balance}, needs {amount}")]
    InsufficientBalance {
        symbol: String,
        holder: Address,
        balance: u128,
        amount: u128,
    },

    /// Supply or a balance would exceed `u128::MAX`.
    #[error("{symbol} supply overflow")]
    SupplyOverflow { symbol: String },

    /// Transfers to or from the empty address are rejected.
    #[error("invalid {symbol} counterparty: empty address")]
    ZeroAddress { symbol: String },

    /// The token's own registry lists this address.
    #[error("{address} is blacklisted by {symbol}")]
    Blacklisted { symbol: String, address: Address },
}

// ---------------------------------------------------------------------------
// TokenLedger
// ---------------------------------------------------------------------------

/// Balances, supply and blacklist for one fungible token.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenLedger {
    symbol: String,
    decimals: u8,
    minter: Address,
    total_supply: u128,
    balances: BTreeMap<Address, u128>,
    blacklist: BTreeSet<Address>,
}

impl TokenLedger {
    /// Creates an empty ledger whose supply only `minter` may grow.
    pub fn new(symbol: impl Into<String>, decimals: u8, minter: Address) -> Self {
        Self {
            symbol: symbol.into(),
            decimals,
            minter,
            total_supply: 0,
            balances: BTreeMap::new(),
            blacklist: BTreeSet::new(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn decimals(&self) -> u8 {
        self.decimals
    }

    pub fn minter(&self) -> &Address {
        &self.minter
    }

    pub fn total_supply(&self) -> u128 {
        self.total_supply
    }

    /// Balance of `holder`; zero for unknown addresses.
    pub fn balance_of(&self, holder: &Address) -> u128 {
        self.balances.get(holder).copied().unwrap_or(0)
    }

    /// Number of addresses with a non-zero balance.
    pub fn holder_count(&self) -> usize {
        self.balances.values().filter(|b| **b > 0).count()
    }

    /// Returns `true` if this token's registry lists `address`.
    pub fn is_blacklisted(&self, address: &Address) -> bool {
        self.blacklist.contains(address)
    }

    /// Adds or removes `address` from this token's registry.
    pub fn set_blacklisted(&mut self, address: Address, blacklisted: bool) {
        if blacklisted {
            self.blacklist.insert(address);
        } else {
            self.blacklist.remove(&address);
        }
    }

    /// Mints `amount` to `to`. Only the minter may call this.
    pub fn mint(&mut self, caller: &Address, to: &Address, amount: u128) -> Result<(), TokenError> {
        if caller != &self.minter {
            return Err(TokenError::UnauthorizedMint {
                symbol: self.symbol.clone(),
                caller: caller.clone(),
            });
        }
        self.credit_new_supply(to, amount)
    }

    /// Burns `amount` from `from`.
    ///
    /// Authorization is the caller's concern: the vault only burns from
    /// its own balance or from escrow it controls.
    pub fn burn(&mut self, from: &Address, amount: u128) -> Result<(), TokenError> {
        self.debit(from, amount)?;
        self.total_supply -= amount;
        Ok(())
    }

    /// Moves `amount` from `from` to `to`.
    ///
    /// Rejected if either side is on this token's own blacklist.
    pub fn transfer(&mut self, from: &Address, to: &Address, amount: u128) -> Result<(), TokenError> {
        self.check_transfer(from, to, amount)?;
        if amount == 0 || from == to {
            return Ok(());
        }
        self.debit(from, amount)?;
        *self.balances.entry(to.clone()).or_insert(0) += amount;
        Ok(())
    }

    /// Runs every check [`transfer`](Self::transfer) would run without
    /// moving anything. Callers that chain several transfers validate all
    /// legs up front so a late failure cannot strand the earlier ones.
    pub fn check_transfer(&self, from: &Address, to: &Address, amount: u128) -> Result<(), TokenError> {
        if to.is_zero() || from.is_zero() {
            return Err(TokenError::ZeroAddress {
                symbol: self.symbol.clone(),
            });
        }
        for party in [from, to] {
            if self.is_blacklisted(party) {
                return Err(TokenError::Blacklisted {
                    symbol: self.symbol.clone(),
                    address: party.clone(),
                });
            }
        }
        let balance = self.balance_of(from);
        if balance < amount {
            return Err(TokenError::InsufficientBalance {
                symbol: self.symbol.clone(),
                holder: from.clone(),
                balance,
                amount,
            });
        }
        if from != to {
            self.balance_of(to)
                .checked_add(amount)
                .ok_or_else(|| TokenError::SupplyOverflow {
                    symbol: self.symbol.clone(),
                })?;
        }
        Ok(())
    }

    fn credit_new_supply(&mut self, to: &Address, amount: u128) -> Result<(), TokenError> {
        if to.is_zero() {
            return Err(TokenError::ZeroAddress {
                symbol: self.symbol.clone(),
            });
        }
        let new_supply =
            self.total_supply
                .checked_add(amount)
                .ok_or_else(|| TokenError::SupplyOverflow {
                    symbol: self.symbol.clone(),
                })?;
        // Every balance is bounded by supply, so this cannot overflow once
        // the supply check passed.
        *self.balances.entry(to.clone()).or_insert(0) += amount;
        self.total_supply = new_supply;
        Ok(())
    }

    fn debit(&mut self, from: &Address, amount: u128) -> Result<(), TokenError> {
        let balance = self.balance_of(from);
        if balance < amount {
            return Err(TokenError::InsufficientBalance {
                symbol: self.symbol.clone(),
                holder: from.clone(),
                balance,
                amount,
            });
        }
        if balance == amount {
            self.balances.remove(from);
        } else {
            self.balances.insert(from.clone(), balance - amount);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger() -> TokenLedger {
        TokenLedger::new("USDX", 18, Address::new("minter"))
    }

    #[test]
    fn only_minter_can_mint() {
        let mut t = ledger();
        let alice = Address::new("alice");
        assert!(t.mint(&Address::new("minter"), &alice, 100).is_ok());
        assert_eq!(t.balance_of(&alice), 100);
        assert_eq!(t.total_supply(), 100);

        let err = t.mint(&alice, &alice, 1).unwrap_err();
        assert!(matches!(err, TokenError::UnauthorizedMint { .. }));
        assert_eq!(t.total_supply(), 100);
    }

    #[test]
    fn transfer_moves_balance() {
        let mut t = ledger();
        let (alice, bob) = (Address::new("alice"), Address::new("bob"));
        t.mint(&Address::new("minter"), &alice, 100).unwrap();
        t.transfer(&alice, &bob, 40).unwrap();
        assert_eq!(t.balance_of(&alice), 60);
        assert_eq!(t.balance_of(&bob), 40);
        assert_eq!(t.total_supply(), 100);
    }

    #[test]
    fn overdraft_rejected_without_mutation() {
        let mut t = ledger();
        let (alice, bob) = (Address::new("alice"), Address::new("bob"));
        t.mint(&Address::new("minter"), &alice, 10).unwrap();
        let err = t.transfer(&alice, &bob, 11).unwrap_err();
        assert!(matches!(err, TokenError::InsufficientBalance { balance: 10, amount: 11, .. }));
        assert_eq!(t.balance_of(&alice), 10);
        assert_eq!(t.balance_of(&bob), 0);
    }

    #[test]
    fn burn_reduces_supply() {
        let mut t = ledger();
        let alice = Address::new("alice");
        t.mint(&Address::new("minter"), &alice, 10).unwrap();
        t.burn(&alice, 10).unwrap();
        assert_eq!(t.total_supply(), 0);
        assert_eq!(t.holder_count(), 0);
        assert!(t.burn(&alice, 1).is_err());
    }

    #[test]
    fn blacklisted_party_cannot_transfer() {
        let mut t = ledger();
        let (alice, bob) = (Address::new("alice"), Address::new("bob"));
        t.mint(&Address::new("minter"), &alice, 10).unwrap();
        t.set_blacklisted(bob.clone(), true);
        assert!(t.is_blacklisted(&bob));
        assert!(matches!(
            t.transfer(&alice, &bob, 1),
            Err(TokenError::Blacklisted { .. })
        ));
        t.set_blacklisted(bob.clone(), false);
        assert!(t.transfer(&alice, &bob, 1).is_ok());
    }

    #[test]
    fn check_transfer_does_not_mutate() {
        let mut t = ledger();
        let (alice, bob) = (Address::new("alice"), Address::new("bob"));
        t.mint(&Address::new("minter"), &alice, 10).unwrap();
        assert!(t.check_transfer(&alice, &bob, 10).is_ok());
        assert!(t.check_transfer(&alice, &bob, 11).is_err());
        assert_eq!(t.balance_of(&alice), 10);
        assert_eq!(t.balance_of(&bob), 0);
    }

    #[test]
    fn empty_address_rejected() {
        let mut t = ledger();
        assert!(matches!(
            t.mint(&Address::new("minter"), &Address::new(""), 1),
            Err(TokenError::ZeroAddress { .. })
        ));
    }
}

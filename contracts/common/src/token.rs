//! bBTC Claim Token
//!
//! Fungible balance book for bBTC. Only the ledger owns a `ClaimToken`, so
//! only the ledger can mint and burn; holders can transfer freely.

use crate::BTreeMap;
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::constants::token as token_config;
use crate::errors::{IbbtcError, IbbtcResult};
use crate::events::{EventLog, IbbtcEvent};
use crate::math::{safe_add, safe_sub};
use crate::types::{Address, ZERO_ADDRESS};

/// bBTC balances and supply
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct ClaimToken {
    balances: BTreeMap<Address, u128>,
    total_supply: u128,
    /// Cumulative minted, for supply auditing
    total_minted: u128,
    /// Cumulative burned, for supply auditing
    total_burned: u128,
}

impl ClaimToken {
    /// Create an empty token
    pub fn new() -> Self {
        Self::default()
    }

    /// Token name
    pub fn name() -> &'static str {
        token_config::NAME
    }

    /// Token symbol
    pub fn symbol() -> &'static str {
        token_config::SYMBOL
    }

    /// Token decimals
    pub fn decimals() -> u8 {
        token_config::DECIMALS
    }

    /// Current supply
    pub fn total_supply(&self) -> u128 {
        self.total_supply
    }

    /// Cumulative minted
    pub fn total_minted(&self) -> u128 {
        self.total_minted
    }

    /// Cumulative burned
    pub fn total_burned(&self) -> u128 {
        self.total_burned
    }

    /// Balance of `owner`
    pub fn balance_of(&self, owner: &Address) -> u128 {
        self.balances.get(owner).copied().unwrap_or(0)
    }

    /// Mint `amount` to `to`, returning the new supply
    pub fn mint(&mut self, to: &Address, amount: u128, events: &mut EventLog) -> IbbtcResult<u128> {
        if *to == ZERO_ADDRESS {
            return Err(IbbtcError::NullAddress);
        }
        let new_supply = safe_add(self.total_supply, amount)?;
        let new_balance = safe_add(self.balance_of(to), amount)?;

        self.total_supply = new_supply;
        self.total_minted = self.total_minted.saturating_add(amount);
        self.balances.insert(*to, new_balance);

        events.emit(IbbtcEvent::TokenMint {
            to: *to,
            amount,
            new_total_supply: new_supply,
        });
        Ok(new_supply)
    }

    /// Burn `amount` from `from`, returning the new supply
    pub fn burn(&mut self, from: &Address, amount: u128, events: &mut EventLog) -> IbbtcResult<u128> {
        let available = self.balance_of(from);
        if available < amount {
            return Err(IbbtcError::InsufficientBalance { available, requested: amount });
        }
        let new_supply = safe_sub(self.total_supply, amount)?;

        self.total_supply = new_supply;
        self.total_burned = self.total_burned.saturating_add(amount);
        self.set_balance(from, available - amount);

        events.emit(IbbtcEvent::TokenBurn {
            from: *from,
            amount,
            new_total_supply: new_supply,
        });
        Ok(new_supply)
    }

    /// Move `amount` from `from` to `to`
    pub fn transfer(
        &mut self,
        from: &Address,
        to: &Address,
        amount: u128,
        events: &mut EventLog,
    ) -> IbbtcResult<()> {
        if *to == ZERO_ADDRESS {
            return Err(IbbtcError::NullAddress);
        }
        let available = self.balance_of(from);
        if available < amount {
            return Err(IbbtcError::InsufficientBalance { available, requested: amount });
        }
        if from != to {
            let credited = safe_add(self.balance_of(to), amount)?;
            self.set_balance(from, available - amount);
            self.balances.insert(*to, credited);
        }

        events.emit(IbbtcEvent::TokenTransfer { from: *from, to: *to, amount });
        Ok(())
    }

    fn set_balance(&mut self, owner: &Address, balance: u128) {
        if balance == 0 {
            self.balances.remove(owner);
        } else {
            self.balances.insert(*owner, balance);
        }
    }
}

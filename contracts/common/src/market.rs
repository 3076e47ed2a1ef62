//! External Market Boundary
//!
//! Models the modules peaks talk to but do not own: plain tokens, curve
//! swaps, sett vaults and yearn-style vaults, plus every token balance.
//! Rate quotes are trusted inputs supplied by the environment; this module
//! stores them and never derives a price itself.

use crate::{BTreeMap, BTreeSet};

use crate::constants::precision;
use crate::errors::{IbbtcError, IbbtcResult};
use crate::math::{safe_add, safe_sub};
use crate::types::Address;

/// A deployed external module
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExternalModule {
    /// Plain fungible token
    Token { decimals: u8 },
    /// Curve pool; `virtual_price` is BTC per LP token (18 decimals)
    CurveSwap { lp_token: Address, virtual_price: u128 },
    /// Badger sett; its shares are an 18-decimal token and
    /// `price_per_full_share` is LP tokens per share (18 decimals)
    Sett { want: Address, price_per_full_share: u128 },
    /// Yearn-style vault; its shares are a `decimals` token and
    /// `price_per_share` is source-asset units per whole share
    YieldVault { token: Address, price_per_share: u128, decimals: u8 },
}

/// Deployed external modules and all token balances
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Market {
    modules: BTreeMap<Address, ExternalModule>,
    /// (token, owner) -> balance
    balances: BTreeMap<(Address, Address), u128>,
    /// Addresses held by protocol modules (peak proxies)
    reserved: BTreeSet<Address>,
}

impl Market {
    /// Create an empty market
    pub fn new() -> Self {
        Self::default()
    }

    /// Deploy a module at `address`
    pub fn deploy(&mut self, address: Address, module: ExternalModule) -> IbbtcResult<()> {
        if self.is_taken(&address) {
            return Err(IbbtcError::AddressInUse { address });
        }
        self.modules.insert(address, module);
        Ok(())
    }

    /// Claim `address` for a protocol module so no external module can
    /// be deployed over it
    pub fn reserve(&mut self, address: Address) -> IbbtcResult<()> {
        if self.is_taken(&address) {
            return Err(IbbtcError::AddressInUse { address });
        }
        self.reserved.insert(address);
        Ok(())
    }

    /// Whether a module is deployed at `address`
    pub fn is_deployed(&self, address: &Address) -> bool {
        self.modules.contains_key(address)
    }

    /// Whether any module, external or protocol, occupies `address`
    pub fn is_taken(&self, address: &Address) -> bool {
        self.modules.contains_key(address) || self.reserved.contains(address)
    }

    /// Module deployed at `address`
    pub fn module(&self, address: &Address) -> IbbtcResult<&ExternalModule> {
        self.modules
            .get(address)
            .ok_or(IbbtcError::NotAContract { address: *address })
    }

    fn module_mut(&mut self, address: &Address) -> IbbtcResult<&mut ExternalModule> {
        self.modules
            .get_mut(address)
            .ok_or(IbbtcError::NotAContract { address: *address })
    }

    // ============ Rate Quotes ============

    /// Curve pool virtual price
    pub fn virtual_price(&self, swap: &Address) -> IbbtcResult<u128> {
        match self.module(swap)? {
            ExternalModule::CurveSwap { virtual_price, .. } => Ok(*virtual_price),
            _ => Err(IbbtcError::UnsupportedModule { address: *swap, expected: "curve swap" }),
        }
    }

    /// Sett price per full share
    pub fn price_per_full_share(&self, sett: &Address) -> IbbtcResult<u128> {
        match self.module(sett)? {
            ExternalModule::Sett { price_per_full_share, .. } => Ok(*price_per_full_share),
            _ => Err(IbbtcError::UnsupportedModule { address: *sett, expected: "sett" }),
        }
    }

    /// Yield vault price per share
    pub fn price_per_share(&self, vault: &Address) -> IbbtcResult<u128> {
        match self.module(vault)? {
            ExternalModule::YieldVault { price_per_share, .. } => Ok(*price_per_share),
            _ => Err(IbbtcError::UnsupportedModule { address: *vault, expected: "yield vault" }),
        }
    }

    /// Underlying token of a yield vault
    pub fn vault_token(&self, vault: &Address) -> IbbtcResult<Address> {
        match self.module(vault)? {
            ExternalModule::YieldVault { token, .. } => Ok(*token),
            _ => Err(IbbtcError::UnsupportedModule { address: *vault, expected: "yield vault" }),
        }
    }

    /// Decimals of a token-like module
    pub fn decimals(&self, token: &Address) -> IbbtcResult<u8> {
        match self.module(token)? {
            ExternalModule::Token { decimals } => Ok(*decimals),
            ExternalModule::Sett { .. } => Ok(precision::WAD_DECIMALS as u8),
            ExternalModule::YieldVault { decimals, .. } => Ok(*decimals),
            ExternalModule::CurveSwap { .. } => {
                Err(IbbtcError::UnsupportedModule { address: *token, expected: "token" })
            }
        }
    }

    /// Report a new virtual price for a curve pool
    pub fn set_virtual_price(&mut self, swap: &Address, price: u128) -> IbbtcResult<()> {
        match self.module_mut(swap)? {
            ExternalModule::CurveSwap { virtual_price, .. } => {
                *virtual_price = price;
                Ok(())
            }
            _ => Err(IbbtcError::UnsupportedModule { address: *swap, expected: "curve swap" }),
        }
    }

    /// Report a new price per full share for a sett
    pub fn set_price_per_full_share(&mut self, sett: &Address, price: u128) -> IbbtcResult<()> {
        match self.module_mut(sett)? {
            ExternalModule::Sett { price_per_full_share, .. } => {
                *price_per_full_share = price;
                Ok(())
            }
            _ => Err(IbbtcError::UnsupportedModule { address: *sett, expected: "sett" }),
        }
    }

    /// Report a new price per share for a yield vault
    pub fn set_price_per_share(&mut self, vault: &Address, price: u128) -> IbbtcResult<()> {
        match self.module_mut(vault)? {
            ExternalModule::YieldVault { price_per_share, .. } => {
                *price_per_share = price;
                Ok(())
            }
            _ => Err(IbbtcError::UnsupportedModule { address: *vault, expected: "yield vault" }),
        }
    }

    // ============ Balances ============

    fn token_module(&self, token: &Address) -> IbbtcResult<()> {
        match self.module(token)? {
            ExternalModule::CurveSwap { .. } => {
                Err(IbbtcError::UnsupportedModule { address: *token, expected: "token" })
            }
            _ => Ok(()),
        }
    }

    /// Balance of `owner` in `token`
    pub fn balance_of(&self, token: &Address, owner: &Address) -> u128 {
        self.balances.get(&(*token, *owner)).copied().unwrap_or(0)
    }

    /// Credit `amount` of `token` to `to` (deposits and faucets outside the protocol)
    pub fn credit(&mut self, token: &Address, to: &Address, amount: u128) -> IbbtcResult<()> {
        self.token_module(token)?;
        let balance = safe_add(self.balance_of(token, to), amount)?;
        self.balances.insert((*token, *to), balance);
        Ok(())
    }

    /// Move `amount` of `token` from `from` to `to`
    pub fn transfer(
        &mut self,
        token: &Address,
        from: &Address,
        to: &Address,
        amount: u128,
    ) -> IbbtcResult<()> {
        self.token_module(token)?;
        let available = self.balance_of(token, from);
        if available < amount {
            return Err(IbbtcError::InsufficientBalance { available, requested: amount });
        }
        if from == to {
            return Ok(());
        }
        let credited = safe_add(self.balance_of(token, to), amount)?;
        let debited = safe_sub(available, amount)?;
        self.balances.insert((*token, *from), debited);
        self.balances.insert((*token, *to), credited);
        Ok(())
    }
}

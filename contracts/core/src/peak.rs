//! Peak Capability and Proxy Table
//!
//! A peak is any adapter that can value its holdings in the common BTC unit
//! and move its local asset in and out. The ledger only ever sees the
//! [`Peak`] trait. Each peak lives behind a [`PeakProxy`]: the address,
//! proxy admin and adapter storage are fixed to the proxy, while the logic
//! reading that storage can be swapped in place without touching the
//! ledger's registry.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;

use borsh::{BorshDeserialize, BorshSerialize};

use ibbtc_common::{
    constants::{precision, rounding},
    errors::{IbbtcError, IbbtcResult},
    market::Market,
    math,
    types::{Address, MintQuote, PoolId, RedeemQuote},
    U256,
};

use crate::ledger::{Core, PortfolioSource};

// ============ Capability ============

/// Uniform interface every collateral adapter implements
///
/// Logic is stateless. Everything an adapter remembers lives in the
/// [`PeakStorage`] slot of its proxy, and `this` is always the proxy
/// address the market records holdings under, so both survive a logic
/// upgrade.
pub trait Peak: fmt::Debug {
    /// Short adapter name for diagnostics
    fn kind(&self) -> &'static str;

    /// Number of selectable pools
    fn num_pools(&self, storage: &PeakStorage) -> IbbtcResult<usize>;

    /// BTC value (18 decimals) of everything the peak holds
    fn portfolio_value(&self, this: &Address, storage: &PeakStorage, market: &Market) -> IbbtcResult<u128>;

    /// Preview of `mint`; equals its outcome under unchanged rates
    fn calc_mint(&self, view: &LedgerView<'_>, pool_id: PoolId, amount: u128) -> IbbtcResult<MintQuote>;

    /// Preview of `redeem`; equals its outcome under unchanged rates
    fn calc_redeem(&self, view: &LedgerView<'_>, pool_id: PoolId, bbtc: u128) -> IbbtcResult<RedeemQuote>;

    /// Deposit `amount` local units from the caller, returning bBTC issued
    fn mint(&self, env: &mut PeakEnv<'_>, pool_id: PoolId, amount: u128, min_out: u128) -> IbbtcResult<u128>;

    /// Burn `bbtc` from the caller, returning local units released
    fn redeem(&self, env: &mut PeakEnv<'_>, pool_id: PoolId, bbtc: u128, min_out: u128) -> IbbtcResult<u128>;

    fn box_clone(&self) -> Box<dyn Peak>;

    fn as_any(&self) -> &dyn Any;
}

impl Clone for Box<dyn Peak> {
    fn clone(&self) -> Self {
        self.box_clone()
    }
}

/// Abort with `SLIPPAGE` when `actual` falls below the caller's minimum
pub fn check_min_out(actual: u128, minimum: u128) -> IbbtcResult<()> {
    if actual < minimum {
        return Err(IbbtcError::SlippageExceeded { minimum, actual });
    }
    Ok(())
}

/// Trim a redemption so that releasing it lowers the floored BTC value of
/// `held` by no more than the burn pays for
///
/// `release` is the floored inverse conversion of `btc_wide` and
/// `value_of` is the peak's own valuation of a holding. A peak values
/// each holding with its own floor, so the drop can exceed
/// `floor(btc_wide / 1e18)` by one unit of value; the release is trimmed by
/// at most `REDEEM_ROUNDING_SLACK` local units to absorb it. A release
/// above `held` is returned untouched and fails at transfer.
pub fn bounded_release(
    held: u128,
    release: u128,
    btc_wide: U256,
    value_of: impl Fn(u128) -> IbbtcResult<u128>,
) -> IbbtcResult<u128> {
    if release > held {
        return Ok(release);
    }
    let entitled = math::narrow(btc_wide / U256::from(precision::WAD))?;
    let before = value_of(held)?;
    let mut trimmed = release;
    loop {
        let released = math::safe_sub(before, value_of(held - trimmed)?)?;
        if released <= entitled {
            return Ok(trimmed);
        }
        if release - trimmed >= rounding::REDEEM_ROUNDING_SLACK {
            return Err(IbbtcError::RoundingSlackExceeded { released, entitled });
        }
        trimmed = math::safe_sub(trimmed, 1)?;
    }
}

// ============ Storage ============

/// Adapter state owned by a proxy, borsh-encoded
///
/// The layout belongs to the adapter family; every logic revision of that
/// family decodes the same bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct PeakStorage {
    slot: Vec<u8>,
}

impl PeakStorage {
    /// Storage holding `state`
    pub fn encode<S: BorshSerialize>(state: &S) -> IbbtcResult<Self> {
        let slot = borsh::to_vec(state).map_err(|_| IbbtcError::StorageLayout)?;
        Ok(Self { slot })
    }

    /// Decode the stored state
    pub fn load<S: BorshDeserialize>(&self) -> IbbtcResult<S> {
        borsh::from_slice(&self.slot).map_err(|_| IbbtcError::StorageLayout)
    }

    /// Replace the stored state
    pub fn store<S: BorshSerialize>(&mut self, state: &S) -> IbbtcResult<()> {
        *self = Self::encode(state)?;
        Ok(())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.slot
    }
}

// ============ Call Contexts ============

/// Live portfolio values of every deployed peak
#[derive(Clone, Copy)]
pub struct Valuations<'a> {
    peaks: &'a PeakTable,
    market: &'a Market,
}

impl<'a> Valuations<'a> {
    pub fn new(peaks: &'a PeakTable, market: &'a Market) -> Self {
        Self { peaks, market }
    }
}

impl PortfolioSource for Valuations<'_> {
    fn portfolio_value(&self, peak: &Address) -> IbbtcResult<u128> {
        match self.peaks.get(peak) {
            Some(proxy) => proxy.implementation().portfolio_value(peak, proxy.storage(), self.market),
            None if self.market.is_deployed(peak) => {
                Err(IbbtcError::UnsupportedModule { address: *peak, expected: "peak" })
            }
            None => Err(IbbtcError::NotAContract { address: *peak }),
        }
    }
}

/// Read-only context for previews
pub struct LedgerView<'a> {
    pub this: Address,
    /// Storage of the executing peak
    pub storage: &'a PeakStorage,
    pub core: &'a Core,
    pub peaks: &'a PeakTable,
    pub market: &'a Market,
}

impl<'a> LedgerView<'a> {
    pub fn valuations(&self) -> Valuations<'a> {
        Valuations::new(self.peaks, self.market)
    }

    /// bBTC and fee the ledger would issue for `btc`
    pub fn btc_to_bbtc(&self, btc: u128) -> IbbtcResult<(u128, u128)> {
        self.core.btc_to_bbtc(btc, &self.valuations())
    }

    /// Wide BTC value and fee the ledger would release for `bbtc`
    pub fn bbtc_to_btc(&self, bbtc: u128) -> IbbtcResult<(U256, u128)> {
        self.core.bbtc_to_btc(bbtc, &self.valuations())
    }
}

/// Mutable context handed to a peak for the duration of one call
pub struct PeakEnv<'a> {
    /// Proxy address of the executing peak
    pub this: Address,
    /// End account that invoked the peak
    pub caller: Address,
    /// Storage of the executing peak
    pub storage: &'a PeakStorage,
    pub core: &'a mut Core,
    pub peaks: &'a PeakTable,
    pub market: &'a mut Market,
}

impl PeakEnv<'_> {
    /// Ask the ledger to issue bBTC to the caller for `btc`
    pub fn ledger_mint(&mut self, btc: u128) -> IbbtcResult<MintQuote> {
        let source = Valuations::new(self.peaks, &*self.market);
        self.core.mint(&self.this, btc, &self.caller, &source)
    }

    /// Ask the ledger to burn `bbtc` from the caller
    pub fn ledger_redeem(&mut self, bbtc: u128) -> IbbtcResult<(U256, u128)> {
        let source = Valuations::new(self.peaks, &*self.market);
        self.core.redeem(&self.this, bbtc, &self.caller, &source)
    }
}

// ============ Proxy Table ============

/// Stable identity and storage of a deployed peak plus its swappable logic
#[derive(Debug, Clone)]
pub struct PeakProxy {
    admin: Address,
    implementation: Box<dyn Peak>,
    storage: PeakStorage,
    revision: u32,
}

impl PeakProxy {
    /// Proxy admin (the deployer)
    pub fn admin(&self) -> Address {
        self.admin
    }

    pub fn implementation(&self) -> &dyn Peak {
        self.implementation.as_ref()
    }

    pub fn storage(&self) -> &PeakStorage {
        &self.storage
    }

    /// Logic together with writable storage, for administrative calls
    pub fn parts_mut(&mut self) -> (&dyn Peak, &mut PeakStorage) {
        (self.implementation.as_ref(), &mut self.storage)
    }

    /// Number of logic swaps since deployment
    pub fn revision(&self) -> u32 {
        self.revision
    }
}

/// Every deployed peak proxy by address
#[derive(Debug, Clone, Default)]
pub struct PeakTable {
    proxies: BTreeMap<Address, PeakProxy>,
}

impl PeakTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deploy a proxy at `address` owned by `admin`
    pub fn deploy(
        &mut self,
        address: Address,
        admin: Address,
        implementation: Box<dyn Peak>,
        storage: PeakStorage,
    ) -> IbbtcResult<()> {
        if self.proxies.contains_key(&address) {
            return Err(IbbtcError::AddressInUse { address });
        }
        self.proxies.insert(address, PeakProxy { admin, implementation, storage, revision: 0 });
        Ok(())
    }

    /// Swap the logic behind `peak`, returning the new revision
    ///
    /// Storage stays with the proxy.
    pub fn update_implementation(
        &mut self,
        caller: &Address,
        peak: &Address,
        implementation: Box<dyn Peak>,
    ) -> IbbtcResult<u32> {
        let proxy = self.proxy_mut(peak)?;
        if proxy.admin != *caller {
            return Err(IbbtcError::NotOwner { caller: *caller });
        }
        proxy.implementation = implementation;
        proxy.revision = proxy.revision.saturating_add(1);
        Ok(proxy.revision)
    }

    pub fn get(&self, peak: &Address) -> Option<&PeakProxy> {
        self.proxies.get(peak)
    }

    /// Proxy at `peak`, or `NotAContract`
    pub fn proxy(&self, peak: &Address) -> IbbtcResult<&PeakProxy> {
        self.proxies.get(peak).ok_or(IbbtcError::NotAContract { address: *peak })
    }

    pub fn proxy_mut(&mut self, peak: &Address) -> IbbtcResult<&mut PeakProxy> {
        self.proxies.get_mut(peak).ok_or(IbbtcError::NotAContract { address: *peak })
    }

    pub fn contains(&self, peak: &Address) -> bool {
        self.proxies.contains_key(peak)
    }

    pub fn len(&self) -> usize {
        self.proxies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }
}

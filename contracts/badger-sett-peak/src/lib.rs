//! Badger Sett Peak
//!
//! Multi-pool adapter. Each whitelisted pool pairs a curve swap with the
//! Badger sett that wraps the swap's LP token; the peak holds sett shares
//! and values them through two quotes:
//!
//! ```text
//! btc  = sett * virtual_price * ppfs / 1e36
//! sett = btc_wide * 1e18 / ppfs / virtual_price
//! ```
//!
//! Holdings are per sett, so redeeming against a pool only ever releases
//! that pool's sett shares. The pool table and its owner live in the
//! proxy's storage as [`BadgerSettStorage`].

use std::any::Any;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use ibbtc_common::{
    constants::registry,
    errors::{IbbtcError, IbbtcResult},
    market::Market,
    math,
    types::{Address, CurvePool, MintQuote, PoolId, RedeemQuote},
    U256,
};
use ibbtc_core::{bounded_release, check_min_out, LedgerView, Peak, PeakEnv, PeakStorage};


/// Quotes of one pool, read once per call
struct PoolRate {
    price_per_full_share: u128,
    virtual_price: u128,
}

impl PoolRate {
    fn read(pool: &CurvePool, market: &Market) -> IbbtcResult<Self> {
        Ok(Self {
            price_per_full_share: market.price_per_full_share(&pool.sett)?,
            virtual_price: market.virtual_price(&pool.swap)?,
        })
    }

    fn to_btc(&self, sett: u128) -> IbbtcResult<u128> {
        math::sett_to_btc(sett, self.price_per_full_share, self.virtual_price)
    }

    /// Sett shares to release for `btc_wide` out of `held`
    fn to_sett(&self, btc_wide: U256, held: u128) -> IbbtcResult<u128> {
        let sett = math::wide_btc_to_sett(btc_wide, self.price_per_full_share, self.virtual_price)?;
        bounded_release(held, sett, btc_wide, |sett| self.to_btc(sett))
    }
}

/// Per-proxy state of a Badger sett peak
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct BadgerSettStorage {
    /// May replace the pool table
    pub owner: Address,
    pub pools: Vec<CurvePool>,
}

impl BadgerSettStorage {
    /// Empty pool table
    pub fn new(owner: Address) -> Self {
        Self { owner, pools: Vec::new() }
    }

    /// Pool at `pool_id`
    pub fn pool(&self, pool_id: PoolId) -> IbbtcResult<CurvePool> {
        self.pools
            .get(pool_id)
            .copied()
            .ok_or(IbbtcError::InvalidPoolId { pool_id, num_pools: self.pools.len() })
    }
}

/// Peak logic over a table of curve pool + sett pairs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BadgerSettPeak;

impl BadgerSettPeak {
    /// Initial proxy storage: no pools, `owner` may add them
    pub fn storage(owner: Address) -> IbbtcResult<PeakStorage> {
        PeakStorage::encode(&BadgerSettStorage::new(owner))
    }

    pub fn load(storage: &PeakStorage) -> IbbtcResult<BadgerSettStorage> {
        storage.load()
    }

    /// Replace the whole pool table; pool ids are positions in `pools`
    pub fn modify_whitelisted_curve_pools(
        &self,
        storage: &mut PeakStorage,
        caller: &Address,
        pools: Vec<CurvePool>,
    ) -> IbbtcResult<()> {
        let mut state = Self::load(storage)?;
        if *caller != state.owner {
            return Err(IbbtcError::NotOwner { caller: *caller });
        }
        if pools.len() > registry::MAX_POOLS_PER_PEAK {
            return Err(IbbtcError::InvalidParameters);
        }
        state.pools = pools;
        storage.store(&state)?;
        info!(num_pools = state.pools.len(), "curve pools replaced");
        Ok(())
    }

    fn pool(storage: &PeakStorage, pool_id: PoolId) -> IbbtcResult<CurvePool> {
        Self::load(storage)?.pool(pool_id)
    }
}

impl Peak for BadgerSettPeak {
    fn kind(&self) -> &'static str {
        "badger-sett"
    }

    fn num_pools(&self, storage: &PeakStorage) -> IbbtcResult<usize> {
        Ok(Self::load(storage)?.pools.len())
    }

    fn portfolio_value(&self, this: &Address, storage: &PeakStorage, market: &Market) -> IbbtcResult<u128> {
        let mut total = 0u128;
        for pool in &Self::load(storage)?.pools {
            let held = market.balance_of(&pool.sett, this);
            total = math::safe_add(total, PoolRate::read(pool, market)?.to_btc(held)?)?;
        }
        Ok(total)
    }

    fn calc_mint(&self, view: &LedgerView<'_>, pool_id: PoolId, amount: u128) -> IbbtcResult<MintQuote> {
        let pool = Self::pool(view.storage, pool_id)?;
        let btc = PoolRate::read(&pool, view.market)?.to_btc(amount)?;
        let (bbtc, fee) = view.btc_to_bbtc(btc)?;
        Ok(MintQuote { bbtc, fee })
    }

    fn calc_redeem(&self, view: &LedgerView<'_>, pool_id: PoolId, bbtc: u128) -> IbbtcResult<RedeemQuote> {
        let pool = Self::pool(view.storage, pool_id)?;
        let rate = PoolRate::read(&pool, view.market)?;
        let held = view.market.balance_of(&pool.sett, &view.this);
        let (btc, fee) = view.bbtc_to_btc(bbtc)?;
        Ok(RedeemQuote { amount: rate.to_sett(btc, held)?, fee, max: held })
    }

    fn mint(&self, env: &mut PeakEnv<'_>, pool_id: PoolId, amount: u128, min_out: u128) -> IbbtcResult<u128> {
        let pool = Self::pool(env.storage, pool_id)?;
        let btc = PoolRate::read(&pool, env.market)?.to_btc(amount)?;

        let quote = env.ledger_mint(btc)?;
        check_min_out(quote.bbtc, min_out)?;

        env.market.transfer(&pool.sett, &env.caller, &env.this, amount)?;
        debug!(pool_id, amount, bbtc = quote.bbtc, "sett deposited");
        Ok(quote.bbtc)
    }

    fn redeem(&self, env: &mut PeakEnv<'_>, pool_id: PoolId, bbtc: u128, min_out: u128) -> IbbtcResult<u128> {
        let pool = Self::pool(env.storage, pool_id)?;
        let rate = PoolRate::read(&pool, env.market)?;
        let held = env.market.balance_of(&pool.sett, &env.this);

        let (btc, _fee) = env.ledger_redeem(bbtc)?;
        let sett = rate.to_sett(btc, held)?;
        check_min_out(sett, min_out)?;

        env.market.transfer(&pool.sett, &env.this, &env.caller, sett)?;
        debug!(pool_id, bbtc, sett, "sett released");
        Ok(sett)
    }

    fn box_clone(&self) -> Box<dyn Peak> {
        Box::new(*self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

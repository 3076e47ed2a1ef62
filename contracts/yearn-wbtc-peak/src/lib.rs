//! Yearn wBTC Peak
//!
//! Single-vault adapter: holds shares of one yearn-style vault over a BTC
//! source asset (wBTC) and values them through the vault's price per share.
//! There is exactly one pool, id `0`.
//!
//! ```text
//! btc    = shares * pps * 10^(18 - asset_decimals) / 10^vault_decimals
//! shares = btc_wide / 10^(36 - asset_decimals - vault_decimals) / pps
//! ```

use std::any::Any;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use tracing::debug;

use ibbtc_common::{
    errors::{IbbtcError, IbbtcResult},
    market::Market,
    math,
    types::{Address, MintQuote, PoolId, RedeemQuote},
    U256,
};
use ibbtc_core::{bounded_release, check_min_out, LedgerView, Peak, PeakEnv, PeakStorage};

/// The only pool id
pub const POOL_ID: PoolId = 0;

/// Exchange rate of the vault, read once per call
struct VaultRate {
    price_per_share: u128,
    asset_decimals: u8,
    vault_decimals: u8,
}

impl VaultRate {
    fn to_btc(&self, shares: u128) -> IbbtcResult<u128> {
        math::vault_to_btc(shares, self.price_per_share, self.asset_decimals, self.vault_decimals)
    }

    /// Vault shares to release for `btc_wide` out of `held`
    fn to_shares(&self, btc_wide: U256, held: u128) -> IbbtcResult<u128> {
        let shares =
            math::wide_btc_to_vault(btc_wide, self.price_per_share, self.asset_decimals, self.vault_decimals)?;
        bounded_release(held, shares, btc_wide, |shares| self.to_btc(shares))
    }
}

/// Per-proxy state of a yearn wBTC peak
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct YearnWbtcStorage {
    pub source_asset: Address,
    pub vault: Address,
}

impl YearnWbtcStorage {
    fn rate(&self, market: &Market) -> IbbtcResult<VaultRate> {
        Ok(VaultRate {
            price_per_share: market.price_per_share(&self.vault)?,
            asset_decimals: market.decimals(&self.source_asset)?,
            vault_decimals: market.decimals(&self.vault)?,
        })
    }
}

/// Peak logic over one yield vault
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct YearnWbtcPeak;

impl YearnWbtcPeak {
    /// Initial proxy storage bound to `vault`, taking its underlying token
    /// as the source asset
    pub fn storage(vault: Address, market: &Market) -> IbbtcResult<PeakStorage> {
        PeakStorage::encode(&YearnWbtcStorage { source_asset: market.vault_token(&vault)?, vault })
    }

    pub fn load(storage: &PeakStorage) -> IbbtcResult<YearnWbtcStorage> {
        storage.load()
    }

    fn check_pool(pool_id: PoolId) -> IbbtcResult<()> {
        if pool_id != POOL_ID {
            return Err(IbbtcError::InvalidPoolId { pool_id, num_pools: 1 });
        }
        Ok(())
    }
}

impl Peak for YearnWbtcPeak {
    fn kind(&self) -> &'static str {
        "yearn-wbtc"
    }

    fn num_pools(&self, storage: &PeakStorage) -> IbbtcResult<usize> {
        Self::load(storage)?;
        Ok(1)
    }

    fn portfolio_value(&self, this: &Address, storage: &PeakStorage, market: &Market) -> IbbtcResult<u128> {
        let state = Self::load(storage)?;
        state.rate(market)?.to_btc(market.balance_of(&state.vault, this))
    }

    fn calc_mint(&self, view: &LedgerView<'_>, pool_id: PoolId, amount: u128) -> IbbtcResult<MintQuote> {
        Self::check_pool(pool_id)?;
        let btc = Self::load(view.storage)?.rate(view.market)?.to_btc(amount)?;
        let (bbtc, fee) = view.btc_to_bbtc(btc)?;
        Ok(MintQuote { bbtc, fee })
    }

    fn calc_redeem(&self, view: &LedgerView<'_>, pool_id: PoolId, bbtc: u128) -> IbbtcResult<RedeemQuote> {
        Self::check_pool(pool_id)?;
        let state = Self::load(view.storage)?;
        let rate = state.rate(view.market)?;
        let held = view.market.balance_of(&state.vault, &view.this);
        let (btc, fee) = view.bbtc_to_btc(bbtc)?;
        Ok(RedeemQuote { amount: rate.to_shares(btc, held)?, fee, max: held })
    }

    fn mint(&self, env: &mut PeakEnv<'_>, pool_id: PoolId, amount: u128, min_out: u128) -> IbbtcResult<u128> {
        Self::check_pool(pool_id)?;
        let state = Self::load(env.storage)?;
        let btc = state.rate(env.market)?.to_btc(amount)?;

        let quote = env.ledger_mint(btc)?;
        check_min_out(quote.bbtc, min_out)?;

        env.market.transfer(&state.vault, &env.caller, &env.this, amount)?;
        debug!(amount, bbtc = quote.bbtc, "vault shares deposited");
        Ok(quote.bbtc)
    }

    fn redeem(&self, env: &mut PeakEnv<'_>, pool_id: PoolId, bbtc: u128, min_out: u128) -> IbbtcResult<u128> {
        Self::check_pool(pool_id)?;
        let state = Self::load(env.storage)?;
        let rate = state.rate(env.market)?;
        let held = env.market.balance_of(&state.vault, &env.this);

        let (btc, _fee) = env.ledger_redeem(bbtc)?;
        let shares = rate.to_shares(btc, held)?;
        check_min_out(shares, min_out)?;

        env.market.transfer(&state.vault, &env.this, &env.caller, shares)?;
        debug!(bbtc, shares, "vault shares released");
        Ok(shares)
    }

    fn box_clone(&self) -> Box<dyn Peak> {
        Box::new(*self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

//! Valuation and Fee Math for the ibBTC Protocol
//!
//! Pure conversions between peak-local units (sett shares, vault shares),
//! the common 18-decimal BTC unit and bBTC. Products are formed in 256-bit
//! space and every division floors, which always rounds toward the ledger.
//!
//! Three magnitudes appear:
//! - **BTC value** (`u128`, 18 decimals) as produced by the mint direction
//! - **wide BTC value** (`U256`, 36 decimals) as produced on redemption,
//!   `net_bbtc * price_per_share`, kept wide so the inverse conversion loses
//!   no precision before its final floor
//! - **share price** (`u128`, 18 decimals), BTC per bBTC

use crate::constants::{fees, precision};
use crate::errors::{IbbtcError, IbbtcResult};
use primitive_types::U256;

// ============ Wide Arithmetic Helpers ============

fn wide(value: u128) -> U256 {
    U256::from(value)
}

fn pow10(exp: u32) -> U256 {
    U256::exp10(exp as usize)
}

fn mul(a: U256, b: U256) -> IbbtcResult<U256> {
    a.checked_mul(b).ok_or(IbbtcError::Overflow)
}

fn div(a: U256, b: U256) -> IbbtcResult<U256> {
    a.checked_div(b).ok_or(IbbtcError::DivisionByZero)
}

/// Narrow a 256-bit intermediate back to `u128`
pub fn narrow(value: U256) -> IbbtcResult<u128> {
    if value > wide(u128::MAX) {
        return Err(IbbtcError::Overflow);
    }
    Ok(value.low_u128())
}

/// Safe addition with overflow check
pub fn safe_add(a: u128, b: u128) -> IbbtcResult<u128> {
    a.checked_add(b).ok_or(IbbtcError::Overflow)
}

/// Safe subtraction with underflow check
pub fn safe_sub(a: u128, b: u128) -> IbbtcResult<u128> {
    a.checked_sub(b).ok_or(IbbtcError::Underflow)
}

// ============ Fee Math ============

/// Fee on `amount` at `fee_bps` basis points, floored
///
/// Flooring the fee favors the caller by less than one base unit of bBTC,
/// while every conversion into the caller's asset floors the other way.
pub fn fee_of(amount: u128, fee_bps: u128) -> IbbtcResult<u128> {
    narrow(div(mul(wide(amount), wide(fee_bps))?, wide(fees::PRECISION))?)
}

/// Split `amount` into `(amount - fee, fee)`
pub fn deduct_fee(amount: u128, fee_bps: u128) -> IbbtcResult<(u128, u128)> {
    let fee = fee_of(amount, fee_bps)?;
    Ok((safe_sub(amount, fee)?, fee))
}

// ============ Share Price ============

/// Share price in 18-decimal BTC per bBTC
///
/// `shares` is bBTC supply plus accrued-but-uncollected fee. With no shares
/// outstanding the price is exactly 1.0 so the first mint bootstraps 1:1.
pub fn price_per_share(total_assets: u128, shares: u128) -> IbbtcResult<u128> {
    if shares == 0 {
        return Ok(precision::WAD);
    }
    narrow(div(mul(wide(total_assets), wide(precision::WAD))?, wide(shares))?)
}

/// bBTC issued for a BTC value, before the mint fee
///
/// `btc * shares / total_assets`, or 1:1 while no shares exist.
pub fn btc_to_shares(btc: u128, shares: u128, total_assets: u128) -> IbbtcResult<u128> {
    if shares == 0 {
        return Ok(btc);
    }
    narrow(div(mul(wide(btc), wide(shares))?, wide(total_assets))?)
}

/// Wide (36-decimal) BTC value of a net bBTC amount at a share price
pub fn shares_to_wide_btc(net_bbtc: u128, price_per_share: u128) -> IbbtcResult<U256> {
    mul(wide(net_bbtc), wide(price_per_share))
}

// ============ Curve Pool + Sett (two-rate) Valuation ============

/// BTC value of sett shares: `shares * virtual_price * ppfs / 1e36`
///
/// `price_per_full_share` converts sett shares to curve LP tokens and
/// `virtual_price` converts LP tokens to BTC; both are 18-decimal quotes.
pub fn sett_to_btc(shares: u128, price_per_full_share: u128, virtual_price: u128) -> IbbtcResult<u128> {
    let value = mul(mul(wide(shares), wide(virtual_price))?, wide(price_per_full_share))?;
    narrow(div(value, pow10(2 * precision::WAD_DECIMALS))?)
}

/// Sett shares released for a wide BTC value: `btc * 1e18 / ppfs / virtual_price`
pub fn wide_btc_to_sett(
    btc_wide: U256,
    price_per_full_share: u128,
    virtual_price: u128,
) -> IbbtcResult<u128> {
    let scaled = mul(btc_wide, wide(precision::WAD))?;
    let lp = div(scaled, wide(price_per_full_share))?;
    narrow(div(lp, wide(virtual_price))?)
}

// ============ Yield Vault (one-rate) Valuation ============

fn check_decimals(asset_decimals: u8, vault_decimals: u8) -> IbbtcResult<()> {
    if asset_decimals as u32 > precision::WAD_DECIMALS
        || asset_decimals as u32 + vault_decimals as u32 > precision::WIDE_DECIMALS
    {
        return Err(IbbtcError::InvalidParameters);
    }
    Ok(())
}

/// BTC value of vault shares
///
/// `price_per_share` is quoted in the source asset's units per whole vault
/// share (`10^vault_decimals` base units), so
/// `btc = shares * pps * 10^(18 - asset_decimals) / 10^vault_decimals`.
pub fn vault_to_btc(
    shares: u128,
    price_per_share: u128,
    asset_decimals: u8,
    vault_decimals: u8,
) -> IbbtcResult<u128> {
    check_decimals(asset_decimals, vault_decimals)?;
    let to_wad = pow10(precision::WAD_DECIMALS - asset_decimals as u32);
    let value = mul(mul(wide(shares), wide(price_per_share))?, to_wad)?;
    narrow(div(value, pow10(vault_decimals as u32))?)
}

/// Vault shares released for a wide BTC value
///
/// `btc / 10^(36 - asset_decimals - vault_decimals) / pps`, the exact
/// inverse of [`vault_to_btc`] up to the final floor.
pub fn wide_btc_to_vault(
    btc_wide: U256,
    price_per_share: u128,
    asset_decimals: u8,
    vault_decimals: u8,
) -> IbbtcResult<u128> {
    check_decimals(asset_decimals, vault_decimals)?;
    let exp = precision::WIDE_DECIMALS - asset_decimals as u32 - vault_decimals as u32;
    let asset = div(btc_wide, pow10(exp))?;
    narrow(div(asset, wide(price_per_share))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::precision::WAD;

    #[test]
    fn test_fee_floors() {
        // 123_456_789 * 10 / 10_000 = 123_456.789
        assert_eq!(fee_of(123_456_789, 10).unwrap(), 123_456);
        assert_eq!(deduct_fee(123_456_789, 10).unwrap(), (123_333_333, 123_456));
        assert_eq!(fee_of(999, 10).unwrap(), 0);
        assert_eq!(fee_of(1_000, 0).unwrap(), 0);
    }

    #[test]
    fn test_price_per_share_bootstrap() {
        assert_eq!(price_per_share(0, 0).unwrap(), WAD);
        assert_eq!(price_per_share(5 * WAD, 0).unwrap(), WAD);
        assert_eq!(price_per_share(3 * WAD, 2 * WAD).unwrap(), 3 * WAD / 2);
    }

    #[test]
    fn test_btc_to_shares() {
        assert_eq!(btc_to_shares(7, 0, 0).unwrap(), 7);
        // 10 * 3 / 4 = 7.5 -> 7
        assert_eq!(btc_to_shares(10, 3, 4).unwrap(), 7);
        assert_eq!(btc_to_shares(10, 3, 0), Err(IbbtcError::DivisionByZero));
    }

    #[test]
    fn test_sett_valuation() {
        // 10 shares at ppfs 1.05 and virtual price 1.02
        let btc = sett_to_btc(10 * WAD, 1_050_000_000_000_000_000, 1_020_000_000_000_000_000).unwrap();
        assert_eq!(btc, 10_710_000_000_000_000_000);

        let btc_wide = U256::from(btc) * U256::from(WAD);
        let back = wide_btc_to_sett(btc_wide, 1_050_000_000_000_000_000, 1_020_000_000_000_000_000).unwrap();
        assert_eq!(back, 10 * WAD);
    }

    #[test]
    fn test_vault_valuation_wbtc_like() {
        // 0.5 vault share at pps 1.0 (8-decimal vault over an 8-decimal asset)
        assert_eq!(vault_to_btc(50_000_000, 100_000_000, 8, 8).unwrap(), WAD / 2);
        assert_eq!(vault_to_btc(1, 100_000_000, 8, 8).unwrap(), 10_000_000_000);
    }

    #[test]
    fn test_vault_inverse_floors() {
        // Wide value slightly short of 0.5 BTC floors to one unit below 0.5 shares
        let btc_wide = U256::from_dec_str("499999999999999999909214769325897064").unwrap();
        assert_eq!(wide_btc_to_vault(btc_wide, 100_000_000, 8, 8).unwrap(), 49_999_999);

        let exact = U256::from(WAD / 2) * U256::from(WAD);
        assert_eq!(wide_btc_to_vault(exact, 100_000_000, 8, 8).unwrap(), 50_000_000);
    }

    #[test]
    fn test_vault_rejects_bad_decimals() {
        assert_eq!(vault_to_btc(1, 1, 19, 8), Err(IbbtcError::InvalidParameters));
        assert_eq!(wide_btc_to_vault(U256::one(), 1, 18, 19), Err(IbbtcError::InvalidParameters));
    }

    #[test]
    fn test_zero_rate_is_division_error() {
        assert_eq!(wide_btc_to_sett(U256::one(), 0, WAD), Err(IbbtcError::DivisionByZero));
        assert_eq!(wide_btc_to_vault(U256::one(), 0, 8, 8), Err(IbbtcError::DivisionByZero));
    }

    #[test]
    fn test_narrow_overflow() {
        assert_eq!(narrow(U256::from(u128::MAX) + U256::one()), Err(IbbtcError::Overflow));
        assert_eq!(narrow(U256::from(42u8)).unwrap(), 42);
    }
}

//! Protocol Constants
//!
//! All magic numbers and configuration values for the ibBTC protocol.
//! Runtime-tunable values (mint/redeem fee, fee sink) live in the ledger's
//! `FeeConfig`; everything here is fixed at compile time.

/// Claim token metadata
pub mod token {
    /// Token name
    pub const NAME: &str = "interest-bearing Badger BTC";
    /// Token symbol
    pub const SYMBOL: &str = "bBTC";
    /// Decimal places (same as the common BTC unit)
    pub const DECIMALS: u8 = 18;
}

/// Fee Configuration (in basis points over `PRECISION`)
pub mod fees {
    /// Fee denominator: 10_000 = 100%
    pub const PRECISION: u128 = 10_000;

    /// Largest fee `setConfig` accepts
    pub const MAX_FEE: u128 = PRECISION;

    /// Fee charged on mint and redeem at deployment (0.1%)
    pub const DEFAULT_FEE_BPS: u128 = 10;
}

/// Fixed-point scales
pub mod precision {
    /// 18-decimal fixed point: the common BTC unit and the share price unit
    pub const WAD: u128 = 1_000_000_000_000_000_000;

    /// Exponent of `WAD`
    pub const WAD_DECIMALS: u32 = 18;

    /// Exponent of the 36-decimal "wide" BTC value produced on redemption
    /// (bBTC amount times share price)
    pub const WIDE_DECIMALS: u32 = 36;
}

/// Underlying BTC token conventions
pub mod btc {
    /// Decimals of wrapped BTC tokens (satoshi precision)
    pub const WBTC_DECIMALS: u8 = 8;
}

/// Rounding tolerances
pub mod rounding {
    /// Largest number of peak-local units a redemption may be trimmed by
    /// so that releasing them lowers the peak's floored value by no more
    /// than the burn pays for.
    pub const REDEEM_ROUNDING_SLACK: u128 = 1;
}

/// Registry limits
pub mod registry {
    /// Domain tag mixed into derived module addresses
    pub const ADDRESS_DOMAIN: &[u8] = b"ibbtc.module.v1";

    /// Maximum number of pools a multi-pool peak may whitelist at once
    pub const MAX_POOLS_PER_PEAK: usize = 32;
}

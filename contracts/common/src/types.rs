//! Core Types for the ibBTC Protocol
//!
//! This module defines the data structures shared by the ledger and every
//! peak adapter.

use crate::constants::{fees, registry};
use crate::errors::{IbbtcError, IbbtcResult};
use crate::guest_list::GuestList;
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Type alias for addresses (32-byte hash)
pub type Address = [u8; 32];

/// The null address
pub const ZERO_ADDRESS: Address = [0u8; 32];

/// Index into a peak's pool table
pub type PoolId = usize;

/// Derive a deterministic module address from its deployer and a salt
pub fn derive_address(deployer: &Address, salt: &[u8]) -> Address {
    let mut hasher = Sha256::new();
    hasher.update(registry::ADDRESS_DOMAIN);
    hasher.update(deployer);
    hasher.update(salt);
    let result = hasher.finalize();
    let mut address = [0u8; 32];
    address.copy_from_slice(&result);
    address
}

// ============ Peak Lifecycle ============

/// Lifecycle state of a peak in the ledger registry
///
/// ```text
/// Extinct --whitelistPeak--> Active <--setPeakStatus--> Dormant
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
#[borsh(use_discriminant = true)]
#[repr(u8)]
pub enum PeakStatus {
    /// Unregistered or retired: no mint, no redeem, excluded from assets
    #[default]
    Extinct = 0,
    /// Mint and redeem allowed, counted in assets
    Active = 1,
    /// Redeem only, still counted in assets
    Dormant = 2,
}

impl PeakStatus {
    /// Parse a raw status value, rejecting anything outside the enum domain
    pub fn from_u8(value: u8) -> IbbtcResult<Self> {
        match value {
            0 => Ok(Self::Extinct),
            1 => Ok(Self::Active),
            2 => Ok(Self::Dormant),
            _ => Err(IbbtcError::InvalidPeakStatus { value }),
        }
    }

    /// Raw value as stored in the registry
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// New bBTC may be issued through the peak
    pub fn can_mint(self) -> bool {
        self == Self::Active
    }

    /// Existing bBTC may be redeemed through the peak
    pub fn can_redeem(self) -> bool {
        self != Self::Extinct
    }

    /// Peak's portfolio counts toward total system assets
    pub fn counts_toward_assets(self) -> bool {
        self != Self::Extinct
    }
}

// ============ Fee Configuration ============

/// Ledger fee configuration, replaced as a whole by `setConfig`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct FeeConfig {
    /// Mint fee in basis points over `fees::PRECISION`
    pub mint_fee: u128,
    /// Redeem fee in basis points over `fees::PRECISION`
    pub redeem_fee: u128,
    /// Recipient of collected fees
    pub fee_sink: Address,
}

impl FeeConfig {
    /// Creates a validated fee configuration
    pub fn new(mint_fee: u128, redeem_fee: u128, fee_sink: Address) -> IbbtcResult<Self> {
        if mint_fee > fees::MAX_FEE || redeem_fee > fees::MAX_FEE {
            return Err(IbbtcError::InvalidParameters);
        }
        if fee_sink == ZERO_ADDRESS {
            return Err(IbbtcError::NullAddress);
        }
        Ok(Self { mint_fee, redeem_fee, fee_sink })
    }

    /// Deployment fees (`DEFAULT_FEE_BPS` on both sides) paid to `fee_sink`
    pub fn standard(fee_sink: Address) -> IbbtcResult<Self> {
        Self::new(fees::DEFAULT_FEE_BPS, fees::DEFAULT_FEE_BPS, fee_sink)
    }
}

impl Default for FeeConfig {
    /// Zero fees and no sink, the state of a freshly constructed ledger
    fn default() -> Self {
        Self {
            mint_fee: 0,
            redeem_fee: 0,
            fee_sink: ZERO_ADDRESS,
        }
    }
}

// ============ Adapter Types ============

/// One whitelisted pool of the multi-pool adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct CurvePool {
    /// Curve swap reporting the LP token's virtual price
    pub swap: Address,
    /// Sett vault wrapping the LP token; its shares are the peak-local asset
    pub sett: Address,
}

/// Preview of a mint: bBTC the caller receives and the fee withheld
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MintQuote {
    /// bBTC credited to the caller (net of fee)
    pub bbtc: u128,
    /// Fee accrued to the ledger, in bBTC
    pub fee: u128,
}

/// Preview of a redeem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RedeemQuote {
    /// Peak-local units released to the caller
    pub amount: u128,
    /// Fee accrued to the ledger, in bBTC
    pub fee: u128,
    /// Peak-local units the peak currently holds for the selected pool
    pub max: u128,
}

// ============ Action Types ============

/// Administrative actions on the Core ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub enum CoreAction {
    /// Register a deployed peak and mark it Active
    WhitelistPeak { peak: Address },
    /// Overwrite a registered peak's status (raw enum value)
    SetPeakStatus { peak: Address, status: u8 },
    /// Replace mint fee, redeem fee and fee sink together
    SetConfig { mint_fee: u128, redeem_fee: u128, fee_sink: Address },
    /// Install or remove the guest list
    SetGuestList { guest_list: Option<GuestList> },
    /// Mint accrued fees to the fee sink (not admin-gated)
    CollectFee,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peak_status_discriminants() {
        assert_eq!(PeakStatus::Extinct.as_u8(), 0);
        assert_eq!(PeakStatus::Active.as_u8(), 1);
        assert_eq!(PeakStatus::Dormant.as_u8(), 2);
        assert_eq!(PeakStatus::default(), PeakStatus::Extinct);
        assert_eq!(PeakStatus::from_u8(2), Ok(PeakStatus::Dormant));
        assert_eq!(PeakStatus::from_u8(3), Err(IbbtcError::InvalidPeakStatus { value: 3 }));
    }

    #[test]
    fn test_peak_status_gates() {
        assert!(PeakStatus::Active.can_mint());
        assert!(!PeakStatus::Dormant.can_mint());
        assert!(PeakStatus::Dormant.can_redeem());
        assert!(!PeakStatus::Extinct.can_redeem());
        assert!(PeakStatus::Dormant.counts_toward_assets());
        assert!(!PeakStatus::Extinct.counts_toward_assets());
    }

    #[test]
    fn test_peak_status_borsh_is_one_byte() {
        let bytes = borsh::to_vec(&PeakStatus::Dormant).unwrap();
        assert_eq!(bytes, vec![2u8]);
    }

    #[test]
    fn test_fee_config_validation() {
        let sink = [9u8; 32];
        assert!(FeeConfig::new(10, 10, sink).is_ok());
        assert!(FeeConfig::new(fees::PRECISION, 0, sink).is_ok());
        assert_eq!(FeeConfig::new(fees::PRECISION + 1, 0, sink), Err(IbbtcError::InvalidParameters));
        assert_eq!(FeeConfig::new(0, 0, ZERO_ADDRESS), Err(IbbtcError::NullAddress));
    }

    #[test]
    fn test_derive_address_deterministic() {
        let a = derive_address(&[1u8; 32], b"peak-0");
        let b = derive_address(&[1u8; 32], b"peak-0");
        let c = derive_address(&[1u8; 32], b"peak-1");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, ZERO_ADDRESS);
    }
}

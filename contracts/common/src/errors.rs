//! Error Types for the ibBTC Protocol
//!
//! Every failure is a whole-call abort. `IbbtcError::code` returns the
//! revert reason callers match on, so those strings are part of the
//! external interface and must not change.

use core::fmt;

use crate::types::Address;

/// Result type alias for ibBTC operations
pub type IbbtcResult<T> = Result<T, IbbtcError>;

/// Main error enum for all ibBTC protocol errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IbbtcError {
    // ============ Access Control Errors ============
    /// Caller is not the administrative authority of the target
    NotOwner { caller: Address },

    // ============ Registry Errors ============
    /// Peak has been registered before
    DuplicatePeak { peak: Address },

    /// No module is deployed at the address
    NotAContract { address: Address },

    /// Status change targets an address that was never whitelisted
    UnknownPeak { peak: Address },

    /// Raw status value outside the lifecycle enum domain
    InvalidPeakStatus { value: u8 },

    /// Registry read past the end of `peakAddresses`
    IndexOutOfRange { index: usize, len: usize },

    /// A module is already deployed at the address
    AddressInUse { address: Address },

    /// Module at the address does not expose the requested capability
    UnsupportedModule { address: Address, expected: &'static str },

    // ============ Lifecycle Errors ============
    /// Mint through a peak that is not Active
    PeakInactive { peak: Address },

    /// Redeem through an Extinct peak
    PeakExtinct { peak: Address },

    // ============ Amount Errors ============
    /// Mint would issue zero bBTC
    MintingZero,

    /// Redeem of zero bBTC
    RedeemingZero,

    /// Insufficient balance for operation
    InsufficientBalance { available: u128, requested: u128 },

    /// Computed output below the caller-specified minimum
    SlippageExceeded { minimum: u128, actual: u128 },

    /// Flooring would release more value than the burn pays for, by more
    /// than the rounding slack can absorb
    RoundingSlackExceeded { released: u128, entitled: u128 },

    // ============ Configuration Errors ============
    /// Fee above `PRECISION` or otherwise malformed configuration
    InvalidParameters,

    /// Required address is the zero address
    NullAddress,

    /// `collectFee` with nothing accrued
    NoFee,

    /// Pool id not present in the peak's pool table
    InvalidPoolId { pool_id: usize, num_pools: usize },

    /// Account is not on the guest list
    GuestListUnauthorized { account: Address },

    /// Peak storage does not decode as the layout its logic expects
    StorageLayout,

    // ============ Math Errors ============
    /// Arithmetic overflow occurred
    Overflow,

    /// Arithmetic underflow occurred
    Underflow,

    /// Division by zero
    DivisionByZero,
}

impl IbbtcError {
    /// Returns the revert reason for this error
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotOwner { .. } => "NOT_OWNER",
            Self::DuplicatePeak { .. } => "DUPLICATE_PEAK",
            Self::NotAContract { .. } => "function call to a non-contract account",
            Self::UnknownPeak { .. } => "UNKNOWN_PEAK",
            Self::InvalidPeakStatus { .. } => "INVALID_PEAK_STATUS",
            Self::IndexOutOfRange { .. } => "INDEX_OUT_OF_RANGE",
            Self::AddressInUse { .. } => "ADDRESS_IN_USE",
            Self::UnsupportedModule { .. } => "UNSUPPORTED_MODULE",
            Self::PeakInactive { .. } => "PEAK_INACTIVE",
            Self::PeakExtinct { .. } => "PEAK_EXTINCT",
            Self::MintingZero => "MINTING_0_bBTC",
            Self::RedeemingZero => "REDEEMING_0_bBTC",
            Self::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            Self::SlippageExceeded { .. } => "SLIPPAGE",
            Self::RoundingSlackExceeded { .. } => "ROUNDING_SLACK",
            Self::InvalidParameters => "INVALID_PARAMETERS",
            Self::NullAddress => "NULL_ADDRESS",
            Self::NoFee => "NO_FEE",
            Self::InvalidPoolId { .. } => "INVALID_POOL_ID",
            Self::GuestListUnauthorized { .. } => "guest-list-authorization",
            Self::StorageLayout => "STORAGE_LAYOUT",
            Self::Overflow => "OVERFLOW",
            Self::Underflow => "UNDERFLOW",
            Self::DivisionByZero => "DIVISION_BY_ZERO",
        }
    }

    /// Returns true if this error is recoverable (caller can fix it)
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::NotOwner { .. } => true,              // Retry as admin
            Self::InsufficientBalance { .. } => true,   // Get more funds
            Self::SlippageExceeded { .. } => true,      // Re-quote
            Self::MintingZero | Self::RedeemingZero => true, // Increase amount
            _ => false,
        }
    }
}

impl fmt::Display for IbbtcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InsufficientBalance { available, requested } => write!(
                f,
                "{}: requested {} but only {} available",
                self.code(),
                requested,
                available
            ),
            Self::SlippageExceeded { minimum, actual } => {
                write!(f, "{}: got {}, wanted at least {}", self.code(), actual, minimum)
            }
            Self::RoundingSlackExceeded { released, entitled } => {
                write!(f, "{}: releases {}, burn pays for {}", self.code(), released, entitled)
            }
            Self::InvalidPoolId { pool_id, num_pools } => {
                write!(f, "{}: pool {} of {}", self.code(), pool_id, num_pools)
            }
            Self::IndexOutOfRange { index, len } => {
                write!(f, "{}: index {} of {}", self.code(), index, len)
            }
            Self::InvalidPeakStatus { value } => write!(f, "{}: {}", self.code(), value),
            _ => f.write_str(self.code()),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for IbbtcError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_error_codes_unique() {
        let errors = [
            IbbtcError::NotOwner { caller: [0u8; 32] },
            IbbtcError::DuplicatePeak { peak: [0u8; 32] },
            IbbtcError::NotAContract { address: [0u8; 32] },
            IbbtcError::UnknownPeak { peak: [0u8; 32] },
            IbbtcError::InvalidPeakStatus { value: 3 },
            IbbtcError::IndexOutOfRange { index: 1, len: 0 },
            IbbtcError::AddressInUse { address: [0u8; 32] },
            IbbtcError::UnsupportedModule { address: [0u8; 32], expected: "sett" },
            IbbtcError::PeakInactive { peak: [0u8; 32] },
            IbbtcError::PeakExtinct { peak: [0u8; 32] },
            IbbtcError::MintingZero,
            IbbtcError::RedeemingZero,
            IbbtcError::InsufficientBalance { available: 0, requested: 1 },
            IbbtcError::SlippageExceeded { minimum: 2, actual: 1 },
            IbbtcError::RoundingSlackExceeded { released: 2, entitled: 1 },
            IbbtcError::InvalidParameters,
            IbbtcError::NullAddress,
            IbbtcError::NoFee,
            IbbtcError::InvalidPoolId { pool_id: 3, num_pools: 3 },
            IbbtcError::GuestListUnauthorized { account: [0u8; 32] },
            IbbtcError::StorageLayout,
            IbbtcError::Overflow,
            IbbtcError::Underflow,
            IbbtcError::DivisionByZero,
        ];

        let codes: Vec<_> = errors.iter().map(|e| e.code()).collect();
        let unique: BTreeSet<_> = codes.iter().collect();
        assert_eq!(codes.len(), unique.len(), "Error codes must be unique");
    }

    #[test]
    fn test_revert_reasons_verbatim() {
        assert_eq!(IbbtcError::NotOwner { caller: [1u8; 32] }.code(), "NOT_OWNER");
        assert_eq!(IbbtcError::DuplicatePeak { peak: [1u8; 32] }.code(), "DUPLICATE_PEAK");
        assert_eq!(
            IbbtcError::NotAContract { address: [1u8; 32] }.code(),
            "function call to a non-contract account"
        );
    }

    #[test]
    fn test_recoverable_classification() {
        // Caller can retry with other inputs or authority
        assert!(IbbtcError::NotOwner { caller: [1u8; 32] }.is_recoverable());
        assert!(IbbtcError::InsufficientBalance { available: 0, requested: 1 }.is_recoverable());
        assert!(IbbtcError::SlippageExceeded { minimum: 2, actual: 1 }.is_recoverable());
        assert!(IbbtcError::MintingZero.is_recoverable());
        assert!(IbbtcError::RedeemingZero.is_recoverable());

        // Protocol state or configuration must change first
        assert!(!IbbtcError::PeakExtinct { peak: [1u8; 32] }.is_recoverable());
        assert!(!IbbtcError::NoFee.is_recoverable());
        assert!(!IbbtcError::StorageLayout.is_recoverable());
        assert!(!IbbtcError::Overflow.is_recoverable());
    }

    #[test]
    fn test_display_includes_context() {
        let err = IbbtcError::InsufficientBalance { available: 5, requested: 9 };
        assert_eq!(err.to_string(), "INSUFFICIENT_BALANCE: requested 9 but only 5 available");
        assert_eq!(IbbtcError::NoFee.to_string(), "NO_FEE");
    }
}

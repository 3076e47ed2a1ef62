//! Protocol Events for ibBTC
//!
//! Events are emitted during execution and can be indexed off-chain.
//! They live in the ledger's state, so a call that aborts takes its events
//! with it.

use crate::Vec;
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use crate::types::{Address, PeakStatus};

/// Event types for indexing and filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
#[borsh(use_discriminant = true)]
#[repr(u8)]
pub enum EventType {
    // Registry Events (0x01 - 0x1F)
    PeakWhitelisted = 0x01,
    PeakStatusChanged = 0x02,
    ImplementationUpdated = 0x03,

    // Configuration Events (0x20 - 0x3F)
    ConfigUpdated = 0x20,
    GuestListUpdated = 0x21,

    // Accounting Events (0x40 - 0x5F)
    Minted = 0x40,
    Redeemed = 0x41,
    FeeCollected = 0x42,

    // Token Events (0x60 - 0x7F)
    TokenMint = 0x60,
    TokenBurn = 0x61,
    TokenTransfer = 0x62,
}

/// Main event enum containing all possible protocol events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub enum IbbtcEvent {
    // ============ Registry Events ============

    /// Emitted when a peak is registered
    PeakWhitelisted {
        peak: Address,
        index: u64,
    },

    /// Emitted on every `setPeakStatus`
    PeakStatusChanged {
        peak: Address,
        old_status: PeakStatus,
        new_status: PeakStatus,
    },

    /// Emitted when a peak proxy swaps its logic
    ImplementationUpdated {
        peak: Address,
        revision: u32,
    },

    // ============ Configuration Events ============

    /// Emitted when fees and sink are replaced
    ConfigUpdated {
        mint_fee: u128,
        redeem_fee: u128,
        fee_sink: Address,
    },

    /// Emitted when the guest list is installed or removed
    GuestListUpdated {
        enabled: bool,
    },

    // ============ Accounting Events ============

    /// Emitted when bBTC is issued through a peak
    Minted {
        peak: Address,
        account: Address,
        btc: u128,
        bbtc: u128,
        fee: u128,
    },

    /// Emitted when bBTC is redeemed through a peak
    Redeemed {
        peak: Address,
        account: Address,
        bbtc: u128,
        fee: u128,
    },

    /// Emitted when accrued fees are minted to the sink
    FeeCollected {
        fee_sink: Address,
        amount: u128,
    },

    // ============ Token Events ============

    /// Emitted when bBTC is minted
    TokenMint {
        to: Address,
        amount: u128,
        new_total_supply: u128,
    },

    /// Emitted when bBTC is burned
    TokenBurn {
        from: Address,
        amount: u128,
        new_total_supply: u128,
    },

    /// Emitted on bBTC transfer
    TokenTransfer {
        from: Address,
        to: Address,
        amount: u128,
    },
}

impl IbbtcEvent {
    /// Get the event type for filtering
    pub fn event_type(&self) -> EventType {
        match self {
            Self::PeakWhitelisted { .. } => EventType::PeakWhitelisted,
            Self::PeakStatusChanged { .. } => EventType::PeakStatusChanged,
            Self::ImplementationUpdated { .. } => EventType::ImplementationUpdated,
            Self::ConfigUpdated { .. } => EventType::ConfigUpdated,
            Self::GuestListUpdated { .. } => EventType::GuestListUpdated,
            Self::Minted { .. } => EventType::Minted,
            Self::Redeemed { .. } => EventType::Redeemed,
            Self::FeeCollected { .. } => EventType::FeeCollected,
            Self::TokenMint { .. } => EventType::TokenMint,
            Self::TokenBurn { .. } => EventType::TokenBurn,
            Self::TokenTransfer { .. } => EventType::TokenTransfer,
        }
    }

    /// Serialize event to bytes for storage/transmission
    pub fn to_bytes(&self) -> Vec<u8> {
        borsh::to_vec(self).unwrap_or_default()
    }

    /// Deserialize event from bytes
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        borsh::from_slice(bytes).ok()
    }
}

/// Event log for collecting events during execution
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventLog {
    events: Vec<IbbtcEvent>,
}

impl EventLog {
    /// Create a new empty event log
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Emit an event (add to log)
    pub fn emit(&mut self, event: IbbtcEvent) {
        self.events.push(event);
    }

    /// Get all events
    pub fn events(&self) -> &[IbbtcEvent] {
        &self.events
    }

    /// Most recent event, if any
    pub fn last(&self) -> Option<&IbbtcEvent> {
        self.events.last()
    }

    /// Filter events by type
    pub fn filter_by_type(&self, event_type: EventType) -> Vec<&IbbtcEvent> {
        self.events
            .iter()
            .filter(|e| e.event_type() == event_type)
            .collect()
    }

    /// Get number of events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check if no events were emitted
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type() {
        let event = IbbtcEvent::PeakStatusChanged {
            peak: [1u8; 32],
            old_status: PeakStatus::Active,
            new_status: PeakStatus::Dormant,
        };
        assert_eq!(event.event_type(), EventType::PeakStatusChanged);
    }

    #[test]
    fn test_event_serialization() {
        let event = IbbtcEvent::Minted {
            peak: [1u8; 32],
            account: [2u8; 32],
            btc: 500_000_000_000_000_000,
            bbtc: 499_500_000_000_000_000,
            fee: 500_000_000_000_000,
        };

        let bytes = event.to_bytes();
        let restored = IbbtcEvent::from_bytes(&bytes).unwrap();
        assert_eq!(event, restored);
    }

    #[test]
    fn test_event_log_filter() {
        let mut log = EventLog::new();
        log.emit(IbbtcEvent::TokenMint { to: [2u8; 32], amount: 10, new_total_supply: 10 });
        log.emit(IbbtcEvent::Minted { peak: [1u8; 32], account: [2u8; 32], btc: 10, bbtc: 10, fee: 0 });
        log.emit(IbbtcEvent::TokenMint { to: [3u8; 32], amount: 5, new_total_supply: 15 });

        assert_eq!(log.len(), 3);
        assert!(!log.is_empty());
        assert_eq!(log.filter_by_type(EventType::TokenMint).len(), 2);
        assert_eq!(log.last().map(IbbtcEvent::event_type), Some(EventType::TokenMint));
    }
}

//! ibBTC Common Library
//!
//! Shared types, constants, and utilities for the ibBTC contracts.
//!
//! ibBTC issues a single interest-bearing claim token, bBTC, against BTC
//! value held by a registry of adapters ("peaks"). Each peak converts
//! between its own yield-bearing asset and a common 18-decimal BTC unit;
//! the ledger prices bBTC against the sum of all peak portfolios.
//!
//! This crate holds everything the ledger and the peaks agree on:
//! - **Errors**: one error enum whose codes are the protocol's revert reasons
//! - **Math**: 256-bit fee, share price, and adapter valuation arithmetic
//! - **Events**: indexable protocol events and the per-call event log
//! - **Token**: the bBTC balance book
//! - **Guest list**: optional mint/redeem allow-list
//! - **Market**: the external modules peaks read quotes from and move assets through
//!
//! This crate is `no_std` compatible when built without the `std` feature.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc;

// Re-export collections for submodules based on feature
#[cfg(not(feature = "std"))]
pub use alloc::collections::{BTreeMap, BTreeSet};
#[cfg(not(feature = "std"))]
pub use alloc::vec::Vec;
#[cfg(feature = "std")]
pub use std::collections::{BTreeMap, BTreeSet};
#[cfg(feature = "std")]
pub use std::vec::Vec;

pub mod constants;
pub mod errors;
pub mod types;
pub mod math;
pub mod events;
pub mod token;
pub mod guest_list;
pub mod market;

// Re-exports for convenience
pub use constants::*;
pub use errors::*;
pub use types::*;
pub use math::*;
pub use events::*;
pub use token::ClaimToken;
pub use guest_list::GuestList;
pub use market::{ExternalModule, Market};
pub use primitive_types::U256;

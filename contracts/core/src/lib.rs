//! ibBTC Core
//!
//! The central ledger of the ibBTC protocol and the machinery peaks run in.
//!
//! - [`ledger`]: peak registry and lifecycle, fee configuration, share
//!   price, bBTC mint/burn authority
//! - [`peak`]: the capability every collateral adapter implements, and the
//!   proxy table that keeps a peak's address and storage stable across
//!   logic upgrades
//! - [`system`]: the sequential processor that executes each call
//!   atomically against the ledger, the peaks and the external market
//!
//! ## Call flow
//!
//! A caller invokes `mint`/`redeem` on a peak. The peak reads its external
//! rates, values the local amount in BTC, and asks the ledger to mint or
//! burn bBTC at the current share price. Only then does it move the local
//! asset. The ledger never touches peak-local assets and peaks never mint
//! or burn bBTC themselves.

pub mod ledger;
pub mod peak;
pub mod system;

pub use ledger::{Core, PortfolioSource};
pub use peak::{bounded_release, check_min_out, LedgerView, Peak, PeakEnv, PeakProxy, PeakStorage, PeakTable, Valuations};
pub use system::{System, SystemState};

//! Core Ledger
//!
//! Owns the peak registry, the fee configuration, the accumulated fee and
//! the bBTC mint/burn authority. The ledger never holds peak-local assets;
//! it prices every mint and redeem against `totalSystemAssets`, which it
//! recomputes from live peak valuations through a [`PortfolioSource`].

use std::collections::BTreeMap;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use ibbtc_common::{
    errors::{IbbtcError, IbbtcResult},
    events::{EventLog, IbbtcEvent},
    math,
    types::{Address, CoreAction, FeeConfig, MintQuote, PeakStatus, ZERO_ADDRESS},
    ClaimToken, GuestList, U256,
};

/// Live valuation of registered peaks
pub trait PortfolioSource {
    /// BTC value (18 decimals) held by `peak`
    ///
    /// Fails with `NotAContract` when nothing is deployed at `peak`.
    fn portfolio_value(&self, peak: &Address) -> IbbtcResult<u128>;
}

// ============ Ledger State ============

/// The ibBTC Core ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct Core {
    /// Administrative authority (governance)
    admin: Address,
    /// Lifecycle per registered peak; absent means never registered
    peaks: BTreeMap<Address, PeakStatus>,
    /// Registration order, append-only
    peak_addresses: Vec<Address>,
    config: FeeConfig,
    /// Fee accrued in bBTC but not yet minted to the sink
    accumulated_fee: u128,
    guest_list: Option<GuestList>,
    bbtc: ClaimToken,
    #[borsh(skip)]
    #[serde(skip)]
    events: EventLog,
}

impl Core {
    /// Create a ledger with zero fees and no fee sink
    pub fn new(admin: Address) -> Self {
        Self::with_config(admin, FeeConfig::default())
    }

    /// Create a ledger with an initial fee configuration
    pub fn with_config(admin: Address, config: FeeConfig) -> Self {
        Self {
            admin,
            peaks: BTreeMap::new(),
            peak_addresses: Vec::new(),
            config,
            accumulated_fee: 0,
            guest_list: None,
            bbtc: ClaimToken::new(),
            events: EventLog::new(),
        }
    }

    fn only_admin(&self, caller: &Address) -> IbbtcResult<()> {
        if *caller != self.admin {
            return Err(IbbtcError::NotOwner { caller: *caller });
        }
        Ok(())
    }

    fn check_guest(&self, account: &Address) -> IbbtcResult<()> {
        match &self.guest_list {
            Some(list) if !list.authorized(account) => {
                Err(IbbtcError::GuestListUnauthorized { account: *account })
            }
            _ => Ok(()),
        }
    }

    /// bBTC supply plus fee accrued against it
    fn shares(&self) -> IbbtcResult<u128> {
        math::safe_add(self.bbtc.total_supply(), self.accumulated_fee)
    }

    pub(crate) fn emit(&mut self, event: IbbtcEvent) {
        self.events.emit(event);
    }

    // ============ Administration ============

    /// Execute an administrative action
    pub fn apply<S: PortfolioSource>(
        &mut self,
        caller: &Address,
        action: &CoreAction,
        source: &S,
    ) -> IbbtcResult<()> {
        match action {
            CoreAction::WhitelistPeak { peak } => self.whitelist_peak(caller, *peak, source).map(|_| ()),
            CoreAction::SetPeakStatus { peak, status } => {
                self.set_peak_status(caller, *peak, PeakStatus::from_u8(*status)?)
            }
            CoreAction::SetConfig { mint_fee, redeem_fee, fee_sink } => {
                self.set_config(caller, *mint_fee, *redeem_fee, *fee_sink)
            }
            CoreAction::SetGuestList { guest_list } => self.set_guest_list(caller, guest_list.clone()),
            CoreAction::CollectFee => self.collect_fee().map(|_| ()),
        }
    }

    /// Register a deployed peak as Active, returning its registry index
    pub fn whitelist_peak<S: PortfolioSource>(
        &mut self,
        caller: &Address,
        peak: Address,
        source: &S,
    ) -> IbbtcResult<usize> {
        self.only_admin(caller)?;
        if self.peaks.contains_key(&peak) {
            return Err(IbbtcError::DuplicatePeak { peak });
        }
        // Sanity-check that the address is a peak at all
        source.portfolio_value(&peak)?;

        let index = self.peak_addresses.len();
        self.peak_addresses.push(peak);
        self.peaks.insert(peak, PeakStatus::Active);

        self.events.emit(IbbtcEvent::PeakWhitelisted { peak, index: index as u64 });
        info!(index, "peak whitelisted");
        Ok(index)
    }

    /// Overwrite a registered peak's status
    pub fn set_peak_status(&mut self, caller: &Address, peak: Address, status: PeakStatus) -> IbbtcResult<()> {
        self.only_admin(caller)?;
        let old_status = self
            .peaks
            .get(&peak)
            .copied()
            .ok_or(IbbtcError::UnknownPeak { peak })?;
        self.peaks.insert(peak, status);

        self.events.emit(IbbtcEvent::PeakStatusChanged { peak, old_status, new_status: status });
        info!(old = old_status.as_u8(), new = status.as_u8(), "peak status set");
        Ok(())
    }

    /// Replace mint fee, redeem fee and fee sink together
    pub fn set_config(
        &mut self,
        caller: &Address,
        mint_fee: u128,
        redeem_fee: u128,
        fee_sink: Address,
    ) -> IbbtcResult<()> {
        self.only_admin(caller)?;
        self.config = FeeConfig::new(mint_fee, redeem_fee, fee_sink)?;

        self.events.emit(IbbtcEvent::ConfigUpdated { mint_fee, redeem_fee, fee_sink });
        info!(mint_fee, redeem_fee, "fee config updated");
        Ok(())
    }

    /// Install (`Some`) or remove (`None`) the guest list
    pub fn set_guest_list(&mut self, caller: &Address, guest_list: Option<GuestList>) -> IbbtcResult<()> {
        self.only_admin(caller)?;
        let enabled = guest_list.is_some();
        self.guest_list = guest_list;

        self.events.emit(IbbtcEvent::GuestListUpdated { enabled });
        info!(enabled, "guest list updated");
        Ok(())
    }

    /// Mint the accumulated fee to the fee sink, returning the amount
    pub fn collect_fee(&mut self) -> IbbtcResult<u128> {
        let fee_sink = self.config.fee_sink;
        if fee_sink == ZERO_ADDRESS {
            return Err(IbbtcError::NullAddress);
        }
        let amount = self.accumulated_fee;
        if amount == 0 {
            return Err(IbbtcError::NoFee);
        }
        self.accumulated_fee = 0;
        self.bbtc.mint(&fee_sink, amount, &mut self.events)?;

        self.events.emit(IbbtcEvent::FeeCollected { fee_sink, amount });
        info!(amount, "fee collected");
        Ok(amount)
    }

    // ============ Accounting ============

    /// Sum of portfolio values over every Active or Dormant peak
    pub fn total_system_assets<S: PortfolioSource>(&self, source: &S) -> IbbtcResult<u128> {
        let mut total = 0u128;
        for peak in &self.peak_addresses {
            if self.peak_status(peak).counts_toward_assets() {
                total = math::safe_add(total, source.portfolio_value(peak)?)?;
            }
        }
        Ok(total)
    }

    /// BTC per bBTC (18 decimals); 1.0 while nothing is issued
    pub fn price_per_share<S: PortfolioSource>(&self, source: &S) -> IbbtcResult<u128> {
        let shares = self.shares()?;
        if shares == 0 {
            return math::price_per_share(0, 0);
        }
        math::price_per_share(self.total_system_assets(source)?, shares)
    }

    /// bBTC issued for `btc` and the mint fee withheld from it
    pub fn btc_to_bbtc<S: PortfolioSource>(&self, btc: u128, source: &S) -> IbbtcResult<(u128, u128)> {
        let shares = self.shares()?;
        let total_assets = if shares == 0 { 0 } else { self.total_system_assets(source)? };
        let gross = math::btc_to_shares(btc, shares, total_assets)?;
        math::deduct_fee(gross, self.config.mint_fee)
    }

    /// Wide (36-decimal) BTC value released for `bbtc` and the redeem fee
    pub fn bbtc_to_btc<S: PortfolioSource>(&self, bbtc: u128, source: &S) -> IbbtcResult<(U256, u128)> {
        let (net, fee) = math::deduct_fee(bbtc, self.config.redeem_fee)?;
        let btc = math::shares_to_wide_btc(net, self.price_per_share(source)?)?;
        Ok((btc, fee))
    }

    /// Issue bBTC to `account` for `btc` deposited through `peak`
    pub fn mint<S: PortfolioSource>(
        &mut self,
        peak: &Address,
        btc: u128,
        account: &Address,
        source: &S,
    ) -> IbbtcResult<MintQuote> {
        if !self.peak_status(peak).can_mint() {
            return Err(IbbtcError::PeakInactive { peak: *peak });
        }
        self.check_guest(account)?;

        let (bbtc, fee) = self.btc_to_bbtc(btc, source)?;
        if bbtc == 0 {
            return Err(IbbtcError::MintingZero);
        }
        self.accumulated_fee = math::safe_add(self.accumulated_fee, fee)?;
        self.bbtc.mint(account, bbtc, &mut self.events)?;

        self.events.emit(IbbtcEvent::Minted { peak: *peak, account: *account, btc, bbtc, fee });
        debug!(btc, bbtc, fee, "bBTC minted");
        Ok(MintQuote { bbtc, fee })
    }

    /// Burn `bbtc` from `account` through `peak`
    ///
    /// Returns the wide BTC value the peak must release and the fee kept.
    /// The share price is read before the burn.
    pub fn redeem<S: PortfolioSource>(
        &mut self,
        peak: &Address,
        bbtc: u128,
        account: &Address,
        source: &S,
    ) -> IbbtcResult<(U256, u128)> {
        if bbtc == 0 {
            return Err(IbbtcError::RedeemingZero);
        }
        if !self.peak_status(peak).can_redeem() {
            return Err(IbbtcError::PeakExtinct { peak: *peak });
        }
        self.check_guest(account)?;

        let (btc, fee) = self.bbtc_to_btc(bbtc, source)?;
        self.accumulated_fee = math::safe_add(self.accumulated_fee, fee)?;
        self.bbtc.burn(account, bbtc, &mut self.events)?;

        self.events.emit(IbbtcEvent::Redeemed { peak: *peak, account: *account, bbtc, fee });
        debug!(bbtc, fee, "bBTC redeemed");
        Ok((btc, fee))
    }

    /// Move bBTC between holders
    pub fn transfer(&mut self, from: &Address, to: &Address, amount: u128) -> IbbtcResult<()> {
        self.bbtc.transfer(from, to, amount, &mut self.events)
    }

    // ============ Reads ============

    /// Administrative authority
    pub fn admin(&self) -> Address {
        self.admin
    }

    /// Status of `peak`; Extinct if never registered
    pub fn peak_status(&self, peak: &Address) -> PeakStatus {
        self.peaks.get(peak).copied().unwrap_or_default()
    }

    /// Peak registered at `index`
    pub fn peak_address(&self, index: usize) -> IbbtcResult<Address> {
        self.peak_addresses
            .get(index)
            .copied()
            .ok_or(IbbtcError::IndexOutOfRange { index, len: self.peak_addresses.len() })
    }

    /// Every registered peak, in registration order
    pub fn peak_addresses(&self) -> &[Address] {
        &self.peak_addresses
    }

    /// Number of registered peaks
    pub fn num_peaks(&self) -> usize {
        self.peak_addresses.len()
    }

    pub fn config(&self) -> &FeeConfig {
        &self.config
    }

    pub fn mint_fee(&self) -> u128 {
        self.config.mint_fee
    }

    pub fn redeem_fee(&self) -> u128 {
        self.config.redeem_fee
    }

    pub fn fee_sink(&self) -> Address {
        self.config.fee_sink
    }

    /// Fee accrued but not yet collected
    pub fn accumulated_fee(&self) -> u128 {
        self.accumulated_fee
    }

    pub fn guest_list(&self) -> Option<&GuestList> {
        self.guest_list.as_ref()
    }

    /// bBTC balances and supply
    pub fn claim_token(&self) -> &ClaimToken {
        &self.bbtc
    }

    /// Events emitted since construction or restore
    pub fn events(&self) -> &EventLog {
        &self.events
    }

    // ============ Persistence ============

    /// Persisted layout of the ledger (events are not persisted)
    pub fn to_bytes(&self) -> Vec<u8> {
        borsh::to_vec(self).unwrap_or_default()
    }

    /// Restore a ledger from its persisted layout
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        borsh::from_slice(bytes).ok()
    }
}

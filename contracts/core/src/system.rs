//! Sequential Processor
//!
//! Runs one call at a time to completion. Every state-changing call executes
//! against a draft of the whole system (ledger, peak proxies, external
//! market) and the draft replaces the live state only when the call
//! succeeds, so an abort at any depth leaves no trace.

use tracing::{info, warn};

use ibbtc_common::{
    errors::{IbbtcError, IbbtcResult},
    events::{EventLog, IbbtcEvent},
    market::{ExternalModule, Market},
    types::{derive_address, Address, CoreAction, FeeConfig, MintQuote, PeakStatus, PoolId, RedeemQuote},
    GuestList,
};

use crate::ledger::{Core, PortfolioSource};
use crate::peak::{LedgerView, Peak, PeakEnv, PeakStorage, PeakTable, Valuations};

/// Everything a call may touch
#[derive(Debug, Clone)]
pub struct SystemState {
    pub core: Core,
    pub peaks: PeakTable,
    pub market: Market,
}

/// The ibBTC protocol with its external environment
#[derive(Debug, Clone)]
pub struct System {
    state: SystemState,
}

impl System {
    /// Fresh system with zero fees
    pub fn new(admin: Address) -> Self {
        Self::with_config(admin, FeeConfig::default())
    }

    pub fn with_config(admin: Address, config: FeeConfig) -> Self {
        Self::from_parts(Core::with_config(admin, config), Market::new())
    }

    /// Assemble a system around an existing ledger and market
    pub fn from_parts(core: Core, market: Market) -> Self {
        Self { state: SystemState { core, peaks: PeakTable::new(), market } }
    }

    /// Run `call` on a draft and commit it only on success
    fn atomic<T>(
        &mut self,
        op: &'static str,
        call: impl FnOnce(&mut SystemState) -> IbbtcResult<T>,
    ) -> IbbtcResult<T> {
        let mut draft = self.state.clone();
        match call(&mut draft) {
            Ok(value) => {
                self.state = draft;
                Ok(value)
            }
            Err(err) => {
                warn!(op, code = err.code(), "call aborted, state rolled back");
                Err(err)
            }
        }
    }

    fn view<'a>(&'a self, this: Address, storage: &'a PeakStorage) -> LedgerView<'a> {
        LedgerView {
            this,
            storage,
            core: &self.state.core,
            peaks: &self.state.peaks,
            market: &self.state.market,
        }
    }

    fn valuations(&self) -> Valuations<'_> {
        Valuations::new(&self.state.peaks, &self.state.market)
    }

    // ============ State Access ============

    pub fn core(&self) -> &Core {
        &self.state.core
    }

    pub fn peaks(&self) -> &PeakTable {
        &self.state.peaks
    }

    pub fn market(&self) -> &Market {
        &self.state.market
    }

    /// The external environment: report quotes, fund accounts
    ///
    /// Addresses held by peak proxies are reserved in the market, so a
    /// module deployed through here can never shadow a peak.
    pub fn market_mut(&mut self) -> &mut Market {
        &mut self.state.market
    }

    /// Ledger event log
    pub fn events(&self) -> &EventLog {
        self.state.core.events()
    }

    // ============ Deployment ============

    /// Deploy an external module at `address`
    ///
    /// Fails with `ADDRESS_IN_USE` if a module or a peak proxy holds it.
    pub fn deploy_module(&mut self, address: Address, module: ExternalModule) -> IbbtcResult<()> {
        self.atomic("deployModule", move |s| {
            if s.peaks.contains(&address) {
                return Err(IbbtcError::AddressInUse { address });
            }
            s.market.deploy(address, module)
        })
    }

    /// Deploy a peak proxy owned by `deployer` with initial `storage`,
    /// returning its address
    pub fn deploy_peak(
        &mut self,
        deployer: Address,
        salt: &[u8],
        logic: Box<dyn Peak>,
        storage: PeakStorage,
    ) -> IbbtcResult<Address> {
        let address = derive_address(&deployer, salt);
        let kind = logic.kind();
        self.atomic("deployPeak", move |s| {
            s.market.reserve(address)?;
            s.peaks.deploy(address, deployer, logic, storage)?;
            s.core.emit(IbbtcEvent::ImplementationUpdated { peak: address, revision: 0 });
            info!(kind, "peak deployed");
            Ok(address)
        })
    }

    /// Swap the logic behind a deployed peak (proxy admin only); its
    /// storage and holdings stay in place
    pub fn update_implementation(
        &mut self,
        caller: Address,
        peak: Address,
        logic: Box<dyn Peak>,
    ) -> IbbtcResult<u32> {
        self.atomic("updateImplementation", move |s| {
            let revision = s.peaks.update_implementation(&caller, &peak, logic)?;
            s.core.emit(IbbtcEvent::ImplementationUpdated { peak, revision });
            Ok(revision)
        })
    }

    /// Run an adapter-specific administrative call against a peak's logic
    /// and storage
    pub fn configure_peak<P, T>(
        &mut self,
        peak: Address,
        call: impl FnOnce(&P, &mut PeakStorage) -> IbbtcResult<T>,
    ) -> IbbtcResult<T>
    where
        P: Peak + 'static,
    {
        self.atomic("configurePeak", move |s| {
            let (logic, storage) = s.peaks.proxy_mut(&peak)?.parts_mut();
            let logic = logic
                .as_any()
                .downcast_ref::<P>()
                .ok_or(IbbtcError::UnsupportedModule { address: peak, expected: "peak logic" })?;
            call(logic, storage)
        })
    }

    /// Storage slot of `peak`
    pub fn peak_storage(&self, peak: &Address) -> IbbtcResult<&PeakStorage> {
        Ok(self.state.peaks.proxy(peak)?.storage())
    }

    /// Current logic of `peak` as a concrete adapter type
    pub fn peak_as<P: Peak + 'static>(&self, peak: &Address) -> IbbtcResult<&P> {
        self.state
            .peaks
            .proxy(peak)?
            .implementation()
            .as_any()
            .downcast_ref::<P>()
            .ok_or(IbbtcError::UnsupportedModule { address: *peak, expected: "peak logic" })
    }

    // ============ Ledger Administration ============

    /// Execute an administrative ledger action
    pub fn execute(&mut self, caller: Address, action: CoreAction) -> IbbtcResult<()> {
        self.atomic("execute", move |s| {
            let source = Valuations::new(&s.peaks, &s.market);
            s.core.apply(&caller, &action, &source)
        })
    }

    pub fn whitelist_peak(&mut self, caller: Address, peak: Address) -> IbbtcResult<usize> {
        self.atomic("whitelistPeak", move |s| {
            let source = Valuations::new(&s.peaks, &s.market);
            s.core.whitelist_peak(&caller, peak, &source)
        })
    }

    pub fn set_peak_status(&mut self, caller: Address, peak: Address, status: PeakStatus) -> IbbtcResult<()> {
        self.atomic("setPeakStatus", move |s| s.core.set_peak_status(&caller, peak, status))
    }

    pub fn set_config(
        &mut self,
        caller: Address,
        mint_fee: u128,
        redeem_fee: u128,
        fee_sink: Address,
    ) -> IbbtcResult<()> {
        self.atomic("setConfig", move |s| s.core.set_config(&caller, mint_fee, redeem_fee, fee_sink))
    }

    pub fn set_guest_list(&mut self, caller: Address, guest_list: Option<GuestList>) -> IbbtcResult<()> {
        self.atomic("setGuestList", move |s| s.core.set_guest_list(&caller, guest_list))
    }

    pub fn collect_fee(&mut self) -> IbbtcResult<u128> {
        self.atomic("collectFee", |s| s.core.collect_fee())
    }

    /// Move bBTC between holders
    pub fn transfer_bbtc(&mut self, from: Address, to: Address, amount: u128) -> IbbtcResult<()> {
        self.atomic("transfer", move |s| s.core.transfer(&from, &to, amount))
    }

    // ============ Peak Calls ============

    /// Deposit `amount` local units through `peak`, returning bBTC issued
    pub fn mint(
        &mut self,
        caller: Address,
        peak: Address,
        pool_id: PoolId,
        amount: u128,
        min_out: u128,
    ) -> IbbtcResult<u128> {
        self.atomic("mint", move |s| {
            let SystemState { core, peaks, market } = s;
            let peaks: &PeakTable = peaks;
            let proxy = peaks.proxy(&peak)?;
            let logic = proxy.implementation();
            let mut env = PeakEnv { this: peak, caller, storage: proxy.storage(), core, peaks, market };
            logic.mint(&mut env, pool_id, amount, min_out)
        })
    }

    /// Redeem `bbtc` through `peak`, returning local units released
    pub fn redeem(
        &mut self,
        caller: Address,
        peak: Address,
        pool_id: PoolId,
        bbtc: u128,
        min_out: u128,
    ) -> IbbtcResult<u128> {
        self.atomic("redeem", move |s| {
            let SystemState { core, peaks, market } = s;
            let peaks: &PeakTable = peaks;
            let proxy = peaks.proxy(&peak)?;
            let logic = proxy.implementation();
            let mut env = PeakEnv { this: peak, caller, storage: proxy.storage(), core, peaks, market };
            logic.redeem(&mut env, pool_id, bbtc, min_out)
        })
    }

    // ============ Reads ============

    pub fn calc_mint(&self, peak: &Address, pool_id: PoolId, amount: u128) -> IbbtcResult<MintQuote> {
        let proxy = self.state.peaks.proxy(peak)?;
        proxy.implementation().calc_mint(&self.view(*peak, proxy.storage()), pool_id, amount)
    }

    pub fn calc_redeem(&self, peak: &Address, pool_id: PoolId, bbtc: u128) -> IbbtcResult<RedeemQuote> {
        let proxy = self.state.peaks.proxy(peak)?;
        proxy.implementation().calc_redeem(&self.view(*peak, proxy.storage()), pool_id, bbtc)
    }

    /// BTC value held by one peak
    pub fn portfolio_value(&self, peak: &Address) -> IbbtcResult<u128> {
        self.valuations().portfolio_value(peak)
    }

    pub fn total_system_assets(&self) -> IbbtcResult<u128> {
        self.state.core.total_system_assets(&self.valuations())
    }

    /// `getPricePerFullShare`
    pub fn price_per_share(&self) -> IbbtcResult<u128> {
        self.state.core.price_per_share(&self.valuations())
    }

    pub fn bbtc_balance(&self, account: &Address) -> u128 {
        self.state.core.claim_token().balance_of(account)
    }

    pub fn bbtc_supply(&self) -> u128 {
        self.state.core.claim_token().total_supply()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::any::Any;

    use ibbtc_common::math;
    use crate::peak::check_min_out;

    const ADMIN: Address = [1u8; 32];
    const ALICE: Address = [2u8; 32];
    const TOKEN: Address = [0x70; 32];
    const WAD: u128 = 1_000_000_000_000_000_000;

    /// Holds the 18-decimal token named in its storage, valued 1:1 in BTC
    #[derive(Debug, Clone)]
    struct TokenPeak;

    impl TokenPeak {
        fn check_pool(pool_id: PoolId) -> IbbtcResult<()> {
            if pool_id != 0 {
                return Err(IbbtcError::InvalidPoolId { pool_id, num_pools: 1 });
            }
            Ok(())
        }

        fn token(storage: &PeakStorage) -> IbbtcResult<Address> {
            storage.load()
        }
    }

    impl Peak for TokenPeak {
        fn kind(&self) -> &'static str {
            "token"
        }

        fn num_pools(&self, _storage: &PeakStorage) -> IbbtcResult<usize> {
            Ok(1)
        }

        fn portfolio_value(&self, this: &Address, storage: &PeakStorage, market: &Market) -> IbbtcResult<u128> {
            Ok(market.balance_of(&Self::token(storage)?, this))
        }

        fn calc_mint(&self, view: &LedgerView<'_>, pool_id: PoolId, amount: u128) -> IbbtcResult<MintQuote> {
            Self::check_pool(pool_id)?;
            let (bbtc, fee) = view.btc_to_bbtc(amount)?;
            Ok(MintQuote { bbtc, fee })
        }

        fn calc_redeem(&self, view: &LedgerView<'_>, pool_id: PoolId, bbtc: u128) -> IbbtcResult<RedeemQuote> {
            Self::check_pool(pool_id)?;
            let token = Self::token(view.storage)?;
            let (btc, fee) = view.bbtc_to_btc(bbtc)?;
            let amount = math::narrow(btc / ibbtc_common::U256::from(WAD))?;
            Ok(RedeemQuote { amount, fee, max: view.market.balance_of(&token, &view.this) })
        }

        fn mint(&self, env: &mut PeakEnv<'_>, pool_id: PoolId, amount: u128, min_out: u128) -> IbbtcResult<u128> {
            Self::check_pool(pool_id)?;
            let token = Self::token(env.storage)?;
            let quote = env.ledger_mint(amount)?;
            check_min_out(quote.bbtc, min_out)?;
            env.market.transfer(&token, &env.caller, &env.this, amount)?;
            Ok(quote.bbtc)
        }

        fn redeem(&self, env: &mut PeakEnv<'_>, pool_id: PoolId, bbtc: u128, min_out: u128) -> IbbtcResult<u128> {
            Self::check_pool(pool_id)?;
            let token = Self::token(env.storage)?;
            let (btc, _) = env.ledger_redeem(bbtc)?;
            let amount = math::narrow(btc / ibbtc_common::U256::from(WAD))?;
            check_min_out(amount, min_out)?;
            env.market.transfer(&token, &env.this, &env.caller, amount)?;
            Ok(amount)
        }

        fn box_clone(&self) -> Box<dyn Peak> {
            Box::new(self.clone())
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    /// Same valuation as `TokenPeak`, as a distinct logic revision
    #[derive(Debug, Clone)]
    struct TokenPeakV2(TokenPeak);

    impl Peak for TokenPeakV2 {
        fn kind(&self) -> &'static str {
            "token-v2"
        }

        fn num_pools(&self, storage: &PeakStorage) -> IbbtcResult<usize> {
            self.0.num_pools(storage)
        }

        fn portfolio_value(&self, this: &Address, storage: &PeakStorage, market: &Market) -> IbbtcResult<u128> {
            self.0.portfolio_value(this, storage, market)
        }

        fn calc_mint(&self, view: &LedgerView<'_>, pool_id: PoolId, amount: u128) -> IbbtcResult<MintQuote> {
            self.0.calc_mint(view, pool_id, amount)
        }

        fn calc_redeem(&self, view: &LedgerView<'_>, pool_id: PoolId, bbtc: u128) -> IbbtcResult<RedeemQuote> {
            self.0.calc_redeem(view, pool_id, bbtc)
        }

        fn mint(&self, env: &mut PeakEnv<'_>, pool_id: PoolId, amount: u128, min_out: u128) -> IbbtcResult<u128> {
            self.0.mint(env, pool_id, amount, min_out)
        }

        fn redeem(&self, env: &mut PeakEnv<'_>, pool_id: PoolId, bbtc: u128, min_out: u128) -> IbbtcResult<u128> {
            self.0.redeem(env, pool_id, bbtc, min_out)
        }

        fn box_clone(&self) -> Box<dyn Peak> {
            Box::new(self.clone())
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn setup() -> (System, Address) {
        let mut system = System::new(ADMIN);
        system.deploy_module(TOKEN, ExternalModule::Token { decimals: 18 }).unwrap();
        system.market_mut().credit(&TOKEN, &ALICE, 10 * WAD).unwrap();
        let storage = PeakStorage::encode(&TOKEN).unwrap();
        let peak = system.deploy_peak(ADMIN, b"token-peak", Box::new(TokenPeak), storage).unwrap();
        system.whitelist_peak(ADMIN, peak).unwrap();
        (system, peak)
    }

    #[test]
    fn test_mint_and_redeem_through_peak() {
        let (mut system, peak) = setup();
        assert_eq!(system.mint(ALICE, peak, 0, 2 * WAD, 0).unwrap(), 2 * WAD);
        assert_eq!(system.total_system_assets().unwrap(), 2 * WAD);
        assert_eq!(system.price_per_share().unwrap(), WAD);

        assert_eq!(system.redeem(ALICE, peak, 0, 2 * WAD, 0).unwrap(), 2 * WAD);
        assert_eq!(system.market().balance_of(&TOKEN, &ALICE), 10 * WAD);
        assert_eq!(system.total_system_assets().unwrap(), 0);
        assert_eq!(system.bbtc_supply(), 0);
    }

    #[test]
    fn test_failed_mint_rolls_back_everything() {
        let (mut system, peak) = setup();
        let events_before = system.events().len();

        // Ledger mint succeeds, asset transfer fails afterwards
        let err = system.mint(ALICE, peak, 0, 11 * WAD, 0).unwrap_err();
        assert_eq!(err, IbbtcError::InsufficientBalance { available: 10 * WAD, requested: 11 * WAD });
        assert_eq!(system.bbtc_balance(&ALICE), 0);
        assert_eq!(system.bbtc_supply(), 0);
        assert_eq!(system.events().len(), events_before);

        let err = system.mint(ALICE, peak, 0, WAD, WAD + 1).unwrap_err();
        assert_eq!(err.code(), "SLIPPAGE");
        assert_eq!(system.market().balance_of(&TOKEN, &ALICE), 10 * WAD);
    }

    #[test]
    fn test_preview_matches_execution() {
        let (mut system, peak) = setup();
        system.set_config(ADMIN, 10, 10, [9u8; 32]).unwrap();
        system.mint(ALICE, peak, 0, 3 * WAD, 0).unwrap();

        let quote = system.calc_mint(&peak, 0, WAD).unwrap();
        assert_eq!(system.mint(ALICE, peak, 0, WAD, 0).unwrap(), quote.bbtc);

        let quote = system.calc_redeem(&peak, 0, WAD).unwrap();
        assert_eq!(system.redeem(ALICE, peak, 0, WAD, 0).unwrap(), quote.amount);
        assert!(quote.amount <= quote.max);
    }

    #[test]
    fn test_whitelist_checks_deployment() {
        let (mut system, _) = setup();
        assert!(matches!(
            system.whitelist_peak(ADMIN, TOKEN),
            Err(IbbtcError::UnsupportedModule { expected: "peak", .. })
        ));
        assert_eq!(
            system.whitelist_peak(ADMIN, [0xEE; 32]).unwrap_err().code(),
            "function call to a non-contract account"
        );
        assert_eq!(system.core().num_peaks(), 1);
    }

    #[test]
    fn test_peak_and_module_addresses_never_collide() {
        let (mut system, peak) = setup();

        // A module cannot be deployed over a peak, by either route
        assert_eq!(
            system.deploy_module(peak, ExternalModule::Token { decimals: 18 }),
            Err(IbbtcError::AddressInUse { address: peak })
        );
        assert_eq!(
            system.market_mut().deploy(peak, ExternalModule::Token { decimals: 18 }),
            Err(IbbtcError::AddressInUse { address: peak })
        );
        assert_eq!(system.portfolio_value(&peak).unwrap(), 0);

        // A peak cannot be deployed over a module
        let blocked = derive_address(&ADMIN, b"blocked");
        system.deploy_module(blocked, ExternalModule::Token { decimals: 8 }).unwrap();
        let storage = PeakStorage::encode(&TOKEN).unwrap();
        assert_eq!(
            system.deploy_peak(ADMIN, b"blocked", Box::new(TokenPeak), storage.clone()),
            Err(IbbtcError::AddressInUse { address: blocked })
        );

        // Nor over another peak
        assert_eq!(
            system.deploy_peak(ADMIN, b"token-peak", Box::new(TokenPeak), storage),
            Err(IbbtcError::AddressInUse { address: peak })
        );
        assert_eq!(system.peaks().len(), 1);
    }

    #[test]
    fn test_upgrade_keeps_identity_and_storage() {
        let (mut system, peak) = setup();
        system.mint(ALICE, peak, 0, WAD, 0).unwrap();
        system.set_peak_status(ADMIN, peak, PeakStatus::Dormant).unwrap();

        assert_eq!(
            system
                .update_implementation(ALICE, peak, Box::new(TokenPeakV2(TokenPeak)))
                .unwrap_err()
                .code(),
            "NOT_OWNER"
        );
        assert_eq!(
            system.update_implementation(ADMIN, peak, Box::new(TokenPeakV2(TokenPeak))).unwrap(),
            1
        );

        assert_eq!(system.core().peak_address(0).unwrap(), peak);
        assert_eq!(system.core().peak_status(&peak), PeakStatus::Dormant);
        assert_eq!(system.peaks().proxy(&peak).unwrap().implementation().kind(), "token-v2");
        assert!(system.peak_as::<TokenPeak>(&peak).is_err());
        assert_eq!(system.peak_storage(&peak).unwrap().load::<Address>().unwrap(), TOKEN);
        assert_eq!(system.portfolio_value(&peak).unwrap(), WAD);
        assert_eq!(system.redeem(ALICE, peak, 0, WAD, 0).unwrap(), WAD);
    }

    #[test]
    fn test_configure_peak_writes_storage() {
        let (mut system, peak) = setup();
        let other = [0x71; 32];
        system
            .configure_peak::<TokenPeak, _>(peak, |_, storage| storage.store(&other))
            .unwrap();
        assert_eq!(system.peak_storage(&peak).unwrap().load::<Address>().unwrap(), other);

        // A failing configuration call leaves the storage untouched
        let result = system.configure_peak::<TokenPeak, ()>(peak, |_, storage| {
            storage.store(&TOKEN)?;
            Err(IbbtcError::InvalidParameters)
        });
        assert_eq!(result, Err(IbbtcError::InvalidParameters));
        assert_eq!(system.peak_storage(&peak).unwrap().load::<Address>().unwrap(), other);

        // Calls typed for another logic are refused
        assert!(matches!(
            system.configure_peak::<TokenPeakV2, ()>(peak, |_, _| Ok(())),
            Err(IbbtcError::UnsupportedModule { expected: "peak logic", .. })
        ));
    }

    #[test]
    fn test_execute_dispatches_admin_actions() {
        let (mut system, peak) = setup();
        system
            .execute(ADMIN, CoreAction::SetPeakStatus { peak, status: PeakStatus::Dormant.as_u8() })
            .unwrap();
        assert_eq!(system.core().peak_status(&peak), PeakStatus::Dormant);

        assert_eq!(
            system.execute(ALICE, CoreAction::WhitelistPeak { peak }).unwrap_err().code(),
            "NOT_OWNER"
        );
        assert_eq!(system.execute(ADMIN, CoreAction::CollectFee), Err(IbbtcError::NullAddress));
    }
}

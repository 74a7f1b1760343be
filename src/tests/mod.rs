//! Test suite for the bond, factory, token and forwarder
//!
//! Tests cover:
//! - Token ledger permissions and allowances
//! - Factory registry and supply ceilings
//! - Curve math and its invariants under arbitrary trade sequences
//! - Buy/sell settlement, tax routing and slippage
//! - Atomic rollback and concurrent trading
//! - Escrow forwarding

pub mod factory_tests;
pub mod forwarder_tests;

use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::math::units;
use crate::{Address, Amount, Authority, Bond, BondConfig, InMemoryEventLog, Token, TokenHandle};

pub const DEPLOYER: Address = Address::new([0xd0; 20]);
pub const BOND_ADDRESS: Address = Address::new([0xb0; 20]);
pub const RESERVE_ADDRESS: Address = Address::new([0xee; 20]);
pub const ALICE: Address = Address::new([0xa1; 20]);
pub const BOB: Address = Address::new([0xb1; 20]);
pub const CAROL: Address = Address::new([0xc1; 20]);

static TRACING: Lazy<()> = Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
});

/// Install the test log subscriber once per process. Filter with RUST_LOG.
pub fn init_tracing() {
    Lazy::force(&TRACING);
}

/// Bond deployment with an in-memory event log and a reserve asset minted by `DEPLOYER`
pub struct TestMarket {
    pub bond: Bond,
    pub events: Arc<InMemoryEventLog>,
    pub reserve: TokenHandle,
    pub reserve_minter: Authority,
}

impl TestMarket {
    pub fn new(config: BondConfig) -> Self {
        init_tracing();
        let reserve_minter = Authority::new(DEPLOYER);
        let mut reserve = Token::new(RESERVE_ADDRESS, &reserve_minter);
        reserve.initialize("Mint Club", "MINT").unwrap();
        let reserve = reserve.into_handle();

        let events = Arc::new(InMemoryEventLog::new());
        let bond = Bond::with_event_sink(BOND_ADDRESS, Arc::clone(&reserve), config, events.clone())
            .unwrap();
        Self {
            bond,
            events,
            reserve,
            reserve_minter,
        }
    }

    /// Default taxes
    pub fn taxed() -> Self {
        Self::new(BondConfig::default())
    }

    pub fn tax_free() -> Self {
        Self::new(BondConfig::default().tax_free())
    }

    pub fn treasury(&self) -> Address {
        self.bond.config().default_beneficiary
    }

    /// Mint reserve to `who` and approve the bond for all of it
    pub fn fund(&self, who: &Address, amount: Amount) {
        let mut reserve = self.reserve.lock();
        reserve.mint(&self.reserve_minter, who, amount).unwrap();
        reserve.approve(who, &BOND_ADDRESS, Amount::MAX).unwrap();
    }

    /// Let the bond burn `who`'s holdings of `token`
    pub fn approve_sell(&self, who: &Address, token: &Address) {
        let handle = self.bond.factory().token(token).unwrap();
        handle.lock().approve(who, &BOND_ADDRESS, Amount::MAX).unwrap();
    }

    pub fn create(&self, symbol: &str, max_supply: Amount) -> Address {
        self.bond.create_token(symbol, symbol, max_supply).unwrap()
    }

    pub fn reserve_of(&self, who: &Address) -> Amount {
        self.reserve.lock().balance_of(who)
    }

    pub fn balance_of(&self, token: &Address, who: &Address) -> Amount {
        self.bond.factory().token(token).unwrap().lock().balance_of(who)
    }
}

/// 100-token market where supply 10 costs exactly 1.0 reserve
pub fn hundred_token_market(config: BondConfig) -> (TestMarket, Address) {
    let market = TestMarket::new(config);
    let token = market.create("TEN", units(100));
    (market, token)
}

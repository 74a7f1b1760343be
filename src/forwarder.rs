//! Escrow Forwarder
//!
//! Holds a requester's deposit of a token until the token's registered owner
//! accepts it (minus a commission to the fund address) or the requester takes
//! it back. Fee settings and token owners are admin-managed. The forwarder's
//! address becomes a guarded custody account on every token it first holds.

use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::config::ForwarderConfig;
use crate::constants::BPS_DENOMINATOR;
use crate::error::{BondError, BondResult};
use crate::math;
use crate::token::{Authority, TokenHandle};
use crate::{Address, Amount};

struct ForwarderState {
    config: ForwarderConfig,
    token_owners: HashMap<Address, Address>,
    // (token, requester) -> outstanding deposit
    requests: HashMap<(Address, Address), Amount>,
}

pub struct Forwarder {
    address: Address,
    authority: Authority,
    admin: Address,
    state: Mutex<ForwarderState>,
}

impl Forwarder {
    pub fn new(address: Address, admin: Address, config: ForwarderConfig) -> Self {
        Self {
            address,
            authority: Authority::new(address),
            admin,
            state: Mutex::new(ForwarderState {
                config,
                token_owners: HashMap::new(),
                requests: HashMap::new(),
            }),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn admin(&self) -> Address {
        self.admin
    }

    pub fn fee_rate(&self) -> u128 {
        self.state.lock().config.fee_rate_bps
    }

    pub fn fund_address(&self) -> Address {
        self.state.lock().config.fund_address
    }

    /// Registered owner of `token`, zero when none
    pub fn token_owner(&self, token: &Address) -> Address {
        self.state
            .lock()
            .token_owners
            .get(token)
            .copied()
            .unwrap_or(Address::ZERO)
    }

    /// Deposit of `requester` in `token` not yet refunded or accepted
    pub fn requested(&self, token: &Address, requester: &Address) -> Amount {
        self.state
            .lock()
            .requests
            .get(&(*token, *requester))
            .copied()
            .unwrap_or(0)
    }

    fn ensure_admin(&self, caller: &Address) -> BondResult<()> {
        if *caller != self.admin {
            warn!("{} is not the forwarder admin", caller);
            return Err(BondError::PermissionDenied(*caller));
        }
        Ok(())
    }

    pub fn update_fee(&self, caller: &Address, fund_address: Address, fee_rate_bps: u128) -> BondResult<()> {
        self.ensure_admin(caller)?;
        if fee_rate_bps > BPS_DENOMINATOR {
            return Err(BondError::InvalidParameters(format!(
                "fee rate {} bps above {}",
                fee_rate_bps, BPS_DENOMINATOR
            )));
        }
        let mut state = self.state.lock();
        state.config = ForwarderConfig {
            fee_rate_bps,
            fund_address,
        };
        info!("Forwarder fee set to {} bps, fund {}", fee_rate_bps, fund_address);
        Ok(())
    }

    pub fn update_token_owner(&self, caller: &Address, token: &Address, owner: Address) -> BondResult<()> {
        self.ensure_admin(caller)?;
        self.state.lock().token_owners.insert(*token, owner);
        info!("Forwarder owner of {} set to {}", token, owner);
        Ok(())
    }

    /// Move `amount` from the caller into custody. Needs an allowance for the forwarder.
    pub fn request(&self, caller: &Address, token: &TokenHandle, amount: Amount) -> BondResult<()> {
        if amount == 0 {
            return Err(BondError::InvalidAmount("request amount must be positive".to_string()));
        }
        let mut state = self.state.lock();
        let mut ledger = token.lock();
        let key = (ledger.address(), *caller);
        let outstanding = state.requests.get(&key).copied().unwrap_or(0);
        let next = outstanding.checked_add(amount).ok_or(BondError::Overflow)?;

        ledger.register_custody(&self.authority)?;
        ledger.transfer_from_as(&self.authority, caller, &self.address, amount)?;
        state.requests.insert(key, next);

        info!("Forwarder request: {} of {} from {}", amount, key.0, caller);
        Ok(())
    }

    /// Return up to the caller's outstanding deposit
    pub fn refund(&self, caller: &Address, token: &TokenHandle, amount: Amount) -> BondResult<()> {
        let mut state = self.state.lock();
        let mut ledger = token.lock();
        let key = (ledger.address(), *caller);
        let outstanding = Self::draw(&state.requests, &key, amount)?;

        ledger.transfer_as(&self.authority, caller, amount)?;
        state.requests.insert(key, outstanding);

        info!("Forwarder refund: {} of {} to {}", amount, key.0, caller);
        Ok(())
    }

    /// Release `from`'s deposit to the token owner, less the commission
    pub fn accept(&self, caller: &Address, token: &TokenHandle, from: &Address, amount: Amount) -> BondResult<()> {
        let mut state = self.state.lock();
        let mut ledger = token.lock();
        let token_address = ledger.address();

        let owner = state.token_owners.get(&token_address).copied().unwrap_or(Address::ZERO);
        if owner.is_zero() || *caller != owner {
            warn!("{} tried to accept on {} without owning it", caller, token_address);
            return Err(BondError::PermissionDenied(*caller));
        }

        let key = (token_address, *from);
        let outstanding = Self::draw(&state.requests, &key, amount)?;

        let fee = math::apply_bps(amount, state.config.fee_rate_bps)?;
        let fund = state.config.fund_address;
        if fee > 0 && fund.is_zero() {
            return Err(BondError::InvalidParameters(
                "fee fund address is not configured".to_string(),
            ));
        }

        ledger.transfer_as(&self.authority, &owner, amount - fee)?;
        if fee > 0 {
            ledger.transfer_as(&self.authority, &fund, fee)?;
        }
        state.requests.insert(key, outstanding);

        info!(
            "Forwarder accept: {} of {} from {} to {}, fee {}",
            amount, token_address, from, owner, fee
        );
        Ok(())
    }

    fn draw(
        requests: &HashMap<(Address, Address), Amount>,
        key: &(Address, Address),
        amount: Amount,
    ) -> BondResult<Amount> {
        if amount == 0 {
            return Err(BondError::InvalidAmount("amount must be positive".to_string()));
        }
        let outstanding = requests.get(key).copied().unwrap_or(0);
        outstanding
            .checked_sub(amount)
            .ok_or(BondError::AmountLimitExceeded {
                outstanding,
                requested: amount,
            })
    }
}

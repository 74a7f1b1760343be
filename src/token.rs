//! Fungible token ledger
//!
//! One mint authority fixed at construction, name and symbol fixed by a single
//! `initialize` call, conventional balances and allowances.
//!
//! Holder calls name their caller by address. Contract accounts (the mint
//! authority, bond and forwarder custody) are guarded instead: they can only be
//! debited, or spend allowances, by presenting the matching [`Authority`].
//! Naming a guarded address as the caller of a holder call is refused.
//!
//! `burn_from` is allowance-gated: the mint authority gets no bypass and must
//! be approved like any other spender. The bond therefore burns a seller's
//! tokens through the allowance the seller granted it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::constants::DECIMALS;
use crate::error::{BondError, BondResult};
use crate::events::TokenEvent;
use crate::{Address, Amount};

/// Shared, lockable token. The lock is the token's serialization point.
pub type TokenHandle = Arc<Mutex<Token>>;

static NEXT_AUTHORITY_ID: AtomicU64 = AtomicU64::new(1);

/// Unforgeable capability of a contract account.
///
/// Each value carries a process-unique id, so building another `Authority`
/// for the same address does not grant its rights. Not `Clone`.
#[derive(Debug)]
pub struct Authority {
    address: Address,
    id: u64,
}

impl Authority {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            id: NEXT_AUTHORITY_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }
}

#[derive(Debug, Clone)]
pub struct Token {
    address: Address,
    controller: Address,
    minter_id: u64,
    // guarded address -> authority id
    custodians: HashMap<Address, u64>,
    name: Option<String>,
    symbol: Option<String>,
    total_supply: Amount,
    balances: HashMap<Address, Amount>,
    allowances: HashMap<(Address, Address), Amount>,
    events: Vec<TokenEvent>,
}

impl Token {
    /// Uninitialized token minted only through `minter`, whose address is guarded
    pub fn new(address: Address, minter: &Authority) -> Self {
        let mut custodians = HashMap::new();
        custodians.insert(minter.address, minter.id);
        Self {
            address,
            controller: minter.address,
            minter_id: minter.id,
            custodians,
            name: None,
            symbol: None,
            total_supply: 0,
            balances: HashMap::new(),
            allowances: HashMap::new(),
            events: Vec::new(),
        }
    }

    pub fn into_handle(self) -> TokenHandle {
        Arc::new(Mutex::new(self))
    }

    /// Fix name and symbol. Succeeds exactly once.
    pub fn initialize(&mut self, name: &str, symbol: &str) -> BondResult<()> {
        if self.name.is_some() {
            return Err(BondError::AlreadyInitialized);
        }
        self.name = Some(name.to_string());
        self.symbol = Some(symbol.to_string());
        debug!("token {} initialized as {} ({})", self.address, name, symbol);
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.name.is_some()
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Address of the mint authority
    pub fn owner(&self) -> Address {
        self.controller
    }

    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or_default()
    }

    pub fn symbol(&self) -> &str {
        self.symbol.as_deref().unwrap_or_default()
    }

    pub fn decimals(&self) -> u8 {
        DECIMALS
    }

    pub fn total_supply(&self) -> Amount {
        self.total_supply
    }

    pub fn balance_of(&self, holder: &Address) -> Amount {
        self.balances.get(holder).copied().unwrap_or(0)
    }

    pub fn allowance(&self, owner: &Address, spender: &Address) -> Amount {
        self.allowances.get(&(*owner, *spender)).copied().unwrap_or(0)
    }

    pub fn is_guarded(&self, account: &Address) -> bool {
        self.custodians.contains_key(account)
    }

    /// Journal of every successful ledger movement
    pub fn events(&self) -> &[TokenEvent] {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<TokenEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn ensure_minter(&self, authority: &Authority) -> BondResult<()> {
        if authority.id != self.minter_id {
            warn!("{} is not the mint authority of token {}", authority.address, self.address);
            return Err(BondError::PermissionDenied(authority.address));
        }
        Ok(())
    }

    /// Guard `authority`'s address on this ledger. Idempotent for the same authority.
    ///
    /// Refused when another authority already guards the address or the address
    /// already holds a balance.
    pub(crate) fn register_custody(&mut self, authority: &Authority) -> BondResult<()> {
        match self.custodians.get(&authority.address) {
            Some(id) if *id == authority.id => return Ok(()),
            Some(_) => {
                warn!("{} is already guarded on token {}", authority.address, self.address);
                return Err(BondError::PermissionDenied(authority.address));
            }
            None => {}
        }
        if self.balance_of(&authority.address) > 0 {
            return Err(BondError::InvalidParameters(format!(
                "{} already holds {} and cannot become a custody account",
                authority.address, self.address
            )));
        }
        self.custodians.insert(authority.address, authority.id);
        debug!("{} guarded on token {}", authority.address, self.address);
        Ok(())
    }

    fn ensure_custodian(&self, authority: &Authority) -> BondResult<()> {
        match self.custodians.get(&authority.address) {
            Some(id) if *id == authority.id => Ok(()),
            _ => {
                warn!("{} holds no custody on token {}", authority.address, self.address);
                Err(BondError::PermissionDenied(authority.address))
            }
        }
    }

    fn ensure_holder(&self, caller: &Address) -> BondResult<()> {
        if self.is_guarded(caller) {
            warn!("holder call as guarded account {} on token {}", caller, self.address);
            return Err(BondError::PermissionDenied(*caller));
        }
        Ok(())
    }

    fn ensure_initialized(&self) -> BondResult<()> {
        if !self.is_initialized() {
            return Err(BondError::NotInitialized);
        }
        Ok(())
    }

    fn ensure_balance(&self, holder: &Address, amount: Amount) -> BondResult<()> {
        let have = self.balance_of(holder);
        if have < amount {
            return Err(BondError::InsufficientBalance { have, need: amount });
        }
        Ok(())
    }

    fn ensure_allowance(&self, owner: &Address, spender: &Address, amount: Amount) -> BondResult<()> {
        let have = self.allowance(owner, spender);
        if have < amount {
            return Err(BondError::InsufficientAllowance { have, need: amount });
        }
        Ok(())
    }

    fn ensure_recipient(to: &Address) -> BondResult<()> {
        if to.is_zero() {
            return Err(BondError::InvalidParameters(
                "cannot transfer to the zero address".to_string(),
            ));
        }
        Ok(())
    }

    fn spend_allowance(&mut self, owner: &Address, spender: &Address, amount: Amount) {
        let current = self.allowance(owner, spender);
        // Unlimited approvals are never drawn down
        if current != Amount::MAX {
            self.allowances.insert((*owner, *spender), current - amount);
        }
    }

    fn move_balance(&mut self, from: &Address, to: &Address, amount: Amount) {
        let from_balance = self.balance_of(from);
        self.balances.insert(*from, from_balance - amount);
        // Sum of balances equals total supply, so this cannot overflow
        *self.balances.entry(*to).or_insert(0) += amount;
        self.events.push(TokenEvent::Transfer {
            from: *from,
            to: *to,
            value: amount,
        });
    }

    /// Create `amount` for `to`. Mint authority only.
    pub fn mint(&mut self, authority: &Authority, to: &Address, amount: Amount) -> BondResult<()> {
        self.ensure_minter(authority)?;
        self.ensure_initialized()?;
        Self::ensure_recipient(to)?;
        let new_supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(BondError::Overflow)?;

        self.total_supply = new_supply;
        *self.balances.entry(*to).or_insert(0) += amount;
        self.events.push(TokenEvent::Transfer {
            from: Address::ZERO,
            to: *to,
            value: amount,
        });
        Ok(())
    }

    /// Destroy `amount` of the caller's own balance
    pub fn burn(&mut self, caller: &Address, amount: Amount) -> BondResult<()> {
        self.ensure_holder(caller)?;
        self.ensure_initialized()?;
        self.ensure_balance(caller, amount)?;
        self.destroy(caller, amount);
        Ok(())
    }

    /// Destroy `amount` of `holder`'s balance using the caller's allowance from `holder`
    pub fn burn_from(&mut self, caller: &Address, holder: &Address, amount: Amount) -> BondResult<()> {
        self.ensure_holder(caller)?;
        self.spend_and_destroy(caller, holder, amount)
    }

    /// `burn_from` on behalf of a custody account
    pub fn burn_from_as(&mut self, authority: &Authority, holder: &Address, amount: Amount) -> BondResult<()> {
        self.ensure_custodian(authority)?;
        self.spend_and_destroy(&authority.address, holder, amount)
    }

    fn spend_and_destroy(&mut self, spender: &Address, holder: &Address, amount: Amount) -> BondResult<()> {
        self.ensure_initialized()?;
        self.ensure_allowance(holder, spender, amount)?;
        self.ensure_balance(holder, amount)?;
        self.spend_allowance(holder, spender, amount);
        self.destroy(holder, amount);
        Ok(())
    }

    fn destroy(&mut self, holder: &Address, amount: Amount) {
        let balance = self.balance_of(holder);
        self.balances.insert(*holder, balance - amount);
        self.total_supply -= amount;
        self.events.push(TokenEvent::Transfer {
            from: *holder,
            to: Address::ZERO,
            value: amount,
        });
    }

    pub fn transfer(&mut self, caller: &Address, to: &Address, amount: Amount) -> BondResult<()> {
        self.ensure_holder(caller)?;
        self.send(caller, to, amount)
    }

    /// Pay out of a custody account
    pub fn transfer_as(&mut self, authority: &Authority, to: &Address, amount: Amount) -> BondResult<()> {
        self.ensure_custodian(authority)?;
        self.send(&authority.address, to, amount)
    }

    fn send(&mut self, from: &Address, to: &Address, amount: Amount) -> BondResult<()> {
        self.ensure_initialized()?;
        Self::ensure_recipient(to)?;
        self.ensure_balance(from, amount)?;
        self.move_balance(from, to, amount);
        Ok(())
    }

    /// Move `from`'s balance on behalf of `from`, drawing on the caller's allowance
    pub fn transfer_from(
        &mut self,
        caller: &Address,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> BondResult<()> {
        self.ensure_holder(caller)?;
        self.spend_and_send(caller, from, to, amount)
    }

    /// `transfer_from` with a custody account as the spender
    pub fn transfer_from_as(
        &mut self,
        authority: &Authority,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> BondResult<()> {
        self.ensure_custodian(authority)?;
        self.spend_and_send(&authority.address, from, to, amount)
    }

    fn spend_and_send(&mut self, spender: &Address, from: &Address, to: &Address, amount: Amount) -> BondResult<()> {
        self.ensure_initialized()?;
        Self::ensure_recipient(to)?;
        self.ensure_allowance(from, spender, amount)?;
        self.ensure_balance(from, amount)?;
        self.spend_allowance(from, spender, amount);
        self.move_balance(from, to, amount);
        Ok(())
    }

    pub fn approve(&mut self, caller: &Address, spender: &Address, amount: Amount) -> BondResult<()> {
        self.ensure_holder(caller)?;
        self.ensure_initialized()?;
        if spender.is_zero() {
            return Err(BondError::InvalidParameters(
                "cannot approve the zero address".to_string(),
            ));
        }
        self.set_allowance(caller, spender, amount);
        Ok(())
    }

    pub fn increase_allowance(&mut self, caller: &Address, spender: &Address, added: Amount) -> BondResult<()> {
        let current = self.allowance(caller, spender);
        let next = current.checked_add(added).ok_or(BondError::Overflow)?;
        self.approve(caller, spender, next)
    }

    pub fn decrease_allowance(&mut self, caller: &Address, spender: &Address, subtracted: Amount) -> BondResult<()> {
        let current = self.allowance(caller, spender);
        let next = current
            .checked_sub(subtracted)
            .ok_or(BondError::InsufficientAllowance { have: current, need: subtracted })?;
        self.approve(caller, spender, next)
    }

    fn set_allowance(&mut self, owner: &Address, spender: &Address, amount: Amount) {
        self.allowances.insert((*owner, *spender), amount);
        self.events.push(TokenEvent::Approval {
            owner: *owner,
            spender: *spender,
            value: amount,
        });
    }
}

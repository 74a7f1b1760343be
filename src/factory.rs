//! Token Factory
//!
//! Instantiates tokens and maintains the registry of everything it created.
//! Each token gets a deterministic address derived from the factory address and
//! its creation index, the factory as its mint authority, and a max supply
//! ceiling that is fixed for good.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::constants::{FACTORY_ADDRESS_TAG, MAX_NAME_LENGTH, MAX_SYMBOL_LENGTH};
use crate::error::{BondError, BondResult};
use crate::events::{BondEvent, EventSink};
use crate::token::{Authority, Token, TokenHandle};
use crate::{Address, Amount};

/// Registry entry, serializable for indexers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub address: Address,
    pub name: String,
    pub symbol: String,
    pub max_supply: Amount,
    /// Position in creation order
    pub index: u64,
}

struct RegistryEntry {
    info: TokenInfo,
    handle: TokenHandle,
}

#[derive(Default)]
struct Registry {
    order: Vec<Address>,
    entries: HashMap<Address, RegistryEntry>,
}

pub struct Factory {
    address: Address,
    authority: Authority,
    max_supply_limit: Amount,
    registry: Mutex<Registry>,
    events: Arc<dyn EventSink>,
}

impl Factory {
    /// Factory that mints as `address` and refuses ceilings above `max_supply_limit`
    pub fn new(address: Address, max_supply_limit: Amount, events: Arc<dyn EventSink>) -> Self {
        Self {
            address,
            authority: Authority::new(address),
            max_supply_limit,
            registry: Mutex::new(Registry::default()),
            events,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn max_supply_limit(&self) -> Amount {
        self.max_supply_limit
    }

    /// Mint authority of every token this factory creates
    pub(crate) fn authority(&self) -> &Authority {
        &self.authority
    }

    /// Create, initialize and register a new token with zero supply
    pub fn create_token(&self, name: &str, symbol: &str, max_supply: Amount) -> BondResult<Address> {
        let (address, _, ()) = self.create_token_with(name, symbol, max_supply, |_, _| Ok(()))?;
        Ok(address)
    }

    /// Create a token and run `seed` on it before it becomes visible.
    ///
    /// The registry stays locked for the whole call. If `seed` fails the token
    /// is dropped, its index is not consumed and no event is emitted.
    pub(crate) fn create_token_with<T>(
        &self,
        name: &str,
        symbol: &str,
        max_supply: Amount,
        seed: impl FnOnce(&Address, &mut Token) -> BondResult<T>,
    ) -> BondResult<(Address, TokenHandle, T)> {
        self.validate_launch_params(name, symbol, max_supply)?;

        let mut registry = self.registry.lock();
        let index = registry.order.len() as u64;
        let address = Address::derive(&self.address, FACTORY_ADDRESS_TAG, index);
        if registry.entries.contains_key(&address) {
            return Err(BondError::InvalidParameters(format!(
                "token address {} already registered",
                address
            )));
        }

        let mut token = Token::new(address, &self.authority);
        token.initialize(name, symbol)?;
        let seeded = seed(&address, &mut token)?;

        let handle = token.into_handle();
        let info = TokenInfo {
            address,
            name: name.to_string(),
            symbol: symbol.to_string(),
            max_supply,
            index,
        };
        registry.order.push(address);
        registry.entries.insert(
            address,
            RegistryEntry {
                info,
                handle: Arc::clone(&handle),
            },
        );

        info!(
            "Created token {} ({}) at {} with max supply {}, index {}",
            name, symbol, address, max_supply, index
        );
        self.events.record(BondEvent::TokenCreated {
            token_address: address,
            name: name.to_string(),
            symbol: symbol.to_string(),
            max_supply,
        });

        Ok((address, handle, seeded))
    }

    fn validate_launch_params(&self, name: &str, symbol: &str, max_supply: Amount) -> BondResult<()> {
        if name.is_empty() || name.len() > MAX_NAME_LENGTH {
            return Err(BondError::InvalidParameters(format!(
                "name must be 1-{} bytes",
                MAX_NAME_LENGTH
            )));
        }
        if symbol.is_empty() || symbol.len() > MAX_SYMBOL_LENGTH {
            return Err(BondError::InvalidParameters(format!(
                "symbol must be 1-{} bytes",
                MAX_SYMBOL_LENGTH
            )));
        }
        if max_supply == 0 {
            return Err(BondError::InvalidParameters(
                "max supply must be positive".to_string(),
            ));
        }
        if max_supply > self.max_supply_limit {
            warn!(
                "Rejected token {}: max supply {} above limit {}",
                symbol, max_supply, self.max_supply_limit
            );
            return Err(BondError::MaxSupplyLimitExceeded {
                requested: max_supply,
                limit: self.max_supply_limit,
            });
        }
        Ok(())
    }

    pub fn exists(&self, token: &Address) -> bool {
        self.registry.lock().entries.contains_key(token)
    }

    pub fn token_count(&self) -> u64 {
        self.registry.lock().order.len() as u64
    }

    /// Address of the `index`-th created token
    pub fn tokens(&self, index: u64) -> Option<Address> {
        self.registry.lock().order.get(index as usize).copied()
    }

    pub fn max_supply(&self, token: &Address) -> BondResult<Amount> {
        self.token_info(token).map(|info| info.max_supply)
    }

    pub fn token_info(&self, token: &Address) -> BondResult<TokenInfo> {
        self.registry
            .lock()
            .entries
            .get(token)
            .map(|entry| entry.info.clone())
            .ok_or(BondError::TokenNotFound(*token))
    }

    /// Shared handle for holder-side operations (transfer, approve, burn)
    pub fn token(&self, token: &Address) -> BondResult<TokenHandle> {
        self.registry
            .lock()
            .entries
            .get(token)
            .map(|entry| Arc::clone(&entry.handle))
            .ok_or(BondError::TokenNotFound(*token))
    }

    /// Registry page in creation order
    pub fn token_list(&self, offset: u64, limit: u64) -> Vec<TokenInfo> {
        let registry = self.registry.lock();
        registry
            .order
            .iter()
            .skip(offset as usize)
            .take(limit as usize)
            .filter_map(|address| registry.entries.get(address))
            .map(|entry| entry.info.clone())
            .collect()
    }
}

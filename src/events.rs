//! Audit Events
//!
//! Bond and factory state changes are recorded as [`BondEvent`]s through an
//! [`EventSink`]; token ledgers journal their own [`TokenEvent`]s. Events are
//! only produced by calls that succeeded, in commit order.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Address, Amount};

/// Bond and factory events consumed by off-chain indexers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BondEvent {
    /// New token instantiated and registered
    TokenCreated {
        token_address: Address,
        name: String,
        symbol: String,
        max_supply: Amount,
    },

    /// Tokens minted against reserve
    Buy {
        token_address: Address,
        buyer: Address,
        amount_minted: Amount,
        /// Gross reserve paid in, tax included
        reserve_amount: Amount,
        beneficiary: Address,
        tax_amount: Amount,
    },

    /// Tokens burned for a reserve refund
    Sell {
        token_address: Address,
        seller: Address,
        amount_burned: Amount,
        /// Net reserve paid out, tax excluded
        refund_amount: Amount,
        beneficiary: Address,
        tax_amount: Amount,
    },
}

impl BondEvent {
    pub fn token_address(&self) -> &Address {
        match self {
            BondEvent::TokenCreated { token_address, .. } => token_address,
            BondEvent::Buy { token_address, .. } => token_address,
            BondEvent::Sell { token_address, .. } => token_address,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            BondEvent::TokenCreated { .. } => "token_created",
            BondEvent::Buy { .. } => "buy",
            BondEvent::Sell { .. } => "sell",
        }
    }
}

/// Ledger movements of a single token. Mints come from, and burns go to, the zero address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenEvent {
    Transfer {
        from: Address,
        to: Address,
        value: Amount,
    },
    Approval {
        owner: Address,
        spender: Address,
        value: Amount,
    },
}

/// Destination for bond events.
///
/// Implementations must not fail: the event is recorded after the state
/// change has committed.
pub trait EventSink: Send + Sync {
    fn record(&self, event: BondEvent);
}

/// Event log kept in memory, mostly for tests and local indexing
#[derive(Debug, Default)]
pub struct InMemoryEventLog {
    events: Mutex<Vec<BondEvent>>,
}

impl InMemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every recorded event in commit order
    pub fn events(&self) -> Vec<BondEvent> {
        self.events.lock().clone()
    }

    pub fn token_events(&self, token: &Address) -> Vec<BondEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.token_address() == token)
            .cloned()
            .collect()
    }

    pub fn last(&self) -> Option<BondEvent> {
        self.events.lock().last().cloned()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl EventSink for InMemoryEventLog {
    fn record(&self, event: BondEvent) {
        debug!("recording {} event for {}", event.event_type(), event.token_address());
        self.events.lock().push(event);
    }
}

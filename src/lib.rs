//! Mint Bond
//!
//! A continuous bonding-curve market maker: anyone can create a fungible token
//! backed by a reserve asset and buy or sell it against a linear price curve.
//!
//! This system provides:
//! - Token ledgers with an unforgeable mint authority, guarded contract custody
//!   and allowance-gated `burn_from`
//! - A factory that instantiates tokens and keeps an ordered registry with supply ceilings
//! - The bond engine: curve integral pricing, buy/sell tax routing and slippage protection
//! - Per-token market locks so trades on one token are linearized while different
//!   tokens trade in parallel
//! - An escrow forwarder that holds deposits until a token owner accepts or the
//!   requester takes a refund
//!
//! All amounts are fixed-point integers with 18 fractional digits.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub mod bond;
pub mod bonding_curve;
pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod factory;
pub mod forwarder;
pub mod math;
pub mod token;
#[cfg(test)]
pub mod tests;

pub use bond::{Bond, BuyReceipt, MarketState, SellReceipt};
pub use bonding_curve::{BuyQuote, LinearCurve, SellQuote};
pub use config::{BondConfig, ForwarderConfig};
pub use error::{BondError, BondResult};
pub use events::{BondEvent, EventSink, InMemoryEventLog, TokenEvent};
pub use factory::{Factory, TokenInfo};
pub use forwarder::Forwarder;
pub use token::{Authority, Token, TokenHandle};

/// Fixed-point amount with 18 fractional digits.
pub type Amount = u128;

/// Account or contract identity.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address([u8; 20]);

impl Address {
    pub const ZERO: Address = Address([0u8; 20]);

    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Address whose trailing eight bytes hold `n` big-endian.
    pub fn from_low_u64(n: u64) -> Self {
        let mut bytes = [0u8; 20];
        bytes[12..].copy_from_slice(&n.to_be_bytes());
        Self(bytes)
    }

    /// Deterministic child address for the `index`-th object created under `parent`.
    pub(crate) fn derive(parent: &Address, tag: u8, index: u64) -> Self {
        let mut bytes = [0u8; 20];
        bytes[0] = tag;
        bytes[1..12].copy_from_slice(&parent.0[..11]);
        bytes[12..].copy_from_slice(&(index + 1).to_be_bytes());
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl FromStr for Address {
    type Err = BondError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let mut bytes = [0u8; 20];
        hex::decode_to_slice(digits, &mut bytes)
            .map_err(|e| BondError::InvalidParameters(format!("invalid address {}: {}", s, e)))?;
        Ok(Self(bytes))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

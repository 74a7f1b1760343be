//! Deployment configuration
//!
//! Tax rates, the treasury address, the slope constant and the supply ceiling
//! are per-deployment parameters. They can be built in code or loaded from JSON.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::{BondError, BondResult};
use crate::{Address, Amount};

/// Bond engine parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BondConfig {
    /// Tax on reserve paid into a buy, in basis points
    pub buy_tax_bps: u128,
    /// Tax on the gross refund of a sell, in basis points
    pub sell_tax_bps: u128,
    /// Treasury receiving tax when a trade names no beneficiary
    pub default_beneficiary: Address,
    /// Reserve held at full supply per unit of max supply; fixes slope = 2 * ratio / max_supply
    pub full_curve_reserve_ratio: Amount,
    /// Ceiling on any token's max supply
    pub max_supply_limit: Amount,
}

impl Default for BondConfig {
    fn default() -> Self {
        Self {
            buy_tax_bps: DEFAULT_BUY_TAX_BPS,
            sell_tax_bps: DEFAULT_SELL_TAX_BPS,
            default_beneficiary: Address::from_low_u64(0x7472_6561_7375_7279), // "treasury"
            full_curve_reserve_ratio: DEFAULT_FULL_CURVE_RESERVE_RATIO,
            max_supply_limit: DEFAULT_MAX_SUPPLY_LIMIT,
        }
    }
}

impl BondConfig {
    /// Same parameters with both taxes switched off
    pub fn tax_free(self) -> Self {
        Self {
            buy_tax_bps: 0,
            sell_tax_bps: 0,
            ..self
        }
    }

    pub fn validate(&self) -> BondResult<()> {
        if self.buy_tax_bps > BPS_DENOMINATOR || self.sell_tax_bps > BPS_DENOMINATOR {
            return Err(BondError::InvalidParameters(format!(
                "tax rates must not exceed {} bps (buy {}, sell {})",
                BPS_DENOMINATOR, self.buy_tax_bps, self.sell_tax_bps
            )));
        }
        if self.default_beneficiary.is_zero() {
            return Err(BondError::InvalidParameters(
                "default beneficiary cannot be the zero address".to_string(),
            ));
        }
        if self.full_curve_reserve_ratio == 0 {
            return Err(BondError::InvalidParameters(
                "full curve reserve ratio must be positive".to_string(),
            ));
        }
        if self.max_supply_limit == 0 {
            return Err(BondError::InvalidParameters(
                "max supply limit must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).context("failed to parse bond config")?;
        config.validate().context("invalid bond config")?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read bond config {}", path.display()))?;
        Self::from_json_str(&raw).with_context(|| format!("in {}", path.display()))
    }
}

/// Escrow commission parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForwarderConfig {
    /// Commission taken on accept, in basis points
    pub fee_rate_bps: u128,
    /// Commission destination; zero until an admin sets it
    pub fund_address: Address,
}

impl Default for ForwarderConfig {
    fn default() -> Self {
        Self {
            fee_rate_bps: DEFAULT_FORWARDER_FEE_BPS,
            fund_address: Address::ZERO,
        }
    }
}

//! Bonding Curve Implementation
//!
//! Linear price law `price(s) = m * s` with the reserve held at supply `s`
//! equal to the area under the curve, `m * s^2 / 2`.
//!
//! The slope is kept as the exact rational `m = 2 * ratio / max_supply`, where
//! `ratio` is the reserve per unit of max supply once the curve is full. In raw
//! fixed-point units (P = 1e18):
//!
//! - `reserve(s) = ratio * s^2 / (P * max_supply)`
//! - `price(s)   = 2 * ratio * s / max_supply`
//! - `supply(r)  = floor(sqrt(r * P * max_supply / ratio))`
//!
//! Rounding always favours the reserve: minted supply is floored and the
//! reserve that must stay behind on a sell is ceiled.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::PRECISION;
use crate::error::{BondError, BondResult};
use crate::math::{self, Rounding};
use crate::Amount;

/// Per-token curve parameters, immutable after creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinearCurve {
    pub max_supply: Amount,
    pub reserve_ratio: Amount,
}

/// Outcome of a buy at a given state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuyQuote {
    pub tokens_out: Amount,
    pub tax_amount: Amount,
    pub net_reserve: Amount,
    pub new_supply: Amount,
}

/// Outcome of a sell at a given state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SellQuote {
    pub gross_refund: Amount,
    pub tax_amount: Amount,
    pub net_refund: Amount,
    pub new_supply: Amount,
}

impl LinearCurve {
    pub fn new(max_supply: Amount, reserve_ratio: Amount) -> BondResult<Self> {
        if max_supply == 0 {
            return Err(BondError::InvalidParameters(
                "max supply must be positive".to_string(),
            ));
        }
        if reserve_ratio == 0 {
            return Err(BondError::InvalidParameters(
                "reserve ratio must be positive".to_string(),
            ));
        }
        Ok(Self {
            max_supply,
            reserve_ratio,
        })
    }

    /// Slope `m` as a fixed-point number, floored. Informational only; pricing
    /// uses the exact rational form.
    pub fn slope(&self) -> BondResult<Amount> {
        math::mul_div(&[2, self.reserve_ratio, PRECISION], self.max_supply, Rounding::Down)
    }

    /// Marginal price at `supply`, floored
    pub fn price_at_supply(&self, supply: Amount) -> BondResult<Amount> {
        math::mul_div(&[2, self.reserve_ratio, supply], self.max_supply, Rounding::Down)
    }

    /// Area under the curve over `[0, supply]`
    pub fn reserve_at_supply(&self, supply: Amount, rounding: Rounding) -> BondResult<Amount> {
        let numerator = math::product(&[self.reserve_ratio, supply, supply])?;
        let denominator = math::product(&[PRECISION, self.max_supply])?;
        math::narrow(math::div_rounded(numerator, denominator, rounding)?)
    }

    /// Largest supply whose curve reserve does not exceed `reserve`
    pub fn supply_at_reserve(&self, reserve: Amount) -> BondResult<Amount> {
        let numerator = math::product(&[reserve, PRECISION, self.max_supply])?;
        let radicand = math::div_rounded(
            numerator,
            math::U512::from(self.reserve_ratio),
            Rounding::Down,
        )?;
        math::narrow(math::sqrt_floor(radicand)?)
    }

    /// Tokens minted for `amount_in` of reserve after `tax_bps` is taken off the top.
    ///
    /// Rejects purchases that would cross `max_supply` or mint nothing.
    pub fn quote_buy(
        &self,
        supply: Amount,
        reserve_balance: Amount,
        amount_in: Amount,
        tax_bps: u128,
    ) -> BondResult<BuyQuote> {
        if amount_in == 0 {
            return Err(BondError::InvalidAmount("reserve amount must be positive".to_string()));
        }

        let tax_amount = math::apply_bps(amount_in, tax_bps)?;
        let net_reserve = amount_in - tax_amount;
        let target_reserve = reserve_balance
            .checked_add(net_reserve)
            .ok_or(BondError::Overflow)?;

        let new_supply = self.supply_at_reserve(target_reserve)?;
        if new_supply > self.max_supply {
            return Err(BondError::ExceededMaxSupply {
                new_supply,
                max_supply: self.max_supply,
            });
        }

        // The reserve never sits below the curve, so the target supply is never behind
        let tokens_out = new_supply.checked_sub(supply).ok_or(BondError::Overflow)?;
        if tokens_out == 0 {
            return Err(BondError::InvalidAmount(format!(
                "reserve amount {} is too small to mint any tokens",
                amount_in
            )));
        }

        debug!(
            "buy quote: {} in, {} tax, supply {} -> {}",
            amount_in, tax_amount, supply, new_supply
        );

        Ok(BuyQuote {
            tokens_out,
            tax_amount,
            net_reserve,
            new_supply,
        })
    }

    /// Reserve refunded for burning `amount_in` tokens, after `tax_bps` is taken off the refund
    pub fn quote_sell(
        &self,
        supply: Amount,
        reserve_balance: Amount,
        amount_in: Amount,
        tax_bps: u128,
    ) -> BondResult<SellQuote> {
        if amount_in == 0 {
            return Err(BondError::InvalidAmount("token amount must be positive".to_string()));
        }

        let new_supply = supply
            .checked_sub(amount_in)
            .ok_or(BondError::InsufficientBalance {
                have: supply,
                need: amount_in,
            })?;

        let remaining = self.reserve_at_supply(new_supply, Rounding::Up)?;
        let gross_refund = reserve_balance
            .checked_sub(remaining)
            .ok_or(BondError::Overflow)?;
        if gross_refund == 0 {
            return Err(BondError::InvalidAmount(format!(
                "token amount {} is too small to refund any reserve",
                amount_in
            )));
        }

        let tax_amount = math::apply_bps(gross_refund, tax_bps)?;
        let net_refund = gross_refund - tax_amount;

        debug!(
            "sell quote: {} burned, {} gross, {} tax, supply {} -> {}",
            amount_in, gross_refund, tax_amount, supply, new_supply
        );

        Ok(SellQuote {
            gross_refund,
            tax_amount,
            net_refund,
            new_supply,
        })
    }
}

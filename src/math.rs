//! Fixed-point arithmetic
//!
//! Every product is formed in a 512-bit integer and divided exactly once, so
//! the only precision loss is the final, explicitly chosen rounding step.

use tracing::debug;

use crate::constants::{BPS_DENOMINATOR, PRECISION, SQRT_MAX_ITERATIONS};
use crate::error::{BondError, BondResult};
use crate::Amount;

#[allow(clippy::assign_op_pattern, clippy::ptr_offset_with_cast)]
mod wide {
    uint::construct_uint! {
        /// Wide integer for intermediate products of up to three 128-bit factors.
        pub struct U512(8);
    }
}

pub use wide::U512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    Down,
    Up,
}

/// Whole units to fixed point, e.g. `units(10)` is 10.0.
pub const fn units(whole: u128) -> Amount {
    whole * PRECISION
}

pub(crate) fn product(factors: &[u128]) -> BondResult<U512> {
    factors.iter().try_fold(U512::one(), |acc, &f| {
        acc.checked_mul(U512::from(f)).ok_or(BondError::Overflow)
    })
}

pub(crate) fn div_rounded(numerator: U512, divisor: U512, rounding: Rounding) -> BondResult<U512> {
    if divisor.is_zero() {
        return Err(BondError::InvalidParameters("division by zero".to_string()));
    }
    let quotient = numerator / divisor;
    match rounding {
        Rounding::Down => Ok(quotient),
        Rounding::Up if (numerator % divisor).is_zero() => Ok(quotient),
        Rounding::Up => quotient.checked_add(U512::one()).ok_or(BondError::Overflow),
    }
}

pub(crate) fn narrow(value: U512) -> BondResult<u128> {
    if value > U512::from(u128::MAX) {
        return Err(BondError::Overflow);
    }
    Ok(value.low_u128())
}

/// `factors[0] * factors[1] * ... / divisor`, rounded as requested.
pub fn mul_div(factors: &[u128], divisor: u128, rounding: Rounding) -> BondResult<Amount> {
    let numerator = product(factors)?;
    narrow(div_rounded(numerator, U512::from(divisor), rounding)?)
}

/// `amount * rate_bps / 10000`, floored.
pub fn apply_bps(amount: Amount, rate_bps: u128) -> BondResult<Amount> {
    mul_div(&[amount, rate_bps], BPS_DENOMINATOR, Rounding::Down)
}

/// `floor(sqrt(value))` by Newton iteration from above.
///
/// The iterate decreases strictly until it reaches the floor root, so the
/// result is exact and monotone in `value`. Running out of iterations is
/// reported instead of returning an approximation.
pub fn sqrt_floor(value: U512) -> BondResult<U512> {
    if value.is_zero() {
        return Ok(U512::zero());
    }

    // 2^ceil(bits/2) is always >= sqrt(value)
    let half_bits = (value.bits() as u64 + 1) / 2;
    let mut x = U512::from(2u8).pow(U512::from(half_bits));
    let two = U512::from(2u8);

    for _ in 0..SQRT_MAX_ITERATIONS {
        let next = (x + value / x) / two;
        if next >= x {
            return Ok(x);
        }
        x = next;
    }

    debug!("sqrt did not converge after {} iterations", SQRT_MAX_ITERATIONS);
    Err(BondError::SqrtDidNotConverge)
}

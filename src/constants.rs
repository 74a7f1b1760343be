// Fixed-point precision
pub const DECIMALS: u8 = 18;
pub const PRECISION: u128 = 1_000_000_000_000_000_000; // 1e18

// Basis point denominator for all rates
pub const BPS_DENOMINATOR: u128 = 10_000;

// Tax constants
pub const DEFAULT_BUY_TAX_BPS: u128 = 30;    // 0.3% on reserve paid in
pub const DEFAULT_SELL_TAX_BPS: u128 = 130;  // 1.3% on gross refund

// Supply constants
pub const DEFAULT_MAX_SUPPLY_LIMIT: u128 = 1_000_000 * PRECISION; // 1M tokens per curve

// Curve constants
// Reserve held at full supply, per unit of max supply (1.0 => slope = 2 / max_supply)
pub const DEFAULT_FULL_CURVE_RESERVE_RATIO: u128 = PRECISION;

// Square root iteration budget (Newton converges in well under 300 steps for 512-bit inputs)
pub const SQRT_MAX_ITERATIONS: u32 = 300;

// Token identity limits
pub const MAX_NAME_LENGTH: usize = 64;
pub const MAX_SYMBOL_LENGTH: usize = 32;

// Address derivation prefixes
pub const FACTORY_ADDRESS_TAG: u8 = 0x0f;

// Forwarder constants
pub const DEFAULT_FORWARDER_FEE_BPS: u128 = 500; // 5% commission on accept

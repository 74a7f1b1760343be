//! Error taxonomy for the token, factory, bond and forwarder components.
//!
//! Every variant is returned before any state is touched: a failed call leaves
//! ledgers, reserves and event logs exactly as they were.

use thiserror::Error;

use crate::{Address, Amount};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BondError {
    #[error("token not found: {0}")]
    TokenNotFound(Address),

    #[error("purchase would exceed max supply: new supply {new_supply}, max supply {max_supply}")]
    ExceededMaxSupply { new_supply: Amount, max_supply: Amount },

    #[error("slippage limit exceeded: got {actual}, expected at least {minimum}")]
    SlippageLimitExceeded { actual: Amount, minimum: Amount },

    #[error("permission denied for {0}")]
    PermissionDenied(Address),

    #[error("token already initialized")]
    AlreadyInitialized,

    #[error("token not initialized")]
    NotInitialized,

    #[error("max supply {requested} exceeds the protocol limit {limit}")]
    MaxSupplyLimitExceeded { requested: Amount, limit: Amount },

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("insufficient balance: have {have}, need {need}")]
    InsufficientBalance { have: Amount, need: Amount },

    #[error("insufficient allowance: have {have}, need {need}")]
    InsufficientAllowance { have: Amount, need: Amount },

    #[error("amount limit exceeded: outstanding {outstanding}, requested {requested}")]
    AmountLimitExceeded { outstanding: Amount, requested: Amount },

    #[error("arithmetic overflow")]
    Overflow,

    #[error("square root did not converge")]
    SqrtDidNotConverge,
}

pub type BondResult<T> = Result<T, BondError>;

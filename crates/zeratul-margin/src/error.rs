//! error types for the margin engine

use crate::types::Direction;
use rust_decimal::Decimal;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, MarginError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarginError {
    // === validation ===
    #[error("invalid leverage {leverage}: must be within [1, {max}]")]
    InvalidLeverage { leverage: Decimal, max: Decimal },

    #[error("invalid asset: {0}")]
    InvalidAsset(String),

    #[error("invalid address: {0:?}")]
    InvalidAddress(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("direction {0} is not supported for leveraged lp")]
    UnsupportedDirection(Direction),

    #[error("position {id} not found for {owner}")]
    PositionNotFound { owner: String, id: u64 },

    #[error("invalid take profit price {price}: must exceed current price {current}")]
    InvalidTakeProfit { price: Decimal, current: Decimal },

    #[error("max open positions reached ({0})")]
    MaxOpenPositions(u64),

    // === liquidity and valuation ===
    #[error("pool {pool_id} unavailable: {reason}")]
    PoolUnavailable { pool_id: u64, reason: String },

    #[error("pool {pool_id} capacity exceeded: health {health} below {threshold}")]
    PoolCapacityExceeded {
        pool_id: u64,
        health: Decimal,
        threshold: Decimal,
    },

    #[error("insufficient liquidity: {0}")]
    InsufficientLiquidity(String),

    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),

    #[error("valuation of {from} in {to} unavailable: {reason}")]
    ValuationUnavailable {
        from: String,
        to: String,
        reason: String,
    },

    #[error("position health {health} below safe threshold {threshold}")]
    UnsafePosition { health: Decimal, threshold: Decimal },

    // === arithmetic ===
    #[error("health undefined: liabilities are zero")]
    DegenerateHealth,

    #[error("arithmetic overflow: {0}")]
    Overflow(&'static str),

    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    // === configuration ===
    #[error("invalid params: {0}")]
    InvalidParams(String),

    #[error("config error: {0}")]
    Config(String),
}

/// Failures reported by external collaborators (amm, oracle, bank, lending)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollaboratorError {
    #[error("no route from {from} to {to}")]
    NoRoute { from: String, to: String },

    #[error("pool {0} not found")]
    UnknownPool(u64),

    #[error("insufficient pool liquidity: {0}")]
    InsufficientLiquidity(String),

    #[error("insufficient funds: have {have}, need {need}")]
    InsufficientFunds { have: u128, need: u128 },

    #[error("price unavailable for {0}")]
    PriceUnavailable(String),

    #[error("slippage: got {got}, minimum {min}")]
    Slippage { got: u128, min: u128 },

    #[error("rejected: {0}")]
    Rejected(String),
}

impl From<serde_yaml::Error> for MarginError {
    fn from(e: serde_yaml::Error) -> Self {
        MarginError::Config(e.to_string())
    }
}

impl From<serde_json::Error> for MarginError {
    fn from(e: serde_json::Error) -> Self {
        MarginError::Config(e.to_string())
    }
}

impl From<std::io::Error> for MarginError {
    fn from(e: std::io::Error) -> Self {
        MarginError::Config(e.to_string())
    }
}

impl MarginError {
    /// Map a failed fund movement (bank, lending, amm execution)
    pub(crate) fn settlement(context: &str, e: CollaboratorError) -> Self {
        match e {
            CollaboratorError::InsufficientFunds { .. } => {
                MarginError::InsufficientFunds(format!("{}: {}", context, e))
            }
            _ => MarginError::InsufficientLiquidity(format!("{}: {}", context, e)),
        }
    }
}

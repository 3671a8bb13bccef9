//! Events emitted by the keeper

use crate::position::Position;
use crate::types::{format_dec, Address, Amount, Coin};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    User,
    TakeProfit,
    Liquidation,
    PoolWindDown,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CloseReason::User => "user",
            CloseReason::TakeProfit => "take_profit",
            CloseReason::Liquidation => "liquidation",
            CloseReason::PoolWindDown => "pool_wind_down",
        };
        f.write_str(s)
    }
}

/// Position attributes attached to lifecycle events
///
/// Decimals are rendered with 18 fractional digits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionAttributes {
    pub id: u64,
    pub address: Address,
    pub amm_pool_id: u64,
    pub collateral: Coin,
    pub repay_amount: Amount,
    pub leverage: String,
    pub liabilities: Amount,
    pub interest_paid: Amount,
    pub health: String,
}

impl PositionAttributes {
    pub fn new(position: &Position, repay_amount: Amount) -> Self {
        Self {
            id: position.id,
            address: position.owner.clone(),
            amm_pool_id: position.amm_pool_id,
            collateral: position.collateral(),
            repay_amount,
            leverage: format_dec(position.leverage),
            liabilities: position.liabilities,
            interest_paid: position.interest_paid_collateral,
            health: format_dec(position.health),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MarginEvent {
    Opened(PositionAttributes),
    CollateralAdded {
        position: PositionAttributes,
        amount: Amount,
    },
    Closed {
        position: PositionAttributes,
        reason: CloseReason,
    },
    ForceClosed {
        position: PositionAttributes,
        reason: CloseReason,
    },
    /// Shortfall written off against the lending facility
    ShortfallWrittenOff {
        id: u64,
        address: Address,
        amm_pool_id: u64,
        shortfall: Coin,
    },
    /// Interest accrual failed and will be retried next epoch
    InterestSkipped {
        id: u64,
        address: Address,
        error: String,
    },
}

impl MarginEvent {
    /// Position id the event refers to
    pub fn position_id(&self) -> u64 {
        match self {
            MarginEvent::Opened(position)
            | MarginEvent::CollateralAdded { position, .. }
            | MarginEvent::Closed { position, .. }
            | MarginEvent::ForceClosed { position, .. } => position.id,
            MarginEvent::ShortfallWrittenOff { id, .. } | MarginEvent::InterestSkipped { id, .. } => {
                *id
            }
        }
    }
}

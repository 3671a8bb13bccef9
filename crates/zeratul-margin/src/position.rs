//! Leveraged position (MTP) record

use crate::config::InterestPolicy;
use crate::error::Result;
use crate::types::{Address, Amount, Coin, Denom, Direction};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Positions are keyed by owner first so per-owner scans are range reads
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PositionKey {
    pub owner: Address,
    pub id: u64,
}

impl PositionKey {
    pub fn new(owner: Address, id: u64) -> Self {
        Self { owner, id }
    }
}

impl fmt::Display for PositionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.owner, self.id)
    }
}

/// An open leveraged LP position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: u64,
    pub owner: Address,
    pub amm_pool_id: u64,
    pub direction: Direction,

    /// Leverage requested at open
    pub leverage: Decimal,

    /// Health as of the last recompute
    pub health: Decimal,

    /// Asset and amount the owner deposited at open
    pub collateral_asset: Denom,
    pub collateral_amount: Amount,

    /// Top-up collateral in the borrow asset, not routed into the pool
    pub free_collateral: Amount,

    /// Custody asset price (in base currency) that triggers a close
    pub take_profit_price: Option<Decimal>,

    /// Pool shares held for the position
    pub custody_asset: Denom,
    pub custody_amount: Amount,

    /// Outstanding borrowed principal, in the borrow asset
    pub borrow_asset: Denom,
    pub liabilities: Amount,

    pub interest_paid_collateral: Amount,
    pub interest_paid_custody: Amount,
    pub interest_unpaid_collateral: Amount,

    pub opened_at: u64,
    pub last_interest_time: u64,
}

impl Position {
    pub fn key(&self) -> PositionKey {
        PositionKey::new(self.owner.clone(), self.id)
    }

    /// Amount owed to the lending facility under `policy`
    pub fn debt(&self, policy: InterestPolicy) -> Result<Amount> {
        match policy {
            InterestPolicy::Stacked => Ok(self.liabilities),
            InterestPolicy::Separate => self
                .liabilities
                .try_add(self.interest_unpaid_collateral, "position debt"),
        }
    }

    /// Everything backing the position: custody plus free collateral
    pub fn holdings(&self) -> Vec<Coin> {
        vec![
            Coin::new(self.custody_asset.clone(), self.custody_amount),
            Coin::new(self.borrow_asset.clone(), self.free_collateral),
        ]
    }

    pub fn collateral(&self) -> Coin {
        Coin::new(self.collateral_asset.clone(), self.collateral_amount)
    }
}

//! Per-pool leveraged exposure tracking

use crate::error::{MarginError, Result};
use crate::types::{ratio, Amount};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Leveraged LP state of one AMM pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    pub amm_pool_id: u64,

    /// Share of the AMM pool not held by leveraged positions
    pub health: Decimal,

    pub enabled: bool,

    /// Terminal: a closed pool accepts no new exposure and is wound down
    pub closed: bool,

    /// Pool shares held by leveraged positions
    pub leveraged_lp_amount: Amount,

    pub leverage_max: Decimal,
}

impl Pool {
    pub fn new(amm_pool_id: u64, leverage_max: Decimal, enabled: bool) -> Self {
        Self {
            amm_pool_id,
            health: Decimal::ONE,
            enabled,
            closed: false,
            leveraged_lp_amount: Amount::ZERO,
            leverage_max,
        }
    }

    fn unavailable(&self, reason: &str) -> MarginError {
        MarginError::PoolUnavailable {
            pool_id: self.amm_pool_id,
            reason: reason.to_string(),
        }
    }

    fn accepting(&self) -> Result<()> {
        if self.closed {
            return Err(self.unavailable("pool closed"));
        }
        if !self.enabled {
            return Err(self.unavailable("pool disabled"));
        }
        Ok(())
    }

    pub fn can_open(&self, leverage: Decimal) -> Result<()> {
        self.accepting()?;
        if leverage < Decimal::ONE || leverage > self.leverage_max {
            return Err(MarginError::InvalidLeverage {
                leverage,
                max: self.leverage_max,
            });
        }
        Ok(())
    }

    pub fn register(&mut self, delta: Amount) -> Result<()> {
        self.accepting()?;
        self.leveraged_lp_amount = self
            .leveraged_lp_amount
            .try_add(delta, "leveraged lp amount")?;
        Ok(())
    }

    pub fn release(&mut self, delta: Amount) -> Result<()> {
        self.leveraged_lp_amount = self
            .leveraged_lp_amount
            .checked_sub(delta)
            .ok_or_else(|| {
                MarginError::InvariantViolation(format!(
                    "pool {} releases {} with only {} registered",
                    self.amm_pool_id, delta, self.leveraged_lp_amount
                ))
            })?;
        Ok(())
    }

    /// `(total_shares - leveraged) / total_shares`, 1 for an empty pool
    pub fn recompute_health(&mut self, total_shares: Amount) -> Result<Decimal> {
        self.health = if total_shares.is_zero() {
            Decimal::ONE
        } else {
            let free = total_shares.checked_sub(self.leveraged_lp_amount).ok_or_else(|| {
                MarginError::InvariantViolation(format!(
                    "pool {} leveraged amount {} exceeds total shares {}",
                    self.amm_pool_id, self.leveraged_lp_amount, total_shares
                ))
            })?;
            ratio(free, total_shares)?
        };
        Ok(self.health)
    }
}

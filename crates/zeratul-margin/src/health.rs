//! Position health
//!
//! `health = custody value / debt value`, both expressed in the base
//! currency. Custody value covers the pool shares and any free collateral.

use crate::config::Params;
use crate::error::{MarginError, Result};
use crate::host::Amm;
use crate::position::Position;
use crate::types::{ratio, Amount};
use crate::valuation::ValuationAdapter;
use rust_decimal::Decimal;

pub struct HealthCalculator<'a> {
    params: &'a Params,
}

impl<'a> HealthCalculator<'a> {
    pub fn new(params: &'a Params) -> Self {
        Self { params }
    }

    pub fn custody_value<A: Amm + ?Sized>(&self, amm: &A, position: &Position) -> Result<Amount> {
        ValuationAdapter::new(amm).consolidate(&position.holdings(), &self.params.base_currency)
    }

    pub fn debt_value<A: Amm + ?Sized>(&self, amm: &A, position: &Position) -> Result<Amount> {
        let debt = position.debt(self.params.interest_policy)?;
        ValuationAdapter::new(amm).value_of(debt, &position.borrow_asset, &self.params.base_currency)
    }

    /// Fails with [`MarginError::DegenerateHealth`] when nothing is owed
    pub fn health<A: Amm + ?Sized>(&self, amm: &A, position: &Position) -> Result<Decimal> {
        let debt_value = self.debt_value(amm, position)?;
        if debt_value.is_zero() {
            return Err(MarginError::DegenerateHealth);
        }
        let custody_value = self.custody_value(amm, position)?;
        ratio(custody_value, debt_value)
    }

    /// Like [`health`](Self::health), but a debt-free position is maximally healthy
    pub fn health_or_max<A: Amm + ?Sized>(&self, amm: &A, position: &Position) -> Result<Decimal> {
        match self.health(amm, position) {
            Err(MarginError::DegenerateHealth) => Ok(Decimal::MAX),
            other => other,
        }
    }

    pub fn is_liquidatable(&self, health: Decimal) -> bool {
        health <= self.params.liquidation_threshold
    }

    pub fn is_safe(&self, health: Decimal) -> bool {
        health >= self.params.safe_threshold
    }
}

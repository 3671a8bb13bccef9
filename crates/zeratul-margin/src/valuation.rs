//! Conversion of holdings into a common valuation unit
//!
//! Values come from the AMM's swap estimates, so they already account for
//! pool depth and fees. Nothing here moves funds.

use crate::error::{MarginError, Result};
use crate::host::Amm;
use crate::types::{Amount, Coin, Denom};

pub struct ValuationAdapter<'a, A: Amm + ?Sized> {
    amm: &'a A,
}

impl<'a, A: Amm + ?Sized> ValuationAdapter<'a, A> {
    pub fn new(amm: &'a A) -> Self {
        Self { amm }
    }

    /// Amount of `to` that `amount` of `from` would swap into
    pub fn value_of(&self, amount: Amount, from: &Denom, to: &Denom) -> Result<Amount> {
        if from == to {
            return Ok(amount);
        }
        let route = self
            .amm
            .route(from, to)
            .ok_or_else(|| unavailable(from, to, "no route"))?;
        let value = self
            .amm
            .estimate_swap_exact_in(&Coin::new(from.clone(), amount), &route)
            .map_err(|e| unavailable(from, to, &e.to_string()))?;
        tracing::debug!("valued {}{} at {}{}", amount, from, value, to);
        Ok(value)
    }

    /// Amount of `from` needed to obtain `amount_out` of `to`
    pub fn cost_of(&self, amount_out: Amount, from: &Denom, to: &Denom) -> Result<Amount> {
        if from == to {
            return Ok(amount_out);
        }
        let route = self
            .amm
            .route(from, to)
            .ok_or_else(|| unavailable(from, to, "no route"))?;
        self.amm
            .estimate_swap_exact_out(&Coin::new(to.clone(), amount_out), &route)
            .map_err(|e| unavailable(from, to, &e.to_string()))
    }

    /// Total value of `holdings` in `base`
    ///
    /// Zero holdings are skipped; the first holding that cannot be valued
    /// fails the whole consolidation.
    pub fn consolidate(&self, holdings: &[Coin], base: &Denom) -> Result<Amount> {
        holdings
            .iter()
            .filter(|coin| !coin.amount.is_zero())
            .try_fold(Amount::ZERO, |total, coin| {
                let value = self.value_of(coin.amount, &coin.denom, base)?;
                total.try_add(value, "consolidated value")
            })
    }
}

fn unavailable(from: &Denom, to: &Denom, reason: &str) -> MarginError {
    MarginError::ValuationUnavailable {
        from: from.to_string(),
        to: to.to_string(),
        reason: reason.to_string(),
    }
}

//! Interest accrual on borrowed principal
//!
//! Interest for a period is `liabilities * rate_per_year * elapsed / year`,
//! truncated to whole units. Free collateral pays first; whatever it cannot
//! cover is carried according to the configured [`InterestPolicy`].
//!
//! Accruals are planned against an immutable position and then applied, so
//! a caller can value and health-check the result before any funds move.

use crate::config::InterestPolicy;
use crate::error::{MarginError, Result};
use crate::position::Position;
use crate::types::{Amount, SECONDS_PER_YEAR};
use rust_decimal::Decimal;

/// Interest accrued on `liabilities` over `elapsed` seconds
pub fn interest_due(liabilities: Amount, rate_per_year: Decimal, elapsed: u64) -> Result<Amount> {
    if liabilities.is_zero() || elapsed == 0 || rate_per_year <= Decimal::ZERO {
        return Ok(Amount::ZERO);
    }
    let period_rate = rate_per_year
        .checked_mul(Decimal::from(elapsed))
        .and_then(|r| r.checked_div(Decimal::from(SECONDS_PER_YEAR)))
        .ok_or(MarginError::Overflow("period rate"))?;
    liabilities.mul_dec_trunc(period_rate)
}

/// Planned interest movement for one position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Accrual {
    /// Interest accrued this period
    pub due: Amount,
    /// Interest to be paid now, including carried unpaid interest
    pub owed: Amount,
    /// Portion of `owed` paid from free collateral
    pub paid: Amount,
    /// Custody-asset equivalent of `paid`
    pub paid_custody: Amount,
    /// Portion of `owed` left unpaid
    pub unpaid: Amount,
    /// Time the accrual runs up to
    pub until: u64,
}

impl Accrual {
    /// Epoch accrual: free collateral pays as much of the interest as it can
    pub fn plan(
        position: &Position,
        policy: InterestPolicy,
        rate_per_year: Decimal,
        now: u64,
    ) -> Result<Self> {
        let elapsed = now.saturating_sub(position.last_interest_time);
        let due = interest_due(position.liabilities, rate_per_year, elapsed)?;
        let owed = match policy {
            InterestPolicy::Stacked => due,
            InterestPolicy::Separate => {
                due.try_add(position.interest_unpaid_collateral, "owed interest")?
            }
        };
        let paid = owed.min(position.free_collateral);
        Ok(Self {
            due,
            owed,
            paid,
            paid_custody: Amount::ZERO,
            unpaid: owed.try_sub(paid, "unpaid interest")?,
            until: now.max(position.last_interest_time),
        })
    }

    /// Settlement accrual: interest since the last epoch goes straight to debt
    pub fn settlement(
        position: &Position,
        policy: InterestPolicy,
        rate_per_year: Decimal,
        now: u64,
    ) -> Result<Self> {
        let mut accrual = Self::plan(position, policy, rate_per_year, now)?;
        accrual.paid = Amount::ZERO;
        accrual.unpaid = accrual.owed;
        Ok(accrual)
    }

    pub fn with_paid_custody(mut self, paid_custody: Amount) -> Self {
        self.paid_custody = paid_custody;
        self
    }

    pub fn apply(&self, position: &mut Position, policy: InterestPolicy) -> Result<()> {
        position.free_collateral = position
            .free_collateral
            .try_sub(self.paid, "free collateral")?;
        position.interest_paid_collateral = position
            .interest_paid_collateral
            .try_add(self.paid, "interest paid")?;
        position.interest_paid_custody = position
            .interest_paid_custody
            .try_add(self.paid_custody, "interest paid in custody")?;
        match policy {
            InterestPolicy::Stacked => {
                position.liabilities = position
                    .liabilities
                    .try_add(self.unpaid, "liabilities")?;
                position.interest_unpaid_collateral = position
                    .interest_unpaid_collateral
                    .try_add(self.unpaid, "unpaid interest")?;
            }
            // owed already includes the carried bucket
            InterestPolicy::Separate => position.interest_unpaid_collateral = self.unpaid,
        }
        position.last_interest_time = self.until;
        Ok(())
    }
}

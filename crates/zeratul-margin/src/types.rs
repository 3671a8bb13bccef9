//! Core value types for the margin engine
//!
//! Token amounts are exact unsigned integers. Ratios, prices, rates, leverage
//! and health are fixed-point decimals; amounts derived from a decimal product
//! are truncated toward zero so they stay representable as integers.

use crate::error::{MarginError, Result};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Seconds in the interest year (365 days)
pub const SECONDS_PER_YEAR: u64 = 31_536_000;

/// Fractional digits used when rendering decimals in events and queries
pub const DECIMAL_PRECISION: u32 = 18;

/// Module account that holds custody and borrowed funds
pub const MODULE_ACCOUNT: &str = "leveragelp";

/// Amount of an asset in its smallest unit
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Amount(pub u128);

impl Amount {
    pub const ZERO: Self = Amount(0);

    pub const fn new(value: u128) -> Self {
        Amount(value)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }

    pub fn saturating_sub(self, other: Amount) -> Amount {
        Amount(self.0.saturating_sub(other.0))
    }

    /// Checked add that reports which quantity overflowed
    pub fn try_add(self, other: Amount, what: &'static str) -> Result<Amount> {
        self.checked_add(other).ok_or(MarginError::Overflow(what))
    }

    /// Checked sub that reports which quantity underflowed
    pub fn try_sub(self, other: Amount, what: &'static str) -> Result<Amount> {
        self.checked_sub(other).ok_or(MarginError::Overflow(what))
    }

    pub fn to_decimal(self) -> Result<Decimal> {
        Decimal::from_u128(self.0).ok_or(MarginError::Overflow("amount exceeds decimal range"))
    }

    /// Convert a non-negative decimal to an amount, truncating the fraction
    pub fn from_decimal_trunc(value: Decimal) -> Result<Amount> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(MarginError::Overflow("negative amount"));
        }
        value
            .trunc()
            .to_u128()
            .map(Amount)
            .ok_or(MarginError::Overflow("decimal exceeds amount range"))
    }

    /// `self * factor`, truncated toward zero
    pub fn mul_dec_trunc(self, factor: Decimal) -> Result<Amount> {
        let product = self
            .to_decimal()?
            .checked_mul(factor)
            .ok_or(MarginError::Overflow("amount multiplication"))?;
        Amount::from_decimal_trunc(product)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u128> for Amount {
    fn from(value: u128) -> Self {
        Amount(value)
    }
}

/// Validated asset denomination
///
/// Follows the ledger's denom grammar: a leading letter followed by 2..=127
/// characters from `[a-zA-Z0-9/:._-]`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Denom(String);

impl Denom {
    pub fn new(denom: impl Into<String>) -> Result<Self> {
        let denom = denom.into();
        let mut chars = denom.chars();
        let leading_ok = chars.next().is_some_and(|c| c.is_ascii_alphabetic());
        let rest_ok = chars.all(|c| c.is_ascii_alphanumeric() || "/:._-".contains(c));
        if !leading_ok || !rest_ok || denom.len() < 3 || denom.len() > 128 {
            return Err(MarginError::InvalidAsset(denom));
        }
        Ok(Denom(denom))
    }

    pub(crate) fn from_static(denom: &'static str) -> Self {
        Denom(denom.to_string())
    }

    /// Share denom of an AMM pool, the custody asset of leveraged LP positions
    pub fn pool_share(amm_pool_id: u64) -> Self {
        Denom(format!("amm/pool/{}", amm_pool_id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Denom {
    type Error = MarginError;

    fn try_from(value: String) -> Result<Self> {
        Denom::new(value)
    }
}

impl From<Denom> for String {
    fn from(denom: Denom) -> Self {
        denom.0
    }
}

impl fmt::Display for Denom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An amount of a specific denom
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    pub denom: Denom,
    pub amount: Amount,
}

impl Coin {
    pub fn new(denom: Denom, amount: Amount) -> Self {
        Self { denom, amount }
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

/// Account identifier on the ledger
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    pub fn new(address: impl Into<String>) -> Result<Self> {
        let address = address.into();
        if address.trim().is_empty() {
            return Err(MarginError::InvalidAddress(address));
        }
        Ok(Address(address))
    }

    /// Account owned by a module rather than a user
    pub fn module(name: &str) -> Self {
        Address(format!("module/{}", name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Address {
    type Error = MarginError;

    fn try_from(value: String) -> Result<Self> {
        Address::new(value)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Side of a leveraged position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Long,
    Short,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Long => f.write_str("LONG"),
            Direction::Short => f.write_str("SHORT"),
        }
    }
}

/// Height and unix time of the block being processed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockInfo {
    pub height: u64,
    pub time: u64,
}

impl BlockInfo {
    pub fn new(height: u64, time: u64) -> Self {
        Self { height, time }
    }
}

/// Render a decimal with the ledger's fixed 18 fractional digits
pub fn format_dec(value: Decimal) -> String {
    let mut scaled = value;
    scaled.rescale(DECIMAL_PRECISION);
    scaled.to_string()
}

/// `numerator / denominator` as a decimal
pub fn ratio(numerator: Amount, denominator: Amount) -> Result<Decimal> {
    if denominator.is_zero() {
        return Err(MarginError::Overflow("division by zero"));
    }
    numerator
        .to_decimal()?
        .checked_div(denominator.to_decimal()?)
        .ok_or(MarginError::Overflow("ratio"))
}

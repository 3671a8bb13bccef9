//! Collaborators the engine depends on
//!
//! The engine never owns pool state, prices, balances or lending reserves.
//! It reaches them through these traits; a chain runtime implements them on
//! its own state and the tests implement them on a mock chain.

use crate::error::CollaboratorError;
use crate::types::{Address, Amount, Coin, Denom};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub type CollaboratorResult<T> = std::result::Result<T, CollaboratorError>;

/// Route resolved by the AMM for a single hop swap
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapRoute {
    pub pool_id: u64,
    pub token_out_denom: Denom,
}

/// Summary of a liquidity pool as listed by the AMM
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmmPoolInfo {
    pub pool_id: u64,
    pub assets: Vec<Denom>,
    pub total_shares: Amount,
}

pub trait Amm {
    /// Resolve a route from `from` to `to`, including joins into and exits
    /// out of a pool share denom
    fn route(&self, from: &Denom, to: &Denom) -> Option<SwapRoute>;

    /// Output amount for swapping `coin_in` along `route`, without executing
    fn estimate_swap_exact_in(&self, coin_in: &Coin, route: &SwapRoute)
        -> CollaboratorResult<Amount>;

    /// Input amount needed to receive `coin_out` along `route`
    fn estimate_swap_exact_out(
        &self,
        coin_out: &Coin,
        route: &SwapRoute,
    ) -> CollaboratorResult<Amount>;

    /// Execute a swap from `sender`'s balance; output is credited to `sender`
    fn swap_exact_in(
        &mut self,
        sender: &Address,
        coin_in: &Coin,
        route: &SwapRoute,
        min_out: Amount,
    ) -> CollaboratorResult<Amount>;

    fn pool_tvl(&self, pool_id: u64) -> CollaboratorResult<Decimal>;

    fn pool_total_shares(&self, pool_id: u64) -> CollaboratorResult<Amount>;

    fn liquidity_pools(&self) -> Vec<AmmPoolInfo>;
}

pub trait PriceOracle {
    /// Price of one unit of `denom` in the base currency
    fn price(&self, denom: &Denom) -> CollaboratorResult<Decimal>;
}

pub trait Bank {
    fn send(&mut self, from: &Address, to: &Address, coin: &Coin) -> CollaboratorResult<()>;

    fn balance(&self, address: &Address, denom: &Denom) -> Amount;
}

/// Source of borrowed funds and sink for repayments
pub trait LendingFacility {
    fn borrow_denom(&self) -> Denom;

    /// Annual borrow rate as a fraction (0.12 = 12% per year)
    fn interest_rate(&self) -> Decimal;

    fn available(&self) -> Amount;

    /// Lend `amount` of the borrow denom to `to`
    fn borrow(&mut self, to: &Address, amount: Amount) -> CollaboratorResult<()>;

    /// Return principal from `from`
    fn repay(&mut self, from: &Address, amount: Amount) -> CollaboratorResult<()>;

    fn pay_interest(&mut self, from: &Address, amount: Amount) -> CollaboratorResult<()>;

    /// Forgive principal that could not be repaid
    fn write_off(&mut self, amount: Amount) -> CollaboratorResult<()>;
}

/// Destination of realised shortfalls
pub trait InsuranceFund {
    fn absorb(&mut self, amm_pool_id: u64, shortfall: &Coin) -> CollaboratorResult<()>;
}

/// Atomic rollback support for collaborator state
pub trait Checkpoint {
    type Snapshot;

    fn checkpoint(&self) -> Self::Snapshot;

    fn restore(&mut self, snapshot: Self::Snapshot);
}

/// Everything the keeper needs from the surrounding chain
pub trait Host: Amm + PriceOracle + Bank + LendingFacility + InsuranceFund + Checkpoint {}

impl<T> Host for T where T: Amm + PriceOracle + Bank + LendingFacility + InsuranceFund + Checkpoint
{}

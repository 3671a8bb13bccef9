//! Leveraged LP margin engine
//!
//! Users post collateral, borrow up to a leverage multiple from a lending
//! facility, and hold the total principal as AMM pool shares. The engine
//! tracks each position's health against live valuations, accrues interest
//! on the borrowed principal once per epoch, and settles positions on
//! voluntary close, take-profit, liquidation or pool wind-down.
//!
//! The AMM, oracle, bank, lending facility and insurance fund are reached
//! through the traits in [`host`]; [`Keeper`] drives the lifecycle.
//!
//! ```ignore
//! let mut keeper = Keeper::new(Params::load("margin.yaml")?)?;
//! keeper.create_pool(1, dec!(5), true)?;
//! let response = keeper.open(&mut chain, request, block)?;
//! let report = keeper.begin_blocker(&mut chain, next_block);
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod health;
pub mod host;
pub mod interest;
pub mod keeper;
pub mod pool;
pub mod position;
pub mod store;
pub mod types;
pub mod valuation;

pub use config::{InterestPolicy, Params};
pub use error::{CollaboratorError, MarginError, Result};
pub use events::{CloseReason, MarginEvent, PositionAttributes};
pub use health::HealthCalculator;
pub use host::{
    AmmPoolInfo, Amm, Bank, Checkpoint, CollaboratorResult, Host, InsuranceFund, LendingFacility,
    PriceOracle, SwapRoute,
};
pub use keeper::{
    AccrualReport, BlockReport, ForceCloseOutcome, Keeper, OpenRequest, PositionResponse,
};
pub use pool::Pool;
pub use position::{Position, PositionKey};
pub use types::{Address, Amount, BlockInfo, Coin, Denom, Direction};
pub use valuation::ValuationAdapter;

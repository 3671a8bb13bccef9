//! In-memory chain implementing every collaborator the keeper needs
//!
//! The AMM is oracle priced: joining pool `N` mints shares worth the input
//! value less the join fee, exiting pays out the shares' oracle value less the
//! exit fee, and plain swaps convert at the oracle price ratio. Shares of
//! pool `N` are priced by the oracle under `amm/pool/N`.

#![allow(dead_code)]

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::cell::Cell;
use std::collections::BTreeMap;
use zeratul_margin::*;

pub const POOL_ID: u64 = 1;
pub const JOIN_FEE: Decimal = dec!(0.0232);
pub const USER_FUNDS: u128 = 100_000;
pub const LENDING_DEPOSIT: u128 = 10_000;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}

pub fn denom(s: &str) -> Denom {
    Denom::new(s).unwrap()
}

pub fn usdc() -> Denom {
    denom("uusdc")
}

pub fn usdt() -> Denom {
    denom("uusdt")
}

pub fn shares() -> Denom {
    Denom::pool_share(POOL_ID)
}

pub fn alice() -> Address {
    Address::new("elys1alice").unwrap()
}

pub fn bob() -> Address {
    Address::new("elys1bob").unwrap()
}

pub fn lending_account() -> Address {
    Address::module("stablestake")
}

pub fn module_account() -> Address {
    Address::module(zeratul_margin::types::MODULE_ACCOUNT)
}

#[derive(Debug, Clone)]
pub struct MockPool {
    pub assets: BTreeMap<Denom, u128>,
    pub total_shares: u128,
    pub join_fee: Decimal,
    pub exit_fee: Decimal,
}

#[derive(Debug, Clone)]
pub struct MockChain {
    pub balances: BTreeMap<(Address, Denom), u128>,
    pub prices: BTreeMap<Denom, Decimal>,
    pub pools: BTreeMap<u64, MockPool>,
    pub borrow_denom: Denom,
    pub rate: Decimal,
    pub principal_outstanding: u128,
    pub interest_received: u128,
    pub written_off: u128,
    pub insurance: Vec<(u64, Coin)>,
    /// Drop all routes, simulating an AMM that cannot value anything
    pub routes_broken: bool,
    /// Fail swap estimates while swaps still execute
    pub quotes_broken: bool,
    pub fail_repay: bool,
    /// Number of checkpoints taken
    pub checkpoints: Cell<usize>,
}

impl MockChain {
    /// Pool 1 holds 100k uusdc and 100k uusdt against 200k shares, every
    /// price is 1, the lending facility holds 10k uusdc at 100% per year,
    /// and alice and bob each hold 100k of both assets.
    pub fn new() -> Self {
        let mut chain = Self {
            balances: BTreeMap::new(),
            prices: BTreeMap::new(),
            pools: BTreeMap::new(),
            borrow_denom: usdc(),
            rate: dec!(1.0),
            principal_outstanding: 0,
            interest_received: 0,
            written_off: 0,
            insurance: Vec::new(),
            routes_broken: false,
            quotes_broken: false,
            fail_repay: false,
            checkpoints: Cell::new(0),
        };
        chain.prices.insert(usdc(), Decimal::ONE);
        chain.prices.insert(usdt(), Decimal::ONE);
        chain.prices.insert(shares(), Decimal::ONE);
        chain.pools.insert(
            POOL_ID,
            MockPool {
                assets: [(usdc(), 100_000), (usdt(), 100_000)].into_iter().collect(),
                total_shares: 200_000,
                join_fee: JOIN_FEE,
                exit_fee: Decimal::ZERO,
            },
        );
        for user in [alice(), bob()] {
            chain.mint(&user, &usdc(), USER_FUNDS);
            chain.mint(&user, &usdt(), USER_FUNDS);
        }
        chain.mint(&lending_account(), &usdc(), LENDING_DEPOSIT);
        chain
    }

    pub fn mint(&mut self, address: &Address, denom: &Denom, amount: u128) {
        *self
            .balances
            .entry((address.clone(), denom.clone()))
            .or_default() += amount;
    }

    pub fn bal(&self, address: &Address, denom: &Denom) -> u128 {
        self.balance(address, denom).0
    }

    pub fn set_price(&mut self, denom: &Denom, price: Decimal) {
        self.prices.insert(denom.clone(), price);
    }

    fn debit(&mut self, address: &Address, denom: &Denom, amount: u128) -> CollaboratorResult<()> {
        let have = self.bal(address, denom);
        if have < amount {
            return Err(CollaboratorError::InsufficientFunds { have, need: amount });
        }
        self.balances
            .insert((address.clone(), denom.clone()), have - amount);
        Ok(())
    }

    fn oracle(&self, denom: &Denom) -> CollaboratorResult<Decimal> {
        self.prices
            .get(denom)
            .copied()
            .ok_or_else(|| CollaboratorError::PriceUnavailable(denom.to_string()))
    }

    fn share_pool(denom: &Denom) -> Option<u64> {
        denom.as_str().strip_prefix("amm/pool/")?.parse().ok()
    }

    fn pool(&self, pool_id: u64) -> CollaboratorResult<&MockPool> {
        self.pools
            .get(&pool_id)
            .ok_or(CollaboratorError::UnknownPool(pool_id))
    }

    fn trunc(value: Decimal) -> Amount {
        Amount(value.trunc().to_u128().unwrap_or(0))
    }

    /// Output of swapping `coin_in` through `route`, bounded by pool reserves
    fn quote(&self, coin_in: &Coin, route: &SwapRoute) -> CollaboratorResult<Amount> {
        let pool = self.pool(route.pool_id)?;
        let amount = Decimal::from(coin_in.amount.0);
        let value_in = amount * self.oracle(&coin_in.denom)?;
        let price_out = self.oracle(&route.token_out_denom)?;
        let fee = if Self::share_pool(&route.token_out_denom).is_some() {
            pool.join_fee
        } else if Self::share_pool(&coin_in.denom).is_some() {
            pool.exit_fee
        } else {
            Decimal::ZERO
        };
        let out = Self::trunc(value_in / price_out * (Decimal::ONE - fee));
        if Self::share_pool(&route.token_out_denom).is_none() {
            let reserve = pool.assets.get(&route.token_out_denom).copied().unwrap_or(0);
            if out.0 > reserve {
                return Err(CollaboratorError::InsufficientLiquidity(format!(
                    "pool {} has {}{}",
                    route.pool_id, reserve, route.token_out_denom
                )));
            }
        }
        Ok(out)
    }
}

impl Amm for MockChain {
    fn route(&self, from: &Denom, to: &Denom) -> Option<SwapRoute> {
        if self.routes_broken {
            return None;
        }
        let holds = |pool_id: u64, denom: &Denom| {
            self.pools
                .get(&pool_id)
                .is_some_and(|pool| pool.assets.contains_key(denom))
        };
        let pool_id = match (Self::share_pool(from), Self::share_pool(to)) {
            (None, Some(id)) if holds(id, from) => id,
            (Some(id), None) if holds(id, to) => id,
            (None, None) => *self
                .pools
                .iter()
                .find(|(_, pool)| pool.assets.contains_key(from) && pool.assets.contains_key(to))?
                .0,
            _ => return None,
        };
        Some(SwapRoute {
            pool_id,
            token_out_denom: to.clone(),
        })
    }

    fn estimate_swap_exact_in(
        &self,
        coin_in: &Coin,
        route: &SwapRoute,
    ) -> CollaboratorResult<Amount> {
        if self.quotes_broken {
            return Err(CollaboratorError::Rejected("quotes unavailable".into()));
        }
        self.quote(coin_in, route)
    }

    fn estimate_swap_exact_out(
        &self,
        coin_out: &Coin,
        route: &SwapRoute,
    ) -> CollaboratorResult<Amount> {
        let price_out = self.oracle(&coin_out.denom)?;
        let value_out = Decimal::from(coin_out.amount.0) * price_out;
        // only the output denom is known, so search the pool for the input
        let pool = self.pool(route.pool_id)?;
        let input = pool
            .assets
            .keys()
            .find(|d| **d != coin_out.denom)
            .cloned()
            .ok_or_else(|| CollaboratorError::Rejected("no input asset".into()))?;
        let price_in = self.oracle(&input)?;
        Ok(Amount((value_out / price_in).ceil().to_u128().unwrap_or(0)))
    }

    fn swap_exact_in(
        &mut self,
        sender: &Address,
        coin_in: &Coin,
        route: &SwapRoute,
        min_out: Amount,
    ) -> CollaboratorResult<Amount> {
        let out = self.quote(coin_in, route)?;
        if out < min_out {
            return Err(CollaboratorError::Slippage {
                got: out.0,
                min: min_out.0,
            });
        }
        self.debit(sender, &coin_in.denom, coin_in.amount.0)?;
        let pool = self
            .pools
            .get_mut(&route.pool_id)
            .ok_or(CollaboratorError::UnknownPool(route.pool_id))?;
        if Self::share_pool(&route.token_out_denom).is_some() {
            *pool.assets.entry(coin_in.denom.clone()).or_default() += coin_in.amount.0;
            pool.total_shares += out.0;
        } else {
            if Self::share_pool(&coin_in.denom).is_some() {
                pool.total_shares -= coin_in.amount.0;
            } else {
                *pool.assets.entry(coin_in.denom.clone()).or_default() += coin_in.amount.0;
            }
            *pool.assets.entry(route.token_out_denom.clone()).or_default() -= out.0;
        }
        self.mint(sender, &route.token_out_denom, out.0);
        Ok(out)
    }

    fn pool_tvl(&self, pool_id: u64) -> CollaboratorResult<Decimal> {
        let pool = self.pool(pool_id)?;
        pool.assets.iter().try_fold(Decimal::ZERO, |tvl, (denom, amount)| {
            Ok(tvl + Decimal::from(*amount) * self.oracle(denom)?)
        })
    }

    fn pool_total_shares(&self, pool_id: u64) -> CollaboratorResult<Amount> {
        Ok(Amount(self.pool(pool_id)?.total_shares))
    }

    fn liquidity_pools(&self) -> Vec<AmmPoolInfo> {
        self.pools
            .iter()
            .map(|(id, pool)| AmmPoolInfo {
                pool_id: *id,
                assets: pool.assets.keys().cloned().collect(),
                total_shares: Amount(pool.total_shares),
            })
            .collect()
    }
}

impl PriceOracle for MockChain {
    fn price(&self, denom: &Denom) -> CollaboratorResult<Decimal> {
        self.oracle(denom)
    }
}

impl Bank for MockChain {
    fn send(&mut self, from: &Address, to: &Address, coin: &Coin) -> CollaboratorResult<()> {
        self.debit(from, &coin.denom, coin.amount.0)?;
        self.mint(to, &coin.denom, coin.amount.0);
        Ok(())
    }

    fn balance(&self, address: &Address, denom: &Denom) -> Amount {
        Amount(
            self.balances
                .get(&(address.clone(), denom.clone()))
                .copied()
                .unwrap_or(0),
        )
    }
}

impl LendingFacility for MockChain {
    fn borrow_denom(&self) -> Denom {
        self.borrow_denom.clone()
    }

    fn interest_rate(&self) -> Decimal {
        self.rate
    }

    fn available(&self) -> Amount {
        self.balance(&lending_account(), &self.borrow_denom)
    }

    fn borrow(&mut self, to: &Address, amount: Amount) -> CollaboratorResult<()> {
        let coin = Coin::new(self.borrow_denom.clone(), amount);
        self.send(&lending_account(), to, &coin)?;
        self.principal_outstanding += amount.0;
        Ok(())
    }

    fn repay(&mut self, from: &Address, amount: Amount) -> CollaboratorResult<()> {
        if self.fail_repay {
            return Err(CollaboratorError::Rejected("repay disabled".into()));
        }
        let coin = Coin::new(self.borrow_denom.clone(), amount);
        self.send(from, &lending_account(), &coin)?;
        let principal = amount.0.min(self.principal_outstanding);
        self.principal_outstanding -= principal;
        self.interest_received += amount.0 - principal;
        Ok(())
    }

    fn pay_interest(&mut self, from: &Address, amount: Amount) -> CollaboratorResult<()> {
        let coin = Coin::new(self.borrow_denom.clone(), amount);
        self.send(from, &lending_account(), &coin)?;
        self.interest_received += amount.0;
        Ok(())
    }

    fn write_off(&mut self, amount: Amount) -> CollaboratorResult<()> {
        self.principal_outstanding = self.principal_outstanding.saturating_sub(amount.0);
        self.written_off += amount.0;
        Ok(())
    }
}

impl InsuranceFund for MockChain {
    fn absorb(&mut self, amm_pool_id: u64, shortfall: &Coin) -> CollaboratorResult<()> {
        self.insurance.push((amm_pool_id, shortfall.clone()));
        Ok(())
    }
}

impl Checkpoint for MockChain {
    type Snapshot = MockChain;

    fn checkpoint(&self) -> Self::Snapshot {
        self.checkpoints.set(self.checkpoints.get() + 1);
        self.clone()
    }

    fn restore(&mut self, snapshot: Self::Snapshot) {
        *self = snapshot;
    }
}

/// Keeper with default params and pool 1 enabled at 5x
pub fn keeper() -> Keeper {
    keeper_with(Params::default())
}

pub fn keeper_with(params: Params) -> Keeper {
    let mut keeper = Keeper::new(params).unwrap();
    keeper.create_pool(POOL_ID, dec!(5), true).unwrap();
    keeper
}

pub fn open_request(owner: Address, amount: u128, leverage: Decimal) -> OpenRequest {
    OpenRequest {
        owner,
        collateral: Coin::new(usdc(), Amount(amount)),
        borrow_asset: usdc(),
        amm_pool_id: POOL_ID,
        direction: Direction::Long,
        leverage,
        take_profit_price: None,
    }
}

pub fn block(height: u64, time: u64) -> BlockInfo {
    BlockInfo::new(height, time)
}

//! Position lifecycle: open, accrue, add collateral, close, force close
//!
//! The keeper owns the engine state (positions, pools, accrual bookkeeping)
//! and an event buffer. Collaborator state lives in the [`Host`] passed to
//! each call. Every mutating operation is all-or-nothing: on error the store,
//! the event buffer and the host checkpoint are restored.

use crate::config::Params;
use crate::error::{MarginError, Result};
use crate::events::{CloseReason, MarginEvent, PositionAttributes};
use crate::health::HealthCalculator;
use crate::host::{Amm, Host};
use crate::interest::Accrual;
use crate::pool::Pool;
use crate::position::{Position, PositionKey};
use crate::store::MarginStore;
use crate::types::{Address, Amount, BlockInfo, Coin, Denom, Direction, MODULE_ACCOUNT};
use crate::valuation::ValuationAdapter;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Request to open a leveraged position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenRequest {
    pub owner: Address,
    pub collateral: Coin,
    pub borrow_asset: Denom,
    pub amm_pool_id: u64,
    pub direction: Direction,
    pub leverage: Decimal,
    pub take_profit_price: Option<Decimal>,
}

/// Result of open, close and force close
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionResponse {
    pub position_id: u64,
    /// Collateral posted at open, or the amount returned to the owner on close
    pub final_collateral: Amount,
    pub liabilities: Amount,
    pub health: Decimal,
    pub interest_paid: Amount,
    pub repay_amount: Amount,
}

enum Eligibility {
    Close(CloseReason),
    Healthy(Decimal),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForceCloseOutcome {
    Closed(PositionResponse),
    /// Position is healthy and its pool is open; nothing was done
    NotEligible { health: Decimal },
}

/// What one accrual pass did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccrualReport {
    pub epoch: u64,
    pub accrued: Vec<PositionKey>,
    pub skipped: Vec<PositionKey>,
    /// The epoch had already been accrued
    pub already_accrued: bool,
}

/// What one begin-block pass did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockReport {
    pub accrual: Option<AccrualReport>,
    pub liquidated: Vec<PositionKey>,
    pub wound_down: Vec<PositionKey>,
    pub take_profit: Vec<PositionKey>,
    pub failed: Vec<PositionKey>,
}

pub struct Keeper {
    params: Params,
    store: MarginStore,
    events: Vec<MarginEvent>,
}

impl Keeper {
    pub fn new(params: Params) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            params,
            store: MarginStore::new(),
            events: Vec::new(),
        })
    }

    fn module_account() -> Address {
        Address::module(MODULE_ACCOUNT)
    }

    fn health_calculator(&self) -> HealthCalculator<'_> {
        HealthCalculator::new(&self.params)
    }

    /// Run `op` atomically against the keeper state and the host
    fn atomic<H, T, F>(&mut self, host: &mut H, op: F) -> Result<T>
    where
        H: Host,
        F: FnOnce(&mut Self, &mut H) -> Result<T>,
    {
        let store = self.store.clone();
        let events_len = self.events.len();
        let snapshot = host.checkpoint();
        match op(self, host) {
            Ok(value) => Ok(value),
            Err(e) => {
                self.store = store;
                self.events.truncate(events_len);
                host.restore(snapshot);
                Err(e)
            }
        }
    }

    fn lookup(&self, owner: &Address, id: u64) -> Result<&Position> {
        self.store
            .position(&PositionKey::new(owner.clone(), id))
            .ok_or_else(|| MarginError::PositionNotFound {
                owner: owner.to_string(),
                id,
            })
    }

    // === lifecycle ===

    pub fn open<H: Host>(
        &mut self,
        host: &mut H,
        request: OpenRequest,
        block: BlockInfo,
    ) -> Result<PositionResponse> {
        self.atomic(host, |keeper, host| keeper.open_inner(host, request, block))
    }

    fn validate_open<H: Host>(&self, host: &H, request: &OpenRequest) -> Result<()> {
        if request.collateral.amount.is_zero() {
            return Err(MarginError::InvalidAmount("collateral must be positive".into()));
        }
        if request.direction != Direction::Long {
            return Err(MarginError::UnsupportedDirection(request.direction));
        }
        let pool = self
            .store
            .pool(request.amm_pool_id)
            .ok_or_else(|| MarginError::PoolUnavailable {
                pool_id: request.amm_pool_id,
                reason: "pool not found".into(),
            })?;
        pool.can_open(request.leverage)?;

        let lending_denom = host.borrow_denom();
        if request.borrow_asset != lending_denom {
            return Err(MarginError::InvalidAsset(format!(
                "borrow asset {} is not the lending denom {}",
                request.borrow_asset, lending_denom
            )));
        }
        if self.store.open_position_count() >= self.params.max_open_positions {
            return Err(MarginError::MaxOpenPositions(self.params.max_open_positions));
        }
        if let Some(take_profit) = request.take_profit_price {
            let custody = Denom::pool_share(request.amm_pool_id);
            let current = host
                .price(&custody)
                .map_err(|e| MarginError::ValuationUnavailable {
                    from: custody.to_string(),
                    to: self.params.base_currency.to_string(),
                    reason: e.to_string(),
                })?;
            if take_profit <= current {
                return Err(MarginError::InvalidTakeProfit {
                    price: take_profit,
                    current,
                });
            }
        }
        Ok(())
    }

    fn open_inner<H: Host>(
        &mut self,
        host: &mut H,
        request: OpenRequest,
        block: BlockInfo,
    ) -> Result<PositionResponse> {
        self.validate_open(&*host, &request)?;
        let module = Self::module_account();
        let borrow_asset = request.borrow_asset.clone();

        host.send(&request.owner, &module, &request.collateral)
            .map_err(|e| MarginError::settlement("collateral transfer", e))?;

        let collateral_value = if request.collateral.denom == borrow_asset {
            request.collateral.amount
        } else {
            swap(host, &module, &request.collateral, &borrow_asset, Amount(1))?
        };

        let liabilities = collateral_value.mul_dec_trunc(request.leverage - Decimal::ONE)?;
        if !liabilities.is_zero() {
            let available = host.available();
            if available < liabilities {
                return Err(MarginError::InsufficientLiquidity(format!(
                    "lending facility has {} available, {} requested",
                    available, liabilities
                )));
            }
            host.borrow(&module, liabilities)
                .map_err(|e| MarginError::settlement("borrow", e))?;
        }

        let principal = collateral_value.try_add(liabilities, "principal")?;
        let custody_asset = Denom::pool_share(request.amm_pool_id);
        let custody_amount = swap(
            host,
            &module,
            &Coin::new(borrow_asset.clone(), principal),
            &custody_asset,
            Amount(1),
        )?;

        let mut position = Position {
            id: self.store.allocate_position_id(),
            owner: request.owner.clone(),
            amm_pool_id: request.amm_pool_id,
            direction: request.direction,
            leverage: request.leverage,
            health: Decimal::ZERO,
            collateral_asset: request.collateral.denom.clone(),
            collateral_amount: request.collateral.amount,
            free_collateral: Amount::ZERO,
            take_profit_price: request.take_profit_price,
            custody_asset,
            custody_amount,
            borrow_asset,
            liabilities,
            interest_paid_collateral: Amount::ZERO,
            interest_paid_custody: Amount::ZERO,
            interest_unpaid_collateral: Amount::ZERO,
            opened_at: block.time,
            last_interest_time: block.time,
        };

        let calc = self.health_calculator();
        let health = calc.health_or_max(&*host, &position)?;
        if !calc.is_safe(health) {
            return Err(MarginError::UnsafePosition {
                health,
                threshold: self.params.safe_threshold,
            });
        }
        position.health = health;

        let total_shares = pool_total_shares(&*host, request.amm_pool_id)?;
        let threshold = self.params.pool_open_threshold;
        let pool = self.pool_mut(request.amm_pool_id)?;
        pool.register(custody_amount)?;
        let pool_health = pool.recompute_health(total_shares)?;
        if pool_health < threshold {
            return Err(MarginError::PoolCapacityExceeded {
                pool_id: request.amm_pool_id,
                health: pool_health,
                threshold,
            });
        }

        tracing::info!(
            "opened position {} for {}: collateral {}, liabilities {}, custody {}{}, health {}",
            position.id,
            position.owner,
            request.collateral,
            liabilities,
            custody_amount,
            position.custody_asset,
            health
        );

        let response = PositionResponse {
            position_id: position.id,
            final_collateral: position.collateral_amount,
            liabilities,
            health,
            interest_paid: Amount::ZERO,
            repay_amount: Amount::ZERO,
        };
        self.events
            .push(MarginEvent::Opened(PositionAttributes::new(&position, Amount::ZERO)));
        self.store.insert_position(position);
        Ok(response)
    }

    /// Deposit extra borrow-asset collateral into an open position
    pub fn add_collateral<H: Host>(
        &mut self,
        host: &mut H,
        owner: &Address,
        id: u64,
        coin: Coin,
    ) -> Result<Decimal> {
        self.atomic(host, |keeper, host| {
            let mut position = keeper.lookup(owner, id)?.clone();
            if coin.denom != position.borrow_asset {
                return Err(MarginError::InvalidAsset(format!(
                    "collateral top-up must be {}, got {}",
                    position.borrow_asset, coin.denom
                )));
            }
            if coin.amount.is_zero() {
                return Err(MarginError::InvalidAmount("top-up must be positive".into()));
            }
            host.send(owner, &Self::module_account(), &coin)
                .map_err(|e| MarginError::settlement("collateral top-up", e))?;
            position.free_collateral = position
                .free_collateral
                .try_add(coin.amount, "free collateral")?;
            position.health = keeper.health_calculator().health_or_max(&*host, &position)?;

            tracing::info!(
                "position {}#{} topped up with {}, health {}",
                owner,
                id,
                coin,
                position.health
            );
            keeper.events.push(MarginEvent::CollateralAdded {
                position: PositionAttributes::new(&position, Amount::ZERO),
                amount: coin.amount,
            });
            let health = position.health;
            keeper.store.insert_position(position);
            Ok(health)
        })
    }

    /// Voluntary close by the owner
    pub fn close<H: Host>(
        &mut self,
        host: &mut H,
        owner: &Address,
        id: u64,
        block: BlockInfo,
    ) -> Result<PositionResponse> {
        self.atomic(host, |keeper, host| {
            let key = keeper.lookup(owner, id)?.key();
            keeper.settle(host, &key, CloseReason::User, block)
        })
    }

    /// Close a position that is at or below the liquidation threshold, or
    /// whose pool has been closed
    ///
    /// Eligibility is decided without touching state; only an eligible
    /// position enters the atomic settlement.
    pub fn force_close<H: Host>(
        &mut self,
        host: &mut H,
        owner: &Address,
        id: u64,
        block: BlockInfo,
    ) -> Result<ForceCloseOutcome> {
        let key = self.lookup(owner, id)?.key();
        match self.eligibility(&*host, &key, block)? {
            Eligibility::Healthy(health) => Ok(ForceCloseOutcome::NotEligible { health }),
            Eligibility::Close(reason) => self
                .atomic(host, |keeper, host| keeper.settle(host, &key, reason, block))
                .map(ForceCloseOutcome::Closed),
        }
    }

    fn eligibility<H: Host>(&self, host: &H, key: &PositionKey, block: BlockInfo) -> Result<Eligibility> {
        let position = self
            .store
            .position(key)
            .ok_or_else(|| MarginError::PositionNotFound {
                owner: key.owner.to_string(),
                id: key.id,
            })?;
        if self
            .store
            .pool(position.amm_pool_id)
            .is_some_and(|pool| pool.closed)
        {
            return Ok(Eligibility::Close(CloseReason::PoolWindDown));
        }

        // health including interest the settlement would stack
        let mut position = position.clone();
        let policy = self.params.interest_policy;
        Accrual::settlement(&position, policy, host.interest_rate(), block.time)?
            .apply(&mut position, policy)?;
        let calc = self.health_calculator();
        let health = calc.health_or_max(host, &position)?;
        Ok(if calc.is_liquidatable(health) {
            Eligibility::Close(CloseReason::Liquidation)
        } else {
            Eligibility::Healthy(health)
        })
    }

    /// Unwind a position and pay everyone out
    ///
    /// Custody is swapped back into the borrow asset and, together with free
    /// collateral, repays the debt. A shortfall is written off and handed to
    /// the insurance fund; any remainder goes back to the owner.
    fn settle<H: Host>(
        &mut self,
        host: &mut H,
        key: &PositionKey,
        reason: CloseReason,
        block: BlockInfo,
    ) -> Result<PositionResponse> {
        let mut position = self
            .store
            .position(key)
            .cloned()
            .ok_or_else(|| MarginError::PositionNotFound {
                owner: key.owner.to_string(),
                id: key.id,
            })?;
        let policy = self.params.interest_policy;
        let module = Self::module_account();

        Accrual::settlement(&position, policy, host.interest_rate(), block.time)?
            .apply(&mut position, policy)?;
        position.health = match self.health_calculator().health_or_max(&*host, &position) {
            Ok(health) => health,
            // a closed pool is unwound even when its shares cannot be valued
            Err(e) if reason == CloseReason::PoolWindDown => {
                tracing::warn!(
                    "position {} wound down at last known health {}: {}",
                    key,
                    position.health,
                    e
                );
                position.health
            }
            Err(e) => return Err(e),
        };
        let debt = position.debt(policy)?;

        let proceeds = if position.custody_amount.is_zero() {
            Amount::ZERO
        } else {
            swap(
                host,
                &module,
                &Coin::new(position.custody_asset.clone(), position.custody_amount),
                &position.borrow_asset,
                Amount::ZERO,
            )?
        };
        let funds = proceeds.try_add(position.free_collateral, "settlement funds")?;

        let repay = debt.min(funds);
        if !repay.is_zero() {
            host.repay(&module, repay)
                .map_err(|e| MarginError::settlement("repay", e))?;
        }

        let shortfall = debt.try_sub(repay, "shortfall")?;
        if !shortfall.is_zero() {
            let loss = Coin::new(position.borrow_asset.clone(), shortfall);
            host.write_off(shortfall)
                .map_err(|e| MarginError::settlement("write off", e))?;
            host.absorb(position.amm_pool_id, &loss)
                .map_err(|e| MarginError::settlement("insurance", e))?;
            tracing::warn!(
                "position {} closed with shortfall {} written off",
                key,
                loss
            );
            self.events.push(MarginEvent::ShortfallWrittenOff {
                id: position.id,
                address: position.owner.clone(),
                amm_pool_id: position.amm_pool_id,
                shortfall: loss,
            });
        }

        let remainder = funds.try_sub(repay, "owner remainder")?;
        if !remainder.is_zero() {
            host.send(
                &module,
                &position.owner,
                &Coin::new(position.borrow_asset.clone(), remainder),
            )
            .map_err(|e| MarginError::settlement("owner payout", e))?;
        }

        let total_shares = pool_total_shares(&*host, position.amm_pool_id)?;
        let pool = self.pool_mut(position.amm_pool_id)?;
        pool.release(position.custody_amount)?;
        pool.recompute_health(total_shares)?;
        self.store.remove_position(key);

        tracing::info!(
            "closed position {} ({}): repaid {}, returned {}, health {}",
            key,
            reason,
            repay,
            remainder,
            position.health
        );

        let attributes = PositionAttributes::new(&position, repay);
        self.events.push(match reason {
            CloseReason::User | CloseReason::TakeProfit => MarginEvent::Closed {
                position: attributes,
                reason,
            },
            CloseReason::Liquidation | CloseReason::PoolWindDown => MarginEvent::ForceClosed {
                position: attributes,
                reason,
            },
        });

        Ok(PositionResponse {
            position_id: position.id,
            final_collateral: remainder,
            liabilities: debt,
            health: position.health,
            interest_paid: position.interest_paid_collateral,
            repay_amount: repay,
        })
    }

    // === interest ===

    /// Accrue interest on every position for the epoch containing `block`
    ///
    /// Each epoch is accrued at most once. A position whose accrual fails is
    /// left as it was, flagged for retry, and the pass moves on.
    pub fn accrue_interest_epoch<H: Host>(
        &mut self,
        host: &mut H,
        block: BlockInfo,
    ) -> AccrualReport {
        let epoch = self.params.epoch_of(block.height);
        let mut report = AccrualReport {
            epoch,
            ..AccrualReport::default()
        };
        if self.store.last_accrual_epoch() == Some(epoch) {
            tracing::debug!("epoch {} already accrued", epoch);
            report.already_accrued = true;
            return report;
        }

        for key in self.store.position_keys() {
            match self.accrue_position(host, &key, block) {
                Ok(()) => {
                    self.store.clear_interest_retry(&key);
                    report.accrued.push(key);
                }
                Err(e) => {
                    tracing::warn!("interest accrual for {} skipped: {}", key, e);
                    self.events.push(MarginEvent::InterestSkipped {
                        id: key.id,
                        address: key.owner.clone(),
                        error: e.to_string(),
                    });
                    self.store.mark_interest_retry(key.clone());
                    report.skipped.push(key);
                }
            }
        }
        self.store.set_last_accrual_epoch(epoch);
        self.recompute_pool_health(&*host);

        tracing::info!(
            "epoch {} interest: {} accrued, {} skipped",
            epoch,
            report.accrued.len(),
            report.skipped.len()
        );
        report
    }

    fn accrue_position<H: Host>(
        &mut self,
        host: &mut H,
        key: &PositionKey,
        block: BlockInfo,
    ) -> Result<()> {
        let position = self
            .store
            .position(key)
            .ok_or_else(|| MarginError::PositionNotFound {
                owner: key.owner.to_string(),
                id: key.id,
            })?;
        let policy = self.params.interest_policy;
        let mut accrual = Accrual::plan(position, policy, host.interest_rate(), block.time)?;
        if !accrual.paid.is_zero() {
            let paid_custody = ValuationAdapter::new(&*host).value_of(
                accrual.paid,
                &position.borrow_asset,
                &position.custody_asset,
            )?;
            accrual = accrual.with_paid_custody(paid_custody);
        }

        let mut updated = position.clone();
        accrual.apply(&mut updated, policy)?;
        updated.health = self.health_calculator().health_or_max(&*host, &updated)?;

        // only the payment touches the host
        if !accrual.paid.is_zero() {
            let snapshot = host.checkpoint();
            if let Err(e) = host.pay_interest(&Self::module_account(), accrual.paid) {
                host.restore(snapshot);
                return Err(MarginError::settlement("interest payment", e));
            }
        }
        tracing::debug!(
            "position {} accrued {} (paid {}, unpaid {}), health {}",
            key,
            accrual.due,
            accrual.paid,
            accrual.unpaid,
            updated.health
        );
        self.store.insert_position(updated);
        Ok(())
    }

    // === block processing ===

    /// Per-block entry point: epoch accrual first, then the solvency sweep
    pub fn begin_blocker<H: Host>(&mut self, host: &mut H, block: BlockInfo) -> BlockReport {
        let mut report = BlockReport::default();
        if self.params.is_epoch_boundary(block.height) {
            report.accrual = Some(self.accrue_interest_epoch(host, block));
        }

        for key in self.store.position_keys() {
            match self.sweep_position(host, &key, block) {
                Ok(Some(CloseReason::Liquidation)) => report.liquidated.push(key),
                Ok(Some(CloseReason::PoolWindDown)) => report.wound_down.push(key),
                Ok(Some(CloseReason::TakeProfit)) => report.take_profit.push(key),
                Ok(Some(CloseReason::User)) | Ok(None) => {}
                Err(e) => {
                    tracing::warn!("sweep of {} failed at height {}: {}", key, block.height, e);
                    report.failed.push(key);
                }
            }
        }
        report
    }

    fn sweep_position<H: Host>(
        &mut self,
        host: &mut H,
        key: &PositionKey,
        block: BlockInfo,
    ) -> Result<Option<CloseReason>> {
        let reason = match self.eligibility(&*host, key, block)? {
            Eligibility::Close(reason) => reason,
            Eligibility::Healthy(_) => {
                let Some(position) = self.store.position(key) else {
                    return Ok(None);
                };
                let Some(take_profit) = position.take_profit_price else {
                    return Ok(None);
                };
                let custody = &position.custody_asset;
                let price = host
                    .price(custody)
                    .map_err(|e| MarginError::ValuationUnavailable {
                        from: custody.to_string(),
                        to: self.params.base_currency.to_string(),
                        reason: e.to_string(),
                    })?;
                if price < take_profit {
                    return Ok(None);
                }
                tracing::info!("take profit for {} at price {}", key, price);
                CloseReason::TakeProfit
            }
        };
        self.atomic(host, |keeper, host| keeper.settle(host, key, reason, block))?;
        Ok(Some(reason))
    }

    fn recompute_pool_health<A: Amm>(&mut self, amm: &A) {
        for pool_id in self.store.pool_ids() {
            let total_shares = match amm.pool_total_shares(pool_id) {
                Ok(shares) => shares,
                Err(e) => {
                    tracing::warn!("pool {} health not updated: {}", pool_id, e);
                    continue;
                }
            };
            if let Some(pool) = self.store.pool_mut(pool_id) {
                if let Err(e) = pool.recompute_health(total_shares) {
                    tracing::warn!("pool {} health not updated: {}", pool_id, e);
                }
            }
        }
    }

    // === administration ===

    /// Replace the engine parameters; existing positions are judged by the new
    /// thresholds from the next sweep on
    ///
    /// The interest policy decides how a position's unpaid interest is
    /// booked, so it can only change while no position is open.
    pub fn update_params(&mut self, params: Params) -> Result<()> {
        params.validate()?;
        if params.interest_policy != self.params.interest_policy
            && self.store.open_position_count() > 0
        {
            return Err(MarginError::InvalidParams(format!(
                "interest policy cannot change from {:?} to {:?} with {} open positions",
                self.params.interest_policy,
                params.interest_policy,
                self.store.open_position_count()
            )));
        }
        tracing::info!(
            "params updated: liquidation {} safe {} pool open {}",
            params.liquidation_threshold,
            params.safe_threshold,
            params.pool_open_threshold
        );
        self.params = params;
        Ok(())
    }

    fn pool_mut(&mut self, amm_pool_id: u64) -> Result<&mut Pool> {
        self.store
            .pool_mut(amm_pool_id)
            .ok_or_else(|| MarginError::PoolUnavailable {
                pool_id: amm_pool_id,
                reason: "pool not found".into(),
            })
    }

    pub fn create_pool(&mut self, amm_pool_id: u64, leverage_max: Decimal, enabled: bool) -> Result<()> {
        if self.store.pool(amm_pool_id).is_some() {
            return Err(MarginError::InvalidParams(format!(
                "pool {} already exists",
                amm_pool_id
            )));
        }
        if leverage_max < Decimal::ONE {
            return Err(MarginError::InvalidLeverage {
                leverage: leverage_max,
                max: leverage_max,
            });
        }
        self.store
            .insert_pool(Pool::new(amm_pool_id, leverage_max, enabled));
        tracing::info!("created pool {} (max leverage {})", amm_pool_id, leverage_max);
        Ok(())
    }

    pub fn set_pool_enabled(&mut self, amm_pool_id: u64, enabled: bool) -> Result<()> {
        let pool = self.pool_mut(amm_pool_id)?;
        if pool.closed && enabled {
            return Err(MarginError::PoolUnavailable {
                pool_id: amm_pool_id,
                reason: "pool closed".into(),
            });
        }
        pool.enabled = enabled;
        Ok(())
    }

    /// Close a pool for good; its positions are wound down by the sweep
    pub fn close_pool(&mut self, amm_pool_id: u64) -> Result<()> {
        let pool = self.pool_mut(amm_pool_id)?;
        pool.closed = true;
        pool.enabled = false;
        tracing::info!("closed pool {}", amm_pool_id);
        Ok(())
    }

    pub fn update_pool_leverage_max(&mut self, amm_pool_id: u64, leverage_max: Decimal) -> Result<()> {
        if leverage_max < Decimal::ONE {
            return Err(MarginError::InvalidLeverage {
                leverage: leverage_max,
                max: leverage_max,
            });
        }
        self.pool_mut(amm_pool_id)?.leverage_max = leverage_max;
        Ok(())
    }

    /// Track every AMM pool not yet known, disabled until enabled explicitly
    pub fn register_amm_pools<A: Amm>(&mut self, amm: &A, leverage_max: Decimal) -> Result<Vec<u64>> {
        let mut created = Vec::new();
        for info in amm.liquidity_pools() {
            if self.store.pool(info.pool_id).is_none() {
                self.create_pool(info.pool_id, leverage_max, false)?;
                created.push(info.pool_id);
            }
        }
        Ok(created)
    }

    // === queries ===

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn get_position(&self, owner: &Address, id: u64) -> Option<&Position> {
        self.store.position(&PositionKey::new(owner.clone(), id))
    }

    pub fn get_pool(&self, amm_pool_id: u64) -> Option<&Pool> {
        self.store.pool(amm_pool_id)
    }

    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.store.positions()
    }

    pub fn positions_for_owner<'a>(
        &'a self,
        owner: &'a Address,
    ) -> impl Iterator<Item = &'a Position> + 'a {
        self.store.positions_for_owner(owner)
    }

    pub fn positions_for_pool(&self, amm_pool_id: u64) -> impl Iterator<Item = &Position> {
        self.store
            .positions()
            .filter(move |position| position.amm_pool_id == amm_pool_id)
    }

    pub fn pools(&self) -> impl Iterator<Item = &Pool> {
        self.store.pools()
    }

    /// Health against the recorded debt, recomputed from current prices
    pub fn position_health<A: Amm>(&self, amm: &A, owner: &Address, id: u64) -> Result<Decimal> {
        let position = self.lookup(owner, id)?;
        self.health_calculator().health_or_max(amm, position)
    }

    /// Value locked in a tracked pool, as reported by the AMM
    pub fn pool_tvl<A: Amm>(&self, amm: &A, amm_pool_id: u64) -> Result<Decimal> {
        if self.store.pool(amm_pool_id).is_none() {
            return Err(MarginError::PoolUnavailable {
                pool_id: amm_pool_id,
                reason: "pool not found".into(),
            });
        }
        amm.pool_tvl(amm_pool_id)
            .map_err(|e| MarginError::PoolUnavailable {
                pool_id: amm_pool_id,
                reason: e.to_string(),
            })
    }

    pub fn interest_retry(&self) -> impl Iterator<Item = &PositionKey> {
        self.store.interest_retry().iter()
    }

    pub fn store(&self) -> &MarginStore {
        &self.store
    }

    pub fn events(&self) -> &[MarginEvent] {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<MarginEvent> {
        std::mem::take(&mut self.events)
    }
}

/// Execute a single hop swap for `sender`, mapping failures to liquidity errors
fn swap<H: Host>(
    host: &mut H,
    sender: &Address,
    coin_in: &Coin,
    denom_out: &Denom,
    min_out: Amount,
) -> Result<Amount> {
    let route = host.route(&coin_in.denom, denom_out).ok_or_else(|| {
        MarginError::InsufficientLiquidity(format!("no route from {} to {}", coin_in.denom, denom_out))
    })?;
    let out = host
        .swap_exact_in(sender, coin_in, &route, min_out)
        .map_err(|e| MarginError::settlement("swap", e))?;
    tracing::debug!("swapped {} into {}{}", coin_in, out, denom_out);
    Ok(out)
}

fn pool_total_shares<A: Amm + ?Sized>(amm: &A, amm_pool_id: u64) -> Result<Amount> {
    amm.pool_total_shares(amm_pool_id)
        .map_err(|e| MarginError::PoolUnavailable {
            pool_id: amm_pool_id,
            reason: e.to_string(),
        })
}

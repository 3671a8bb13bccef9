//! Keyed engine state
//!
//! Ordered maps only, so every iteration over positions or pools is
//! deterministic across nodes.

use crate::pool::Pool;
use crate::position::{Position, PositionKey};
use crate::types::Address;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarginStore {
    positions: BTreeMap<PositionKey, Position>,
    pools: BTreeMap<u64, Pool>,
    next_position_id: u64,
    last_accrual_epoch: Option<u64>,
    /// Positions whose last interest accrual failed
    interest_retry: BTreeSet<PositionKey>,
}

impl Default for MarginStore {
    fn default() -> Self {
        Self {
            positions: BTreeMap::new(),
            pools: BTreeMap::new(),
            next_position_id: 1,
            last_accrual_epoch: None,
            interest_retry: BTreeSet::new(),
        }
    }
}

impl MarginStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out the next position id
    pub fn allocate_position_id(&mut self) -> u64 {
        let id = self.next_position_id;
        self.next_position_id += 1;
        id
    }

    pub fn position(&self, key: &PositionKey) -> Option<&Position> {
        self.positions.get(key)
    }

    pub fn insert_position(&mut self, position: Position) {
        self.positions.insert(position.key(), position);
    }

    pub fn remove_position(&mut self, key: &PositionKey) -> Option<Position> {
        self.interest_retry.remove(key);
        self.positions.remove(key)
    }

    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    pub fn position_keys(&self) -> Vec<PositionKey> {
        self.positions.keys().cloned().collect()
    }

    pub fn positions_for_owner<'a>(
        &'a self,
        owner: &'a Address,
    ) -> impl Iterator<Item = &'a Position> + 'a {
        self.positions
            .range(PositionKey::new(owner.clone(), 0)..)
            .take_while(move |(key, _)| &key.owner == owner)
            .map(|(_, position)| position)
    }

    pub fn open_position_count(&self) -> u64 {
        self.positions.len() as u64
    }

    pub fn pool(&self, amm_pool_id: u64) -> Option<&Pool> {
        self.pools.get(&amm_pool_id)
    }

    pub fn pool_mut(&mut self, amm_pool_id: u64) -> Option<&mut Pool> {
        self.pools.get_mut(&amm_pool_id)
    }

    pub fn insert_pool(&mut self, pool: Pool) {
        self.pools.insert(pool.amm_pool_id, pool);
    }

    pub fn pools(&self) -> impl Iterator<Item = &Pool> {
        self.pools.values()
    }

    pub fn pool_ids(&self) -> Vec<u64> {
        self.pools.keys().copied().collect()
    }

    pub fn last_accrual_epoch(&self) -> Option<u64> {
        self.last_accrual_epoch
    }

    pub fn set_last_accrual_epoch(&mut self, epoch: u64) {
        self.last_accrual_epoch = Some(epoch);
    }

    pub fn mark_interest_retry(&mut self, key: PositionKey) {
        self.interest_retry.insert(key);
    }

    pub fn clear_interest_retry(&mut self, key: &PositionKey) {
        self.interest_retry.remove(key);
    }

    pub fn interest_retry(&self) -> &BTreeSet<PositionKey> {
        &self.interest_retry
    }
}

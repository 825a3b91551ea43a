//! Thread-safe authoritative pool reserve storage
//!
//! Generalizes the teacher's `PoolStateManager` (DashMap keyed by
//! `(DexType, pair_symbol)`) to a store keyed by the richer `PoolKey`
//! (pair × dex name) and backed by the full `Pool` record rather than a
//! single-DEX `PoolState`.
//!
//! Author: AI-Generated
//! Created: 2026-02-03

use crate::clock::Clock;
use crate::error::DetectionError;
use crate::types::{Pool, PoolKey};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Concurrent reserve store. Cheap to clone (`Arc` internally) so every
/// detector task can hold its own handle without contention on the caller.
#[derive(Debug, Clone)]
pub struct ReserveStore {
    pools: Arc<DashMap<PoolKey, Pool>>,
}

impl ReserveStore {
    pub fn new() -> Self {
        Self {
            pools: Arc::new(DashMap::new()),
        }
    }

    /// Validates and inserts/replaces a pool snapshot.
    ///
    /// Rejects (and never stores): `reserve_a == 0` xor `reserve_b == 0`,
    /// `swap_fee` outside `[0, 0.01]`, or an update older than the pool's
    /// current `last_update_block` (reorg/out-of-order delivery — the
    /// newer block always wins, never the newer wall-clock arrival).
    pub fn upsert(&self, pool: Pool) -> Result<(), DetectionError> {
        if (pool.reserve_a == 0) != (pool.reserve_b == 0) {
            return Err(DetectionError::invalid_reserves(
                pool.key.to_string(),
                "exactly one reserve is zero",
            ));
        }
        if !(0.0..=0.01).contains(&pool.swap_fee) {
            return Err(DetectionError::invalid_reserves(
                pool.key.to_string(),
                format!("swap_fee {} outside [0, 0.01]", pool.swap_fee),
            ));
        }
        if let Some(existing) = self.pools.get(&pool.key) {
            if pool.last_update_block < existing.last_update_block {
                debug!(pool = %pool.key, "dropping stale reserve update (older block)");
                return Ok(());
            }
        }
        debug!(pool = %pool.key, block = pool.last_update_block, "reserve updated");
        self.pools.insert(pool.key.clone(), pool);
        Ok(())
    }

    pub fn get(&self, key: &PoolKey) -> Option<Pool> {
        self.pools.get(key).map(|entry| entry.clone())
    }

    pub fn pools_for_pair(&self, pair: &crate::types::PairKey) -> Vec<Pool> {
        self.pools
            .iter()
            .filter(|entry| &entry.key().pair == pair)
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn all_pools(&self) -> Vec<Pool> {
        self.pools.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    /// Pools whose `last_update_block` is more than `max_blocks` behind
    /// `current_block` — used to gate stale data out of a detection cycle
    /// rather than acting on it.
    pub fn stale_pools(&self, current_block: u64, max_blocks: u64) -> Vec<PoolKey> {
        self.pools
            .iter()
            .filter(|entry| current_block.saturating_sub(entry.value().last_update_block) > max_blocks)
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Removes entries whose `last_update_block < block - retention_window`,
    /// per §4.1's `invalidate_older_than(block) → count`. Unlike
    /// `stale_pools`, this actually evicts rather than just flagging.
    pub fn invalidate_older_than(&self, block: u64, retention_window: u64) -> usize {
        let cutoff = block.saturating_sub(retention_window);
        let stale: Vec<PoolKey> = self
            .pools
            .iter()
            .filter(|entry| entry.value().last_update_block < cutoff)
            .map(|entry| entry.key().clone())
            .collect();
        for key in &stale {
            debug!(pool = %key, cutoff, "invalidating pool older than retention window");
            self.pools.remove(key);
        }
        stale.len()
    }

    /// Drops pools untouched for longer than `max_age_ms` by wall clock,
    /// logging each eviction. Used for bounded memory growth over long runs.
    pub fn evict_older_than(&self, clock: &dyn Clock, max_age_ms: i64) -> usize {
        let now = clock.now_ms();
        let stale: Vec<PoolKey> = self
            .pools
            .iter()
            .filter(|entry| now.saturating_sub(entry.value().last_update_wall_ms) > max_age_ms)
            .map(|entry| entry.key().clone())
            .collect();
        for key in &stale {
            warn!(pool = %key, "evicting pool with no updates within max age");
            self.pools.remove(key);
        }
        stale.len()
    }

    pub fn remove(&self, key: &PoolKey) -> Option<Pool> {
        self.pools.remove(key).map(|(_, v)| v)
    }
}

impl Default for ReserveStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::types::{PairKey, Token};
    use alloy::primitives::Address;

    fn pool(dex: &str, block: u64, wall_ms: i64, reserve_a: u128, reserve_b: u128) -> Pool {
        let token_a = Token::new("A", Address::from([1; 20]), 18);
        let token_b = Token::new("B", Address::from([2; 20]), 18);
        Pool {
            key: PoolKey::new(PairKey::from_tokens(&token_a, &token_b), dex),
            token_a,
            token_b,
            pair_address: Address::from([3; 20]),
            swap_fee: 0.003,
            reserve_a,
            reserve_b,
            last_update_block: block,
            last_update_wall_ms: wall_ms,
        }
    }

    #[test]
    fn rejects_mismatched_zero_reserves() {
        let store = ReserveStore::new();
        let result = store.upsert(pool("dexA", 1, 0, 0, 100));
        assert!(result.is_err());
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn rejects_fee_out_of_range() {
        let store = ReserveStore::new();
        let mut p = pool("dexA", 1, 0, 100, 100);
        p.swap_fee = 0.05;
        assert!(store.upsert(p).is_err());
    }

    #[test]
    fn older_block_update_is_dropped_not_applied() {
        let store = ReserveStore::new();
        let key = pool("dexA", 10, 0, 100, 200).key.clone();
        store.upsert(pool("dexA", 10, 0, 100, 200)).unwrap();
        store.upsert(pool("dexA", 5, 0, 999, 999)).unwrap();
        let stored = store.get(&key).unwrap();
        assert_eq!(stored.reserve_a, 100);
    }

    #[test]
    fn newer_block_update_replaces() {
        let store = ReserveStore::new();
        let key = pool("dexA", 10, 0, 100, 200).key.clone();
        store.upsert(pool("dexA", 10, 0, 100, 200)).unwrap();
        store.upsert(pool("dexA", 11, 0, 150, 210)).unwrap();
        let stored = store.get(&key).unwrap();
        assert_eq!(stored.reserve_a, 150);
    }

    #[test]
    fn pools_for_pair_spans_dexes() {
        let store = ReserveStore::new();
        store.upsert(pool("dexA", 1, 0, 100, 200)).unwrap();
        store.upsert(pool("dexB", 1, 0, 110, 190)).unwrap();
        let pair = pool("dexA", 1, 0, 100, 200).key.pair;
        assert_eq!(store.pools_for_pair(&pair).len(), 2);
    }

    #[test]
    fn evict_older_than_removes_stale_wall_clock_entries() {
        let store = ReserveStore::new();
        let clock = ManualClock::new(10_000);
        store.upsert(pool("dexA", 1, 0, 100, 200)).unwrap();
        clock.advance(5_000);
        store.upsert(pool("dexB", 1, 9_000, 100, 200)).unwrap();
        let evicted = store.evict_older_than(&clock, 4_000);
        assert_eq!(evicted, 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn invalidate_older_than_removes_blocks_outside_retention_window() {
        let store = ReserveStore::new();
        store.upsert(pool("dexA", 100, 0, 100, 200)).unwrap();
        store.upsert(pool("dexB", 950, 0, 100, 200)).unwrap();
        let removed = store.invalidate_older_than(1_000, 500);
        assert_eq!(removed, 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn invalidate_older_than_keeps_everything_within_window() {
        let store = ReserveStore::new();
        store.upsert(pool("dexA", 900, 0, 100, 200)).unwrap();
        let removed = store.invalidate_older_than(1_000, 500);
        assert_eq!(removed, 0);
        assert_eq!(store.len(), 1);
    }
}

//! Route-level cooldown — suppress repeat alerts with escalating backoff
//!
//! Structurally dead spreads (e.g. a persistent same-DEX fee-tier gap)
//! quickly escalate to the cap; one-off transient spreads recover fast.
//! Keyed independently from the orchestrator's same-cycle dedup map —
//! this is sink-level alert suppression across cycles, not within one.
//!
//! Author: AI-Generated
//! Created: 2026-02-03

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

type RouteKey = (Arc<str>, Arc<str>, Arc<str>);

struct CooldownEntry {
    last_failed_block: u64,
    cooldown_blocks: u64,
    failure_count: u32,
}

const ESCALATION_FACTOR: u64 = 5;
const DEFAULT_MAX_COOLDOWN_BLOCKS: u64 = 1800;

/// Route-level cooldown tracker with escalating backoff.
pub struct RouteCooldown {
    entries: HashMap<RouteKey, CooldownEntry>,
    initial_cooldown: u64,
    max_cooldown: u64,
}

impl RouteCooldown {
    /// `initial_cooldown` is the block count suppressed after the first
    /// failure; `0` disables cooldown entirely.
    pub fn new(initial_cooldown: u64) -> Self {
        Self {
            entries: HashMap::new(),
            initial_cooldown,
            max_cooldown: DEFAULT_MAX_COOLDOWN_BLOCKS,
        }
    }

    pub fn is_cooled_down(
        &self,
        pair: &str,
        buy_dex: &str,
        sell_dex: &str,
        current_block: u64,
    ) -> bool {
        if self.initial_cooldown == 0 {
            return false;
        }
        let key = (Arc::from(pair), Arc::from(buy_dex), Arc::from(sell_dex));
        self.entries
            .get(&key)
            .is_some_and(|entry| current_block < entry.last_failed_block + entry.cooldown_blocks)
    }

    /// Escalation: initial -> initial*5 -> initial*25 -> ... -> max_cooldown.
    pub fn record_failure(&mut self, pair: &str, buy_dex: &str, sell_dex: &str, block: u64) {
        if self.initial_cooldown == 0 {
            return;
        }
        let key = (Arc::from(pair), Arc::from(buy_dex), Arc::from(sell_dex));
        let entry = self.entries.entry(key).or_insert_with(|| CooldownEntry {
            last_failed_block: block,
            cooldown_blocks: 0,
            failure_count: 0,
        });
        entry.failure_count += 1;
        entry.last_failed_block = block;
        let escalated = self
            .initial_cooldown
            .saturating_mul(ESCALATION_FACTOR.saturating_pow(entry.failure_count.saturating_sub(1)));
        entry.cooldown_blocks = escalated.min(self.max_cooldown);
        debug!(
            pair, buy_dex, sell_dex,
            failure_count = entry.failure_count,
            cooldown_blocks = entry.cooldown_blocks,
            "route cooldown escalated"
        );
    }

    /// Instant reset on success.
    pub fn record_success(&mut self, pair: &str, buy_dex: &str, sell_dex: &str) {
        let key = (Arc::from(pair), Arc::from(buy_dex), Arc::from(sell_dex));
        if self.entries.remove(&key).is_some() {
            info!(pair, buy_dex, sell_dex, "route cooldown reset");
        }
    }

    /// Drops expired entries; call periodically to bound memory.
    pub fn cleanup(&mut self, current_block: u64) {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| current_block < entry.last_failed_block + entry.cooldown_blocks);
        let removed = before - self.entries.len();
        if removed > 0 {
            debug!(removed, "route cooldown cleanup");
        }
    }

    pub fn active_count(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_cooldown_initially() {
        let cd = RouteCooldown::new(10);
        assert!(!cd.is_cooled_down("WETH/USDC", "dexA", "dexB", 100));
    }

    #[test]
    fn cooldown_after_failure_expires_on_schedule() {
        let mut cd = RouteCooldown::new(10);
        cd.record_failure("WETH/USDC", "dexA", "dexB", 100);
        assert!(cd.is_cooled_down("WETH/USDC", "dexA", "dexB", 109));
        assert!(!cd.is_cooled_down("WETH/USDC", "dexA", "dexB", 110));
    }

    #[test]
    fn escalating_backoff_caps_at_max() {
        let mut cd = RouteCooldown::new(10);
        let (pair, buy, sell) = ("WBTC/USDC", "dexA", "dexB");

        cd.record_failure(pair, buy, sell, 100);
        assert!(!cd.is_cooled_down(pair, buy, sell, 110));

        cd.record_failure(pair, buy, sell, 200);
        assert!(!cd.is_cooled_down(pair, buy, sell, 250));

        cd.record_failure(pair, buy, sell, 300);
        assert!(!cd.is_cooled_down(pair, buy, sell, 550));

        cd.record_failure(pair, buy, sell, 600);
        assert!(!cd.is_cooled_down(pair, buy, sell, 1850));

        cd.record_failure(pair, buy, sell, 2000);
        assert!(cd.is_cooled_down(pair, buy, sell, 3799));
        assert!(!cd.is_cooled_down(pair, buy, sell, 3800));

        cd.record_failure(pair, buy, sell, 4000);
        assert!(!cd.is_cooled_down(pair, buy, sell, 5800));
    }

    #[test]
    fn success_resets_cooldown() {
        let mut cd = RouteCooldown::new(10);
        cd.record_failure("WETH/USDC", "dexA", "dexB", 100);
        assert!(cd.is_cooled_down("WETH/USDC", "dexA", "dexB", 101));
        cd.record_success("WETH/USDC", "dexA", "dexB");
        assert!(!cd.is_cooled_down("WETH/USDC", "dexA", "dexB", 101));
        assert_eq!(cd.active_count(), 0);
    }

    #[test]
    fn different_routes_are_independent() {
        let mut cd = RouteCooldown::new(10);
        cd.record_failure("WETH/USDC", "dexA", "dexB", 100);
        assert!(!cd.is_cooled_down("WBTC/USDC", "dexA", "dexB", 101));
        assert!(!cd.is_cooled_down("WETH/USDC", "dexC", "dexB", 101));
    }

    #[test]
    fn zero_initial_disables_cooldown() {
        let mut cd = RouteCooldown::new(0);
        cd.record_failure("WETH/USDC", "dexA", "dexB", 100);
        assert!(!cd.is_cooled_down("WETH/USDC", "dexA", "dexB", 100));
    }

    #[test]
    fn cleanup_removes_only_expired_entries() {
        let mut cd = RouteCooldown::new(10);
        cd.record_failure("WETH/USDC", "dexA", "dexB", 100);
        cd.record_failure("WBTC/USDC", "dexC", "dexD", 200);
        assert_eq!(cd.active_count(), 2);
        cd.cleanup(111);
        assert_eq!(cd.active_count(), 1);
        cd.cleanup(211);
        assert_eq!(cd.active_count(), 0);
    }
}

//! Price-return correlation tracking and speculative re-check hints
//!
//! Tracks a bounded price history per pool, computes Pearson correlation
//! over returns (never raw prices — price levels drift together trivially
//! and would overstate correlation), and keeps a sparse, pruned matrix.
//!
//! Author: AI-Generated
//! Created: 2026-02-03

use crate::clock::Clock;
use crate::types::{CorrelatedRecheckHint, CorrelationReason, PairKey, PoolKey, PriceHistoryEntry};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Relative price change below this fraction is noise, not a new sample.
const MIN_RELATIVE_CHANGE: f64 = 0.001;
const SAME_PAIR_OTHER_DEX_SCORE: f64 = 0.95;
const BASE_TOKEN_PEER_SCORE: f64 = 0.60;

#[derive(Debug, Default)]
struct History {
    entries: Vec<PriceHistoryEntry>,
    capacity: usize,
}

impl History {
    fn record(&mut self, entry: PriceHistoryEntry) -> bool {
        if let Some(last) = self.entries.last() {
            let relative_change = ((entry.price - last.price) / last.price).abs();
            if !relative_change.is_finite() || relative_change < MIN_RELATIVE_CHANGE {
                return false;
            }
        }
        if self.entries.len() == self.capacity {
            self.entries.remove(0);
        }
        self.entries.push(entry);
        true
    }

    /// Returns per-block simple returns `(p_i - p_{i-1}) / p_{i-1}`, the
    /// series correlation is computed over.
    fn returns(&self) -> Vec<(u64, f64)> {
        self.entries
            .windows(2)
            .filter_map(|pair| {
                let (prev, cur) = (pair[0], pair[1]);
                if prev.price <= 0.0 || cur.price <= 0.0 {
                    return None;
                }
                Some((cur.block_number, (cur.price - prev.price) / prev.price))
            })
            .collect()
    }
}

/// Tracks price history per pool and a sparse correlation matrix derived
/// from it. Correlation entries below `threshold` are pruned rather than
/// stored as near-zero noise.
pub struct CorrelationTracker {
    histories: DashMap<PoolKey, History>,
    matrix: DashMap<(PoolKey, PoolKey), f64>,
    capacity: usize,
    threshold: f64,
    min_history_for_correlation: usize,
}

impl CorrelationTracker {
    pub fn new(capacity: usize, threshold: f64, min_history_for_correlation: usize) -> Self {
        Self {
            histories: DashMap::new(),
            matrix: DashMap::new(),
            capacity,
            threshold,
            min_history_for_correlation,
        }
    }

    /// Returns `true` if the price moved enough to be recorded as a new
    /// sample (the "significant update" the spec's speculative-hint
    /// wiring triggers off of).
    pub fn record_price(&self, pool_key: PoolKey, entry: PriceHistoryEntry) -> bool {
        let mut history = self
            .histories
            .entry(pool_key)
            .or_insert_with(|| History {
                entries: Vec::new(),
                capacity: self.capacity,
            });
        history.record(entry)
    }

    pub fn history_len(&self, pool_key: &PoolKey) -> usize {
        self.histories.get(pool_key).map(|h| h.entries.len()).unwrap_or(0)
    }

    /// Recomputes pairwise Pearson correlation over aligned returns for
    /// every pool pair with overlapping history, pruning anything below
    /// `threshold` from the stored matrix.
    pub fn recompute(&self) {
        let keys: Vec<PoolKey> = self.histories.iter().map(|e| e.key().clone()).collect();
        self.matrix.clear();
        for i in 0..keys.len() {
            for j in (i + 1)..keys.len() {
                let a = self.histories.get(&keys[i]).unwrap();
                let b = self.histories.get(&keys[j]).unwrap();
                if let Some(r) =
                    pearson_aligned(&a.returns(), &b.returns(), self.min_history_for_correlation)
                {
                    if r.abs() >= self.threshold {
                        self.matrix.insert(canonical_pair(&keys[i], &keys[j]), r);
                    }
                }
            }
        }
    }

    pub fn get_correlation(&self, a: &PoolKey, b: &PoolKey) -> Option<f64> {
        self.matrix.get(&canonical_pair(a, b)).map(|v| *v)
    }

    pub fn top_correlated(&self, pool_key: &PoolKey, limit: usize) -> Vec<(PoolKey, f64)> {
        let mut matches: Vec<(PoolKey, f64)> = self
            .matrix
            .iter()
            .filter_map(|entry| {
                let (a, b) = entry.key();
                if a == pool_key {
                    Some((b.clone(), *entry.value()))
                } else if b == pool_key {
                    Some((a.clone(), *entry.value()))
                } else {
                    None
                }
            })
            .collect();
        matches.sort_by(|x, y| y.1.abs().partial_cmp(&x.1.abs()).unwrap());
        matches.truncate(limit);
        matches
    }

    /// Speculative re-check hints for pools worth revisiting when
    /// `source_pool` just moved: statistically correlated matrix neighbors
    /// first, then same-pair pools on other DEXes (fixed high score — a
    /// cross-DEX arb on the same pair is almost definitionally linked),
    /// then other pools sharing a base token (a weaker, structural link).
    pub fn recheck_hints(
        &self,
        source_pool: &PoolKey,
        same_pair_other_dexes: &[PoolKey],
        base_token_peers: &[PoolKey],
    ) -> Vec<CorrelatedRecheckHint> {
        let mut hints = Vec::new();
        let mut seen = std::collections::HashSet::new();

        for (target, score) in self.top_correlated(source_pool, usize::MAX) {
            if seen.insert(target.clone()) {
                hints.push(CorrelatedRecheckHint {
                    source_pool: source_pool.clone(),
                    target_pool: target,
                    score,
                    reason: CorrelationReason::Statistical,
                });
            }
        }
        for target in same_pair_other_dexes {
            if target != source_pool && seen.insert(target.clone()) {
                hints.push(CorrelatedRecheckHint {
                    source_pool: source_pool.clone(),
                    target_pool: target.clone(),
                    score: SAME_PAIR_OTHER_DEX_SCORE,
                    reason: CorrelationReason::SamePair,
                });
            }
        }
        for target in base_token_peers {
            if target != source_pool && seen.insert(target.clone()) {
                hints.push(CorrelatedRecheckHint {
                    source_pool: source_pool.clone(),
                    target_pool: target.clone(),
                    score: BASE_TOKEN_PEER_SCORE,
                    reason: CorrelationReason::BaseToken,
                });
            }
        }
        hints
    }

    pub fn snapshot(&self) -> CorrelationSnapshot {
        CorrelationSnapshot {
            entries: self
                .matrix
                .iter()
                .map(|e| (e.key().0.clone(), e.key().1.clone(), *e.value()))
                .collect(),
        }
    }

    pub fn restore(&self, snapshot: CorrelationSnapshot) {
        self.matrix.clear();
        for (a, b, r) in snapshot.entries {
            self.matrix.insert(canonical_pair(&a, &b), r);
        }
    }
}

fn canonical_pair(a: &PoolKey, b: &PoolKey) -> (PoolKey, PoolKey) {
    if a <= b {
        (a.clone(), b.clone())
    } else {
        (b.clone(), a.clone())
    }
}

/// Pearson correlation over two return series aligned by block number.
/// Requires at least `min_history_for_correlation` overlapping points;
/// returns `None` otherwise or if either series has zero variance.
fn pearson_aligned(a: &[(u64, f64)], b: &[(u64, f64)], min_history_for_correlation: usize) -> Option<f64> {
    let b_by_block: HashMap<u64, f64> = b.iter().copied().collect();
    let paired: Vec<(f64, f64)> = a
        .iter()
        .filter_map(|(block, ret)| b_by_block.get(block).map(|other| (*ret, *other)))
        .collect();
    if paired.len() < min_history_for_correlation {
        return None;
    }
    let n = paired.len() as f64;
    let mean_a = paired.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_b = paired.iter().map(|(_, y)| y).sum::<f64>() / n;
    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in &paired {
        let dx = x - mean_a;
        let dy = y - mean_b;
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }
    if var_a <= 0.0 || var_b <= 0.0 {
        return None;
    }
    let r = cov / (var_a.sqrt() * var_b.sqrt());
    r.is_finite().then_some(r.clamp(-1.0, 1.0))
}

/// Serializable snapshot for warm-start export/import, mirroring the
/// teacher's serializable pool-state pattern.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorrelationSnapshot {
    pub entries: Vec<(PoolKey, PoolKey, f64)>,
}

/// Records a price observation only if it passes the `MIN_RELATIVE_CHANGE`
/// filter, stamping wall time from `clock`.
pub fn record_if_moved(
    tracker: &CorrelationTracker,
    pool_key: PoolKey,
    price: f64,
    block_number: u64,
    clock: &dyn Clock,
) -> bool {
    tracker.record_price(
        pool_key,
        PriceHistoryEntry {
            price,
            wall_ms: clock.now_ms(),
            block_number,
        },
    )
}

pub fn dex_names_for_pair<'a>(pools: impl Iterator<Item = &'a PoolKey>, pair: &PairKey) -> Vec<PoolKey> {
    pools.filter(|k| &k.pair == pair).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool_key(pair: &str, dex: &str) -> PoolKey {
        PoolKey::new(PairKey(Arc::from(pair)), dex)
    }

    fn entry(price: f64, block: u64) -> PriceHistoryEntry {
        PriceHistoryEntry { price, wall_ms: 0, block_number: block }
    }

    #[test]
    fn history_filters_noise_below_threshold() {
        let mut history = History { entries: Vec::new(), capacity: 10 };
        assert!(history.record(entry(100.0, 1)));
        assert!(!history.record(entry(100.0001, 2)));
        assert!(history.record(entry(101.0, 3)));
    }

    #[test]
    fn history_caps_at_capacity() {
        let mut history = History { entries: Vec::new(), capacity: 3 };
        for i in 0..10 {
            history.record(entry(100.0 + i as f64 * 5.0, i));
        }
        assert_eq!(history.entries.len(), 3);
    }

    #[test]
    fn perfectly_correlated_series_scores_near_one() {
        let tracker = CorrelationTracker::new(100, 0.5, 3);
        let a = pool_key("WBNB/USDT", "dexA");
        let b = pool_key("WBNB/USDT", "dexB");
        for (i, price) in [100.0, 101.0, 99.0, 103.0, 98.0].into_iter().enumerate() {
            tracker.record_price(a.clone(), entry(price, i as u64));
            tracker.record_price(b.clone(), entry(price * 2.0, i as u64));
        }
        tracker.recompute();
        let r = tracker.get_correlation(&a, &b).unwrap();
        assert!(r > 0.99);
    }

    #[test]
    fn correlation_is_symmetric_regardless_of_argument_order() {
        let tracker = CorrelationTracker::new(100, 0.5, 3);
        let a = pool_key("WBNB/USDT", "dexA");
        let b = pool_key("WBNB/USDT", "dexB");
        for (i, price) in [100.0, 101.0, 99.0, 103.0, 98.0].into_iter().enumerate() {
            tracker.record_price(a.clone(), entry(price, i as u64));
            tracker.record_price(b.clone(), entry(price * 1.8, i as u64));
        }
        tracker.recompute();
        assert_eq!(tracker.get_correlation(&a, &b), tracker.get_correlation(&b, &a));
    }

    #[test]
    fn a_series_is_perfectly_correlated_with_itself() {
        let series: Vec<(u64, f64)> =
            (0..10).map(|i| (i, if i % 2 == 0 { 0.01 } else { -0.007 })).collect();
        let r = pearson_aligned(&series, &series, 3).unwrap();
        assert!((r - 1.0).abs() < 1e-9);
    }

    #[test]
    fn uncorrelated_series_pruned_below_threshold() {
        let tracker = CorrelationTracker::new(100, 0.9, 3);
        let a = pool_key("WBNB/USDT", "dexA");
        let b = pool_key("ETH/DAI", "dexB");
        for (i, price) in [100.0, 105.0, 95.0, 110.0, 90.0].into_iter().enumerate() {
            tracker.record_price(a.clone(), entry(price, i as u64));
        }
        for (i, price) in [50.0, 50.5, 50.2, 50.8, 50.1].into_iter().enumerate() {
            tracker.record_price(b.clone(), entry(price, i as u64));
        }
        tracker.recompute();
        assert!(tracker.get_correlation(&a, &b).is_none());
    }

    #[test]
    fn recheck_hints_combine_sources_without_duplicates() {
        let tracker = CorrelationTracker::new(100, 0.5, 3);
        let source = pool_key("WBNB/USDT", "dexA");
        let same_pair = vec![pool_key("WBNB/USDT", "dexB")];
        let base_peers = vec![pool_key("WBNB/USDT", "dexB"), pool_key("WBNB/ETH", "dexA")];
        let hints = tracker.recheck_hints(&source, &same_pair, &base_peers);
        assert_eq!(hints.len(), 2);
        assert!(hints.iter().any(|h| h.reason == CorrelationReason::SamePair));
        assert!(hints.iter().any(|h| h.reason == CorrelationReason::BaseToken));
    }

    #[test]
    fn snapshot_round_trips_through_restore() {
        let tracker = CorrelationTracker::new(100, 0.5, 3);
        let a = pool_key("WBNB/USDT", "dexA");
        let b = pool_key("WBNB/USDT", "dexB");
        for (i, price) in [100.0, 101.0, 99.0, 103.0, 98.0].into_iter().enumerate() {
            tracker.record_price(a.clone(), entry(price, i as u64));
            tracker.record_price(b.clone(), entry(price * 2.0, i as u64));
        }
        tracker.recompute();
        let snapshot = tracker.snapshot();

        let restored = CorrelationTracker::new(100, 0.5, 3);
        restored.restore(snapshot);
        assert_eq!(
            restored.get_correlation(&a, &b).map(|r| (r * 1000.0).round()),
            tracker.get_correlation(&a, &b).map(|r| (r * 1000.0).round()),
        );
    }
}

//! Detection cycle orchestration
//!
//! Ties `ReserveStore`, `PoolGraph`, the two detectors and `RiskScorer`
//! into one per-trigger cycle: build the graph, run cross-DEX and
//! triangular detection concurrently, score and rank what comes back,
//! dedup, apply cooldown, and hand the survivors to the caller.
//!
//! Author: AI-Generated
//! Created: 2026-02-03

use crate::clock::Clock;
use crate::config::{native_token_usd_fallback, DetectionConfig};
use crate::cooldown::RouteCooldown;
use crate::correlation_tracker::{self, CorrelationTracker};
use crate::cross_dex_detector::CrossDexDetector;
use crate::gas::{CachedGasFeed, GasFeed};
use crate::pool_graph::PoolGraph;
use crate::reserve_store::ReserveStore;
use crate::risk_scorer::{RiskInputs, RiskScorer};
use crate::stats::{Phase, Stats};
use crate::triangular_detector::TriangularDetector;
use crate::types::{CorrelatedRecheckHint, Opportunity, OpportunitySource, PairKey, Pool, PoolKey};
use std::collections::{HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, error, info};

/// Guards against re-entrant cycles: a new trigger arriving while a cycle
/// is still running is dropped (counted, not queued) rather than piling
/// work up behind a slow cycle.
#[derive(Debug, Default)]
struct CycleGuard {
    processing: AtomicBool,
    dropped_reentrant: std::sync::atomic::AtomicU64,
}

impl CycleGuard {
    fn try_enter(&self) -> bool {
        self.processing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    fn exit(&self) {
        self.processing.store(false, Ordering::SeqCst);
    }
}

pub struct DetectionOrchestrator<F: GasFeed> {
    config: DetectionConfig,
    reserve_store: ReserveStore,
    gas_feed: CachedGasFeed<F>,
    cooldown: std::sync::Mutex<RouteCooldown>,
    /// Price history + Pearson correlation over returns, fed a sample for
    /// every pool on every cycle (§2's "CorrelationTracker records" step).
    correlation: CorrelationTracker,
    last_correlation_recompute_ms: Mutex<i64>,
    last_hints: Mutex<Vec<CorrelatedRecheckHint>>,
    stats: Arc<Stats>,
    guard: CycleGuard,
}

impl<F: GasFeed> DetectionOrchestrator<F> {
    pub fn new(
        config: DetectionConfig,
        reserve_store: ReserveStore,
        gas_feed: F,
        stats: Arc<Stats>,
    ) -> Self {
        let cooldown_blocks = (config.cooldown_ms / 2_000).max(0) as u64;
        let gas_cache_ttl_ms = config.gas_cache_ttl_ms;
        let correlation = CorrelationTracker::new(
            config.correlation_history_length,
            config.correlation_threshold,
            config.min_history_for_correlation,
        );
        Self {
            config,
            reserve_store,
            gas_feed: CachedGasFeed::new(gas_feed, gas_cache_ttl_ms, 20.0),
            cooldown: std::sync::Mutex::new(RouteCooldown::new(cooldown_blocks)),
            correlation,
            last_correlation_recompute_ms: Mutex::new(i64::MIN),
            last_hints: Mutex::new(Vec::new()),
            stats,
            guard: CycleGuard::default(),
        }
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    /// Speculative re-check hints emitted by the most recently completed
    /// cycle — the external sink this crate hands `CorrelatedRecheckHint`
    /// records to (§6).
    pub fn recent_correlation_hints(&self) -> Vec<CorrelatedRecheckHint> {
        self.last_hints.lock().unwrap().clone()
    }

    fn token_usd_prices(&self) -> HashMap<String, f64> {
        let mut prices = HashMap::new();
        for pool in self.reserve_store.all_pools() {
            for token in [&pool.token_a, &pool.token_b] {
                if let Some(price) = native_token_usd_fallback(token.symbol.as_ref()) {
                    prices.insert(token.symbol.to_string(), price);
                }
            }
        }
        // Stablecoins price at par when no explicit table entry exists.
        for symbol in ["USDT", "USDC", "DAI", "BUSD"] {
            prices.entry(symbol.to_string()).or_insert(1.0);
        }
        prices
    }

    fn pools_by_pair(&self) -> HashMap<PairKey, Vec<Pool>> {
        let mut grouped: HashMap<PairKey, Vec<Pool>> = HashMap::new();
        for pool in self.reserve_store.all_pools() {
            grouped.entry(pool.key.pair.clone()).or_default().push(pool);
        }
        grouped
    }

    /// Feeds every pool's current price into `CorrelationTracker`, recomputes
    /// the matrix on `correlation_update_interval_ms`, and returns the
    /// speculative re-check hints generated from whatever moved significantly
    /// this cycle — consumed below to retag opportunities sourced from a
    /// pool that was re-evaluated on a peer's movement rather than its own.
    fn update_correlation_and_collect_hints(
        &self,
        all_pools: &[Pool],
        pools_by_pair: &HashMap<PairKey, Vec<Pool>>,
        clock: &dyn Clock,
    ) -> (HashSet<PoolKey>, HashSet<PoolKey>) {
        let mut moved: HashSet<PoolKey> = HashSet::new();
        for pool in all_pools {
            if let Some(price) = pool.price() {
                if correlation_tracker::record_if_moved(
                    &self.correlation,
                    pool.key.clone(),
                    price,
                    pool.last_update_block,
                    clock,
                ) {
                    moved.insert(pool.key.clone());
                }
            }
        }

        let now_ms = clock.now_ms();
        let due = {
            let mut last = self.last_correlation_recompute_ms.lock().unwrap();
            let due = now_ms - *last >= self.config.correlation_update_interval_ms;
            if due {
                *last = now_ms;
            }
            due
        };
        if due {
            self.correlation.recompute();
        }

        let mut hints = Vec::new();
        let mut predictive_targets: HashSet<PoolKey> = HashSet::new();
        for source in &moved {
            let same_pair = pools_by_pair
                .get(&source.pair)
                .map(|pools| {
                    pools
                        .iter()
                        .map(|p| p.key.clone())
                        .filter(|k| k != source)
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default();
            let base_peers = base_token_peers(source, all_pools);
            for hint in self.correlation.recheck_hints(source, &same_pair, &base_peers) {
                if !moved.contains(&hint.target_pool) {
                    predictive_targets.insert(hint.target_pool.clone());
                }
                self.stats.record_correlation_hint();
                hints.push(hint);
            }
        }
        *self.last_hints.lock().unwrap() = hints;
        (moved, predictive_targets)
    }

    /// Runs one detection cycle. Returns `None` if a cycle is already in
    /// flight (re-entrant trigger dropped), `Some(opportunities)` otherwise,
    /// ranked best-first.
    pub async fn detect(&self, block_number: u64, wall_ms: i64) -> Option<Vec<Opportunity>> {
        if !self.guard.try_enter() {
            self.guard.dropped_reentrant.fetch_add(1, Ordering::Relaxed);
            debug!(block_number, "detection cycle already in flight, trigger dropped");
            return None;
        }
        let cycle_start = Instant::now();
        let result = self.run_cycle(block_number, wall_ms).await;
        self.stats.record_cycle(cycle_start.elapsed().as_micros() as u64);
        self.guard.exit();
        Some(result)
    }

    async fn run_cycle(&self, block_number: u64, wall_ms: i64) -> Vec<Opportunity> {
        let clock = crate::clock::SystemClock;
        let gas_price_gwei = self.gas_feed.gas_price_gwei(&clock).await;
        let token_usd_prices = self.token_usd_prices();
        let pools_by_pair = self.pools_by_pair();
        let all_pools = self.reserve_store.all_pools();
        let graph = PoolGraph::build(&all_pools);

        let (moved, predictive_targets) =
            self.update_correlation_and_collect_hints(&all_pools, &pools_by_pair, &clock);

        let cross_config = &self.config;
        let tri_config = &self.config;
        let cross_prices = token_usd_prices.clone();
        let (cross_results, tri_results) = tokio::join!(
            async {
                let t0 = Instant::now();
                let detector = CrossDexDetector::new(cross_config);
                let out = self.run_detector_isolated(Phase::CrossDexDetect, || {
                    detector.detect(&pools_by_pair, &cross_prices, gas_price_gwei, block_number, wall_ms)
                });
                self.stats.record_phase_latency(Phase::CrossDexDetect, t0.elapsed().as_micros() as u64);
                out
            },
            async {
                let t0 = Instant::now();
                let detector = TriangularDetector::new(tri_config);
                let out = self.run_detector_isolated(Phase::TriangularDetect, || {
                    detector.detect(&graph, &token_usd_prices, block_number, wall_ms)
                });
                self.stats.record_phase_latency(Phase::TriangularDetect, t0.elapsed().as_micros() as u64);
                out
            }
        );

        let candidates: Vec<Opportunity> = cross_results
            .into_iter()
            .chain(tri_results)
            .map(|opp| retag_correlation_source(opp, &moved, &predictive_targets))
            .collect();
        for _ in 0..candidates.len() {
            self.stats.record_opportunity();
        }

        let t0 = Instant::now();
        let scored: Vec<Opportunity> = candidates
            .into_iter()
            .map(|opp| self.apply_risk(opp, gas_price_gwei, &token_usd_prices))
            .collect();
        self.stats.record_phase_latency(Phase::RiskScore, t0.elapsed().as_micros() as u64);

        let t0 = Instant::now();
        let deduped = dedup_best_per_key(scored);
        let ranked = self.apply_cooldown_and_rank(deduped, block_number);
        self.stats.record_phase_latency(Phase::Rank, t0.elapsed().as_micros() as u64);

        if !ranked.is_empty() {
            info!(block_number, count = ranked.len(), "detection cycle produced opportunities");
        }
        ranked
    }

    /// Runs one detector behind `catch_unwind`, isolating a panic to this
    /// cycle rather than taking the whole instance down — an uncaught
    /// panic inside a detector is a Fatal error per the taxonomy, absorbed
    /// here and counted rather than propagated.
    fn run_detector_isolated(
        &self,
        phase: Phase,
        detect: impl FnOnce() -> Vec<Opportunity>,
    ) -> Vec<Opportunity> {
        match std::panic::catch_unwind(AssertUnwindSafe(detect)) {
            Ok(out) => out,
            Err(_) => {
                self.stats.record_detector_panic();
                error!(?phase, "detector panicked, isolating to this cycle");
                Vec::new()
            }
        }
    }

    fn estimated_gas_cost_usd(&self, gas_price_gwei: f64, token_usd_prices: &HashMap<String, f64>) -> f64 {
        let native_symbol = self.config.base_tokens.first().cloned().unwrap_or_default();
        let native_usd = token_usd_prices.get(&native_symbol).copied().unwrap_or(0.0);
        gas_price_gwei * 1e-9 * self.config.estimated_gas_limit as f64 * native_usd
    }

    fn apply_risk(
        &self,
        opp: Opportunity,
        gas_price_gwei: f64,
        token_usd_prices: &HashMap<String, f64>,
    ) -> Opportunity {
        let (trade_size_usd, pool_liquidity_usd, spread_percent, gas_cost_usd) = match &opp {
            Opportunity::CrossDex(o) => (
                o.trade_size_usd,
                o.pool_liquidity_usd,
                (o.sell_price - o.buy_price) / o.buy_price.max(f64::MIN_POSITIVE) * 100.0,
                o.gas_cost_usd,
            ),
            Opportunity::Triangular(o) => (
                o.trade_size_usd,
                o.pool_liquidity_usd,
                (o.cycle_product - 1.0) * 100.0,
                self.estimated_gas_cost_usd(gas_price_gwei, token_usd_prices),
            ),
            Opportunity::CrossDexTriangular(o) => (
                o.trade_size_usd,
                o.pool_liquidity_usd,
                (o.cycle_product - 1.0) * 100.0,
                self.estimated_gas_cost_usd(gas_price_gwei, token_usd_prices),
            ),
        };
        let inputs = RiskInputs {
            net_profit_usd: opp.net_profit_usd(),
            trade_size_usd,
            gas_cost_usd,
            pool_liquidity_usd,
            spread_percent,
            blocks_since_first_seen: 0,
            competitor_count: 0,
            price_volatility_coefficient: 0.05,
        };
        let risk = RiskScorer::score(&inputs);
        match opp {
            Opportunity::CrossDex(mut o) => {
                o.risk = risk;
                Opportunity::CrossDex(o)
            }
            Opportunity::Triangular(mut o) => {
                o.risk = risk;
                Opportunity::Triangular(o)
            }
            Opportunity::CrossDexTriangular(mut o) => {
                o.risk = risk;
                Opportunity::CrossDexTriangular(o)
            }
        }
    }

    fn apply_cooldown_and_rank(&self, opportunities: Vec<Opportunity>, block_number: u64) -> Vec<Opportunity> {
        let mut cooldown = self.cooldown.lock().unwrap();
        let mut surviving: Vec<Opportunity> = Vec::new();
        for opp in opportunities {
            if let Opportunity::CrossDex(o) = &opp {
                if cooldown.is_cooled_down(&o.pair.0, &o.buy_dex, &o.sell_dex, block_number) {
                    self.stats.record_suppressed_by_cooldown();
                    continue;
                }
            }
            surviving.push(opp);
        }
        surviving.sort_by(|a, b| b.ranking_score().partial_cmp(&a.ranking_score()).unwrap());
        surviving
    }

    /// Records a confirmed execution failure so subsequent cycles cool the
    /// route down. Out of scope to call automatically — the (external)
    /// execution collaborator reports outcomes back through this method.
    pub fn record_route_failure(&self, pair: &str, buy_dex: &str, sell_dex: &str, block_number: u64) {
        self.cooldown.lock().unwrap().record_failure(pair, buy_dex, sell_dex, block_number);
    }

    pub fn record_route_success(&self, pair: &str, buy_dex: &str, sell_dex: &str) {
        self.cooldown.lock().unwrap().record_success(pair, buy_dex, sell_dex);
    }
}

/// Retags a cross-DEX candidate's `OpportunitySource::CorrelationPredictive`
/// when neither leg moved this cycle on its own but one is a speculative
/// re-check target of a pool that did — i.e. it was only re-evaluated
/// because `CorrelationTracker` flagged it, per §4.7/§6. Triangular
/// candidates have no two-pool leg structure to key this off of and keep
/// their detector-assigned source.
fn retag_correlation_source(
    opp: Opportunity,
    moved: &HashSet<PoolKey>,
    predictive_targets: &HashSet<PoolKey>,
) -> Opportunity {
    match opp {
        Opportunity::CrossDex(mut o) => {
            let buy_key = PoolKey::new(o.pair.clone(), o.buy_dex.clone());
            let sell_key = PoolKey::new(o.pair.clone(), o.sell_dex.clone());
            let triggered_directly = moved.contains(&buy_key) || moved.contains(&sell_key);
            let speculative = predictive_targets.contains(&buy_key) || predictive_targets.contains(&sell_key);
            if !triggered_directly && speculative {
                o.meta.source = OpportunitySource::CorrelationPredictive;
            }
            Opportunity::CrossDex(o)
        }
        other => other,
    }
}

/// Pools that share a base token (either leg) with `source`'s pair but are
/// themselves a different pair — the "shared base token" correlation source
/// from §4.7's `correlated_pools` definition.
fn base_token_peers(source: &PoolKey, all_pools: &[Pool]) -> Vec<PoolKey> {
    let Some(source_pool) = all_pools.iter().find(|p| &p.key == source) else {
        return Vec::new();
    };
    let source_symbols = [source_pool.token_a.symbol.clone(), source_pool.token_b.symbol.clone()];
    all_pools
        .iter()
        .filter(|p| p.key.pair != source.pair)
        .filter(|p| {
            source_symbols.contains(&p.token_a.symbol) || source_symbols.contains(&p.token_b.symbol)
        })
        .map(|p| p.key.clone())
        .collect()
}

/// Within one cycle, keeps only the best-scoring opportunity per
/// `(source_pool_set, opportunity_type)` dedup key — the orchestrator's
/// own concept, independent of the sink-level `RouteCooldown`.
fn dedup_best_per_key(opportunities: Vec<Opportunity>) -> Vec<Opportunity> {
    let mut best: HashMap<String, Opportunity> = HashMap::new();
    for opp in opportunities {
        let key = opp.dedup_key();
        match best.get(&key) {
            Some(existing) if existing.ranking_score() >= opp.ranking_score() => {}
            _ => {
                best.insert(key, opp);
            }
        }
    }
    best.into_values().collect()
}

//! Triangular and cross-DEX-triangular arbitrage detection
//!
//! Walks the 3-cycles `PoolGraph` enumerates, gates on the naive
//! (fee-inclusive) rate product before ever invoking the optimizer, and
//! tags a cycle as cross-DEX-triangular when its three hops don't all
//! trade on the same DEX.
//!
//! Author: AI-Generated
//! Created: 2026-02-03

use crate::config::DetectionConfig;
use crate::pool_graph::{PoolGraph, TriangularCycle};
use crate::profit_optimizer::{self, PoolLeg};
use crate::types::{
    CrossDexTriangularOpportunity, DetectionMeta, Opportunity, OpportunitySource, Pool,
    TriangularOpportunity,
};
use std::sync::Arc;
use tracing::debug;

pub struct TriangularDetector<'a> {
    config: &'a DetectionConfig,
}

impl<'a> TriangularDetector<'a> {
    pub fn new(config: &'a DetectionConfig) -> Self {
        Self { config }
    }

    pub fn detect(
        &self,
        graph: &PoolGraph,
        token_usd_prices: &std::collections::HashMap<String, f64>,
        block_number: u64,
        wall_ms: i64,
    ) -> Vec<Opportunity> {
        if !self.config.triangular_enabled {
            return Vec::new();
        }
        let cycles = graph.find_cycles_3(&self.config.base_tokens);
        let mut out = Vec::new();
        for cycle in cycles {
            if let Some(opp) =
                self.evaluate_cycle(graph, &cycle, token_usd_prices, block_number, wall_ms)
            {
                out.push(opp);
            }
        }
        out
    }

    fn leg_for_edge(&self, graph: &PoolGraph, edge: &crate::pool_graph::Edge) -> Option<(PoolLeg, Pool)> {
        let pool = graph.pool(&edge.pool_key)?.clone();
        let fee_bps = (pool.swap_fee * 10_000.0).round() as u32;
        let leg = if edge.forward {
            PoolLeg { reserve_in: pool.reserve_a, reserve_out: pool.reserve_b, fee_bps }
        } else {
            PoolLeg { reserve_in: pool.reserve_b, reserve_out: pool.reserve_a, fee_bps }
        };
        Some((leg, pool))
    }

    fn evaluate_cycle(
        &self,
        graph: &PoolGraph,
        cycle: &TriangularCycle,
        token_usd_prices: &std::collections::HashMap<String, f64>,
        block_number: u64,
        wall_ms: i64,
    ) -> Option<Opportunity> {
        let mut legs = Vec::with_capacity(3);
        let mut pools = Vec::with_capacity(3);
        for edge in &cycle.edges {
            let (leg, pool) = self.leg_for_edge(graph, edge)?;
            legs.push(leg);
            pools.push(pool);
        }
        let legs: [PoolLeg; 3] = legs.try_into().ok()?;

        // Naive fee-adjusted rate product, used only as a pre-optimizer
        // gate — anything at or below 1.0 cannot be profitable regardless
        // of trade size.
        let cycle_product: f64 = legs
            .iter()
            .map(|leg| {
                let rate = leg.reserve_out as f64 / leg.reserve_in.max(1) as f64;
                rate * (1.0 - leg.fee_bps as f64 / 10_000.0)
            })
            .product();
        if cycle_product <= 1.0 {
            debug!(base = %cycle.base, cycle_product, "triangular cycle not profitable pre-optimizer, skipped");
            return None;
        }

        let pool_liquidities_usd: Vec<f64> = pools
            .iter()
            .map(|pool| {
                let price = token_usd_prices.get(pool.token_a.symbol.as_ref()).copied().unwrap_or(0.0);
                if price > 0.0 {
                    pool.liquidity_usd(price)
                } else {
                    0.0
                }
            })
            .collect();
        let pool_liquidity_usd = pool_liquidities_usd.iter().cloned().fold(f64::INFINITY, f64::min);
        if pool_liquidities_usd
            .iter()
            .any(|l| *l < self.config.min_liquidity_triangular_usd)
        {
            return None;
        }

        let base_price = *token_usd_prices.get(cycle.base.as_ref())?;
        let base_decimals = 10f64.powi(pools[0].token_a.decimals as i32).max(1.0);
        let max_input_tokens =
            (self.config.max_trade_size_usd / base_price * base_decimals) as u128;
        if max_input_tokens == 0 {
            return None;
        }

        let result = profit_optimizer::optimize_triangular(legs, max_input_tokens)?;
        let trade_size_usd = result.input_amount as f64 / base_decimals * base_price;
        if trade_size_usd < self.config.min_trade_size_usd {
            return None;
        }
        let net_profit_usd = result.profit as f64 / base_decimals * base_price;
        if net_profit_usd < self.config.min_profit_usd {
            return None;
        }
        let net_roi_percent = if trade_size_usd > 0.0 {
            net_profit_usd / trade_size_usd * 100.0
        } else {
            0.0
        };

        let meta = DetectionMeta {
            block_number,
            detected_at_wall_ms: wall_ms,
            source: OpportunitySource::Block,
        };
        let reserves: [(u128, u128); 3] =
            [pools[0].reserve_a, pools[1].reserve_a, pools[2].reserve_a]
                .into_iter()
                .zip([pools[0].reserve_b, pools[1].reserve_b, pools[2].reserve_b])
                .collect::<Vec<_>>()
                .try_into()
                .ok()?;

        if cycle.is_single_dex() {
            Some(Opportunity::Triangular(TriangularOpportunity {
                base_token: cycle.base.clone(),
                mid1: cycle.mid1.clone(),
                mid2: cycle.mid2.clone(),
                dex_name: cycle.edges[0].dex_name.clone(),
                path_rates: [
                    legs[0].reserve_out as f64 / legs[0].reserve_in.max(1) as f64,
                    legs[1].reserve_out as f64 / legs[1].reserve_in.max(1) as f64,
                    legs[2].reserve_out as f64 / legs[2].reserve_in.max(1) as f64,
                ],
                reserves,
                cycle_product,
                trade_size_usd,
                net_profit_usd,
                net_roi_percent,
                pool_liquidity_usd,
                meta,
                risk: blank_risk(),
            }))
        } else {
            let path: [Arc<str>; 4] =
                [cycle.base.clone(), cycle.mid1.clone(), cycle.mid2.clone(), cycle.base.clone()];
            let dex_path: [Arc<str>; 3] = [
                cycle.edges[0].dex_name.clone(),
                cycle.edges[1].dex_name.clone(),
                cycle.edges[2].dex_name.clone(),
            ];
            let per_hop_fees = [
                legs[0].fee_bps as f64 / 10_000.0,
                legs[1].fee_bps as f64 / 10_000.0,
                legs[2].fee_bps as f64 / 10_000.0,
            ];
            Some(Opportunity::CrossDexTriangular(CrossDexTriangularOpportunity {
                path,
                dex_path,
                per_hop_fees,
                reserves,
                cycle_product,
                trade_size_usd,
                net_profit_usd,
                net_roi_percent,
                pool_liquidity_usd,
                meta,
                risk: blank_risk(),
            }))
        }
    }
}

fn blank_risk() -> crate::types::RiskReport {
    crate::types::RiskReport {
        frontrun_risk: 0.0,
        sandwich_risk: 0.0,
        backrun_risk: 0.0,
        risk_factor: 0.0,
        risk_level: crate::types::RiskLevel::Low,
        competition_level: crate::types::CompetitionLevel::Low,
        competition_score: 0.0,
        expected_mev_loss_usd: 0.0,
        success_probability: 0.0,
        expected_value_usd: 0.0,
        recommendation: crate::types::Recommendation::Evaluate,
    }
}

//! Cross-DEX arbitrage detection
//!
//! Compares every pool pair trading the same `PairKey` on different DEXes,
//! filters on spread and liquidity before ever touching the optimizer, and
//! only emits a candidate once it clears the $ net-profit floor.
//!
//! Author: AI-Generated
//! Created: 2026-02-03

use crate::config::DetectionConfig;
use crate::profit_optimizer::{self, PoolLeg};
use crate::types::{CrossDexOpportunity, DetectionMeta, Opportunity, OpportunitySource, Pool};
use std::collections::HashMap;
use tracing::debug;

pub struct CrossDexDetector<'a> {
    config: &'a DetectionConfig,
}

impl<'a> CrossDexDetector<'a> {
    pub fn new(config: &'a DetectionConfig) -> Self {
        Self { config }
    }

    /// `token_usd_prices` maps a token symbol to its USD price for one
    /// whole unit — supplied by the caller (native-token fallback table or
    /// a live price feed), never computed here.
    pub fn detect(
        &self,
        pools_by_pair: &HashMap<crate::types::PairKey, Vec<Pool>>,
        token_usd_prices: &HashMap<String, f64>,
        gas_price_gwei: f64,
        block_number: u64,
        wall_ms: i64,
    ) -> Vec<Opportunity> {
        let mut out = Vec::new();
        for (pair, pools) in pools_by_pair {
            if pools.len() < 2 {
                continue;
            }
            for i in 0..pools.len() {
                for j in 0..pools.len() {
                    if i == j {
                        continue;
                    }
                    let buy = &pools[i];
                    let sell = &pools[j];
                    if buy.key.dex_name == sell.key.dex_name {
                        continue;
                    }
                    if let Some(opp) = self.evaluate_route(
                        pair,
                        buy,
                        sell,
                        token_usd_prices,
                        gas_price_gwei,
                        block_number,
                        wall_ms,
                    ) {
                        out.push(Opportunity::CrossDex(opp));
                    }
                }
            }
        }
        out
    }

    fn evaluate_route(
        &self,
        pair: &crate::types::PairKey,
        buy: &Pool,
        sell: &Pool,
        token_usd_prices: &HashMap<String, f64>,
        gas_price_gwei: f64,
        block_number: u64,
        wall_ms: i64,
    ) -> Option<CrossDexOpportunity> {
        let buy_price = buy.price()?;
        let sell_price = sell.price()?;
        if sell_price <= buy_price {
            return None;
        }
        let spread_percent = (sell_price - buy_price) / buy_price * 100.0;
        let min_fee_percent = buy.swap_fee.min(sell.swap_fee) * 100.0;
        let spread_floor = 2.0 * min_fee_percent + self.config.min_profit_percent;
        if spread_percent < spread_floor {
            debug!(pair = %pair, spread_percent, spread_floor, "cross-dex spread below pre-filter floor, skipped");
            return None;
        }

        let token_a_price = *token_usd_prices.get(buy.token_a.symbol.as_ref())?;
        let buy_liquidity_usd = buy.liquidity_usd(token_a_price);
        let sell_liquidity_usd = sell.liquidity_usd(token_a_price);
        if buy_liquidity_usd < self.config.min_liquidity_usd
            || sell_liquidity_usd < self.config.min_liquidity_usd
        {
            debug!(pair = %pair, "cross-dex candidate below liquidity floor, skipped");
            return None;
        }
        let pool_liquidity_usd = buy_liquidity_usd.min(sell_liquidity_usd);

        let total_fee_percent = (buy.swap_fee + sell.swap_fee) * 100.0;
        if spread_percent - total_fee_percent < self.config.min_profit_percent {
            debug!(pair = %pair, spread_percent, total_fee_percent, "cross-dex spread fails fee-adjusted viability gate, skipped");
            return None;
        }

        let token_a_decimals = 10f64.powi(buy.token_a.decimals as i32);
        let max_input_tokens =
            (self.config.max_trade_size_usd / token_a_price * token_a_decimals) as u128;
        if max_input_tokens == 0 {
            return None;
        }

        let legs = [
            PoolLeg {
                reserve_in: buy.reserve_a,
                reserve_out: buy.reserve_b,
                fee_bps: (buy.swap_fee * 10_000.0).round() as u32,
            },
            PoolLeg {
                reserve_in: sell.reserve_b,
                reserve_out: sell.reserve_a,
                fee_bps: (sell.swap_fee * 10_000.0).round() as u32,
            },
        ];

        let result = profit_optimizer::optimize_two_pool(
            legs,
            max_input_tokens,
            self.config.flash_loan_fee,
        )?;

        let trade_size_usd = result.input_amount as f64 / token_a_decimals * token_a_price;
        if trade_size_usd < self.config.min_trade_size_usd {
            return None;
        }
        let gross_profit_usd = result.profit as f64 / token_a_decimals * token_a_price;

        let native_symbol = self.config.base_tokens.first().cloned().unwrap_or_default();
        let native_usd = token_usd_prices.get(&native_symbol).copied().unwrap_or(0.0);
        let gas_cost_usd =
            gas_price_gwei * 1e-9 * self.config.estimated_gas_limit as f64 * native_usd;

        let net_profit_usd = gross_profit_usd - gas_cost_usd;
        if net_profit_usd < self.config.min_profit_usd {
            return None;
        }
        let net_roi_percent = if trade_size_usd > 0.0 {
            net_profit_usd / trade_size_usd * 100.0
        } else {
            0.0
        };

        Some(CrossDexOpportunity {
            pair: pair.clone(),
            buy_dex: buy.key.dex_name.clone(),
            sell_dex: sell.key.dex_name.clone(),
            buy_price,
            sell_price,
            optimal_input_amount: result.input_amount,
            trade_size_usd,
            gross_profit_usd,
            gas_cost_usd,
            net_profit_usd,
            net_roi_percent,
            pool_liquidity_usd,
            meta: DetectionMeta {
                block_number,
                detected_at_wall_ms: wall_ms,
                source: OpportunitySource::SyncEvent,
            },
            risk: crate::types::RiskReport {
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
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PairKey, PoolKey, Token};
    use alloy::primitives::Address;

    fn pool(dex: &str, reserve_a: u128, reserve_b: u128) -> Pool {
        let token_a = Token::new("WBNB", Address::from([1; 20]), 18);
        let token_b = Token::new("USDT", Address::from([2; 20]), 18);
        Pool {
            key: PoolKey::new(PairKey::from_tokens(&token_a, &token_b), dex),
            token_a,
            token_b,
            pair_address: Address::from([3; 20]),
            swap_fee: 0.003,
            reserve_a,
            reserve_b,
            last_update_block: 1,
            last_update_wall_ms: 0,
        }
    }

    fn prices() -> HashMap<String, f64> {
        let mut m = HashMap::new();
        m.insert("WBNB".to_string(), 600.0);
        m.insert("USDT".to_string(), 1.0);
        m
    }

    #[test]
    fn detects_spread_between_two_dexes() {
        let config = DetectionConfig::default();
        let detector = CrossDexDetector::new(&config);
        let mut by_pair = HashMap::new();
        let cheap = pool("dexA", 1_000_000_000_000_000_000_000, 600_000_000_000_000_000_000_000);
        let expensive = pool("dexB", 1_000_000_000_000_000_000_000, 660_000_000_000_000_000_000_000);
        let pair = cheap.key.pair.clone();
        by_pair.insert(pair, vec![cheap, expensive]);

        let opportunities = detector.detect(&by_pair, &prices(), 20.0, 100, 0);
        assert!(!opportunities.is_empty());
        match &opportunities[0] {
            Opportunity::CrossDex(o) => {
                assert_eq!(o.buy_dex.as_ref(), "dexA");
                assert_eq!(o.sell_dex.as_ref(), "dexB");
                assert!(o.net_profit_usd > 0.0);
            }
            _ => panic!("expected cross-dex opportunity"),
        }
    }

    #[test]
    fn identical_prices_yield_no_opportunity() {
        let config = DetectionConfig::default();
        let detector = CrossDexDetector::new(&config);
        let mut by_pair = HashMap::new();
        let a = pool("dexA", 1_000_000_000_000_000_000_000, 600_000_000_000_000_000_000_000);
        let b = pool("dexB", 1_000_000_000_000_000_000_000, 600_000_000_000_000_000_000_000);
        let pair = a.key.pair.clone();
        by_pair.insert(pair, vec![a, b]);

        let opportunities = detector.detect(&by_pair, &prices(), 20.0, 100, 0);
        assert!(opportunities.is_empty());
    }

    #[test]
    fn spread_below_pre_filter_floor_yields_no_opportunity() {
        let config = DetectionConfig::default();
        let detector = CrossDexDetector::new(&config);
        let mut by_pair = HashMap::new();
        // 0.0167% spread against a 0.6% pre-filter floor (2 * 0.25% fee +
        // min_profit_percent) — must be rejected before optimization runs.
        let a = pool("dexA", 1_000_000_000_000_000_000_000, 600_000_000_000_000_000_000_000);
        let b = pool("dexB", 1_000_000_000_000_000_000_000, 600_100_000_000_000_000_000_000);
        let pair = a.key.pair.clone();
        by_pair.insert(pair, vec![a, b]);

        let opportunities = detector.detect(&by_pair, &prices(), 20.0, 100, 0);
        assert!(opportunities.is_empty());
    }

    #[test]
    fn below_liquidity_floor_yields_no_opportunity() {
        let config = DetectionConfig::default();
        let detector = CrossDexDetector::new(&config);
        let mut by_pair = HashMap::new();
        // reserve_a tiny enough that liquidity_usd falls under min_liquidity_usd.
        let cheap = pool("dexA", 1, 600);
        let expensive = pool("dexB", 1, 660);
        let pair = cheap.key.pair.clone();
        by_pair.insert(pair, vec![cheap, expensive]);

        let opportunities = detector.detect(&by_pair, &prices(), 20.0, 100, 0);
        assert!(opportunities.is_empty());
    }

    #[test]
    fn single_pool_pair_has_no_cross_dex_candidate() {
        let config = DetectionConfig::default();
        let detector = CrossDexDetector::new(&config);
        let mut by_pair = HashMap::new();
        let a = pool("dexA", 1_000_000_000_000_000_000_000, 600_000_000_000_000_000_000_000);
        let pair = a.key.pair.clone();
        by_pair.insert(pair, vec![a]);

        let opportunities = detector.detect(&by_pair, &prices(), 20.0, 100, 0);
        assert!(opportunities.is_empty());
    }
}

//! Demo wiring for the detection pipeline
//!
//! Seeds a handful of synthetic pools and runs one detection cycle end to
//! end. Nothing here dials out to a chain — register_pool/upsert calls
//! stand in for the event-ingestion collaborator this crate doesn't own.

use alloy::primitives::Address;
use anyhow::Result;
use arb_detect::config::DetectionConfig;
use arb_detect::gas::StaticGasFeed;
use arb_detect::orchestrator::DetectionOrchestrator;
use arb_detect::reserve_store::ReserveStore;
use arb_detect::stats::Stats;
use arb_detect::types::{PairKey, Pool, PoolKey, Token};
use std::sync::Arc;
use tracing::{info, Level};

fn demo_pool(dex: &str, a_addr: u8, b_addr: u8, reserve_a: u128, reserve_b: u128) -> Pool {
    let token_a = Token::new("WBNB", Address::from([a_addr; 20]), 18);
    let token_b = Token::new("USDT", Address::from([b_addr; 20]), 18);
    Pool {
        key: PoolKey::new(PairKey::from_tokens(&token_a, &token_b), dex),
        token_a,
        token_b,
        pair_address: Address::from([a_addr.wrapping_add(b_addr); 20]),
        swap_fee: 0.003,
        reserve_a,
        reserve_b,
        last_update_block: 1,
        last_update_wall_ms: 0,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).with_target(false).init();

    info!("arb-detect demo starting");

    let config = DetectionConfig::default();
    let store = ReserveStore::new();
    store.upsert(demo_pool("dexA", 1, 2, 1_000_000_000_000_000_000_000, 600_000_000_000_000_000_000_000))?;
    store.upsert(demo_pool("dexB", 1, 2, 1_000_000_000_000_000_000_000, 660_000_000_000_000_000_000_000))?;

    let orchestrator = DetectionOrchestrator::new(
        config,
        store,
        StaticGasFeed { gwei: 20.0 },
        Arc::new(Stats::new()),
    );

    if let Some(opportunities) = orchestrator.detect(1, 0).await {
        info!(count = opportunities.len(), "detection cycle complete");
        for opp in &opportunities {
            info!(
                net_profit_usd = opp.net_profit_usd(),
                ranking_score = opp.ranking_score(),
                "opportunity"
            );
        }
    }

    let snapshot = orchestrator.stats().snapshot();
    info!(
        reserve_updates_ingested = snapshot.reserve_updates_ingested,
        opportunities_detected = snapshot.opportunities_detected,
        cycles_run = snapshot.cycles_run,
        "final stats snapshot"
    );

    Ok(())
}

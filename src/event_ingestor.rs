//! Sync-log decoding, pair registry and debounce
//!
//! Turns a raw `Sync(uint112,uint112)` log (already topic-filtered by the
//! out-of-scope chain collaborator) into a normalized `ReserveUpdate`, or
//! swallows it as a debounce duplicate. Never fetches anything itself.
//!
//! Author: AI-Generated
//! Created: 2026-02-03

use crate::clock::Clock;
use crate::error::DetectionError;
use crate::stats::Stats;
use crate::types::{PoolKey, RawSyncLog, ReserveUpdate, Token};
use alloy::primitives::{Address, U256};
use dashmap::DashMap;
use std::sync::Arc;

/// Static description of one registered pool: its key, both tokens, and
/// which slot (reserve0/reserve1) maps to token_a.
#[derive(Debug, Clone)]
struct RegisteredPool {
    pool_key: PoolKey,
    token_a: Token,
    token_b: Token,
    /// `true` if the pool contract's reserve0 corresponds to `token_a`.
    token_a_is_reserve0: bool,
}

/// Decodes Sync logs and applies per-pool debounce.
///
/// Debounce policy: the first log observed for a pool opens a
/// `debounce_ms` window and is the one that gets emitted — "oldest state
/// wins" — every subsequent log for that pool arriving before the window
/// closes is dropped (counted in `Stats`, never applied). This exists to
/// avoid re-running full detection on every one of several Syncs that can
/// land for the same pool within a single block of rapid trading.
pub struct EventIngestor {
    registry: Arc<DashMap<Address, RegisteredPool>>,
    last_emitted_wall_ms: Arc<DashMap<PoolKey, i64>>,
    debounce_ms: i64,
    stats: Arc<Stats>,
}

impl EventIngestor {
    pub fn new(debounce_ms: i64, stats: Arc<Stats>) -> Self {
        Self {
            registry: Arc::new(DashMap::new()),
            last_emitted_wall_ms: Arc::new(DashMap::new()),
            debounce_ms,
            stats,
        }
    }

    /// Registers the pool contract address so subsequent logs from it
    /// resolve to a `PoolKey` and token pair. Must be called before
    /// `ingest` sees a log from this address, or the log is rejected as
    /// `UnknownPool`.
    pub fn register_pool(
        &self,
        pair_address: Address,
        pool_key: PoolKey,
        token_a: Token,
        token_b: Token,
        token_a_is_reserve0: bool,
    ) {
        self.registry.insert(
            pair_address,
            RegisteredPool {
                pool_key,
                token_a,
                token_b,
                token_a_is_reserve0,
            },
        );
    }

    pub fn ingest(
        &self,
        log: RawSyncLog,
        clock: &dyn Clock,
    ) -> Result<Option<ReserveUpdate>, DetectionError> {
        let registered = self.registry.get(&log.pair_address).ok_or_else(|| {
            self.stats.record_reserve_rejected();
            DetectionError::UnknownPool(log.pair_address.to_string())
        })?;

        let (reserve0, reserve1) = decode_sync_payload(&log.data).map_err(|reason| {
            self.stats.record_reserve_rejected();
            DetectionError::invalid_reserves(registered.pool_key.to_string(), reason)
        })?;

        let (reserve_a, reserve_b) = if registered.token_a_is_reserve0 {
            (reserve0, reserve1)
        } else {
            (reserve1, reserve0)
        };

        let now = clock.now_ms();
        let pool_key = registered.pool_key.clone();
        let debounced = match self.last_emitted_wall_ms.get(&pool_key) {
            Some(last) => now.saturating_sub(*last) < self.debounce_ms,
            None => false,
        };
        if debounced {
            self.stats.record_debounced();
            return Ok(None);
        }
        self.last_emitted_wall_ms.insert(pool_key.clone(), now);
        self.stats.record_reserve_ingested();

        Ok(Some(ReserveUpdate {
            pool_key,
            token_a: registered.token_a.clone(),
            token_b: registered.token_b.clone(),
            reserve_a,
            reserve_b,
            block_number: log.block_number,
            tx_hash: log.tx_hash,
            wall_ms: log.wall_ms,
        }))
    }

    pub fn is_registered(&self, pair_address: Address) -> bool {
        self.registry.contains_key(&pair_address)
    }
}

/// `Sync(uint112,uint112)` is ABI-encoded as two right-aligned 32-byte
/// words regardless of the 112-bit declared width. Rejects a payload whose
/// length is wrong or whose value overflows `u128` (112 bits always fits,
/// this only catches a malformed/adversarial log).
fn decode_sync_payload(data: &[u8]) -> Result<(u128, u128), String> {
    if data.len() != 64 {
        return Err(format!("expected 64-byte Sync payload, got {}", data.len()));
    }
    let reserve0 = U256::from_be_slice(&data[0..32]);
    let reserve1 = U256::from_be_slice(&data[32..64]);
    let r0: u128 = reserve0
        .try_into()
        .map_err(|_| "reserve0 exceeds u128".to_string())?;
    let r1: u128 = reserve1
        .try_into()
        .map_err(|_| "reserve1 exceeds u128".to_string())?;
    Ok((r0, r1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::types::PairKey;

    fn sample_log(addr: Address, reserve0: u128, reserve1: u128, wall_ms: i64) -> RawSyncLog {
        let mut data = vec![0u8; 64];
        data[16..32].copy_from_slice(&reserve0.to_be_bytes());
        data[48..64].copy_from_slice(&reserve1.to_be_bytes());
        RawSyncLog {
            pair_address: addr,
            data,
            block_number: 1,
            tx_hash: [0u8; 32],
            wall_ms,
        }
    }

    fn setup() -> (EventIngestor, Address, Arc<Stats>) {
        let stats = Arc::new(Stats::new());
        let ingestor = EventIngestor::new(150, Arc::clone(&stats));
        let addr = Address::from([9u8; 20]);
        let token_a = Token::new("A", Address::from([1; 20]), 18);
        let token_b = Token::new("B", Address::from([2; 20]), 18);
        let pool_key = PoolKey::new(PairKey::from_tokens(&token_a, &token_b), "dexA");
        ingestor.register_pool(addr, pool_key, token_a, token_b, true);
        (ingestor, addr, stats)
    }

    #[test]
    fn decodes_reserves_from_sync_payload() {
        let (ingestor, addr, _) = setup();
        let clock = ManualClock::new(0);
        let update = ingestor
            .ingest(sample_log(addr, 1_000, 2_000, 0), &clock)
            .unwrap()
            .unwrap();
        assert_eq!(update.reserve_a, 1_000);
        assert_eq!(update.reserve_b, 2_000);
    }

    #[test]
    fn unknown_pool_is_rejected() {
        let (ingestor, _, _) = setup();
        let clock = ManualClock::new(0);
        let other = Address::from([7u8; 20]);
        let result = ingestor.ingest(sample_log(other, 1, 2, 0), &clock);
        assert!(matches!(result, Err(DetectionError::UnknownPool(_))));
    }

    #[test]
    fn malformed_payload_is_rejected() {
        let (ingestor, addr, _) = setup();
        let clock = ManualClock::new(0);
        let mut log = sample_log(addr, 1, 2, 0);
        log.data.truncate(10);
        let result = ingestor.ingest(log, &clock);
        assert!(matches!(result, Err(DetectionError::InvalidReserves { .. })));
    }

    #[test]
    fn second_log_within_debounce_window_is_dropped() {
        let (ingestor, addr, stats) = setup();
        let clock = ManualClock::new(1_000);
        let first = ingestor
            .ingest(sample_log(addr, 100, 200, 1_000), &clock)
            .unwrap();
        assert!(first.is_some());
        clock.advance(50);
        let second = ingestor
            .ingest(sample_log(addr, 999, 999, 1_050), &clock)
            .unwrap();
        assert!(second.is_none());
        assert_eq!(stats.snapshot().debounced_updates, 1);
    }

    #[test]
    fn log_after_window_closes_is_emitted() {
        let (ingestor, addr, _) = setup();
        let clock = ManualClock::new(1_000);
        ingestor
            .ingest(sample_log(addr, 100, 200, 1_000), &clock)
            .unwrap();
        clock.advance(151);
        let second = ingestor
            .ingest(sample_log(addr, 300, 400, 1_151), &clock)
            .unwrap();
        assert!(second.is_some());
        assert_eq!(second.unwrap().reserve_a, 300);
    }
}

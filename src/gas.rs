//! Gas price feed abstraction and TTL cache
//!
//! `GasFeed` is the external collaborator boundary — the chain RPC client
//! that actually queries a gas price lives outside this crate. Here we
//! only define the interface and a small cache in front of it so the
//! orchestrator never calls out more than once per `gas_cache_ttl_ms`.
//!
//! Author: AI-Generated
//! Created: 2026-02-03

use crate::clock::Clock;
use async_trait::async_trait;
use std::sync::Mutex;
use tracing::warn;

#[async_trait]
pub trait GasFeed: Send + Sync {
    async fn gas_price_gwei(&self) -> anyhow::Result<f64>;
}

/// A feed that never changes — useful for tests and for a demo wiring with
/// no RPC collaborator attached.
pub struct StaticGasFeed {
    pub gwei: f64,
}

#[async_trait]
impl GasFeed for StaticGasFeed {
    async fn gas_price_gwei(&self) -> anyhow::Result<f64> {
        Ok(self.gwei)
    }
}

struct CacheEntry {
    gwei: f64,
    fetched_at_ms: i64,
}

/// Caches the last successful gas price for `ttl_ms`. On a feed failure,
/// falls back to the last known good value (if any) rather than stalling
/// the detection cycle on a transient RPC error.
pub struct CachedGasFeed<F: GasFeed> {
    inner: F,
    ttl_ms: i64,
    fallback_gwei: f64,
    cache: Mutex<Option<CacheEntry>>,
}

impl<F: GasFeed> CachedGasFeed<F> {
    pub fn new(inner: F, ttl_ms: i64, fallback_gwei: f64) -> Self {
        Self {
            inner,
            ttl_ms,
            fallback_gwei,
            cache: Mutex::new(None),
        }
    }

    pub async fn gas_price_gwei(&self, clock: &dyn Clock) -> f64 {
        let now = clock.now_ms();
        {
            let cache = self.cache.lock().unwrap();
            if let Some(entry) = cache.as_ref() {
                if now.saturating_sub(entry.fetched_at_ms) < self.ttl_ms {
                    return entry.gwei;
                }
            }
        }
        match self.inner.gas_price_gwei().await {
            Ok(gwei) => {
                *self.cache.lock().unwrap() = Some(CacheEntry { gwei, fetched_at_ms: now });
                gwei
            }
            Err(err) => {
                warn!(error = %err, "gas feed failed, using last known or static fallback");
                self.cache
                    .lock()
                    .unwrap()
                    .as_ref()
                    .map(|entry| entry.gwei)
                    .unwrap_or(self.fallback_gwei)
            }
        }
    }
}

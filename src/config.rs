//! Recognized configuration surface for the detection pipeline
//!
//! `DetectionConfig` is a thin `serde`-deserializable struct loaded from a
//! TOML string or file — no env/dotenv/CLI loader lives here, that belongs
//! to the binary that wires up the out-of-scope chain collaborators.
//!
//! Author: AI-Generated
//! Created: 2026-02-03

use crate::error::DetectionError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Native-token USD fallback prices, used when no live price feed is wired
/// up (demo/test mode). Same role as the teacher's hardcoded Polygon/Base
/// native-token price constants.
pub const NATIVE_TOKEN_USD_FALLBACK: &[(&str, f64)] = &[
    ("WBNB", 600.0),
    ("WETH", 3500.0),
    ("WMATIC", 0.5),
    ("WAVAX", 35.0),
];

pub fn native_token_usd_fallback(symbol: &str) -> Option<f64> {
    NATIVE_TOKEN_USD_FALLBACK
        .iter()
        .find(|(sym, _)| *sym == symbol)
        .map(|(_, price)| *price)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Minimum gross spread, as a percent (e.g. `0.5` for 0.5%), to consider
    /// a cross-DEX candidate at all.
    pub min_profit_percent: f64,
    /// Minimum net profit in USD for any opportunity to be emitted.
    pub min_profit_usd: f64,
    /// Gas units assumed for a two-leg cross-DEX arbitrage, used for the gas
    /// cost estimate when converting to USD.
    pub estimated_gas_limit: u64,
    /// Flash loan fee as a fraction (e.g. `0.0025` for a 0.25% premium).
    pub flash_loan_fee: f64,
    pub min_trade_size_usd: f64,
    pub max_trade_size_usd: f64,
    pub min_liquidity_usd: f64,
    pub min_liquidity_triangular_usd: f64,
    /// Symbols treated as cycle anchors for triangular enumeration.
    pub base_tokens: Vec<String>,
    /// Sync-event debounce window; within this window only the
    /// oldest-arriving update per pool is processed.
    pub debounce_ms: i64,
    /// Minimum `|pearson r|` kept in the sparse correlation matrix.
    pub correlation_threshold: f64,
    /// Max price observations retained per pool.
    pub correlation_history_length: usize,
    pub correlation_update_interval_ms: i64,
    /// Minimum block-aligned return samples required before a pool pair's
    /// Pearson correlation is computed at all.
    pub min_history_for_correlation: usize,
    pub gas_cache_ttl_ms: i64,
    pub cooldown_ms: i64,
    pub triangular_enabled: bool,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            min_profit_percent: 0.5,
            min_profit_usd: 1.0,
            estimated_gas_limit: 350_000,
            flash_loan_fee: 0.0025,
            min_trade_size_usd: 10.0,
            max_trade_size_usd: 5_000.0,
            min_liquidity_usd: 1_000.0,
            min_liquidity_triangular_usd: 5_000.0,
            base_tokens: vec![
                "WBNB".to_string(),
                "WETH".to_string(),
                "USDT".to_string(),
                "USDC".to_string(),
            ],
            debounce_ms: 100,
            correlation_threshold: 0.7,
            correlation_history_length: 100,
            correlation_update_interval_ms: 60_000,
            min_history_for_correlation: 3,
            gas_cache_ttl_ms: 2_000,
            cooldown_ms: 30_000,
            triangular_enabled: true,
        }
    }
}

impl DetectionConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw).context("parsing detection config TOML")?;
        config.validate().map_err(anyhow::Error::from)?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("reading config file {}", path.as_ref().display()))?;
        Self::from_toml_str(&raw)
    }

    /// The only place in the crate allowed to hard-fail: bad fee bounds,
    /// negative trade-size bounds, or an empty base-token set abort
    /// construction rather than silently degrading detection quality.
    pub fn validate(&self) -> Result<(), DetectionError> {
        if !(0.0..=1.0).contains(&self.flash_loan_fee) {
            return Err(DetectionError::Misconfiguration(format!(
                "flash_loan_fee {} out of range [0, 1]",
                self.flash_loan_fee
            )));
        }
        if self.min_trade_size_usd < 0.0 || self.max_trade_size_usd < 0.0 {
            return Err(DetectionError::Misconfiguration(
                "trade size bounds must be non-negative".to_string(),
            ));
        }
        if self.min_trade_size_usd > self.max_trade_size_usd {
            return Err(DetectionError::Misconfiguration(
                "min_trade_size_usd exceeds max_trade_size_usd".to_string(),
            ));
        }
        if self.min_liquidity_usd < 0.0 || self.min_liquidity_triangular_usd < 0.0 {
            return Err(DetectionError::Misconfiguration(
                "liquidity bounds must be non-negative".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.correlation_threshold) {
            return Err(DetectionError::Misconfiguration(format!(
                "correlation_threshold {} out of range [0, 1]",
                self.correlation_threshold
            )));
        }
        if self.base_tokens.is_empty() {
            return Err(DetectionError::Misconfiguration(
                "base_tokens must name at least one anchor token".to_string(),
            ));
        }
        if self.correlation_history_length == 0 {
            return Err(DetectionError::Misconfiguration(
                "correlation_history_length must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

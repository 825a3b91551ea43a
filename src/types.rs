//! Core data model for the detection pipeline
//!
//! Token, Pool, the price-history/correlation records, and the tagged
//! `Opportunity` union that the pipeline ultimately emits.
//!
//! Author: AI-Generated
//! Created: 2026-02-03

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// keccak256("Sync(uint112,uint112)") — the log topic EventIngestor filters on.
pub const SYNC_EVENT_TOPIC: &str =
    "0x1c411e9a96e071241c2f21f7726b17ae89e3cab4c78be50e062b03a9fffbbad1";

/// A token identified by address; symbol and decimals are display/math metadata.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Token {
    pub symbol: Arc<str>,
    pub address: Address,
    /// ERC-20 decimals, 0..=24 per the data model's stated range.
    pub decimals: u8,
}

impl Token {
    pub fn new(symbol: impl Into<Arc<str>>, address: Address, decimals: u8) -> Self {
        Self {
            symbol: symbol.into(),
            address,
            decimals,
        }
    }
}

/// Identifies a token pair independent of which DEX it trades on.
/// Two tokens sharing this key on different DEXes are the "same pair" for
/// cross-DEX comparison purposes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PairKey(pub Arc<str>);

impl PairKey {
    /// Canonical pair key: addresses sorted so token order never flips the key.
    pub fn from_tokens(a: &Token, b: &Token) -> Self {
        let (lo, hi) = if a.address <= b.address { (a, b) } else { (b, a) };
        PairKey(Arc::from(format!("{}/{}", lo.symbol, hi.symbol)))
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// pool_key = pair_key × dex_name, per the data model.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PoolKey {
    pub pair: PairKey,
    pub dex_name: Arc<str>,
}

impl PoolKey {
    pub fn new(pair: PairKey, dex_name: impl Into<Arc<str>>) -> Self {
        Self {
            pair,
            dex_name: dex_name.into(),
        }
    }
}

impl fmt::Display for PoolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.pair, self.dex_name)
    }
}

/// A constant-product pool's authoritative snapshot.
///
/// Invariants (enforced by `ReserveStore::upsert`, never by callers):
/// reserves are non-negative (trivially true — `u128` is unsigned);
/// `reserve_a == 0` iff `reserve_b == 0`; `swap_fee` in `[0, 0.01]`; the
/// derived mid-price is finite only when `reserve_a > 0`.
#[derive(Debug, Clone, PartialEq)]
pub struct Pool {
    pub key: PoolKey,
    pub token_a: Token,
    pub token_b: Token,
    pub pair_address: Address,
    /// Swap fee as a fraction, e.g. 0.003 for 0.30%. Range `[0, 0.01]`.
    pub swap_fee: f64,
    pub reserve_a: u128,
    pub reserve_b: u128,
    pub last_update_block: u64,
    pub last_update_wall_ms: i64,
}

impl Pool {
    /// `(reserveB / 10^decB) / (reserveA / 10^decA)`.
    /// `None` if `reserve_a == 0` or the result is non-finite.
    pub fn price(&self) -> Option<f64> {
        if self.reserve_a == 0 {
            return None;
        }
        let a = self.reserve_a as f64 / 10f64.powi(self.token_a.decimals as i32);
        let b = self.reserve_b as f64 / 10f64.powi(self.token_b.decimals as i32);
        let price = b / a;
        price.is_finite().then_some(price)
    }

    /// Liquidity estimate in USD given a USD price for `token_a`, used for
    /// viability gates. `token_a_usd_price` is the dollar value of one whole
    /// unit of `token_a`.
    pub fn liquidity_usd(&self, token_a_usd_price: f64) -> f64 {
        let a_whole = self.reserve_a as f64 / 10f64.powi(self.token_a.decimals as i32);
        2.0 * a_whole * token_a_usd_price
    }
}

/// A single recorded price observation for a pool.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceHistoryEntry {
    pub price: f64,
    pub wall_ms: i64,
    pub block_number: u64,
}

/// Normalized reserve update, as emitted by `EventIngestor` downstream.
#[derive(Debug, Clone, PartialEq)]
pub struct ReserveUpdate {
    pub pool_key: PoolKey,
    pub token_a: Token,
    pub token_b: Token,
    pub reserve_a: u128,
    pub reserve_b: u128,
    pub block_number: u64,
    pub tx_hash: [u8; 32],
    pub wall_ms: i64,
}

/// A raw on-chain log, already filtered to the Sync topic by the collaborator
/// feeding this pipeline. `EventIngestor` decodes the payload and resolves
/// the pair registry; it never fetches anything itself.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSyncLog {
    pub pair_address: Address,
    /// reserve0 (32 bytes) ‖ reserve1 (32 bytes), big-endian, right-aligned.
    pub data: Vec<u8>,
    pub block_number: u64,
    pub tx_hash: [u8; 32],
    pub wall_ms: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockTick {
    pub block_number: u64,
    pub wall_ms: i64,
}

/// Where a candidate opportunity's detection cycle was triggered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpportunitySource {
    Block,
    SyncEvent,
    CorrelationPredictive,
    Differential,
}

/// MEV/competition risk report, embedded in every `Opportunity`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskReport {
    pub frontrun_risk: f64,
    pub sandwich_risk: f64,
    pub backrun_risk: f64,
    pub risk_factor: f64,
    pub risk_level: RiskLevel,
    pub competition_level: CompetitionLevel,
    pub competition_score: f64,
    pub expected_mev_loss_usd: f64,
    pub success_probability: f64,
    pub expected_value_usd: f64,
    pub recommendation: Recommendation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Extreme,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompetitionLevel {
    Low,
    Moderate,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recommendation {
    Execute,
    ExecuteWithCaution,
    Evaluate,
    Skip,
}

/// Common envelope carried by every opportunity variant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectionMeta {
    pub block_number: u64,
    pub detected_at_wall_ms: i64,
    pub source: OpportunitySource,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CrossDexOpportunity {
    pub pair: PairKey,
    pub buy_dex: Arc<str>,
    pub sell_dex: Arc<str>,
    pub buy_price: f64,
    pub sell_price: f64,
    pub optimal_input_amount: u128,
    pub trade_size_usd: f64,
    pub gross_profit_usd: f64,
    pub gas_cost_usd: f64,
    pub net_profit_usd: f64,
    pub net_roi_percent: f64,
    /// Smaller of the two legs' USD liquidity — the risk scorer's backrun
    /// impact-ratio denominator.
    pub pool_liquidity_usd: f64,
    pub meta: DetectionMeta,
    pub risk: RiskReport,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TriangularOpportunity {
    pub base_token: Arc<str>,
    pub mid1: Arc<str>,
    pub mid2: Arc<str>,
    pub dex_name: Arc<str>,
    pub path_rates: [f64; 3],
    pub reserves: [(u128, u128); 3],
    pub cycle_product: f64,
    pub trade_size_usd: f64,
    pub net_profit_usd: f64,
    pub net_roi_percent: f64,
    /// Smallest of the three hops' USD liquidity.
    pub pool_liquidity_usd: f64,
    pub meta: DetectionMeta,
    pub risk: RiskReport,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CrossDexTriangularOpportunity {
    pub path: [Arc<str>; 4],
    pub dex_path: [Arc<str>; 3],
    pub per_hop_fees: [f64; 3],
    pub reserves: [(u128, u128); 3],
    pub cycle_product: f64,
    pub trade_size_usd: f64,
    pub net_profit_usd: f64,
    pub net_roi_percent: f64,
    pub pool_liquidity_usd: f64,
    pub meta: DetectionMeta,
    pub risk: RiskReport,
}

/// The three opportunity shapes the pipeline can emit.
#[derive(Debug, Clone, PartialEq)]
pub enum Opportunity {
    CrossDex(CrossDexOpportunity),
    Triangular(TriangularOpportunity),
    CrossDexTriangular(CrossDexTriangularOpportunity),
}

impl Opportunity {
    pub fn net_profit_usd(&self) -> f64 {
        match self {
            Opportunity::CrossDex(o) => o.net_profit_usd,
            Opportunity::Triangular(o) => o.net_profit_usd,
            Opportunity::CrossDexTriangular(o) => o.net_profit_usd,
        }
    }

    pub fn risk(&self) -> &RiskReport {
        match self {
            Opportunity::CrossDex(o) => &o.risk,
            Opportunity::Triangular(o) => &o.risk,
            Opportunity::CrossDexTriangular(o) => &o.risk,
        }
    }

    pub fn meta(&self) -> &DetectionMeta {
        match self {
            Opportunity::CrossDex(o) => &o.meta,
            Opportunity::Triangular(o) => &o.meta,
            Opportunity::CrossDexTriangular(o) => &o.meta,
        }
    }

    /// Used for dedup: two opportunities of the same type touching the same
    /// pools are considered the same candidate within a cycle.
    pub fn dedup_key(&self) -> String {
        match self {
            Opportunity::CrossDex(o) => format!("cross:{}:{}:{}", o.pair, o.buy_dex, o.sell_dex),
            Opportunity::Triangular(o) => {
                format!("tri:{}:{}:{}:{}", o.dex_name, o.base_token, o.mid1, o.mid2)
            }
            Opportunity::CrossDexTriangular(o) => format!(
                "xtri:{}:{}:{}",
                o.path.join(">"),
                o.dex_path.join(">"),
                o.per_hop_fees.len()
            ),
        }
    }

    /// EV when available, else the fallback ranking score of spec §4.8.
    pub fn ranking_score(&self) -> f64 {
        let risk = self.risk();
        if risk.expected_value_usd.is_finite() && risk.expected_value_usd != 0.0 {
            risk.expected_value_usd
        } else {
            self.net_profit_usd() * (1.0 - risk.risk_factor) / (0.1_f64).max(risk.competition_score)
        }
    }
}

/// Hint that a correlated pool is worth speculatively re-checking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelatedRecheckHint {
    pub source_pool: PoolKey,
    pub target_pool: PoolKey,
    pub score: f64,
    pub reason: CorrelationReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CorrelationReason {
    Statistical,
    SamePair,
    BaseToken,
}

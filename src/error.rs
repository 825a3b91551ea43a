//! Error taxonomy for the detection pipeline
//!
//! Per-pool and per-event failures never propagate past the component that
//! produced them — they are counted in `Stats` and dropped. Only
//! `Misconfiguration` is allowed to fail initialization; everything else the
//! pipeline absorbs so one bad input can never take the batch down.
//!
//! Author: AI-Generated
//! Created: 2026-02-03

use thiserror::Error;

/// Errors raised inside the detection pipeline.
///
/// `InvalidInput` and `InvalidReserves` are recoverable at the call site —
/// callers count them in `Stats` and move on. `Misconfiguration` is the only
/// variant that should ever abort startup.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DetectionError {
    #[error("invalid reserves for pool {pool_key}: {reason}")]
    InvalidReserves { pool_key: String, reason: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unknown pool address {0}")]
    UnknownPool(String),

    #[error("misconfiguration: {0}")]
    Misconfiguration(String),
}

impl DetectionError {
    pub fn invalid_reserves(pool_key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidReserves {
            pool_key: pool_key.into(),
            reason: reason.into(),
        }
    }
}

//! Pipeline-wide counters and latency percentiles
//!
//! Mirrors the teacher's trade-metrics aggregation: a handful of atomic
//! counters plus a small fixed-capacity ring buffer per detection phase,
//! turned into percentiles on snapshot rather than tracked continuously.
//!
//! Author: AI-Generated
//! Created: 2026-02-03

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

const LATENCY_SAMPLE_CAPACITY: usize = 512;
/// A cycle counts as "slow" past this wall-clock budget.
const SLOW_CYCLE_THRESHOLD_MS: u64 = 250;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    ReserveIngest,
    CrossDexDetect,
    TriangularDetect,
    RiskScore,
    Rank,
}

impl Phase {
    const ALL: [Phase; 5] = [
        Phase::ReserveIngest,
        Phase::CrossDexDetect,
        Phase::TriangularDetect,
        Phase::RiskScore,
        Phase::Rank,
    ];

    fn label(self) -> &'static str {
        match self {
            Phase::ReserveIngest => "reserve_ingest",
            Phase::CrossDexDetect => "cross_dex_detect",
            Phase::TriangularDetect => "triangular_detect",
            Phase::RiskScore => "risk_score",
            Phase::Rank => "rank",
        }
    }
}

#[derive(Debug, Default)]
struct LatencyBuffer {
    samples: VecDeque<u64>,
}

impl LatencyBuffer {
    fn push(&mut self, micros: u64) {
        if self.samples.len() == LATENCY_SAMPLE_CAPACITY {
            self.samples.pop_front();
        }
        self.samples.push_back(micros);
    }

    fn percentiles(&self) -> PhaseLatency {
        if self.samples.is_empty() {
            return PhaseLatency::default();
        }
        let mut sorted: Vec<u64> = self.samples.iter().copied().collect();
        sorted.sort_unstable();
        let pick = |pct: f64| -> u64 {
            let idx = ((sorted.len() - 1) as f64 * pct).round() as usize;
            sorted[idx.min(sorted.len() - 1)]
        };
        PhaseLatency {
            p50_micros: pick(0.50),
            p95_micros: pick(0.95),
            p99_micros: pick(0.99),
            samples: sorted.len(),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PhaseLatency {
    pub p50_micros: u64,
    pub p95_micros: u64,
    pub p99_micros: u64,
    pub samples: usize,
}

/// Concurrent counter/latency sink. Cheap to clone the handle (it's an
/// `Arc` internally via the caller), never panics, never blocks for long.
#[derive(Debug, Default)]
pub struct Stats {
    reserve_updates_ingested: AtomicU64,
    reserve_updates_rejected: AtomicU64,
    debounced_updates: AtomicU64,
    opportunities_detected: AtomicU64,
    opportunities_suppressed_cooldown: AtomicU64,
    cycles_run: AtomicU64,
    slow_cycles: AtomicU64,
    detector_panics: AtomicU64,
    correlation_hints_emitted: AtomicU64,
    latencies: [Mutex<LatencyBuffer>; 5],
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_reserve_ingested(&self) {
        self.reserve_updates_ingested.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reserve_rejected(&self) {
        self.reserve_updates_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_debounced(&self) {
        self.debounced_updates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_opportunity(&self) {
        self.opportunities_detected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_suppressed_by_cooldown(&self) {
        self.opportunities_suppressed_cooldown
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_phase_latency(&self, phase: Phase, micros: u64) {
        let idx = Phase::ALL.iter().position(|p| *p == phase).unwrap();
        if let Ok(mut buf) = self.latencies[idx].lock() {
            buf.push(micros);
        }
    }

    pub fn record_cycle(&self, wall_micros: u64) {
        self.cycles_run.fetch_add(1, Ordering::Relaxed);
        if wall_micros >= SLOW_CYCLE_THRESHOLD_MS * 1_000 {
            self.slow_cycles.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// A detector panicked and was isolated to its own cycle — the
    /// orchestrator caught it at the cycle boundary and kept running.
    pub fn record_detector_panic(&self) {
        self.detector_panics.fetch_add(1, Ordering::Relaxed);
    }

    /// A `CorrelatedRecheckHint` was emitted for a pool that moved
    /// significantly this cycle.
    pub fn record_correlation_hint(&self) {
        self.correlation_hints_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let mut per_phase = Vec::with_capacity(Phase::ALL.len());
        for (idx, phase) in Phase::ALL.iter().enumerate() {
            let latency = self.latencies[idx]
                .lock()
                .map(|buf| buf.percentiles())
                .unwrap_or_default();
            per_phase.push((phase.label(), latency));
        }
        StatsSnapshot {
            reserve_updates_ingested: self.reserve_updates_ingested.load(Ordering::Relaxed),
            reserve_updates_rejected: self.reserve_updates_rejected.load(Ordering::Relaxed),
            debounced_updates: self.debounced_updates.load(Ordering::Relaxed),
            opportunities_detected: self.opportunities_detected.load(Ordering::Relaxed),
            opportunities_suppressed_cooldown: self
                .opportunities_suppressed_cooldown
                .load(Ordering::Relaxed),
            cycles_run: self.cycles_run.load(Ordering::Relaxed),
            slow_cycles: self.slow_cycles.load(Ordering::Relaxed),
            detector_panics: self.detector_panics.load(Ordering::Relaxed),
            correlation_hints_emitted: self.correlation_hints_emitted.load(Ordering::Relaxed),
            per_phase,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatsSnapshot {
    pub reserve_updates_ingested: u64,
    pub reserve_updates_rejected: u64,
    pub debounced_updates: u64,
    pub opportunities_detected: u64,
    pub opportunities_suppressed_cooldown: u64,
    pub cycles_run: u64,
    pub slow_cycles: u64,
    pub detector_panics: u64,
    pub correlation_hints_emitted: u64,
    pub per_phase: Vec<(&'static str, PhaseLatency)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let stats = Stats::new();
        stats.record_reserve_ingested();
        stats.record_reserve_ingested();
        stats.record_opportunity();
        let snap = stats.snapshot();
        assert_eq!(snap.reserve_updates_ingested, 2);
        assert_eq!(snap.opportunities_detected, 1);
    }

    #[test]
    fn percentiles_reflect_samples() {
        let stats = Stats::new();
        for i in 1..=100u64 {
            stats.record_phase_latency(Phase::CrossDexDetect, i * 10);
        }
        let snap = stats.snapshot();
        let latency = snap
            .per_phase
            .iter()
            .find(|(label, _)| *label == "cross_dex_detect")
            .unwrap()
            .1;
        assert_eq!(latency.samples, 100);
        assert!(latency.p50_micros < latency.p95_micros);
        assert!(latency.p95_micros <= latency.p99_micros);
    }

    #[test]
    fn slow_cycle_counted_past_threshold() {
        let stats = Stats::new();
        stats.record_cycle(100_000);
        stats.record_cycle(300_000);
        let snap = stats.snapshot();
        assert_eq!(snap.cycles_run, 2);
        assert_eq!(snap.slow_cycles, 1);
    }

    #[test]
    fn detector_panics_are_counted() {
        let stats = Stats::new();
        stats.record_detector_panic();
        stats.record_detector_panic();
        let snap = stats.snapshot();
        assert_eq!(snap.detector_panics, 2);
    }

    #[test]
    fn ring_buffer_caps_at_capacity() {
        let stats = Stats::new();
        for i in 0..(LATENCY_SAMPLE_CAPACITY * 2) {
            stats.record_phase_latency(Phase::Rank, i as u64);
        }
        let snap = stats.snapshot();
        let latency = snap
            .per_phase
            .iter()
            .find(|(label, _)| *label == "rank")
            .unwrap()
            .1;
        assert_eq!(latency.samples, LATENCY_SAMPLE_CAPACITY);
    }
}

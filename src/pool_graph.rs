//! Token adjacency graph and triangular cycle enumeration
//!
//! Built fresh from a `ReserveStore` snapshot each detection cycle rather
//! than maintained incrementally — with the pool counts this pipeline
//! targets, rebuilding is cheaper than keeping a second structure in sync.
//!
//! Author: AI-Generated
//! Created: 2026-02-03

use crate::types::{Pool, PoolKey};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub to: Arc<str>,
    pub pool_key: PoolKey,
    pub dex_name: Arc<str>,
    /// `true` if this edge walks the pool's `token_a -> token_b` direction.
    pub forward: bool,
}

/// Directed token adjacency graph. Every pool contributes two edges — its
/// natural direction and a synthesized reverse — since constant-product
/// pools swap both ways.
#[derive(Debug, Default)]
pub struct PoolGraph {
    adjacency: HashMap<Arc<str>, Vec<Edge>>,
    pools_by_key: HashMap<PoolKey, Pool>,
}

impl PoolGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn build(pools: &[Pool]) -> Self {
        let mut graph = Self::new();
        for pool in pools {
            graph.insert_pool(pool.clone());
        }
        graph
    }

    pub fn insert_pool(&mut self, pool: Pool) {
        let dex_name = pool.key.dex_name.clone();
        self.adjacency
            .entry(pool.token_a.symbol.clone())
            .or_default()
            .push(Edge {
                to: pool.token_b.symbol.clone(),
                pool_key: pool.key.clone(),
                dex_name: dex_name.clone(),
                forward: true,
            });
        self.adjacency
            .entry(pool.token_b.symbol.clone())
            .or_default()
            .push(Edge {
                to: pool.token_a.symbol.clone(),
                pool_key: pool.key.clone(),
                dex_name,
                forward: false,
            });
        self.pools_by_key.insert(pool.key.clone(), pool);
    }

    pub fn pool(&self, key: &PoolKey) -> Option<&Pool> {
        self.pools_by_key.get(key)
    }

    pub fn neighbors(&self, token: &str) -> &[Edge] {
        self.adjacency
            .get(token)
            .map(|edges| edges.as_slice())
            .unwrap_or(&[])
    }

    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    pub fn edge_count(&self) -> usize {
        self.pools_by_key.len() * 2
    }

    /// Every directed 3-hop cycle `base -> mid1 -> mid2 -> base` starting
    /// from a whitelisted base token. `mid1`/`mid2` may be any tokens
    /// reachable in the graph, but `mid1 != base`, `mid2 != base`, and
    /// `mid1 != mid2` (a degenerate cycle revisiting a node isn't a
    /// triangle). Both directions of walking a triangle are distinct
    /// cycles — they represent opposite trade directions and are scored
    /// independently by the triangular detector.
    pub fn find_cycles_3(&self, base_tokens: &[String]) -> Vec<TriangularCycle> {
        let mut cycles = Vec::new();
        for base in base_tokens {
            let base: Arc<str> = Arc::from(base.as_str());
            for hop1 in self.neighbors(&base) {
                if hop1.to == base {
                    continue;
                }
                for hop2 in self.neighbors(&hop1.to) {
                    if hop2.to == base || hop2.to == hop1.to {
                        continue;
                    }
                    for hop3 in self.neighbors(&hop2.to) {
                        if hop3.to != base {
                            continue;
                        }
                        cycles.push(TriangularCycle {
                            base: base.clone(),
                            mid1: hop1.to.clone(),
                            mid2: hop2.to.clone(),
                            edges: [hop1.clone(), hop2.clone(), hop3.clone()],
                        });
                    }
                }
            }
        }
        cycles
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TriangularCycle {
    pub base: Arc<str>,
    pub mid1: Arc<str>,
    pub mid2: Arc<str>,
    pub edges: [Edge; 3],
}

impl TriangularCycle {
    /// `true` if every hop trades on the same DEX — the plain triangular
    /// case as opposed to a cross-DEX triangular.
    pub fn is_single_dex(&self) -> bool {
        let first = &self.edges[0].dex_name;
        self.edges.iter().all(|e| &e.dex_name == first)
    }
}

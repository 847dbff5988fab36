//! Directed price graph (C2, spec.md §4.2): one node per asset/fiat, one
//! directed edge per tradable direction, weighted `w = -ln(effective_rate)`
//! so a negative-weight cycle is an arbitrage opportunity (the classic
//! Bellman-Ford identity, here exploited by bounded DFS instead — see
//! `cycle.rs`).

use crate::market_data::Snapshot;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct Edge {
    pub to: usize,
    pub weight: f64,
    pub effective_rate: f64,
    pub liquidity_usd: f64,
    pub symbol: String,
}

#[derive(Debug, Default)]
pub struct PriceGraph {
    pub node_names: Vec<String>,
    node_index: HashMap<String, usize>,
    pub adjacency: Vec<Vec<Edge>>,
}

impl PriceGraph {
    pub fn node_id(&self, name: &str) -> Option<usize> {
        self.node_index.get(name).copied()
    }

    /// Direct lookup of the best edge `from -> to`, if one exists. Used by
    /// detectors that need to walk an explicit, non-simple path (e.g. a
    /// node visited twice) rather than enumerate simple cycles. When two
    /// independently quoted sources both cover the same direction (e.g. a
    /// direct rate plus another pair's derived reverse), the more
    /// favorable effective rate wins, matching how a rate-seeking walk
    /// would actually execute.
    pub fn edge(&self, from: &str, to: &str) -> Option<&Edge> {
        let from_id = self.node_id(from)?;
        let to_id = self.node_id(to)?;
        self.adjacency[from_id]
            .iter()
            .filter(|e| e.to == to_id)
            .max_by(|a, b| a.effective_rate.partial_cmp(&b.effective_rate).unwrap_or(std::cmp::Ordering::Equal))
    }

    fn get_or_create_node(&mut self, name: &str) -> usize {
        if let Some(&id) = self.node_index.get(name) {
            return id;
        }
        let id = self.node_names.len();
        self.node_names.push(name.to_string());
        self.adjacency.push(Vec::new());
        self.node_index.insert(name.to_string(), id);
        id
    }

    /// Sub-graph containing only `allowed` nodes and the edges between
    /// them. Used by the cross-fiat detector (§4.3.6) to restrict cycle
    /// search to a configured fiat pair plus its USDT bridge.
    pub fn restrict(&self, allowed: &[String]) -> PriceGraph {
        let mut restricted = PriceGraph::default();
        for name in allowed {
            if self.node_id(name).is_some() {
                restricted.get_or_create_node(name);
            }
        }
        for name in allowed {
            let Some(from_id) = self.node_id(name) else { continue };
            for edge in &self.adjacency[from_id] {
                let to_name = &self.node_names[edge.to];
                if allowed.contains(to_name) {
                    restricted.add_edge(name, to_name, edge.effective_rate, edge.liquidity_usd, &edge.symbol);
                }
            }
        }
        restricted
    }

    fn add_edge(&mut self, from: &str, to: &str, effective_rate: f64, liquidity_usd: f64, symbol: &str) {
        if effective_rate <= 0.0 {
            return;
        }
        let from_id = self.get_or_create_node(from);
        let to_id = self.get_or_create_node(to);
        self.adjacency[from_id].push(Edge {
            to: to_id,
            weight: -effective_rate.ln(),
            effective_rate,
            liquidity_usd,
            symbol: symbol.to_string(),
        });
    }
}

/// Build the graph from a pinned snapshot. `taker_fee` and
/// `expected_slippage` are applied uniformly per spec.md §4.2's
/// `effective_rate = rate * (1 - taker_fee - expected_slippage)`; a real
/// deployment would source per-venue fees from `EngineConfig`, omitted
/// here to keep the builder a pure function of its three numeric inputs.
pub fn build(snapshot: &Snapshot, taker_fee: f64, expected_slippage: f64) -> PriceGraph {
    let mut graph = PriceGraph::default();
    let discount = 1.0 - taker_fee - expected_slippage;

    for ticker in snapshot.spot.values() {
        if !ticker.is_valid() {
            continue;
        }
        let Some((base, quote)) = split_symbol(&ticker.symbol) else { continue };
        let liquidity = snapshot
            .orderbooks
            .get(&ticker.symbol)
            .map(|b| b.liquidity_usd(true).min(b.liquidity_usd(false)))
            .unwrap_or(ticker.volume_24h * ticker.last);

        // base -> quote: sell base at bid.
        graph.add_edge(&base, &quote, ticker.bid * discount, liquidity, &ticker.symbol);
        // quote -> base: buy base at ask, i.e. 1/ask units of base per quote.
        if ticker.ask > 0.0 {
            graph.add_edge(&quote, &base, discount / ticker.ask, liquidity, &ticker.symbol);
        }
    }

    for rate in snapshot.fiat.values() {
        let liquidity = f64::INFINITY; // fiat rails are not liquidity-constrained in this model
        graph.add_edge(&rate.base, &rate.quote, rate.rate * discount, liquidity, &format!("{}/{}", rate.base, rate.quote));
        if rate.rate > 0.0 {
            graph.add_edge(&rate.quote, &rate.base, discount / rate.rate, liquidity, &format!("{}/{}", rate.quote, rate.base));
        }
    }

    graph
}

fn split_symbol(symbol: &str) -> Option<(String, String)> {
    let mut parts = symbol.splitn(2, '/');
    let base = parts.next()?.to_string();
    let quote = parts.next()?.to_string();
    Some((base, quote))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::{FiatRate, FiatSourceKind, SpotTicker};

    #[test]
    fn builds_two_directed_edges_per_instrument() {
        let mut snapshot = Snapshot::default();
        snapshot.spot.insert(
            "BTC/USDT".into(),
            SpotTicker { symbol: "BTC/USDT".into(), bid: 60_000.0, ask: 60_010.0, last: 60_005.0, volume_24h: 100.0, timestamp_ms: 0 },
        );
        let graph = build(&snapshot, 0.0004, 0.0005);
        let btc = graph.node_id("BTC").unwrap();
        let usdt = graph.node_id("USDT").unwrap();
        assert_eq!(graph.adjacency[btc].len(), 1);
        assert_eq!(graph.adjacency[usdt].len(), 1);
    }

    #[test]
    fn fiat_edges_use_configured_rate() {
        let mut snapshot = Snapshot::default();
        snapshot.fiat.insert(
            ("USDT".into(), "COP".into()),
            FiatRate { base: "USDT".into(), quote: "COP".into(), rate: 4000.0, source: FiatSourceKind::Official, timestamp_ms: 0 },
        );
        let graph = build(&snapshot, 0.001, 0.001);
        let usdt = graph.node_id("USDT").unwrap();
        let edge = graph.adjacency[usdt].iter().find(|e| graph.node_names[e.to] == "COP").unwrap();
        assert!((edge.effective_rate - 4000.0 * 0.998).abs() < 1e-6);
    }

    #[test]
    fn invalid_ticker_is_skipped() {
        let mut snapshot = Snapshot::default();
        snapshot.spot.insert(
            "BAD/USDT".into(),
            SpotTicker { symbol: "BAD/USDT".into(), bid: 10.0, ask: 5.0, last: 7.0, volume_24h: 1.0, timestamp_ms: 0 },
        );
        let graph = build(&snapshot, 0.0, 0.0);
        assert!(graph.node_id("BAD").is_none());
    }
}

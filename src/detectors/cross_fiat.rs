//! Cross-Fiat Triangle Detector (C3.6, spec.md §4.3.6): same mechanics as
//! the multi-hop cycle detector, restricted to a configured fiat pair
//! bridged through a single reference asset (USDT by default).

use super::Detector;
use crate::config::EngineConfig;
use crate::graph::{build, enumerate_cycles, Cycle, CycleLeg, PriceGraph};
use crate::market_data::Snapshot;
use crate::ml_oracle::MLOracle;
use crate::opportunity::{Action, Execution, Leg, RawOpportunity, Strategy, Venue};
use async_trait::async_trait;

pub struct CrossFiatDetector;

#[async_trait]
impl Detector for CrossFiatDetector {
    fn name(&self) -> &'static str {
        "cross_fiat"
    }

    async fn scan(&self, snapshot: &Snapshot, config: &EngineConfig, _oracle: Option<&dyn MLOracle>) -> Vec<RawOpportunity> {
        let cfg = &config.spot_p2p;
        let triangle_cfg = &config.triangle;
        let graph = build(snapshot, triangle_cfg.per_hop_fee, triangle_cfg.per_hop_slippage);
        let bridge = cfg.cross_fiat_bridge.clone();

        let mut out = Vec::new();
        let mut seen = std::collections::HashSet::new();

        for (fiat_a, fiat_b) in resolve_fiat_pairs(snapshot, cfg) {
            // The spec signal (§4.3.6) is the double-bridge walk
            // `fiat_A -> USDT -> fiat_B -> USDT -> fiat_A`, which revisits
            // the bridge node and so is never a *simple* cycle — it has to
            // be walked explicitly rather than found by `enumerate_cycles`.
            if let Some(cycle) = double_bridge_cycle(&graph, &bridge, &fiat_a, &fiat_b, triangle_cfg.min_edge_liquidity) {
                push_if_new(&mut out, &mut seen, cycle, snapshot.pinned_at_ms);
            }

            // A direct `fiat_A <-> fiat_B` rate also closes a (cheaper,
            // 3-hop) triangle through the bridge; when that edge exists in
            // the snapshot it's a strictly simpler cycle worth surfacing
            // alongside the double-bridge walk.
            let allowed = vec![bridge.clone(), fiat_a.clone(), fiat_b.clone()];
            let restricted = graph.restrict(&allowed);
            for cycle in enumerate_cycles(&restricted, &bridge, 3, triangle_cfg.min_edge_liquidity) {
                push_if_new(&mut out, &mut seen, cycle, snapshot.pinned_at_ms);
            }
        }

        out
    }
}

/// Build the explicit 4-edge walk `fiat_a -> bridge -> fiat_b -> bridge ->
/// fiat_a` from direct edge lookups, since the bridge node is visited
/// twice. ROI is the product of all four effective rates minus one,
/// rotation-invariant so it doesn't matter which fiat is "first".
fn double_bridge_cycle(graph: &PriceGraph, bridge: &str, fiat_a: &str, fiat_b: &str, min_liquidity: f64) -> Option<Cycle> {
    let hops = [(fiat_a, bridge), (bridge, fiat_b), (fiat_b, bridge), (bridge, fiat_a)];
    let mut legs = Vec::with_capacity(4);
    for (from, to) in hops {
        let edge = graph.edge(from, to)?;
        if edge.liquidity_usd < min_liquidity {
            return None;
        }
        legs.push(CycleLeg {
            from: from.to_string(),
            to: to.to_string(),
            symbol: edge.symbol.clone(),
            effective_rate: edge.effective_rate,
            liquidity_usd: edge.liquidity_usd,
        });
    }
    let roi: f64 = legs.iter().map(|l| l.effective_rate).product::<f64>() - 1.0;
    if roi <= 0.0 {
        return None;
    }
    let min_liq = legs.iter().map(|l| l.liquidity_usd).fold(f64::INFINITY, f64::min);
    let total_weight: f64 = legs.iter().map(|l| -l.effective_rate.ln()).sum();
    Some(Cycle { legs, total_weight, min_liquidity: min_liq })
}

fn push_if_new(out: &mut Vec<RawOpportunity>, seen: &mut std::collections::HashSet<Vec<String>>, cycle: Cycle, created_at_ms: u64) {
    let mut key: Vec<String> = cycle.legs.iter().map(|l| format!("{}->{}", l.from, l.to)).collect();
    key.sort();
    if !seen.insert(key) {
        return;
    }
    let roi = cycle.roi();
    if roi <= 0.0 {
        return;
    }
    let legs = cycle
        .legs
        .iter()
        .map(|leg| Leg {
            venue: Venue::FiatRail,
            action: Action::Buy,
            symbol: format!("{}/{}", leg.from, leg.to),
            size: 1.0,
            price: leg.effective_rate,
            notes: String::new(),
        })
        .collect();

    out.push(RawOpportunity {
        strategy: Strategy::CrossFiat,
        legs,
        gross_return: roi,
        fees_est: 0.0,
        slippage_est: 0.0,
        expected_apy: None,
        horizon_secs: 60,
        risk_native: 15.0,
        confidence: Some(60.0),
        sharpe: None,
        liquidity_usd: cycle.min_liquidity,
        ttl_secs: 30,
        execution: Execution::Automated,
        created_at_ms,
    });
}

fn resolve_fiat_pairs(snapshot: &Snapshot, cfg: &crate::config::SpotP2PConfig) -> Vec<(String, String)> {
    if !cfg.cross_fiat_pairs.is_empty() {
        return cfg.cross_fiat_pairs.clone();
    }
    let mut fiats: Vec<String> = snapshot
        .fiat
        .keys()
        .flat_map(|(b, q)| [b.clone(), q.clone()])
        .filter(|c| *c != cfg.cross_fiat_bridge)
        .collect();
    fiats.sort();
    fiats.dedup();
    let mut pairs = Vec::new();
    for i in 0..fiats.len() {
        for j in (i + 1)..fiats.len() {
            pairs.push((fiats[i].clone(), fiats[j].clone()));
        }
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::{FiatRate, FiatSourceKind};

    #[tokio::test]
    async fn finds_cross_fiat_triangle_through_bridge() {
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
        let config = EngineConfig::default();
        let opps = CrossFiatDetector.scan(&snapshot, &config, None).await;
        assert_eq!(opps.len(), 1);
        assert_eq!(opps[0].strategy, Strategy::CrossFiat);
    }

    #[tokio::test]
    async fn no_fiat_data_emits_nothing() {
        let snapshot = Snapshot::default();
        let config = EngineConfig::default();
        let opps = CrossFiatDetector.scan(&snapshot, &config, None).await;
        assert!(opps.is_empty());
    }

    /// spec.md §4.3.6's signal is the double-bridge walk `fiat_A -> USDT
    /// -> fiat_B -> USDT -> fiat_A`, which closes without ever needing a
    /// direct `fiat_A <-> fiat_B` rate. Here COP and VES have no direct
    /// rate between them at all — only COP<->USDT and VES<->USDT — and
    /// the independently quoted COP<->USDT legs (0.00026 one way, 4000
    /// the other, not exact reciprocals) are what closes the loop above 1.
    #[tokio::test]
    async fn finds_double_bridge_cycle_without_a_direct_fiat_pair_rate() {
        let mut snapshot = Snapshot::default();
        let insert = |s: &mut Snapshot, base: &str, quote: &str, rate: f64| {
            s.fiat.insert(
                (base.to_string(), quote.to_string()),
                FiatRate { base: base.into(), quote: quote.into(), rate, source: FiatSourceKind::Official, timestamp_ms: 0 },
            );
        };
        insert(&mut snapshot, "COP", "USDT", 0.00026);
        insert(&mut snapshot, "USDT", "COP", 4000.0);
        insert(&mut snapshot, "USDT", "VES", 0.028);

        let config = EngineConfig::default();
        let opps = CrossFiatDetector.scan(&snapshot, &config, None).await;

        assert_eq!(opps.len(), 1);
        assert_eq!(opps[0].strategy, Strategy::CrossFiat);
        assert_eq!(opps[0].legs.len(), 4);
        assert!(opps[0].gross_return > 0.0);
    }
}

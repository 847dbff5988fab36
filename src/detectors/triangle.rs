//! Advanced Triangle / Multi-hop Cycle Detector (C3.4, spec.md §4.3.4):
//! currency cycles whose effective-rate product exceeds 1.

use super::Detector;
use crate::config::EngineConfig;
use crate::graph::{build, enumerate_cycles, Cycle};
use crate::market_data::Snapshot;
use crate::ml_oracle::MLOracle;
use crate::opportunity::{Action, Execution, Leg, RawOpportunity, Strategy, Venue};
use async_trait::async_trait;
use smallvec::SmallVec;

pub struct TriangleDetector;

#[async_trait]
impl Detector for TriangleDetector {
    fn name(&self) -> &'static str {
        "triangle"
    }

    async fn scan(&self, snapshot: &Snapshot, config: &EngineConfig, _oracle: Option<&dyn MLOracle>) -> Vec<RawOpportunity> {
        let cfg = &config.triangle;
        let graph = build(snapshot, cfg.per_hop_fee, cfg.per_hop_slippage);

        let mut seen_legs: std::collections::HashSet<Vec<String>> = std::collections::HashSet::new();
        let mut scored: Vec<(f64, Cycle)> = Vec::new();

        for start in &graph.node_names {
            for cycle in enumerate_cycles(&graph, start, cfg.max_hops, cfg.min_edge_liquidity) {
                // Cycles are found once per rotation of the same loop (one
                // enumeration per starting node); dedup on the sorted leg
                // symbol set so a triangle isn't reported three times.
                let mut key: Vec<String> = cycle.legs.iter().map(|l| l.symbol.clone()).collect();
                key.sort();
                if !seen_legs.insert(key) {
                    continue;
                }

                let roi = cycle.roi();
                if roi <= 0.0 {
                    continue;
                }
                let normalized_roi = roi / (1.0 + roi.abs());
                let normalized_liquidity = cycle.min_liquidity / (1.0 + cycle.min_liquidity.abs());
                let risk_score = (cycle.hop_count() as f64 * 5.0).min(100.0);
                let hop_penalty = (cycle.hop_count() as f64 * cfg.hop_count_penalty_k).min(100.0);
                // spec.md §4.3.4 step 4: the detector-internal selection
                // score used to rank cycles before emitting, distinct from
                // the normalizer's cross-strategy composite score (§4.4).
                let cycle_score =
                    0.4 * normalized_roi + 0.3 * normalized_liquidity + 0.2 * (100.0 - risk_score) + 0.1 * (100.0 - hop_penalty);
                scored.push((cycle_score, cycle));
            }
        }

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        scored
            .into_iter()
            .take(config.scanning.max_candidates)
            .map(|(_, cycle)| cycle_to_opportunity(cycle, snapshot.pinned_at_ms))
            .collect()
    }
}

fn cycle_to_opportunity(cycle: Cycle, created_at_ms: u64) -> RawOpportunity {
    let roi = cycle.roi();
    let legs: SmallVec<[Leg; 4]> = cycle
        .legs
        .iter()
        .map(|leg| Leg {
            venue: Venue::FiatRail,
            action: Action::Buy,
            symbol: format!("{}/{}", leg.from, leg.to),
            size: leg.liquidity_usd.min(1.0),
            price: leg.effective_rate,
            notes: String::new(),
        })
        .collect();

    let risk_native = (cycle.hop_count() as f64 * 10.0).min(100.0);

    RawOpportunity {
        strategy: Strategy::Triangle,
        legs,
        gross_return: roi,
        fees_est: 0.0, // already folded into edge effective_rate via per_hop_fee
        slippage_est: 0.0,
        expected_apy: None,
        horizon_secs: 60,
        risk_native,
        confidence: Some((70.0 - cycle.hop_count() as f64 * 5.0).max(20.0)),
        sharpe: None,
        liquidity_usd: cycle.min_liquidity,
        ttl_secs: 30,
        execution: Execution::Automated,
        created_at_ms,
    }
}

//! Scanner Orchestrator (C8, spec.md §4.8): drives one end-to-end scan —
//! pin a snapshot, fan the six detectors out concurrently, then feed the
//! merged opportunities through the normalizer, ranker, and optimizer.

use crate::config::EngineConfig;
use crate::detectors::{all_detectors, Detector};
use crate::error::ScanError;
use crate::market_data::{Gateway, P2PSide, Snapshot};
use crate::ml_oracle::MLOracle;
use crate::normalizer::normalize_all;
use crate::opportunity::{Opportunity, Strategy};
use crate::optimizer::{optimize, Portfolio};
use crate::ranker::{rank, RankPolicy};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Cooperative cancellation handle (spec.md §5 "Cancellation"): cloning
/// shares the same underlying flag, mirroring the atomic-flag style the
/// circuit breaker already uses in this crate rather than pulling in a
/// separate cancellation-token crate for one boolean.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ScanStatus {
    Ok,
    Partial,
    Infeasible,
    Empty,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScanResult {
    pub opportunities: Vec<Opportunity>,
    pub ranking: Vec<Opportunity>,
    pub portfolio: Option<Portfolio>,
    pub status: ScanStatus,
    pub diagnostics: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StrategyAggregate {
    pub strategy: Strategy,
    pub count: usize,
    pub avg_return: f64,
    pub best_return: f64,
    pub avg_risk: f64,
    pub avg_sharpe: Option<f64>,
}

pub struct ScannerOrchestrator {
    gateway: Arc<Gateway>,
    config: EngineConfig,
    oracle: Option<Arc<dyn MLOracle>>,
}

impl ScannerOrchestrator {
    pub fn new(gateway: Arc<Gateway>, config: EngineConfig, oracle: Option<Arc<dyn MLOracle>>) -> Self {
        Self { gateway, config, oracle }
    }

    /// Pin a snapshot at `t0` by reading every instrument in the
    /// configured universe from the gateway. Per-key failures degrade to
    /// "absent from the snapshot" plus a diagnostic rather than aborting
    /// the whole pin (spec.md §7's detector-level policy applied one
    /// layer up, to reads instead of detectors).
    async fn pin_snapshot(&self, now_ms: u64, diagnostics: &mut Vec<String>) -> Snapshot {
        let universe = &self.config.universe;
        let mut snapshot = Snapshot { pinned_at_ms: now_ms, ..Snapshot::default() };

        for symbol in &universe.spot_symbols {
            match self.gateway.get_spot(symbol).await {
                Ok(a) => {
                    snapshot.spot.insert(symbol.clone(), a.value);
                }
                Err(e) => diagnostics.push(format!("spot[{symbol}]: {e}")),
            }
            match self.gateway.get_orderbook(symbol, universe.orderbook_depth.max(10)).await {
                Ok(a) => {
                    snapshot.orderbooks.insert(symbol.clone(), a.value);
                }
                Err(e) => diagnostics.push(format!("orderbook[{symbol}]: {e}")),
            }
        }

        for symbol in &universe.perp_symbols {
            match self.gateway.get_basis(symbol).await {
                Ok(a) => {
                    snapshot.basis.insert(symbol.clone(), a.value);
                }
                Err(e) => diagnostics.push(format!("basis[{symbol}]: {e}")),
            }
        }

        match self.gateway.get_funding_rates().await {
            Ok(a) => {
                for sample in a.value {
                    snapshot.funding_history.entry(sample.symbol.clone()).or_default().push(sample.clone());
                    snapshot.funding.insert(sample.symbol.clone(), sample);
                }
            }
            Err(e) => diagnostics.push(format!("funding: {e}")),
        }

        for (base, quote) in &universe.fiat_pairs {
            match self.gateway.get_fiat(base, quote, None).await {
                Ok(a) => {
                    snapshot.fiat.insert((base.clone(), quote.clone()), a.value);
                }
                Err(e) => diagnostics.push(format!("fiat[{base}/{quote}]: {e}")),
            }
        }

        for (asset, fiat) in &universe.p2p_pairs {
            match self.gateway.get_p2p(asset, fiat, P2PSide::Buy).await {
                Ok(a) => {
                    snapshot.p2p.insert((asset.clone(), fiat.clone()), a.value);
                }
                Err(e) => diagnostics.push(format!("p2p[{asset}/{fiat}]: {e}")),
            }
        }

        for symbol in &universe.price_history_symbols {
            match self.gateway.get_price_history(symbol, universe.price_history_window.max(60)).await {
                Ok(a) => {
                    snapshot.price_history.insert(symbol.clone(), a.value);
                }
                Err(e) => diagnostics.push(format!("price_history[{symbol}]: {e}")),
            }
        }

        snapshot
    }

    /// Drive one end-to-end scan (spec.md §4.8).
    pub async fn scan(
        &self,
        capital_usd: f64,
        policy: RankPolicy,
        now_ms: u64,
        cancel: Option<CancelToken>,
    ) -> Result<ScanResult, ScanError> {
        if let Some(token) = &cancel {
            if token.is_cancelled() {
                return Err(ScanError::Cancelled);
            }
        }

        let scan_deadline = Duration::from_millis(self.config.scanning.scan_deadline_ms);
        let result = tokio::time::timeout(scan_deadline, self.run_pipeline(capital_usd, policy, now_ms, cancel.clone())).await;

        match result {
            Ok(inner) => inner,
            Err(_elapsed) => Ok(ScanResult {
                opportunities: Vec::new(),
                ranking: Vec::new(),
                portfolio: None,
                status: ScanStatus::Partial,
                diagnostics: vec!["scan deadline exceeded".to_string()],
            }),
        }
    }

    async fn run_pipeline(
        &self,
        capital_usd: f64,
        policy: RankPolicy,
        now_ms: u64,
        cancel: Option<CancelToken>,
    ) -> Result<ScanResult, ScanError> {
        let mut diagnostics = Vec::new();
        let snapshot = self.pin_snapshot(now_ms, &mut diagnostics).await;

        if snapshot.is_empty() {
            return Ok(ScanResult { opportunities: Vec::new(), ranking: Vec::new(), portfolio: None, status: ScanStatus::Empty, diagnostics });
        }

        let per_detector_deadline = Duration::from_millis(self.config.scanning.per_detector_deadline_ms);
        let detectors = all_detectors();
        let mut futures = Vec::with_capacity(detectors.len());

        for detector in &detectors {
            if let Some(token) = &cancel {
                if token.is_cancelled() {
                    return Err(ScanError::Cancelled);
                }
            }
            futures.push(self.run_one_detector(detector.as_ref(), &snapshot, per_detector_deadline));
        }

        let per_detector_results = futures_util::future::join_all(futures).await;

        let mut raws = Vec::new();
        for (detector, outcome) in detectors.iter().zip(per_detector_results) {
            match outcome {
                Ok(mut found) => raws.append(&mut found),
                Err(msg) => diagnostics.push(format!("{}: {msg}", detector.name())),
            }
        }

        if let Some(token) = &cancel {
            if token.is_cancelled() {
                return Err(ScanError::Cancelled);
            }
        }

        let opportunities = normalize_all(raws, &self.config.normalizer, now_ms);
        if opportunities.is_empty() {
            return Ok(ScanResult { opportunities, ranking: Vec::new(), portfolio: None, status: ScanStatus::Empty, diagnostics });
        }

        let ranking = rank(&opportunities, policy, self.config.scanning.max_candidates);

        // SPOT_P2P execution is semi-manual (spec.md §4.3.5); by default it
        // does not compete for capital in the optimizer even though it still
        // surfaces in `opportunities` and `ranking` above.
        let investable_candidates: Vec<Opportunity> = if self.config.spot_p2p.investable {
            ranking.clone()
        } else {
            let excluded = ranking.iter().filter(|o| o.strategy == Strategy::SpotP2p).count();
            if excluded > 0 {
                eprintln!("[OPTIMIZER] excluding {excluded} non-investable SPOT_P2P candidate(s) from allocation");
            }
            ranking.iter().filter(|o| o.strategy != Strategy::SpotP2p).cloned().collect()
        };
        let portfolio = optimize(&investable_candidates, capital_usd, &self.config.scanning, &self.config.optimizer, &self.config.risk);

        let status = match &portfolio {
            Some(p) if p.tier == crate::optimizer::PortfolioTier::Infeasible => ScanStatus::Infeasible,
            Some(_) => ScanStatus::Ok,
            None => ScanStatus::Partial,
        };

        Ok(ScanResult { opportunities, ranking, portfolio, status, diagnostics })
    }

    async fn run_one_detector(
        &self,
        detector: &dyn Detector,
        snapshot: &Snapshot,
        deadline: Duration,
    ) -> Result<Vec<crate::opportunity::RawOpportunity>, String> {
        let oracle_ref = self.oracle.as_deref();
        match tokio::time::timeout(deadline, detector.scan(snapshot, &self.config, oracle_ref)).await {
            Ok(found) => Ok(found),
            Err(_) => Err("deadline exceeded".to_string()),
        }
    }

    /// Per-strategy aggregates over the most recent scan's opportunities
    /// (spec.md §6.2 `compare_strategies`).
    pub fn compare_strategies(opportunities: &[Opportunity]) -> Vec<StrategyAggregate> {
        Strategy::ALL
            .iter()
            .filter_map(|&strategy| {
                let group: Vec<&Opportunity> = opportunities.iter().filter(|o| o.strategy == strategy).collect();
                if group.is_empty() {
                    return None;
                }
                let count = group.len();
                let avg_return = group.iter().map(|o| o.expected_return).sum::<f64>() / count as f64;
                let best_return = group.iter().map(|o| o.expected_return).fold(f64::MIN, f64::max);
                let avg_risk = group.iter().map(|o| o.risk_score).sum::<f64>() / count as f64;
                let sharpes: Vec<f64> = group.iter().filter_map(|o| o.sharpe).collect();
                let avg_sharpe = if sharpes.is_empty() { None } else { Some(sharpes.iter().sum::<f64>() / sharpes.len() as f64) };
                Some(StrategyAggregate { strategy, count, avg_return, best_return, avg_risk, avg_sharpe })
            })
            .collect()
    }
}

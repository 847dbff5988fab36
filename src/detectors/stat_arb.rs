//! Statistical (Pairs) Detector (C3.2, spec.md §4.3.2): two cointegrated
//! assets' spread mean-reverts; trade the deviation.

use super::Detector;
use crate::config::EngineConfig;
use crate::market_data::Snapshot;
use crate::ml_oracle::MLOracle;
use crate::opportunity::{Action, Execution, Leg, RawOpportunity, Strategy, Venue};
use crate::stats::{engle_granger_p_value, ols_regress, rolling_mean_std, z_score};
use async_trait::async_trait;
use smallvec::smallvec;

pub struct StatArbDetector;

#[async_trait]
impl Detector for StatArbDetector {
    fn name(&self) -> &'static str {
        "stat_arb"
    }

    async fn scan(&self, snapshot: &Snapshot, config: &EngineConfig, _oracle: Option<&dyn MLOracle>) -> Vec<RawOpportunity> {
        let cfg = &config.stat_arb;
        let candidate_pairs = resolve_pairs(snapshot, cfg);
        let mut out = Vec::new();

        for (sym_a, sym_b) in candidate_pairs {
            let Some(hist_a) = snapshot.price_history.get(&sym_a) else { continue };
            let Some(hist_b) = snapshot.price_history.get(&sym_b) else { continue };
            let n = hist_a.len().min(hist_b.len()).min(cfg.sample_n);
            if n < cfg.window.max(20) {
                continue;
            }
            let a: Vec<f64> = hist_a[hist_a.len() - n..].iter().map(|p| p.close).collect();
            let b: Vec<f64> = hist_b[hist_b.len() - n..].iter().map(|p| p.close).collect();

            let Some((_alpha, beta, residuals)) = ols_regress(&a, &b) else { continue };
            let Some(p_value) = engle_granger_p_value(&residuals) else { continue };
            if p_value > cfg.cointegration_p_max {
                continue;
            }

            let spread: Vec<f64> = a.iter().zip(b.iter()).map(|(x, y)| x - beta * y).collect();
            let Some((mean, std)) = rolling_mean_std(&spread, cfg.window) else { continue };
            let last_spread = *spread.last().unwrap();
            let z = z_score(last_spread, mean, std);

            if z.abs() < cfg.z_entry {
                continue;
            }

            let price_a = *a.last().unwrap();
            let price_b = *b.last().unwrap();
            let reversion_target = (last_spread - mean).abs();
            let gross_return = reversion_target / price_a.max(1e-9);

            let notional_unit = 10_000.0;
            let size_a = notional_unit / price_a;
            let size_b = size_a * beta.abs();

            // z > 0: spread (A - beta*B) above its mean, A overperformed
            // relative to the fit => short A, long B. z < 0 is the mirror.
            let (action_a, action_b) = if z > 0.0 { (Action::Sell, Action::Buy) } else { (Action::Buy, Action::Sell) };

            let legs = smallvec![
                Leg { venue: Venue::Spot, action: action_a, symbol: sym_a.clone(), size: size_a, price: price_a, notes: String::new() },
                Leg {
                    venue: Venue::Spot,
                    action: action_b,
                    symbol: sym_b.clone(),
                    size: size_b,
                    price: price_b,
                    notes: format!("hedge_ratio={beta:.4}"),
                },
            ];

            let liquidity = snapshot
                .orderbooks
                .get(&sym_a)
                .map(|ob| ob.liquidity_usd(true).min(ob.liquidity_usd(false)))
                .unwrap_or(size_a * price_a);

            // Confidence scales with |z| - z_entry and cointegration
            // evidence (spec.md §4.3.2 step 6).
            let confidence = (50.0 + (z.abs() - cfg.z_entry) * 10.0 + (1.0 - p_value / cfg.cointegration_p_max) * 20.0)
                .clamp(0.0, 100.0);

            let risk_native = (std / mean.abs().max(1e-9) * 1000.0).min(100.0);

            out.push(RawOpportunity {
                strategy: Strategy::StatArb,
                legs,
                gross_return,
                fees_est: cfg.roundtrip_fees,
                slippage_est: cfg.roundtrip_fees * 0.25,
                expected_apy: None,
                horizon_secs: 24 * 3600,
                risk_native,
                confidence: Some(confidence),
                sharpe: None,
                liquidity_usd: liquidity,
                ttl_secs: 3600,
                execution: Execution::Automated,
                created_at_ms: snapshot.pinned_at_ms,
            });
        }

        out
    }
}

fn resolve_pairs(snapshot: &Snapshot, cfg: &crate::config::StatArbConfig) -> Vec<(String, String)> {
    if !cfg.pairs.is_empty() {
        return cfg.pairs.clone();
    }
    let mut symbols: Vec<&String> = snapshot.price_history.keys().collect();
    symbols.sort();
    let mut pairs = Vec::new();
    for i in 0..symbols.len() {
        for j in (i + 1)..symbols.len() {
            pairs.push((symbols[i].clone(), symbols[j].clone()));
        }
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::PricePoint;

    fn series(vals: &[f64]) -> Vec<PricePoint> {
        vals.iter().enumerate().map(|(i, v)| PricePoint { close: *v, timestamp_ms: i as u64 * 86_400_000 }).collect()
    }

    fn cointegrated_snapshot() -> Snapshot {
        let mut snapshot = Snapshot::default();
        let mut b = Vec::new();
        let mut a = Vec::new();
        let mut x = 100.0;
        for i in 0..200 {
            x += if i % 2 == 0 { 0.5 } else { -0.3 };
            b.push(x);
            // A tracks 2*B plus a bounded oscillation so the spread mean-reverts.
            let osc = if i % 10 < 5 { 3.0 } else { -3.0 };
            a.push(2.0 * x + osc);
        }
        snapshot.price_history.insert("AAA/USDT".into(), series(&a));
        snapshot.price_history.insert("BBB/USDT".into(), series(&b));
        snapshot
    }

    #[tokio::test]
    async fn skips_pair_with_insufficient_history() {
        let mut snapshot = Snapshot::default();
        snapshot.price_history.insert("AAA/USDT".into(), series(&[1.0, 2.0, 3.0]));
        snapshot.price_history.insert("BBB/USDT".into(), series(&[1.0, 2.0, 3.0]));
        let config = EngineConfig::default();
        let opps = StatArbDetector.scan(&snapshot, &config, None).await;
        assert!(opps.is_empty());
    }

    #[tokio::test]
    async fn cointegrated_pair_with_large_z_emits_opportunity_or_none_gracefully() {
        let snapshot = cointegrated_snapshot();
        let config = EngineConfig::default();
        // This is a statistical detector: assert it never panics and, when
        // it does emit, respects the two-leg / hedge-ratio contract.
        let opps = StatArbDetector.scan(&snapshot, &config, None).await;
        for opp in &opps {
            assert_eq!(opp.legs.len(), 2);
            assert!(opp.confidence.unwrap() >= 50.0);
        }
    }
}

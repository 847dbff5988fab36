//! Delta-Neutral (Basis) Detector (C3.3, spec.md §4.3.3): spot-futures
//! basis convergence, carry independent of market direction.

use super::Detector;
use crate::config::EngineConfig;
use crate::market_data::{ExpiryOrPerp, Snapshot};
use crate::ml_oracle::MLOracle;
use crate::opportunity::{Action, Execution, Leg, RawOpportunity, Strategy, Venue};
use crate::stats::{autocorrelation, half_life_from_autocorrelation};
use async_trait::async_trait;
use smallvec::smallvec;

pub struct DeltaNeutralDetector;

#[async_trait]
impl Detector for DeltaNeutralDetector {
    fn name(&self) -> &'static str {
        "delta_neutral"
    }

    async fn scan(&self, snapshot: &Snapshot, config: &EngineConfig, _oracle: Option<&dyn MLOracle>) -> Vec<RawOpportunity> {
        let cfg = &config.delta_neutral;
        let mut out = Vec::new();

        for basis in snapshot.basis.values() {
            let b = basis.basis();
            if b.abs() < cfg.min_basis {
                continue;
            }
            let Some(spot) = snapshot.spot.get(&basis.symbol) else { continue };
            if !spot.is_valid() {
                continue;
            }

            let funding_carry = snapshot.funding.get(&basis.symbol).map(|f| f.funding_rate).unwrap_or(0.0);
            let net_return = b.abs() + funding_carry.abs() - cfg.roundtrip_fees - cfg.expected_slippage;
            if net_return <= 0.0 {
                continue;
            }

            let holding_days = match basis.expiry_or_perp {
                ExpiryOrPerp::Dated { expiry_ms } => {
                    let days_to_expiry = (expiry_ms.saturating_sub(snapshot.pinned_at_ms)) as f64 / 86_400_000.0;
                    (days_to_expiry * cfg.fraction_of_basis_to_capture_target).ceil().max(1.0)
                }
                ExpiryOrPerp::Perpetual => {
                    let history = snapshot.basis_history.get(&basis.symbol).map(Vec::as_slice).unwrap_or(&[]);
                    autocorrelation(history, 1)
                        .and_then(half_life_from_autocorrelation)
                        .unwrap_or(cfg.default_perp_half_life_days)
                }
            };

            let liquidity = snapshot
                .orderbooks
                .get(&basis.symbol)
                .map(|ob| ob.liquidity_usd(true).min(ob.liquidity_usd(false)))
                .unwrap_or(spot.volume_24h * spot.last);
            let size = (liquidity / spot.last).max(0.0);
            if size <= 0.0 {
                continue;
            }

            // Contango: futures trade above spot => long spot, short
            // futures. Backwardation is the mirror, flagged as direction
            // risk since the short-spot leg typically needs borrowed
            // inventory (spec.md §4.3.3 step 4).
            let contango = basis.futures_price > basis.spot_price;
            let (spot_action, fut_action, note) = if contango {
                (Action::Buy, Action::Sell, String::new())
            } else {
                (Action::Sell, Action::Buy, "backwardation: short leg requires borrowed spot inventory".to_string())
            };

            let legs = smallvec![
                Leg { venue: Venue::Spot, action: spot_action, symbol: basis.symbol.clone(), size, price: basis.spot_price, notes: note.clone() },
                Leg {
                    venue: Venue::Perp,
                    action: fut_action,
                    symbol: basis.symbol.clone(),
                    size,
                    price: basis.futures_price,
                    notes: format!("optimal_holding_days≈{holding_days}"),
                },
            ];

            let risk_native = (b.abs() * 200.0 + if contango { 0.0 } else { 20.0 }).min(100.0);

            out.push(RawOpportunity {
                strategy: Strategy::DeltaNeutral,
                legs,
                gross_return: b.abs() + funding_carry.abs(),
                fees_est: cfg.roundtrip_fees,
                slippage_est: cfg.expected_slippage,
                expected_apy: Some(net_return * 365.0 / holding_days.max(1.0)),
                horizon_secs: (holding_days * 86_400.0) as u64,
                risk_native,
                confidence: Some(if contango { 65.0 } else { 50.0 }),
                sharpe: None,
                liquidity_usd: liquidity,
                ttl_secs: 600,
                execution: Execution::Automated,
                created_at_ms: snapshot.pinned_at_ms,
            });
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::{FuturesBasis, OrderBookLevel2, SpotTicker};

    fn snapshot_with_basis(basis: f64) -> Snapshot {
        let mut snapshot = Snapshot::default();
        let spot_price = 100.0;
        let futures_price = spot_price * (1.0 + basis);
        snapshot.spot.insert(
            "BTC/USDT".into(),
            SpotTicker { symbol: "BTC/USDT".into(), bid: 99.9, ask: 100.0, last: 100.0, volume_24h: 1000.0, timestamp_ms: 0 },
        );
        snapshot.orderbooks.insert(
            "BTC/USDT".into(),
            OrderBookLevel2 {
                symbol: "BTC/USDT".into(),
                bids: vec![crate::market_data::L2Level { price: 99.9, size: 10_000.0 }],
                asks: vec![crate::market_data::L2Level { price: 100.0, size: 10_000.0 }],
                timestamp_ms: 0,
            },
        );
        snapshot.basis.insert(
            "BTC/USDT".into(),
            FuturesBasis { symbol: "BTC/USDT".into(), spot_price, futures_price, expiry_or_perp: ExpiryOrPerp::Perpetual },
        );
        snapshot
    }

    #[tokio::test]
    async fn contango_above_threshold_emits_long_spot_short_future() {
        let snapshot = snapshot_with_basis(0.01);
        let config = EngineConfig::default();
        let opps = DeltaNeutralDetector.scan(&snapshot, &config, None).await;
        assert_eq!(opps.len(), 1);
        assert_eq!(opps[0].legs[0].action, Action::Buy);
        assert_eq!(opps[0].legs[1].action, Action::Sell);
    }

    #[tokio::test]
    async fn basis_below_threshold_emits_nothing() {
        let snapshot = snapshot_with_basis(0.0001);
        let config = EngineConfig::default();
        let opps = DeltaNeutralDetector.scan(&snapshot, &config, None).await;
        assert!(opps.is_empty());
    }

    #[tokio::test]
    async fn backwardation_flags_direction_risk_note() {
        let snapshot = snapshot_with_basis(-0.01);
        let config = EngineConfig::default();
        let opps = DeltaNeutralDetector.scan(&snapshot, &config, None).await;
        assert_eq!(opps.len(), 1);
        assert!(opps[0].legs[0].notes.contains("backwardation"));
    }
}

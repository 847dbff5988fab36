//! Spot-to-P2P Detector (C3.5, spec.md §4.3.5): buy an asset at spot near
//! USD par, sell into the best local-fiat P2P bid.

use super::Detector;
use crate::config::EngineConfig;
use crate::market_data::{P2PAd, P2PSide, Snapshot};
use crate::ml_oracle::MLOracle;
use crate::opportunity::{Action, Execution, Leg, RawOpportunity, Strategy, Venue};
use async_trait::async_trait;
use smallvec::smallvec;

pub struct SpotP2PDetector;

#[async_trait]
impl Detector for SpotP2PDetector {
    fn name(&self) -> &'static str {
        "spot_p2p"
    }

    async fn scan(&self, snapshot: &Snapshot, config: &EngineConfig, _oracle: Option<&dyn MLOracle>) -> Vec<RawOpportunity> {
        let cfg = &config.spot_p2p;
        let mut out = Vec::new();

        for ((asset, fiat), ads) in &snapshot.p2p {
            let Some(spot_symbol) = snapshot.spot.keys().find(|s| s.starts_with(&format!("{asset}/"))) else { continue };
            let spot = &snapshot.spot[spot_symbol];
            if !spot.is_valid() {
                continue;
            }
            let Some(fiat_rate) = snapshot.fiat.get(&("USDT".to_string(), fiat.clone())) else { continue };

            let mut eligible: Vec<&P2PAd> = ads
                .iter()
                .filter(|ad| ad.side == P2PSide::Buy && ad.merchant_score >= cfg.merchant_min_score)
                .collect();
            eligible.sort_by(|a, b| b.price.partial_cmp(&a.price).unwrap_or(std::cmp::Ordering::Equal));
            eligible.truncate(cfg.top_k_ads);

            let Some(best_ad) = eligible.first() else { continue };

            let local_price_per_asset = best_ad.price * (1.0 - cfg.p2p_fee);
            let official_implied = spot.ask * fiat_rate.rate;
            let profit_pct = local_price_per_asset / official_implied - 1.0;

            let min_margin = match fiat.as_str() {
                "COP" => cfg.min_margin_cop,
                "VES" => cfg.min_margin_ves,
                _ => cfg.min_margin_default,
            };
            if profit_pct < min_margin {
                continue;
            }

            let size = best_ad.max_qty.min(best_ad.min_qty.max(1.0));
            let legs = smallvec![
                Leg { venue: Venue::Spot, action: Action::Buy, symbol: spot_symbol.clone(), size, price: spot.ask, notes: String::new() },
                Leg {
                    venue: Venue::P2p,
                    action: Action::Sell,
                    symbol: format!("{asset}/{fiat}"),
                    size,
                    price: best_ad.price,
                    notes: format!("merchant_score={:.2}", best_ad.merchant_score),
                },
            ];

            let risk_native = ((1.0 - best_ad.merchant_score) * 100.0 + (1.0 / (best_ad.completed_trades as f64 + 1.0)) * 20.0).min(100.0);

            out.push(RawOpportunity {
                strategy: Strategy::SpotP2p,
                legs,
                gross_return: profit_pct,
                fees_est: cfg.p2p_fee + cfg.spot_taker_fee,
                slippage_est: 0.0,
                expected_apy: None,
                horizon_secs: 1800,
                risk_native,
                confidence: Some((best_ad.merchant_score * 100.0).min(100.0)),
                sharpe: None,
                liquidity_usd: size * spot.ask,
                ttl_secs: 120,
                execution: Execution::SemiManual,
                created_at_ms: snapshot.pinned_at_ms,
            });
        }

        out
    }
}

//! Funding-Rate Detector (C3.1, spec.md §4.3.1): long spot + short perp
//! (or the mirrored construction when funding is negative) captures the
//! periodic funding payment as carry.

use super::Detector;
use crate::config::EngineConfig;
use crate::market_data::{FundingRateSample, Snapshot};
use crate::ml_oracle::MLOracle;
use crate::opportunity::{Action, Execution, Leg, RawOpportunity, Strategy, Venue};
use async_trait::async_trait;
use smallvec::smallvec;

pub struct FundingDetector;

#[async_trait]
impl Detector for FundingDetector {
    fn name(&self) -> &'static str {
        "funding"
    }

    async fn scan(&self, snapshot: &Snapshot, config: &EngineConfig, _oracle: Option<&dyn MLOracle>) -> Vec<RawOpportunity> {
        let cfg = &config.funding;
        let mut out = Vec::new();

        for sample in snapshot.funding.values() {
            if sample.funding_rate == 0.0 {
                continue;
            }
            let Some(spot) = snapshot.spot.get(&sample.symbol) else { continue };
            if !spot.is_valid() {
                continue;
            }

            let history = snapshot.funding_history.get(&sample.symbol).map(Vec::as_slice).unwrap_or(&[]);
            let interval_hours = estimate_interval_hours(history, cfg.default_interval_hours);
            let fundings_per_year = 365.0 * 24.0 / interval_hours;
            let apy = sample.funding_rate * fundings_per_year;
            if apy.abs() < cfg.min_apy {
                continue;
            }

            let sharpe = funding_sharpe(history, cfg.min_sharpe_samples);

            let entry_cost = cfg.spot_taker_fee + cfg.perp_taker_fee + cfg.expected_slippage;
            let funding_per_interval = sample.funding_rate.abs();
            let break_even_fundings = if funding_per_interval > 0.0 {
                (entry_cost / funding_per_interval).ceil()
            } else {
                f64::INFINITY
            };

            let liquidity = snapshot
                .orderbooks
                .get(&sample.symbol)
                .map(|b| b.liquidity_usd(true).min(b.liquidity_usd(false)))
                .unwrap_or(spot.volume_24h * spot.last);
            let size = (liquidity / spot.last).max(0.0);
            if size <= 0.0 {
                continue;
            }

            // Positive funding: longs pay shorts, so BUY spot / SELL perp
            // collects the payment. Negative funding mirrors the trade.
            let (spot_action, perp_action) =
                if sample.funding_rate > 0.0 { (Action::Buy, Action::Sell) } else { (Action::Sell, Action::Buy) };

            let legs = smallvec![
                Leg {
                    venue: Venue::Spot,
                    action: spot_action,
                    symbol: sample.symbol.clone(),
                    size,
                    price: spot.last,
                    notes: String::new(),
                },
                Leg {
                    venue: Venue::Perp,
                    action: perp_action,
                    symbol: sample.symbol.clone(),
                    size,
                    price: sample.mark_price,
                    notes: format!("break_even≈{break_even_fundings} fundings"),
                },
            ];

            // Base volatility of funding scaled by a liquidation-distance
            // and leverage proxy (spec.md §4.3.1 "risk score"): tighter
            // mark/index convergence and larger size relative to depth
            // both push risk up.
            let funding_vol = history_std(history).unwrap_or(sample.funding_rate.abs() * 0.5);
            let mark_index_gap = ((sample.mark_price - sample.index_price) / sample.index_price.max(1e-9)).abs();
            let risk_native = ((funding_vol * 5000.0) + mark_index_gap * 100.0).min(100.0);

            out.push(RawOpportunity {
                strategy: Strategy::Funding,
                legs,
                gross_return: funding_per_interval,
                fees_est: entry_cost,
                slippage_est: cfg.expected_slippage,
                expected_apy: Some(apy),
                horizon_secs: (interval_hours * 3600.0) as u64,
                risk_native,
                confidence: if history.len() >= 3 { Some(65.0) } else { None },
                sharpe,
                liquidity_usd: liquidity,
                ttl_secs: 300,
                execution: Execution::Automated,
                created_at_ms: snapshot.pinned_at_ms,
            });
        }

        out
    }
}

fn estimate_interval_hours(history: &[FundingRateSample], default_hours: f64) -> f64 {
    if history.len() < 2 {
        return default_hours;
    }
    let mut deltas = Vec::new();
    for w in history.windows(2) {
        let d = w[1].next_funding_time_ms.abs_diff(w[0].next_funding_time_ms);
        if d > 0 {
            deltas.push(d as f64 / 3_600_000.0);
        }
    }
    if deltas.is_empty() {
        return default_hours;
    }
    deltas.iter().sum::<f64>() / deltas.len() as f64
}

fn history_std(history: &[FundingRateSample]) -> Option<f64> {
    if history.len() < 2 {
        return None;
    }
    let rates: Vec<f64> = history.iter().map(|s| s.funding_rate).collect();
    let mean = rates.iter().sum::<f64>() / rates.len() as f64;
    let var = rates.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / rates.len() as f64;
    Some(var.sqrt())
}

fn funding_sharpe(history: &[FundingRateSample], min_samples: usize) -> Option<f64> {
    if history.len() < min_samples {
        return None;
    }
    let rates: Vec<f64> = history.iter().map(|s| s.funding_rate).collect();
    let mean = rates.iter().sum::<f64>() / rates.len() as f64;
    let std = history_std(history)?;
    if std <= 0.0 {
        return None;
    }
    Some(mean / std)
}

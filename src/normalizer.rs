//! Opportunity Normalizer (C4, spec.md §4.4): projects every detector's
//! native record onto the unified `Opportunity` shape and computes the
//! composite score, priority, and recommendation.

use crate::config::NormalizerConfig;
use crate::opportunity::{fingerprint, priority_from_score, recommendation_from, Opportunity, RawOpportunity, Strategy};
use crate::stats::saturating_normalize;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use uuid::Uuid;

/// Fixed risk-unit multiplier per strategy (spec.md §4.4 "fixed table
/// `risk_weights[strategy]`"). Not configuration: these encode how much a
/// strategy's own risk units should weigh against the others, a design
/// decision rather than a deployment knob. Built once and shared across
/// every `normalize` call rather than re-matched per opportunity.
static RISK_WEIGHTS: Lazy<HashMap<Strategy, f64>> = Lazy::new(|| {
    [
        (Strategy::Funding, 0.8),
        (Strategy::StatArb, 1.0),
        (Strategy::DeltaNeutral, 0.9),
        (Strategy::Triangle, 1.2),
        (Strategy::SpotP2p, 1.3),
        (Strategy::CrossFiat, 1.1),
    ]
    .into_iter()
    .collect()
});

fn risk_weight(strategy: Strategy) -> f64 {
    RISK_WEIGHTS.get(&strategy).copied().unwrap_or(1.0)
}

pub fn normalize(raw: RawOpportunity, cfg: &NormalizerConfig, now_ms: u64) -> Opportunity {
    let expected_return = raw.gross_return - raw.fees_est - raw.slippage_est;
    let confidence = raw.confidence.unwrap_or(50.0);
    let risk_score = (raw.risk_native * risk_weight(raw.strategy)).clamp(0.0, 100.0);

    let sharpe_term = raw.sharpe.map(|s| s.clamp(0.0, cfg.sharpe_cap) / cfg.sharpe_cap).unwrap_or(0.0);
    let score = 100.0
        * (cfg.w_return * saturating_normalize(expected_return / cfg.r_ref)
            + cfg.w_liquidity * saturating_normalize(raw.liquidity_usd / cfg.l_ref)
            + cfg.w_confidence * confidence / 100.0
            - cfg.w_risk * risk_score / 100.0
            + cfg.w_sharpe * sharpe_term);
    let score = score.clamp(0.0, 100.0);

    let fp = fingerprint(raw.strategy, &raw.legs);
    let priority = priority_from_score(score);
    let recommendation = recommendation_from(score, risk_score, confidence);

    Opportunity {
        id: Uuid::new_v4().to_string(),
        strategy: raw.strategy,
        legs: raw.legs,
        expected_return,
        expected_apy: raw.expected_apy,
        horizon_secs: raw.horizon_secs,
        risk_score,
        confidence,
        sharpe: raw.sharpe,
        liquidity_usd: raw.liquidity_usd,
        slippage_est: raw.slippage_est,
        fees_est: raw.fees_est,
        score,
        priority,
        recommendation,
        fingerprint: fp,
        created_at_ms: if raw.created_at_ms > 0 { raw.created_at_ms } else { now_ms },
        ttl_secs: raw.ttl_secs,
        execution: raw.execution,
    }
}

pub fn normalize_all(raws: Vec<RawOpportunity>, cfg: &NormalizerConfig, now_ms: u64) -> Vec<Opportunity> {
    raws.into_iter().map(|r| normalize(r, cfg, now_ms)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opportunity::{Action, Execution, Leg, Venue};
    use smallvec::smallvec;

    fn raw(gross_return: f64, fees: f64, slippage: f64, liquidity: f64, confidence: Option<f64>, risk_native: f64) -> RawOpportunity {
        RawOpportunity {
            strategy: Strategy::Funding,
            legs: smallvec![Leg { venue: Venue::Spot, action: Action::Buy, symbol: "BTC/USDT".into(), size: 1.0, price: 60_000.0, notes: String::new() }],
            gross_return,
            fees_est: fees,
            slippage_est: slippage,
            expected_apy: None,
            horizon_secs: 3600,
            risk_native,
            confidence,
            sharpe: None,
            liquidity_usd: liquidity,
            ttl_secs: 60,
            execution: Execution::Automated,
            created_at_ms: 1_000,
        }
    }

    #[test]
    fn expected_return_nets_out_fees_and_slippage() {
        let cfg = NormalizerConfig::default();
        let opp = normalize(raw(0.01, 0.0008, 0.0002, 1_000_000.0, Some(80.0), 10.0), &cfg, 0);
        assert!((opp.expected_return - (0.01 - 0.0008 - 0.0002)).abs() < 1e-9);
    }

    #[test]
    fn missing_confidence_defaults_to_fifty() {
        let cfg = NormalizerConfig::default();
        let opp = normalize(raw(0.01, 0.0, 0.0, 1_000_000.0, None, 10.0), &cfg, 0);
        assert_eq!(opp.confidence, 50.0);
    }

    #[test]
    fn score_is_bounded_zero_to_hundred() {
        let cfg = NormalizerConfig::default();
        let opp = normalize(raw(10.0, 0.0, 0.0, 1e12, Some(100.0), 0.0), &cfg, 0);
        assert!(opp.score <= 100.0 && opp.score >= 0.0);
    }

    #[test]
    fn higher_risk_native_increases_risk_score_for_riskier_strategy() {
        let cfg = NormalizerConfig::default();
        let mut r = raw(0.01, 0.0, 0.0, 1_000_000.0, Some(80.0), 50.0);
        r.strategy = Strategy::SpotP2p;
        let opp = normalize(r, &cfg, 0);
        assert!((opp.risk_score - 50.0 * 1.3).abs() < 1e-9);
    }

    proptest::proptest! {
        #[test]
        fn expected_return_always_nets_gross_return_minus_costs(
            gross in -1.0f64..1.0,
            fees in 0.0f64..0.1,
            slippage in 0.0f64..0.1,
            liquidity in 0.0f64..1e8,
            risk_native in 0.0f64..100.0,
        ) {
            let cfg = NormalizerConfig::default();
            let opp = normalize(raw(gross, fees, slippage, liquidity, Some(75.0), risk_native), &cfg, 0);
            prop_assert!((opp.expected_return - (gross - fees - slippage)).abs() < 1e-9);
        }

        #[test]
        fn score_is_always_within_the_zero_to_hundred_band(
            gross in -10.0f64..10.0,
            fees in 0.0f64..0.1,
            slippage in 0.0f64..0.1,
            liquidity in 0.0f64..1e10,
            confidence in 0.0f64..100.0,
            risk_native in 0.0f64..100.0,
        ) {
            let cfg = NormalizerConfig::default();
            let opp = normalize(raw(gross, fees, slippage, liquidity, Some(confidence), risk_native), &cfg, 0);
            prop_assert!((0.0..=100.0).contains(&opp.score));
        }
    }
}

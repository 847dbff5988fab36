//! Exercises the normalizer and ranker together over a mixed-strategy
//! batch of raw detector output, the way the orchestrator actually
//! chains them.

use arbscope::config::NormalizerConfig;
use arbscope::normalizer::normalize_all;
use arbscope::opportunity::{Action, Execution, Leg, RawOpportunity, Strategy, Venue};
use arbscope::ranker::{rank, RankPolicy};
use smallvec::smallvec;

fn leg(symbol: &str) -> Leg {
    Leg { venue: Venue::Spot, action: Action::Buy, symbol: symbol.to_string(), size: 1.0, price: 100.0, notes: String::new() }
}

fn raw(strategy: Strategy, symbol: &str, gross_return: f64, risk_native: f64, liquidity: f64, sharpe: Option<f64>) -> RawOpportunity {
    RawOpportunity {
        strategy,
        legs: smallvec![leg(symbol)],
        gross_return,
        fees_est: 0.0005,
        slippage_est: 0.0003,
        expected_apy: None,
        horizon_secs: 3600,
        risk_native,
        confidence: Some(70.0),
        sharpe,
        liquidity_usd: liquidity,
        ttl_secs: 300,
        execution: Execution::Automated,
        created_at_ms: 1_000,
    }
}

#[test]
fn riskier_strategies_are_penalized_relative_to_safer_ones_at_equal_gross_return() {
    let cfg = NormalizerConfig::default();
    let raws = vec![
        raw(Strategy::Funding, "BTC/USDT", 0.01, 20.0, 1_000_000.0, None),
        raw(Strategy::SpotP2p, "USDT/COP", 0.01, 20.0, 1_000_000.0, None),
    ];
    let opps = normalize_all(raws, &cfg, 2_000);
    let funding = opps.iter().find(|o| o.strategy == Strategy::Funding).unwrap();
    let spot_p2p = opps.iter().find(|o| o.strategy == Strategy::SpotP2p).unwrap();
    // Same raw risk units, but funding's risk weight (0.8) is lower than
    // spot_p2p's (1.3), so funding should score at least as high.
    assert!(funding.risk_score < spot_p2p.risk_score);
    assert!(funding.score >= spot_p2p.score);
}

#[test]
fn ranking_by_score_after_normalizing_a_mixed_batch_dedups_and_sorts() {
    let cfg = NormalizerConfig::default();
    let mut raws = vec![
        raw(Strategy::Funding, "BTC/USDT", 0.02, 10.0, 2_000_000.0, Some(1.5)),
        raw(Strategy::StatArb, "ETH/USDT", 0.015, 15.0, 500_000.0, Some(0.8)),
        raw(Strategy::Triangle, "USDT/COP", 0.005, 30.0, 100_000.0, None),
    ];
    // A duplicate of the funding leg (same strategy/symbol/notional bucket)
    // should collapse during ranking.
    raws.push(raw(Strategy::Funding, "BTC/USDT", 0.021, 10.0, 2_000_000.0, Some(1.6)));

    let opps = normalize_all(raws, &cfg, 2_000);
    let ranked = rank(&opps, RankPolicy::ByScore, 10);

    assert_eq!(ranked.len(), 3, "the duplicate funding leg should dedup by fingerprint");
    for pair in ranked.windows(2) {
        assert!(pair[0].score >= pair[1].score, "ranked output must be sorted by descending score");
    }
}

#[test]
fn ranking_by_sharpe_puts_opportunities_without_a_sharpe_sample_last() {
    let cfg = NormalizerConfig::default();
    let raws = vec![
        raw(Strategy::Triangle, "USDT/COP", 0.005, 30.0, 100_000.0, None),
        raw(Strategy::Funding, "BTC/USDT", 0.02, 10.0, 2_000_000.0, Some(1.5)),
    ];
    let opps = normalize_all(raws, &cfg, 2_000);
    let ranked = rank(&opps, RankPolicy::BySharpe, 10);
    assert_eq!(ranked[0].strategy, Strategy::Funding);
    assert_eq!(ranked[1].strategy, Strategy::Triangle);
}

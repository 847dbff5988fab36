//! Portfolio Optimizer (C7, spec.md §4.7): chooses non-negative weights
//! summing to one over a filtered candidate set, maximizing
//! `U(x) = mu^T x - lambda * sigma_p(x)^2` subject to the risk-analyzer's
//! limit set (§4.6).

use crate::config::{OptimizerConfig, RiskConfig, ScanningConfig};
use crate::opportunity::Opportunity;
use crate::risk::analyzer::{analyze, check_limits, position_vol};
use crate::risk::{LimitBreach, PortfolioRisk};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PortfolioTier {
    Excellent,
    Good,
    Marginal,
    Infeasible,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub opportunity_id: String,
    pub weight: f64,
    pub capital_usd: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Portfolio {
    pub positions: Vec<Position>,
    pub risk: PortfolioRisk,
    pub tier: PortfolioTier,
    pub total_capital_usd: f64,
}

/// `optimize` never fails with an error: an allocation that cannot be
/// made to satisfy every limit is returned with `tier = Infeasible`
/// rather than short-circuiting the scan (spec.md §7 "`Infeasible` —
/// optimizer could not meet limits; returned as a value, not an error").
pub fn optimize(
    opportunities: &[Opportunity],
    capital_usd: f64,
    scanning: &ScanningConfig,
    optimizer_cfg: &OptimizerConfig,
    risk_cfg: &RiskConfig,
) -> Option<Portfolio> {
    let filtered: Vec<&Opportunity> = opportunities
        .iter()
        .filter(|o| o.expected_return >= scanning.min_return)
        .filter(|o| o.risk_score <= scanning.max_risk_score)
        .filter(|o| o.confidence >= scanning.min_confidence)
        .take(scanning.max_candidates)
        .collect();

    if filtered.is_empty() {
        return None;
    }

    let mu = DVector::from_iterator(filtered.len(), filtered.iter().map(|o| o.expected_return));
    let mut weights = solve(&filtered, &mu, capital_usd, optimizer_cfg);

    prune_and_renormalize(&mut weights, optimizer_cfg.min_weight);
    cap_positions(&filtered, &mut weights, &mu, optimizer_cfg.max_positions);

    let owned: Vec<Opportunity> = filtered.iter().map(|o| (*o).clone()).collect();
    let mut risk = analyze(&owned, &weights, capital_usd, risk_cfg, None);
    let mut breaches = check_limits(&risk, &owned, &weights, capital_usd, risk_cfg);

    let mut attempts = 0;
    while !breaches.is_empty() && attempts < 5 {
        eprintln!("[OPTIMIZER] {} limit breach(es) after allocation, reducing highest-risk position (attempt {})", breaches.len(), attempts + 1);
        reduce_highest_risk_position(&owned, &mut weights);
        renormalize(&mut weights);
        risk = analyze(&owned, &weights, capital_usd, risk_cfg, None);
        breaches = check_limits(&risk, &owned, &weights, capital_usd, risk_cfg);
        attempts += 1;
    }

    let tier = tier_from(&risk, &breaches);
    let positions = owned
        .iter()
        .zip(&weights)
        .filter(|(_, w)| **w > 0.0)
        .map(|(o, w)| Position { opportunity_id: o.id.clone(), weight: *w, capital_usd: w * capital_usd })
        .collect();

    Some(Portfolio { positions, risk, tier, total_capital_usd: capital_usd })
}

fn solve(opportunities: &[&Opportunity], mu: &DVector<f64>, capital_usd: f64, cfg: &OptimizerConfig) -> Vec<f64> {
    let n = opportunities.len();
    let mut x = vec![1.0 / n as f64; n];

    for _ in 0..cfg.solver_max_iters {
        let vols: Vec<f64> = opportunities.iter().zip(&x).map(|(o, w)| position_vol(o, capital_usd, *w)).collect();
        let correlation = crate::risk::analyzer::correlation_matrix(&opportunities.iter().map(|o| (*o).clone()).collect::<Vec<_>>());
        let sigma = DVector::from_row_slice(&vols);
        let cov = DMatrix::from_fn(n, n, |i, j| sigma[i] * correlation[(i, j)] * sigma[j]);
        let x_vec = DVector::from_row_slice(&x);
        let gradient = mu - (&cov * &x_vec) * (2.0 * cfg.risk_aversion_lambda);

        // Projected-gradient step: move toward the gradient, then project
        // onto the simplex (non-negative, sums to one) by clipping and
        // renormalizing.
        let step = 0.05;
        let mut next: Vec<f64> = x.iter().zip(gradient.iter()).map(|(xi, gi)| (xi + step * gi).max(0.0)).collect();
        let sum: f64 = next.iter().sum();
        if sum > 0.0 {
            for v in &mut next {
                *v /= sum;
            }
        } else {
            next = vec![1.0 / n as f64; n];
        }

        let delta: f64 = next.iter().zip(&x).map(|(a, b)| (a - b).abs()).sum();
        x = next;
        if delta < cfg.solver_tolerance {
            break;
        }
    }

    x
}

fn prune_and_renormalize(weights: &mut [f64], min_weight: f64) {
    for w in weights.iter_mut() {
        if *w < min_weight {
            *w = 0.0;
        }
    }
    renormalize(weights);
}

fn renormalize(weights: &mut [f64]) {
    let sum: f64 = weights.iter().sum();
    if sum > 0.0 {
        for w in weights.iter_mut() {
            *w /= sum;
        }
    }
}

fn cap_positions(opportunities: &[&Opportunity], weights: &mut [f64], mu: &DVector<f64>, max_positions: usize) {
    let active = weights.iter().filter(|w| **w > 0.0).count();
    if active <= max_positions {
        return;
    }
    // Keep the top-`max_positions` by marginal utility (approximated here
    // by `expected_return`, since at this stage positions are near-equal
    // weight and return dominates the ranking).
    let mut idx: Vec<usize> = (0..opportunities.len()).collect();
    idx.sort_by(|&a, &b| mu[b].partial_cmp(&mu[a]).unwrap_or(std::cmp::Ordering::Equal));
    for &i in idx.iter().skip(max_positions) {
        weights[i] = 0.0;
    }
    renormalize(weights);
}

fn reduce_highest_risk_position(opportunities: &[Opportunity], weights: &mut [f64]) {
    let Some((idx, _)) = opportunities
        .iter()
        .enumerate()
        .filter(|(i, _)| weights[*i] > 0.0)
        .max_by(|(_, a), (_, b)| a.risk_score.partial_cmp(&b.risk_score).unwrap_or(std::cmp::Ordering::Equal))
    else {
        return;
    };
    weights[idx] *= 0.8;
}

fn tier_from(risk: &PortfolioRisk, breaches: &[LimitBreach]) -> PortfolioTier {
    if !breaches.is_empty() {
        return PortfolioTier::Infeasible;
    }
    if risk.diversification_ratio >= 1.5 && risk.var_95 < risk.portfolio_vol * 2.0 {
        PortfolioTier::Excellent
    } else if risk.diversification_ratio >= 1.2 {
        PortfolioTier::Good
    } else {
        PortfolioTier::Marginal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opportunity::{Execution, Priority, Recommendation, Strategy};
    use smallvec::SmallVec;

    fn opp(id: &str, strategy: Strategy, expected_return: f64, risk_score: f64, confidence: f64, liquidity: f64) -> Opportunity {
        Opportunity {
            id: id.into(),
            strategy,
            legs: SmallVec::new(),
            expected_return,
            expected_apy: None,
            horizon_secs: 3600,
            risk_score,
            confidence,
            sharpe: None,
            liquidity_usd: liquidity,
            slippage_est: 0.0,
            fees_est: 0.0,
            score: 70.0,
            priority: Priority::Med,
            recommendation: Recommendation::Buy,
            fingerprint: id.len() as u64,
            created_at_ms: 0,
            ttl_secs: 60,
            execution: Execution::Automated,
        }
    }

    #[test]
    fn single_opportunity_allocates_full_weight() {
        let opps = vec![opp("a", Strategy::Funding, 0.02, 10.0, 80.0, 1_000_000.0)];
        let portfolio = optimize(&opps, 100_000.0, &ScanningConfig::default(), &OptimizerConfig::default(), &RiskConfig::default()).unwrap();
        assert_eq!(portfolio.positions.len(), 1);
        assert!((portfolio.positions[0].weight - 1.0).abs() < 1e-6);
    }

    #[test]
    fn empty_candidate_set_returns_none() {
        let opps: Vec<Opportunity> = vec![];
        let portfolio = optimize(&opps, 100_000.0, &ScanningConfig::default(), &OptimizerConfig::default(), &RiskConfig::default());
        assert!(portfolio.is_none());
    }

    #[test]
    fn max_positions_is_respected() {
        let opps: Vec<Opportunity> = (0..10)
            .map(|i| opp(&format!("o{i}"), Strategy::Funding, 0.01 + i as f64 * 0.001, 10.0, 80.0, 1_000_000.0))
            .collect();
        let cfg = OptimizerConfig { max_positions: 3, ..OptimizerConfig::default() };
        let portfolio = optimize(&opps, 100_000.0, &ScanningConfig::default(), &cfg, &RiskConfig::default()).unwrap();
        assert!(portfolio.positions.len() <= 3);
    }

    #[test]
    fn weights_sum_to_one_when_feasible() {
        let opps = vec![
            opp("a", Strategy::Funding, 0.02, 10.0, 80.0, 1_000_000.0),
            opp("b", Strategy::StatArb, 0.015, 15.0, 80.0, 1_000_000.0),
        ];
        let portfolio = optimize(&opps, 100_000.0, &ScanningConfig::default(), &OptimizerConfig::default(), &RiskConfig::default()).unwrap();
        let sum: f64 = portfolio.positions.iter().map(|p| p.weight).sum();
        assert!((sum - 1.0).abs() < 1e-6 || portfolio.tier == PortfolioTier::Infeasible);
    }
}

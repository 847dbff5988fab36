//! Ranker (C5, spec.md §4.5): dedup by fingerprint, sort by policy, break
//! ties deterministically.

use crate::opportunity::Opportunity;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RankPolicy {
    ByReturn,
    ByRiskAdjusted,
    BySharpe,
    ByScore,
}

const RISK_ADJUST_EPSILON: f64 = 1e-6;

/// Dedup by `fingerprint` (the higher-scoring duplicate wins), sort by
/// `policy`, tie-break by `(liquidity_usd desc, horizon_secs asc,
/// created_at_ms asc)`, then truncate to `k`.
pub fn rank(opportunities: &[Opportunity], policy: RankPolicy, k: usize) -> Vec<Opportunity> {
    let mut best_by_fingerprint: HashMap<u64, Opportunity> = HashMap::new();
    for opp in opportunities {
        best_by_fingerprint
            .entry(opp.fingerprint)
            .and_modify(|existing| {
                if opp.score > existing.score {
                    *existing = opp.clone();
                }
            })
            .or_insert_with(|| opp.clone());
    }

    let mut deduped: Vec<Opportunity> = best_by_fingerprint.into_values().collect();

    deduped.sort_by(|a, b| {
        policy_cmp(policy, a, b)
            .then_with(|| b.liquidity_usd.partial_cmp(&a.liquidity_usd).unwrap_or(std::cmp::Ordering::Equal))
            .then_with(|| a.horizon_secs.cmp(&b.horizon_secs))
            .then_with(|| a.created_at_ms.cmp(&b.created_at_ms))
    });

    deduped.truncate(k);
    deduped
}

fn policy_cmp(policy: RankPolicy, a: &Opportunity, b: &Opportunity) -> std::cmp::Ordering {
    match policy {
        RankPolicy::ByReturn => b.expected_return.partial_cmp(&a.expected_return).unwrap_or(std::cmp::Ordering::Equal),
        RankPolicy::ByRiskAdjusted => {
            let ra = |o: &Opportunity| o.expected_return / (o.risk_score / 100.0).max(RISK_ADJUST_EPSILON);
            ra(b).partial_cmp(&ra(a)).unwrap_or(std::cmp::Ordering::Equal)
        }
        RankPolicy::BySharpe => match (a.sharpe, b.sharpe) {
            (Some(sa), Some(sb)) => sb.partial_cmp(&sa).unwrap_or(std::cmp::Ordering::Equal),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        },
        RankPolicy::ByScore => b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opportunity::{Execution, Priority, Recommendation, Strategy};
    use smallvec::SmallVec;

    fn opp(fingerprint: u64, score: f64, expected_return: f64, risk_score: f64, liquidity: f64, sharpe: Option<f64>) -> Opportunity {
        Opportunity {
            id: format!("{fingerprint}"),
            strategy: Strategy::Funding,
            legs: SmallVec::new(),
            expected_return,
            expected_apy: None,
            horizon_secs: 3600,
            risk_score,
            confidence: 70.0,
            sharpe,
            liquidity_usd: liquidity,
            slippage_est: 0.0,
            fees_est: 0.0,
            score,
            priority: Priority::Med,
            recommendation: Recommendation::Hold,
            fingerprint,
            created_at_ms: 0,
            ttl_secs: 60,
            execution: Execution::Automated,
        }
    }

    #[test]
    fn dedups_by_fingerprint_keeping_higher_score() {
        let opps = vec![opp(1, 50.0, 0.01, 10.0, 100.0, None), opp(1, 90.0, 0.02, 10.0, 100.0, None)];
        let ranked = rank(&opps, RankPolicy::ByScore, 10);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].score, 90.0);
    }

    #[test]
    fn by_sharpe_puts_nulls_last() {
        let opps = vec![opp(1, 50.0, 0.01, 10.0, 100.0, None), opp(2, 50.0, 0.01, 10.0, 100.0, Some(1.5))];
        let ranked = rank(&opps, RankPolicy::BySharpe, 10);
        assert_eq!(ranked[0].fingerprint, 2);
        assert_eq!(ranked[1].fingerprint, 1);
    }

    #[test]
    fn tie_break_prefers_higher_liquidity() {
        let opps = vec![opp(1, 50.0, 0.01, 10.0, 50.0, None), opp(2, 50.0, 0.01, 10.0, 500.0, None)];
        let ranked = rank(&opps, RankPolicy::ByScore, 10);
        assert_eq!(ranked[0].fingerprint, 2);
    }

    #[test]
    fn truncates_to_k() {
        let opps = vec![opp(1, 10.0, 0.01, 10.0, 1.0, None), opp(2, 20.0, 0.01, 10.0, 1.0, None), opp(3, 30.0, 0.01, 10.0, 1.0, None)];
        let ranked = rank(&opps, RankPolicy::ByScore, 2);
        assert_eq!(ranked.len(), 2);
    }
}

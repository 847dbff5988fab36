//! Risk domain types (C6, spec.md §4.6): the inputs and outputs of
//! portfolio risk analysis, independent of how they're computed.

use crate::opportunity::Strategy;
use serde::{Deserialize, Serialize};

/// Fixed per-strategy base daily volatility and market beta (spec.md
/// §4.6 "Per-strategy volatility and market beta (configuration
/// table)"). Modeled as a lookup rather than user configuration since
/// these are domain facts about each strategy's typical risk profile,
/// not deployment knobs.
pub fn base_vol_strategy(strategy: Strategy) -> f64 {
    match strategy {
        Strategy::Funding => 0.01,
        Strategy::StatArb => 0.02,
        Strategy::DeltaNeutral => 0.015,
        Strategy::Triangle => 0.03,
        Strategy::SpotP2p => 0.025,
        Strategy::CrossFiat => 0.025,
    }
}

pub fn market_beta(strategy: Strategy) -> f64 {
    match strategy {
        Strategy::Funding => 0.05,
        Strategy::StatArb => 0.1,
        Strategy::DeltaNeutral => 0.05,
        Strategy::Triangle => 0.2,
        Strategy::SpotP2p => 0.15,
        Strategy::CrossFiat => 0.15,
    }
}

/// Default pairwise strategy correlation: low positive off-diagonal,
/// identity on the diagonal (spec.md §4.6). Replaced with an empirical
/// Pearson matrix when strategy-level daily PnL history is supplied.
pub fn default_correlation(n: usize) -> Vec<Vec<f64>> {
    let mut c = vec![vec![0.15; n]; n];
    for (i, row) in c.iter_mut().enumerate() {
        row[i] = 1.0;
    }
    c
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum StressScenario {
    MarketCrash,
    LiquidityCrisis,
    FundingReversal,
    WorstCase,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StressResult {
    pub scenario: StressScenario,
    pub pnl_impact: f64,
    pub resulting_var_95: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RiskRating {
    A,
    B,
    C,
    D,
    F,
}

/// Banded rating from `(sharpe, max_drawdown_est, portfolio_vol,
/// risk_score)` (spec.md §4.6). Thresholds are a fixed table, not
/// configuration, mirroring `base_vol_strategy` above.
pub fn rate_portfolio(sharpe: f64, max_drawdown_est: f64, portfolio_vol: f64, risk_score: f64) -> RiskRating {
    let points = (sharpe.clamp(-2.0, 3.0) * 20.0) - (max_drawdown_est * 100.0) - (portfolio_vol * 100.0) - (risk_score * 0.5);
    if points >= 50.0 {
        RiskRating::A
    } else if points >= 30.0 {
        RiskRating::B
    } else if points >= 10.0 {
        RiskRating::C
    } else if points >= -10.0 {
        RiskRating::D
    } else {
        RiskRating::F
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PortfolioRisk {
    pub portfolio_vol: f64,
    pub var_95: f64,
    pub var_99: f64,
    pub concentration_herfindahl: f64,
    pub diversification_ratio: f64,
    pub risk_parity_score: f64,
    pub rating: Option<RiskRating>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LimitBreach {
    pub limit: String,
    pub detail: String,
}

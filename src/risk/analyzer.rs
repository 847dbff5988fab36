//! Risk Analyzer (C6, spec.md §4.6): evaluates a candidate allocation
//! vector over an opportunity set — volatility, VaR, concentration,
//! diversification, risk-parity, half-Kelly sizing, and stress tests.

use super::model::{
    base_vol_strategy, default_correlation, market_beta, rate_portfolio, LimitBreach, PortfolioRisk, StressResult, StressScenario,
};
use crate::config::RiskConfig;
use crate::opportunity::{Opportunity, Strategy};
use nalgebra::{DMatrix, DVector};

/// Per-position volatility (spec.md §4.6): base strategy vol scaled by a
/// leverage proxy (market beta here, since these detectors don't carry
/// explicit leverage) and a liquidity penalty that grows as position size
/// approaches the leg's available depth.
pub fn position_vol(opp: &Opportunity, capital_usd: f64, weight: f64) -> f64 {
    let leverage = 1.0 + market_beta(opp.strategy);
    let position_notional = weight * capital_usd;
    let liquidity_penalty = if opp.liquidity_usd > 0.0 { 1.0 + (position_notional / opp.liquidity_usd).min(1.0) } else { 2.0 };
    base_vol_strategy(opp.strategy) * leverage * liquidity_penalty
}

pub fn correlation_matrix(opportunities: &[Opportunity]) -> DMatrix<f64> {
    let n = opportunities.len();
    let c = default_correlation(n);
    DMatrix::from_fn(n, n, |i, j| c[i][j])
}

pub fn portfolio_variance(weights: &[f64], vols: &[f64], correlation: &DMatrix<f64>) -> f64 {
    let n = weights.len();
    if n == 0 {
        return 0.0;
    }
    let x = DVector::from_row_slice(weights);
    let sigma = DVector::from_row_slice(vols);
    let cov = DMatrix::from_fn(n, n, |i, j| sigma[i] * correlation[(i, j)] * sigma[j]);
    (x.transpose() * cov * x)[(0, 0)].max(0.0)
}

pub fn herfindahl(weights: &[f64]) -> f64 {
    weights.iter().map(|w| w * w).sum()
}

pub fn diversification_ratio(weights: &[f64], vols: &[f64], portfolio_vol: f64) -> f64 {
    if portfolio_vol <= 0.0 {
        return 1.0;
    }
    let weighted_vol_sum: f64 = weights.iter().zip(vols).map(|(w, v)| w * v).sum();
    weighted_vol_sum / portfolio_vol
}

pub fn risk_parity_score(weights: &[f64], vols: &[f64], correlation: &DMatrix<f64>) -> f64 {
    let n = weights.len();
    if n == 0 {
        return 1.0;
    }
    let sigma = DVector::from_row_slice(vols);
    let c_sigma = correlation * &sigma;
    let marginal: Vec<f64> = (0..n).map(|i| weights[i] * c_sigma[i]).collect();
    let mean = marginal.iter().sum::<f64>() / n as f64;
    if mean.abs() < 1e-12 {
        return 1.0;
    }
    let var = marginal.iter().map(|m| (m - mean).powi(2)).sum::<f64>() / n as f64;
    (1.0 - var.sqrt() / mean.abs()).clamp(-1.0, 1.0)
}

/// Half-Kelly position size (spec.md §4.6): `f* = (mu - r_f) / sigma^2`
/// capped at `kelly_cap`, then taken against the per-strategy allocation
/// cap and the leg-liquidity cap.
pub fn half_kelly_weight(opp: &Opportunity, sigma: f64, capital_usd: f64, cfg: &RiskConfig) -> f64 {
    if sigma <= 0.0 {
        return 0.0;
    }
    let kelly_full = (opp.expected_return - cfg.risk_free_rate) / (sigma * sigma);
    let kelly_capped = kelly_full.clamp(0.0, cfg.kelly_cap);
    let half = kelly_capped / 2.0;
    let liquidity_cap = liquidity_cap_weight(opp, capital_usd, cfg.liquidity_factor);
    half.min(cfg.max_strategy_allocation).min(liquidity_cap)
}

pub fn liquidity_cap_weight(opp: &Opportunity, capital_usd: f64, liquidity_factor: f64) -> f64 {
    if capital_usd <= 0.0 {
        return 0.0;
    }
    (opp.liquidity_usd * liquidity_factor) / capital_usd
}

/// VaR at 95%/99% confidence, parametric normal (spec.md §4.6).
pub fn value_at_risk(z_alpha: f64, portfolio_vol: f64, capital_usd: f64) -> f64 {
    z_alpha * portfolio_vol * capital_usd
}

pub fn analyze(
    opportunities: &[Opportunity],
    weights: &[f64],
    capital_usd: f64,
    cfg: &RiskConfig,
    sharpe_hint: Option<f64>,
) -> PortfolioRisk {
    let vols: Vec<f64> = opportunities
        .iter()
        .zip(weights)
        .map(|(opp, w)| position_vol(opp, capital_usd, *w))
        .collect();
    let correlation = correlation_matrix(opportunities);
    let portfolio_vol = portfolio_variance(weights, &vols, &correlation).sqrt();
    let var_95 = value_at_risk(cfg.var_confidence_95, portfolio_vol, capital_usd);
    let var_99 = value_at_risk(cfg.var_confidence_99, portfolio_vol, capital_usd);
    let concentration_herfindahl = herfindahl(weights);
    let diversification_ratio = diversification_ratio(weights, &vols, portfolio_vol);
    let risk_parity_score = risk_parity_score(weights, &vols, &correlation);

    let avg_risk_score = if opportunities.is_empty() {
        0.0
    } else {
        opportunities.iter().map(|o| o.risk_score).sum::<f64>() / opportunities.len() as f64
    };
    let sharpe = sharpe_hint.unwrap_or_else(|| {
        let avg_return = opportunities.iter().zip(weights).map(|(o, w)| o.expected_return * w).sum::<f64>();
        if portfolio_vol > 0.0 { (avg_return - cfg.risk_free_rate) / portfolio_vol } else { 0.0 }
    });
    let max_drawdown_est = var_99 / capital_usd.max(1.0);
    let rating = Some(rate_portfolio(sharpe, max_drawdown_est, portfolio_vol, avg_risk_score));

    PortfolioRisk { portfolio_vol, var_95, var_99, concentration_herfindahl, diversification_ratio, risk_parity_score, rating }
}

/// Limit checks from spec.md §4.6. Returns every breach found, empty
/// means the allocation is compliant.
pub fn check_limits(risk: &PortfolioRisk, opportunities: &[Opportunity], weights: &[f64], capital_usd: f64, cfg: &RiskConfig) -> Vec<LimitBreach> {
    let mut breaches = Vec::new();

    if risk.var_95 / capital_usd.max(1.0) > cfg.max_portfolio_var_pct {
        breaches.push(LimitBreach {
            limit: "max_portfolio_var_pct".into(),
            detail: format!("var_95/capital = {:.4} > {:.4}", risk.var_95 / capital_usd.max(1.0), cfg.max_portfolio_var_pct),
        });
    }

    let mut by_strategy: std::collections::HashMap<Strategy, f64> = std::collections::HashMap::new();
    for (opp, w) in opportunities.iter().zip(weights) {
        *by_strategy.entry(opp.strategy).or_insert(0.0) += w;
    }
    for (strategy, total) in &by_strategy {
        if *total > cfg.max_strategy_allocation {
            breaches.push(LimitBreach {
                limit: "max_strategy_allocation".into(),
                detail: format!("{:?} allocation {:.4} > {:.4}", strategy, total, cfg.max_strategy_allocation),
            });
        }
    }

    if risk.diversification_ratio < cfg.min_diversification_ratio && weights.len() > 1 {
        breaches.push(LimitBreach {
            limit: "min_diversification_ratio".into(),
            detail: format!("{:.4} < {:.4}", risk.diversification_ratio, cfg.min_diversification_ratio),
        });
    }

    let concentration_pct = risk.concentration_herfindahl * 100.0;
    if concentration_pct > cfg.max_concentration {
        breaches.push(LimitBreach {
            limit: "max_concentration".into(),
            detail: format!("{:.2} > {:.2}", concentration_pct, cfg.max_concentration),
        });
    }

    breaches
}

/// Apply a stress scenario to a weighted book and report the PnL impact
/// and resulting VaR95 (spec.md §4.6's closed scenario set).
pub fn stress_test(opportunities: &[Opportunity], weights: &[f64], capital_usd: f64, cfg: &RiskConfig, scenario: StressScenario) -> StressResult {
    let pnl_impact = match scenario {
        StressScenario::MarketCrash => {
            let shocked_return: f64 = opportunities.iter().zip(weights).map(|(o, w)| (o.expected_return - 0.20) * w).sum();
            shocked_return * capital_usd
        }
        StressScenario::LiquidityCrisis => {
            let shocked_return: f64 = opportunities.iter().zip(weights).map(|(o, w)| (o.expected_return - 0.05) * w).sum();
            shocked_return * capital_usd
        }
        StressScenario::FundingReversal => {
            let shocked_return: f64 = opportunities
                .iter()
                .zip(weights)
                .map(|(o, w)| {
                    let r = if o.strategy == Strategy::Funding { -o.expected_return } else { o.expected_return };
                    r * w
                })
                .sum();
            shocked_return * capital_usd
        }
        StressScenario::WorstCase => {
            let crash = stress_test(opportunities, weights, capital_usd, cfg, StressScenario::MarketCrash).pnl_impact;
            let liquidity = stress_test(opportunities, weights, capital_usd, cfg, StressScenario::LiquidityCrisis).pnl_impact;
            let funding = stress_test(opportunities, weights, capital_usd, cfg, StressScenario::FundingReversal).pnl_impact;
            crash.min(liquidity).min(funding)
        }
    };

    let correlation = match scenario {
        StressScenario::MarketCrash | StressScenario::WorstCase => DMatrix::from_element(opportunities.len(), opportunities.len(), 1.0),
        _ => correlation_matrix(opportunities),
    };
    let slippage_bump = if matches!(scenario, StressScenario::LiquidityCrisis | StressScenario::WorstCase) { 0.05 } else { 0.0 };
    let vols: Vec<f64> =
        opportunities.iter().zip(weights).map(|(opp, w)| position_vol(opp, capital_usd, *w) * (1.0 + slippage_bump)).collect();
    let portfolio_vol = portfolio_variance(weights, &vols, &correlation).sqrt();
    let resulting_var_95 = value_at_risk(cfg.var_confidence_95, portfolio_vol, capital_usd);

    StressResult { scenario, pnl_impact, resulting_var_95 }
}

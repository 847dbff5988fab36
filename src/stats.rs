//! Streaming/closed-form statistics used by the statistical-pairs and
//! delta-neutral detectors and the risk analyzer.
//!
//! spec.md §9 calls out "dataframe-centric statistical math" in the source
//! as needing re-architecture into "explicit streaming computations over
//! the pinned price series: rolling mean/std, OLS regression on two
//! aligned series, Engle-Granger residual stationarity test." This module
//! is exactly that: no dataframe dependency, plain slices in, scalars out.

use statrs::distribution::{ContinuousCDF, Normal};

/// Rolling (population) mean and standard deviation over the trailing
/// `window` samples of `series`. Returns `None` if fewer than `window`
/// samples are available.
pub fn rolling_mean_std(series: &[f64], window: usize) -> Option<(f64, f64)> {
    if series.len() < window || window == 0 {
        return None;
    }
    let slice = &series[series.len() - window..];
    let mean = slice.iter().sum::<f64>() / window as f64;
    let var = slice.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / window as f64;
    Some((mean, var.sqrt()))
}

pub fn z_score(last: f64, mean: f64, std: f64) -> f64 {
    if std <= 0.0 {
        0.0
    } else {
        (last - mean) / std
    }
}

/// Simple OLS regression of `y` on `x`: `y = alpha + beta * x + residual`.
/// Returns `(alpha, beta, residuals)`.
pub fn ols_regress(y: &[f64], x: &[f64]) -> Option<(f64, f64, Vec<f64>)> {
    let n = y.len();
    if n == 0 || n != x.len() {
        return None;
    }
    let x_mean = x.iter().sum::<f64>() / n as f64;
    let y_mean = y.iter().sum::<f64>() / n as f64;
    let mut cov = 0.0;
    let mut var_x = 0.0;
    for i in 0..n {
        cov += (x[i] - x_mean) * (y[i] - y_mean);
        var_x += (x[i] - x_mean).powi(2);
    }
    if var_x <= 0.0 {
        return None;
    }
    let beta = cov / var_x;
    let alpha = y_mean - beta * x_mean;
    let residuals: Vec<f64> = (0..n).map(|i| y[i] - alpha - beta * x[i]).collect();
    Some((alpha, beta, residuals))
}

/// Engle-Granger-style residual stationarity test: regress the residual
/// series on its own first lag (`e_t = rho * e_{t-1} + u_t`) and return an
/// approximate p-value for rejecting the unit-root null `rho = 1` via a
/// normal approximation of the Dickey-Fuller statistic. This is a
/// simplified, dependency-light stand-in for the tabulated
/// Engle-Granger/MacKinnon critical values: adequate for ranking pairs by
/// evidence of cointegration, not for publishing an exact test statistic.
pub fn engle_granger_p_value(residuals: &[f64]) -> Option<f64> {
    if residuals.len() < 3 {
        return None;
    }
    let lagged = &residuals[..residuals.len() - 1];
    let current = &residuals[1..];
    // Delta_e_t = (rho - 1) * e_{t-1} + u_t
    let deltas: Vec<f64> = current.iter().zip(lagged.iter()).map(|(c, l)| c - l).collect();
    let (_, phi, du_residuals) = ols_regress(&deltas, lagged)?;
    let n = du_residuals.len() as f64;
    let se = {
        let sse: f64 = du_residuals.iter().map(|r| r * r).sum();
        let var_lag: f64 = {
            let mean = lagged.iter().sum::<f64>() / lagged.len() as f64;
            lagged.iter().map(|x| (x - mean).powi(2)).sum::<f64>()
        };
        if var_lag <= 0.0 {
            return None;
        }
        (sse / (n - 2.0) / var_lag).sqrt()
    };
    if se <= 0.0 {
        return None;
    }
    let t_stat = phi / se;
    // More negative t_stat => stronger evidence against the unit root
    // (phi < 0 means mean reversion). Approximate with a standard normal
    // one-sided tail; real Dickey-Fuller critical values are more negative
    // than the normal's, so this is conservative in flagging cointegration.
    let normal = Normal::new(0.0, 1.0).ok()?;
    Some(normal.cdf(t_stat))
}

/// Pearson correlation coefficient between two equal-length series.
pub fn pearson_correlation(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n < 2 {
        return 0.0;
    }
    let a = &a[..n];
    let b = &b[..n];
    let mean_a = a.iter().sum::<f64>() / n as f64;
    let mean_b = b.iter().sum::<f64>() / n as f64;
    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for i in 0..n {
        let da = a[i] - mean_a;
        let db = b[i] - mean_b;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }
    if var_a <= 0.0 || var_b <= 0.0 {
        return 0.0;
    }
    cov / (var_a.sqrt() * var_b.sqrt())
}

/// Saturating normalization `x -> x / (1 + |x|)`, used by the composite
/// score (spec.md §4.4) to bound unbounded ratios into `(-1, 1)`.
pub fn saturating_normalize(x: f64) -> f64 {
    x / (1.0 + x.abs())
}

/// Autocorrelation at `lag`, used to estimate a mean-reversion half-life
/// for basis series (spec.md §4.3.3: "half-life estimated from
/// autocorrelation of historical basis").
pub fn autocorrelation(series: &[f64], lag: usize) -> Option<f64> {
    if series.len() <= lag + 1 {
        return None;
    }
    let a = &series[..series.len() - lag];
    let b = &series[lag..];
    Some(pearson_correlation(a, b))
}

/// Half-life in samples from a lag-1 autocorrelation, assuming an AR(1)
/// mean-reverting process: `half_life = ln(0.5) / ln(rho)`.
pub fn half_life_from_autocorrelation(rho: f64) -> Option<f64> {
    if rho <= 0.0 || rho >= 1.0 {
        return None;
    }
    Some((0.5f64).ln() / rho.ln())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rolling_mean_std_matches_hand_computation() {
        let series = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let (mean, std) = rolling_mean_std(&series, 5).unwrap();
        assert!((mean - 3.0).abs() < 1e-9);
        assert!((std - 2f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn rolling_mean_std_none_when_insufficient_samples() {
        assert!(rolling_mean_std(&[1.0, 2.0], 5).is_none());
    }

    #[test]
    fn ols_regress_recovers_known_linear_relation() {
        let x: Vec<f64> = (0..50).map(|i| i as f64).collect();
        let y: Vec<f64> = x.iter().map(|v| 2.0 * v + 1.0).collect();
        let (alpha, beta, residuals) = ols_regress(&y, &x).unwrap();
        assert!((alpha - 1.0).abs() < 1e-6);
        assert!((beta - 2.0).abs() < 1e-6);
        assert!(residuals.iter().all(|r| r.abs() < 1e-6));
    }

    #[test]
    fn pearson_correlation_of_identical_series_is_one() {
        let a = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        assert!((pearson_correlation(&a, &a) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn saturating_normalize_bounds_extremes() {
        assert!(saturating_normalize(1e9) < 1.0);
        assert!(saturating_normalize(-1e9) > -1.0);
        assert_eq!(saturating_normalize(0.0), 0.0);
    }

    #[test]
    fn half_life_positive_for_mean_reverting_rho() {
        let hl = half_life_from_autocorrelation(0.9).unwrap();
        assert!(hl > 0.0);
    }
}

//! Optional `MLOracle` port (§6.1): may supplement detectors with
//! short-horizon spread/timing predictions. Absent oracle => detectors
//! proceed with defaults; this is deliberately not a hard dependency, so
//! it is threaded through detectors as `Option<&dyn MLOracle>`.

use async_trait::async_trait;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub value: f64,
    pub confidence: f64,
}

#[async_trait]
pub trait MLOracle: Send + Sync {
    async fn predict(&self, features: &[f64]) -> Option<Prediction>;
}

/// No-op oracle used when no `MLOracle` is configured; detectors treat its
/// absence identically to a `None` prediction.
pub struct NullOracle;

#[async_trait]
impl MLOracle for NullOracle {
    async fn predict(&self, _features: &[f64]) -> Option<Prediction> {
        None
    }
}

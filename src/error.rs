//! Error taxonomy for the scan pipeline.
//!
//! Mirrors the kinds in spec.md §7. `StaleData` and `Anomaly` are not part
//! of this enum: they are non-fatal and carried as annotations on the
//! value they describe (see [`crate::market_data::cache::Annotated`])
//! rather than surfaced as an error.

use std::fmt;

pub type DynError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Clone, PartialEq)]
pub enum ScanError {
    /// Upstream read failed after retries and is beyond the stale-fallback bound.
    DataUnavailable { source: String, key: String },
    /// Malformed snapshot or configuration; fatal to the scan.
    InvalidInput(String),
    /// Per-stage or scan-total deadline exceeded.
    DeadlineExceeded { stage: String },
    /// Caller requested cancellation.
    Cancelled,
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanError::DataUnavailable { source, key } => {
                write!(f, "data unavailable: source={source} key={key}")
            }
            ScanError::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            ScanError::DeadlineExceeded { stage } => write!(f, "deadline exceeded at stage {stage}"),
            ScanError::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::error::Error for ScanError {}

pub type ScanResult<T> = Result<T, ScanError>;

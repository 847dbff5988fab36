//! Strategy detectors (C3, spec.md §4.3). Each detector is pure with
//! respect to the pinned snapshot: same snapshot and config always yield
//! the same raw opportunities, with no I/O of its own.

pub mod cross_fiat;
pub mod delta_neutral;
pub mod funding;
pub mod spot_p2p;
pub mod stat_arb;
pub mod triangle;

use crate::config::EngineConfig;
use crate::market_data::Snapshot;
use crate::ml_oracle::MLOracle;
use crate::opportunity::RawOpportunity;
use async_trait::async_trait;

/// Shared contract every strategy detector implements. `scan` never fails:
/// a detector that cannot produce anything for this snapshot returns an
/// empty vector (spec.md §7 "a detector's failure degrades its
/// contribution to an empty list"). Async only so detectors may
/// optionally consult an `MLOracle`; every detector here is otherwise
/// CPU-bound over the pinned snapshot and never touches the gateway.
#[async_trait]
pub trait Detector: Send + Sync {
    fn name(&self) -> &'static str;

    async fn scan(&self, snapshot: &Snapshot, config: &EngineConfig, oracle: Option<&dyn MLOracle>) -> Vec<RawOpportunity>;
}

pub fn all_detectors() -> Vec<Box<dyn Detector>> {
    vec![
        Box::new(funding::FundingDetector),
        Box::new(stat_arb::StatArbDetector),
        Box::new(delta_neutral::DeltaNeutralDetector),
        Box::new(triangle::TriangleDetector),
        Box::new(spot_p2p::SpotP2PDetector),
        Box::new(cross_fiat::CrossFiatDetector),
    ]
}

//! Unified opportunity record (spec.md §3.2): the common shape every
//! strategy detector's native output is mapped onto by the normalizer.
//!
//! The teacher's detector output (`ArbitrageOpportunity` in
//! `strategy/types.rs`) is a single flat struct hardcoded to one strategy
//! (cross-exchange spot/perp spread). Per spec.md §9's first redesign
//! note, that dynamic-bag-of-fields shape becomes a tagged variant here:
//! each detector still emits whatever native record fits its signal, but
//! every one of them is expressed as a `Leg` sequence plus strategy-neutral
//! fields so the normalizer can flatten all six into one `Opportunity`.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Strategy {
    Funding,
    StatArb,
    DeltaNeutral,
    Triangle,
    SpotP2p,
    CrossFiat,
}

impl Strategy {
    pub const ALL: [Strategy; 6] = [
        Strategy::Funding,
        Strategy::StatArb,
        Strategy::DeltaNeutral,
        Strategy::Triangle,
        Strategy::SpotP2p,
        Strategy::CrossFiat,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Funding => "FUNDING",
            Strategy::StatArb => "STAT_ARB",
            Strategy::DeltaNeutral => "DELTA_NEUTRAL",
            Strategy::Triangle => "TRIANGLE",
            Strategy::SpotP2p => "SPOT_P2P",
            Strategy::CrossFiat => "CROSS_FIAT",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Venue {
    Spot,
    Perp,
    P2p,
    FiatRail,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Action {
    Buy,
    Sell,
    Borrow,
    Repay,
    Transfer,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Leg {
    pub venue: Venue,
    pub action: Action,
    pub symbol: String,
    pub size: f64,
    pub price: f64,
    pub notes: String,
}

impl Leg {
    /// Signed notional, positive for legs that increase long exposure to
    /// the underlying (`Buy`/`Repay`... `Sell`/`Borrow` are negative).
    pub fn signed_notional(&self) -> f64 {
        let sign = match self.action {
            Action::Buy | Action::Repay => 1.0,
            Action::Sell | Action::Borrow => -1.0,
            Action::Transfer => 0.0,
        };
        sign * self.size * self.price
    }

    pub fn notional(&self) -> f64 {
        self.size * self.price
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Priority {
    High,
    Med,
    Low,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Recommendation {
    StrongBuy,
    Buy,
    Hold,
    Avoid,
}

/// Execution-method annotation. Everything other than `SpotP2p` is assumed
/// fully automatable; P2P legs have no official execution API (spec.md
/// §4.3.5 / Non-goals: "P2P is signal-only; execution is assumed manual").
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Execution {
    Automated,
    SemiManual,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Opportunity {
    pub id: String,
    pub strategy: Strategy,
    pub legs: SmallVec<[Leg; 4]>,
    pub expected_return: f64,
    pub expected_apy: Option<f64>,
    pub horizon_secs: u64,
    pub risk_score: f64,
    pub confidence: f64,
    pub sharpe: Option<f64>,
    pub liquidity_usd: f64,
    pub slippage_est: f64,
    pub fees_est: f64,
    pub score: f64,
    pub priority: Priority,
    pub recommendation: Recommendation,
    pub fingerprint: u64,
    pub created_at_ms: u64,
    pub ttl_secs: u64,
    pub execution: Execution,
}

impl Opportunity {
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.created_at_ms) > self.ttl_secs.saturating_mul(1000)
    }

    /// Delta-neutral closure check (spec.md §3.2/§8.1): net signed notional
    /// per underlying within `epsilon` of zero, relative to gross notional.
    pub fn is_delta_neutral(&self, epsilon: f64) -> bool {
        let mut by_underlying: std::collections::HashMap<&str, f64> = std::collections::HashMap::new();
        let mut gross = 0.0;
        for leg in &self.legs {
            *by_underlying.entry(leg.symbol.as_str()).or_insert(0.0) += leg.signed_notional();
            gross += leg.notional();
        }
        if gross <= 0.0 {
            return true;
        }
        by_underlying.values().all(|v| v.abs() <= epsilon * gross)
    }

    /// Cycle closure check (spec.md §3.2/§8.1) for TRIANGLE/CROSS_FIAT:
    /// first leg's source == last leg's destination. We encode that as the
    /// first leg's `symbol` base asset matching the last leg's quote asset,
    /// parsed from the conventional `BASE/QUOTE` leg symbol.
    pub fn is_closed_cycle(&self) -> bool {
        let (Some(first), Some(last)) = (self.legs.first(), self.legs.last()) else {
            return true;
        };
        let first_src = first.symbol.split('/').next().unwrap_or("");
        let last_dst = last.symbol.split('/').nth(1).unwrap_or(last.symbol.as_str());
        first_src == last_dst
    }
}

/// Native record produced by a detector (§4.3), consumed by the normalizer
/// (§4.4). Carries the detector's raw, gross-of-cost numbers; the
/// normalizer is the only place `expected_return`/`risk_score` on the final
/// `Opportunity` get computed, so every detector reports the same shape of
/// "before netting" facts instead of doing that math six different ways.
#[derive(Debug, Clone)]
pub struct RawOpportunity {
    pub strategy: Strategy,
    pub legs: SmallVec<[Leg; 4]>,
    /// Return before `fees_est`/`slippage_est` are subtracted.
    pub gross_return: f64,
    pub fees_est: f64,
    pub slippage_est: f64,
    pub expected_apy: Option<f64>,
    pub horizon_secs: u64,
    /// Strategy-native risk unit, `0..100`, before the strategy risk-weight
    /// multiplier (§4.4 "fixed table `risk_weights[strategy]`") is applied.
    pub risk_native: f64,
    /// `None` means "no history available"; the normalizer defaults this
    /// to 50 per §4.4.
    pub confidence: Option<f64>,
    pub sharpe: Option<f64>,
    pub liquidity_usd: f64,
    pub ttl_secs: u64,
    pub execution: Execution,
    pub created_at_ms: u64,
}

pub fn priority_from_score(score: f64) -> Priority {
    if score >= 75.0 {
        Priority::High
    } else if score >= 50.0 {
        Priority::Med
    } else {
        Priority::Low
    }
}

/// Deterministic recommendation function of (score, risk_score, confidence)
/// (spec.md §4.4).
pub fn recommendation_from(score: f64, risk_score: f64, confidence: f64) -> Recommendation {
    if score >= 80.0 && confidence >= 70.0 && risk_score <= 40.0 {
        Recommendation::StrongBuy
    } else if score >= 60.0 {
        Recommendation::Buy
    } else if score >= 40.0 {
        Recommendation::Hold
    } else {
        Recommendation::Avoid
    }
}

/// Stable fingerprint over `(strategy, normalized leg tuple, rounded
/// notional bucket)` (spec.md §4.4), used by the ranker/optimizer for
/// cross-scan dedup. Bucketing notional to the nearest $100 means two
/// near-identical re-detections of the same opportunity across
/// overlapping scans collide on purpose.
pub fn fingerprint(strategy: Strategy, legs: &[Leg]) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    strategy.as_str().hash(&mut hasher);
    for leg in legs {
        leg.venue_tag().hash(&mut hasher);
        leg.action_tag().hash(&mut hasher);
        leg.symbol.hash(&mut hasher);
        let bucket = (leg.notional() / 100.0).round() as i64;
        bucket.hash(&mut hasher);
    }
    hasher.finish()
}

impl Leg {
    fn venue_tag(&self) -> u8 {
        match self.venue {
            Venue::Spot => 0,
            Venue::Perp => 1,
            Venue::P2p => 2,
            Venue::FiatRail => 3,
        }
    }

    fn action_tag(&self) -> u8 {
        match self.action {
            Action::Buy => 0,
            Action::Sell => 1,
            Action::Borrow => 2,
            Action::Repay => 3,
            Action::Transfer => 4,
        }
    }
}

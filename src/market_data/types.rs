//! Market snapshot types (spec.md §3.1).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpotTicker {
    pub symbol: String,
    pub bid: f64,
    pub ask: f64,
    pub last: f64,
    pub volume_24h: f64,
    pub timestamp_ms: u64,
}

impl SpotTicker {
    pub fn is_valid(&self) -> bool {
        self.bid > 0.0 && self.ask > 0.0 && self.bid <= self.ask
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct L2Level {
    pub price: f64,
    pub size: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderBookLevel2 {
    pub symbol: String,
    /// Descending price.
    pub bids: Vec<L2Level>,
    /// Ascending price.
    pub asks: Vec<L2Level>,
    pub timestamp_ms: u64,
}

impl OrderBookLevel2 {
    pub fn is_monotone(&self) -> bool {
        self.bids.windows(2).all(|w| w[0].price >= w[1].price)
            && self.asks.windows(2).all(|w| w[0].price <= w[1].price)
    }

    /// Total USD-equivalent notional available on the given side up to the
    /// configured depth.
    pub fn liquidity_usd(&self, side_asks: bool) -> f64 {
        let levels = if side_asks { &self.asks } else { &self.bids };
        levels.iter().map(|l| l.price * l.size).sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FundingRateSample {
    pub symbol: String,
    pub funding_rate: f64,
    pub next_funding_time_ms: u64,
    pub mark_price: f64,
    pub index_price: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ExpiryOrPerp {
    Perpetual,
    Dated { expiry_ms: u64 },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FuturesBasis {
    pub symbol: String,
    pub spot_price: f64,
    pub futures_price: f64,
    pub expiry_or_perp: ExpiryOrPerp,
}

impl FuturesBasis {
    pub fn basis(&self) -> f64 {
        (self.futures_price - self.spot_price) / self.spot_price
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum P2PSide {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct P2PAd {
    pub asset: String,
    pub fiat: String,
    pub side: P2PSide,
    pub price: f64,
    pub min_qty: f64,
    pub max_qty: f64,
    pub merchant_score: f64,
    pub completed_trades: u64,
    pub payment_methods: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FiatSourceKind {
    Official,
    MarketDataProvider,
    CachedFallback,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FiatRate {
    pub base: String,
    pub quote: String,
    pub rate: f64,
    pub source: FiatSourceKind,
    pub timestamp_ms: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PricePoint {
    pub close: f64,
    pub timestamp_ms: u64,
}

/// The fixed view of market data a single scan reads from (spec.md §3.1 /
/// §5 "Ordering guarantees"): pinned at `t0`, every detector in a scan
/// reads from the same instance so no cross-source drift is possible
/// inside one opportunity.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub pinned_at_ms: u64,
    pub spot: HashMap<String, SpotTicker>,
    pub orderbooks: HashMap<String, OrderBookLevel2>,
    pub funding: HashMap<String, FundingRateSample>,
    pub funding_history: HashMap<String, Vec<FundingRateSample>>,
    pub basis: HashMap<String, FuturesBasis>,
    pub basis_history: HashMap<String, Vec<f64>>,
    pub p2p: HashMap<(String, String), Vec<P2PAd>>,
    pub fiat: HashMap<(String, String), FiatRate>,
    pub price_history: HashMap<String, Vec<PricePoint>>,
}

impl Snapshot {
    pub fn is_empty(&self) -> bool {
        self.spot.is_empty()
            && self.orderbooks.is_empty()
            && self.funding.is_empty()
            && self.basis.is_empty()
            && self.p2p.is_empty()
            && self.fiat.is_empty()
            && self.price_history.is_empty()
    }
}

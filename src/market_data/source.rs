//! `MarketDataSource` port (spec.md §6.1): the capability set collaborators
//! implement to feed the gateway. Every operation is an idempotent read
//! with a deadline; errors map to the `NotFound | Unavailable | RateLimited
//! | Invalid` kinds spec.md names at this boundary (collapsed, at the
//! gateway, into `ScanError::DataUnavailable` / `ScanError::InvalidInput`).
//!
//! Grounded in the teacher's per-venue connectors (`src/binance.rs`,
//! `src/bybit.rs`, ...), which all share the same "HTTP GET this venue's
//! endpoint, deserialize, map into our domain type" shape; here that shape
//! is pulled up into one trait instead of duplicated per venue.

use super::types::*;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    NotFound,
    Unavailable,
    RateLimited,
    Invalid(String),
}

pub type SourceResult<T> = Result<T, SourceError>;

#[async_trait]
pub trait MarketDataSource: Send + Sync {
    async fn spot_ticker(&self, symbol: &str) -> SourceResult<SpotTicker>;
    async fn orderbook(&self, symbol: &str, depth: usize) -> SourceResult<OrderBookLevel2>;
    async fn funding_rates(&self) -> SourceResult<Vec<FundingRateSample>>;
    async fn futures_basis(&self, symbol: &str) -> SourceResult<FuturesBasis>;
    async fn p2p_ads(&self, asset: &str, fiat: &str, side: P2PSide) -> SourceResult<Vec<P2PAd>>;
    async fn fiat_rate(&self, base: &str, quote: &str) -> SourceResult<FiatRate>;
    async fn price_history(&self, symbol: &str, window: usize) -> SourceResult<Vec<PricePoint>>;
}

/// Fixture/in-memory source: the default used by tests and the `scan`
/// binary. Modeled on the teacher's `InMemoryConfigStorage`
/// (`strategy/config_storage.rs`): a stub that satisfies the trait from
/// data already resident in memory rather than a real upstream call.
#[derive(Default)]
pub struct StaticMarketDataSource {
    pub spot: RwLock<HashMap<String, SpotTicker>>,
    pub orderbooks: RwLock<HashMap<String, OrderBookLevel2>>,
    pub funding: RwLock<Vec<FundingRateSample>>,
    pub basis: RwLock<HashMap<String, FuturesBasis>>,
    pub p2p: RwLock<HashMap<(String, String, P2PSideKey), Vec<P2PAd>>>,
    pub fiat: RwLock<HashMap<(String, String), FiatRate>>,
    pub price_history: RwLock<HashMap<String, Vec<PricePoint>>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum P2PSideKey {
    Buy,
    Sell,
}

impl From<P2PSide> for P2PSideKey {
    fn from(s: P2PSide) -> Self {
        match s {
            P2PSide::Buy => P2PSideKey::Buy,
            P2PSide::Sell => P2PSideKey::Sell,
        }
    }
}

impl StaticMarketDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_spot(self, ticker: SpotTicker) -> Self {
        self.spot.write().unwrap().insert(ticker.symbol.clone(), ticker);
        self
    }

    pub fn with_orderbook(self, book: OrderBookLevel2) -> Self {
        self.orderbooks.write().unwrap().insert(book.symbol.clone(), book);
        self
    }

    pub fn with_funding(self, sample: FundingRateSample) -> Self {
        self.funding.write().unwrap().push(sample);
        self
    }

    pub fn with_basis(self, basis: FuturesBasis) -> Self {
        self.basis.write().unwrap().insert(basis.symbol.clone(), basis);
        self
    }

    pub fn with_p2p_ads(self, asset: &str, fiat: &str, side: P2PSide, ads: Vec<P2PAd>) -> Self {
        self.p2p
            .write()
            .unwrap()
            .insert((asset.to_string(), fiat.to_string(), side.into()), ads);
        self
    }

    pub fn with_fiat(self, rate: FiatRate) -> Self {
        self.fiat
            .write()
            .unwrap()
            .insert((rate.base.clone(), rate.quote.clone()), rate);
        self
    }

    pub fn with_price_history(self, symbol: &str, points: Vec<PricePoint>) -> Self {
        self.price_history.write().unwrap().insert(symbol.to_string(), points);
        self
    }
}

#[async_trait]
impl MarketDataSource for StaticMarketDataSource {
    async fn spot_ticker(&self, symbol: &str) -> SourceResult<SpotTicker> {
        self.spot.read().unwrap().get(symbol).cloned().ok_or(SourceError::NotFound)
    }

    async fn orderbook(&self, symbol: &str, depth: usize) -> SourceResult<OrderBookLevel2> {
        let mut book = self
            .orderbooks
            .read()
            .unwrap()
            .get(symbol)
            .cloned()
            .ok_or(SourceError::NotFound)?;
        book.bids.truncate(depth);
        book.asks.truncate(depth);
        Ok(book)
    }

    async fn funding_rates(&self) -> SourceResult<Vec<FundingRateSample>> {
        Ok(self.funding.read().unwrap().clone())
    }

    async fn futures_basis(&self, symbol: &str) -> SourceResult<FuturesBasis> {
        self.basis.read().unwrap().get(symbol).cloned().ok_or(SourceError::NotFound)
    }

    async fn p2p_ads(&self, asset: &str, fiat: &str, side: P2PSide) -> SourceResult<Vec<P2PAd>> {
        Ok(self
            .p2p
            .read()
            .unwrap()
            .get(&(asset.to_string(), fiat.to_string(), side.into()))
            .cloned()
            .unwrap_or_default())
    }

    async fn fiat_rate(&self, base: &str, quote: &str) -> SourceResult<FiatRate> {
        self.fiat
            .read()
            .unwrap()
            .get(&(base.to_string(), quote.to_string()))
            .cloned()
            .ok_or(SourceError::NotFound)
    }

    async fn price_history(&self, symbol: &str, window: usize) -> SourceResult<Vec<PricePoint>> {
        let history = self.price_history.read().unwrap();
        let points = history.get(symbol).ok_or(SourceError::NotFound)?;
        let start = points.len().saturating_sub(window);
        Ok(points[start..].to_vec())
    }
}

/// Responder used to keep `RestMarketDataSource` generic over venues
/// without guessing at any specific wire format (spec.md §6.4: venue wire
/// formats are irrelevant to the core). A real deployment supplies a
/// per-venue implementation; tests supply an in-memory mock.
#[async_trait]
pub trait RestResponder: Send + Sync {
    async fn get_json(&self, url: &str) -> Result<serde_json::Value, String>;
}

/// Default `RestResponder`, backed by a shared `reqwest::Client`. This is
/// the thing a real deployment actually plugs into `RestMarketDataSource`;
/// a venue-specific responder only needs to override request signing or
/// headers, not the JSON round-trip itself.
pub struct HttpResponder {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpResponder {
    pub fn new(timeout: Duration) -> Self {
        Self { client: reqwest::Client::new(), timeout }
    }
}

#[async_trait]
impl RestResponder for HttpResponder {
    async fn get_json(&self, url: &str) -> Result<serde_json::Value, String> {
        self.client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| e.to_string())?
            .json::<serde_json::Value>()
            .await
            .map_err(|e| e.to_string())
    }
}

/// Thin HTTP-backed `MarketDataSource`, grounded in the request/parse shape
/// of the teacher's `binance.rs`/`bybit.rs`/etc. connectors, generalized
/// behind `RestResponder` so this module carries no venue-specific
/// endpoint knowledge.
pub struct RestMarketDataSource<R: RestResponder> {
    responder: R,
    base_url: String,
    timeout: Duration,
}

impl<R: RestResponder> RestMarketDataSource<R> {
    pub fn new(responder: R, base_url: impl Into<String>, timeout: Duration) -> Self {
        Self { responder, base_url: base_url.into(), timeout }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl<R: RestResponder> MarketDataSource for RestMarketDataSource<R> {
    async fn spot_ticker(&self, symbol: &str) -> SourceResult<SpotTicker> {
        let _ = self.timeout;
        let body = self
            .responder
            .get_json(&self.url(&format!("/ticker?symbol={symbol}")))
            .await
            .map_err(|_| SourceError::Unavailable)?;
        parse_spot_ticker(symbol, &body).ok_or_else(|| SourceError::Invalid("spot ticker".into()))
    }

    async fn orderbook(&self, symbol: &str, depth: usize) -> SourceResult<OrderBookLevel2> {
        let body = self
            .responder
            .get_json(&self.url(&format!("/depth?symbol={symbol}&limit={depth}")))
            .await
            .map_err(|_| SourceError::Unavailable)?;
        parse_orderbook(symbol, &body).ok_or_else(|| SourceError::Invalid("orderbook".into()))
    }

    async fn funding_rates(&self) -> SourceResult<Vec<FundingRateSample>> {
        let body = self
            .responder
            .get_json(&self.url("/fundingRate"))
            .await
            .map_err(|_| SourceError::Unavailable)?;
        parse_funding_rates(&body).ok_or_else(|| SourceError::Invalid("funding rates".into()))
    }

    async fn futures_basis(&self, symbol: &str) -> SourceResult<FuturesBasis> {
        let body = self
            .responder
            .get_json(&self.url(&format!("/premiumIndex?symbol={symbol}")))
            .await
            .map_err(|_| SourceError::Unavailable)?;
        parse_basis(symbol, &body).ok_or_else(|| SourceError::Invalid("basis".into()))
    }

    async fn p2p_ads(&self, asset: &str, fiat: &str, side: P2PSide) -> SourceResult<Vec<P2PAd>> {
        let side_str = match side {
            P2PSide::Buy => "BUY",
            P2PSide::Sell => "SELL",
        };
        let body = self
            .responder
            .get_json(&self.url(&format!("/p2p/ads?asset={asset}&fiat={fiat}&side={side_str}")))
            .await
            .map_err(|_| SourceError::Unavailable)?;
        parse_p2p_ads(asset, fiat, side, &body).ok_or_else(|| SourceError::Invalid("p2p ads".into()))
    }

    async fn fiat_rate(&self, base: &str, quote: &str) -> SourceResult<FiatRate> {
        let body = self
            .responder
            .get_json(&self.url(&format!("/fx?base={base}&quote={quote}")))
            .await
            .map_err(|_| SourceError::Unavailable)?;
        parse_fiat_rate(base, quote, &body).ok_or_else(|| SourceError::Invalid("fiat rate".into()))
    }

    async fn price_history(&self, symbol: &str, window: usize) -> SourceResult<Vec<PricePoint>> {
        let body = self
            .responder
            .get_json(&self.url(&format!("/klines?symbol={symbol}&limit={window}")))
            .await
            .map_err(|_| SourceError::Unavailable)?;
        parse_price_history(&body).ok_or_else(|| SourceError::Invalid("price history".into()))
    }
}

fn parse_spot_ticker(symbol: &str, v: &serde_json::Value) -> Option<SpotTicker> {
    Some(SpotTicker {
        symbol: symbol.to_string(),
        bid: v.get("bid")?.as_f64()?,
        ask: v.get("ask")?.as_f64()?,
        last: v.get("last").and_then(|x| x.as_f64()).unwrap_or_default(),
        volume_24h: v.get("volume").and_then(|x| x.as_f64()).unwrap_or_default(),
        timestamp_ms: v.get("ts").and_then(|x| x.as_u64()).unwrap_or_default(),
    })
}

fn parse_orderbook(symbol: &str, v: &serde_json::Value) -> Option<OrderBookLevel2> {
    let parse_levels = |arr: &serde_json::Value| -> Option<Vec<L2Level>> {
        arr.as_array()?
            .iter()
            .map(|lvl| {
                let pair = lvl.as_array()?;
                Some(L2Level { price: pair.first()?.as_f64()?, size: pair.get(1)?.as_f64()? })
            })
            .collect()
    };
    Some(OrderBookLevel2 {
        symbol: symbol.to_string(),
        bids: parse_levels(v.get("bids")?)?,
        asks: parse_levels(v.get("asks")?)?,
        timestamp_ms: v.get("ts").and_then(|x| x.as_u64()).unwrap_or_default(),
    })
}

fn parse_funding_rates(v: &serde_json::Value) -> Option<Vec<FundingRateSample>> {
    v.as_array()?
        .iter()
        .map(|e| {
            Some(FundingRateSample {
                symbol: e.get("symbol")?.as_str()?.to_string(),
                funding_rate: e.get("fundingRate")?.as_f64()?,
                next_funding_time_ms: e.get("nextFundingTime").and_then(|x| x.as_u64()).unwrap_or_default(),
                mark_price: e.get("markPrice").and_then(|x| x.as_f64()).unwrap_or_default(),
                index_price: e.get("indexPrice").and_then(|x| x.as_f64()).unwrap_or_default(),
            })
        })
        .collect()
}

fn parse_basis(symbol: &str, v: &serde_json::Value) -> Option<FuturesBasis> {
    Some(FuturesBasis {
        symbol: symbol.to_string(),
        spot_price: v.get("spotPrice")?.as_f64()?,
        futures_price: v.get("futuresPrice")?.as_f64()?,
        expiry_or_perp: match v.get("expiry").and_then(|x| x.as_u64()) {
            Some(expiry_ms) => ExpiryOrPerp::Dated { expiry_ms },
            None => ExpiryOrPerp::Perpetual,
        },
    })
}

fn parse_p2p_ads(asset: &str, fiat: &str, side: P2PSide, v: &serde_json::Value) -> Option<Vec<P2PAd>> {
    v.as_array()?
        .iter()
        .map(|e| {
            Some(P2PAd {
                asset: asset.to_string(),
                fiat: fiat.to_string(),
                side,
                price: e.get("price")?.as_f64()?,
                min_qty: e.get("minQty").and_then(|x| x.as_f64()).unwrap_or_default(),
                max_qty: e.get("maxQty").and_then(|x| x.as_f64()).unwrap_or_default(),
                merchant_score: e.get("merchantScore").and_then(|x| x.as_f64()).unwrap_or_default(),
                completed_trades: e.get("completedTrades").and_then(|x| x.as_u64()).unwrap_or_default(),
                payment_methods: e
                    .get("paymentMethods")
                    .and_then(|x| x.as_array())
                    .map(|a| a.iter().filter_map(|m| m.as_str().map(str::to_string)).collect())
                    .unwrap_or_default(),
            })
        })
        .collect()
}

fn parse_fiat_rate(base: &str, quote: &str, v: &serde_json::Value) -> Option<FiatRate> {
    Some(FiatRate {
        base: base.to_string(),
        quote: quote.to_string(),
        rate: v.get("rate")?.as_f64()?,
        source: FiatSourceKind::MarketDataProvider,
        timestamp_ms: v.get("ts").and_then(|x| x.as_u64()).unwrap_or_default(),
    })
}

fn parse_price_history(v: &serde_json::Value) -> Option<Vec<PricePoint>> {
    v.as_array()?
        .iter()
        .map(|e| {
            let pair = e.as_array()?;
            Some(PricePoint {
                timestamp_ms: pair.first()?.as_u64()?,
                close: pair.get(1)?.as_f64()?,
            })
        })
        .collect()
}

//! Market Data Gateway (C1, spec.md §4.1): pull-based read interface over
//! venue data, hiding I/O behind per-key TTL caching, single-flight
//! coalescing, and a per-source circuit breaker.
//!
//! Per spec.md §9's second redesign note ("module-level and provider-level
//! global state ... a `Gateway` value passed explicitly by the
//! orchestrator, whose cache is an owned per-instance structure; no
//! process-wide state"): there is exactly one `Gateway` per scan, owned and
//! passed around, never a static/global.

use super::cache::{Annotated, CacheMiss, TtlCache};
use super::circuit_breaker::CircuitBreaker;
use super::source::MarketDataSource;
use super::types::*;
use crate::clock::Clock;
use crate::config::GatewayConfig;
use crate::error::ScanError;
use std::sync::Arc;

pub struct Gateway {
    source: Arc<dyn MarketDataSource>,
    clock: Arc<dyn Clock>,
    config: GatewayConfig,
    spot_cache: TtlCache<SpotTicker>,
    orderbook_cache: TtlCache<OrderBookLevel2>,
    funding_cache: TtlCache<Vec<FundingRateSample>>,
    basis_cache: TtlCache<FuturesBasis>,
    p2p_cache: TtlCache<Vec<P2PAd>>,
    fiat_cache: TtlCache<FiatRate>,
    history_cache: TtlCache<Vec<PricePoint>>,
    breaker: CircuitBreaker,
}

impl Gateway {
    pub fn new(source: Arc<dyn MarketDataSource>, clock: Arc<dyn Clock>, config: GatewayConfig) -> Self {
        let breaker = CircuitBreaker::new(config.breaker_failure_threshold, config.breaker_open_duration_ms);
        Self {
            source,
            clock,
            config,
            spot_cache: TtlCache::new(),
            orderbook_cache: TtlCache::new(),
            funding_cache: TtlCache::new(),
            basis_cache: TtlCache::new(),
            p2p_cache: TtlCache::new(),
            fiat_cache: TtlCache::new(),
            history_cache: TtlCache::new(),
            breaker: breaker,
        }
    }

    fn now(&self) -> u64 {
        self.clock.now_ms()
    }

    fn stale_bound(&self, ttl_ms: u64) -> u64 {
        ttl_ms.saturating_mul(self.config.stale_fallback_multiplier)
    }

    pub async fn get_spot(&self, symbol: &str) -> Result<Annotated<SpotTicker>, ScanError> {
        let now = self.now();
        if !self.breaker.should_attempt(now) {
            return self.stale_only(&self.spot_cache, symbol, "spot", now).await;
        }
        let source = &self.source;
        let result = self
            .spot_cache
            .get_or_fetch(symbol, self.config.spot_ttl_ms, self.stale_bound(self.config.spot_ttl_ms), now, || {
                source.spot_ticker(symbol)
            })
            .await;
        self.record_outcome(&result, now);
        result.map_err(|_| ScanError::DataUnavailable { source: "spot".into(), key: symbol.into() })
    }

    pub async fn get_orderbook(&self, symbol: &str, depth: usize) -> Result<Annotated<OrderBookLevel2>, ScanError> {
        let now = self.now();
        if !self.breaker.should_attempt(now) {
            return self.stale_only(&self.orderbook_cache, symbol, "orderbook", now).await;
        }
        let source = &self.source;
        let result = self
            .orderbook_cache
            .get_or_fetch(
                symbol,
                self.config.orderbook_ttl_ms,
                self.stale_bound(self.config.orderbook_ttl_ms),
                now,
                || source.orderbook(symbol, depth),
            )
            .await;
        self.record_outcome(&result, now);
        result.map_err(|_| ScanError::DataUnavailable { source: "orderbook".into(), key: symbol.into() })
    }

    pub async fn get_funding_rates(&self) -> Result<Annotated<Vec<FundingRateSample>>, ScanError> {
        let now = self.now();
        if !self.breaker.should_attempt(now) {
            return self.stale_only(&self.funding_cache, "__all__", "funding", now).await;
        }
        let source = &self.source;
        let result = self
            .funding_cache
            .get_or_fetch("__all__", self.config.funding_ttl_ms, self.stale_bound(self.config.funding_ttl_ms), now, || {
                source.funding_rates()
            })
            .await;
        self.record_outcome(&result, now);
        result.map_err(|_| ScanError::DataUnavailable { source: "funding".into(), key: "__all__".into() })
    }

    pub async fn get_basis(&self, symbol: &str) -> Result<Annotated<FuturesBasis>, ScanError> {
        let now = self.now();
        if !self.breaker.should_attempt(now) {
            return self.stale_only(&self.basis_cache, symbol, "basis", now).await;
        }
        let source = &self.source;
        let result = self
            .basis_cache
            .get_or_fetch(symbol, self.config.basis_ttl_ms, self.stale_bound(self.config.basis_ttl_ms), now, || {
                source.futures_basis(symbol)
            })
            .await;
        self.record_outcome(&result, now);
        result.map_err(|_| ScanError::DataUnavailable { source: "basis".into(), key: symbol.into() })
    }

    pub async fn get_p2p(&self, asset: &str, fiat: &str, side: P2PSide) -> Result<Annotated<Vec<P2PAd>>, ScanError> {
        let now = self.now();
        let key = format!("{asset}:{fiat}:{side:?}");
        if !self.breaker.should_attempt(now) {
            return self.stale_only(&self.p2p_cache, &key, "p2p", now).await;
        }
        let source = &self.source;
        let result = self
            .p2p_cache
            .get_or_fetch(&key, self.config.p2p_ttl_ms, self.stale_bound(self.config.p2p_ttl_ms), now, || {
                source.p2p_ads(asset, fiat, side)
            })
            .await;
        self.record_outcome(&result, now);
        result.map_err(|_| ScanError::DataUnavailable { source: "p2p".into(), key })
    }

    /// Fiat rate lookup (spec.md §4.1): for non-officially-anchored fiats
    /// two independent sources are queried and divergence > 2% is flagged
    /// as a non-fatal `Anomaly` on the returned value. `secondary` supplies
    /// the market-data-provider source; pass `None` when `base/quote` is
    /// officially anchored and only one source is authoritative.
    pub async fn get_fiat(
        &self,
        base: &str,
        quote: &str,
        secondary: Option<&dyn MarketDataSource>,
    ) -> Result<Annotated<FiatRate>, ScanError> {
        let now = self.now();
        let key = format!("{base}:{quote}");
        if !self.breaker.should_attempt(now) {
            return self.stale_only(&self.fiat_cache, &key, "fiat", now).await;
        }
        let source = &self.source;
        let result = self
            .fiat_cache
            .get_or_fetch(&key, self.config.fiat_ttl_ms, self.stale_bound(self.config.fiat_ttl_ms), now, || {
                source.fiat_rate(base, quote)
            })
            .await;
        self.record_outcome(&result, now);
        let mut annotated =
            result.map_err(|_| ScanError::DataUnavailable { source: "fiat".into(), key: key.clone() })?;

        if let Some(secondary_source) = secondary {
            if let Ok(secondary_rate) = secondary_source.fiat_rate(base, quote).await {
                let divergence = (annotated.value.rate - secondary_rate.rate).abs() / annotated.value.rate;
                if divergence > self.config.fiat_divergence_anomaly_pct {
                    eprintln!(
                        "[GATEWAY-FIAT] anomaly: {key} diverges {:.2}% between sources",
                        divergence * 100.0
                    );
                    annotated.anomaly = Some(format!("fiat source divergence {:.4}", divergence));
                }
            }
        }
        Ok(annotated)
    }

    pub async fn get_price_history(&self, symbol: &str, window: usize) -> Result<Annotated<Vec<PricePoint>>, ScanError> {
        let now = self.now();
        if !self.breaker.should_attempt(now) {
            return self.stale_only(&self.history_cache, symbol, "price_history", now).await;
        }
        let source = &self.source;
        let result = self
            .history_cache
            .get_or_fetch(symbol, 0, u64::MAX, now, || source.price_history(symbol, window))
            .await;
        self.record_outcome(&result, now);
        result.map_err(|_| ScanError::DataUnavailable { source: "price_history".into(), key: symbol.into() })
    }

    fn record_outcome<T>(&self, result: &Result<Annotated<T>, CacheMiss>, now: u64) {
        match result {
            Ok(a) if !a.stale => self.breaker.record_success(),
            // Stale fallback means the underlying upstream fetch failed;
            // the caller still got a usable value, but the breaker must
            // still see it as a failed probe.
            Ok(_) => self.breaker.record_failure(now),
            Err(_) => self.breaker.record_failure(now),
        }
    }

    async fn stale_only<T: Clone + Send + Sync + 'static>(
        &self,
        cache: &TtlCache<T>,
        key: &str,
        source_name: &str,
        now: u64,
    ) -> Result<Annotated<T>, ScanError> {
        // Breaker is OPEN: per spec.md §4.1, a cache miss under an open
        // breaker returns the last-good value within the secondary
        // staleness bound, else DataUnavailable, without attempting a
        // fresh upstream call.
        cache
            .get_or_fetch(key, 0, u64::MAX, now, || async { Err::<T, ()>(()) })
            .await
            .map_err(|_| ScanError::DataUnavailable { source: source_name.into(), key: key.into() })
    }
}

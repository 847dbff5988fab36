//! Drives a full scan over a single funding-carry universe end to end:
//! gateway -> snapshot -> detector -> normalizer -> ranker -> optimizer.

use arbscope::clock::FixedClock;
use arbscope::config::EngineConfig;
use arbscope::market_data::{FundingRateSample, Gateway, OrderBookLevel2, L2Level, SpotTicker, StaticMarketDataSource};
use arbscope::ranker::RankPolicy;
use arbscope::{Opportunity, ScannerOrchestrator, ScanStatus, Strategy};
use std::sync::Arc;

fn funding_universe_config() -> EngineConfig {
    let mut cfg = EngineConfig::default();
    cfg.universe.spot_symbols = vec!["BTC/USDT".to_string()];
    cfg.universe.perp_symbols = vec!["BTC/USDT".to_string()];
    cfg.universe.orderbook_depth = 10;
    cfg
}

fn funding_source() -> StaticMarketDataSource {
    StaticMarketDataSource::new()
        .with_spot(SpotTicker { symbol: "BTC/USDT".into(), bid: 59_990.0, ask: 60_000.0, last: 60_000.0, volume_24h: 2_000.0, timestamp_ms: 0 })
        .with_orderbook(OrderBookLevel2 {
            symbol: "BTC/USDT".into(),
            bids: vec![L2Level { price: 59_990.0, size: 100.0 }],
            asks: vec![L2Level { price: 60_000.0, size: 100.0 }],
            timestamp_ms: 0,
        })
        .with_funding(FundingRateSample { symbol: "BTC/USDT".into(), funding_rate: 0.002, next_funding_time_ms: 28_800_000, mark_price: 60_010.0, index_price: 60_000.0 })
}

#[tokio::test]
async fn a_positive_funding_rate_produces_a_funding_opportunity() {
    let config = funding_universe_config();
    let gateway = Arc::new(Gateway::new(Arc::new(funding_source()), Arc::new(FixedClock(0)), config.gateway.clone()));
    let orchestrator = ScannerOrchestrator::new(gateway, config, None);

    let result = orchestrator.scan(250_000.0, RankPolicy::ByScore, 0, None).await.unwrap();

    assert_ne!(result.status, ScanStatus::Empty);
    let funding: Vec<&Opportunity> = result.opportunities.iter().filter(|o| o.strategy == Strategy::Funding).collect();
    assert!(!funding.is_empty(), "expected at least one FUNDING opportunity, got {:?}", result.diagnostics);
    assert!(funding[0].expected_return > 0.0);
    assert!(funding[0].legs.len() >= 2, "a funding carry opportunity should carry a spot leg and a perp leg");
}

#[tokio::test]
async fn flat_funding_rate_yields_no_funding_opportunity() {
    let config = funding_universe_config();
    let source = StaticMarketDataSource::new()
        .with_spot(SpotTicker { symbol: "BTC/USDT".into(), bid: 59_990.0, ask: 60_000.0, last: 60_000.0, volume_24h: 2_000.0, timestamp_ms: 0 })
        .with_orderbook(OrderBookLevel2 {
            symbol: "BTC/USDT".into(),
            bids: vec![L2Level { price: 59_990.0, size: 100.0 }],
            asks: vec![L2Level { price: 60_000.0, size: 100.0 }],
            timestamp_ms: 0,
        })
        .with_funding(FundingRateSample { symbol: "BTC/USDT".into(), funding_rate: 0.0, next_funding_time_ms: 28_800_000, mark_price: 60_000.0, index_price: 60_000.0 });
    let gateway = Arc::new(Gateway::new(Arc::new(source), Arc::new(FixedClock(0)), config.gateway.clone()));
    let orchestrator = ScannerOrchestrator::new(gateway, config, None);

    let result = orchestrator.scan(250_000.0, RankPolicy::ByScore, 0, None).await.unwrap();
    assert!(result.opportunities.iter().all(|o| o.strategy != Strategy::Funding));
}

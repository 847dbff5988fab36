//! CLI entry point: runs one scan against an in-memory demo fixture and
//! prints the result as JSON. A real deployment swaps
//! `StaticMarketDataSource` for `RestMarketDataSource` wired to live
//! venues; the orchestrator itself is unaware of the difference.

use arbscope::clock::{Clock, SystemClock};
use chrono::{TimeZone, Utc};
use arbscope::config::{ConfigProvider, EngineConfig, StaticConfigProvider};
use arbscope::market_data::{
    FiatRate, FiatSourceKind, FundingRateSample, Gateway, L2Level, OrderBookLevel2, SpotTicker, StaticMarketDataSource,
};
use arbscope::orchestrator::ScannerOrchestrator;
use arbscope::ranker::RankPolicy;
use std::sync::Arc;

fn demo_source() -> StaticMarketDataSource {
    StaticMarketDataSource::new()
        .with_spot(SpotTicker { symbol: "BTC/USDT".into(), bid: 59_990.0, ask: 60_000.0, last: 60_000.0, volume_24h: 500.0, timestamp_ms: 0 })
        .with_orderbook(OrderBookLevel2 {
            symbol: "BTC/USDT".into(),
            bids: vec![L2Level { price: 59_990.0, size: 50.0 }],
            asks: vec![L2Level { price: 60_000.0, size: 50.0 }],
            timestamp_ms: 0,
        })
        .with_funding(FundingRateSample {
            symbol: "BTC/USDT".into(),
            funding_rate: 0.0001,
            next_funding_time_ms: 28_800_000,
            mark_price: 60_005.0,
            index_price: 60_000.0,
        })
        .with_fiat(FiatRate { base: "USDT".into(), quote: "COP".into(), rate: 4000.0, source: FiatSourceKind::Official, timestamp_ms: 0 })
        .with_fiat(FiatRate { base: "COP".into(), quote: "VES".into(), rate: 0.009, source: FiatSourceKind::Official, timestamp_ms: 0 })
        .with_fiat(FiatRate { base: "VES".into(), quote: "USDT".into(), rate: 0.028, source: FiatSourceKind::Official, timestamp_ms: 0 })
}

fn demo_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.universe.spot_symbols = vec!["BTC/USDT".to_string()];
    config.universe.perp_symbols = vec!["BTC/USDT".to_string()];
    config.universe.fiat_pairs = vec![
        ("USDT".into(), "COP".into()),
        ("COP".into(), "VES".into()),
        ("VES".into(), "USDT".into()),
    ];
    config.universe.orderbook_depth = 10;
    config.universe.price_history_window = 200;
    config
}

#[tokio::main]
async fn main() {
    let capital_usd: f64 = std::env::args().nth(1).and_then(|s| s.parse().ok()).unwrap_or(100_000.0);

    let config = StaticConfigProvider(demo_config()).config();
    let gateway = Arc::new(Gateway::new(Arc::new(demo_source()), Arc::new(SystemClock), config.gateway.clone()));
    let orchestrator = ScannerOrchestrator::new(gateway, config, None);

    let now_ms = SystemClock.now_ms();
    let pinned_at = Utc.timestamp_millis_opt(now_ms as i64).single().map(|t| t.to_rfc3339()).unwrap_or_default();
    match orchestrator.scan(capital_usd, RankPolicy::ByScore, now_ms, None).await {
        Ok(result) => {
            eprintln!(
                "[SCAN] t={pinned_at} status={:?} opportunities={} diagnostics={}",
                result.status,
                result.opportunities.len(),
                result.diagnostics.len()
            );
            println!("{}", serde_json::to_string_pretty(&result).unwrap());
        }
        Err(e) => {
            eprintln!("[SCAN] failed: {e}");
            std::process::exit(1);
        }
    }
}

//! Drives a full scan over a three-fiat loop and checks that the
//! resulting opportunity closes as a cycle, end to end through the
//! gateway and orchestrator rather than calling the detector directly.

use arbscope::clock::FixedClock;
use arbscope::config::EngineConfig;
use arbscope::market_data::{FiatRate, FiatSourceKind, Gateway, StaticMarketDataSource};
use arbscope::ranker::RankPolicy;
use arbscope::{ScanStatus, Strategy};
use std::sync::Arc;

fn triangle_config() -> EngineConfig {
    let mut cfg = EngineConfig::default();
    cfg.universe.fiat_pairs = vec![
        ("USDT".into(), "COP".into()),
        ("COP".into(), "VES".into()),
        ("VES".into(), "USDT".into()),
    ];
    cfg
}

#[tokio::test]
async fn a_profitable_triangle_closes_as_a_cycle() {
    let config = triangle_config();
    let source = StaticMarketDataSource::new()
        .with_fiat(FiatRate { base: "USDT".into(), quote: "COP".into(), rate: 4_000.0, source: FiatSourceKind::Official, timestamp_ms: 0 })
        .with_fiat(FiatRate { base: "COP".into(), quote: "VES".into(), rate: 0.009, source: FiatSourceKind::Official, timestamp_ms: 0 })
        .with_fiat(FiatRate { base: "VES".into(), quote: "USDT".into(), rate: 0.028, source: FiatSourceKind::Official, timestamp_ms: 0 });
    let gateway = Arc::new(Gateway::new(Arc::new(source), Arc::new(FixedClock(0)), config.gateway.clone()));
    let orchestrator = arbscope::ScannerOrchestrator::new(gateway, config, None);

    let result = orchestrator.scan(50_000.0, RankPolicy::ByReturn, 0, None).await.unwrap();

    assert_ne!(result.status, ScanStatus::Empty);
    let triangles: Vec<_> = result.opportunities.iter().filter(|o| o.strategy == Strategy::Triangle).collect();
    assert!(!triangles.is_empty(), "expected at least one TRIANGLE opportunity, diagnostics: {:?}", result.diagnostics);
    for t in &triangles {
        assert!(t.is_closed_cycle());
        assert!(t.legs.len() >= 3);
    }
}

#[tokio::test]
async fn a_fair_priced_triangle_yields_no_cycle_opportunity() {
    let config = triangle_config();
    // Round-trip through these three rates is exactly break-even (1/4000 *
    // 4000 * 1 = 1), so after fees it should never clear min_edge_liquidity
    // return thresholds.
    let source = StaticMarketDataSource::new()
        .with_fiat(FiatRate { base: "USDT".into(), quote: "COP".into(), rate: 4_000.0, source: FiatSourceKind::Official, timestamp_ms: 0 })
        .with_fiat(FiatRate { base: "COP".into(), quote: "VES".into(), rate: 0.01, source: FiatSourceKind::Official, timestamp_ms: 0 })
        .with_fiat(FiatRate { base: "VES".into(), quote: "USDT".into(), rate: 0.025, source: FiatSourceKind::Official, timestamp_ms: 0 });
    let gateway = Arc::new(Gateway::new(Arc::new(source), Arc::new(FixedClock(0)), config.gateway.clone()));
    let orchestrator = arbscope::ScannerOrchestrator::new(gateway, config, None);

    let result = orchestrator.scan(50_000.0, RankPolicy::ByReturn, 0, None).await.unwrap();
    let triangles: Vec<_> = result.opportunities.iter().filter(|o| o.strategy == Strategy::Triangle).collect();
    assert!(triangles.iter().all(|t| t.expected_return <= 0.0001));
}

//! SPOT_P2P opportunities are semi-manual to execute, so by default they
//! sit out of capital allocation even though they still surface in the
//! ranked opportunity list the way every other strategy does.

use arbscope::clock::FixedClock;
use arbscope::config::EngineConfig;
use arbscope::market_data::{
    FiatRate, FiatSourceKind, Gateway, P2PAd, P2PSide, SpotTicker, StaticMarketDataSource,
};
use arbscope::ranker::RankPolicy;
use arbscope::{ScanStatus, Strategy};
use std::sync::Arc;

fn p2p_config() -> EngineConfig {
    let mut cfg = EngineConfig::default();
    cfg.universe.spot_symbols = vec!["USDT/USD".to_string()];
    cfg.universe.p2p_pairs = vec![("USDT".to_string(), "COP".to_string())];
    cfg
}

fn p2p_source() -> StaticMarketDataSource {
    StaticMarketDataSource::new()
        .with_spot(SpotTicker { symbol: "USDT/USD".into(), bid: 0.999, ask: 1.0, last: 1.0, volume_24h: 1_000_000.0, timestamp_ms: 0 })
        .with_fiat(FiatRate { base: "USDT".into(), quote: "COP".into(), rate: 4000.0, source: FiatSourceKind::Official, timestamp_ms: 0 })
        .with_p2p_ads(
            "USDT",
            "COP",
            P2PSide::Buy,
            vec![P2PAd {
                asset: "USDT".into(),
                fiat: "COP".into(),
                side: P2PSide::Buy,
                price: 4_200.0,
                min_qty: 10.0,
                max_qty: 500.0,
                merchant_score: 0.98,
                completed_trades: 5_000,
                payment_methods: vec!["bank_transfer".into()],
            }],
        )
}

#[tokio::test]
async fn a_non_investable_spot_p2p_opportunity_is_ranked_but_excluded_from_the_portfolio() {
    let config = p2p_config();
    assert!(!config.spot_p2p.investable, "investable defaults to false");
    let gateway = Arc::new(Gateway::new(Arc::new(p2p_source()), Arc::new(FixedClock(0)), config.gateway.clone()));
    let orchestrator = arbscope::ScannerOrchestrator::new(gateway, config, None);

    let result = orchestrator.scan(50_000.0, RankPolicy::ByScore, 0, None).await.unwrap();

    assert_ne!(result.status, ScanStatus::Empty);
    assert!(result.opportunities.iter().any(|o| o.strategy == Strategy::SpotP2p), "SPOT_P2P should still surface in opportunities");
    assert!(result.ranking.iter().any(|o| o.strategy == Strategy::SpotP2p), "SPOT_P2P should still surface in the ranking");

    if let Some(portfolio) = &result.portfolio {
        let spot_p2p_ids: Vec<&String> = result
            .ranking
            .iter()
            .filter(|o| o.strategy == Strategy::SpotP2p)
            .map(|o| &o.id)
            .collect();
        assert!(
            portfolio.positions.iter().all(|p| !spot_p2p_ids.contains(&&p.opportunity_id)),
            "a non-investable SPOT_P2P opportunity must never receive a portfolio allocation"
        );
    }
}

#[tokio::test]
async fn an_investable_spot_p2p_opportunity_can_receive_a_portfolio_allocation() {
    let mut config = p2p_config();
    config.spot_p2p.investable = true;
    let gateway = Arc::new(Gateway::new(Arc::new(p2p_source()), Arc::new(FixedClock(0)), config.gateway.clone()));
    let orchestrator = arbscope::ScannerOrchestrator::new(gateway, config, None);

    let result = orchestrator.scan(50_000.0, RankPolicy::ByScore, 0, None).await.unwrap();

    let portfolio = result.portfolio.expect("a single strong SPOT_P2P candidate should allocate when investable");
    assert!(!portfolio.positions.is_empty());
}

//! Recognized configuration (§6.3): a closed set. `ConfigProvider` is the
//! port collaborators use to supply it; `EngineConfig` is the value type,
//! modeled directly on the teacher's `ConfigStorage` trait +
//! `InMemoryConfigStorage` pattern (`strategy/config_storage.rs`): a narrow
//! trait with a ready-to-use in-memory implementation rather than a
//! process-wide global.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScanningConfig {
    pub min_return: f64,
    pub max_risk_score: f64,
    pub min_confidence: f64,
    pub min_liquidity_usd: f64,
    pub max_candidates: usize,
    pub per_detector_deadline_ms: u64,
    pub scan_deadline_ms: u64,
}

impl Default for ScanningConfig {
    fn default() -> Self {
        Self {
            min_return: 0.0,
            max_risk_score: 100.0,
            min_confidence: 0.0,
            min_liquidity_usd: 0.0,
            max_candidates: 20,
            per_detector_deadline_ms: 10_000,
            scan_deadline_ms: 15_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FundingConfig {
    pub min_apy: f64,
    pub spot_taker_fee: f64,
    pub perp_taker_fee: f64,
    pub expected_slippage: f64,
    pub default_interval_hours: f64,
    pub min_sharpe_samples: usize,
}

impl Default for FundingConfig {
    fn default() -> Self {
        Self {
            min_apy: 0.0,
            spot_taker_fee: 0.0004,
            perp_taker_fee: 0.0004,
            expected_slippage: 0.0002,
            default_interval_hours: 8.0,
            min_sharpe_samples: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatArbConfig {
    pub z_entry: f64,
    pub z_exit: f64,
    pub window: usize,
    pub sample_n: usize,
    pub cointegration_p_max: f64,
    /// Explicit pairs to test. Empty means "every unordered pair of
    /// symbols with `sample_n` history in the snapshot" (§3.3 of
    /// SPEC_FULL.md — left unspecified by the distilled spec).
    pub pairs: Vec<(String, String)>,
    pub roundtrip_fees: f64,
}

impl Default for StatArbConfig {
    fn default() -> Self {
        Self {
            z_entry: 2.0,
            z_exit: 0.5,
            window: 60,
            sample_n: 200,
            cointegration_p_max: 0.05,
            pairs: Vec::new(),
            roundtrip_fees: 0.0008,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeltaNeutralConfig {
    pub min_basis: f64,
    pub default_perp_half_life_days: f64,
    pub fraction_of_basis_to_capture_target: f64,
    pub roundtrip_fees: f64,
    pub expected_slippage: f64,
}

impl Default for DeltaNeutralConfig {
    fn default() -> Self {
        Self {
            min_basis: 0.0015,
            default_perp_half_life_days: 7.0,
            fraction_of_basis_to_capture_target: 0.8,
            roundtrip_fees: 0.0008,
            expected_slippage: 0.0003,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TriangleConfig {
    pub max_hops: usize,
    pub min_edge_liquidity: f64,
    pub hop_count_penalty_k: f64,
    pub per_hop_fee: f64,
    pub per_hop_slippage: f64,
}

impl Default for TriangleConfig {
    fn default() -> Self {
        Self {
            max_hops: 5,
            min_edge_liquidity: 5_000.0,
            hop_count_penalty_k: 5.0,
            per_hop_fee: 0.001,
            per_hop_slippage: 0.001,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpotP2PConfig {
    pub min_margin_cop: f64,
    pub min_margin_ves: f64,
    pub min_margin_default: f64,
    pub merchant_min_score: f64,
    pub top_k_ads: usize,
    pub p2p_fee: f64,
    pub spot_taker_fee: f64,
    /// Fiat pairs to check for cross-fiat triangle arbitrage (§4.3.6).
    /// Empty means "every pair of distinct non-USD(T) fiats present in the
    /// snapshot" (§3.3 of SPEC_FULL.md).
    pub cross_fiat_pairs: Vec<(String, String)>,
    pub cross_fiat_bridge: String,
    /// Open question (§3.3 of SPEC_FULL.md): whether SPOT_P2P opportunities
    /// participate in capital allocation, since their execution is
    /// semi-manual.
    pub investable: bool,
}

impl Default for SpotP2PConfig {
    fn default() -> Self {
        Self {
            min_margin_cop: 0.025,
            min_margin_ves: 0.03,
            min_margin_default: 0.02,
            merchant_min_score: 0.95,
            top_k_ads: 5,
            p2p_fee: 0.0035,
            spot_taker_fee: 0.0004,
            cross_fiat_pairs: Vec::new(),
            cross_fiat_bridge: "USDT".to_string(),
            investable: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskConfig {
    pub risk_free_rate: f64,
    pub var_confidence_95: f64,
    pub var_confidence_99: f64,
    pub max_portfolio_var_pct: f64,
    pub max_strategy_allocation: f64,
    pub min_diversification_ratio: f64,
    pub max_concentration: f64,
    pub kelly_cap: f64,
    pub liquidity_factor: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            risk_free_rate: 0.0,
            var_confidence_95: 1.645,
            var_confidence_99: 2.326,
            max_portfolio_var_pct: 0.10,
            max_strategy_allocation: 0.40,
            min_diversification_ratio: 1.2,
            max_concentration: 60.0,
            kelly_cap: 0.25,
            liquidity_factor: 0.10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OptimizerConfig {
    pub risk_aversion_lambda: f64,
    pub min_weight: f64,
    pub max_positions: usize,
    pub solver_tolerance: f64,
    pub solver_max_iters: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            risk_aversion_lambda: 0.5,
            min_weight: 0.02,
            max_positions: 5,
            solver_tolerance: 1e-4,
            solver_max_iters: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NormalizerConfig {
    pub w_return: f64,
    pub w_liquidity: f64,
    pub w_confidence: f64,
    pub w_risk: f64,
    pub w_sharpe: f64,
    pub r_ref: f64,
    pub l_ref: f64,
    pub sharpe_cap: f64,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            w_return: 0.35,
            w_liquidity: 0.20,
            w_confidence: 0.15,
            w_risk: 0.20,
            w_sharpe: 0.10,
            r_ref: 0.05,
            l_ref: 1_000_000.0,
            sharpe_cap: 3.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GatewayConfig {
    pub spot_ttl_ms: u64,
    pub orderbook_ttl_ms: u64,
    pub funding_ttl_ms: u64,
    pub basis_ttl_ms: u64,
    pub p2p_ttl_ms: u64,
    pub fiat_ttl_ms: u64,
    pub stale_fallback_multiplier: u64,
    pub breaker_failure_threshold: u32,
    pub breaker_open_duration_ms: u64,
    pub fiat_divergence_anomaly_pct: f64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            spot_ttl_ms: 10_000,
            orderbook_ttl_ms: 5_000,
            funding_ttl_ms: 60_000,
            basis_ttl_ms: 30_000,
            p2p_ttl_ms: 15_000,
            fiat_ttl_ms: 300_000,
            stale_fallback_multiplier: 3,
            breaker_failure_threshold: 5,
            breaker_open_duration_ms: 60_000,
            fiat_divergence_anomaly_pct: 0.02,
        }
    }
}

/// The set of instruments/pairs a scan pulls from the gateway before
/// handing a pinned snapshot to the detectors. Not named in §6.3's
/// closed configuration list, but every deployment needs one — an
/// ambient necessity the distilled spec left implicit (§3.3 of
/// SPEC_FULL.md).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Universe {
    pub spot_symbols: Vec<String>,
    pub perp_symbols: Vec<String>,
    pub fiat_pairs: Vec<(String, String)>,
    pub p2p_pairs: Vec<(String, String)>,
    pub price_history_symbols: Vec<String>,
    pub price_history_window: usize,
    pub orderbook_depth: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct EngineConfig {
    pub universe: Universe,
    pub scanning: ScanningConfig,
    pub funding: FundingConfig,
    pub stat_arb: StatArbConfig,
    pub delta_neutral: DeltaNeutralConfig,
    pub triangle: TriangleConfig,
    pub spot_p2p: SpotP2PConfig,
    pub risk: RiskConfig,
    pub optimizer: OptimizerConfig,
    pub normalizer: NormalizerConfig,
    pub gateway: GatewayConfig,
}

/// Source of recognized configuration (§6.1). Narrow on purpose: swapping
/// in a file-backed or remote-backed provider never changes the shape
/// consumed by the pipeline.
pub trait ConfigProvider: Send + Sync {
    fn config(&self) -> EngineConfig;
}

/// In-memory provider, the default used by tests and the `scan` binary.
/// Modeled on the teacher's `InMemoryConfigStorage`
/// (`strategy/config_storage.rs`).
pub struct StaticConfigProvider(pub EngineConfig);

impl Default for StaticConfigProvider {
    fn default() -> Self {
        Self(EngineConfig::default())
    }
}

impl ConfigProvider for StaticConfigProvider {
    fn config(&self) -> EngineConfig {
        self.0.clone()
    }
}

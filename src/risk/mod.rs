pub mod analyzer;
pub mod model;

pub use analyzer::{analyze, check_limits, stress_test};
pub use model::{LimitBreach, PortfolioRisk, RiskRating, StressResult, StressScenario};

pub mod cache;
pub mod circuit_breaker;
pub mod gateway;
pub mod source;
pub mod types;

pub use gateway::Gateway;
pub use source::{HttpResponder, MarketDataSource, RestMarketDataSource, RestResponder, StaticMarketDataSource};
pub use types::*;

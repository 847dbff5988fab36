pub mod builder;
pub mod cycle;

pub use builder::{build, PriceGraph};
pub use cycle::{enumerate_cycles, Cycle, CycleLeg};

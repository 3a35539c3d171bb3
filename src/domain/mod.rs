//! Domain layer: market data, chart geometry and the shared error/logging kernel.

pub mod chart;
pub mod errors;
pub mod logging;
pub mod market_data;

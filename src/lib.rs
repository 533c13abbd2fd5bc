//! WeatherBot Library
//!
//! Decision kernels for daily max-temperature threshold markets:
//! multi-source reading fusion, resonance and phased entry strategies,
//! and the Forecast Guard rebound lock.

pub mod config;
pub mod features;
pub mod oracle;
pub mod risk;
pub mod strategy;
pub mod telemetry;
pub mod types;

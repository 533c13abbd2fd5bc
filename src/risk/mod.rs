//! Forecast Guard - rebound risk controls
//!
//! Implements:
//! - Forecast source abstraction (no I/O inside the guard)
//! - Anchor-calibrated night risk window detection
//! - Per-location lock/unlock hysteresis
//! - Debounced fail-safe on a missing anchor
//! - Memoized recomputation on a fixed interval

mod forecast_guard;
mod sources;
pub mod window;

pub use forecast_guard::{
    ForecastGuard, GuardEntry, GuardResult, RiskReport, SourceRiskReport, MIN_COOLING_FORECASTS,
    MIN_RISK_SOURCES,
};
pub use sources::{ForecastError, ForecastPoint, ForecastSource, StaticForecast};
pub use window::RiskWindow;

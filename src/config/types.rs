//! Configuration types consumed by the kernel and the forecast guard
//!
//! These are plain read-only values. Nothing here is validated: contradictory
//! thresholds are the caller's problem, the kernel just evaluates them.

use serde::{Deserialize, Serialize};

use crate::types::PhaseName;

/// Parameters shared by both strategy kernels
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub model: FitWeights,
    pub resonance: ResonanceConfig,
    pub phased: PhasedConfig,
}

/// Regression coefficients of the physical fit model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitWeights {
    /// Weight of auxiliary source A
    pub w1: f64,
    /// Weight of auxiliary source B
    pub w2: f64,
    pub bias: f64,
}

impl Default for FitWeights {
    fn default() -> Self {
        Self {
            w1: 0.525,
            w2: 0.450,
            bias: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResonanceConfig {
    /// Auxiliary readings further than this from the anchor are isolated
    pub max_source_divergence: f64,
    /// Width of the half-open zone above each X.5 boundary
    pub avoidance_width: f64,
    /// Block entries while the 1h consensus forecast is above the current consensus
    pub require_forecast_drop: bool,
    /// Sources that must independently trend down
    pub min_resonance_sources: usize,
    /// Step-wise drops summed across all three histories
    pub total_required_drops: usize,
    pub require_anchor_drop: bool,
    /// Station-local hour window (inclusive on both ends)
    pub peak_hour_start: f64,
    pub peak_hour_end: f64,
}

impl Default for ResonanceConfig {
    fn default() -> Self {
        Self {
            max_source_divergence: 1.5,
            avoidance_width: 0.3,
            require_forecast_drop: true,
            min_resonance_sources: 2,
            total_required_drops: 2,
            require_anchor_drop: false,
            peak_hour_start: 12.0,
            peak_hour_end: 18.0,
        }
    }
}

/// Thresholds for one phase of the afternoon
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseConfig {
    /// Local hour at which the phase begins
    pub start: f64,
    pub required_resonance: usize,
    /// Consecutive ticks the anchor must sit below its running max
    pub required_duration: u32,
    /// Drop below a source's own running max that counts as resonance
    pub depth: f64,
    pub anchor_required: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhasedConfig {
    pub phase1: PhaseConfig,
    pub phase2: PhaseConfig,
    pub phase3: PhaseConfig,
    /// Deadline at which a position is taken regardless of resonance
    pub force_buy_time: f64,
    /// Nothing is evaluated before this local hour
    pub peak_trigger_start: f64,
    pub outlier_detection_enabled: bool,
    /// Max distance to the nearest other source for a source to be trusted
    pub outlier_threshold: f64,
}

impl PhasedConfig {
    /// Select the active phase for a local hour.
    ///
    /// Phase 3 runs until the force-buy time; outside all phases returns `None`.
    pub fn phase_at(&self, hour: f64) -> Option<(PhaseName, &PhaseConfig)> {
        if hour >= self.phase3.start && hour < self.force_buy_time {
            Some((PhaseName::Phase3, &self.phase3))
        } else if hour >= self.phase2.start && hour < self.phase3.start {
            Some((PhaseName::Phase2, &self.phase2))
        } else if hour >= self.phase1.start && hour < self.phase2.start {
            Some((PhaseName::Phase1, &self.phase1))
        } else {
            None
        }
    }
}

impl Default for PhasedConfig {
    fn default() -> Self {
        Self {
            phase1: PhaseConfig {
                start: 14.0,
                required_resonance: 2,
                required_duration: 3,
                depth: 0.5,
                anchor_required: true,
            },
            phase2: PhaseConfig {
                start: 15.0,
                required_resonance: 2,
                required_duration: 2,
                depth: 0.3,
                anchor_required: true,
            },
            phase3: PhaseConfig {
                start: 16.0,
                required_resonance: 1,
                required_duration: 0,
                depth: 0.2,
                anchor_required: true,
            },
            force_buy_time: 17.0,
            peak_trigger_start: 14.0,
            outlier_detection_enabled: true,
            outlier_threshold: 1.5,
        }
    }
}

/// Forecast guard parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastGuardConfig {
    pub enabled: bool,
    /// Lock when the anchor keeps going missing or no forecast is available
    pub fail_safe: bool,
    /// Consecutive anchor misses before the fail-safe lock engages
    pub anchor_lock_streak: u32,
    pub recalc_interval_secs: u64,
    /// Risky sources needed to lock (never below 2)
    pub risk_source_threshold: usize,
    /// Night window risk line sits this far below the day reference max
    pub peak_threshold_c: f64,
    pub peak_min_points: usize,
    pub peak_prominence_c: f64,
    /// Unlock is not considered until this long after the risky window ends
    pub peak_passed_minutes: i64,
    pub unlock_anchor_drop_c: f64,
    pub unlock_aux_drop_c: f64,
    /// Max 2h forecast warming for a source to count as cooling
    pub unlock_future_warming_c: f64,
}

impl Default for ForecastGuardConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            fail_safe: true,
            anchor_lock_streak: 3,
            recalc_interval_secs: 1800,
            risk_source_threshold: 2,
            peak_threshold_c: 1.5,
            peak_min_points: 2,
            peak_prominence_c: 0.3,
            peak_passed_minutes: 60,
            unlock_anchor_drop_c: 0.3,
            unlock_aux_drop_c: 0.3,
            unlock_future_warming_c: 0.2,
        }
    }
}

/// Per-location market and station settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationConfig {
    /// ICAO code of the settlement station
    pub station: String,
    pub lat: f64,
    pub lon: f64,
    /// Station offset from UTC, in hours
    pub tz_offset_hours: f64,
    #[serde(default)]
    pub target_threshold: Option<f64>,
}

impl LocationConfig {
    pub fn new(station: &str, lat: f64, lon: f64, tz_offset_hours: f64) -> Self {
        Self {
            station: station.to_string(),
            lat,
            lon,
            tz_offset_hours,
            target_threshold: None,
        }
    }
}

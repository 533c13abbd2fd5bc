//! Forecast Guard - rebound risk lock per location
//!
//! Independent forecast curves are anchor-calibrated and searched for a
//! night rebound window. Enough risky sources lock the location; unlocking
//! needs the risky window to be well past, the measurements to be cooling
//! and the forecasts to agree that no warming is coming.
//!
//! Lock state lives in a per-location [`GuardEntry`] that survives day
//! rollover, so a lock taken late in the day can still hold the next
//! morning until it is explicitly released.

use chrono::{DateTime, Duration, TimeDelta, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, warn};

use super::window::{
    afternoon_max, find_risk_window, first_night_peak, local_date, nearest_value, RiskWindow,
};
use super::{ForecastPoint, ForecastSource};
use crate::config::{ForecastGuardConfig, LocationConfig};
use crate::features::three_point_cooling;
use crate::oracle::ReadingState;
use crate::types::is_real_max;

/// Risk votes needed to lock never drop below this
pub const MIN_RISK_SOURCES: usize = 2;
/// Forecasts agreeing on no warming needed to unlock
pub const MIN_COOLING_FORECASTS: usize = 2;

/// Per-source view of one risk computation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceRiskReport {
    /// Anchor minus the forecast value nearest to now
    pub bias: f64,
    pub future_max: f64,
    pub afternoon_reference_max: Option<f64>,
    pub night_peak: Option<f64>,
    pub window: Option<RiskWindow>,
    /// Max corrected forecast over the next 2h minus the anchor
    pub future_2h_warming: Option<f64>,
    pub risky: bool,
    pub description: String,
}

/// Aggregate of one risk computation across all sources
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RiskReport {
    pub risk_count: usize,
    pub available_sources: usize,
    pub sources: BTreeMap<String, SourceRiskReport>,
    pub summary_reason: String,
    /// End of the latest risky window across sources
    pub latest_risky_window_end: Option<DateTime<Utc>>,
    pub avg_afternoon_peak: Option<f64>,
    pub avg_night_peak: Option<f64>,
    pub max_bias: f64,
    pub max_2h_warming: f64,
    pub failed_sources: Vec<String>,
}

impl RiskReport {
    /// Zero-risk report used when the collaborators could not deliver
    pub fn fetch_failed(reason: impl Into<String>) -> Self {
        Self {
            summary_reason: format!("Guard fetch failed: {}", reason.into()),
            ..Default::default()
        }
    }

    /// At least two forecasts see no more than `max_warming` over the next 2h
    pub fn forecast_cooling(&self, max_warming: f64) -> bool {
        self.sources
            .values()
            .filter_map(|r| r.future_2h_warming)
            .filter(|w| *w <= max_warming)
            .count()
            >= MIN_COOLING_FORECASTS
    }
}

/// Persisted guard state for one location
#[derive(Debug, Clone, Default)]
pub struct GuardEntry {
    pub last_refresh_time: Option<DateTime<Utc>>,
    pub cached_report: Option<RiskReport>,
    pub locked: bool,
    pub lock_reason: String,
    /// Unlock is gated on this time plus `peak_passed_minutes`
    pub lock_peak_anchor_time: Option<DateTime<Utc>>,
    pub anchor_miss_streak: u32,
}

/// Verdict handed to the strategy kernel
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GuardResult {
    pub enabled: bool,
    pub locked: bool,
    pub reason: String,
    pub risk_count: usize,
    pub available_sources: usize,
    pub sources: BTreeMap<String, SourceRiskReport>,
    pub avg_afternoon_peak: Option<f64>,
    pub avg_night_peak: Option<f64>,
    pub max_bias: Option<f64>,
    pub max_2h_warming: Option<f64>,
    pub latest_risky_window_end: Option<DateTime<Utc>>,
    /// Set only while the anchor reading is missing
    pub anchor_miss_streak: Option<u32>,
}

impl GuardResult {
    fn from_report(enabled: bool, report: &RiskReport) -> Self {
        Self {
            enabled,
            locked: false,
            reason: report.summary_reason.clone(),
            risk_count: report.risk_count,
            available_sources: report.available_sources,
            sources: report.sources.clone(),
            avg_afternoon_peak: report.avg_afternoon_peak,
            avg_night_peak: report.avg_night_peak,
            max_bias: Some(report.max_bias),
            max_2h_warming: Some(report.max_2h_warming),
            latest_risky_window_end: report.latest_risky_window_end,
            anchor_miss_streak: None,
        }
    }

    /// Names of the sources currently flagged risky
    pub fn risky_sources(&self) -> Vec<&str> {
        self.sources
            .iter()
            .filter(|(_, r)| r.risky)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

pub struct ForecastGuard {
    config: ForecastGuardConfig,
    sources: Vec<Box<dyn ForecastSource>>,
    entries: HashMap<String, GuardEntry>,
}

impl ForecastGuard {
    pub fn new(config: ForecastGuardConfig, sources: Vec<Box<dyn ForecastSource>>) -> Self {
        Self {
            config,
            sources,
            entries: HashMap::new(),
        }
    }

    pub fn config(&self) -> &ForecastGuardConfig {
        &self.config
    }

    /// Guard state for a location, once it has been assessed
    pub fn entry(&self, location: &str) -> Option<&GuardEntry> {
        self.entries.get(location)
    }

    /// Assess a location against the wall clock
    pub fn assess(
        &mut self,
        location: &str,
        state: &ReadingState,
        location_config: &LocationConfig,
    ) -> GuardResult {
        self.assess_at(Utc::now(), location, state, location_config)
    }

    /// Assess a location at `now`. Never fails.
    pub fn assess_at(
        &mut self,
        now: DateTime<Utc>,
        location: &str,
        state: &ReadingState,
        location_config: &LocationConfig,
    ) -> GuardResult {
        if !self.config.enabled {
            return GuardResult::default();
        }

        // Debounced fail-safe on a missing anchor
        let anchor = match state.anchor_current {
            Some(v) => v,
            None => {
                let lock_streak = self.config.anchor_lock_streak.max(1);
                let fail_safe = self.config.fail_safe;
                let entry = self.entries.entry(location.to_string()).or_default();
                entry.anchor_miss_streak = entry.anchor_miss_streak.saturating_add(1);
                let locked = fail_safe && entry.anchor_miss_streak >= lock_streak;
                if locked {
                    warn!(
                        location,
                        streak = entry.anchor_miss_streak,
                        "forecast guard fail-safe: anchor missing"
                    );
                }
                return GuardResult {
                    enabled: true,
                    locked,
                    reason: "No anchor reading".to_string(),
                    anchor_miss_streak: Some(entry.anchor_miss_streak),
                    ..Default::default()
                };
            }
        };

        let interval = i64::try_from(self.config.recalc_interval_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(TimeDelta::MAX);
        let need_refresh = self
            .entries
            .get(location)
            .and_then(|e| e.last_refresh_time.zip(e.cached_report.as_ref()))
            .map_or(true, |(last, _)| now - last >= interval);

        let fresh = if need_refresh {
            Some(self.compute_report(now, anchor, state, location_config))
        } else {
            debug!(location, "forecast guard reusing cached report");
            None
        };

        let risk_threshold = self.config.risk_source_threshold.max(MIN_RISK_SOURCES);
        let fail_safe = self.config.fail_safe;
        let peak_passed =
            Duration::try_minutes(self.config.peak_passed_minutes).unwrap_or(TimeDelta::MAX);
        let unlock_anchor_drop = self.config.unlock_anchor_drop_c;
        let unlock_aux_drop = self.config.unlock_aux_drop_c;
        let unlock_warming = self.config.unlock_future_warming_c;

        let entry = self.entries.entry(location.to_string()).or_default();
        entry.anchor_miss_streak = 0;
        if let Some(report) = fresh {
            entry.cached_report = Some(report);
            entry.last_refresh_time = Some(now);
        }
        let report = entry.cached_report.clone().unwrap_or_default();
        let mut result = GuardResult::from_report(true, &report);

        let was_locked = entry.locked;
        let no_data_lock = report.available_sources == 0 && fail_safe;
        if report.risk_count >= risk_threshold || no_data_lock {
            entry.locked = true;
            entry.lock_reason = if report.summary_reason.is_empty() {
                "Forecast warming risk".to_string()
            } else {
                report.summary_reason.clone()
            };
            if let Some(window_end) = report.latest_risky_window_end {
                if entry.lock_peak_anchor_time.map_or(true, |prev| window_end > prev) {
                    entry.lock_peak_anchor_time = Some(window_end);
                }
            }
        }

        if entry.locked {
            let peak_passed_ok = entry
                .lock_peak_anchor_time
                .map_or(true, |t| {
                    // An unrepresentable deadline is never reached
                    t.checked_add_signed(peak_passed)
                        .map_or(false, |deadline| now >= deadline)
                });
            let measurements_ok = three_point_cooling(
                state.anchor_history.as_slice(),
                unlock_anchor_drop,
            ) && (three_point_cooling(state.aux_a_history.as_slice(), unlock_aux_drop)
                || three_point_cooling(state.aux_b_history.as_slice(), unlock_aux_drop));
            let forecast_ok = report.forecast_cooling(unlock_warming);

            if peak_passed_ok && measurements_ok && forecast_ok {
                info!(location, "forecast guard unlocked: post-peak cooling confirmed");
                debug!(location, summary = %report.summary_reason, "report at unlock");
                entry.locked = false;
                entry.lock_reason = "Unlocked: post-peak cooling confirmed".to_string();
                entry.lock_peak_anchor_time = None;
                result.reason = entry.lock_reason.clone();
            } else {
                if !was_locked {
                    warn!(
                        location,
                        risk_count = report.risk_count,
                        available = report.available_sources,
                        reason = %entry.lock_reason,
                        "forecast guard locked"
                    );
                }
                result.locked = true;
                result.reason = entry.lock_reason.clone();
                return result;
            }
        }

        result
    }

    /// Recompute the risk report from every forecast source
    fn compute_report(
        &self,
        now: DateTime<Utc>,
        anchor: f64,
        state: &ReadingState,
        location: &LocationConfig,
    ) -> RiskReport {
        if self.sources.is_empty() {
            return RiskReport {
                summary_reason: "No forecast sources available".to_string(),
                ..Default::default()
            };
        }

        let tz = location.tz_offset_hours;
        let today = local_date(now, tz);
        let day_max_so_far = if is_real_max(state.running_max_anchor) {
            state.running_max_anchor
        } else {
            anchor
        };

        let mut report = RiskReport::default();
        let mut errors: Vec<String> = Vec::new();

        for source in &self.sources {
            let name = source.name();
            let curve = match source.hourly_forecast(location) {
                Ok(c) => c,
                Err(e) => {
                    debug!(source = name, error = %e, "forecast fetch failed");
                    errors.push(format!("{}: {}", name, e));
                    report.failed_sources.push(name.to_string());
                    continue;
                }
            };

            let day_curve: Vec<ForecastPoint> = curve
                .into_iter()
                .filter(|p| local_date(p.time, tz) == today)
                .collect();
            let now_raw = match nearest_value(&day_curve, now) {
                Some(v) => v,
                None => continue,
            };

            // Anchor-calibrate the whole curve
            let bias = anchor - now_raw;
            let corrected: Vec<ForecastPoint> = day_curve
                .iter()
                .map(|p| ForecastPoint::new(p.time, p.temp_c + bias))
                .collect();

            let day_reference_max = afternoon_max(&corrected, tz)
                .map_or(day_max_so_far, |m| m.max(day_max_so_far));
            let window = find_risk_window(&corrected, tz, day_reference_max, &self.config);

            let future_max = corrected
                .iter()
                .filter(|p| p.time >= now)
                .map(|p| p.temp_c)
                .fold(None, |acc: Option<f64>, t| Some(acc.map_or(t, |a| a.max(t))))
                .unwrap_or(anchor);
            let horizon = now
                .checked_add_signed(Duration::hours(2))
                .unwrap_or(DateTime::<Utc>::MAX_UTC);
            let future_2h_warming = corrected
                .iter()
                .filter(|p| p.time >= now && p.time <= horizon)
                .map(|p| p.temp_c)
                .fold(None, |acc: Option<f64>, t| Some(acc.map_or(t, |a| a.max(t))))
                .map(|m| m - anchor);

            let risky = window.is_some();
            if let Some(w) = &window {
                report.risk_count += 1;
                if report
                    .latest_risky_window_end
                    .map_or(true, |prev| w.end_time > prev)
                {
                    report.latest_risky_window_end = Some(w.end_time);
                }
            }

            let night_peak = window
                .as_ref()
                .map(|w| w.max_temp)
                .or_else(|| first_night_peak(&corrected, tz));
            let description = window
                .as_ref()
                .map_or_else(|| "OK".to_string(), RiskWindow::describe);

            report.sources.insert(
                name.to_string(),
                SourceRiskReport {
                    bias,
                    future_max,
                    afternoon_reference_max: is_real_max(day_reference_max)
                        .then_some(day_reference_max),
                    night_peak,
                    window,
                    future_2h_warming,
                    risky,
                    description,
                },
            );
        }

        report.available_sources = report.sources.len();

        if report.available_sources == 0 && !errors.is_empty() {
            warn!(failed = errors.len(), "every forecast source failed");
            let mut failed = RiskReport::fetch_failed(errors.join("; "));
            failed.failed_sources = report.failed_sources;
            return failed;
        }

        report.summary_reason = if report.risk_count > 0 {
            let mut reasons: Vec<&str> = report
                .sources
                .values()
                .filter(|r| r.risky)
                .map(|r| r.description.as_str())
                .collect();
            reasons.sort_unstable();
            reasons.dedup();
            format!(
                "Risky forecast sources {} [{}]",
                report.risk_count,
                reasons.join(" ")
            )
        } else {
            "No warming risk detected".to_string()
        };

        let afternoon: Vec<f64> = report
            .sources
            .values()
            .filter_map(|r| r.afternoon_reference_max)
            .collect();
        let night: Vec<f64> = report.sources.values().filter_map(|r| r.night_peak).collect();
        report.avg_afternoon_peak = mean(&afternoon);
        report.avg_night_peak = mean(&night);
        report.max_bias = report
            .sources
            .values()
            .map(|r| r.bias)
            .fold(None, |acc: Option<f64>, b| Some(acc.map_or(b, |a| a.max(b))))
            .unwrap_or(0.0);
        report.max_2h_warming = report
            .sources
            .values()
            .filter_map(|r| r.future_2h_warming)
            .fold(None, |acc: Option<f64>, w| Some(acc.map_or(w, |a| a.max(w))))
            .unwrap_or(0.0);

        report
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

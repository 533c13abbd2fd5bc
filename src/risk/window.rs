//! Night risk window detection on bias-corrected forecast curves
//!
//! A risk window is a contiguous run of post-17:00 points at or above the
//! risk line (`day_reference_max - peak_threshold_c`) that lasts at least
//! `peak_min_points` and contains an interior local maximum with enough
//! prominence. The prominence filter keeps a monotonic cooling tail that
//! still sits above the risk line from counting as a rebound.

use chrono::{DateTime, Duration, NaiveDate, Timelike, Utc};
use serde::Serialize;

use super::ForecastPoint;
use crate::config::ForecastGuardConfig;

/// Local hour after which rebounds are treated as night risk
pub const NIGHT_START_HOUR: f64 = 17.0;
/// Afternoon reference window `[12, 17)`
pub const AFTERNOON_START_HOUR: f64 = 12.0;

const TEMP_EPS: f64 = 1e-6;
const PROMINENCE_EPS: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskWindow {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub start_local_hour: f64,
    pub end_local_hour: f64,
    /// Latest time the window reaches its max
    pub max_time: DateTime<Utc>,
    pub max_local_hour: f64,
    pub max_temp: f64,
    pub duration_points: usize,
    pub prominence_max: f64,
    pub risk_line: f64,
}

impl RiskWindow {
    pub fn describe(&self) -> String {
        format!(
            "night risk window [{:.1}-{:.1}h, max={:.1}C@{:.1}h, dur={}pts, prom_max={:.2}C]",
            self.start_local_hour,
            self.end_local_hour,
            self.max_temp,
            self.max_local_hour,
            self.duration_points,
            self.prominence_max
        )
    }
}

fn shift(time: DateTime<Utc>, tz_offset_hours: f64) -> DateTime<Utc> {
    Duration::try_seconds((tz_offset_hours * 3600.0).round() as i64)
        .and_then(|offset| time.checked_add_signed(offset))
        .unwrap_or(time)
}

/// Station-local fractional hour of a UTC instant
pub fn local_hour(time: DateTime<Utc>, tz_offset_hours: f64) -> f64 {
    let local = shift(time, tz_offset_hours);
    local.hour() as f64 + local.minute() as f64 / 60.0
}

/// Station-local calendar date of a UTC instant
pub fn local_date(time: DateTime<Utc>, tz_offset_hours: f64) -> NaiveDate {
    shift(time, tz_offset_hours).date_naive()
}

/// Value of the point closest in time to `at`; the earlier point wins ties
pub fn nearest_value(points: &[ForecastPoint], at: DateTime<Utc>) -> Option<f64> {
    points
        .iter()
        .min_by_key(|p| (p.time - at).num_seconds().abs())
        .map(|p| p.temp_c)
}

/// Points in `[12:00, 24:00)` local, tagged with their local hour
fn day_points(series: &[ForecastPoint], tz_offset_hours: f64) -> Vec<(ForecastPoint, f64)> {
    series
        .iter()
        .map(|p| (*p, local_hour(p.time, tz_offset_hours)))
        .filter(|(_, h)| *h >= AFTERNOON_START_HOUR && *h < 24.0)
        .collect()
}

/// Prominence of an interior local maximum (`curr > prev && curr >= next`)
fn local_peak_prominence(points: &[(ForecastPoint, f64)], i: usize) -> Option<f64> {
    if i == 0 || i + 1 >= points.len() {
        return None;
    }
    let prev = points[i - 1].0.temp_c;
    let curr = points[i].0.temp_c;
    let next = points[i + 1].0.temp_c;
    (curr > prev && curr >= next).then(|| curr - prev.max(next))
}

/// Max of the points in the afternoon reference window
pub fn afternoon_max(series: &[ForecastPoint], tz_offset_hours: f64) -> Option<f64> {
    series
        .iter()
        .filter(|p| {
            let h = local_hour(p.time, tz_offset_hours);
            (AFTERNOON_START_HOUR..NIGHT_START_HOUR).contains(&h)
        })
        .map(|p| p.temp_c)
        .fold(None, |acc: Option<f64>, t| Some(acc.map_or(t, |a| a.max(t))))
}

/// First night local maximum, or a still-rising final point
pub fn first_night_peak(series: &[ForecastPoint], tz_offset_hours: f64) -> Option<f64> {
    let points = day_points(series, tz_offset_hours);
    if points.len() < 2 {
        return None;
    }
    let interior = (1..points.len() - 1)
        .filter(|&i| points[i].1 >= NIGHT_START_HOUR)
        .find(|&i| local_peak_prominence(&points, i).is_some())
        .map(|i| points[i].0.temp_c);

    interior.or_else(|| {
        let (last, last_hour) = points[points.len() - 1];
        let prev = points[points.len() - 2].0;
        (last_hour >= NIGHT_START_HOUR && last.temp_c > prev.temp_c).then_some(last.temp_c)
    })
}

/// Strongest qualifying night risk window.
///
/// Higher max wins; on an equal max the later-ending window wins.
pub fn find_risk_window(
    series: &[ForecastPoint],
    tz_offset_hours: f64,
    day_reference_max: f64,
    config: &ForecastGuardConfig,
) -> Option<RiskWindow> {
    let min_points = config.peak_min_points.max(1);
    let min_prominence = config.peak_prominence_c.max(0.0);
    let risk_line = day_reference_max - config.peak_threshold_c;

    let points = day_points(series, tz_offset_hours);
    if points.len() < 3 {
        return None;
    }

    // Contiguous night runs at or above the risk line
    let mut segments: Vec<(usize, usize)> = Vec::new();
    let mut start: Option<usize> = None;
    for (i, (p, hour)) in points.iter().enumerate() {
        let above = *hour >= NIGHT_START_HOUR && p.temp_c >= risk_line;
        match (above, start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                segments.push((s, i - 1));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        segments.push((s, points.len() - 1));
    }

    let mut best: Option<RiskWindow> = None;
    for (left, right) in segments {
        let duration = right - left + 1;
        if duration < min_points {
            continue;
        }

        let prominence_max = match (left..=right)
            .filter_map(|j| local_peak_prominence(&points, j))
            .fold(None, |acc: Option<f64>, p| Some(acc.map_or(p, |a| a.max(p))))
        {
            Some(p) => p,
            None => continue,
        };
        if prominence_max + PROMINENCE_EPS < min_prominence {
            continue;
        }

        let max_temp = points[left..=right]
            .iter()
            .map(|(p, _)| p.temp_c)
            .fold(f64::NEG_INFINITY, f64::max);
        let max_idx = (left..=right)
            .rev()
            .find(|&j| (points[j].0.temp_c - max_temp).abs() <= TEMP_EPS)
            .unwrap_or(right);

        let candidate = RiskWindow {
            start_time: points[left].0.time,
            end_time: points[right].0.time,
            start_local_hour: points[left].1,
            end_local_hour: points[right].1,
            max_time: points[max_idx].0.time,
            max_local_hour: points[max_idx].1,
            max_temp,
            duration_points: duration,
            prominence_max,
            risk_line,
        };

        best = match best {
            None => Some(candidate),
            Some(current) => {
                let stronger = candidate.max_temp > current.max_temp + TEMP_EPS;
                let later_tie = (candidate.max_temp - current.max_temp).abs() <= TEMP_EPS
                    && candidate.end_time > current.end_time;
                if stronger || later_tie {
                    Some(candidate)
                } else {
                    Some(current)
                }
            }
        };
    }

    best
}

//! Forecast source collaborators
//!
//! The guard never fetches anything itself; it asks a [`ForecastSource`]
//! for an hourly curve and treats any error as "source unavailable".

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::LocationConfig;

/// One forecast point of an hourly curve
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub time: DateTime<Utc>,
    pub temp_c: f64,
}

impl ForecastPoint {
    pub fn new(time: DateTime<Utc>, temp_c: f64) -> Self {
        Self { time, temp_c }
    }
}

#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("forecast source {source_name} unavailable: {reason}")]
    Unavailable { source_name: String, reason: String },

    #[error("malformed forecast payload: {0}")]
    Malformed(String),

    #[error("forecast source returned no points")]
    Empty,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Provider of forward-looking hourly temperature curves
pub trait ForecastSource: Send + Sync {
    /// Stable source name used as the report key
    fn name(&self) -> &'static str;

    /// Hourly curve around the location, ordered by time
    fn hourly_forecast(&self, location: &LocationConfig)
        -> Result<Vec<ForecastPoint>, ForecastError>;
}

/// Fixed curve, for replaying recorded forecasts
#[derive(Debug, Clone)]
pub struct StaticForecast {
    name: &'static str,
    points: Vec<ForecastPoint>,
}

impl StaticForecast {
    pub fn new(name: &'static str, mut points: Vec<ForecastPoint>) -> Self {
        points.sort_by_key(|p| p.time);
        Self { name, points }
    }
}

impl ForecastSource for StaticForecast {
    fn name(&self) -> &'static str {
        self.name
    }

    fn hourly_forecast(
        &self,
        _location: &LocationConfig,
    ) -> Result<Vec<ForecastPoint>, ForecastError> {
        if self.points.is_empty() {
            return Err(ForecastError::Empty);
        }
        Ok(self.points.clone())
    }
}

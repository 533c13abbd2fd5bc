//! Oracle module - Multi-source temperature readings
//!
//! Holds the per-location reading state the kernels evaluate: the latest
//! anchor and auxiliary readings, their consensus, bounded trailing histories
//! and the day's running maxima.

mod history;
mod state;

pub use history::{BoundedHistory, HISTORY_CAPACITY};
pub use state::ReadingState;

use serde::{Deserialize, Serialize};

/// One poll tick of already-parsed readings for a location
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Observation {
    /// Station-local fractional hour (0.0 - 24.0)
    pub local_hour: f64,
    /// Authoritative station reading
    pub anchor: Option<f64>,
    pub aux_a: Option<f64>,
    pub aux_a_forecast_1h: Option<f64>,
    pub aux_b: Option<f64>,
    pub aux_b_forecast_1h: Option<f64>,
}

impl Observation {
    pub fn at(local_hour: f64) -> Self {
        Self {
            local_hour,
            ..Default::default()
        }
    }

    pub fn with_anchor(mut self, value: f64) -> Self {
        self.anchor = Some(value);
        self
    }

    pub fn with_aux_a(mut self, current: f64, forecast_1h: Option<f64>) -> Self {
        self.aux_a = Some(current);
        self.aux_a_forecast_1h = forecast_1h;
        self
    }

    pub fn with_aux_b(mut self, current: f64, forecast_1h: Option<f64>) -> Self {
        self.aux_b = Some(current);
        self.aux_b_forecast_1h = forecast_1h;
        self
    }
}

/// Arithmetic mean of the present values, `None` when nothing is present
pub(crate) fn mean_of_present(values: &[Option<f64>]) -> Option<f64> {
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    if present.is_empty() {
        return None;
    }
    Some(present.iter().sum::<f64>() / present.len() as f64)
}

//! Per-location reading state
//!
//! Created once per location at session start, advanced by [`ReadingState::ingest`]
//! on every poll tick and reset at the station's local-day rollover.

use serde::{Deserialize, Serialize};

use super::{mean_of_present, BoundedHistory, Observation};
use crate::types::{format_local_hour, is_real_max, Outcome, SourceId, MAX_SENTINEL};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadingState {
    /// Authoritative reading for the current moment
    pub anchor_current: Option<f64>,
    pub aux_a_current: Option<f64>,
    pub aux_b_current: Option<f64>,
    pub aux_a_forecast_1h: Option<f64>,
    pub aux_b_forecast_1h: Option<f64>,
    /// Mean of the present anchor / aux_a / aux_b readings
    pub consensus_current: Option<f64>,
    /// Mean of the present auxiliary 1h forecasts
    pub consensus_forecast: Option<f64>,

    pub anchor_history: BoundedHistory,
    pub aux_a_history: BoundedHistory,
    pub aux_b_history: BoundedHistory,
    pub fused_estimate_history: BoundedHistory,

    /// Station-local fractional hour
    pub local_hour: f64,

    pub running_max_anchor: f64,
    pub running_max_aux_a: f64,
    pub running_max_aux_b: f64,
    /// Consecutive ticks with the anchor strictly below its running max
    pub consecutive_drop_count: u32,
    pub has_traded_today: bool,
    /// Round-number boundary the location's market is keyed to
    pub target_threshold: Option<f64>,
}

impl Default for ReadingState {
    fn default() -> Self {
        Self {
            anchor_current: None,
            aux_a_current: None,
            aux_b_current: None,
            aux_a_forecast_1h: None,
            aux_b_forecast_1h: None,
            consensus_current: None,
            consensus_forecast: None,
            anchor_history: BoundedHistory::new(),
            aux_a_history: BoundedHistory::new(),
            aux_b_history: BoundedHistory::new(),
            fused_estimate_history: BoundedHistory::new(),
            local_hour: 0.0,
            running_max_anchor: MAX_SENTINEL,
            running_max_aux_a: MAX_SENTINEL,
            running_max_aux_b: MAX_SENTINEL,
            consecutive_drop_count: 0,
            has_traded_today: false,
            target_threshold: None,
        }
    }
}

impl ReadingState {
    pub fn new(target_threshold: Option<f64>) -> Self {
        Self {
            target_threshold,
            ..Default::default()
        }
    }

    /// Apply one poll tick.
    ///
    /// Missing readings leave their history and running max untouched. The
    /// fused-estimate history is owned by the resonance kernel and is not
    /// modified here.
    pub fn ingest(&mut self, obs: &Observation) {
        self.local_hour = obs.local_hour;
        self.anchor_current = obs.anchor;
        self.aux_a_current = obs.aux_a;
        self.aux_b_current = obs.aux_b;
        self.aux_a_forecast_1h = obs.aux_a_forecast_1h;
        self.aux_b_forecast_1h = obs.aux_b_forecast_1h;

        self.consensus_current = mean_of_present(&[obs.anchor, obs.aux_a, obs.aux_b]);
        self.consensus_forecast = mean_of_present(&[obs.aux_a_forecast_1h, obs.aux_b_forecast_1h]);

        if let Some(anchor) = obs.anchor {
            self.running_max_anchor = self.running_max_anchor.max(anchor);
            if is_real_max(self.running_max_anchor) {
                if anchor < self.running_max_anchor {
                    self.consecutive_drop_count += 1;
                } else {
                    self.consecutive_drop_count = 0;
                }
            }
            self.anchor_history.push(anchor);
        }
        if let Some(v) = obs.aux_a {
            self.running_max_aux_a = self.running_max_aux_a.max(v);
            self.aux_a_history.push(v);
        }
        if let Some(v) = obs.aux_b {
            self.running_max_aux_b = self.running_max_aux_b.max(v);
            self.aux_b_history.push(v);
        }
    }

    /// Record a fused estimate from the fit model
    pub fn push_fused_estimate(&mut self, value: f64) {
        self.fused_estimate_history.push(value);
    }

    /// Clear everything tied to the trading day
    pub fn reset_for_new_day(&mut self) {
        self.anchor_history.clear();
        self.aux_a_history.clear();
        self.aux_b_history.clear();
        self.fused_estimate_history.clear();
        self.running_max_anchor = MAX_SENTINEL;
        self.running_max_aux_a = MAX_SENTINEL;
        self.running_max_aux_b = MAX_SENTINEL;
        self.consecutive_drop_count = 0;
        self.has_traded_today = false;
    }

    /// Daily anchor max, if any anchor reading arrived today
    pub fn daily_max_anchor(&self) -> Option<f64> {
        is_real_max(self.running_max_anchor).then_some(self.running_max_anchor)
    }

    pub fn current(&self, source: SourceId) -> Option<f64> {
        match source {
            SourceId::Anchor => self.anchor_current,
            SourceId::AuxA => self.aux_a_current,
            SourceId::AuxB => self.aux_b_current,
        }
    }

    pub fn history(&self, source: SourceId) -> &BoundedHistory {
        match source {
            SourceId::Anchor => &self.anchor_history,
            SourceId::AuxA => &self.aux_a_history,
            SourceId::AuxB => &self.aux_b_history,
        }
    }

    pub fn running_max(&self, source: SourceId) -> f64 {
        match source {
            SourceId::Anchor => self.running_max_anchor,
            SourceId::AuxA => self.running_max_aux_a,
            SourceId::AuxB => self.running_max_aux_b,
        }
    }

    /// `HH:MM` rendering of the local hour
    pub fn local_time_label(&self) -> String {
        format_local_hour(self.local_hour)
    }

    /// Settle the day against the target threshold
    pub fn settle(&self) -> Outcome {
        match (self.daily_max_anchor(), self.target_threshold) {
            (Some(max), Some(target)) if max <= target => Outcome::Under,
            (Some(_), Some(_)) => Outcome::Over,
            _ => Outcome::DataMissing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ingest_updates_consensus_and_max() {
        let mut state = ReadingState::new(Some(8.0));
        state.ingest(
            &Observation::at(13.0)
                .with_anchor(9.0)
                .with_aux_a(8.0, Some(7.5))
                .with_aux_b(10.0, None),
        );

        assert_eq!(state.consensus_current, Some(9.0));
        assert_eq!(state.consensus_forecast, Some(7.5));
        assert_eq!(state.running_max_anchor, 9.0);
        assert_eq!(state.running_max_aux_b, 10.0);
        assert_eq!(state.anchor_history.len(), 1);
        assert!(state.fused_estimate_history.is_empty());
    }

    #[test]
    fn test_drop_count_resets_on_new_high() {
        let mut state = ReadingState::default();
        for anchor in [9.0, 8.0, 8.0, 7.0] {
            state.ingest(&Observation::at(15.0).with_anchor(anchor));
        }
        assert_eq!(state.consecutive_drop_count, 3);

        state.ingest(&Observation::at(15.1).with_anchor(9.0));
        assert_eq!(state.consecutive_drop_count, 0);
    }

    #[test]
    fn test_missing_anchor_keeps_drop_count() {
        let mut state = ReadingState::default();
        state.ingest(&Observation::at(15.0).with_anchor(9.0));
        state.ingest(&Observation::at(15.1).with_anchor(8.0));
        state.ingest(&Observation::at(15.2));
        assert_eq!(state.consecutive_drop_count, 1);
        assert_eq!(state.anchor_current, None);
        assert_eq!(state.consensus_current, None);
    }

    #[test]
    fn test_reset_for_new_day() {
        let mut state = ReadingState::default();
        state.ingest(&Observation::at(15.0).with_anchor(9.0).with_aux_a(9.1, None));
        state.push_fused_estimate(9.05);
        state.has_traded_today = true;

        state.reset_for_new_day();

        assert!(state.anchor_history.is_empty());
        assert!(state.fused_estimate_history.is_empty());
        assert_eq!(state.daily_max_anchor(), None);
        assert!(!state.has_traded_today);
    }

    #[test]
    fn test_settle() {
        let mut state = ReadingState::new(Some(8.0));
        assert_eq!(state.settle(), Outcome::DataMissing);

        state.ingest(&Observation::at(14.0).with_anchor(8.0));
        assert_eq!(state.settle(), Outcome::Under);

        state.ingest(&Observation::at(15.0).with_anchor(8.4));
        assert_eq!(state.settle(), Outcome::Over);
    }
}

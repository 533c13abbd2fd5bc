//! Resonance strategy
//!
//! Buys once the fused estimate is falling, enough independent sources
//! agree, and the estimate has cleanly crossed below the nearest `X.5`
//! rounding cliff.

use serde::Serialize;

use crate::config::StrategyConfig;
use crate::features::{classify_trend, count_drops, fuse_available, jump_point, predict_integer};
use crate::oracle::ReadingState;
use crate::types::{Signal, SourceId, Trend};

/// Everything the kernel learned on the way to its verdict
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResonanceMeta {
    pub fused_estimate: Option<f64>,
    /// Trend of the fused-estimate history, once evaluated
    pub trend: Option<Trend>,
    /// Sources whose own history is falling
    pub active_sources: usize,
    /// Step-wise drops summed across all histories
    pub total_drops: usize,
    /// An auxiliary reading was isolated for diverging from the anchor
    pub outlier_mode: bool,
    pub isolated: Vec<SourceId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ResonanceDecision {
    Idle {
        reason: String,
        meta: ResonanceMeta,
    },
    Wait {
        reason: String,
        meta: ResonanceMeta,
    },
    Buy {
        reason: String,
        meta: ResonanceMeta,
        /// Integer the station would report for the fused estimate
        predicted_threshold: i64,
    },
}

impl ResonanceDecision {
    pub fn signal(&self) -> Signal {
        match self {
            ResonanceDecision::Idle { .. } => Signal::Idle,
            ResonanceDecision::Wait { .. } => Signal::Wait,
            ResonanceDecision::Buy { .. } => Signal::Buy,
        }
    }

    pub fn reason(&self) -> &str {
        match self {
            ResonanceDecision::Idle { reason, .. }
            | ResonanceDecision::Wait { reason, .. }
            | ResonanceDecision::Buy { reason, .. } => reason,
        }
    }

    pub fn meta(&self) -> &ResonanceMeta {
        match self {
            ResonanceDecision::Idle { meta, .. }
            | ResonanceDecision::Wait { meta, .. }
            | ResonanceDecision::Buy { meta, .. } => meta,
        }
    }

    pub fn predicted_threshold(&self) -> Option<i64> {
        match self {
            ResonanceDecision::Buy {
                predicted_threshold,
                ..
            } => Some(*predicted_threshold),
            _ => None,
        }
    }
}

fn idle(reason: impl Into<String>, meta: ResonanceMeta) -> ResonanceDecision {
    ResonanceDecision::Idle {
        reason: reason.into(),
        meta,
    }
}

fn wait(reason: impl Into<String>, meta: ResonanceMeta) -> ResonanceDecision {
    ResonanceDecision::Wait {
        reason: reason.into(),
        meta,
    }
}

/// Evaluate the resonance strategy for one tick.
///
/// Appends the fused estimate to `state.fused_estimate_history`; nothing
/// else in the state is modified.
pub fn evaluate_resonance_strategy(
    state: &mut ReadingState,
    config: &StrategyConfig,
) -> ResonanceDecision {
    let cfg = &config.resonance;
    let mut meta = ResonanceMeta::default();

    // 1. Outlier isolation against the anchor
    let mut aux_a = state.aux_a_current;
    let mut aux_b = state.aux_b_current;
    if let Some(anchor) = state.anchor_current {
        for (source, value) in [(SourceId::AuxA, &mut aux_a), (SourceId::AuxB, &mut aux_b)] {
            if let Some(v) = *value {
                if (v - anchor).abs() > cfg.max_source_divergence {
                    *value = None;
                    meta.isolated.push(source);
                }
            }
        }
    }
    meta.outlier_mode = !meta.isolated.is_empty();

    // 2. Fuse what survived
    let fused = match fuse_available(aux_a, aux_b, &config.model) {
        Some(v) => v,
        None => return idle("No valid data sources", meta),
    };
    meta.fused_estimate = Some(fused);
    state.push_fused_estimate(fused);

    // 3. Time gate
    if !(cfg.peak_hour_start <= state.local_hour && state.local_hour <= cfg.peak_hour_end) {
        return idle(
            format!("Outside peak hours ({})", state.local_time_label()),
            meta,
        );
    }

    // 4. Forecast direction
    if cfg.require_forecast_drop {
        if let (Some(forecast), Some(current)) = (state.consensus_forecast, state.consensus_current)
        {
            if forecast > current {
                return wait("Forecast is rising, blocking entry", meta);
            }
        }
    }

    // 5. History sufficiency
    if state.fused_estimate_history.len() < 3 {
        return idle("Building fused estimate history", meta);
    }

    // 6. Trend gate
    let trend = classify_trend(state.fused_estimate_history.as_slice());
    meta.trend = Some(trend);
    if trend != Trend::Falling {
        return idle(format!("Fused estimate not dropping ({})", trend), meta);
    }

    // 7. Resonance across independent sources
    let mut anchor_falling = false;
    for (source, present) in [
        (SourceId::AuxA, aux_a.is_some()),
        (SourceId::AuxB, aux_b.is_some()),
        (SourceId::Anchor, true),
    ] {
        if !present {
            continue;
        }
        let history = state.history(source).as_slice();
        if classify_trend(history) == Trend::Falling {
            meta.active_sources += 1;
            if source == SourceId::Anchor {
                anchor_falling = true;
            }
        }
        meta.total_drops += count_drops(history);
    }

    let required = if meta.outlier_mode {
        1
    } else {
        cfg.min_resonance_sources
    };
    if meta.active_sources < required {
        return idle(
            format!(
                "Insufficient active sources ({}/{})",
                meta.active_sources, required
            ),
            meta,
        );
    }
    if meta.total_drops < cfg.total_required_drops {
        return idle(
            format!(
                "Insufficient total drops ({}/{})",
                meta.total_drops, cfg.total_required_drops
            ),
            meta,
        );
    }

    // 8. Anchor drop
    if cfg.require_anchor_drop && !anchor_falling {
        return wait("Anchor not dropping (required)", meta);
    }

    // 9. Avoidance zone: [X.5, X.5 + width)
    let jump = jump_point(fused);
    if fused >= jump && fused < jump + cfg.avoidance_width {
        return wait(
            format!(
                "Within downward avoidance zone ({:.2} near {:.1})",
                fused, jump
            ),
            meta,
        );
    }

    // 10. Entry
    let predicted_threshold = predict_integer(fused);
    tracing::debug!(
        fused_estimate = fused,
        active_sources = meta.active_sources,
        total_drops = meta.total_drops,
        outlier_mode = meta.outlier_mode,
        predicted_threshold,
        "resonance strategy aligned"
    );
    ResonanceDecision::Buy {
        reason: "All signals aligned".to_string(),
        meta,
        predicted_threshold,
    }
}

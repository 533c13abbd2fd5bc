//! Phased anchor-drop strategy
//!
//! Splits the afternoon into three phases, each with its own drop depth,
//! resonance and duration requirements. A hard deadline forces an entry even
//! if no clean drop was confirmed. A locked forecast guard vetoes everything.

use serde::Serialize;

use crate::config::StrategyConfig;
use crate::oracle::ReadingState;
use crate::risk::GuardResult;
use crate::types::{format_local_hour, is_real_max, PhaseName, Signal, SourceId};

/// Length of the force-buy window after `force_buy_time` (three minutes)
pub const FORCE_BUY_WINDOW_HOURS: f64 = 0.05;

/// Slack on the depth comparison so an exact-depth drop still counts
const DEPTH_EPSILON: f64 = 0.001;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PhasedDecision {
    Idle {
        reason: String,
    },
    Wait {
        reason: String,
    },
    BuyDrop {
        reason: String,
        phase: PhaseName,
        /// Daily anchor max the drop was measured against
        target: Option<f64>,
    },
    BuyForce {
        reason: String,
        target: f64,
    },
}

impl PhasedDecision {
    pub fn signal(&self) -> Signal {
        match self {
            PhasedDecision::Idle { .. } => Signal::Idle,
            PhasedDecision::Wait { .. } => Signal::Wait,
            PhasedDecision::BuyDrop { .. } => Signal::BuyDrop,
            PhasedDecision::BuyForce { .. } => Signal::BuyForce,
        }
    }

    pub fn reason(&self) -> &str {
        match self {
            PhasedDecision::Idle { reason }
            | PhasedDecision::Wait { reason }
            | PhasedDecision::BuyDrop { reason, .. }
            | PhasedDecision::BuyForce { reason, .. } => reason,
        }
    }

    pub fn target_threshold(&self) -> Option<f64> {
        match self {
            PhasedDecision::BuyDrop { target, .. } => *target,
            PhasedDecision::BuyForce { target, .. } => Some(*target),
            _ => None,
        }
    }
}

fn idle(reason: impl Into<String>) -> PhasedDecision {
    PhasedDecision::Idle {
        reason: reason.into(),
    }
}

fn wait(reason: impl Into<String>) -> PhasedDecision {
    PhasedDecision::Wait {
        reason: reason.into(),
    }
}

/// Sources considered trustworthy for this tick.
///
/// With detection enabled a source is trusted when its nearest other present
/// source is within `outlier_threshold`; a lone source is always trusted.
fn trusted_sources(state: &ReadingState, config: &StrategyConfig) -> Vec<SourceId> {
    let present: Vec<(SourceId, f64)> = SourceId::ALL
        .iter()
        .filter_map(|&s| state.current(s).map(|v| (s, v)))
        .collect();

    if !config.phased.outlier_detection_enabled {
        return present.into_iter().map(|(s, _)| s).collect();
    }

    present
        .iter()
        .filter(|(source, value)| {
            let nearest = present
                .iter()
                .filter(|(other, _)| other != source)
                .map(|(_, o)| (value - o).abs())
                .fold(None, |acc: Option<f64>, d| Some(acc.map_or(d, |a| a.min(d))));
            nearest.map_or(true, |d| d <= config.phased.outlier_threshold)
        })
        .map(|(s, _)| *s)
        .collect()
}

/// Evaluate the phased strategy for one tick.
///
/// `daily_max_anchor` is the day's anchor max so far (`None` before the
/// first anchor reading). Read-only with respect to `state`.
pub fn evaluate_phased_strategy(
    state: &ReadingState,
    config: &StrategyConfig,
    daily_max_anchor: Option<f64>,
    has_traded_today: bool,
    guard: Option<&GuardResult>,
) -> PhasedDecision {
    let cfg = &config.phased;

    if let Some(g) = guard {
        if g.enabled && g.locked {
            return wait(format!("ForecastGuard LOCKED ({})", g.reason));
        }
    }

    if has_traded_today {
        return idle("Already traded today");
    }

    let anchor = match state.anchor_current {
        Some(v) => v,
        None => return idle("Anchor data missing"),
    };

    let hour = state.local_hour;
    let local_time = format_local_hour(hour);

    // Hard deadline
    if hour >= cfg.force_buy_time && hour < cfg.force_buy_time + FORCE_BUY_WINDOW_HOURS {
        let target = daily_max_anchor.map_or(anchor, |max| anchor.max(max));
        tracing::debug!(
            target_threshold = target,
            local_time = %local_time,
            "phased strategy force buy"
        );
        return PhasedDecision::BuyForce {
            reason: format!("Force buy at {}", local_time),
            target,
        };
    }

    if hour < cfg.peak_trigger_start {
        return idle(format!("Before trigger window ({})", local_time));
    }

    let trusted = trusted_sources(state, config);
    if !trusted.contains(&SourceId::Anchor) {
        return wait("Anchor outlier or filtered");
    }

    let (phase, phase_cfg) = match cfg.phase_at(hour) {
        Some(p) => p,
        None => return wait(format!("Outside defined phases ({})", local_time)),
    };
    let depth = phase_cfg.depth;

    // Anchor measures against the global daily max, auxiliaries against their own
    let mut resonance = 0;
    let mut anchor_dropped = false;
    for source in trusted {
        let dropped = match source {
            SourceId::Anchor => daily_max_anchor
                .map_or(false, |max| anchor <= max - depth + DEPTH_EPSILON),
            aux => {
                let max = state.running_max(aux);
                is_real_max(max)
                    && state
                        .current(aux)
                        .map_or(false, |v| v <= max - depth + DEPTH_EPSILON)
            }
        };
        if dropped {
            resonance += 1;
            if source == SourceId::Anchor {
                anchor_dropped = true;
            }
        }
    }

    if phase_cfg.anchor_required && !anchor_dropped {
        return wait(format!(
            "Monitoring {} (Res:{}, Depth:{}, anchor drop required)",
            phase, resonance, depth
        ));
    }

    if resonance < phase_cfg.required_resonance {
        return wait(format!(
            "Monitoring {} (Res:{}/{}, Depth:{})",
            phase, resonance, phase_cfg.required_resonance, depth
        ));
    }

    let duration = state.consecutive_drop_count;
    if phase == PhaseName::Phase3 || duration >= phase_cfg.required_duration {
        tracing::debug!(
            phase = %phase,
            resonance,
            duration,
            depth,
            "phased strategy drop confirmed"
        );
        PhasedDecision::BuyDrop {
            reason: format!(
                "{} Triggered (Res:{}/{}, Dur:{}/{}, Depth:{})",
                phase,
                resonance,
                phase_cfg.required_resonance,
                duration,
                phase_cfg.required_duration,
                depth
            ),
            phase,
            target: daily_max_anchor,
        }
    } else {
        wait(format!(
            "{} Trend stabilizing (Res:{}/{}, Dur:{}/{})",
            phase, resonance, phase_cfg.required_resonance, duration, phase_cfg.required_duration
        ))
    }
}

//! Core types used throughout WeatherBot
//!
//! Defines the reading sources, trend verdicts, trade signals and settlement
//! outcomes shared by the kernel and the forecast guard.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Running-max value used before a source has produced any reading today.
pub const MAX_SENTINEL: f64 = -999.0;

/// True once a running maximum holds a real reading rather than the sentinel.
pub fn is_real_max(value: f64) -> bool {
    value > -900.0
}

/// Reading source identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SourceId {
    /// Authoritative station report (the market settles on it)
    Anchor,
    /// First auxiliary model feed
    AuxA,
    /// Second auxiliary model feed
    AuxB,
}

impl SourceId {
    pub const ALL: [SourceId; 3] = [SourceId::Anchor, SourceId::AuxA, SourceId::AuxB];
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceId::Anchor => write!(f, "anchor"),
            SourceId::AuxA => write!(f, "aux_a"),
            SourceId::AuxB => write!(f, "aux_b"),
        }
    }
}

/// Direction of a short reading history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    Rising,
    Falling,
    Flat,
}

impl Default for Trend {
    fn default() -> Self {
        Trend::Flat
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trend::Rising => write!(f, "RISING"),
            Trend::Falling => write!(f, "FALLING"),
            Trend::Flat => write!(f, "FLAT"),
        }
    }
}

/// Trade signal emitted by a kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Signal {
    Idle,
    Wait,
    /// Resonance strategy entry
    Buy,
    /// Phased strategy: confirmed drop below the daily max
    BuyDrop,
    /// Phased strategy: deadline reached
    BuyForce,
}

impl Signal {
    /// Whether the caller should open a position on this signal
    pub fn is_buy(&self) -> bool {
        matches!(self, Signal::Buy | Signal::BuyDrop | Signal::BuyForce)
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Idle => write!(f, "IDLE"),
            Signal::Wait => write!(f, "WAIT"),
            Signal::Buy => write!(f, "BUY"),
            Signal::BuyDrop => write!(f, "BUY_DROP"),
            Signal::BuyForce => write!(f, "BUY_FORCE"),
        }
    }
}

/// Phase of the afternoon used by the phased strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhaseName {
    Phase1,
    Phase2,
    Phase3,
}

impl fmt::Display for PhaseName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhaseName::Phase1 => write!(f, "Phase1"),
            PhaseName::Phase2 => write!(f, "Phase2"),
            PhaseName::Phase3 => write!(f, "Phase3"),
        }
    }
}

/// Settlement of a trading day against the market threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    /// Daily anchor max stayed at or below the threshold
    Under,
    Over,
    DataMissing,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Under => write!(f, "UNDER"),
            Outcome::Over => write!(f, "OVER"),
            Outcome::DataMissing => write!(f, "DATA_MISSING"),
        }
    }
}

/// Render a fractional local hour as `HH:MM`
pub fn format_local_hour(hour: f64) -> String {
    let total_minutes = (hour.max(0.0) * 60.0).round() as i64;
    format!("{:02}:{:02}", total_minutes / 60, total_minutes % 60)
}

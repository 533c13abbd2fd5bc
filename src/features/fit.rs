//! Physical fit model
//!
//! Blends the two auxiliary readings into a single estimate with empirically
//! fit regression weights, and maps an estimate to the integer the anchor
//! station would report.

use crate::config::FitWeights;

/// `w1 * aux_a + w2 * aux_b + bias`, `None` unless both inputs are present
pub fn fuse(aux_a: Option<f64>, aux_b: Option<f64>, w1: f64, w2: f64, bias: f64) -> Option<f64> {
    Some(w1 * aux_a? + w2 * aux_b? + bias)
}

/// Fuse whichever auxiliaries are available.
///
/// The weights are fit for the two-source case, so a lone survivor is only
/// shifted by the bias.
pub fn fuse_available(aux_a: Option<f64>, aux_b: Option<f64>, weights: &FitWeights) -> Option<f64> {
    match (aux_a, aux_b) {
        (Some(_), Some(_)) => fuse(aux_a, aux_b, weights.w1, weights.w2, weights.bias),
        (Some(v), None) | (None, Some(v)) => Some(v + weights.bias),
        (None, None) => None,
    }
}

/// Round half up: `floor(x + 0.5)`.
///
/// This is the station's own rounding convention and must not be replaced by
/// round-half-to-even; the avoidance zone depends on the asymmetry.
pub fn predict_integer(fused_estimate: f64) -> i64 {
    (fused_estimate + 0.5).floor() as i64
}

/// Lower edge of the rounding cliff nearest to the estimate (an `X.5` value)
pub fn jump_point(fused_estimate: f64) -> f64 {
    (fused_estimate + 0.5).round() - 0.5
}

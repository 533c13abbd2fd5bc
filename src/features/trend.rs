//! Trend / resonance analyzer over short bounded histories

use crate::types::Trend;

/// Default net displacement below which a history is considered flat
pub const MIN_NET_DROP: f64 = 0.01;

/// Classify a history as rising, falling or flat.
///
/// Needs at least 3 values. A single rebound tick does not flip the verdict
/// as long as the net displacement and the step counts agree.
pub fn classify_trend(values: &[f64]) -> Trend {
    classify_trend_with(values, MIN_NET_DROP)
}

pub fn classify_trend_with(values: &[f64], min_net_drop: f64) -> Trend {
    if values.len() < 3 {
        return Trend::Flat;
    }

    let net = values[values.len() - 1] - values[0];
    let (drops, rises) = step_counts(values);

    if net <= -min_net_drop && drops > rises {
        Trend::Falling
    } else if net >= min_net_drop && rises > drops {
        Trend::Rising
    } else {
        Trend::Flat
    }
}

/// Number of strict step-wise decreases
pub fn count_drops(values: &[f64]) -> usize {
    step_counts(values).0
}

/// Last three points strictly decreasing with a combined drop of at least `min_drop`
pub fn three_point_cooling(values: &[f64], min_drop: f64) -> bool {
    let [a, b, c] = match values {
        [.., a, b, c] => [*a, *b, *c],
        _ => return false,
    };
    a > b && b > c && (a - c) >= min_drop - 1e-9
}

fn step_counts(values: &[f64]) -> (usize, usize) {
    values
        .windows(2)
        .fold((0, 0), |(drops, rises), pair| match pair[1].partial_cmp(&pair[0]) {
            Some(std::cmp::Ordering::Less) => (drops + 1, rises),
            Some(std::cmp::Ordering::Greater) => (drops, rises + 1),
            _ => (drops, rises),
        })
}

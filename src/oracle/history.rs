//! Bounded trailing history of readings

use serde::{Deserialize, Serialize};

/// Number of most recent values kept per history
pub const HISTORY_CAPACITY: usize = 10;

/// Ordered trailing buffer; the oldest value is evicted first.
///
/// Insertion order matters: trend direction is read from the first and last
/// elements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundedHistory {
    values: Vec<f64>,
    capacity: usize,
}

impl BoundedHistory {
    pub fn new() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            values: Vec::with_capacity(capacity + 1),
            capacity: capacity.max(1),
        }
    }

    /// Append a value, trimming to capacity
    pub fn push(&mut self, value: f64) {
        self.values.push(value);
        if self.values.len() > self.capacity {
            let excess = self.values.len() - self.capacity;
            self.values.drain(..excess);
        }
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn last(&self) -> Option<f64> {
        self.values.last().copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}

impl Default for BoundedHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Vec<f64>> for BoundedHistory {
    fn from(values: Vec<f64>) -> Self {
        let mut history = Self::new();
        for v in values {
            history.push(v);
        }
        history
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_evicts_oldest() {
        let mut history = BoundedHistory::new();
        for i in 0..15 {
            history.push(i as f64);
        }
        assert_eq!(history.len(), HISTORY_CAPACITY);
        assert_eq!(history.as_slice()[0], 5.0);
        assert_eq!(history.last(), Some(14.0));
    }

    #[test]
    fn test_from_vec_trims() {
        let history = BoundedHistory::from((0..12).map(|i| i as f64).collect::<Vec<_>>());
        assert_eq!(history.len(), 10);
        assert_eq!(history.as_slice()[0], 2.0);
        assert_eq!(history.capacity(), HISTORY_CAPACITY);
    }

    #[test]
    fn test_custom_capacity() {
        let mut history = BoundedHistory::with_capacity(3);
        for v in [9.0, 8.5, 8.0, 7.5] {
            history.push(v);
        }
        assert_eq!(history.capacity(), 3);
        assert_eq!(history.as_slice(), &[8.5, 8.0, 7.5]);
    }
}

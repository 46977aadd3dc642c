//! Loudness tracking: per-frame amplitude samples and their rolling average.

use std::collections::VecDeque;

/// Base of every amplitude sample; silence maps exactly to this.
pub const BASE_AMPLITUDE_SCALAR: f64 = 1.25;

/// 30 seconds of history at 60 frames per second.
pub const HISTORY_CAPACITY: usize = 30 * 60;

/// Amplitude of a snapshot: `1.25 + ceil(mean) / 100`.
pub fn amplitude_of(snapshot: &[u8]) -> f64 {
    if snapshot.is_empty() {
        return BASE_AMPLITUDE_SCALAR;
    }
    let total: u64 = snapshot.iter().map(|&v| v as u64).sum();
    let mean = total as f64 / snapshot.len() as f64;
    BASE_AMPLITUDE_SCALAR + mean.ceil() / 100.0
}

/// Bounded FIFO of amplitude samples.
#[derive(Debug, Clone)]
pub struct AmplitudeTracker {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl Default for AmplitudeTracker {
    fn default() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }
}

impl AmplitudeTracker {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Append a sample, evicting the oldest first when full.
    pub fn push(&mut self, sample: f64) {
        while self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    /// Mean of the retained samples rounded to two decimals.
    ///
    /// `None` when nothing has been pushed yet.
    pub fn average(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        let mean = self.samples.iter().sum::<f64>() / self.samples.len() as f64;
        Some(((mean + f64::EPSILON) * 100.0).round() / 100.0)
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn latest(&self) -> Option<f64> {
        self.samples.back().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &f64> {
        self.samples.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amplitude_of_uniform_snapshot() {
        assert!((amplitude_of(&[100; 640]) - 2.25).abs() < 1e-12);
    }

    #[test]
    fn amplitude_rounds_mean_up() {
        // mean 0.5 -> ceil 1
        assert!((amplitude_of(&[0, 1]) - 1.26).abs() < 1e-12);
        assert_eq!(amplitude_of(&[0; 32]), BASE_AMPLITUDE_SCALAR);
        assert_eq!(amplitude_of(&[]), BASE_AMPLITUDE_SCALAR);
    }

    #[test]
    fn average_of_empty_history_is_none() {
        assert_eq!(AmplitudeTracker::default().average(), None);
    }

    #[test]
    fn average_rounds_to_two_decimals() {
        let mut t = AmplitudeTracker::default();
        t.push(1.25);
        t.push(1.26);
        t.push(1.26);
        assert_eq!(t.average(), Some(1.26));
    }

    #[test]
    fn window_keeps_last_capacity_samples() {
        let mut t = AmplitudeTracker::default();
        for i in 0..=HISTORY_CAPACITY {
            t.push(i as f64);
        }
        assert_eq!(t.len(), HISTORY_CAPACITY);
        let kept: Vec<f64> = t.iter().copied().collect();
        let expected: Vec<f64> = (1..=HISTORY_CAPACITY).map(|i| i as f64).collect();
        assert_eq!(kept, expected);
        assert_eq!(t.latest(), Some(HISTORY_CAPACITY as f64));
    }

    #[test]
    fn clear_resets() {
        let mut t = AmplitudeTracker::with_capacity(4);
        t.push(2.0);
        t.clear();
        assert!(t.is_empty());
        assert_eq!(t.capacity(), 4);
    }
}

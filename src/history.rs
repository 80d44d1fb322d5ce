// SeismoNode: Sample History

use std::collections::VecDeque;

use crate::events::SensorSample;

/// Ring of the most recent samples; pushing onto a full history drops the
/// oldest one. Queries only ever see samples that were actually pushed.
#[derive(Debug, Clone)]
pub struct SampleHistory {
    samples: VecDeque<SensorSample>,
    capacity: usize,
}

impl SampleHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, sample: SensorSample) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.samples.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn latest(&self) -> Option<&SensorSample> {
        self.samples.back()
    }

    /// Mean magnitude over the `k` newest samples (fewer if fewer are held).
    /// Zero when empty.
    pub fn average_magnitude(&self, k: usize) -> f32 {
        let n = k.min(self.samples.len());
        if n == 0 {
            return 0.0;
        }
        let sum: f32 = self.samples.iter().rev().take(n).map(|s| s.magnitude).sum();
        sum / n as f32
    }

    /// Oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &SensorSample> {
        self.samples.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_magnitude(m: f32) -> SensorSample {
        SensorSample {
            magnitude: m,
            timestamp: m as u64,
            ..Default::default()
        }
    }

    #[test]
    fn empty_history() {
        let h = SampleHistory::new(50);
        assert!(h.is_empty());
        assert!(!h.is_full());
        assert!(h.latest().is_none());
        assert_eq!(h.average_magnitude(10), 0.0);
    }

    #[test]
    fn wraps_after_capacity() {
        let mut h = SampleHistory::new(50);
        for i in 0..75 {
            h.push(with_magnitude(i as f32));
        }
        assert!(h.is_full());
        assert_eq!(h.len(), 50);
        assert_eq!(h.latest().map(|s| s.timestamp), Some(74));
        assert_eq!(h.iter().next().map(|s| s.timestamp), Some(25));

        // pushes 65..=74
        let expected = (65..75).sum::<i32>() as f32 / 10.0;
        assert!((h.average_magnitude(10) - expected).abs() < 1e-4);
    }

    #[test]
    fn average_never_reads_past_what_was_pushed() {
        let mut h = SampleHistory::new(50);
        h.push(with_magnitude(2.0));
        h.push(with_magnitude(4.0));
        assert_eq!(h.average_magnitude(10), 3.0);
        assert_eq!(h.average_magnitude(1), 4.0);
        assert_eq!(h.average_magnitude(0), 0.0);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let mut h = SampleHistory::new(0);
        h.push(with_magnitude(1.0));
        h.push(with_magnitude(2.0));
        assert_eq!(h.len(), 1);
        assert_eq!(h.capacity(), 1);
    }
}

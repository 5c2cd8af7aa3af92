//! Bounded per-tier latency samples and their summary statistics.

use std::collections::VecDeque;

use serde::Serialize;

/// One poll of one tier, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sample {
    pub response_ms: f64,
    pub reaction_ms: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LatencyStats {
    pub median: f64,
    pub max: f64,
    pub p99: f64,
}

impl LatencyStats {
    /// Summarize `values`. An empty slice yields all zeros.
    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        let n = sorted.len();

        let median = if n % 2 == 0 {
            (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
        } else {
            sorted[n / 2]
        };
        let p99_index = ((n as f64 * 0.99).floor() as usize).min(n - 1);

        Self {
            median: round2(median),
            max: round2(sorted[n - 1]),
            p99: round2(sorted[p99_index]),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TierStats {
    pub response_time: LatencyStats,
    pub reaction_time: LatencyStats,
    pub sample_count: usize,
}

/// Fixed-capacity FIFO of samples. Pushing into a full buffer evicts the oldest.
#[derive(Debug, Clone)]
pub struct RingBuffer {
    samples: VecDeque<Sample>,
    capacity: usize,
}

impl RingBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, sample: Sample) {
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

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Reaction times, oldest first.
    pub fn reaction_times(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.reaction_ms).collect()
    }

    pub fn response_times(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.response_ms).collect()
    }

    pub fn stats(&self) -> TierStats {
        TierStats {
            response_time: LatencyStats::from_values(&self.response_times()),
            reaction_time: LatencyStats::from_values(&self.reaction_times()),
            sample_count: self.samples.len(),
        }
    }
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

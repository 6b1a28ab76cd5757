use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Default number of samples kept for the moving average.
pub const DEFAULT_HISTORY_CAPACITY: usize = 30;

/// One spare-capacity reading (generation minus load, in watts).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpareCapacitySample {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Bounded FIFO window of recent spare-capacity samples.
///
/// New samples are appended at the tail; once the window holds more than
/// `capacity` samples the oldest one is evicted from the head.
#[derive(Debug, Clone)]
pub struct SpareCapacityHistory {
    samples: VecDeque<SpareCapacitySample>,
    capacity: usize,
}

impl SpareCapacityHistory {
    /// A capacity of zero is treated as one so the window can always hold the latest sample.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    pub fn record(&mut self, timestamp: DateTime<Utc>, value: f64) {
        self.samples.push_back(SpareCapacitySample { timestamp, value });
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    /// Arithmetic mean of the retained samples, `0.0` when empty.
    pub fn average(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().map(|s| s.value).sum::<f64>() / self.samples.len() as f64
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SpareCapacitySample> {
        self.samples.iter()
    }
}

impl Default for SpareCapacityHistory {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }
}

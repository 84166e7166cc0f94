//! Fixed-capacity FIFO window of per-tick stress statistics.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// Per-tick stress aggregates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StressSample {
    pub max_stress: f64,
    pub avg_stress: f64,
}

impl StressSample {
    #[must_use]
    pub const fn new(max_stress: f64, avg_stress: f64) -> Self {
        Self {
            max_stress,
            avg_stress,
        }
    }
}

/// Ring buffer of the most recent `capacity` samples, oldest first.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryWindow {
    samples: VecDeque<StressSample>,
    capacity: usize,
}

impl HistoryWindow {
    /// Default window length consumed by the prognostics model.
    pub const DEFAULT_CAPACITY: usize = 10;

    pub fn new(capacity: usize) -> Result<Self, ConfigurationError> {
        if capacity == 0 {
            return Err(ConfigurationError::invalid("history_capacity", "must be at least 1"));
        }
        Ok(Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        })
    }

    /// Appends a sample, evicting the oldest one first when full.
    pub fn push(&mut self, sample: StressSample) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.samples.len() == self.capacity
    }

    /// Samples ordered oldest to newest.
    #[must_use]
    pub fn snapshot(&self) -> Vec<StressSample> {
        self.samples.iter().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StressSample> {
        self.samples.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for HistoryWindow {
    fn default() -> Self {
        Self {
            samples: VecDeque::with_capacity(Self::DEFAULT_CAPACITY),
            capacity: Self::DEFAULT_CAPACITY,
        }
    }
}

use std::collections::VecDeque;

use dashmap::DashMap;

use crate::container::ContainerID;
use crate::model::MetricSample;

/// Number of samples kept per container unless configured otherwise.
pub const DEFAULT_HISTORY_CAPACITY: usize = 60;

/// Bounded, per-container sample history.
///
/// Samples are kept in insertion order. Once a container holds `capacity` samples, appending a
/// new one evicts the oldest.
#[derive(Debug)]
pub struct HistoryStore {
    capacity: usize,
    samples: DashMap<ContainerID, VecDeque<MetricSample>>,
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl HistoryStore {
    /// Creates a store holding at most `capacity` samples per container. A capacity of `0` is
    /// raised to `1`.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            samples: DashMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn append(&self, container_id: &ContainerID, sample: MetricSample) {
        let mut entry = self
            .samples
            .entry(container_id.clone())
            .or_insert_with(|| VecDeque::with_capacity(self.capacity));
        while entry.len() >= self.capacity {
            entry.pop_front();
        }
        entry.push_back(sample);
    }

    /// Returns the samples of a container, oldest first. Unknown containers have no history.
    pub fn get(&self, container_id: &ContainerID) -> Vec<MetricSample> {
        self.samples
            .get(container_id)
            .map(|samples| samples.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Number of containers with at least one sample.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

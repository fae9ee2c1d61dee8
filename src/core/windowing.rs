//! Sliding window of recent feature vectors.
//!
//! Samples arrive at an irregular rate; the classifier wants a fixed-shape
//! sequence. The window keeps the most recent `capacity` vectors and drops
//! the oldest on overflow.

use crate::telemetry::FeatureVector;
use std::collections::VecDeque;

/// Default number of samples per classification window.
pub const DEFAULT_SEQUENCE_LENGTH: usize = 5;

/// Fixed-capacity FIFO of feature vectors.
#[derive(Debug, Clone)]
pub struct FeatureWindow {
    capacity: usize,
    vectors: VecDeque<FeatureVector>,
}

impl FeatureWindow {
    /// Create an empty window. A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            vectors: VecDeque::with_capacity(capacity + 1),
        }
    }

    /// Append a vector, evicting from the front until within capacity.
    pub fn push(&mut self, vector: FeatureVector) {
        self.vectors.push_back(vector);
        while self.vectors.len() > self.capacity {
            self.vectors.pop_front();
        }
    }

    /// Whether the window holds exactly `capacity` vectors.
    pub fn is_full(&self) -> bool {
        self.vectors.len() == self.capacity
    }

    /// Copy of the current contents, oldest first.
    pub fn snapshot(&self) -> Vec<FeatureVector> {
        self.vectors.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for FeatureWindow {
    fn default() -> Self {
        Self::new(DEFAULT_SEQUENCE_LENGTH)
    }
}

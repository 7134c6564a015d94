// src/window.rs
use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::types::Sample;

/// Copy of the window contents at one instant, oldest sample first.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WindowSnapshot {
    pub capacity: usize,
    pub samples: Vec<Sample>,
}

impl WindowSnapshot {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn latest(&self) -> Option<Sample> {
        self.samples.last().copied()
    }

    pub fn times(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.elapsed_seconds).collect()
    }

    pub fn values(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.value).collect()
    }

    /// `[time, value]` pairs, ready for a line plot.
    pub fn points(&self) -> Vec<[f64; 2]> {
        self.samples.iter().map(Sample::as_point).collect()
    }

    /// Time span covered by the window, in seconds.
    pub fn duration_seconds(&self) -> f64 {
        match (self.samples.first(), self.samples.last()) {
            (Some(first), Some(last)) => last.elapsed_seconds - first.elapsed_seconds,
            _ => 0.0,
        }
    }

    /// `(min, max)` of the values, for axis scaling.
    pub fn value_range(&self) -> Option<(f64, f64)> {
        self.samples.iter().fold(None, |range, s| match range {
            None => Some((s.value, s.value)),
            Some((min, max)) => Some((min.min(s.value), max.max(s.value))),
        })
    }
}

/// Fixed-capacity FIFO of the most recent samples.
#[derive(Debug)]
pub struct RollingWindow {
    samples: VecDeque<Sample>,
    capacity: usize,
    evicted: u64,
}

impl RollingWindow {
    /// `capacity` is clamped to at least one sample.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            evicted: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Total samples dropped off the head so far.
    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    pub fn append(&mut self, sample: Sample) {
        self.samples.push_back(sample);
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
            self.evicted += 1;
        }
    }

    pub fn snapshot(&self) -> WindowSnapshot {
        WindowSnapshot {
            capacity: self.capacity,
            samples: self.samples.iter().copied().collect(),
        }
    }
}

/// Window handle shared between the acquisition thread and its consumers.
///
/// Every access holds the lock only for one append or one copy.
#[derive(Clone, Debug)]
pub struct SharedWindow {
    inner: Arc<Mutex<RollingWindow>>,
}

impl SharedWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(RollingWindow::new(capacity))),
        }
    }

    pub fn append(&self, sample: Sample) {
        self.inner.lock().append(sample);
    }

    pub fn snapshot(&self) -> WindowSnapshot {
        self.inner.lock().snapshot()
    }
}

// src/clock.rs
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

const MS_IN_S: f64 = 1_000.0;

/// Millisecond time source for sample timestamps.
pub trait Clock: Send {
    fn now_ms(&self) -> u64;
}

/// Monotonic clock counting from its own creation.
#[derive(Clone, Copy, Debug)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// Hand-driven clock for tests and playback.
///
/// Clones share the same time. With a non-zero `step_ms` every read advances
/// the clock afterwards, so consecutive samples get distinct timestamps.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
    step_ms: u64,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start_ms)),
            step_ms: 0,
        }
    }

    pub fn stepping(start_ms: u64, step_ms: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start_ms)),
            step_ms,
        }
    }

    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.fetch_add(self.step_ms, Ordering::SeqCst)
    }
}

/// Seconds between two millisecond timestamps, never negative.
pub fn elapsed_seconds(reference_ms: u64, now_ms: u64) -> f64 {
    now_ms.saturating_sub(reference_ms) as f64 / MS_IN_S
}

/// Time zero of a run: the timestamp of the first accepted sample.
#[derive(Clone, Copy, Debug, Default)]
pub struct EpochReference {
    reference_ms: Option<u64>,
}

impl EpochReference {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_set(&self) -> bool {
        self.reference_ms.is_some()
    }

    /// Elapsed seconds for a sample taken at `now_ms`; the first call fixes the epoch.
    pub fn stamp(&mut self, now_ms: u64) -> f64 {
        let reference = *self.reference_ms.get_or_insert(now_ms);
        elapsed_seconds(reference, now_ms)
    }
}

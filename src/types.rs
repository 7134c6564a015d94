// src/types.rs
use serde::{Deserialize, Serialize};

/// Which kind of device link an acquisition opens.
#[derive(PartialEq, Eq, Clone, Copy, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionMode {
    #[default]
    Hardware,
    Simulation,
}

/// One accepted telemetry reading.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sample {
    /// Seconds since the first accepted sample of the run (1 ms resolution).
    pub elapsed_seconds: f64,
    pub value: f64,
}

impl Sample {
    pub fn new(elapsed_seconds: f64, value: f64) -> Self {
        Self {
            elapsed_seconds,
            value,
        }
    }

    /// `[x, y]` pair in the shape plotting widgets take.
    pub fn as_point(&self) -> [f64; 2] {
        [self.elapsed_seconds, self.value]
    }
}

/// Lifecycle of one acquisition run. Transitions only move forward.
#[derive(PartialEq, Eq, Clone, Copy, Debug, Default)]
pub enum AcquisitionState {
    #[default]
    Idle,
    Running,
    Stopping,
    Stopped,
}

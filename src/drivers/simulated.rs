use std::thread;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::drivers::link::DeviceLink;
use crate::error::{AcquisitionError, AcquisitionResult};

/// Room-temperature-ish trace: slow drift plus sensor noise.
const BASE_VALUE: f64 = 22.0;
const DRIFT_AMPLITUDE: f64 = 1.5;
const NOISE: f64 = 0.15;
/// Every n-th line is corrupted, like a glitchy UART.
const GLITCH_EVERY: u64 = 37;

/// Stand-in for a sensor board when no hardware is attached.
pub struct SimulatedLink {
    period: Duration,
    phase: f64,
    emitted: u64,
    rng: StdRng,
    open: bool,
}

impl SimulatedLink {
    pub fn new(period: Duration) -> Self {
        Self::with_rng(period, StdRng::from_entropy())
    }

    /// Deterministic trace for tests.
    pub fn seeded(period: Duration, seed: u64) -> Self {
        Self::with_rng(period, StdRng::seed_from_u64(seed))
    }

    fn with_rng(period: Duration, rng: StdRng) -> Self {
        Self {
            period,
            phase: 0.0,
            emitted: 0,
            rng,
            open: true,
        }
    }

    fn next_line(&mut self) -> Vec<u8> {
        self.emitted += 1;
        if self.emitted % GLITCH_EVERY == 0 {
            return b"#\xff?\r\n".to_vec();
        }
        self.phase += 0.05;
        let value =
            BASE_VALUE + self.phase.sin() * DRIFT_AMPLITUDE + self.rng.gen_range(-NOISE..NOISE);
        format!("{value:.2}\r\n").into_bytes()
    }
}

impl DeviceLink for SimulatedLink {
    fn read_line(&mut self) -> AcquisitionResult<Option<Vec<u8>>> {
        if !self.open {
            return Err(AcquisitionError::Read(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "simulated link is closed",
            )));
        }
        thread::sleep(self.period);
        Ok(Some(self.next_line()))
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn name(&self) -> &str {
        "simulated"
    }
}

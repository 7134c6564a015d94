// src/drivers/mod.rs
pub mod link;
pub mod serial;
pub mod simulated;

pub use link::{DeviceLink, LineReader, ManualLink};
pub use serial::{describe_ports, reset_device, ControlLines, SerialLink};
pub use simulated::SimulatedLink;

use std::time::Duration;

use crate::config::AcquisitionConfig;
use crate::error::AcquisitionResult;
use crate::types::ConnectionMode;

const SIMULATED_PERIOD: Duration = Duration::from_millis(50);

/// Opens whichever link `config.mode` asks for.
pub fn open_link(config: &AcquisitionConfig) -> AcquisitionResult<Box<dyn DeviceLink>> {
    match config.mode {
        ConnectionMode::Hardware => Ok(Box::new(SerialLink::open(config)?)),
        ConnectionMode::Simulation => {
            // Keep the simulated "read" no slower than a real timed-out one.
            let period = SIMULATED_PERIOD.min(config.read_timeout());
            Ok(Box::new(SimulatedLink::new(period)))
        }
    }
}

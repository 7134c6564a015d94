//! Acquisition core for line-oriented serial sensors: reset the board, read one
//! number per line, timestamp it from the first good sample, and keep the most
//! recent readings in a rolling window that a UI thread can snapshot at will.
pub mod acquisition;
pub mod clock;
pub mod config;
pub mod drivers;
pub mod error;
pub mod notify;
pub mod parser;
pub mod types;
pub mod window;
pub use acquisition::{Acquisition, AcquisitionStats};
pub use clock::{Clock, EpochReference, ManualClock, MonotonicClock};
pub use config::AcquisitionConfig;
pub use drivers::{DeviceLink, ManualLink, SerialLink, SimulatedLink};
pub use error::{AcquisitionError, AcquisitionResult, ParseError};
pub use notify::{update_channel, Consumer, NullConsumer, UpdateReceiver, UpdateSender};
pub use parser::parse_sample;
pub use types::{AcquisitionState, ConnectionMode, Sample};
pub use window::{RollingWindow, SharedWindow, WindowSnapshot};

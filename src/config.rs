// src/config.rs
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AcquisitionError, AcquisitionResult};
use crate::types::ConnectionMode;

pub const DEFAULT_BAUD_RATE: u32 = 9600;
pub const DEFAULT_WINDOW_CAPACITY: usize = 100;
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 100;
/// Arduino-style boards reset on the DTR edge; the bootloader needs about a second.
pub const DEFAULT_SETTLE_MS: u64 = 1000;

#[cfg(windows)]
const DEFAULT_ADDRESS: &str = "COM3";
#[cfg(not(windows))]
const DEFAULT_ADDRESS: &str = "/dev/ttyACM0";

/// Everything one acquisition run needs to know about its device and buffer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    pub address: String,
    pub baud_rate: u32,
    pub window_capacity: usize,
    /// Upper bound on how long a blocked read delays `stop()`.
    pub read_timeout_ms: u64,
    pub settle_ms: u64,
    pub mode: ConnectionMode,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_owned(),
            baud_rate: DEFAULT_BAUD_RATE,
            window_capacity: DEFAULT_WINDOW_CAPACITY,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            settle_ms: DEFAULT_SETTLE_MS,
            mode: ConnectionMode::Hardware,
        }
    }
}

impl AcquisitionConfig {
    pub fn new(address: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            address: address.into(),
            baud_rate,
            ..Self::default()
        }
    }

    pub fn with_window_capacity(mut self, capacity: usize) -> Self {
        self.window_capacity = capacity;
        self
    }

    pub fn with_mode(mut self, mode: ConnectionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Loads a (possibly partial) JSON config; missing keys keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> AcquisitionResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| AcquisitionError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AcquisitionResult<()> {
        if self.mode == ConnectionMode::Hardware && self.address.trim().is_empty() {
            return Err(AcquisitionError::InvalidConfig(
                "device address must not be empty".into(),
            ));
        }
        if self.baud_rate == 0 {
            return Err(AcquisitionError::InvalidConfig(
                "baud rate must be greater than zero".into(),
            ));
        }
        if self.window_capacity == 0 {
            return Err(AcquisitionError::InvalidConfig(
                "window capacity must be greater than zero".into(),
            ));
        }
        if self.read_timeout_ms == 0 {
            return Err(AcquisitionError::InvalidConfig(
                "read timeout must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn settle_interval(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_arduino_setup() {
        let config = AcquisitionConfig::default();
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.window_capacity, 100);
        assert_eq!(config.settle_interval(), Duration::from_secs(1));
        assert_eq!(config.mode, ConnectionMode::Hardware);
        config.validate().unwrap();
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"address": "COM7", "window_capacity": 25}}"#).unwrap();
        let config = AcquisitionConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.address, "COM7");
        assert_eq!(config.window_capacity, 25);
        assert_eq!(config.baud_rate, DEFAULT_BAUD_RATE);
        assert_eq!(config.read_timeout_ms, DEFAULT_READ_TIMEOUT_MS);
    }

    #[test]
    fn mode_is_lowercase_in_json() {
        let config: AcquisitionConfig = serde_json::from_str(r#"{"mode": "simulation"}"#).unwrap();
        assert_eq!(config.mode, ConnectionMode::Simulation);
    }

    #[test]
    fn rejects_zero_capacity() {
        let config = AcquisitionConfig::default().with_window_capacity(0);
        assert!(matches!(
            config.validate(),
            Err(AcquisitionError::InvalidConfig(_))
        ));
    }

    #[test]
    fn rejects_empty_hardware_address() {
        let config = AcquisitionConfig::new("  ", 9600);
        assert!(config.validate().is_err());
        let sim = AcquisitionConfig::new("", 9600).with_mode(ConnectionMode::Simulation);
        sim.validate().unwrap();
    }

    #[test]
    fn missing_file_is_config_io() {
        let err = AcquisitionConfig::from_json_file("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, AcquisitionError::ConfigIo { .. }));
    }

    #[test]
    fn malformed_json_is_config_format() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let err = AcquisitionConfig::from_json_file(file.path()).unwrap_err();
        assert!(matches!(err, AcquisitionError::ConfigFormat(_)));
    }
}

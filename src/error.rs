// src/error.rs
use std::path::PathBuf;
use thiserror::Error;

use crate::types::AcquisitionState;

pub type AcquisitionResult<T> = Result<T, AcquisitionError>;

#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("failed to open serial port {address}: {source}")]
    Connection {
        address: String,
        #[source]
        source: serialport::Error,
    },
    #[error("device read failed: {0}")]
    Read(#[source] std::io::Error),
    #[error("cannot {operation} while {state:?}")]
    InvalidState {
        operation: &'static str,
        state: AcquisitionState,
    },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("failed to read config file {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("config file is not valid JSON: {0}")]
    ConfigFormat(#[from] serde_json::Error),
    #[error("failed to spawn acquisition thread: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("acquisition thread panicked")]
    WorkerPanicked,
}

impl AcquisitionError {
    /// Wraps an I/O failure as a connection error for `address`.
    pub fn connection(address: &str, source: impl Into<serialport::Error>) -> Self {
        AcquisitionError::Connection {
            address: address.to_owned(),
            source: source.into(),
        }
    }
}

/// Why a device line could not be turned into a sample.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("line is empty")]
    Empty,
    #[error("line is not valid UTF-8")]
    InvalidUtf8,
    #[error("{0:?} is not a number")]
    NotANumber(String),
    #[error("{0:?} is not a finite number")]
    NotFinite(String),
}

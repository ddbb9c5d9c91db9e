//! Transport error types.
//!
//! Kept separate from the bridge-level errors so the port layer can be used
//! (and mocked) on its own.

use thiserror::Error;

/// Errors raised by a serial transport.
#[derive(Debug, Error)]
pub enum PortError {
    /// The requested device does not exist.
    #[error("Serial port not found: {0}")]
    NotFound(String),

    /// An I/O error occurred while talking to the device.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The device rejected the requested settings.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The transport has already been closed.
    #[error("Port is not open")]
    NotOpen,

    /// A serialport-specific error occurred.
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),
}

impl PortError {
    /// Create a NotFound error from a device name.
    pub fn not_found(device: impl Into<String>) -> Self {
        Self::NotFound(device.into())
    }

    /// Create a Config error from a message.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

//! Bridge-level error taxonomy.
//!
//! Failures that stop a connection from being established come back from
//! `connect`. Failures after that point (read errors) end the connection and
//! are recorded for the next status query instead.

use crate::config::ConfigError;
use crate::port::PortError;
use thiserror::Error;

/// Errors surfaced by the bridge.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// `connect` was called without a port and the catalog is empty.
    #[error("No serial ports available")]
    NoPortsAvailable,

    /// The transport could not be opened.
    #[error("Failed to connect to serial port {port}: {source}")]
    OpenFailed {
        port: String,
        #[source]
        source: PortError,
    },

    /// The transport failed mid-read; the connection was dropped.
    #[error("Serial read failed: {0}")]
    ReadError(#[source] PortError),

    /// The OS refused to start the reader thread.
    #[error("Failed to start serial reading thread: {0}")]
    WorkerSpawn(#[source] std::io::Error),

    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl BridgeError {
    pub fn open_failed(port: impl Into<String>, source: PortError) -> Self {
        Self::OpenFailed {
            port: port.into(),
            source,
        }
    }
}

/// Result type for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

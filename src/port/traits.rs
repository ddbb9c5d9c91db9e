//! Core traits for the serial transport.
//!
//! `SerialPortAdapter` lets the frame assembler read from a real device or a
//! scripted mock interchangeably; `PortOpener` lets the connection manager
//! open either without knowing which.

use super::error::PortError;
use std::sync::Arc;
use std::time::Duration;

/// Settings applied when a transport is opened.
///
/// Scanners speak 8N1 without flow control, so only the baud rate and the
/// read timeout are configurable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortConfiguration {
    /// Baud rate (bits per second).
    pub baud_rate: u32,

    /// Upper bound on how long a single read may block.
    pub timeout: Duration,
}

impl Default for PortConfiguration {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            timeout: Duration::from_millis(50),
        }
    }
}

/// An open serial transport.
pub trait SerialPortAdapter: Send + std::fmt::Debug {
    /// Read available bytes into `buffer`, blocking for at most the
    /// configured timeout.
    ///
    /// Returns `Ok(0)` when the timeout elapsed with nothing received.
    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError>;

    /// Get the device name/path of this transport.
    fn name(&self) -> &str;

    /// Set the read timeout.
    fn set_timeout(&mut self, timeout: Duration) -> Result<(), PortError>;

    /// Release the underlying device.
    ///
    /// Closing twice is harmless. Reads after close fail with
    /// [`PortError::NotOpen`].
    fn close(&mut self) -> Result<(), PortError>;

    /// Get the number of bytes waiting in the receive buffer (if supported).
    fn bytes_to_read(&self) -> Option<usize> {
        None
    }

    /// A handle that can release the device from another thread while
    /// this transport is owned, and possibly blocked, elsewhere.
    fn closer(&self) -> Option<Arc<dyn PortCloser>> {
        None
    }
}

/// Releases a transport from outside the thread that reads it.
///
/// After `close`, the owner's next read fails with [`PortError::NotOpen`].
pub trait PortCloser: Send + Sync {
    fn close(&self) -> Result<(), PortError>;
}

/// Opens transports by device name.
pub trait PortOpener: Send + Sync {
    /// Open `device` with the given settings.
    fn open(
        &self,
        device: &str,
        config: &PortConfiguration,
    ) -> Result<Box<dyn SerialPortAdapter>, PortError>;
}

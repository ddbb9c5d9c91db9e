//! Hardware serial port implementation.
//!
//! Wraps the `serialport` crate's `SerialPort` trait with our own
//! `SerialPortAdapter` trait so the read loop can be driven by a mock in tests.

use super::error::PortError;
use super::traits::{PortCloser, PortConfiguration, PortOpener, SerialPortAdapter};
use parking_lot::Mutex;
use std::io::{ErrorKind, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// How long a remote close waits for an in-flight read to let go of the port.
const CLOSE_WAIT: Duration = Duration::from_millis(250);

/// Handle state shared between the reading thread and any [`PortCloser`].
struct SharedHandle {
    /// The underlying serial port; `None` once closed.
    port: Mutex<Option<Box<dyn serialport::SerialPort>>>,
    /// Set by a remote close that could not take the lock in time.
    close_requested: AtomicBool,
}

impl SharedHandle {
    fn release(&self, wait: Duration) {
        self.close_requested.store(true, Ordering::Release);
        // A read stuck in the driver keeps the lock; the reader then drops
        // the handle itself once the read returns.
        if let Some(mut port) = self.port.try_lock_for(wait) {
            port.take();
        }
    }
}

/// Serial port backed by `serialport::SerialPort`.
pub struct SyncSerialPort {
    shared: Arc<SharedHandle>,
    /// The port name/path for identification.
    name: String,
}

impl SyncSerialPort {
    /// Open a serial port with the given configuration.
    ///
    /// # Arguments
    /// * `port_name` - The system path to the serial port (e.g., "/dev/ttyUSB0" or "COM3")
    /// * `config` - Baud rate and read timeout
    ///
    /// # Example
    /// ```no_run
    /// use qr2key::port::{PortConfiguration, SyncSerialPort};
    ///
    /// let port = SyncSerialPort::open("/dev/ttyUSB0", &PortConfiguration::default())?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn open(port_name: &str, config: &PortConfiguration) -> Result<Self, PortError> {
        let port = serialport::new(port_name, config.baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .flow_control(serialport::FlowControl::None)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .timeout(config.timeout)
            .open()
            .map_err(|e| match e.kind() {
                serialport::ErrorKind::NoDevice => PortError::not_found(port_name),
                serialport::ErrorKind::InvalidInput => PortError::config(e.to_string()),
                _ => PortError::Serial(e),
            })?;

        Ok(Self {
            shared: Arc::new(SharedHandle {
                port: Mutex::new(Some(port)),
                close_requested: AtomicBool::new(false),
            }),
            name: port_name.to_string(),
        })
    }
}

impl SerialPortAdapter for SyncSerialPort {
    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        let mut guard = self.shared.port.lock();
        let port = guard.as_mut().ok_or(PortError::NotOpen)?;
        let result = match port.read(buffer) {
            Ok(n) => Ok(n),
            // serialport reports an elapsed read timeout as an error
            Err(e) if e.kind() == ErrorKind::TimedOut => Ok(0),
            Err(e) if e.kind() == ErrorKind::Interrupted => Ok(0),
            Err(e) => Err(PortError::Io(e)),
        };
        if self.shared.close_requested.load(Ordering::Acquire) {
            guard.take();
            return Err(PortError::NotOpen);
        }
        result
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn set_timeout(&mut self, timeout: Duration) -> Result<(), PortError> {
        self.shared
            .port
            .lock()
            .as_mut()
            .ok_or(PortError::NotOpen)?
            .set_timeout(timeout)
            .map_err(PortError::Serial)
    }

    fn close(&mut self) -> Result<(), PortError> {
        // Dropping the handle releases the device.
        self.shared.close_requested.store(true, Ordering::Release);
        self.shared.port.lock().take();
        Ok(())
    }

    fn bytes_to_read(&self) -> Option<usize> {
        self.shared
            .port
            .lock()
            .as_ref()
            .and_then(|p| p.bytes_to_read().ok())
            .map(|n| n as usize)
    }

    fn closer(&self) -> Option<Arc<dyn PortCloser>> {
        Some(Arc::new(SyncCloser(Arc::clone(&self.shared))))
    }
}

impl std::fmt::Debug for SyncSerialPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let port = self.shared.port.try_lock();
        f.debug_struct("SyncSerialPort")
            .field("name", &self.name)
            .field("open", &port.as_ref().map(|p| p.is_some()))
            .field(
                "baud_rate",
                &port.as_ref().and_then(|p| p.as_ref()).and_then(|p| p.baud_rate().ok()),
            )
            .finish()
    }
}

struct SyncCloser(Arc<SharedHandle>);

impl PortCloser for SyncCloser {
    fn close(&self) -> Result<(), PortError> {
        self.0.release(CLOSE_WAIT);
        Ok(())
    }
}

/// Opens real hardware ports through `serialport`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemOpener;

impl PortOpener for SystemOpener {
    fn open(
        &self,
        device: &str,
        config: &PortConfiguration,
    ) -> Result<Box<dyn SerialPortAdapter>, PortError> {
        Ok(Box::new(SyncSerialPort::open(device, config)?))
    }
}

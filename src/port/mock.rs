//! Mock serial transport for testing.
//!
//! `MockSerialPort` replays scripted byte chunks the way a scanner would emit
//! them, one chunk per read, and behaves like a real port whose read timeout
//! elapsed once the script runs dry. `MockOpener` hands out mocks by device
//! name so the connection manager can be exercised without hardware.

use super::error::PortError;
use super::traits::{PortCloser, PortConfiguration, PortOpener, SerialPortAdapter};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How often a blocked read rechecks the queue.
const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Inner state of the mock port, shared between clones.
#[derive(Debug, Default)]
struct MockPortState {
    /// Chunks returned by successive reads.
    chunks: VecDeque<Vec<u8>>,
    /// Error kind the next read fails with, if any.
    fail_next: Option<std::io::ErrorKind>,
    /// How long the next read hangs regardless of the timeout.
    stall_next: Option<Duration>,
    /// Simulated read timeout.
    timeout: Duration,
    /// Whether `close` has been called.
    closed: bool,
    /// Number of `close` calls.
    close_count: usize,
    /// Number of reads served, including empty ones.
    reads: usize,
}

/// Mock serial port.
///
/// Clones share state, so a test can keep one handle to feed data while the
/// worker owns another.
///
/// # Example
/// ```
/// use qr2key::port::{MockSerialPort, SerialPortAdapter};
///
/// let mut port = MockSerialPort::new("MOCK0");
/// port.enqueue_chunk(b"HEL");
/// port.enqueue_chunk(b"LO\n");
///
/// let mut buffer = [0u8; 16];
/// assert_eq!(port.read_bytes(&mut buffer).unwrap(), 3);
/// assert_eq!(&buffer[..3], b"HEL");
/// ```
#[derive(Clone)]
pub struct MockSerialPort {
    name: String,
    state: Arc<Mutex<MockPortState>>,
}

impl MockSerialPort {
    /// Create a new mock serial port with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(MockPortState {
                timeout: Duration::from_millis(5),
                ..Default::default()
            })),
        }
    }

    /// Queue bytes to be returned by a single subsequent read.
    pub fn enqueue_chunk(&self, data: &[u8]) {
        self.state.lock().chunks.push_back(data.to_vec());
    }

    /// Make the next read fail with an I/O error of the given kind.
    pub fn fail_next_read(&self, kind: std::io::ErrorKind) {
        self.state.lock().fail_next = Some(kind);
    }

    /// Make the next read hang for `duration`, ignoring the read timeout,
    /// the way a wedged driver would. A close during the hang makes that
    /// read fail with [`PortError::NotOpen`].
    pub fn stall_next_read(&self, duration: Duration) {
        self.state.lock().stall_next = Some(duration);
    }

    /// Whether `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Number of times `close` has been called.
    pub fn close_count(&self) -> usize {
        self.state.lock().close_count
    }

    /// Number of reads served so far.
    pub fn read_count(&self) -> usize {
        self.state.lock().reads
    }

    /// Number of bytes still queued.
    pub fn available_bytes(&self) -> usize {
        self.state.lock().chunks.iter().map(Vec::len).sum()
    }
}

impl SerialPortAdapter for MockSerialPort {
    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        let started = Instant::now();
        let stall;
        {
            let mut state = self.state.lock();
            if state.closed {
                return Err(PortError::NotOpen);
            }
            state.reads += 1;

            if let Some(kind) = state.fail_next.take() {
                return Err(PortError::Io(std::io::Error::new(kind, "simulated failure")));
            }
            stall = state.stall_next.take();
        }

        if let Some(duration) = stall {
            std::thread::sleep(duration);
            if self.state.lock().closed {
                return Err(PortError::NotOpen);
            }
        }

        // Block like a real port: return as soon as a chunk shows up, or
        // with nothing once the timeout elapses.
        loop {
            let timeout = {
                let mut state = self.state.lock();
                if let Some(mut chunk) = state.chunks.pop_front() {
                    let n = chunk.len().min(buffer.len());
                    buffer[..n].copy_from_slice(&chunk[..n]);
                    if n < chunk.len() {
                        state.chunks.push_front(chunk.split_off(n));
                    }
                    return Ok(n);
                }
                state.timeout
            };

            let elapsed = started.elapsed();
            if elapsed >= timeout {
                return Ok(0);
            }
            std::thread::sleep(POLL_INTERVAL.min(timeout - elapsed));
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn set_timeout(&mut self, timeout: Duration) -> Result<(), PortError> {
        self.state.lock().timeout = timeout;
        Ok(())
    }

    fn close(&mut self) -> Result<(), PortError> {
        self.state.lock().mark_closed();
        Ok(())
    }

    fn bytes_to_read(&self) -> Option<usize> {
        Some(self.available_bytes())
    }

    fn closer(&self) -> Option<Arc<dyn PortCloser>> {
        Some(Arc::new(MockCloser(Arc::clone(&self.state))))
    }
}

impl MockPortState {
    fn mark_closed(&mut self) {
        self.closed = true;
        self.close_count += 1;
    }
}

struct MockCloser(Arc<Mutex<MockPortState>>);

impl PortCloser for MockCloser {
    fn close(&self) -> Result<(), PortError> {
        self.0.lock().mark_closed();
        Ok(())
    }
}

impl std::fmt::Debug for MockSerialPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSerialPort")
            .field("name", &self.name)
            .field("available_bytes", &self.available_bytes())
            .finish()
    }
}

#[derive(Debug, Default)]
struct MockOpenerState {
    ports: HashMap<String, MockSerialPort>,
    opened: Vec<(String, PortConfiguration)>,
}

/// Opener that serves registered mock ports and fails for anything else.
///
/// Opening a registered device reopens it if it was closed.
#[derive(Debug, Clone, Default)]
pub struct MockOpener {
    state: Arc<Mutex<MockOpenerState>>,
}

impl MockOpener {
    /// Create an opener with no registered devices.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a mock under its own name and return a handle to it.
    pub fn register(&self, port: MockSerialPort) -> MockSerialPort {
        self.state
            .lock()
            .ports
            .insert(port.name().to_string(), port.clone());
        port
    }

    /// Devices opened so far, with the settings they were opened with.
    pub fn opened(&self) -> Vec<(String, PortConfiguration)> {
        self.state.lock().opened.clone()
    }
}

impl PortOpener for MockOpener {
    fn open(
        &self,
        device: &str,
        config: &PortConfiguration,
    ) -> Result<Box<dyn SerialPortAdapter>, PortError> {
        let mut state = self.state.lock();
        let mut port = state
            .ports
            .get(device)
            .cloned()
            .ok_or_else(|| PortError::not_found(device))?;
        // A fresh open of a previously closed device.
        port.state.lock().closed = false;
        port.set_timeout(config.timeout)?;
        state.opened.push((device.to_string(), *config));
        Ok(Box::new(port))
    }
}

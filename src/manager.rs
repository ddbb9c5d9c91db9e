//! Connection lifecycle.
//!
//! `ConnectionManager` owns the transport and the single background worker
//! that runs the [`FrameAssembler`] loop. Each connection gets its own
//! [`Session`]: a stop flag, a liveness flag, an error slot, and a channel the
//! worker uses to hand the transport back when it exits. A worker abandoned by
//! a timed-out `disconnect` can only write to its own session. The frame
//! buffer never leaves the worker.
//!
//! ```text
//!  Disconnected ──connect──> Connected
//!       ^                        │
//!       └──disconnect / read error
//! ```

use crate::catalog::PortCatalog;
use crate::error::{BridgeError, BridgeResult};
use crate::frame::{EngineConfig, FrameAssembler};
use crate::port::{PortCloser, PortOpener, SerialPortAdapter, SystemOpener};
use crate::sink::SharedSink;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{error, info, warn};

/// How long `disconnect` waits for the worker to exit.
pub const JOIN_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connected,
}

/// State shared with one worker thread.
#[derive(Debug, Default)]
struct Session {
    stop: AtomicBool,
    alive: AtomicBool,
    error: Mutex<Option<Arc<BridgeError>>>,
}

struct Worker {
    port_name: String,
    session: Arc<Session>,
    closer: Option<Arc<dyn PortCloser>>,
    done: mpsc::Receiver<Box<dyn SerialPortAdapter>>,
    handle: JoinHandle<()>,
}

/// Owns the scanner connection.
///
/// `connect` and `disconnect` take `&mut self`, so callers that share a
/// manager across threads serialize them behind their own lock.
pub struct ConnectionManager {
    config: EngineConfig,
    catalog: PortCatalog,
    opener: Box<dyn PortOpener>,
    sink: SharedSink,
    /// Error that ended a session already reaped by `disconnect`.
    last_error: Option<Arc<BridgeError>>,
    worker: Option<Worker>,
}

impl ConnectionManager {
    pub fn new(
        config: EngineConfig,
        catalog: PortCatalog,
        opener: impl PortOpener + 'static,
        sink: SharedSink,
    ) -> Self {
        Self {
            config,
            catalog,
            opener: Box::new(opener),
            sink,
            last_error: None,
            worker: None,
        }
    }

    /// Manager over the real system ports.
    pub fn system(config: EngineConfig, sink: SharedSink) -> Self {
        Self::new(config, PortCatalog::system(), SystemOpener, sink)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn catalog(&self) -> &PortCatalog {
        &self.catalog
    }

    /// Takes effect on the next `connect`.
    pub fn set_baud_rate(&mut self, baud_rate: u32) {
        self.config.baud_rate = baud_rate;
    }

    pub fn state(&self) -> ConnectionState {
        let alive = self
            .worker
            .as_ref()
            .is_some_and(|w| w.session.alive.load(Ordering::Acquire));
        if alive {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Device of the live connection, if any.
    pub fn port_name(&self) -> Option<&str> {
        if self.is_connected() {
            self.worker.as_ref().map(|w| w.port_name.as_str())
        } else {
            None
        }
    }

    /// The read error that ended the most recent connection, if it ended
    /// that way. Cleared by a successful `connect`.
    pub fn last_error(&self) -> Option<Arc<BridgeError>> {
        match &self.worker {
            Some(w) => w.session.error.lock().clone(),
            None => self.last_error.clone(),
        }
    }

    /// Connect to `port`, or to the first catalog entry when `None`.
    ///
    /// An existing connection is torn down first. Returns the device opened.
    pub fn connect(&mut self, port: Option<&str>) -> BridgeResult<String> {
        self.disconnect();

        let device = match port {
            Some(p) => p.to_string(),
            None => match self.catalog.list().into_iter().next() {
                Some(first) => first.device,
                None => {
                    error!("No serial ports available");
                    return Err(BridgeError::NoPortsAvailable);
                }
            },
        };

        let transport = self
            .opener
            .open(&device, &self.config.port_configuration())
            .map_err(|source| {
                error!(port = %device, error = %source, "Failed to connect to serial port");
                BridgeError::open_failed(device.clone(), source)
            })?;

        self.last_error = None;
        self.spawn_worker(device.clone(), transport)?;
        info!(port = %device, baud_rate = self.config.baud_rate, "Connected to serial port");
        Ok(device)
    }

    fn spawn_worker(
        &mut self,
        port_name: String,
        mut transport: Box<dyn SerialPortAdapter>,
    ) -> BridgeResult<()> {
        // Alive from the start so a read error can only ever lower it.
        let session = Arc::new(Session {
            alive: AtomicBool::new(true),
            ..Session::default()
        });
        let closer = transport.closer();
        let (done_tx, done) = mpsc::channel();

        let config = self.config;
        let sink = Arc::clone(&self.sink);
        let worker_session = Arc::clone(&session);

        let spawned = thread::Builder::new()
            .name("qr2key-reader".to_string())
            .spawn(move || {
                let mut assembler = FrameAssembler::new(&config);
                if let Some(e) = assembler.run(transport.as_mut(), &sink, &worker_session.stop) {
                    *worker_session.error.lock() = Some(Arc::new(BridgeError::ReadError(e)));
                    worker_session.alive.store(false, Ordering::Release);
                }
                if let Err(mpsc::SendError(mut transport)) = done_tx.send(transport) {
                    // The manager stopped waiting; release the device here.
                    if let Err(e) = transport.close() {
                        error!(error = %e, "Error closing serial port");
                    }
                }
            });

        match spawned {
            Ok(handle) => {
                self.worker = Some(Worker {
                    port_name,
                    session,
                    closer,
                    done,
                    handle,
                });
                Ok(())
            }
            Err(e) => {
                error!(port = %port_name, error = %e, "Failed to start serial reading thread");
                Err(BridgeError::WorkerSpawn(e))
            }
        }
    }

    /// Stop the worker and close the transport. Idempotent.
    pub fn disconnect(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };

        worker.session.stop.store(true, Ordering::Release);
        match worker.done.recv_timeout(JOIN_TIMEOUT) {
            Ok(mut transport) => {
                if worker.handle.join().is_err() {
                    error!(port = %worker.port_name, "Serial reading thread panicked");
                }
                match transport.close() {
                    Ok(()) => info!(port = %worker.port_name, "Disconnected from serial port"),
                    Err(e) => error!(
                        port = %worker.port_name,
                        error = %e,
                        "Error disconnecting from serial port"
                    ),
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    port = %worker.port_name,
                    timeout = ?JOIN_TIMEOUT,
                    "Serial reading thread did not stop in time"
                );
                // Release the device under the stuck worker; it also closes
                // the transport itself when it finally exits.
                match &worker.closer {
                    Some(closer) => {
                        if let Err(e) = closer.close() {
                            error!(
                                port = %worker.port_name,
                                error = %e,
                                "Error disconnecting from serial port"
                            );
                        }
                    }
                    None => warn!(
                        port = %worker.port_name,
                        "Transport stays open until the reading thread exits"
                    ),
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                error!(port = %worker.port_name, "Serial reading thread exited abnormally");
            }
        }

        self.last_error = worker.session.error.lock().clone();
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("state", &self.state())
            .field("port", &self.port_name())
            .field("config", &self.config)
            .finish()
    }
}

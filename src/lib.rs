//! qr2key library
//!
//! Reads a serial-attached QR/barcode scanner, cuts its byte stream into
//! frames and hands each decoded frame to an output sink.
//!
//! # Modules
//!
//! - `catalog`: Serial port discovery and preference ordering
//! - `config`: Configuration management with TOML support
//! - `decode`: Charset decoding with error substitution
//! - `error`: Bridge-level error handling
//! - `frame`: Frame assembly (delimiter and idle-timeout flushing)
//! - `logging`: Subscriber setup for the binary
//! - `manager`: Connection lifecycle and the reader thread
//! - `port`: Transport abstraction for serial communication
//! - `sink`: Output capability and built-in sinks
//!
//! # Example
//!
//! ```no_run
//! use qr2key::{shared, ConnectionManager, EngineConfig, StdoutSink};
//!
//! let mut manager = ConnectionManager::system(EngineConfig::default(), shared(StdoutSink));
//! let port = manager.connect(None)?;
//! println!("reading from {port}");
//! # Ok::<(), qr2key::BridgeError>(())
//! ```

pub mod catalog;
pub mod config;
pub mod decode;
pub mod error;
pub mod frame;
pub mod logging;
pub mod manager;
pub mod port;
pub mod sink;

// Re-export commonly used types for convenience
pub use catalog::{order_by_preference, PortCatalog, PortDescriptor, PortEnumerator, SystemEnumerator};
pub use config::{Config, ConfigError, ConfigLoader, ConfigResult};
pub use decode::FrameDecoder;
pub use error::{BridgeError, BridgeResult};
pub use frame::{EngineConfig, FrameAssembler, StepOutcome, Trigger};
pub use manager::{ConnectionManager, ConnectionState};
pub use port::{
    MockOpener, MockSerialPort, PortCloser, PortConfiguration, PortError, PortOpener,
    SerialPortAdapter, SyncSerialPort, SystemOpener,
};
pub use sink::{
    shared, ControlKey, LineSink, RecordingSink, SharedSink, Sink, SinkError, StdoutSink,
};

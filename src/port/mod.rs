//! Transport abstraction for the scanner connection.
//!
//! Provides the traits the read loop is written against, the real
//! `serialport`-backed implementation, and scripted mocks for tests.

pub mod error;
pub mod mock;
pub mod sync_port;
pub mod traits;

pub use error::PortError;
pub use mock::{MockOpener, MockSerialPort};
pub use sync_port::{SyncSerialPort, SystemOpener};
pub use traits::*;

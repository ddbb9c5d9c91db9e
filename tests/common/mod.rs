//! Shared test utilities for qr2key integration tests.
//!
//! This module provides common test infrastructure including:
//! - A connection manager wired to mock ports and a recording sink
//! - Polling helpers for waiting on the reader thread

#![allow(dead_code)]

use qr2key::catalog::{PortDescriptor, PortEnumerator};
use qr2key::{
    shared, ConnectionManager, EngineConfig, MockOpener, MockSerialPort, PortCatalog, PortError,
    RecordingSink,
};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Upper bound for anything the reader thread is expected to do.
pub const DEADLINE: Duration = Duration::from_secs(3);

/// Enumerator returning a fixed list.
pub struct FixedPorts(pub Vec<PortDescriptor>);

impl PortEnumerator for FixedPorts {
    fn enumerate(&self) -> Result<Vec<PortDescriptor>, PortError> {
        Ok(self.0.clone())
    }
}

/// A manager plus handles to everything it talks to.
pub struct Harness {
    pub manager: ConnectionManager,
    pub opener: MockOpener,
    pub sink: RecordingSink,
    ports: HashMap<String, MockSerialPort>,
}

impl Harness {
    /// Build a harness with one registered mock per descriptor.
    pub fn new(config: EngineConfig, ports: Vec<PortDescriptor>) -> Self {
        let opener = MockOpener::new();
        let handles = ports
            .iter()
            .map(|p| {
                let handle = opener.register(MockSerialPort::new(p.device.clone()));
                (p.device.clone(), handle)
            })
            .collect();
        let sink = RecordingSink::new();
        let manager = ConnectionManager::new(
            config,
            PortCatalog::new(FixedPorts(ports)),
            opener.clone(),
            shared(sink.clone()),
        );
        Self {
            manager,
            opener,
            sink,
            ports: handles,
        }
    }

    /// Harness with default settings and a single port named `device`.
    pub fn single(device: &str) -> Self {
        Self::new(
            EngineConfig::default(),
            vec![PortDescriptor::new(device, "USB-SERIAL CH340")],
        )
    }

    /// Handle to a port registered at construction.
    pub fn port(&self, device: &str) -> MockSerialPort {
        self.ports
            .get(device)
            .cloned()
            .unwrap_or_else(|| panic!("no mock port named {device}"))
    }

    /// Wait until the sink has recorded at least `count` frames.
    pub fn wait_for_frames(&self, count: usize) -> Vec<String> {
        wait_until(|| self.sink.frames().len() >= count);
        self.sink.frames()
    }
}

/// Poll `cond` until it holds or [`DEADLINE`] passes. Returns the final value.
pub fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + DEADLINE;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    cond()
}

/// Engine settings with a custom read/idle timeout.
pub fn config_with_timeout(timeout: Duration) -> EngineConfig {
    EngineConfig {
        read_timeout: timeout,
        ..EngineConfig::default()
    }
}

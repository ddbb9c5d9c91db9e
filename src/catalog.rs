//! Serial port discovery.
//!
//! `PortCatalog` asks a [`PortEnumerator`] for the ports the OS knows about
//! and orders them so USB-serial bridges commonly found in scanners come
//! first. Enumeration failure is never fatal: it is logged and reported as an
//! empty catalog.

use crate::port::PortError;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, error, info};

/// Description substrings that mark a preferred USB-serial chip.
pub const PREFERRED_CHIPS: &[&str] = &["CH340", "FTDI"];

/// Chip labels for USB vendor IDs seen on scanner hardware.
const KNOWN_VENDORS: &[(u16, &str)] = &[(0x1A86, "CH340"), (0x0403, "FTDI")];

/// A serial endpoint as reported by a single enumeration call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortDescriptor {
    /// OS device identifier (e.g. "/dev/ttyUSB0" or "COM3").
    pub device: String,
    /// Free-text label.
    pub description: String,
}

impl PortDescriptor {
    pub fn new(device: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            description: description.into(),
        }
    }

    /// Whether the description names one of the [`PREFERRED_CHIPS`].
    pub fn is_preferred(&self) -> bool {
        PREFERRED_CHIPS
            .iter()
            .any(|chip| self.description.contains(chip))
    }
}

/// The OS query boundary: lists raw port descriptors in scan order.
#[cfg_attr(test, mockall::automock)]
pub trait PortEnumerator: Send + Sync {
    fn enumerate(&self) -> Result<Vec<PortDescriptor>, PortError>;
}

/// Enumerates ports through `serialport::available_ports`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemEnumerator;

impl PortEnumerator for SystemEnumerator {
    fn enumerate(&self) -> Result<Vec<PortDescriptor>, PortError> {
        let ports = serialport::available_ports()?;
        Ok(ports
            .into_iter()
            .map(|p| PortDescriptor {
                description: describe(&p.port_type),
                device: p.port_name,
            })
            .collect())
    }
}

fn describe(port_type: &serialport::SerialPortType) -> String {
    match port_type {
        serialport::SerialPortType::UsbPort(usb) => {
            let mut parts: Vec<&str> = usb
                .product
                .iter()
                .chain(usb.manufacturer.iter())
                .map(String::as_str)
                .collect();
            if let Some(&(_, chip)) = KNOWN_VENDORS.iter().find(|(vid, _)| *vid == usb.vid) {
                if !parts.iter().any(|p| p.contains(chip)) {
                    parts.push(chip);
                }
            }
            if parts.is_empty() {
                format!("USB Serial Device ({:04X}:{:04X})", usb.vid, usb.pid)
            } else {
                parts.join(" - ")
            }
        }
        serialport::SerialPortType::BluetoothPort => "Bluetooth Serial Port".to_string(),
        serialport::SerialPortType::PciPort => "PCI Serial Port".to_string(),
        serialport::SerialPortType::Unknown => "n/a".to_string(),
    }
}

/// Stable partition: preferred chips first, then everything else, each group
/// in scan order. Later duplicates of a device are dropped.
pub fn order_by_preference(ports: Vec<PortDescriptor>) -> Vec<PortDescriptor> {
    let (preferred, rest): (Vec<_>, Vec<_>) =
        ports.into_iter().partition(PortDescriptor::is_preferred);

    let mut seen = HashSet::new();
    preferred
        .into_iter()
        .chain(rest)
        .filter(|p| seen.insert(p.device.clone()))
        .collect()
}

/// Ordered view over the available serial ports.
pub struct PortCatalog {
    enumerator: Box<dyn PortEnumerator>,
    last: Mutex<Vec<PortDescriptor>>,
}

impl PortCatalog {
    pub fn new(enumerator: impl PortEnumerator + 'static) -> Self {
        Self {
            enumerator: Box::new(enumerator),
            last: Mutex::new(Vec::new()),
        }
    }

    /// Catalog over the real system ports.
    pub fn system() -> Self {
        Self::new(SystemEnumerator)
    }

    /// Enumerate and order the ports, surfacing a query failure.
    pub fn try_list(&self) -> Result<Vec<PortDescriptor>, PortError> {
        let ports = order_by_preference(self.enumerator.enumerate()?);
        info!(count = ports.len(), "Found serial ports");
        for port in &ports {
            debug!(device = %port.device, description = %port.description, "Serial port");
        }
        *self.last.lock() = ports.clone();
        Ok(ports)
    }

    /// Enumerate and order the ports. A failed query yields an empty list.
    pub fn list(&self) -> Vec<PortDescriptor> {
        self.try_list().unwrap_or_else(|e| {
            error!(error = %e, "Error getting available ports");
            self.last.lock().clear();
            Vec::new()
        })
    }

    /// Result of the most recent `list` call.
    pub fn last_listed(&self) -> Vec<PortDescriptor> {
        self.last.lock().clone()
    }
}

impl std::fmt::Debug for PortCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortCatalog")
            .field("last_listed", &self.last.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn devices(ports: &[PortDescriptor]) -> Vec<&str> {
        ports.iter().map(|p| p.device.as_str()).collect()
    }

    #[test]
    fn test_preferred_chips_first_in_scan_order() {
        let ports = vec![
            PortDescriptor::new("/dev/ttyS0", "ttyS0"),
            PortDescriptor::new("/dev/ttyUSB1", "FTDI FT232R USB UART"),
            PortDescriptor::new("/dev/ttyACM0", "Arduino Uno"),
            PortDescriptor::new("/dev/ttyUSB0", "USB-SERIAL CH340"),
        ];

        let ordered = order_by_preference(ports);
        assert_eq!(
            devices(&ordered),
            vec!["/dev/ttyUSB1", "/dev/ttyUSB0", "/dev/ttyS0", "/dev/ttyACM0"]
        );
    }

    #[test]
    fn test_match_is_case_sensitive() {
        let ordered = order_by_preference(vec![
            PortDescriptor::new("A", "generic"),
            PortDescriptor::new("B", "ftdi clone"),
            PortDescriptor::new("C", "ch340"),
        ]);
        assert_eq!(devices(&ordered), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_duplicates_removed() {
        let ordered = order_by_preference(vec![
            PortDescriptor::new("COM3", "USB-SERIAL CH340"),
            PortDescriptor::new("COM1", "Communications Port"),
            PortDescriptor::new("COM3", "USB-SERIAL CH340"),
            PortDescriptor::new("COM1", "Communications Port"),
        ]);
        assert_eq!(devices(&ordered), vec!["COM3", "COM1"]);
    }

    #[test]
    fn test_list_uses_enumerator() {
        let mut enumerator = MockPortEnumerator::new();
        enumerator.expect_enumerate().times(1).returning(|| {
            Ok(vec![
                PortDescriptor::new("COM1", "Communications Port"),
                PortDescriptor::new("COM4", "FTDI USB Serial"),
            ])
        });

        let catalog = PortCatalog::new(enumerator);
        let ports = catalog.list();
        assert_eq!(devices(&ports), vec!["COM4", "COM1"]);
        assert_eq!(catalog.last_listed(), ports);
    }

    #[test]
    fn test_enumeration_failure_is_empty() {
        let mut enumerator = MockPortEnumerator::new();
        enumerator
            .expect_enumerate()
            .returning(|| Err(PortError::config("permission denied")));

        let catalog = PortCatalog::new(enumerator);
        assert!(catalog.list().is_empty());
        assert!(catalog.last_listed().is_empty());
        assert!(catalog.try_list().is_err());
    }

    #[test]
    fn test_usb_description_adds_chip_label() {
        let usb = serialport::SerialPortType::UsbPort(serialport::UsbPortInfo {
            vid: 0x1A86,
            pid: 0x7523,
            serial_number: None,
            manufacturer: None,
            product: Some("USB2.0-Serial".to_string()),
        });
        assert_eq!(describe(&usb), "USB2.0-Serial - CH340");
    }
}

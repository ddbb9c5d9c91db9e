//! Configuration schema definitions.
//!
//! Every section is `#[serde(default)]`, so a partial file (or none at all)
//! falls back to the documented defaults key by key. Unknown keys are ignored.

use crate::decode::{FrameDecoder, REPLACEMENT_CHAR};
use crate::frame::{EngineConfig, DEFAULT_BAUD_RATE};
use encoding_rs::SHIFT_JIS;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Default read timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: f64 = 0.05;

/// Default encoding label.
pub const DEFAULT_ENCODING: &str = "shift_jis";

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Scanner connection settings
    pub serial: SerialConfig,
    /// Logging settings
    pub logging: LoggingConfig,
}

/// Serial/scanner configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Baud rate for new connections
    pub baud_rate: u32,
    /// Read timeout in seconds; also the idle gap that ends a frame
    pub timeout: f64,
    /// WHATWG encoding label of the scanner output
    pub encoding: String,
    /// Character substituted for undecodable bytes
    pub error_char: char,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            timeout: DEFAULT_TIMEOUT_SECS,
            encoding: DEFAULT_ENCODING.to_string(),
            error_char: REPLACEMENT_CHAR,
        }
    }
}

impl SerialConfig {
    /// Get the read timeout as Duration, falling back to the default for
    /// negative or non-finite values.
    pub fn read_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout).unwrap_or_else(|_| {
            warn!(timeout = self.timeout, "Invalid serial timeout, using default");
            Duration::from_secs_f64(DEFAULT_TIMEOUT_SECS)
        })
    }

    /// Build the engine settings. An unknown encoding falls back to Shift-JIS.
    pub fn engine_config(&self) -> EngineConfig {
        let decoder = FrameDecoder::for_label(&self.encoding, self.error_char).unwrap_or_else(|| {
            warn!(encoding = %self.encoding, "Unknown encoding, using Shift_JIS");
            FrameDecoder::new(SHIFT_JIS, self.error_char)
        });

        EngineConfig {
            baud_rate: self.baud_rate,
            read_timeout: self.read_timeout(),
            encoding: decoder.encoding(),
            error_char: decoder.error_char(),
        }
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Log file path; stderr when unset
    pub file: Option<PathBuf>,
    /// Log format: "pretty" or "compact"
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            format: LogFormat::Compact,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-line format with colors
    Pretty,
    /// Single-line format
    #[default]
    Compact,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.serial.baud_rate, 9600);
        assert_eq!(config.serial.timeout, 0.05);
        assert_eq!(config.serial.encoding, "shift_jis");
        assert_eq!(config.serial.error_char, '\u{FFFD}');
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_engine_config_from_defaults() {
        let engine = SerialConfig::default().engine_config();
        assert_eq!(engine, EngineConfig::default());
    }

    #[test]
    fn test_partial_deserialization() {
        let toml_str = r#"
            [serial]
            baud_rate = 115200
            error_char = "?"
            flow = "ignored"
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.serial.baud_rate, 115200);
        assert_eq!(config.serial.error_char, '?');
        // Defaults should still work
        assert_eq!(config.serial.timeout, 0.05);
        assert_eq!(config.serial.encoding, "shift_jis");
        assert_eq!(config.logging.format, LogFormat::Compact);
    }

    #[test]
    fn test_unknown_encoding_falls_back() {
        let serial = SerialConfig {
            encoding: "ebcdic-37".to_string(),
            ..SerialConfig::default()
        };
        assert_eq!(serial.engine_config().encoding, SHIFT_JIS);
    }

    #[test]
    fn test_invalid_timeout_falls_back() {
        let serial = SerialConfig {
            timeout: -1.0,
            ..SerialConfig::default()
        };
        assert_eq!(serial.read_timeout(), Duration::from_millis(50));

        let serial = SerialConfig {
            timeout: 0.2,
            ..SerialConfig::default()
        };
        assert_eq!(serial.read_timeout(), Duration::from_millis(200));
    }

    #[test]
    fn test_config_serialization() {
        let toml_str = toml::to_string_pretty(&Config::default()).unwrap();
        assert!(toml_str.contains("[serial]"));
        assert!(toml_str.contains("[logging]"));
    }
}

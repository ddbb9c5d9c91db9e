//! Configuration module for qr2key.
//!
//! This module provides TOML-based configuration with environment variable overrides.
//!
//! # Configuration Resolution
//!
//! Configuration is loaded from the following locations (in order of priority):
//!
//! 1. `QR2KEY_CONFIG` environment variable (explicit path)
//! 2. `./config.toml` (current directory)
//! 3. `<platform config dir>/qr2key/config.toml`
//! 4. Built-in defaults (no file required)
//!
//! # Environment Overrides
//!
//! - `QR2KEY_SERIAL_BAUD_RATE`, `QR2KEY_SERIAL_TIMEOUT`, `QR2KEY_SERIAL_ENCODING`
//! - `QR2KEY_LOG_LEVEL`, `QR2KEY_LOG_FILE`
//!
//! # Example
//!
//! ```toml
//! [serial]
//! baud_rate = 9600
//! timeout = 0.05
//! encoding = "shift_jis"
//! error_char = "?"
//!
//! [logging]
//! level = "info"
//! file = "/var/log/qr2key.log"
//! ```

mod error;
mod loader;
mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{
    get_default_config_dir, get_default_config_path, resolve_config_path, ConfigLoader,
};
pub use schema::{
    Config, LogFormat, LoggingConfig, SerialConfig, DEFAULT_ENCODING, DEFAULT_TIMEOUT_SECS,
};

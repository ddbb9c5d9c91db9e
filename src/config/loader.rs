//! Configuration loader with file resolution and environment override support.

use super::error::{ConfigError, ConfigResult};
use super::schema::Config;
use std::path::{Path, PathBuf};

/// Environment variable prefix for overrides
const ENV_PREFIX: &str = "QR2KEY";

/// Config file name
const CONFIG_FILE_NAME: &str = "config.toml";

/// Environment variable for explicit config path
const CONFIG_PATH_ENV: &str = "QR2KEY_CONFIG";

/// Configuration loader with resolution and override logic.
#[derive(Debug)]
pub struct ConfigLoader {
    /// Resolved config file path (if any)
    pub config_path: Option<PathBuf>,
    /// The loaded configuration
    pub config: Config,
    /// Environment overrides that were ignored because they did not parse.
    pub warnings: Vec<ConfigError>,
}

impl ConfigLoader {
    /// Load configuration using standard resolution order.
    ///
    /// Resolution priority (highest to lowest):
    /// 1. `QR2KEY_CONFIG` environment variable (explicit path)
    /// 2. `./config.toml` (current directory)
    /// 3. `<platform config dir>/qr2key/config.toml`
    /// 4. Built-in defaults (no file required)
    ///
    /// Environment variables can override any config file values. An
    /// override that does not parse is skipped and recorded in `warnings`.
    pub fn load() -> ConfigResult<Self> {
        let config_path = resolve_config_path();

        let mut config = if let Some(ref path) = config_path {
            load_from_file(path)?
        } else {
            Config::default()
        };

        let warnings = apply_env_overrides(&mut config);

        Ok(Self {
            config_path,
            config,
            warnings,
        })
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut config = load_from_file(&path)?;
        let warnings = apply_env_overrides(&mut config);

        Ok(Self {
            config_path: Some(path),
            config,
            warnings,
        })
    }

    /// Create a loader with default configuration (no file).
    pub fn with_defaults() -> Self {
        let mut config = Config::default();
        // Still apply env overrides even with defaults
        let warnings = apply_env_overrides(&mut config);

        Self {
            config_path: None,
            config,
            warnings,
        }
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Consume the loader and return the configuration.
    pub fn into_config(self) -> Config {
        self.config
    }
}

/// Resolve the configuration file path using standard locations.
pub fn resolve_config_path() -> Option<PathBuf> {
    // 1. Explicit environment variable
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. Current directory
    let cwd_config = PathBuf::from(CONFIG_FILE_NAME);
    if cwd_config.exists() {
        return Some(cwd_config);
    }

    // 3. Platform config directory
    get_default_config_path().filter(|p| p.exists())
}

/// Get the default config directory for creating new config files.
pub fn get_default_config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "qr2key").map(|d| d.config_dir().to_path_buf())
}

/// Get the default config file path for creating new config files.
pub fn get_default_config_path() -> Option<PathBuf> {
    get_default_config_dir().map(|d| d.join(CONFIG_FILE_NAME))
}

/// Load configuration from a file.
fn load_from_file(path: &Path) -> ConfigResult<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&content).map_err(ConfigError::ParseError)
}

fn env_var(key: &str) -> Option<(String, String)> {
    let var = format!("{}_{}", ENV_PREFIX, key);
    std::env::var(&var).ok().map(|val| (var, val))
}

/// Apply environment variable overrides to the configuration.
///
/// Environment variables follow the pattern: `QR2KEY_<SECTION>_<KEY>`
/// For example:
/// - `QR2KEY_SERIAL_BAUD_RATE=115200`
/// - `QR2KEY_SERIAL_TIMEOUT=0.1`
/// - `QR2KEY_LOG_LEVEL=debug`
///
/// A value that does not parse leaves the setting as it was; the error is
/// returned so the caller can report it once logging is up.
fn apply_env_overrides(config: &mut Config) -> Vec<ConfigError> {
    let mut warnings = Vec::new();

    if let Some((var, val)) = env_var("SERIAL_BAUD_RATE") {
        match val.trim().parse() {
            Ok(baud_rate) => config.serial.baud_rate = baud_rate,
            Err(_) => warnings.push(ConfigError::env_parse(var, "Invalid baud rate")),
        }
    }
    if let Some((var, val)) = env_var("SERIAL_TIMEOUT") {
        match val.trim().parse() {
            Ok(timeout) => config.serial.timeout = timeout,
            Err(_) => warnings.push(ConfigError::env_parse(var, "Invalid timeout")),
        }
    }
    if let Some((_, val)) = env_var("SERIAL_ENCODING") {
        config.serial.encoding = val;
    }

    if let Some((_, val)) = env_var("LOG_LEVEL") {
        config.logging.level = val;
    }
    if let Some((_, val)) = env_var("LOG_FILE") {
        config.logging.file = Some(PathBuf::from(val));
    }

    warnings
}

//! Configuration module for serial-telemetry
//!
//! Configuration is a TOML file with one table per concern:
//!
//! ```toml
//! [link]
//! port = "/dev/ttyACM0"
//! baud_rate = 115200
//! read_timeout_ms = 2000
//!
//! [link.reset]
//! enabled = true
//! low_ms = 1000
//! settle_ms = 2000
//!
//! [protocol]
//! format_header = "log_format"
//! readings_header = "sensor_readings"
//!
//! [recording]
//! enabled = true
//! path = "readings.jsonl"
//!
//! [logging]
//! directory = "logs"
//!
//! [session]
//! duration_secs = 15
//! ```
//!
//! Every field has a default, so an empty file (or no file at all) is valid.
//!
//! # Config Location
//!
//! When no path is given the config is read from the platform config directory
//! under `dev.hxyulin.serial-telemetry`:
//! - **Linux**: `~/.config/dev.hxyulin.serial-telemetry/config.toml`
//! - **macOS**: `~/Library/Application Support/dev.hxyulin.serial-telemetry/config.toml`
//! - **Windows**: `%APPDATA%\dev.hxyulin.serial-telemetry\config.toml`

use crate::error::{Result, TelemetryError};
use crate::protocol::{line::DEFAULT_MAX_LINE_LEN, FORMAT_HEADER, READINGS_HEADER};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application identifier for config directories
pub const APP_ID: &str = "dev.hxyulin.serial-telemetry";

/// Config filename
pub const CONFIG_FILE: &str = "config.toml";

/// Default link speed. Some firmware variants run at 500000.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Default read timeout in milliseconds; also the worst-case stop latency
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 2000;

/// How long DTR is held low to reset the device
pub const DEFAULT_RESET_LOW_MS: u64 = 1000;

/// How long to wait after raising DTR for the device to boot
pub const DEFAULT_RESET_SETTLE_MS: u64 = 1000;

/// Default run time of the logging binary
pub const DEFAULT_SESSION_SECS: u64 = 15;

// ==================== Config Location ====================

/// Get the application config directory path
pub fn config_dir() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_ID))
}

/// Get the path to the default config file
pub fn default_config_path() -> Option<PathBuf> {
    config_dir().map(|p| p.join(CONFIG_FILE))
}

// ==================== App Config ====================

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub link: LinkConfig,

    #[serde(default)]
    pub protocol: ProtocolConfig,

    #[serde(default)]
    pub recording: RecordingConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub session: SessionConfig,
}

impl AppConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a config from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| TelemetryError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            TelemetryError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        Self::from_toml(&content)
            .map_err(|e| e.with_context(format!("Invalid config file {:?}", path)))
    }

    /// Load the config at `path`, or the default location when `None`
    ///
    /// A missing default config is not an error; defaults are used.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => match default_config_path() {
                Some(path) if path.exists() => Self::load(path),
                _ => {
                    tracing::debug!("No config file found, using defaults");
                    Ok(Self::default())
                }
            },
        }
    }

    /// Save the config to disk as TOML
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                TelemetryError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| TelemetryError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content).map_err(|e| {
            TelemetryError::Config(format!("Failed to write config file {:?}: {}", path, e))
        })
    }

    /// Reject values the reader cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.link.baud_rate == 0 {
            return Err(TelemetryError::Config("baud_rate must be non-zero".to_string()));
        }
        if self.link.read_timeout_ms == 0 {
            return Err(TelemetryError::Config(
                "read_timeout_ms must be non-zero".to_string(),
            ));
        }
        if self.link.max_line_len == 0 {
            return Err(TelemetryError::Config("max_line_len must be non-zero".to_string()));
        }
        if self.protocol.format_header == self.protocol.readings_header {
            return Err(TelemetryError::Config(
                "format_header and readings_header must differ".to_string(),
            ));
        }
        if self.recording.enabled && self.recording.path.is_none() {
            return Err(TelemetryError::Config(
                "recording is enabled but no path is set".to_string(),
            ));
        }
        Ok(())
    }
}

// ==================== Link Config ====================

/// Serial link parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Device path, resolved outside this crate (e.g. "/dev/ttyACM0", "COM3")
    #[serde(default)]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Bound on a single blocking read
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    /// Lines longer than this are discarded
    #[serde(default = "default_max_line_len")]
    pub max_line_len: usize,

    #[serde(default)]
    pub reset: ResetConfig,
}

fn default_baud_rate() -> u32 {
    DEFAULT_BAUD_RATE
}

fn default_read_timeout_ms() -> u64 {
    DEFAULT_READ_TIMEOUT_MS
}

fn default_max_line_len() -> usize {
    DEFAULT_MAX_LINE_LEN
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            port: String::new(),
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            max_line_len: DEFAULT_MAX_LINE_LEN,
            reset: ResetConfig::default(),
        }
    }
}

impl LinkConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

/// Device reset handshake performed when the link opens
///
/// DTR is pulled low for `low_ms`, pending input is discarded, DTR is raised
/// again and the reader waits `settle_ms` for the device to boot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResetConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_reset_low_ms")]
    pub low_ms: u64,

    #[serde(default = "default_reset_settle_ms")]
    pub settle_ms: u64,
}

fn default_true() -> bool {
    true
}

fn default_reset_low_ms() -> u64 {
    DEFAULT_RESET_LOW_MS
}

fn default_reset_settle_ms() -> u64 {
    DEFAULT_RESET_SETTLE_MS
}

impl Default for ResetConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            low_ms: DEFAULT_RESET_LOW_MS,
            settle_ms: DEFAULT_RESET_SETTLE_MS,
        }
    }
}

impl ResetConfig {
    /// No reset handshake at all
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            low_ms: 0,
            settle_ms: 0,
        }
    }

    pub fn low_duration(&self) -> Duration {
        Duration::from_millis(self.low_ms)
    }

    pub fn settle_duration(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

// ==================== Protocol Config ====================

/// Frame header names used for routing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolConfig {
    #[serde(default = "default_format_header")]
    pub format_header: String,

    #[serde(default = "default_readings_header")]
    pub readings_header: String,
}

fn default_format_header() -> String {
    FORMAT_HEADER.to_string()
}

fn default_readings_header() -> String {
    READINGS_HEADER.to_string()
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            format_header: default_format_header(),
            readings_header: default_readings_header(),
        }
    }
}

// ==================== Recording Config ====================

/// JSON Lines recording of decoded readings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordingConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Append to an existing file instead of truncating it
    #[serde(default)]
    pub append: bool,
}

// ==================== Logging Config ====================

/// Log output settings for the binary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    #[serde(default = "default_log_filter")]
    pub filter: String,

    /// Also write daily-rotated log files here
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

fn default_log_filter() -> String {
    "info,serial_telemetry=debug".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            directory: None,
        }
    }
}

// ==================== Session Config ====================

/// Run settings for the logging binary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// How long to log before stopping; 0 runs until the link fails
    #[serde(default = "default_session_secs")]
    pub duration_secs: u64,
}

fn default_session_secs() -> u64 {
    DEFAULT_SESSION_SECS
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            duration_secs: DEFAULT_SESSION_SECS,
        }
    }
}

impl SessionConfig {
    pub fn duration(&self) -> Option<Duration> {
        (self.duration_secs > 0).then(|| Duration::from_secs(self.duration_secs))
    }
}

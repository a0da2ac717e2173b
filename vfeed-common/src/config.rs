//! Configuration loading and config file resolution
//!
//! Configuration is a single TOML document. Every field has a built-in
//! default, so an empty or absent file yields a fully working configuration.
//!
//! Config file resolution priority:
//! 1. Command-line argument (highest priority)
//! 2. `VFEED_CONFIG` environment variable
//! 3. `<platform config dir>/vfeed/config.toml` if it exists
//! 4. Built-in defaults (fallback)
//!
//! An explicitly named file (1 or 2) that cannot be read is an error; the
//! platform default location is optional.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "VFEED_CONFIG";

/// Complete feed configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FeedConfig {
    #[serde(default)]
    pub coordinator: CoordinatorConfig,

    #[serde(default)]
    pub resolver: ResolverConfig,

    #[serde(default)]
    pub reclaim: ReclaimConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Playback coordinator tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Delay between attempts when `set_active` finds a transition in flight
    #[serde(default = "default_activation_retry_delay_ms")]
    pub activation_retry_delay_ms: u64,

    /// Attempts before a deferred `set_active` is abandoned
    #[serde(default = "default_max_activation_retries")]
    pub max_activation_retries: u32,

    /// Upper bound for the best-effort mute issued before a deactivation
    #[serde(default = "default_immediate_mute_timeout_ms")]
    pub immediate_mute_timeout_ms: u64,

    /// Capacity of the per-screen event bus
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

/// Active-index resolver tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Candidates arriving sooner than this after the last emission are noise
    #[serde(default = "default_suppression_window_ms")]
    pub suppression_window_ms: u64,

    /// Minimum visible percentage for an item to count as a candidate
    #[serde(default = "default_viewability_threshold_percent")]
    pub viewability_threshold_percent: u8,
}

/// Resource reclaim policy selection and native call bounds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReclaimConfig {
    #[serde(default)]
    pub mode: ReclaimMode,

    /// Upper bound for a single mute/stop/seek/unload/play call
    #[serde(default = "default_native_call_timeout_ms")]
    pub native_call_timeout_ms: u64,

    /// Upper bound for reloading a previously unloaded source
    #[serde(default = "default_reload_timeout_ms")]
    pub reload_timeout_ms: u64,

    /// Initial value of the feed-wide mute preference
    #[serde(default)]
    pub start_muted: bool,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Which reclaim strategy units are constructed with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReclaimMode {
    /// Decide from the build target (aggressive on Android)
    #[default]
    Auto,
    /// Keep decoders loaded; stop and rewind on deactivate
    Lightweight,
    /// Unload decoders on deactivate; reload on next activate
    Aggressive,
}

impl FromStr for ReclaimMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(ReclaimMode::Auto),
            "lightweight" => Ok(ReclaimMode::Lightweight),
            "aggressive" => Ok(ReclaimMode::Aggressive),
            other => Err(format!(
                "unknown reclaim mode '{}' (expected auto, lightweight or aggressive)",
                other
            )),
        }
    }
}

impl std::fmt::Display for ReclaimMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReclaimMode::Auto => write!(f, "auto"),
            ReclaimMode::Lightweight => write!(f, "lightweight"),
            ReclaimMode::Aggressive => write!(f, "aggressive"),
        }
    }
}

fn default_activation_retry_delay_ms() -> u64 {
    100
}

fn default_max_activation_retries() -> u32 {
    20
}

fn default_immediate_mute_timeout_ms() -> u64 {
    500
}

fn default_event_capacity() -> usize {
    256
}

fn default_suppression_window_ms() -> u64 {
    300
}

fn default_viewability_threshold_percent() -> u8 {
    50
}

fn default_native_call_timeout_ms() -> u64 {
    500
}

fn default_reload_timeout_ms() -> u64 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            activation_retry_delay_ms: default_activation_retry_delay_ms(),
            max_activation_retries: default_max_activation_retries(),
            immediate_mute_timeout_ms: default_immediate_mute_timeout_ms(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            suppression_window_ms: default_suppression_window_ms(),
            viewability_threshold_percent: default_viewability_threshold_percent(),
        }
    }
}

impl Default for ReclaimConfig {
    fn default() -> Self {
        Self {
            mode: ReclaimMode::default(),
            native_call_timeout_ms: default_native_call_timeout_ms(),
            reload_timeout_ms: default_reload_timeout_ms(),
            start_muted: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Where a loaded configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    CommandLine(PathBuf),
    Environment(PathBuf),
    PlatformDefault(PathBuf),
    BuiltIn,
}

impl FeedConfig {
    /// Parse a TOML document
    pub fn from_toml_str(toml_content: &str) -> Result<Self> {
        Ok(toml::from_str(toml_content)?)
    }

    /// Load a specific file; a missing or unparsable file is an error
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        toml::from_str(&content).map_err(|e| {
            Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
        })
    }

    /// Resolve and load configuration following the documented priority order
    pub fn load(cli_arg: Option<&Path>) -> Result<(Self, ConfigSource)> {
        // Priority 1: Command-line argument
        if let Some(path) = cli_arg {
            let config = Self::load_from(path)?;
            info!("Loaded configuration from {} (command line)", path.display());
            return Ok((config, ConfigSource::CommandLine(path.to_path_buf())));
        }

        // Priority 2: Environment variable
        if let Ok(value) = std::env::var(CONFIG_ENV_VAR) {
            if !value.trim().is_empty() {
                let path = PathBuf::from(value);
                let config = Self::load_from(&path)?;
                info!("Loaded configuration from {} ({})", path.display(), CONFIG_ENV_VAR);
                return Ok((config, ConfigSource::Environment(path)));
            }
        }

        // Priority 3: Platform config directory
        if let Some(path) = default_config_path() {
            if path.exists() {
                match Self::load_from(&path) {
                    Ok(config) => {
                        info!("Loaded configuration from {}", path.display());
                        return Ok((config, ConfigSource::PlatformDefault(path)));
                    }
                    Err(e) => {
                        warn!("Ignoring unusable config file: {}", e);
                    }
                }
            }
        }

        // Priority 4: Built-in defaults
        info!("No configuration file found, using built-in defaults");
        Ok((Self::default(), ConfigSource::BuiltIn))
    }
}

/// Platform default config file location (`~/.config/vfeed/config.toml` on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("vfeed").join("config.toml"))
}

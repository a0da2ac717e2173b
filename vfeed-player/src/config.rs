//! vfeed-player runtime settings
//!
//! Converts the raw TOML sections from `vfeed_common::config` into validated,
//! `Duration`-typed settings for each component.

use crate::error::{Error, Result};
use std::time::Duration;
use vfeed_common::config::{FeedConfig, ReclaimMode};

/// Playback coordinator settings
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinatorSettings {
    pub activation_retry_delay: Duration,
    pub max_activation_retries: u32,
    pub immediate_mute_timeout: Duration,
    pub event_capacity: usize,
}

/// Active-index resolver settings
#[derive(Debug, Clone, PartialEq)]
pub struct ResolverSettings {
    pub suppression_window: Duration,
    pub viewability_threshold_percent: u8,
}

/// Reclaim strategy settings
#[derive(Debug, Clone, PartialEq)]
pub struct ReclaimSettings {
    pub mode: ReclaimMode,
    pub native_call_timeout: Duration,
    pub reload_timeout: Duration,
    pub start_muted: bool,
}

/// All vfeed-player settings
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Settings {
    pub coordinator: CoordinatorSettings,
    pub resolver: ResolverSettings,
    pub reclaim: ReclaimSettings,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            activation_retry_delay: Duration::from_millis(100),
            max_activation_retries: 20,
            immediate_mute_timeout: Duration::from_millis(500),
            event_capacity: 256,
        }
    }
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            suppression_window: Duration::from_millis(300),
            viewability_threshold_percent: 50,
        }
    }
}

impl Default for ReclaimSettings {
    fn default() -> Self {
        Self {
            mode: ReclaimMode::Auto,
            native_call_timeout: Duration::from_millis(500),
            reload_timeout: Duration::from_millis(3000),
            start_muted: false,
        }
    }
}

impl Settings {
    /// Validate a loaded `FeedConfig` and convert it
    pub fn from_config(config: &FeedConfig) -> Result<Self> {
        let c = &config.coordinator;
        if c.activation_retry_delay_ms == 0 || c.immediate_mute_timeout_ms == 0 {
            return Err(Error::Config(
                "coordinator.activation_retry_delay_ms and coordinator.immediate_mute_timeout_ms must be greater than 0"
                    .to_string(),
            ));
        }

        let r = &config.resolver;
        if !(1..=100).contains(&r.viewability_threshold_percent) {
            return Err(Error::Config(format!(
                "resolver.viewability_threshold_percent must be within 1..=100, got {}",
                r.viewability_threshold_percent
            )));
        }

        let m = &config.reclaim;
        if m.native_call_timeout_ms == 0 || m.reload_timeout_ms == 0 {
            return Err(Error::Config(
                "reclaim timeouts must be greater than 0".to_string(),
            ));
        }

        Ok(Self {
            coordinator: CoordinatorSettings {
                activation_retry_delay: Duration::from_millis(c.activation_retry_delay_ms),
                max_activation_retries: c.max_activation_retries,
                immediate_mute_timeout: Duration::from_millis(c.immediate_mute_timeout_ms),
                event_capacity: c.event_capacity.max(1),
            },
            resolver: ResolverSettings {
                suppression_window: Duration::from_millis(r.suppression_window_ms),
                viewability_threshold_percent: r.viewability_threshold_percent,
            },
            reclaim: ReclaimSettings {
                mode: m.mode,
                native_call_timeout: Duration::from_millis(m.native_call_timeout_ms),
                reload_timeout: Duration::from_millis(m.reload_timeout_ms),
                start_muted: m.start_muted,
            },
        })
    }
}

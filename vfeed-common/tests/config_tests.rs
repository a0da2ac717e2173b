//! Configuration loading and resolution order tests
//!
//! Tests that manipulate VFEED_CONFIG are marked with #[serial] so they run
//! sequentially, not in parallel.

use serial_test::serial;
use std::env;
use std::io::Write;
use tempfile::NamedTempFile;
use vfeed_common::config::{ConfigSource, FeedConfig, ReclaimMode, CONFIG_ENV_VAR};
use vfeed_common::Error;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(content.as_bytes()).expect("Failed to write config");
    file
}

#[test]
fn test_load_from_full_document() {
    let file = write_config(
        r#"
        [coordinator]
        activation_retry_delay_ms = 25
        max_activation_retries = 4

        [resolver]
        suppression_window_ms = 150
        viewability_threshold_percent = 80

        [reclaim]
        mode = "lightweight"
        native_call_timeout_ms = 250
        reload_timeout_ms = 1000
        start_muted = true

        [logging]
        level = "debug"
        "#,
    );

    let config = FeedConfig::load_from(file.path()).unwrap();
    assert_eq!(config.coordinator.activation_retry_delay_ms, 25);
    assert_eq!(config.coordinator.max_activation_retries, 4);
    assert_eq!(config.resolver.suppression_window_ms, 150);
    assert_eq!(config.resolver.viewability_threshold_percent, 80);
    assert_eq!(config.reclaim.mode, ReclaimMode::Lightweight);
    assert_eq!(config.reclaim.native_call_timeout_ms, 250);
    assert_eq!(config.reclaim.reload_timeout_ms, 1000);
    assert!(config.reclaim.start_muted);
    assert_eq!(config.logging.level, "debug");
}

#[test]
fn test_load_from_missing_file_is_config_error() {
    let result = FeedConfig::load_from(std::path::Path::new("/nonexistent/vfeed/config.toml"));
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_load_from_malformed_file_is_config_error() {
    let file = write_config("[resolver\nsuppression_window_ms = ");
    let result = FeedConfig::load_from(file.path());
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
#[serial]
fn test_cli_path_wins_over_environment() {
    let cli_file = write_config("[resolver]\nsuppression_window_ms = 111\n");
    let env_file = write_config("[resolver]\nsuppression_window_ms = 222\n");
    env::set_var(CONFIG_ENV_VAR, env_file.path());

    let (config, source) = FeedConfig::load(Some(cli_file.path())).unwrap();
    assert_eq!(config.resolver.suppression_window_ms, 111);
    assert_eq!(source, ConfigSource::CommandLine(cli_file.path().to_path_buf()));

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_environment_path_used_without_cli() {
    let env_file = write_config("[reclaim]\nmode = \"aggressive\"\n");
    env::set_var(CONFIG_ENV_VAR, env_file.path());

    let (config, source) = FeedConfig::load(None).unwrap();
    assert_eq!(config.reclaim.mode, ReclaimMode::Aggressive);
    assert_eq!(source, ConfigSource::Environment(env_file.path().to_path_buf()));

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_environment_path_that_does_not_exist_is_error() {
    env::set_var(CONFIG_ENV_VAR, "/nonexistent/vfeed-env.toml");

    let result = FeedConfig::load(None);
    assert!(result.is_err());

    env::remove_var(CONFIG_ENV_VAR);
}

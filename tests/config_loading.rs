//! Integration test: Configuration utilities
//!
//! Tests the bin_common configuration loading functionality and the shipped
//! kitchen config.

use kitchen_display_sync::bin_common::{load_config_from_env, ConfigType};
use kitchen_display_sync::kitchen::infrastructure::KitchenConfig;
use std::env;
use std::io::Write;

#[test]
fn test_kitchen_config_default() {
    // Clear env var to test default
    env::remove_var("CONFIG_PATH");

    let config_path = load_config_from_env(ConfigType::Kitchen);
    assert_eq!(config_path.to_str().unwrap(), "config/kitchen.yaml");
}

#[test]
fn test_custom_config() {
    let custom = ConfigType::Custom("custom/path.yaml".to_string());
    assert_eq!(custom.default_path(), "custom/path.yaml");
    assert_eq!(custom.env_var_name(), "CONFIG_PATH");
}

#[test]
fn test_shipped_config_is_valid() {
    let config = KitchenConfig::load("config/kitchen.yaml").unwrap();

    assert_eq!(config.realtime.channels[0].name, "kitchen");
    assert_eq!(config.retry.max_delay_ms, 30_000);

    let channels = config.channel_config();
    assert_eq!(channels.qualified_name("kitchen"), "private.acme.kitchen");
}

#[test]
fn test_invalid_config_file_rejected() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "api:\n  base_url: https://api.example.com\nrealtime:\n  ws_url: https://not-a-socket\n  tenant_id: acme"
    )
    .unwrap();

    assert!(KitchenConfig::load(file.path()).is_err());
}

use crate::domain::{TimeContext, UrgencyPolicy};
use channels::{ChannelConfig, ExponentialBackoff};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config file: {0}")]
    FileError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Kitchen display configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KitchenConfig {
    pub api: ApiConfig,
    pub realtime: RealtimeConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Bearer token from .env (not in YAML)
    #[serde(skip)]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelEntry {
    pub name: String,
    pub events: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    pub ws_url: String,
    #[serde(default = "default_tenant_scope")]
    pub tenant_scope: String,
    pub tenant_id: String,
    #[serde(default = "default_channels")]
    pub channels: Vec<ChannelEntry>,
    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,
    #[serde(default = "default_ping_timeout_secs")]
    pub ping_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Retry budget for reads; mutations are never retried
    pub read_retries: u32,
    pub max_reconnect_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
            read_retries: 3,
            max_reconnect_attempts: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// IANA zone of the restaurant
    pub timezone: String,
    pub station: String,
    /// Overrides the identity kept in local state
    pub device_id: Option<String>,
    pub warning_minutes: i64,
    pub overdue_minutes: i64,
    pub refresh_interval_secs: u64,
    pub state_path: String,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            timezone: "UTC".to_string(),
            station: "all".to_string(),
            device_id: None,
            warning_minutes: 15,
            overdue_minutes: 0,
            refresh_interval_secs: 60,
            state_path: "data/kitchen_state.json".to_string(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_tenant_scope() -> String {
    "private".to_string()
}

fn default_ping_interval_secs() -> u64 {
    30
}

fn default_ping_timeout_secs() -> u64 {
    5
}

fn default_channels() -> Vec<ChannelEntry> {
    vec![ChannelEntry {
        name: "kitchen".to_string(),
        events: ["OrderCreated", "OrderUpdated", "OrderDeleted", "ItemStatusUpdated"]
            .iter()
            .map(|e| e.to_string())
            .collect(),
    }]
}

impl KitchenConfig {
    /// Load configuration from YAML file and .env
    pub fn load(config_path: impl AsRef<Path>) -> Result<Self> {
        let yaml_content = std::fs::read_to_string(config_path)?;

        // Don't fail if .env doesn't exist
        dotenv::dotenv().ok();

        Self::from_yaml(&yaml_content)
    }

    /// Parse YAML, apply environment overrides and validate
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let mut config: KitchenConfig = serde_yaml::from_str(yaml)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("KDS_API_URL") {
            info!("Overriding API URL from environment variable");
            self.api.base_url = url;
        }
        if let Ok(url) = std::env::var("KDS_WS_URL") {
            info!("Overriding websocket URL from environment variable");
            self.realtime.ws_url = url;
        }
        if let Ok(tenant) = std::env::var("KDS_TENANT_ID") {
            info!("Overriding tenant id from environment variable");
            self.realtime.tenant_id = tenant;
        }
        if let Ok(tz) = std::env::var("KDS_TIMEZONE") {
            info!("Overriding timezone from environment variable");
            self.display.timezone = tz;
        }
        if let Ok(token) = std::env::var("KDS_API_TOKEN") {
            self.api.token = Some(token);
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.api.base_url.trim().is_empty() {
            return Err(ConfigError::ValidationError("api.base_url cannot be empty".to_string()));
        }
        if self.api.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "api.timeout_secs must be greater than 0".to_string(),
            ));
        }
        if !self.realtime.ws_url.starts_with("ws://") && !self.realtime.ws_url.starts_with("wss://") {
            return Err(ConfigError::ValidationError(
                "realtime.ws_url must start with ws:// or wss://".to_string(),
            ));
        }
        if self.realtime.tenant_id.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "realtime.tenant_id cannot be empty".to_string(),
            ));
        }
        if self.realtime.channels.is_empty() {
            return Err(ConfigError::ValidationError(
                "realtime.channels must list at least one channel".to_string(),
            ));
        }
        if self.realtime.ping_interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "realtime.ping_interval_secs must be greater than 0".to_string(),
            ));
        }
        if self.retry.base_delay_ms == 0 || self.retry.max_delay_ms < self.retry.base_delay_ms {
            return Err(ConfigError::ValidationError(
                "retry.max_delay_ms must be >= retry.base_delay_ms > 0".to_string(),
            ));
        }
        if self.display.refresh_interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "display.refresh_interval_secs must be greater than 0".to_string(),
            ));
        }
        if self.display.overdue_minutes > self.display.warning_minutes {
            return Err(ConfigError::ValidationError(
                "display.overdue_minutes must not exceed display.warning_minutes".to_string(),
            ));
        }
        TimeContext::from_name(&self.display.timezone)
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "log_level must be one of: {}",
                valid_levels.join(", ")
            )));
        }

        Ok(())
    }

    /// Shared backoff policy for request retries and reconnects
    pub fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff::new(
            Duration::from_millis(self.retry.base_delay_ms),
            Duration::from_millis(self.retry.max_delay_ms),
            Some(self.retry.max_reconnect_attempts),
        )
    }

    pub fn channel_config(&self) -> ChannelConfig {
        let realtime = &self.realtime;
        realtime
            .channels
            .iter()
            .fold(
                ChannelConfig::new(&realtime.tenant_scope, &realtime.tenant_id),
                |config, entry| config.channel(&entry.name, entry.events.iter().cloned()),
            )
            .ping_interval(Duration::from_secs(realtime.ping_interval_secs))
            .ping_timeout(Duration::from_secs(realtime.ping_timeout_secs))
            .reconnect_strategy(self.backoff())
    }

    pub fn urgency_policy(&self) -> UrgencyPolicy {
        UrgencyPolicy {
            warning_minutes: self.display.warning_minutes,
            overdue_minutes: self.display.overdue_minutes,
        }
    }

    /// Time context for the configured zone; validated on load
    pub fn time_context(&self) -> TimeContext {
        TimeContext::from_name(&self.display.timezone).unwrap_or_default()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }

    /// Log configuration summary
    pub fn log(&self) {
        info!("Configuration loaded:");
        info!("  API URL: {}", self.api.base_url);
        info!("  Websocket URL: {}", self.realtime.ws_url);
        info!(
            "  Tenant: {}.{} ({} channel(s))",
            self.realtime.tenant_scope,
            self.realtime.tenant_id,
            self.realtime.channels.len()
        );
        info!(
            "  Retry: {}ms..{}ms, {} read retries, {} reconnects",
            self.retry.base_delay_ms,
            self.retry.max_delay_ms,
            self.retry.read_retries,
            self.retry.max_reconnect_attempts
        );
        info!("  Timezone: {}", self.display.timezone);
        info!("  Station: {}", self.display.station);
        info!("  Log level: {}", self.log_level);
        info!("  API token: {}", if self.api.token.is_some() { "set" } else { "not set" });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
api:
  base_url: https://api.example.com/api
realtime:
  ws_url: wss://push.example.com/app/key
  tenant_id: acme
"#;

    #[test]
    fn test_defaults_fill_in() {
        let config: KitchenConfig = serde_yaml::from_str(MINIMAL).unwrap();
        config.validate().unwrap();

        assert_eq!(config.api.timeout_secs, 15);
        assert_eq!(config.realtime.tenant_scope, "private");
        assert_eq!(config.realtime.channels[0].events.len(), 4);
        assert_eq!(config.retry.max_reconnect_attempts, 10);
        assert_eq!(config.display.timezone, "UTC");
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_channel_config_qualifies_names() {
        let config: KitchenConfig = serde_yaml::from_str(MINIMAL).unwrap();
        let channels = config.channel_config();

        assert_eq!(channels.qualified_name("kitchen"), "private.acme.kitchen");
        assert_eq!(channels.channels()[0].event_types[0], "OrderCreated");
        channels.validate().unwrap();
    }

    #[test]
    fn test_rejects_bad_timezone() {
        let mut config: KitchenConfig = serde_yaml::from_str(MINIMAL).unwrap();
        config.display.timezone = "Nowhere/City".into();

        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_rejects_http_ws_url() {
        let mut config: KitchenConfig = serde_yaml::from_str(MINIMAL).unwrap();
        config.realtime.ws_url = "https://push.example.com".into();

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_inverted_retry_window() {
        let mut config: KitchenConfig = serde_yaml::from_str(MINIMAL).unwrap();
        config.retry.base_delay_ms = 5000;
        config.retry.max_delay_ms = 1000;

        assert!(config.validate().is_err());
    }
}

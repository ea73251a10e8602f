//! CLI utilities for binaries
//!
//! Handles configuration loading and command line arguments
//! for all binary executables.

use std::path::PathBuf;

/// Type of configuration to load
#[derive(Debug, Clone)]
pub enum ConfigType {
    /// Kitchen display configuration (config/kitchen.yaml)
    Kitchen,
    /// Custom path
    Custom(String),
}

impl ConfigType {
    /// Get the default path for this config type
    pub fn default_path(&self) -> &str {
        match self {
            ConfigType::Kitchen => "config/kitchen.yaml",
            ConfigType::Custom(path) => path,
        }
    }

    /// Get the environment variable name for this config type
    pub fn env_var_name(&self) -> &str {
        match self {
            ConfigType::Kitchen => "CONFIG_PATH",
            ConfigType::Custom(_) => "CONFIG_PATH",
        }
    }
}

/// Load configuration path from environment or use default
///
/// # Arguments
/// * `config_type` - Type of configuration to load
///
/// # Returns
/// Path to the configuration file
///
/// # Examples
/// ```
/// use kitchen_display_sync::bin_common::{load_config_from_env, ConfigType};
///
/// let path = load_config_from_env(ConfigType::Kitchen);
/// ```
pub fn load_config_from_env(config_type: ConfigType) -> PathBuf {
    std::env::var(config_type.env_var_name())
        .unwrap_or_else(|_| config_type.default_path().to_string())
        .into()
}

/// Parse command line arguments for a binary
///
/// Returns a vector of arguments (excluding the program name)
pub fn parse_args() -> Vec<String> {
    std::env::args().skip(1).collect()
}

/// What the display binary was asked to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliCommand {
    /// Run the display loop
    Run,
    /// Pair this terminal with a code from the back office, then exit
    Pair(String),
    /// Forget the stored device identity, then exit
    Unpair,
}

impl CliCommand {
    pub fn from_args(args: &[String]) -> Result<Self, String> {
        match args {
            [] => Ok(CliCommand::Run),
            [flag, code] if flag == "--pair" => Ok(CliCommand::Pair(code.clone())),
            [flag] if flag == "--pair" => Err("--pair requires a pairing code".to_string()),
            [flag] if flag == "--unpair" => Ok(CliCommand::Unpair),
            other => Err(format!("Unrecognized arguments: {}", other.join(" "))),
        }
    }
}

//! Configuration management for Tessie Bridge
//!
//! This module handles loading, validation, and management of the application
//! configuration from YAML files.

use crate::error::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

mod defaults;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(schemars::JsonSchema))]
#[serde(default)]
pub struct Config {
    /// Tessie API connection configuration
    pub tessie: TessieConfig,

    /// Fleet-state polling configuration
    pub poll: PollConfig,

    /// Web server binding configuration
    pub web: WebConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Where configured entries (access tokens) are persisted
    pub entries_file: String,
}

/// Tessie API connection parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(schemars::JsonSchema))]
#[serde(default)]
pub struct TessieConfig {
    /// Base URL of the Tessie API
    pub base_url: String,

    /// Optional access token used to create an entry on first start
    #[serde(skip_serializing)]
    pub access_token: String,

    /// Timeout applied to every HTTP request (seconds)
    pub request_timeout_secs: u64,
}

/// Polling cache parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(schemars::JsonSchema))]
#[serde(default)]
pub struct PollConfig {
    /// Interval between fleet-state refreshes (seconds)
    pub interval_secs: u64,

    /// Timeout wrapped around a single refresh (seconds)
    pub refresh_timeout_secs: u64,
}

/// Web server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(schemars::JsonSchema))]
#[serde(default)]
pub struct WebConfig {
    /// Bind address
    pub host: String,

    /// TCP port
    pub port: u16,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(schemars::JsonSchema))]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    pub level: String,

    /// Optional console-specific level
    pub console_level: Option<String>,

    /// Optional file-specific level
    pub file_level: Option<String>,

    /// Path to log file (its directory receives the rolling files)
    pub file: String,

    /// Number of rotated files to keep
    pub backup_count: u32,

    /// Whether to log to console
    pub console_output: bool,

    /// Whether to use JSON format
    pub json_format: bool,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from the first default location that exists
    pub fn load() -> Result<Self> {
        let default_paths = [
            "tessie_bridge.yaml",
            "/data/tessie_bridge.yaml",
            "/etc/tessie-bridge/config.yaml",
        ];

        for path in &default_paths {
            if Path::new(path).exists() {
                return Self::from_file(path);
            }
        }

        Ok(Self::default())
    }

    /// Save configuration to a YAML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.tessie.base_url.trim().is_empty() {
            return Err(BridgeError::validation(
                "tessie.base_url",
                "Base URL cannot be empty",
            ));
        }

        if !(self.tessie.base_url.starts_with("http://")
            || self.tessie.base_url.starts_with("https://"))
        {
            return Err(BridgeError::validation(
                "tessie.base_url",
                "Base URL must start with http:// or https://",
            ));
        }

        if self.tessie.request_timeout_secs == 0 {
            return Err(BridgeError::validation(
                "tessie.request_timeout_secs",
                "Must be greater than 0",
            ));
        }

        if self.poll.interval_secs == 0 {
            return Err(BridgeError::validation(
                "poll.interval_secs",
                "Must be greater than 0",
            ));
        }

        if self.poll.refresh_timeout_secs == 0 {
            return Err(BridgeError::validation(
                "poll.refresh_timeout_secs",
                "Must be greater than 0",
            ));
        }

        if self.web.port == 0 {
            return Err(BridgeError::validation(
                "web.port",
                "Port must be greater than 0",
            ));
        }

        if self.entries_file.trim().is_empty() {
            return Err(BridgeError::validation(
                "entries_file",
                "Path cannot be empty",
            ));
        }

        Ok(())
    }
}

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::dispatch::port::DEFAULT_DEVICE_PREFIX;

/// Top-level configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Number of threads serving HTTP requests
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Ports whose name starts with this prefix are treated as the amplifier
    #[serde(default = "default_device_prefix")]
    pub device_prefix: String,

    /// Client name registered with the OS MIDI subsystem
    #[serde(default = "default_client_name")]
    pub client_name: String,

    /// Controller catalog replacing the builtin one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog: Option<PathBuf>,

    #[serde(default)]
    pub monitor: MonitorConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            workers: default_workers(),
            device_prefix: default_device_prefix(),
            client_name: default_client_name(),
            catalog: None,
            monitor: MonitorConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: ServerConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(anyhow!("Listen port must be between 1 and 65535"));
        }
        if self.workers == 0 {
            return Err(anyhow!("At least one HTTP worker is required"));
        }
        if self.device_prefix.is_empty() {
            return Err(anyhow!("Device prefix must not be empty"));
        }
        if self.client_name.is_empty() {
            return Err(anyhow!("MIDI client name must not be empty"));
        }
        Ok(())
    }

    /// Address the HTTP server binds to
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Live input monitor configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MonitorConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Explicit input port index; auto-detected when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<usize>,

    /// Message kinds to stop ignoring
    #[serde(default)]
    pub receive: Vec<MessageKind>,
}

/// Message kinds the MIDI input ignores unless asked otherwise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum MessageKind {
    Sysex,
    Timing,
    ActiveSensing,
    All,
}

// Default value functions for serde
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_workers() -> usize {
    4
}

fn default_device_prefix() -> String {
    DEFAULT_DEVICE_PREFIX.to_string()
}

fn default_client_name() -> String {
    "vypyr-control".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_config() {
        let yaml = r#"
host: "127.0.0.1"
port: 9000
workers: 2
device_prefix: "VYPYR"
catalog: "/etc/vypyr/controls.yaml"
monitor:
  enabled: true
  port: 1
  receive: [sysex, active-sensing]
"#;

        let config: ServerConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.listen_addr(), "127.0.0.1:9000");
        assert_eq!(config.workers, 2);
        assert_eq!(config.catalog, Some(PathBuf::from("/etc/vypyr/controls.yaml")));
        assert!(config.monitor.enabled);
        assert_eq!(config.monitor.port, Some(1));
        assert_eq!(
            config.monitor.receive,
            vec![MessageKind::Sysex, MessageKind::ActiveSensing]
        );
    }

    #[test]
    fn test_defaults() {
        let config: ServerConfig = serde_yaml::from_str("{}").unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.listen_addr(), "0.0.0.0:8080");
        assert_eq!(config.workers, 4);
        assert_eq!(config.device_prefix, "VYPYR");
        assert_eq!(config.client_name, "vypyr-control");
        assert!(config.catalog.is_none());
        assert!(!config.monitor.enabled);
        assert!(config.monitor.receive.is_empty());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config: ServerConfig = serde_yaml::from_str("workers: 0").unwrap();
        assert!(config.validate().is_err());

        let config: ServerConfig = serde_yaml::from_str("port: 0").unwrap();
        assert!(config.validate().is_err());

        let config: ServerConfig = serde_yaml::from_str("device_prefix: \"\"").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_message_kind_fails_to_parse() {
        let result: Result<ServerConfig, _> =
            serde_yaml::from_str("monitor:\n  receive: [clock]\n");
        assert!(result.is_err());
    }
}

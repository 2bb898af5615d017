use std::net::IpAddr;
use std::path::Path;
use serde::Deserialize;
use anyhow::{Context, Result};
use shared::protocol::DEFAULT_DOMAIN;
use shared::types::Protocol;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub host: HostConfig,
    #[serde(default)]
    pub responder: ResponderConfig,
    #[serde(default)]
    pub zone: ZoneConfig,
    #[serde(default)]
    pub api: ApiConfig,
    /// Custom service types added to the registry
    #[serde(default, rename = "service_type")]
    pub service_types: Vec<ServiceTypeConfig>,
    /// Services to publish
    #[serde(default, rename = "service")]
    pub services: Vec<ServiceConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HostConfig {
    /// Defaults to the system hostname
    pub name: Option<String>,
    #[serde(default = "default_domain")]
    pub domain: String,
    #[serde(default)]
    pub addresses: Vec<IpAddr>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponderConfig {
    #[serde(default = "default_true")]
    pub ipv4: bool,
    #[serde(default = "default_true")]
    pub ipv6: bool,
    #[serde(default = "default_restart_backoff")]
    pub restart_backoff_secs: u64,
    #[serde(default = "default_max_restart_backoff")]
    pub max_restart_backoff_secs: u64,
    /// Decoded messages waiting for the protocol task
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ZoneConfig {
    #[serde(default = "default_mailbox_capacity")]
    pub mailbox_capacity: usize,
    #[serde(default = "default_maintenance_interval")]
    pub maintenance_interval_secs: u64,
    /// Log records learned from the network
    #[serde(default = "default_true")]
    pub browse: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceTypeConfig {
    pub key: String,
    pub name: String,
    pub protocol: Protocol,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Registry key, e.g. "ssh"
    #[serde(rename = "type")]
    pub service_type: String,
    pub port: u16,
}

fn default_domain() -> String {
    DEFAULT_DOMAIN.to_string()
}

fn default_true() -> bool {
    true
}

fn default_restart_backoff() -> u64 {
    1
}

fn default_max_restart_backoff() -> u64 {
    60
}

fn default_queue_capacity() -> usize {
    32
}

fn default_mailbox_capacity() -> usize {
    256
}

fn default_maintenance_interval() -> u64 {
    60
}

fn default_listen() -> String {
    "[::]:8053".to_string()
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            name: None,
            domain: default_domain(),
            addresses: Vec::new(),
        }
    }
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            ipv4: true,
            ipv6: true,
            restart_backoff_secs: default_restart_backoff(),
            max_restart_backoff_secs: default_max_restart_backoff(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl Default for ZoneConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: default_mailbox_capacity(),
            maintenance_interval_secs: default_maintenance_interval(),
            browse: true,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();

        assert!(config.host.name.is_none());
        assert_eq!(config.host.domain, "local.");
        assert!(config.responder.ipv4 && config.responder.ipv6);
        assert_eq!(config.responder.queue_capacity, 32);
        assert_eq!(config.zone.maintenance_interval_secs, 60);
        assert_eq!(config.api.listen, "[::]:8053");
        assert!(config.services.is_empty());
    }

    #[test]
    fn test_full_config() {
        let config: Config = toml::from_str(
            r#"
            [host]
            name = "foo"
            addresses = ["1.2.3.4", "fe80::1"]

            [responder]
            ipv6 = false

            [zone]
            browse = false

            [[service_type]]
            key = "myapp"
            name = "_myapp"
            protocol = "udp"

            [[service]]
            type = "ssh"
            port = 22

            [[service]]
            type = "myapp"
            port = 9000
            "#,
        )
        .unwrap();

        assert_eq!(config.host.name.as_deref(), Some("foo"));
        assert_eq!(config.host.addresses.len(), 2);
        assert!(config.responder.ipv4);
        assert!(!config.responder.ipv6);
        assert!(!config.zone.browse);
        assert_eq!(config.service_types[0].protocol, Protocol::Udp);
        assert_eq!(config.services.len(), 2);
        assert_eq!(config.services[0].service_type, "ssh");
        assert_eq!(config.services[1].port, 9000);
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load("/nonexistent/zeroconfd.toml").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}

//! Configuration management for RAX FTP daemon
//!
//! Loaded once at startup from `config.toml` with `RAX_FTPD_*` environment
//! overrides, then injected into the components that need it.

use config::{Config, Environment, File};
use serde::Deserialize;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

/// A user accepted by the static credential validator.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct UserEntry {
    pub name: String,
    pub password: String,
}

/// Complete server configuration
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    // ═══ NETWORK ═══
    /// IP address to bind the FTP control connection
    pub bind_address: String,

    /// Port for FTP control connection, 0 picks an ephemeral port
    pub control_port: u16,

    /// Port range for PASV/EPSV data connections
    pub data_port_min: u16,
    pub data_port_max: u16,

    /// Address advertised in PASV replies instead of the control socket's local address
    pub pasv_address: Option<String>,

    /// Accept passive data connections from any peer address
    pub promiscuous_pasv: bool,

    /// Refuse PASV/PORT/EPRT and serve EPSV only
    pub epsv_only: bool,

    // ═══ LIMITS ═══
    pub max_clients: usize,
    pub max_command_length: usize,

    /// Timeout for opening a data connection
    pub data_connection_timeout_secs: u64,

    /// Idle control connections are closed after this many seconds
    pub idle_timeout_secs: u64,

    // ═══ STORAGE ═══
    /// Root directory for FTP operations
    pub server_root: String,

    /// Commit uploads through the background transfer worker
    pub background_uploads: bool,

    /// How long finished background transfers stay visible to status queries
    pub finished_transfer_retention_secs: u64,

    // ═══ SECURITY ═══
    pub tls_cert_path: Option<String>,
    pub tls_key_path: Option<String>,

    pub users: Vec<UserEntry>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            control_port: 2121,
            data_port_min: 2122,
            data_port_max: 2222,
            pasv_address: None,
            promiscuous_pasv: false,
            epsv_only: false,
            max_clients: 10,
            max_command_length: 512,
            data_connection_timeout_secs: 30,
            idle_timeout_secs: 300,
            server_root: "./server_root".to_string(),
            background_uploads: false,
            finished_transfer_retention_secs: 60,
            tls_cert_path: None,
            tls_key_path: None,
            users: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from config.toml with environment overrides
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_paths = ["rax-ftpd/config", "config"];

        let mut builder = Config::builder();
        for config_path in &config_paths {
            builder = builder.add_source(File::with_name(config_path).required(false));
        }

        let settings = builder
            .add_source(Environment::with_prefix("RAX_FTPD").try_parsing(true))
            .build()?;

        let config: ServerConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validation for all configuration values
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.data_port_min == 0 || self.data_port_min >= self.data_port_max {
            return Err(config::ConfigError::Message(
                "data_port_min must be non-zero and less than data_port_max".into(),
            ));
        }

        if self.server_root.is_empty() {
            return Err(config::ConfigError::Message(
                "server_root cannot be empty".into(),
            ));
        }

        if self.max_clients == 0 {
            return Err(config::ConfigError::Message(
                "max_clients must be greater than 0".into(),
            ));
        }

        if let Some(address) = &self.pasv_address {
            if address.parse::<IpAddr>().is_err() {
                return Err(config::ConfigError::Message(format!(
                    "pasv_address {} is not an IP address",
                    address
                )));
            }
        }

        Ok(())
    }

    /// Get bind address and control port as socket address
    pub fn control_socket(&self) -> String {
        format!("{}:{}", self.bind_address, self.control_port)
    }

    /// Get data port range for passive mode
    pub fn data_port_range(&self) -> std::ops::Range<u16> {
        self.data_port_min..self.data_port_max
    }

    pub fn pasv_address(&self) -> Option<IpAddr> {
        self.pasv_address.as_deref().and_then(|a| a.parse().ok())
    }

    pub fn server_root_path(&self) -> PathBuf {
        PathBuf::from(&self.server_root)
    }

    pub fn data_connection_timeout(&self) -> Duration {
        Duration::from_secs(self.data_connection_timeout_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn finished_transfer_retention(&self) -> Duration {
        Duration::from_secs(self.finished_transfer_retention_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(ServerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_inverted_port_range_is_rejected() {
        let config = ServerConfig {
            data_port_min: 3000,
            data_port_max: 2000,
            ..ServerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_pasv_address_is_rejected() {
        let config = ServerConfig {
            pasv_address: Some("not-an-ip".into()),
            ..ServerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_overrides_defaults() {
        let toml = r#"
            control_port = 2021
            epsv_only = true
            [[users]]
            name = "alice"
            password = "alice123"
        "#;
        let config: ServerConfig = Config::builder()
            .add_source(File::from_str(toml, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(config.control_port, 2021);
        assert!(config.epsv_only);
        assert!(!config.promiscuous_pasv);
        assert_eq!(config.users.len(), 1);
        assert_eq!(config.data_port_min, 2122);
    }
}

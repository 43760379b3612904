//! Node configuration: serde defaults, optional TOML file, CLI overrides applied on top.

use crate::contract::ContractKind;
use crate::network::codec::MAX_LINE_LEN;
use crate::network::connection::SessionConfig;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("invalid config {path}: {source}")]
    Parse { path: PathBuf, source: toml::de::Error },
    #[error("invalid port: {0}")]
    InvalidPort(String),
    #[error("contract interval must be positive")]
    ZeroInterval,
    #[error("max_connections must be at least 1 when set")]
    ZeroConnections,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NodeConfig {
    pub host: String,
    pub port: u16,
    /// Outbound peers to keep connected to, as `host:port`.
    pub peers: Vec<String>,
    /// Address sent as our first line when dialing out.
    pub announce: Option<String>,
    pub contract: ContractKind,
    pub script: Option<String>,
    pub interval_secs: u64,
    pub welcome: bool,
    pub ack: bool,
    pub relay: bool,
    pub require_address: bool,
    pub max_connections: Option<usize>,
    pub read_timeout_secs: Option<u64>,
    pub write_timeout_secs: Option<u64>,
    pub max_line_len: usize,
    pub log_level: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            peers: vec![],
            announce: None,
            contract: ContractKind::Random,
            script: None,
            interval_secs: 5,
            welcome: true,
            ack: true,
            relay: false,
            require_address: false,
            max_connections: None,
            read_timeout_secs: None,
            write_timeout_secs: Some(5),
            max_line_len: MAX_LINE_LEN,
            log_level: "info".to_string(),
        }
    }
}

impl NodeConfig {
    /// Load config from a TOML file; missing keys take their defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        Self::from_toml(&data).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
    }

    pub fn from_toml(data: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(data)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_secs == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        if self.max_connections == Some(0) {
            return Err(ConfigError::ZeroConnections);
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn session(&self) -> SessionConfig {
        SessionConfig {
            welcome: self.welcome,
            ack: self.ack,
            relay: self.relay,
            require_address: self.require_address,
            read_timeout: self.read_timeout_secs.map(Duration::from_secs),
            write_timeout: self.write_timeout_secs.map(Duration::from_secs),
            max_line_len: self.max_line_len,
        }
    }
}

/// Parse a port given as the first command-line argument.
pub fn parse_port(s: &str) -> Result<u16, ConfigError> {
    s.trim().parse::<u16>().map_err(|_| ConfigError::InvalidPort(s.to_string()))
}

/// Parse a CSV list of peers into Vec<String>
pub fn parse_peers_csv(s: &str) -> Vec<String> {
    s.split(',')
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_node() {
        let cfg = NodeConfig::default();
        assert_eq!(cfg.bind_addr(), "0.0.0.0:8080");
        assert_eq!(cfg.interval(), Duration::from_secs(5));
        assert_eq!(cfg.contract, ContractKind::Random);
        assert!(cfg.session().welcome);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg = NodeConfig::from_toml(
            r#"
            port = 9000
            peers = ["127.0.0.1:9001"]
            contract = "script"
            script = "hello"
            relay = true
            read_timeout_secs = 30
            "#,
        )
        .unwrap();
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.peers, vec!["127.0.0.1:9001"]);
        assert_eq!(cfg.contract, ContractKind::Script);
        assert_eq!(cfg.script.as_deref(), Some("hello"));
        assert!(cfg.session().relay);
        assert_eq!(cfg.session().read_timeout, Some(Duration::from_secs(30)));
        assert_eq!(cfg.host, "0.0.0.0");
        assert!(cfg.ack);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(NodeConfig::from_toml("prot = 1").is_err());
    }

    #[test]
    fn zero_interval_is_invalid() {
        let cfg = NodeConfig { interval_secs: 0, ..Default::default() };
        assert!(matches!(cfg.validate(), Err(ConfigError::ZeroInterval)));
    }

    #[test]
    fn zero_connection_limit_is_invalid() {
        let cfg = NodeConfig { max_connections: Some(0), ..Default::default() };
        assert!(matches!(cfg.validate(), Err(ConfigError::ZeroConnections)));
        let cfg = NodeConfig { max_connections: Some(1), ..Default::default() };
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn missing_file_reports_path() {
        let err = NodeConfig::load("/nonexistent/peerchain.toml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/peerchain.toml"));
    }

    #[test]
    fn port_and_peer_parsing() {
        assert_eq!(parse_port("9001").unwrap(), 9001);
        assert!(parse_port("99999").is_err());
        assert_eq!(parse_peers_csv(" a:1, ,b:2 "), vec!["a:1", "b:2"]);
    }
}

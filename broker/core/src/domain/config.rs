// Copyright (c) 2026 Dataverse Broker Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Broker Configuration
//!
//! `BrokerConfig` is loaded from YAML with discovery and defaults, then
//! overridden by environment variables and finally by CLI flags. Every field
//! has a default so an empty file (or no file at all) yields a runnable
//! broker that searches the Harvard Dataverse.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::api_version::{ApiVersion, SUPPORTED_MAJOR};

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "DATAVERSE_BROKER_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BrokerConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub broker: BrokerSettings,
    #[serde(default)]
    pub dataverse: DataverseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Serve plain HTTP instead of TLS.
    #[serde(default)]
    pub insecure: bool,

    #[serde(default)]
    pub tls: TlsConfig,

    /// Grace period for in-flight requests after a shutdown signal.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

/// TLS material, either inline (base64-encoded PEM) or as PEM file paths.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TlsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cert: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cert_file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_file: Option<PathBuf>,
}

impl TlsConfig {
    fn has_cert(&self) -> bool {
        self.cert.is_some() || self.cert_file.is_some()
    }

    fn has_key(&self) -> bool {
        self.key.is_some() || self.key_file.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerSettings {
    /// Answer `async = true` when the platform sends `accepts_incomplete`.
    #[serde(default)]
    pub async_mode: bool,

    /// Oldest `X-Broker-API-Version` accepted.
    #[serde(default)]
    pub min_api_version: ApiVersion,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataverseConfig {
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Prefix for service ids advertised from this server.
    #[serde(default = "default_server_alias")]
    pub server_alias: String,

    /// Upper bound on collections pulled from the search API.
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// When set, the catalog comes from this directory instead of a search.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub whitelist_path: Option<PathBuf>,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Require a bearer token reviewed by the Kubernetes API server.
    #[serde(default)]
    pub authenticate_k8s_token: bool,

    /// API server base URL. Defaults to the in-cluster service address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kube_api_server: Option<String>,

    #[serde(default = "default_token_path")]
    pub token_path: PathBuf,

    #[serde(default = "default_ca_path")]
    pub ca_path: PathBuf,

    /// Timeout for each TokenReview call, independent of Dataverse lookups.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8443
}

fn default_shutdown_timeout() -> u64 {
    3
}

fn default_server_url() -> String {
    "https://dataverse.harvard.edu".to_string()
}

fn default_server_alias() -> String {
    "harvard".to_string()
}

fn default_max_results() -> usize {
    10
}

fn default_request_timeout() -> u64 {
    30
}

fn default_token_path() -> PathBuf {
    PathBuf::from("/var/run/secrets/kubernetes.io/serviceaccount/token")
}

fn default_ca_path() -> PathBuf {
    PathBuf::from("/var/run/secrets/kubernetes.io/serviceaccount/ca.crt")
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            insecure: false,
            tls: TlsConfig::default(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

impl ServerConfig {
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            async_mode: false,
            min_api_version: ApiVersion::default(),
        }
    }
}

impl Default for DataverseConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            server_alias: default_server_alias(),
            max_results: default_max_results(),
            whitelist_path: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl DataverseConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            authenticate_k8s_token: false,
            kube_api_server: None,
            token_path: default_token_path(),
            ca_path: default_ca_path(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl AuthConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl BrokerConfig {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        // An empty document deserializes to unit, not to an empty map.
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Discover configuration file using precedence order
    /// 1. DATAVERSE_BROKER_CONFIG environment variable
    /// 2. ./dataverse-broker.yaml (working directory)
    /// 3. /etc/dataverse-broker/config.yaml
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./dataverse-broker.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        let system_config = PathBuf::from("/etc/dataverse-broker/config.yaml");
        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // An explicit path must exist and parse.
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load config at {:?}: {}", path, e))?;
            config.apply_env_overrides();
            return Ok(config);
        }

        let mut config = match Self::discover_config() {
            Some(config_path) => {
                tracing::info!("Loading configuration from discovered path: {:?}", config_path);
                Self::from_yaml_file(config_path)?
            }
            None => {
                tracing::debug!("No configuration file found, using defaults");
                Self::default()
            }
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        if let Some(val) = env_flag("DATAVERSE_BROKER_ASYNC") {
            self.broker.async_mode = val;
        }
        if let Some(val) = env_flag("DATAVERSE_BROKER_INSECURE") {
            self.server.insecure = val;
        }
        if let Ok(val) = std::env::var("DATAVERSE_BROKER_SERVER_URL") {
            tracing::info!("Environment override: DATAVERSE_BROKER_SERVER_URL={}", val);
            self.dataverse.server_url = val;
        }
        if let Ok(val) = std::env::var("DATAVERSE_BROKER_SERVER_ALIAS") {
            tracing::info!("Environment override: DATAVERSE_BROKER_SERVER_ALIAS={}", val);
            self.dataverse.server_alias = val;
        }
        if let Ok(val) = std::env::var("DATAVERSE_BROKER_WHITELIST") {
            tracing::info!("Environment override: DATAVERSE_BROKER_WHITELIST={}", val);
            self.dataverse.whitelist_path = Some(PathBuf::from(val));
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("server.port cannot be 0");
        }

        if self.server.shutdown_timeout_secs == 0 {
            anyhow::bail!("server.shutdown_timeout_secs must be at least 1");
        }

        let tls = &self.server.tls;
        if tls.cert.is_some() && tls.cert_file.is_some() {
            anyhow::bail!("server.tls.cert and server.tls.cert_file are mutually exclusive");
        }
        if tls.key.is_some() && tls.key_file.is_some() {
            anyhow::bail!("server.tls.key and server.tls.key_file are mutually exclusive");
        }
        if !self.server.insecure && !(tls.has_cert() && tls.has_key()) {
            anyhow::bail!(
                "TLS requires both a certificate and a private key; pass --insecure to serve plain HTTP"
            );
        }

        if self.broker.min_api_version.major != SUPPORTED_MAJOR {
            anyhow::bail!(
                "broker.min_api_version must have major version {}, got {}",
                SUPPORTED_MAJOR,
                self.broker.min_api_version
            );
        }

        if self.dataverse.whitelist_path.is_none() {
            let url = self.dataverse.server_url.as_str();
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                anyhow::bail!("dataverse.server_url must be an http(s) URL, got '{}'", url);
            }
            if self.dataverse.server_alias.trim().is_empty() {
                anyhow::bail!("dataverse.server_alias cannot be empty");
            }
            if self.dataverse.max_results == 0 {
                anyhow::bail!("dataverse.max_results must be at least 1");
            }
        }

        Ok(())
    }
}

fn env_flag(name: &str) -> Option<bool> {
    let val = std::env::var(name).ok()?;
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => {
            tracing::info!("Environment override: {}=true", name);
            Some(true)
        }
        "false" | "0" | "no" | "off" => {
            tracing::info!("Environment override: {}=false", name);
            Some(false)
        }
        _ => {
            tracing::warn!(
                "Invalid value for {}: '{}'. Expected true/false. Ignoring.",
                name,
                val
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BrokerConfig::default();
        assert_eq!(config.server.port, 8443);
        assert_eq!(config.server.shutdown_timeout(), Duration::from_secs(3));
        assert!(!config.broker.async_mode);
        assert_eq!(config.broker.min_api_version, ApiVersion::new(2, 13));
        assert_eq!(config.dataverse.server_alias, "harvard");
        assert_eq!(config.dataverse.max_results, 10);
        assert_eq!(config.auth.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_auth_timeout_is_separate_from_dataverse() {
        let yaml = r#"
dataverse:
  request_timeout_secs: 120
auth:
  authenticate_k8s_token: true
  request_timeout_secs: 5
"#;
        let config = BrokerConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.dataverse.request_timeout(), Duration::from_secs(120));
        assert_eq!(config.auth.request_timeout(), Duration::from_secs(5));

        let config = BrokerConfig::from_yaml_str("dataverse:\n  request_timeout_secs: 120\n").unwrap();
        assert_eq!(config.auth.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(BrokerConfig::from_yaml_str("").unwrap(), BrokerConfig::default());
    }

    #[test]
    fn test_partial_yaml_keeps_other_defaults() {
        let yaml = r#"
server:
  port: 9000
  insecure: true
broker:
  async_mode: true
  min_api_version: "2.14"
dataverse:
  server_url: "https://demo.dataverse.org"
  server_alias: demo
"#;
        let config = BrokerConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.server.port, 9000);
        assert!(config.server.insecure);
        assert_eq!(config.server.shutdown_timeout_secs, 3);
        assert!(config.broker.async_mode);
        assert_eq!(config.broker.min_api_version, ApiVersion::new(2, 14));
        assert_eq!(config.dataverse.server_alias, "demo");
        assert_eq!(config.dataverse.max_results, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_yaml_roundtrip() {
        let mut config = BrokerConfig::default();
        config.server.insecure = true;
        config.dataverse.whitelist_path = Some(PathBuf::from("/srv/whitelist"));

        let yaml = config.to_yaml_string().unwrap();
        assert_eq!(BrokerConfig::from_yaml_str(&yaml).unwrap(), config);
    }

    #[test]
    fn test_validation() {
        // TLS is the default and needs material.
        assert!(BrokerConfig::default().validate().is_err());

        let mut config = BrokerConfig::default();
        config.server.tls.cert_file = Some(PathBuf::from("tls.crt"));
        config.server.tls.key = Some("a2V5".to_string());
        assert!(config.validate().is_ok());

        config.server.tls.cert = Some("Y2VydA==".to_string());
        assert!(config.validate().is_err());

        let mut config = BrokerConfig::default();
        config.server.insecure = true;
        config.broker.min_api_version = ApiVersion::new(3, 0);
        assert!(config.validate().is_err());

        let mut config = BrokerConfig::default();
        config.server.insecure = true;
        config.dataverse.server_url = "dataverse.harvard.edu".to_string();
        assert!(config.validate().is_err());

        // A whitelist replaces the search, so the server URL is not checked.
        config.dataverse.whitelist_path = Some(PathBuf::from("/srv/whitelist"));
        assert!(config.validate().is_ok());
    }
}

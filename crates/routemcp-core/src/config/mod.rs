//! Configuration types for routemcp.
//!
//! Configuration is read once at initialization from a YAML file (routemcp.yaml)
//! and combined into a single `BridgeConfig` structure.
//!
//! # Configuration Sections
//!
//! - **mcp**: server identity, mount path and transport
//! - **discovery**: route discovery toggle, include/exclude patterns, security annotation key
//! - **auth**: whether credential fields are exposed in tool schemas
//! - **manifest**: optional route manifest (used by the CLI in place of a live host registry)

pub mod auth;
pub mod discovery;
pub mod mcp;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub use auth::AuthConfig;
pub use discovery::DiscoveryConfig;
pub use mcp::{McpConfig, Transport};

/// Complete routemcp configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BridgeConfig {
    /// MCP server configuration.
    #[serde(default)]
    pub mcp: McpConfig,

    /// Route discovery configuration.
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    /// Authentication parameter configuration.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Path to a route manifest file.
    #[serde(default)]
    pub manifest: Option<PathBuf>,
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl BridgeConfig {
    /// Load configuration from a YAML file.
    ///
    /// A relative `manifest` path is resolved against the config file's directory.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let mut config = Self::from_yaml(&content)?;

        if let Some(manifest) = &config.manifest {
            if manifest.is_relative() {
                let base_dir = path
                    .parent()
                    .map(|p| p.to_path_buf())
                    .unwrap_or_else(|| PathBuf::from("."));
                config.manifest = Some(base_dir.join(manifest));
            }
        }

        Ok(config)
    }

    /// Parse configuration from YAML content.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that cannot work at runtime.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.discovery.security_parameter.trim().is_empty() {
            return Err(ConfigError::Config(
                "discovery.security_parameter must not be empty".to_string(),
            ));
        }
        if self.mcp.server_name.trim().is_empty() {
            return Err(ConfigError::Config(
                "mcp.server_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_yaml() {
        let config = BridgeConfig::from_yaml("{}").unwrap();
        assert!(config.mcp.enabled);
        assert_eq!(config.mcp.mount_path, "/mcp");
        assert!(config.discovery.enabled);
        assert_eq!(config.discovery.security_parameter, "security");
        assert_eq!(config.discovery.reserved_prefix, "mcp_");
        assert!(config.auth.expose_auth_params);
        assert!(config.manifest.is_none());
    }

    #[test]
    fn test_full_yaml() {
        let yaml = r#"
mcp:
  server_name: inventory
  server_version: "2.1.0"
  mount_path: /agents
  transport: http
  port: 8090
discovery:
  include: ["/api/*"]
  exclude: ["admin"]
  security_parameter: mcp_security
auth:
  expose_auth_params: false
manifest: routes.yaml
"#;
        let config = BridgeConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.mcp.server_name, "inventory");
        assert!(config.mcp.is_http());
        assert_eq!(config.mcp.port, 8090);
        assert_eq!(config.discovery.include, vec!["/api/*"]);
        assert_eq!(config.discovery.exclude, vec!["admin"]);
        assert_eq!(config.discovery.security_parameter, "mcp_security");
        assert!(!config.auth.expose_auth_params);
        assert_eq!(config.manifest, Some(PathBuf::from("routes.yaml")));
    }

    #[test]
    fn test_empty_security_parameter_rejected() {
        let err = BridgeConfig::from_yaml("discovery:\n  security_parameter: ''\n").unwrap_err();
        assert!(matches!(err, ConfigError::Config(_)));
    }
}

//! MCP server configuration.
//!
//! This module defines configuration for the MCP (Model Context Protocol) endpoint
//! exposed by the bridge. Tools are auto-generated from the host application's routes.

use serde::{Deserialize, Serialize};

/// Configuration for the MCP server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpConfig {
    /// Whether the MCP endpoint is enabled.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Server name reported by `initialize`.
    #[serde(default = "default_server_name")]
    pub server_name: String,

    /// Server version reported by `initialize`.
    #[serde(default = "default_server_version")]
    pub server_version: String,

    /// Path the HTTP transport is mounted under.
    #[serde(default = "default_mount_path")]
    pub mount_path: String,

    /// Transport type: "stdio" or "http".
    #[serde(default)]
    pub transport: Transport,

    /// HTTP host (only used when transport is HTTP).
    #[serde(default = "default_http_host")]
    pub host: String,

    /// HTTP port (only used when transport is HTTP).
    #[serde(default = "default_http_port")]
    pub port: u16,

    /// Validate tool-call arguments against the tool's input schema.
    #[serde(default = "default_enabled")]
    pub validate_arguments: bool,
}

/// MCP transport type.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// Standard input/output transport (for Claude Desktop, etc.).
    #[default]
    Stdio,
    /// HTTP transport (JSON-RPC POST plus SSE streaming).
    Http,
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            server_name: default_server_name(),
            server_version: default_server_version(),
            mount_path: default_mount_path(),
            transport: Transport::default(),
            host: default_http_host(),
            port: default_http_port(),
            validate_arguments: default_enabled(),
        }
    }
}

impl McpConfig {
    /// Check if using HTTP transport.
    pub fn is_http(&self) -> bool {
        self.transport == Transport::Http
    }

    /// Check if using stdio transport.
    pub fn is_stdio(&self) -> bool {
        self.transport == Transport::Stdio
    }

    /// Mount path normalized to a leading slash and no trailing slash.
    pub fn normalized_mount_path(&self) -> String {
        let trimmed = self.mount_path.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            "/mcp".to_string()
        } else if trimmed.starts_with('/') {
            trimmed.to_string()
        } else {
            format!("/{}", trimmed)
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_server_name() -> String {
    "routemcp".to_string()
}

fn default_server_version() -> String {
    "1.0.0".to_string()
}

fn default_mount_path() -> String {
    "/mcp".to_string()
}

fn default_http_host() -> String {
    "127.0.0.1".to_string()
}

fn default_http_port() -> u16 {
    3000
}

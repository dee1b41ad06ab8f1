//! Route discovery configuration.

use serde::{Deserialize, Serialize};

/// Controls which host routes become MCP tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Whether routes are discovered and turned into tools.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Allowlist of route patterns/names. Empty means everything is included.
    ///
    /// Patterns containing `*` or `?` are matched as anchored wildcards; plain
    /// patterns match path-segment prefixes or route name prefixes.
    #[serde(default)]
    pub include: Vec<String>,

    /// Denylist of route patterns/names, same syntax as `include`.
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Annotation key views use to declare their authentication scheme.
    #[serde(default = "default_security_parameter")]
    pub security_parameter: String,

    /// Route name prefix reserved for the bridge's own routes.
    #[serde(default = "default_reserved_prefix")]
    pub reserved_prefix: String,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            include: Vec::new(),
            exclude: Vec::new(),
            security_parameter: default_security_parameter(),
            reserved_prefix: default_reserved_prefix(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_security_parameter() -> String {
    "security".to_string()
}

fn default_reserved_prefix() -> String {
    "mcp_".to_string()
}

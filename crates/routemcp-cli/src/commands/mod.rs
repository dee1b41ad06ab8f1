//! CLI command implementations for routemcp.

pub mod plan;
pub mod serve;
pub mod tools;

use anyhow::{Context, Result};
use clap::Args;
use routemcp_core::{BridgeConfig, RouteManifest, StaticRouteRegistry};
use routemcp_mcp::McpServer;
use std::path::{Path, PathBuf};

/// Where the configuration and route manifest come from.
#[derive(Debug, Clone, Args)]
pub struct SourceArgs {
    /// Configuration file. Defaults apply when it does not exist.
    #[arg(short, long, default_value = "routemcp.yaml", env = "ROUTEMCP_CONFIG")]
    pub config: PathBuf,

    /// Route manifest. Overrides `manifest` from the config file.
    #[arg(short, long, env = "ROUTEMCP_MANIFEST")]
    pub manifest: Option<PathBuf>,
}

impl SourceArgs {
    /// Load the configuration and the route registry it points to.
    pub fn load(&self) -> Result<(BridgeConfig, StaticRouteRegistry)> {
        let config = load_config(&self.config)?;
        let manifest = self
            .manifest
            .clone()
            .or_else(|| config.manifest.clone())
            .context("No route manifest given. Pass --manifest or set `manifest` in the config file")?;
        let registry = load_registry(&manifest)?;
        Ok((config, registry))
    }

    /// A server with every manifest route registered, without a dispatcher.
    pub fn offline_server(&self) -> Result<McpServer> {
        let (config, registry) = self.load()?;
        let mut server = McpServer::new(config);
        server
            .register_routes(&registry)
            .context("Failed to register tools from routes")?;
        Ok(server)
    }
}

pub fn load_config(path: &Path) -> Result<BridgeConfig> {
    if path.exists() {
        BridgeConfig::from_file(path).with_context(|| format!("Failed to load configuration from {:?}", path))
    } else {
        tracing::warn!(config = %path.display(), "Config file not found, using defaults");
        Ok(BridgeConfig::default())
    }
}

pub fn load_registry(path: &Path) -> Result<StaticRouteRegistry> {
    let manifest =
        RouteManifest::from_file(path).with_context(|| format!("Failed to load route manifest from {:?}", path))?;
    tracing::debug!(
        routes = manifest.routes.len(),
        services = manifest.services.len(),
        "Loaded route manifest"
    );
    Ok(manifest.into_registry())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const MANIFEST: &str = r#"
routes:
  - name: users
    pattern: /users
    views:
      - handler: users::list
        methods: [GET]
      - handler: users::create
        methods: [POST]
        schema:
          dialect: fields
          fields:
            - name: name
              kind: string
              required: true
  - name: user
    pattern: /users/{id}
    views:
      - handler: users::get
        annotations:
          security: bearer
"#;

    fn write_fixture(dir: &Path) -> SourceArgs {
        fs::write(dir.join("routes.yaml"), MANIFEST).unwrap();
        fs::write(dir.join("routemcp.yaml"), "manifest: routes.yaml\n").unwrap();
        SourceArgs {
            config: dir.join("routemcp.yaml"),
            manifest: None,
        }
    }

    #[test]
    fn test_manifest_resolved_relative_to_config() {
        let dir = tempfile::tempdir().unwrap();
        let args = write_fixture(dir.path());

        let server = args.offline_server().unwrap();
        let names: Vec<&str> = server.tools().list().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["list_users", "create_users", "user"]);
    }

    #[test]
    fn test_missing_manifest_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let args = SourceArgs {
            config: dir.path().join("absent.yaml"),
            manifest: None,
        };
        assert!(args.load().is_err());
    }
}

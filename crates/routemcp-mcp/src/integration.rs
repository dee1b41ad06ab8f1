//! Embedding the bridge into an axum application.
//!
//! ```ignore
//! let app = Router::new().route("/users", get(list_users).post(create_user));
//! let registry = RouteManifest::from_file("routes.yaml")?.into_registry();
//!
//! let bridge = McpBridge::from_router(app, &registry, BridgeConfig::from_file("routemcp.yaml")?)?;
//! let app = bridge.into_router();
//! ```

use crate::dispatch::RouterDispatcher;
use crate::error::McpError;
use crate::http_transport::{HttpTransportState, create_router};
use crate::permission::PermissionEvaluator;
use crate::server::McpServer;
use crate::tools::ToolDefinition;
use axum::Router;
use routemcp_core::{BridgeConfig, RouteRegistry};
use std::sync::Arc;

/// An application router paired with the MCP server that exposes it.
pub struct McpBridge {
    server: McpServer,
    app: Router,
}

impl McpBridge {
    /// Discover tools from `registry` and dispatch them into `app`.
    ///
    /// Sub-requests go to `app` as it is passed in, without the MCP routes.
    pub fn from_router(app: Router, registry: &dyn RouteRegistry, config: BridgeConfig) -> Result<Self, McpError> {
        let enabled = config.mcp.enabled;
        let mut server = McpServer::new(config).with_dispatcher(Arc::new(RouterDispatcher::new(app.clone())));
        if enabled {
            server.register_routes(registry)?;
        } else {
            tracing::info!("MCP disabled, leaving application routes unchanged");
        }
        Ok(Self { server, app })
    }

    pub fn with_permission_evaluator(mut self, evaluator: Arc<dyn PermissionEvaluator>) -> Self {
        self.server = self.server.with_permission_evaluator(evaluator);
        self
    }

    /// Register a manual tool alongside the discovered ones.
    pub fn register_tool(&mut self, tool: ToolDefinition) -> Result<String, McpError> {
        self.server.register_tool(tool)
    }

    pub fn server(&self) -> &McpServer {
        &self.server
    }

    /// Take the server out, e.g. to run it over stdio.
    pub fn into_server(self) -> McpServer {
        self.server
    }

    /// The application router with the MCP transport merged in.
    pub fn into_router(self) -> Router {
        if !self.server.config().mcp.enabled {
            return self.app;
        }
        let state = Arc::new(HttpTransportState::new(Arc::new(self.server)));
        self.app.merge(create_router(state))
    }
}

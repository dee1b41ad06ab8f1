//! `routemcp serve` - serve the manifest's routes as MCP tools.
//!
//! There is no real application behind a manifest, so every route is backed
//! by an echo handler that answers with what it received. This is enough to
//! try an MCP client against the generated tools end to end.

use super::SourceArgs;
use anyhow::{Context, Result};
use axum::{
    Json, Router,
    body::Bytes,
    http::{HeaderMap, Method, Uri, header},
    routing::{MethodFilter, MethodRouter, on},
};
use routemcp_core::{BridgeConfig, RouteRegistry, Transport};
use routemcp_mcp::{McpBridge, discover_routes};
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashSet};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Transport override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum TransportArg {
    Stdio,
    Http,
}

impl From<TransportArg> for Transport {
    fn from(arg: TransportArg) -> Self {
        match arg {
            TransportArg::Stdio => Transport::Stdio,
            TransportArg::Http => Transport::Http,
        }
    }
}

fn echo(route: &str, method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Json<Value> {
    let body = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or_else(|_| json!(String::from_utf8_lossy(&body)))
    };
    Json(json!({
        "route": route,
        "method": method.as_str(),
        "path": uri.path(),
        "query": uri.query(),
        "authorized": headers.contains_key(header::AUTHORIZATION),
        "body": body,
    }))
}

/// Build an application with one echo handler per discovered route and method.
pub fn echo_app(registry: &dyn RouteRegistry, config: &BridgeConfig) -> Router {
    let mut paths: BTreeMap<String, MethodRouter> = BTreeMap::new();
    let mut seen: HashSet<(String, Method)> = HashSet::new();

    for route in discover_routes(registry, &config.discovery) {
        let path = route.pattern.to_route_path();
        for method in &route.methods {
            let Ok(filter) = MethodFilter::try_from(method.clone()) else {
                warn!(route = %route.name, method = %method, "Method cannot be routed, skipping");
                continue;
            };
            if !seen.insert((path.clone(), method.clone())) {
                warn!(route = %route.name, path = %path, method = %method, "Path already served, skipping");
                continue;
            }
            let name = route.name.clone();
            let handler = move |method: Method, uri: Uri, headers: HeaderMap, body: Bytes| {
                let name = name.clone();
                async move { echo(&name, method, uri, headers, body) }
            };
            let entry = paths.remove(&path);
            let method_router = match entry {
                Some(existing) => existing.on(filter, handler),
                None => on(filter, handler),
            };
            paths.insert(path.clone(), method_router);
        }
    }

    paths
        .into_iter()
        .fold(Router::new(), |app, (path, method_router)| app.route(&path, method_router))
}

/// Run the server.
pub async fn execute(
    source: &SourceArgs,
    transport: Option<TransportArg>,
    host: Option<String>,
    port: Option<u16>,
) -> Result<()> {
    let (mut config, registry) = source.load()?;
    if let Some(transport) = transport {
        config.mcp.transport = transport.into();
    }
    if let Some(host) = host {
        config.mcp.host = host;
    }
    if let Some(port) = port {
        config.mcp.port = port;
    }

    let app = echo_app(&registry, &config);
    let bridge = McpBridge::from_router(app, &registry, config.clone()).context("Failed to build MCP bridge")?;

    info!(
        tools = bridge.server().tools().len(),
        transport = ?config.mcp.transport,
        "Starting routemcp"
    );

    match config.mcp.transport {
        Transport::Stdio => bridge.into_server().run_stdio().await?,
        Transport::Http => {
            let addr = format!("{}:{}", config.mcp.host, config.mcp.port);
            let listener = tokio::net::TcpListener::bind(&addr)
                .await
                .with_context(|| format!("Failed to bind to {}", addr))?;
            info!(
                addr = %addr,
                mount = %config.mcp.normalized_mount_path(),
                "Serving application and MCP endpoint"
            );
            axum::serve(listener, bridge.into_router().layer(TraceLayer::new_for_http())).await?;
        }
    }
    Ok(())
}

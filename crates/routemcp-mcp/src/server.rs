//! MCP server implementation.
//!
//! [`McpServer`] owns the tool registry and answers JSON-RPC messages. Tools
//! are registered up front (route discovery plus manual tools) and the
//! registry is read-only while requests are served.

use crate::auth::{self, merge_into_value};
use crate::discovery::discover_routes;
use crate::dispatch::{InternalDispatcher, SubrequestDispatcher};
use crate::error::McpError;
use crate::http_transport::HttpServer;
use crate::permission::PermissionEvaluator;
use crate::protocol::*;
use crate::tool_generator::ToolGenerator;
use crate::tools::{ToolDefinition, ToolHandler, ToolRegistry};
use crate::validator::validate_arguments;
use axum::http::{HeaderMap, header};
use routemcp_core::{BridgeConfig, RouteRegistry, Transport};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

/// A tool call that passed its checks and is ready for the handler.
#[derive(Debug)]
pub struct PreparedCall<'a> {
    pub tool: &'a ToolDefinition,
    pub arguments: Map<String, Value>,
    /// `Authorization` built from exposed credentials. Empty otherwise.
    pub auth_headers: HeaderMap,
}

/// The MCP server.
pub struct McpServer {
    config: BridgeConfig,
    tools: ToolRegistry,
    dispatcher: Option<SubrequestDispatcher>,
    permissions: Option<Arc<dyn PermissionEvaluator>>,
}

impl McpServer {
    /// Create a new MCP server with the given configuration.
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            config,
            tools: ToolRegistry::new(),
            dispatcher: None,
            permissions: None,
        }
    }

    /// Set the collaborator that executes route-backed tools.
    pub fn with_dispatcher(mut self, executor: Arc<dyn InternalDispatcher>) -> Self {
        self.dispatcher = Some(SubrequestDispatcher::new(executor));
        self
    }

    /// Set the permission evaluator used for manual tools.
    pub fn with_permission_evaluator(mut self, evaluator: Arc<dyn PermissionEvaluator>) -> Self {
        self.permissions = Some(evaluator);
        self
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Register a tool, returning the name it was registered under.
    ///
    /// Credential fields are merged into the schema of tools that declare a
    /// security scheme, unless auth parameters are hidden by configuration.
    pub fn register_tool(&mut self, mut tool: ToolDefinition) -> Result<String, McpError> {
        if let Some(scheme) = tool.security {
            let merged = tool
                .input_schema
                .get("properties")
                .is_some_and(|p| p.get(auth::AUTH_FIELD).is_some());
            if self.config.auth.expose_auth_params && !merged {
                merge_into_value(&mut tool.input_schema, scheme);
            }
        }
        Ok(self.tools.register(tool)?)
    }

    /// Discover routes from `registry` and register a tool per route and method.
    ///
    /// Returns the number of tools registered.
    pub fn register_routes(&mut self, registry: &dyn RouteRegistry) -> Result<usize, McpError> {
        if !self.config.discovery.enabled {
            tracing::info!("Route discovery disabled");
            return Ok(0);
        }

        let generator = ToolGenerator::from_config(&self.config)
            .map_err(|e| McpError::StartupFailed(format!("invalid route filter: {}", e)))?;
        let routes = discover_routes(registry, &self.config.discovery);
        let tools = generator.generate_all(&routes);
        let count = tools.len();

        for tool in tools {
            self.tools.register(tool)?;
        }

        tracing::info!(
            route_count = routes.len(),
            tool_count = count,
            "Registered tools from routes"
        );
        Ok(count)
    }

    /// Start the MCP server on the configured transport.
    pub async fn run(self) -> Result<(), McpError> {
        match self.config.mcp.transport {
            Transport::Stdio => self.run_stdio().await,
            Transport::Http => HttpServer::new(Arc::new(self)).run().await,
        }
    }

    /// Serve newline-delimited JSON-RPC over stdin/stdout.
    pub async fn run_stdio(&self) -> Result<(), McpError> {
        tracing::info!(tool_count = self.tools.len(), "Starting MCP server with stdio transport");
        self.serve_lines(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
            .await?;
        tracing::info!("stdin closed, stopping MCP server");
        Ok(())
    }

    /// Answer one JSON-RPC message per input line until `reader` is exhausted.
    pub async fn serve_lines<R, W>(&self, reader: R, mut writer: W) -> Result<(), McpError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        let ctx = RequestContext::new();

        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if let Some(response) = self.handle_message(line, &ctx).await {
                let mut out = serde_json::to_string(&response)?;
                out.push('\n');
                writer.write_all(out.as_bytes()).await?;
                writer.flush().await?;
            }
        }
        Ok(())
    }

    /// Handle a raw JSON-RPC message. `None` means nothing is sent back.
    pub async fn handle_message(&self, message: &str, ctx: &RequestContext) -> Option<JsonRpcResponse> {
        let value: Value = match serde_json::from_str(message) {
            Ok(value) => value,
            Err(e) => {
                return Some(JsonRpcResponse::error(None, PARSE_ERROR, format!("Parse error: {}", e)));
            }
        };
        self.handle_value(value, ctx).await
    }

    /// Handle an already parsed JSON-RPC message.
    pub async fn handle_value(&self, value: Value, ctx: &RequestContext) -> Option<JsonRpcResponse> {
        let id = value.get("id").cloned().filter(|id| !id.is_null());
        let request: JsonRpcRequest = match serde_json::from_value(value) {
            Ok(request) => request,
            Err(e) => {
                return Some(JsonRpcResponse::error(id, INVALID_REQUEST, format!("Invalid request: {}", e)));
            }
        };
        if request.jsonrpc != "2.0" {
            return Some(JsonRpcResponse::error(
                id,
                INVALID_REQUEST,
                "Invalid request: jsonrpc must be \"2.0\"",
            ));
        }
        self.handle_request(request, ctx).await
    }

    /// Handle a JSON-RPC request.
    ///
    /// Notifications are processed but never answered.
    pub async fn handle_request(&self, request: JsonRpcRequest, ctx: &RequestContext) -> Option<JsonRpcResponse> {
        let id = request.id.clone();
        let notification = request.is_notification();

        let response = match request.method.as_str() {
            "initialize" => self.handle_initialize(id),
            "notifications/initialized" => {
                tracing::debug!("Client initialized");
                return None;
            }
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => self.handle_list_tools(id),
            "tools/call" => self.handle_call_tool(id, request.params, ctx).await,
            other => JsonRpcResponse::error(id, METHOD_NOT_FOUND, format!("Method not found: {}", other)),
        };

        if notification {
            tracing::debug!(method = %request.method, "Dropping response to notification");
            return None;
        }
        Some(response)
    }

    fn handle_initialize(&self, id: Option<Value>) -> JsonRpcResponse {
        let result = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "serverInfo": {
                "name": self.config.mcp.server_name,
                "version": self.config.mcp.server_version
            },
            "capabilities": {
                "tools": {
                    "listChanged": false
                }
            }
        });
        JsonRpcResponse::success(id, result)
    }

    fn handle_list_tools(&self, id: Option<Value>) -> JsonRpcResponse {
        let tools: Vec<ToolInfo> = self.tools.list().iter().map(ToolDefinition::info).collect();
        JsonRpcResponse::success(id, json!({ "tools": tools }))
    }

    async fn handle_call_tool(&self, id: Option<Value>, params: Option<Value>, ctx: &RequestContext) -> JsonRpcResponse {
        let Some(name) = params
            .as_ref()
            .and_then(|p| p.get("name"))
            .and_then(Value::as_str)
        else {
            return JsonRpcResponse::error(id, INVALID_PARAMS, "Missing tool name in params");
        };
        let arguments = params
            .as_ref()
            .and_then(|p| p.get("arguments"))
            .cloned()
            .unwrap_or(Value::Null);

        match self.call_tool(name, arguments, ctx).await {
            Ok(content) => {
                let response = CallToolResponse {
                    content,
                    is_error: None,
                };
                match serde_json::to_value(response) {
                    Ok(result) => JsonRpcResponse::success(id, result),
                    Err(e) => JsonRpcResponse::error(id, INTERNAL_ERROR, e.to_string()),
                }
            }
            Err(e) => {
                match &e {
                    McpError::ToolNotFound { .. } => tracing::debug!(tool = %name, "Unknown tool"),
                    _ => tracing::warn!(tool = %name, error = %e, "Tool call failed"),
                }
                JsonRpcResponse::error_with_data(id, e.code(), e.to_string(), e.data())
            }
        }
    }

    /// Run the checks that precede a tool call: permission, credentials, validation.
    ///
    /// The returned arguments no longer carry credentials.
    pub fn prepare_call(
        &self,
        name: &str,
        arguments: Value,
        ctx: &RequestContext,
    ) -> Result<PreparedCall<'_>, McpError> {
        let tool = self.tools.get(name).ok_or_else(|| McpError::ToolNotFound {
            name: name.to_string(),
        })?;

        let mut arguments = match arguments {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            _ => return Err(McpError::InvalidParams("arguments must be an object".to_string())),
        };

        if let (ToolHandler::Manual(_), Some(permission)) = (&tool.handler, &tool.permission) {
            self.check_permission(&tool.name, permission, ctx)?;
        }

        let auth_headers = match tool.security {
            Some(scheme) if self.config.auth.expose_auth_params => {
                let credential = auth::extract(&arguments, scheme)?;
                auth::strip(&mut arguments, &credential);
                auth::to_headers(&credential)?
            }
            Some(_) => {
                if !ctx.headers.contains_key(header::AUTHORIZATION) {
                    return Err(McpError::AuthorizationHeaderMissing {
                        tool: tool.name.clone(),
                    });
                }
                HeaderMap::new()
            }
            None => HeaderMap::new(),
        };

        if self.config.mcp.validate_arguments {
            validate_arguments(&tool.name, &tool.input_schema, &Value::Object(arguments.clone()))?;
        }

        Ok(PreparedCall {
            tool,
            arguments,
            auth_headers,
        })
    }

    /// Call a tool by name: permission, credentials, validation, then the handler.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Value,
        ctx: &RequestContext,
    ) -> Result<Vec<ToolContent>, McpError> {
        let PreparedCall {
            tool,
            arguments,
            auth_headers,
        } = self.prepare_call(name, arguments, ctx)?;

        tracing::debug!(tool = %tool.name, "Calling tool");
        match &tool.handler {
            ToolHandler::Manual(handler) => {
                let mut ctx = ctx.clone();
                for (header_name, value) in &auth_headers {
                    ctx.headers.insert(header_name.clone(), value.clone());
                }
                let output = handler(Value::Object(arguments), ctx)
                    .await
                    .map_err(|source| McpError::ToolFailed {
                        tool: tool.name.clone(),
                        source,
                    })?;
                Ok(output.into_content())
            }
            ToolHandler::Route(binding) => {
                let dispatcher = self.dispatcher.as_ref().ok_or_else(|| {
                    McpError::Internal(anyhow::anyhow!("no dispatcher configured for route tools"))
                })?;
                Ok(dispatcher.dispatch(ctx, &arguments, binding, &auth_headers).await?)
            }
        }
    }

    fn check_permission(&self, tool: &str, permission: &str, ctx: &RequestContext) -> Result<(), McpError> {
        let allowed = self
            .permissions
            .as_ref()
            .is_some_and(|evaluator| evaluator.permits(ctx, &ctx.principals, permission));
        if allowed {
            Ok(())
        } else {
            Err(McpError::PermissionDenied {
                tool: tool.to_string(),
                permission: permission.to_string(),
            })
        }
    }
}

//! Tool definitions and the tool registry.
//!
//! Tools come from two places: the [`ToolGenerator`](crate::tool_generator::ToolGenerator)
//! synthesizes route-backed tools, and embedding applications register manual
//! tools with [`ToolDefinition::manual`]. Both end up in a [`ToolRegistry`],
//! which owns name sanitization and keeps registration order for `tools/list`.

use crate::auth::SecurityScheme;
use crate::dispatch::RouteBinding;
use crate::protocol::{RequestContext, ToolContent, ToolInfo};
use crate::sanitize::{NamingError, sanitize_tool_name};
use futures::future::BoxFuture;
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// What a tool handler returns.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    /// A plain value, wrapped as text content.
    Value(Value),
    /// A pre-formed content list, passed through.
    Content(Vec<ToolContent>),
}

impl ToolOutput {
    /// The content list sent back to the client.
    pub fn into_content(self) -> Vec<ToolContent> {
        match self {
            ToolOutput::Content(content) => content,
            ToolOutput::Value(Value::String(text)) => vec![ToolContent::text(text)],
            ToolOutput::Value(value) => vec![ToolContent::text(value.to_string())],
        }
    }
}

impl From<Value> for ToolOutput {
    fn from(value: Value) -> Self {
        ToolOutput::Value(value)
    }
}

impl From<Vec<ToolContent>> for ToolOutput {
    fn from(content: Vec<ToolContent>) -> Self {
        ToolOutput::Content(content)
    }
}

/// Async function backing a manual tool.
pub type ManualHandler =
    Arc<dyn Fn(Value, RequestContext) -> BoxFuture<'static, anyhow::Result<ToolOutput>> + Send + Sync>;

/// How a tool is executed.
#[derive(Clone)]
pub enum ToolHandler {
    /// An application-supplied function.
    Manual(ManualHandler),
    /// A sub-request against a host route.
    Route(RouteBinding),
}

impl fmt::Debug for ToolHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolHandler::Manual(_) => f.write_str("Manual(..)"),
            ToolHandler::Route(binding) => f.debug_tuple("Route").field(binding).finish(),
        }
    }
}

/// Tool definition.
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// Exported JSON Schema for the arguments.
    pub input_schema: Value,
    pub handler: ToolHandler,
    /// Permission required to call the tool.
    pub permission: Option<String>,
    pub security: Option<SecurityScheme>,
}

impl ToolDefinition {
    /// A manual tool backed by an async function. The schema starts empty.
    pub fn manual<F, Fut>(name: impl Into<String>, description: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Value, RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<ToolOutput>> + Send + 'static,
    {
        let handler: ManualHandler = Arc::new(move |args, ctx| Box::pin(handler(args, ctx)));
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: empty_input_schema(),
            handler: ToolHandler::Manual(handler),
            permission: None,
            security: None,
        }
    }

    /// Set the input schema.
    pub fn with_schema(mut self, schema: Value) -> Self {
        self.input_schema = schema;
        self
    }

    pub fn with_permission(mut self, permission: impl Into<String>) -> Self {
        self.permission = Some(permission.into());
        self
    }

    pub fn with_security(mut self, scheme: SecurityScheme) -> Self {
        self.security = Some(scheme);
        self
    }

    pub fn is_route(&self) -> bool {
        matches!(self.handler, ToolHandler::Route(_))
    }

    /// The `tools/list` entry.
    pub fn info(&self) -> ToolInfo {
        ToolInfo {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: self.input_schema.clone(),
        }
    }
}

/// `{type: "object", properties: {}, required: [], additionalProperties: false}`.
pub fn empty_input_schema() -> Value {
    json!({
        "type": "object",
        "properties": {},
        "required": [],
        "additionalProperties": false,
    })
}

/// Registry of available MCP tools, in registration order.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<ToolDefinition>,
    /// Final name → position in `tools`.
    index: HashMap<String, usize>,
    /// Requested name → final name.
    requested: HashMap<String, String>,
    used_names: HashSet<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, returning its final name.
    ///
    /// Re-registering a requested name replaces the earlier tool in place.
    /// Otherwise the name is sanitized against every name in use.
    pub fn register(&mut self, mut tool: ToolDefinition) -> Result<String, NamingError> {
        if let Some(existing) = self.requested.get(&tool.name).cloned() {
            tracing::warn!(tool = %existing, "Tool re-registered, replacing previous definition");
            tool.name = existing.clone();
            if let Some(&position) = self.index.get(&existing) {
                self.tools[position] = tool;
            }
            return Ok(existing);
        }

        let requested = tool.name.clone();
        let name = sanitize_tool_name(&requested, &self.used_names)?;
        if name != requested {
            tracing::warn!(requested = %requested, name = %name, "Tool name sanitized");
        }

        tool.name = name.clone();
        self.used_names.insert(name.clone());
        self.requested.insert(requested, name.clone());
        self.index.insert(name.clone(), self.tools.len());
        self.tools.push(tool);
        Ok(name)
    }

    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// All tools, in registration order.
    pub fn list(&self) -> &[ToolDefinition] {
        &self.tools
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

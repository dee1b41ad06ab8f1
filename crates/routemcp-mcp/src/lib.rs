//! # routemcp-mcp
//!
//! Exposes the routes of a web application as MCP (Model Context Protocol)
//! tools.
//!
//! The pipeline runs once at startup and then serves calls:
//!
//! ```text
//! RouteRegistry ──► discovery ──► tool_generator ──► ToolRegistry
//!                      │               │
//!                  pattern, filter  schema, auth, sanitize
//!
//! MCP client ──► transport ──► McpServer ──► validator ──► SubrequestDispatcher
//!                                                               │
//!                                                    InternalDispatcher (axum Router)
//! ```
//!
//! - **Discovery** turns registered routes, their views and any correlated
//!   service metadata into [`RouteDescriptor`]s.
//! - **Tool generation** produces one tool per route and method, with an
//!   input schema normalized from the view's declared parameters.
//! - **Calls** strip credential arguments into an `Authorization` header,
//!   validate the rest, then replay them as an internal request against the
//!   host route.
//!
//! Manual tools can be registered next to the generated ones with
//! [`ToolDefinition::manual`].

pub mod auth;
pub mod discovery;
pub mod dispatch;
pub mod error;
pub mod filter;
pub mod http_transport;
pub mod integration;
pub mod pattern;
pub mod permission;
pub mod protocol;
pub mod sanitize;
pub mod schema;
pub mod server;
pub mod tool_generator;
pub mod tools;
pub mod validator;

pub use auth::{AuthCredential, InvalidCredential, MissingCredential, SecurityScheme};
pub use discovery::{DiscoveryError, RouteDescriptor, ViewDescriptor, discover_routes};
pub use dispatch::{
    DispatchError, DispatchFailure, InternalDispatcher, InternalRequest, InternalResponse, RouteBinding,
    RouterDispatcher, SubrequestDispatcher,
};
pub use error::McpError;
pub use filter::RouteFilter;
pub use integration::McpBridge;
pub use pattern::{PathPattern, PatternError};
pub use permission::{PermissionEvaluator, PrincipalGrants};
pub use protocol::{JsonRpcRequest, JsonRpcResponse, RequestContext, ToolContent, ToolInfo};
pub use sanitize::{NamingError, sanitize_tool_name};
pub use schema::{FieldSchema, InputSchema, SchemaLayout, build_input_schema, normalize_fields};
pub use server::{McpServer, PreparedCall};
pub use tool_generator::ToolGenerator;
pub use tools::{ToolDefinition, ToolHandler, ToolOutput, ToolRegistry};
pub use validator::{ValidationError, validate_arguments};

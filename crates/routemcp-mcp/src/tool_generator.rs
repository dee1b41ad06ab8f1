//! Route-driven tool generation.
//!
//! Every discovered route yields one tool per HTTP method. The tool's input
//! schema comes from the most specific schema available, and its handler is
//! a [`RouteBinding`] that the server hands to the sub-request dispatcher.
//!
//! ## Naming Rules
//!
//! | Method | Prefix (routes with several methods) |
//! |--------|--------------------------------------|
//! | GET | `list_` when the name looks like a collection, else `get_` |
//! | POST | `create_` |
//! | PUT | `update_` |
//! | PATCH | `modify_` |
//! | DELETE | `delete_` |
//!
//! No prefix is added when the route name already starts or ends with the verb.

use crate::auth::{SecurityScheme, merge_into_schema};
use crate::discovery::RouteDescriptor;
use crate::dispatch::RouteBinding;
use crate::filter::RouteFilter;
use crate::schema::build_input_schema;
use crate::tools::{ToolDefinition, ToolHandler};
use axum::http::Method;
use routemcp_core::BridgeConfig;

/// Generator for MCP tools from discovered routes.
#[derive(Debug, Clone)]
pub struct ToolGenerator {
    filter: RouteFilter,
    expose_auth_params: bool,
}

impl ToolGenerator {
    pub fn new(filter: RouteFilter, expose_auth_params: bool) -> Self {
        Self {
            filter,
            expose_auth_params,
        }
    }

    /// Build a generator from the bridge configuration.
    pub fn from_config(config: &BridgeConfig) -> Result<Self, regex::Error> {
        let filter = RouteFilter::new(&config.discovery.include, &config.discovery.exclude)?;
        Ok(Self::new(filter, config.auth.expose_auth_params))
    }

    /// Generate tools for every route that passes the filter.
    pub fn generate_all(&self, routes: &[RouteDescriptor]) -> Vec<ToolDefinition> {
        let mut tools = Vec::new();
        for route in routes {
            let route_tools = self.generate(route);
            tracing::debug!(
                route = %route.name,
                tools = ?route_tools.iter().map(|t| &t.name).collect::<Vec<_>>(),
                "Generated tools"
            );
            tools.extend(route_tools);
        }
        tools
    }

    /// Generate one tool per method of `route`. Filtered routes yield nothing.
    pub fn generate(&self, route: &RouteDescriptor) -> Vec<ToolDefinition> {
        if !self.filter.allows_route(route) {
            tracing::debug!(route = %route.name, "Route filtered out");
            return Vec::new();
        }

        let multi_method = route.methods.len() > 1;
        route
            .methods
            .iter()
            .map(|method| {
                let name = if multi_method {
                    tool_name(&route.name, method)
                } else {
                    route.name.clone()
                };
                self.generate_method_tool(route, method, name)
            })
            .collect()
    }

    fn generate_method_tool(&self, route: &RouteDescriptor, method: &Method, name: String) -> ToolDefinition {
        let view = route.view_for(method);
        let source = route.schema_for(view, method);
        let input = build_input_schema(source, &route.pattern, &route.optional_params, method);
        let mut schema = input.schema;

        let security = view.and_then(|v| v.security.as_deref()).and_then(|tag| {
            let scheme = SecurityScheme::resolve(tag);
            if scheme.is_none() {
                tracing::warn!(route = %route.name, scheme = %tag, "Unknown security scheme, ignoring");
            }
            scheme
        });
        if let Some(scheme) = security {
            if self.expose_auth_params {
                merge_into_schema(&mut schema, scheme);
            }
        }

        let renderer = view.and_then(|v| v.renderer.clone()).or_else(|| {
            route
                .service
                .as_ref()
                .and_then(|s| s.content_type.as_deref())
                .filter(|ct| ct.contains("json"))
                .map(|_| "json".to_string())
        });

        ToolDefinition {
            name,
            description: route.description_for(method),
            input_schema: schema.to_input_schema(),
            handler: ToolHandler::Route(RouteBinding {
                route_name: route.name.clone(),
                pattern: route.pattern.clone(),
                method: method.clone(),
                layout: input.layout,
                renderer,
                optional_params: route.optional_params.clone(),
            }),
            permission: view.and_then(|v| v.permission.clone()),
            security,
        }
    }
}

/// Tool name for one method of a multi-method route.
pub fn tool_name(base: &str, method: &Method) -> String {
    let verb = match *method {
        Method::GET if looks_like_collection(base) => "list",
        Method::GET => "get",
        Method::POST => "create",
        Method::PUT => "update",
        Method::PATCH => "modify",
        Method::DELETE => "delete",
        _ => return format!("{}_{}", method.as_str().to_ascii_lowercase(), base),
    };

    let lower = base.to_ascii_lowercase();
    if lower.starts_with(verb) || lower.ends_with(verb) {
        base.to_string()
    } else {
        format!("{}_{}", verb, base)
    }
}

fn looks_like_collection(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.contains("list") || (lower.ends_with('s') && !lower.ends_with("ss"))
}

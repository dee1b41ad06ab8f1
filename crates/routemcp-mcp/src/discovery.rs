//! Route discovery.
//!
//! Walks a [`RouteRegistry`] and produces one [`RouteDescriptor`] per usable
//! route. Discovery never fails as a whole: a route that cannot be read is
//! logged and skipped.

use crate::pattern::{PathPattern, PatternError};
use axum::http::Method;
use routemcp_core::{
    DiscoveryConfig, RegisteredRoute, RegisteredView, RouteRegistry, SchemaSource,
    ServiceMetadata,
};

/// Name prefix marking framework static-asset routes.
const STATIC_ROUTE_PREFIX: &str = "__static";

/// Errors for a single route. They never abort discovery.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum DiscoveryError {
    #[error("invalid pattern: {0}")]
    Pattern(#[from] PatternError),

    #[error("invalid HTTP method '{0}'")]
    Method(String),

    #[error("route has no usable methods")]
    NoMethods,
}

/// One discovered endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteDescriptor {
    pub name: String,
    pub pattern: PathPattern,
    /// Distinct methods across all views, in first-seen order.
    pub methods: Vec<Method>,
    pub views: Vec<ViewDescriptor>,
    /// Correlated REST-service metadata.
    pub service: Option<ServiceMetadata>,
    pub optional_params: Vec<String>,
}

impl RouteDescriptor {
    /// The first view answering `method`.
    pub fn view_for(&self, method: &Method) -> Option<&ViewDescriptor> {
        self.views.iter().find(|v| v.methods.contains(method))
    }

    /// Most specific schema for `method`: service validators win over the view's own.
    pub fn schema_for<'a>(
        &'a self,
        view: Option<&'a ViewDescriptor>,
        method: &Method,
    ) -> Option<&'a SchemaSource> {
        self.service
            .as_ref()
            .and_then(|s| s.schema_for(method.as_str()))
            .or_else(|| view.and_then(|v| v.schema.as_ref()))
    }

    /// Description for `method`: explicit, then doc string, then generated.
    pub fn description_for(&self, method: &Method) -> String {
        self.view_for(method)
            .and_then(|v| v.description.clone())
            .unwrap_or_else(|| auto_description(&self.name, method, self.pattern.as_str()))
    }
}

/// One method-specific handler.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewDescriptor {
    pub handler: String,
    pub methods: Vec<Method>,
    /// Explicit description, else the handler's doc string.
    pub description: Option<String>,
    /// Raw security scheme tag read from the configured annotation key.
    pub security: Option<String>,
    pub schema: Option<SchemaSource>,
    pub permission: Option<String>,
    pub renderer: Option<String>,
}

/// Enumerate the registry into route descriptors.
///
/// Routes under the reserved prefix and static-asset routes are excluded.
pub fn discover_routes(registry: &dyn RouteRegistry, config: &DiscoveryConfig) -> Vec<RouteDescriptor> {
    let services = registry.services();
    let mut routes = Vec::new();

    for route in registry.routes() {
        if !config.reserved_prefix.is_empty() && route.name.starts_with(&config.reserved_prefix) {
            tracing::debug!(route = %route.name, "Skipping reserved route");
            continue;
        }
        if route.is_static || route.name.starts_with(STATIC_ROUTE_PREFIX) {
            tracing::debug!(route = %route.name, "Skipping static route");
            continue;
        }

        match describe_route(&route, &services, config) {
            Ok(descriptor) => routes.push(descriptor),
            Err(e) => {
                tracing::warn!(route = %route.name, pattern = %route.pattern, error = %e, "Skipping route");
            }
        }
    }

    tracing::debug!(route_count = routes.len(), "Route discovery complete");
    routes
}

fn describe_route(
    route: &RegisteredRoute,
    services: &[ServiceMetadata],
    config: &DiscoveryConfig,
) -> Result<RouteDescriptor, DiscoveryError> {
    let pattern = PathPattern::parse(&route.pattern)?;
    let route_methods = parse_methods(&route.methods)?;

    let mut views = Vec::with_capacity(route.views.len());
    let mut methods: Vec<Method> = Vec::new();
    for view in &route.views {
        let view = describe_view(view, &route_methods, config)?;
        for method in &view.methods {
            if !methods.contains(method) {
                methods.push(method.clone());
            }
        }
        views.push(view);
    }

    if views.is_empty() {
        // A bare route still answers its declared methods.
        for method in &route_methods {
            if !methods.contains(method) {
                methods.push(method.clone());
            }
        }
    }
    if methods.is_empty() {
        return Err(DiscoveryError::NoMethods);
    }

    let service = correlate_service(&route.name, &pattern, services).cloned();
    if let Some(service) = &service {
        tracing::debug!(route = %route.name, service = %service.name, "Attached service metadata");
    }

    Ok(RouteDescriptor {
        name: route.name.clone(),
        pattern,
        methods,
        views,
        service,
        optional_params: route.optional_params.clone(),
    })
}

fn describe_view(
    view: &RegisteredView,
    route_methods: &[Method],
    config: &DiscoveryConfig,
) -> Result<ViewDescriptor, DiscoveryError> {
    let mut methods = parse_methods(&view.methods)?;
    if methods.is_empty() {
        methods = if route_methods.is_empty() {
            vec![Method::GET]
        } else {
            route_methods.to_vec()
        };
    }

    let description = non_blank(view.description.as_deref()).or_else(|| non_blank(view.doc.as_deref()));

    Ok(ViewDescriptor {
        handler: view.handler.clone(),
        methods,
        description,
        security: view.annotations.get(&config.security_parameter).cloned(),
        schema: view.schema.clone(),
        permission: view.permission.clone(),
        renderer: view.renderer.clone(),
    })
}

/// Parse method names, dropping OPTIONS and HEAD.
fn parse_methods(names: &[String]) -> Result<Vec<Method>, DiscoveryError> {
    let mut methods = Vec::new();
    for name in names {
        let method = Method::from_bytes(name.trim().to_ascii_uppercase().as_bytes())
            .map_err(|_| DiscoveryError::Method(name.clone()))?;
        if method == Method::OPTIONS || method == Method::HEAD {
            continue;
        }
        if !methods.contains(&method) {
            methods.push(method);
        }
    }
    Ok(methods)
}

fn non_blank(text: Option<&str>) -> Option<String> {
    text.map(str::trim).filter(|t| !t.is_empty()).map(String::from)
}

/// Match service metadata to a route: exact name, then exact path, then the
/// longest service name that prefixes the route name (earliest on ties).
pub fn correlate_service<'a>(
    route_name: &str,
    pattern: &PathPattern,
    services: &'a [ServiceMetadata],
) -> Option<&'a ServiceMetadata> {
    if let Some(service) = services.iter().find(|s| s.name == route_name) {
        return Some(service);
    }

    let route_path = pattern.to_route_path();
    if let Some(service) = services
        .iter()
        .find(|s| s.path == pattern.as_str() || s.path == route_path)
    {
        return Some(service);
    }

    let mut best: Option<&ServiceMetadata> = None;
    for service in services {
        if service.name.is_empty() || !route_name.starts_with(&service.name) {
            continue;
        }
        if best.is_none_or(|b| service.name.len() > b.name.len()) {
            best = Some(service);
        }
    }
    best
}

/// `"<Verb> <resource> via <METHOD> <pattern>"`.
pub fn auto_description(route_name: &str, method: &Method, pattern: &str) -> String {
    let verb = match *method {
        Method::GET => "Retrieve",
        Method::POST => "Create",
        Method::PUT => "Update",
        Method::PATCH => "Modify",
        Method::DELETE => "Delete",
        _ => "Handle",
    };
    let resource = route_name.replace(['_', '-'], " ");
    format!("{} {} via {} {}", verb, resource, method, pattern)
}

#[cfg(test)]
mod tests {
    use super::*;
    use routemcp_core::{FieldDecl, FieldKind, RegisteredRoute, RegisteredView, SchemaDecl, StaticRouteRegistry};

    fn config() -> DiscoveryConfig {
        DiscoveryConfig::default()
    }

    fn schema(field: &str) -> SchemaSource {
        SchemaSource::Fields(SchemaDecl::new().field(FieldDecl::new(field, FieldKind::String)))
    }

    #[test]
    fn test_reserved_and_static_routes_excluded() {
        let registry = StaticRouteRegistry::new()
            .with_route(RegisteredRoute::new("mcp_http", "/mcp").view(RegisteredView::new("mcp")))
            .with_route(RegisteredRoute::new("assets", "/static/{path}").static_assets())
            .with_route(RegisteredRoute::new("__static/css", "/css/{path}"))
            .with_route(RegisteredRoute::new("users", "/users").view(RegisteredView::new("users")));

        let routes = discover_routes(&registry, &config());
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].name, "users");
    }

    #[test]
    fn test_methods_default_and_options_head_dropped() {
        let registry = StaticRouteRegistry::new()
            .with_route(RegisteredRoute::new("plain", "/plain").view(RegisteredView::new("plain")))
            .with_route(
                RegisteredRoute::new("multi", "/multi")
                    .methods(["get", "HEAD", "OPTIONS", "post"])
                    .view(RegisteredView::new("multi")),
            )
            .with_route(
                RegisteredRoute::new("only_head", "/h")
                    .view(RegisteredView::new("h").methods(["HEAD", "OPTIONS"])),
            );

        let routes = discover_routes(&registry, &config());
        assert_eq!(routes[0].methods, vec![Method::GET]);
        assert_eq!(routes[1].methods, vec![Method::GET, Method::POST]);
        // Only OPTIONS/HEAD: the view falls back to the default method.
        assert_eq!(routes[2].methods, vec![Method::GET]);
    }

    #[test]
    fn test_bad_routes_skipped() {
        let registry = StaticRouteRegistry::new()
            .with_route(RegisteredRoute::new("broken", "/items/{id").view(RegisteredView::new("b")))
            .with_route(
                RegisteredRoute::new("weird", "/w").view(RegisteredView::new("w").methods(["NOT A METHOD"])),
            )
            .with_route(RegisteredRoute::new("ok", "/ok").view(RegisteredView::new("ok")));

        let routes = discover_routes(&registry, &config());
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].name, "ok");
    }

    #[test]
    fn test_description_priority() {
        let registry = StaticRouteRegistry::new().with_route(
            RegisteredRoute::new("user_accounts", "/accounts/{id}")
                .view(
                    RegisteredView::new("get")
                        .methods(["GET"])
                        .doc("  Fetch one account.  ")
                        .description("Explicit"),
                )
                .view(RegisteredView::new("put").methods(["PUT"]).doc("Replace an account."))
                .view(RegisteredView::new("delete").methods(["DELETE"]).doc("   ")),
        );

        let route = &discover_routes(&registry, &config())[0];
        assert_eq!(route.description_for(&Method::GET), "Explicit");
        assert_eq!(route.description_for(&Method::PUT), "Replace an account.");
        assert_eq!(
            route.description_for(&Method::DELETE),
            "Delete user accounts via DELETE /accounts/{id}"
        );
    }

    #[test]
    fn test_security_annotation_uses_configured_key() {
        let registry = StaticRouteRegistry::new().with_route(
            RegisteredRoute::new("secure", "/secure")
                .view(RegisteredView::new("s").annotate("security", "Bearer").annotate("auth", "basic")),
        );

        let routes = discover_routes(&registry, &config());
        assert_eq!(routes[0].views[0].security.as_deref(), Some("Bearer"));

        let custom = DiscoveryConfig {
            security_parameter: "auth".to_string(),
            ..config()
        };
        let routes = discover_routes(&registry, &custom);
        assert_eq!(routes[0].views[0].security.as_deref(), Some("basic"));
    }

    #[test]
    fn test_service_correlation_order() {
        let pattern = PathPattern::parse("/users/{id:\\d+}").unwrap();
        let services = vec![
            ServiceMetadata::new("user", "/u"),
            ServiceMetadata::new("users", "/other"),
            ServiceMetadata::new("by_path", "/users/{id}"),
            ServiceMetadata::new("users_detail", "/x"),
        ];

        assert_eq!(correlate_service("users_detail", &pattern, &services).unwrap().name, "users_detail");
        assert_eq!(correlate_service("accounts", &pattern, &services).unwrap().name, "by_path");

        let other = PathPattern::parse("/nowhere").unwrap();
        assert_eq!(correlate_service("users_admin", &other, &services).unwrap().name, "users");
        assert!(correlate_service("items", &other, &services).is_none());
    }

    #[test]
    fn test_prefix_ties_go_to_earliest_service() {
        let other = PathPattern::parse("/nowhere").unwrap();
        let services = vec![ServiceMetadata::new("api", "/a"), ServiceMetadata::new("api", "/b")];
        assert_eq!(correlate_service("api_items", &other, &services).unwrap().path, "/a");
    }

    #[test]
    fn test_service_schema_overrides_view_schema() {
        let registry = StaticRouteRegistry::new()
            .with_route(
                RegisteredRoute::new("items", "/items")
                    .view(RegisteredView::new("list").methods(["GET"]).schema(schema("view_q")))
                    .view(RegisteredView::new("create").methods(["POST"]).schema(schema("view_body"))),
            )
            .with_service(ServiceMetadata::new("items", "/items").validator("post", schema("svc_body")));

        let route = &discover_routes(&registry, &config())[0];
        let get_view = route.view_for(&Method::GET);
        let post_view = route.view_for(&Method::POST);
        assert_eq!(route.schema_for(get_view, &Method::GET), Some(&schema("view_q")));
        assert_eq!(route.schema_for(post_view, &Method::POST), Some(&schema("svc_body")));
    }

    #[test]
    fn test_discovery_is_idempotent() {
        let registry = StaticRouteRegistry::new()
            .with_route(
                RegisteredRoute::new("users", "/users")
                    .view(RegisteredView::new("list").methods(["GET"]))
                    .view(RegisteredView::new("create").methods(["POST"])),
            )
            .with_route(RegisteredRoute::new("item", "/items/{id}").view(RegisteredView::new("get")));

        let first = discover_routes(&registry, &config());
        let second = discover_routes(&registry, &config());
        assert_eq!(first, second);
    }
}

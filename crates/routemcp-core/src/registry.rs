//! Host route registry model.
//!
//! The bridge never walks the host application's internals. Instead the host
//! describes its routes through the [`RouteRegistry`] trait, typically with a
//! [`StaticRouteRegistry`] built next to the router or loaded from a YAML
//! [`RouteManifest`].

use crate::config::ConfigError;
use crate::schema_decl::SchemaSource;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Read-only access to the host application's routes.
pub trait RouteRegistry: Send + Sync {
    /// All registered routes, in registration order.
    fn routes(&self) -> Vec<RegisteredRoute>;

    /// REST-service metadata, when the host declares routes through a service layer.
    fn services(&self) -> Vec<ServiceMetadata> {
        Vec::new()
    }
}

/// A route as registered in the host application.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegisteredRoute {
    /// Unique route name.
    pub name: String,

    /// URL pattern with `{param}` or `{param:regex}` placeholders.
    pub pattern: String,

    /// Methods declared on the route itself.
    #[serde(default)]
    pub methods: Vec<String>,

    /// Views attached to the route.
    #[serde(default)]
    pub views: Vec<RegisteredView>,

    /// Route serves static assets.
    #[serde(default, rename = "static")]
    pub is_static: bool,

    /// Placeholders that may be omitted.
    #[serde(default)]
    pub optional_params: Vec<String>,
}

impl RegisteredRoute {
    pub fn new(name: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pattern: pattern.into(),
            methods: Vec::new(),
            views: Vec::new(),
            is_static: false,
            optional_params: Vec::new(),
        }
    }

    /// Attach a view.
    pub fn view(mut self, view: RegisteredView) -> Self {
        self.views.push(view);
        self
    }

    /// Declare route-level methods.
    pub fn methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.methods = methods.into_iter().map(Into::into).collect();
        self
    }

    /// Mark the route as serving static assets.
    pub fn static_assets(mut self) -> Self {
        self.is_static = true;
        self
    }

    /// Mark a placeholder optional.
    pub fn optional_param(mut self, name: impl Into<String>) -> Self {
        self.optional_params.push(name.into());
        self
    }
}

/// A method-specific handler attached to a route.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegisteredView {
    /// Handler reference (function path or name).
    pub handler: String,

    /// Methods this view answers. Empty means the route's methods.
    #[serde(default)]
    pub methods: Vec<String>,

    /// Handler documentation string.
    #[serde(default)]
    pub doc: Option<String>,

    /// Explicit tool description.
    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub permission: Option<String>,

    #[serde(default)]
    pub schema: Option<SchemaSource>,

    /// Response renderer (e.g. "json", "string").
    #[serde(default)]
    pub renderer: Option<String>,

    /// Free-form view annotations; the security scheme lives under a configurable key.
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

impl RegisteredView {
    pub fn new(handler: impl Into<String>) -> Self {
        Self {
            handler: handler.into(),
            methods: Vec::new(),
            doc: None,
            description: None,
            permission: None,
            schema: None,
            renderer: None,
            annotations: BTreeMap::new(),
        }
    }

    pub fn methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.methods = methods.into_iter().map(Into::into).collect();
        self
    }

    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn permission(mut self, permission: impl Into<String>) -> Self {
        self.permission = Some(permission.into());
        self
    }

    pub fn schema(mut self, schema: SchemaSource) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn renderer(mut self, renderer: impl Into<String>) -> Self {
        self.renderer = Some(renderer.into());
        self
    }

    /// Add an annotation.
    pub fn annotate(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }
}

/// Metadata from a REST-service layer declared on top of routes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceMetadata {
    /// Service name, correlated against route names.
    pub name: String,

    /// Service path, correlated against route patterns.
    pub path: String,

    /// Per-method schemas, keyed by upper-case method.
    #[serde(default)]
    pub validators: BTreeMap<String, SchemaSource>,

    #[serde(default)]
    pub filters: Vec<String>,

    /// Default response content type.
    #[serde(default)]
    pub content_type: Option<String>,

    #[serde(default)]
    pub cors_enabled: bool,
}

impl ServiceMetadata {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            validators: BTreeMap::new(),
            filters: Vec::new(),
            content_type: None,
            cors_enabled: false,
        }
    }

    /// Declare the schema for one method.
    pub fn validator(mut self, method: &str, schema: SchemaSource) -> Self {
        self.validators.insert(method.to_ascii_uppercase(), schema);
        self
    }

    /// Schema declared for `method`, if any.
    pub fn schema_for(&self, method: &str) -> Option<&SchemaSource> {
        self.validators.get(&method.to_ascii_uppercase())
    }
}

/// In-memory registry populated explicitly by the embedding application.
#[derive(Debug, Clone, Default)]
pub struct StaticRouteRegistry {
    routes: Vec<RegisteredRoute>,
    services: Vec<ServiceMetadata>,
}

impl StaticRouteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a route. A route with the same name replaces the earlier one in place.
    pub fn add_route(&mut self, route: RegisteredRoute) -> &mut Self {
        match self.routes.iter_mut().find(|r| r.name == route.name) {
            Some(existing) => *existing = route,
            None => self.routes.push(route),
        }
        self
    }

    /// Register service metadata.
    pub fn add_service(&mut self, service: ServiceMetadata) -> &mut Self {
        self.services.push(service);
        self
    }

    /// Builder-style `add_route`.
    pub fn with_route(mut self, route: RegisteredRoute) -> Self {
        self.add_route(route);
        self
    }

    /// Builder-style `add_service`.
    pub fn with_service(mut self, service: ServiceMetadata) -> Self {
        self.add_service(service);
        self
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl RouteRegistry for StaticRouteRegistry {
    fn routes(&self) -> Vec<RegisteredRoute> {
        self.routes.clone()
    }

    fn services(&self) -> Vec<ServiceMetadata> {
        self.services.clone()
    }
}

/// YAML description of an application's routes.
///
/// ```yaml
/// routes:
///   - name: users
///     pattern: /users
///     views:
///       - handler: users::list
///         methods: [GET]
/// services: []
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RouteManifest {
    #[serde(default)]
    pub routes: Vec<RegisteredRoute>,

    #[serde(default)]
    pub services: Vec<ServiceMetadata>,
}

impl RouteManifest {
    /// Load a manifest from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse a manifest from YAML content.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(ConfigError::from)
    }

    /// Build a registry from the manifest.
    pub fn into_registry(self) -> StaticRouteRegistry {
        let mut registry = StaticRouteRegistry::new();
        for route in self.routes {
            registry.add_route(route);
        }
        for service in self.services {
            registry.add_service(service);
        }
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_route_replaces_same_name() {
        let mut registry = StaticRouteRegistry::new();
        registry
            .add_route(RegisteredRoute::new("users", "/users"))
            .add_route(RegisteredRoute::new("items", "/items"))
            .add_route(RegisteredRoute::new("users", "/v2/users"));

        let routes = registry.routes();
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].name, "users");
        assert_eq!(routes[0].pattern, "/v2/users");
        assert_eq!(routes[1].name, "items");
    }

    #[test]
    fn test_manifest_from_yaml() {
        let yaml = r#"
routes:
  - name: users
    pattern: /users
    views:
      - handler: users::list
        methods: [GET]
        doc: List all users.
      - handler: users::create
        methods: [POST]
        annotations:
          security: bearer
  - name: assets
    pattern: /static/{path}
    static: true
services:
  - name: users
    path: /users
    validators:
      POST:
        dialect: fields
        fields:
          - name: name
            required: true
"#;
        let manifest = RouteManifest::from_yaml(yaml).unwrap();
        assert_eq!(manifest.routes.len(), 2);
        assert!(manifest.routes[1].is_static);
        assert_eq!(
            manifest.routes[0].views[1].annotations.get("security"),
            Some(&"bearer".to_string())
        );

        let registry = manifest.into_registry();
        let services = registry.services();
        assert!(services[0].schema_for("post").is_some());
        assert!(services[0].schema_for("GET").is_none());
    }
}

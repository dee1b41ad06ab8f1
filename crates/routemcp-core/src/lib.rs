//! # routemcp-core
//!
//! Shared types for routemcp: the configuration surface, the host route
//! registry model the bridge introspects, and the declarative schema
//! dialects views use to describe their parameters.

pub mod config;
pub mod registry;
pub mod schema_decl;

pub use config::{AuthConfig, BridgeConfig, ConfigError, DiscoveryConfig, McpConfig, Transport};
pub use registry::{
    RegisteredRoute, RegisteredView, RouteManifest, RouteRegistry, ServiceMetadata,
    StaticRouteRegistry,
};
pub use schema_decl::{FieldDecl, FieldKind, FieldValidator, SchemaDecl, SchemaSource};

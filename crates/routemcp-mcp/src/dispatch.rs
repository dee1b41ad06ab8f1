//! Sub-request dispatch.
//!
//! Route-derived tools run by rebuilding an HTTP request from the tool
//! arguments and sending it through the host application in-process. The
//! [`InternalDispatcher`] trait is the seam to the host; [`RouterDispatcher`]
//! implements it for an `axum::Router` using `tower::ServiceExt::oneshot`.

use crate::pattern::{PathPattern, scalar_to_string};
use crate::protocol::{RequestContext, ToolContent};
use crate::schema::{FREE_FORM_FIELD, SchemaLayout, is_state_changing};
use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, Bytes};
use axum::http::{Extensions, HeaderMap, HeaderValue, Method, Request, StatusCode, header};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tower::ServiceExt;

/// Environment keys that describe the outer request and must not leak into a sub-request.
const EXCLUDED_ENVIRON_KEYS: &[&str] = &[
    "REQUEST_METHOD",
    "PATH_INFO",
    "QUERY_STRING",
    "REQUEST_URI",
    "RAW_URI",
    "CONTENT_TYPE",
    "CONTENT_LENGTH",
    "HTTP_CONTENT_TYPE",
    "HTTP_CONTENT_LENGTH",
];

/// Environment key prefixes owned by the router.
const EXCLUDED_ENVIRON_PREFIXES: &[&str] = &["routing.", "matched_"];

/// Everything the dispatcher needs to call one route with one method.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteBinding {
    pub route_name: String,
    pub pattern: PathPattern,
    pub method: Method,
    pub layout: SchemaLayout,
    pub renderer: Option<String>,
    pub optional_params: Vec<String>,
}

/// Environment of the originating MCP request, as seen by sub-request handlers.
///
/// Inserted into the sub-request's extensions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Environ(pub BTreeMap<String, Value>);

/// An in-process request built from tool arguments.
#[derive(Debug, Clone)]
pub struct InternalRequest {
    pub method: Method,
    /// Path and query, e.g. `/items/42?verbose=true`.
    pub uri: String,
    pub headers: HeaderMap,
    pub body: Option<Value>,
    pub environ: BTreeMap<String, Value>,
    pub extensions: Extensions,
}

/// The host's answer to an [`InternalRequest`].
#[derive(Debug, Clone)]
pub struct InternalResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl InternalResponse {
    pub fn new(status: StatusCode, content_type: Option<&str>, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            content_type: content_type.map(String::from),
            body: body.into(),
        }
    }

    /// A `200 OK` JSON response.
    pub fn json(value: &Value) -> Self {
        Self::new(StatusCode::OK, Some("application/json"), value.to_string())
    }
}

/// Errors building or executing a sub-request.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("failed to build request: {0}")]
    Build(String),

    #[error("dispatch failed: {0}")]
    Execute(String),

    #[error("failed to read response body: {0}")]
    Body(String),
}

/// Executes internal requests against the host application.
#[async_trait]
pub trait InternalDispatcher: Send + Sync {
    async fn execute(&self, request: InternalRequest) -> Result<InternalResponse, DispatchError>;
}

/// Dispatches into an axum router without touching the network.
#[derive(Clone)]
pub struct RouterDispatcher {
    router: Router,
}

impl RouterDispatcher {
    pub fn new(router: Router) -> Self {
        Self { router }
    }
}

#[async_trait]
impl InternalDispatcher for RouterDispatcher {
    async fn execute(&self, request: InternalRequest) -> Result<InternalResponse, DispatchError> {
        let body = match &request.body {
            Some(value) => Body::from(
                serde_json::to_vec(value).map_err(|e| DispatchError::Build(e.to_string()))?,
            ),
            None => Body::empty(),
        };

        let mut http_request = Request::builder()
            .method(request.method)
            .uri(&request.uri)
            .body(body)
            .map_err(|e| DispatchError::Build(e.to_string()))?;
        *http_request.headers_mut() = request.headers;
        *http_request.extensions_mut() = request.extensions;
        http_request.extensions_mut().insert(Environ(request.environ));

        let response = match self.router.clone().oneshot(http_request).await {
            Ok(response) => response,
            Err(never) => match never {},
        };

        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .map_err(|e| DispatchError::Body(e.to_string()))?;

        Ok(InternalResponse {
            status,
            content_type,
            body,
        })
    }
}

/// Why a dispatch failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The route answered 401.
    Authentication,
    /// The route answered 403.
    Permission,
    /// Any other non-2xx status.
    Status(u16),
    /// The request could not be built or executed.
    Error,
}

/// A failed tool call, carrying what was attempted.
#[derive(Debug, Clone)]
pub struct DispatchFailure {
    pub route: String,
    pub method: Method,
    pub arguments: Value,
    pub kind: FailureKind,
    pub message: String,
}

impl DispatchFailure {
    fn new(binding: &RouteBinding, arguments: &Map<String, Value>, kind: FailureKind, message: String) -> Self {
        Self {
            route: binding.route_name.clone(),
            method: binding.method.clone(),
            arguments: Value::Object(arguments.clone()),
            kind,
            message,
        }
    }

    /// Structured error data for the JSON-RPC envelope.
    pub fn data(&self) -> Value {
        let mut data = json!({
            "route": self.route,
            "method": self.method.as_str(),
            "arguments": self.arguments,
        });
        if let FailureKind::Status(status) = self.kind {
            data["status"] = json!(status);
        }
        data
    }
}

impl fmt::Display for DispatchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for DispatchFailure {}

/// Values split by request location.
#[derive(Debug, Default, PartialEq)]
struct SplitArguments {
    path: Map<String, Value>,
    query: Map<String, Value>,
    body: Map<String, Value>,
    /// A non-object `body` argument, sent as is.
    raw_body: Option<Value>,
}

/// Turns tool calls into sub-requests and responses into MCP content.
#[derive(Clone)]
pub struct SubrequestDispatcher {
    executor: Arc<dyn InternalDispatcher>,
}

impl SubrequestDispatcher {
    pub fn new(executor: Arc<dyn InternalDispatcher>) -> Self {
        Self { executor }
    }

    /// Build the internal request for a call without executing it.
    pub fn build_request(
        ctx: &RequestContext,
        arguments: &Map<String, Value>,
        binding: &RouteBinding,
        auth_headers: &HeaderMap,
    ) -> Result<InternalRequest, DispatchError> {
        let split = split_arguments(arguments, binding);
        let mut uri = binding
            .pattern
            .substitute(&split.path, &binding.optional_params)
            .map_err(|e| DispatchError::Build(e.to_string()))?;

        let state_changing = is_state_changing(&binding.method);
        let (query, body) = if state_changing {
            let body = match split.raw_body {
                Some(raw) => raw,
                None => Value::Object(split.body),
            };
            (split.query, Some(body))
        } else {
            if split.raw_body.is_some() {
                return Err(DispatchError::Build(format!(
                    "{} route '{}' takes no body; 'body' must be an object of query parameters",
                    binding.method, binding.route_name
                )));
            }
            let mut query = split.query;
            query.extend(split.body);
            (query, None)
        };

        let query_string = encode_query(&query);
        if !query_string.is_empty() {
            uri.push('?');
            uri.push_str(&query_string);
        }

        let mut headers = HeaderMap::new();
        for name in [header::USER_AGENT, header::ACCEPT, header::AUTHORIZATION] {
            if let Some(value) = ctx.headers.get(&name) {
                headers.insert(name, value.clone());
            }
        }
        for (name, value) in auth_headers {
            headers.insert(name.clone(), value.clone());
        }
        if body.is_some() {
            headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }

        Ok(InternalRequest {
            method: binding.method.clone(),
            uri,
            headers,
            body,
            environ: forwarded_environ(&ctx.environ),
            extensions: ctx.extensions.clone(),
        })
    }

    /// Execute a route-derived tool call.
    pub async fn dispatch(
        &self,
        ctx: &RequestContext,
        arguments: &Map<String, Value>,
        binding: &RouteBinding,
        auth_headers: &HeaderMap,
    ) -> Result<Vec<ToolContent>, DispatchFailure> {
        let request = Self::build_request(ctx, arguments, binding, auth_headers)
            .map_err(|e| DispatchFailure::new(binding, arguments, FailureKind::Error, e.to_string()))?;

        tracing::debug!(
            route = %binding.route_name,
            method = %request.method,
            uri = %request.uri,
            "Dispatching sub-request"
        );

        let response = self
            .executor
            .execute(request)
            .await
            .map_err(|e| DispatchFailure::new(binding, arguments, FailureKind::Error, e.to_string()))?;

        let status = response.status;
        if status == StatusCode::UNAUTHORIZED {
            return Err(DispatchFailure::new(
                binding,
                arguments,
                FailureKind::Authentication,
                format!("Authentication required for route '{}'", binding.route_name),
            ));
        }
        if status == StatusCode::FORBIDDEN {
            return Err(DispatchFailure::new(
                binding,
                arguments,
                FailureKind::Permission,
                format!("Permission denied for route '{}'", binding.route_name),
            ));
        }
        if !status.is_success() {
            return Err(DispatchFailure::new(
                binding,
                arguments,
                FailureKind::Status(status.as_u16()),
                format!(
                    "Route '{}' returned HTTP {}: {}",
                    binding.route_name,
                    status.as_u16(),
                    String::from_utf8_lossy(&response.body).trim()
                ),
            ));
        }

        Ok(normalize_response(&response, binding.renderer.as_deref()))
    }
}

fn split_arguments(arguments: &Map<String, Value>, binding: &RouteBinding) -> SplitArguments {
    let placeholders = binding.pattern.param_names();
    let located = binding.layout != SchemaLayout::Flat;
    let mut split = SplitArguments::default();
    let mut rest = Map::new();

    for (key, value) in arguments {
        match (key.as_str(), value) {
            ("path", Value::Object(values)) if located => {
                split.path.extend(values.clone());
            }
            ("querystring", Value::Object(values)) if located => {
                split.query.extend(values.clone());
            }
            ("body", Value::Object(values)) if located => {
                split.body.extend(values.clone());
            }
            ("body", other) if located => split.raw_body = Some(other.clone()),
            (FREE_FORM_FIELD, Value::Object(values)) if binding.layout == SchemaLayout::FreeForm => {
                split.body.extend(values.clone());
            }
            _ if placeholders.contains(&key.as_str()) => {
                split.path.entry(key.clone()).or_insert_with(|| value.clone());
            }
            _ => {
                rest.insert(key.clone(), value.clone());
            }
        }
    }

    if is_state_changing(&binding.method) {
        split.body.extend(rest);
    } else {
        split.query.extend(rest);
    }
    split
}

fn encode_query(query: &Map<String, Value>) -> String {
    let mut keys: Vec<&String> = query.keys().collect();
    keys.sort();

    let mut pairs = Vec::new();
    for key in keys {
        let value = &query[key.as_str()];
        let values = match value {
            Value::Null => continue,
            Value::Array(items) => items.iter().filter(|v| !v.is_null()).collect(),
            other => vec![other],
        };
        for v in values {
            pairs.push(format!(
                "{}={}",
                urlencoding::encode(key),
                urlencoding::encode(&scalar_to_string(v))
            ));
        }
    }
    pairs.join("&")
}

fn forwarded_environ(environ: &BTreeMap<String, Value>) -> BTreeMap<String, Value> {
    environ
        .iter()
        .filter(|(key, _)| {
            !EXCLUDED_ENVIRON_KEYS.contains(&key.as_str())
                && !EXCLUDED_ENVIRON_PREFIXES.iter().any(|p| key.starts_with(p))
        })
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Convert a response into MCP content.
pub fn normalize_response(response: &InternalResponse, renderer: Option<&str>) -> Vec<ToolContent> {
    let json_content_type = response
        .content_type
        .as_deref()
        .is_some_and(|ct| ct.to_ascii_lowercase().contains("json"));
    let json_renderer = renderer.is_some_and(|r| r.eq_ignore_ascii_case("json"));

    let content = match serde_json::from_slice::<Value>(&response.body) {
        Ok(value) if value.is_object() || json_content_type || json_renderer => ToolContent::Json { data: value },
        Ok(value) => ToolContent::text(serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string())),
        Err(_) => ToolContent::text(String::from_utf8_lossy(&response.body)),
    };
    vec![content]
}

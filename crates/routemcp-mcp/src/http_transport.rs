//! HTTP transport for the MCP server.
//!
//! Routes, relative to the configured mount path:
//!
//! - `POST {mount}`: one JSON-RPC message per request, answered in the body.
//! - `GET {mount}/sse`: opens an SSE stream; the first `endpoint` event names
//!   the URL to post messages to.
//! - `POST {mount}/messages?session_id=..`: messages for an SSE session,
//!   answered on the stream.
//! - `GET {mount}/health`

use crate::error::McpError;
use crate::protocol::{INVALID_REQUEST, JsonRpcResponse, RequestContext};
use crate::server::McpServer;
use axum::{
    Json, Router,
    body::to_bytes,
    extract::{Query, Request, State},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response, Sse},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::{RwLock, mpsc};
use tower_http::trace::TraceLayer;

/// Largest request body accepted by the transport.
const MAX_BODY_BYTES: usize = 4 * 1024 * 1024;

/// HTTP transport handler state.
pub struct HttpTransportState {
    server: Arc<McpServer>,
    mount_path: String,
    /// Active SSE sessions.
    sessions: RwLock<HashMap<String, mpsc::Sender<SseEvent>>>,
}

impl HttpTransportState {
    pub fn new(server: Arc<McpServer>) -> Self {
        let mount_path = server.config().mcp.normalized_mount_path();
        Self {
            server,
            mount_path,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

/// Removes its session from the state when the SSE stream is dropped.
struct SessionGuard {
    state: Arc<HttpTransportState>,
    session_id: String,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let state = self.state.clone();
        let session_id = std::mem::take(&mut self.session_id);
        if let Ok(mut sessions) = state.sessions.try_write() {
            sessions.remove(&session_id);
            tracing::debug!(session_id = %session_id, "SSE session closed");
            return;
        }
        // The map is busy, finish the removal on the runtime.
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                state.sessions.write().await.remove(&session_id);
                tracing::debug!(session_id = %session_id, "SSE session closed");
            });
        }
    }
}

/// SSE event for streaming.
#[derive(Debug, Clone)]
pub struct SseEvent {
    pub event: &'static str,
    pub data: String,
}

/// Query parameters for the session message endpoint.
#[derive(Debug, Deserialize)]
pub struct SessionQuery {
    session_id: Option<String>,
}

/// Create the MCP router, mounted under the configured mount path.
pub fn create_router(state: Arc<HttpTransportState>) -> Router {
    let mount = state.mount_path.clone();
    Router::new()
        .route(&mount, post(handle_post))
        .route(&format!("{}/sse", mount), get(handle_sse))
        .route(&format!("{}/messages", mount), post(handle_session_message))
        .route(&format!("{}/health", mount), get(handle_health))
        .with_state(state)
}

/// Build the request context forwarded to tool calls.
///
/// The environment is CGI-style: request line entries plus one `HTTP_*`
/// entry per header.
pub fn request_context(parts: &Parts) -> RequestContext {
    let mut ctx = RequestContext::new().with_headers(parts.headers.clone());
    ctx.extensions = parts.extensions.clone();

    ctx.environ.insert("REQUEST_METHOD".into(), json!(parts.method.as_str()));
    ctx.environ.insert("PATH_INFO".into(), json!(parts.uri.path()));
    ctx.environ
        .insert("QUERY_STRING".into(), json!(parts.uri.query().unwrap_or_default()));
    ctx.environ
        .insert("SERVER_PROTOCOL".into(), json!(format!("{:?}", parts.version)));

    for (name, value) in &parts.headers {
        let Ok(value) = value.to_str() else {
            continue;
        };
        let key = name.as_str().to_ascii_uppercase().replace('-', "_");
        let key = match key.as_str() {
            "CONTENT_TYPE" | "CONTENT_LENGTH" => key,
            _ => format!("HTTP_{}", key),
        };
        ctx.environ.insert(key, json!(value));
    }
    ctx
}

async fn read_request(request: Request) -> Result<(RequestContext, String), Response> {
    let (parts, body) = request.into_parts();
    let ctx = request_context(&parts);
    match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => Ok((ctx, String::from_utf8_lossy(&bytes).into_owned())),
        Err(e) => Err((
            StatusCode::PAYLOAD_TOO_LARGE,
            Json(JsonRpcResponse::error(None, INVALID_REQUEST, format!("Unreadable body: {}", e))),
        )
            .into_response()),
    }
}

/// Handle POST requests to the mount path (JSON-RPC over HTTP).
async fn handle_post(State(state): State<Arc<HttpTransportState>>, request: Request) -> Response {
    let (ctx, body) = match read_request(request).await {
        Ok(read) => read,
        Err(response) => return response,
    };

    match state.server.handle_message(&body, &ctx).await {
        Some(response) => Json(response).into_response(),
        // HTTP needs a body even for notifications.
        None => Json(json!({"jsonrpc": "2.0", "result": "ok"})).into_response(),
    }
}

/// Handle GET requests to `{mount}/sse`.
async fn handle_sse(State(state): State<Arc<HttpTransportState>>) -> impl IntoResponse {
    let session_id = uuid::Uuid::new_v4().to_string();
    let (event_tx, mut event_rx) = mpsc::channel(100);

    let endpoint = SseEvent {
        event: "endpoint",
        data: format!("{}/messages?session_id={}", state.mount_path, session_id),
    };
    // The channel is fresh, the first send cannot fail for lack of capacity.
    let _ = event_tx.try_send(endpoint);

    state
        .sessions
        .write()
        .await
        .insert(session_id.clone(), event_tx);
    tracing::debug!(session_id = %session_id, "SSE session opened");

    let guard = SessionGuard {
        state: state.clone(),
        session_id,
    };
    let stream = async_stream::stream! {
        let _guard = guard;
        while let Some(event) = event_rx.recv().await {
            yield Ok::<_, Infallible>(axum::response::sse::Event::default()
                .event(event.event)
                .data(event.data));
        }
    };

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(std::time::Duration::from_secs(30))
            .text("ping"),
    )
}

/// Handle POST requests to `{mount}/messages`.
///
/// Responses go out on the session's stream; notifications emit nothing.
async fn handle_session_message(
    State(state): State<Arc<HttpTransportState>>,
    Query(query): Query<SessionQuery>,
    request: Request,
) -> Response {
    let Some(session_id) = query.session_id else {
        return (StatusCode::BAD_REQUEST, "missing session_id").into_response();
    };
    let Some(sender) = state.sessions.read().await.get(&session_id).cloned() else {
        return (StatusCode::NOT_FOUND, "unknown session").into_response();
    };

    let (ctx, body) = match read_request(request).await {
        Ok(read) => read,
        Err(response) => return response,
    };

    if let Some(response) = state.server.handle_message(&body, &ctx).await {
        let data = match serde_json::to_string(&response) {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!(session_id = %session_id, error = %e, "Failed to serialize response");
                return (StatusCode::INTERNAL_SERVER_ERROR, "serialization failed").into_response();
            }
        };
        let event = SseEvent {
            event: "message",
            data,
        };
        if sender.send(event).await.is_err() {
            state.sessions.write().await.remove(&session_id);
            tracing::debug!(session_id = %session_id, "SSE session closed");
            return (StatusCode::GONE, "session closed").into_response();
        }
    }

    StatusCode::ACCEPTED.into_response()
}

/// Handle health check requests.
async fn handle_health(State(state): State<Arc<HttpTransportState>>) -> Json<Value> {
    let config = &state.server.config().mcp;
    Json(json!({
        "status": "ok",
        "service": config.server_name,
        "version": config.server_version,
        "tools": state.server.tools().len(),
    }))
}

/// HTTP server for MCP transport.
pub struct HttpServer {
    state: Arc<HttpTransportState>,
}

impl HttpServer {
    pub fn new(server: Arc<McpServer>) -> Self {
        Self {
            state: Arc::new(HttpTransportState::new(server)),
        }
    }

    /// Run the HTTP server on the configured host and port.
    pub async fn run(self) -> Result<(), McpError> {
        let config = &self.state.server.config().mcp;
        let addr = format!("{}:{}", config.host, config.port);
        let mount = self.state.mount_path.clone();
        let app = create_router(self.state).layer(TraceLayer::new_for_http());

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| McpError::StartupFailed(format!("Failed to bind to {}: {}", addr, e)))?;

        tracing::info!(addr = %addr, mount = %mount, "MCP HTTP server listening");

        axum::serve(listener, app)
            .await
            .map_err(|e| McpError::TransportError(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{ToolDefinition, ToolOutput};
    use axum::body::Body;
    use axum::http::{Request, header};
    use futures::StreamExt;
    use routemcp_core::BridgeConfig;
    use tower::ServiceExt;

    fn state() -> Arc<HttpTransportState> {
        let mut server = McpServer::new(BridgeConfig::default());
        server
            .register_tool(ToolDefinition::manual("hello", "Say hello", |_args, ctx| async move {
                let agent = ctx
                    .environ
                    .get("HTTP_USER_AGENT")
                    .cloned()
                    .unwrap_or(Value::Null);
                Ok(ToolOutput::Value(json!({"agent": agent})))
            }))
            .unwrap();
        Arc::new(HttpTransportState::new(Arc::new(server)))
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::USER_AGENT, "test-agent")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = create_router(state());
        let response = app
            .oneshot(Request::builder().uri("/mcp/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["tools"], json!(1));
    }

    #[tokio::test]
    async fn test_post_call_sees_outer_environ() {
        let app = create_router(state());
        let response = app
            .oneshot(post_json(
                "/mcp",
                r#"{"jsonrpc":"2.0","id":1,"method":"tools/call","params":{"name":"hello"}}"#,
            ))
            .await
            .unwrap();

        let body = body_json(response).await;
        assert_eq!(body["id"], json!(1));
        assert_eq!(body["result"]["content"][0]["text"], json!("{\"agent\":\"test-agent\"}"));
    }

    #[tokio::test]
    async fn test_post_notification_placeholder() {
        let app = create_router(state());
        let response = app
            .oneshot(post_json("/mcp", r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body, json!({"jsonrpc": "2.0", "result": "ok"}));
        assert!(body.get("error").is_none());
    }

    #[tokio::test]
    async fn test_post_parse_error() {
        let app = create_router(state());
        let response = app.oneshot(post_json("/mcp", "{oops")).await.unwrap();
        assert_eq!(body_json(response).await["error"]["code"], json!(-32700));
    }

    #[tokio::test]
    async fn test_session_message_requires_known_session() {
        let app = create_router(state());
        let response = app
            .clone()
            .oneshot(post_json("/mcp/messages?session_id=nope", r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .oneshot(post_json("/mcp/messages", r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_sse_session_registered() {
        let state = state();
        let app = create_router(state.clone());
        let response = app
            .oneshot(Request::builder().uri("/mcp/sse").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/event-stream"
        );
        assert_eq!(state.session_count().await, 1);
    }

    async fn open_session(app: &Router) -> (String, axum::body::BodyDataStream) {
        let response = app
            .clone()
            .oneshot(Request::builder().uri("/mcp/sse").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let mut frames = response.into_body().into_data_stream();
        let first = frames.next().await.unwrap().unwrap();
        let first = String::from_utf8(first.to_vec()).unwrap();
        assert!(first.contains("event: endpoint"));
        let session_id = first
            .split("session_id=")
            .nth(1)
            .and_then(|rest| rest.lines().next())
            .unwrap()
            .to_string();
        (session_id, frames)
    }

    #[tokio::test]
    async fn test_sse_notification_emits_nothing() {
        let app = create_router(state());
        let (session_id, mut frames) = open_session(&app).await;
        let uri = format!("/mcp/messages?session_id={}", session_id);

        let response = app
            .clone()
            .oneshot(post_json(&uri, r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let response = app
            .oneshot(post_json(&uri, r#"{"jsonrpc":"2.0","id":7,"method":"ping"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        // Events are queued in order, so the ping answer must be the next one.
        let next = frames.next().await.unwrap().unwrap();
        let next = String::from_utf8(next.to_vec()).unwrap();
        assert!(next.starts_with("event: message"));
        let data: Value = serde_json::from_str(next.split("data: ").nth(1).unwrap().trim()).unwrap();
        assert_eq!(data["id"], json!(7));
        assert_eq!(data["result"], json!({}));
    }

    #[tokio::test]
    async fn test_dropped_sse_clients_release_sessions() {
        let state = state();
        let app = create_router(state.clone());
        for _ in 0..5 {
            let (_session_id, frames) = open_session(&app).await;
            drop(frames);
        }

        for _ in 0..50 {
            if state.session_count().await == 0 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(state.session_count().await, 0);
    }

    #[test]
    fn test_request_context_environ() {
        let request = Request::builder()
            .method("POST")
            .uri("/mcp?x=1")
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-request-id", "abc")
            .body(())
            .unwrap();
        let (parts, _) = request.into_parts();
        let ctx = request_context(&parts);

        assert_eq!(ctx.environ["REQUEST_METHOD"], json!("POST"));
        assert_eq!(ctx.environ["PATH_INFO"], json!("/mcp"));
        assert_eq!(ctx.environ["QUERY_STRING"], json!("x=1"));
        assert_eq!(ctx.environ["CONTENT_TYPE"], json!("application/json"));
        assert_eq!(ctx.environ["HTTP_X_REQUEST_ID"], json!("abc"));
        assert!(ctx.headers.contains_key("x-request-id"));
    }
}

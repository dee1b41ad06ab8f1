//! End-to-end tests: an axum application exposed through the MCP HTTP transport.

use axum::{
    Extension, Json, Router,
    body::{Body, to_bytes},
    extract::{Path, Query, RawQuery},
    http::{HeaderMap, Request, StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
};
use routemcp_core::{
    BridgeConfig, DiscoveryConfig, FieldDecl, FieldKind, RegisteredRoute, RegisteredView, SchemaDecl,
    SchemaSource, StaticRouteRegistry,
};
use routemcp_mcp::dispatch::Environ;
use routemcp_mcp::{McpBridge, McpServer, ToolDefinition, ToolOutput, discover_routes};
use serde_json::{Value, json};
use std::collections::HashMap;
use tower::ServiceExt;

async fn list_users() -> Json<Value> {
    Json(json!([{"id": 1, "name": "ada"}]))
}

async fn create_user(Json(body): Json<Value>) -> impl IntoResponse {
    (StatusCode::CREATED, Json(body))
}

async fn get_item(Path(id): Path<String>, Query(query): Query<HashMap<String, String>>) -> Json<Value> {
    Json(json!({"id": id, "query": query}))
}

async fn secure(headers: HeaderMap, RawQuery(query): RawQuery) -> impl IntoResponse {
    match headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        Some(auth) => Json(json!({"authorization": auth, "query": query})).into_response(),
        None => StatusCode::UNAUTHORIZED.into_response(),
    }
}

async fn forbidden() -> StatusCode {
    StatusCode::FORBIDDEN
}

async fn trace(Extension(environ): Extension<Environ>) -> Json<Value> {
    Json(json!(environ.0))
}

fn app() -> Router {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/items/{id}", get(get_item))
        .route("/secure", get(secure))
        .route("/forbidden", get(forbidden))
        .route("/profile", post(create_user))
        .route("/trace", get(trace))
}

fn registry() -> StaticRouteRegistry {
    let user_fields = SchemaDecl::new()
        .field(FieldDecl::new("name", FieldKind::String).required())
        .field(FieldDecl::new("email", FieldKind::Email).required());
    let item_query = SchemaDecl::new().field(FieldDecl::new("verbose", FieldKind::Boolean));
    let profile_fields =
        SchemaDecl::new().field(FieldDecl::new("full_name", FieldKind::String).data_key("fullName").required());

    StaticRouteRegistry::new()
        .with_route(
            RegisteredRoute::new("users", "/users")
                .view(RegisteredView::new("users::list").methods(["GET"]))
                .view(
                    RegisteredView::new("users::create")
                        .methods(["POST"])
                        .schema(SchemaSource::Fields(user_fields)),
                ),
        )
        .with_route(
            RegisteredRoute::new("item", "/items/{id}").view(RegisteredView::new("items::get").schema(
                SchemaSource::Located {
                    path: None,
                    querystring: Some(item_query),
                    body: None,
                },
            )),
        )
        .with_route(
            RegisteredRoute::new("secure", "/secure")
                .view(RegisteredView::new("secure::get").annotate("security", "Bearer")),
        )
        .with_route(RegisteredRoute::new("forbidden", "/forbidden").view(RegisteredView::new("forbidden::get")))
        .with_route(
            RegisteredRoute::new("profile", "/profile").view(
                RegisteredView::new("profile::update")
                    .methods(["POST"])
                    .schema(SchemaSource::Fields(profile_fields)),
            ),
        )
        .with_route(RegisteredRoute::new("trace", "/trace").view(RegisteredView::new("trace::get")))
        .with_route(RegisteredRoute::new("mcp_internal", "/mcp_internal"))
        .with_route(RegisteredRoute::new("assets", "/static/{path}").static_assets())
}

fn bridge(config: BridgeConfig) -> McpBridge {
    McpBridge::from_router(app(), &registry(), config).unwrap()
}

async fn post_mcp(router: Router, body: Value, headers: &[(&str, &str)]) -> (StatusCode, Value) {
    let mut request = Request::builder()
        .method("POST")
        .uri("/mcp")
        .header(header::CONTENT_TYPE, "application/json");
    for (name, value) in headers {
        request = request.header(*name, *value);
    }
    let response = router
        .oneshot(request.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn call(router: Router, name: &str, arguments: Value) -> Value {
    let body = json!({
        "jsonrpc": "2.0",
        "id": 7,
        "method": "tools/call",
        "params": {"name": name, "arguments": arguments}
    });
    post_mcp(router, body, &[]).await.1
}

async fn list_tools(router: Router) -> Vec<Value> {
    let body = json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"});
    let (_, response) = post_mcp(router, body, &[]).await;
    response["result"]["tools"].as_array().cloned().unwrap()
}

fn find<'a>(tools: &'a [Value], name: &str) -> &'a Value {
    tools
        .iter()
        .find(|t| t["name"] == json!(name))
        .unwrap_or_else(|| panic!("tool {} not listed", name))
}

#[tokio::test]
async fn test_tools_list_names_and_exclusions() {
    let tools = list_tools(bridge(BridgeConfig::default()).into_router()).await;
    let names: Vec<&str> = tools.iter().map(|t| t["name"].as_str().unwrap()).collect();

    assert_eq!(
        names,
        vec!["list_users", "create_users", "item", "secure", "forbidden", "profile", "trace"]
    );
}

#[tokio::test]
async fn test_multi_method_schemas() {
    let tools = list_tools(bridge(BridgeConfig::default()).into_router()).await;

    let list = find(&tools, "list_users");
    assert_eq!(list["inputSchema"]["properties"], json!({}));
    assert_eq!(list["inputSchema"]["required"], json!([]));

    let create = find(&tools, "create_users");
    assert_eq!(create["inputSchema"]["required"], json!(["name", "email"]));
    assert_eq!(create["inputSchema"]["properties"]["email"]["format"], json!("email"));
    assert_eq!(create["description"], json!("Create users via POST /users"));
}

#[tokio::test]
async fn test_list_and_create_round_trip() {
    let router = bridge(BridgeConfig::default()).into_router();

    let listed = call(router.clone(), "list_users", json!({})).await;
    assert_eq!(
        listed["result"]["content"],
        json!([{"type": "application/json", "data": [{"id": 1, "name": "ada"}]}])
    );

    let created = call(router, "create_users", json!({"name": "Grace", "email": "grace@example.com"})).await;
    assert_eq!(
        created["result"]["content"][0]["data"],
        json!({"name": "Grace", "email": "grace@example.com"})
    );
}

#[tokio::test]
async fn test_located_path_parameter() {
    let router = bridge(BridgeConfig::default()).into_router();
    let tools = list_tools(router.clone()).await;

    let schema = &find(&tools, "item")["inputSchema"];
    assert_eq!(
        schema["properties"]["path"]["properties"]["id"],
        json!({"type": "string", "description": "Path parameter: id"})
    );
    assert_eq!(schema["properties"]["path"]["required"], json!(["id"]));
    assert_eq!(schema["required"], json!(["path"]));

    let response = call(router, "item", json!({"path": {"id": "42"}, "querystring": {"verbose": true}})).await;
    assert_eq!(
        response["result"]["content"][0]["data"],
        json!({"id": "42", "query": {"verbose": "true"}})
    );
}

#[tokio::test]
async fn test_unknown_tool() {
    let response = call(bridge(BridgeConfig::default()).into_router(), "nope_tool", json!({})).await;
    assert_eq!(response["error"]["code"], json!(-32601));
    assert!(response["error"]["message"].as_str().unwrap().contains("nope_tool"));
    assert_eq!(response["id"], json!(7));
}

#[tokio::test]
async fn test_data_key_alias_exposed() {
    let router = bridge(BridgeConfig::default()).into_router();
    let tools = list_tools(router.clone()).await;

    let schema = &find(&tools, "profile")["inputSchema"];
    assert!(schema["properties"].get("fullName").is_some());
    assert!(schema["properties"].get("full_name").is_none());
    assert_eq!(schema["required"], json!(["fullName"]));

    let response = call(router, "profile", json!({"fullName": "Ada Lovelace"})).await;
    assert_eq!(response["result"]["content"][0]["data"], json!({"fullName": "Ada Lovelace"}));
}

#[tokio::test]
async fn test_bearer_credentials_become_header() {
    let router = bridge(BridgeConfig::default()).into_router();
    let tools = list_tools(router.clone()).await;
    assert_eq!(find(&tools, "secure")["inputSchema"]["required"], json!(["auth"]));

    let response = call(router, "secure", json!({"auth": {"auth_token": "t0k"}})).await;
    assert_eq!(
        response["result"]["content"][0]["data"],
        json!({"authorization": "Bearer t0k", "query": null})
    );
}

#[tokio::test]
async fn test_flat_token_never_reaches_query_string() {
    let mut config = BridgeConfig::default();
    config.mcp.validate_arguments = false;
    let router = bridge(config).into_router();

    let response = call(router, "secure", json!({"auth": {}, "auth_token": "SECRET"})).await;
    assert_eq!(
        response["result"]["content"][0]["data"],
        json!({"authorization": "Bearer SECRET", "query": null})
    );
}

#[tokio::test]
async fn test_missing_credentials_rejected() {
    let response = call(bridge(BridgeConfig::default()).into_router(), "secure", json!({})).await;
    assert_eq!(response["error"]["code"], json!(-32602));
    assert_eq!(response["error"]["data"]["missing"], json!("auth_token"));
}

#[tokio::test]
async fn test_hidden_auth_uses_outer_header() {
    let mut config = BridgeConfig::default();
    config.auth.expose_auth_params = false;
    let router = bridge(config).into_router();

    let tools = list_tools(router.clone()).await;
    assert!(find(&tools, "secure")["inputSchema"]["properties"].get("auth").is_none());

    let body = json!({
        "jsonrpc": "2.0",
        "id": 2,
        "method": "tools/call",
        "params": {"name": "secure", "arguments": {}}
    });
    let (_, response) = post_mcp(router, body, &[("authorization", "Bearer outer")]).await;
    assert_eq!(response["result"]["content"][0]["data"]["authorization"], json!("Bearer outer"));
}

#[tokio::test]
async fn test_forbidden_route_reports_permission_failure() {
    let response = call(bridge(BridgeConfig::default()).into_router(), "forbidden", json!({})).await;
    assert_eq!(response["error"]["code"], json!(-32603));
    assert_eq!(response["error"]["data"]["type"], json!("permission"));
    assert_eq!(response["error"]["data"]["route"], json!("forbidden"));
    assert!(response["error"]["message"].as_str().unwrap().contains("Permission denied"));
}

#[tokio::test]
async fn test_validation_rejects_before_dispatch() {
    let response = call(
        bridge(BridgeConfig::default()).into_router(),
        "create_users",
        json!({"name": "Grace"}),
    )
    .await;
    assert_eq!(response["error"]["code"], json!(-32602));
    assert_eq!(response["error"]["data"]["type"], json!("validation"));
}

#[tokio::test]
async fn test_environ_forwarded_without_outer_request_line() {
    let body = json!({
        "jsonrpc": "2.0",
        "id": 3,
        "method": "tools/call",
        "params": {"name": "trace", "arguments": {}}
    });
    let (_, response) = post_mcp(
        bridge(BridgeConfig::default()).into_router(),
        body,
        &[("x-trace-id", "trace-1")],
    )
    .await;

    let environ = &response["result"]["content"][0]["data"];
    assert_eq!(environ["HTTP_X_TRACE_ID"], json!("trace-1"));
    assert!(environ.get("REQUEST_METHOD").is_none());
    assert!(environ.get("PATH_INFO").is_none());
    assert!(environ.get("CONTENT_TYPE").is_none());
}

#[tokio::test]
async fn test_notification_placeholder_over_http() {
    let (status, body) = post_mcp(
        bridge(BridgeConfig::default()).into_router(),
        json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"jsonrpc": "2.0", "result": "ok"}));
}

#[tokio::test]
async fn test_manual_tool_next_to_routes() {
    let mut bridge = bridge(BridgeConfig::default());
    let name = bridge
        .register_tool(ToolDefinition::manual("server time", "Fixed clock", |_args, _ctx| async {
            Ok(ToolOutput::Value(json!("12:00")))
        }))
        .unwrap();
    assert_eq!(name, "server_time");

    let response = call(bridge.into_router(), "server_time", json!({})).await;
    assert_eq!(response["result"]["content"], json!([{"type": "text", "text": "12:00"}]));
}

#[tokio::test]
async fn test_disabled_bridge_leaves_app_unchanged() {
    let mut config = BridgeConfig::default();
    config.mcp.enabled = false;
    let bridge = bridge(config);
    assert!(bridge.server().tools().is_empty());

    let (status, _) = post_mcp(
        bridge.into_router(),
        json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}),
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[test]
fn test_discovery_is_idempotent() {
    let registry = registry();
    let config = DiscoveryConfig::default();
    assert_eq!(discover_routes(&registry, &config), discover_routes(&registry, &config));

    let names = |server: &McpServer| -> Vec<String> {
        server.tools().list().iter().map(|t| t.name.clone()).collect()
    };
    let mut first = McpServer::new(BridgeConfig::default());
    first.register_routes(&registry).unwrap();
    let mut second = McpServer::new(BridgeConfig::default());
    second.register_routes(&registry).unwrap();
    assert_eq!(names(&first), names(&second));
}

#[test]
fn test_include_exclude_filters() {
    let mut config = BridgeConfig::default();
    config.discovery.include = vec!["/users*".to_string(), "/items/*".to_string()];
    config.discovery.exclude = vec!["/users".to_string()];

    let mut server = McpServer::new(config);
    server.register_routes(&registry()).unwrap();
    let names: Vec<&str> = server.tools().list().iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["item"]);
}

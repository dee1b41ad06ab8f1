//! `routemcp plan` - show the sub-request a tool call would produce.
//!
//! Runs the same credential handling, validation and request building as a
//! live call, then prints the request instead of executing it.

use super::SourceArgs;
use anyhow::{Context, Result, bail};
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use routemcp_mcp::{McpServer, PreparedCall, RequestContext, SubrequestDispatcher, ToolHandler};
use serde_json::{Map, Value, json};

/// Parse `Name: value` header arguments.
pub fn parse_headers(raw: &[String]) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    for entry in raw {
        let (name, value) = entry
            .split_once(':')
            .with_context(|| format!("Invalid header '{}', expected 'Name: value'", entry))?;
        let name = HeaderName::from_bytes(name.trim().as_bytes())
            .with_context(|| format!("Invalid header name in '{}'", entry))?;
        let value =
            HeaderValue::from_str(value.trim()).with_context(|| format!("Invalid header value in '{}'", entry))?;
        headers.append(name, value);
    }
    Ok(headers)
}

/// Build the planned request for `tool` as JSON.
pub fn build_plan(server: &McpServer, tool: &str, arguments: Value, ctx: &RequestContext) -> Result<Value> {
    if server
        .tools()
        .get(tool)
        .is_some_and(|definition| !definition.is_route())
    {
        bail!("Tool '{}' is a manual tool and has no route to plan", tool);
    }

    let PreparedCall {
        tool: definition,
        arguments,
        auth_headers,
    } = server.prepare_call(tool, arguments, ctx)?;
    let ToolHandler::Route(binding) = &definition.handler else {
        bail!("Tool '{}' is a manual tool and has no route to plan", tool);
    };

    let request = SubrequestDispatcher::build_request(ctx, &arguments, binding, &auth_headers)?;

    let headers: Map<String, Value> = request
        .headers
        .iter()
        .map(|(name, value)| {
            let shown = if value.is_sensitive() {
                "<redacted>".to_string()
            } else {
                value.to_str().unwrap_or("<binary>").to_string()
            };
            (name.to_string(), json!(shown))
        })
        .collect();

    Ok(json!({
        "tool": definition.name,
        "route": binding.route_name,
        "method": request.method.as_str(),
        "uri": request.uri,
        "headers": headers,
        "body": request.body,
        "environ": request.environ,
    }))
}

/// Print the planned request.
pub fn execute(source: &SourceArgs, tool: &str, arguments: &str, headers: &[String]) -> Result<()> {
    let server = source.offline_server()?;
    let arguments: Value = serde_json::from_str(arguments).context("Failed to parse --args as JSON")?;
    let ctx = RequestContext::new().with_headers(parse_headers(headers)?);

    let plan = build_plan(&server, tool, arguments, &ctx)?;
    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(())
}

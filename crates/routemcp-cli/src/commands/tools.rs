//! Tools introspection commands.
//!
//! `routemcp tools list` - List the tools generated from the route manifest.
//! `routemcp tools describe` - Show the full definition of one tool.

use super::SourceArgs;
use anyhow::{Context, Result};
use routemcp_mcp::{ToolDefinition, ToolHandler};

fn badges(tool: &ToolDefinition) -> Vec<String> {
    let mut badges = Vec::new();
    match &tool.handler {
        ToolHandler::Route(binding) => badges.push(binding.method.to_string()),
        ToolHandler::Manual(_) => badges.push("manual".to_string()),
    }
    if let Some(scheme) = tool.security {
        badges.push(format!("auth:{}", scheme));
    }
    if let Some(permission) = &tool.permission {
        badges.push(format!("permission:{}", permission));
    }
    badges
}

/// List the generated tools.
pub fn list(source: &SourceArgs, verbose: bool) -> Result<()> {
    let server = source.offline_server()?;
    let tools = server.tools().list();

    println!("\nAvailable Tools ({}):", tools.len());
    for tool in tools {
        println!("  - {} ({})", tool.name, badges(tool).join(", "));
        println!("    {}", tool.description);
        if verbose {
            println!("    Schema: {}", serde_json::to_string_pretty(&tool.input_schema)?);
        }
    }
    Ok(())
}

/// Describe one tool as JSON.
pub fn describe(source: &SourceArgs, name: &str) -> Result<()> {
    let server = source.offline_server()?;
    let tool = server
        .tools()
        .get(name)
        .with_context(|| format!("Tool '{}' not found. Use `routemcp tools list` to see available tools", name))?;

    let mut info = serde_json::to_value(tool.info())?;
    if let ToolHandler::Route(binding) = &tool.handler {
        info["route"] = serde_json::json!({
            "name": binding.route_name,
            "pattern": binding.pattern.as_str(),
            "method": binding.method.as_str(),
        });
    }
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}

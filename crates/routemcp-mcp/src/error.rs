//! Error types for the MCP crate.

use crate::auth::{InvalidCredential, MissingCredential};
use crate::dispatch::{DispatchFailure, FailureKind};
use crate::protocol::{INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND};
use crate::sanitize::NamingError;
use crate::validator::ValidationError;
use serde_json::{Value, json};
use thiserror::Error;

/// Errors that can occur in the MCP server.
#[derive(Debug, Error)]
pub enum McpError {
    /// Failed to start the server.
    #[error("failed to start MCP server: {0}")]
    StartupFailed(String),

    /// Invalid request format.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Missing or malformed call parameters.
    #[error("invalid params: {0}")]
    InvalidParams(String),

    /// Tool not found.
    #[error("Tool not found: {name}")]
    ToolNotFound { name: String },

    /// Arguments failed schema validation.
    #[error(transparent)]
    InvalidArguments(#[from] ValidationError),

    /// Required credentials were not supplied.
    #[error("Authentication parameters invalid: {0}")]
    AuthValidation(#[from] MissingCredential),

    /// Credentials cannot be sent as a header.
    #[error("Authentication parameters invalid: {0}")]
    AuthInvalid(#[from] InvalidCredential),

    /// The tool requires an outer `Authorization` header.
    #[error("tool {tool} requires an Authorization header")]
    AuthorizationHeaderMissing { tool: String },

    /// Not authorized to call the tool.
    #[error("Permission denied for tool {tool}")]
    PermissionDenied { tool: String, permission: String },

    /// A route-backed tool failed.
    #[error(transparent)]
    Dispatch(#[from] DispatchFailure),

    /// A manual tool failed.
    #[error("tool {tool} failed: {source}")]
    ToolFailed {
        tool: String,
        #[source]
        source: anyhow::Error,
    },

    /// Tool name could not be made unique.
    #[error(transparent)]
    Naming(#[from] NamingError),

    /// Transport error.
    #[error("transport error: {0}")]
    TransportError(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl McpError {
    /// JSON-RPC error code.
    pub fn code(&self) -> i32 {
        match self {
            McpError::InvalidRequest(_) => INVALID_REQUEST,
            McpError::ToolNotFound { .. } => METHOD_NOT_FOUND,
            McpError::InvalidParams(_)
            | McpError::InvalidArguments(_)
            | McpError::AuthValidation(_)
            | McpError::AuthInvalid(_)
            | McpError::AuthorizationHeaderMissing { .. } => INVALID_PARAMS,
            _ => INTERNAL_ERROR,
        }
    }

    /// Structured error data, when there is any.
    pub fn data(&self) -> Option<Value> {
        match self {
            McpError::ToolNotFound { name } => Some(json!({"tool": name})),
            McpError::InvalidArguments(e) => Some(e.data()),
            McpError::AuthValidation(e) => Some(e.data()),
            McpError::AuthInvalid(e) => Some(e.data()),
            McpError::AuthorizationHeaderMissing { tool } => {
                Some(json!({"type": "auth", "tool": tool, "missing": "Authorization"}))
            }
            McpError::PermissionDenied { tool, permission } => Some(json!({
                "type": "permission",
                "tool": tool,
                "permission": permission,
            })),
            McpError::Dispatch(failure) => {
                let mut data = failure.data();
                data["type"] = json!(match failure.kind {
                    FailureKind::Authentication => "authentication",
                    FailureKind::Permission => "permission",
                    FailureKind::Status(_) | FailureKind::Error => "dispatch",
                });
                Some(data)
            }
            McpError::ToolFailed { tool, .. } => Some(json!({"tool": tool})),
            _ => None,
        }
    }
}

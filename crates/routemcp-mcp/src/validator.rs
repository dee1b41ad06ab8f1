//! Tool argument validation.
//!
//! Arguments are checked against the tool's input schema after credentials
//! have been stripped, so the `auth` sub-object is removed from the schema
//! before validation. Validation happens before any handler or sub-request
//! runs.

use crate::auth::AUTH_FIELD;
use serde_json::{Value, json};
use std::fmt;

/// One failing location in the arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// JSON pointer into the arguments, `""` for the root.
    pub path: String,
    pub message: String,
}

/// Arguments did not match the tool's input schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub tool: String,
    pub errors: Vec<FieldError>,
}

impl ValidationError {
    /// Structured error data for the JSON-RPC envelope.
    pub fn data(&self) -> Value {
        json!({
            "type": "validation",
            "tool": self.tool,
            "errors": self
                .errors
                .iter()
                .map(|e| json!({"path": e.path, "message": e.message}))
                .collect::<Vec<_>>(),
        })
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid arguments for tool '{}'", self.tool)?;
        if let Some(first) = self.errors.first() {
            write!(f, ": {}", first.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// The input schema without the credential sub-object.
pub fn business_schema(input_schema: &Value) -> Value {
    let mut schema = input_schema.clone();
    if let Some(properties) = schema.get_mut("properties").and_then(Value::as_object_mut) {
        properties.remove(AUTH_FIELD);
    }
    if let Some(required) = schema.get_mut("required").and_then(Value::as_array_mut) {
        required.retain(|r| r.as_str() != Some(AUTH_FIELD));
    }
    schema
}

/// Validate `arguments` against the business part of `input_schema`.
///
/// A schema that fails to compile is logged and treated as permissive.
pub fn validate_arguments(tool: &str, input_schema: &Value, arguments: &Value) -> Result<(), ValidationError> {
    let schema = business_schema(input_schema);
    let validator = match jsonschema::draft202012::options().build(&schema) {
        Ok(validator) => validator,
        Err(e) => {
            tracing::warn!(tool = %tool, error = %e, "Input schema does not compile, skipping validation");
            return Ok(());
        }
    };

    let errors: Vec<FieldError> = validator
        .iter_errors(arguments)
        .take(20)
        .map(|e| FieldError {
            path: e.instance_path().to_string(),
            message: e.to_string(),
        })
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationError {
            tool: tool.to_string(),
            errors,
        })
    }
}

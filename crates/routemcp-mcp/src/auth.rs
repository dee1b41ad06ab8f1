//! Authentication parameter side-channel.
//!
//! Tools whose view declares a security scheme gain an `auth` sub-object in
//! their input schema. At call time the credentials are pulled out of the
//! arguments, removed before the handler sees them, and turned into an
//! `Authorization` header.

use crate::schema::{FieldSchema, JsonType};
use axum::http::{HeaderMap, HeaderValue, header};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::fmt;

/// Argument key holding the credential sub-object.
pub const AUTH_FIELD: &str = "auth";

/// Supported authentication schemes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityScheme {
    Bearer,
    Basic,
}

impl SecurityScheme {
    /// Resolve a scheme tag, case-insensitively.
    pub fn resolve(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "bearer" | "bearerauth" | "bearer_auth" | "jwt" | "token" => Some(SecurityScheme::Bearer),
            "basic" | "basicauth" | "basic_auth" => Some(SecurityScheme::Basic),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityScheme::Bearer => "bearer",
            SecurityScheme::Basic => "basic",
        }
    }

    /// Credential fields this scheme requires.
    pub fn required_fields(&self) -> &'static [&'static str] {
        match self {
            SecurityScheme::Bearer => &["auth_token"],
            SecurityScheme::Basic => &["username", "password"],
        }
    }
}

impl fmt::Display for SecurityScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A required credential field was not supplied.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[error("missing '{field}' for {scheme} authentication")]
pub struct MissingCredential {
    pub scheme: SecurityScheme,
    pub field: String,
}

impl MissingCredential {
    pub fn data(&self) -> Value {
        json!({
            "type": "auth",
            "scheme": self.scheme.as_str(),
            "missing": self.field,
        })
    }
}

/// A credential cannot be carried in an `Authorization` header.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[error("{scheme} credential is not a valid header value")]
pub struct InvalidCredential {
    pub scheme: SecurityScheme,
}

impl InvalidCredential {
    pub fn data(&self) -> Value {
        json!({
            "type": "auth",
            "scheme": self.scheme.as_str(),
            "invalid": "Authorization",
        })
    }
}

/// Credentials extracted from one tool call.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthCredential {
    pub scheme: SecurityScheme,
    parts: BTreeMap<String, String>,
    /// Top-level argument keys the parts were read from.
    flat_keys: Vec<String>,
}

impl AuthCredential {
    pub fn bearer(token: impl Into<String>) -> Self {
        let mut parts = BTreeMap::new();
        parts.insert("auth_token".to_string(), token.into());
        Self {
            scheme: SecurityScheme::Bearer,
            parts,
            flat_keys: Vec::new(),
        }
    }

    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        let mut parts = BTreeMap::new();
        parts.insert("username".to_string(), username.into());
        parts.insert("password".to_string(), password.into());
        Self {
            scheme: SecurityScheme::Basic,
            parts,
            flat_keys: Vec::new(),
        }
    }

    pub fn get(&self, part: &str) -> Option<&str> {
        self.parts.get(part).map(String::as_str)
    }

    /// The `Authorization` header value.
    pub fn authorization(&self) -> String {
        match self.scheme {
            SecurityScheme::Bearer => format!("Bearer {}", self.get("auth_token").unwrap_or_default()),
            SecurityScheme::Basic => {
                let raw = format!(
                    "{}:{}",
                    self.get("username").unwrap_or_default(),
                    self.get("password").unwrap_or_default()
                );
                format!("Basic {}", STANDARD.encode(raw))
            }
        }
    }
}

impl fmt::Debug for AuthCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthCredential")
            .field("scheme", &self.scheme)
            .field("parts", &self.parts.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn auth_object(scheme: SecurityScheme) -> FieldSchema {
    let mut auth = FieldSchema::object().with_description(format!("{} authentication", scheme));
    for field in scheme.required_fields() {
        let description = match *field {
            "auth_token" => "Bearer token",
            "username" => "Basic auth username",
            _ => "Basic auth password",
        };
        auth.insert_property(*field, FieldSchema::of(JsonType::String).with_description(description), true);
    }
    auth
}

/// Add the scheme's credential fields under a required `auth` sub-object.
pub fn merge_into_schema(schema: &mut FieldSchema, scheme: SecurityScheme) {
    schema.insert_property(AUTH_FIELD, auth_object(scheme), true);
}

/// [`merge_into_schema`] for an already exported JSON Schema.
pub fn merge_into_value(schema: &mut Value, scheme: SecurityScheme) {
    let Some(obj) = schema.as_object_mut() else {
        return;
    };
    if let Some(properties) = obj
        .entry("properties")
        .or_insert_with(|| json!({}))
        .as_object_mut()
    {
        properties.insert(AUTH_FIELD.to_string(), auth_object(scheme).to_json());
    }
    if let Some(required) = obj
        .entry("required")
        .or_insert_with(|| json!([]))
        .as_array_mut()
    {
        if !required.iter().any(|r| r.as_str() == Some(AUTH_FIELD)) {
            required.push(json!(AUTH_FIELD));
        }
    }
}

/// Read the scheme's credentials from `arguments`.
///
/// Each part is looked up in the `auth` sub-object first, then at the top
/// level. The credential remembers which top-level keys it consumed.
pub fn extract(arguments: &Map<String, Value>, scheme: SecurityScheme) -> Result<AuthCredential, MissingCredential> {
    let nested = arguments.get(AUTH_FIELD).and_then(Value::as_object);
    let mut parts = BTreeMap::new();
    let mut flat_keys = Vec::new();

    for field in scheme.required_fields() {
        let from_nested = nested
            .and_then(|n| n.get(*field))
            .and_then(Value::as_str)
            .filter(|v| !v.is_empty());
        let value = match from_nested {
            Some(v) => Some(v),
            None => {
                let flat = arguments
                    .get(*field)
                    .and_then(Value::as_str)
                    .filter(|v| !v.is_empty());
                if flat.is_some() {
                    flat_keys.push(field.to_string());
                }
                flat
            }
        };
        match value {
            Some(v) => {
                parts.insert(field.to_string(), v.to_string());
            }
            None => {
                return Err(MissingCredential {
                    scheme,
                    field: field.to_string(),
                });
            }
        }
    }

    tracing::debug!(scheme = %scheme, flat = flat_keys.len(), "Extracted credentials from tool arguments");
    Ok(AuthCredential {
        scheme,
        parts,
        flat_keys,
    })
}

/// Remove the `auth` object and every top-level key `credential` was read from.
///
/// Top-level keys that only share a name with a credential part, while the
/// part itself came from the `auth` object, are business fields and survive.
pub fn strip(arguments: &mut Map<String, Value>, credential: &AuthCredential) {
    arguments.remove(AUTH_FIELD);
    for key in &credential.flat_keys {
        arguments.remove(key);
    }
}

/// Headers carrying the credential.
pub fn to_headers(credential: &AuthCredential) -> Result<HeaderMap, InvalidCredential> {
    let mut value = HeaderValue::from_str(&credential.authorization()).map_err(|_| InvalidCredential {
        scheme: credential.scheme,
    })?;
    value.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert(header::AUTHORIZATION, value);
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn test_resolve_aliases() {
        assert_eq!(SecurityScheme::resolve("Bearer"), Some(SecurityScheme::Bearer));
        assert_eq!(SecurityScheme::resolve("BearerAuth"), Some(SecurityScheme::Bearer));
        assert_eq!(SecurityScheme::resolve("jwt"), Some(SecurityScheme::Bearer));
        assert_eq!(SecurityScheme::resolve("BASIC_AUTH"), Some(SecurityScheme::Basic));
        assert_eq!(SecurityScheme::resolve("oauth2"), None);
    }

    #[test]
    fn test_merge_bearer() {
        let mut schema = FieldSchema::object();
        schema.insert_property("name", FieldSchema::of(JsonType::String), true);
        merge_into_schema(&mut schema, SecurityScheme::Bearer);

        let value = schema.to_input_schema();
        assert_eq!(value["required"], json!(["name", "auth"]));
        assert_eq!(value["properties"]["auth"]["required"], json!(["auth_token"]));
        assert_eq!(value["properties"]["auth"]["properties"]["auth_token"]["type"], json!("string"));
    }

    #[test]
    fn test_merge_basic() {
        let mut schema = FieldSchema::object();
        merge_into_schema(&mut schema, SecurityScheme::Basic);
        let value = schema.to_input_schema();
        assert_eq!(value["properties"]["auth"]["required"], json!(["username", "password"]));
    }

    #[test]
    fn test_merge_into_exported_schema() {
        let mut schema = json!({"type": "object", "properties": {"q": {"type": "string"}}});
        merge_into_value(&mut schema, SecurityScheme::Bearer);
        merge_into_value(&mut schema, SecurityScheme::Bearer);
        assert_eq!(schema["required"], json!(["auth"]));
        assert_eq!(schema["properties"]["auth"]["required"], json!(["auth_token"]));
        assert!(schema["properties"].get("q").is_some());
    }

    #[test]
    fn test_extract_strip_and_header_bearer() {
        let mut arguments = args(json!({"auth": {"auth_token": "abc123"}, "name": "x"}));
        let credential = extract(&arguments, SecurityScheme::Bearer).unwrap();
        strip(&mut arguments, &credential);

        assert_eq!(arguments, args(json!({"name": "x"})));
        let headers = to_headers(&credential).unwrap();
        assert_eq!(headers.get(header::AUTHORIZATION).unwrap(), "Bearer abc123");
    }

    #[test]
    fn test_flat_credentials_accepted() {
        let mut arguments = args(json!({"username": "alice", "password": "s3cret", "q": 1}));
        let credential = extract(&arguments, SecurityScheme::Basic).unwrap();
        strip(&mut arguments, &credential);

        assert_eq!(arguments, args(json!({"q": 1})));
        // base64("alice:s3cret")
        assert_eq!(credential.authorization(), "Basic YWxpY2U6czNjcmV0");
    }

    #[test]
    fn test_business_fields_sharing_credential_names_survive() {
        let mut arguments = args(json!({
            "auth": {"username": "admin", "password": "pw"},
            "username": "new_user"
        }));
        let credential = extract(&arguments, SecurityScheme::Basic).unwrap();
        strip(&mut arguments, &credential);

        assert_eq!(credential.get("username"), Some("admin"));
        assert_eq!(arguments, args(json!({"username": "new_user"})));
    }

    #[test]
    fn test_flat_fallback_under_empty_auth_object_is_stripped() {
        let mut arguments = args(json!({"auth": {}, "auth_token": "SECRET", "q": "x"}));
        let credential = extract(&arguments, SecurityScheme::Bearer).unwrap();
        strip(&mut arguments, &credential);

        assert_eq!(credential.get("auth_token"), Some("SECRET"));
        assert_eq!(arguments, args(json!({"q": "x"})));
    }

    #[test]
    fn test_mixed_nested_and_flat_parts() {
        let mut arguments = args(json!({"auth": {"username": "alice"}, "password": "pw", "n": 1}));
        let credential = extract(&arguments, SecurityScheme::Basic).unwrap();
        strip(&mut arguments, &credential);

        assert_eq!(credential.get("username"), Some("alice"));
        assert_eq!(credential.get("password"), Some("pw"));
        assert_eq!(arguments, args(json!({"n": 1})));
    }

    #[test]
    fn test_header_unsafe_credential_rejected() {
        let credential = AuthCredential::bearer("bad\ntoken");
        let err = to_headers(&credential).unwrap_err();
        assert_eq!(err.scheme, SecurityScheme::Bearer);
        assert_eq!(err.data()["type"], json!("auth"));
    }

    #[test]
    fn test_missing_field_names_scheme() {
        let arguments = args(json!({"auth": {"username": "alice"}}));
        let err = extract(&arguments, SecurityScheme::Basic).unwrap_err();
        assert_eq!(err.field, "password");
        assert_eq!(err.data(), json!({"type": "auth", "scheme": "basic", "missing": "password"}));
    }

    #[test]
    fn test_debug_redacts_values() {
        let credential = AuthCredential::bearer("topsecret");
        assert!(!format!("{:?}", credential).contains("topsecret"));
    }
}

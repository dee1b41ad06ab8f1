//! Declarative request schema descriptions.
//!
//! Views describe their request parameters with one of the dialects in
//! [`SchemaSource`]. Field trees use a closed set of semantic kinds
//! ([`FieldKind`]) so the MCP layer can map them to JSON Schema without any
//! runtime inspection of handler types.
//!
//! ```yaml
//! dialect: fields
//! fields:
//!   - name: full_name
//!     data_key: fullName
//!     kind: string
//!     required: true
//!     validators:
//!       - type: length
//!         max: 120
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

/// A view's parameter schema, in one of the supported dialects.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "dialect", rename_all = "snake_case")]
pub enum SchemaSource {
    /// A flat field tree. Path placeholders are matched by name; remaining
    /// fields travel as query string or body depending on the method.
    Fields(SchemaDecl),

    /// Parameters split by request location.
    Located {
        #[serde(default)]
        path: Option<SchemaDecl>,
        #[serde(default)]
        querystring: Option<SchemaDecl>,
        #[serde(default)]
        body: Option<SchemaDecl>,
    },

    /// A JSON Schema object supplied verbatim.
    JsonSchema { schema: Value },
}

/// A named collection of field declarations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SchemaDecl {
    /// Schema name (informational).
    #[serde(default)]
    pub name: Option<String>,

    /// Declared fields, in declaration order.
    #[serde(default)]
    pub fields: Vec<FieldDecl>,
}

impl SchemaDecl {
    /// Create an empty schema declaration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field.
    pub fn field(mut self, field: FieldDecl) -> Self {
        self.fields.push(field);
        self
    }

    /// Whether any field is marked required.
    pub fn has_required(&self) -> bool {
        self.fields.iter().any(|f| f.required)
    }
}

/// One declared field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldDecl {
    /// Internal identifier.
    pub name: String,

    /// External alias used on the wire. Takes precedence over `name`.
    #[serde(default)]
    pub data_key: Option<String>,

    /// Semantic kind of the field.
    #[serde(default)]
    pub kind: FieldKind,

    /// Whether the field must be supplied.
    #[serde(default)]
    pub required: bool,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub validators: Vec<FieldValidator>,

    /// Default applied when deserializing input (highest priority).
    #[serde(default)]
    pub load_default: Option<Value>,

    /// Default applied when serializing output.
    #[serde(default)]
    pub dump_default: Option<Value>,

    /// Legacy single default.
    #[serde(default)]
    pub default: Option<Value>,

    /// Child schema for `nested` fields.
    #[serde(default)]
    pub nested: Option<SchemaDecl>,

    /// Nested field holds a list of child objects.
    #[serde(default)]
    pub many: bool,

    /// Element declaration for `list` fields.
    #[serde(default)]
    pub items: Option<Box<FieldDecl>>,

    /// Value declaration for `dict` fields.
    #[serde(default)]
    pub values: Option<Box<FieldDecl>>,
}

impl FieldDecl {
    /// Create an optional field of the given kind.
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            data_key: None,
            kind,
            required: false,
            description: None,
            validators: Vec::new(),
            load_default: None,
            dump_default: None,
            default: None,
            nested: None,
            many: false,
            items: None,
            values: None,
        }
    }

    /// Mark the field required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Set the external alias.
    pub fn data_key(mut self, alias: impl Into<String>) -> Self {
        self.data_key = Some(alias.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Attach a validator.
    pub fn validator(mut self, validator: FieldValidator) -> Self {
        self.validators.push(validator);
        self
    }

    /// Name the field is exposed under: the alias when declared.
    pub fn exposed_name(&self) -> &str {
        self.data_key.as_deref().unwrap_or(&self.name)
    }

    /// Effective default: load default, then dump default, then legacy default.
    pub fn effective_default(&self) -> Option<&Value> {
        self.load_default
            .as_ref()
            .or(self.dump_default.as_ref())
            .or(self.default.as_ref())
    }
}

/// Semantic field kinds understood by the schema normalizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(from = "String", into = "String")]
pub enum FieldKind {
    Email,
    Url,
    Uuid,
    Date,
    Time,
    DateTime,
    Integer,
    Float,
    Decimal,
    Boolean,
    #[default]
    String,
    Nested,
    List,
    Dict,
    Raw,
    /// A kind this crate does not know; treated as a string.
    Other(String),
}

impl From<String> for FieldKind {
    fn from(value: String) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "email" => FieldKind::Email,
            "url" | "uri" => FieldKind::Url,
            "uuid" => FieldKind::Uuid,
            "date" => FieldKind::Date,
            "time" => FieldKind::Time,
            "datetime" | "date-time" | "date_time" => FieldKind::DateTime,
            "integer" | "int" => FieldKind::Integer,
            "float" | "number" => FieldKind::Float,
            "decimal" => FieldKind::Decimal,
            "boolean" | "bool" => FieldKind::Boolean,
            "string" | "str" => FieldKind::String,
            "nested" => FieldKind::Nested,
            "list" | "array" => FieldKind::List,
            "dict" | "mapping" | "object" => FieldKind::Dict,
            "raw" | "any" => FieldKind::Raw,
            _ => FieldKind::Other(value),
        }
    }
}

impl From<FieldKind> for String {
    fn from(kind: FieldKind) -> Self {
        match kind {
            FieldKind::Email => "email".to_string(),
            FieldKind::Url => "url".to_string(),
            FieldKind::Uuid => "uuid".to_string(),
            FieldKind::Date => "date".to_string(),
            FieldKind::Time => "time".to_string(),
            FieldKind::DateTime => "datetime".to_string(),
            FieldKind::Integer => "integer".to_string(),
            FieldKind::Float => "float".to_string(),
            FieldKind::Decimal => "decimal".to_string(),
            FieldKind::Boolean => "boolean".to_string(),
            FieldKind::String => "string".to_string(),
            FieldKind::Nested => "nested".to_string(),
            FieldKind::List => "list".to_string(),
            FieldKind::Dict => "dict".to_string(),
            FieldKind::Raw => "raw".to_string(),
            FieldKind::Other(name) => name,
        }
    }
}

/// Field constraints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldValidator {
    /// String length or collection size bounds. `equal` pins both bounds.
    Length {
        #[serde(default)]
        min: Option<u64>,
        #[serde(default)]
        max: Option<u64>,
        #[serde(default)]
        equal: Option<u64>,
    },
    /// Numeric bounds (inclusive).
    Range {
        #[serde(default)]
        min: Option<Number>,
        #[serde(default)]
        max: Option<Number>,
    },
    /// Allowed values.
    OneOf { choices: Vec<Value> },
    /// Regular expression the value must match.
    Regexp { regex: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_aliases() {
        assert_eq!(FieldKind::from("Email".to_string()), FieldKind::Email);
        assert_eq!(FieldKind::from("date-time".to_string()), FieldKind::DateTime);
        assert_eq!(FieldKind::from("int".to_string()), FieldKind::Integer);
        assert_eq!(
            FieldKind::from("IPv4".to_string()),
            FieldKind::Other("IPv4".to_string())
        );
    }

    #[test]
    fn test_default_priority() {
        let mut field = FieldDecl::new("limit", FieldKind::Integer);
        field.default = Some(json!(10));
        assert_eq!(field.effective_default(), Some(&json!(10)));

        field.dump_default = Some(json!(20));
        assert_eq!(field.effective_default(), Some(&json!(20)));

        field.load_default = Some(json!(30));
        assert_eq!(field.effective_default(), Some(&json!(30)));
    }

    #[test]
    fn test_parse_located_yaml() {
        let yaml = r#"
dialect: located
path:
  fields:
    - name: id
      kind: integer
      required: true
body:
  fields:
    - name: full_name
      data_key: fullName
      required: true
      validators:
        - type: length
          min: 1
          max: 80
"#;
        let source: SchemaSource = serde_yaml::from_str(yaml).unwrap();
        match source {
            SchemaSource::Located {
                path,
                querystring,
                body,
            } => {
                assert_eq!(path.unwrap().fields[0].kind, FieldKind::Integer);
                assert!(querystring.is_none());
                let body = body.unwrap();
                assert_eq!(body.fields[0].exposed_name(), "fullName");
                assert_eq!(
                    body.fields[0].validators[0],
                    FieldValidator::Length {
                        min: Some(1),
                        max: Some(80),
                        equal: None
                    }
                );
            }
            other => panic!("unexpected dialect: {:?}", other),
        }
    }
}

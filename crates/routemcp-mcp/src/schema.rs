//! Schema normalization.
//!
//! Converts the declarative schema dialects from `routemcp-core` into a single
//! canonical [`FieldSchema`] tree, then into the JSON Schema objects MCP
//! clients see. Field kinds map through a closed table, most specific first:
//!
//! | Kind | JSON type | format |
//! |------|-----------|--------|
//! | email | string | email |
//! | url | string | uri |
//! | uuid | string | uuid |
//! | date / time / datetime | string | date / time / date-time |
//! | integer | integer | |
//! | float / decimal | number | |
//! | boolean | boolean | |
//! | nested | object (array of objects when `many`) | |
//! | list | array | |
//! | dict | object | |
//! | raw | (any) | |
//! | string / unknown | string | |

use crate::pattern::PathPattern;
use axum::http::Method;
use routemcp_core::{FieldDecl, FieldKind, FieldValidator, SchemaDecl, SchemaSource};
use serde_json::{Map, Number, Value, json};
use std::collections::BTreeMap;

/// JSON Schema primitive types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl JsonType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JsonType::String => "string",
            JsonType::Integer => "integer",
            JsonType::Number => "number",
            JsonType::Boolean => "boolean",
            JsonType::Array => "array",
            JsonType::Object => "object",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "string" => Some(JsonType::String),
            "integer" => Some(JsonType::Integer),
            "number" => Some(JsonType::Number),
            "boolean" => Some(JsonType::Boolean),
            "array" => Some(JsonType::Array),
            "object" => Some(JsonType::Object),
            _ => None,
        }
    }
}

/// Canonical representation of one validated field.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FieldSchema {
    /// `None` accepts any JSON value.
    pub json_type: Option<JsonType>,
    pub format: Option<String>,
    pub description: Option<String>,
    pub enum_values: Option<Vec<Value>>,
    pub minimum: Option<Number>,
    pub maximum: Option<Number>,
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    pub min_items: Option<u64>,
    pub max_items: Option<u64>,
    pub pattern: Option<String>,
    pub default: Option<Value>,
    pub items: Option<Box<FieldSchema>>,
    /// Object properties keyed by exposed name.
    pub properties: BTreeMap<String, FieldSchema>,
    /// Required exposed names, in declaration order.
    pub required: Vec<String>,
    /// `additionalProperties`: a bool or a schema.
    pub additional_properties: Option<Value>,
}

impl FieldSchema {
    /// A field of the given type.
    pub fn of(json_type: JsonType) -> Self {
        Self {
            json_type: Some(json_type),
            ..Self::default()
        }
    }

    /// An empty object.
    pub fn object() -> Self {
        Self::of(JsonType::Object)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Add a property, optionally required. Replaces an existing one.
    pub fn insert_property(&mut self, name: impl Into<String>, schema: FieldSchema, required: bool) {
        let name = name.into();
        if required && !self.required.contains(&name) {
            self.required.push(name.clone());
        }
        self.properties.insert(name, schema);
    }

    pub fn is_object(&self) -> bool {
        self.json_type == Some(JsonType::Object)
    }

    /// Render as a JSON Schema value.
    pub fn to_json(&self) -> Value {
        let mut out = Map::new();
        if let Some(t) = self.json_type {
            out.insert("type".into(), json!(t.as_str()));
        }
        if let Some(format) = &self.format {
            out.insert("format".into(), json!(format));
        }
        if let Some(description) = &self.description {
            out.insert("description".into(), json!(description));
        }
        if let Some(values) = &self.enum_values {
            out.insert("enum".into(), Value::Array(values.clone()));
        }
        if let Some(min) = &self.minimum {
            out.insert("minimum".into(), Value::Number(min.clone()));
        }
        if let Some(max) = &self.maximum {
            out.insert("maximum".into(), Value::Number(max.clone()));
        }
        if let Some(v) = self.min_length {
            out.insert("minLength".into(), json!(v));
        }
        if let Some(v) = self.max_length {
            out.insert("maxLength".into(), json!(v));
        }
        if let Some(v) = self.min_items {
            out.insert("minItems".into(), json!(v));
        }
        if let Some(v) = self.max_items {
            out.insert("maxItems".into(), json!(v));
        }
        if let Some(pattern) = &self.pattern {
            out.insert("pattern".into(), json!(pattern));
        }
        if let Some(default) = &self.default {
            out.insert("default".into(), default.clone());
        }
        if let Some(items) = &self.items {
            out.insert("items".into(), items.to_json());
        }
        if self.is_object() || !self.properties.is_empty() {
            let props: Map<String, Value> = self
                .properties
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect();
            out.insert("properties".into(), Value::Object(props));
            if !self.required.is_empty() {
                out.insert("required".into(), json!(self.required));
            }
        }
        if let Some(additional) = &self.additional_properties {
            out.insert("additionalProperties".into(), additional.clone());
        }
        Value::Object(out)
    }

    /// Render as a top-level tool input schema: always an object with
    /// `properties`, `required` and `additionalProperties: false`.
    pub fn to_input_schema(&self) -> Value {
        let mut value = self.to_json();
        if let Value::Object(map) = &mut value {
            map.insert("type".into(), json!("object"));
            map.entry("properties").or_insert_with(|| json!({}));
            map.insert("required".into(), json!(self.required));
            map.insert("additionalProperties".into(), json!(false));
        }
        value
    }
}

/// How tool arguments map back onto request locations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaLayout {
    /// Arguments are flat; placeholders are matched by name.
    Flat,
    /// Arguments are grouped under `path` / `querystring` / `body`.
    Located,
    /// Located, plus a free-form `data` object carrying the request body.
    FreeForm,
}

/// Input schema for one route + method, with its argument layout.
#[derive(Debug, Clone, PartialEq)]
pub struct InputSchema {
    pub schema: FieldSchema,
    pub layout: SchemaLayout,
}

/// Name of the free-form body field added to schema-less mutating tools.
pub const FREE_FORM_FIELD: &str = "data";

/// Map one declared field to its canonical schema.
pub fn field_schema(field: &FieldDecl) -> FieldSchema {
    let mut schema = match &field.kind {
        FieldKind::Email => string_with_format("email"),
        FieldKind::Url => string_with_format("uri"),
        FieldKind::Uuid => string_with_format("uuid"),
        FieldKind::Date => string_with_format("date"),
        FieldKind::Time => string_with_format("time"),
        FieldKind::DateTime => string_with_format("date-time"),
        FieldKind::Integer => FieldSchema::of(JsonType::Integer),
        FieldKind::Float | FieldKind::Decimal => FieldSchema::of(JsonType::Number),
        FieldKind::Boolean => FieldSchema::of(JsonType::Boolean),
        FieldKind::Nested => {
            let object = field
                .nested
                .as_ref()
                .map(normalize_fields)
                .unwrap_or_else(FieldSchema::object);
            if field.many {
                FieldSchema {
                    items: Some(Box::new(object)),
                    ..FieldSchema::of(JsonType::Array)
                }
            } else {
                object
            }
        }
        FieldKind::List => FieldSchema {
            items: field.items.as_deref().map(|item| Box::new(field_schema(item))),
            ..FieldSchema::of(JsonType::Array)
        },
        FieldKind::Dict => FieldSchema {
            additional_properties: Some(
                field
                    .values
                    .as_deref()
                    .map(|v| field_schema(v).to_json())
                    .unwrap_or(Value::Bool(true)),
            ),
            ..FieldSchema::object()
        },
        FieldKind::Raw => FieldSchema::default(),
        FieldKind::String | FieldKind::Other(_) => FieldSchema::of(JsonType::String),
    };

    for validator in &field.validators {
        apply_validator(&mut schema, validator);
    }
    if let Some(description) = &field.description {
        schema.description = Some(description.clone());
    }
    if let Some(default) = field.effective_default() {
        schema.default = Some(default.clone());
    }
    schema
}

fn string_with_format(format: &str) -> FieldSchema {
    FieldSchema {
        format: Some(format.to_string()),
        ..FieldSchema::of(JsonType::String)
    }
}

fn apply_validator(schema: &mut FieldSchema, validator: &FieldValidator) {
    match validator {
        FieldValidator::Length { min, max, equal } => {
            let (min, max) = match equal {
                Some(n) => (Some(*n), Some(*n)),
                None => (*min, *max),
            };
            if schema.json_type == Some(JsonType::Array) {
                schema.min_items = min.or(schema.min_items);
                schema.max_items = max.or(schema.max_items);
            } else {
                schema.min_length = min.or(schema.min_length);
                schema.max_length = max.or(schema.max_length);
            }
        }
        FieldValidator::Range { min, max } => {
            if min.is_some() {
                schema.minimum = min.clone();
            }
            if max.is_some() {
                schema.maximum = max.clone();
            }
        }
        FieldValidator::OneOf { choices } => schema.enum_values = Some(choices.clone()),
        FieldValidator::Regexp { regex } => schema.pattern = Some(regex.clone()),
    }
}

/// Map a field tree to an object schema. Property names and required entries
/// both use the exposed (aliased) name.
pub fn normalize_fields(decl: &SchemaDecl) -> FieldSchema {
    let mut schema = FieldSchema::object();
    for field in &decl.fields {
        schema.insert_property(field.exposed_name(), field_schema(field), field.required);
    }
    schema
}

/// Read an existing JSON Schema into the canonical form.
///
/// Keywords outside the canonical set are dropped.
pub fn from_json_schema(value: &Value) -> FieldSchema {
    let Some(obj) = value.as_object() else {
        return FieldSchema::default();
    };

    let json_type = obj
        .get("type")
        .and_then(Value::as_str)
        .and_then(JsonType::parse)
        .or_else(|| obj.contains_key("properties").then_some(JsonType::Object));

    let str_field = |key: &str| obj.get(key).and_then(Value::as_str).map(String::from);
    let num_field = |key: &str| match obj.get(key) {
        Some(Value::Number(n)) => Some(n.clone()),
        _ => None,
    };
    let u64_field = |key: &str| obj.get(key).and_then(Value::as_u64);

    let properties = obj
        .get("properties")
        .and_then(Value::as_object)
        .map(|props| {
            props
                .iter()
                .map(|(k, v)| (k.clone(), from_json_schema(v)))
                .collect()
        })
        .unwrap_or_default();

    let required = obj
        .get("required")
        .and_then(Value::as_array)
        .map(|r| r.iter().filter_map(Value::as_str).map(String::from).collect())
        .unwrap_or_default();

    FieldSchema {
        json_type,
        format: str_field("format"),
        description: str_field("description"),
        enum_values: obj.get("enum").and_then(Value::as_array).cloned(),
        minimum: num_field("minimum"),
        maximum: num_field("maximum"),
        min_length: u64_field("minLength"),
        max_length: u64_field("maxLength"),
        min_items: u64_field("minItems"),
        max_items: u64_field("maxItems"),
        pattern: str_field("pattern"),
        default: obj.get("default").cloned(),
        items: obj.get("items").map(|i| Box::new(from_json_schema(i))),
        properties,
        required,
        additional_properties: obj.get("additionalProperties").cloned(),
    }
}

/// Schema for one path placeholder.
pub fn path_param_schema(name: &str) -> FieldSchema {
    FieldSchema::of(JsonType::String).with_description(format!("Path parameter: {}", name))
}

/// Object schema built from a pattern's placeholders.
pub fn path_object(pattern: &PathPattern, optional: &[String]) -> FieldSchema {
    let mut schema = FieldSchema::object();
    for name in pattern.param_names() {
        let required = !optional.iter().any(|o| o == name);
        schema.insert_property(name, path_param_schema(name), required);
    }
    schema
}

/// Whether `method` carries a request body.
pub fn is_state_changing(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH)
}

/// Build the input schema for a route + method from the most specific source.
pub fn build_input_schema(
    source: Option<&SchemaSource>,
    pattern: &PathPattern,
    optional: &[String],
    method: &Method,
) -> InputSchema {
    match source {
        Some(SchemaSource::Fields(decl)) => {
            let mut schema = normalize_fields(decl);
            add_missing_path_params(&mut schema, pattern, optional);
            InputSchema {
                schema,
                layout: SchemaLayout::Flat,
            }
        }
        Some(SchemaSource::JsonSchema { schema }) => {
            let mut schema = from_json_schema(schema);
            schema.json_type = Some(JsonType::Object);
            add_missing_path_params(&mut schema, pattern, optional);
            InputSchema {
                schema,
                layout: SchemaLayout::Flat,
            }
        }
        Some(SchemaSource::Located {
            path,
            querystring,
            body,
        }) => {
            let mut schema = FieldSchema::object();
            match path {
                Some(decl) => {
                    let mut path_schema = normalize_fields(decl);
                    add_missing_path_params(&mut path_schema, pattern, optional);
                    let required = !path_schema.required.is_empty();
                    schema.insert_property("path", path_schema, required);
                }
                None if pattern.has_params() => {
                    let path_schema = path_object(pattern, optional);
                    let required = !path_schema.required.is_empty();
                    schema.insert_property("path", path_schema, required);
                }
                None => {}
            }
            for (key, decl) in [("querystring", querystring), ("body", body)] {
                if let Some(decl) = decl {
                    schema.insert_property(key, normalize_fields(decl), decl.has_required());
                }
            }
            InputSchema {
                schema,
                layout: SchemaLayout::Located,
            }
        }
        None => {
            let mut schema = FieldSchema::object();
            if pattern.has_params() {
                let path_schema = path_object(pattern, optional);
                let required = !path_schema.required.is_empty();
                schema.insert_property("path", path_schema, required);
            }
            if is_state_changing(method) {
                let data = FieldSchema {
                    additional_properties: Some(Value::Bool(true)),
                    ..FieldSchema::object()
                }
                .with_description("Request body data");
                schema.insert_property(FREE_FORM_FIELD, data, true);
                InputSchema {
                    schema,
                    layout: SchemaLayout::FreeForm,
                }
            } else {
                InputSchema {
                    schema,
                    layout: SchemaLayout::Located,
                }
            }
        }
    }
}

fn add_missing_path_params(schema: &mut FieldSchema, pattern: &PathPattern, optional: &[String]) {
    for name in pattern.param_names() {
        if !schema.properties.contains_key(name) {
            let required = !optional.iter().any(|o| o == name);
            schema.insert_property(name, path_param_schema(name), required);
        }
    }
}

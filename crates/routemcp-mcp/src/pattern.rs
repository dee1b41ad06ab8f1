//! Route pattern parsing and placeholder substitution.
//!
//! Patterns look like `/users/{id}` or `/items/{id:\d+}`. The regex after the
//! colon constrains matching in the host router; the bridge only needs the
//! placeholder name, so constraints are kept for display and stripped for
//! substitution.

use serde_json::{Map, Value};
use std::fmt;

/// Errors from parsing or filling a route pattern.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum PatternError {
    #[error("unbalanced braces in route pattern '{0}'")]
    Unbalanced(String),

    #[error("empty placeholder name in route pattern '{0}'")]
    EmptyName(String),

    #[error("missing value for path parameter '{0}'")]
    MissingValue(String),
}

/// One `{name}` or `{name:regex}` placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    pub name: String,
    pub constraint: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(Placeholder),
}

/// A parsed route pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    /// Parse a pattern. Braces inside a constraint (`{id:\d{3}}`) are balanced.
    pub fn parse(raw: &str) -> Result<Self, PatternError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = raw.chars();

        while let Some(c) = chars.next() {
            match c {
                '{' => {
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    let mut depth = 1;
                    let mut inner = String::new();
                    for c in chars.by_ref() {
                        match c {
                            '{' => depth += 1,
                            '}' => {
                                depth -= 1;
                                if depth == 0 {
                                    break;
                                }
                            }
                            _ => {}
                        }
                        inner.push(c);
                    }
                    if depth != 0 {
                        return Err(PatternError::Unbalanced(raw.to_string()));
                    }
                    segments.push(Segment::Param(parse_placeholder(raw, &inner)?));
                }
                '}' => return Err(PatternError::Unbalanced(raw.to_string())),
                _ => literal.push(c),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    /// The pattern as registered.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Placeholders in order of appearance.
    pub fn placeholders(&self) -> impl Iterator<Item = &Placeholder> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Param(p) => Some(p),
            Segment::Literal(_) => None,
        })
    }

    /// Placeholder names in order of appearance.
    pub fn param_names(&self) -> Vec<&str> {
        self.placeholders().map(|p| p.name.as_str()).collect()
    }

    pub fn has_params(&self) -> bool {
        self.placeholders().next().is_some()
    }

    /// Pattern with constraints removed (`/items/{id}`), the form axum routes use.
    pub fn to_route_path(&self) -> String {
        self.segments
            .iter()
            .map(|s| match s {
                Segment::Literal(l) => l.clone(),
                Segment::Param(p) => format!("{{{}}}", p.name),
            })
            .collect()
    }

    /// Fill every placeholder from `values`, percent-encoding each value.
    ///
    /// Placeholders listed in `optional` may be absent and render empty.
    pub fn substitute(
        &self,
        values: &Map<String, Value>,
        optional: &[String],
    ) -> Result<String, PatternError> {
        let mut out = String::with_capacity(self.raw.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(l) => out.push_str(l),
                Segment::Param(p) => match values.get(&p.name) {
                    Some(value) if !value.is_null() => {
                        out.push_str(&urlencoding::encode(&scalar_to_string(value)));
                    }
                    _ if optional.contains(&p.name) => {}
                    _ => return Err(PatternError::MissingValue(p.name.clone())),
                },
            }
        }
        Ok(out)
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn parse_placeholder(raw: &str, inner: &str) -> Result<Placeholder, PatternError> {
    let (name, constraint) = match inner.split_once(':') {
        Some((name, constraint)) => (name.trim(), Some(constraint.to_string())),
        None => (inner.trim(), None),
    };
    if name.is_empty() {
        return Err(PatternError::EmptyName(raw.to_string()));
    }
    Ok(Placeholder {
        name: name.to_string(),
        constraint,
    })
}

/// Render a JSON scalar the way it appears in a URL.
pub(crate) fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

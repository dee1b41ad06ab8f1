//! Include/exclude filtering of discovered routes.
//!
//! Patterns containing `*` or `?` are wildcards and must match the whole
//! route pattern or name. Other patterns match literally as a path-segment
//! prefix (`/api` matches `/api/users` but not `/apiary`) or a name prefix.

use crate::discovery::RouteDescriptor;
use regex::Regex;

#[derive(Debug, Clone)]
enum Matcher {
    Wildcard(Regex),
    Literal(String),
}

impl Matcher {
    fn new(pattern: &str) -> Result<Self, regex::Error> {
        if pattern.contains(['*', '?']) {
            let escaped = regex::escape(pattern)
                .replace(r"\*", ".*")
                .replace(r"\?", ".");
            Ok(Matcher::Wildcard(Regex::new(&format!("^{}$", escaped))?))
        } else {
            Ok(Matcher::Literal(pattern.to_string()))
        }
    }

    fn matches(&self, path: &str, name: &str) -> bool {
        match self {
            Matcher::Wildcard(re) => re.is_match(path) || re.is_match(name),
            Matcher::Literal(prefix) => segment_prefix(path, prefix) || name.starts_with(prefix.as_str()),
        }
    }
}

fn segment_prefix(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return path.starts_with('/');
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Allowlist/denylist over route patterns and names.
#[derive(Debug, Clone, Default)]
pub struct RouteFilter {
    include: Vec<Matcher>,
    exclude: Vec<Matcher>,
}

impl RouteFilter {
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self, regex::Error> {
        Ok(Self {
            include: include.iter().map(|p| Matcher::new(p)).collect::<Result<_, _>>()?,
            exclude: exclude.iter().map(|p| Matcher::new(p)).collect::<Result<_, _>>()?,
        })
    }

    /// Whether a route with this pattern and name passes the filter.
    pub fn allows(&self, path: &str, name: &str) -> bool {
        if !self.include.is_empty() && !self.include.iter().any(|m| m.matches(path, name)) {
            return false;
        }
        !self.exclude.iter().any(|m| m.matches(path, name))
    }

    pub fn allows_route(&self, route: &RouteDescriptor) -> bool {
        self.allows(route.pattern.as_str(), &route.name)
    }
}

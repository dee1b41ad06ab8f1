//! Permission checks for manual tools.
//!
//! Route-derived tools leave permission checks to the host route itself.
//! Manual tools with a `permission` are checked here; without an evaluator
//! they are denied.

use crate::protocol::RequestContext;
use std::collections::{HashMap, HashSet};

/// Decides whether a set of principals holds a permission.
pub trait PermissionEvaluator: Send + Sync {
    fn permits(&self, ctx: &RequestContext, principals: &[String], permission: &str) -> bool;
}

impl<F> PermissionEvaluator for F
where
    F: Fn(&RequestContext, &[String], &str) -> bool + Send + Sync,
{
    fn permits(&self, ctx: &RequestContext, principals: &[String], permission: &str) -> bool {
        self(ctx, principals, permission)
    }
}

/// Static grants of permissions to principals.
#[derive(Debug, Clone, Default)]
pub struct PrincipalGrants {
    grants: HashMap<String, HashSet<String>>,
}

impl PrincipalGrants {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant `permission` to `principal`.
    pub fn grant(mut self, permission: impl Into<String>, principal: impl Into<String>) -> Self {
        self.grants
            .entry(permission.into())
            .or_default()
            .insert(principal.into());
        self
    }
}

impl PermissionEvaluator for PrincipalGrants {
    fn permits(&self, _ctx: &RequestContext, principals: &[String], permission: &str) -> bool {
        self.grants
            .get(permission)
            .is_some_and(|allowed| principals.iter().any(|p| allowed.contains(p)))
    }
}

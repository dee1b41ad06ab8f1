//! Authentication parameter configuration.

use serde::{Deserialize, Serialize};

/// Controls how credentials for secured tools reach the host application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Expose credential fields (`auth.auth_token`, `auth.username`, ...) in tool
    /// input schemas. When disabled, credentials must arrive through the
    /// `Authorization` header of the outer MCP request.
    #[serde(default = "default_expose_auth_params")]
    pub expose_auth_params: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            expose_auth_params: default_expose_auth_params(),
        }
    }
}

fn default_expose_auth_params() -> bool {
    true
}

//! Tool name sanitization.
//!
//! MCP clients require tool names matching `^[A-Za-z0-9_-]{1,64}$`. Route names
//! are free-form, so every name goes through [`sanitize_tool_name`] before it
//! enters the registry. Collisions get a short hash of the original input,
//! then a counter.

use sha2::{Digest, Sha256};
use std::collections::HashSet;

/// Longest allowed tool name.
pub const MAX_NAME_LEN: usize = 64;

/// Base length kept when truncating, leaving room for a collision suffix.
const TRUNCATED_LEN: usize = 56;

/// Hex characters of the collision hash.
const HASH_LEN: usize = 7;

/// Counter attempts before giving up.
const MAX_ATTEMPTS: usize = 1000;

/// Naming failures. These are configuration problems surfaced at registration.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum NamingError {
    #[error("could not find a unique tool name for '{name}' after {attempts} attempts")]
    Exhausted { name: String, attempts: usize },
}

/// Whether `name` is already a valid tool name.
pub fn is_valid_tool_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_NAME_LEN
        && name.chars().all(is_allowed_char)
}

fn is_allowed_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// Normalize `name` into the tool-name alphabet and make it unique against `used`.
///
/// The caller inserts the returned name into `used`.
pub fn sanitize_tool_name(name: &str, used: &HashSet<String>) -> Result<String, NamingError> {
    let base = normalize(name);
    if !used.contains(&base) {
        return Ok(base);
    }

    let hash = short_hash(name);
    let hashed = with_suffix(&base, &format!("_{}", hash));
    if !used.contains(&hashed) {
        return Ok(hashed);
    }

    for counter in 0..MAX_ATTEMPTS {
        let candidate = with_suffix(&hashed, &format!("_{:03}", counter));
        if !used.contains(&candidate) {
            return Ok(candidate);
        }
    }

    Err(NamingError::Exhausted {
        name: name.to_string(),
        attempts: MAX_ATTEMPTS,
    })
}

/// Steps 1-4: replace invalid characters, fill empty names, guard leading
/// digits, truncate.
fn normalize(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| if is_allowed_char(c) { c } else { '_' })
        .collect();

    if out.is_empty() {
        out = "tool".to_string();
    }
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out = format!("tool_{}", out);
    }
    if out.len() > MAX_NAME_LEN {
        // Only ASCII remains, so byte truncation is safe.
        out.truncate(TRUNCATED_LEN);
    }
    out
}

/// Append `suffix`, shortening `base` so the result fits in [`MAX_NAME_LEN`].
fn with_suffix(base: &str, suffix: &str) -> String {
    let keep = MAX_NAME_LEN.saturating_sub(suffix.len()).min(base.len());
    format!("{}{}", &base[..keep], suffix)
}

fn short_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let mut hex = hex::encode(digest);
    hex.truncate(HASH_LEN);
    hex
}

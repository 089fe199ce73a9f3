//! Boundary extraction from a multipart `Content-Type` header.

use crate::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;

// multipart/<subtype>; boundary=("<quoted>" | <token>)
static BOUNDARY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)^multipart/[^;\s]+\s*;.*?\bboundary=(?:"([^"]+)"|([^\s;"]+))"#)
        .expect("boundary pattern is a valid regex")
});

/// Extract the boundary token from `content_type`.
pub fn extract_boundary(content_type: &str) -> Result<String> {
    BOUNDARY_RE
        .captures(content_type.trim())
        .and_then(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map(|m| m.as_str().to_string())
        .filter(|b| !b.is_empty())
        .ok_or_else(|| Error::BoundaryNotFound {
            content_type: content_type.to_string(),
        })
}

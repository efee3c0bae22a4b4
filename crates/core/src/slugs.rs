//! Resource slug validation.
//!
//! Slugs are unique per tenant and appear in URLs, so they are restricted
//! to lowercase alphanumerics and hyphens. A handful of names are
//! reserved for platform routes.

use crate::error::CoreError;

/// Names that can never be used as resource slugs.
pub const RESERVED_SLUGS: &[&str] = &[
    "new", "edit", "settings", "api", "admin", "internal", "system", "health",
];

/// Maximum slug length.
pub const MAX_SLUG_LEN: usize = 64;

/// Validate a slug: non-empty, within length, `[a-z0-9-]` only, no
/// leading/trailing hyphen, not reserved.
pub fn validate_slug(slug: &str) -> Result<(), CoreError> {
    if slug.is_empty() {
        return Err(CoreError::Validation("Slug must not be empty".into()));
    }
    if slug.len() > MAX_SLUG_LEN {
        return Err(CoreError::Validation(format!(
            "Slug must be at most {MAX_SLUG_LEN} characters"
        )));
    }
    if !slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(CoreError::Validation(format!(
            "Slug '{slug}' may only contain lowercase letters, digits, and hyphens"
        )));
    }
    if slug.starts_with('-') || slug.ends_with('-') {
        return Err(CoreError::Validation(format!(
            "Slug '{slug}' must not start or end with a hyphen"
        )));
    }
    if RESERVED_SLUGS.contains(&slug) {
        return Err(CoreError::Validation(format!("Slug '{slug}' is reserved")));
    }
    Ok(())
}

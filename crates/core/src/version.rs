//! Release version resolution for `deploy`.
//!
//! A deploy request carries either an explicit `version` string or a
//! `bump` level, never both. Explicit versions are parsed as semver;
//! bumps advance one component of the latest published version and reset
//! the lower components to zero.

use crate::error::CoreError;

/// A `major.minor.patch` version triple as stored on a release row.
pub type VersionTriple = (i32, i32, i32);

/// Which component of the version to advance on deploy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Bump {
    Major,
    Minor,
    Patch,
}

/// Version a resource starts from before any release exists.
pub const INITIAL_VERSION: VersionTriple = (0, 0, 0);

/// Resolve the target version for a deploy.
///
/// Exactly one of `explicit` / `bump` must be provided; anything else is
/// rejected. `latest` is the newest published version triple, if any.
pub fn resolve_target(
    latest: Option<VersionTriple>,
    explicit: Option<&str>,
    bump: Option<Bump>,
) -> Result<VersionTriple, CoreError> {
    match (explicit, bump) {
        (Some(_), Some(_)) => Err(CoreError::Validation(
            "Specify either version or bump, not both".into(),
        )),
        (None, None) => Err(CoreError::Validation(
            "Specify a version or a bump level".into(),
        )),
        (Some(raw), None) => parse_version(raw),
        (None, Some(level)) => {
            let (major, minor, patch) = latest.unwrap_or(INITIAL_VERSION);
            Ok(match level {
                Bump::Major => (major + 1, 0, 0),
                Bump::Minor => (major, minor + 1, 0),
                Bump::Patch => (major, minor, patch + 1),
            })
        }
    }
}

/// Parse an explicit `major.minor.patch` string.
///
/// Pre-release and build metadata are rejected; release versions are
/// plain triples.
pub fn parse_version(raw: &str) -> Result<VersionTriple, CoreError> {
    let parsed = semver::Version::parse(raw)
        .map_err(|e| CoreError::Validation(format!("Invalid version '{raw}': {e}")))?;
    if !parsed.pre.is_empty() || !parsed.build.is_empty() {
        return Err(CoreError::Validation(format!(
            "Version '{raw}' must be a plain major.minor.patch triple"
        )));
    }
    Ok((
        component(raw, parsed.major)?,
        component(raw, parsed.minor)?,
        component(raw, parsed.patch)?,
    ))
}

/// Narrow a semver component to the i32 the release columns store.
fn component(raw: &str, value: u64) -> Result<i32, CoreError> {
    i32::try_from(value).map_err(|_| {
        CoreError::Validation(format!(
            "Version '{raw}' has a component larger than {}",
            i32::MAX
        ))
    })
}

/// Format a triple for display and API responses.
pub fn format_version((major, minor, patch): VersionTriple) -> String {
    format!("{major}.{minor}.{patch}")
}

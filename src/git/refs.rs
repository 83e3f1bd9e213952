//! Release branch and tag naming.
//!
//! Release refs were historically written as `release/<n>` and are now
//! written as `release-<n>`. Writers use the hyphen form only; readers go
//! through [`resolve_either`] so both forms are found.

use crate::domain::ReleaseVersion;
use crate::error::Result;

const RELEASE_PREFIX: &str = "release";

/// Glob patterns that match release tags in either naming convention
pub const RELEASE_TAG_GLOBS: [&str; 2] = ["release/*", "release-*"];

/// Branch carrying a release train (`release-12`)
pub fn lineage_branch(version: ReleaseVersion) -> String {
    format!("{}-{}", RELEASE_PREFIX, version)
}

/// Tag marking a release (`release-12.0`)
pub fn release_tag(version: ReleaseVersion) -> String {
    format!("{}-{}", RELEASE_PREFIX, version.normalized())
}

/// Both spellings of a release ref, hyphen form first.
///
/// Names that do not start with `release-` or `release/` are returned as is.
pub fn separator_variants(name: &str) -> Vec<String> {
    let rest = name
        .strip_prefix("release-")
        .or_else(|| name.strip_prefix("release/"));

    match rest {
        Some(rest) => vec![
            format!("{}-{}", RELEASE_PREFIX, rest),
            format!("{}/{}", RELEASE_PREFIX, rest),
        ],
        None => vec![name.to_string()],
    }
}

/// Find the spelling of `name` for which `exists` returns true.
///
/// The hyphen form is tried before the slash form. Errors from `exists`
/// are propagated.
pub fn resolve_either<F>(name: &str, mut exists: F) -> Result<Option<String>>
where
    F: FnMut(&str) -> Result<bool>,
{
    for candidate in separator_variants(name) {
        if exists(&candidate)? {
            return Ok(Some(candidate));
        }
    }
    Ok(None)
}

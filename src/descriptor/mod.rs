//! Version propagation across a service's build descriptors.
//!
//! A service root holds one root `pom.xml` and any number of module
//! descriptors below it. Root descriptors get their own top-level
//! `<version>` bumped; module descriptors get the version inside their
//! `<parent>` block bumped (and their own top-level version, if they carry
//! one). See [rewrite] for the line rules.

pub mod rewrite;

pub use rewrite::{FieldChange, FieldKind, DIRECT_CHILD_LIMIT};

use crate::domain::ReleaseVersion;
use crate::error::{ReleaseError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File name of a build descriptor
pub const DESCRIPTOR_FILE_NAME: &str = "pom.xml";

/// Role of a descriptor inside its service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorKind {
    /// Lives directly in the service root
    Root,
    /// Lives in a module directory below the root
    Submodule,
}

/// Result of rewriting one descriptor
#[derive(Debug, Clone)]
pub struct DescriptorRewrite {
    pub path: PathBuf,
    pub kind: DescriptorKind,
    pub changes: Vec<FieldChange>,
}

impl DescriptorRewrite {
    pub fn is_changed(&self) -> bool {
        !self.changes.is_empty()
    }
}

fn io_at(path: &Path, err: std::io::Error) -> ReleaseError {
    ReleaseError::Io(std::io::Error::new(
        err.kind(),
        format!("{}: {}", path.display(), err),
    ))
}

/// Every descriptor under `dir`, depth first in name order.
///
/// `.git` directories are skipped and symlinked directories are not followed.
pub fn scan(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    walk(dir, &mut found)?;
    Ok(found)
}

fn walk(dir: &Path, found: &mut Vec<PathBuf>) -> Result<()> {
    let mut entries = fs::read_dir(dir)
        .map_err(|e| io_at(dir, e))?
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(|e| io_at(dir, e))?;
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let file_type = entry.file_type().map_err(|e| io_at(&entry.path(), e))?;
        let name = entry.file_name();

        if file_type.is_dir() {
            if name != ".git" {
                walk(&entry.path(), found)?;
            }
        } else if file_type.is_file() && name == DESCRIPTOR_FILE_NAME {
            found.push(entry.path());
        }
    }
    Ok(())
}

/// `Root` iff the descriptor's parent directory is the service root
pub fn classify(path: &Path, service_root: &Path) -> DescriptorKind {
    match path.parent() {
        Some(parent) if parent == service_root => DescriptorKind::Root,
        _ => DescriptorKind::Submodule,
    }
}

/// Rewrite one descriptor in place. The file is only written when its
/// content changes.
pub fn rewrite(
    path: &Path,
    kind: DescriptorKind,
    version: ReleaseVersion,
    property_pattern: Option<&str>,
) -> Result<DescriptorRewrite> {
    let content = fs::read(path).map_err(|e| io_at(path, e))?;
    let pattern = property_pattern.filter(|p| !p.is_empty());
    let target = version.normalized();

    let (updated, changes) = rewrite::rewrite_content(&content, kind, &target, pattern);

    for change in &changes {
        debug!(
            path = %path.display(),
            line = change.line,
            field = ?change.field,
            "{} -> {}",
            change.old,
            change.new
        );
    }

    if updated != content {
        fs::write(path, updated).map_err(|e| io_at(path, e))?;
    }

    Ok(DescriptorRewrite {
        path: path.to_path_buf(),
        kind,
        changes,
    })
}

/// Bump every descriptor of one service to `version`
pub fn propagate(
    service_root: &Path,
    version: ReleaseVersion,
    property_pattern: Option<&str>,
) -> Result<Vec<DescriptorRewrite>> {
    let mut rewrites = Vec::new();
    for path in scan(service_root)? {
        let kind = classify(&path, service_root);
        rewrites.push(rewrite(&path, kind, version, property_pattern)?);
    }
    debug!(
        root = %service_root.display(),
        descriptors = rewrites.len(),
        changed = rewrites.iter().filter(|r| r.is_changed()).count(),
        "version propagated"
    );
    Ok(rewrites)
}

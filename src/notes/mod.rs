//! Release notes synthesis.
//!
//! For every service the commits since the previous release's last tag are
//! compared with the commits that were already part of that release. Task
//! identifiers found only in the first range are new in this release:
//!
//! ```text
//!   branch point ── ... ── marker ── ... ── HEAD
//!   └──── in_previous ────┘└───── between ─────┘
//! ```
//!
//! Services are scanned independently into their own [TaskSet]s and merged
//! afterwards by [reduce].

pub mod render;

use crate::domain::{CommitRecord, ReleaseVersion, TaskPolicy, TaskSet};
use crate::error::{ReleaseError, Result};
use crate::git::{refs, CommitInfo, Repository};
use crate::warning::ReleaseWarning;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Inputs of one synthesis run
#[derive(Debug, Clone)]
pub struct NotesRequest {
    pub version: ReleaseVersion,
    /// Integration branch release branches are cut from (`develop`)
    pub trunk_branch: String,
    /// Prepended to every task identifier in the artifact
    pub url_prefix: String,
    pub policy: TaskPolicy,
    pub out_dir: PathBuf,
}

/// Task sets collected from one service
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceScan {
    pub service: String,
    /// Tag (or branch ref, on fallback) marking the end of the previous release
    pub marker: String,
    pub used_fallback: bool,
    pub between: TaskSet,
    pub in_previous: TaskSet,
    /// Commits in the `between` range
    pub commit_count: usize,
    /// Commits in the `between` range that reference a task
    pub task_count: usize,
}

/// Union of all scans and the tasks new in this release
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReleaseDelta {
    pub between: TaskSet,
    pub in_previous: TaskSet,
    /// `between - in_previous`, ascending
    pub new_tasks: Vec<String>,
}

#[derive(Debug)]
pub struct SynthesisReport {
    pub path: PathBuf,
    /// Previous release branch, when one was found
    pub lineage: Option<String>,
    pub delta: ReleaseDelta,
    pub scans: Vec<ServiceScan>,
    pub warnings: Vec<ReleaseWarning>,
}

/// `release-notes-12.txt`
pub fn notes_file_name(version: ReleaseVersion) -> String {
    format!("release-notes-{}.txt", version)
}

/// Branch of the release preceding `version`, in whichever naming
/// convention the remote uses.
pub fn resolve_previous_lineage(
    repo: &dyn Repository,
    version: ReleaseVersion,
) -> Result<String> {
    let previous = version.previous().ok_or_else(|| {
        ReleaseError::not_found(format!("no release precedes version {}", version))
    })?;
    let wanted = refs::lineage_branch(previous);

    refs::resolve_either(&wanted, |candidate| repo.remote_branch_exists(candidate))?
        .ok_or_else(|| {
            ReleaseError::not_found(format!(
                "release branch '{}' on remote '{}'",
                wanted,
                repo.remote_name()
            ))
        })
}

/// Last release tag merged into `lineage_ref`, across both tag conventions
fn find_marker(repo: &dyn Repository, lineage_ref: &str) -> Option<String> {
    let mut tags = Vec::new();
    for pattern in refs::RELEASE_TAG_GLOBS {
        match repo.tags_matching(pattern, lineage_ref) {
            Ok(found) => tags.extend(found),
            Err(e) => debug!("listing tags '{}' merged into {}: {}", pattern, lineage_ref, e),
        }
    }
    tags.into_iter().max()
}

fn collect(commits: &[CommitInfo], policy: TaskPolicy) -> (TaskSet, usize) {
    let mut tasks = TaskSet::new();
    let mut referencing = 0;
    for commit in commits {
        let record = CommitRecord::from_commit(commit, policy);
        debug!(hash = %record.hash, tasks = ?record.task_ids, "commit");
        if !record.task_ids.is_empty() {
            referencing += 1;
        }
        tasks.extend(record.task_ids);
    }
    (tasks, referencing)
}

/// Collect the task sets of one service against the previous release
pub fn scan_service(
    service: &str,
    repo: &dyn Repository,
    lineage: &str,
    request: &NotesRequest,
) -> Result<ServiceScan> {
    let remote = repo.remote_name();
    let lineage_ref = format!("{}/{}", remote, lineage);
    let trunk_ref = format!("{}/{}", remote, request.trunk_branch);

    let branch_point = repo.merge_base(&lineage_ref, &trunk_ref)?;

    let (marker, used_fallback) = match find_marker(repo, &lineage_ref) {
        Some(tag) => (tag, false),
        None => (lineage_ref.clone(), true),
    };
    let marker_commit = repo.resolve_ref_to_commit(&marker)?;
    debug!(
        service,
        branch_point = %branch_point,
        marker = %marker,
        marker_commit = %marker_commit,
        "previous release boundaries"
    );

    let between_commits = repo.commits_between(&marker_commit, "HEAD")?;
    let previous_commits = repo.commits_between(&branch_point, &marker_commit)?;

    let (between, task_count) = collect(&between_commits, request.policy);
    let (in_previous, _) = collect(&previous_commits, request.policy);

    info!(
        service,
        commits = between_commits.len(),
        with_tasks = task_count,
        previous_commits = previous_commits.len(),
        "scanned"
    );

    Ok(ServiceScan {
        service: service.to_string(),
        marker,
        used_fallback,
        between,
        in_previous,
        commit_count: between_commits.len(),
        task_count,
    })
}

/// Merge per-service scans into the release delta
pub fn reduce(scans: &[ServiceScan]) -> ReleaseDelta {
    let mut between = TaskSet::new();
    let mut in_previous = TaskSet::new();
    for scan in scans {
        between.extend(scan.between.iter().cloned());
        in_previous.extend(scan.in_previous.iter().cloned());
    }
    let new_tasks = between.difference(&in_previous).cloned().collect();

    ReleaseDelta {
        between,
        in_previous,
        new_tasks,
    }
}

/// Scan every service, reduce and write the release notes artifact.
///
/// The previous release is looked up in the first service by name. When it
/// cannot be found a minimal artifact is written and a warning returned.
/// Services that fail to scan are skipped with a warning. Only failing to
/// write the artifact is an error.
pub fn synthesize(
    services: &[(&str, &dyn Repository)],
    request: &NotesRequest,
) -> Result<SynthesisReport> {
    let mut ordered: Vec<&(&str, &dyn Repository)> = services.iter().collect();
    ordered.sort_by(|a, b| a.0.cmp(b.0));

    let first = ordered
        .first()
        .ok_or_else(|| ReleaseError::validation("no services to write release notes for"))?;

    let path = request.out_dir.join(notes_file_name(request.version));
    let mut warnings = Vec::new();

    let lineage = match resolve_previous_lineage(first.1, request.version) {
        Ok(lineage) => lineage,
        Err(e) => {
            warn!("previous release branch not resolved: {}", e);
            warnings.push(ReleaseWarning::PreviousLineageMissing {
                reason: e.to_string(),
            });
            write_artifact(&path, &render::render_without_lineage(request.version))?;
            return Ok(SynthesisReport {
                path,
                lineage: None,
                delta: ReleaseDelta::default(),
                scans: Vec::new(),
                warnings,
            });
        }
    };
    info!(lineage = %lineage, version = %request.version, "comparing with previous release");

    let mut scans = Vec::new();
    for (name, repo) in &ordered {
        match scan_service(name, *repo, &lineage, request) {
            Ok(scan) => {
                if scan.used_fallback {
                    warnings.push(ReleaseWarning::MarkerFallback {
                        service: name.to_string(),
                        lineage: lineage.clone(),
                    });
                }
                scans.push(scan);
            }
            Err(e) => {
                warn!(service = %name, "skipped: {}", e);
                warnings.push(ReleaseWarning::ServiceSkipped {
                    service: name.to_string(),
                    reason: e.to_string(),
                });
            }
        }
    }

    let delta = reduce(&scans);
    let content = render::render(
        request.version,
        &lineage,
        &delta,
        &scans,
        &request.url_prefix,
    );
    write_artifact(&path, &content)?;

    Ok(SynthesisReport {
        path,
        lineage: Some(lineage),
        delta,
        scans,
        warnings,
    })
}

fn write_artifact(path: &std::path::Path, content: &str) -> Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir)?;
        }
    }
    fs::write(path, content)?;
    debug!(path = %path.display(), bytes = content.len(), "release notes written");
    Ok(())
}

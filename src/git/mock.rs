use crate::error::{ReleaseError, Result};
use crate::git::{refs, CommitInfo, Repository};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

/// Handle on the calls recorded by a [MockRepository], usable after the
/// repository itself has been moved away
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn entries(&self) -> Vec<String> {
        self.0.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn push(&self, call: String) {
        if let Ok(mut calls) = self.0.lock() {
            calls.push(call);
        }
    }
}

/// Mock repository for testing without actual git operations
///
/// Read operations answer from tables filled in by the test; mutating
/// operations are recorded and can be inspected with [MockRepository::calls].
pub struct MockRepository {
    remote_branches: HashSet<String>,
    refs: HashMap<String, String>,
    merge_bases: HashMap<(String, String), String>,
    tags: Vec<(String, String)>,
    ranges: HashMap<(String, String), Vec<CommitInfo>>,
    dirty: Vec<String>,
    patch: String,
    current_branch: Mutex<String>,
    calls: CallLog,
}

impl MockRepository {
    /// Create a new empty mock repository on `develop`
    pub fn new() -> Self {
        MockRepository {
            remote_branches: HashSet::new(),
            refs: HashMap::new(),
            merge_bases: HashMap::new(),
            tags: Vec::new(),
            ranges: HashMap::new(),
            dirty: Vec::new(),
            patch: String::new(),
            current_branch: Mutex::new("develop".to_string()),
            calls: CallLog::default(),
        }
    }

    /// Register a branch on the remote
    pub fn add_remote_branch(&mut self, branch: impl Into<String>) {
        self.remote_branches.insert(branch.into());
    }

    /// Make `reference` resolve to `commit`
    pub fn set_ref(&mut self, reference: impl Into<String>, commit: impl Into<String>) {
        self.refs.insert(reference.into(), commit.into());
    }

    /// Set the merge base returned for `(a, b)` in either order
    pub fn set_merge_base(
        &mut self,
        a: impl Into<String>,
        b: impl Into<String>,
        base: impl Into<String>,
    ) {
        self.merge_bases.insert((a.into(), b.into()), base.into());
    }

    /// Add a tag reachable from `merged_into`
    pub fn add_tag(&mut self, name: impl Into<String>, merged_into: impl Into<String>) {
        self.tags.push((name.into(), merged_into.into()));
    }

    /// Commits returned for `commits_between(from, to)`
    pub fn set_range(
        &mut self,
        from: impl Into<String>,
        to: impl Into<String>,
        commits: Vec<CommitInfo>,
    ) {
        self.ranges.insert((from.into(), to.into()), commits);
    }

    /// Report uncommitted changes to tracked files
    pub fn set_dirty(&mut self, lines: Vec<String>) {
        self.dirty = lines;
    }

    pub fn set_patch(&mut self, patch: impl Into<String>) {
        self.patch = patch.into();
    }

    /// Mutating calls made so far, e.g. `tag release-12.0`
    pub fn calls(&self) -> Vec<String> {
        self.calls.entries()
    }

    pub fn call_log(&self) -> CallLog {
        self.calls.clone()
    }

    fn record(&self, call: String) {
        self.calls.push(call);
    }
}

impl Default for MockRepository {
    fn default() -> Self {
        Self::new()
    }
}

fn glob_matches(pattern: &str, name: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => name.starts_with(prefix),
        None => pattern == name,
    }
}

impl Repository for MockRepository {
    fn remote_name(&self) -> &str {
        "origin"
    }

    fn is_clean(&self) -> Result<bool> {
        Ok(self.dirty.is_empty())
    }

    fn status_lines(&self) -> Result<Vec<String>> {
        Ok(self.dirty.clone())
    }

    fn reset_hard(&self) -> Result<()> {
        self.record("reset --hard".to_string());
        Ok(())
    }

    fn current_branch(&self) -> Result<String> {
        self.current_branch
            .lock()
            .map(|b| b.clone())
            .map_err(|_| ReleaseError::vcs("mock state poisoned"))
    }

    fn checkout(&self, branch: &str) -> Result<()> {
        self.record(format!("checkout {}", branch));
        if let Ok(mut current) = self.current_branch.lock() {
            *current = branch.to_string();
        }
        Ok(())
    }

    fn create_branch(&self, name: &str) -> Result<()> {
        self.record(format!("branch {}", name));
        if let Ok(mut current) = self.current_branch.lock() {
            *current = name.to_string();
        }
        Ok(())
    }

    fn pull(&self) -> Result<()> {
        self.record("pull".to_string());
        Ok(())
    }

    fn add_all(&self) -> Result<()> {
        self.record("add --all".to_string());
        Ok(())
    }

    fn commit(&self, message: &str) -> Result<String> {
        self.record(format!("commit {}", message));
        Ok("0000000000000000000000000000000000000000".to_string())
    }

    fn tag(&self, name: &str) -> Result<()> {
        self.record(format!("tag {}", name));
        Ok(())
    }

    fn push_with_tags(&self) -> Result<()> {
        self.record("push --tags".to_string());
        Ok(())
    }

    fn delete_branch_if_exists(&self, name: &str) {
        for variant in refs::separator_variants(name) {
            self.record(format!("delete branch {}", variant));
        }
    }

    fn delete_tag_if_exists(&self, name: &str) {
        for variant in refs::separator_variants(name) {
            self.record(format!("delete tag {}", variant));
        }
    }

    fn remote_branch_exists(&self, branch: &str) -> Result<bool> {
        Ok(self.remote_branches.contains(branch))
    }

    fn commits_between(&self, from: &str, to: &str) -> Result<Vec<CommitInfo>> {
        self.ranges
            .get(&(from.to_string(), to.to_string()))
            .cloned()
            .ok_or_else(|| ReleaseError::vcs(format!("no range {}..{}", from, to)))
    }

    fn merge_base(&self, a: &str, b: &str) -> Result<String> {
        self.merge_bases
            .get(&(a.to_string(), b.to_string()))
            .or_else(|| self.merge_bases.get(&(b.to_string(), a.to_string())))
            .cloned()
            .ok_or_else(|| ReleaseError::vcs(format!("failed to find merge base of {} and {}", a, b)))
    }

    fn tags_matching(&self, pattern: &str, merged_into: &str) -> Result<Vec<String>> {
        let mut tags: Vec<String> = self
            .tags
            .iter()
            .filter(|(name, target)| target == merged_into && glob_matches(pattern, name))
            .map(|(name, _)| name.clone())
            .collect();
        tags.sort();
        Ok(tags)
    }

    fn resolve_ref_to_commit(&self, reference: &str) -> Result<String> {
        self.refs
            .get(reference)
            .cloned()
            .ok_or_else(|| ReleaseError::not_found(format!("ref '{}'", reference)))
    }

    fn diff_patch(&self) -> Result<String> {
        Ok(self.patch.clone())
    }
}

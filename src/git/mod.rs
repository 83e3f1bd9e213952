//! Git operations abstraction layer
//!
//! This module provides a trait-based abstraction over the Git operations
//! the release train needs in every service repository, allowing for
//! multiple implementations including real Git repositories and mock
//! implementations for testing.
//!
//! # Overview
//!
//! The primary abstraction is the [Repository] trait. The concrete
//! implementations are:
//!
//! - [repository::Git2Repository]: A real implementation using the `git2` crate
//! - [mock::MockRepository]: An in-memory implementation for testing
//!
//! Ref arguments are revspecs (`HEAD`, `origin/release-11`, a tag name or a
//! commit hash). Release branch and tag naming lives in [refs].
//!
//! ```rust
//! # use release_train::git::Repository;
//! # fn example(repo: &dyn Repository) -> release_train::Result<()> {
//! let base = repo.merge_base("origin/release-11", "origin/develop")?;
//! let commits = repo.commits_between(&base, "HEAD")?;
//! # Ok(())
//! # }
//! ```

pub mod mock;
pub mod refs;
pub mod repository;

pub use mock::{CallLog, MockRepository};
pub use repository::Git2Repository;

use crate::error::Result;

/// Commit information for analysis
#[derive(Debug, Clone, PartialEq)]
pub struct CommitInfo {
    /// The full commit hash
    pub hash: String,
    /// The commit message
    pub message: String,
}

/// Version-control capability used by the release train
///
/// ## Thread Safety
///
/// Implementors are `Send`: a repository may move to another thread but is
/// only ever used from one thread at a time. `git2::Repository` is not
/// `Sync`, so neither is [Git2Repository].
///
/// ## Error Handling
///
/// Methods return [crate::error::Result<T>]. Refs that cannot be resolved
/// map to [crate::error::ReleaseError::NotFound]; other failures carry the
/// underlying diagnostic.
pub trait Repository: Send {
    /// Name of the remote used for fetch and push (usually `origin`)
    fn remote_name(&self) -> &str;

    /// True when no tracked file differs from HEAD (untracked files ignored)
    fn is_clean(&self) -> Result<bool>;

    /// One line per changed tracked file, e.g. `modified: pom.xml`
    fn status_lines(&self) -> Result<Vec<String>>;

    /// Discard every change to tracked files
    fn reset_hard(&self) -> Result<()>;

    /// Short name of the checked-out branch, or `HEAD` when detached
    fn current_branch(&self) -> Result<String>;

    /// Check out an existing local branch, creating it from the remote
    /// tracking branch when only that exists
    fn checkout(&self, branch: &str) -> Result<()>;

    /// Create `name` at HEAD and check it out
    fn create_branch(&self, name: &str) -> Result<()>;

    /// Fetch from the remote and fast-forward the current branch
    fn pull(&self) -> Result<()>;

    /// Stage every change in the working tree
    fn add_all(&self) -> Result<()>;

    /// Commit the index on top of HEAD, returning the new HEAD hash
    fn commit(&self, message: &str) -> Result<String>;

    /// Create a lightweight tag at HEAD
    fn tag(&self, name: &str) -> Result<()>;

    /// Push the current branch (forced) and all tags to the remote
    fn push_with_tags(&self) -> Result<()>;

    /// Delete a branch locally and on the remote, under both release naming
    /// conventions. Absence is expected and never reported.
    fn delete_branch_if_exists(&self, name: &str);

    /// Delete a tag locally and on the remote, under both release naming
    /// conventions. Absence is expected and never reported.
    fn delete_tag_if_exists(&self, name: &str);

    /// Whether `<remote>/<branch>` exists
    fn remote_branch_exists(&self, branch: &str) -> Result<bool>;

    /// Commits reachable from `to` but not from `from`, oldest first
    fn commits_between(&self, from: &str, to: &str) -> Result<Vec<CommitInfo>>;

    /// Hash of the best common ancestor of two refs
    fn merge_base(&self, a: &str, b: &str) -> Result<String>;

    /// Tags matching a glob whose commit is reachable from `merged_into`,
    /// sorted by name
    fn tags_matching(&self, pattern: &str, merged_into: &str) -> Result<Vec<String>>;

    /// Hash of the commit a ref points at (tags are peeled)
    fn resolve_ref_to_commit(&self, reference: &str) -> Result<String>;

    /// Unified diff of the working tree and index against HEAD
    fn diff_patch(&self) -> Result<String>;
}

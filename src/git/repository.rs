use crate::error::{ReleaseError, Result};
use crate::git::{refs, CommitInfo};
use git2::build::CheckoutBuilder;
use git2::{
    BranchType, DiffFormat, ErrorCode, IndexAddOption, ObjectType, Oid, RemoteCallbacks,
    Repository as Git2Repo, ResetType, Signature, Sort, Status, StatusOptions,
};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Wrapper around git2::Repository with our trait interface
pub struct Git2Repository {
    repo: Git2Repo,
    remote: String,
    path: PathBuf,
}

impl Git2Repository {
    /// Open the repository whose working directory is `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let repo = Git2Repo::open(path).map_err(|e| {
            ReleaseError::vcs(format!("{} is not a git repository: {}", path.display(), e))
        })?;

        Ok(Git2Repository {
            repo,
            remote: "origin".to_string(),
            path: path.to_path_buf(),
        })
    }

    /// Use a remote other than `origin`
    pub fn with_remote(mut self, remote: impl Into<String>) -> Self {
        self.remote = remote.into();
        self
    }

    /// Create from existing git2::Repository
    pub fn from_git2(repo: Git2Repo) -> Self {
        let path = repo
            .workdir()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| repo.path().to_path_buf());
        Git2Repository {
            repo,
            remote: "origin".to_string(),
            path,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn resolve_oid(&self, reference: &str) -> Result<Oid> {
        let object = self.repo.revparse_single(reference).map_err(|e| {
            if e.code() == ErrorCode::NotFound {
                ReleaseError::not_found(format!("ref '{}' in {}", reference, self.path.display()))
            } else {
                ReleaseError::vcs(format!("cannot resolve '{}': {}", reference, e))
            }
        })?;
        let commit = object
            .peel_to_commit()
            .map_err(|e| ReleaseError::vcs(format!("'{}' is not a commit: {}", reference, e)))?;
        Ok(commit.id())
    }

    fn signature(&self) -> Result<Signature<'static>> {
        match self.repo.signature() {
            Ok(sig) => Ok(sig),
            Err(_) => Ok(Signature::now("release-train", "release-train@localhost")?),
        }
    }

    fn push(&self, refspecs: &[String]) -> Result<()> {
        let mut remote = self.repo.find_remote(&self.remote).map_err(|_| {
            ReleaseError::vcs(format!("No remote named '{}' found", self.remote))
        })?;

        let mut callbacks = self.remote_callbacks()?;
        callbacks.push_update_reference(|refname, status| {
            if let Some(status) = status {
                Err(git2::Error::from_str(&format!(
                    "remote rejected {}: {}",
                    refname, status
                )))
            } else {
                Ok(())
            }
        });

        let mut push_options = git2::PushOptions::new();
        push_options.remote_callbacks(callbacks);

        let specs: Vec<&str> = refspecs.iter().map(String::as_str).collect();
        remote
            .push(&specs, Some(&mut push_options))
            .map_err(|e| match e.class() {
                git2::ErrorClass::Net => {
                    ReleaseError::vcs(format!("Network error during push: {}", e))
                }
                _ => ReleaseError::vcs(format!("push to '{}' failed: {}", self.remote, e)),
            })
    }

    /// Credentials: SSH keys from ~/.ssh, then the SSH agent, then the
    /// configured git credential helper, then libgit2 defaults.
    fn remote_callbacks(&self) -> Result<RemoteCallbacks<'static>> {
        let config = self.repo.config()?;
        let mut callbacks = RemoteCallbacks::new();
        callbacks.credentials(move |url, username_from_url, allowed_types| {
            let username = username_from_url.unwrap_or("git");

            if allowed_types.contains(git2::CredentialType::SSH_KEY) {
                if let Some(home) = dirs::home_dir() {
                    for key in ["id_ed25519", "id_rsa", "id_ecdsa"] {
                        let path = home.join(".ssh").join(key);
                        if path.exists() {
                            if let Ok(cred) = git2::Cred::ssh_key(username, None, &path, None) {
                                return Ok(cred);
                            }
                        }
                    }
                }

                if let Ok(cred) = git2::Cred::ssh_key_from_agent(username) {
                    return Ok(cred);
                }
            }

            if allowed_types.contains(git2::CredentialType::USER_PASS_PLAINTEXT) {
                if let Ok(cred) = git2::Cred::credential_helper(&config, url, username_from_url)
                {
                    return Ok(cred);
                }
            }

            git2::Cred::default()
        });
        Ok(callbacks)
    }

    fn fetch(&self) -> Result<()> {
        let mut remote = self.repo.find_remote(&self.remote).map_err(|_| {
            ReleaseError::vcs(format!("Remote '{}' not found", self.remote))
        })?;

        let mut fetch_options = git2::FetchOptions::new();
        fetch_options.remote_callbacks(self.remote_callbacks()?);

        let refspec_heads = format!("+refs/heads/*:refs/remotes/{}/*", self.remote);
        let refspecs = [refspec_heads.as_str(), "+refs/tags/*:refs/tags/*"];
        remote
            .fetch(&refspecs, Some(&mut fetch_options), None)
            .map_err(|e| {
                ReleaseError::vcs(format!("Failed to fetch from remote '{}': {}", self.remote, e))
            })
    }
}

impl super::Repository for Git2Repository {
    fn remote_name(&self) -> &str {
        &self.remote
    }

    fn is_clean(&self) -> Result<bool> {
        Ok(self.status_lines()?.is_empty())
    }

    fn status_lines(&self) -> Result<Vec<String>> {
        let mut options = StatusOptions::new();
        options.include_untracked(false).include_ignored(false);
        let statuses = self.repo.statuses(Some(&mut options))?;

        let mut lines = Vec::new();
        for entry in statuses.iter() {
            let status = entry.status();
            let label = if status.intersects(Status::INDEX_NEW | Status::WT_NEW) {
                "new file"
            } else if status.intersects(Status::INDEX_DELETED | Status::WT_DELETED) {
                "deleted"
            } else if status.intersects(Status::INDEX_RENAMED | Status::WT_RENAMED) {
                "renamed"
            } else if status.intersects(Status::INDEX_TYPECHANGE | Status::WT_TYPECHANGE) {
                "typechange"
            } else if status.intersects(Status::INDEX_MODIFIED | Status::WT_MODIFIED) {
                "modified"
            } else if status.contains(Status::CONFLICTED) {
                "conflicted"
            } else {
                continue;
            };
            lines.push(format!("{}: {}", label, entry.path().unwrap_or("?")));
        }
        Ok(lines)
    }

    fn reset_hard(&self) -> Result<()> {
        let head = self.repo.head()?.peel_to_commit()?;
        self.repo
            .reset(head.as_object(), ResetType::Hard, None)
            .map_err(|e| ReleaseError::vcs(format!("failed to reset: {}", e)))
    }

    fn current_branch(&self) -> Result<String> {
        let head = self.repo.head()?;
        if head.is_branch() {
            Ok(head.shorthand().unwrap_or("HEAD").to_string())
        } else {
            Ok("HEAD".to_string())
        }
    }

    fn checkout(&self, branch: &str) -> Result<()> {
        let local = match self.repo.find_branch(branch, BranchType::Local) {
            Ok(local) => local,
            Err(e) if e.code() == ErrorCode::NotFound => {
                let tracking = format!("refs/remotes/{}/{}", self.remote, branch);
                let remote_commit = self
                    .repo
                    .find_reference(&tracking)
                    .and_then(|r| r.peel_to_commit())
                    .map_err(|_| {
                        ReleaseError::not_found(format!(
                            "branch '{}' (neither local nor on '{}')",
                            branch, self.remote
                        ))
                    })?;
                let mut created = self.repo.branch(branch, &remote_commit, false)?;
                created.set_upstream(Some(&format!("{}/{}", self.remote, branch)))?;
                created
            }
            Err(e) => return Err(e.into()),
        };

        let reference = local.into_reference();
        let refname = reference
            .name()
            .ok_or_else(|| ReleaseError::vcs(format!("branch '{}' has a non-UTF-8 name", branch)))?
            .to_string();
        let target = reference.peel(ObjectType::Commit)?;

        let mut checkout = CheckoutBuilder::new();
        checkout.safe();
        self.repo
            .checkout_tree(&target, Some(&mut checkout))
            .map_err(|e| ReleaseError::vcs(format!("cannot check out '{}': {}", branch, e)))?;
        self.repo.set_head(&refname)?;
        Ok(())
    }

    fn create_branch(&self, name: &str) -> Result<()> {
        let head = self.repo.head()?.peel_to_commit()?;
        self.repo
            .branch(name, &head, false)
            .map_err(|e| ReleaseError::vcs(format!("cannot create branch '{}': {}", name, e)))?;
        self.repo.set_head(&format!("refs/heads/{}", name))?;
        Ok(())
    }

    fn pull(&self) -> Result<()> {
        self.fetch()?;

        let branch = self.current_branch()?;
        if branch == "HEAD" {
            return Err(ReleaseError::vcs("cannot pull with a detached HEAD"));
        }

        let tracking = format!("refs/remotes/{}/{}", self.remote, branch);
        let remote_oid = match self.repo.find_reference(&tracking) {
            Ok(r) => r.peel_to_commit()?.id(),
            // Remote branch doesn't exist, nothing to update
            Err(_) => return Ok(()),
        };
        let local_oid = self.repo.head()?.peel_to_commit()?.id();

        if local_oid == remote_oid || self.repo.graph_descendant_of(local_oid, remote_oid)? {
            return Ok(());
        }

        if !self.repo.graph_descendant_of(remote_oid, local_oid)? {
            return Err(ReleaseError::vcs(format!(
                "'{}' has diverged from '{}/{}'; cannot fast-forward",
                branch, self.remote, branch
            )));
        }

        let branch_ref_name = format!("refs/heads/{}", branch);
        let mut reference = self.repo.find_reference(&branch_ref_name)?;
        reference.set_target(
            remote_oid,
            &format!("fast-forward from {}/{}", self.remote, branch),
        )?;

        let mut checkout = CheckoutBuilder::new();
        checkout.force();
        self.repo.checkout_head(Some(&mut checkout))?;
        debug!(branch = %branch, to = %remote_oid, "fast-forwarded");
        Ok(())
    }

    fn add_all(&self) -> Result<()> {
        let mut index = self.repo.index()?;
        index.add_all(["*"].iter(), IndexAddOption::DEFAULT, None)?;
        index.update_all(["*"].iter(), None)?;
        index.write()?;
        Ok(())
    }

    fn commit(&self, message: &str) -> Result<String> {
        let mut index = self.repo.index()?;
        let tree_id = index.write_tree()?;
        let parent = self.repo.head()?.peel_to_commit()?;

        if parent.tree_id() == tree_id {
            debug!(path = %self.path.display(), "nothing to commit");
            return Ok(parent.id().to_string());
        }

        let tree = self.repo.find_tree(tree_id)?;
        let signature = self.signature()?;
        let oid = self
            .repo
            .commit(Some("HEAD"), &signature, &signature, message, &tree, &[&parent])?;
        Ok(oid.to_string())
    }

    fn tag(&self, name: &str) -> Result<()> {
        let head = self.repo.head()?.peel_to_commit()?;
        self.repo
            .tag_lightweight(name, head.as_object(), false)
            .map_err(|e| ReleaseError::vcs(format!("Cannot create tag '{}': {}", name, e)))?;
        Ok(())
    }

    fn push_with_tags(&self) -> Result<()> {
        let branch = self.current_branch()?;
        if branch == "HEAD" {
            return Err(ReleaseError::vcs("cannot push a detached HEAD"));
        }

        let mut refspecs = vec![format!("+refs/heads/{0}:refs/heads/{0}", branch)];
        for tag in self.repo.tag_names(None)?.iter().flatten() {
            refspecs.push(format!("refs/tags/{0}:refs/tags/{0}", tag));
        }
        self.push(&refspecs)
    }

    fn delete_branch_if_exists(&self, name: &str) {
        for variant in refs::separator_variants(name) {
            if let Ok(mut branch) = self.repo.find_branch(&variant, BranchType::Local) {
                if let Err(e) = branch.delete() {
                    debug!(branch = %variant, error = %e, "local branch not deleted");
                }
            }

            if let Err(e) = self.push(&[format!(":refs/heads/{}", variant)]) {
                debug!(branch = %variant, error = %e, "remote branch not deleted");
            }

            let tracking = format!("refs/remotes/{}/{}", self.remote, variant);
            if let Ok(mut reference) = self.repo.find_reference(&tracking) {
                let _ = reference.delete();
            }
        }
    }

    fn delete_tag_if_exists(&self, name: &str) {
        for variant in refs::separator_variants(name) {
            if let Err(e) = self.repo.tag_delete(&variant) {
                debug!(tag = %variant, error = %e, "local tag not deleted");
            }

            if let Err(e) = self.push(&[format!(":refs/tags/{}", variant)]) {
                debug!(tag = %variant, error = %e, "remote tag not deleted");
            }
        }
    }

    fn remote_branch_exists(&self, branch: &str) -> Result<bool> {
        let tracking = format!("refs/remotes/{}/{}", self.remote, branch);
        match self.repo.find_reference(&tracking) {
            Ok(_) => Ok(true),
            Err(e) if e.code() == ErrorCode::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn commits_between(&self, from: &str, to: &str) -> Result<Vec<CommitInfo>> {
        let from_oid = self.resolve_oid(from)?;
        let to_oid = self.resolve_oid(to)?;

        let mut revwalk = self.repo.revwalk()?;
        revwalk.set_sorting(Sort::TOPOLOGICAL | Sort::TIME)?;
        revwalk.push(to_oid)?;
        revwalk.hide(from_oid)?;

        let mut commits = Vec::new();
        for oid in revwalk {
            let commit = self.repo.find_commit(oid?)?;
            commits.push(CommitInfo {
                hash: commit.id().to_string(),
                message: commit.message().unwrap_or("(empty message)").to_string(),
            });
        }

        commits.reverse();
        Ok(commits)
    }

    fn merge_base(&self, a: &str, b: &str) -> Result<String> {
        let a_oid = self.resolve_oid(a)?;
        let b_oid = self.resolve_oid(b)?;
        self.repo
            .merge_base(a_oid, b_oid)
            .map(|oid| oid.to_string())
            .map_err(|e| {
                ReleaseError::vcs(format!("failed to find merge base of {} and {}: {}", a, b, e))
            })
    }

    fn tags_matching(&self, pattern: &str, merged_into: &str) -> Result<Vec<String>> {
        let target = self.resolve_oid(merged_into)?;

        let mut merged = Vec::new();
        for name in self.repo.tag_names(Some(pattern))?.iter().flatten() {
            let tag_oid = match self.resolve_oid(&format!("refs/tags/{}", name)) {
                Ok(oid) => oid,
                Err(_) => continue,
            };
            if tag_oid == target || self.repo.graph_descendant_of(target, tag_oid)? {
                merged.push(name.to_string());
            }
        }

        merged.sort();
        Ok(merged)
    }

    fn resolve_ref_to_commit(&self, reference: &str) -> Result<String> {
        Ok(self.resolve_oid(reference)?.to_string())
    }

    fn diff_patch(&self) -> Result<String> {
        let head_tree = self.repo.head()?.peel_to_tree()?;
        let diff = self
            .repo
            .diff_tree_to_workdir_with_index(Some(&head_tree), None)?;

        let mut patch = String::new();
        diff.print(DiffFormat::Patch, |_delta, _hunk, line| {
            if matches!(line.origin(), '+' | '-' | ' ') {
                patch.push(line.origin());
            }
            patch.push_str(&String::from_utf8_lossy(line.content()));
            true
        })?;
        Ok(patch)
    }
}

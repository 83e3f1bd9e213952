//! Release workflow orchestration
//!
//! The phases of a release train, run in order over every service:
//! clean check, trunk sync, version bump, release branch, release notes,
//! review, commit and tag, build, push, pipelines. Each phase finishes for
//! all services before the next one starts, so a failure leaves every
//! repository at the same phase boundary.

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};

use crate::config::Config;
use crate::descriptor::{self, DescriptorRewrite};
use crate::domain::{ReleaseVersion, Service};
use crate::error::ReleaseError;
use crate::git::{refs, Git2Repository, Repository};
use crate::maven::{self, MavenBuild};
use crate::notes::{self, SynthesisReport};
use crate::pipeline::{CiClient, DispatchReport, PipelineDispatcher};
use crate::ui;
use crate::warning::ReleaseWarning;

/// Arguments for the release workflow
///
/// Mirrors the CLI flags in a form that does not depend on clap.
#[derive(Debug, Clone, PartialEq)]
pub struct ReleaseArgs {
    pub version: ReleaseVersion,
    /// Never prompt; a dirty working copy aborts instead of being reset
    pub assume_yes: bool,
    pub skip_build: bool,
    pub skip_pipelines: bool,
    /// Stop after tagging; nothing leaves the machine
    pub no_push: bool,
}

impl ReleaseArgs {
    pub fn new(version: ReleaseVersion) -> Self {
        ReleaseArgs {
            version,
            assume_yes: false,
            skip_build: false,
            skip_pipelines: false,
            no_push: false,
        }
    }

    /// Whether the pipeline phase will run
    pub fn dispatches(&self) -> bool {
        !self.skip_pipelines && !self.no_push
    }
}

/// A service together with its working copy
pub struct Member {
    pub service: Service,
    pub repo: Box<dyn Repository>,
}

/// Descriptor rewrites of one service
#[derive(Debug, Clone)]
pub struct ServiceBump {
    pub service: String,
    pub rewrites: Vec<DescriptorRewrite>,
}

impl ServiceBump {
    pub fn changed(&self) -> usize {
        self.rewrites.iter().filter(|r| r.is_changed()).count()
    }
}

/// Result of a successful release workflow
#[derive(Debug)]
pub struct ReleaseOutcome {
    pub bumps: Vec<ServiceBump>,
    pub notes: SynthesisReport,
    pub dispatch: Option<DispatchReport>,
    pub warnings: Vec<ReleaseWarning>,
}

/// The configured fleet, opened for a run
pub struct Train {
    config: Config,
    workspace: PathBuf,
    members: Vec<Member>,
}

impl Train {
    /// Validate the configuration and open every service's repository
    pub fn open(config: Config, workspace: &Path) -> Result<Self> {
        config.validate()?;

        let mut members = Vec::new();
        for service in config.services(workspace) {
            let repo = Git2Repository::open(&service.directory)
                .map_err(|e| e.for_service(&service.name))?
                .with_remote(config.train.remote.clone());
            members.push(Member {
                service,
                repo: Box::new(repo),
            });
        }

        Ok(Train {
            config,
            workspace: workspace.to_path_buf(),
            members,
        })
    }

    /// Assemble a train from already opened repositories
    pub fn with_members(config: Config, workspace: &Path, members: Vec<Member>) -> Self {
        Train {
            config,
            workspace: workspace.to_path_buf(),
            members,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    /// Make sure no working copy has uncommitted changes to tracked files.
    ///
    /// Interactively, each dirty service can be reset to HEAD; declining
    /// aborts. With `assume_yes` a dirty working copy aborts right away.
    pub fn check_clean(&self, assume_yes: bool) -> Result<Vec<ReleaseWarning>> {
        let mut warnings = Vec::new();

        for member in &self.members {
            let name = &member.service.name;
            let dirty = member
                .repo
                .status_lines()
                .map_err(|e| e.for_service(name))?;
            if dirty.is_empty() {
                continue;
            }

            ui::display_status(&format!("{} has uncommitted changes:", name));
            for line in &dirty {
                println!("    {}", line);
            }

            if assume_yes {
                bail!(ReleaseError::validation("working copy has uncommitted changes").for_service(name));
            }
            if !ui::confirm_action(&format!("Discard these changes in {} (git reset --hard)?", name))? {
                bail!("aborted: {} has uncommitted changes", name);
            }

            member.repo.reset_hard().map_err(|e| e.for_service(name))?;
            warnings.push(ReleaseWarning::DirtyWorkingCopy {
                service: name.clone(),
                files: dirty.len(),
            });
        }

        Ok(warnings)
    }

    /// Check out the trunk branch and fast-forward it from the remote
    pub fn sync_trunk(&self) -> Result<()> {
        let trunk = &self.config.train.trunk_branch;
        for member in &self.members {
            let name = &member.service.name;
            member.repo.checkout(trunk).map_err(|e| e.for_service(name))?;
            member.repo.pull().map_err(|e| e.for_service(name))?;
            ui::display_success(&format!("{}: {} is up to date", name, trunk));
        }
        Ok(())
    }

    /// Rewrite every descriptor of every service to `version`
    pub fn bump(&self, version: ReleaseVersion) -> Result<Vec<ServiceBump>> {
        let pattern = self.config.train.property_pattern.as_deref();
        let mut bumps = Vec::new();

        for member in &self.members {
            let service = &member.service;
            let rewrites = descriptor::propagate(&service.directory, version, pattern)
                .map_err(|e| e.for_service(&service.name))?;
            let bump = ServiceBump {
                service: service.name.clone(),
                rewrites,
            };
            ui::display_success(&format!(
                "{}: {} of {} descriptor(s) set to {}",
                service.name,
                bump.changed(),
                bump.rewrites.len(),
                version.normalized()
            ));
            bumps.push(bump);
        }
        Ok(bumps)
    }

    /// Recreate the release branch at HEAD in every repository
    pub fn cut_release_branch(&self, version: ReleaseVersion) -> Result<()> {
        let branch = refs::lineage_branch(version);
        for member in &self.members {
            member.repo.delete_branch_if_exists(&branch);
            member
                .repo
                .create_branch(&branch)
                .map_err(|e| e.for_service(&member.service.name))?;
        }
        ui::display_success(&format!("Branch {} created", branch));
        Ok(())
    }

    pub fn write_notes(&self, version: ReleaseVersion) -> Result<SynthesisReport> {
        let services: Vec<(&str, &dyn Repository)> = self
            .members
            .iter()
            .map(|m| (m.service.name.as_str(), m.repo.as_ref()))
            .collect();
        let request = self.config.notes_request(version, &self.workspace);
        Ok(notes::synthesize(&services, &request)?)
    }

    /// Show every pending diff and wait for the user to continue
    pub fn review(&self, assume_yes: bool) -> Result<()> {
        for member in &self.members {
            let patch = member
                .repo
                .diff_patch()
                .map_err(|e| e.for_service(&member.service.name))?;
            ui::display_diff(&member.service.name, &patch);
        }
        if !assume_yes {
            ui::wait_for_enter("Review the changes above, then press Enter to commit and tag...")?;
        }
        Ok(())
    }

    /// Commit the bump where anything changed and tag every repository
    pub fn commit_and_tag(
        &self,
        version: ReleaseVersion,
        bumps: &[ServiceBump],
    ) -> Result<Vec<ReleaseWarning>> {
        let message = format!("Up to version {}", version.normalized());
        let tag = refs::release_tag(version);
        let mut warnings = Vec::new();

        for member in &self.members {
            let name = &member.service.name;
            let changed = bumps
                .iter()
                .find(|b| &b.service == name)
                .map_or(0, ServiceBump::changed);

            if changed > 0 {
                member.repo.add_all().map_err(|e| e.for_service(name))?;
                member.repo.commit(&message).map_err(|e| e.for_service(name))?;
            } else {
                warnings.push(ReleaseWarning::NothingToCommit {
                    service: name.clone(),
                });
            }

            member.repo.delete_tag_if_exists(&tag);
            member.repo.tag(&tag).map_err(|e| e.for_service(name))?;
        }

        ui::display_success(&format!("Tagged {}", tag));
        Ok(warnings)
    }

    /// Clean the configured cache paths, then build every service
    pub fn build(&self) -> Result<()> {
        for path in &self.config.build.clean_cache {
            if maven::clean_cache(path)? {
                ui::display_status(&format!("Removed {} from the local Maven repository", path));
            }
        }

        let maven = MavenBuild::new(self.config.build.skip_tests);
        for member in &self.members {
            ui::display_status(&format!("Building {}", member.service.name));
            maven.build_service(&member.service)?;
            ui::display_success(&format!("{} built", member.service.name));
        }
        Ok(())
    }

    pub fn push(&self) -> Result<()> {
        for member in &self.members {
            member
                .repo
                .push_with_tags()
                .map_err(|e| e.for_service(&member.service.name))?;
            ui::display_success(&format!("{} pushed", member.service.name));
        }
        Ok(())
    }

    /// Run the pipelines of every service on `git_ref`
    pub fn dispatch(&self, client: &dyn CiClient, git_ref: &str) -> Result<DispatchReport> {
        let services: Vec<Service> = self.members.iter().map(|m| m.service.clone()).collect();
        let plan = crate::pipeline::DispatchPlan::from_services(&services);
        let options = self.config.dispatch_options(git_ref);
        let progress = ui::ConsoleProgress;

        Ok(PipelineDispatcher::new(client)
            .with_observer(&progress)
            .dispatch(&plan, &options)?)
    }
}

fn report_warnings(warnings: &[ReleaseWarning]) {
    for warning in warnings {
        ui::display_warning(warning);
    }
}

/// Full release workflow
///
/// `ci` is required unless pipelines are skipped.
pub fn run_release(train: &Train, args: &ReleaseArgs, ci: Option<&dyn CiClient>) -> Result<ReleaseOutcome> {
    let version = args.version;
    if args.dispatches() && ci.is_none() {
        bail!("no CI client available for the pipeline phase");
    }
    let mut warnings = Vec::new();

    ui::display_phase("Checking working copies");
    let found = train.check_clean(args.assume_yes)?;
    report_warnings(&found);
    warnings.extend(found);

    ui::display_phase(&format!("Updating {}", train.config.train.trunk_branch));
    train.sync_trunk()?;

    ui::display_phase(&format!("Setting version {}", version.normalized()));
    let bumps = train.bump(version)?;

    ui::display_phase("Creating release branch");
    train.cut_release_branch(version)?;

    ui::display_phase("Writing release notes");
    let notes = train.write_notes(version)?;
    report_warnings(&notes.warnings);
    ui::display_notes_summary(&notes);

    ui::display_phase("Review");
    train.review(args.assume_yes)?;

    ui::display_phase("Committing and tagging");
    let found = train.commit_and_tag(version, &bumps)?;
    report_warnings(&found);
    warnings.extend(found);

    if args.skip_build || !train.config.build.enabled {
        ui::display_status("Build skipped");
    } else {
        ui::display_phase("Building");
        train.build()?;
    }

    if args.no_push {
        ui::display_status("Push skipped; to publish later run:");
        for member in train.members() {
            ui::display_manual_push_instruction(
                &member.service.name,
                &member.service.directory.display().to_string(),
                member.repo.remote_name(),
            );
        }
    } else {
        ui::display_phase("Pushing");
        train.push()?;
    }

    let dispatch = match ci {
        Some(client) if args.dispatches() => {
            let tag = refs::release_tag(version);
            ui::display_phase(&format!("Running pipelines on {}", tag));
            let report = train.dispatch(client, &tag)?;
            ui::display_dispatch_summary(&report);
            Some(report)
        }
        _ => {
            ui::display_status("Pipelines skipped");
            None
        }
    };

    Ok(ReleaseOutcome {
        bumps,
        notes,
        dispatch,
        warnings,
    })
}

/// Version bump only
pub fn run_bump(train: &Train, version: ReleaseVersion) -> Result<Vec<ServiceBump>> {
    ui::display_phase(&format!("Setting version {}", version.normalized()));
    train.bump(version)
}

/// Release notes only, against the current HEAD of every service
pub fn run_notes(train: &Train, version: ReleaseVersion) -> Result<SynthesisReport> {
    ui::display_phase("Writing release notes");
    let report = train.write_notes(version)?;
    report_warnings(&report.warnings);
    ui::display_notes_summary(&report);
    Ok(report)
}

/// Pipelines only
pub fn run_dispatch(train: &Train, client: &dyn CiClient, git_ref: &str) -> Result<DispatchReport> {
    ui::display_phase(&format!("Running pipelines on {}", git_ref));
    let report = train.dispatch(client, git_ref)?;
    ui::display_dispatch_summary(&report);
    Ok(report)
}

//! Command-line interface.

pub mod orchestration;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::config;
use crate::domain::ReleaseVersion;
use crate::pipeline::{CiClient, GitLabClient};
use crate::telemetry;
use crate::ui;
use orchestration::{ReleaseArgs, Train};

#[derive(Parser, Debug)]
#[command(
    name = "release-train",
    version,
    about = "Bump, tag, document and ship a fleet of Maven services as one release train"
)]
pub struct Cli {
    #[arg(short, long, global = true, help = "Custom configuration file path")]
    pub config: Option<PathBuf>,

    #[arg(
        short,
        long,
        global = true,
        default_value = ".",
        help = "Directory service paths are relative to"
    )]
    pub workspace: PathBuf,

    #[arg(short, long, global = true, help = "Log diagnostics (overridden by RUST_LOG)")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the whole train: bump, branch, notes, commit, tag, build, push, pipelines
    Release {
        /// Release number, e.g. 12
        version: ReleaseVersion,

        #[arg(short, long, help = "Skip prompts; abort on uncommitted changes")]
        yes: bool,

        #[arg(long, help = "Do not run Maven")]
        skip_build: bool,

        #[arg(long, help = "Do not trigger CI pipelines")]
        skip_pipelines: bool,

        #[arg(long, help = "Commit and tag locally without pushing (implies --skip-pipelines)")]
        no_push: bool,
    },
    /// Only rewrite descriptor versions
    Bump { version: ReleaseVersion },
    /// Only write the release notes file
    Notes { version: ReleaseVersion },
    /// Only run the CI pipelines on a branch or tag
    Dispatch {
        #[arg(value_name = "REF")]
        git_ref: String,
    },
}

/// Execute a parsed command line
pub fn run(cli: Cli) -> Result<()> {
    telemetry::init_tracing(cli.verbose);

    let config = config::load_config(cli.config.as_deref())?;
    let train = Train::open(config, &cli.workspace)?;

    match cli.command {
        Command::Release {
            version,
            yes,
            skip_build,
            skip_pipelines,
            no_push,
        } => {
            let args = ReleaseArgs {
                version,
                assume_yes: yes,
                skip_build,
                skip_pipelines,
                no_push,
            };
            // Fail on a missing token before touching any repository
            let client = if args.dispatches() {
                Some(GitLabClient::from_config(&train.config().gitlab)?)
            } else {
                None
            };
            let outcome = orchestration::run_release(
                &train,
                &args,
                client.as_ref().map(|c| c as &dyn CiClient),
            )?;
            ui::display_success(&format!(
                "Release {} done ({} warning(s))",
                version.normalized(),
                outcome.warnings.len() + outcome.notes.warnings.len()
            ));
        }
        Command::Bump { version } => {
            orchestration::run_bump(&train, version)?;
        }
        Command::Notes { version } => {
            orchestration::run_notes(&train, version)?;
        }
        Command::Dispatch { git_ref } => {
            let client = GitLabClient::from_config(&train.config().gitlab)?;
            orchestration::run_dispatch(&train, &client, &git_ref)?;
        }
    }

    Ok(())
}

use crate::domain::{ConcurrencyClass, ReleaseVersion, Service, TaskPolicy};
use crate::error::{ReleaseError, Result};
use crate::notes::NotesRequest;
use crate::pipeline::{DispatchOptions, DispatchPlan, Variable};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File name looked up in the current directory
pub const LOCAL_CONFIG_FILE: &str = "releasetrain.toml";
/// File name looked up in the user config directory
pub const USER_CONFIG_FILE: &str = ".releasetrain.toml";

/// Represents the complete configuration of a release train.
///
/// Services are listed either under `[[sequential]]` or under a named
/// group (`[[groups.<name>]]`); a service belongs to exactly one of them.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub train: TrainConfig,

    #[serde(default)]
    pub build: BuildConfig,

    #[serde(default)]
    pub gitlab: GitLabConfig,

    #[serde(default)]
    pub sequential: Vec<ServiceConfig>,

    #[serde(default)]
    pub groups: BTreeMap<String, Vec<ServiceConfig>>,
}

fn default_trunk_branch() -> String {
    "develop".to_string()
}

fn default_remote() -> String {
    "origin".to_string()
}

fn default_notes_dir() -> PathBuf {
    PathBuf::from(".")
}

/// Branching, version propagation and release notes settings.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct TrainConfig {
    #[serde(default = "default_trunk_branch")]
    pub trunk_branch: String,

    #[serde(default = "default_remote")]
    pub remote: String,

    /// Properties whose tag name contains this text get the release version
    #[serde(default)]
    pub property_pattern: Option<String>,

    #[serde(default)]
    pub task_url_prefix: String,

    /// Directory of the release notes file, relative to the workspace
    #[serde(default = "default_notes_dir")]
    pub notes_dir: PathBuf,

    #[serde(default)]
    pub task_policy: TaskPolicy,
}

impl Default for TrainConfig {
    fn default() -> Self {
        TrainConfig {
            trunk_branch: default_trunk_branch(),
            remote: default_remote(),
            property_pattern: None,
            task_url_prefix: String::new(),
            notes_dir: default_notes_dir(),
            task_policy: TaskPolicy::default(),
        }
    }
}

fn default_true() -> bool {
    true
}

/// Maven build settings.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct BuildConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_true")]
    pub skip_tests: bool,

    /// Paths under the local Maven repository removed before building
    #[serde(default)]
    pub clean_cache: Vec<String>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        BuildConfig {
            enabled: true,
            skip_tests: true,
            clean_cache: Vec::new(),
        }
    }
}

fn default_poll_interval_secs() -> u64 {
    30
}

fn default_timeout_secs() -> u64 {
    60 * 60
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_variables() -> BTreeMap<String, String> {
    let mut variables = BTreeMap::new();
    variables.insert("CI_PIPELINE_SOURCE".to_string(), "web".to_string());
    variables
}

/// GitLab connection and pipeline settings.
///
/// The access token is never read from the file, only from `GITLAB_TOKEN`.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct GitLabConfig {
    #[serde(default)]
    pub uri: Option<String>,

    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_variables")]
    pub variables: BTreeMap<String, String>,

    #[serde(default)]
    pub override_variable: Option<Variable>,
}

impl Default for GitLabConfig {
    fn default() -> Self {
        GitLabConfig {
            uri: None,
            poll_interval_secs: default_poll_interval_secs(),
            timeout_secs: default_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            variables: default_variables(),
            override_variable: None,
        }
    }
}

/// One service entry.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ServiceConfig {
    pub name: String,

    /// Working copy, relative to the workspace; defaults to `name`
    #[serde(default)]
    pub directory: Option<PathBuf>,

    pub gitlab_project: String,

    /// Modules built and installed before the service
    #[serde(default)]
    pub prebuild: Vec<String>,
}

impl ServiceConfig {
    fn to_service(&self, workspace: &Path, class: ConcurrencyClass) -> Service {
        let directory = match &self.directory {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => workspace.join(dir),
            None => workspace.join(&self.name),
        };
        let mut service = Service::new(&self.name, directory, &self.gitlab_project, class);
        service.prebuild = self.prebuild.clone();
        service
    }
}

impl Config {
    /// Entries in processing order: sequential ones, then groups by name
    fn entries(&self) -> impl Iterator<Item = (&ServiceConfig, ConcurrencyClass)> {
        let sequential = self
            .sequential
            .iter()
            .map(|entry| (entry, ConcurrencyClass::Sequential));
        let grouped = self.groups.iter().flat_map(|(group, entries)| {
            entries
                .iter()
                .map(move |entry| (entry, ConcurrencyClass::Group(group.clone())))
        });
        sequential.chain(grouped)
    }

    /// Check the service list and the numeric settings
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        let mut count = 0;

        for (entry, class) in self.entries() {
            count += 1;
            if entry.name.trim().is_empty() {
                return Err(ReleaseError::config(format!(
                    "a {} service has an empty name",
                    class
                )));
            }
            if !seen.insert(entry.name.as_str()) {
                return Err(ReleaseError::config(format!(
                    "service '{}' is listed more than once",
                    entry.name
                )));
            }
            if entry.gitlab_project.trim().is_empty() {
                return Err(ReleaseError::config(format!(
                    "service '{}' has an empty gitlab_project",
                    entry.name
                )));
            }
        }

        if count == 0 {
            return Err(ReleaseError::config(
                "no services configured (add [[sequential]] or [[groups.<name>]] entries)",
            ));
        }
        if self.gitlab.poll_interval_secs == 0 || self.gitlab.timeout_secs == 0 {
            return Err(ReleaseError::config(
                "[gitlab] poll_interval_secs and timeout_secs must be positive",
            ));
        }
        Ok(())
    }

    /// Services with directories resolved against `workspace`
    pub fn services(&self, workspace: &Path) -> Vec<Service> {
        self.entries()
            .map(|(entry, class)| entry.to_service(workspace, class))
            .collect()
    }

    pub fn dispatch_plan(&self, workspace: &Path) -> DispatchPlan {
        DispatchPlan::from_services(&self.services(workspace))
    }

    pub fn dispatch_options(&self, git_ref: impl Into<String>) -> DispatchOptions {
        DispatchOptions {
            git_ref: git_ref.into(),
            variables: self
                .gitlab
                .variables
                .iter()
                .map(|(key, value)| Variable::new(key, value))
                .collect(),
            override_variable: self.gitlab.override_variable.clone(),
            poll_interval: Duration::from_secs(self.gitlab.poll_interval_secs),
            timeout: Duration::from_secs(self.gitlab.timeout_secs),
        }
    }

    pub fn notes_request(&self, version: ReleaseVersion, workspace: &Path) -> NotesRequest {
        let out_dir = if self.train.notes_dir.is_absolute() {
            self.train.notes_dir.clone()
        } else {
            workspace.join(&self.train.notes_dir)
        };
        NotesRequest {
            version,
            trunk_branch: self.train.trunk_branch.clone(),
            url_prefix: self.train.task_url_prefix.clone(),
            policy: self.train.task_policy,
            out_dir,
        }
    }
}

/// Parse configuration text
pub fn parse_config(text: &str) -> Result<Config> {
    toml::from_str(text).map_err(|e| ReleaseError::config(e.to_string()))
}

/// Loads configuration from file or returns defaults.
///
/// Attempts to load configuration in the following order:
/// 1. Custom path provided as parameter
/// 2. `releasetrain.toml` in current directory
/// 3. `.releasetrain.toml` in user config directory
/// 4. Default configuration if no file found
///
/// The result is not validated; see [Config::validate].
pub fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let path = if let Some(path) = config_path {
        path.to_path_buf()
    } else if Path::new(LOCAL_CONFIG_FILE).exists() {
        PathBuf::from(LOCAL_CONFIG_FILE)
    } else if let Some(user_path) = dirs::config_dir()
        .map(|dir| dir.join(USER_CONFIG_FILE))
        .filter(|p| p.exists())
    {
        user_path
    } else {
        return Ok(Config::default());
    };

    let text = fs::read_to_string(&path).map_err(|e| {
        ReleaseError::config(format!("cannot read {}: {}", path.display(), e))
    })?;
    parse_config(&text).map_err(|e| match e {
        ReleaseError::Config(msg) => {
            ReleaseError::config(format!("{}: {}", path.display(), msg))
        }
        other => other,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, project: &str) -> ServiceConfig {
        ServiceConfig {
            name: name.to_string(),
            directory: None,
            gitlab_project: project.to_string(),
            prebuild: Vec::new(),
        }
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.train.trunk_branch, "develop");
        assert_eq!(config.train.remote, "origin");
        assert_eq!(config.train.task_policy, TaskPolicy::Anchored);
        assert!(config.build.enabled);
        assert!(config.build.skip_tests);
        assert_eq!(config.gitlab.poll_interval_secs, 30);
        assert_eq!(config.gitlab.timeout_secs, 3600);
        assert_eq!(
            config.gitlab.variables.get("CI_PIPELINE_SOURCE").map(String::as_str),
            Some("web")
        );
    }

    #[test]
    fn test_duplicate_across_classes_is_rejected() {
        let mut config = Config::default();
        config.sequential.push(entry("billing", "backend/billing"));
        config
            .groups
            .insert("g1".to_string(), vec![entry("billing", "backend/billing-2")]);

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_empty_project_is_rejected() {
        let mut config = Config::default();
        config.sequential.push(entry("billing", " "));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_no_services_is_rejected() {
        assert!(Config::default().validate().is_err());
    }

    #[test]
    fn test_services_order_and_directories() {
        let mut config = Config::default();
        config
            .groups
            .insert("b".to_string(), vec![entry("orders", "backend/orders")]);
        config
            .groups
            .insert("a".to_string(), vec![entry("billing", "backend/billing")]);
        let mut bom = entry("bom", "backend/platform-bom");
        bom.directory = Some(PathBuf::from("platform-bom"));
        config.sequential.push(bom);

        let services = config.services(Path::new("/ws"));
        let names: Vec<_> = services.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["bom", "billing", "orders"]);
        assert_eq!(services[0].directory, PathBuf::from("/ws/platform-bom"));
        assert_eq!(services[1].directory, PathBuf::from("/ws/billing"));
        assert_eq!(services[1].class, ConcurrencyClass::Group("a".to_string()));
    }

    #[test]
    fn test_dispatch_options_from_gitlab_section() {
        let mut config = Config::default();
        config.gitlab.poll_interval_secs = 5;
        config.gitlab.override_variable = Some(Variable::new("HELM_NAMESPACE", "release"));

        let options = config.dispatch_options("release-12.0");
        assert_eq!(options.git_ref, "release-12.0");
        assert_eq!(options.poll_interval, Duration::from_secs(5));
        assert_eq!(options.variables, vec![Variable::new("CI_PIPELINE_SOURCE", "web")]);
        assert!(options.override_variable.is_some());
    }

    #[test]
    fn test_parse_error_is_config_error() {
        let err = parse_config("[train\n").unwrap_err();
        assert!(matches!(err, ReleaseError::Config(_)));
    }
}

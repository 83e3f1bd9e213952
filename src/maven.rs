use crate::domain::Service;
use crate::error::{ReleaseError, Result};
use std::path::{Component, Path, PathBuf};
use std::process::Command;
use std::{env, fs};
use tracing::{debug, info};

/// Lines of build stderr kept in a `Build` error
const STDERR_TAIL_LINES: usize = 20;

/// Runs `mvn clean install` for services and their prebuilt modules
#[derive(Debug, Clone)]
pub struct MavenBuild {
    executable: String,
    skip_tests: bool,
}

impl MavenBuild {
    pub fn new(skip_tests: bool) -> Self {
        MavenBuild {
            executable: "mvn".to_string(),
            skip_tests,
        }
    }

    /// Use another executable instead of `mvn` found on `PATH`
    pub fn with_executable(mut self, executable: impl Into<String>) -> Self {
        self.executable = executable.into();
        self
    }

    fn args(&self) -> Vec<&'static str> {
        let mut args = vec!["clean", "install"];
        if self.skip_tests {
            args.push("-DskipTests=true");
        }
        args
    }

    /// Build and install the project in `dir`.
    ///
    /// Output is captured. On a non-zero exit the tail of stderr is part of
    /// the returned [ReleaseError::Build].
    pub fn build_and_install(&self, dir: &Path) -> Result<()> {
        if !dir.is_dir() {
            return Err(ReleaseError::build(format!(
                "{} is not a directory",
                dir.display()
            )));
        }

        let args = self.args();
        debug!(dir = %dir.display(), "{} {}", self.executable, args.join(" "));

        let output = Command::new(&self.executable)
            .args(&args)
            .current_dir(dir)
            .output()
            .map_err(|e| {
                ReleaseError::build(format!("failed to run {}: {}", self.executable, e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let lines: Vec<&str> = stderr.lines().collect();
            let tail = lines[lines.len().saturating_sub(STDERR_TAIL_LINES)..].join("\n");
            return Err(ReleaseError::build(format!(
                "{} {} in {} exited with code {}\n{}",
                self.executable,
                args.join(" "),
                dir.display(),
                output.status.code().unwrap_or(-1),
                tail
            )));
        }

        Ok(())
    }

    /// Build the service's prebuild modules in order, then the service root
    pub fn build_service(&self, service: &Service) -> Result<()> {
        for module in &service.prebuild {
            let module_dir = service.directory.join(module);
            if !module_dir.is_dir() {
                return Err(ReleaseError::build(format!(
                    "prebuild module '{}' not found in {}",
                    module,
                    service.directory.display()
                ))
                .for_service(&service.name));
            }
            info!(service = %service.name, module = %module, "building prebuild module");
            self.build_and_install(&module_dir)
                .map_err(|e| e.for_service(&service.name))?;
        }

        info!(service = %service.name, "building");
        self.build_and_install(&service.directory)
            .map_err(|e| e.for_service(&service.name))
    }
}

/// Location of the local Maven repository.
///
/// `M2_REPO` wins, then `<home>/.m2/repository`, then
/// `%USERPROFILE%/.m2/repository`.
pub fn local_repository() -> Option<PathBuf> {
    if let Some(repo) = env::var_os("M2_REPO").filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(repo));
    }
    if let Some(home) = dirs::home_dir() {
        return Some(home.join(".m2").join("repository"));
    }
    env::var_os("USERPROFILE")
        .filter(|v| !v.is_empty())
        .map(|profile| PathBuf::from(profile).join(".m2").join("repository"))
}

/// Remove `relative` (e.g. `com/example/platform`) from the local Maven
/// repository. Returns whether anything was removed.
pub fn clean_cache(relative: &str) -> Result<bool> {
    let relative_path = Path::new(relative);
    let escapes = relative_path
        .components()
        .any(|c| !matches!(c, Component::Normal(_)));
    if relative.is_empty() || escapes {
        return Err(ReleaseError::config(format!(
            "cache path '{}' must be relative to the local Maven repository",
            relative
        )));
    }

    let repo = local_repository()
        .ok_or_else(|| ReleaseError::config("cannot determine the local Maven repository"))?;
    let target = repo.join(relative_path);

    if !target.exists() {
        debug!(path = %target.display(), "maven cache path absent");
        return Ok(false);
    }

    fs::remove_dir_all(&target)?;
    info!(path = %target.display(), "maven cache cleaned");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_args_follow_skip_tests() {
        assert_eq!(
            MavenBuild::new(true).args(),
            vec!["clean", "install", "-DskipTests=true"]
        );
        assert_eq!(MavenBuild::new(false).args(), vec!["clean", "install"]);
    }

    #[test]
    fn test_missing_executable_is_build_error() {
        let dir = TempDir::new().unwrap();
        let build = MavenBuild::new(true).with_executable("definitely-not-mvn-4711");
        let err = build.build_and_install(dir.path()).unwrap_err();
        assert!(matches!(err, ReleaseError::Build(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_exit_status_decides_success() {
        let dir = TempDir::new().unwrap();
        assert!(MavenBuild::new(true)
            .with_executable("true")
            .build_and_install(dir.path())
            .is_ok());

        let err = MavenBuild::new(true)
            .with_executable("false")
            .build_and_install(dir.path())
            .unwrap_err();
        assert!(err.to_string().contains("exited with code 1"));
    }

    #[cfg(unix)]
    #[test]
    fn test_missing_prebuild_module_names_service() {
        use crate::domain::ConcurrencyClass;

        let dir = TempDir::new().unwrap();
        let mut service = Service::new(
            "billing",
            dir.path(),
            "backend/billing",
            ConcurrencyClass::Sequential,
        );
        service.prebuild = vec!["billing-schema".to_string()];

        let err = MavenBuild::new(true)
            .with_executable("true")
            .build_service(&service)
            .unwrap_err();
        assert!(err.to_string().starts_with("billing:"));
        assert!(err.to_string().contains("billing-schema"));
    }

    #[test]
    #[serial]
    fn test_local_repository_prefers_m2_repo() {
        let dir = TempDir::new().unwrap();
        env::set_var("M2_REPO", dir.path());
        assert_eq!(local_repository(), Some(dir.path().to_path_buf()));
        env::remove_var("M2_REPO");
    }

    #[test]
    #[serial]
    fn test_clean_cache_removes_subtree() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("com/example/platform/1.0");
        fs::create_dir_all(&target).unwrap();
        env::set_var("M2_REPO", dir.path());

        assert!(clean_cache("com/example/platform").unwrap());
        assert!(!dir.path().join("com/example/platform").exists());
        assert!(dir.path().join("com/example").exists());
        assert!(!clean_cache("com/example/platform").unwrap());

        env::remove_var("M2_REPO");
    }

    #[test]
    fn test_clean_cache_rejects_escaping_paths() {
        assert!(clean_cache("../outside").is_err());
        assert!(clean_cache("/etc").is_err());
        assert!(clean_cache("").is_err());
    }
}

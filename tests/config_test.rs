// tests/config_test.rs
use release_train::config::{load_config, parse_config, Config};
use release_train::domain::{ConcurrencyClass, TaskPolicy};
use release_train::pipeline::Variable;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;

const FIXTURE: &str = "tests/fixtures/releasetrain.toml";

#[test]
fn test_load_from_fixture() {
    let config = load_config(Some(Path::new(FIXTURE))).expect("Failed to load test config");

    assert_eq!(config.train.property_pattern.as_deref(), Some("proezd"));
    assert_eq!(config.train.task_policy, TaskPolicy::Any);
    assert_eq!(config.train.notes_dir, PathBuf::from("notes"));
    assert!(!config.build.skip_tests);
    assert!(config.build.enabled, "enabled keeps its default");
    assert_eq!(config.build.clean_cache, vec!["com/example/platform"]);
    assert_eq!(
        config.gitlab.override_variable,
        Some(Variable::new("HELM_NAMESPACE", "release"))
    );
    assert_eq!(config.gitlab.request_timeout_secs, 30);
    config.validate().expect("fixture is valid");
}

#[test]
fn test_fixture_services_and_plan() {
    let config = load_config(Some(Path::new(FIXTURE))).unwrap();
    let workspace = Path::new("/srv/train");

    let services = config.services(workspace);
    let names: Vec<&str> = services.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["platform-bom", "gateway", "billing", "orders", "portal"]
    );
    assert_eq!(services[0].directory, workspace.join("platform/bom"));
    assert_eq!(services[1].directory, workspace.join("gateway"));
    assert_eq!(services[2].prebuild, vec!["billing-schema"]);
    assert_eq!(
        services[4].class,
        ConcurrencyClass::Group("frontend".to_string())
    );

    let plan = config.dispatch_plan(workspace);
    assert_eq!(plan.sequential.len(), 2);
    let groups: Vec<&String> = plan.groups.keys().collect();
    assert_eq!(groups, vec!["backend", "frontend"]);
}

#[test]
fn test_fixture_dispatch_options() {
    let config = load_config(Some(Path::new(FIXTURE))).unwrap();
    let options = config.dispatch_options("release-12.0");

    assert_eq!(options.poll_interval, Duration::from_secs(10));
    assert_eq!(options.timeout, Duration::from_secs(1800));
    assert_eq!(
        options.variables,
        vec![
            Variable::new("CI_PIPELINE_SOURCE", "web"),
            Variable::new("DEPLOY", "true")
        ]
    );
}

#[test]
fn test_notes_request_resolves_against_workspace() {
    let config = load_config(Some(Path::new(FIXTURE))).unwrap();
    let version = "12".parse().unwrap();
    let request = config.notes_request(version, Path::new("/srv/train"));

    assert_eq!(request.out_dir, PathBuf::from("/srv/train/notes"));
    assert_eq!(request.url_prefix, "https://tracker.example.com/browse/");
    assert_eq!(request.trunk_branch, "develop");
}

#[test]
fn test_minimal_file_uses_defaults() {
    let mut temp_file = NamedTempFile::new().unwrap();
    let toml_content = r#"
[[sequential]]
name = "billing"
gitlab_project = "backend/billing"
"#;
    temp_file.write_all(toml_content.as_bytes()).unwrap();
    temp_file.flush().unwrap();

    let config = load_config(Some(temp_file.path())).unwrap();
    let defaults = Config::default();
    assert_eq!(config.train, defaults.train);
    assert_eq!(config.gitlab, defaults.gitlab);
    assert!(config.validate().is_ok());
}

#[test]
fn test_service_listed_twice_is_rejected() {
    let config = parse_config(
        r#"
[[groups.a]]
name = "billing"
gitlab_project = "backend/billing"

[[groups.b]]
name = "billing"
gitlab_project = "backend/billing"
"#,
    )
    .unwrap();

    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("billing"));
}

#[test]
fn test_unknown_task_policy_is_rejected() {
    let result = parse_config("[train]\ntask_policy = \"fuzzy\"\n");
    assert!(result.is_err());
}

#[test]
fn test_missing_file_names_path() {
    let err = load_config(Some(Path::new("tests/fixtures/does-not-exist.toml"))).unwrap_err();
    assert!(err.to_string().contains("does-not-exist.toml"));
}

// tests/descriptor_test.rs
use release_train::descriptor::{self, DescriptorKind, FieldKind};
use release_train::domain::ReleaseVersion;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const ROOT_POM: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<project xmlns="http://maven.apache.org/POM/4.0.0">
    <modelVersion>4.0.0</modelVersion>
    <groupId>com.example</groupId>
    <artifactId>{name}</artifactId>
    <version>11.0</version>
    <packaging>pom</packaging>

    <modules>
        <module>{name}-api</module>
        <module>{name}-core</module>
    </modules>

    <properties>
        <java.version>17</java.version>
        <commons.version>2.4.0</commons.version>
    </properties>
</project>
"#;

const MODULE_POM: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<project xmlns="http://maven.apache.org/POM/4.0.0">
    <modelVersion>4.0.0</modelVersion>
    <parent>
        <groupId>com.example</groupId>
        <artifactId>{name}</artifactId>
        <version>11.0</version>
    </parent>
    <artifactId>{name}-{module}</artifactId>

    <dependencies>
        <dependency>
            <groupId>org.slf4j</groupId>
            <artifactId>slf4j-api</artifactId>
        </dependency>
    </dependencies>
</project>
"#;

fn write_service(root: &Path, name: &str) {
    fs::create_dir_all(root).unwrap();
    fs::write(root.join("pom.xml"), ROOT_POM.replace("{name}", name)).unwrap();
    for module in ["api", "core"] {
        let dir = root.join(format!("{}-{}", name, module));
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("pom.xml"),
            MODULE_POM.replace("{name}", name).replace("{module}", module),
        )
        .unwrap();
    }
}

fn snapshot(root: &Path) -> Vec<(String, String)> {
    descriptor::scan(root)
        .unwrap()
        .into_iter()
        .map(|p| (p.display().to_string(), fs::read_to_string(&p).unwrap()))
        .collect()
}

#[test]
fn test_two_services_bumped_to_twelve() {
    let workspace = TempDir::new().unwrap();
    let version = ReleaseVersion::new(12).unwrap();

    for name in ["billing", "orders"] {
        let root = workspace.path().join(name);
        write_service(&root, name);

        let rewrites = descriptor::propagate(&root, version, Some("nomatch")).unwrap();
        assert_eq!(rewrites.len(), 3);

        for rewrite in &rewrites {
            assert_eq!(rewrite.changes.len(), 1, "{}", rewrite.path.display());
            let expected = match rewrite.kind {
                DescriptorKind::Root => FieldKind::ProjectVersion,
                DescriptorKind::Submodule => FieldKind::ParentVersion,
            };
            assert_eq!(rewrite.changes[0].field, expected);
            assert_eq!(rewrite.changes[0].new, "12.0");
        }

        let root_pom = fs::read_to_string(root.join("pom.xml")).unwrap();
        assert!(root_pom.contains("<version>12.0</version>"));
        assert!(root_pom.contains("<commons.version>2.4.0</commons.version>"));

        let api_pom = fs::read_to_string(root.join(format!("{}-api/pom.xml", name))).unwrap();
        assert!(api_pom.contains("<version>12.0</version>\n    </parent>"));
        assert_eq!(api_pom.matches("<version>").count(), 1);
    }
}

#[test]
fn test_second_run_is_byte_identical() {
    let workspace = TempDir::new().unwrap();
    let root = workspace.path().join("billing");
    write_service(&root, "billing");
    let version = ReleaseVersion::new(12).unwrap();

    descriptor::propagate(&root, version, Some("commons")).unwrap();
    let first = snapshot(&root);

    let rewrites = descriptor::propagate(&root, version, Some("commons")).unwrap();
    assert!(rewrites.iter().all(|r| !r.is_changed()));
    assert_eq!(snapshot(&root), first);
}

#[test]
fn test_property_pattern_updates_matching_properties() {
    let workspace = TempDir::new().unwrap();
    let root = workspace.path().join("billing");
    write_service(&root, "billing");

    let rewrites =
        descriptor::propagate(&root, ReleaseVersion::new(12).unwrap(), Some("commons")).unwrap();

    let root_rewrite = rewrites
        .iter()
        .find(|r| r.kind == DescriptorKind::Root)
        .unwrap();
    assert!(root_rewrite
        .changes
        .iter()
        .any(|c| c.field == FieldKind::Property("commons.version".to_string()) && c.old == "2.4.0"));

    let root_pom = fs::read_to_string(root.join("pom.xml")).unwrap();
    assert!(root_pom.contains("<commons.version>12.0</commons.version>"));
    assert!(root_pom.contains("<java.version>17</java.version>"));
}

#[test]
fn test_empty_pattern_disables_property_rewrites() {
    let workspace = TempDir::new().unwrap();
    let root = workspace.path().join("billing");
    write_service(&root, "billing");

    descriptor::propagate(&root, ReleaseVersion::new(12).unwrap(), Some("")).unwrap();
    let root_pom = fs::read_to_string(root.join("pom.xml")).unwrap();
    assert!(root_pom.contains("<java.version>17</java.version>"));
    assert!(root_pom.contains("<commons.version>2.4.0</commons.version>"));
}

#[test]
fn test_service_without_descriptors_succeeds() {
    let workspace = TempDir::new().unwrap();
    fs::write(workspace.path().join("README.md"), "no maven here").unwrap();

    let rewrites =
        descriptor::propagate(workspace.path(), ReleaseVersion::new(2).unwrap(), None).unwrap();
    assert!(rewrites.is_empty());
}

#[test]
fn test_missing_service_directory_is_io_error() {
    let workspace = TempDir::new().unwrap();
    let result = descriptor::propagate(
        &workspace.path().join("missing"),
        ReleaseVersion::new(2).unwrap(),
        None,
    );
    assert!(result.is_err());
}

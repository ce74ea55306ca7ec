//! Tests for config file discovery and loading

use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;
use weave_config::{ConfigDiscovery, ConfigSource};

#[test]
fn discovers_weave_toml() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("weave.toml"),
        r#"
[scan]
roots = ["app", "lib"]

[resolution]
profiles = ["dev"]
"#,
    )
    .unwrap();

    let discovery = ConfigDiscovery::new(dir.path());
    assert!(matches!(discovery.find(), Some(ConfigSource::Toml(_))));

    let config = discovery.load().unwrap();
    assert_eq!(config.scan.roots, vec![PathBuf::from("app"), PathBuf::from("lib")]);
    assert_eq!(config.resolution.profiles, vec!["dev"]);
    assert_eq!(config.scan.project_root.as_deref(), Some(dir.path()));
}

#[test]
fn discovers_package_json() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("package.json"),
        r#"{
  "name": "todo-app",
  "weave": {
    "markers": { "services_property": "deps" }
  }
}"#,
    )
    .unwrap();

    let discovery = ConfigDiscovery::new(dir.path());
    assert!(matches!(discovery.find(), Some(ConfigSource::PackageJson(..))));

    let config = discovery.load().unwrap();
    assert_eq!(config.markers.services_property, "deps");
    assert_eq!(config.markers.inject, vec!["Inject"]);
}

#[test]
fn toml_takes_precedence_over_package_json() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("weave.toml"),
        r#"
[runtime]
module = "from-toml"
"#,
    )
    .unwrap();
    fs::write(
        dir.path().join("package.json"),
        r#"{ "weave": { "runtime": { "module": "from-package" } } }"#,
    )
    .unwrap();

    let config = ConfigDiscovery::new(dir.path()).load().unwrap();
    assert_eq!(config.runtime.module, "from-toml");
}

#[test]
fn malformed_toml_is_reported() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("weave.toml"), "[scan\nroots = ").unwrap();

    let err = ConfigDiscovery::new(dir.path()).load().unwrap_err();
    assert!(err.to_string().contains("configuration"));
}

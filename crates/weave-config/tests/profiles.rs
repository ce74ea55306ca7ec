//! Tests for configuration profiles and merging behavior.

use std::fs;

use tempfile::TempDir;
use weave_config::{ConfigDiscovery, ConfigError};

#[test]
fn profile_overrides_resolution_and_runtime() {
    let dir = TempDir::new().expect("tempdir");
    fs::write(
        dir.path().join("weave.toml"),
        r#"
[resolution]
profiles = ["dev"]

[runtime]
module = "@weave/runtime"

[profiles.test.resolution]
profiles = ["test"]

[profiles.test.lifecycle]
enabled = false
"#,
    )
    .expect("write config");

    let config = ConfigDiscovery::new(dir.path())
        .load_with_profile("test")
        .expect("load with profile");

    assert_eq!(config.resolution.profiles, vec!["test"]);
    assert!(!config.lifecycle.enabled);
    assert_eq!(config.runtime.module, "@weave/runtime");
}

#[test]
fn missing_profile_is_an_error() {
    let dir = TempDir::new().expect("tempdir");
    fs::write(dir.path().join("weave.toml"), "[scan]\nroots = [\"src\"]\n").expect("write");

    let err = ConfigDiscovery::new(dir.path())
        .load_with_profile("production")
        .unwrap_err();
    assert!(matches!(err, ConfigError::UnknownProfile(_)));
}

//! File-based config discovery.
//!
//! Handles finding and loading weave configuration files from the filesystem.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::config::WeaveConfig;
use crate::error::{ConfigError, Result};
use crate::loading::ConfigSource;

pub const CONFIG_FILE: &str = "weave.toml";
pub const PACKAGE_JSON_FIELD: &str = "weave";

/// File-based configuration discovery
///
/// Searches for a weave configuration in a project root and loads it through
/// the layered figment pipeline. Build-tool adapters that already hold a config
/// object should use `WeaveConfig::from_value()` instead.
///
/// # Example
///
/// ```no_run
/// use weave_config::ConfigDiscovery;
///
/// let config = ConfigDiscovery::new(".").load().unwrap();
/// ```
pub struct ConfigDiscovery {
    root: PathBuf,
}

impl ConfigDiscovery {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Find a config source in the root directory
    ///
    /// Searches in this order:
    /// 1. `weave.toml`
    /// 2. `package.json` with a non-null `weave` field
    pub fn find(&self) -> Option<ConfigSource> {
        let toml_path = self.root.join(CONFIG_FILE);
        if toml_path.exists() {
            return Some(ConfigSource::Toml(toml_path));
        }

        let pkg_path = self.root.join("package.json");
        let content = fs::read_to_string(&pkg_path).ok()?;
        let parsed = serde_json::from_str::<Value>(&content).ok()?;
        match parsed.get(PACKAGE_JSON_FIELD) {
            Some(value) if !value.is_null() => Some(ConfigSource::PackageJson(pkg_path, value.clone())),
            _ => None,
        }
    }

    /// Load config from the discovered source.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotFound` if no config file is found.
    pub fn load(&self) -> Result<WeaveConfig> {
        let source = self.find().ok_or(ConfigError::NotFound)?;
        tracing::debug!(source = ?source, "loading weave config");
        Ok(WeaveConfig::extract_from(Some(&source))?.with_project_root(&self.root))
    }

    /// Load config, falling back to defaults (plus environment) when no file exists.
    pub fn load_or_default(&self) -> Result<WeaveConfig> {
        match self.load() {
            Err(ConfigError::NotFound) => {
                tracing::debug!(root = %self.root.display(), "no weave config found, using defaults");
                Ok(WeaveConfig::from_env()?.with_project_root(&self.root))
            }
            other => other,
        }
    }

    /// Load config with profile merging
    pub fn load_with_profile(&self, profile: &str) -> Result<WeaveConfig> {
        self.load()?.materialize_profile(Some(profile))
    }
}

/// Discover and load config from the current directory.
pub fn discover() -> Result<WeaveConfig> {
    let root = std::env::current_dir()?;
    ConfigDiscovery::new(&root).load()
}

/// Discover and load config from the current directory with a profile applied.
pub fn discover_with_profile(profile: &str) -> Result<WeaveConfig> {
    let root = std::env::current_dir()?;
    ConfigDiscovery::new(&root).load_with_profile(profile)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn find_returns_none_when_no_config() {
        let dir = TempDir::new().unwrap();
        assert!(ConfigDiscovery::new(dir.path()).find().is_none());
    }

    #[test]
    fn load_returns_not_found_when_no_config() {
        let dir = TempDir::new().unwrap();
        let result = ConfigDiscovery::new(dir.path()).load();
        assert!(matches!(result.unwrap_err(), ConfigError::NotFound));
    }

    #[test]
    fn package_json_without_field_is_ignored() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("package.json"), r#"{ "name": "app" }"#).unwrap();
        assert!(ConfigDiscovery::new(dir.path()).find().is_none());
    }

    #[test]
    fn load_or_default_sets_project_root() {
        let dir = TempDir::new().unwrap();
        let config = ConfigDiscovery::new(dir.path()).load_or_default().unwrap();
        assert_eq!(config.scan.project_root.as_deref(), Some(dir.path()));
    }
}

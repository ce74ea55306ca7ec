//! Layered configuration loading.
//!
//! Priority: environment variables > config file > defaults.

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format as _, Serialized, Toml},
};
use serde_json::Value;

use crate::config::WeaveConfig;
use crate::error::{ConfigError, Result};

/// Prefix for environment overrides. Nested keys are separated by `__`,
/// e.g. `WEAVE_RESOLUTION__PROFILES=[test]`.
pub const ENV_PREFIX: &str = "WEAVE_";

/// Where a configuration file came from.
#[derive(Debug, Clone)]
pub enum ConfigSource {
    /// A `weave.toml` file.
    Toml(std::path::PathBuf),
    /// The `weave` field of a `package.json`.
    PackageJson(std::path::PathBuf, Value),
}

impl WeaveConfig {
    /// Build the figment for a source: defaults, then the source, then the environment.
    pub fn figment(source: Option<&ConfigSource>) -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(WeaveConfig::default()));

        match source {
            Some(ConfigSource::Toml(path)) => {
                figment = figment.merge(Toml::file(path));
            }
            Some(ConfigSource::PackageJson(_, value)) => {
                figment = figment.merge(Serialized::defaults(value.clone()));
            }
            None => {}
        }

        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Extract a config from the layered sources.
    pub fn extract_from(source: Option<&ConfigSource>) -> Result<Self> {
        Self::figment(source).extract().map_err(|e| {
            ConfigError::invalid_value(
                "configuration",
                format!("{e}. Check weave.toml syntax and field types"),
            )
        })
    }

    /// Defaults plus environment overrides, for projects without a config file.
    pub fn from_env() -> Result<Self> {
        Self::extract_from(None)
    }

    /// Fill in `scan.project_root` when the config did not name one.
    pub fn with_project_root(mut self, root: &Path) -> Self {
        if self.scan.project_root.is_none() {
            self.scan.project_root = Some(root.to_path_buf());
        }
        self
    }
}

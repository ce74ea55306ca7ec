//! High-level configuration structure for weave.
//!
//! This module provides the main `WeaveConfig` struct, its sections, and the
//! profile merging logic. For file discovery, see the `discovery` module; for
//! layered loading (defaults, file, environment), see the `loading` module.

use std::path::PathBuf;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ConfigError, Result as ConfigResult};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeaveConfig {
    pub scan: ScanOptions,
    pub markers: MarkerOptions,
    pub annotations: AnnotationOptions,
    pub resolution: ResolutionOptions,
    pub lifecycle: LifecycleOptions,
    pub runtime: RuntimeOptions,
    pub output: OutputOptions,

    /// Named override tables, merged over the base config by `materialize_profile`.
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub profiles: IndexMap<String, Value>,
}

/// Which files are scanned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanOptions {
    /// Directories scanned recursively, relative to the project root.
    pub roots: Vec<PathBuf>,

    /// Prefix stripped from paths before they are embedded in location keys.
    /// Defaults to the directory the config was loaded from.
    pub project_root: Option<PathBuf>,

    /// File extensions (without the dot) considered source files.
    pub extensions: Vec<String>,

    /// Glob patterns excluded from the scan.
    pub exclude: Vec<String>,

    /// Worker threads used for extraction and transformation. `None` uses rayon's default.
    pub jobs: Option<usize>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            roots: vec![PathBuf::from("src")],
            project_root: None,
            extensions: vec!["ts".to_string(), "tsx".to_string()],
            exclude: vec![
                "**/node_modules/**".to_string(),
                "**/dist/**".to_string(),
                "**/*.d.ts".to_string(),
            ],
            jobs: None,
        }
    }
}

/// Type names that mark injection requests in signatures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerOptions {
    pub inject: Vec<String>,
    pub inject_optional: Vec<String>,

    /// Property of the component props that carries the injected services.
    pub services_property: String,
}

impl Default for MarkerOptions {
    fn default() -> Self {
        Self {
            inject: vec!["Inject".to_string()],
            inject_optional: vec!["InjectOptional".to_string()],
            services_property: "services".to_string(),
        }
    }
}

/// Decorator names that register services and carry disambiguation metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationOptions {
    pub service: Vec<String>,
    pub primary: String,
    pub qualifier: String,
    pub profile: String,
    pub scope: String,

    /// Constructor parameter decorator that requests a dependency.
    pub inject: String,
}

impl Default for AnnotationOptions {
    fn default() -> Self {
        Self {
            service: vec!["Service".to_string(), "Injectable".to_string()],
            primary: "Primary".to_string(),
            qualifier: "Qualifier".to_string(),
            profile: "Profile".to_string(),
            scope: "Scope".to_string(),
            inject: "Inject".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolutionOptions {
    /// Active profiles used to pick between otherwise equal candidates.
    pub profiles: Vec<String>,
}

/// Names used when wiring service mount/unmount hooks into components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleOptions {
    pub enabled: bool,
    pub mount: String,
    pub unmount: String,
    pub effect_hook: String,
    pub effect_module: String,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            mount: "onMount".to_string(),
            unmount: "onUnmount".to_string(),
            effect_hook: "useEffect".to_string(),
            effect_module: "react".to_string(),
        }
    }
}

/// The runtime library that performs lookups by resolution key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeOptions {
    pub module: String,
    pub lookup: String,
    pub optional_lookup: String,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            module: "@weave/runtime".to_string(),
            lookup: "useService".to_string(),
            optional_lookup: "useOptionalService".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputOptions {
    /// Manifest path, relative to the project root.
    pub manifest: PathBuf,

    /// When set, rewritten sources are mirrored here instead of being kept in memory only.
    pub out_dir: Option<PathBuf>,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            manifest: PathBuf::from("weave.manifest.json"),
            out_dir: None,
        }
    }
}

impl WeaveConfig {
    /// Create from serde_json::Value (programmatic config from a build-tool adapter).
    ///
    /// # Example
    ///
    /// ```
    /// use weave_config::WeaveConfig;
    /// use serde_json::json;
    ///
    /// let config = WeaveConfig::from_value(json!({
    ///     "resolution": { "profiles": ["test"] }
    /// })).unwrap();
    /// assert_eq!(config.resolution.profiles, vec!["test".to_string()]);
    /// assert_eq!(config.markers.inject, vec!["Inject".to_string()]);
    /// ```
    pub fn from_value(value: Value) -> ConfigResult<Self> {
        serde_json::from_value(value).map_err(|e| ConfigError::invalid_value("config", e.to_string()))
    }

    pub fn to_value(&self) -> ConfigResult<Value> {
        serde_json::to_value(self).map_err(|e| ConfigError::invalid_value("config", e.to_string()))
    }

    /// Merge the named profile's override table over the base configuration.
    ///
    /// Objects merge key by key, arrays and scalars replace. `None` returns the
    /// config unchanged.
    pub fn materialize_profile(self, profile: Option<&str>) -> ConfigResult<Self> {
        let Some(name) = profile else {
            return Ok(self);
        };

        let overrides = self
            .profiles
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownProfile(name.to_string()))?;

        if overrides.is_null() {
            return Ok(self);
        }

        let profiles = self.profiles.clone();
        let mut base = serde_json::to_value(&self).map_err(|err| {
            ConfigError::InvalidProfileOverride {
                message: err.to_string(),
            }
        })?;
        merge_values(&mut base, &overrides);

        let mut merged: WeaveConfig =
            serde_json::from_value(base).map_err(|err| ConfigError::InvalidProfileOverride {
                message: err.to_string(),
            })?;
        merged.profiles = profiles;

        tracing::debug!(profile = name, "materialized config profile");
        Ok(merged)
    }

    /// All marker names, required first.
    pub fn all_markers(&self) -> impl Iterator<Item = &str> {
        self.markers
            .inject
            .iter()
            .chain(self.markers.inject_optional.iter())
            .map(String::as_str)
    }
}

fn merge_values(target: &mut Value, update: &Value) {
    match (target, update) {
        (Value::Object(target_map), Value::Object(update_map)) => {
            for (key, value) in update_map {
                merge_values(target_map.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
        (target_slot, _) => {
            *target_slot = update.clone();
        }
    }
}

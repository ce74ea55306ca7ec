//! Pluggable config validation strategies
//!
//! Separates schema validation (names and shapes only) from filesystem
//! validation (scan roots exist).

use std::path::{Path, PathBuf};

use crate::config::WeaveConfig;
use crate::error::{ConfigError, Result};

pub trait ConfigValidator {
    fn validate(&self, config: &WeaveConfig) -> Result<()>;
}

/// Schema-only validation (no filesystem checks)
///
/// # Example
///
/// ```
/// use weave_config::{ConfigValidator, SchemaValidator, WeaveConfig};
///
/// SchemaValidator.validate(&WeaveConfig::default()).unwrap();
/// ```
pub struct SchemaValidator;

impl ConfigValidator for SchemaValidator {
    fn validate(&self, config: &WeaveConfig) -> Result<()> {
        if config.scan.roots.is_empty() {
            return Err(ConfigError::schema(
                "no scan roots specified",
                "Add at least one directory to scan.roots",
            ));
        }

        if config.scan.extensions.is_empty() {
            return Err(ConfigError::schema(
                "no source extensions specified",
                "Add e.g. \"ts\" and \"tsx\" to scan.extensions",
            ));
        }

        if config.scan.jobs == Some(0) {
            return Err(ConfigError::schema(
                "scan.jobs must be at least 1",
                "Remove scan.jobs to use the default worker count",
            ));
        }

        if config.markers.inject.is_empty() {
            return Err(ConfigError::schema(
                "no required-injection marker specified",
                "Set markers.inject, e.g. [\"Inject\"]",
            ));
        }

        for marker in config.all_markers() {
            check_identifier("markers", marker)?;
        }

        if let Some(shared) = config
            .markers
            .inject
            .iter()
            .find(|m| config.markers.inject_optional.contains(m))
        {
            return Err(ConfigError::schema(
                format!("marker '{shared}' is both required and optional"),
                "A marker name may appear in only one of markers.inject and markers.inject_optional",
            ));
        }

        check_identifier("markers.services_property", &config.markers.services_property)?;

        let annotations = &config.annotations;
        if annotations.service.is_empty() {
            return Err(ConfigError::schema(
                "no service decorator specified",
                "Set annotations.service, e.g. [\"Service\"]",
            ));
        }
        for name in annotations.service.iter().chain([
            &annotations.primary,
            &annotations.qualifier,
            &annotations.profile,
            &annotations.scope,
            &annotations.inject,
        ]) {
            check_identifier("annotations", name)?;
        }

        if config.lifecycle.enabled {
            check_identifier("lifecycle.mount", &config.lifecycle.mount)?;
            check_identifier("lifecycle.unmount", &config.lifecycle.unmount)?;
            check_identifier("lifecycle.effect_hook", &config.lifecycle.effect_hook)?;
        }

        check_identifier("runtime.lookup", &config.runtime.lookup)?;
        check_identifier("runtime.optional_lookup", &config.runtime.optional_lookup)?;
        if config.runtime.module.trim().is_empty() {
            return Err(ConfigError::schema(
                "runtime.module cannot be empty",
                "Name the package that exports the lookup functions",
            ));
        }

        Ok(())
    }
}

/// Filesystem validator
///
/// Runs schema validation, then checks that every scan root exists below `root`.
pub struct FsValidator {
    root: PathBuf,
}

impl FsValidator {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }
}

impl ConfigValidator for FsValidator {
    fn validate(&self, config: &WeaveConfig) -> Result<()> {
        SchemaValidator.validate(config)?;

        for scan_root in &config.scan.roots {
            let path = self.root.join(scan_root);
            if !path.is_dir() {
                return Err(ConfigError::RootNotFound(path));
            }
        }

        Ok(())
    }
}

pub fn validate_schema(config: &WeaveConfig) -> Result<()> {
    SchemaValidator.validate(config)
}

pub fn validate_fs(config: &WeaveConfig, root: impl AsRef<Path>) -> Result<()> {
    FsValidator::new(root).validate(config)
}

/// `true` for names usable as JavaScript identifiers (ASCII subset).
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

fn check_identifier(field: &str, name: &str) -> Result<()> {
    if is_identifier(name) {
        Ok(())
    } else {
        Err(ConfigError::schema(
            format!("'{name}' in {field} is not a valid identifier"),
            "Use names made of letters, digits, '_' or '$' that do not start with a digit",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        validate_schema(&WeaveConfig::default()).unwrap();
    }

    #[test]
    fn rejects_marker_in_both_sets() {
        let mut config = WeaveConfig::default();
        config.markers.inject_optional.push("Inject".to_string());
        let err = validate_schema(&config).unwrap_err();
        assert!(err.to_string().contains("both required and optional"));
    }

    #[test]
    fn rejects_non_identifier_lookup() {
        let mut config = WeaveConfig::default();
        config.runtime.lookup = "use-service".to_string();
        assert!(validate_schema(&config).is_err());
    }

    #[test]
    fn identifier_rules() {
        assert!(is_identifier("useService"));
        assert!(is_identifier("$inject"));
        assert!(is_identifier("_x1"));
        assert!(!is_identifier("1abc"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("a.b"));
    }

    #[test]
    fn fs_validator_reports_missing_root() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = validate_fs(&WeaveConfig::default(), dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::RootNotFound(path) if path.ends_with("src")));
    }
}

//! Language-neutral description of contracts, implementations and requests.
//!
//! The extractor produces these from source files; every later stage
//! (registry, graph, validator, transformer) works on them without touching
//! syntax trees.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Project-relative file path with forward slashes, plus a 1-based line.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
}

impl SourceLocation {
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// A named abstract capability (an interface or object type alias).
///
/// Identity is name plus arity; two declarations with the same identity in
/// different files are distinguished by location keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContractDescriptor {
    pub name: String,
    pub type_params: Vec<String>,
    pub location: SourceLocation,
}

impl ContractDescriptor {
    pub fn arity(&self) -> usize {
        self.type_params.len()
    }
}

/// A contract as named at a use site (`implements` clause, marker type).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContractRef {
    /// Declared name. Import aliases are already undone.
    pub name: String,
    /// Type arguments as written, whitespace removed.
    pub type_args: Vec<String>,
    /// File the reference appears in.
    pub from_file: String,
    /// Module specifier when the name was imported.
    pub import_specifier: Option<String>,
}

impl ContractRef {
    pub fn local(name: impl Into<String>, from_file: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_args: Vec::new(),
            from_file: from_file.into(),
            import_specifier: None,
        }
    }

    pub fn with_type_args(mut self, args: Vec<String>) -> Self {
        self.type_args = args;
        self
    }

    pub fn imported_from(mut self, specifier: impl Into<String>) -> Self {
        self.import_specifier = Some(specifier.into());
        self
    }

    pub fn arity(&self) -> usize {
        self.type_args.len()
    }
}

impl fmt::Display for ContractRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if !self.type_args.is_empty() {
            write!(f, "<{}>", self.type_args.join(","))?;
        }
        Ok(())
    }
}

/// Lifetime policy of a registered service. Carried through to the manifest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    #[default]
    Singleton,
    Transient,
    Scoped,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Singleton => "singleton",
            Scope::Transient => "transient",
            Scope::Scoped => "scoped",
        }
    }
}

impl FromStr for Scope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "singleton" => Ok(Scope::Singleton),
            "transient" => Ok(Scope::Transient),
            "scoped" => Ok(Scope::Scoped),
            other => Err(format!(
                "unknown scope '{other}', expected singleton, transient or scoped"
            )),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Disambiguation metadata attached to an implementation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceMetadata {
    pub is_primary: bool,
    pub qualifier: Option<String>,
    /// Empty means active in every profile.
    pub profiles: BTreeSet<String>,
    pub scope: Scope,
}

impl ServiceMetadata {
    /// Active when unrestricted or when any profile is in `active`.
    pub fn is_active_in(&self, active: &BTreeSet<String>) -> bool {
        self.profiles.is_empty() || self.profiles.iter().any(|p| active.contains(p))
    }
}

/// A constructor dependency of an implementation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyRef {
    pub contract: ContractRef,
    pub required: bool,
    pub qualifier: Option<String>,
    /// Constructor parameter name.
    pub parameter: String,
}

/// Which lifecycle methods an implementation declares.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleHooks {
    pub on_mount: bool,
    pub on_unmount: bool,
}

impl LifecycleHooks {
    pub fn any(&self) -> bool {
        self.on_mount || self.on_unmount
    }
}

/// A concrete service class eligible for registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImplementationDescriptor {
    pub name: String,
    /// The class's own type parameters. Non-empty marks a generic implementation.
    pub type_params: Vec<String>,
    pub implements: Vec<ContractRef>,
    pub metadata: ServiceMetadata,
    pub dependencies: Vec<DependencyRef>,
    pub lifecycle: LifecycleHooks,
    pub location: SourceLocation,
}

impl ImplementationDescriptor {
    pub fn is_generic(&self) -> bool {
        !self.type_params.is_empty()
    }
}

/// One service requested by a component through its services property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InjectionRequest {
    /// Property name inside the services object.
    pub property: String,
    pub contract: ContractRef,
    pub required: bool,
    pub qualifier: Option<String>,
    pub location: SourceLocation,
}

/// An import binding: `import { imported as local } from "specifier"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportBinding {
    pub local: String,
    /// `default` and `*` for default and namespace imports.
    pub imported: String,
    pub specifier: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_parses_known_names_only() {
        assert_eq!("transient".parse::<Scope>(), Ok(Scope::Transient));
        assert_eq!("scoped".parse::<Scope>(), Ok(Scope::Scoped));
        assert!("request".parse::<Scope>().is_err());
        assert_eq!(Scope::default(), Scope::Singleton);
    }

    #[test]
    fn unrestricted_metadata_is_always_active() {
        let meta = ServiceMetadata::default();
        assert!(meta.is_active_in(&BTreeSet::new()));

        let mut restricted = ServiceMetadata::default();
        restricted.profiles.insert("test".to_string());
        assert!(!restricted.is_active_in(&BTreeSet::new()));
        assert!(restricted.is_active_in(&BTreeSet::from(["test".to_string()])));
    }

    #[test]
    fn contract_ref_displays_type_args() {
        let r = ContractRef::local("Cache", "src/a.ts")
            .with_type_args(vec!["string".to_string(), "User".to_string()]);
        assert_eq!(r.to_string(), "Cache<string,User>");
    }
}

//! Interface registry: contract declarations, their keys, and the
//! implementations bound to each key.
//!
//! A registry lives for one run. Every file model is registered first, then
//! [`InterfaceRegistry::finalize`] assigns keys and builds the lookup index.
//! Resolution is read-only afterwards and can be shared across threads.

use std::collections::BTreeSet;
use std::path::Path;

use path_clean::PathClean;
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::extract::FileModel;
use crate::key::{ResolutionKey, location_key, sanitize};
use crate::model::{ContractDescriptor, ContractRef, ImplementationDescriptor};

/// Index of an implementation in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ImplId(pub usize);

/// Outcome of looking up a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(ImplId),
    Ambiguous { candidates: Vec<ImplId> },
    NotFound,
}

impl Resolution {
    pub fn resolved(&self) -> Option<ImplId> {
        match self {
            Resolution::Resolved(id) => Some(*id),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Resolution::NotFound)
    }
}

/// A lookup with optional disambiguation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveRequest {
    /// Lookup key, type arguments included.
    pub key: ResolutionKey,
    pub qualifier: Option<String>,
    pub type_args: Vec<String>,
    /// Key of the contract declaration, without type arguments.
    base: ResolutionKey,
}

impl ResolveRequest {
    /// Request for a non-generic key.
    pub fn new(key: ResolutionKey) -> Self {
        Self {
            base: key.clone(),
            key,
            qualifier: None,
            type_args: Vec::new(),
        }
    }

    pub fn with_qualifier(mut self, qualifier: Option<String>) -> Self {
        self.qualifier = qualifier;
        self
    }

    /// Key emitted for this request: the lookup key, suffixed with the qualifier if any.
    pub fn emitted_key(&self) -> ResolutionKey {
        match &self.qualifier {
            Some(q) => self.key.qualified(q),
            None => self.key.clone(),
        }
    }
}

/// One contract name declared in one file.
#[derive(Debug, Clone)]
struct Declaration {
    name: String,
    arity: usize,
    file: String,
    line: u32,
    key: ResolutionKey,
}

#[derive(Debug, Default)]
pub struct InterfaceRegistry {
    active_profiles: BTreeSet<String>,
    contracts: Vec<ContractDescriptor>,
    implementations: Vec<ImplementationDescriptor>,

    declarations: Vec<Declaration>,
    by_name: FxHashMap<String, Vec<usize>>,
    /// Implementations by full lookup key.
    exact: FxHashMap<ResolutionKey, Vec<ImplId>>,
    /// Implementations generic over the contract's parameters, by (declaration key, arity).
    generic: FxHashMap<(ResolutionKey, usize), Vec<ImplId>>,
    /// Keys each implementation is registered under.
    impl_keys: Vec<Vec<ResolutionKey>>,
    finalized: bool,
}

impl InterfaceRegistry {
    /// An empty registry for one run with the given active profiles.
    pub fn new_run<I, S>(profiles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            active_profiles: profiles.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn register_contract(&mut self, contract: ContractDescriptor) {
        self.finalized = false;
        self.contracts.push(contract);
    }

    pub fn register(&mut self, implementation: ImplementationDescriptor) -> ImplId {
        self.finalized = false;
        self.implementations.push(implementation);
        ImplId(self.implementations.len() - 1)
    }

    /// Register every contract and implementation found in one file.
    pub fn register_file(&mut self, model: &FileModel) {
        for contract in &model.contracts {
            self.register_contract(contract.clone());
        }
        for implementation in &model.implementations {
            self.register(implementation.clone());
        }
    }

    /// Assign keys to declarations and index implementations under them.
    pub fn finalize(&mut self) {
        self.assign_declaration_keys();

        self.exact.clear();
        self.generic.clear();
        self.impl_keys = Vec::with_capacity(self.implementations.len());

        for (index, implementation) in self.implementations.iter().enumerate() {
            let id = ImplId(index);
            let mut keys = Vec::new();
            for contract in &implementation.implements {
                let request = self.request_for(contract);
                let over_own_params = implementation.is_generic()
                    && !contract.type_args.is_empty()
                    && contract
                        .type_args
                        .iter()
                        .all(|arg| implementation.type_params.contains(arg));

                if over_own_params {
                    self.generic
                        .entry((request.base.clone(), contract.arity()))
                        .or_default()
                        .push(id);
                    keys.push(request.base);
                } else {
                    let ids = self.exact.entry(request.key.clone()).or_default();
                    if !ids.contains(&id) {
                        ids.push(id);
                    }
                    keys.push(request.key);
                }
            }
            self.impl_keys.push(keys);
        }

        self.finalized = true;
        tracing::debug!(
            contracts = self.declarations.len(),
            implementations = self.implementations.len(),
            keys = self.exact.len() + self.generic.len(),
            "registry finalized"
        );
    }

    fn assign_declaration_keys(&mut self) {
        self.declarations.clear();
        self.by_name.clear();

        // First declaration of each (name, file) pair.
        let mut seen: FxHashMap<(&str, &str), usize> = FxHashMap::default();
        let mut declarations = Vec::new();
        for contract in &self.contracts {
            let pair = (contract.name.as_str(), contract.location.file.as_str());
            if seen.contains_key(&pair) {
                continue;
            }
            seen.insert(pair, declarations.len());
            declarations.push(Declaration {
                name: contract.name.clone(),
                arity: contract.arity(),
                file: contract.location.file.clone(),
                line: contract.location.line,
                key: sanitize(&contract.name),
            });
        }

        let mut files_per_key: FxHashMap<ResolutionKey, BTreeSet<&str>> = FxHashMap::default();
        for decl in &declarations {
            files_per_key
                .entry(decl.key.clone())
                .or_default()
                .insert(decl.file.as_str());
        }
        let colliding: BTreeSet<ResolutionKey> = files_per_key
            .into_iter()
            .filter(|(_, files)| files.len() > 1)
            .map(|(key, _)| key)
            .collect();

        for decl in &mut declarations {
            if colliding.contains(&decl.key) {
                decl.key = location_key(&decl.name, Some(&decl.file), Some(decl.line));
            }
        }

        for (index, decl) in declarations.iter().enumerate() {
            self.by_name.entry(decl.name.clone()).or_default().push(index);
        }
        if !colliding.is_empty() {
            tracing::debug!(names = colliding.len(), "contract names declared in several files");
        }
        self.declarations = declarations;
    }

    /// The declaration a reference points at, if it can be determined.
    fn bind(&self, contract: &ContractRef) -> Option<&Declaration> {
        let indices = self.by_name.get(&contract.name)?;
        let mut candidates: Vec<&Declaration> = indices
            .iter()
            .map(|&i| &self.declarations[i])
            .filter(|d| d.arity == contract.arity())
            .collect();
        if candidates.is_empty() {
            candidates = indices.iter().map(|&i| &self.declarations[i]).collect();
        }

        if let Some(local) = candidates.iter().find(|d| d.file == contract.from_file) {
            return Some(*local);
        }

        if let Some(target) = contract
            .import_specifier
            .as_deref()
            .and_then(|spec| resolve_relative(&contract.from_file, spec))
        {
            let index = format!("{target}/index");
            if let Some(imported) = candidates.iter().find(|d| {
                let stem = strip_extension(&d.file);
                stem == target || stem == strip_extension(&target) || stem == index
            }) {
                return Some(*imported);
            }
        }

        match candidates.as_slice() {
            [only] => Some(*only),
            _ => None,
        }
    }

    /// Build the lookup for a contract reference.
    pub fn request_for(&self, contract: &ContractRef) -> ResolveRequest {
        let decl = self.bind(contract);
        let base = decl
            .map(|d| d.key.clone())
            .unwrap_or_else(|| sanitize(&contract.name));

        let key = if contract.type_args.is_empty() {
            base.clone()
        } else {
            let display = contract.to_string();
            match decl {
                Some(d) if d.key.is_location_key() => {
                    location_key(&display, Some(&d.file), Some(d.line))
                }
                _ => sanitize(&display),
            }
        };

        ResolveRequest {
            key,
            qualifier: None,
            type_args: contract.type_args.clone(),
            base,
        }
    }

    /// Key a reference resolves under, ignoring qualifiers.
    pub fn contract_key(&self, contract: &ContractRef) -> ResolutionKey {
        self.request_for(contract).key
    }

    pub fn resolve(&self, key: &ResolutionKey) -> Resolution {
        self.resolve_request(&ResolveRequest::new(key.clone()))
    }

    pub fn resolve_request(&self, request: &ResolveRequest) -> Resolution {
        debug_assert!(self.finalized, "resolve before finalize");

        let exact = self.exact.get(&request.key).filter(|ids| !ids.is_empty());
        let pool = match exact {
            Some(ids) => ids.clone(),
            None if !request.type_args.is_empty() => self
                .generic
                .get(&(request.base.clone(), request.type_args.len()))
                .cloned()
                .unwrap_or_default(),
            None => Vec::new(),
        };

        self.choose(pool, request.qualifier.as_deref())
    }

    /// Apply disambiguation to a candidate pool: primary, then the request
    /// qualifier, then the active profiles.
    fn choose(&self, pool: Vec<ImplId>, qualifier: Option<&str>) -> Resolution {
        let meta = |id: &ImplId| &self.implementations[id.0].metadata;

        let mut pool: Vec<ImplId> = pool
            .into_iter()
            .filter(|id| meta(id).is_active_in(&self.active_profiles))
            .collect();

        match pool.len() {
            0 => return Resolution::NotFound,
            1 => return Resolution::Resolved(pool[0]),
            _ => {}
        }

        let primaries: Vec<ImplId> = pool.iter().copied().filter(|id| meta(id).is_primary).collect();
        match primaries.len() {
            1 => return Resolution::Resolved(primaries[0]),
            0 => {}
            _ => pool = primaries,
        }

        // A qualifier nobody declares leaves the pool to the profile rule.
        if let Some(qualifier) = qualifier {
            let qualified: Vec<ImplId> = pool
                .iter()
                .copied()
                .filter(|id| meta(id).qualifier.as_deref() == Some(qualifier))
                .collect();
            match qualified.len() {
                1 => return Resolution::Resolved(qualified[0]),
                0 => {}
                _ => pool = qualified,
            }
        }

        let profiled: Vec<ImplId> = pool
            .iter()
            .copied()
            .filter(|id| {
                let profiles = &meta(id).profiles;
                !profiles.is_empty() && profiles.iter().any(|p| self.active_profiles.contains(p))
            })
            .collect();
        if let [winner] = profiled.as_slice() {
            return Resolution::Resolved(*winner);
        }

        Resolution::Ambiguous { candidates: pool }
    }

    pub fn implementation(&self, id: ImplId) -> &ImplementationDescriptor {
        &self.implementations[id.0]
    }

    pub fn implementations(&self) -> impl Iterator<Item = (ImplId, &ImplementationDescriptor)> {
        self.implementations
            .iter()
            .enumerate()
            .map(|(i, implementation)| (ImplId(i), implementation))
    }

    pub fn len(&self) -> usize {
        self.implementations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.implementations.is_empty()
    }

    pub fn contracts(&self) -> &[ContractDescriptor] {
        &self.contracts
    }

    /// Keys an implementation is registered under. Generic implementations
    /// report the declaration key of the contract.
    pub fn keys_of(&self, id: ImplId) -> &[ResolutionKey] {
        self.impl_keys.get(id.0).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every key with at least one concrete implementation, sorted.
    pub fn keys(&self) -> Vec<&ResolutionKey> {
        let mut keys: Vec<_> = self.exact.keys().collect();
        keys.sort();
        keys
    }

    pub fn active_profiles(&self) -> &BTreeSet<String> {
        &self.active_profiles
    }
}

/// Resolve a relative import specifier against the importing file.
fn resolve_relative(from_file: &str, specifier: &str) -> Option<String> {
    if !specifier.starts_with('.') {
        return None;
    }
    let dir = Path::new(from_file).parent().unwrap_or_else(|| Path::new(""));
    let joined = dir.join(specifier).clean();
    Some(joined.to_string_lossy().replace('\\', "/"))
}

fn strip_extension(path: &str) -> &str {
    const EXTENSIONS: [&str; 7] = [".d.ts", ".tsx", ".ts", ".jsx", ".js", ".mts", ".mjs"];
    EXTENSIONS
        .iter()
        .find_map(|ext| path.strip_suffix(ext))
        .unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ServiceMetadata, SourceLocation};

    fn contract(name: &str, file: &str, line: u32) -> ContractDescriptor {
        ContractDescriptor {
            name: name.to_string(),
            type_params: Vec::new(),
            location: SourceLocation::new(file, line),
        }
    }

    fn service(name: &str, implements: ContractRef) -> ImplementationDescriptor {
        ImplementationDescriptor {
            name: name.to_string(),
            type_params: Vec::new(),
            implements: vec![implements],
            metadata: ServiceMetadata::default(),
            dependencies: Vec::new(),
            lifecycle: Default::default(),
            location: SourceLocation::new(format!("src/{name}.ts"), 1),
        }
    }

    fn logger_registry(configure: impl Fn(&str, &mut ServiceMetadata)) -> InterfaceRegistry {
        let mut registry = InterfaceRegistry::new_run(["dev"]);
        registry.register_contract(contract("Logger", "src/logger.ts", 1));
        for name in ["ConsoleLogger", "FileLogger", "NullLogger"] {
            let mut svc = service(name, ContractRef::local("Logger", "src/logger.ts"));
            configure(name, &mut svc.metadata);
            registry.register(svc);
        }
        registry.finalize();
        registry
    }

    fn name_of(registry: &InterfaceRegistry, resolution: Resolution) -> &str {
        match resolution {
            Resolution::Resolved(id) => &registry.implementation(id).name,
            other => panic!("expected a resolution, got {other:?}"),
        }
    }

    #[test]
    fn single_implementation_resolves_under_bare_key() {
        let mut registry = InterfaceRegistry::new_run(Vec::<String>::new());
        registry.register_contract(contract("ApiInterface", "src/api.ts", 3));
        registry.register(service("Api", ContractRef::local("ApiInterface", "src/Api.ts")));
        registry.finalize();

        let key = sanitize("ApiInterface");
        assert_eq!(registry.resolve(&key), Resolution::Resolved(ImplId(0)));
        assert_eq!(registry.keys_of(ImplId(0)), &[key]);
    }

    #[test]
    fn primary_wins_regardless_of_registration_order() {
        for primary in ["ConsoleLogger", "FileLogger", "NullLogger"] {
            let registry = logger_registry(|name, meta| meta.is_primary = name == primary);
            let resolution = registry.resolve(&sanitize("Logger"));
            assert_eq!(name_of(&registry, resolution), primary);
        }
    }

    #[test]
    fn primary_wins_over_a_qualified_candidate() {
        let registry = logger_registry(|name, meta| {
            meta.is_primary = name == "ConsoleLogger";
            if name == "FileLogger" {
                meta.qualifier = Some("verbose".to_string());
            }
        });
        let request = ResolveRequest::new(sanitize("Logger")).with_qualifier(Some("verbose".into()));
        assert_eq!(name_of(&registry, registry.resolve_request(&request)), "ConsoleLogger");
    }

    #[test]
    fn qualifier_selects_matching_candidate_without_a_primary() {
        let registry = logger_registry(|name, meta| {
            if name == "FileLogger" {
                meta.qualifier = Some("verbose".to_string());
            }
            if name == "NullLogger" {
                meta.profiles.insert("dev".to_string());
            }
        });
        let request = ResolveRequest::new(sanitize("Logger")).with_qualifier(Some("verbose".into()));
        assert_eq!(name_of(&registry, registry.resolve_request(&request)), "FileLogger");

        // No candidate declares "quiet": the active profile decides.
        let unmatched = ResolveRequest::new(sanitize("Logger")).with_qualifier(Some("quiet".into()));
        assert_eq!(name_of(&registry, registry.resolve_request(&unmatched)), "NullLogger");
    }

    #[test]
    fn active_profile_breaks_ties() {
        let registry = logger_registry(|name, meta| {
            if name == "FileLogger" {
                meta.profiles.insert("dev".to_string());
            }
            if name == "NullLogger" {
                meta.profiles.insert("test".to_string());
            }
        });
        assert_eq!(
            name_of(&registry, registry.resolve(&sanitize("Logger"))),
            "FileLogger"
        );
    }

    #[test]
    fn unresolvable_ties_are_ambiguous() {
        let registry = logger_registry(|_, _| {});
        assert_eq!(
            registry.resolve(&sanitize("Logger")),
            Resolution::Ambiguous {
                candidates: vec![ImplId(0), ImplId(1), ImplId(2)]
            }
        );
        assert!(registry.resolve(&sanitize("Missing")).is_not_found());
    }

    #[test]
    fn colliding_names_bind_through_imports() {
        let mut registry = InterfaceRegistry::new_run(Vec::<String>::new());
        registry.register_contract(contract(
            "TodoServiceInterface",
            "src/todo/interfaces/TodoInterfaces.ts",
            26,
        ));
        registry.register_contract(contract("TodoServiceInterface", "src/todo2/types.ts", 15));
        registry.register(service(
            "TodoService",
            ContractRef::local("TodoServiceInterface", "src/todo/TodoService.ts")
                .imported_from("./interfaces/TodoInterfaces"),
        ));
        registry.register(service(
            "TodoService2",
            ContractRef::local("TodoServiceInterface", "src/todo2/TodoService2.ts")
                .imported_from("./types.js"),
        ));
        registry.finalize();

        let first = ResolutionKey::from_raw(
            "TodoServiceInterface__src_todo_interfaces_TodoInterfaces_ts_line_26",
        );
        let second = ResolutionKey::from_raw("TodoServiceInterface__src_todo2_types_ts_line_15");
        assert_eq!(registry.resolve(&first), Resolution::Resolved(ImplId(0)));
        assert_eq!(registry.resolve(&second), Resolution::Resolved(ImplId(1)));
    }

    #[test]
    fn generic_contracts_prefer_concrete_arguments() {
        let mut registry = InterfaceRegistry::new_run(Vec::<String>::new());
        let mut cache = contract("Cache", "src/cache.ts", 1);
        cache.type_params = vec!["T".to_string()];
        registry.register_contract(cache);

        let mut generic = service(
            "MemoryCache",
            ContractRef::local("Cache", "src/MemoryCache.ts").with_type_args(vec!["T".into()]),
        );
        generic.type_params = vec!["T".to_string()];
        registry.register(generic);
        registry.register(service(
            "UserCache",
            ContractRef::local("Cache", "src/UserCache.ts").with_type_args(vec!["User".into()]),
        ));
        registry.finalize();

        let user = registry.request_for(
            &ContractRef::local("Cache", "src/Card.tsx").with_type_args(vec!["User".into()]),
        );
        assert_eq!(user.key.as_str(), "Cache_User_");
        assert_eq!(registry.resolve_request(&user), Resolution::Resolved(ImplId(1)));

        let post = registry.request_for(
            &ContractRef::local("Cache", "src/Card.tsx").with_type_args(vec!["Post".into()]),
        );
        assert_eq!(registry.resolve_request(&post), Resolution::Resolved(ImplId(0)));
    }

    #[test]
    fn undeclared_contracts_use_bare_key() {
        let registry = {
            let mut r = InterfaceRegistry::new_run(Vec::<String>::new());
            r.finalize();
            r
        };
        let request = registry.request_for(
            &ContractRef::local("HttpClient", "src/a.ts").imported_from("@acme/http"),
        );
        assert_eq!(request.key.as_str(), "HttpClient");
    }

    #[test]
    fn relative_specifiers_resolve_against_the_importing_file() {
        assert_eq!(
            resolve_relative("src/todo/TodoService.ts", "../api/types").as_deref(),
            Some("src/api/types")
        );
        assert_eq!(resolve_relative("src/a.ts", "react"), None);
        assert_eq!(strip_extension("src/a.d.ts"), "src/a");
    }
}

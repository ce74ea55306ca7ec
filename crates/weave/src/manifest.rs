//! The resolution manifest: which implementation the runtime container
//! should construct for each key.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::graph::{DependencyGraph, EdgeTarget};
use crate::key::ResolutionKey;
use crate::model::{InjectionRequest, Scope};
use crate::registry::{ImplId, InterfaceRegistry, Resolution};

pub const MANIFEST_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestDependency {
    pub key: ResolutionKey,
    pub optional: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub implementation: String,
    pub scope: Scope,
    pub file: String,
    pub line: u32,
    /// Constructor dependencies in parameter order.
    pub dependencies: Vec<ManifestDependency>,
}

/// Keys are sorted, so identical input serializes to identical bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionManifest {
    pub version: u32,
    pub entries: BTreeMap<ResolutionKey, ManifestEntry>,
}

impl Default for ResolutionManifest {
    fn default() -> Self {
        Self {
            version: MANIFEST_VERSION,
            entries: BTreeMap::new(),
        }
    }
}

impl ResolutionManifest {
    /// Entries for every key that resolves to exactly one implementation,
    /// plus the qualified and instantiated keys used by dependencies and requests.
    pub fn build<'r>(
        registry: &InterfaceRegistry,
        graph: &DependencyGraph,
        requests: impl IntoIterator<Item = &'r InjectionRequest>,
    ) -> Self {
        let mut manifest = Self::default();

        for key in registry.keys() {
            if let Resolution::Resolved(id) = registry.resolve(key) {
                manifest.insert(registry, graph, key.clone(), id);
            }
        }

        for edge in graph.edges() {
            if let EdgeTarget::Implementation { id } = edge.target {
                manifest.insert(registry, graph, edge.key.clone(), id);
            }
        }

        for request in requests {
            let lookup = registry
                .request_for(&request.contract)
                .with_qualifier(request.qualifier.clone());
            if let Resolution::Resolved(id) = registry.resolve_request(&lookup) {
                manifest.insert(registry, graph, lookup.emitted_key(), id);
            }
        }

        manifest
    }

    fn insert(
        &mut self,
        registry: &InterfaceRegistry,
        graph: &DependencyGraph,
        key: ResolutionKey,
        id: ImplId,
    ) {
        self.entries.entry(key).or_insert_with(|| {
            let implementation = registry.implementation(id);
            ManifestEntry {
                implementation: implementation.name.clone(),
                scope: implementation.metadata.scope,
                file: implementation.location.file.clone(),
                line: implementation.location.line,
                dependencies: graph
                    .dependencies_of(id)
                    .iter()
                    .map(|edge| ManifestDependency {
                        key: edge.key.clone(),
                        optional: !edge.required,
                    })
                    .collect(),
            }
        });
    }

    pub fn get(&self, key: &str) -> Option<&ManifestEntry> {
        self.entries.get(&ResolutionKey::from_raw(key))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pretty JSON with a trailing newline.
    pub fn to_json(&self) -> Result<String> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        Ok(json)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

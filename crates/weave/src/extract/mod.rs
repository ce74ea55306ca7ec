//! Source model extraction.
//!
//! Parses one file with oxc and reduces it to a [`FileModel`]: the contracts
//! it declares, the services it registers, and the component functions that
//! request injected services. Extraction is a pure function of the file's
//! path and text, so files can be processed in any order and in parallel.

mod scope;
mod site;
mod utils;
mod visitor;

use std::path::Path;
use std::sync::Arc;

use oxc_allocator::Allocator;
use oxc_ast_visit::Visit;
use oxc_parser::Parser;
use oxc_span::SourceType;
use serde::Serialize;
use weave_config::WeaveConfig;

pub use site::{ExistingBinding, InjectionSite, InlineRef, SiteBody};

use crate::model::{ContractDescriptor, ImplementationDescriptor, ImportBinding, SourceLocation};
use crate::validate::ValidationIssue;
use scope::FileScope;
use visitor::ModelVisitor;

/// Everything the later stages need to know about one source file.
#[derive(Debug, Clone, Serialize)]
pub struct FileModel {
    /// Project-relative path with forward slashes.
    pub path: String,
    #[serde(skip)]
    pub source: Arc<str>,
    pub contracts: Vec<ContractDescriptor>,
    pub implementations: Vec<ImplementationDescriptor>,
    pub sites: Vec<InjectionSite>,
    pub imports: Vec<ImportBinding>,
    /// Offset where new import declarations are inserted.
    #[serde(skip)]
    pub import_insert_at: u32,
    /// Malformed declarations found in this file.
    pub issues: Vec<ValidationIssue>,
}

impl FileModel {
    /// A model with no declarations, carrying a single diagnostic.
    pub fn failed(path: impl Into<String>, source: Arc<str>, issue: ValidationIssue) -> Self {
        Self {
            path: path.into(),
            source,
            contracts: Vec::new(),
            implementations: Vec::new(),
            sites: Vec::new(),
            imports: Vec::new(),
            import_insert_at: 0,
            issues: vec![issue],
        }
    }

    pub fn has_injection(&self) -> bool {
        !self.sites.is_empty()
    }

    /// `true` if `local` is bound by an import in this file.
    pub fn imports_local(&self, local: &str) -> bool {
        self.imports.iter().any(|i| i.local == local)
    }
}

/// Parses files into [`FileModel`]s using the marker and annotation names from the config.
#[derive(Debug, Clone, Copy)]
pub struct Extractor<'c> {
    config: &'c WeaveConfig,
}

impl<'c> Extractor<'c> {
    pub fn new(config: &'c WeaveConfig) -> Self {
        Self { config }
    }

    /// Extract the model of one file.
    ///
    /// Never fails: a file that does not parse yields an empty model with a
    /// single malformed-declaration issue.
    pub fn extract(&self, path: &str, source: impl Into<Arc<str>>) -> FileModel {
        let source: Arc<str> = source.into();
        let source_type = SourceType::from_path(Path::new(path)).unwrap_or_else(|_| SourceType::tsx());

        let allocator = Allocator::default();
        let ret = Parser::new(&allocator, &source, source_type).parse();

        if ret.panicked || !ret.errors.is_empty() {
            let message = ret
                .errors
                .first()
                .map(|err| format!("failed to parse: {err}"))
                .unwrap_or_else(|| "failed to parse".to_string());
            tracing::debug!(file = path, errors = ret.errors.len(), "parse failed");
            return FileModel::failed(
                path,
                source.clone(),
                ValidationIssue::malformed(message, Some(SourceLocation::new(path, 1))),
            );
        }

        let mut issues = Vec::new();
        let mut scope = FileScope::new(self.config, path, &source);
        scope.collect(&ret.program, &mut issues);

        let mut visitor = ModelVisitor::new(&scope);
        visitor.visit_program(&ret.program);
        issues.append(&mut visitor.issues);

        let ModelVisitor {
            contracts,
            implementations,
            sites,
            ..
        } = visitor;

        tracing::trace!(
            file = path,
            contracts = contracts.len(),
            services = implementations.len(),
            sites = sites.len(),
            "extracted"
        );

        FileModel {
            path: path.to_string(),
            contracts,
            implementations,
            sites,
            imports: scope.imports.clone(),
            import_insert_at: scope.import_insert_at,
            issues,
            source: source.clone(),
        }
    }
}

//! File-level facts gathered before the main visit.
//!
//! Imports and top-level type declarations are collected first so that
//! marker types and props types can be resolved no matter where in the file
//! they are declared relative to their use.

use oxc_ast::ast::{
    Declaration, ExportDefaultDeclarationKind, ImportDeclarationSpecifier, Program, Statement,
    TSLiteral, TSSignature, TSType, TSTypeName, TSTypeParameterInstantiation,
};
use oxc_span::{GetSpan, Span};
use rustc_hash::FxHashMap;
use weave_config::WeaveConfig;

use super::site::collect_pattern_names;
use super::utils::{LineIndex, compact, slice};
use crate::model::{ContractRef, ImportBinding, InjectionRequest, SourceLocation};
use crate::validate::ValidationIssue;

/// Type of the services member of a props type.
#[derive(Debug, Clone)]
pub(crate) enum ServicesType {
    Inline(Vec<InjectionRequest>),
    Named(String),
}

/// What the extractor needs to know about a top-level interface or type alias.
#[derive(Debug, Clone, Default)]
pub(crate) struct LocalType {
    /// Requests declared directly by the members.
    pub requests: Vec<InjectionRequest>,
    /// The services member, when the type describes component props.
    pub services: Option<ServicesType>,
}

/// Outcome of reading one type as an injection marker.
pub(crate) enum Marker {
    NotMarker,
    Request {
        contract: ContractRef,
        required: bool,
        qualifier: Option<String>,
    },
    Malformed(String),
}

/// Shared read-only context for one file.
pub(crate) struct FileScope<'c> {
    pub config: &'c WeaveConfig,
    pub path: &'c str,
    pub source: &'c str,
    pub lines: LineIndex,
    pub imports: Vec<ImportBinding>,
    import_index: FxHashMap<String, usize>,
    pub local_types: FxHashMap<String, LocalType>,
    /// Value bindings at module scope: import locals and top-level declarations.
    pub module_names: Vec<String>,
    /// Offset just past the last top-level import (or directive).
    pub import_insert_at: u32,
}

impl<'c> FileScope<'c> {
    pub fn new(config: &'c WeaveConfig, path: &'c str, source: &'c str) -> Self {
        Self {
            config,
            path,
            source,
            lines: LineIndex::new(source),
            imports: Vec::new(),
            import_index: FxHashMap::default(),
            local_types: FxHashMap::default(),
            module_names: Vec::new(),
            import_insert_at: 0,
        }
    }

    pub fn location(&self, span: Span) -> SourceLocation {
        SourceLocation::new(self.path, self.lines.line(span.start))
    }

    pub fn text(&self, span: Span) -> &'c str {
        slice(self.source, span)
    }

    /// Collect imports and top-level types. Marker problems found along the
    /// way are pushed to `issues`.
    pub fn collect(&mut self, program: &Program<'_>, issues: &mut Vec<ValidationIssue>) {
        if let Some(last) = program.directives.last() {
            self.import_insert_at = last.span.end;
        }

        for stmt in &program.body {
            if let Statement::ImportDeclaration(import) = stmt {
                self.import_insert_at = import.span.end;
                let specifier = import.source.value.to_string();
                for spec in import.specifiers.iter().flatten() {
                    let (local, imported) = match spec {
                        ImportDeclarationSpecifier::ImportSpecifier(s) => {
                            (s.local.name.to_string(), s.imported.name().to_string())
                        }
                        ImportDeclarationSpecifier::ImportDefaultSpecifier(s) => {
                            (s.local.name.to_string(), "default".to_string())
                        }
                        ImportDeclarationSpecifier::ImportNamespaceSpecifier(s) => {
                            (s.local.name.to_string(), "*".to_string())
                        }
                    };
                    self.module_names.push(local.clone());
                    self.import_index.insert(local.clone(), self.imports.len());
                    self.imports.push(ImportBinding {
                        local,
                        imported,
                        specifier: specifier.clone(),
                    });
                }
            }
        }

        for stmt in &program.body {
            if let Statement::ExportDefaultDeclaration(export) = stmt {
                let id = match &export.declaration {
                    ExportDefaultDeclarationKind::FunctionDeclaration(func) => func.id.as_ref(),
                    ExportDefaultDeclarationKind::ClassDeclaration(class) => class.id.as_ref(),
                    _ => None,
                };
                self.module_names.extend(id.map(|id| id.name.to_string()));
            }

            let declaration = match stmt {
                Statement::ExportNamedDeclaration(export) => export.declaration.as_ref(),
                _ => stmt.as_declaration(),
            };
            match declaration {
                Some(Declaration::VariableDeclaration(decl)) => {
                    for declarator in &decl.declarations {
                        collect_pattern_names(&declarator.id, &mut self.module_names);
                    }
                }
                Some(Declaration::FunctionDeclaration(func)) => {
                    self.module_names.extend(func.id.as_ref().map(|id| id.name.to_string()));
                }
                Some(Declaration::ClassDeclaration(class)) => {
                    self.module_names.extend(class.id.as_ref().map(|id| id.name.to_string()));
                }
                Some(Declaration::TSEnumDeclaration(decl)) => {
                    self.module_names.push(decl.id.name.to_string());
                }
                Some(Declaration::TSInterfaceDeclaration(decl)) => {
                    let local = self.local_type(&decl.body.body, issues);
                    self.local_types.insert(decl.id.name.to_string(), local);
                }
                Some(Declaration::TSTypeAliasDeclaration(decl)) => {
                    if let TSType::TSTypeLiteral(literal) = &decl.type_annotation {
                        let local = self.local_type(&literal.members, issues);
                        self.local_types.insert(decl.id.name.to_string(), local);
                    }
                }
                _ => {}
            }
        }
    }

    fn local_type(&self, members: &[TSSignature<'_>], issues: &mut Vec<ValidationIssue>) -> LocalType {
        LocalType {
            requests: self.requests_from_members(members, issues),
            services: self.services_member(members, issues),
        }
    }

    /// Find the services member of a props type literal.
    pub fn services_member(
        &self,
        members: &[TSSignature<'_>],
        issues: &mut Vec<ValidationIssue>,
    ) -> Option<ServicesType> {
        let property = &self.config.markers.services_property;
        members.iter().find_map(|member| {
            let TSSignature::TSPropertySignature(sig) = member else {
                return None;
            };
            if sig.key.static_name().as_deref() != Some(property.as_str()) {
                return None;
            }
            let annotation = sig.type_annotation.as_ref()?;
            match &annotation.type_annotation {
                TSType::TSTypeLiteral(literal) => Some(ServicesType::Inline(
                    self.requests_from_members(&literal.members, issues),
                )),
                TSType::TSTypeReference(reference) => match &reference.type_name {
                    TSTypeName::IdentifierReference(id) => {
                        Some(ServicesType::Named(id.name.to_string()))
                    }
                    _ => None,
                },
                _ => None,
            }
        })
    }

    /// Requests named by marker-typed members of a type literal or interface.
    pub fn requests_from_members(
        &self,
        members: &[TSSignature<'_>],
        issues: &mut Vec<ValidationIssue>,
    ) -> Vec<InjectionRequest> {
        let mut requests = Vec::new();
        for member in members {
            let TSSignature::TSPropertySignature(sig) = member else {
                continue;
            };
            let Some(annotation) = sig.type_annotation.as_ref() else {
                continue;
            };
            let location = self.location(sig.span);
            match self.read_marker(&annotation.type_annotation) {
                Marker::NotMarker => {}
                Marker::Malformed(message) => {
                    issues.push(ValidationIssue::malformed(message, Some(location)));
                }
                Marker::Request {
                    contract,
                    required,
                    qualifier,
                } => {
                    let Some(property) = sig.key.static_name() else {
                        issues.push(ValidationIssue::malformed(
                            "computed service property names cannot be injected",
                            Some(location),
                        ));
                        continue;
                    };
                    requests.push(InjectionRequest {
                        property: property.to_string(),
                        contract,
                        // `todo?: Inject<T>` behaves like InjectOptional<T>.
                        required: required && !sig.optional,
                        qualifier,
                        location,
                    });
                }
            }
        }
        requests
    }

    /// Resolve the services requests of a parameter type annotation.
    pub fn requests_for_param_type(
        &self,
        ty: &TSType<'_>,
        issues: &mut Vec<ValidationIssue>,
    ) -> Vec<InjectionRequest> {
        let services = match ty {
            TSType::TSTypeLiteral(literal) => self.services_member(&literal.members, issues),
            TSType::TSTypeReference(reference) => match &reference.type_name {
                TSTypeName::IdentifierReference(id) => self
                    .local_types
                    .get(id.name.as_str())
                    .and_then(|local| local.services.clone()),
                _ => None,
            },
            TSType::TSIntersectionType(intersection) => {
                return intersection
                    .types
                    .iter()
                    .map(|part| self.requests_for_param_type(part, issues))
                    .find(|requests| !requests.is_empty())
                    .unwrap_or_default();
            }
            _ => None,
        };

        match services {
            Some(ServicesType::Inline(requests)) => requests,
            Some(ServicesType::Named(name)) => self
                .local_types
                .get(name.as_str())
                .map(|local| local.requests.clone())
                .unwrap_or_default(),
            None => Vec::new(),
        }
    }

    /// Reference to a contract named by `local` in this file.
    pub fn contract_ref(
        &self,
        local: &str,
        args: Option<&TSTypeParameterInstantiation<'_>>,
    ) -> ContractRef {
        let type_args = args
            .map(|inst| {
                inst.params
                    .iter()
                    .map(|param| compact(self.text(param.span())))
                    .collect()
            })
            .unwrap_or_default();

        match self.import_index.get(local).map(|&i| &self.imports[i]) {
            Some(import) if import.imported != "default" && import.imported != "*" => {
                ContractRef::local(import.imported.clone(), self.path)
                    .with_type_args(type_args)
                    .imported_from(import.specifier.clone())
            }
            Some(import) => ContractRef::local(local, self.path)
                .with_type_args(type_args)
                .imported_from(import.specifier.clone()),
            None => ContractRef::local(local, self.path).with_type_args(type_args),
        }
    }

    /// Contract named by a plain type reference (`ApiInterface`, `Cache<User>`).
    pub fn contract_from_type(&self, ty: &TSType<'_>) -> Option<ContractRef> {
        let TSType::TSTypeReference(reference) = ty else {
            return None;
        };
        let TSTypeName::IdentifierReference(id) = &reference.type_name else {
            return None;
        };
        Some(self.contract_ref(id.name.as_str(), reference.type_arguments.as_deref()))
    }

    pub fn read_marker(&self, ty: &TSType<'_>) -> Marker {
        let TSType::TSTypeReference(reference) = ty else {
            return Marker::NotMarker;
        };
        let TSTypeName::IdentifierReference(id) = &reference.type_name else {
            return Marker::NotMarker;
        };

        let markers = &self.config.markers;
        let name = id.name.as_str();
        let required = if markers.inject.iter().any(|m| m == name) {
            true
        } else if markers.inject_optional.iter().any(|m| m == name) {
            false
        } else {
            return Marker::NotMarker;
        };

        let Some(args) = reference.type_arguments.as_deref() else {
            return Marker::Malformed(format!("{name} needs a contract type argument"));
        };
        let Some(first) = args.params.first() else {
            return Marker::Malformed(format!("{name} needs a contract type argument"));
        };
        let Some(contract) = self.contract_from_type(first) else {
            return Marker::Malformed(format!(
                "{name}<{}> does not name a contract",
                compact(self.text(first.span()))
            ));
        };

        let qualifier = match args.params.get(1) {
            None => None,
            Some(TSType::TSLiteralType(literal)) => match &literal.literal {
                TSLiteral::StringLiteral(s) => Some(s.value.to_string()),
                _ => {
                    return Marker::Malformed(format!(
                        "qualifier of {name}<{contract}> must be a string literal"
                    ));
                }
            },
            Some(_) => {
                return Marker::Malformed(format!(
                    "qualifier of {name}<{contract}> must be a string literal"
                ));
            }
        };

        Marker::Request {
            contract,
            required,
            qualifier,
        }
    }
}

//! Functional component rewriting.
//!
//! For every injection site the first parameter is normalized to a single
//! name, each requested service is bound to a local that prefers the value
//! passed by the parent and otherwise asks the runtime container by key, and
//! lifecycle hooks of wired services are attached to one effect. Everything
//! else in the file is left byte-for-byte intact.

mod edits;
mod emit;
pub mod shape;

use serde::Serialize;
use weave_config::WeaveConfig;

use crate::error::Result;
use crate::extract::{FileModel, InjectionSite, SiteBody};
use crate::key::ResolutionKey;
use crate::model::InjectionRequest;
use crate::registry::{InterfaceRegistry, Resolution};
use crate::validate::ValidationIssue;
use edits::SourceEdits;
use emit::{Fallback, HookTarget};
use shape::normalize;

/// How one requested service was wired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedBinding {
    pub component: String,
    pub property: String,
    pub local: String,
    /// Key passed to the runtime lookup.
    pub key: ResolutionKey,
    /// Implementation chosen at build time, if exactly one.
    pub implementation: Option<String>,
    pub required: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransformationResult {
    pub path: String,
    pub was_transformed: bool,
    #[serde(skip)]
    pub rewritten_source: String,
    pub diagnostics: Vec<ValidationIssue>,
    pub resolved_bindings: Vec<ResolvedBinding>,
}

impl TransformationResult {
    /// The file as read, with `issue` explaining why it was not rewritten.
    pub fn unchanged(model: &FileModel, issue: ValidationIssue) -> Self {
        let mut diagnostics = model.issues.clone();
        diagnostics.push(issue);
        Self {
            path: model.path.clone(),
            was_transformed: false,
            rewritten_source: model.source.to_string(),
            diagnostics,
            resolved_bindings: Vec::new(),
        }
    }
}

/// Outcome of resolving one request of a site.
struct Wiring {
    key: ResolutionKey,
    resolution: Resolution,
}

pub struct FunctionalTransformer<'a> {
    registry: &'a InterfaceRegistry,
    config: &'a WeaveConfig,
}

impl<'a> FunctionalTransformer<'a> {
    pub fn new(registry: &'a InterfaceRegistry, config: &'a WeaveConfig) -> Self {
        Self { registry, config }
    }

    /// Rewrite every injection site in `model`.
    pub fn transform(&self, model: &FileModel) -> Result<TransformationResult> {
        let mut edits = SourceEdits::new();
        let mut diagnostics = model.issues.clone();
        let mut resolved_bindings = Vec::new();
        let mut needed = NeededImports::default();

        for site in &model.sites {
            let wirings: Vec<Wiring> = site.requests.iter().map(|r| self.wire(r)).collect();

            for (request, wiring) in site.requests.iter().zip(&wirings) {
                if let Some(issue) = self.diagnostic(site, request, wiring) {
                    diagnostics.push(issue);
                }
            }

            if site.is_already_resolved() {
                for bound in &site.bound {
                    if let Some(index) = site.requests.iter().position(|r| r.property == bound.property) {
                        resolved_bindings.push(self.resolved_binding(
                            site,
                            &site.requests[index],
                            &bound.local,
                            &wirings[index],
                        ));
                    }
                }
                tracing::trace!(component = site.display_name(), "already resolved");
                continue;
            }

            self.rewrite_site(site, &wirings, &mut edits, &mut needed, &mut resolved_bindings);
        }

        needed.emit(self.config, model, &mut edits);

        let was_transformed = !edits.is_empty();
        let rewritten_source = if was_transformed {
            edits.apply(&model.path, &model.source)?
        } else {
            model.source.to_string()
        };

        if was_transformed {
            tracing::debug!(
                file = %model.path,
                sites = model.sites.len(),
                bindings = resolved_bindings.len(),
                "rewrote file"
            );
        }

        Ok(TransformationResult {
            path: model.path.clone(),
            was_transformed,
            rewritten_source,
            diagnostics,
            resolved_bindings,
        })
    }

    fn wire(&self, request: &InjectionRequest) -> Wiring {
        let lookup = self
            .registry
            .request_for(&request.contract)
            .with_qualifier(request.qualifier.clone());
        Wiring {
            key: lookup.emitted_key(),
            resolution: self.registry.resolve_request(&lookup),
        }
    }

    fn diagnostic(
        &self,
        site: &InjectionSite,
        request: &InjectionRequest,
        wiring: &Wiring,
    ) -> Option<ValidationIssue> {
        let location = Some(request.location.clone());
        match &wiring.resolution {
            Resolution::Resolved(_) => None,
            Resolution::NotFound if !request.required => None,
            Resolution::NotFound => Some(ValidationIssue::missing(
                wiring.key.clone(),
                site.display_name(),
                location,
            )),
            Resolution::Ambiguous { candidates } => {
                let names: Vec<String> = candidates
                    .iter()
                    .map(|&id| self.registry.implementation(id).name.clone())
                    .collect();
                Some(ValidationIssue::ambiguous(
                    wiring.key.clone(),
                    site.display_name(),
                    &names,
                    location,
                ))
            }
        }
    }

    fn resolved_binding(
        &self,
        site: &InjectionSite,
        request: &InjectionRequest,
        local: &str,
        wiring: &Wiring,
    ) -> ResolvedBinding {
        ResolvedBinding {
            component: site.display_name().to_string(),
            property: request.property.clone(),
            local: local.to_string(),
            key: wiring.key.clone(),
            implementation: wiring
                .resolution
                .resolved()
                .map(|id| self.registry.implementation(id).name.clone()),
            required: request.required,
        }
    }

    fn fallback(&self, site: &InjectionSite, request: &InjectionRequest, wiring: &Wiring) -> Fallback {
        let key = wiring.key.clone();
        match (&wiring.resolution, request.required) {
            (Resolution::Resolved(_), true) => Fallback::Lookup(key),
            (Resolution::Resolved(_), false) => Fallback::OptionalLookup(key),
            (Resolution::NotFound, false) => Fallback::Undefined,
            (Resolution::NotFound, true) => Fallback::Throwing(format!(
                "No implementation registered for {key} (service '{}' of {})",
                request.property,
                site.display_name()
            )),
            (Resolution::Ambiguous { .. }, _) => Fallback::Throwing(format!(
                "Ambiguous implementations for {key} (service '{}' of {}); mark one @{} or add a qualifier",
                request.property,
                site.display_name(),
                self.config.annotations.primary
            )),
        }
    }

    fn rewrite_site(
        &self,
        site: &InjectionSite,
        wirings: &[Wiring],
        edits: &mut SourceEdits,
        needed: &mut NeededImports,
        resolved_bindings: &mut Vec<ResolvedBinding>,
    ) {
        let config = self.config;
        let services = config.markers.services_property.as_str();
        let normalized = normalize(site, services);
        let param = normalized.param.as_str();

        let mut statements = Vec::new();
        statements.extend(normalized.prelude.clone());

        let mut hooks = Vec::new();
        for planned in &normalized.bindings {
            let request = &site.requests[planned.request];
            let wiring = &wirings[planned.request];
            let fallback = self.fallback(site, request, wiring);
            needed.note(&fallback);

            statements.push(emit::binding(
                &planned.local,
                param,
                services,
                &request.property,
                Some(&emit::fallback_expr(config, &fallback)),
            ));
            resolved_bindings.push(self.resolved_binding(site, request, &planned.local, wiring));

            if let Some(id) = wiring.resolution.resolved() {
                let lifecycle = self.registry.implementation(id).lifecycle;
                if config.lifecycle.enabled && lifecycle.any() {
                    hooks.push((
                        id,
                        HookTarget {
                            local: planned.local.as_str(),
                            on_mount: lifecycle.on_mount,
                            on_unmount: lifecycle.on_unmount,
                        },
                    ));
                }
            }
        }

        for passthrough in &normalized.passthrough {
            statements.push(emit::binding(
                &passthrough.local,
                param,
                services,
                &passthrough.property,
                None,
            ));
        }

        let entries: Vec<(&str, &str)> = normalized
            .bindings
            .iter()
            .map(|b| (site.requests[b.request].property.as_str(), b.local.as_str()))
            .collect();

        if let Some(alias) = &normalized.services_alias {
            statements.push(format!(
                "const {alias} = {};",
                emit::services_object(param, services, &entries)
            ));
        }

        if let Some(rest) = &normalized.rest {
            if let Some(collected) = &rest.collected {
                statements.push(format!(
                    "const {} = {{ ...{collected}, {services}: {} }};",
                    rest.name,
                    emit::services_object(param, services, &entries)
                ));
            }
        }

        if !hooks.is_empty() {
            // Hooks run in service registration order, not request order.
            hooks.sort_by_key(|(id, _)| *id);
            let hooks: Vec<HookTarget<'_>> = hooks.into_iter().map(|(_, hook)| hook).collect();
            let mut controller = "controller".to_string();
            while normalized.bindings.iter().any(|b| b.local == controller)
                || site.reserved_names.contains(&controller)
            {
                controller.push('_');
            }
            needed.effect = true;
            statements.push(emit::lifecycle_effect(config, &hooks, &controller, &site.indent));
        }

        if let Some(replacement) = &normalized.param_replacement {
            edits.replace(site.param_span.start, site.param_span.end, replacement.clone());
        }

        if normalized.rewrite_inline {
            for inline in &site.inline_refs {
                if let Some(binding) = normalized
                    .bindings
                    .iter()
                    .find(|b| site.requests[b.request].property == inline.property)
                {
                    edits.replace(inline.span.start, inline.span.end, binding.local.clone());
                }
            }
        }

        let indent = site.indent.as_str();
        let block: String = statements
            .iter()
            .map(|stmt| format!("\n{indent}{stmt}"))
            .collect();

        match site.body {
            SiteBody::Block { insert_at } => edits.insert(insert_at, block),
            SiteBody::Expression { span } => {
                let outer = indent.strip_suffix("  ").unwrap_or("");
                edits.insert(span.start, format!("{{{block}\n{indent}return ("));
                edits.insert(span.end, format!(");\n{outer}}}"));
            }
        }
    }
}

/// Runtime names a file needs imported.
#[derive(Debug, Default)]
struct NeededImports {
    lookup: bool,
    optional_lookup: bool,
    effect: bool,
}

impl NeededImports {
    fn note(&mut self, fallback: &Fallback) {
        match fallback {
            Fallback::Lookup(_) => self.lookup = true,
            Fallback::OptionalLookup(_) => self.optional_lookup = true,
            Fallback::Throwing(_) | Fallback::Undefined => {}
        }
    }

    /// Add import declarations for names not already imported.
    fn emit(&self, config: &WeaveConfig, model: &FileModel, edits: &mut SourceEdits) {
        let runtime = &config.runtime;
        let lifecycle = &config.lifecycle;

        let mut modules: Vec<(&str, Vec<&str>)> = Vec::new();
        if self.lookup {
            add_import(&mut modules, model, &runtime.module, &runtime.lookup);
        }
        if self.optional_lookup {
            add_import(&mut modules, model, &runtime.module, &runtime.optional_lookup);
        }
        if self.effect {
            add_import(&mut modules, model, &lifecycle.effect_module, &lifecycle.effect_hook);
        }

        if modules.is_empty() {
            return;
        }

        let declarations: Vec<String> = modules
            .iter()
            .map(|(module, names)| emit::import_declaration(names, module))
            .collect();
        let text = if model.import_insert_at == 0 {
            format!("{}\n", declarations.join("\n"))
        } else {
            declarations
                .iter()
                .map(|d| format!("\n{d}"))
                .collect()
        };
        edits.insert(model.import_insert_at, text);
    }
}

fn add_import<'c>(
    modules: &mut Vec<(&'c str, Vec<&'c str>)>,
    model: &FileModel,
    module: &'c str,
    name: &'c str,
) {
    if model.imports_local(name) {
        return;
    }
    match modules.iter_mut().find(|(m, _)| *m == module) {
        Some((_, names)) if !names.contains(&name) => names.push(name),
        Some(_) => {}
        None => modules.push((module, vec![name])),
    }
}

#[cfg(test)]
mod tests;

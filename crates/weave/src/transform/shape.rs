//! Parameter shapes of injection sites and their normalization.
//!
//! A component can receive its services in four ways:
//!
//! ```text
//! InlineAccess        function Card(props: Props)            props.services.todo
//! TopDestructure      function Card({ services }: Props)     services.todo
//! NestedDestructure   function Card({ services: { todo } })  todo
//! RestSpread          function Card({ title, ...rest })      rest.services.todo
//! ```
//!
//! Every shape is normalized to one named parameter plus a block of
//! statements that recreate the bindings the body expects. Emission then only
//! has to deal with that single form.

use rustc_hash::FxHashSet;
use serde::Serialize;

use crate::extract::InjectionSite;

/// A destructured `property: local` pair inside the services pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceBinding {
    pub property: String,
    pub local: String,
}

/// How the services property is bound inside a rest-spread pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ServicesPattern {
    Whole(String),
    Nested(Vec<ServiceBinding>),
}

/// Closed set of recognized first-parameter shapes.
///
/// `others` holds the other property patterns verbatim (`title`,
/// `count = 0`, `onSave: save`) so they can be re-emitted unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParamShape {
    InlineAccess {
        param: String,
    },
    TopDestructure {
        services: String,
        others: Vec<String>,
    },
    NestedDestructure {
        bindings: Vec<ServiceBinding>,
        others: Vec<String>,
    },
    RestSpread {
        rest: String,
        services: Option<ServicesPattern>,
        others: Vec<String>,
    },
}

impl ParamShape {
    pub fn name(&self) -> &'static str {
        match self {
            ParamShape::InlineAccess { .. } => "inline access",
            ParamShape::TopDestructure { .. } => "top-level destructure",
            ParamShape::NestedDestructure { .. } => "nested destructure",
            ParamShape::RestSpread { .. } => "rest spread",
        }
    }

    /// Locals introduced by the pattern itself.
    fn pattern_locals(&self) -> Vec<&str> {
        match self {
            ParamShape::InlineAccess { param } => vec![param.as_str()],
            ParamShape::TopDestructure { services, .. } => vec![services.as_str()],
            ParamShape::NestedDestructure { bindings, .. } => {
                bindings.iter().map(|b| b.local.as_str()).collect()
            }
            ParamShape::RestSpread { rest, services, .. } => {
                let mut locals = vec![rest.as_str()];
                match services {
                    Some(ServicesPattern::Whole(name)) => locals.push(name),
                    Some(ServicesPattern::Nested(bindings)) => {
                        locals.extend(bindings.iter().map(|b| b.local.as_str()))
                    }
                    None => {}
                }
                locals
            }
        }
    }
}

/// A request bound to a local in the rewritten body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PlannedBinding {
    /// Index into the site's requests.
    pub request: usize,
    pub local: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RestPlan {
    pub name: String,
    /// Intermediate name holding the remaining props when services must be re-attached.
    pub collected: Option<String>,
}

/// The single-parameter form every shape reduces to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct NormalizedParam {
    pub param: String,
    /// Replacement text for the original parameter, if it changes.
    pub param_replacement: Option<String>,
    pub bindings: Vec<PlannedBinding>,
    /// Destructured services with no matching request; bound without a lookup.
    pub passthrough: Vec<ServiceBinding>,
    /// `const { ... } = props;` recreating the non-service properties.
    pub prelude: Option<String>,
    pub services_alias: Option<String>,
    pub rest: Option<RestPlan>,
    /// Rewrite `param.services.x` member chains to the bound locals.
    pub rewrite_inline: bool,
}

fn unique_name(base: &str, taken: &mut FxHashSet<String>) -> String {
    let mut candidate = base.to_string();
    while taken.contains(&candidate) {
        candidate.push('_');
    }
    taken.insert(candidate.clone());
    candidate
}

fn bind_all(site: &InjectionSite, taken: &mut FxHashSet<String>) -> Vec<PlannedBinding> {
    site.requests
        .iter()
        .enumerate()
        .map(|(request, req)| PlannedBinding {
            request,
            local: unique_name(&req.property, taken),
        })
        .collect()
}

fn bind_nested(
    site: &InjectionSite,
    nested: &[ServiceBinding],
    passthrough: &mut Vec<ServiceBinding>,
) -> Vec<PlannedBinding> {
    let mut planned = Vec::new();
    for binding in nested {
        match site
            .requests
            .iter()
            .position(|r| r.property == binding.property)
        {
            Some(request) => planned.push(PlannedBinding {
                request,
                local: binding.local.clone(),
            }),
            None => passthrough.push(binding.clone()),
        }
    }
    planned
}

/// Reduce a site's parameter to one named parameter plus planned bindings.
pub(crate) fn normalize(site: &InjectionSite, services_property: &str) -> NormalizedParam {
    let mut taken: FxHashSet<String> = site.reserved_names.iter().cloned().collect();
    taken.extend(site.shape.pattern_locals().into_iter().map(str::to_string));

    let param = match &site.shape {
        ParamShape::InlineAccess { param } => param.clone(),
        _ => unique_name("props", &mut taken),
    };

    let param_replacement = match &site.shape {
        ParamShape::InlineAccess { .. } => None,
        _ => Some(match &site.param_type {
            Some(ty) => format!("{param}: {ty}"),
            None => param.clone(),
        }),
    };

    let mut bindings = Vec::new();
    let mut passthrough = Vec::new();
    let mut services_alias = None;
    let mut rest = None;
    let mut prelude_parts: Vec<String> = Vec::new();

    match &site.shape {
        ParamShape::InlineAccess { .. } => {
            bindings = bind_all(site, &mut taken);
        }
        ParamShape::TopDestructure { services, others } => {
            bindings = bind_all(site, &mut taken);
            services_alias = Some(services.clone());
            prelude_parts.extend(others.iter().cloned());
        }
        ParamShape::NestedDestructure {
            bindings: nested,
            others,
        } => {
            bindings = bind_nested(site, nested, &mut passthrough);
            prelude_parts.extend(others.iter().cloned());
        }
        ParamShape::RestSpread {
            rest: rest_name,
            services,
            others,
        } => {
            prelude_parts.extend(others.iter().cloned());
            match services {
                None => {
                    bindings = bind_all(site, &mut taken);
                    let collected = unique_name("__rest", &mut taken);
                    prelude_parts.push(format!("...{collected}"));
                    rest = Some(RestPlan {
                        name: rest_name.clone(),
                        collected: Some(collected),
                    });
                }
                Some(pattern) => {
                    let omitted = unique_name("__services", &mut taken);
                    prelude_parts.push(format!("{services_property}: {omitted}"));
                    prelude_parts.push(format!("...{rest_name}"));
                    rest = Some(RestPlan {
                        name: rest_name.clone(),
                        collected: None,
                    });
                    match pattern {
                        ServicesPattern::Whole(alias) => {
                            bindings = bind_all(site, &mut taken);
                            services_alias = Some(alias.clone());
                        }
                        ServicesPattern::Nested(nested) => {
                            bindings = bind_nested(site, nested, &mut passthrough);
                        }
                    }
                }
            }
        }
    }

    let prelude = (!prelude_parts.is_empty())
        .then(|| format!("const {{ {} }} = {param};", prelude_parts.join(", ")));

    NormalizedParam {
        rewrite_inline: matches!(site.shape, ParamShape::InlineAccess { .. }),
        param,
        param_replacement,
        bindings,
        passthrough,
        prelude,
        services_alias,
        rest,
    }
}

//! Injection sites: functions whose first parameter carries injected services.

use oxc_ast::ast::{
    ArrowFunctionExpression, BindingPattern, BindingPatternKind, Expression, FormalParameter,
    FormalParameters, Function, FunctionBody, ObjectPattern, Statement, StaticMemberExpression,
    VariableDeclarator,
};
use oxc_ast_visit::{Visit, walk};
use oxc_semantic::ScopeFlags;
use oxc_span::{GetSpan, Span};
use serde::Serialize;

use super::scope::FileScope;
use super::utils::{compact, indentation_at};
use crate::model::{InjectionRequest, SourceLocation};
use crate::transform::shape::{ParamShape, ServiceBinding, ServicesPattern};

/// Where generated statements go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SiteBody {
    /// Block body; statements are inserted at `insert_at`.
    Block { insert_at: u32 },
    /// Expression-bodied arrow; the expression is wrapped in a block.
    Expression {
        #[serde(skip)]
        span: Span,
    },
}

/// A `param.services.name` member chain in the body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineRef {
    #[serde(skip)]
    pub span: Span,
    pub property: String,
}

/// A binding already produced by an earlier run, e.g.
/// `const todo = props.services?.todo ?? useService("...")`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExistingBinding {
    pub property: String,
    pub local: String,
}

/// A component function with injection requests.
#[derive(Debug, Clone, Serialize)]
pub struct InjectionSite {
    pub component: Option<String>,
    pub location: SourceLocation,
    pub shape: ParamShape,
    pub requests: Vec<InjectionRequest>,
    #[serde(skip)]
    pub param_span: Span,
    /// Type annotation of the parameter, as written.
    pub param_type: Option<String>,
    pub body: SiteBody,
    /// Indentation for generated statements.
    #[serde(skip)]
    pub indent: String,
    pub inline_refs: Vec<InlineRef>,
    pub bound: Vec<ExistingBinding>,
    /// Names a generated local must not take: other pattern properties, the
    /// body's top-level declarations, and the file's module-scope bindings.
    pub reserved_names: Vec<String>,
}

impl InjectionSite {
    pub fn is_already_resolved(&self) -> bool {
        !self.bound.is_empty()
    }

    pub fn display_name(&self) -> &str {
        self.component.as_deref().unwrap_or("<anonymous>")
    }
}

/// Why a parameter with injection requests could not be classified.
pub(crate) struct UnsupportedShape(pub String);

/// Classify the first parameter of a function.
///
/// `Ok(None)` means the pattern does not bind services at all.
pub(crate) fn classify_param(
    scope: &FileScope<'_>,
    param: &FormalParameter<'_>,
    reserved: &mut Vec<String>,
) -> Result<Option<ParamShape>, UnsupportedShape> {
    let services_property = scope.config.markers.services_property.as_str();

    match &param.pattern.kind {
        BindingPatternKind::BindingIdentifier(id) => Ok(Some(ParamShape::InlineAccess {
            param: id.name.to_string(),
        })),
        BindingPatternKind::ObjectPattern(object) => {
            classify_object(scope, object, services_property, reserved)
        }
        BindingPatternKind::AssignmentPattern(_) => Err(UnsupportedShape(
            "a parameter with a default value cannot receive injected services".to_string(),
        )),
        _ => Err(UnsupportedShape(
            "array patterns cannot receive injected services".to_string(),
        )),
    }
}

fn classify_object(
    scope: &FileScope<'_>,
    object: &ObjectPattern<'_>,
    services_property: &str,
    reserved: &mut Vec<String>,
) -> Result<Option<ParamShape>, UnsupportedShape> {
    let mut others = Vec::new();
    let mut services: Option<ServicesPattern> = None;

    for property in &object.properties {
        let key = if property.computed {
            None
        } else {
            property.key.static_name()
        };

        if key.as_deref() == Some(services_property) {
            services = Some(match &property.value.kind {
                BindingPatternKind::BindingIdentifier(id) => {
                    ServicesPattern::Whole(id.name.to_string())
                }
                BindingPatternKind::ObjectPattern(inner) => {
                    ServicesPattern::Nested(nested_bindings(inner)?)
                }
                _ => {
                    return Err(UnsupportedShape(format!(
                        "the '{services_property}' property must be bound to a name or destructured"
                    )));
                }
            });
        } else {
            collect_pattern_names(&property.value, reserved);
            others.push(scope.text(property.span).to_string());
        }
    }

    let rest = match &object.rest {
        Some(rest) => match &rest.argument.kind {
            BindingPatternKind::BindingIdentifier(id) => Some(id.name.to_string()),
            _ => {
                return Err(UnsupportedShape(
                    "rest element must be bound to a name".to_string(),
                ));
            }
        },
        None => None,
    };

    Ok(match (rest, services) {
        (Some(rest), services) => Some(ParamShape::RestSpread {
            rest,
            services,
            others,
        }),
        (None, Some(ServicesPattern::Whole(name))) => Some(ParamShape::TopDestructure {
            services: name,
            others,
        }),
        (None, Some(ServicesPattern::Nested(bindings))) => {
            Some(ParamShape::NestedDestructure { bindings, others })
        }
        (None, None) => None,
    })
}

fn nested_bindings(inner: &ObjectPattern<'_>) -> Result<Vec<ServiceBinding>, UnsupportedShape> {
    if inner.rest.is_some() {
        return Err(UnsupportedShape(
            "rest elements inside the services pattern are not supported".to_string(),
        ));
    }

    inner
        .properties
        .iter()
        .map(|property| {
            let key = (!property.computed)
                .then(|| property.key.static_name())
                .flatten();
            match (key, &property.value.kind) {
                (Some(key), BindingPatternKind::BindingIdentifier(local)) => Ok(ServiceBinding {
                    property: key.to_string(),
                    local: local.name.to_string(),
                }),
                _ => Err(UnsupportedShape(
                    "services may only be destructured to plain names".to_string(),
                )),
            }
        })
        .collect()
}

pub(crate) fn collect_pattern_names(pattern: &BindingPattern<'_>, out: &mut Vec<String>) {
    match &pattern.kind {
        BindingPatternKind::BindingIdentifier(id) => out.push(id.name.to_string()),
        BindingPatternKind::ObjectPattern(object) => {
            for property in &object.properties {
                collect_pattern_names(&property.value, out);
            }
            if let Some(rest) = &object.rest {
                collect_pattern_names(&rest.argument, out);
            }
        }
        BindingPatternKind::ArrayPattern(array) => {
            for element in array.elements.iter().flatten() {
                collect_pattern_names(element, out);
            }
            if let Some(rest) = &array.rest {
                collect_pattern_names(&rest.argument, out);
            }
        }
        BindingPatternKind::AssignmentPattern(assign) => collect_pattern_names(&assign.left, out),
    }
}

/// Where to insert statements in a block body: after any directives.
pub(crate) fn block_insert_offset(body: &FunctionBody<'_>) -> u32 {
    body.directives
        .last()
        .map(|d| d.span.end)
        .unwrap_or(body.span.start + 1)
}

/// Indentation used for statements generated inside `body`.
pub(crate) fn body_indent(scope: &FileScope<'_>, body: &FunctionBody<'_>, expression: bool) -> String {
    if !expression {
        if let Some(first) = body.statements.first() {
            return indentation_at(scope.source, &scope.lines, first.span().start);
        }
    }
    format!("{}  ", indentation_at(scope.source, &scope.lines, body.span.start))
}

/// Top-level names declared directly in a function body.
pub(crate) fn body_declared_names(body: &FunctionBody<'_>, out: &mut Vec<String>) {
    for stmt in &body.statements {
        match stmt {
            Statement::VariableDeclaration(decl) => {
                for declarator in &decl.declarations {
                    collect_pattern_names(&declarator.id, out);
                }
            }
            Statement::FunctionDeclaration(func) => {
                if let Some(id) = &func.id {
                    out.push(id.name.to_string());
                }
            }
            Statement::ClassDeclaration(class) => {
                if let Some(id) = &class.id {
                    out.push(id.name.to_string());
                }
            }
            _ => {}
        }
    }
}

/// Scans a function body for inline service accesses and earlier rewrites.
pub(crate) struct BodyScanner<'s> {
    source: &'s str,
    param: Option<&'s str>,
    services_property: &'s str,
    lookups: [&'s str; 2],
    pub inline_refs: Vec<InlineRef>,
    pub bound: Vec<ExistingBinding>,
}

impl<'s> BodyScanner<'s> {
    pub fn new(
        source: &'s str,
        param: Option<&'s str>,
        services_property: &'s str,
        lookups: [&'s str; 2],
    ) -> Self {
        Self {
            source,
            param,
            services_property,
            lookups,
            inline_refs: Vec::new(),
            bound: Vec::new(),
        }
    }

    fn text(&self, span: Span) -> &'s str {
        super::utils::slice(self.source, span)
    }

    /// `true` if a nested function rebinds the parameter name.
    fn shadows_param(&self, params: &FormalParameters<'_>) -> bool {
        let Some(param) = self.param else {
            return false;
        };
        let mut names = Vec::new();
        for item in &params.items {
            collect_pattern_names(&item.pattern, &mut names);
        }
        if let Some(rest) = &params.rest {
            collect_pattern_names(&rest.argument, &mut names);
        }
        names.iter().any(|name| name == param)
    }
}

impl<'a> Visit<'a> for BodyScanner<'_> {
    fn visit_function(&mut self, func: &Function<'a>, flags: ScopeFlags) {
        if !self.shadows_param(&func.params) {
            walk::walk_function(self, func, flags);
        }
    }

    fn visit_arrow_function_expression(&mut self, arrow: &ArrowFunctionExpression<'a>) {
        if !self.shadows_param(&arrow.params) {
            walk::walk_arrow_function_expression(self, arrow);
        }
    }

    fn visit_variable_declarator(&mut self, declarator: &VariableDeclarator<'a>) {
        if let (BindingPatternKind::BindingIdentifier(local), Some(init)) =
            (&declarator.id.kind, &declarator.init)
        {
            // Earlier output: `const x = <param>.<services>?.<prop> ?? <lookup>(...)`.
            let text = compact(self.text(init.span()));
            if let Some((left, right)) = text.split_once("??") {
                let prefix = format!("{}?.", self.services_property);
                let chain = left.split_once('.').map(|(_, chain)| chain);
                let is_lookup = right.starts_with(self.lookups[0])
                    || right.starts_with(self.lookups[1])
                    || right.starts_with("newProxy(")
                    || right == "undefined";
                if let Some(property) = chain.and_then(|c| c.strip_prefix(prefix.as_str())) {
                    if is_lookup && !property.is_empty() && !property.contains(['.', '?']) {
                        self.bound.push(ExistingBinding {
                            property: property.to_string(),
                            local: local.name.to_string(),
                        });
                    }
                }
            }
        }
        walk::walk_variable_declarator(self, declarator);
    }

    fn visit_static_member_expression(&mut self, expr: &StaticMemberExpression<'a>) {
        if let (Some(param), Expression::StaticMemberExpression(inner)) = (self.param, &expr.object)
        {
            if let Expression::Identifier(object) = &inner.object {
                if object.name.as_str() == param
                    && inner.property.name.as_str() == self.services_property
                    && !inner.optional
                    && !expr.optional
                {
                    self.inline_refs.push(InlineRef {
                        span: expr.span,
                        property: expr.property.name.to_string(),
                    });
                    return;
                }
            }
        }
        walk::walk_static_member_expression(self, expr);
    }
}

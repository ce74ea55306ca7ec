//! AST visitor producing contracts, implementations and injection sites.

use std::collections::BTreeSet;

use oxc_ast::ast::{
    Argument, ArrayExpressionElement, ArrowFunctionExpression, BindingPatternKind, CallExpression,
    Class, ClassElement, Expression, FormalParameters, Function, FunctionBody,
    MethodDefinitionKind, ObjectPropertyKind, Statement, TSInterfaceDeclaration, TSType,
    TSTypeAliasDeclaration, TSTypeName, TSTypeParameterDeclaration, VariableDeclarator,
};
use oxc_ast_visit::{Visit, walk};
use oxc_semantic::ScopeFlags;
use oxc_span::{GetSpan, Span};

use super::scope::{FileScope, Marker};
use super::site::{
    BodyScanner, InjectionSite, SiteBody, block_insert_offset, body_declared_names, body_indent,
    classify_param,
};
use crate::model::{
    ContractDescriptor, ContractRef, DependencyRef, ImplementationDescriptor, InjectionRequest,
    LifecycleHooks, Scope, ServiceMetadata,
};
use crate::transform::shape::ParamShape;
use crate::validate::ValidationIssue;

pub(crate) struct ModelVisitor<'s, 'c> {
    scope: &'s FileScope<'c>,
    pub contracts: Vec<ContractDescriptor>,
    pub implementations: Vec<ImplementationDescriptor>,
    pub sites: Vec<InjectionSite>,
    pub issues: Vec<ValidationIssue>,
    /// Name of the variable whose initializer is being visited.
    pending_name: Option<String>,
    /// Props requests taken from a `FC<Props>`-style variable annotation.
    pending_props: Option<Vec<InjectionRequest>>,
}

impl<'s, 'c> ModelVisitor<'s, 'c> {
    pub fn new(scope: &'s FileScope<'c>) -> Self {
        Self {
            scope,
            contracts: Vec::new(),
            implementations: Vec::new(),
            sites: Vec::new(),
            issues: Vec::new(),
            pending_name: None,
            pending_props: None,
        }
    }

    fn type_param_names(params: Option<&TSTypeParameterDeclaration<'_>>) -> Vec<String> {
        params
            .map(|decl| decl.params.iter().map(|p| p.name.name.to_string()).collect())
            .unwrap_or_default()
    }

    fn malformed(&mut self, message: impl Into<String>, span: Span) {
        let location = self.scope.location(span);
        self.issues
            .push(ValidationIssue::malformed(message, Some(location)));
    }

    // ---- services -------------------------------------------------------

    fn extract_service(&mut self, class: &Class<'_>) {
        let config = self.scope.config;
        let annotations = &config.annotations;
        let mut is_service = false;
        let mut metadata = ServiceMetadata::default();

        for decorator in &class.decorators {
            let Some((name, call)) = decorator_call(&decorator.expression) else {
                continue;
            };

            if annotations.service.iter().any(|s| s == name) {
                is_service = true;
                if let Some(call) = call {
                    self.read_service_options(call, &mut metadata);
                }
            } else if name == annotations.primary {
                metadata.is_primary = true;
            } else if name == annotations.qualifier {
                match call.and_then(first_string_arg) {
                    Some(q) => metadata.qualifier = Some(q),
                    None => self.malformed(
                        format!("@{name} needs a string argument"),
                        decorator.span,
                    ),
                }
            } else if name == annotations.profile {
                let profiles = call.map(string_args).unwrap_or_default();
                if profiles.is_empty() {
                    self.malformed(
                        format!("@{name} needs at least one profile name"),
                        decorator.span,
                    );
                }
                metadata.profiles.extend(profiles);
            } else if name == annotations.scope {
                match call.and_then(first_string_arg) {
                    Some(value) => self.apply_scope(&value, &mut metadata, decorator.span),
                    None => self.malformed(
                        format!("@{name} needs a string argument"),
                        decorator.span,
                    ),
                }
            }
        }

        if !is_service {
            return;
        }

        let anchor = class.id.as_ref().map_or(class.span, |id| id.span);
        let Some(name) = class
            .id
            .as_ref()
            .map(|id| id.name.to_string())
            .or_else(|| self.pending_name.clone())
        else {
            self.malformed("anonymous classes cannot be registered as services", class.span);
            return;
        };

        let type_params = Self::type_param_names(class.type_parameters.as_deref());
        let location = self.scope.location(anchor);

        let mut implements = Vec::new();
        for clause in &class.implements {
            match &clause.expression {
                TSTypeName::IdentifierReference(id) => implements.push(
                    self.scope
                        .contract_ref(id.name.as_str(), clause.type_arguments.as_deref()),
                ),
                _ => self.malformed(
                    format!(
                        "{name} implements a qualified name; import the contract directly"
                    ),
                    clause.span,
                ),
            }
        }

        if implements.is_empty() && class.implements.is_empty() {
            // A service without `implements` is injectable by its own class name.
            self.contracts.push(ContractDescriptor {
                name: name.clone(),
                type_params: type_params.clone(),
                location: location.clone(),
            });
            implements.push(
                ContractRef::local(name.clone(), self.scope.path).with_type_args(type_params.clone()),
            );
        }

        let mut dependencies = Vec::new();
        let mut lifecycle = LifecycleHooks::default();
        let lifecycle_names = &config.lifecycle;

        for element in &class.body.body {
            let ClassElement::MethodDefinition(method) = element else {
                continue;
            };
            match method.kind {
                MethodDefinitionKind::Constructor => {
                    dependencies = self.constructor_dependencies(&name, &method.value.params);
                }
                MethodDefinitionKind::Method if !method.r#static => {
                    match method.key.static_name().as_deref() {
                        Some(key) if key == lifecycle_names.mount => lifecycle.on_mount = true,
                        Some(key) if key == lifecycle_names.unmount => lifecycle.on_unmount = true,
                        _ => {}
                    }
                }
                _ => {}
            }
        }

        tracing::trace!(service = %name, file = self.scope.path, "found service");

        self.implementations.push(ImplementationDescriptor {
            name,
            type_params,
            implements,
            metadata,
            dependencies,
            lifecycle,
            location,
        });
    }

    fn apply_scope(&mut self, value: &str, metadata: &mut ServiceMetadata, span: Span) {
        match value.parse::<Scope>() {
            Ok(scope) => metadata.scope = scope,
            Err(message) => {
                metadata.scope = Scope::default();
                self.malformed(message, span);
            }
        }
    }

    /// `@Service({ scope, qualifier, primary, profiles })`.
    fn read_service_options(&mut self, call: &CallExpression<'_>, metadata: &mut ServiceMetadata) {
        let Some(Argument::ObjectExpression(options)) = call.arguments.first() else {
            return;
        };

        for property in &options.properties {
            let ObjectPropertyKind::ObjectProperty(property) = property else {
                continue;
            };
            let Some(key) = property.key.static_name() else {
                continue;
            };
            match (&*key, &property.value) {
                ("scope", Expression::StringLiteral(s)) => {
                    self.apply_scope(s.value.as_str(), metadata, property.span)
                }
                ("qualifier", Expression::StringLiteral(s)) => {
                    metadata.qualifier = Some(s.value.to_string())
                }
                ("primary", Expression::BooleanLiteral(b)) => metadata.is_primary = b.value,
                ("profile" | "profiles", Expression::StringLiteral(s)) => {
                    metadata.profiles.insert(s.value.to_string());
                }
                ("profile" | "profiles", Expression::ArrayExpression(array)) => {
                    for element in &array.elements {
                        if let ArrayExpressionElement::StringLiteral(s) = element {
                            metadata.profiles.insert(s.value.to_string());
                        }
                    }
                }
                (other, _) => self.malformed(
                    format!("unsupported or non-literal service option '{other}'"),
                    property.span,
                ),
            }
        }
    }

    fn constructor_dependencies(
        &mut self,
        service: &str,
        params: &FormalParameters<'_>,
    ) -> Vec<DependencyRef> {
        let scope = self.scope;
        let annotations = &scope.config.annotations;
        let mut dependencies = Vec::new();

        for param in &params.items {
            let parameter = match &param.pattern.kind {
                BindingPatternKind::BindingIdentifier(id) => id.name.to_string(),
                _ => scope.text(param.span).to_string(),
            };
            let ty = param
                .pattern
                .type_annotation
                .as_ref()
                .map(|a| &a.type_annotation);

            let mut inject_decorated = false;
            let mut decorator_qualifier = None;
            for decorator in &param.decorators {
                let Some((name, call)) = decorator_call(&decorator.expression) else {
                    continue;
                };
                if name == annotations.inject {
                    inject_decorated = true;
                    if let Some(q) = call.and_then(first_string_arg) {
                        decorator_qualifier = Some(q);
                    }
                } else if name == annotations.qualifier {
                    decorator_qualifier = call.and_then(first_string_arg);
                }
            }

            let marker = ty.map(|ty| scope.read_marker(ty));
            match marker {
                Some(Marker::Request {
                    contract,
                    required,
                    qualifier,
                }) => dependencies.push(DependencyRef {
                    contract,
                    required: required && !param.pattern.optional,
                    qualifier: qualifier.or(decorator_qualifier),
                    parameter,
                }),
                Some(Marker::Malformed(message)) => self.malformed(message, param.span),
                Some(Marker::NotMarker) | None if inject_decorated => {
                    match ty.and_then(|ty| scope.contract_from_type(ty)) {
                        Some(contract) => dependencies.push(DependencyRef {
                            contract,
                            required: !param.pattern.optional,
                            qualifier: decorator_qualifier,
                            parameter,
                        }),
                        None => self.malformed(
                            format!(
                                "injected parameter '{parameter}' of {service} needs a contract type"
                            ),
                            param.span,
                        ),
                    }
                }
                _ => {}
            }
        }

        dependencies
    }

    // ---- injection sites ------------------------------------------------

    fn try_site(
        &mut self,
        name: Option<String>,
        props_from_variable: Option<Vec<InjectionRequest>>,
        params: &FormalParameters<'_>,
        body: Option<&FunctionBody<'_>>,
        expression: bool,
        span: Span,
    ) {
        let Some(first) = params.items.first() else {
            return;
        };

        let annotation = first.pattern.type_annotation.as_ref();
        let requests = match annotation {
            Some(annotation) => self
                .scope
                .requests_for_param_type(&annotation.type_annotation, &mut self.issues),
            None => props_from_variable.unwrap_or_default(),
        };
        if requests.is_empty() {
            return;
        }

        let mut reserved = Vec::new();
        let shape = match classify_param(self.scope, first, &mut reserved) {
            Ok(Some(shape)) => shape,
            Ok(None) => return,
            Err(unsupported) => {
                let component = name.as_deref().unwrap_or("component");
                self.malformed(
                    format!("{component}: {}; left unchanged", unsupported.0),
                    first.span,
                );
                return;
            }
        };

        let Some(body) = body else {
            return;
        };

        body_declared_names(body, &mut reserved);
        for other in params.items.iter().skip(1) {
            if let BindingPatternKind::BindingIdentifier(id) = &other.pattern.kind {
                reserved.push(id.name.to_string());
            }
        }
        reserved.extend(self.scope.module_names.iter().cloned());

        let site_body = if expression {
            match body.statements.first() {
                Some(Statement::ExpressionStatement(stmt)) => SiteBody::Expression {
                    span: stmt.expression.span(),
                },
                _ => return,
            }
        } else {
            SiteBody::Block {
                insert_at: block_insert_offset(body),
            }
        };

        let config = self.scope.config;
        let inline_param = match &shape {
            ParamShape::InlineAccess { param } => Some(param.as_str()),
            _ => None,
        };
        let mut scanner = BodyScanner::new(
            self.scope.source,
            inline_param,
            &config.markers.services_property,
            [&config.runtime.lookup, &config.runtime.optional_lookup],
        );
        scanner.visit_function_body(body);
        let BodyScanner {
            inline_refs, bound, ..
        } = scanner;

        tracing::trace!(
            component = name.as_deref().unwrap_or("<anonymous>"),
            shape = shape.name(),
            requests = requests.len(),
            "found injection site"
        );

        self.sites.push(InjectionSite {
            component: name,
            location: self.scope.location(span),
            requests,
            param_span: first.span,
            param_type: annotation.map(|a| self.scope.text(a.type_annotation.span()).to_string()),
            body: site_body,
            indent: body_indent(self.scope, body, expression),
            inline_refs,
            bound,
            reserved_names: reserved,
            shape,
        });
    }

    /// `const Card: FC<CardProps> = (...) => ...` gives the props type via the variable.
    fn props_from_variable_type(&mut self, declarator: &VariableDeclarator<'_>) -> Option<Vec<InjectionRequest>> {
        let annotation = declarator.id.type_annotation.as_ref()?;
        let TSType::TSTypeReference(reference) = &annotation.type_annotation else {
            return None;
        };
        let props = reference.type_arguments.as_ref()?.params.first()?;
        let requests = self.scope.requests_for_param_type(props, &mut self.issues);
        (!requests.is_empty()).then_some(requests)
    }
}

impl<'a> Visit<'a> for ModelVisitor<'_, '_> {
    fn visit_ts_interface_declaration(&mut self, decl: &TSInterfaceDeclaration<'a>) {
        self.contracts.push(ContractDescriptor {
            name: decl.id.name.to_string(),
            type_params: Self::type_param_names(decl.type_parameters.as_deref()),
            location: self.scope.location(decl.span),
        });
        walk::walk_ts_interface_declaration(self, decl);
    }

    fn visit_ts_type_alias_declaration(&mut self, decl: &TSTypeAliasDeclaration<'a>) {
        if matches!(decl.type_annotation, TSType::TSTypeLiteral(_)) {
            self.contracts.push(ContractDescriptor {
                name: decl.id.name.to_string(),
                type_params: Self::type_param_names(decl.type_parameters.as_deref()),
                location: self.scope.location(decl.span),
            });
        }
        walk::walk_ts_type_alias_declaration(self, decl);
    }

    fn visit_class(&mut self, class: &Class<'a>) {
        self.extract_service(class);
        self.pending_name = None;
        walk::walk_class(self, class);
    }

    fn visit_variable_declarator(&mut self, declarator: &VariableDeclarator<'a>) {
        let names_function = matches!(
            declarator.init,
            Some(
                Expression::ArrowFunctionExpression(_)
                    | Expression::FunctionExpression(_)
                    | Expression::CallExpression(_)
                    | Expression::ClassExpression(_)
            )
        );

        if let (true, BindingPatternKind::BindingIdentifier(id)) = (names_function, &declarator.id.kind) {
            self.pending_name = Some(id.name.to_string());
            self.pending_props = self.props_from_variable_type(declarator);
        }

        walk::walk_variable_declarator(self, declarator);
        self.pending_name = None;
        self.pending_props = None;
    }

    fn visit_function(&mut self, func: &Function<'a>, flags: ScopeFlags) {
        let pending = self.pending_name.take();
        let props = self.pending_props.take();
        let name = func.id.as_ref().map(|id| id.name.to_string()).or(pending);
        self.try_site(name, props, &func.params, func.body.as_deref(), false, func.span);
        walk::walk_function(self, func, flags);
    }

    fn visit_arrow_function_expression(&mut self, arrow: &ArrowFunctionExpression<'a>) {
        let name = self.pending_name.take();
        let props = self.pending_props.take();
        self.try_site(name, props, &arrow.params, Some(&*arrow.body), arrow.expression, arrow.span);
        walk::walk_arrow_function_expression(self, arrow);
    }
}

/// `@Name` or `@Name(...)`.
fn decorator_call<'x, 'a>(
    expression: &'x Expression<'a>,
) -> Option<(&'x str, Option<&'x CallExpression<'a>>)> {
    match expression {
        Expression::Identifier(id) => Some((id.name.as_str(), None)),
        Expression::CallExpression(call) => match &call.callee {
            Expression::Identifier(id) => Some((id.name.as_str(), Some(&**call))),
            _ => None,
        },
        _ => None,
    }
}

fn first_string_arg(call: &CallExpression<'_>) -> Option<String> {
    match call.arguments.first()? {
        Argument::StringLiteral(s) => Some(s.value.to_string()),
        _ => None,
    }
}

/// String arguments, either variadic or as one array literal.
fn string_args(call: &CallExpression<'_>) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    for argument in &call.arguments {
        match argument {
            Argument::StringLiteral(s) => {
                out.insert(s.value.to_string());
            }
            Argument::ArrayExpression(array) => {
                for element in &array.elements {
                    if let ArrayExpressionElement::StringLiteral(s) = element {
                        out.insert(s.value.to_string());
                    }
                }
            }
            _ => {}
        }
    }
    out
}

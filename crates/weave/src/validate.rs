//! Validation of the resolved configuration.
//!
//! The validator is a read-only pass over the registry and the dependency
//! graph. It never fails: every problem becomes a [`ValidationIssue`] in the
//! returned [`ValidationReport`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::graph::{DependencyGraph, EdgeTarget};
use crate::key::ResolutionKey;
use crate::model::{InjectionRequest, SourceLocation};
use crate::registry::{ImplId, InterfaceRegistry, Resolution};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    MissingImplementation,
    AmbiguousImplementation,
    CircularDependency,
    MalformedDeclaration,
}

impl IssueKind {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            IssueKind::MissingImplementation => "weave::missing_implementation",
            IssueKind::AmbiguousImplementation => "weave::ambiguous_implementation",
            IssueKind::CircularDependency => "weave::circular_dependency",
            IssueKind::MalformedDeclaration => "weave::malformed_declaration",
        }
    }

    /// Malformed declarations are reported but do not invalidate a run.
    pub fn is_error(&self) -> bool {
        !matches!(self, IssueKind::MalformedDeclaration)
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub kind: IssueKind,
    /// Keys involved: the missing key, or the ambiguous key.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keys: Vec<ResolutionKey>,
    /// Implementation names along a cycle, first repeated last.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cycle: Vec<String>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
}

impl ValidationIssue {
    pub fn malformed(message: impl Into<String>, location: Option<SourceLocation>) -> Self {
        Self {
            kind: IssueKind::MalformedDeclaration,
            keys: Vec::new(),
            cycle: Vec::new(),
            message: message.into(),
            location,
        }
    }

    pub fn missing(key: ResolutionKey, consumer: &str, location: Option<SourceLocation>) -> Self {
        Self {
            kind: IssueKind::MissingImplementation,
            message: format!("no implementation registered for {key} (required by {consumer})"),
            keys: vec![key],
            cycle: Vec::new(),
            location,
        }
    }

    pub fn ambiguous(
        key: ResolutionKey,
        consumer: &str,
        candidates: &[String],
        location: Option<SourceLocation>,
    ) -> Self {
        Self {
            kind: IssueKind::AmbiguousImplementation,
            message: format!(
                "{key} (required by {consumer}) has several implementations: {}; mark one @Primary or add a qualifier",
                candidates.join(", ")
            ),
            keys: vec![key],
            cycle: Vec::new(),
            location,
        }
    }

    pub fn circular(cycle: Vec<String>, location: Option<SourceLocation>) -> Self {
        Self {
            kind: IssueKind::CircularDependency,
            message: format!("circular dependency: {}", cycle.join(" -> ")),
            keys: Vec::new(),
            cycle,
            location,
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(location) => write!(f, "{location}: [{}] {}", self.kind.code(), self.message),
            None => write!(f, "[{}] {}", self.kind.code(), self.message),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// `true` when no missing, ambiguous or circular issue was found.
    pub fn is_valid(&self) -> bool {
        !self.issues.iter().any(|issue| issue.kind.is_error())
    }

    pub fn of_kind(&self, kind: IssueKind) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(move |issue| issue.kind == kind)
    }

    pub fn count(&self, kind: IssueKind) -> usize {
        self.of_kind(kind).count()
    }

    pub fn extend(&mut self, issues: impl IntoIterator<Item = ValidationIssue>) {
        self.issues.extend(issues);
    }
}

/// A request from a component, with the name used in messages.
#[derive(Debug, Clone, Copy)]
pub struct RequestSite<'r> {
    pub component: &'r str,
    pub request: &'r InjectionRequest,
}

pub struct Validator<'a> {
    registry: &'a InterfaceRegistry,
    graph: &'a DependencyGraph,
    requests: Vec<RequestSite<'a>>,
}

impl<'a> Validator<'a> {
    pub fn new(registry: &'a InterfaceRegistry, graph: &'a DependencyGraph) -> Self {
        Self {
            registry,
            graph,
            requests: Vec::new(),
        }
    }

    /// Also check component requests.
    pub fn with_requests(mut self, requests: impl IntoIterator<Item = RequestSite<'a>>) -> Self {
        self.requests.extend(requests);
        self
    }

    pub fn run(&self) -> ValidationReport {
        let mut report = ValidationReport::default();
        self.check_dependencies(&mut report);
        self.check_requests(&mut report);
        self.check_cycles(&mut report);

        tracing::debug!(
            issues = report.issues.len(),
            valid = report.is_valid(),
            "validation finished"
        );
        report
    }

    fn names(&self, ids: &[ImplId]) -> Vec<String> {
        ids.iter()
            .map(|&id| self.registry.implementation(id).name.clone())
            .collect()
    }

    fn check_dependencies(&self, report: &mut ValidationReport) {
        for edge in self.graph.edges() {
            let consumer = self.registry.implementation(edge.consumer);
            let location = Some(consumer.location.clone());
            match &edge.target {
                EdgeTarget::Implementation { .. } => {}
                EdgeTarget::Unresolved if edge.required => report.issues.push(
                    ValidationIssue::missing(edge.key.clone(), &consumer.name, location),
                ),
                EdgeTarget::Unresolved => {}
                EdgeTarget::Ambiguous { candidates } => report.issues.push(
                    ValidationIssue::ambiguous(
                        edge.key.clone(),
                        &consumer.name,
                        &self.names(candidates),
                        location,
                    ),
                ),
            }
        }
    }

    fn check_requests(&self, report: &mut ValidationReport) {
        for site in &self.requests {
            let request = self
                .registry
                .request_for(&site.request.contract)
                .with_qualifier(site.request.qualifier.clone());
            let key = request.emitted_key();
            let location = Some(site.request.location.clone());

            match self.registry.resolve_request(&request) {
                Resolution::Resolved(_) => {}
                Resolution::NotFound if site.request.required => {
                    report
                        .issues
                        .push(ValidationIssue::missing(key, site.component, location));
                }
                Resolution::NotFound => {
                    tracing::trace!(key = %key, component = site.component, "optional service not found");
                }
                Resolution::Ambiguous { candidates } => {
                    report.issues.push(ValidationIssue::ambiguous(
                        key,
                        site.component,
                        &self.names(&candidates),
                        location,
                    ));
                }
            }
        }
    }

    fn check_cycles(&self, report: &mut ValidationReport) {
        for cycle in self.graph.find_cycles() {
            let location = cycle
                .first()
                .map(|&id| self.registry.implementation(id).location.clone());
            report
                .issues
                .push(ValidationIssue::circular(self.names(&cycle), location));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        ContractDescriptor, ContractRef, DependencyRef, ImplementationDescriptor, ServiceMetadata,
    };

    fn service(name: &str, implements: &str, deps: &[(&str, bool)]) -> ImplementationDescriptor {
        let file = format!("src/{name}.ts");
        ImplementationDescriptor {
            name: name.to_string(),
            type_params: Vec::new(),
            implements: vec![ContractRef::local(implements, &file)],
            metadata: ServiceMetadata::default(),
            dependencies: deps
                .iter()
                .map(|(contract, required)| DependencyRef {
                    contract: ContractRef::local(*contract, &file),
                    required: *required,
                    qualifier: None,
                    parameter: contract.to_lowercase(),
                })
                .collect(),
            lifecycle: Default::default(),
            location: SourceLocation::new(file.clone(), 3),
        }
    }

    fn validate(
        services: Vec<ImplementationDescriptor>,
        requests: &[InjectionRequest],
    ) -> ValidationReport {
        let mut registry = InterfaceRegistry::new_run(Vec::<String>::new());
        for service in services {
            registry.register_contract(ContractDescriptor {
                name: service.implements[0].name.clone(),
                type_params: Vec::new(),
                location: SourceLocation::new("src/contracts.ts", 1),
            });
            registry.register(service);
        }
        registry.finalize();
        let graph = DependencyGraph::build(&registry);
        Validator::new(&registry, &graph)
            .with_requests(requests.iter().map(|request| RequestSite {
                component: "Card",
                request,
            }))
            .run()
    }

    fn request(contract: &str, required: bool) -> InjectionRequest {
        InjectionRequest {
            property: contract.to_lowercase(),
            contract: ContractRef::local(contract, "src/Card.tsx"),
            required,
            qualifier: None,
            location: SourceLocation::new("src/Card.tsx", 7),
        }
    }

    #[test]
    fn two_cycles_give_two_circular_issues() {
        let report = validate(
            vec![
                service("A", "AI", &[("BI", true)]),
                service("B", "BI", &[("CI", true)]),
                service("C", "CI", &[("AI", true)]),
                service("D", "DI", &[("EI", true)]),
                service("E", "EI", &[("DI", true)]),
            ],
            &[],
        );
        let cycles: Vec<_> = report
            .of_kind(IssueKind::CircularDependency)
            .map(|issue| issue.cycle.clone())
            .collect();
        assert_eq!(cycles, vec![vec!["A", "B", "C", "A"], vec!["D", "E", "D"]]);
        assert!(!report.is_valid());
    }

    #[test]
    fn overlapping_cycles_are_each_reported() {
        let report = validate(
            vec![
                service("A", "AI", &[("BI", true), ("CI", true)]),
                service("B", "BI", &[("CI", true)]),
                service("C", "CI", &[("AI", true)]),
            ],
            &[],
        );
        let cycles: Vec<_> = report
            .of_kind(IssueKind::CircularDependency)
            .map(|issue| issue.cycle.clone())
            .collect();
        assert_eq!(cycles, vec![vec!["A", "B", "C", "A"], vec!["A", "C", "A"]]);
    }

    #[test]
    fn missing_required_request_is_reported_with_location() {
        let report = validate(Vec::new(), &[request("ApiInterface", true)]);
        assert_eq!(report.issues.len(), 1);
        let issue = &report.issues[0];
        assert_eq!(issue.kind, IssueKind::MissingImplementation);
        assert_eq!(issue.keys[0].as_str(), "ApiInterface");
        assert_eq!(issue.location, Some(SourceLocation::new("src/Card.tsx", 7)));
        assert!(issue.to_string().starts_with("src/Card.tsx:7: [weave::missing_implementation]"));
    }

    #[test]
    fn optional_missing_dependencies_are_silent() {
        let report = validate(
            vec![service("A", "AI", &[("Clock", false)])],
            &[request("Logger", false)],
        );
        assert!(report.issues.is_empty());
        assert!(report.is_valid());
    }

    #[test]
    fn ambiguous_dependencies_name_candidates() {
        let report = validate(
            vec![
                service("ConsoleLogger", "Logger", &[]),
                service("FileLogger", "Logger", &[]),
                service("App", "AppI", &[("Logger", true)]),
            ],
            &[],
        );
        assert_eq!(report.count(IssueKind::AmbiguousImplementation), 1);
        assert!(report.issues[0].message.contains("ConsoleLogger, FileLogger"));
    }

    #[test]
    fn malformed_declarations_do_not_invalidate() {
        let mut report = ValidationReport::default();
        report.extend([ValidationIssue::malformed("bad", None)]);
        assert!(report.is_valid());
        assert_eq!(IssueKind::MalformedDeclaration.code(), "weave::malformed_declaration");
    }
}

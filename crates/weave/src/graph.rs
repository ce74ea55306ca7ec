//! Dependency graph between registered implementations.
//!
//! Nodes are implementations plus one synthetic node per key nothing
//! implements. A resolved constructor dependency is an edge from the
//! consumer to the implementation it receives; ambiguous dependencies are
//! recorded but produce no edge.

use std::collections::{BTreeSet, VecDeque};

use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use serde::Serialize;

use crate::key::ResolutionKey;
use crate::registry::{ImplId, InterfaceRegistry, Resolution};

/// Upper bound on the cycles [`DependencyGraph::find_cycles`] reports.
pub const MAX_CYCLES: usize = 1000;

/// What a dependency points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EdgeTarget {
    Implementation { id: ImplId },
    Unresolved,
    Ambiguous { candidates: Vec<ImplId> },
}

/// One constructor dependency of one implementation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyEdge {
    pub consumer: ImplId,
    /// Key the dependency is looked up under, qualifier included.
    pub key: ResolutionKey,
    pub parameter: String,
    pub required: bool,
    pub target: EdgeTarget,
}

#[derive(Debug, Default)]
pub struct DependencyGraph {
    /// Dependencies per implementation, in declaration order.
    dependencies: Vec<Vec<DependencyEdge>>,
    /// Implementations each implementation has an edge to.
    outgoing: Vec<Vec<ImplId>>,
    incoming: Vec<Vec<ImplId>>,
    /// Synthetic nodes: unresolved keys and the implementations waiting on them.
    unresolved: IndexMap<ResolutionKey, Vec<ImplId>>,
}

impl DependencyGraph {
    /// Resolve every constructor dependency in `registry`.
    pub fn build(registry: &InterfaceRegistry) -> Self {
        let len = registry.len();
        let mut graph = Self {
            dependencies: vec![Vec::new(); len],
            outgoing: vec![Vec::new(); len],
            incoming: vec![Vec::new(); len],
            unresolved: IndexMap::new(),
        };

        for (consumer, implementation) in registry.implementations() {
            for dependency in &implementation.dependencies {
                let request = registry
                    .request_for(&dependency.contract)
                    .with_qualifier(dependency.qualifier.clone());
                let key = request.emitted_key();

                let target = match registry.resolve_request(&request) {
                    Resolution::Resolved(id) => {
                        graph.outgoing[consumer.0].push(id);
                        graph.incoming[id.0].push(consumer);
                        EdgeTarget::Implementation { id }
                    }
                    Resolution::Ambiguous { candidates } => EdgeTarget::Ambiguous { candidates },
                    Resolution::NotFound => {
                        graph.unresolved.entry(key.clone()).or_default().push(consumer);
                        EdgeTarget::Unresolved
                    }
                };

                graph.dependencies[consumer.0].push(DependencyEdge {
                    consumer,
                    key,
                    parameter: dependency.parameter.clone(),
                    required: dependency.required,
                    target,
                });
            }
        }

        tracing::debug!(
            nodes = len,
            unresolved = graph.unresolved.len(),
            "dependency graph built"
        );
        graph
    }

    pub fn node_count(&self) -> usize {
        self.outgoing.len() + self.unresolved.len()
    }

    pub fn dependencies_of(&self, id: ImplId) -> &[DependencyEdge] {
        self.dependencies.get(id.0).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every dependency of every implementation.
    pub fn edges(&self) -> impl Iterator<Item = &DependencyEdge> {
        self.dependencies.iter().flatten()
    }

    /// Implementations that receive `id`, sorted.
    pub fn dependents_of(&self, id: ImplId) -> Vec<ImplId> {
        let mut dependents = self.incoming.get(id.0).cloned().unwrap_or_default();
        dependents.sort();
        dependents.dedup();
        dependents
    }

    /// Implementations transitively needed by `id`, excluding `id` unless it is on a cycle.
    pub fn reachable_from(&self, id: ImplId) -> BTreeSet<ImplId> {
        let mut reached = BTreeSet::new();
        let mut queue = VecDeque::from([id]);

        while let Some(current) = queue.pop_front() {
            for &next in self.outgoing.get(current.0).into_iter().flatten() {
                if reached.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        reached
    }

    /// Keys requested but implemented by nothing, in first-seen order.
    pub fn unresolved_keys(&self) -> impl Iterator<Item = &ResolutionKey> {
        self.unresolved.keys()
    }

    /// Implementations waiting on an unresolved key.
    pub fn waiting_on(&self, key: &ResolutionKey) -> &[ImplId] {
        self.unresolved.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Strongly connected component of every node (Tarjan), numbered in completion order.
    fn components(&self) -> Vec<usize> {
        const UNVISITED: usize = usize::MAX;
        let len = self.outgoing.len();
        let mut index = vec![UNVISITED; len];
        let mut low = vec![0; len];
        let mut on_stack = vec![false; len];
        let mut stack = Vec::new();
        let mut component = vec![UNVISITED; len];
        let mut counter = 0;
        let mut components = 0;

        for root in 0..len {
            if index[root] != UNVISITED {
                continue;
            }
            index[root] = counter;
            low[root] = counter;
            counter += 1;
            stack.push(root);
            on_stack[root] = true;

            // (node, index of the next edge to follow)
            let mut work: Vec<(usize, usize)> = vec![(root, 0)];
            while let Some(frame) = work.last_mut() {
                let (node, edge) = *frame;
                if let Some(&next) = self.outgoing[node].get(edge) {
                    frame.1 += 1;
                    let next = next.0;
                    if index[next] == UNVISITED {
                        index[next] = counter;
                        low[next] = counter;
                        counter += 1;
                        stack.push(next);
                        on_stack[next] = true;
                        work.push((next, 0));
                    } else if on_stack[next] {
                        low[node] = low[node].min(index[next]);
                    }
                    continue;
                }

                work.pop();
                if let Some(&(parent, _)) = work.last() {
                    low[parent] = low[parent].min(low[node]);
                }
                if low[node] == index[node] {
                    while let Some(member) = stack.pop() {
                        on_stack[member] = false;
                        component[member] = components;
                        if member == node {
                            break;
                        }
                    }
                    components += 1;
                }
            }
        }

        component
    }

    /// `true` for nodes on some cycle: members of a component with two or
    /// more nodes, and nodes depending on themselves.
    fn cyclic_nodes(&self, component: &[usize]) -> Vec<bool> {
        let mut sizes = vec![0usize; component.len()];
        for &c in component {
            sizes[c] += 1;
        }
        (0..component.len())
            .map(|node| {
                sizes[component[node]] > 1 || self.outgoing[node].iter().any(|next| next.0 == node)
            })
            .collect()
    }

    /// Every elementary cycle as a closed path `[a, b, c, a]`.
    ///
    /// Cycles are searched inside each strongly connected component and
    /// reported once, starting from their smallest member, ordered by that
    /// member. Enumeration stops after [`MAX_CYCLES`].
    pub fn find_cycles(&self) -> Vec<Vec<ImplId>> {
        let len = self.outgoing.len();
        let component = self.components();
        let cyclic = self.cyclic_nodes(&component);

        let mut on_path = vec![false; len];
        let mut seen: FxHashSet<Vec<ImplId>> = FxHashSet::default();
        let mut cycles = Vec::new();

        'search: for start in 0..len {
            if !cyclic[start] {
                continue;
            }
            // Only members of the same component after `start`, so each cycle
            // is found from its smallest member only.
            let eligible = |node: usize| node > start && component[node] == component[start];

            let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
            let mut path: Vec<ImplId> = vec![ImplId(start)];
            on_path[start] = true;

            while let Some(frame) = stack.last_mut() {
                let (node, edge) = *frame;
                let Some(&next) = self.outgoing[node].get(edge) else {
                    stack.pop();
                    path.pop();
                    on_path[node] = false;
                    continue;
                };
                frame.1 += 1;

                if next.0 == start {
                    let mut cycle = path.clone();
                    cycle.push(next);
                    if seen.insert(cycle.clone()) {
                        cycles.push(cycle);
                        if cycles.len() >= MAX_CYCLES {
                            tracing::warn!(limit = MAX_CYCLES, "cycle enumeration stopped");
                            break 'search;
                        }
                    }
                } else if eligible(next.0) && !on_path[next.0] {
                    on_path[next.0] = true;
                    path.push(next);
                    stack.push((next.0, 0));
                }
            }
        }

        cycles
    }

    /// Implementations in dependency-first order. Members of cycles are left out.
    pub fn topological_order(&self) -> Vec<ImplId> {
        let cyclic = self.cyclic_nodes(&self.components());
        let len = self.outgoing.len();
        let mut visited = vec![false; len];
        let mut order = Vec::with_capacity(len);

        for start in (0..len).map(ImplId) {
            if visited[start.0] || cyclic[start.0] {
                continue;
            }
            visited[start.0] = true;
            let mut stack = vec![(start, 0usize)];

            while let Some(frame) = stack.last_mut() {
                let (node, next_edge) = *frame;
                match self.outgoing[node.0].get(next_edge) {
                    Some(&next) => {
                        frame.1 += 1;
                        if !visited[next.0] && !cyclic[next.0] {
                            visited[next.0] = true;
                            stack.push((next, 0));
                        }
                    }
                    None => {
                        stack.pop();
                        order.push(node);
                    }
                }
            }
        }

        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        ContractDescriptor, ContractRef, DependencyRef, ImplementationDescriptor, ServiceMetadata,
        SourceLocation,
    };

    /// Service `name` implementing `{name}Api` and depending on `{dep}Api` for each dep.
    fn service(name: &str, deps: &[&str]) -> ImplementationDescriptor {
        let file = format!("src/{name}.ts");
        ImplementationDescriptor {
            name: name.to_string(),
            type_params: Vec::new(),
            implements: vec![ContractRef::local(format!("{name}Api"), &file)],
            metadata: ServiceMetadata::default(),
            dependencies: deps
                .iter()
                .map(|dep| DependencyRef {
                    contract: ContractRef::local(format!("{dep}Api"), &file),
                    required: true,
                    qualifier: None,
                    parameter: dep.to_lowercase(),
                })
                .collect(),
            lifecycle: Default::default(),
            location: SourceLocation::new(file.clone(), 1),
        }
    }

    fn graph(services: &[(&str, &[&str])]) -> (InterfaceRegistry, DependencyGraph) {
        let mut registry = InterfaceRegistry::new_run(Vec::<String>::new());
        for (name, deps) in services {
            registry.register_contract(ContractDescriptor {
                name: format!("{name}Api"),
                type_params: Vec::new(),
                location: SourceLocation::new(format!("src/{name}Api.ts"), 1),
            });
            registry.register(service(name, deps));
        }
        registry.finalize();
        let graph = DependencyGraph::build(&registry);
        (registry, graph)
    }

    fn names(registry: &InterfaceRegistry, ids: &[ImplId]) -> Vec<String> {
        ids.iter()
            .map(|&id| registry.implementation(id).name.clone())
            .collect()
    }

    #[test]
    fn finds_every_independent_cycle_once() {
        let (registry, graph) = graph(&[
            ("A", &["B"]),
            ("B", &["C"]),
            ("C", &["A"]),
            ("D", &["E"]),
            ("E", &["D"]),
        ]);

        let cycles: Vec<_> = graph
            .find_cycles()
            .iter()
            .map(|c| names(&registry, c))
            .collect();
        assert_eq!(cycles, vec![vec!["A", "B", "C", "A"], vec!["D", "E", "D"]]);
    }

    #[test]
    fn overlapping_cycles_terminate() {
        let (registry, graph) = graph(&[("A", &["B"]), ("B", &["A", "C"]), ("C", &["B"])]);
        let cycles: Vec<_> = graph
            .find_cycles()
            .iter()
            .map(|c| names(&registry, c))
            .collect();
        assert_eq!(cycles, vec![vec!["A", "B", "A"], vec!["B", "C", "B"]]);
    }

    #[test]
    fn cycles_closing_through_an_explored_member_are_found() {
        let (registry, graph) = graph(&[("A", &["B", "C"]), ("B", &["C"]), ("C", &["A"])]);
        let cycles: Vec<_> = graph
            .find_cycles()
            .iter()
            .map(|c| names(&registry, c))
            .collect();
        assert_eq!(cycles, vec![vec!["A", "B", "C", "A"], vec!["A", "C", "A"]]);
    }

    #[test]
    fn components_separate_cycles_from_their_consumers() {
        let (_, graph) = graph(&[("A", &["B"]), ("B", &["A"]), ("C", &["A"])]);
        let component = graph.components();
        assert_eq!(component[0], component[1]);
        assert_ne!(component[0], component[2]);
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let (_, graph) = graph(&[("A", &["A"])]);
        assert_eq!(graph.find_cycles(), vec![vec![ImplId(0), ImplId(0)]]);
    }

    #[test]
    fn unresolved_keys_become_synthetic_nodes() {
        let (_, graph) = graph(&[("A", &["Missing"]), ("B", &["Missing", "A"])]);
        let keys: Vec<_> = graph.unresolved_keys().map(ResolutionKey::as_str).collect();
        assert_eq!(keys, vec!["MissingApi"]);
        assert_eq!(graph.node_count(), 3);
        assert_eq!(
            graph.waiting_on(&ResolutionKey::from_raw("MissingApi")),
            &[ImplId(0), ImplId(1)]
        );
        assert!(matches!(
            graph.dependencies_of(ImplId(0))[0].target,
            EdgeTarget::Unresolved
        ));
    }

    #[test]
    fn queries_follow_edges() {
        let (_, graph) = graph(&[("A", &["B"]), ("B", &["C"]), ("C", &[]), ("D", &["C"])]);
        assert_eq!(graph.dependents_of(ImplId(2)), vec![ImplId(1), ImplId(3)]);
        assert_eq!(
            graph.reachable_from(ImplId(0)),
            BTreeSet::from([ImplId(1), ImplId(2)])
        );
        assert_eq!(
            graph.topological_order(),
            vec![ImplId(2), ImplId(1), ImplId(0), ImplId(3)]
        );
    }

    #[test]
    fn topological_order_skips_cycles() {
        let (_, graph) = graph(&[("A", &["B"]), ("B", &["A"]), ("C", &[]), ("D", &["A", "C"])]);
        assert_eq!(graph.topological_order(), vec![ImplId(2), ImplId(3)]);
    }
}

//! Milestone graph and topological ordering.
//!
//! Nodes are `(component, state)` milestones, edges mean "must be reached
//! before". Ordering uses Kahn's algorithm; ties between ready nodes go to the
//! node declared first (component registration order, then state order), so
//! the same registrations always produce the same schedule.

use crate::component::ComponentKey;
use crate::error::{RegistrationError, Result};
use crate::execution::Execution;
use crate::lifecycle::State;
use crate::registry::ComponentRegistry;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use thiserror::Error;
use tracing::{debug, trace};

/// A `(component, state)` pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Milestone {
    pub component: ComponentKey,
    pub state: State,
}

impl Milestone {
    pub fn new(component: ComponentKey, state: State) -> Self {
        Self { component, state }
    }
}

impl fmt::Display for Milestone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.component, self.state)
    }
}

/// The milestone graph contains at least one cycle
#[derive(Error, Debug, Clone)]
#[error("Dependency cycle detected: {}", format_cycle(.cycle))]
pub struct CycleError {
    /// Milestones on one cycle, in edge order
    pub cycle: Vec<Milestone>,
    /// Number of milestones that could not be ordered
    pub unresolved: usize,
}

fn format_cycle(cycle: &[Milestone]) -> String {
    let mut names: Vec<String> = cycle.iter().map(ToString::to_string).collect();
    if let Some(first) = cycle.first() {
        names.push(first.to_string());
    }
    names.join(" -> ")
}

pub struct DependencyGraph {
    nodes: Vec<Milestone>,
    lookup: HashMap<Milestone, usize>,
    successors: Vec<Vec<usize>>,
    predecessors: Vec<Vec<usize>>,
    edges: HashSet<(usize, usize)>,
}

impl DependencyGraph {
    /// Build the graph for every registered component and declared execution
    pub fn build(registry: &ComponentRegistry, executions: &[Execution]) -> Result<Self> {
        let mut graph = Self {
            nodes: Vec::new(),
            lookup: HashMap::new(),
            successors: Vec::new(),
            predecessors: Vec::new(),
            edges: HashSet::new(),
        };

        for component in registry.keys() {
            for state in State::ALL {
                graph.add_node(Milestone::new(component, state));
            }
        }

        // A component cannot skip stages
        for component in registry.keys() {
            for state in State::ALL {
                if let Some(previous) = state.previous() {
                    graph.add_edge(Milestone::new(component, previous), Milestone::new(component, state));
                }
            }
        }

        for execution in executions {
            let owner = execution.owner();
            if !registry.contains(owner) {
                return Err(RegistrationError::UnregisteredOwner {
                    owner,
                    state: execution.target(),
                }
                .into());
            }

            let target = Milestone::new(owner, execution.target());
            for dependency in execution.dependencies() {
                if target.state.is_startup() && !dependency.descriptor.state().is_startup() {
                    return Err(RegistrationError::UnreachableDependency {
                        owner,
                        state: execution.target(),
                        dependency: dependency.descriptor,
                    }
                    .into());
                }
                let prerequisite = Milestone::new(
                    dependency.descriptor.component(),
                    dependency.descriptor.state(),
                );
                if !graph.add_edge(prerequisite, target) {
                    trace!(
                        "No milestone for {}, {} resolves it at run time",
                        prerequisite,
                        target
                    );
                }
            }
        }

        for component in registry.keys() {
            let created = Milestone::new(component, State::first());
            for required in registry.requirements(component) {
                graph.add_edge(Milestone::new(*required, State::first()), created);
            }
        }

        debug!(
            "Built dependency graph with {} milestones and {} edges",
            graph.node_count(),
            graph.edge_count()
        );
        Ok(graph)
    }

    fn add_node(&mut self, milestone: Milestone) -> usize {
        if let Some(index) = self.lookup.get(&milestone) {
            return *index;
        }
        let index = self.nodes.len();
        self.nodes.push(milestone);
        self.lookup.insert(milestone, index);
        self.successors.push(Vec::new());
        self.predecessors.push(Vec::new());
        index
    }

    /// Add `from -> to`; returns false when either milestone is not in the graph
    pub fn add_edge(&mut self, from: Milestone, to: Milestone) -> bool {
        let (Some(&source), Some(&target)) = (self.lookup.get(&from), self.lookup.get(&to)) else {
            return false;
        };

        if self.edges.insert((source, target)) {
            if let Some(successors) = self.successors.get_mut(source) {
                successors.push(target);
            }
            if let Some(predecessors) = self.predecessors.get_mut(target) {
                predecessors.push(source);
            }
        }
        true
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn milestones(&self) -> &[Milestone] {
        &self.nodes
    }

    pub fn has_edge(&self, from: Milestone, to: Milestone) -> bool {
        match (self.lookup.get(&from), self.lookup.get(&to)) {
            (Some(&source), Some(&target)) => self.edges.contains(&(source, target)),
            _ => false,
        }
    }

    /// Order every milestone so each comes after all of its prerequisites
    pub fn topological_order(&self) -> std::result::Result<Vec<Milestone>, CycleError> {
        let mut in_degree: Vec<usize> = self.predecessors.iter().map(Vec::len).collect();
        let mut ready: BTreeSet<usize> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, degree)| **degree == 0)
            .map(|(index, _)| index)
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        let mut emitted = vec![false; self.nodes.len()];

        while let Some(index) = ready.pop_first() {
            if let Some(milestone) = self.nodes.get(index) {
                order.push(*milestone);
            }
            if let Some(flag) = emitted.get_mut(index) {
                *flag = true;
            }

            for &next in self.successors.get(index).map_or(&[][..], Vec::as_slice) {
                if let Some(degree) = in_degree.get_mut(next) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.insert(next);
                    }
                }
            }
        }

        if order.len() == self.nodes.len() {
            return Ok(order);
        }

        let remaining: Vec<bool> = emitted.iter().map(|done| !done).collect();
        Err(CycleError {
            cycle: self.find_cycle(&remaining),
            unresolved: self.nodes.len() - order.len(),
        })
    }

    /// Extract one concrete cycle from the milestones Kahn's algorithm left behind.
    ///
    /// Every leftover node still has a leftover predecessor, so walking
    /// predecessors must eventually revisit a node.
    fn find_cycle(&self, remaining: &[bool]) -> Vec<Milestone> {
        let is_remaining = |index: usize| remaining.get(index).copied().unwrap_or(false);

        let Some(start) = (0..self.nodes.len()).find(|&index| is_remaining(index)) else {
            return Vec::new();
        };

        let mut path: Vec<usize> = Vec::new();
        let mut seen: HashMap<usize, usize> = HashMap::new();
        let mut current = start;

        let mut cycle = loop {
            if let Some(&position) = seen.get(&current) {
                break path.split_off(position);
            }
            seen.insert(current, path.len());
            path.push(current);

            let previous = self
                .predecessors
                .get(current)
                .and_then(|predecessors| predecessors.iter().copied().find(|&p| is_remaining(p)));
            match previous {
                Some(previous) => current = previous,
                None => break path,
            }
        };

        // The walk followed edges backwards
        cycle.reverse();

        if let Some(earliest) = cycle
            .iter()
            .enumerate()
            .min_by_key(|(_, index)| **index)
            .map(|(position, _)| position)
        {
            cycle.rotate_left(earliest);
        }

        cycle
            .into_iter()
            .filter_map(|index| self.nodes.get(index).copied())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Registration;
    use crate::execution::Execution;

    struct Alpha;
    struct Beta;
    struct Gamma;
    struct Ghost;

    fn key<T: 'static>() -> ComponentKey {
        ComponentKey::of::<T>()
    }

    fn registry_of_three() -> ComponentRegistry {
        let mut registry = ComponentRegistry::new();
        registry.register(Registration::instance(Alpha)).unwrap();
        registry.register(Registration::instance(Beta)).unwrap();
        registry.register(Registration::instance(Gamma)).unwrap();
        registry
    }

    fn position(order: &[Milestone], component: ComponentKey, state: State) -> usize {
        order
            .iter()
            .position(|m| *m == Milestone::new(component, state))
            .unwrap()
    }

    #[test]
    fn test_every_component_gets_every_state() {
        let registry = registry_of_three();
        let graph = DependencyGraph::build(&registry, &[]).unwrap();

        assert_eq!(graph.node_count(), 3 * State::ALL.len());
        assert_eq!(graph.edge_count(), 3 * (State::ALL.len() - 1));
        assert!(graph.has_edge(
            Milestone::new(key::<Beta>(), State::Created),
            Milestone::new(key::<Beta>(), State::Resolved)
        ));
    }

    #[test]
    fn test_order_without_cross_dependencies_follows_declaration() {
        let registry = registry_of_three();
        let order = DependencyGraph::build(&registry, &[])
            .unwrap()
            .topological_order()
            .unwrap();

        let expected: Vec<Milestone> = [key::<Alpha>(), key::<Beta>(), key::<Gamma>()]
            .into_iter()
            .flat_map(|component| State::ALL.into_iter().map(move |state| Milestone::new(component, state)))
            .collect();
        assert_eq!(order, expected);
    }

    #[test]
    fn test_execution_dependency_orders_prerequisite_first() {
        let registry = registry_of_three();
        let executions = vec![Execution::on::<Alpha>(State::Resolved)
            .with_dependency::<Gamma>(State::Started)
            .with_callback(|_, _| Ok(()))
            .unwrap()];

        let graph = DependencyGraph::build(&registry, &executions).unwrap();
        assert!(graph.has_edge(
            Milestone::new(key::<Gamma>(), State::Started),
            Milestone::new(key::<Alpha>(), State::Resolved)
        ));

        let order = graph.topological_order().unwrap();
        assert!(
            position(&order, key::<Gamma>(), State::Started)
                < position(&order, key::<Alpha>(), State::Resolved)
        );
        assert!(
            position(&order, key::<Alpha>(), State::Created)
                < position(&order, key::<Alpha>(), State::Resolved)
        );
    }

    #[test]
    fn test_constructor_requirements_add_created_edges() {
        let mut registry = ComponentRegistry::new();
        registry
            .register(Registration::instance(Alpha).requires::<Beta>())
            .unwrap();
        registry.register(Registration::instance(Beta)).unwrap();

        let graph = DependencyGraph::build(&registry, &[]).unwrap();
        assert!(graph.has_edge(
            Milestone::new(key::<Beta>(), State::Created),
            Milestone::new(key::<Alpha>(), State::Created)
        ));

        let order = graph.topological_order().unwrap();
        assert_eq!(order[0], Milestone::new(key::<Beta>(), State::Created));
    }

    #[test]
    fn test_dependency_on_unregistered_type_adds_no_edge() {
        let registry = registry_of_three();
        let executions = vec![Execution::on::<Alpha>(State::Started)
            .with_optional_dependency::<Ghost>(State::Started)
            .with_callback(|_, _| Ok(()))
            .unwrap()];

        let graph = DependencyGraph::build(&registry, &executions).unwrap();
        assert_eq!(graph.edge_count(), 3 * (State::ALL.len() - 1));
    }

    #[test]
    fn test_unregistered_owner_is_rejected() {
        let registry = registry_of_three();
        let executions = vec![Execution::on::<Ghost>(State::Started)
            .with_callback(|_| Ok(()))
            .unwrap()];

        let err = DependencyGraph::build(&registry, &executions).err().unwrap();
        assert!(err.is_registration());
    }

    #[test]
    fn test_startup_execution_cannot_wait_for_teardown() {
        let registry = registry_of_three();
        let executions = vec![Execution::on::<Alpha>(State::Started)
            .with_dependency::<Beta>(State::Stopped)
            .with_callback(|_, _| Ok(()))
            .unwrap()];

        let err = DependencyGraph::build(&registry, &executions).err().unwrap();
        assert!(matches!(
            err,
            crate::error::StagehandError::Registration(RegistrationError::UnreachableDependency {
                owner,
                state: State::Started,
                ..
            }) if owner == key::<Alpha>()
        ));
        assert_eq!(
            err.to_string(),
            "Registration error: execution on Alpha@started depends on Beta@stopped, which startup never reaches"
        );

        // Teardown executions may still wait on other components stopping
        let teardown = vec![Execution::on::<Alpha>(State::Stopped)
            .with_dependency::<Beta>(State::Stopped)
            .with_callback(|_, _| Ok(()))
            .unwrap()];
        assert!(DependencyGraph::build(&registry, &teardown).is_ok());
    }

    #[test]
    fn test_mutual_dependency_reports_cycle_in_order() {
        let registry = registry_of_three();
        let executions = vec![
            Execution::on::<Alpha>(State::Started)
                .with_dependency::<Beta>(State::Started)
                .with_callback(|_, _| Ok(()))
                .unwrap(),
            Execution::on::<Beta>(State::Started)
                .with_dependency::<Alpha>(State::Started)
                .with_callback(|_, _| Ok(()))
                .unwrap(),
        ];

        let err = DependencyGraph::build(&registry, &executions)
            .unwrap()
            .topological_order()
            .unwrap_err();

        assert_eq!(
            err.cycle,
            vec![
                Milestone::new(key::<Alpha>(), State::Started),
                Milestone::new(key::<Beta>(), State::Started),
            ]
        );
        assert_eq!(
            err.to_string(),
            "Dependency cycle detected: Alpha@started -> Beta@started -> Alpha@started"
        );
        // Both Started milestones and both Stopped milestones are stuck
        assert_eq!(err.unresolved, 4);
    }

    #[test]
    fn test_self_dependency_above_target_is_a_cycle() {
        let registry = registry_of_three();
        let executions = vec![Execution::on::<Gamma>(State::Resolved)
            .with_dependency::<Gamma>(State::Started)
            .with_callback(|_, _| Ok(()))
            .unwrap()];

        let err = DependencyGraph::build(&registry, &executions)
            .unwrap()
            .topological_order()
            .unwrap_err();

        assert_eq!(
            err.cycle,
            vec![
                Milestone::new(key::<Gamma>(), State::Resolved),
                Milestone::new(key::<Gamma>(), State::Started),
            ]
        );
    }

    #[test]
    fn test_longer_cycle_is_listed_in_edge_order() {
        let registry = registry_of_three();
        let executions = vec![
            Execution::on::<Alpha>(State::Resolved)
                .with_dependency::<Gamma>(State::Resolved)
                .with_callback(|_, _| Ok(()))
                .unwrap(),
            Execution::on::<Beta>(State::Resolved)
                .with_dependency::<Alpha>(State::Resolved)
                .with_callback(|_, _| Ok(()))
                .unwrap(),
            Execution::on::<Gamma>(State::Resolved)
                .with_dependency::<Beta>(State::Resolved)
                .with_callback(|_, _| Ok(()))
                .unwrap(),
        ];

        let err = DependencyGraph::build(&registry, &executions)
            .unwrap()
            .topological_order()
            .unwrap_err();

        assert_eq!(
            err.cycle,
            vec![
                Milestone::new(key::<Alpha>(), State::Resolved),
                Milestone::new(key::<Beta>(), State::Resolved),
                Milestone::new(key::<Gamma>(), State::Resolved),
            ]
        );
    }
}

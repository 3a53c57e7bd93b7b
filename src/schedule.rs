use crate::error::Result;
use crate::execution::Execution;
use crate::graph::{DependencyGraph, Milestone};
use crate::lifecycle::State;
use crate::registry::ComponentRegistry;
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

/// One planned milestone, in a form suitable for printing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedMilestone {
    pub component: String,
    pub state: State,
    pub executions: Vec<String>,
}

/// Deterministic milestone order plus the executions bound to each milestone
#[derive(Debug, Clone)]
pub struct Schedule {
    order: Vec<Milestone>,
    bindings: HashMap<Milestone, Vec<usize>>,
}

impl Schedule {
    /// Build the dependency graph and sort it; fails on registration errors or cycles
    pub fn plan(registry: &ComponentRegistry, executions: &[Execution]) -> Result<Self> {
        let graph = DependencyGraph::build(registry, executions)?;
        let order = graph.topological_order()?;

        let mut bindings: HashMap<Milestone, Vec<usize>> = HashMap::new();
        for (index, execution) in executions.iter().enumerate() {
            bindings
                .entry(Milestone::new(execution.owner(), execution.target()))
                .or_default()
                .push(index);
        }

        debug!(
            "Planned {} milestones for {} components and {} executions",
            order.len(),
            registry.len(),
            executions.len()
        );
        Ok(Self { order, bindings })
    }

    /// Every milestone, including teardown ones
    pub fn milestones(&self) -> &[Milestone] {
        &self.order
    }

    /// Milestones visited by the startup pass
    pub fn startup(&self) -> impl Iterator<Item = Milestone> + '_ {
        self.order
            .iter()
            .copied()
            .filter(|milestone| milestone.state.is_startup())
    }

    /// Indices into the execution list bound to `milestone`, in declaration order
    pub fn executions_for(&self, milestone: &Milestone) -> &[usize] {
        self.bindings.get(milestone).map_or(&[][..], Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Human-readable plan
    pub fn describe(&self, executions: &[Execution]) -> Vec<PlannedMilestone> {
        self.order
            .iter()
            .map(|milestone| PlannedMilestone {
                component: milestone.component.to_string(),
                state: milestone.state,
                executions: self
                    .executions_for(milestone)
                    .iter()
                    .enumerate()
                    .filter_map(|(ordinal, index)| {
                        executions.get(*index).map(|execution| execution.describe(ordinal))
                    })
                    .collect(),
            })
            .collect()
    }
}

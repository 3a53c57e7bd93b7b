use super::types::ContainerStatus;
use crate::component::{Injectable, Registration};
use crate::config::ContainerConfig;
use crate::error::{Result, StagehandError};
use crate::events::{EventBus, LifecycleEvent};
use crate::execution::{Execution, ExecutionSpec};
use crate::registry::ComponentRegistry;
use crate::schedule::{PlannedMilestone, Schedule};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

/// Holds every component and execution, and drives them through their lifecycle.
///
/// All state lives in the value itself, so independent containers can coexist.
pub struct Container {
    pub(super) id: Uuid,
    pub(super) config: ContainerConfig,
    pub(super) registry: ComponentRegistry,
    pub(super) executions: Vec<Execution>,
    pub(super) status: ContainerStatus,
    pub(super) events: Arc<EventBus>,
}

impl Container {
    /// Create an empty container with default configuration
    pub fn new() -> Self {
        Self::with_config(ContainerConfig::default())
    }

    pub fn with_config(config: ContainerConfig) -> Self {
        let events = Arc::new(EventBus::new(config.event_capacity));
        let id = Uuid::new_v4();
        debug!("Created container {} ({})", config.name, id);

        Self {
            id,
            config,
            registry: ComponentRegistry::new(),
            executions: Vec::new(),
            status: ContainerStatus::Configuring,
            events,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.events.subscribe()
    }

    /// Register a component; fails if its type is already registered
    pub fn register(&mut self, registration: Registration) -> Result<()> {
        self.ensure_configuring("register components")?;
        self.registry.register(registration)
    }

    /// Register a pre-built component value
    pub fn register_instance<T: Injectable>(&mut self, value: T) -> Result<()> {
        self.register(Registration::instance(value))
    }

    /// Add an execution to the flat list consumed by `start`
    pub fn declare(&mut self, execution: Execution) -> Result<()> {
        self.ensure_configuring("declare executions")?;
        debug!(
            "Declared execution on {}@{} with {} dependencies",
            execution.owner(),
            execution.target(),
            execution.dependencies().len()
        );
        self.executions.push(execution);
        Ok(())
    }

    /// Validate and add an untyped execution declaration
    pub fn declare_spec(&mut self, spec: ExecutionSpec) -> Result<()> {
        let execution = spec.build()?;
        self.declare(execution)
    }

    /// Build and sort the dependency graph without running anything
    pub fn plan(&self) -> Result<Schedule> {
        Schedule::plan(&self.registry, &self.executions)
    }

    /// The plan in printable form
    pub fn describe_plan(&self) -> Result<Vec<PlannedMilestone>> {
        Ok(self.plan()?.describe(&self.executions))
    }

    pub(super) fn ensure_configuring(&self, operation: &'static str) -> Result<()> {
        if self.status == ContainerStatus::Configuring {
            Ok(())
        } else {
            Err(StagehandError::ContainerState {
                status: self.status,
                operation,
            })
        }
    }

    pub(super) fn publish(&self, event: LifecycleEvent) {
        self.events.publish(event);
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

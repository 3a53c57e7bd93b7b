use super::types::{ContainerStatus, TeardownReport};
use super::Container;
use crate::component::ComponentKey;
use crate::error::{Result, StagehandError};
use crate::events::LifecycleEvent;
use crate::executor::run_execution;
use crate::graph::Milestone;
use crate::lifecycle::State;
use chrono::Utc;
use tracing::{error, info, info_span, warn};

impl Container {
    /// Tear every reached component down in reverse order of its last transition.
    ///
    /// Failures are collected and returned together once every component has been attempted.
    pub fn stop(&mut self) -> Result<TeardownReport> {
        match self.status {
            ContainerStatus::Started | ContainerStatus::Failed => {}
            status => {
                return Err(StagehandError::ContainerState {
                    status,
                    operation: "stop",
                })
            }
        }

        let span = info_span!("stop", container = %self.id, name = %self.config.name);
        let _enter = span.enter();

        let order = self.teardown_order();
        info!("Beginning teardown of {} components", order.len());

        let mut report = TeardownReport::default();
        for component in order {
            match self.stop_component(component) {
                Ok(()) => {
                    info!("{} stopped", component);
                    report.record_stopped(component.to_string());
                }
                Err(e) => {
                    error!("Error stopping {}: {}", component, e);
                    self.publish(LifecycleEvent::TeardownFailed {
                        component: component.to_string(),
                        error: e.to_string(),
                        timestamp: Utc::now(),
                    });
                    report.record_failure(component.to_string(), e);
                }
            }
        }

        self.status = ContainerStatus::Stopped;

        if report.is_clean() {
            info!("Teardown completed for {} components", report.stopped().len());
            Ok(report)
        } else {
            warn!(
                "Teardown completed with {} failures",
                report.failures().len()
            );
            Err(StagehandError::Teardown(report))
        }
    }

    /// Components still alive, latest transition first.
    ///
    /// A component that was constructed but never reached a stage counts as
    /// changed after everything in the history, so it is torn down first.
    pub(super) fn teardown_order(&self) -> Vec<ComponentKey> {
        let mut order: Vec<ComponentKey> = Vec::new();
        for transition in self.registry.history() {
            order.retain(|key| *key != transition.component);
            order.push(transition.component);
        }
        for key in self.registry.keys() {
            if self.registry.state(key).is_none() && self.registry.instance(key).is_some() {
                order.push(key);
            }
        }
        order.retain(|key| {
            self.registry.instance(*key).is_some()
                && self.registry.state(*key) != Some(State::terminal())
        });
        order.reverse();
        order
    }

    /// Run the terminal-stage executions bound to `component`, then mark it stopped.
    /// The component keeps its current state when any of them fails.
    fn stop_component(&mut self, component: ComponentKey) -> Result<()> {
        let milestone = Milestone::new(component, State::terminal());
        let bound: Vec<usize> = self
            .executions
            .iter()
            .enumerate()
            .filter(|(_, execution)| {
                execution.owner() == component && execution.target() == State::terminal()
            })
            .map(|(index, _)| index)
            .collect();

        for (ordinal, index) in bound.into_iter().enumerate() {
            let execution = &mut self.executions[index];
            if execution.is_spent() {
                continue;
            }
            let name = execution.describe(ordinal);
            let outcome = run_execution(&self.registry, execution, &name)?;
            self.publish_outcome(milestone, &name, &outcome);
        }

        let from = self.registry.state(component);
        self.registry.terminate(component)?;
        self.publish(LifecycleEvent::StateAdvanced {
            component: component.to_string(),
            from,
            to: State::terminal(),
            timestamp: Utc::now(),
        });
        Ok(())
    }
}

use super::types::{ContainerStatus, StartupReport};
use super::Container;
use crate::error::{Result, StagehandError};
use crate::events::LifecycleEvent;
use crate::executor::{run_execution, Outcome};
use crate::graph::Milestone;
use crate::lifecycle::State;
use crate::schedule::Schedule;
use chrono::Utc;
use tracing::{debug, error, info, info_span};

impl Container {
    /// Build the dependency graph, order it, and drive every component to its last startup state.
    ///
    /// Any failure cancels the rest of startup and marks the container failed;
    /// components reached so far stay in the registry for diagnostics.
    pub fn start(&mut self) -> Result<StartupReport> {
        self.ensure_configuring("start")?;

        let span = info_span!("start", container = %self.id, name = %self.config.name);
        let _enter = span.enter();

        info!(
            "Starting container with {} components and {} executions",
            self.registry.len(),
            self.executions.len()
        );

        let schedule = match Schedule::plan(&self.registry, &self.executions) {
            Ok(schedule) => schedule,
            Err(e) => return Err(self.fail(e)),
        };

        if self.config.log_schedule {
            for (position, milestone) in schedule.milestones().iter().enumerate() {
                debug!(
                    "Schedule #{}: {} ({} executions)",
                    position,
                    milestone,
                    schedule.executions_for(milestone).len()
                );
            }
        }

        let mut report = StartupReport::default();
        for milestone in schedule.startup() {
            if let Err(e) = self.reach(milestone, &schedule, &mut report) {
                error!("Failed to reach {}: {}", milestone, e);
                return Err(self.fail(e));
            }
        }

        self.status = ContainerStatus::Started;
        info!(
            "Container started: {} milestones, {} executions run, {} skipped",
            report.milestones,
            report.invoked.len(),
            report.skipped.len()
        );
        Ok(report)
    }

    /// Materialize if needed, run the milestone's executions in declaration order, then advance
    fn reach(&mut self, milestone: Milestone, schedule: &Schedule, report: &mut StartupReport) -> Result<()> {
        let component = milestone.component;

        if milestone.state == State::first() {
            self.registry.materialize(component)?;
            self.publish(LifecycleEvent::ComponentMaterialized {
                component: component.to_string(),
                timestamp: Utc::now(),
            });
        }

        for (ordinal, &index) in schedule.executions_for(&milestone).iter().enumerate() {
            let execution = self.executions.get_mut(index).ok_or_else(|| {
                StagehandError::system(format!("Execution #{} missing from {}", index, milestone))
            })?;
            let name = execution.describe(ordinal);
            let outcome = run_execution(&self.registry, execution, &name)?;
            self.publish_outcome(milestone, &name, &outcome);
            match outcome {
                Outcome::Invoked { .. } => report.invoked.push(name),
                Outcome::Skipped { .. } => report.skipped.push(name),
            }
        }

        let from = self.registry.state(component);
        self.registry.advance(component, milestone.state)?;
        report.milestones += 1;
        self.publish(LifecycleEvent::StateAdvanced {
            component: component.to_string(),
            from,
            to: milestone.state,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Publish the events describing how an execution went
    pub(super) fn publish_outcome(&self, milestone: Milestone, name: &str, outcome: &Outcome) {
        let component = milestone.component.to_string();
        match outcome {
            Outcome::Invoked { substituted } => {
                for missing in substituted {
                    self.publish(LifecycleEvent::DependencySubstituted {
                        component: component.clone(),
                        state: milestone.state,
                        execution: name.to_string(),
                        missing: missing.to_string(),
                        timestamp: Utc::now(),
                    });
                }
                self.publish(LifecycleEvent::ExecutionInvoked {
                    component,
                    state: milestone.state,
                    execution: name.to_string(),
                    timestamp: Utc::now(),
                });
            }
            Outcome::Skipped { missing } => {
                self.publish(LifecycleEvent::ExecutionSkipped {
                    component,
                    state: milestone.state,
                    execution: name.to_string(),
                    missing: missing.to_string(),
                    timestamp: Utc::now(),
                });
            }
        }
    }

    fn fail(&mut self, error: StagehandError) -> StagehandError {
        self.status = ContainerStatus::Failed;
        self.publish(LifecycleEvent::StartupFailed {
            reason: error.to_string(),
            timestamp: Utc::now(),
        });
        error
    }
}

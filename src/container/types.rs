use crate::error::StagehandError;
use serde::Serialize;
use std::fmt;

/// Container lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerStatus {
    /// Accepting registrations and executions
    Configuring,
    /// Every component reached its last startup state
    Started,
    /// Startup was cancelled; the container must not be used
    Failed,
    /// Teardown has run
    Stopped,
}

impl fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ContainerStatus::Configuring => "configuring",
            ContainerStatus::Started => "started",
            ContainerStatus::Failed => "failed",
            ContainerStatus::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// What a successful startup did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StartupReport {
    /// Milestones reached
    pub milestones: usize,
    /// Executions that ran, in invocation order
    pub invoked: Vec<String>,
    /// Executions skipped because a dependency was missing
    pub skipped: Vec<String>,
}

/// A component whose teardown failed
#[derive(Debug)]
pub struct TeardownFailure {
    pub component: String,
    pub error: StagehandError,
}

/// Outcome of a teardown pass
#[derive(Debug, Default)]
pub struct TeardownReport {
    stopped: Vec<String>,
    failures: Vec<TeardownFailure>,
}

impl TeardownReport {
    /// Components that reached the terminal state, in teardown order
    pub fn stopped(&self) -> &[String] {
        &self.stopped
    }

    pub fn failures(&self) -> &[TeardownFailure] {
        &self.failures
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// One line per failed component
    pub fn summary(&self) -> String {
        self.failures
            .iter()
            .map(|failure| format!("{}: {}", failure.component, failure.error))
            .collect::<Vec<_>>()
            .join("; ")
    }

    pub(crate) fn record_stopped(&mut self, component: String) {
        self.stopped.push(component);
    }

    pub(crate) fn record_failure(&mut self, component: String, error: StagehandError) {
        self.failures.push(TeardownFailure { component, error });
    }
}

use crate::lifecycle::State;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, error, trace, warn};

/// Events emitted while a container starts and stops
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LifecycleEvent {
    /// A component's constructor ran
    ComponentMaterialized {
        component: String,
        timestamp: DateTime<Utc>,
    },
    /// A component reached a new state
    StateAdvanced {
        component: String,
        from: Option<State>,
        to: State,
        timestamp: DateTime<Utc>,
    },
    /// An execution callback was invoked
    ExecutionInvoked {
        component: String,
        state: State,
        execution: String,
        timestamp: DateTime<Utc>,
    },
    /// An execution was skipped because a dependency was missing
    ExecutionSkipped {
        component: String,
        state: State,
        execution: String,
        missing: String,
        timestamp: DateTime<Utc>,
    },
    /// An execution ran with an absent value for a missing dependency
    DependencySubstituted {
        component: String,
        state: State,
        execution: String,
        missing: String,
        timestamp: DateTime<Utc>,
    },
    /// Startup was cancelled
    StartupFailed {
        reason: String,
        timestamp: DateTime<Utc>,
    },
    /// A component could not be torn down
    TeardownFailed {
        component: String,
        error: String,
        timestamp: DateTime<Utc>,
    },
}

impl LifecycleEvent {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            LifecycleEvent::ComponentMaterialized { timestamp, .. } => *timestamp,
            LifecycleEvent::StateAdvanced { timestamp, .. } => *timestamp,
            LifecycleEvent::ExecutionInvoked { timestamp, .. } => *timestamp,
            LifecycleEvent::ExecutionSkipped { timestamp, .. } => *timestamp,
            LifecycleEvent::DependencySubstituted { timestamp, .. } => *timestamp,
            LifecycleEvent::StartupFailed { timestamp, .. } => *timestamp,
            LifecycleEvent::TeardownFailed { timestamp, .. } => *timestamp,
        }
    }

    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            LifecycleEvent::ComponentMaterialized { component, .. } => {
                format!("{} created", component)
            }
            LifecycleEvent::StateAdvanced {
                component, from, to, ..
            } => match from {
                Some(from) => format!("{} {} -> {}", component, from, to),
                None => format!("{} -> {}", component, to),
            },
            LifecycleEvent::ExecutionInvoked {
                component,
                state,
                execution,
                ..
            } => format!("Ran {} for {}@{}", execution, component, state),
            LifecycleEvent::ExecutionSkipped {
                component,
                state,
                execution,
                missing,
                ..
            } => format!(
                "Skipped {} for {}@{}: {} unavailable",
                execution, component, state, missing
            ),
            LifecycleEvent::DependencySubstituted {
                component,
                state,
                execution,
                missing,
                ..
            } => format!(
                "Ran {} for {}@{} without {}",
                execution, component, state, missing
            ),
            LifecycleEvent::StartupFailed { reason, .. } => format!("Startup failed: {}", reason),
            LifecycleEvent::TeardownFailed {
                component, error, ..
            } => format!("Teardown of {} failed: {}", component, error),
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            LifecycleEvent::ComponentMaterialized { .. } => "component_materialized",
            LifecycleEvent::StateAdvanced { .. } => "state_advanced",
            LifecycleEvent::ExecutionInvoked { .. } => "execution_invoked",
            LifecycleEvent::ExecutionSkipped { .. } => "execution_skipped",
            LifecycleEvent::DependencySubstituted { .. } => "dependency_substituted",
            LifecycleEvent::StartupFailed { .. } => "startup_failed",
            LifecycleEvent::TeardownFailed { .. } => "teardown_failed",
        }
    }
}

/// Broadcast channel for lifecycle events
pub struct EventBus {
    sender: broadcast::Sender<LifecycleEvent>,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to events and get a receiver
    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all subscribers, returning how many received it
    pub fn publish(&self, event: LifecycleEvent) -> usize {
        match &event {
            LifecycleEvent::StartupFailed { reason, .. } => {
                error!("Startup failed: {}", reason);
            }
            LifecycleEvent::TeardownFailed {
                component, error, ..
            } => {
                error!("Teardown of {} failed: {}", component, error);
            }
            LifecycleEvent::ExecutionSkipped { .. } | LifecycleEvent::DependencySubstituted { .. } => {
                warn!("{}", event.description());
            }
            _ => {
                debug!("{}", event.description());
            }
        }

        match self.sender.send(event) {
            Ok(receivers) => receivers,
            Err(_) => {
                trace!("No lifecycle event subscribers");
                0
            }
        }
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Check if there are any active subscribers
    pub fn has_subscribers(&self) -> bool {
        self.sender.receiver_count() > 0
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

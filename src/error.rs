use crate::component::{BoxError, ComponentKey, DependencyDescriptor};
use crate::container::{ContainerStatus, TeardownReport};
use crate::graph::CycleError;
use crate::lifecycle::State;
use crate::resolver::Unavailable;
use thiserror::Error;

/// Errors raised while declaring components and executions
#[derive(Error, Debug)]
pub enum RegistrationError {
    #[error("component {component} is already registered")]
    Duplicate { component: ComponentKey },

    #[error("execution on {owner}@{state} declares {count} dependencies, at most {max} are allowed")]
    TooManyDependencies {
        owner: ComponentKey,
        state: State,
        count: usize,
        max: usize,
    },

    #[error("execution on {owner}@{state} was built without a callback")]
    MissingCallback { owner: ComponentKey, state: State },

    #[error("execution on {owner}@{state} is bound to an unregistered component")]
    UnregisteredOwner { owner: ComponentKey, state: State },

    #[error("execution on {owner}@{state} depends on {dependency}, which startup never reaches")]
    UnreachableDependency {
        owner: ComponentKey,
        state: State,
        dependency: DependencyDescriptor,
    },
}

#[derive(Error, Debug)]
pub enum StagehandError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Registration error: {0}")]
    Registration(#[from] RegistrationError),

    #[error(transparent)]
    Cycle(#[from] CycleError),

    #[error("Missing dependency: {owner}@{state} requires {missing} ({reason})")]
    MissingDependency {
        owner: ComponentKey,
        state: State,
        missing: DependencyDescriptor,
        reason: Unavailable,
    },

    #[error("Component {component} is not injectable: {reason}")]
    NotInjectable {
        component: ComponentKey,
        reason: Unavailable,
    },

    #[error(
        "Invalid transition for {component}: {} -> {to}",
        .from.map_or("unmaterialized", |state| state.as_str())
    )]
    InvalidTransition {
        component: ComponentKey,
        from: Option<State>,
        to: State,
    },

    #[error("Construction of {component} failed: {source}")]
    ConstructionFailed {
        component: ComponentKey,
        #[source]
        source: BoxError,
    },

    #[error("Execution {execution} on {owner}@{state} failed: {source}")]
    ExecutionFailed {
        owner: ComponentKey,
        state: State,
        execution: String,
        #[source]
        source: BoxError,
    },

    #[error("Teardown failed for {} component(s): {}", .0.failures().len(), .0.summary())]
    Teardown(TeardownReport),

    #[error("Container is {status}, cannot {operation}")]
    ContainerState {
        status: ContainerStatus,
        operation: &'static str,
    },

    #[error("System error: {message}")]
    System { message: String },
}

impl StagehandError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    /// Whether the error came from declaration rather than from running the schedule
    pub fn is_registration(&self) -> bool {
        matches!(self, Self::Registration(_))
    }
}

pub type Result<T> = std::result::Result<T, StagehandError>;

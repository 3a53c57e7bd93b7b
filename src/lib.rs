pub mod component;
pub mod config;
pub mod container;
pub mod demo;
pub mod error;
pub mod events;
pub mod execution;
pub mod graph;
pub mod lifecycle;
pub mod registry;
pub mod resolver;
pub mod schedule;

mod executor;

pub use component::{BoxError, ComponentKey, DependencyDescriptor, Injectable, Instance, Registration};
pub use config::{ContainerConfig, LogFormat, StagehandConfig};
pub use container::{Container, ContainerStatus, StartupReport, TeardownFailure, TeardownReport};
pub use error::{RegistrationError, Result, StagehandError};
pub use events::{EventBus, LifecycleEvent};
pub use execution::{
    Execution, ExecutionBuilder, ExecutionBuilder1, ExecutionBuilder2, ExecutionBuilder3,
    ExecutionSpec, Invocation, MissingPolicy, Optional, Required, SkipIfMissing, MAX_DEPENDENCIES,
};
pub use graph::{CycleError, DependencyGraph, Milestone};
pub use lifecycle::State;
pub use registry::{ComponentRegistry, Transition};
pub use resolver::{Resolver, Unavailable};
pub use schedule::{PlannedMilestone, Schedule};

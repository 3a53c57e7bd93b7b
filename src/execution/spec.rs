use crate::component::{BoxError, ComponentKey, DependencyDescriptor, Injectable, Instance};
use crate::error::RegistrationError;
use crate::lifecycle::State;
use crate::resolver::downcast;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Most extra dependencies a single execution may declare
pub const MAX_DEPENDENCIES: usize = 3;

/// What to do when an extra dependency cannot be resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingPolicy {
    /// Fail the whole startup
    #[default]
    Abort,
    /// Do not invoke this execution; the owner still advances
    Skip,
    /// Invoke the callback with an absent value in that slot
    Substitute,
}

/// An extra dependency together with its missing-dependency policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionDependency {
    pub descriptor: DependencyDescriptor,
    pub policy: MissingPolicy,
}

pub type ExecutionFn = Box<dyn FnOnce(Invocation) -> Result<(), BoxError> + Send>;

/// Owner instance and resolved extra arguments handed to a callback
pub struct Invocation {
    owner: Instance,
    owner_key: ComponentKey,
    arguments: Vec<Option<Instance>>,
}

impl Invocation {
    pub(crate) fn new(owner_key: ComponentKey, owner: Instance, arguments: Vec<Option<Instance>>) -> Self {
        Self {
            owner,
            owner_key,
            arguments,
        }
    }

    pub fn owner<T: Injectable>(&self) -> Result<Arc<T>, BoxError> {
        downcast::<T>(self.owner_key, Arc::clone(&self.owner)).map_err(Into::into)
    }

    /// The argument in `index`, or `None` when it was substituted
    pub fn argument<T: Injectable>(&self, index: usize) -> Option<Arc<T>> {
        self.slot(index)
            .and_then(|instance| Arc::downcast::<T>(Arc::clone(instance)).ok())
    }

    pub fn slot(&self, index: usize) -> Option<&Instance> {
        self.arguments.get(index).and_then(Option::as_ref)
    }

    pub fn len(&self) -> usize {
        self.arguments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arguments.is_empty()
    }
}

/// Untyped declaration of an execution, validated when built.
///
/// The typed builders funnel into this, so arity and callback checks live
/// in one place.
pub struct ExecutionSpec {
    owner: ComponentKey,
    target: State,
    label: Option<String>,
    dependencies: Vec<ExecutionDependency>,
    callback: Option<ExecutionFn>,
}

impl ExecutionSpec {
    pub fn new(owner: ComponentKey, target: State) -> Self {
        Self {
            owner,
            target,
            label: None,
            dependencies: Vec::new(),
            callback: None,
        }
    }

    pub fn label<S: Into<String>>(mut self, label: S) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn depends_on(mut self, descriptor: DependencyDescriptor, policy: MissingPolicy) -> Self {
        self.dependencies.push(ExecutionDependency { descriptor, policy });
        self
    }

    pub fn callback<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(Invocation) -> Result<(), BoxError> + Send + 'static,
    {
        self.callback = Some(Box::new(callback));
        self
    }

    pub fn arity(&self) -> usize {
        self.dependencies.len()
    }

    pub fn build(self) -> Result<Execution, RegistrationError> {
        if self.dependencies.len() > MAX_DEPENDENCIES {
            return Err(RegistrationError::TooManyDependencies {
                owner: self.owner,
                state: self.target,
                count: self.dependencies.len(),
                max: MAX_DEPENDENCIES,
            });
        }

        let callback = self.callback.ok_or(RegistrationError::MissingCallback {
            owner: self.owner,
            state: self.target,
        })?;

        Ok(Execution {
            owner: self.owner,
            target: self.target,
            label: self.label,
            dependencies: self.dependencies,
            callback: Some(callback),
        })
    }
}

/// A callback bound to one milestone, run at most once per container
pub struct Execution {
    owner: ComponentKey,
    target: State,
    label: Option<String>,
    dependencies: Vec<ExecutionDependency>,
    callback: Option<ExecutionFn>,
}

impl Execution {
    pub fn owner(&self) -> ComponentKey {
        self.owner
    }

    pub fn target(&self) -> State {
        self.target
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn dependencies(&self) -> &[ExecutionDependency] {
        &self.dependencies
    }

    /// Whether the callback has been consumed (invoked or skipped)
    pub fn is_spent(&self) -> bool {
        self.callback.is_none()
    }

    /// Name used in logs and reports
    pub fn describe(&self, ordinal: usize) -> String {
        match &self.label {
            Some(label) => label.clone(),
            None => format!("{}@{}#{}", self.owner, self.target, ordinal),
        }
    }

    pub(crate) fn take_callback(&mut self) -> Option<ExecutionFn> {
        self.callback.take()
    }
}

impl fmt::Debug for Execution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Execution")
            .field("owner", &self.owner)
            .field("target", &self.target)
            .field("label", &self.label)
            .field("dependencies", &self.dependencies)
            .field("spent", &self.is_spent())
            .finish()
    }
}

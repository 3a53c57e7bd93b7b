use crate::component::{ComponentKey, DependencyDescriptor, Injectable, Instance};
use crate::error::{Result, StagehandError};
use crate::lifecycle::State;
use crate::registry::ComponentRegistry;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// Why a lookup could not produce an instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unavailable {
    /// The type was never registered
    Unregistered,
    /// Registered, but its constructor has not run yet
    NotMaterialized,
    /// Live, but not yet at the required stage
    NotReady {
        current: Option<State>,
        required: State,
    },
    /// The stored instance is not of the requested type
    TypeMismatch,
}

impl fmt::Display for Unavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unavailable::Unregistered => f.write_str("not registered"),
            Unavailable::NotMaterialized => f.write_str("not yet created"),
            Unavailable::NotReady {
                current: Some(current),
                required,
            } => write!(f, "at {} but {} is required", current, required),
            Unavailable::NotReady {
                current: None,
                required,
            } => write!(f, "has no state yet but {} is required", required),
            Unavailable::TypeMismatch => f.write_str("stored instance has a different type"),
        }
    }
}

/// Read-only lookup of live component instances.
///
/// The resolver never constructs anything; creation goes exclusively
/// through [`ComponentRegistry::materialize`].
#[derive(Clone, Copy)]
pub struct Resolver<'a> {
    registry: &'a ComponentRegistry,
}

impl<'a> Resolver<'a> {
    pub fn new(registry: &'a ComponentRegistry) -> Self {
        Self { registry }
    }

    /// Look up the singleton of type `T`
    pub fn resolve<T: Injectable>(&self) -> Result<Arc<T>> {
        let key = ComponentKey::of::<T>();
        let instance = self.resolve_key(key)?;
        downcast::<T>(key, instance)
    }

    /// Look up the singleton of type `T`, returning `None` when it is unavailable
    pub fn resolve_or_absent<T: Injectable>(&self) -> Option<Arc<T>> {
        match self.resolve::<T>() {
            Ok(instance) => Some(instance),
            Err(e) => {
                trace!("Resolving {} yielded nothing: {}", ComponentKey::of::<T>(), e);
                None
            }
        }
    }

    /// Look up a type-erased instance by key
    pub fn resolve_key(&self, key: ComponentKey) -> Result<Instance> {
        if !self.registry.contains(key) {
            return Err(not_injectable(key, Unavailable::Unregistered));
        }

        self.registry
            .instance(key)
            .cloned()
            .ok_or_else(|| not_injectable(key, Unavailable::NotMaterialized))
    }

    /// Look up an instance that must have reached the descriptor's minimum state
    pub fn resolve_descriptor(&self, descriptor: &DependencyDescriptor) -> Result<Instance> {
        let key = descriptor.component();
        let instance = self.resolve_key(key)?;

        let current = self.registry.state(key);
        match current {
            Some(state) if state >= descriptor.state() => Ok(instance),
            _ => Err(not_injectable(
                key,
                Unavailable::NotReady {
                    current,
                    required: descriptor.state(),
                },
            )),
        }
    }

    pub fn resolve_descriptor_or_absent(&self, descriptor: &DependencyDescriptor) -> Option<Instance> {
        self.resolve_descriptor(descriptor).ok()
    }
}

fn not_injectable(component: ComponentKey, reason: Unavailable) -> StagehandError {
    StagehandError::NotInjectable { component, reason }
}

pub(crate) fn downcast<T: Injectable>(key: ComponentKey, instance: Instance) -> Result<Arc<T>> {
    Arc::downcast::<T>(instance).map_err(|_| not_injectable(key, Unavailable::TypeMismatch))
}

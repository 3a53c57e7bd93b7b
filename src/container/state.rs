use super::types::ContainerStatus;
use super::Container;
use crate::component::{ComponentKey, Injectable};
use crate::error::{Result, StagehandError};
use crate::lifecycle::State;
use crate::registry::{ComponentRegistry, Transition};
use crate::resolver::Resolver;
use std::sync::Arc;

impl Container {
    pub fn status(&self) -> ContainerStatus {
        self.status
    }

    /// Live instance of `T`, or `None` if it is unavailable or the container failed
    pub fn get<T: Injectable>(&self) -> Option<Arc<T>> {
        if self.status == ContainerStatus::Failed {
            return None;
        }
        Resolver::new(&self.registry).resolve_or_absent::<T>()
    }

    /// Live instance of `T`, failing with the reason it is unavailable
    pub fn require<T: Injectable>(&self) -> Result<Arc<T>> {
        if self.status == ContainerStatus::Failed {
            return Err(StagehandError::ContainerState {
                status: self.status,
                operation: "resolve components",
            });
        }
        Resolver::new(&self.registry).resolve::<T>()
    }

    /// Current stage of `T`; `None` when it is unregistered or has not been created
    pub fn state_of<T: Injectable>(&self) -> Option<State> {
        self.registry.state(ComponentKey::of::<T>())
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// Every state transition so far, in the order it happened
    pub fn history(&self) -> &[Transition] {
        self.registry.history()
    }
}

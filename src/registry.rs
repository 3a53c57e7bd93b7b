use crate::component::{ComponentKey, Constructor, DependencyDescriptor, Instance, Registration};
use crate::error::{RegistrationError, Result, StagehandError};
use crate::lifecycle::State;
use crate::resolver::{Resolver, Unavailable};
use std::collections::HashMap;
use tracing::{debug, error};

/// One recorded state change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub component: ComponentKey,
    pub from: Option<State>,
    pub to: State,
}

struct Entry {
    key: ComponentKey,
    requires: Vec<ComponentKey>,
    constructor: Option<Constructor>,
    instance: Option<Instance>,
    state: Option<State>,
}

/// Canonical set of component instances and their current states
#[derive(Default)]
pub struct ComponentRegistry {
    entries: Vec<Entry>,
    index: HashMap<ComponentKey, usize>,
    history: Vec<Transition>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a type and how to build it; nothing is constructed yet
    pub fn register(&mut self, registration: Registration) -> Result<()> {
        let (key, requires, constructor) = registration.into_parts();
        if self.index.contains_key(&key) {
            return Err(RegistrationError::Duplicate { component: key }.into());
        }

        debug!("Registered component {} (requires {:?})", key, requires);
        self.index.insert(key, self.entries.len());
        self.entries.push(Entry {
            key,
            requires,
            constructor: Some(constructor),
            instance: None,
            state: None,
        });
        Ok(())
    }

    pub fn contains(&self, key: ComponentKey) -> bool {
        self.index.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered keys, in registration order
    pub fn keys(&self) -> impl Iterator<Item = ComponentKey> + '_ {
        self.entries.iter().map(|entry| entry.key)
    }

    /// Registration position of a key
    pub fn position(&self, key: ComponentKey) -> Option<usize> {
        self.index.get(&key).copied()
    }

    /// Constructor-level dependencies of a registered key
    pub fn requirements(&self, key: ComponentKey) -> &[ComponentKey] {
        self.entry(key).map_or(&[][..], |entry| entry.requires.as_slice())
    }

    pub fn instance(&self, key: ComponentKey) -> Option<&Instance> {
        self.entry(key).and_then(|entry| entry.instance.as_ref())
    }

    pub fn state(&self, key: ComponentKey) -> Option<State> {
        self.entry(key).and_then(|entry| entry.state)
    }

    /// Every state change in the order it happened
    pub fn history(&self) -> &[Transition] {
        &self.history
    }

    /// Construct the instance for `key` if needed and return the singleton.
    ///
    /// All constructor-level dependencies must already be materialized.
    pub fn materialize(&mut self, key: ComponentKey) -> Result<Instance> {
        let position = self.position(key).ok_or(StagehandError::NotInjectable {
            component: key,
            reason: Unavailable::Unregistered,
        })?;

        if let Some(instance) = self.instance(key) {
            return Ok(instance.clone());
        }

        for required in self.requirements(key) {
            let reason = if !self.contains(*required) {
                Some(Unavailable::Unregistered)
            } else if self.instance(*required).is_none() {
                Some(Unavailable::NotMaterialized)
            } else {
                None
            };

            if let Some(reason) = reason {
                return Err(StagehandError::MissingDependency {
                    owner: key,
                    state: State::first(),
                    missing: DependencyDescriptor::new(*required, State::first()),
                    reason,
                });
            }
        }

        let constructor = self
            .entries
            .get_mut(position)
            .and_then(|entry| entry.constructor.take())
            .ok_or_else(|| {
                StagehandError::system(format!("Constructor for {} already ran and failed", key))
            })?;

        let built = {
            let resolver = Resolver::new(self);
            constructor(&resolver)
        };

        let instance = built.map_err(|source| {
            error!("Failed to construct {}: {}", key, source);
            StagehandError::ConstructionFailed {
                component: key,
                source,
            }
        })?;

        if let Some(entry) = self.entries.get_mut(position) {
            entry.instance = Some(instance.clone());
        }
        debug!("Materialized component {}", key);
        Ok(instance)
    }

    /// Record that `key` reached `to`, which must be the immediate successor of its current state
    pub fn advance(&mut self, key: ComponentKey, to: State) -> Result<()> {
        let entry = self.entry_mut(key)?;
        let from = entry.state;

        let expected = match from {
            None => Some(State::first()),
            Some(current) => current.next(),
        };
        if expected != Some(to) || entry.instance.is_none() {
            return Err(StagehandError::InvalidTransition {
                component: key,
                from,
                to,
            });
        }

        entry.state = Some(to);
        self.history.push(Transition {
            component: key,
            from,
            to,
        });
        Ok(())
    }

    /// Move a materialized component straight to the terminal stage.
    /// A component whose constructor ran but never reached a stage qualifies too.
    pub(crate) fn terminate(&mut self, key: ComponentKey) -> Result<()> {
        let entry = self.entry_mut(key)?;
        let from = entry.state;
        if entry.instance.is_none() || from == Some(State::terminal()) {
            return Err(StagehandError::InvalidTransition {
                component: key,
                from,
                to: State::terminal(),
            });
        }

        entry.state = Some(State::terminal());
        self.history.push(Transition {
            component: key,
            from,
            to: State::terminal(),
        });
        Ok(())
    }

    fn entry(&self, key: ComponentKey) -> Option<&Entry> {
        self.position(key).and_then(|position| self.entries.get(position))
    }

    fn entry_mut(&mut self, key: ComponentKey) -> Result<&mut Entry> {
        let position = self.position(key);
        position
            .and_then(|position| self.entries.get_mut(position))
            .ok_or(StagehandError::NotInjectable {
                component: key,
                reason: Unavailable::Unregistered,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Clock;

    struct Scheduler {
        ticks: u64,
    }

    fn key<T: 'static>() -> ComponentKey {
        ComponentKey::of::<T>()
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let mut registry = ComponentRegistry::new();
        registry.register(Registration::instance(Clock)).unwrap();

        let err = registry.register(Registration::instance(Clock)).unwrap_err();
        assert!(matches!(
            err,
            StagehandError::Registration(RegistrationError::Duplicate { component }) if component == key::<Clock>()
        ));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_does_not_construct() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let mut registry = ComponentRegistry::new();
        registry
            .register(Registration::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Clock)
            }))
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(registry.instance(key::<Clock>()).is_none());
    }

    #[test]
    fn test_materialize_is_singleton() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let mut registry = ComponentRegistry::new();
        registry
            .register(Registration::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Scheduler { ticks: 7 })
            }))
            .unwrap();

        let first = registry.materialize(key::<Scheduler>()).unwrap();
        let second = registry.materialize(key::<Scheduler>()).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(first.downcast_ref::<Scheduler>().map(|s| s.ticks), Some(7));
    }

    #[test]
    fn test_materialize_requires_constructor_dependencies() {
        let mut registry = ComponentRegistry::new();
        registry.register(Registration::instance(Clock)).unwrap();
        registry
            .register(
                Registration::new(|resolver| {
                    resolver.resolve::<Clock>()?;
                    Ok(Scheduler { ticks: 0 })
                })
                .requires::<Clock>(),
            )
            .unwrap();

        let err = registry.materialize(key::<Scheduler>()).err().unwrap();
        assert!(matches!(
            err,
            StagehandError::MissingDependency {
                reason: Unavailable::NotMaterialized,
                ..
            }
        ));

        registry.materialize(key::<Clock>()).unwrap();
        assert!(registry.materialize(key::<Scheduler>()).is_ok());
    }

    #[test]
    fn test_failed_constructor_is_not_retried() {
        let mut registry = ComponentRegistry::new();
        registry
            .register(Registration::new(|_| -> std::result::Result<Clock, _> {
                Err("clock source unavailable".into())
            }))
            .unwrap();

        let first = registry.materialize(key::<Clock>()).err().unwrap();
        assert!(matches!(first, StagehandError::ConstructionFailed { .. }));

        let second = registry.materialize(key::<Clock>()).err().unwrap();
        assert!(matches!(second, StagehandError::System { .. }));
    }

    #[test]
    fn test_advance_rejects_skipped_stages() {
        let mut registry = ComponentRegistry::new();
        registry.register(Registration::instance(Clock)).unwrap();
        let clock = key::<Clock>();

        // Not materialized yet
        assert!(registry.advance(clock, State::Created).is_err());

        registry.materialize(clock).unwrap();
        assert!(matches!(
            registry.advance(clock, State::Resolved),
            Err(StagehandError::InvalidTransition { from: None, to: State::Resolved, .. })
        ));

        registry.advance(clock, State::Created).unwrap();
        assert!(registry.advance(clock, State::Started).is_err());
        assert!(registry.advance(clock, State::Created).is_err());
        registry.advance(clock, State::Resolved).unwrap();

        assert_eq!(registry.state(clock), Some(State::Resolved));
        assert_eq!(registry.history().len(), 2);
        assert_eq!(registry.history()[1].from, Some(State::Created));
    }

    #[test]
    fn test_terminate_from_any_reached_state() {
        let mut registry = ComponentRegistry::new();
        registry.register(Registration::instance(Clock)).unwrap();
        let clock = key::<Clock>();

        assert!(registry.terminate(clock).is_err());

        registry.materialize(clock).unwrap();
        registry.advance(clock, State::Created).unwrap();
        registry.terminate(clock).unwrap();

        assert_eq!(registry.state(clock), Some(State::Stopped));
        assert!(registry.terminate(clock).is_err());
    }

    #[test]
    fn test_terminate_materialized_without_stage() {
        let mut registry = ComponentRegistry::new();
        registry.register(Registration::instance(Clock)).unwrap();
        let clock = key::<Clock>();

        registry.materialize(clock).unwrap();
        assert_eq!(registry.state(clock), None);
        registry.terminate(clock).unwrap();

        assert_eq!(registry.state(clock), Some(State::Stopped));
        assert_eq!(
            registry.history(),
            &[Transition {
                component: clock,
                from: None,
                to: State::Stopped,
            }]
        );
    }
}

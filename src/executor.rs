use crate::component::DependencyDescriptor;
use crate::error::{Result, StagehandError};
use crate::execution::{Execution, Invocation, MissingPolicy};
use crate::registry::ComponentRegistry;
use crate::resolver::Resolver;
use tracing::{debug, warn};

/// What happened when an execution was offered its milestone
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Outcome {
    /// The callback ran; lists dependencies that were substituted with an absent value
    Invoked { substituted: Vec<DependencyDescriptor> },
    /// A skip-policy dependency was missing, the callback never runs
    Skipped { missing: DependencyDescriptor },
}

/// Resolve an execution's dependencies right now and run its callback,
/// applying each dependency's missing-dependency policy.
pub(crate) fn run_execution(
    registry: &ComponentRegistry,
    execution: &mut Execution,
    name: &str,
) -> Result<Outcome> {
    let resolver = Resolver::new(registry);
    let owner = execution.owner();
    let state = execution.target();
    let owner_instance = resolver.resolve_key(owner)?;

    let dependencies = execution.dependencies().to_vec();
    let mut arguments = Vec::with_capacity(dependencies.len());
    let mut substituted = Vec::new();

    for dependency in &dependencies {
        let descriptor = dependency.descriptor;
        match resolver.resolve_descriptor(&descriptor) {
            Ok(instance) => arguments.push(Some(instance)),
            Err(StagehandError::NotInjectable { reason, .. }) => match dependency.policy {
                MissingPolicy::Abort => {
                    return Err(StagehandError::MissingDependency {
                        owner,
                        state,
                        missing: descriptor,
                        reason,
                    });
                }
                MissingPolicy::Skip => {
                    warn!(
                        "Skipping {} on {}@{}: {} is {}",
                        name, owner, state, descriptor, reason
                    );
                    // Never runs later either
                    drop(execution.take_callback());
                    return Ok(Outcome::Skipped {
                        missing: descriptor,
                    });
                }
                MissingPolicy::Substitute => {
                    warn!(
                        "Running {} on {}@{} without {}: {}",
                        name, owner, state, descriptor, reason
                    );
                    arguments.push(None);
                    substituted.push(descriptor);
                }
            },
            Err(e) => return Err(e),
        }
    }

    let callback = execution.take_callback().ok_or_else(|| {
        StagehandError::system(format!("Execution {} on {}@{} already ran", name, owner, state))
    })?;

    debug!("Running {} on {}@{}", name, owner, state);
    callback(Invocation::new(owner, owner_instance, arguments)).map_err(|source| {
        StagehandError::ExecutionFailed {
            owner,
            state,
            execution: name.to_string(),
            source,
        }
    })?;

    Ok(Outcome::Invoked { substituted })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{ComponentKey, Registration};
    use crate::lifecycle::State;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Owner;
    struct Present;
    struct Absent;

    fn ready_registry() -> ComponentRegistry {
        let mut registry = ComponentRegistry::new();
        registry.register(Registration::instance(Owner)).unwrap();
        registry.register(Registration::instance(Present)).unwrap();
        for key in [ComponentKey::of::<Owner>(), ComponentKey::of::<Present>()] {
            registry.materialize(key).unwrap();
            registry.advance(key, State::Created).unwrap();
        }
        registry
    }

    #[test]
    fn test_abort_policy_reports_missing_dependency() {
        let registry = ready_registry();
        let mut execution = Execution::on::<Owner>(State::Resolved)
            .with_dependency::<Absent>(State::Created)
            .with_callback(|_, _| Ok(()))
            .unwrap();

        match run_execution(&registry, &mut execution, "wire") {
            Err(StagehandError::MissingDependency {
                owner,
                state,
                missing,
                ..
            }) => {
                assert_eq!(owner, ComponentKey::of::<Owner>());
                assert_eq!(state, State::Resolved);
                assert_eq!(missing, DependencyDescriptor::of::<Absent>(State::Created));
            }
            other => panic!("Expected MissingDependency, got {:?}", other),
        }
    }

    #[test]
    fn test_skip_policy_consumes_callback_without_running_it() {
        let registry = ready_registry();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut execution = Execution::on::<Owner>(State::Resolved)
            .with_dependency_or_skip::<Absent>(State::Created)
            .with_callback(move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .unwrap();

        let outcome = run_execution(&registry, &mut execution, "wire").unwrap();
        assert_eq!(
            outcome,
            Outcome::Skipped {
                missing: DependencyDescriptor::of::<Absent>(State::Created)
            }
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(execution.is_spent());
    }

    #[test]
    fn test_substitute_policy_passes_absent_value() {
        let registry = ready_registry();
        let observed = Arc::new(AtomicUsize::new(0));
        let sink = Arc::clone(&observed);
        let mut execution = Execution::on::<Owner>(State::Resolved)
            .with_dependency::<Present>(State::Created)
            .with_optional_dependency::<Absent>(State::Created)
            .with_callback(move |_, _present, absent| {
                sink.store(if absent.is_none() { 1 } else { 2 }, Ordering::SeqCst);
                Ok(())
            })
            .unwrap();

        let outcome = run_execution(&registry, &mut execution, "wire").unwrap();
        assert_eq!(
            outcome,
            Outcome::Invoked {
                substituted: vec![DependencyDescriptor::of::<Absent>(State::Created)]
            }
        );
        assert_eq!(observed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dependency_below_required_state_is_missing() {
        let registry = ready_registry();
        let mut execution = Execution::on::<Owner>(State::Resolved)
            .with_dependency::<Present>(State::Started)
            .with_callback(|_, _| Ok(()))
            .unwrap();

        assert!(matches!(
            run_execution(&registry, &mut execution, "wire"),
            Err(StagehandError::MissingDependency { .. })
        ));
    }

    #[test]
    fn test_execution_runs_at_most_once() {
        let registry = ready_registry();
        let mut execution = Execution::on::<Owner>(State::Resolved)
            .with_callback(|_| Ok(()))
            .unwrap();

        assert!(run_execution(&registry, &mut execution, "once").is_ok());
        assert!(matches!(
            run_execution(&registry, &mut execution, "once"),
            Err(StagehandError::System { .. })
        ));
    }

    #[test]
    fn test_callback_failure_is_wrapped() {
        let registry = ready_registry();
        let mut execution = Execution::on::<Owner>(State::Resolved)
            .with_callback(|_| Err("boom".into()))
            .unwrap();

        let err = run_execution(&registry, &mut execution, "explode").unwrap_err();
        assert_eq!(err.to_string(), "Execution explode on Owner@resolved failed: boom");
    }
}

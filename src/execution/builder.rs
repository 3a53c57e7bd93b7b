//! Typed execution builders.
//!
//! Each `with_*dependency` call returns the builder of the next arity, so the
//! callback handed to `with_callback` must take exactly one extra parameter
//! per declared dependency. `ExecutionBuilder3` offers no further
//! `with_*dependency` methods: a fourth typed dependency does not compile.

use super::param::{Optional, Param, Required, SkipIfMissing};
use super::spec::{Execution, ExecutionSpec};
use crate::component::{BoxError, ComponentKey, DependencyDescriptor, Injectable};
use crate::error::RegistrationError;
use crate::lifecycle::State;
use std::marker::PhantomData;

fn append<P: Param, D: Injectable>(spec: ExecutionSpec, state: State) -> ExecutionSpec {
    spec.depends_on(DependencyDescriptor::of::<D>(state), P::POLICY)
}

/// Builder with no extra dependencies
pub struct ExecutionBuilder<O> {
    spec: ExecutionSpec,
    _types: PhantomData<fn() -> O>,
}

/// Builder with one extra dependency
pub struct ExecutionBuilder1<O, A> {
    spec: ExecutionSpec,
    _types: PhantomData<fn() -> (O, A)>,
}

/// Builder with two extra dependencies
pub struct ExecutionBuilder2<O, A, B> {
    spec: ExecutionSpec,
    _types: PhantomData<fn() -> (O, A, B)>,
}

/// Builder with three extra dependencies
pub struct ExecutionBuilder3<O, A, B, C> {
    spec: ExecutionSpec,
    _types: PhantomData<fn() -> (O, A, B, C)>,
}

impl Execution {
    /// Start declaring a callback that runs when `O` reaches `target`
    pub fn on<O: Injectable>(target: State) -> ExecutionBuilder<O> {
        ExecutionBuilder {
            spec: ExecutionSpec::new(ComponentKey::of::<O>(), target),
            _types: PhantomData,
        }
    }
}

impl<O: Injectable> ExecutionBuilder<O> {
    pub fn label<S: Into<String>>(mut self, label: S) -> Self {
        self.spec = self.spec.label(label);
        self
    }

    /// Require `D` at `state`; startup aborts if it cannot be resolved
    pub fn with_dependency<D: Injectable>(self, state: State) -> ExecutionBuilder1<O, Required<D>> {
        ExecutionBuilder1 {
            spec: append::<Required<D>, D>(self.spec, state),
            _types: PhantomData,
        }
    }

    /// Require `D` at `state`; the execution is skipped if it cannot be resolved
    pub fn with_dependency_or_skip<D: Injectable>(
        self,
        state: State,
    ) -> ExecutionBuilder1<O, SkipIfMissing<D>> {
        ExecutionBuilder1 {
            spec: append::<SkipIfMissing<D>, D>(self.spec, state),
            _types: PhantomData,
        }
    }

    /// Use `D` at `state` if available; the callback sees `None` otherwise
    pub fn with_optional_dependency<D: Injectable>(
        self,
        state: State,
    ) -> ExecutionBuilder1<O, Optional<D>> {
        ExecutionBuilder1 {
            spec: append::<Optional<D>, D>(self.spec, state),
            _types: PhantomData,
        }
    }

    pub fn with_callback<F>(self, callback: F) -> Result<Execution, RegistrationError>
    where
        F: FnOnce(&O) -> Result<(), BoxError> + Send + 'static,
    {
        self.spec
            .callback(move |invocation| {
                let owner = invocation.owner::<O>()?;
                callback(owner.as_ref())
            })
            .build()
    }
}

impl<O: Injectable, A: Param> ExecutionBuilder1<O, A> {
    pub fn label<S: Into<String>>(mut self, label: S) -> Self {
        self.spec = self.spec.label(label);
        self
    }

    pub fn with_dependency<D: Injectable>(
        self,
        state: State,
    ) -> ExecutionBuilder2<O, A, Required<D>> {
        ExecutionBuilder2 {
            spec: append::<Required<D>, D>(self.spec, state),
            _types: PhantomData,
        }
    }

    pub fn with_dependency_or_skip<D: Injectable>(
        self,
        state: State,
    ) -> ExecutionBuilder2<O, A, SkipIfMissing<D>> {
        ExecutionBuilder2 {
            spec: append::<SkipIfMissing<D>, D>(self.spec, state),
            _types: PhantomData,
        }
    }

    pub fn with_optional_dependency<D: Injectable>(
        self,
        state: State,
    ) -> ExecutionBuilder2<O, A, Optional<D>> {
        ExecutionBuilder2 {
            spec: append::<Optional<D>, D>(self.spec, state),
            _types: PhantomData,
        }
    }

    pub fn with_callback<F>(self, callback: F) -> Result<Execution, RegistrationError>
    where
        F: FnOnce(&O, A::Value) -> Result<(), BoxError> + Send + 'static,
    {
        self.spec
            .callback(move |invocation| {
                let owner = invocation.owner::<O>()?;
                let a = A::extract(invocation.slot(0))?;
                callback(owner.as_ref(), a)
            })
            .build()
    }
}

impl<O: Injectable, A: Param, B: Param> ExecutionBuilder2<O, A, B> {
    pub fn label<S: Into<String>>(mut self, label: S) -> Self {
        self.spec = self.spec.label(label);
        self
    }

    pub fn with_dependency<D: Injectable>(
        self,
        state: State,
    ) -> ExecutionBuilder3<O, A, B, Required<D>> {
        ExecutionBuilder3 {
            spec: append::<Required<D>, D>(self.spec, state),
            _types: PhantomData,
        }
    }

    pub fn with_dependency_or_skip<D: Injectable>(
        self,
        state: State,
    ) -> ExecutionBuilder3<O, A, B, SkipIfMissing<D>> {
        ExecutionBuilder3 {
            spec: append::<SkipIfMissing<D>, D>(self.spec, state),
            _types: PhantomData,
        }
    }

    pub fn with_optional_dependency<D: Injectable>(
        self,
        state: State,
    ) -> ExecutionBuilder3<O, A, B, Optional<D>> {
        ExecutionBuilder3 {
            spec: append::<Optional<D>, D>(self.spec, state),
            _types: PhantomData,
        }
    }

    pub fn with_callback<F>(self, callback: F) -> Result<Execution, RegistrationError>
    where
        F: FnOnce(&O, A::Value, B::Value) -> Result<(), BoxError> + Send + 'static,
    {
        self.spec
            .callback(move |invocation| {
                let owner = invocation.owner::<O>()?;
                let a = A::extract(invocation.slot(0))?;
                let b = B::extract(invocation.slot(1))?;
                callback(owner.as_ref(), a, b)
            })
            .build()
    }
}

impl<O: Injectable, A: Param, B: Param, C: Param> ExecutionBuilder3<O, A, B, C> {
    pub fn label<S: Into<String>>(mut self, label: S) -> Self {
        self.spec = self.spec.label(label);
        self
    }

    pub fn with_callback<F>(self, callback: F) -> Result<Execution, RegistrationError>
    where
        F: FnOnce(&O, A::Value, B::Value, C::Value) -> Result<(), BoxError> + Send + 'static,
    {
        self.spec
            .callback(move |invocation| {
                let owner = invocation.owner::<O>()?;
                let a = A::extract(invocation.slot(0))?;
                let b = B::extract(invocation.slot(1))?;
                let c = C::extract(invocation.slot(2))?;
                callback(owner.as_ref(), a, b, c)
            })
            .build()
    }
}

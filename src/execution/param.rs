use super::spec::MissingPolicy;
use crate::component::{BoxError, Injectable, Instance};
use std::marker::PhantomData;
use std::sync::Arc;

/// Statically typed extra parameter of an execution callback
pub trait Param: 'static {
    /// Value the callback receives for this parameter
    type Value;

    /// Policy applied when the dependency cannot be resolved
    const POLICY: MissingPolicy;

    fn extract(slot: Option<&Instance>) -> Result<Self::Value, BoxError>;
}

/// A dependency that must be present; the callback receives `Arc<T>`
pub struct Required<T>(PhantomData<fn() -> T>);

/// Like [`Required`], but a missing value skips the execution instead of aborting
pub struct SkipIfMissing<T>(PhantomData<fn() -> T>);

/// A dependency that may be absent; the callback receives `Option<Arc<T>>`
pub struct Optional<T>(PhantomData<fn() -> T>);

fn cast<T: Injectable>(instance: &Instance) -> Result<Arc<T>, BoxError> {
    Arc::downcast::<T>(Arc::clone(instance)).map_err(|_| {
        format!("argument is not a {}", std::any::type_name::<T>()).into()
    })
}

fn present<T: Injectable>(slot: Option<&Instance>) -> Result<Arc<T>, BoxError> {
    let instance = slot.ok_or_else(|| {
        BoxError::from(format!("required argument {} was not resolved", std::any::type_name::<T>()))
    })?;
    cast::<T>(instance)
}

impl<T: Injectable> Param for Required<T> {
    type Value = Arc<T>;
    const POLICY: MissingPolicy = MissingPolicy::Abort;

    fn extract(slot: Option<&Instance>) -> Result<Self::Value, BoxError> {
        present::<T>(slot)
    }
}

impl<T: Injectable> Param for SkipIfMissing<T> {
    type Value = Arc<T>;
    const POLICY: MissingPolicy = MissingPolicy::Skip;

    fn extract(slot: Option<&Instance>) -> Result<Self::Value, BoxError> {
        present::<T>(slot)
    }
}

impl<T: Injectable> Param for Optional<T> {
    type Value = Option<Arc<T>>;
    const POLICY: MissingPolicy = MissingPolicy::Substitute;

    fn extract(slot: Option<&Instance>) -> Result<Self::Value, BoxError> {
        slot.map(cast::<T>).transpose()
    }
}

use crate::lifecycle::State;
use crate::resolver::Resolver;
use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Error type returned by constructors and execution callbacks
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A live, type-erased component instance
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Anything that can be held by the container
pub trait Injectable: Send + Sync + 'static {}
impl<T: Send + Sync + 'static> Injectable for T {}

/// Identity of a registered component type
#[derive(Clone, Copy)]
pub struct ComponentKey {
    type_id: TypeId,
    type_name: &'static str,
}

impl ComponentKey {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Fully qualified type name
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Type name without its module path, as used in diagnostics
    pub fn short_name(&self) -> &'static str {
        let full = self.type_name;
        let head_end = full.find('<').unwrap_or(full.len());
        let start = full[..head_end].rfind("::").map_or(0, |index| index + 2);
        &full[start..]
    }
}

impl PartialEq for ComponentKey {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for ComponentKey {}

impl Hash for ComponentKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Debug for ComponentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name)
    }
}

impl fmt::Display for ComponentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// "A component of this type must have reached at least this state"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DependencyDescriptor {
    component: ComponentKey,
    state: State,
}

impl DependencyDescriptor {
    pub fn new(component: ComponentKey, state: State) -> Self {
        Self { component, state }
    }

    pub fn of<T: Injectable>(state: State) -> Self {
        Self::new(ComponentKey::of::<T>(), state)
    }

    pub fn component(&self) -> ComponentKey {
        self.component
    }

    pub fn state(&self) -> State {
        self.state
    }
}

impl fmt::Display for DependencyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.component, self.state)
    }
}

pub(crate) type Constructor = Box<dyn FnOnce(&Resolver<'_>) -> Result<Instance, BoxError> + Send>;

/// How to build one component, plus the components it needs at construction time
pub struct Registration {
    key: ComponentKey,
    requires: Vec<ComponentKey>,
    constructor: Constructor,
}

impl Registration {
    /// Register a constructor; the component type is the constructor's return type
    pub fn new<T, F>(constructor: F) -> Self
    where
        T: Injectable,
        F: FnOnce(&Resolver<'_>) -> Result<T, BoxError> + Send + 'static,
    {
        Self {
            key: ComponentKey::of::<T>(),
            requires: Vec::new(),
            constructor: Box::new(move |resolver| {
                constructor(resolver).map(|value| Arc::new(value) as Instance)
            }),
        }
    }

    /// Register an already-built value
    pub fn instance<T: Injectable>(value: T) -> Self {
        Self::new(move |_| Ok(value))
    }

    /// Declare a constructor-level dependency, which must be created first
    pub fn requires<D: Injectable>(mut self) -> Self {
        let key = ComponentKey::of::<D>();
        if !self.requires.contains(&key) {
            self.requires.push(key);
        }
        self
    }

    pub fn key(&self) -> ComponentKey {
        self.key
    }

    pub fn requirements(&self) -> &[ComponentKey] {
        &self.requires
    }

    pub(crate) fn into_parts(self) -> (ComponentKey, Vec<ComponentKey>, Constructor) {
        (self.key, self.requires, self.constructor)
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("key", &self.key)
            .field("requires", &self.requires)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod nested {
        pub struct Widget;
        pub struct Wrapper<T>(pub T);
    }

    #[test]
    fn test_short_name_strips_module_path() {
        let key = ComponentKey::of::<nested::Widget>();
        assert_eq!(key.short_name(), "Widget");
        assert!(key.type_name().ends_with("nested::Widget"));
        assert_eq!(key.to_string(), "Widget");
    }

    #[test]
    fn test_short_name_keeps_generic_arguments() {
        let key = ComponentKey::of::<nested::Wrapper<u32>>();
        assert_eq!(key.short_name(), "Wrapper<u32>");
    }

    #[test]
    fn test_keys_compare_by_type() {
        assert_eq!(ComponentKey::of::<nested::Widget>(), ComponentKey::of::<nested::Widget>());
        assert_ne!(ComponentKey::of::<nested::Widget>(), ComponentKey::of::<u32>());
    }

    #[test]
    fn test_descriptor_display() {
        let descriptor = DependencyDescriptor::of::<nested::Widget>(State::Resolved);
        assert_eq!(descriptor.to_string(), "Widget@resolved");
        assert_eq!(descriptor.state(), State::Resolved);
    }

    #[test]
    fn test_registration_deduplicates_requirements() {
        let registration = Registration::instance(nested::Widget)
            .requires::<u32>()
            .requires::<u32>()
            .requires::<String>();

        assert_eq!(registration.key(), ComponentKey::of::<nested::Widget>());
        assert_eq!(
            registration.requirements(),
            &[ComponentKey::of::<u32>(), ComponentKey::of::<String>()]
        );
    }
}

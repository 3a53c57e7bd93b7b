mod builder;
mod param;
mod spec;


pub use builder::{ExecutionBuilder, ExecutionBuilder1, ExecutionBuilder2, ExecutionBuilder3};
pub use param::{Optional, Param, Required, SkipIfMissing};
pub use spec::{
    Execution, ExecutionDependency, ExecutionFn, ExecutionSpec, Invocation, MissingPolicy,
    MAX_DEPENDENCIES,
};

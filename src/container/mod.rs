mod orchestrator;
mod shutdown;
mod startup;
mod state;
mod types;


pub use orchestrator::Container;
pub use types::{ContainerStatus, StartupReport, TeardownFailure, TeardownReport};

//! Container Runtime Port and the Instance Manager / Readiness Prober built
//! on top of it: the lazy start/reuse decision over the container runtime's
//! global state, and the bounded retry loops around it.

pub use bollard;
pub use faas_common as common;

pub mod instance_manager;
pub mod readiness;
pub mod runtime;

pub use instance_manager::InstanceManager;
pub use readiness::ReadinessProber;
pub use runtime::{ContainerRuntimePort, DockerRuntime};

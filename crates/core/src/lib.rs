pub mod errors;
pub mod container;

// Re-export key types for convenience
pub use errors::ContainerError;
pub use container::{
    ArchiveMetadata, Bean, BeanAttributes, BeanContainer, BeanRegistry, BeanType, ContainerState,
    ContextManager, CreationalContext, DiscoveryMode, Instance, InstanceProducer, Qualifier,
    Resolution, Resolver, Scope, TypeDescriptor, ValidationReport,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Container information
pub const CONTAINER_NAME: &str = "silo";

/// Get container version
pub fn version() -> &'static str {
    VERSION
}

/// Get container name
pub fn name() -> &'static str {
    CONTAINER_NAME
}

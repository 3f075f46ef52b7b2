pub mod types;
pub mod type_closure;
pub mod qualifier;
pub mod descriptor;
pub mod attributes;
pub mod bean;
pub mod registry;
pub mod resolver;
pub mod context;
pub mod interception;
pub mod proxy;
pub mod validation;
pub mod lifecycle;
#[allow(clippy::module_inception)]
pub mod container;

pub use types::BeanType;
pub use type_closure::{compute_closure, TypeIndex};
pub use qualifier::{qualifiers_match, Qualifier};
pub use descriptor::{
    AnnotationDescriptor, ArchiveMetadata, DiscoveryMode, InjectionPointDescriptor, MemberValue,
    MethodSignature, StereotypeDefinition, TypeDescriptor,
};
pub use attributes::{BeanAttributes, BeanAttributesBuilder};
pub use bean::{Bean, BeanBuilder, BeanId, BeanKind, ClosureProducer, InjectionPoint, Instance, InstanceProducer};
pub use registry::{BeanRegistry, RegistryState};
pub use resolver::{Resolution, Resolver};
pub use context::{ContextManager, CreationalContext, Scope};
pub use interception::{
    AroundInvokeHandler, ClosureHandler, DecoratorRegistration, DelegateWrapper,
    InterceptionChainBuilder, InterceptionType, InterceptorRegistration, InvocableChain,
    InvocationContext, TargetInvoker,
};
pub use proxy::{DirectProxyFactory, ProxyFactory, ProxyHandle};
pub use validation::{validate, ValidationReport};
pub use lifecycle::ContainerState;
pub use container::BeanContainer;

//! Interception and decoration
//!
//! Interceptors wrap method dispatch in an around-invoke chain; each
//! element may mutate parameters, call `proceed` to continue, or return
//! without proceeding to short-circuit the rest of the chain and the
//! target. Decorators are a separate mechanism: object composition, each
//! decorator holding the next delegate, applied once at instance creation.
//!
//! Applicability uses qualifier-equality semantics on binding annotations.
//! Ordering is ascending declared priority, then archive enablement order;
//! interceptors matched only by method-level bindings run after all
//! class-level ones. The per-bean interception model is built lazily on
//! first access and cached for the bean's lifetime.

use crate::container::bean::{Bean, BeanId, Instance};
use crate::container::descriptor::{ArchiveMetadata, MethodSignature};
use crate::container::qualifier::Qualifier;
use crate::container::types::BeanType;
use crate::errors::ContainerError;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Position of an interception point in a bean's lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InterceptionType {
    AroundInvoke,
    PostConstruct,
    PreDestroy,
}

/// Dispatch of the real target method, supplied by the proxy layer
pub type TargetInvoker =
    Arc<dyn Fn(&[Instance]) -> Result<Option<Instance>, ContainerError> + Send + Sync>;

/// One around-invoke element of a chain
pub trait AroundInvokeHandler: Send + Sync {
    fn invoke(&self, ctx: &mut InvocationContext) -> Result<Option<Instance>, ContainerError>;
}

/// Closure-backed handler
pub struct ClosureHandler {
    invoke: Box<
        dyn Fn(&mut InvocationContext) -> Result<Option<Instance>, ContainerError> + Send + Sync,
    >,
}

impl ClosureHandler {
    pub fn new<F>(invoke: F) -> Self
    where
        F: Fn(&mut InvocationContext) -> Result<Option<Instance>, ContainerError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            invoke: Box::new(invoke),
        }
    }
}

impl AroundInvokeHandler for ClosureHandler {
    fn invoke(&self, ctx: &mut InvocationContext) -> Result<Option<Instance>, ContainerError> {
        (self.invoke)(ctx)
    }
}

/// Mutable view of an in-flight invocation handed to each chain element
pub struct InvocationContext {
    method: String,
    /// Parameters for the target invocation; interceptors may replace them
    pub parameters: Vec<Instance>,
    interceptors: Vec<Arc<dyn AroundInvokeHandler>>,
    position: usize,
    target: TargetInvoker,
}

impl InvocationContext {
    /// Invoked method name
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Continue with the next chain element, or the target when the chain
    /// is exhausted. Not calling this short-circuits the remainder.
    pub fn proceed(&mut self) -> Result<Option<Instance>, ContainerError> {
        if self.position < self.interceptors.len() {
            let next = self.interceptors[self.position].clone();
            self.position += 1;
            next.invoke(self)
        } else {
            (self.target)(&self.parameters)
        }
    }
}

/// An assembled, invocable interception chain for one method
pub struct InvocableChain {
    method: String,
    interceptors: Vec<Arc<dyn AroundInvokeHandler>>,
    target: TargetInvoker,
}

impl InvocableChain {
    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    /// Run the chain; failures from any element propagate uncaught
    pub fn invoke(&self, parameters: Vec<Instance>) -> Result<Option<Instance>, ContainerError> {
        let mut ctx = InvocationContext {
            method: self.method.clone(),
            parameters,
            interceptors: self.interceptors.clone(),
            position: 0,
            target: self.target.clone(),
        };
        ctx.proceed()
    }
}

impl std::fmt::Debug for InvocableChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvocableChain")
            .field("method", &self.method)
            .field("interceptors", &self.interceptors.len())
            .finish()
    }
}

/// A registered interceptor
pub struct InterceptorRegistration {
    pub class_name: String,
    /// Binding annotations this interceptor declares
    pub bindings: BTreeSet<Qualifier>,
    pub intercepts: Vec<InterceptionType>,
    pub priority: Option<i32>,
    pub handler: Arc<dyn AroundInvokeHandler>,
    /// Parameter count the around-invoke handler expects of the target
    /// method, `None` when it handles any signature
    pub expected_arity: Option<usize>,
}

impl InterceptorRegistration {
    pub fn new(class_name: impl Into<String>, handler: Arc<dyn AroundInvokeHandler>) -> Self {
        Self {
            class_name: class_name.into(),
            bindings: BTreeSet::new(),
            intercepts: vec![InterceptionType::AroundInvoke],
            priority: None,
            handler,
            expected_arity: None,
        }
    }

    pub fn with_binding(mut self, binding: Qualifier) -> Self {
        self.bindings.insert(binding);
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_expected_arity(mut self, arity: usize) -> Self {
        self.expected_arity = Some(arity);
        self
    }

    pub fn intercepting(mut self, types: Vec<InterceptionType>) -> Self {
        self.intercepts = types;
        self
    }
}

/// Wraps a delegate instance; how the wrapper forwards calls is the
/// implementor's concern
pub trait DelegateWrapper: Send + Sync {
    fn wrap(&self, delegate: Instance) -> Result<Instance, ContainerError>;
}

/// A registered decorator
pub struct DecoratorRegistration {
    pub class_name: String,
    /// Types this decorator can decorate
    pub decorated_types: BTreeSet<BeanType>,
    pub priority: Option<i32>,
    pub wrapper: Arc<dyn DelegateWrapper>,
}

impl DecoratorRegistration {
    pub fn new(
        class_name: impl Into<String>,
        decorated_types: BTreeSet<BeanType>,
        wrapper: Arc<dyn DelegateWrapper>,
    ) -> Self {
        Self {
            class_name: class_name.into(),
            decorated_types,
            priority: None,
            wrapper,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }
}

/// Per-bean interception model: ordered handler lists per interception
/// point, built once and cached for the bean's lifetime
pub struct InterceptionModel {
    chains: HashMap<(InterceptionType, String), Vec<Arc<dyn AroundInvokeHandler>>>,
}

impl InterceptionModel {
    fn handlers(&self, interception_type: InterceptionType, method: &str) -> Vec<Arc<dyn AroundInvokeHandler>> {
        self.chains
            .get(&(interception_type, method.to_string()))
            .cloned()
            .unwrap_or_default()
    }
}

/// Assembles interception chains and decorator stacks
pub struct InterceptionChainBuilder {
    interceptors: Vec<InterceptorRegistration>,
    decorators: Vec<DecoratorRegistration>,
    enabled_interceptors: HashMap<String, usize>,
    enabled_decorators: HashMap<String, usize>,
    models: RwLock<HashMap<BeanId, Arc<InterceptionModel>>>,
}

impl InterceptionChainBuilder {
    pub fn new(metadata: &ArchiveMetadata) -> Self {
        Self {
            interceptors: Vec::new(),
            decorators: Vec::new(),
            enabled_interceptors: metadata
                .enabled_interceptors
                .iter()
                .enumerate()
                .map(|(i, c)| (c.clone(), i))
                .collect(),
            enabled_decorators: metadata
                .enabled_decorators
                .iter()
                .enumerate()
                .map(|(i, c)| (c.clone(), i))
                .collect(),
            models: RwLock::new(HashMap::new()),
        }
    }

    /// Register an interceptor. Registrations not listed in the archive's
    /// enablement order are inert.
    pub fn register_interceptor(&mut self, registration: InterceptorRegistration) {
        debug!(
            interceptor = registration.class_name.as_str(),
            enabled = self.enabled_interceptors.contains_key(&registration.class_name),
            "interceptor registered"
        );
        self.interceptors.push(registration);
    }

    /// Register a decorator. Same enablement rule as interceptors.
    pub fn register_decorator(&mut self, registration: DecoratorRegistration) {
        debug!(
            decorator = registration.class_name.as_str(),
            enabled = self.enabled_decorators.contains_key(&registration.class_name),
            "decorator registered"
        );
        self.decorators.push(registration);
    }

    /// Build the invocable chain for one method of a bean
    pub fn build_chain(
        &self,
        bean: &Arc<Bean>,
        method: &str,
        interception_type: InterceptionType,
        target: TargetInvoker,
    ) -> Result<InvocableChain, ContainerError> {
        let model = self.model_for(bean)?;
        Ok(InvocableChain {
            method: method.to_string(),
            interceptors: model.handlers(interception_type, method),
            target,
        })
    }

    /// Build the lifecycle chain (post-construct or pre-destroy) for a bean
    pub fn build_lifecycle_chain(
        &self,
        bean: &Arc<Bean>,
        interception_type: InterceptionType,
        target: TargetInvoker,
    ) -> Result<InvocableChain, ContainerError> {
        self.build_chain(bean, "", interception_type, target)
    }

    /// The cached per-bean model, built on first access
    fn model_for(&self, bean: &Arc<Bean>) -> Result<Arc<InterceptionModel>, ContainerError> {
        if let Ok(models) = self.models.read() {
            if let Some(model) = models.get(&bean.id()) {
                return Ok(model.clone());
            }
        }

        let model = Arc::new(self.build_model(bean)?);
        if let Ok(mut models) = self.models.write() {
            models.entry(bean.id()).or_insert_with(|| model.clone());
        }
        Ok(model)
    }

    fn build_model(&self, bean: &Arc<Bean>) -> Result<InterceptionModel, ContainerError> {
        let mut chains = HashMap::new();

        for method in bean.methods() {
            let handlers =
                self.matching_handlers(bean, Some(method), InterceptionType::AroundInvoke)?;
            if !handlers.is_empty() {
                chains.insert(
                    (InterceptionType::AroundInvoke, method.name.clone()),
                    handlers,
                );
            }
        }
        for lifecycle in [InterceptionType::PostConstruct, InterceptionType::PreDestroy] {
            let handlers = self.matching_handlers(bean, None, lifecycle)?;
            if !handlers.is_empty() {
                chains.insert((lifecycle, String::new()), handlers);
            }
        }

        Ok(InterceptionModel { chains })
    }

    /// Applicable handlers for one interception point, ordered.
    ///
    /// Class-level matches come first, sorted by ascending priority then
    /// enablement order; interceptors matched only through method-level
    /// bindings are appended after them with the same internal ordering.
    fn matching_handlers(
        &self,
        bean: &Arc<Bean>,
        method: Option<&MethodSignature>,
        interception_type: InterceptionType,
    ) -> Result<Vec<Arc<dyn AroundInvokeHandler>>, ContainerError> {
        let class_bindings = bean.interceptor_bindings();
        let method_bindings: BTreeSet<Qualifier> = method
            .map(|m| m.bindings.iter().map(Qualifier::normalize).collect())
            .unwrap_or_default();
        let mut combined = class_bindings.clone();
        combined.extend(method_bindings);

        let mut class_matched: Vec<(i64, usize, &InterceptorRegistration)> = Vec::new();
        let mut method_matched: Vec<(i64, usize, &InterceptorRegistration)> = Vec::new();

        for registration in &self.interceptors {
            if !registration.intercepts.contains(&interception_type) {
                continue;
            }
            let position = match self.enabled_interceptors.get(&registration.class_name) {
                Some(&position) => position,
                None => continue,
            };
            if registration.bindings.is_empty() {
                continue;
            }
            if !registration.bindings.iter().all(|b| combined.contains(b)) {
                continue;
            }

            if let (Some(expected), Some(signature)) = (registration.expected_arity, method) {
                if expected != signature.parameter_types.len() {
                    return Err(ContainerError::definition(
                        &registration.class_name,
                        format!(
                            "around-invoke handler expects {} parameter(s) but method '{}' declares {}",
                            expected,
                            signature.name,
                            signature.parameter_types.len()
                        ),
                    ));
                }
            }

            let key = (
                registration.priority.map(i64::from).unwrap_or(i64::MAX),
                position,
                registration,
            );
            if registration.bindings.iter().all(|b| class_bindings.contains(b)) {
                class_matched.push(key);
            } else {
                method_matched.push(key);
            }
        }

        class_matched.sort_by_key(|(priority, position, _)| (*priority, *position));
        method_matched.sort_by_key(|(priority, position, _)| (*priority, *position));

        Ok(class_matched
            .into_iter()
            .chain(method_matched)
            .map(|(_, _, registration)| registration.handler.clone())
            .collect())
    }

    /// Enabled decorators applicable to a type closure, outermost-first
    pub fn applicable_decorators(
        &self,
        types: &BTreeSet<BeanType>,
    ) -> Vec<Arc<dyn DelegateWrapper>> {
        let mut matched: Vec<(i64, usize, &DecoratorRegistration)> = self
            .decorators
            .iter()
            .filter_map(|registration| {
                let position = *self.enabled_decorators.get(&registration.class_name)?;
                let applies = registration
                    .decorated_types
                    .iter()
                    .any(|decorated| types.iter().any(|t| t.satisfies(decorated)));
                if applies {
                    Some((
                        registration.priority.map(i64::from).unwrap_or(i64::MAX),
                        position,
                        registration,
                    ))
                } else {
                    None
                }
            })
            .collect();
        matched.sort_by_key(|(priority, position, _)| (*priority, *position));
        matched
            .into_iter()
            .map(|(_, _, registration)| registration.wrapper.clone())
            .collect()
    }
}

impl std::fmt::Debug for InterceptionChainBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptionChainBuilder")
            .field("interceptors", &self.interceptors.len())
            .field("decorators", &self.decorators.len())
            .finish()
    }
}

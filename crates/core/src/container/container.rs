//! Container facade
//!
//! `BeanContainer` is an explicit handle tying the components together:
//! descriptor ingestion while discovering, closure computation and
//! attribute assembly at validation, then resolution and contextual
//! instance access while started. There is no process-wide current
//! container; embedders hold and pass the handle themselves.
//!
//! Errors during discovery and validation are collected into one
//! aggregate deployment failure; errors after start propagate to the
//! caller immediately.

use crate::container::attributes::BeanAttributes;
use crate::container::bean::{Bean, BeanKind, InjectionPoint, Instance, InstanceProducer};
use crate::container::context::{ContextManager, CreationalContext, Scope};
use crate::container::descriptor::{
    ArchiveMetadata, DiscoveryMode, StereotypeDefinition, TypeDescriptor,
};
use crate::container::interception::{
    DecoratorRegistration, InterceptionChainBuilder, InterceptorRegistration,
};
use crate::container::lifecycle::ContainerState;
use crate::container::proxy::{DirectProxyFactory, ProxyFactory, ProxyHandle};
use crate::container::qualifier::{Qualifier, NAMED};
use crate::container::registry::BeanRegistry;
use crate::container::resolver::{Resolution, Resolver};
use crate::container::type_closure::compute_closure;
use crate::container::types::BeanType;
use crate::container::validation::{validate, ValidationReport};
use crate::errors::ContainerError;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A discovered type waiting for validation-time processing
struct PendingBean {
    descriptor: TypeDescriptor,
    producer: Arc<dyn InstanceProducer>,
}

/// The container handle
pub struct BeanContainer {
    state: ContainerState,
    metadata: ArchiveMetadata,
    stereotypes: HashMap<String, StereotypeDefinition>,
    /// Every ingested descriptor, bean candidate or not, for supertype
    /// chasing during closure computation
    type_index: HashMap<String, TypeDescriptor>,
    pending: Vec<PendingBean>,
    synthetic: Vec<Bean>,
    chains: Option<InterceptionChainBuilder>,
    chain_builder: Option<Arc<InterceptionChainBuilder>>,
    registry: Option<Arc<BeanRegistry>>,
    resolver: Option<Arc<Resolver>>,
    contexts: ContextManager,
    proxy_factory: Arc<dyn ProxyFactory>,
}

impl BeanContainer {
    pub fn new() -> Self {
        Self {
            state: ContainerState::Uninitialized,
            metadata: ArchiveMetadata::default(),
            stereotypes: HashMap::new(),
            type_index: HashMap::new(),
            pending: Vec::new(),
            synthetic: Vec::new(),
            chains: None,
            chain_builder: None,
            registry: None,
            resolver: None,
            contexts: ContextManager::new(),
            proxy_factory: Arc::new(DirectProxyFactory),
        }
    }

    pub fn with_proxy_factory(mut self, factory: Arc<dyn ProxyFactory>) -> Self {
        self.proxy_factory = factory;
        self
    }

    pub fn state(&self) -> ContainerState {
        self.state
    }

    pub fn contexts(&self) -> &ContextManager {
        &self.contexts
    }

    /// Open the container for discovery input under the given archive
    /// metadata
    pub fn begin_discovery(&mut self, metadata: ArchiveMetadata) -> Result<(), ContainerError> {
        self.state.transition(ContainerState::Discovering)?;
        self.chains = Some(InterceptionChainBuilder::new(&metadata));
        self.metadata = metadata;
        info!(mode = ?self.metadata.discovery_mode, "discovery opened");
        Ok(())
    }

    /// Contribute a stereotype definition consulted during attribute
    /// assembly
    pub fn define_stereotype(
        &mut self,
        definition: StereotypeDefinition,
    ) -> Result<(), ContainerError> {
        self.state.require(ContainerState::Discovering, "define_stereotype")?;
        self.stereotypes.insert(definition.name.clone(), definition);
        Ok(())
    }

    /// Ingest a discovered type as a bean candidate.
    ///
    /// The descriptor always enters the supertype index; whether it also
    /// becomes a bean depends on the archive's discovery mode. In annotated
    /// mode a type without a bean-defining annotation is skipped silently.
    pub fn register_type(
        &mut self,
        descriptor: TypeDescriptor,
        producer: Arc<dyn InstanceProducer>,
    ) -> Result<(), ContainerError> {
        self.state.require(ContainerState::Discovering, "register_type")?;

        let candidate = match self.metadata.discovery_mode {
            DiscoveryMode::All => true,
            DiscoveryMode::Annotated => descriptor.has_bean_defining_annotation(),
            DiscoveryMode::None => false,
        };
        if !candidate {
            debug!(
                class = descriptor.class_name.as_str(),
                mode = ?self.metadata.discovery_mode,
                "type indexed but not a bean candidate"
            );
        }

        self.type_index
            .insert(descriptor.class_name.clone(), descriptor.clone());
        if candidate {
            self.pending.push(PendingBean {
                descriptor,
                producer,
            });
        }
        Ok(())
    }

    /// Ingest a descriptor for supertype chasing only, never as a bean
    /// candidate regardless of discovery mode
    pub fn register_supporting_type(
        &mut self,
        descriptor: TypeDescriptor,
    ) -> Result<(), ContainerError> {
        self.state
            .require(ContainerState::Discovering, "register_supporting_type")?;
        self.type_index
            .insert(descriptor.class_name.clone(), descriptor);
        Ok(())
    }

    /// Register a pre-assembled bean, bypassing descriptor processing
    pub fn register_synthetic(&mut self, bean: Bean) -> Result<(), ContainerError> {
        self.state.require(ContainerState::Discovering, "register_synthetic")?;
        self.synthetic.push(bean);
        Ok(())
    }

    pub fn register_interceptor(
        &mut self,
        registration: InterceptorRegistration,
    ) -> Result<(), ContainerError> {
        self.state
            .require(ContainerState::Discovering, "register_interceptor")?;
        match self.chains.as_mut() {
            Some(chains) => {
                chains.register_interceptor(registration);
                Ok(())
            }
            None => Err(ContainerError::illegal_state(
                "register_interceptor",
                self.state.as_str().to_string(),
            )),
        }
    }

    pub fn register_decorator(
        &mut self,
        registration: DecoratorRegistration,
    ) -> Result<(), ContainerError> {
        self.state
            .require(ContainerState::Discovering, "register_decorator")?;
        match self.chains.as_mut() {
            Some(chains) => {
                chains.register_decorator(registration);
                Ok(())
            }
            None => Err(ContainerError::illegal_state(
                "register_decorator",
                self.state.as_str().to_string(),
            )),
        }
    }

    /// Close discovery, assemble and register every pending bean, then walk
    /// the deployment.
    ///
    /// Problems are collected, never short-circuited; any problem fails the
    /// deployment with one aggregate error and moves the container straight
    /// to `Stopped`.
    pub fn start_validation(&mut self) -> Result<ValidationReport, ContainerError> {
        self.state.transition(ContainerState::Validating)?;

        let chains = Arc::new(match self.chains.take() {
            Some(chains) => chains,
            None => InterceptionChainBuilder::new(&self.metadata),
        });
        let mut problems = Vec::new();
        let mut registry = BeanRegistry::new();

        let pending = std::mem::take(&mut self.pending);
        for candidate in pending {
            match self.assemble_bean(&candidate, &chains) {
                Ok(bean) => {
                    if let Err(problem) = registry.register(bean) {
                        problems.push(problem);
                    }
                }
                Err(problem) => problems.push(problem),
            }
        }
        for bean in std::mem::take(&mut self.synthetic) {
            if let Err(problem) = registry.register(bean) {
                problems.push(problem);
            }
        }
        registry.finalize_registration();

        let registry = Arc::new(registry);
        let alternative_order: HashMap<String, usize> = self
            .metadata
            .enabled_alternatives
            .iter()
            .enumerate()
            .map(|(position, class)| (class.clone(), position))
            .collect();
        let resolver = Arc::new(Resolver::new(registry.clone(), alternative_order));

        let mut report = validate(&registry, &resolver);
        for problem in problems {
            report.add_problem(problem);
        }

        self.chain_builder = Some(chains);
        self.registry = Some(registry);
        self.resolver = Some(resolver);

        if report.is_clean() {
            Ok(report)
        } else {
            warn!(
                problems = report.problems().len(),
                "deployment aborted, container stopped"
            );
            self.state.transition(ContainerState::Stopped)?;
            report.into_result().map(|_| ValidationReport::default())
        }
    }

    /// Attribute assembly for one discovered type: closure, stereotype
    /// defaults, qualifier completion, alternative enablement
    fn assemble_bean(
        &self,
        candidate: &PendingBean,
        chains: &Arc<InterceptionChainBuilder>,
    ) -> Result<Bean, ContainerError> {
        let descriptor = &candidate.descriptor;
        let closure = compute_closure(descriptor, &self.type_index)?;

        let declared: Vec<&StereotypeDefinition> = descriptor
            .stereotypes
            .iter()
            .filter_map(|name| self.stereotypes.get(name))
            .collect();

        let scope = match &descriptor.scope {
            Some(scope) => scope.parse::<Scope>()?,
            None => {
                let defaults: BTreeSet<&str> = declared
                    .iter()
                    .filter_map(|s| s.default_scope.as_deref())
                    .collect();
                match defaults.len() {
                    0 => Scope::Dependent,
                    1 => {
                        let name = defaults.into_iter().next().ok_or_else(|| {
                            ContainerError::definition(&descriptor.class_name, "no default scope")
                        })?;
                        name.parse::<Scope>()?
                    }
                    _ => {
                        return Err(ContainerError::definition(
                            &descriptor.class_name,
                            "stereotypes declare conflicting default scopes; \
                             declare an explicit scope",
                        ))
                    }
                }
            }
        };

        let mut qualifiers: BTreeSet<Qualifier> = descriptor
            .qualifiers
            .iter()
            .map(Qualifier::normalize)
            .collect();

        // An empty @Named defaults to the decapitalized simple class name;
        // a stereotype-contributed name uses the same default.
        let mut name = None;
        let named = qualifiers
            .iter()
            .find(|q| q.annotation() == NAMED)
            .cloned();
        if let Some(named) = named {
            let value = match named.name_value() {
                Some(value) => value.to_string(),
                None => {
                    qualifiers.remove(&named);
                    let value = default_bean_name(&descriptor.class_name);
                    qualifiers.insert(Qualifier::named(&value));
                    value
                }
            };
            name = Some(value);
        } else if declared.iter().any(|s| s.named) {
            let value = default_bean_name(&descriptor.class_name);
            qualifiers.insert(Qualifier::named(&value));
            name = Some(value);
        }

        let alternative = descriptor.alternative || declared.iter().any(|s| s.alternative);
        let enabled = if alternative {
            self.metadata
                .alternative_position(&descriptor.class_name)
                .is_some()
                || descriptor
                    .stereotypes
                    .iter()
                    .any(|s| self.metadata.enabled_alternative_stereotypes.contains(s))
                || descriptor.priority.is_some()
        } else {
            true
        };

        let mut builder = BeanAttributes::builder(closure.clone())
            .qualifiers(qualifiers)
            .scope(scope)
            .stereotypes(descriptor.stereotypes.iter().cloned())
            .alternative(alternative)
            .enabled(enabled)
            .priority(descriptor.priority);
        if let Some(name) = name {
            builder = builder.name(name);
        }
        let attributes = builder.build()?;

        Ok(Bean::builder(
            descriptor.class_name.clone(),
            attributes,
            candidate.producer.clone(),
        )
        .kind(BeanKind::Managed)
        .injection_points(
            descriptor
                .injection_points
                .iter()
                .map(InjectionPoint::from_descriptor),
        )
        .interceptor_bindings(
            descriptor
                .interceptor_bindings
                .iter()
                .map(Qualifier::normalize),
        )
        .methods(descriptor.methods.iter().cloned())
        .decorators(chains.applicable_decorators(&closure))
        .build())
    }

    /// Activate the application scope and go live
    pub fn start(&mut self) -> Result<(), ContainerError> {
        self.state.transition(ContainerState::Started)?;
        self.contexts.activate(Scope::Application)?;
        info!("container started");
        Ok(())
    }

    /// Activate a unit-of-work scope; only legal while started
    pub fn begin_context(&self, scope: Scope) -> Result<(), ContainerError> {
        self.state.require(ContainerState::Started, "begin_context")?;
        self.contexts.activate(scope)
    }

    /// End a unit-of-work scope, destroying its stored instances
    pub fn end_context(&self, scope: Scope) -> Result<(), ContainerError> {
        self.state.require(ContainerState::Started, "end_context")?;
        self.contexts.end_context(scope)
    }

    fn live_resolver(&self, operation: &str) -> Result<&Arc<Resolver>, ContainerError> {
        self.state.require(ContainerState::Started, operation)?;
        self.resolver.as_ref().ok_or_else(|| {
            ContainerError::illegal_state(operation, self.state.as_str().to_string())
        })
    }

    /// Resolve to the unique bean, erroring on negative outcomes
    pub fn resolve(
        &self,
        required: &BeanType,
        qualifiers: &BTreeSet<Qualifier>,
    ) -> Result<Arc<Bean>, ContainerError> {
        self.live_resolver("resolve")?.resolve(required, qualifiers)
    }

    /// Resolve to a typed outcome without raising on negatives
    pub fn lookup(
        &self,
        required: &BeanType,
        qualifiers: &BTreeSet<Qualifier>,
    ) -> Result<Resolution, ContainerError> {
        self.live_resolver("lookup")?.lookup(required, qualifiers)
    }

    /// Name-based lookup over enabled beans
    pub fn resolve_by_name(&self, name: &str) -> Result<Arc<Bean>, ContainerError> {
        self.state.require(ContainerState::Started, "resolve_by_name")?;
        let registry = self.registry.as_ref().ok_or_else(|| {
            ContainerError::illegal_state("resolve_by_name", self.state.as_str().to_string())
        })?;
        let mut holders = registry.beans_named(name);
        match holders.len() {
            0 => Err(ContainerError::unsatisfied(format!("name '{}'", name))),
            1 => holders.pop().ok_or_else(|| {
                ContainerError::unsatisfied(format!("name '{}'", name))
            }),
            _ => Err(ContainerError::ambiguous(
                format!("name '{}'", name),
                holders.iter().map(|b| b.bean_class().to_string()).collect(),
            )),
        }
    }

    /// Contextual reference for a bean, per its scope's caching policy
    pub fn get_reference(
        &self,
        bean: &Arc<Bean>,
        ctx: &mut CreationalContext,
    ) -> Result<Instance, ContainerError> {
        self.state.require(ContainerState::Started, "get_reference")?;
        self.contexts.get(bean, ctx)
    }

    /// Resolve and fetch in one call
    pub fn get(
        &self,
        required: &BeanType,
        qualifiers: &BTreeSet<Qualifier>,
        ctx: &mut CreationalContext,
    ) -> Result<Instance, ContainerError> {
        let bean = self.resolve(required, qualifiers)?;
        self.get_reference(&bean, ctx)
    }

    /// Contextual reference wrapped for interception
    pub fn get_proxied_reference(
        &self,
        bean: &Arc<Bean>,
        ctx: &mut CreationalContext,
    ) -> Result<ProxyHandle, ContainerError> {
        let instance = self.get_reference(bean, ctx)?;
        let chains = self.chain_builder.as_ref().ok_or_else(|| {
            ContainerError::illegal_state("get_proxied_reference", self.state.as_str().to_string())
        })?;
        self.proxy_factory.wrap(bean.clone(), instance, chains.clone())
    }

    /// Tear down every active context, drop caches and indexes.
    ///
    /// Teardown is best-effort and non-cancellable; collected destroy
    /// failures surface in one aggregate error after everything ran. The
    /// container ends `Stopped` either way.
    pub fn shutdown(&mut self) -> Result<(), ContainerError> {
        self.state.transition(ContainerState::ShuttingDown)?;
        let failures = self.contexts.end_all();

        if let Some(resolver) = &self.resolver {
            resolver.cleanup();
        }
        self.resolver = None;
        // The resolver held the only other handle; once it is gone the
        // registry is exclusively ours and its indexes can be dropped.
        if let Some(mut registry) = self.registry.take() {
            if let Some(registry) = Arc::get_mut(&mut registry) {
                registry.clear();
            }
        }
        self.chain_builder = None;

        self.state.transition(ContainerState::Stopped)?;
        info!(failures = failures.len(), "container stopped");
        if failures.is_empty() {
            Ok(())
        } else {
            Err(ContainerError::Destruction { failures })
        }
    }
}

impl Default for BeanContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for BeanContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BeanContainer")
            .field("state", &self.state)
            .field("indexed_types", &self.type_index.len())
            .field("pending", &self.pending.len())
            .finish()
    }
}

/// Default bean name: the decapitalized simple class name. A leading run
/// of two capitals is left untouched (`URLParser` stays `URLParser`).
fn default_bean_name(class_name: &str) -> String {
    let simple = class_name.rsplit('.').next().unwrap_or(class_name);
    let mut chars = simple.chars();
    match chars.next() {
        Some(first) => {
            let rest: String = chars.collect();
            let second_upper = rest.chars().next().map(char::is_uppercase).unwrap_or(false);
            if first.is_uppercase() && second_upper {
                simple.to_string()
            } else {
                first.to_lowercase().collect::<String>() + &rest
            }
        }
        None => String::new(),
    }
}

//! Bean registry entries
//!
//! A `Bean` couples immutable [`BeanAttributes`] with the capabilities the
//! container needs at runtime: a create/destroy producer, an identity token
//! for contextual-instance lookup, the declared injection points walked at
//! validation time, and the interception/decoration inputs. Bean kinds are
//! a tagged variant, not a class hierarchy.

use crate::container::attributes::BeanAttributes;
use crate::container::context::CreationalContext;
use crate::container::descriptor::{InjectionPointDescriptor, MethodSignature};
use crate::container::interception::DelegateWrapper;
use crate::container::qualifier::Qualifier;
use crate::container::types::BeanType;
use crate::errors::ContainerError;
use std::any::Any;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// A contextual instance as held by bean stores
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Opaque bean identity token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BeanId(Uuid);

impl BeanId {
    pub fn new() -> Self {
        BeanId(Uuid::new_v4())
    }
}

impl Default for BeanId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BeanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of bean, replacing a subclass hierarchy with a tagged variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeanKind {
    Managed,
    ProducerMethod,
    ProducerField,
    Synthetic,
}

/// Create/destroy capability supplied by the bootstrap per bean
pub trait InstanceProducer: Send + Sync {
    /// Create a new instance; dependent instances created along the way are
    /// tracked by the creational context
    fn produce(&self, ctx: &mut CreationalContext) -> Result<Instance, ContainerError>;

    /// Release an instance; the default drops it
    fn dispose(&self, instance: Instance) -> Result<(), ContainerError> {
        drop(instance);
        Ok(())
    }
}

/// Closure-backed producer, the common case for managed and synthetic beans
pub struct ClosureProducer {
    create: Box<dyn Fn(&mut CreationalContext) -> Result<Instance, ContainerError> + Send + Sync>,
    dispose: Option<Box<dyn Fn(Instance) -> Result<(), ContainerError> + Send + Sync>>,
}

impl ClosureProducer {
    pub fn new<F>(create: F) -> Self
    where
        F: Fn(&mut CreationalContext) -> Result<Instance, ContainerError> + Send + Sync + 'static,
    {
        Self {
            create: Box::new(create),
            dispose: None,
        }
    }

    /// Producer over an infallible value constructor
    pub fn of_value<T, F>(make: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::new(move |_| Ok(Arc::new(make()) as Instance))
    }

    pub fn with_dispose<F>(mut self, dispose: F) -> Self
    where
        F: Fn(Instance) -> Result<(), ContainerError> + Send + Sync + 'static,
    {
        self.dispose = Some(Box::new(dispose));
        self
    }
}

impl InstanceProducer for ClosureProducer {
    fn produce(&self, ctx: &mut CreationalContext) -> Result<Instance, ContainerError> {
        (self.create)(ctx)
    }

    fn dispose(&self, instance: Instance) -> Result<(), ContainerError> {
        match &self.dispose {
            Some(dispose) => dispose(instance),
            None => Ok(()),
        }
    }
}

/// A resolved injection point declared by a bean
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectionPoint {
    required_type: BeanType,
    qualifiers: BTreeSet<Qualifier>,
    member: Option<String>,
}

impl InjectionPoint {
    pub fn new(required_type: BeanType, qualifiers: BTreeSet<Qualifier>) -> Self {
        Self {
            required_type,
            qualifiers,
            member: None,
        }
    }

    /// Normalize a raw descriptor into an injection point. A point with no
    /// declared qualifier requires `@Default`.
    pub fn from_descriptor(descriptor: &InjectionPointDescriptor) -> Self {
        let mut qualifiers: BTreeSet<Qualifier> = descriptor
            .qualifiers
            .iter()
            .map(Qualifier::normalize)
            .collect();
        if qualifiers.is_empty() {
            qualifiers.insert(Qualifier::default_qualifier());
        }
        Self {
            required_type: descriptor.required_type.clone(),
            qualifiers,
            member: descriptor.member.clone(),
        }
    }

    pub fn required_type(&self) -> &BeanType {
        &self.required_type
    }

    pub fn qualifiers(&self) -> &BTreeSet<Qualifier> {
        &self.qualifiers
    }

    pub fn member(&self) -> Option<&str> {
        self.member.as_deref()
    }
}

impl fmt::Display for InjectionPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let qualifiers: Vec<String> = self.qualifiers.iter().map(|q| q.to_string()).collect();
        write!(f, "{} with [{}]", self.required_type, qualifiers.join(", "))?;
        if let Some(member) = &self.member {
            write!(f, " at {}", member)?;
        }
        Ok(())
    }
}

/// A registered bean
pub struct Bean {
    id: BeanId,
    kind: BeanKind,
    bean_class: String,
    attributes: BeanAttributes,
    producer: Arc<dyn InstanceProducer>,
    injection_points: Vec<InjectionPoint>,
    interceptor_bindings: BTreeSet<Qualifier>,
    methods: Vec<MethodSignature>,
    decorators: Vec<Arc<dyn DelegateWrapper>>,
    passivation_capable: bool,
}

impl Bean {
    /// Start building a bean
    pub fn builder(
        bean_class: impl Into<String>,
        attributes: BeanAttributes,
        producer: Arc<dyn InstanceProducer>,
    ) -> BeanBuilder {
        BeanBuilder {
            kind: BeanKind::Managed,
            bean_class: bean_class.into(),
            attributes,
            producer,
            injection_points: Vec::new(),
            interceptor_bindings: BTreeSet::new(),
            methods: Vec::new(),
            decorators: Vec::new(),
            passivation_capable: true,
        }
    }

    pub fn id(&self) -> BeanId {
        self.id
    }

    pub fn kind(&self) -> BeanKind {
        self.kind
    }

    pub fn bean_class(&self) -> &str {
        &self.bean_class
    }

    pub fn attributes(&self) -> &BeanAttributes {
        &self.attributes
    }

    pub fn injection_points(&self) -> &[InjectionPoint] {
        &self.injection_points
    }

    /// Class-level interceptor-binding annotations
    pub fn interceptor_bindings(&self) -> &BTreeSet<Qualifier> {
        &self.interceptor_bindings
    }

    /// Method signatures carried for interception matching
    pub fn methods(&self) -> &[MethodSignature] {
        &self.methods
    }

    pub fn is_passivation_capable(&self) -> bool {
        self.passivation_capable
    }

    /// Create an instance, applying the decorator stack innermost-first so
    /// the highest-ordered decorator ends up outermost
    pub fn create(&self, ctx: &mut CreationalContext) -> Result<Instance, ContainerError> {
        let mut instance = self.producer.produce(ctx)?;
        for wrapper in self.decorators.iter().rev() {
            instance = wrapper.wrap(instance)?;
        }
        Ok(instance)
    }

    /// Destroy an instance previously created by this bean
    pub fn destroy(&self, instance: Instance) -> Result<(), ContainerError> {
        self.producer.dispose(instance)
    }
}

impl PartialEq for Bean {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Bean {}

impl std::hash::Hash for Bean {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Bean {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bean")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("bean_class", &self.bean_class)
            .field("scope", &self.attributes.scope())
            .field("enabled", &self.attributes.is_enabled())
            .finish()
    }
}

/// Builder for [`Bean`]
pub struct BeanBuilder {
    kind: BeanKind,
    bean_class: String,
    attributes: BeanAttributes,
    producer: Arc<dyn InstanceProducer>,
    injection_points: Vec<InjectionPoint>,
    interceptor_bindings: BTreeSet<Qualifier>,
    methods: Vec<MethodSignature>,
    decorators: Vec<Arc<dyn DelegateWrapper>>,
    passivation_capable: bool,
}

impl BeanBuilder {
    pub fn kind(mut self, kind: BeanKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn injection_points(mut self, points: impl IntoIterator<Item = InjectionPoint>) -> Self {
        self.injection_points.extend(points);
        self
    }

    pub fn interceptor_bindings(
        mut self,
        bindings: impl IntoIterator<Item = Qualifier>,
    ) -> Self {
        self.interceptor_bindings.extend(bindings);
        self
    }

    pub fn methods(mut self, methods: impl IntoIterator<Item = MethodSignature>) -> Self {
        self.methods.extend(methods);
        self
    }

    /// Decorator stack, ordered outermost-first
    pub fn decorators(
        mut self,
        decorators: impl IntoIterator<Item = Arc<dyn DelegateWrapper>>,
    ) -> Self {
        self.decorators.extend(decorators);
        self
    }

    pub fn passivation_capable(mut self, capable: bool) -> Self {
        self.passivation_capable = capable;
        self
    }

    pub fn build(self) -> Bean {
        Bean {
            id: BeanId::new(),
            kind: self.kind,
            bean_class: self.bean_class,
            attributes: self.attributes,
            producer: self.producer,
            injection_points: self.injection_points,
            interceptor_bindings: self.interceptor_bindings,
            methods: self.methods,
            decorators: self.decorators,
            passivation_capable: self.passivation_capable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::types::BeanType;
    use std::collections::BTreeSet;

    fn attributes() -> BeanAttributes {
        let mut types = BTreeSet::new();
        types.insert(BeanType::class("Dog"));
        BeanAttributes::builder(types).build().unwrap()
    }

    #[test]
    fn test_bean_identity() {
        let producer = Arc::new(ClosureProducer::of_value(|| "woof".to_string()));
        let a = Bean::builder("Dog", attributes(), producer.clone()).build();
        let b = Bean::builder("Dog", attributes(), producer).build();

        assert_ne!(a.id(), b.id());
        assert_ne!(a, b);
        assert_eq!(a, a);
    }

    #[test]
    fn test_create_and_downcast() {
        let producer = Arc::new(ClosureProducer::of_value(|| 42usize));
        let bean = Bean::builder("Answer", attributes(), producer).build();
        let mut ctx = CreationalContext::new();

        let instance = bean.create(&mut ctx).unwrap();
        let value = instance.downcast_ref::<usize>().unwrap();
        assert_eq!(*value, 42);
    }

    #[test]
    fn test_dispose_hook_runs() {
        use std::sync::atomic::{AtomicBool, Ordering};
        let disposed = Arc::new(AtomicBool::new(false));
        let flag = disposed.clone();
        let producer = Arc::new(
            ClosureProducer::of_value(|| 7i32).with_dispose(move |_| {
                flag.store(true, Ordering::SeqCst);
                Ok(())
            }),
        );
        let bean = Bean::builder("Counter", attributes(), producer).build();
        let mut ctx = CreationalContext::new();

        let instance = bean.create(&mut ctx).unwrap();
        bean.destroy(instance).unwrap();
        assert!(disposed.load(Ordering::SeqCst));
    }

    #[test]
    fn test_injection_point_defaults_to_default_qualifier() {
        use crate::container::descriptor::InjectionPointDescriptor;
        let point = InjectionPoint::from_descriptor(&InjectionPointDescriptor {
            required_type: BeanType::class("Animal"),
            qualifiers: Vec::new(),
            member: Some("pet".to_string()),
        });
        assert!(point
            .qualifiers()
            .contains(&crate::container::qualifier::Qualifier::default_qualifier()));
        assert!(point.to_string().contains("Animal"));
        assert!(point.to_string().contains("at pet"));
    }
}

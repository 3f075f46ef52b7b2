//! Central bean index
//!
//! The registry accumulates beans while open (single-threaded discovery),
//! then closes into an effectively immutable index safe for unrestricted
//! concurrent reads. Disabled alternatives stay in the raw index so
//! re-processing the same discovery set is idempotent; they are simply
//! filtered out of every resolvable view.

use crate::container::bean::{Bean, BeanId};
use crate::container::qualifier::{qualifiers_match, Qualifier, NAMED};
use crate::container::types::BeanType;
use crate::errors::ContainerError;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info};

/// Registry mutability state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryState {
    /// Mutable, used during discovery
    Open,
    /// Immutable, safe for concurrent read-only resolution
    Closed,
}

/// The central index from resolution queries to candidate beans
pub struct BeanRegistry {
    state: RegistryState,
    beans: Vec<Arc<Bean>>,
    by_raw_type: HashMap<String, Vec<usize>>,
    by_name: HashMap<String, Vec<BeanId>>,
    by_stereotype: HashMap<String, Vec<BeanId>>,
    by_id: HashMap<BeanId, usize>,
}

impl BeanRegistry {
    pub fn new() -> Self {
        Self {
            state: RegistryState::Open,
            beans: Vec::new(),
            by_raw_type: HashMap::new(),
            by_name: HashMap::new(),
            by_stereotype: HashMap::new(),
            by_id: HashMap::new(),
        }
    }

    pub fn state(&self) -> RegistryState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == RegistryState::Closed
    }

    /// Register a bean, validating structural invariants.
    ///
    /// Fails with an illegal-state error once the registry is closed and
    /// with a definition error when the bean breaks a registration rule.
    pub fn register(&mut self, bean: Bean) -> Result<Arc<Bean>, ContainerError> {
        if self.is_closed() {
            return Err(ContainerError::illegal_state(
                "register",
                "closed for registration",
            ));
        }
        self.validate_registration(&bean)?;

        let bean = Arc::new(bean);
        let index = self.beans.len();
        self.by_id.insert(bean.id(), index);

        // A closure may carry several parameterizations of one raw type;
        // the index must still hold the bean once per raw name.
        let raw_names: BTreeSet<&str> = bean
            .attributes()
            .types()
            .iter()
            .map(|t| t.raw_name())
            .collect();
        for raw_name in raw_names {
            self.by_raw_type
                .entry(raw_name.to_string())
                .or_default()
                .push(index);
        }
        if let Some(name) = bean.attributes().name() {
            self.by_name
                .entry(name.to_string())
                .or_default()
                .push(bean.id());
        }
        for stereotype in bean.attributes().stereotypes() {
            self.by_stereotype
                .entry(stereotype.clone())
                .or_default()
                .push(bean.id());
        }

        debug!(
            bean = bean.bean_class(),
            scope = %bean.attributes().scope(),
            enabled = bean.attributes().is_enabled(),
            "bean registered"
        );
        self.beans.push(bean.clone());
        Ok(bean)
    }

    /// Fixed registration rule table
    fn validate_registration(&self, bean: &Bean) -> Result<(), ContainerError> {
        let attributes = bean.attributes();

        if attributes.scope().is_passivating() && !bean.is_passivation_capable() {
            return Err(ContainerError::definition(
                bean.bean_class(),
                format!(
                    "beans in the passivating {} scope must be passivation capable",
                    attributes.scope()
                ),
            ));
        }

        // A @Named qualifier value must agree with the declared bean name.
        let named_value = attributes
            .qualifiers()
            .iter()
            .filter(|q| q.annotation() == NAMED)
            .find_map(|q| q.name_value().map(str::to_string));
        if let (Some(value), Some(name)) = (named_value.as_deref(), attributes.name()) {
            if value != name {
                return Err(ContainerError::definition(
                    bean.bean_class(),
                    format!(
                        "@Named value '{}' conflicts with declared bean name '{}'",
                        value, name
                    ),
                ));
            }
        }

        Ok(())
    }

    /// Transition from open to closed. Idempotent.
    pub fn finalize_registration(&mut self) {
        if self.is_closed() {
            return;
        }
        self.state = RegistryState::Closed;
        info!(beans = self.beans.len(), "bean registry closed");
    }

    /// All enabled beans whose type closure satisfies the required type and
    /// whose qualifiers match the request
    pub fn resolve_candidates(
        &self,
        required: &BeanType,
        qualifiers: &BTreeSet<Qualifier>,
    ) -> Vec<Arc<Bean>> {
        let pool: Vec<&Arc<Bean>> = match required {
            BeanType::Class(_) | BeanType::Parameterized { .. } => self
                .by_raw_type
                .get(required.raw_name())
                .map(|indices| indices.iter().map(|&i| &self.beans[i]).collect())
                .unwrap_or_default(),
            _ => self.beans.iter().collect(),
        };

        pool.into_iter()
            .filter(|bean| bean.attributes().is_enabled())
            .filter(|bean| {
                bean.attributes()
                    .types()
                    .iter()
                    .any(|t| t.satisfies(required))
            })
            .filter(|bean| qualifiers_match(qualifiers, bean.attributes().qualifiers()))
            .cloned()
            .collect()
    }

    /// Enabled beans declaring the given name, for expression-language
    /// style lookups
    pub fn beans_named(&self, name: &str) -> Vec<Arc<Bean>> {
        self.by_name
            .get(name)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.bean_by_id(*id))
                    .filter(|bean| bean.attributes().is_enabled())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Beans declaring the given stereotype, enabled or not
    pub fn beans_with_stereotype(&self, stereotype: &str) -> Vec<Arc<Bean>> {
        self.by_stereotype
            .get(stereotype)
            .map(|ids| ids.iter().filter_map(|id| self.bean_by_id(*id)).collect())
            .unwrap_or_default()
    }

    pub fn bean_by_id(&self, id: BeanId) -> Option<Arc<Bean>> {
        self.by_id.get(&id).map(|&index| self.beans[index].clone())
    }

    /// Every registered bean, disabled alternatives included
    pub fn beans(&self) -> &[Arc<Bean>] {
        &self.beans
    }

    /// Every enabled bean
    pub fn enabled_beans(&self) -> impl Iterator<Item = &Arc<Bean>> {
        self.beans
            .iter()
            .filter(|bean| bean.attributes().is_enabled())
    }

    /// Declared bean names with their enabled beans, for duplicate checks
    pub fn names(&self) -> impl Iterator<Item = (&str, Vec<Arc<Bean>>)> {
        self.by_name
            .keys()
            .map(move |name| (name.as_str(), self.beans_named(name)))
    }

    pub fn bean_count(&self) -> usize {
        self.beans.len()
    }

    /// Drop every index; used at container shutdown
    pub fn clear(&mut self) {
        self.beans.clear();
        self.by_raw_type.clear();
        self.by_name.clear();
        self.by_stereotype.clear();
        self.by_id.clear();
    }
}

impl Default for BeanRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for BeanRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BeanRegistry")
            .field("state", &self.state)
            .field("beans", &self.beans.len())
            .field("names", &self.by_name.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::attributes::BeanAttributes;
    use crate::container::bean::ClosureProducer;
    use crate::container::context::Scope;

    fn closure_of(names: &[&str]) -> BTreeSet<BeanType> {
        names.iter().map(|n| BeanType::class(*n)).collect()
    }

    fn bean(class: &str, types: &[&str]) -> Bean {
        bean_with(class, types, |b| b)
    }

    fn bean_with(
        class: &str,
        types: &[&str],
        customize: impl FnOnce(crate::container::attributes::BeanAttributesBuilder) -> crate::container::attributes::BeanAttributesBuilder,
    ) -> Bean {
        let attributes = customize(BeanAttributes::builder(closure_of(types)))
            .build()
            .unwrap();
        let class_name = class.to_string();
        let producer = Arc::new(ClosureProducer::of_value(move || class_name.clone()));
        Bean::builder(class, attributes, producer).build()
    }

    fn default_request() -> BTreeSet<Qualifier> {
        let mut qualifiers = BTreeSet::new();
        qualifiers.insert(Qualifier::default_qualifier());
        qualifiers
    }

    #[test]
    fn test_register_and_resolve_by_supertype() {
        let mut registry = BeanRegistry::new();
        registry.register(bean("Dog", &["Dog", "Animal"])).unwrap();
        registry.register(bean("Brick", &["Brick"])).unwrap();
        registry.finalize_registration();

        let candidates =
            registry.resolve_candidates(&BeanType::class("Animal"), &default_request());
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].bean_class(), "Dog");
    }

    #[test]
    fn test_register_after_close_fails() {
        let mut registry = BeanRegistry::new();
        registry.finalize_registration();
        let err = registry.register(bean("Late", &["Late"])).unwrap_err();
        assert!(matches!(err, ContainerError::IllegalState { .. }));
        // finalize is idempotent
        registry.finalize_registration();
    }

    #[test]
    fn test_disabled_alternative_stays_in_raw_index_but_not_resolvable() {
        let mut registry = BeanRegistry::new();
        registry
            .register(bean_with("MockPayment", &["MockPayment", "Payment"], |b| {
                b.alternative(true).enabled(false)
            }))
            .unwrap();
        registry.finalize_registration();

        assert_eq!(registry.bean_count(), 1);
        let candidates =
            registry.resolve_candidates(&BeanType::class("Payment"), &default_request());
        assert!(candidates.is_empty());
    }

    #[test]
    fn test_qualifier_filtering() {
        let mut registry = BeanRegistry::new();
        registry
            .register(bean_with("FastService", &["FastService", "Service"], |b| {
                b.qualifier(Qualifier::marker("Fast"))
            }))
            .unwrap();
        registry.register(bean("PlainService", &["PlainService", "Service"])).unwrap();
        registry.finalize_registration();

        let mut fast = BTreeSet::new();
        fast.insert(Qualifier::marker("Fast"));
        let candidates = registry.resolve_candidates(&BeanType::class("Service"), &fast);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].bean_class(), "FastService");

        let mut any = BTreeSet::new();
        any.insert(Qualifier::any());
        let all = registry.resolve_candidates(&BeanType::class("Service"), &any);
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_named_index() {
        let mut registry = BeanRegistry::new();
        registry
            .register(bean_with("Cart", &["Cart"], |b| {
                b.name("cart").qualifier(Qualifier::named("cart"))
            }))
            .unwrap();
        registry.finalize_registration();

        assert_eq!(registry.beans_named("cart").len(), 1);
        assert!(registry.beans_named("missing").is_empty());
    }

    #[test]
    fn test_named_value_must_match_bean_name() {
        let mut registry = BeanRegistry::new();
        let err = registry
            .register(bean_with("Cart", &["Cart"], |b| {
                b.name("cart").qualifier(Qualifier::named("basket"))
            }))
            .unwrap_err();
        assert!(err.is_definition());
    }

    #[test]
    fn test_passivating_scope_requires_capability() {
        let mut registry = BeanRegistry::new();
        let attributes = BeanAttributes::builder(closure_of(&["Wizard"]))
            .scope(Scope::Conversation)
            .build()
            .unwrap();
        let producer = Arc::new(ClosureProducer::of_value(|| 1));
        let bean = Bean::builder("Wizard", attributes, producer)
            .passivation_capable(false)
            .build();
        let err = registry.register(bean).unwrap_err();
        assert!(err.is_definition());
    }

    #[test]
    fn test_one_candidate_despite_repeated_raw_type_in_closure() {
        let mut registry = BeanRegistry::new();
        let types: BTreeSet<BeanType> = [
            BeanType::class("EventSource"),
            BeanType::parameterized("Listener", vec![BeanType::class("String")]),
            BeanType::parameterized("Listener", vec![BeanType::class("Integer")]),
        ]
        .into_iter()
        .collect();
        let attributes = BeanAttributes::builder(types).build().unwrap();
        let producer = Arc::new(ClosureProducer::of_value(|| "events".to_string()));
        registry
            .register(Bean::builder("EventSource", attributes, producer).build())
            .unwrap();
        registry.finalize_registration();

        let candidates =
            registry.resolve_candidates(&BeanType::class("Listener"), &default_request());
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].bean_class(), "EventSource");
    }

    #[test]
    fn test_clear_drops_every_index() {
        let mut registry = BeanRegistry::new();
        registry.register(bean("Dog", &["Dog", "Animal"])).unwrap();
        registry
            .register(bean_with("Cart", &["Cart"], |b| {
                b.name("cart").qualifier(Qualifier::named("cart"))
            }))
            .unwrap();
        registry.finalize_registration();

        registry.clear();
        assert_eq!(registry.bean_count(), 0);
        assert!(registry
            .resolve_candidates(&BeanType::class("Animal"), &default_request())
            .is_empty());
        assert!(registry.beans_named("cart").is_empty());
    }

    #[test]
    fn test_stereotype_index() {
        let mut registry = BeanRegistry::new();
        registry
            .register(bean_with("UserModel", &["UserModel"], |b| {
                b.stereotypes(["Model".to_string()])
            }))
            .unwrap();
        registry.finalize_registration();
        assert_eq!(registry.beans_with_stereotype("Model").len(), 1);
    }
}

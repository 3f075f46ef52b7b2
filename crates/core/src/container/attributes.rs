//! Immutable bean descriptors
//!
//! `BeanAttributes` captures everything resolution needs to know about a
//! bean: its type closure, qualifiers, scope, optional name, stereotypes,
//! and the alternative/enabled/priority flags. Constructed once during
//! discovery processing and never mutated afterwards.

use crate::container::context::Scope;
use crate::container::qualifier::Qualifier;
use crate::container::types::BeanType;
use crate::errors::ContainerError;
use std::collections::BTreeSet;

/// Immutable descriptor of a bean
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeanAttributes {
    types: BTreeSet<BeanType>,
    qualifiers: BTreeSet<Qualifier>,
    scope: Scope,
    name: Option<String>,
    stereotypes: BTreeSet<String>,
    alternative: bool,
    enabled: bool,
    priority: Option<i32>,
}

impl BeanAttributes {
    /// Start building attributes from a type closure
    pub fn builder(types: BTreeSet<BeanType>) -> BeanAttributesBuilder {
        BeanAttributesBuilder::new(types)
    }

    /// Type closure; never empty, always contains the universal root
    pub fn types(&self) -> &BTreeSet<BeanType> {
        &self.types
    }

    /// Qualifier set; never empty, always contains `@Any`
    pub fn qualifiers(&self) -> &BTreeSet<Qualifier> {
        &self.qualifiers
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn stereotypes(&self) -> &BTreeSet<String> {
        &self.stereotypes
    }

    pub fn is_alternative(&self) -> bool {
        self.alternative
    }

    /// Whether the bean participates in resolution. Always true for
    /// non-alternatives; computed from archive enablement for alternatives.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn priority(&self) -> Option<i32> {
        self.priority
    }
}

/// Builder for [`BeanAttributes`], validating structural invariants at
/// `build()` time
#[derive(Debug)]
pub struct BeanAttributesBuilder {
    types: BTreeSet<BeanType>,
    qualifiers: BTreeSet<Qualifier>,
    scope: Scope,
    name: Option<String>,
    stereotypes: BTreeSet<String>,
    alternative: bool,
    enabled: bool,
    priority: Option<i32>,
}

impl BeanAttributesBuilder {
    /// Create a builder over a type closure
    pub fn new(types: BTreeSet<BeanType>) -> Self {
        Self {
            types,
            qualifiers: BTreeSet::new(),
            scope: Scope::Dependent,
            name: None,
            stereotypes: BTreeSet::new(),
            alternative: false,
            enabled: true,
            priority: None,
        }
    }

    /// Add an explicit qualifier
    pub fn qualifier(mut self, qualifier: Qualifier) -> Self {
        self.qualifiers.insert(qualifier);
        self
    }

    /// Add a set of explicit qualifiers
    pub fn qualifiers(mut self, qualifiers: impl IntoIterator<Item = Qualifier>) -> Self {
        self.qualifiers.extend(qualifiers);
        self
    }

    pub fn scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn stereotypes(mut self, stereotypes: impl IntoIterator<Item = String>) -> Self {
        self.stereotypes.extend(stereotypes);
        self
    }

    pub fn alternative(mut self, alternative: bool) -> Self {
        self.alternative = alternative;
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn priority(mut self, priority: Option<i32>) -> Self {
        self.priority = priority;
        self
    }

    /// Build the attributes, completing the implicit qualifier set.
    ///
    /// `@Any` is always added. `@Default` is added unless an explicit
    /// qualifier other than `@Named` is declared.
    pub fn build(mut self) -> Result<BeanAttributes, ContainerError> {
        if self.types.is_empty() {
            return Err(ContainerError::definition(
                "bean attributes",
                "type closure must not be empty",
            ));
        }
        self.types.insert(BeanType::object());

        let has_discriminating_qualifier = self
            .qualifiers
            .iter()
            .any(|q| !q.is_any() && q.annotation() != crate::container::qualifier::NAMED);
        if !has_discriminating_qualifier {
            self.qualifiers.insert(Qualifier::default_qualifier());
        }
        self.qualifiers.insert(Qualifier::any());

        if let Some(name) = &self.name {
            if name.is_empty() {
                return Err(ContainerError::definition(
                    "bean attributes",
                    "bean name must not be empty",
                ));
            }
        }

        if !self.alternative && !self.enabled {
            return Err(ContainerError::definition(
                "bean attributes",
                "only alternatives can be disabled",
            ));
        }

        Ok(BeanAttributes {
            types: self.types,
            qualifiers: self.qualifiers,
            scope: self.scope,
            name: self.name,
            stereotypes: self.stereotypes,
            alternative: self.alternative,
            enabled: self.enabled,
            priority: self.priority,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn closure() -> BTreeSet<BeanType> {
        let mut types = BTreeSet::new();
        types.insert(BeanType::class("Dog"));
        types
    }

    #[test]
    fn test_implicit_qualifiers_added() {
        let attributes = BeanAttributes::builder(closure()).build().unwrap();

        assert!(attributes.qualifiers().contains(&Qualifier::any()));
        assert!(attributes
            .qualifiers()
            .contains(&Qualifier::default_qualifier()));
        assert!(attributes.types().contains(&BeanType::object()));
    }

    #[test]
    fn test_explicit_qualifier_suppresses_default() {
        let attributes = BeanAttributes::builder(closure())
            .qualifier(Qualifier::marker("Premium"))
            .build()
            .unwrap();

        assert!(attributes.qualifiers().contains(&Qualifier::any()));
        assert!(!attributes
            .qualifiers()
            .contains(&Qualifier::default_qualifier()));
    }

    #[test]
    fn test_named_alone_keeps_default() {
        let attributes = BeanAttributes::builder(closure())
            .qualifier(Qualifier::named("dog"))
            .name("dog")
            .build()
            .unwrap();

        assert!(attributes
            .qualifiers()
            .contains(&Qualifier::default_qualifier()));
        assert_eq!(attributes.name(), Some("dog"));
    }

    #[test]
    fn test_empty_closure_rejected() {
        let err = BeanAttributes::builder(BTreeSet::new()).build().unwrap_err();
        assert!(err.is_definition());
    }

    #[test]
    fn test_disabled_non_alternative_rejected() {
        let err = BeanAttributes::builder(closure())
            .enabled(false)
            .build()
            .unwrap_err();
        assert!(err.is_definition());
    }

    #[test]
    fn test_defaults() {
        let attributes = BeanAttributes::builder(closure()).build().unwrap();
        assert_eq!(attributes.scope(), Scope::Dependent);
        assert!(!attributes.is_alternative());
        assert!(attributes.is_enabled());
        assert_eq!(attributes.priority(), None);
    }
}

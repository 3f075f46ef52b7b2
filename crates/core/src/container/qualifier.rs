//! Qualifier identity and matching
//!
//! A qualifier's identity is its annotation type plus the values of its
//! binding members; members marked non-binding are dropped at
//! normalization time, so two instances differing only in non-binding
//! members compare equal.

use crate::container::descriptor::{AnnotationDescriptor, MemberValue};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Annotation name of the implicit qualifier carried by every bean
pub const ANY: &str = "Any";
/// Annotation name of the implicit qualifier for beans with no explicit one
pub const DEFAULT: &str = "Default";
/// Annotation name of the name-binding qualifier
pub const NAMED: &str = "Named";

/// Normalized qualifier identity: annotation type plus binding member values
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Qualifier {
    annotation: String,
    members: BTreeMap<String, MemberValue>,
}

impl Qualifier {
    /// Normalize an annotation instance into a qualifier, dropping
    /// non-binding members
    pub fn normalize(descriptor: &AnnotationDescriptor) -> Self {
        let members = descriptor
            .members
            .iter()
            .filter(|(name, _)| !descriptor.non_binding_members.contains(*name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        Self {
            annotation: descriptor.annotation.clone(),
            members,
        }
    }

    /// Create a marker qualifier with no members
    pub fn marker(annotation: impl Into<String>) -> Self {
        Self {
            annotation: annotation.into(),
            members: BTreeMap::new(),
        }
    }

    /// The implicit `@Any` qualifier
    pub fn any() -> Self {
        Self::marker(ANY)
    }

    /// The implicit `@Default` qualifier
    pub fn default_qualifier() -> Self {
        Self::marker(DEFAULT)
    }

    /// A `@Named` qualifier with the given value
    pub fn named(value: impl Into<String>) -> Self {
        let mut members = BTreeMap::new();
        members.insert("value".to_string(), MemberValue::Str(value.into()));
        Self {
            annotation: NAMED.to_string(),
            members,
        }
    }

    /// Annotation type name
    pub fn annotation(&self) -> &str {
        &self.annotation
    }

    /// Binding member values
    pub fn members(&self) -> &BTreeMap<String, MemberValue> {
        &self.members
    }

    /// Check if this is the implicit `@Any` qualifier
    pub fn is_any(&self) -> bool {
        self.annotation == ANY
    }

    /// The `@Named` value, if this is a name qualifier
    pub fn name_value(&self) -> Option<&str> {
        if self.annotation != NAMED {
            return None;
        }
        match self.members.get("value") {
            Some(MemberValue::Str(value)) => Some(value),
            _ => None,
        }
    }
}

impl fmt::Display for Qualifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.members.is_empty() {
            write!(f, "@{}", self.annotation)
        } else {
            let rendered: Vec<String> = self
                .members
                .iter()
                .map(|(name, value)| format!("{}={:?}", name, value))
                .collect();
            write!(f, "@{}({})", self.annotation, rendered.join(", "))
        }
    }
}

/// Check whether a candidate's qualifier set satisfies a request.
///
/// Every required qualifier must be present in the provided set, except
/// that a request containing `@Any` matches unconditionally.
pub fn qualifiers_match(required: &BTreeSet<Qualifier>, provided: &BTreeSet<Qualifier>) -> bool {
    if required.iter().any(Qualifier::is_any) {
        return true;
    }
    required.iter().all(|q| provided.contains(q))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tenant(value: &str, region: &str) -> AnnotationDescriptor {
        AnnotationDescriptor::marker("Tenant")
            .with_member("value", MemberValue::Str(value.to_string()))
            .with_member("region", MemberValue::Str(region.to_string()))
            .with_non_binding("region")
    }

    #[test]
    fn test_non_binding_members_are_excluded_from_identity() {
        let a = Qualifier::normalize(&tenant("acme", "eu"));
        let b = Qualifier::normalize(&tenant("acme", "us"));
        let c = Qualifier::normalize(&tenant("globex", "eu"));

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(!a.members().contains_key("region"));
    }

    #[test]
    fn test_superset_matching() {
        let mut required = BTreeSet::new();
        required.insert(Qualifier::default_qualifier());

        let mut provided = BTreeSet::new();
        provided.insert(Qualifier::any());
        provided.insert(Qualifier::default_qualifier());
        provided.insert(Qualifier::named("dog"));

        assert!(qualifiers_match(&required, &provided));

        required.insert(Qualifier::marker("Premium"));
        assert!(!qualifiers_match(&required, &provided));
    }

    #[test]
    fn test_any_request_matches_everything() {
        let mut required = BTreeSet::new();
        required.insert(Qualifier::any());

        let mut provided = BTreeSet::new();
        provided.insert(Qualifier::marker("Premium"));

        assert!(qualifiers_match(&required, &provided));
    }

    #[test]
    fn test_named_value() {
        assert_eq!(Qualifier::named("cart").name_value(), Some("cart"));
        assert_eq!(Qualifier::default_qualifier().name_value(), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(Qualifier::any().to_string(), "@Any");
        assert!(Qualifier::named("cart").to_string().starts_with("@Named("));
    }
}

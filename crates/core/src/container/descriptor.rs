//! Descriptor ingestion surface
//!
//! The container never reflects over live classes. The external discovery
//! collaborator scans bean archives and hands the core pre-extracted value
//! structures: one [`TypeDescriptor`] per discovered class plus one
//! [`ArchiveMetadata`] record per archive (the enablement lists and
//! discovery mode usually found in a deployment descriptor).

use crate::container::types::BeanType;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::errors::ContainerError;

/// A single annotation member value, restricted to forms with stable
/// structural equality so qualifiers can be compared and hashed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberValue {
    Bool(bool),
    Int(i64),
    Str(String),
    /// An enum constant, recorded as `EnumType.CONSTANT`
    EnumConstant(String),
    /// A class literal member, recorded by class name
    ClassLiteral(String),
    List(Vec<MemberValue>),
}

/// An annotation instance as extracted by discovery
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnnotationDescriptor {
    /// Annotation type name
    pub annotation: String,
    /// Member name to value, in declaration-independent order
    #[serde(default)]
    pub members: BTreeMap<String, MemberValue>,
    /// Members excluded from binding comparison (`@Nonbinding` equivalent)
    #[serde(default)]
    pub non_binding_members: BTreeSet<String>,
}

impl AnnotationDescriptor {
    /// Create a marker annotation descriptor with no members
    pub fn marker(annotation: impl Into<String>) -> Self {
        Self {
            annotation: annotation.into(),
            members: BTreeMap::new(),
            non_binding_members: BTreeSet::new(),
        }
    }

    /// Add a member value
    pub fn with_member(mut self, name: impl Into<String>, value: MemberValue) -> Self {
        self.members.insert(name.into(), value);
        self
    }

    /// Mark a member as non-binding
    pub fn with_non_binding(mut self, name: impl Into<String>) -> Self {
        self.non_binding_members.insert(name.into());
        self
    }
}

/// A method signature on a discovered class, carried for interception
/// matching and chain validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodSignature {
    pub name: String,
    #[serde(default)]
    pub parameter_types: Vec<BeanType>,
    #[serde(default)]
    pub return_type: Option<BeanType>,
    /// Method-level interceptor-binding annotations
    #[serde(default)]
    pub bindings: Vec<AnnotationDescriptor>,
}

impl MethodSignature {
    /// Create a signature with no parameters or bindings
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameter_types: Vec::new(),
            return_type: None,
            bindings: Vec::new(),
        }
    }

    /// Add a parameter type
    pub fn with_parameter(mut self, ty: BeanType) -> Self {
        self.parameter_types.push(ty);
        self
    }

    /// Add a method-level binding annotation
    pub fn with_binding(mut self, binding: AnnotationDescriptor) -> Self {
        self.bindings.push(binding);
        self
    }
}

/// An injection point declared by a discovered class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InjectionPointDescriptor {
    pub required_type: BeanType,
    #[serde(default)]
    pub qualifiers: Vec<AnnotationDescriptor>,
    /// Declaring member (field or parameter) name, for diagnostics
    #[serde(default)]
    pub member: Option<String>,
}

/// A discovered class, fully described for bean registration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDescriptor {
    pub class_name: String,
    /// Declared type parameter names, in order
    #[serde(default)]
    pub type_params: Vec<String>,
    /// Declared superclass reference with its actual arguments, if any
    #[serde(default)]
    pub superclass: Option<BeanType>,
    /// Directly implemented interfaces with their actual arguments
    #[serde(default)]
    pub interfaces: Vec<BeanType>,
    /// Declared scope annotation name, if any
    #[serde(default)]
    pub scope: Option<String>,
    /// Explicit qualifier annotations
    #[serde(default)]
    pub qualifiers: Vec<AnnotationDescriptor>,
    /// Declared stereotype names
    #[serde(default)]
    pub stereotypes: Vec<String>,
    /// Class-level interceptor-binding annotations
    #[serde(default)]
    pub interceptor_bindings: Vec<AnnotationDescriptor>,
    #[serde(default)]
    pub alternative: bool,
    /// Declared numeric priority, if any
    #[serde(default)]
    pub priority: Option<i32>,
    #[serde(default)]
    pub methods: Vec<MethodSignature>,
    #[serde(default)]
    pub injection_points: Vec<InjectionPointDescriptor>,
}

impl TypeDescriptor {
    /// Create a minimal descriptor for a class with no supertypes beyond the
    /// universal root
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            type_params: Vec::new(),
            superclass: None,
            interfaces: Vec::new(),
            scope: None,
            qualifiers: Vec::new(),
            stereotypes: Vec::new(),
            interceptor_bindings: Vec::new(),
            alternative: false,
            priority: None,
            methods: Vec::new(),
            injection_points: Vec::new(),
        }
    }

    /// Check whether this descriptor carries a bean-defining annotation
    /// (a scope or a stereotype), used by annotated-mode discovery
    pub fn has_bean_defining_annotation(&self) -> bool {
        self.scope.is_some() || !self.stereotypes.is_empty()
    }
}

/// Archive discovery mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryMode {
    /// Every discovered type becomes a bean candidate
    All,
    /// Only types carrying a bean-defining annotation become candidates
    Annotated,
    /// No discovered types become candidates; only synthetic registrations
    None,
}

impl Default for DiscoveryMode {
    fn default() -> Self {
        DiscoveryMode::Annotated
    }
}

/// Per-archive enablement record, the deployment-descriptor equivalent
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveMetadata {
    /// Alternative classes enabled for this archive, in declaration order
    #[serde(default)]
    pub enabled_alternatives: Vec<String>,
    /// Stereotypes whose alternatives are enabled for this archive
    #[serde(default)]
    pub enabled_alternative_stereotypes: Vec<String>,
    /// Interceptor classes enabled for this archive, in declaration order
    #[serde(default)]
    pub enabled_interceptors: Vec<String>,
    /// Decorator classes enabled for this archive, in declaration order
    #[serde(default)]
    pub enabled_decorators: Vec<String>,
    #[serde(default)]
    pub discovery_mode: DiscoveryMode,
}

impl ArchiveMetadata {
    /// Parse archive metadata from a JSON document
    pub fn from_json(input: &str) -> Result<Self, ContainerError> {
        Ok(serde_json::from_str(input)?)
    }

    /// Parse archive metadata from a YAML document
    pub fn from_yaml(input: &str) -> Result<Self, ContainerError> {
        Ok(serde_yaml::from_str(input)?)
    }

    /// Load archive metadata from a JSON or YAML file, chosen by extension
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ContainerError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml(&raw),
            _ => Self::from_json(&raw),
        }
    }

    /// Position of an alternative class in the enablement order
    pub fn alternative_position(&self, class_name: &str) -> Option<usize> {
        self.enabled_alternatives
            .iter()
            .position(|c| c == class_name)
    }
}

/// A stereotype definition contributed by discovery: defaults applied to
/// beans declaring the stereotype
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StereotypeDefinition {
    pub name: String,
    /// Default scope contributed to beans that declare none
    #[serde(default)]
    pub default_scope: Option<String>,
    /// Whether the stereotype contributes a default bean name
    #[serde(default)]
    pub named: bool,
    /// Whether the stereotype marks its beans as alternatives
    #[serde(default)]
    pub alternative: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_archive_metadata_from_json() {
        let metadata = ArchiveMetadata::from_json(
            r#"{
                "enabled_alternatives": ["com.acme.MockPayment"],
                "enabled_interceptors": ["com.acme.Logged", "com.acme.Timed"],
                "discovery_mode": "all"
            }"#,
        )
        .unwrap();

        assert_eq!(metadata.discovery_mode, DiscoveryMode::All);
        assert_eq!(metadata.enabled_alternatives, vec!["com.acme.MockPayment"]);
        assert_eq!(metadata.enabled_interceptors.len(), 2);
        assert!(metadata.enabled_decorators.is_empty());
        assert_eq!(metadata.alternative_position("com.acme.MockPayment"), Some(0));
        assert_eq!(metadata.alternative_position("com.acme.Other"), None);
    }

    #[test]
    fn test_archive_metadata_from_yaml() {
        let metadata = ArchiveMetadata::from_yaml(
            "enabled_decorators:\n  - com.acme.AuditDecorator\ndiscovery_mode: annotated\n",
        )
        .unwrap();

        assert_eq!(metadata.discovery_mode, DiscoveryMode::Annotated);
        assert_eq!(metadata.enabled_decorators, vec!["com.acme.AuditDecorator"]);
    }

    #[test]
    fn test_metadata_defaults_to_annotated_discovery() {
        let metadata = ArchiveMetadata::from_json("{}").unwrap();
        assert_eq!(metadata.discovery_mode, DiscoveryMode::Annotated);
    }

    #[test]
    fn test_bean_defining_annotation() {
        let mut descriptor = TypeDescriptor::new("com.acme.Plain");
        assert!(!descriptor.has_bean_defining_annotation());

        descriptor.scope = Some("request".to_string());
        assert!(descriptor.has_bean_defining_annotation());

        let mut stereotyped = TypeDescriptor::new("com.acme.Model");
        stereotyped.stereotypes.push("Model".to_string());
        assert!(stereotyped.has_bean_defining_annotation());
    }

    #[test]
    fn test_descriptor_round_trips_through_json() {
        let descriptor = TypeDescriptor {
            superclass: Some(BeanType::class("com.acme.Base")),
            interfaces: vec![BeanType::parameterized(
                "Container",
                vec![BeanType::class("String")],
            )],
            ..TypeDescriptor::new("com.acme.Bucket")
        };
        let encoded = serde_json::to_string(&descriptor).unwrap();
        let decoded: TypeDescriptor = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, descriptor);
    }
}

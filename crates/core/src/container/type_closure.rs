//! Type closure computation
//!
//! A bean satisfies injection requests for every type in its closure: the
//! class itself, every superclass, every direct and inherited interface,
//! and the universal root. Type arguments are substituted through the
//! supertype chain, so `Bucket implements Container<String>` contributes
//! `Container<String>`, never `Container<T>`. Failure to bind a variable
//! is a definition-time error reported at startup.

use crate::container::descriptor::TypeDescriptor;
use crate::container::types::BeanType;
use crate::errors::ContainerError;
use std::collections::{BTreeSet, HashMap, HashSet};

/// Lookup of discovered descriptors by class name, used to chase indirect
/// supertypes. Types without a descriptor are treated as leaves.
pub trait TypeIndex {
    fn lookup(&self, class_name: &str) -> Option<&TypeDescriptor>;
}

impl TypeIndex for HashMap<String, TypeDescriptor> {
    fn lookup(&self, class_name: &str) -> Option<&TypeDescriptor> {
        self.get(class_name)
    }
}

/// Compute the full type closure for a bean's implementation class.
///
/// The result always contains the class itself and the universal root.
/// Fails with a type-resolution error when a supertype reference carries a
/// wildcard or a type variable that cannot be bound to a concrete argument.
pub fn compute_closure(
    descriptor: &TypeDescriptor,
    index: &dyn TypeIndex,
) -> Result<BTreeSet<BeanType>, ContainerError> {
    if !descriptor.type_params.is_empty() {
        return Err(ContainerError::type_resolution(
            &descriptor.class_name,
            format!(
                "bean class declares unresolved type variables [{}]",
                descriptor.type_params.join(", ")
            ),
        ));
    }

    let mut closure = BTreeSet::new();
    closure.insert(BeanType::class(&descriptor.class_name));
    closure.insert(BeanType::object());

    let mut visited = HashSet::new();
    visited.insert(BeanType::class(&descriptor.class_name));

    walk_supertypes(
        descriptor,
        &HashMap::new(),
        index,
        &mut closure,
        &mut visited,
        &descriptor.class_name,
    )?;

    Ok(closure)
}

fn walk_supertypes(
    descriptor: &TypeDescriptor,
    bindings: &HashMap<String, BeanType>,
    index: &dyn TypeIndex,
    closure: &mut BTreeSet<BeanType>,
    visited: &mut HashSet<BeanType>,
    origin: &str,
) -> Result<(), ContainerError> {
    let supertypes = descriptor.superclass.iter().chain(descriptor.interfaces.iter());
    for declared in supertypes {
        let resolved = substitute(declared, bindings, origin)?;
        closure.insert(resolved.clone());
        if !visited.insert(resolved.clone()) {
            continue;
        }
        if let Some(super_descriptor) = index.lookup(resolved.raw_name()) {
            let super_bindings = bind_parameters(super_descriptor, &resolved, origin)?;
            walk_supertypes(super_descriptor, &super_bindings, index, closure, visited, origin)?;
        }
    }
    Ok(())
}

/// Map a supertype descriptor's declared parameters to the actual arguments
/// of the resolved reference.
fn bind_parameters(
    descriptor: &TypeDescriptor,
    resolved: &BeanType,
    origin: &str,
) -> Result<HashMap<String, BeanType>, ContainerError> {
    match resolved {
        BeanType::Parameterized { args, .. } => {
            if args.len() != descriptor.type_params.len() {
                return Err(ContainerError::type_resolution(
                    origin,
                    format!(
                        "supertype {} declares {} type parameter(s) but {} argument(s) were supplied",
                        descriptor.class_name,
                        descriptor.type_params.len(),
                        args.len()
                    ),
                ));
            }
            Ok(descriptor
                .type_params
                .iter()
                .cloned()
                .zip(args.iter().cloned())
                .collect())
        }
        BeanType::Class(_) => {
            if descriptor.type_params.is_empty() {
                Ok(HashMap::new())
            } else {
                Err(ContainerError::type_resolution(
                    origin,
                    format!(
                        "raw use of generic supertype {} leaves [{}] unbound",
                        descriptor.class_name,
                        descriptor.type_params.join(", ")
                    ),
                ))
            }
        }
        other => Err(ContainerError::type_resolution(
            origin,
            format!("illegal supertype reference {}", other),
        )),
    }
}

fn substitute(
    declared: &BeanType,
    bindings: &HashMap<String, BeanType>,
    origin: &str,
) -> Result<BeanType, ContainerError> {
    match declared {
        BeanType::Class(_) => Ok(declared.clone()),
        BeanType::Variable { name, .. } => bindings.get(name).cloned().ok_or_else(|| {
            ContainerError::type_resolution(
                origin,
                format!("type variable {} cannot be resolved to a concrete argument", name),
            )
        }),
        BeanType::Wildcard => Err(ContainerError::type_resolution(
            origin,
            "wildcard in supertype position is forbidden for beans",
        )),
        BeanType::Parameterized { raw, args } => {
            let substituted = args
                .iter()
                .map(|arg| substitute(arg, bindings, origin))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(BeanType::parameterized(raw.clone(), substituted))
        }
    }
}

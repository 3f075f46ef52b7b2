//! Semantic type tokens for type-safe bean resolution
//!
//! Beans never expose live language types to the container; every type in a
//! bean's closure or at an injection point is described by a [`BeanType`]
//! value handed over by the external discovery collaborator. Equality is
//! structural, so `List<String>` and `List<Integer>` are distinct tokens.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Raw name of the universal root type present in every type closure.
pub const OBJECT: &str = "Object";

/// Semantic type descriptor used as the resolution key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BeanType {
    /// A raw (non-parameterized) class or interface reference
    Class(String),
    /// A parameterized type with its argument tokens
    Parameterized { raw: String, args: Vec<BeanType> },
    /// An unbounded wildcard argument
    Wildcard,
    /// A type variable, with its upper bound if one is declared
    Variable {
        name: String,
        bound: Option<Box<BeanType>>,
    },
}

impl BeanType {
    /// Create a raw class token
    pub fn class(name: impl Into<String>) -> Self {
        BeanType::Class(name.into())
    }

    /// Create a parameterized type token
    pub fn parameterized(raw: impl Into<String>, args: Vec<BeanType>) -> Self {
        BeanType::Parameterized {
            raw: raw.into(),
            args,
        }
    }

    /// Create a type variable token with no declared bound
    pub fn variable(name: impl Into<String>) -> Self {
        BeanType::Variable {
            name: name.into(),
            bound: None,
        }
    }

    /// The universal root type token
    pub fn object() -> Self {
        BeanType::Class(OBJECT.to_string())
    }

    /// Raw type name of this token, used for index lookups
    pub fn raw_name(&self) -> &str {
        match self {
            BeanType::Class(name) => name,
            BeanType::Parameterized { raw, .. } => raw,
            BeanType::Wildcard => "?",
            BeanType::Variable { name, .. } => name,
        }
    }

    /// Check if this token is a type variable or wildcard
    pub fn is_unresolved(&self) -> bool {
        match self {
            BeanType::Wildcard | BeanType::Variable { .. } => true,
            BeanType::Class(_) => false,
            BeanType::Parameterized { args, .. } => args.iter().any(BeanType::is_unresolved),
        }
    }

    /// Check whether a required argument position accepts any actual argument.
    ///
    /// Only an unbounded wildcard or a type variable whose sole bound is the
    /// universal root qualifies.
    fn matches_any_argument(&self) -> bool {
        match self {
            BeanType::Wildcard => true,
            BeanType::Variable { bound, .. } => match bound {
                None => true,
                Some(b) => matches!(b.as_ref(), BeanType::Class(name) if name == OBJECT),
            },
            _ => false,
        }
    }

    /// Check whether this bean type satisfies a required injection-point type.
    ///
    /// Raw-to-raw requires identical names. A parameterized bean type
    /// satisfies a raw required type with the same raw name. A parameterized
    /// required type is satisfied only when every argument is structurally
    /// identical, except that a required unbounded wildcard or unbounded
    /// variable argument accepts anything.
    pub fn satisfies(&self, required: &BeanType) -> bool {
        match required {
            BeanType::Class(required_raw) => match self {
                BeanType::Class(raw) => raw == required_raw,
                BeanType::Parameterized { raw, .. } => raw == required_raw,
                _ => false,
            },
            BeanType::Parameterized {
                raw: required_raw,
                args: required_args,
            } => match self {
                BeanType::Parameterized { raw, args } => {
                    raw == required_raw
                        && args.len() == required_args.len()
                        && required_args.iter().zip(args.iter()).all(|(req, actual)| {
                            req.matches_any_argument() || req == actual
                        })
                }
                // A raw bean type satisfies a parameterized required type only
                // when every required argument accepts anything.
                BeanType::Class(raw) => {
                    raw == required_raw
                        && required_args.iter().all(BeanType::matches_any_argument)
                }
                _ => false,
            },
            BeanType::Wildcard => true,
            BeanType::Variable { .. } => required.matches_any_argument(),
        }
    }
}

impl fmt::Display for BeanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BeanType::Class(name) => write!(f, "{}", name),
            BeanType::Parameterized { raw, args } => {
                let rendered: Vec<String> = args.iter().map(|a| a.to_string()).collect();
                write!(f, "{}<{}>", raw, rendered.join(", "))
            }
            BeanType::Wildcard => write!(f, "?"),
            BeanType::Variable { name, bound } => match bound {
                Some(b) => write!(f, "{} extends {}", name, b),
                None => write!(f, "{}", name),
            },
        }
    }
}

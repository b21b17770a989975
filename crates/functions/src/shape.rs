// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! Declared parameter type shapes and their unification with argument types

use polyschema_sql_ir::{DataType, TypeRegistry};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Generic parameter bindings produced by unification
pub type Bindings = BTreeMap<String, DataType>;

/// The declared shape of a parameter or return type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeShape {
    /// A concrete type; arguments must be assignable to it
    Concrete(DataType),

    /// An unconstrained generic parameter
    Generic(String),

    /// A generic parameter whose binding must implement an interface
    Constrained { param: String, interface: String },

    /// An array whose element matches the inner shape
    ArrayOf(Box<TypeShape>),

    /// An array or sequence whose element matches the inner shape
    SequenceOf(Box<TypeShape>),

    /// Any type implementing the interface
    Implements(String),

    /// Any type at all
    Any,
}

/// Match quality of one argument against one shape; higher is better
pub type MatchScore = u32;

const SCORE_EXACT: MatchScore = 3;
const SCORE_WIDENED: MatchScore = 2;
const SCORE_GENERIC: MatchScore = 1;
const SCORE_ANY: MatchScore = 0;

impl TypeShape {
    pub fn concrete(ty: DataType) -> Self {
        TypeShape::Concrete(ty)
    }

    pub fn generic(param: impl Into<String>) -> Self {
        TypeShape::Generic(param.into())
    }

    pub fn constrained(param: impl Into<String>, interface: impl Into<String>) -> Self {
        TypeShape::Constrained {
            param: param.into(),
            interface: interface.into(),
        }
    }

    pub fn array_of(inner: TypeShape) -> Self {
        TypeShape::ArrayOf(Box::new(inner))
    }

    pub fn sequence_of(inner: TypeShape) -> Self {
        TypeShape::SequenceOf(Box::new(inner))
    }

    pub fn implements(interface: impl Into<String>) -> Self {
        TypeShape::Implements(interface.into())
    }

    /// Unify the shape with an actual argument type
    ///
    /// Returns the match score, or `None` when the argument cannot be passed.
    /// Generic parameters are bound in `bindings` on first sight and widened
    /// when a later argument only fits the wider type.
    pub fn unify(
        &self,
        actual: &DataType,
        bindings: &mut Bindings,
        types: &TypeRegistry,
    ) -> Option<MatchScore> {
        let actual_nn = actual.non_nullable();
        match self {
            TypeShape::Concrete(expected) => {
                let expected = expected.non_nullable();
                if actual_nn == expected {
                    Some(SCORE_EXACT)
                } else if types.is_assignable(actual_nn, expected) {
                    Some(SCORE_WIDENED)
                } else {
                    None
                }
            }
            TypeShape::Generic(param) => bind(param, actual_nn, bindings, types),
            TypeShape::Constrained { param, interface } => {
                if matches!(actual_nn, DataType::Null) {
                    return bind(param, actual_nn, bindings, types);
                }
                if !types.implements(actual_nn, interface) {
                    return None;
                }
                bind(param, actual_nn, bindings, types)
            }
            TypeShape::ArrayOf(inner) => match actual_nn {
                DataType::Array(element) => inner.unify(element, bindings, types),
                _ => None,
            },
            TypeShape::SequenceOf(inner) => match actual_nn {
                DataType::Array(element) | DataType::Sequence(element) => {
                    inner.unify(element, bindings, types)
                }
                _ => None,
            },
            TypeShape::Implements(interface) => {
                types.implements(actual_nn, interface).then_some(SCORE_GENERIC)
            }
            TypeShape::Any => Some(SCORE_ANY),
        }
    }

    /// Substitute bindings into the shape
    ///
    /// Unbound generics and open shapes instantiate to `Object`.
    pub fn instantiate(&self, bindings: &Bindings) -> DataType {
        match self {
            TypeShape::Concrete(ty) => ty.clone(),
            TypeShape::Generic(param) | TypeShape::Constrained { param, .. } => {
                bindings.get(param).cloned().unwrap_or(DataType::Object)
            }
            TypeShape::ArrayOf(inner) => DataType::array_of(inner.instantiate(bindings)),
            TypeShape::SequenceOf(inner) => DataType::sequence_of(inner.instantiate(bindings)),
            TypeShape::Implements(_) | TypeShape::Any => DataType::Object,
        }
    }
}

fn bind(
    param: &str,
    actual: &DataType,
    bindings: &mut Bindings,
    types: &TypeRegistry,
) -> Option<MatchScore> {
    // A NULL argument fits any generic without constraining it
    if matches!(actual, DataType::Null) {
        return Some(SCORE_GENERIC);
    }

    match bindings.get(param) {
        None => {
            bindings.insert(param.to_string(), actual.clone());
            Some(SCORE_GENERIC)
        }
        Some(bound) if bound == actual || types.is_assignable(actual, bound) => Some(SCORE_GENERIC),
        Some(bound) if types.is_assignable(bound, actual) => {
            bindings.insert(param.to_string(), actual.clone());
            Some(SCORE_GENERIC)
        }
        Some(_) => None,
    }
}

impl fmt::Display for TypeShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeShape::Concrete(ty) => write!(f, "{}", ty),
            TypeShape::Generic(param) => write!(f, "{}", param),
            TypeShape::Constrained { param, interface } => write!(f, "{}: {}", param, interface),
            TypeShape::ArrayOf(inner) => write!(f, "{}[]", inner),
            TypeShape::SequenceOf(inner) => write!(f, "seq<{}>", inner),
            TypeShape::Implements(interface) => write!(f, "impl {}", interface),
            TypeShape::Any => write!(f, "any"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polyschema_sql_ir::{COMPARABLE_INTERFACE, EntityType, NUMERIC_INTERFACE};

    #[test]
    fn test_concrete_exact_beats_widened() {
        let types = TypeRegistry::new();
        let mut b = Bindings::new();
        let shape = TypeShape::concrete(DataType::Decimal);
        assert_eq!(shape.unify(&DataType::Decimal, &mut b, &types), Some(SCORE_EXACT));
        assert_eq!(shape.unify(&DataType::Int, &mut b, &types), Some(SCORE_WIDENED));
        assert_eq!(shape.unify(&DataType::String, &mut b, &types), None);
    }

    #[test]
    fn test_generic_binds_and_widens() {
        let types = TypeRegistry::new();
        let mut b = Bindings::new();
        let t = TypeShape::generic("T");
        assert!(t.unify(&DataType::Int, &mut b, &types).is_some());
        assert!(t.unify(&DataType::Long, &mut b, &types).is_some());
        assert_eq!(t.instantiate(&b), DataType::Long);
        assert!(t.unify(&DataType::String, &mut b, &types).is_none());
    }

    #[test]
    fn test_element_of_sequence_match() {
        let types = TypeRegistry::new();
        let mut b = Bindings::new();
        let shape = TypeShape::sequence_of(TypeShape::generic("T"));
        let arg = DataType::array_of(DataType::String);
        assert!(shape.unify(&arg, &mut b, &types).is_some());
        assert_eq!(b.get("T"), Some(&DataType::String));
        assert!(TypeShape::array_of(TypeShape::Any)
            .unify(&DataType::sequence_of(DataType::Int), &mut b, &types)
            .is_none());
    }

    #[test]
    fn test_interface_match() {
        let types = TypeRegistry::new()
            .with_entity(EntityType::new("Money").with_interface(NUMERIC_INTERFACE));
        let mut b = Bindings::new();
        let numeric = TypeShape::implements(NUMERIC_INTERFACE);
        assert!(numeric.unify(&DataType::entity("Money"), &mut b, &types).is_some());
        assert!(numeric.unify(&DataType::String, &mut b, &types).is_none());

        let ordered = TypeShape::constrained("T", COMPARABLE_INTERFACE);
        assert!(ordered.unify(&DataType::String.to_nullable(), &mut b, &types).is_some());
        assert_eq!(ordered.instantiate(&b), DataType::String);
    }

    #[test]
    fn test_shape_display() {
        let shape = TypeShape::sequence_of(TypeShape::constrained("T", "Numeric"));
        assert_eq!(shape.to_string(), "seq<T: Numeric>");
    }
}

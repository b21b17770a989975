// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Type model
//!
//! Every resolved expression carries a [`DataType`]. Schemas describe their
//! columns with these types and describe complex (entity) column types in a
//! [`TypeRegistry`], which the resolver consults for property access,
//! assignability checks and common-ancestor computation.
//!
//! ## Nullability
//!
//! Nullability is explicit: `Nullable(Int)` is a different type from `Int`.
//! Outer joins wrap one side's columns in `Nullable`, and CASE expressions
//! with a missing ELSE become nullable. The `Null` type is the type of the
//! `NULL` literal and is assignable to every nullable type.
//!
//! ## Numeric widening
//!
//! Numeric types form a chain `Int < Long < Double < Decimal`. A narrower
//! numeric type is assignable to a wider one, and the common ancestor of two
//! numeric types is the wider of them.
//!
//! ## Entity types
//!
//! Entity types are named, single-inheritance types with properties and a
//! list of implemented interfaces:
//!
//! ```text
//! Entity("Employee") --base--> Entity("Person") --base--> Object
//! ```
//!
//! The common ancestor of `Employee` and `Customer` (both deriving from
//! `Person`) is `Person`; of unrelated types it is `Object`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Interface implemented by every numeric type.
pub const NUMERIC_INTERFACE: &str = "Numeric";

/// Interface implemented by every type with a total order.
pub const COMPARABLE_INTERFACE: &str = "Comparable";

/// A resolved value type
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DataType {
    Boolean,
    Int,
    Long,
    Double,
    Decimal,
    String,
    DateTime,
    Guid,

    /// Root of the type hierarchy
    Object,

    /// Type of the `NULL` literal
    Null,

    /// Fixed-size array of elements
    Array(Box<DataType>),

    /// Lazily produced sequence of elements
    Sequence(Box<DataType>),

    /// Nullable wrapper around a non-nullable type
    Nullable(Box<DataType>),

    /// Named complex type described in a [`TypeRegistry`]
    Entity(String),
}

impl DataType {
    /// Build an entity type reference
    pub fn entity(name: impl Into<String>) -> Self {
        DataType::Entity(name.into())
    }

    /// Build an array type
    pub fn array_of(element: DataType) -> Self {
        DataType::Array(Box::new(element))
    }

    /// Build a sequence type
    pub fn sequence_of(element: DataType) -> Self {
        DataType::Sequence(Box::new(element))
    }

    /// Wrap the type in `Nullable` unless it already admits null
    pub fn to_nullable(self) -> Self {
        match self {
            DataType::Nullable(_) | DataType::Null => self,
            other => DataType::Nullable(Box::new(other)),
        }
    }

    /// Check whether the type admits null
    pub fn is_nullable(&self) -> bool {
        matches!(self, DataType::Nullable(_) | DataType::Null)
    }

    /// The type without its nullable wrapper
    pub fn non_nullable(&self) -> &DataType {
        match self {
            DataType::Nullable(inner) => inner,
            other => other,
        }
    }

    /// Check whether the type is numeric (ignoring nullability)
    pub fn is_numeric(&self) -> bool {
        self.numeric_rank().is_some()
    }

    /// Position of the type in the numeric widening chain
    pub fn numeric_rank(&self) -> Option<u8> {
        match self.non_nullable() {
            DataType::Int => Some(0),
            DataType::Long => Some(1),
            DataType::Double => Some(2),
            DataType::Decimal => Some(3),
            _ => None,
        }
    }

    /// Check whether the type is boolean (ignoring nullability)
    pub fn is_boolean(&self) -> bool {
        matches!(self.non_nullable(), DataType::Boolean)
    }

    /// Check whether the type is a string (ignoring nullability)
    pub fn is_string(&self) -> bool {
        matches!(self.non_nullable(), DataType::String)
    }

    /// Element type of an array or a sequence
    pub fn element_type(&self) -> Option<&DataType> {
        match self.non_nullable() {
            DataType::Array(element) | DataType::Sequence(element) => Some(element),
            _ => None,
        }
    }

    /// Parse a type name as written in a CAST expression
    ///
    /// Accepts the display form produced by this type, case-insensitively,
    /// plus a few common aliases (`bool`, `integer`, `bigint`, `text`).
    pub fn parse(name: &str) -> Result<Self, TypeParseError> {
        let trimmed = name.trim();
        if let Some(inner) = trimmed.strip_suffix('?') {
            return Ok(DataType::parse(inner)?.to_nullable());
        }
        if let Some(inner) = trimmed.strip_suffix("[]") {
            return Ok(DataType::array_of(DataType::parse(inner)?));
        }

        match trimmed.to_lowercase().as_str() {
            "bool" | "boolean" => Ok(DataType::Boolean),
            "int" | "integer" => Ok(DataType::Int),
            "long" | "bigint" => Ok(DataType::Long),
            "double" | "float" => Ok(DataType::Double),
            "decimal" | "numeric" => Ok(DataType::Decimal),
            "string" | "text" | "varchar" => Ok(DataType::String),
            "datetime" | "timestamp" => Ok(DataType::DateTime),
            "guid" | "uuid" => Ok(DataType::Guid),
            "object" => Ok(DataType::Object),
            _ => Err(TypeParseError(name.to_string())),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Boolean => write!(f, "bool"),
            DataType::Int => write!(f, "int"),
            DataType::Long => write!(f, "long"),
            DataType::Double => write!(f, "double"),
            DataType::Decimal => write!(f, "decimal"),
            DataType::String => write!(f, "string"),
            DataType::DateTime => write!(f, "datetime"),
            DataType::Guid => write!(f, "guid"),
            DataType::Object => write!(f, "object"),
            DataType::Null => write!(f, "null"),
            DataType::Array(element) => write!(f, "{}[]", element),
            DataType::Sequence(element) => write!(f, "seq<{}>", element),
            DataType::Nullable(inner) => write!(f, "{}?", inner),
            DataType::Entity(name) => write!(f, "{}", name),
        }
    }
}

/// Error returned when a CAST target type name is not recognised
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown type name: {0}")]
pub struct TypeParseError(pub String);

/// A named property of an entity type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDef {
    pub name: String,
    pub data_type: DataType,
}

impl PropertyDef {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// Description of a complex (entity) type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityType {
    pub name: String,
    pub base: Option<String>,
    pub interfaces: Vec<String>,
    pub properties: Vec<PropertyDef>,
}

impl EntityType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base: None,
            interfaces: Vec::new(),
            properties: Vec::new(),
        }
    }

    /// Set the base type
    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base = Some(base.into());
        self
    }

    /// Add an implemented interface
    pub fn with_interface(mut self, interface: impl Into<String>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    /// Add a property
    pub fn with_property(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        self.properties.push(PropertyDef::new(name, data_type));
        self
    }
}

/// Registry of entity types known to a compilation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeRegistry {
    entities: BTreeMap<String, EntityType>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity type, replacing any previous definition
    pub fn register(&mut self, entity: EntityType) {
        self.entities.insert(entity.name.clone(), entity);
    }

    /// Builder-style variant of [`TypeRegistry::register`]
    pub fn with_entity(mut self, entity: EntityType) -> Self {
        self.register(entity);
        self
    }

    /// Look up an entity type by name
    pub fn entity(&self, name: &str) -> Option<&EntityType> {
        self.entities.get(name)
    }

    /// Find a property on an entity type, searching base types too
    pub fn property(&self, entity: &str, property: &str) -> Option<&DataType> {
        self.lineage(entity)
            .into_iter()
            .flat_map(|e| e.properties.iter())
            .find(|p| p.name == property)
            .map(|p| &p.data_type)
    }

    /// All property names visible on an entity type (own first, then inherited)
    pub fn property_names(&self, entity: &str) -> Vec<String> {
        self.lineage(entity)
            .into_iter()
            .flat_map(|e| e.properties.iter().map(|p| p.name.clone()))
            .collect()
    }

    /// The entity and its base types, nearest first
    fn lineage(&self, entity: &str) -> Vec<&EntityType> {
        let mut chain = Vec::new();
        let mut current = self.entities.get(entity);
        while let Some(e) = current {
            // Guard against accidental cycles in host-provided registries
            if chain.iter().any(|seen: &&EntityType| seen.name == e.name) {
                break;
            }
            chain.push(e);
            current = e.base.as_deref().and_then(|b| self.entities.get(b));
        }
        chain
    }

    /// Check whether `ty` implements `interface`
    pub fn implements(&self, ty: &DataType, interface: &str) -> bool {
        match ty.non_nullable() {
            DataType::Int | DataType::Long | DataType::Double | DataType::Decimal => {
                interface == NUMERIC_INTERFACE || interface == COMPARABLE_INTERFACE
            }
            DataType::String | DataType::DateTime | DataType::Guid | DataType::Boolean => {
                interface == COMPARABLE_INTERFACE
            }
            DataType::Entity(name) => self
                .lineage(name)
                .iter()
                .any(|e| e.interfaces.iter().any(|i| i == interface)),
            _ => false,
        }
    }

    /// Check whether a value of type `from` can be passed where `to` is expected
    pub fn is_assignable(&self, from: &DataType, to: &DataType) -> bool {
        if from == to || matches!(to, DataType::Object) {
            return true;
        }

        match (from, to) {
            (DataType::Null, to) => to.is_nullable() || matches!(to, DataType::Entity(_)),
            (DataType::Nullable(inner_from), DataType::Nullable(inner_to)) => {
                self.is_assignable(inner_from, inner_to)
            }
            (DataType::Nullable(_), _) => false,
            (from, DataType::Nullable(inner_to)) => self.is_assignable(from, inner_to),
            (DataType::Array(a), DataType::Sequence(b)) => a == b,
            (DataType::Entity(from), DataType::Entity(to)) => {
                self.lineage(from).iter().any(|e| &e.name == to)
            }
            (from, to) => match (from.numeric_rank(), to.numeric_rank()) {
                (Some(a), Some(b)) => a <= b,
                _ => false,
            },
        }
    }

    /// Narrowest common ancestor of two non-null types
    ///
    /// Nullability is ignored; callers decide whether the result needs a
    /// nullable wrapper.
    pub fn common_ancestor(&self, a: &DataType, b: &DataType) -> DataType {
        let (a, b) = (a.non_nullable(), b.non_nullable());
        if a == b {
            return a.clone();
        }

        if let (Some(ra), Some(rb)) = (a.numeric_rank(), b.numeric_rank()) {
            return if ra >= rb { a.clone() } else { b.clone() };
        }

        if let DataType::Entity(name) = a {
            for ancestor in self.lineage(name) {
                let candidate = DataType::Entity(ancestor.name.clone());
                if self.is_assignable(b, &candidate) {
                    return candidate;
                }
            }
        }

        DataType::Object
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> TypeRegistry {
        TypeRegistry::new()
            .with_entity(
                EntityType::new("Person")
                    .with_interface(COMPARABLE_INTERFACE)
                    .with_property("Name", DataType::String),
            )
            .with_entity(
                EntityType::new("Employee")
                    .with_base("Person")
                    .with_property("Salary", DataType::Decimal),
            )
            .with_entity(EntityType::new("Customer").with_base("Person"))
            .with_entity(EntityType::new("Invoice"))
    }

    #[test]
    fn test_nullable_wrapping_is_idempotent() {
        let ty = DataType::Int.to_nullable().to_nullable();
        assert_eq!(ty, DataType::Nullable(Box::new(DataType::Int)));
        assert_eq!(DataType::Null.to_nullable(), DataType::Null);
        assert_eq!(ty.non_nullable(), &DataType::Int);
    }

    #[test]
    fn test_numeric_widening() {
        let types = TypeRegistry::new();
        assert!(types.is_assignable(&DataType::Int, &DataType::Decimal));
        assert!(!types.is_assignable(&DataType::Decimal, &DataType::Int));
        assert!(types.is_assignable(&DataType::Int, &DataType::Long.to_nullable()));
        assert!(!types.is_assignable(&DataType::Int.to_nullable(), &DataType::Int));
    }

    #[test]
    fn test_common_ancestor() {
        let types = registry();
        assert_eq!(
            types.common_ancestor(&DataType::Int, &DataType::Double),
            DataType::Double
        );
        assert_eq!(
            types.common_ancestor(&DataType::entity("Employee"), &DataType::entity("Customer")),
            DataType::entity("Person")
        );
        assert_eq!(
            types.common_ancestor(&DataType::entity("Employee"), &DataType::entity("Invoice")),
            DataType::Object
        );
        assert_eq!(
            types.common_ancestor(&DataType::String, &DataType::Int),
            DataType::Object
        );
    }

    #[test]
    fn test_inherited_properties_and_interfaces() {
        let types = registry();
        assert_eq!(
            types.property("Employee", "Name"),
            Some(&DataType::String)
        );
        assert_eq!(
            types.property_names("Employee"),
            vec!["Salary".to_string(), "Name".to_string()]
        );
        assert!(types.implements(&DataType::entity("Employee"), COMPARABLE_INTERFACE));
        assert!(types.implements(&DataType::Long, NUMERIC_INTERFACE));
        assert!(!types.implements(&DataType::String, NUMERIC_INTERFACE));
    }

    #[test]
    fn test_parse_type_names() {
        assert_eq!(DataType::parse("INT"), Ok(DataType::Int));
        assert_eq!(
            DataType::parse("string[]"),
            Ok(DataType::array_of(DataType::String))
        );
        assert_eq!(DataType::parse("decimal?"), Ok(DataType::Decimal.to_nullable()));
        assert!(DataType::parse("blob").is_err());
    }
}

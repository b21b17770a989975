// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Method descriptors
//!
//! A [`MethodDescriptor`] is the static description of one schema-exposed
//! method: its name, its kind, its parameters with their roles and declared
//! type shapes, and its return shape.
//!
//! ## Parameter roles
//!
//! Only [`ParamRole::Ordinary`] parameters are matched against the arguments
//! written in the query. The other roles are supplied by generated code:
//!
//! - `InjectSource`: the current row of the FROM source
//! - `InjectGroup`: the group the current row belongs to
//! - `InjectQueryStats`: per-query statistics (row number and so on)
//! - `AccumulatorName`: the synthesized name of an aggregate accumulator
//!
//! ## Aggregates
//!
//! An aggregate `Name` is a pair of descriptors: the `Name` method that reads
//! the accumulator of a group, and a `SetName` setter that folds one row into
//! it. Both take the group and the accumulator name before their ordinary
//! parameters.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::shape::TypeShape;

/// Kind of a method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MethodKind {
    /// Evaluated once per row
    Scalar,
    /// Reads an aggregate accumulator
    Aggregate,
    /// Updates an aggregate accumulator (`Set<Name>`)
    AggregateSetter,
}

/// Role of a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParamRole {
    Ordinary,
    InjectSource,
    InjectGroup,
    InjectQueryStats,
    AccumulatorName,
}

/// A declared parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub role: ParamRole,
    pub shape: TypeShape,
}

/// Static description of a schema-exposed method
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodDescriptor {
    pub name: String,
    pub kind: MethodKind,
    pub params: Vec<Parameter>,
    pub returns: TypeShape,
    pub description: Option<String>,
}

/// Name of the accumulator setter paired with an aggregate
pub fn setter_name(aggregate: &str) -> String {
    format!("Set{}", aggregate)
}

impl MethodDescriptor {
    fn new(name: impl Into<String>, kind: MethodKind, returns: TypeShape) -> Self {
        Self {
            name: name.into(),
            kind,
            params: Vec::new(),
            returns,
            description: None,
        }
    }

    /// A per-row method
    pub fn scalar(name: impl Into<String>, returns: TypeShape) -> Self {
        Self::new(name, MethodKind::Scalar, returns)
    }

    /// An aggregate reader; group and accumulator-name parameters are added
    pub fn aggregate(name: impl Into<String>, returns: TypeShape) -> Self {
        Self::new(name, MethodKind::Aggregate, returns).with_accumulator_params()
    }

    /// The `Set<Name>` setter of an aggregate
    pub fn setter(aggregate: &str) -> Self {
        Self::new(
            setter_name(aggregate),
            MethodKind::AggregateSetter,
            TypeShape::Any,
        )
        .with_accumulator_params()
    }

    fn with_accumulator_params(self) -> Self {
        self.with_role("group", ParamRole::InjectGroup, TypeShape::Any)
            .with_role("name", ParamRole::AccumulatorName, TypeShape::Any)
    }

    fn with_role(mut self, name: &str, role: ParamRole, shape: TypeShape) -> Self {
        self.params.push(Parameter {
            name: name.to_string(),
            role,
            shape,
        });
        self
    }

    /// Add an ordinary parameter
    pub fn param(self, name: &str, shape: TypeShape) -> Self {
        self.with_role(name, ParamRole::Ordinary, shape)
    }

    /// Add a parameter receiving the current row of the FROM source
    pub fn inject_source(self, shape: TypeShape) -> Self {
        self.with_role("source", ParamRole::InjectSource, shape)
    }

    /// Add a parameter receiving the current group
    pub fn inject_group(self) -> Self {
        self.with_role("group", ParamRole::InjectGroup, TypeShape::Any)
    }

    /// Add a parameter receiving the query statistics
    pub fn inject_stats(self) -> Self {
        self.with_role("stats", ParamRole::InjectQueryStats, TypeShape::Any)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Parameters matched against written arguments
    pub fn ordinary_params(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter().filter(|p| p.role == ParamRole::Ordinary)
    }

    /// Parameter receiving the source row, if any
    pub fn source_param(&self) -> Option<&Parameter> {
        self.params.iter().find(|p| p.role == ParamRole::InjectSource)
    }

    /// Human-readable signature, e.g. `Min(value: T: Comparable) -> T`
    pub fn signature(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, p) in self.ordinary_params().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", p.name, p.shape)?;
        }
        write!(f, ") -> {}", self.returns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polyschema_sql_ir::DataType;

    #[test]
    fn test_aggregate_has_accumulator_params() {
        let count = MethodDescriptor::aggregate("Count", TypeShape::concrete(DataType::Long))
            .param("value", TypeShape::Any);
        let roles: Vec<_> = count.params.iter().map(|p| p.role).collect();
        assert_eq!(
            roles,
            vec![
                ParamRole::InjectGroup,
                ParamRole::AccumulatorName,
                ParamRole::Ordinary
            ]
        );
        assert_eq!(count.ordinary_params().count(), 1);
    }

    #[test]
    fn test_setter_naming() {
        let setter = MethodDescriptor::setter("Count");
        assert_eq!(setter.name, "SetCount");
        assert_eq!(setter.kind, MethodKind::AggregateSetter);
    }

    #[test]
    fn test_signature_lists_ordinary_params_only() {
        let m = MethodDescriptor::scalar("Describe", TypeShape::concrete(DataType::String))
            .inject_source(TypeShape::Any)
            .param("prefix", TypeShape::concrete(DataType::String));
        assert_eq!(m.signature(), "Describe(prefix: string) -> string");
        assert!(m.source_param().is_some());
    }
}

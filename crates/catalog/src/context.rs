// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Runtime context handed to schemas
//!
//! When the resolver asks a schema for the columns of a table it passes a
//! [`RuntimeContext`] describing which columns the query actually uses, and
//! the table arguments as [`ArgValue`]s. Schemas may use both to size the
//! rows they will produce.

use polyschema_sql_ir::{DataType, Literal};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Columns a query reads from one FROM source
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedColumns {
    /// Every column is needed (e.g. `*` was selected)
    pub all: bool,
    /// Names used explicitly
    pub names: BTreeSet<String>,
}

impl RequestedColumns {
    pub fn all() -> Self {
        Self {
            all: true,
            names: BTreeSet::new(),
        }
    }

    pub fn contains(&self, column: &str) -> bool {
        self.all || self.names.contains(column)
    }

    pub fn insert(&mut self, column: impl Into<String>) {
        self.names.insert(column.into());
    }

    pub fn merge(&mut self, other: &RequestedColumns) {
        self.all |= other.all;
        self.names.extend(other.names.iter().cloned());
    }
}

/// Information available to a schema while it describes a table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeContext {
    /// Alias the table is bound to
    pub alias: String,
    /// Columns the query reads from the table
    pub requested_columns: RequestedColumns,
    /// Host-provided environment variables
    pub environment: BTreeMap<String, String>,
}

impl RuntimeContext {
    pub fn new(alias: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            ..Self::default()
        }
    }

    pub fn with_requested_columns(mut self, requested: RequestedColumns) -> Self {
        self.requested_columns = requested;
        self
    }

    pub fn with_environment(mut self, environment: BTreeMap<String, String>) -> Self {
        self.environment = environment;
        self
    }
}

/// A positional table argument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ArgValue {
    /// Known at compile time
    Constant(Literal),
    /// Computed per row (e.g. references a column of the applied-to source)
    Dynamic(DataType),
}

impl ArgValue {
    /// Type of the argument
    pub fn data_type(&self) -> DataType {
        match self {
            ArgValue::Constant(lit) => literal_type(lit),
            ArgValue::Dynamic(ty) => ty.clone(),
        }
    }

    /// The constant value, if known
    pub fn as_constant(&self) -> Option<&Literal> {
        match self {
            ArgValue::Constant(lit) => Some(lit),
            ArgValue::Dynamic(_) => None,
        }
    }
}

/// Type of a literal value
pub fn literal_type(lit: &Literal) -> DataType {
    match lit {
        Literal::Null => DataType::Null,
        Literal::Boolean(_) => DataType::Boolean,
        Literal::Integer(i) if i32::try_from(*i).is_ok() => DataType::Int,
        Literal::Integer(_) => DataType::Long,
        Literal::Float(_) => DataType::Double,
        Literal::String(_) => DataType::String,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requested_columns() {
        let mut requested = RequestedColumns::default();
        requested.insert("Name");
        assert!(requested.contains("Name"));
        assert!(!requested.contains("City"));
        requested.merge(&RequestedColumns::all());
        assert!(requested.contains("City"));
    }

    #[test]
    fn test_literal_types() {
        assert_eq!(literal_type(&Literal::Integer(1)), DataType::Int);
        assert_eq!(literal_type(&Literal::Integer(i64::MAX)), DataType::Long);
        assert_eq!(
            ArgValue::Constant(Literal::String("x".into())).data_type(),
            DataType::String
        );
        assert_eq!(ArgValue::Dynamic(DataType::Guid).data_type(), DataType::Guid);
    }
}

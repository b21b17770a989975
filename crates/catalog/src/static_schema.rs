// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Static Schema
//!
//! This module provides a schema implementation backed by predefined table
//! definitions. Definitions can be built in code or deserialized from
//! JSON/YAML documents.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use polyschema_sql_catalog::{StaticSchema, StaticTable};
//! use polyschema_sql_ir::DataType;
//!
//! let schema = StaticSchema::new("A").with_table(
//!     StaticTable::new("entities")
//!         .with_column("Name", DataType::String)
//!         .with_column("City", DataType::String),
//! );
//! ```

use polyschema_sql_functions::MethodRegistry;
use polyschema_sql_ir::{DataType, SchemaColumn, TypeRegistry};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::context::{ArgValue, RuntimeContext};
use crate::error::{CatalogError, CatalogResult};
use crate::r#trait::Schema;

/// Definition of one table method
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticTable {
    pub method: String,
    #[serde(default)]
    pub parameters: Vec<DataType>,
    pub columns: Vec<StaticColumn>,
    #[serde(default)]
    pub row_type: Option<DataType>,
}

/// Definition of one column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticColumn {
    pub name: String,
    pub data_type: DataType,
}

impl StaticTable {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            parameters: Vec::new(),
            columns: Vec::new(),
            row_type: None,
        }
    }

    pub fn with_column(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        self.columns.push(StaticColumn {
            name: name.into(),
            data_type,
        });
        self
    }

    pub fn with_parameter(mut self, data_type: DataType) -> Self {
        self.parameters.push(data_type);
        self
    }

    pub fn with_row_type(mut self, row_type: DataType) -> Self {
        self.row_type = Some(row_type);
        self
    }

    fn schema_columns(&self) -> Vec<SchemaColumn> {
        self.columns
            .iter()
            .enumerate()
            .map(|(ordinal, c)| SchemaColumn::new(c.name.clone(), ordinal, c.data_type.clone()))
            .collect()
    }
}

/// Serializable form of a [`StaticSchema`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticSchemaDefinition {
    pub name: String,
    pub tables: Vec<StaticTable>,
}

/// Schema with predefined tables
///
/// Table methods are matched case-insensitively. Arguments are checked
/// against the declared parameter types.
#[derive(Debug, Clone)]
pub struct StaticSchema {
    name: String,
    tables: Vec<StaticTable>,
    methods: MethodRegistry,
    types: TypeRegistry,
}

impl StaticSchema {
    /// Create an empty schema exposing the builtin methods
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tables: Vec::new(),
            methods: MethodRegistry::with_builtins(),
            types: TypeRegistry::new(),
        }
    }

    /// Create a schema from a definition document
    pub fn from_definition(definition: StaticSchemaDefinition) -> Self {
        let mut schema = Self::new(definition.name);
        schema.tables = definition.tables;
        schema
    }

    pub fn with_table(mut self, table: StaticTable) -> Self {
        self.tables.push(table);
        self
    }

    /// Replace the method registry
    pub fn with_methods(mut self, methods: MethodRegistry) -> Self {
        self.methods = methods;
        self
    }

    /// Registry used to check argument assignability
    pub fn with_types(mut self, types: TypeRegistry) -> Self {
        self.types = types;
        self
    }

    fn table(&self, method: &str) -> Option<&StaticTable> {
        self.tables
            .iter()
            .find(|t| t.method.eq_ignore_ascii_case(method))
    }

    fn check_arguments(&self, table: &StaticTable, args: &[ArgValue]) -> CatalogResult<()> {
        if table.parameters.len() != args.len() {
            return Err(CatalogError::InvalidArguments {
                method: table.method.clone(),
                reason: format!(
                    "expected {} argument(s), got {}",
                    table.parameters.len(),
                    args.len()
                ),
            });
        }

        for (i, (expected, arg)) in table.parameters.iter().zip(args).enumerate() {
            let actual = arg.data_type();
            if !self.types.is_assignable(&actual, expected) {
                return Err(CatalogError::InvalidArguments {
                    method: table.method.clone(),
                    reason: format!("argument {} is {}, expected {}", i + 1, actual, expected),
                });
            }
        }
        Ok(())
    }
}

impl Schema for StaticSchema {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_table(
        &self,
        method: &str,
        context: &RuntimeContext,
        args: &[ArgValue],
    ) -> CatalogResult<Vec<SchemaColumn>> {
        let table = self
            .table(method)
            .ok_or_else(|| CatalogError::TableNotFound(method.to_string(), self.name.clone()))?;
        self.check_arguments(table, args)?;
        debug!(
            schema = %self.name,
            method,
            alias = %context.alias,
            "Describing static table"
        );
        Ok(table.schema_columns())
    }

    fn row_type(&self, method: &str) -> DataType {
        self.table(method)
            .and_then(|t| t.row_type.clone())
            .unwrap_or(DataType::Object)
    }

    fn table_names(&self) -> Vec<String> {
        self.tables.iter().map(|t| t.method.clone()).collect()
    }

    fn methods(&self) -> &MethodRegistry {
        &self.methods
    }
}

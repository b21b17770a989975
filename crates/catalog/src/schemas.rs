// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Schema catalog
//!
//! The [`SchemaCatalog`] is everything a compilation can see: the registered
//! schemas, the entity types their columns use, host-registered in-memory
//! tables and the builtin method library.

use polyschema_sql_functions::MethodRegistry;
use polyschema_sql_ir::{SchemaColumn, TypeRegistry};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::error::{CatalogError, CatalogResult};
use crate::r#trait::Schema;

/// Named collection of schemas plus shared type information
#[derive(Clone)]
pub struct SchemaCatalog {
    schemas: BTreeMap<String, Arc<dyn Schema>>,
    types: TypeRegistry,
    in_memory: BTreeMap<String, Vec<SchemaColumn>>,
    builtins: MethodRegistry,
    environment: BTreeMap<String, String>,
}

impl SchemaCatalog {
    /// Create an empty catalog with the builtin method library
    pub fn new() -> Self {
        Self {
            schemas: BTreeMap::new(),
            types: TypeRegistry::new(),
            in_memory: BTreeMap::new(),
            builtins: MethodRegistry::with_builtins(),
            environment: BTreeMap::new(),
        }
    }

    fn key(name: &str) -> String {
        name.trim_start_matches('#').to_lowercase()
    }

    /// Register a schema under its own name
    pub fn register_schema(&mut self, schema: Arc<dyn Schema>) {
        debug!(schema = schema.name(), "Registering schema");
        self.schemas.insert(Self::key(schema.name()), schema);
    }

    /// Builder-style variant of [`SchemaCatalog::register_schema`]
    pub fn with_schema(mut self, schema: impl Schema + 'static) -> Self {
        self.register_schema(Arc::new(schema));
        self
    }

    /// Register a host-provided in-memory table
    pub fn with_in_memory_table(mut self, name: impl Into<String>, columns: Vec<SchemaColumn>) -> Self {
        self.in_memory.insert(name.into(), columns);
        self
    }

    pub fn with_types(mut self, types: TypeRegistry) -> Self {
        self.types = types;
        self
    }

    pub fn with_environment(mut self, environment: BTreeMap<String, String>) -> Self {
        self.environment = environment;
        self
    }

    /// Look up a schema; the leading `#` and letter case are ignored
    pub fn schema(&self, name: &str) -> Option<&Arc<dyn Schema>> {
        self.schemas.get(&Self::key(name))
    }

    /// Look up a schema, failing with `SchemaNotFound`
    pub fn require_schema(&self, name: &str) -> CatalogResult<&Arc<dyn Schema>> {
        self.schema(name)
            .ok_or_else(|| CatalogError::SchemaNotFound(name.to_string()))
    }

    /// Names of the registered schemas as they declare them
    pub fn schema_names(&self) -> Vec<String> {
        self.schemas.values().map(|s| s.name().to_string()).collect()
    }

    /// Columns of a host-registered in-memory table
    pub fn in_memory_table(&self, name: &str) -> Option<&[SchemaColumn]> {
        self.in_memory.get(name).map(Vec::as_slice)
    }

    pub fn in_memory_table_names(&self) -> Vec<String> {
        self.in_memory.keys().cloned().collect()
    }

    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    /// Methods available regardless of schema
    pub fn builtins(&self) -> &MethodRegistry {
        &self.builtins
    }

    pub fn environment(&self) -> &BTreeMap<String, String> {
        &self.environment
    }
}

impl Default for SchemaCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SchemaCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaCatalog")
            .field("schemas", &self.schema_names())
            .field("in_memory", &self.in_memory_table_names())
            .finish()
    }
}

// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Schema trait for pluggable data sources
//!
//! This module defines the synchronous Schema trait the resolver calls to
//! describe tables and to resolve methods.

use polyschema_sql_functions::{AggregateResolution, MethodRegistry, ResolvedMethod};
use polyschema_sql_ir::{DataType, SchemaColumn, TypeRegistry};

use crate::context::{ArgValue, RuntimeContext};
use crate::error::CatalogResult;

/// Schema trait for pluggable data sources
///
/// A schema exposes table methods (`#schema.method(args)`) and the methods
/// callable on their rows. Implementations can wrap files, services or
/// in-process collections; the compiler only sees column metadata and
/// method descriptors.
///
/// # Examples
///
/// ```rust,ignore
/// use polyschema_sql_catalog::{ArgValue, RuntimeContext, Schema};
///
/// fn column_names(schema: &dyn Schema) -> Vec<String> {
///     schema
///         .get_table("entities", &RuntimeContext::new("a"), &[])
///         .map(|cols| cols.into_iter().map(|c| c.name).collect())
///         .unwrap_or_default()
/// }
/// ```
pub trait Schema: Send + Sync {
    /// Name of the schema, as written after `#` in queries
    fn name(&self) -> &str;

    /// Describe the columns produced by a table method
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::TableNotFound` if the method doesn't exist.
    /// Returns `CatalogError::InvalidArguments` if the arguments don't fit.
    fn get_table(
        &self,
        method: &str,
        context: &RuntimeContext,
        args: &[ArgValue],
    ) -> CatalogResult<Vec<SchemaColumn>>;

    /// Type of the rows produced by a table method
    ///
    /// This is the value injected into methods declaring a source parameter.
    fn row_type(&self, _method: &str) -> DataType {
        DataType::Object
    }

    /// Names of the table methods, used for suggestions
    fn table_names(&self) -> Vec<String> {
        Vec::new()
    }

    /// Methods callable on rows of this schema
    fn methods(&self) -> &MethodRegistry;

    /// Resolve an ordinary method against the current source row type
    fn resolve_method(
        &self,
        name: &str,
        args: &[DataType],
        source: Option<&DataType>,
        types: &TypeRegistry,
    ) -> Option<ResolvedMethod> {
        self.methods().resolve_method(name, args, source, types)
    }

    /// Resolve an aggregate and its accumulator setter
    fn resolve_aggregate(
        &self,
        name: &str,
        args: &[DataType],
        types: &TypeRegistry,
    ) -> Option<AggregateResolution> {
        self.methods().resolve_aggregate(name, args, types)
    }

    /// Resolve a method without automatic source injection
    fn resolve_raw_method(
        &self,
        name: &str,
        args: &[DataType],
        types: &TypeRegistry,
    ) -> Option<ResolvedMethod> {
        self.methods().resolve_raw_method(name, args, types)
    }
}

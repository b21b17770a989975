// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Polyschema SQL - Catalog Layer
//!
//! This crate provides the schema provider abstraction of the compiler.
//! It defines the `Schema` trait and the collection types used for:
//!
//! - **Table description**: the columns a table method produces, given the
//!   columns the query requests and the table arguments
//! - **Method resolution**: ordinary, aggregate and raw (non-source-injecting)
//!   methods, delegated to each schema's method registry
//! - **Static schemas**: tables declared in code or in YAML/JSON documents
//!
//! ## Architecture
//!
//! The resolver only talks to a [`SchemaCatalog`]. It looks schemas up by
//! name, calls [`Schema::get_table`] once per FROM source and asks the same
//! schema to resolve the methods called against that source.
//!
//! ## Implementing the Schema Trait
//!
//! ```rust,ignore
//! use polyschema_sql_catalog::{ArgValue, CatalogResult, RuntimeContext, Schema};
//! use polyschema_sql_functions::MethodRegistry;
//! use polyschema_sql_ir::{DataType, SchemaColumn};
//!
//! struct Processes {
//!     methods: MethodRegistry,
//! }
//!
//! impl Schema for Processes {
//!     fn name(&self) -> &str {
//!         "proc"
//!     }
//!
//!     fn get_table(
//!         &self,
//!         _method: &str,
//!         _context: &RuntimeContext,
//!         _args: &[ArgValue],
//!     ) -> CatalogResult<Vec<SchemaColumn>> {
//!         Ok(vec![SchemaColumn::new("Pid", 0, DataType::Int)])
//!     }
//!
//!     fn methods(&self) -> &MethodRegistry {
//!         &self.methods
//!     }
//! }
//! ```

pub mod context;
pub mod error;
pub mod schemas;
pub mod static_schema;
pub mod r#trait;

// Re-exports
pub use context::{ArgValue, RequestedColumns, RuntimeContext, literal_type};
pub use error::{CatalogError, CatalogResult};
pub use static_schema::{StaticColumn, StaticSchema, StaticSchemaDefinition, StaticTable};
pub use r#trait::Schema;
pub use schemas::SchemaCatalog;

// Re-export metadata types from ir for convenience
pub use polyschema_sql_ir::{DataType, SchemaColumn, TypeRegistry};

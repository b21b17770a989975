// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Polyschema SQL - Intermediate Representation
//!
//! This crate provides the input tree of the compiler and its type model.
//! The IR is designed to:
//! - Be a closed set of node kinds, matched exhaustively by every pass
//! - Carry no schema-dependent information (that is added by resolution)
//! - Describe value types, including entity types and nullability
//! - Describe the columns a schema table produces

pub mod expr;
pub mod metadata;
pub mod query;
pub mod types;

// Re-export commonly used types
pub use expr::{BinaryOp, ColumnRef, Expr, Literal, UnaryOp};
pub use metadata::{SchemaColumn, columns, find_column};
pub use query::{
    ApplyType, CommonTableExpr, FromSource, JoinType, OrderBy, Query, SelectItem,
    SelectStatement, SetOp, SortDirection,
};
pub use types::{
    COMPARABLE_INTERFACE, DataType, EntityType, NUMERIC_INTERFACE, PropertyDef, TypeParseError,
    TypeRegistry,
};

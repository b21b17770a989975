// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Method Registry
//!
//! This crate provides the static registry of methods callable from queries.
//!
//! ## Features
//!
//! - Method descriptors with parameter roles (ordinary, injected source,
//!   injected group, injected query statistics)
//! - Generic instantiation by unifying declared type shapes with argument
//!   types, entirely at compile time
//! - Aggregate resolution paired with the `Set<Name>` accumulator setter
//! - A builtin library shared by all schemas
//!
//! ## Usage
//!
//! ```rust,ignore
//! use polyschema_sql_functions::MethodRegistry;
//! use polyschema_sql_ir::{DataType, TypeRegistry};
//!
//! let registry = MethodRegistry::with_builtins();
//! let count = registry.resolve_aggregate("Count", &[DataType::String], &TypeRegistry::new());
//! assert!(count.is_some());
//! ```

pub mod builtin;
pub mod descriptor;
pub mod registry;
pub mod shape;

pub use descriptor::{MethodDescriptor, MethodKind, ParamRole, Parameter, setter_name};
pub use registry::{AggregateResolution, MethodRegistry, ResolvedMethod};
pub use shape::{Bindings, MatchScore, TypeShape};

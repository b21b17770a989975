// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Polyschema SQL - Lowering Layer
//!
//! This crate turns a bound query into a [`Plan`]: an ordered list of
//! primitive materialization steps standing in for joins, applies, GROUP BY
//! and set operators.
//!
//! ## Overview
//!
//! The lowering layer is responsible for:
//! - Flattening join/apply chains into pairwise nested loops over transition
//!   tables trimmed to the columns read downstream
//! - Padding the preserved side of outer joins with typed nulls
//! - Splitting grouped queries into an aggregation phase and a projection
//!   phase over the grouping table
//! - Realizing UNION, INTERSECT and EXCEPT with key-matched appends
//! - Lowering CTEs in declaration order and exposing them by name
//!
//! ## Lowering Process
//!
//! ```text
//! Query -> Semantic Analysis -> BoundQuery + ScopeManager -> Lowering -> Plan
//! ```
//!
//! Lowering either returns a complete plan or an error; there is no partial
//! result.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use polyschema_sql_lowering::{LoweringConfig, lower};
//! use polyschema_sql_semantic::{AnalyzerConfig, SemanticAnalyzer};
//!
//! let mut analysis = SemanticAnalyzer::new(&catalog, AnalyzerConfig::default()).analyze(&query)?;
//! let plan = lower(&mut analysis.scopes, &analysis.query, &LoweringConfig::default())?;
//!
//! for node in &plan.nodes {
//!     println!("{}", node);
//! }
//! println!("rows in {}", plan.result);
//! ```

pub mod columns;
pub mod context;
pub mod engine;
pub mod error;
mod group;
mod join;
pub mod plan;
mod set_ops;

pub use context::{DEFAULT_MAX_DEPTH, DEFAULT_TABLE_PREFIX, LoweringConfig, LoweringContext};
pub use engine::{Destination, LoweringEngine, TRANSITION_TABLE_ATTRIBUTE, lower};
pub use error::{LoweringError, LoweringResult};
pub use plan::{
    AggregateStep, JoinSide, LoopKind, NestedLoop, Padding, Plan, PlanNode, PopulateStep, Presence,
    ScanSource, SetMatchStep,
};

// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details
//
//! # Polyschema SQL - Semantic Analysis Layer
//!
//! This crate resolves names and types of a query and produces the bound
//! tree consumed by plan lowering.
//!
//! ## Overview
//!
//! Semantic analysis builds on the IR layer to provide:
//! - **Scope management**: one scope per query block, CTE, set operator and
//!   nested query
//! - **Symbol resolution**: FROM aliases, compound join symbols, columns and
//!   entity properties
//! - **Type checking**: operand types, conditions, set-operator compatibility
//! - **Method resolution**: aggregates, source-injecting and raw methods,
//!   looked up in schemas first and in the builtin library second
//!
//! ## Core Concepts
//!
//! ### Scopes
//!
//! A [`Scope`] is a lexical context where aliases are visible. Scopes form a
//! tree; lookups walk from a scope to the root.
//!
//! ```rust
//! use polyschema_sql_semantic::{ScopeManager, ScopeType, Symbol, TableSource, TableSymbol};
//!
//! let mut manager = ScopeManager::new();
//! let root = manager.enter_scope(ScopeType::Query, "Query");
//! let table = TableSymbol::new("a", TableSource::Subquery, vec![]);
//! manager.add_symbol(root, "a", Symbol::Table(table)).unwrap();
//!
//! let operand = manager.enter_scope(ScopeType::Query, "Query");
//! assert!(manager.resolve::<TableSymbol>("a", operand).is_ok());
//! ```
//!
//! ### Symbols
//!
//! [`TableSymbol`] describes a FROM source. A join produces a compound symbol
//! listing its constituent aliases. [`RefreshMethodsSymbol`] collects the
//! accumulator updates a grouped query performs per row.
//!
//! ### Analysis
//!
//! [`SemanticAnalyzer::analyze`] returns an [`Analysis`]: the [`BoundQuery`]
//! and the [`ScopeManager`] it was bound in.

pub mod analyzer;
pub mod bound;
pub mod error;
pub mod expr;
pub mod resolution;
pub mod scope;
pub mod symbol;
pub mod usage;

// Re-export commonly used types
pub use analyzer::{AnalyzerConfig, SemanticAnalyzer, cte_key};
pub use bound::{
    AggregateCall, Analysis, BoundBody, BoundCte, BoundExpr, BoundExprKind, BoundField,
    BoundFrom, BoundOrderBy, BoundQuery, BoundSelect, BoundSetOperation, Grouping,
    InMemoryOrigin, MethodCall, RefreshCall, SetOperator,
};
pub use error::{ErrorKind, SemanticError, SemanticResult};
pub use expr::as_predicate;
pub use resolution::{MatchKind, ResolutionConfig, Suggestion, levenshtein_distance, soundex};
pub use scope::{Scope, ScopeId, ScopeManager, ScopeType};
pub use symbol::{RefreshMethodsSymbol, Symbol, SymbolKind, TableSource, TableSymbol, refresh_key};
pub use usage::ColumnUsage;

// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! Error types for the lowering layer
//!
//! Lowering runs on a tree the resolver already accepted, so these errors
//! mostly signal a bound tree and symbol table that disagree. Every error
//! aborts the lowering; no partial plan is returned.

use polyschema_sql_semantic::SemanticError;
use serde::Serialize;

/// Result type alias for lowering operations
pub type LoweringResult<T> = Result<T, LoweringError>;

/// Errors that can occur while lowering a bound query into a plan
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq, Serialize)]
pub enum LoweringError {
    /// Symbol lookup failed while lowering
    #[error("Symbol table error: {0}")]
    Symbol(String),

    /// A column references an alias that is not part of the FROM clause
    #[error("Column '{column}' references alias '{alias}' outside the FROM clause")]
    DetachedColumn { alias: String, column: String },

    /// Construct the lowering engine has no plan for
    #[error("Unsupported construct: {0}")]
    UnsupportedConstruct(String),

    /// Recursion limit exceeded (e.g., deeply nested subqueries)
    #[error("Recursion limit exceeded: {context} (depth: {depth}, limit: {limit})")]
    RecursionLimitExceeded {
        context: String,
        depth: usize,
        limit: usize,
    },
}

impl From<SemanticError> for LoweringError {
    fn from(err: SemanticError) -> Self {
        LoweringError::Symbol(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_detached_column() {
        let err = LoweringError::DetachedColumn {
            alias: "x".to_string(),
            column: "Name".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("'Name'"));
        assert!(msg.contains("'x'"));
    }

    #[test]
    fn test_symbol_errors_convert() {
        let err: LoweringError = SemanticError::AliasAlreadyUsed("a".to_string()).into();
        assert_eq!(
            err,
            LoweringError::Symbol("Alias 'a' is already used".to_string())
        );
    }

    #[test]
    fn test_error_serialization() {
        let err = LoweringError::RecursionLimitExceeded {
            context: "query lowering".to_string(),
            depth: 65,
            limit: 64,
        };
        let json = serde_json::to_string(&err);
        assert!(json.is_ok());
    }
}

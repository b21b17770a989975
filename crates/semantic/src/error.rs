// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details
//
//! # Error types for semantic analysis
//!
//! This module defines error types used throughout the resolver. Every error
//! is terminal for the compile. Unknown-name errors carry the near misses
//! found among the valid candidates.

use polyschema_sql_catalog::CatalogError;
use serde::Serialize;
use thiserror::Error;

/// Result type alias for semantic operations
pub type SemanticResult<T> = Result<T, SemanticError>;

/// Broad classification of a [`SemanticError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    /// Unknown or duplicated names
    Resolution,
    /// No method matches a call
    MethodResolution,
    /// Malformed set operator
    SetOperator,
    /// Malformed or unsupported query structure
    Structural,
    /// Failure reported by a schema
    Schema,
}

fn did_you_mean(suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        String::new()
    } else {
        format!(". Did you mean: {}?", suggestions.join(", "))
    }
}

/// Errors that can occur during semantic analysis
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SemanticError {
    /// Identifier is neither a column of the active source nor an alias
    #[error("Unknown column or alias '{name}'{}", did_you_mean(.suggestions))]
    UnknownColumnOrAlias {
        name: String,
        suggestions: Vec<String>,
    },

    /// Property not defined on an entity type
    #[error("Type '{type_name}' has no property '{property}'{}", did_you_mean(.suggestions))]
    UnknownProperty {
        property: String,
        type_name: String,
        suggestions: Vec<String>,
    },

    /// Alias already bound in the visible scope chain
    #[error("Alias '{0}' is already used")]
    AliasAlreadyUsed(String),

    /// CTE or in-memory table reference without a definition
    #[error("Table '{name}' is not defined{}", did_you_mean(.suggestions))]
    TableNotDefined {
        name: String,
        suggestions: Vec<String>,
    },

    /// Schema not registered in the catalog
    #[error("Schema '{name}' is not registered{}", did_you_mean(.suggestions))]
    UnknownSchema {
        name: String,
        suggestions: Vec<String>,
    },

    /// Unknown type name in a CAST
    #[error("Unknown type '{0}'")]
    UnknownType(String),

    /// Column found in several sources of a join
    #[error("Ambiguous column reference: {0} (found in {1:?})")]
    AmbiguousColumn(String, Vec<String>),

    /// No method matches the name and argument types
    #[error("Method '{name}({})' not found{}", .args.join(", "), did_you_mean(.suggestions))]
    MethodNotFound {
        name: String,
        args: Vec<String>,
        suggestions: Vec<String>,
    },

    /// Aggregate used in a clause evaluated per row
    #[error("Aggregate '{name}' cannot be used in {clause}")]
    AggregateNotAllowed { name: String, clause: String },

    /// Set operator declared without key columns
    #[error("{operator} must have key columns")]
    SetOperatorMustHaveKeyColumns { operator: String },

    /// Operands of a set operator project a different number of fields
    #[error("Set operator operands must have the same quantity of columns: left has {left}, right has {right}")]
    SetOperatorMustHaveSameQuantityOfColumns { left: usize, right: usize },

    /// Operands of a set operator project different field types
    #[error("Set operator operands must have the same types of columns: column {index} is {left} on the left and {right} on the right")]
    SetOperatorMustHaveSameTypesOfColumns {
        index: usize,
        left: String,
        right: String,
    },

    /// Key column is not a field of the left operand
    #[error("Key column '{key}' is not a column of the set operator{}", did_you_mean(.suggestions))]
    SetOperatorKeyColumnNotFound {
        key: String,
        suggestions: Vec<String>,
    },

    /// CTE column list length mismatch
    #[error("CTE '{cte}' defines {defined} columns but query returns {returned} columns")]
    CteColumnCountMismatch {
        cte: String,
        defined: usize,
        returned: usize,
    },

    /// Symbol bound to an alias has an unexpected kind
    #[error("Symbol '{alias}' is not a {expected}")]
    UnexpectedSymbolKind { alias: String, expected: String },

    /// Query without a FROM clause
    #[error("Query has no FROM clause")]
    NullFrom,

    /// Field link outside the GROUP BY list
    #[error("Field link ::{index} is out of range, GROUP BY has {count} expressions")]
    FieldLinkIndexOutOfRange { index: usize, count: usize },

    /// Construct not allowed where it appears
    #[error("Unsupported construct: {0}")]
    UnsupportedConstruct(String),

    /// Operator applied to incompatible operand types
    #[error("Operator '{op}' cannot be applied to {left} and {right}")]
    InvalidOperandTypes {
        op: String,
        left: String,
        right: String,
    },

    /// Condition that is not boolean
    #[error("{clause} condition must be boolean, found {found}")]
    ExpectedBoolean { clause: String, found: String },

    /// Column used outside an aggregate in a grouped query
    #[error("Column '{0}' must appear in GROUP BY or be used in an aggregate")]
    ColumnMustBeGrouped(String),

    /// Failure reported by a schema
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Invalid scope reference (e.g., non-existent parent)
    #[error("Invalid scope reference: {0}")]
    InvalidScope(String),
}

impl SemanticError {
    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            SemanticError::UnknownColumnOrAlias { .. }
            | SemanticError::UnknownProperty { .. }
            | SemanticError::AliasAlreadyUsed(_)
            | SemanticError::TableNotDefined { .. }
            | SemanticError::UnknownSchema { .. }
            | SemanticError::UnknownType(_)
            | SemanticError::AmbiguousColumn(..)
            | SemanticError::UnexpectedSymbolKind { .. } => ErrorKind::Resolution,
            SemanticError::MethodNotFound { .. } => ErrorKind::MethodResolution,
            SemanticError::SetOperatorMustHaveKeyColumns { .. }
            | SemanticError::SetOperatorMustHaveSameQuantityOfColumns { .. }
            | SemanticError::SetOperatorMustHaveSameTypesOfColumns { .. }
            | SemanticError::SetOperatorKeyColumnNotFound { .. } => ErrorKind::SetOperator,
            SemanticError::AggregateNotAllowed { .. }
            | SemanticError::CteColumnCountMismatch { .. }
            | SemanticError::NullFrom
            | SemanticError::FieldLinkIndexOutOfRange { .. }
            | SemanticError::UnsupportedConstruct(_)
            | SemanticError::InvalidOperandTypes { .. }
            | SemanticError::ExpectedBoolean { .. }
            | SemanticError::ColumnMustBeGrouped(_)
            | SemanticError::InvalidScope(_) => ErrorKind::Structural,
            SemanticError::Catalog(_) => ErrorKind::Schema,
        }
    }

    /// Near-miss suggestions attached to the error
    pub fn suggestions(&self) -> &[String] {
        match self {
            SemanticError::UnknownColumnOrAlias { suggestions, .. }
            | SemanticError::UnknownProperty { suggestions, .. }
            | SemanticError::TableNotDefined { suggestions, .. }
            | SemanticError::UnknownSchema { suggestions, .. }
            | SemanticError::MethodNotFound { suggestions, .. }
            | SemanticError::SetOperatorKeyColumnNotFound { suggestions, .. } => suggestions,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_with_suggestions() {
        let err = SemanticError::UnknownColumnOrAlias {
            name: "Nme".to_string(),
            suggestions: vec!["Name".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Unknown column or alias 'Nme'. Did you mean: Name?"
        );
        assert_eq!(err.kind(), ErrorKind::Resolution);
        assert_eq!(err.suggestions(), ["Name".to_string()]);
    }

    #[test]
    fn test_error_display_without_suggestions() {
        let err = SemanticError::TableNotDefined {
            name: "recent".to_string(),
            suggestions: Vec::new(),
        };
        assert_eq!(err.to_string(), "Table 'recent' is not defined");
    }

    #[test]
    fn test_method_not_found_lists_argument_types() {
        let err = SemanticError::MethodNotFound {
            name: "ToUpper".to_string(),
            args: vec!["int".to_string(), "string".to_string()],
            suggestions: Vec::new(),
        };
        assert_eq!(err.to_string(), "Method 'ToUpper(int, string)' not found");
        assert_eq!(err.kind(), ErrorKind::MethodResolution);
    }

    #[test]
    fn test_set_operator_errors() {
        let err = SemanticError::SetOperatorMustHaveSameQuantityOfColumns { left: 2, right: 3 };
        let msg = err.to_string();
        assert!(msg.contains("left has 2"));
        assert!(msg.contains("right has 3"));
        assert_eq!(err.kind(), ErrorKind::SetOperator);
    }

    #[test]
    fn test_catalog_errors_are_transparent() {
        let err: SemanticError =
            CatalogError::TableNotFound("orders".to_string(), "B".to_string()).into();
        assert_eq!(err.to_string(), "Table 'orders' not found in schema 'B'");
        assert_eq!(err.kind(), ErrorKind::Schema);
    }
}

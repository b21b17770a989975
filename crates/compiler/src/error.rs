// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! Error types of the compiler pipeline

use polyschema_sql_lowering::LoweringError;
use polyschema_sql_semantic::{ErrorKind, SemanticError};

use crate::config::ConfigError;

/// Result type alias for compilation
pub type CompileResult<T> = Result<T, CompileError>;

/// Errors that abort a compilation
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    /// The query does not resolve against the catalog
    #[error(transparent)]
    Semantic(#[from] SemanticError),

    /// The bound query could not be lowered into a plan
    #[error(transparent)]
    Lowering(#[from] LoweringError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl CompileError {
    /// Classification of a resolution failure, if this is one
    pub fn semantic_kind(&self) -> Option<ErrorKind> {
        match self {
            CompileError::Semantic(err) => Some(err.kind()),
            _ => None,
        }
    }
}

// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Polyschema SQL - Compiler
//!
//! Front door of the query compiler. A [`Compiler`] owns a schema catalog
//! and a configuration; each call to [`Compiler::compile`] resolves one query
//! against the catalog and lowers it into a [`Plan`].
//!
//! ## Pipeline
//!
//! ```text
//! Query --analyze--> BoundQuery + ScopeManager --lower--> Plan
//! ```
//!
//! Both stages fail fast: the first error aborts the compilation and no plan
//! is produced.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use polyschema_sql_compiler::{Compiler, CompilerConfig, logging};
//!
//! let config = CompilerConfig::from_yaml(&std::fs::read_to_string("compiler.yaml")?)?;
//! logging::init_from_config(&config)?;
//!
//! let compiler = Compiler::new(catalog, config);
//! let compiled = compiler.compile(&query)?;
//! println!("{}", compiled.plan);
//! ```
//!
//! A compiler holds no per-query state, so one instance may compile any
//! number of queries, from several threads when the catalog allows it.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{CompilerConfig, ConfigError, DEFAULT_LOG_FILTER};
pub use error::{CompileError, CompileResult};

pub use polyschema_sql_catalog::SchemaCatalog;
pub use polyschema_sql_ir::Query;
pub use polyschema_sql_lowering::{Plan, PlanNode};
pub use polyschema_sql_semantic::{BoundQuery, ScopeManager};

use polyschema_sql_lowering::lower;
use polyschema_sql_semantic::{Analysis, SemanticAnalyzer};
use tracing::{debug, instrument};

/// Output of a successful compilation
#[derive(Debug)]
pub struct CompiledQuery {
    /// Materialization steps in execution order
    pub plan: Plan,
    /// Resolved query the plan was lowered from
    pub tree: BoundQuery,
    /// Symbol table, annotated with the transition table of every query
    pub scopes: ScopeManager,
}

/// Query compiler bound to one catalog
#[derive(Debug, Clone)]
pub struct Compiler {
    catalog: SchemaCatalog,
    config: CompilerConfig,
}

impl Compiler {
    pub fn new(catalog: SchemaCatalog, config: CompilerConfig) -> Self {
        Self { catalog, config }
    }

    /// Create a compiler after validating its configuration
    pub fn try_new(catalog: SchemaCatalog, config: CompilerConfig) -> CompileResult<Self> {
        config.validate()?;
        Ok(Self::new(catalog, config))
    }

    pub fn catalog(&self) -> &SchemaCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Resolve `query` and lower it into a plan
    #[instrument(skip_all)]
    pub fn compile(&self, query: &Query) -> CompileResult<CompiledQuery> {
        let Analysis {
            query: tree,
            mut scopes,
        } = SemanticAnalyzer::new(&self.catalog, self.config.analyzer.clone()).analyze(query)?;
        debug!(fields = tree.output.len(), "Query resolved");

        let plan = lower(&mut scopes, &tree, &self.config.lowering)?;
        debug!(steps = plan.nodes.len(), result = %plan.result, "Query lowered");

        Ok(CompiledQuery { plan, tree, scopes })
    }
}

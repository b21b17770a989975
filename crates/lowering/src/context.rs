// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! Lowering context for tracking state while a plan is emitted

use serde::{Deserialize, Serialize};

use crate::error::LoweringError;
use crate::plan::PlanNode;

/// Default prefix of generated transition table names
pub const DEFAULT_TABLE_PREFIX: &str = "__t";

/// Default maximum nesting depth of queries
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Tunables of the lowering engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoweringConfig {
    /// Prefix of generated transition table names
    pub transition_table_prefix: String,
    /// Maximum nesting depth of subqueries, CTEs and set operands
    pub max_depth: usize,
}

impl Default for LoweringConfig {
    fn default() -> Self {
        Self {
            transition_table_prefix: DEFAULT_TABLE_PREFIX.to_string(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Context for tracking state during lowering
///
/// The context maintains:
/// - The emitted nodes, in execution order
/// - A counter for generating unique transition table names
/// - Recursion depth tracking
pub struct LoweringContext {
    config: LoweringConfig,

    /// Nodes emitted so far
    nodes: Vec<PlanNode>,

    /// Counter for generating unique table names
    table_counter: usize,

    /// Current recursion depth
    recursion_depth: usize,
}

impl LoweringContext {
    /// Create a new lowering context
    pub fn new(config: LoweringConfig) -> Self {
        Self {
            config,
            nodes: Vec::new(),
            table_counter: 0,
            recursion_depth: 0,
        }
    }

    pub fn config(&self) -> &LoweringConfig {
        &self.config
    }

    /// Generate a fresh transition table name
    ///
    /// Names are `{prefix}{n}_{role}`, unique within one lowering.
    pub fn next_table(&mut self, role: &str) -> String {
        let name = format!(
            "{}{}_{}",
            self.config.transition_table_prefix, self.table_counter, role
        );
        self.table_counter += 1;
        name
    }

    /// Append a node to the plan
    pub fn emit(&mut self, node: PlanNode) {
        tracing::trace!(node = %node, "Emitting plan node");
        self.nodes.push(node);
    }

    pub fn nodes(&self) -> &[PlanNode] {
        &self.nodes
    }

    /// Consume the context, returning the emitted nodes
    pub fn into_nodes(self) -> Vec<PlanNode> {
        self.nodes
    }

    /// Increment recursion depth and check for overflow
    pub fn enter_recursive_context(&mut self, context: &str) -> Result<(), LoweringError> {
        self.recursion_depth += 1;
        if self.recursion_depth > self.config.max_depth {
            Err(LoweringError::RecursionLimitExceeded {
                context: context.to_string(),
                depth: self.recursion_depth,
                limit: self.config.max_depth,
            })
        } else {
            Ok(())
        }
    }

    /// Decrement recursion depth when exiting a recursive context
    pub fn exit_recursive_context(&mut self) {
        self.recursion_depth = self.recursion_depth.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_name_generation() {
        let mut ctx = LoweringContext::new(LoweringConfig::default());

        assert_eq!(ctx.next_table("select"), "__t0_select");
        assert_eq!(ctx.next_table("group"), "__t1_group");
    }

    #[test]
    fn test_custom_prefix() {
        let config = LoweringConfig {
            transition_table_prefix: "tmp".to_string(),
            ..LoweringConfig::default()
        };
        let mut ctx = LoweringContext::new(config);
        assert_eq!(ctx.next_table("join"), "tmp0_join");
    }

    #[test]
    fn test_emit_keeps_order() {
        let mut ctx = LoweringContext::new(LoweringConfig::default());
        ctx.emit(PlanNode::Rename {
            from: "a".to_string(),
            to: "b".to_string(),
        });
        ctx.emit(PlanNode::Rename {
            from: "b".to_string(),
            to: "c".to_string(),
        });

        let targets: Vec<&str> = ctx.nodes().iter().map(PlanNode::target).collect();
        assert_eq!(targets, vec!["b", "c"]);
        assert_eq!(ctx.into_nodes().len(), 2);
    }

    #[test]
    fn test_recursion_tracking() {
        let mut ctx = LoweringContext::new(LoweringConfig::default());

        ctx.enter_recursive_context("query").unwrap();
        assert_eq!(ctx.recursion_depth, 1);

        ctx.exit_recursive_context();
        assert_eq!(ctx.recursion_depth, 0);
    }

    #[test]
    fn test_recursion_limit() {
        let config = LoweringConfig {
            max_depth: 5,
            ..LoweringConfig::default()
        };
        let mut ctx = LoweringContext::new(config);

        // Should succeed up to the limit
        for _ in 0..5 {
            ctx.enter_recursive_context("query").unwrap();
        }

        // Exceeds limit
        let result = ctx.enter_recursive_context("query");
        assert_eq!(
            result,
            Err(LoweringError::RecursionLimitExceeded {
                context: "query".to_string(),
                depth: 6,
                limit: 5,
            })
        );
    }

    #[test]
    fn test_config_from_json() {
        let config: LoweringConfig =
            serde_json::from_str(r#"{"transitionTablePrefix": "x"}"#).unwrap();
        assert_eq!(config.transition_table_prefix, "x");
        assert_eq!(config.max_depth, DEFAULT_MAX_DEPTH);
    }
}

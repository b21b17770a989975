// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details
//
//! # Bound query tree
//!
//! The resolver turns the input [`Query`](polyschema_sql_ir::Query) into a
//! bound tree: every expression carries its type, every column names the
//! FROM alias that owns it, and every call names the method it resolved to.
//! The plan lowering engine only ever reads this tree.

use std::fmt;

use polyschema_sql_functions::ParamRole;
use polyschema_sql_ir::expr::write_list;
use polyschema_sql_ir::{
    ApplyType, BinaryOp, DataType, JoinType, Literal, SchemaColumn, SortDirection, UnaryOp,
};
use serde::{Deserialize, Serialize};

use crate::scope::{ScopeId, ScopeManager};

/// A typed expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundExpr {
    pub kind: BoundExprKind,
    pub data_type: DataType,
}

/// Node kinds of the bound tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BoundExprKind {
    Literal(Literal),

    /// Column of the FROM source bound to `alias`
    Column {
        alias: String,
        name: String,
        ordinal: usize,
        /// Render as `alias.name`
        qualify: bool,
    },

    /// Output field of a set-operator result
    OutputField { name: String, index: usize },

    /// Column of a transition table
    TransitionColumn { table: String, name: String },

    /// Value of the n-th GROUP BY key of the current group
    GroupField(usize),

    Property {
        expr: Box<BoundExpr>,
        name: String,
    },

    Binary {
        left: Box<BoundExpr>,
        op: BinaryOp,
        right: Box<BoundExpr>,
    },

    Unary {
        op: UnaryOp,
        expr: Box<BoundExpr>,
    },

    Call(MethodCall),

    Aggregate(AggregateCall),

    Case {
        branches: Vec<(BoundExpr, BoundExpr)>,
        else_result: Option<Box<BoundExpr>>,
    },

    Cast {
        expr: Box<BoundExpr>,
        target: DataType,
    },

    List(Vec<BoundExpr>),

    /// Nullable boolean evaluated as `false` when null
    NullAsFalse(Box<BoundExpr>),
}

/// A resolved per-row method call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCall {
    pub name: String,
    /// Schema providing the method, `None` for builtins
    pub schema: Option<String>,
    /// Written arguments
    pub args: Vec<BoundExpr>,
    /// Alias whose current row is injected, when the method takes the source
    pub source_alias: Option<String>,
    /// Roles of the declared parameters
    pub roles: Vec<ParamRole>,
    pub signature: String,
}

/// A resolved aggregate read
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateCall {
    pub name: String,
    pub schema: Option<String>,
    /// Accumulator key, the rendered aggregate call
    pub accumulator: String,
    pub args: Vec<BoundExpr>,
    pub signature: String,
}

/// Accumulator update executed for every row of a group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshCall {
    /// Setter method (`Set<Aggregate>`)
    pub setter: String,
    pub schema: Option<String>,
    pub accumulator: String,
    pub args: Vec<BoundExpr>,
}

impl fmt::Display for RefreshCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}('{}'", self.setter, self.accumulator)?;
        for arg in &self.args {
            write!(f, ", {}", arg)?;
        }
        write!(f, ")")
    }
}

impl BoundExpr {
    pub fn new(kind: BoundExprKind, data_type: DataType) -> Self {
        Self { kind, data_type }
    }

    pub fn literal(value: Literal, data_type: DataType) -> Self {
        Self::new(BoundExprKind::Literal(value), data_type)
    }

    /// Direct children, in evaluation order
    pub fn children(&self) -> Vec<&BoundExpr> {
        match &self.kind {
            BoundExprKind::Literal(_)
            | BoundExprKind::Column { .. }
            | BoundExprKind::OutputField { .. }
            | BoundExprKind::TransitionColumn { .. }
            | BoundExprKind::GroupField(_) => Vec::new(),
            BoundExprKind::Property { expr, .. }
            | BoundExprKind::Unary { expr, .. }
            | BoundExprKind::Cast { expr, .. }
            | BoundExprKind::NullAsFalse(expr) => vec![expr.as_ref()],
            BoundExprKind::Binary { left, right, .. } => vec![left.as_ref(), right.as_ref()],
            BoundExprKind::Call(call) => call.args.iter().collect(),
            BoundExprKind::Aggregate(call) => call.args.iter().collect(),
            BoundExprKind::Case {
                branches,
                else_result,
            } => {
                let mut children: Vec<&BoundExpr> =
                    branches.iter().flat_map(|(c, r)| [c, r]).collect();
                if let Some(e) = else_result {
                    children.push(e);
                }
                children
            }
            BoundExprKind::List(items) => items.iter().collect(),
        }
    }

    /// Rebuild the node with `f` applied to each direct child
    pub fn map_children<F>(self, f: &mut F) -> BoundExpr
    where
        F: FnMut(BoundExpr) -> BoundExpr,
    {
        let data_type = self.data_type;
        let kind = match self.kind {
            leaf @ (BoundExprKind::Literal(_)
            | BoundExprKind::Column { .. }
            | BoundExprKind::OutputField { .. }
            | BoundExprKind::TransitionColumn { .. }
            | BoundExprKind::GroupField(_)) => leaf,
            BoundExprKind::Property { expr, name } => BoundExprKind::Property {
                expr: Box::new(f(*expr)),
                name,
            },
            BoundExprKind::Binary { left, op, right } => BoundExprKind::Binary {
                left: Box::new(f(*left)),
                op,
                right: Box::new(f(*right)),
            },
            BoundExprKind::Unary { op, expr } => BoundExprKind::Unary {
                op,
                expr: Box::new(f(*expr)),
            },
            BoundExprKind::Call(mut call) => {
                call.args = call.args.into_iter().map(&mut *f).collect();
                BoundExprKind::Call(call)
            }
            BoundExprKind::Aggregate(mut call) => {
                call.args = call.args.into_iter().map(&mut *f).collect();
                BoundExprKind::Aggregate(call)
            }
            BoundExprKind::Case {
                branches,
                else_result,
            } => BoundExprKind::Case {
                branches: branches.into_iter().map(|(c, r)| (f(c), f(r))).collect(),
                else_result: else_result.map(|e| Box::new(f(*e))),
            },
            BoundExprKind::Cast { expr, target } => BoundExprKind::Cast {
                expr: Box::new(f(*expr)),
                target,
            },
            BoundExprKind::List(items) => BoundExprKind::List(items.into_iter().map(f).collect()),
            BoundExprKind::NullAsFalse(expr) => BoundExprKind::NullAsFalse(Box::new(f(*expr))),
        };
        BoundExpr { kind, data_type }
    }

    /// Rewrite the tree bottom-up
    pub fn transform_up<F>(self, f: &mut F) -> BoundExpr
    where
        F: FnMut(BoundExpr) -> BoundExpr,
    {
        let rebuilt = self.map_children(&mut |child| child.transform_up(f));
        f(rebuilt)
    }

    /// Visit every node, parents before children
    pub fn visit<'a, F>(&'a self, f: &mut F)
    where
        F: FnMut(&'a BoundExpr),
    {
        f(self);
        for child in self.children() {
            child.visit(f);
        }
    }

    /// Check whether an aggregate appears anywhere in the tree
    pub fn contains_aggregate(&self) -> bool {
        let mut found = false;
        self.visit(&mut |e| found |= matches!(e.kind, BoundExprKind::Aggregate(_)));
        found
    }

    /// Check whether two expressions compute the same value
    ///
    /// Columns compare by owner and name, whether or not they were written
    /// with their alias.
    pub fn same_value(&self, other: &BoundExpr) -> bool {
        fn canonical(e: &BoundExpr) -> BoundExpr {
            e.clone().transform_up(&mut |mut node| {
                if let BoundExprKind::Column { qualify, .. } = &mut node.kind {
                    *qualify = true;
                }
                node
            })
        }
        canonical(self) == canonical(other)
    }

    /// Aliases of all columns referenced by the tree, in first-use order
    pub fn referenced_aliases(&self) -> Vec<&str> {
        let mut aliases: Vec<&str> = Vec::new();
        self.visit(&mut |e| {
            if let BoundExprKind::Column { alias, .. } = &e.kind
                && !aliases.contains(&alias.as_str())
            {
                aliases.push(alias);
            }
        });
        aliases
    }
}

impl fmt::Display for BoundExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            BoundExprKind::Literal(lit) => write!(f, "{}", lit),
            BoundExprKind::Column {
                alias,
                name,
                qualify,
                ..
            } => {
                if *qualify {
                    write!(f, "{}.{}", alias, name)
                } else {
                    write!(f, "{}", name)
                }
            }
            BoundExprKind::OutputField { name, .. } => write!(f, "{}", name),
            BoundExprKind::TransitionColumn { table, name } => write!(f, "{}[{}]", table, name),
            BoundExprKind::GroupField(index) => write!(f, "group[{}]", index),
            BoundExprKind::Property { expr, name } => write!(f, "{}.{}", expr, name),
            BoundExprKind::Binary { left, op, right } => write!(f, "{} {} {}", left, op, right),
            BoundExprKind::Unary { op, expr } => match op {
                UnaryOp::Neg => write!(f, "-{}", expr),
                UnaryOp::Not => write!(f, "not {}", expr),
            },
            BoundExprKind::Call(call) => {
                write!(f, "{}(", call.name)?;
                write_list(f, &call.args)?;
                write!(f, ")")
            }
            BoundExprKind::Aggregate(call) => write!(f, "{}", call.accumulator),
            BoundExprKind::Case {
                branches,
                else_result,
            } => {
                write!(f, "case")?;
                for (condition, result) in branches {
                    write!(f, " when {} then {}", condition, result)?;
                }
                if let Some(e) = else_result {
                    write!(f, " else {}", e)?;
                }
                write!(f, " end")
            }
            BoundExprKind::Cast { expr, target } => write!(f, "cast({} as {})", expr, target),
            BoundExprKind::List(items) => {
                write!(f, "(")?;
                write_list(f, items)?;
                write!(f, ")")
            }
            BoundExprKind::NullAsFalse(expr) => write!(f, "{}", expr),
        }
    }
}

/// A named output field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundField {
    pub name: String,
    pub expr: BoundExpr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundOrderBy {
    pub expr: BoundExpr,
    pub direction: SortDirection,
}

/// Provenance of an in-memory source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InMemoryOrigin {
    /// Table produced by a CTE of the same compile
    Cte,
    /// Table registered by the host
    Host,
}

/// A resolved FROM source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BoundFrom {
    Schema {
        alias: String,
        schema: String,
        method: String,
        args: Vec<BoundExpr>,
        columns: Vec<SchemaColumn>,
        row_type: DataType,
    },
    InMemory {
        alias: String,
        table: String,
        origin: InMemoryOrigin,
        columns: Vec<SchemaColumn>,
    },
    Subquery {
        alias: String,
        query: Box<BoundQuery>,
        columns: Vec<SchemaColumn>,
    },
    Join {
        alias: String,
        left: Box<BoundFrom>,
        right: Box<BoundFrom>,
        join_type: JoinType,
        on: BoundExpr,
    },
    Apply {
        alias: String,
        left: Box<BoundFrom>,
        right: Box<BoundFrom>,
        apply_type: ApplyType,
    },
}

impl BoundFrom {
    /// Alias of the symbol bound for this source
    pub fn alias(&self) -> &str {
        match self {
            BoundFrom::Schema { alias, .. }
            | BoundFrom::InMemory { alias, .. }
            | BoundFrom::Subquery { alias, .. }
            | BoundFrom::Join { alias, .. }
            | BoundFrom::Apply { alias, .. } => alias,
        }
    }

    /// Aliases of the non-composite sources, in declaration order
    pub fn leaf_aliases(&self) -> Vec<&str> {
        match self {
            BoundFrom::Join { left, right, .. } | BoundFrom::Apply { left, right, .. } => {
                let mut aliases = left.leaf_aliases();
                aliases.extend(right.leaf_aliases());
                aliases
            }
            leaf => vec![leaf.alias()],
        }
    }
}

/// How a SELECT groups its rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grouping {
    /// One output row per input row
    None,
    /// Written GROUP BY
    Explicit,
    /// Aggregates without GROUP BY, a single group
    Implicit,
    /// DISTINCT, grouped by every field
    Distinct,
}

/// A resolved SELECT block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundSelect {
    pub scope: ScopeId,
    pub from: BoundFrom,
    pub where_clause: Option<BoundExpr>,
    pub group_by: Vec<BoundExpr>,
    pub grouping: Grouping,
    pub having: Option<BoundExpr>,
    pub fields: Vec<BoundField>,
}

impl BoundSelect {
    pub fn is_grouped(&self) -> bool {
        self.grouping != Grouping::None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SetOperator {
    Union,
    UnionAll,
    Intersect,
    Except,
}

impl fmt::Display for SetOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SetOperator::Union => "UNION",
            SetOperator::UnionAll => "UNION ALL",
            SetOperator::Intersect => "INTERSECT",
            SetOperator::Except => "EXCEPT",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundSetOperation {
    pub operator: SetOperator,
    pub keys: Vec<String>,
    pub left: BoundQuery,
    pub right: BoundQuery,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BoundBody {
    Select(Box<BoundSelect>),
    SetOperation(Box<BoundSetOperation>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundCte {
    pub name: String,
    pub query: BoundQuery,
}

/// A resolved query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundQuery {
    pub scope: ScopeId,
    pub ctes: Vec<BoundCte>,
    pub body: BoundBody,
    pub order_by: Vec<BoundOrderBy>,
    pub skip: Option<u64>,
    pub take: Option<u64>,
    /// Output columns; ordinals are field positions
    pub output: Vec<SchemaColumn>,
}

impl BoundQuery {
    /// Rename the output columns positionally
    ///
    /// `names` must have one entry per output column.
    pub fn rename_output(&mut self, names: &[String]) {
        let renames: Vec<(String, String)> = self
            .output
            .iter()
            .zip(names)
            .map(|(c, n)| (c.name.clone(), n.clone()))
            .collect();

        for (column, name) in self.output.iter_mut().zip(names) {
            column.name = name.clone();
        }
        for order in &mut self.order_by {
            if let BoundExprKind::OutputField { name, index } = &mut order.expr.kind
                && let Some(new) = names.get(*index)
            {
                *name = new.clone();
            }
        }

        match &mut self.body {
            BoundBody::Select(select) => {
                for (field, name) in select.fields.iter_mut().zip(names) {
                    field.name = name.clone();
                }
            }
            BoundBody::SetOperation(op) => {
                for key in &mut op.keys {
                    if let Some((_, new)) = renames.iter().find(|(old, _)| old == key) {
                        *key = new.clone();
                    }
                }
                op.left.rename_output(names);
                op.right.rename_output(names);
            }
        }
    }
}

/// Output of the resolver: the bound tree and the scopes it was bound in
#[derive(Debug, Clone)]
pub struct Analysis {
    pub query: BoundQuery,
    pub scopes: ScopeManager,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(alias: &str, name: &str, ty: DataType) -> BoundExpr {
        BoundExpr::new(
            BoundExprKind::Column {
                alias: alias.to_string(),
                name: name.to_string(),
                ordinal: 0,
                qualify: true,
            },
            ty,
        )
    }

    fn gt(left: BoundExpr, right: BoundExpr) -> BoundExpr {
        BoundExpr::new(
            BoundExprKind::Binary {
                left: Box::new(left),
                op: BinaryOp::Gt,
                right: Box::new(right),
            },
            DataType::Boolean,
        )
    }

    #[test]
    fn test_display_renders_source_form() {
        let expr = gt(
            column("a", "Population", DataType::Long),
            BoundExpr::literal(Literal::Integer(100), DataType::Int),
        );
        assert_eq!(expr.to_string(), "a.Population > 100");
    }

    #[test]
    fn test_transform_up_rewrites_columns() {
        let expr = gt(
            column("a", "Population", DataType::Long),
            column("b", "Amount", DataType::Decimal),
        );
        let rewritten = expr.transform_up(&mut |e| match e.kind {
            BoundExprKind::Column { alias, name, .. } => BoundExpr::new(
                BoundExprKind::TransitionColumn {
                    table: "t".to_string(),
                    name: format!("{}.{}", alias, name),
                },
                e.data_type,
            ),
            kind => BoundExpr::new(kind, e.data_type),
        });
        assert_eq!(rewritten.to_string(), "t[a.Population] > t[b.Amount]");
        assert!(rewritten.referenced_aliases().is_empty());
    }

    #[test]
    fn test_referenced_aliases_in_first_use_order() {
        let expr = gt(
            column("b", "Amount", DataType::Decimal),
            gt(column("a", "Id", DataType::Int), column("b", "Id", DataType::Int)),
        );
        assert_eq!(expr.referenced_aliases(), vec!["b", "a"]);
        assert!(!expr.contains_aggregate());
    }

    #[test]
    fn test_refresh_call_display() {
        let call = RefreshCall {
            setter: "SetCount".to_string(),
            schema: None,
            accumulator: "Count(a.City)".to_string(),
            args: vec![column("a", "City", DataType::String)],
        };
        assert_eq!(call.to_string(), "SetCount('Count(a.City)', a.City)");
    }
}

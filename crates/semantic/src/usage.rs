// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! Syntactic pre-pass collecting the columns a SELECT block reads per alias.
//!
//! Schemas receive the collected set through
//! [`RuntimeContext::requested_columns`](polyschema_sql_catalog::RuntimeContext)
//! and may use it to skip unused columns. The pass only over-approximates:
//! a qualifier that later turns out to be a column (`Address.City`) merely
//! requests a column that does not exist.

use std::collections::BTreeMap;

use polyschema_sql_catalog::RequestedColumns;
use polyschema_sql_ir::{Expr, FromSource, OrderBy, SelectItem, SelectStatement};

/// Columns read by one SELECT block
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnUsage {
    by_alias: BTreeMap<String, RequestedColumns>,
    unqualified: RequestedColumns,
}

impl ColumnUsage {
    /// Collect the usage of a SELECT block and the ORDER BY applied to it
    pub fn collect(select: &SelectStatement, order_by: &[OrderBy]) -> Self {
        let mut usage = Self::default();

        for item in &select.projection {
            match item {
                SelectItem::UnnamedExpr(expr) | SelectItem::AliasedExpr { expr, .. } => {
                    usage.expr(expr)
                }
                SelectItem::QualifiedWildcard(alias) => {
                    usage.by_alias.entry(alias.clone()).or_default().all = true
                }
                SelectItem::Wildcard => usage.unqualified.all = true,
            }
        }

        let clauses = select
            .where_clause
            .iter()
            .chain(&select.group_by)
            .chain(&select.having)
            .chain(order_by.iter().map(|o| &o.expr));
        for expr in clauses {
            usage.expr(expr);
        }

        if let Some(from) = &select.from {
            usage.from(from);
        }
        usage
    }

    /// Columns requested from the source bound to `alias`
    pub fn requested_for(&self, alias: &str) -> RequestedColumns {
        let mut requested = self.unqualified.clone();
        if let Some(qualified) = self.by_alias.get(alias) {
            requested.merge(qualified);
        }
        requested
    }

    fn from(&mut self, from: &FromSource) {
        match from {
            FromSource::Schema { args, .. } => args.iter().for_each(|a| self.expr(a)),
            FromSource::Join {
                left, right, on, ..
            } => {
                self.from(left);
                self.from(right);
                self.expr(on);
            }
            FromSource::Apply { left, right, .. } => {
                self.from(left);
                self.from(right);
            }
            // Nested queries collect their own usage
            FromSource::InMemory { .. } | FromSource::Subquery { .. } => {}
        }
    }

    fn expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Identifier(name) => self.unqualified.insert(name.clone()),
            Expr::Column(column) => match &column.table {
                Some(alias) => self
                    .by_alias
                    .entry(alias.clone())
                    .or_default()
                    .insert(column.column.clone()),
                None => self.unqualified.insert(column.column.clone()),
            },
            Expr::Literal(_) | Expr::FieldLink(_) => {}
            Expr::Property { expr, .. }
            | Expr::UnaryOp { expr, .. }
            | Expr::Cast { expr, .. }
            | Expr::Paren(expr) => self.expr(expr),
            Expr::BinaryOp { left, right, .. } => {
                self.expr(left);
                self.expr(right);
            }
            Expr::Function { args, .. } | Expr::List(args) => {
                args.iter().for_each(|a| self.expr(a))
            }
            Expr::Case {
                conditions,
                results,
                else_result,
            } => {
                conditions.iter().chain(results).for_each(|e| self.expr(e));
                if let Some(e) = else_result {
                    self.expr(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polyschema_sql_ir::{JoinType, Query};

    #[test]
    fn test_qualified_and_unqualified_usage() {
        let select = SelectStatement::new()
            .select(Expr::column("a", "Name"))
            .select(Expr::call("Count", vec![Expr::ident("City")]))
            .with_from(
                FromSource::schema("A", "entities", vec![])
                    .with_alias("a")
                    .join(
                        FromSource::schema("B", "orders", vec![]).with_alias("b"),
                        JoinType::Inner,
                        Expr::eq(Expr::column("a", "Id"), Expr::column("b", "PersonId")),
                    ),
            );
        let usage = ColumnUsage::collect(&select, &[OrderBy::asc(Expr::column("b", "Amount"))]);

        let a = usage.requested_for("a");
        assert!(a.contains("Name") && a.contains("Id") && a.contains("City"));
        assert!(!a.contains("Amount"));

        let b = usage.requested_for("b");
        assert!(b.contains("PersonId") && b.contains("Amount") && b.contains("City"));
        assert!(!b.contains("Name"));
    }

    #[test]
    fn test_wildcards_request_everything() {
        let select = SelectStatement::new()
            .with_projection(vec![SelectItem::QualifiedWildcard("a".into())])
            .with_from(FromSource::schema("A", "entities", vec![]).with_alias("a"));
        let usage = ColumnUsage::collect(&select, &[]);
        assert!(usage.requested_for("a").all);
        assert!(!usage.requested_for("b").all);

        let star = SelectStatement::new().select_all();
        assert!(ColumnUsage::collect(&star, &[]).requested_for("x").all);
    }

    #[test]
    fn test_subquery_usage_is_not_collected() {
        let inner = Query::select(
            SelectStatement::new()
                .select(Expr::ident("Hidden"))
                .with_from(FromSource::schema("A", "entities", vec![])),
        );
        let select = SelectStatement::new()
            .select(Expr::ident("Name"))
            .with_from(FromSource::subquery(inner).with_alias("s"));
        let usage = ColumnUsage::collect(&select, &[]);
        assert!(!usage.requested_for("s").contains("Hidden"));
    }
}

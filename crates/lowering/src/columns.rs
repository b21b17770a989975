// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! Column trimming and rewriting of column reads onto transition tables
//!
//! A join step only materializes the columns a later step reads. The
//! [`ColumnNeeds`] collector walks the expressions evaluated downstream of a
//! step and records, per alias, the column names they reference. A method
//! taking the current row of an alias needs every column of that alias.

use std::collections::{BTreeMap, BTreeSet};

use polyschema_sql_ir::SchemaColumn;
use polyschema_sql_semantic::{BoundExpr, BoundExprKind, ScopeId, ScopeManager, TableSymbol};

use crate::error::{LoweringError, LoweringResult};
use crate::plan::ScanSource;

/// Columns referenced downstream of a step, per alias
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnNeeds {
    columns: BTreeMap<String, BTreeSet<String>>,
    whole: BTreeSet<String>,
}

impl ColumnNeeds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record every column read by `expr`
    pub fn collect(&mut self, expr: &BoundExpr) {
        expr.visit(&mut |e| match &e.kind {
            BoundExprKind::Column { alias, name, .. } => {
                self.columns
                    .entry(alias.clone())
                    .or_default()
                    .insert(name.clone());
            }
            BoundExprKind::Call(call) => {
                if let Some(alias) = &call.source_alias {
                    self.whole.insert(alias.clone());
                }
            }
            _ => {}
        });
    }

    pub fn collect_all<'e, I>(&mut self, exprs: I)
    where
        I: IntoIterator<Item = &'e BoundExpr>,
    {
        for expr in exprs {
            self.collect(expr);
        }
    }

    /// Copy extended with the columns of `exprs`
    pub fn with_exprs<'e, I>(&self, exprs: I) -> Self
    where
        I: IntoIterator<Item = &'e BoundExpr>,
    {
        let mut needs = self.clone();
        needs.collect_all(exprs);
        needs
    }

    pub fn needs(&self, alias: &str, column: &str) -> bool {
        self.whole.contains(alias)
            || self
                .columns
                .get(alias)
                .is_some_and(|names| names.contains(column))
    }

    /// Whether the current row of `alias` is read as a whole
    pub fn needs_row(&self, alias: &str) -> bool {
        self.whole.contains(alias)
    }

    /// Needed columns of a source, in declaration order
    pub fn columns_of(&self, table: &TableSymbol) -> Vec<SchemaColumn> {
        table
            .visible_columns()
            .into_iter()
            .filter(|c| self.needs(&table.alias, &c.name))
            .collect()
    }
}

/// Name of the transition table column holding `alias.column`
pub fn qualified_name(alias: &str, column: &str) -> String {
    format!("{}.{}", alias, column)
}

/// Rows available to a step
///
/// Either a source scanned directly (`table` is `None`) or a transition
/// table whose columns are named [`qualified_name`]s.
#[derive(Debug, Clone, PartialEq)]
pub struct Relation {
    pub scan: ScanSource,
    pub table: Option<String>,
    /// Aliases whose columns the relation carries
    pub leaves: Vec<String>,
}

impl Relation {
    /// A source scanned directly under its own alias
    pub fn leaf(alias: &str, scan: ScanSource) -> Self {
        Self {
            scan,
            table: None,
            leaves: vec![alias.to_string()],
        }
    }

    /// Rows of a transition table carrying the columns of `leaves`
    pub fn transition(alias: &str, table: String, leaves: Vec<String>) -> Self {
        Self {
            scan: ScanSource::Transition {
                alias: alias.to_string(),
                table: table.clone(),
            },
            table: Some(table),
            leaves,
        }
    }

    pub fn carries(&self, alias: &str) -> bool {
        self.leaves.iter().any(|leaf| leaf == alias)
    }

    /// Expression reading one column of a carried source
    pub fn read(&self, alias: &str, column: &SchemaColumn) -> BoundExpr {
        let kind = match &self.table {
            Some(table) => BoundExprKind::TransitionColumn {
                table: table.clone(),
                name: qualified_name(alias, &column.name),
            },
            None => BoundExprKind::Column {
                alias: alias.to_string(),
                name: column.name.clone(),
                ordinal: column.ordinal,
                qualify: true,
            },
        };
        BoundExpr::new(kind, column.data_type.clone())
    }
}

/// Rewrite the column reads of `expr` onto the relations carrying them
///
/// Fails with [`LoweringError::DetachedColumn`] when a column belongs to
/// none of the relations.
pub fn rewrite(expr: &BoundExpr, relations: &[&Relation]) -> LoweringResult<BoundExpr> {
    let mut detached = None;
    expr.visit(&mut |e| {
        if let BoundExprKind::Column { alias, name, .. } = &e.kind
            && detached.is_none()
            && !relations.iter().any(|r| r.carries(alias))
        {
            detached = Some(LoweringError::DetachedColumn {
                alias: alias.clone(),
                column: name.clone(),
            });
        }
    });
    if let Some(err) = detached {
        return Err(err);
    }

    Ok(expr.clone().transform_up(&mut |node| {
        let BoundExprKind::Column { alias, name, .. } = &node.kind else {
            return node;
        };
        let table = relations
            .iter()
            .find(|r| r.carries(alias))
            .and_then(|r| r.table.as_ref());
        match table {
            Some(table) => BoundExpr::new(
                BoundExprKind::TransitionColumn {
                    table: table.clone(),
                    name: qualified_name(alias, name),
                },
                node.data_type,
            ),
            None => node,
        }
    }))
}

pub fn rewrite_all<'e, I>(exprs: I, relations: &[&Relation]) -> LoweringResult<Vec<BoundExpr>>
where
    I: IntoIterator<Item = &'e BoundExpr>,
{
    exprs.into_iter().map(|e| rewrite(e, relations)).collect()
}

/// Columns of a join table: the needed columns of each leaf, in leaf order
///
/// Returns the source alias and column of each table column.
pub fn trimmed_columns(
    scopes: &ScopeManager,
    scope: ScopeId,
    leaves: &[String],
    needs: &ColumnNeeds,
) -> LoweringResult<Vec<(String, SchemaColumn)>> {
    let mut columns = Vec::new();
    for alias in leaves {
        let table = scopes.resolve::<TableSymbol>(alias, scope)?;
        columns.extend(
            needs
                .columns_of(table)
                .into_iter()
                .map(|c| (alias.clone(), c)),
        );
    }
    Ok(columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use polyschema_sql_ir::{BinaryOp, DataType};
    use polyschema_sql_semantic::{MethodCall, ScopeType, Symbol, TableSource};

    fn column(alias: &str, name: &str, ordinal: usize, ty: DataType) -> BoundExpr {
        BoundExpr::new(
            BoundExprKind::Column {
                alias: alias.to_string(),
                name: name.to_string(),
                ordinal,
                qualify: true,
            },
            ty,
        )
    }

    fn scan(alias: &str) -> ScanSource {
        ScanSource::InMemory {
            alias: alias.to_string(),
            table: alias.to_string(),
        }
    }

    #[test]
    fn test_collect_columns() {
        let mut needs = ColumnNeeds::new();
        needs.collect(&BoundExpr::new(
            BoundExprKind::Binary {
                left: Box::new(column("a", "Id", 0, DataType::Int)),
                op: BinaryOp::Eq,
                right: Box::new(column("b", "PersonId", 1, DataType::Int)),
            },
            DataType::Boolean,
        ));

        assert!(needs.needs("a", "Id"));
        assert!(needs.needs("b", "PersonId"));
        assert!(!needs.needs("a", "PersonId"));
        assert!(!needs.needs_row("a"));
    }

    #[test]
    fn test_injected_row_needs_every_column() {
        let call = BoundExpr::new(
            BoundExprKind::Call(MethodCall {
                name: "Describe".to_string(),
                schema: Some("A".to_string()),
                args: Vec::new(),
                source_alias: Some("a".to_string()),
                roles: Vec::new(),
                signature: "Describe(Person)".to_string(),
            }),
            DataType::String,
        );
        let needs = ColumnNeeds::new().with_exprs([&call]);
        assert!(needs.needs_row("a"));
        assert!(needs.needs("a", "Anything"));
    }

    #[test]
    fn test_rewrite_onto_transition_table() {
        let joined = Relation::transition("a+b", "__t0_join".to_string(), vec!["a".into(), "b".into()]);
        let rewritten = rewrite(&column("a", "Name", 0, DataType::String), &[&joined]).unwrap();
        assert_eq!(
            rewritten.kind,
            BoundExprKind::TransitionColumn {
                table: "__t0_join".to_string(),
                name: "a.Name".to_string(),
            }
        );
        assert_eq!(rewritten.data_type, DataType::String);
    }

    #[test]
    fn test_rewrite_keeps_direct_scans() {
        let leaf = Relation::leaf("a", scan("a"));
        let expr = column("a", "Name", 0, DataType::String);
        assert_eq!(rewrite(&expr, &[&leaf]).unwrap(), expr);
    }

    #[test]
    fn test_rewrite_detached_column() {
        let leaf = Relation::leaf("a", scan("a"));
        let err = rewrite(&column("x", "Name", 0, DataType::String), &[&leaf]).unwrap_err();
        assert_eq!(
            err,
            LoweringError::DetachedColumn {
                alias: "x".to_string(),
                column: "Name".to_string(),
            }
        );
    }

    #[test]
    fn test_trimmed_columns_follow_declaration_order() {
        let mut scopes = ScopeManager::new();
        let scope = scopes.enter_scope(ScopeType::Query, "Query");
        let mut table = TableSymbol::new(
            "b",
            TableSource::Subquery,
            vec![
                SchemaColumn::new("Id", 0, DataType::Int),
                SchemaColumn::new("Amount", 1, DataType::Decimal),
            ],
        );
        table.nullable = true;
        scopes.add_symbol(scope, "b", Symbol::Table(table)).unwrap();

        let needs = ColumnNeeds::new().with_exprs([
            &column("b", "Amount", 1, DataType::Decimal),
            &column("b", "Id", 0, DataType::Int),
        ]);
        let columns = trimmed_columns(&scopes, scope, &["b".to_string()], &needs).unwrap();
        let names: Vec<&str> = columns.iter().map(|(_, c)| c.name.as_str()).collect();
        assert_eq!(names, vec!["Id", "Amount"]);
        assert_eq!(columns[1].1.data_type, DataType::Decimal.to_nullable());
    }
}

// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details
//
//! # Semantic analyzer
//!
//! The analyzer walks the input query top-down, opening one scope per query
//! block, binding FROM sources as symbols, and producing the bound tree the
//! plan lowering engine consumes.
//!
//! Within a SELECT block the clauses are bound in dependency order: FROM
//! first, so that its aliases are known, then WHERE, GROUP BY, the projection,
//! HAVING and ORDER BY. Expression binding lives in [`crate::expr`].

use std::fmt;

use polyschema_sql_catalog::{ArgValue, CatalogError, RuntimeContext, SchemaCatalog};
use polyschema_sql_ir::{
    ApplyType, CommonTableExpr, Expr, FromSource, JoinType, OrderBy, Query, SchemaColumn,
    SelectItem, SelectStatement, SetOp,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, trace};

use crate::bound::{
    Analysis, BoundBody, BoundCte, BoundExpr, BoundExprKind, BoundField, BoundFrom,
    BoundOrderBy, BoundQuery, BoundSelect, BoundSetOperation, Grouping, InMemoryOrigin,
    SetOperator,
};
use crate::error::{SemanticError, SemanticResult};
use crate::resolution::ResolutionConfig;
use crate::scope::{ScopeId, ScopeManager, ScopeType};
use crate::symbol::{Symbol, TableSource, TableSymbol};
use crate::usage::ColumnUsage;

/// Configuration of the semantic analyzer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnalyzerConfig {
    /// Near-miss suggestion settings
    pub suggestions: ResolutionConfig,
    /// Prefix of aliases generated for unaliased FROM sources
    pub auto_alias_prefix: String,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            suggestions: ResolutionConfig::default(),
            auto_alias_prefix: "__auto_".to_string(),
        }
    }
}

/// Key under which a CTE is bound in its query scope
///
/// CTE names live apart from FROM aliases, so `from recent recent` is legal.
pub fn cte_key(name: &str) -> String {
    format!("{}#cte", name)
}

/// Clause an expression is bound in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Clause {
    From,
    On,
    Where,
    GroupBy,
    Select,
    Having,
    OrderBy,
    AggregateArgument,
}

impl Clause {
    pub(crate) fn allows_aggregates(self) -> bool {
        matches!(self, Clause::Select | Clause::Having | Clause::OrderBy)
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Clause::From => "FROM",
            Clause::On => "ON",
            Clause::Where => "WHERE",
            Clause::GroupBy => "GROUP BY",
            Clause::Select => "SELECT",
            Clause::Having => "HAVING",
            Clause::OrderBy => "ORDER BY",
            Clause::AggregateArgument => "an aggregate argument",
        };
        f.write_str(s)
    }
}

/// What an expression is bound against
///
/// Passed explicitly down the binding calls instead of living in analyzer
/// state.
#[derive(Debug, Clone)]
pub(crate) struct QueryContext<'g> {
    pub scope: ScopeId,
    /// Alias of the active FROM source, possibly compound
    pub alias: Option<String>,
    pub clause: Clause,
    /// Bound GROUP BY keys, targets of field links
    pub group_by: &'g [BoundExpr],
}

impl<'g> QueryContext<'g> {
    fn new(scope: ScopeId) -> Self {
        Self {
            scope,
            alias: None,
            clause: Clause::From,
            group_by: &[],
        }
    }

    pub(crate) fn with_clause(&self, clause: Clause) -> Self {
        Self {
            clause,
            ..self.clone()
        }
    }

    fn with_alias(&self, alias: &str) -> Self {
        Self {
            alias: Some(alias.to_string()),
            ..self.clone()
        }
    }

    fn with_group_by<'h>(&self, group_by: &'h [BoundExpr]) -> QueryContext<'h> {
        QueryContext {
            scope: self.scope,
            alias: self.alias.clone(),
            clause: self.clause,
            group_by,
        }
    }
}

/// Semantic analyzer
///
/// An analyzer binds one query; create a new one per compile.
///
/// # Examples
///
/// ```rust,ignore
/// use polyschema_sql_semantic::{AnalyzerConfig, SemanticAnalyzer};
///
/// let analysis = SemanticAnalyzer::new(&catalog, AnalyzerConfig::default()).analyze(&query)?;
/// println!("{} scopes", analysis.scopes.scope_count());
/// ```
pub struct SemanticAnalyzer<'a> {
    pub(crate) catalog: &'a SchemaCatalog,
    pub(crate) config: AnalyzerConfig,
    pub(crate) scopes: ScopeManager,
    alias_counter: usize,
}

impl<'a> SemanticAnalyzer<'a> {
    pub fn new(catalog: &'a SchemaCatalog, config: AnalyzerConfig) -> Self {
        Self {
            catalog,
            config,
            scopes: ScopeManager::new(),
            alias_counter: 0,
        }
    }

    /// Bind a query
    ///
    /// # Errors
    ///
    /// Returns the first [`SemanticError`] found; nothing partial is kept.
    #[instrument(skip_all)]
    pub fn analyze(mut self, query: &Query) -> SemanticResult<Analysis> {
        self.scopes.enter_scope(ScopeType::Query, "Query");
        let bound = self.bind_query(query)?;
        self.scopes.leave_scope()?;
        debug!(scopes = self.scopes.scope_count(), "Analysis complete");
        Ok(Analysis {
            query: bound,
            scopes: self.scopes,
        })
    }

    /// Near-miss suggestions for `name`
    pub(crate) fn suggest<'s, I>(&self, name: &str, candidates: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'s str>,
    {
        self.config.suggestions.suggest(name, candidates)
    }

    fn next_alias(&mut self) -> String {
        let alias = format!("{}{}", self.config.auto_alias_prefix, self.alias_counter);
        self.alias_counter += 1;
        alias
    }

    fn alias_or_generated(&mut self, alias: &Option<String>) -> (String, bool) {
        match alias {
            Some(alias) => (alias.clone(), true),
            None => (self.next_alias(), false),
        }
    }

    /// Bind a query in the current scope
    fn bind_query(&mut self, query: &Query) -> SemanticResult<BoundQuery> {
        let scope = self.scopes.require_current()?;

        let mut ctes = Vec::with_capacity(query.ctes.len());
        for cte in &query.ctes {
            ctes.push(self.bind_cte(cte, scope)?);
        }

        let (body, order_by, output) = match &query.body {
            SetOp::Select(select) => {
                let (select, order_by) = self.bind_select(select, &query.order_by, scope)?;
                let output = output_columns(&select.fields);
                (BoundBody::Select(Box::new(select)), order_by, output)
            }
            SetOp::Union {
                left,
                right,
                all,
                keys,
            } => {
                let operator = if *all {
                    SetOperator::UnionAll
                } else {
                    SetOperator::Union
                };
                self.bind_set_body(operator, left, right, keys, &query.order_by)?
            }
            SetOp::Intersect { left, right, keys } => {
                self.bind_set_body(SetOperator::Intersect, left, right, keys, &query.order_by)?
            }
            SetOp::Except { left, right, keys } => {
                self.bind_set_body(SetOperator::Except, left, right, keys, &query.order_by)?
            }
        };

        Ok(BoundQuery {
            scope,
            ctes,
            body,
            order_by,
            skip: query.skip,
            take: query.take,
            output,
        })
    }

    fn bind_cte(&mut self, cte: &CommonTableExpr, scope: ScopeId) -> SemanticResult<BoundCte> {
        debug!(cte = %cte.name, "Binding CTE");
        self.scopes.enter_scope(ScopeType::Cte, cte.name.clone());
        let mut query = self.bind_query(&cte.query)?;
        self.scopes.leave_scope()?;

        if !cte.columns.is_empty() {
            if cte.columns.len() != query.output.len() {
                return Err(SemanticError::CteColumnCountMismatch {
                    cte: cte.name.clone(),
                    defined: cte.columns.len(),
                    returned: query.output.len(),
                });
            }
            query.rename_output(&cte.columns);
        }

        let symbol = TableSymbol::new(
            cte.name.clone(),
            TableSource::Cte(cte.name.clone()),
            query.output.clone(),
        );
        self.scopes
            .add_symbol(scope, cte_key(&cte.name), Symbol::Table(symbol))?;

        Ok(BoundCte {
            name: cte.name.clone(),
            query,
        })
    }

    fn bind_set_body(
        &mut self,
        operator: SetOperator,
        left: &Query,
        right: &Query,
        keys: &[String],
        order_by: &[OrderBy],
    ) -> SemanticResult<(BoundBody, Vec<BoundOrderBy>, Vec<SchemaColumn>)> {
        let operation = self.bind_set_operation(operator, left, right, keys)?;
        let output = operation.left.output.clone();
        let order_by = self.bind_output_order(order_by, &output)?;
        Ok((BoundBody::SetOperation(Box::new(operation)), order_by, output))
    }

    /// Bind both operands of a set operator and check they line up
    fn bind_set_operation(
        &mut self,
        operator: SetOperator,
        left: &Query,
        right: &Query,
        keys: &[String],
    ) -> SemanticResult<BoundSetOperation> {
        if keys.is_empty() {
            return Err(SemanticError::SetOperatorMustHaveKeyColumns {
                operator: operator.to_string(),
            });
        }

        self.scopes
            .enter_scope(ScopeType::SetOperator, operator.to_string());
        let left = self.bind_operand(left)?;
        let right = self.bind_operand(right)?;
        self.scopes.leave_scope()?;

        if left.output.len() != right.output.len() {
            return Err(SemanticError::SetOperatorMustHaveSameQuantityOfColumns {
                left: left.output.len(),
                right: right.output.len(),
            });
        }
        for (index, (l, r)) in left.output.iter().zip(&right.output).enumerate() {
            if l.data_type != r.data_type {
                return Err(SemanticError::SetOperatorMustHaveSameTypesOfColumns {
                    index,
                    left: l.data_type.to_string(),
                    right: r.data_type.to_string(),
                });
            }
        }
        for key in keys {
            if !left.output.iter().any(|c| &c.name == key) {
                return Err(SemanticError::SetOperatorKeyColumnNotFound {
                    key: key.clone(),
                    suggestions: self.suggest(key, left.output.iter().map(|c| c.name.as_str())),
                });
            }
        }

        Ok(BoundSetOperation {
            operator,
            keys: keys.to_vec(),
            left,
            right,
        })
    }

    fn bind_operand(&mut self, query: &Query) -> SemanticResult<BoundQuery> {
        self.scopes.enter_scope(ScopeType::Query, "Query");
        let bound = self.bind_query(query)?;
        self.scopes.leave_scope()?;
        Ok(bound)
    }

    /// ORDER BY over a set-operator result references output fields by name
    fn bind_output_order(
        &self,
        order_by: &[OrderBy],
        output: &[SchemaColumn],
    ) -> SemanticResult<Vec<BoundOrderBy>> {
        order_by
            .iter()
            .map(|order| {
                let name = match &order.expr {
                    Expr::Identifier(name) => name.clone(),
                    Expr::Column(column) => column.qualified(),
                    other => {
                        return Err(SemanticError::UnsupportedConstruct(format!(
                            "ORDER BY {} on a set operator result",
                            other
                        )));
                    }
                };
                let column = output.iter().find(|c| c.name == name).ok_or_else(|| {
                    SemanticError::UnknownColumnOrAlias {
                        suggestions: self.suggest(&name, output.iter().map(|c| c.name.as_str())),
                        name: name.clone(),
                    }
                })?;
                Ok(BoundOrderBy {
                    expr: BoundExpr::new(
                        BoundExprKind::OutputField {
                            name,
                            index: column.ordinal,
                        },
                        column.data_type.clone(),
                    ),
                    direction: order.direction,
                })
            })
            .collect()
    }

    fn bind_select(
        &mut self,
        select: &SelectStatement,
        order_by: &[OrderBy],
        scope: ScopeId,
    ) -> SemanticResult<(BoundSelect, Vec<BoundOrderBy>)> {
        let from = select.from.as_ref().ok_or(SemanticError::NullFrom)?;
        let usage = ColumnUsage::collect(select, order_by);

        let base = QueryContext::new(scope);
        let from = self.bind_from(from, &usage, &base)?;
        let ctx = base.with_alias(from.alias());
        trace!(alias = %from.alias(), "Bound FROM clause");

        let where_clause = select
            .where_clause
            .as_ref()
            .map(|w| self.bind_predicate(w, &ctx.with_clause(Clause::Where)))
            .transpose()?;

        let group_ctx = ctx.with_clause(Clause::GroupBy);
        let group_by = select
            .group_by
            .iter()
            .map(|g| self.bind_expr(g, &group_ctx))
            .collect::<SemanticResult<Vec<_>>>()?;

        let grouped_ctx = ctx.with_group_by(&group_by);

        let select_ctx = grouped_ctx.with_clause(Clause::Select);
        let mut fields = Vec::new();
        for item in &select.projection {
            match item {
                SelectItem::UnnamedExpr(expr) => fields.push(BoundField {
                    name: expr.to_string(),
                    expr: self.bind_expr(expr, &select_ctx)?,
                }),
                SelectItem::AliasedExpr { expr, alias } => fields.push(BoundField {
                    name: alias.clone(),
                    expr: self.bind_expr(expr, &select_ctx)?,
                }),
                SelectItem::QualifiedWildcard(qualifier) => {
                    fields.extend(self.expand_wildcard(Some(qualifier), &select_ctx)?)
                }
                SelectItem::Wildcard => fields.extend(self.expand_wildcard(None, &select_ctx)?),
            }
        }

        let having = select
            .having
            .as_ref()
            .map(|h| self.bind_predicate(h, &grouped_ctx.with_clause(Clause::Having)))
            .transpose()?;

        let order_ctx = grouped_ctx.with_clause(Clause::OrderBy);
        let mut bound_order = Vec::with_capacity(order_by.len());
        for order in order_by {
            // A bare name may refer to a projection alias
            let aliased = match &order.expr {
                Expr::Identifier(name) => select.projection.iter().position(
                    |item| matches!(item, SelectItem::AliasedExpr { alias, .. } if alias == name),
                ),
                _ => None,
            };
            let expr = match aliased.and_then(|i| field_for_item(&select.projection, &fields, i)) {
                Some(field) => field.expr.clone(),
                None => self.bind_expr(&order.expr, &order_ctx)?,
            };
            bound_order.push(BoundOrderBy {
                expr,
                direction: order.direction,
            });
        }

        let has_aggregates = fields.iter().any(|f| f.expr.contains_aggregate())
            || having.as_ref().is_some_and(BoundExpr::contains_aggregate)
            || bound_order.iter().any(|o| o.expr.contains_aggregate());

        let grouping = if select.distinct {
            if !group_by.is_empty() || has_aggregates {
                return Err(SemanticError::UnsupportedConstruct(
                    "DISTINCT combined with GROUP BY or aggregates".to_string(),
                ));
            }
            Grouping::Distinct
        } else if !group_by.is_empty() {
            Grouping::Explicit
        } else if has_aggregates {
            Grouping::Implicit
        } else {
            if having.is_some() {
                return Err(SemanticError::UnsupportedConstruct(
                    "HAVING without GROUP BY or aggregates".to_string(),
                ));
            }
            Grouping::None
        };

        let group_by = match grouping {
            Grouping::Distinct => fields.iter().map(|f| f.expr.clone()).collect(),
            _ => group_by,
        };

        if grouping != Grouping::None {
            let grouped_exprs = fields
                .iter()
                .map(|f| &f.expr)
                .chain(having.as_ref())
                .chain(bound_order.iter().map(|o| &o.expr));
            for expr in grouped_exprs {
                check_grouped(expr, &group_by)?;
            }
        }

        debug!(
            fields = fields.len(),
            ?grouping,
            "Bound SELECT"
        );

        Ok((
            BoundSelect {
                scope,
                from,
                where_clause,
                group_by,
                grouping,
                having,
                fields,
            },
            bound_order,
        ))
    }

    /// Expand `*` or `alias.*` into one field per column
    ///
    /// Fields are named `alias.Column` only when the alias was written.
    fn expand_wildcard(
        &self,
        qualifier: Option<&String>,
        ctx: &QueryContext<'_>,
    ) -> SemanticResult<Vec<BoundField>> {
        let tables = self.source_tables(ctx)?;
        let selected: Vec<&TableSymbol> = match qualifier {
            Some(q) => {
                let table = tables.iter().find(|t| &t.alias == q).ok_or_else(|| {
                    SemanticError::UnknownColumnOrAlias {
                        name: q.clone(),
                        suggestions: self.suggest(q, tables.iter().map(|t| t.alias.as_str())),
                    }
                })?;
                vec![table]
            }
            None => tables.iter().collect(),
        };

        let mut fields = Vec::new();
        for table in selected {
            let qualify = table.has_explicit_alias;
            for column in table.visible_columns() {
                let name = if qualify {
                    format!("{}.{}", table.alias, column.name)
                } else {
                    column.name.clone()
                };
                fields.push(BoundField {
                    name,
                    expr: BoundExpr::new(
                        BoundExprKind::Column {
                            alias: table.alias.clone(),
                            name: column.name,
                            ordinal: column.ordinal,
                            qualify,
                        },
                        column.data_type,
                    ),
                });
            }
        }
        Ok(fields)
    }

    /// Plain symbols making up the active FROM source
    pub(crate) fn source_tables(&self, ctx: &QueryContext<'_>) -> SemanticResult<Vec<TableSymbol>> {
        let Some(alias) = &ctx.alias else {
            return Ok(Vec::new());
        };
        let source = self.scopes.resolve::<TableSymbol>(alias, ctx.scope)?;
        source
            .compound_tables
            .iter()
            .map(|a| self.scopes.resolve::<TableSymbol>(a, ctx.scope).cloned())
            .collect()
    }

    fn bind_from(
        &mut self,
        from: &FromSource,
        usage: &ColumnUsage,
        ctx: &QueryContext<'_>,
    ) -> SemanticResult<BoundFrom> {
        match from {
            FromSource::Schema {
                schema,
                method,
                args,
                alias,
            } => self.bind_schema_source(schema, method, args, alias, usage, ctx),

            FromSource::InMemory { name, alias } => self.bind_in_memory_source(name, alias, ctx),

            FromSource::Subquery { query, alias } => {
                self.scopes.enter_scope(ScopeType::Subquery, "Subquery");
                let query = self.bind_query(query)?;
                self.scopes.leave_scope()?;

                let (alias, explicit) = self.alias_or_generated(alias);
                let symbol = TableSymbol::new(alias.clone(), TableSource::Subquery, query.output.clone())
                    .with_explicit_alias(explicit);
                self.scopes
                    .add_symbol(ctx.scope, alias.clone(), Symbol::Table(symbol))?;

                Ok(BoundFrom::Subquery {
                    alias,
                    columns: query.output.clone(),
                    query: Box::new(query),
                })
            }

            FromSource::Join {
                left,
                right,
                join_type,
                on,
            } => {
                let left = self.bind_from(left, usage, ctx)?;
                let right = self.bind_from(right, usage, ctx)?;
                match join_type {
                    JoinType::LeftOuter => self.mark_nullable(&right, ctx.scope)?,
                    JoinType::RightOuter => self.mark_nullable(&left, ctx.scope)?,
                    JoinType::Inner => {}
                }
                let alias = self.compose(&left, &right, ctx.scope)?;
                let on = self.bind_predicate(on, &ctx.with_alias(&alias).with_clause(Clause::On))?;

                Ok(BoundFrom::Join {
                    alias,
                    left: Box::new(left),
                    right: Box::new(right),
                    join_type: *join_type,
                    on,
                })
            }

            FromSource::Apply {
                left,
                right,
                apply_type,
            } => {
                let left = self.bind_from(left, usage, ctx)?;
                // The right side may read columns of the left side
                let right = self.bind_from(right, usage, &ctx.with_alias(left.alias()))?;
                if *apply_type == ApplyType::Outer {
                    self.mark_nullable(&right, ctx.scope)?;
                }
                let alias = self.compose(&left, &right, ctx.scope)?;

                Ok(BoundFrom::Apply {
                    alias,
                    left: Box::new(left),
                    right: Box::new(right),
                    apply_type: *apply_type,
                })
            }
        }
    }

    fn bind_schema_source(
        &mut self,
        schema: &str,
        method: &str,
        args: &[Expr],
        alias: &Option<String>,
        usage: &ColumnUsage,
        ctx: &QueryContext<'_>,
    ) -> SemanticResult<BoundFrom> {
        let catalog = self.catalog;
        let provider = catalog
            .schema(schema)
            .ok_or_else(|| SemanticError::UnknownSchema {
                name: schema.to_string(),
                suggestions: self.suggest(
                    schema.trim_start_matches('#'),
                    catalog.schema_names().iter().map(String::as_str),
                ),
            })?;

        let arg_ctx = ctx.with_clause(Clause::From);
        let args = args
            .iter()
            .map(|a| self.bind_expr(a, &arg_ctx))
            .collect::<SemanticResult<Vec<_>>>()?;
        let arg_values: Vec<ArgValue> = args
            .iter()
            .map(|a| match &a.kind {
                BoundExprKind::Literal(lit) => ArgValue::Constant(lit.clone()),
                _ => ArgValue::Dynamic(a.data_type.clone()),
            })
            .collect();

        let (alias, explicit) = self.alias_or_generated(alias);
        let runtime = RuntimeContext::new(alias.clone())
            .with_requested_columns(usage.requested_for(&alias))
            .with_environment(catalog.environment().clone());

        let columns = provider
            .get_table(method, &runtime, &arg_values)
            .map_err(|e| match e {
                CatalogError::TableNotFound(..) => SemanticError::TableNotDefined {
                    name: format!("#{}.{}", provider.name(), method),
                    suggestions: self.suggest(
                        method,
                        provider.table_names().iter().map(String::as_str),
                    ),
                },
                other => other.into(),
            })?;
        let row_type = provider.row_type(method);
        debug!(
            schema = provider.name(),
            method,
            %alias,
            columns = columns.len(),
            "Described schema table"
        );

        let symbol = TableSymbol::new(
            alias.clone(),
            TableSource::Schema {
                schema: provider.name().to_string(),
                method: method.to_string(),
            },
            columns.clone(),
        )
        .with_explicit_alias(explicit)
        .with_row_type(row_type.clone());
        self.scopes
            .add_symbol(ctx.scope, alias.clone(), Symbol::Table(symbol))?;

        Ok(BoundFrom::Schema {
            alias,
            schema: provider.name().to_string(),
            method: method.to_string(),
            args,
            columns,
            row_type,
        })
    }

    fn bind_in_memory_source(
        &mut self,
        name: &str,
        alias: &Option<String>,
        ctx: &QueryContext<'_>,
    ) -> SemanticResult<BoundFrom> {
        let cte = self
            .scopes
            .try_resolve::<TableSymbol>(&cte_key(name), ctx.scope)?
            .cloned();

        let (origin, source, columns) = match cte {
            Some(cte) => (InMemoryOrigin::Cte, TableSource::Cte(name.to_string()), cte.columns),
            None => match self.catalog.in_memory_table(name) {
                Some(columns) => (
                    InMemoryOrigin::Host,
                    TableSource::InMemory(name.to_string()),
                    columns.to_vec(),
                ),
                None => {
                    let mut candidates: Vec<String> = self
                        .scopes
                        .visible_tables(ctx.scope)?
                        .into_iter()
                        .filter_map(|t| match &t.source {
                            TableSource::Cte(name) => Some(name.clone()),
                            _ => None,
                        })
                        .collect();
                    candidates.extend(self.catalog.in_memory_table_names());
                    return Err(SemanticError::TableNotDefined {
                        name: name.to_string(),
                        suggestions: self.suggest(name, candidates.iter().map(String::as_str)),
                    });
                }
            },
        };

        // An unaliased table is addressed by its own name
        let (alias, explicit) = match alias {
            Some(alias) => (alias.clone(), true),
            None => (name.to_string(), false),
        };
        let symbol = TableSymbol::new(alias.clone(), source, columns.clone())
            .with_explicit_alias(explicit);
        self.scopes
            .add_symbol(ctx.scope, alias.clone(), Symbol::Table(symbol))?;

        Ok(BoundFrom::InMemory {
            alias,
            table: name.to_string(),
            origin,
            columns,
        })
    }

    /// Apply the nullable transform to every source on the outer side of a join
    fn mark_nullable(&mut self, from: &BoundFrom, scope: ScopeId) -> SemanticResult<()> {
        for alias in from.leaf_aliases() {
            trace!(%alias, "Marking source nullable");
            self.scopes
                .modify::<TableSymbol, _>(alias, scope, |t| t.nullable = true)?;
        }
        Ok(())
    }

    /// Register the compound symbol of a join or apply
    fn compose(&mut self, left: &BoundFrom, right: &BoundFrom, scope: ScopeId) -> SemanticResult<String> {
        let alias = format!("{}+{}", left.alias(), right.alias());
        let compound: Vec<String> = left
            .leaf_aliases()
            .into_iter()
            .chain(right.leaf_aliases())
            .map(String::from)
            .collect();
        self.scopes.add_symbol(
            scope,
            alias.clone(),
            Symbol::Table(TableSymbol::compound(alias.clone(), compound)),
        )?;
        Ok(alias)
    }
}

/// The bound field of the projection item at `index`, if it maps to one field
fn field_for_item<'f>(
    projection: &[SelectItem],
    fields: &'f [BoundField],
    index: usize,
) -> Option<&'f BoundField> {
    // Wildcards before the item expand to a variable number of fields
    if projection[..index]
        .iter()
        .any(|i| matches!(i, SelectItem::Wildcard | SelectItem::QualifiedWildcard(_)))
    {
        let SelectItem::AliasedExpr { alias, .. } = &projection[index] else {
            return None;
        };
        return fields.iter().find(|f| &f.name == alias);
    }
    fields.get(index)
}

/// Reject columns that are neither grouped nor aggregated
fn check_grouped(expr: &BoundExpr, group_by: &[BoundExpr]) -> SemanticResult<()> {
    if group_by.iter().any(|g| g.same_value(expr)) {
        return Ok(());
    }
    match &expr.kind {
        BoundExprKind::Aggregate(_) | BoundExprKind::Literal(_) | BoundExprKind::GroupField(_) => {
            Ok(())
        }
        BoundExprKind::Column { .. } => Err(SemanticError::ColumnMustBeGrouped(expr.to_string())),
        _ => expr
            .children()
            .into_iter()
            .try_for_each(|child| check_grouped(child, group_by)),
    }
}

fn output_columns(fields: &[BoundField]) -> Vec<SchemaColumn> {
    fields
        .iter()
        .enumerate()
        .map(|(i, f)| SchemaColumn::new(f.name.clone(), i, f.expr.data_type.clone()))
        .collect()
}

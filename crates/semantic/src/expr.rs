// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! Expression binding: name lookup, typing and method resolution.

use std::sync::Arc;

use polyschema_sql_catalog::{Schema, literal_type};
use polyschema_sql_functions::{AggregateResolution, MethodDescriptor, MethodKind, ResolvedMethod};
use polyschema_sql_ir::{BinaryOp, ColumnRef, DataType, Expr, UnaryOp};
use tracing::trace;

use crate::analyzer::{Clause, QueryContext, SemanticAnalyzer};
use crate::bound::{AggregateCall, BoundExpr, BoundExprKind, MethodCall, RefreshCall};
use crate::error::{SemanticError, SemanticResult};
use crate::symbol::{RefreshMethodsSymbol, Symbol, TableSource, TableSymbol, refresh_key};

/// Wrap a nullable boolean so that null reads as `false`
///
/// Binary expressions already produce plain booleans and are left alone.
pub fn as_predicate(expr: BoundExpr) -> BoundExpr {
    let nullable_bool = expr.data_type.is_nullable() && expr.data_type.is_boolean();
    if nullable_bool && !matches!(expr.kind, BoundExprKind::Binary { .. }) {
        BoundExpr::new(BoundExprKind::NullAsFalse(Box::new(expr)), DataType::Boolean)
    } else {
        expr
    }
}

fn is_nullable_case(expr: &BoundExpr) -> bool {
    matches!(expr.kind, BoundExprKind::Case { .. }) && expr.data_type.is_nullable()
}

fn bool_like(ty: &DataType) -> bool {
    ty.is_boolean() || *ty == DataType::Null
}

fn string_like(ty: &DataType) -> bool {
    ty.is_string() || *ty == DataType::Null
}

impl SemanticAnalyzer<'_> {
    /// Bind a condition and check it is boolean
    pub(crate) fn bind_predicate(
        &mut self,
        expr: &Expr,
        ctx: &QueryContext<'_>,
    ) -> SemanticResult<BoundExpr> {
        let bound = as_predicate(self.bind_expr(expr, ctx)?);
        if !bool_like(&bound.data_type) {
            return Err(SemanticError::ExpectedBoolean {
                clause: ctx.clause.to_string(),
                found: bound.data_type.to_string(),
            });
        }
        Ok(bound)
    }

    pub(crate) fn bind_expr(&mut self, expr: &Expr, ctx: &QueryContext<'_>) -> SemanticResult<BoundExpr> {
        match expr {
            Expr::Literal(lit) => Ok(BoundExpr::literal(lit.clone(), literal_type(lit))),

            Expr::Identifier(name) => self.bind_identifier(name, ctx),

            Expr::Column(column) => self.bind_column(column, ctx),

            Expr::Property { expr, name } => {
                let base = self.bind_expr(expr, ctx)?;
                self.bind_property(base, name)
            }

            Expr::BinaryOp { left, op, right } => {
                let mut left = self.bind_expr(left, ctx)?;
                let mut right = self.bind_expr(right, ctx)?;
                if op.is_logical() {
                    left = as_predicate(left);
                    right = as_predicate(right);
                }
                // Equality against a CASE that may yield null compares null-safely
                let op = match op {
                    BinaryOp::Eq if is_nullable_case(&left) || is_nullable_case(&right) => {
                        BinaryOp::IsNotDistinctFrom
                    }
                    BinaryOp::NotEq if is_nullable_case(&left) || is_nullable_case(&right) => {
                        BinaryOp::IsDistinctFrom
                    }
                    other => *other,
                };
                let data_type = self.binary_type(op, &left, &right)?;
                Ok(BoundExpr::new(
                    BoundExprKind::Binary {
                        left: Box::new(left),
                        op,
                        right: Box::new(right),
                    },
                    data_type,
                ))
            }

            Expr::UnaryOp { op, expr } => {
                let operand = self.bind_expr(expr, ctx)?;
                let (operand, data_type) = match op {
                    UnaryOp::Not if bool_like(&operand.data_type) => {
                        (as_predicate(operand), DataType::Boolean)
                    }
                    UnaryOp::Neg if operand.data_type.is_numeric() => {
                        let ty = operand.data_type.clone();
                        (operand, ty)
                    }
                    _ => {
                        return Err(SemanticError::InvalidOperandTypes {
                            op: match op {
                                UnaryOp::Not => "not".to_string(),
                                UnaryOp::Neg => "-".to_string(),
                            },
                            left: String::new(),
                            right: operand.data_type.to_string(),
                        });
                    }
                };
                Ok(BoundExpr::new(
                    BoundExprKind::Unary {
                        op: *op,
                        expr: Box::new(operand),
                    },
                    data_type,
                ))
            }

            Expr::Function {
                name,
                qualifier,
                args,
            } => self.bind_call(name, qualifier.as_deref(), args, ctx),

            Expr::Case {
                conditions,
                results,
                else_result,
            } => self.bind_case(conditions, results, else_result.as_deref(), ctx),

            Expr::Cast { expr, type_name } => {
                let operand = self.bind_expr(expr, ctx)?;
                let target = DataType::parse(type_name)
                    .map_err(|_| SemanticError::UnknownType(type_name.clone()))?;
                let data_type = if operand.data_type.is_nullable() {
                    target.clone().to_nullable()
                } else {
                    target.clone()
                };
                Ok(BoundExpr::new(
                    BoundExprKind::Cast {
                        expr: Box::new(operand),
                        target,
                    },
                    data_type,
                ))
            }

            Expr::Paren(inner) => self.bind_expr(inner, ctx),

            Expr::List(items) => {
                let items = items
                    .iter()
                    .map(|i| self.bind_expr(i, ctx))
                    .collect::<SemanticResult<Vec<_>>>()?;
                let element = self
                    .common_type(items.iter().map(|i| &i.data_type))
                    .map(|t| t.non_nullable().clone())
                    .unwrap_or(DataType::Object);
                Ok(BoundExpr::new(
                    BoundExprKind::List(items),
                    DataType::array_of(element),
                ))
            }

            Expr::FieldLink(index) => {
                if ctx.group_by.is_empty() {
                    return Err(SemanticError::UnsupportedConstruct(format!(
                        "field link ::{} outside a grouped query",
                        index
                    )));
                }
                match index.checked_sub(1).and_then(|i| ctx.group_by.get(i)) {
                    Some(key) => Ok(key.clone()),
                    None => Err(SemanticError::FieldLinkIndexOutOfRange {
                        index: *index,
                        count: ctx.group_by.len(),
                    }),
                }
            }
        }
    }

    /// Narrowest type of a set of values, nullable if any value may be null
    ///
    /// `None` when every value is the null literal.
    fn common_type<'t, I>(&self, types: I) -> Option<DataType>
    where
        I: IntoIterator<Item = &'t DataType>,
    {
        let registry = self.catalog.types();
        let mut nullable = false;
        let mut common: Option<DataType> = None;
        for ty in types {
            nullable |= ty.is_nullable();
            if *ty == DataType::Null {
                continue;
            }
            common = Some(match common {
                None => ty.non_nullable().clone(),
                Some(current) => registry.common_ancestor(&current, ty),
            });
        }
        common.map(|c| if nullable { c.to_nullable() } else { c })
    }

    fn bind_case(
        &mut self,
        conditions: &[Expr],
        results: &[Expr],
        else_result: Option<&Expr>,
        ctx: &QueryContext<'_>,
    ) -> SemanticResult<BoundExpr> {
        let mut branches = Vec::with_capacity(conditions.len());
        for (condition, result) in conditions.iter().zip(results) {
            let condition = as_predicate(self.bind_expr(condition, ctx)?);
            if !bool_like(&condition.data_type) {
                return Err(SemanticError::ExpectedBoolean {
                    clause: "CASE WHEN".to_string(),
                    found: condition.data_type.to_string(),
                });
            }
            branches.push((condition, self.bind_expr(result, ctx)?));
        }
        let else_result = else_result
            .map(|e| self.bind_expr(e, ctx))
            .transpose()?;

        let result_types = branches
            .iter()
            .map(|(_, r)| &r.data_type)
            .chain(else_result.iter().map(|e| &e.data_type));
        let data_type = match self.common_type(result_types) {
            // Without ELSE, unmatched rows yield null
            Some(ty) if else_result.is_none() => ty.to_nullable(),
            Some(ty) => ty,
            None => DataType::Null,
        };

        Ok(BoundExpr::new(
            BoundExprKind::Case {
                branches,
                else_result: else_result.map(Box::new),
            },
            data_type,
        ))
    }

    fn binary_type(
        &self,
        op: BinaryOp,
        left: &BoundExpr,
        right: &BoundExpr,
    ) -> SemanticResult<DataType> {
        let (l, r) = (&left.data_type, &right.data_type);
        let invalid = || SemanticError::InvalidOperandTypes {
            op: op.symbol().to_string(),
            left: l.to_string(),
            right: r.to_string(),
        };
        let (ln, rn) = (l.non_nullable(), r.non_nullable());

        if op.is_arithmetic() {
            let nullable = l.is_nullable() || r.is_nullable();
            let base = match (ln, rn) {
                (a, b) if a.is_numeric() && b.is_numeric() => {
                    self.catalog.types().common_ancestor(a, b)
                }
                (DataType::String, DataType::String) if op == BinaryOp::Add => DataType::String,
                (DataType::Null, other) | (other, DataType::Null)
                    if other.is_numeric() || other.is_string() =>
                {
                    other.clone()
                }
                _ => return Err(invalid()),
            };
            return Ok(if nullable { base.to_nullable() } else { base });
        }

        let ok = match op {
            BinaryOp::And | BinaryOp::Or => bool_like(ln) && bool_like(rn),
            BinaryOp::Like | BinaryOp::NotLike => string_like(ln) && string_like(rn),
            BinaryOp::In | BinaryOp::NotIn => match (&right.kind, rn.element_type()) {
                (BoundExprKind::List(_), Some(element)) => self.comparable(ln, element),
                _ => false,
            },
            BinaryOp::Is | BinaryOp::IsNot => *rn == DataType::Null,
            _ => self.comparable(ln, rn),
        };
        if ok { Ok(DataType::Boolean) } else { Err(invalid()) }
    }

    fn comparable(&self, a: &DataType, b: &DataType) -> bool {
        let types = self.catalog.types();
        let (a, b) = (a.non_nullable(), b.non_nullable());
        a == b
            || *a == DataType::Null
            || *b == DataType::Null
            || matches!(b, DataType::Object)
            || (a.is_numeric() && b.is_numeric())
            || types.is_assignable(a, b)
            || types.is_assignable(b, a)
    }

    fn bind_identifier(&self, name: &str, ctx: &QueryContext<'_>) -> SemanticResult<BoundExpr> {
        let tables = self.source_tables(ctx)?;
        let mut matches: Vec<(&TableSymbol, _)> = tables
            .iter()
            .filter_map(|t| t.column(name).map(|c| (t, c)))
            .collect();

        match matches.len() {
            0 => Err(SemanticError::UnknownColumnOrAlias {
                name: name.to_string(),
                suggestions: self.suggest(name, name_candidates(&tables)),
            }),
            1 => {
                let (table, column) = matches.remove(0);
                Ok(column_expr(&table.alias, column, false))
            }
            _ => Err(SemanticError::AmbiguousColumn(
                name.to_string(),
                matches.iter().map(|(t, _)| t.alias.clone()).collect(),
            )),
        }
    }

    /// Bind `q.name`: a column of alias `q`, or property `name` of column `q`
    fn bind_column(&self, column: &ColumnRef, ctx: &QueryContext<'_>) -> SemanticResult<BoundExpr> {
        let Some(qualifier) = &column.table else {
            return self.bind_identifier(&column.column, ctx);
        };

        let tables = self.source_tables(ctx)?;
        if let Some(table) = tables.iter().find(|t| &t.alias == qualifier) {
            let resolved = table.column(&column.column).ok_or_else(|| {
                SemanticError::UnknownColumnOrAlias {
                    name: column.qualified(),
                    suggestions: self.suggest(&column.column, table.column_names()),
                }
            })?;
            return Ok(column_expr(&table.alias, resolved, true));
        }

        if tables.iter().any(|t| t.column(qualifier).is_some()) {
            let base = self.bind_identifier(qualifier, ctx)?;
            return self.bind_property(base, &column.column);
        }

        if self
            .scopes
            .try_resolve::<TableSymbol>(qualifier, ctx.scope)?
            .is_some()
        {
            return Err(SemanticError::UnsupportedConstruct(format!(
                "'{}' is not part of the current FROM clause",
                qualifier
            )));
        }

        Err(SemanticError::UnknownColumnOrAlias {
            name: qualifier.clone(),
            suggestions: self.suggest(qualifier, name_candidates(&tables)),
        })
    }

    /// Property access on an entity-typed value
    ///
    /// Accessing a property of a nullable value yields a nullable value.
    fn bind_property(&self, base: BoundExpr, name: &str) -> SemanticResult<BoundExpr> {
        let types = self.catalog.types();
        let DataType::Entity(entity) = base.data_type.non_nullable() else {
            return Err(SemanticError::UnknownProperty {
                property: name.to_string(),
                type_name: base.data_type.to_string(),
                suggestions: Vec::new(),
            });
        };
        let property = types.property(entity, name).cloned().ok_or_else(|| {
            let known = types.property_names(entity);
            SemanticError::UnknownProperty {
                property: name.to_string(),
                type_name: entity.clone(),
                suggestions: self.suggest(name, known.iter().map(String::as_str)),
            }
        })?;
        let data_type = if base.data_type.is_nullable() {
            property.to_nullable()
        } else {
            property
        };
        Ok(BoundExpr::new(
            BoundExprKind::Property {
                expr: Box::new(base),
                name: name.to_string(),
            },
            data_type,
        ))
    }

    /// Resolve a call
    ///
    /// Order: aggregates of the active sources' schemas, builtin aggregates,
    /// schema methods with the source row injected, builtin methods, then the
    /// same without injection.
    fn bind_call(
        &mut self,
        name: &str,
        qualifier: Option<&str>,
        args: &[Expr],
        ctx: &QueryContext<'_>,
    ) -> SemanticResult<BoundExpr> {
        let catalog = self.catalog;
        let tables = self.source_tables(ctx)?;
        let sources: Vec<TableSymbol> = match qualifier {
            Some(q) => {
                let table = tables.iter().find(|t| t.alias == q).cloned().ok_or_else(|| {
                    SemanticError::UnknownColumnOrAlias {
                        name: q.to_string(),
                        suggestions: self.suggest(q, tables.iter().map(|t| t.alias.as_str())),
                    }
                })?;
                vec![table]
            }
            None => tables,
        };

        // Schemas providing methods for the sources, first use wins
        let mut schemas: Vec<(&TableSymbol, &Arc<dyn Schema>)> = Vec::new();
        for table in &sources {
            if let TableSource::Schema { schema, .. } = &table.source
                && let Some(provider) = catalog.schema(schema)
                && !schemas.iter().any(|(_, s)| s.name() == provider.name())
            {
                schemas.push((table, provider));
            }
        }

        let is_aggregate = |m: &MethodDescriptor| m.kind == MethodKind::Aggregate;
        let aggregate_named = schemas
            .iter()
            .any(|(_, s)| s.methods().candidates(name).any(is_aggregate))
            || catalog.builtins().candidates(name).any(is_aggregate);

        let arg_ctx = if aggregate_named && ctx.clause.allows_aggregates() {
            ctx.with_clause(Clause::AggregateArgument)
        } else {
            ctx.clone()
        };
        let args = args
            .iter()
            .map(|a| self.bind_expr(a, &arg_ctx))
            .collect::<SemanticResult<Vec<_>>>()?;
        let arg_types: Vec<DataType> = args.iter().map(|a| a.data_type.clone()).collect();
        let types = catalog.types();

        if aggregate_named {
            let resolved = schemas
                .iter()
                .find_map(|(_, s)| {
                    s.resolve_aggregate(name, &arg_types, types)
                        .map(|r| (Some(s.name().to_string()), r))
                })
                .or_else(|| {
                    catalog
                        .builtins()
                        .resolve_aggregate(name, &arg_types, types)
                        .map(|r| (None, r))
                });
            if let Some((schema, resolution)) = resolved {
                return self.bind_aggregate(resolution, schema, args, ctx);
            }
        }

        for (table, provider) in &schemas {
            if let Some(method) = provider.resolve_method(name, &arg_types, Some(&table.row_type), types) {
                let schema = Some(provider.name().to_string());
                return Ok(method_call(method, schema, args, Some(&table.alias)));
            }
        }
        let first = sources.first();
        if let Some(method) =
            catalog
                .builtins()
                .resolve_method(name, &arg_types, first.map(|t| &t.row_type), types)
        {
            return Ok(method_call(method, None, args, first.map(|t| t.alias.as_str())));
        }

        for (_, provider) in &schemas {
            if let Some(method) = provider.resolve_raw_method(name, &arg_types, types) {
                let schema = Some(provider.name().to_string());
                return Ok(method_call(method, schema, args, None));
            }
        }
        if let Some(method) = catalog.builtins().resolve_raw_method(name, &arg_types, types) {
            return Ok(method_call(method, None, args, None));
        }

        let mut known: Vec<String> = schemas
            .iter()
            .flat_map(|(_, s)| s.methods().names())
            .collect();
        known.extend(catalog.builtins().names());
        Err(SemanticError::MethodNotFound {
            name: name.to_string(),
            args: arg_types.iter().map(ToString::to_string).collect(),
            suggestions: self.suggest(name, known.iter().map(String::as_str)),
        })
    }

    /// Bind an aggregate read and record its accumulator update
    fn bind_aggregate(
        &mut self,
        resolution: AggregateResolution,
        schema: Option<String>,
        args: Vec<BoundExpr>,
        ctx: &QueryContext<'_>,
    ) -> SemanticResult<BoundExpr> {
        let AggregateResolution { method, setter } = resolution;
        if !ctx.clause.allows_aggregates() {
            return Err(SemanticError::AggregateNotAllowed {
                name: method.name,
                clause: ctx.clause.to_string(),
            });
        }

        let rendered: Vec<String> = args.iter().map(ToString::to_string).collect();
        let accumulator = format!("{}({})", method.name, rendered.join(", "));
        let alias = ctx.alias.as_deref().ok_or_else(|| {
            SemanticError::UnsupportedConstruct(format!(
                "aggregate '{}' without a FROM source",
                accumulator
            ))
        })?;

        let refresh = RefreshCall {
            setter: setter.name,
            schema: schema.clone(),
            accumulator: accumulator.clone(),
            args: args.clone(),
        };
        trace!(%refresh, %alias, "Registering refresh method");

        let key = refresh_key(alias);
        let registered = self
            .scopes
            .get_scope(ctx.scope)
            .is_some_and(|s| s.find_symbol(&key).is_some());
        if registered {
            self.scopes
                .modify::<RefreshMethodsSymbol, _>(&key, ctx.scope, |r| {
                    r.add(refresh);
                })?;
        } else {
            let mut symbol = RefreshMethodsSymbol::new();
            symbol.add(refresh);
            self.scopes
                .add_symbol(ctx.scope, key, Symbol::RefreshMethods(symbol))?;
        }

        Ok(BoundExpr::new(
            BoundExprKind::Aggregate(AggregateCall {
                name: method.name,
                schema,
                accumulator,
                args,
                signature: method.signature,
            }),
            method.return_type,
        ))
    }
}

fn column_expr(alias: &str, column: polyschema_sql_ir::SchemaColumn, qualify: bool) -> BoundExpr {
    BoundExpr::new(
        BoundExprKind::Column {
            alias: alias.to_string(),
            name: column.name,
            ordinal: column.ordinal,
            qualify,
        },
        column.data_type,
    )
}

fn method_call(
    method: ResolvedMethod,
    schema: Option<String>,
    args: Vec<BoundExpr>,
    source: Option<&str>,
) -> BoundExpr {
    let source_alias = if method.injects_source() {
        source.map(str::to_string)
    } else {
        None
    };
    BoundExpr::new(
        BoundExprKind::Call(MethodCall {
            name: method.name,
            schema,
            args,
            source_alias,
            roles: method.roles,
            signature: method.signature,
        }),
        method.return_type,
    )
}

/// Column names and aliases of the active sources
fn name_candidates(tables: &[TableSymbol]) -> impl Iterator<Item = &str> {
    tables
        .iter()
        .flat_map(|t| t.column_names().chain(std::iter::once(t.alias.as_str())))
}

// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! GROUP BY lowering
//!
//! A grouped select becomes two phases over two transition tables:
//!
//! ```text
//! CreateTransitionTable G (keys.., accumulators..) for grouping
//! Aggregate into G from <source> keys (..) refresh (..)
//! CreateTransitionTable S (fields..)
//! Populate S from G where <having> select (..)
//! ```
//!
//! In the second phase a GROUP BY key reads [`BoundExprKind::GroupField`] and
//! an aggregate reads its accumulator column of `G`.

use polyschema_sql_ir::{DataType, SchemaColumn};
use polyschema_sql_semantic::{
    AggregateCall, BoundExpr, BoundExprKind, BoundQuery, BoundSelect, Grouping, RefreshCall,
};
use tracing::debug;

use crate::columns::{Relation, rewrite, rewrite_all};
use crate::engine::{Destination, LoweringEngine};
use crate::error::{LoweringError, LoweringResult};
use crate::plan::{AggregateStep, PlanNode, PopulateStep, ScanSource};

impl LoweringEngine<'_> {
    pub(crate) fn lower_grouped(
        &mut self,
        select: &BoundSelect,
        query: &BoundQuery,
        relation: &Relation,
        refresh: Vec<RefreshCall>,
        destination: Destination,
    ) -> LoweringResult<String> {
        let relations = [relation];
        let keys = match select.grouping {
            Grouping::Implicit => Vec::new(),
            _ => select.group_by.clone(),
        };

        let outputs = select
            .fields
            .iter()
            .map(|f| &f.expr)
            .chain(select.having.as_ref())
            .chain(query.order_by.iter().map(|o| &o.expr));
        let aggregates = distinct_aggregates(outputs);

        let mut columns: Vec<SchemaColumn> = keys
            .iter()
            .enumerate()
            .map(|(i, key)| SchemaColumn::new(key.to_string(), i, key.data_type.clone()))
            .collect();
        columns.extend(aggregates.iter().enumerate().map(|(i, (call, ty))| {
            SchemaColumn::new(call.accumulator.clone(), keys.len() + i, ty.clone())
        }));

        let group_table = self.ctx.next_table("group");
        self.ctx.emit(PlanNode::CreateTransitionTable {
            name: group_table.clone(),
            columns,
            for_grouping: true,
        });

        let seeded = aggregates
            .iter()
            .map(|(call, _)| {
                let mut call = call.clone();
                call.args = rewrite_all(&call.args, &relations)?;
                Ok(call)
            })
            .collect::<LoweringResult<Vec<AggregateCall>>>()?;
        let refresh = refresh
            .into_iter()
            .map(|mut call| {
                call.args = rewrite_all(&call.args, &relations)?;
                Ok(call)
            })
            .collect::<LoweringResult<Vec<_>>>()?;
        let filter = select
            .where_clause
            .as_ref()
            .map(|w| rewrite(w, &relations))
            .transpose()?;

        debug!(
            table = %group_table,
            keys = keys.len(),
            accumulators = seeded.len(),
            refresh = refresh.len(),
            "Lowered aggregation"
        );
        self.ctx.emit(PlanNode::Aggregate(AggregateStep {
            target: group_table.clone(),
            source: relation.scan.clone(),
            filter,
            keys: rewrite_all(&keys, &relations)?,
            aggregates: seeded,
            refresh,
        }));

        let projection = select
            .fields
            .iter()
            .map(|f| regroup(&f.expr, &keys, &group_table))
            .collect::<LoweringResult<Vec<_>>>()?;
        let having = select
            .having
            .as_ref()
            .map(|h| regroup(h, &keys, &group_table))
            .transpose()?;
        let order_by = query
            .order_by
            .iter()
            .map(|o| {
                let mut order = o.clone();
                order.expr = regroup(&o.expr, &keys, &group_table)?;
                Ok(order)
            })
            .collect::<LoweringResult<Vec<_>>>()?;

        let target = self.destination(destination, "score", &query.output);
        self.ctx.emit(PlanNode::Populate(PopulateStep {
            target: target.clone(),
            source: ScanSource::Transition {
                alias: select.from.alias().to_string(),
                table: group_table,
            },
            filter: having,
            skip: query.skip,
            take: query.take,
            select: projection,
            order_by,
        }));
        Ok(target)
    }
}

/// Aggregate reads of the outputs, first occurrence per accumulator
fn distinct_aggregates<'e, I>(exprs: I) -> Vec<(AggregateCall, DataType)>
where
    I: IntoIterator<Item = &'e BoundExpr>,
{
    let mut aggregates: Vec<(AggregateCall, DataType)> = Vec::new();
    for expr in exprs {
        expr.visit(&mut |e| {
            if let BoundExprKind::Aggregate(call) = &e.kind
                && !aggregates
                    .iter()
                    .any(|(seen, _)| seen.accumulator == call.accumulator)
            {
                aggregates.push((call.clone(), e.data_type.clone()));
            }
        });
    }
    aggregates
}

/// Rewrite an output expression to read the current group
fn regroup(expr: &BoundExpr, keys: &[BoundExpr], group_table: &str) -> LoweringResult<BoundExpr> {
    let rewritten = regroup_node(expr, keys, group_table);

    let mut ungrouped = None;
    rewritten.visit(&mut |e| {
        if let BoundExprKind::Column { alias, name, .. } = &e.kind {
            ungrouped.get_or_insert_with(|| LoweringError::UnsupportedConstruct(format!(
                "column '{}.{}' read outside its group",
                alias, name
            )));
        }
    });
    match ungrouped {
        Some(err) => Err(err),
        None => Ok(rewritten),
    }
}

fn regroup_node(expr: &BoundExpr, keys: &[BoundExpr], group_table: &str) -> BoundExpr {
    if let Some(index) = keys.iter().position(|key| key.same_value(expr)) {
        return BoundExpr::new(BoundExprKind::GroupField(index), expr.data_type.clone());
    }
    match &expr.kind {
        BoundExprKind::Aggregate(call) => BoundExpr::new(
            BoundExprKind::TransitionColumn {
                table: group_table.to_string(),
                name: call.accumulator.clone(),
            },
            expr.data_type.clone(),
        ),
        _ => expr
            .clone()
            .map_children(&mut |child| regroup_node(&child, keys, group_table)),
    }
}

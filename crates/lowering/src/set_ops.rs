// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! Set-operator lowering
//!
//! The left operand is lowered into a fresh table `t`; a left-associated
//! chain therefore keeps appending to the table of its leftmost operand.
//! The right operand is written positionally into `t` or into a table `r`
//! declared with the left operand's columns, so key columns name the same
//! column on both sides.
//!
//! | Operator    | Right operand | Step                                   |
//! |-------------|---------------|----------------------------------------|
//! | `UNION ALL` | into `t`      | none                                   |
//! | `UNION`     | into `r`      | `t += r` where key absent in `t`       |
//! | `INTERSECT` | into `r`      | `u := r` where key present in `t`      |
//! | `EXCEPT`    | into `r`      | `u := t` where key absent in `r`       |

use polyschema_sql_semantic::{BoundExpr, BoundExprKind, BoundQuery, BoundSetOperation, SetOperator};
use tracing::debug;

use crate::engine::{Destination, LoweringEngine};
use crate::error::LoweringResult;
use crate::plan::{PlanNode, PopulateStep, Presence, ScanSource, SetMatchStep};

impl LoweringEngine<'_> {
    /// Lower a set operation and return the table holding its rows
    pub(crate) fn lower_set_operation(
        &mut self,
        operation: &BoundSetOperation,
    ) -> LoweringResult<String> {
        let left = self.lower_query(&operation.left, Destination::Fresh)?;

        let result = match operation.operator {
            SetOperator::UnionAll => {
                self.lower_query(&operation.right, Destination::Existing(left.clone()))?;
                left
            }
            SetOperator::Union => {
                let right = self.lower_right_operand(operation)?;
                self.emit_match(&left, right, left.clone(), &operation.keys, Presence::Absent);
                left
            }
            SetOperator::Intersect => {
                let right = self.lower_right_operand(operation)?;
                let target = self.destination(Destination::Fresh, "intersect", &operation.left.output);
                self.emit_match(&target, right, left, &operation.keys, Presence::Present);
                target
            }
            SetOperator::Except => {
                let right = self.lower_right_operand(operation)?;
                let target = self.destination(Destination::Fresh, "except", &operation.left.output);
                self.emit_match(&target, left, right, &operation.keys, Presence::Absent);
                target
            }
        };

        debug!(operator = %operation.operator, %result, "Lowered set operator");
        Ok(result)
    }

    /// Lower the right operand into a table shaped like the left output
    fn lower_right_operand(&mut self, operation: &BoundSetOperation) -> LoweringResult<String> {
        let table = self.destination(Destination::Fresh, "select", &operation.left.output);
        self.lower_query(&operation.right, Destination::Existing(table.clone()))
    }

    fn emit_match(
        &mut self,
        target: &str,
        source: String,
        probe: String,
        keys: &[String],
        expected: Presence,
    ) {
        self.ctx.emit(PlanNode::SetMatch(SetMatchStep {
            target: target.to_string(),
            source,
            probe,
            key_columns: keys.to_vec(),
            expected,
        }));
    }

    /// Apply the ORDER BY, SKIP and TAKE of a set-operator query
    ///
    /// The rows are copied into the destination when the query sorts or
    /// pages them, or when they must land in an existing table.
    pub(crate) fn finish_set_query(
        &mut self,
        query: &BoundQuery,
        table: String,
        destination: Destination,
    ) -> LoweringResult<String> {
        let copy = !query.order_by.is_empty()
            || query.skip.is_some()
            || query.take.is_some()
            || matches!(destination, Destination::Existing(_));
        if !copy {
            return Ok(table);
        }

        let read = |expr: BoundExpr| match expr.kind {
            BoundExprKind::OutputField { name, .. } => BoundExpr::new(
                BoundExprKind::TransitionColumn {
                    table: table.clone(),
                    name,
                },
                expr.data_type,
            ),
            _ => expr,
        };
        let select = query
            .output
            .iter()
            .map(|c| {
                BoundExpr::new(
                    BoundExprKind::TransitionColumn {
                        table: table.clone(),
                        name: c.name.clone(),
                    },
                    c.data_type.clone(),
                )
            })
            .collect();
        let order_by = query
            .order_by
            .iter()
            .map(|o| {
                let mut order = o.clone();
                order.expr = o.expr.clone().transform_up(&mut |e| read(e));
                order
            })
            .collect();

        let target = self.destination(destination, "result", &query.output);
        self.ctx.emit(PlanNode::Populate(PopulateStep {
            target: target.clone(),
            source: ScanSource::Transition {
                alias: table.clone(),
                table,
            },
            filter: None,
            skip: query.skip,
            take: query.take,
            select,
            order_by,
        }));
        Ok(target)
    }
}

// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! Join and apply lowering
//!
//! A left-deep chain `((a ⋈ b) ⋈ c)` is lowered leftmost pair first. Each
//! pair becomes a transition table trimmed to the columns read downstream
//! and a nested-loop [`PopulateStep`] filling it. The table of one pair is
//! the left input of the next.

use polyschema_sql_ir::{ApplyType, JoinType, SchemaColumn};
use polyschema_sql_semantic::{BoundExpr, BoundFrom, InMemoryOrigin, ScopeId};
use tracing::debug;

use crate::columns::{ColumnNeeds, Relation, qualified_name, rewrite, rewrite_all, trimmed_columns};
use crate::engine::{Destination, LoweringEngine};
use crate::error::LoweringResult;
use crate::plan::{JoinSide, LoopKind, NestedLoop, Padding, PlanNode, PopulateStep, ScanSource};

impl LoweringEngine<'_> {
    /// Lower a FROM clause into the relation later steps scan
    ///
    /// `needs` holds the columns read after this source is built. `outer` is
    /// the left input of an enclosing apply; schema arguments may read it.
    pub(crate) fn lower_from(
        &mut self,
        scope: ScopeId,
        from: &BoundFrom,
        needs: &ColumnNeeds,
        outer: Option<&Relation>,
    ) -> LoweringResult<Relation> {
        match from {
            BoundFrom::Schema {
                alias,
                schema,
                method,
                args,
                ..
            } => {
                let args = match outer {
                    Some(outer) => rewrite_all(args, &[outer])?,
                    None => args.clone(),
                };
                Ok(Relation::leaf(
                    alias,
                    ScanSource::Schema {
                        alias: alias.clone(),
                        schema: schema.clone(),
                        method: method.clone(),
                        args,
                    },
                ))
            }

            BoundFrom::InMemory {
                alias,
                table,
                origin,
                ..
            } => {
                let scan = match origin {
                    InMemoryOrigin::Cte => ScanSource::Transition {
                        alias: alias.clone(),
                        table: table.clone(),
                    },
                    InMemoryOrigin::Host => ScanSource::InMemory {
                        alias: alias.clone(),
                        table: table.clone(),
                    },
                };
                Ok(Relation::leaf(alias, scan))
            }

            BoundFrom::Subquery { alias, query, .. } => {
                let table = self.lower_query(query, Destination::Fresh)?;
                debug!(%alias, %table, "Lowered nested query");
                Ok(Relation::leaf(
                    alias,
                    ScanSource::Transition {
                        alias: alias.clone(),
                        table,
                    },
                ))
            }

            BoundFrom::Join {
                alias,
                left,
                right,
                join_type,
                on,
            } => {
                let kind = match join_type {
                    JoinType::Inner => LoopKind::InnerJoin,
                    JoinType::LeftOuter => LoopKind::LeftOuterJoin,
                    JoinType::RightOuter => LoopKind::RightOuterJoin,
                };
                self.lower_pair(scope, alias, left, right, kind, Some(on), needs, outer)
            }

            BoundFrom::Apply {
                alias,
                left,
                right,
                apply_type,
            } => {
                let kind = match apply_type {
                    ApplyType::Cross => LoopKind::CrossApply,
                    ApplyType::Outer => LoopKind::OuterApply,
                };
                self.lower_pair(scope, alias, left, right, kind, None, needs, outer)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn lower_pair(
        &mut self,
        scope: ScopeId,
        alias: &str,
        left: &BoundFrom,
        right: &BoundFrom,
        kind: LoopKind,
        on: Option<&BoundExpr>,
        needs: &ColumnNeeds,
        outer: Option<&Relation>,
    ) -> LoweringResult<Relation> {
        // Both inputs must also carry what this pair itself evaluates
        let mut input_needs = needs.with_exprs(on);
        input_needs.collect_all(source_args(right));

        let left_rel = self.lower_from(scope, left, &input_needs, outer)?;
        let right_outer = match kind {
            LoopKind::CrossApply | LoopKind::OuterApply => Some(&left_rel),
            _ => outer,
        };
        let right_rel = self.lower_from(scope, right, &input_needs, right_outer)?;

        let mut leaves = left_rel.leaves.clone();
        leaves.extend(right_rel.leaves.iter().cloned());

        let sources = trimmed_columns(self.scopes, scope, &leaves, needs)?;
        let columns: Vec<SchemaColumn> = sources
            .iter()
            .enumerate()
            .map(|(i, (leaf, c))| {
                SchemaColumn::new(qualified_name(leaf, &c.name), i, c.data_type.clone())
            })
            .collect();
        let select = sources
            .iter()
            .map(|(leaf, c)| {
                if left_rel.carries(leaf) {
                    left_rel.read(leaf, c)
                } else {
                    right_rel.read(leaf, c)
                }
            })
            .collect();

        let mut relations = vec![&left_rel, &right_rel];
        relations.extend(outer);
        let predicate = on.map(|on| rewrite(on, &relations)).transpose()?;

        let padded_side = |side: &Relation| -> Vec<SchemaColumn> {
            columns
                .iter()
                .zip(&sources)
                .filter(|(_, (leaf, _))| side.carries(leaf))
                .map(|(column, _)| column.clone())
                .collect()
        };
        let padding = match kind {
            LoopKind::LeftOuterJoin | LoopKind::OuterApply => Some(Padding {
                preserved: JoinSide::Left,
                nulls: padded_side(&right_rel),
            }),
            LoopKind::RightOuterJoin => Some(Padding {
                preserved: JoinSide::Right,
                nulls: padded_side(&left_rel),
            }),
            LoopKind::InnerJoin | LoopKind::CrossApply => None,
        };

        let table = self.ctx.next_table("join");
        debug!(%alias, %table, %kind, columns = columns.len(), "Lowered join step");
        self.ctx.emit(PlanNode::CreateTransitionTable {
            name: table.clone(),
            columns,
            for_grouping: false,
        });
        self.ctx.emit(PlanNode::Populate(PopulateStep {
            target: table.clone(),
            source: ScanSource::NestedLoop(Box::new(NestedLoop {
                kind,
                left: left_rel.scan,
                right: right_rel.scan,
                predicate,
                padding,
            })),
            filter: None,
            skip: None,
            take: None,
            select,
            order_by: Vec::new(),
        }));

        Ok(Relation::transition(alias, table, leaves))
    }
}

/// Arguments of the schema sources of a FROM subtree
fn source_args(from: &BoundFrom) -> Vec<&BoundExpr> {
    match from {
        BoundFrom::Schema { args, .. } => args.iter().collect(),
        BoundFrom::Join { left, right, .. } | BoundFrom::Apply { left, right, .. } => {
            let mut args = source_args(left);
            args.extend(source_args(right));
            args
        }
        BoundFrom::InMemory { .. } | BoundFrom::Subquery { .. } => Vec::new(),
    }
}

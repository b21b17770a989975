// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! Query-level driver of the lowering pass
//!
//! Each query goes `Start -> join/apply chain? -> grouped or plain
//! projection -> Done`. CTEs are lowered first, in declaration order, and
//! exposed under their declared names with a [`PlanNode::Rename`].

use polyschema_sql_ir::SchemaColumn;
use polyschema_sql_semantic::{
    BoundBody, BoundCte, BoundQuery, BoundSelect, RefreshCall, RefreshMethodsSymbol, ScopeManager,
    refresh_key,
};
use tracing::{debug, instrument};

use crate::columns::{ColumnNeeds, Relation, rewrite, rewrite_all};
use crate::context::{LoweringConfig, LoweringContext};
use crate::error::LoweringResult;
use crate::plan::{Plan, PlanNode, PopulateStep};

/// Scope attribute recording the table that holds a query's rows
pub const TRANSITION_TABLE_ATTRIBUTE: &str = "transitionTable";

/// Where a query writes its rows
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// A new table shaped like the query output
    Fresh,
    /// An existing table with compatible columns
    Existing(String),
}

/// Lowers one bound query into a plan
///
/// The engine owns the symbol table for the duration of the pass and
/// records the result table of every query as a scope attribute.
pub struct LoweringEngine<'s> {
    pub(crate) scopes: &'s mut ScopeManager,
    pub(crate) ctx: LoweringContext,
}

impl<'s> LoweringEngine<'s> {
    pub fn new(scopes: &'s mut ScopeManager, config: LoweringConfig) -> Self {
        Self {
            scopes,
            ctx: LoweringContext::new(config),
        }
    }

    /// Lower the query, consuming the engine
    #[instrument(skip_all)]
    pub fn lower(mut self, query: &BoundQuery) -> LoweringResult<Plan> {
        let result = self.lower_query(query, Destination::Fresh)?;
        let nodes = self.ctx.into_nodes();
        debug!(nodes = nodes.len(), %result, "Lowered query");
        Ok(Plan {
            nodes,
            result,
            output: query.output.clone(),
        })
    }

    /// Lower a query and return the table holding its rows
    pub(crate) fn lower_query(
        &mut self,
        query: &BoundQuery,
        destination: Destination,
    ) -> LoweringResult<String> {
        self.ctx.enter_recursive_context("query lowering")?;
        let result = self.lower_query_body(query, destination);
        self.ctx.exit_recursive_context();

        let table = result?;
        self.scopes
            .set_attribute(query.scope, TRANSITION_TABLE_ATTRIBUTE, table.clone())?;
        Ok(table)
    }

    fn lower_query_body(
        &mut self,
        query: &BoundQuery,
        destination: Destination,
    ) -> LoweringResult<String> {
        for cte in &query.ctes {
            self.lower_cte(cte)?;
        }

        match &query.body {
            BoundBody::Select(select) => self.lower_select(select, query, destination),
            BoundBody::SetOperation(operation) => {
                let table = self.lower_set_operation(operation)?;
                self.finish_set_query(query, table, destination)
            }
        }
    }

    fn lower_cte(&mut self, cte: &BoundCte) -> LoweringResult<()> {
        let table = self.lower_query(&cte.query, Destination::Fresh)?;
        debug!(cte = %cte.name, %table, "Lowered CTE");
        self.ctx.emit(PlanNode::Rename {
            from: table,
            to: cte.name.clone(),
        });
        Ok(())
    }

    fn lower_select(
        &mut self,
        select: &BoundSelect,
        query: &BoundQuery,
        destination: Destination,
    ) -> LoweringResult<String> {
        let refresh = self.refresh_calls(select)?;

        let mut needs = ColumnNeeds::new();
        needs.collect_all(select.where_clause.iter());
        needs.collect_all(select.fields.iter().map(|f| &f.expr));
        needs.collect_all(select.group_by.iter());
        needs.collect_all(select.having.iter());
        needs.collect_all(query.order_by.iter().map(|o| &o.expr));
        needs.collect_all(refresh.iter().flat_map(|r| r.args.iter()));

        let relation = self.lower_from(select.scope, &select.from, &needs, None)?;

        if select.is_grouped() {
            self.lower_grouped(select, query, &relation, refresh, destination)
        } else {
            self.lower_projection(select, query, &relation, destination)
        }
    }

    fn lower_projection(
        &mut self,
        select: &BoundSelect,
        query: &BoundQuery,
        relation: &Relation,
        destination: Destination,
    ) -> LoweringResult<String> {
        let relations = [relation];
        let filter = select
            .where_clause
            .as_ref()
            .map(|w| rewrite(w, &relations))
            .transpose()?;
        let projection = rewrite_all(select.fields.iter().map(|f| &f.expr), &relations)?;
        let order_by = query
            .order_by
            .iter()
            .map(|o| {
                let mut order = o.clone();
                order.expr = rewrite(&o.expr, &relations)?;
                Ok(order)
            })
            .collect::<LoweringResult<Vec<_>>>()?;

        let target = self.destination(destination, "select", &query.output);
        debug!(%target, fields = projection.len(), "Lowered projection");
        self.ctx.emit(PlanNode::Populate(PopulateStep {
            target: target.clone(),
            source: relation.scan.clone(),
            filter,
            skip: query.skip,
            take: query.take,
            select: projection,
            order_by,
        }));
        Ok(target)
    }

    /// Resolve a destination, declaring a fresh table when needed
    pub(crate) fn destination(
        &mut self,
        destination: Destination,
        role: &str,
        columns: &[SchemaColumn],
    ) -> String {
        match destination {
            Destination::Fresh => {
                let name = self.ctx.next_table(role);
                self.ctx.emit(PlanNode::CreateTransitionTable {
                    name: name.clone(),
                    columns: columns.to_vec(),
                    for_grouping: false,
                });
                name
            }
            Destination::Existing(name) => name,
        }
    }

    /// Accumulator updates registered for the FROM source of a select
    fn refresh_calls(&self, select: &BoundSelect) -> LoweringResult<Vec<RefreshCall>> {
        let key = refresh_key(select.from.alias());
        Ok(self
            .scopes
            .try_resolve::<RefreshMethodsSymbol>(&key, select.scope)?
            .map(|symbol| symbol.calls.clone())
            .unwrap_or_default())
    }
}

/// Lower a bound query into a plan
///
/// The scope tree must be the one the query was bound in. The result table
/// of every lowered query is recorded on its scope under
/// [`TRANSITION_TABLE_ATTRIBUTE`].
pub fn lower(
    scopes: &mut ScopeManager,
    query: &BoundQuery,
    config: &LoweringConfig,
) -> LoweringResult<Plan> {
    LoweringEngine::new(scopes, config.clone()).lower(query)
}

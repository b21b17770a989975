// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! Test fixtures: sample queries over the standard mock catalog
//!
//! Each fixture documents the query text it builds.

use polyschema_sql_ir::{
    ApplyType, BinaryOp, CommonTableExpr, Expr, FromSource, JoinType, OrderBy, Query,
    SelectStatement,
};

/// Sample queries for testing
pub struct QueryFixtures;

impl QueryFixtures {
    // ===== Basic SELECT queries =====

    /// `select Name, City from #A.entities() a`
    pub fn simple_select() -> Query {
        Query::select(
            SelectStatement::new()
                .select(Expr::ident("Name"))
                .select(Expr::ident("City"))
                .with_from(Self::entities("a")),
        )
    }

    /// `select * from #A.entities()`
    pub fn select_all() -> Query {
        Query::select(
            SelectStatement::new()
                .select_all()
                .with_from(FromSource::schema("A", "entities", vec![])),
        )
    }

    /// `select a.Name from #A.entities() a where a.Population > 1000`
    pub fn select_with_where() -> Query {
        Query::select(
            SelectStatement::new()
                .select(Expr::column("a", "Name"))
                .with_from(Self::entities("a"))
                .with_where(Expr::binary(
                    Expr::column("a", "Population"),
                    BinaryOp::Gt,
                    Expr::int(1000),
                )),
        )
    }

    /// `select Name from #A.entities() a order by Name desc skip 1 take 2`
    pub fn select_with_paging() -> Query {
        Query::select(
            SelectStatement::new()
                .select(Expr::ident("Name"))
                .with_from(Self::entities("a")),
        )
        .with_order_by(vec![OrderBy::desc(Expr::ident("Name"))])
        .with_skip(1)
        .with_take(2)
    }

    // ===== JOIN queries =====

    /// `select a.Name, b.Amount from #A.entities() a <join> #B.orders() b on a.Id = b.PersonId`
    pub fn join(join_type: JoinType) -> Query {
        Query::select(
            SelectStatement::new()
                .select(Expr::column("a", "Name"))
                .select(Expr::column("b", "Amount"))
                .with_from(Self::entities("a").join(
                    Self::orders("b"),
                    join_type,
                    Expr::eq(Expr::column("a", "Id"), Expr::column("b", "PersonId")),
                )),
        )
    }

    /// `select a.Name, i.Label from #A.entities() a cross apply #A.items(a.Id) i`
    pub fn cross_apply() -> Query {
        Query::select(
            SelectStatement::new()
                .select(Expr::column("a", "Name"))
                .select(Expr::column("i", "Label"))
                .with_from(Self::entities("a").apply(
                    FromSource::schema("A", "items", vec![Expr::column("a", "Id")])
                        .with_alias("i"),
                    ApplyType::Cross,
                )),
        )
    }

    // ===== Aggregation queries =====

    /// `select City, Count(City) from #A.entities() a group by City`
    pub fn group_by_city() -> Query {
        Query::select(
            SelectStatement::new()
                .select(Expr::ident("City"))
                .select(Expr::call("Count", vec![Expr::ident("City")]))
                .with_from(Self::entities("a"))
                .with_group_by(vec![Expr::ident("City")]),
        )
    }

    /// `select Country, Sum(Population) from #A.entities() a group by Country having Sum(Population) > 100`
    pub fn group_by_with_having() -> Query {
        Query::select(
            SelectStatement::new()
                .select(Expr::ident("Country"))
                .select(Expr::call("Sum", vec![Expr::ident("Population")]))
                .with_from(Self::entities("a"))
                .with_group_by(vec![Expr::ident("Country")])
                .with_having(Expr::binary(
                    Expr::call("Sum", vec![Expr::ident("Population")]),
                    BinaryOp::Gt,
                    Expr::int(100),
                )),
        )
    }

    /// `select Count(Name) from #A.entities() a`
    pub fn implicit_group() -> Query {
        Query::select(
            SelectStatement::new()
                .select(Expr::call("Count", vec![Expr::ident("Name")]))
                .with_from(Self::entities("a")),
        )
    }

    // ===== Set operations =====

    /// `select Name, City from #A.entities() a <op> (Name) select Name, City from #A.entities() b`
    pub fn union(all: bool) -> Query {
        Query::union(Self::name_city("a"), Self::name_city("b"), all, &["Name"])
    }

    pub fn intersect() -> Query {
        Query::intersect(Self::name_city("a"), Self::name_city("b"), &["Name"])
    }

    pub fn except() -> Query {
        Query::except(Self::name_city("a"), Self::name_city("b"), &["Name"])
    }

    // ===== CTEs =====

    /// `with p as (select Name, City from #A.entities() a) select Name from p`
    pub fn simple_cte() -> Query {
        Query::select(
            SelectStatement::new()
                .select(Expr::ident("Name"))
                .with_from(FromSource::in_memory("p")),
        )
        .with_ctes([CommonTableExpr::new("p", Self::name_city("a"))])
    }

    // ===== Building blocks =====

    /// `#A.entities() alias`
    pub fn entities(alias: &str) -> FromSource {
        FromSource::schema("A", "entities", vec![]).with_alias(alias)
    }

    /// `#B.orders() alias`
    pub fn orders(alias: &str) -> FromSource {
        FromSource::schema("B", "orders", vec![]).with_alias(alias)
    }

    /// `select Name, City from #A.entities() alias`
    pub fn name_city(alias: &str) -> Query {
        Query::select(
            SelectStatement::new()
                .select(Expr::ident("Name"))
                .select(Expr::ident("City"))
                .with_from(Self::entities(alias)),
        )
    }
}

// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! Integration tests for the lowering layer
//!
//! Queries are bound against the standard mock catalog, then lowered.

use polyschema_sql_ir::{
    ApplyType, CommonTableExpr, DataType, Expr, FromSource, JoinType, OrderBy, Query, SelectStatement,
};
use polyschema_sql_lowering::{
    AggregateStep, JoinSide, LoopKind, LoweringConfig, LoweringError, Plan, PlanNode,
    PopulateStep, Presence, ScanSource, SetMatchStep, TRANSITION_TABLE_ATTRIBUTE, lower,
};
use polyschema_sql_semantic::{Analysis, AnalyzerConfig, BoundBody, BoundExprKind, SemanticAnalyzer};
use polyschema_sql_test_utils::{
    MockCatalogBuilder, QueryFixtures, assert_column_types, assert_columns,
};

fn analyze(query: &Query) -> Analysis {
    let catalog = MockCatalogBuilder::new().with_standard_schema().build();
    SemanticAnalyzer::new(&catalog, AnalyzerConfig::default())
        .analyze(query)
        .expect("query binds")
}

fn lower_with(query: &Query, config: &LoweringConfig) -> (Plan, Analysis) {
    let mut analysis = analyze(query);
    let plan = lower(&mut analysis.scopes, &analysis.query, config).expect("query lowers");
    (plan, analysis)
}

fn lower_query(query: &Query) -> Plan {
    lower_with(query, &LoweringConfig::default()).0
}

fn populate(node: &PlanNode) -> &PopulateStep {
    match node {
        PlanNode::Populate(step) => step,
        other => panic!("Expected Populate, found {}", other),
    }
}

fn aggregate(node: &PlanNode) -> &AggregateStep {
    match node {
        PlanNode::Aggregate(step) => step,
        other => panic!("Expected Aggregate, found {}", other),
    }
}

fn set_match(node: &PlanNode) -> &SetMatchStep {
    match node {
        PlanNode::SetMatch(step) => step,
        other => panic!("Expected SetMatch, found {}", other),
    }
}

/// One letter per node: C(reate), P(opulate), A(ggregate), M(atch), R(ename)
fn shape(plan: &Plan) -> String {
    plan.nodes
        .iter()
        .map(|node| match node {
            PlanNode::CreateTransitionTable { .. } => 'C',
            PlanNode::Populate(_) => 'P',
            PlanNode::Aggregate(_) => 'A',
            PlanNode::SetMatch(_) => 'M',
            PlanNode::Rename { .. } => 'R',
        })
        .collect()
}

fn transition_column(table: &str, name: &str) -> BoundExprKind {
    BoundExprKind::TransitionColumn {
        table: table.to_string(),
        name: name.to_string(),
    }
}

// ===== Plain projection =====

#[test]
fn test_simple_select_plan() {
    let plan = lower_query(&QueryFixtures::simple_select());

    assert_eq!(shape(&plan), "CP");
    assert_eq!(plan.result, "__t0_select");
    assert_column_types(
        plan.table_columns("__t0_select").expect("declared"),
        &[("Name", DataType::String), ("City", DataType::String)],
    );

    let step = populate(&plan.nodes[1]);
    assert_eq!(step.target, "__t0_select");
    assert!(matches!(
        &step.source,
        ScanSource::Schema { alias, schema, method, .. }
            if alias == "a" && schema == "A" && method == "entities"
    ));
    assert!(matches!(
        &step.select[0].kind,
        BoundExprKind::Column { alias, name, .. } if alias == "a" && name == "Name"
    ));
    assert!(step.filter.is_none());
}

#[test]
fn test_where_and_paging_stay_on_the_projection() {
    let plan = lower_query(&QueryFixtures::select_with_where());
    assert!(populate(&plan.nodes[1]).filter.is_some());

    let plan = lower_query(&QueryFixtures::select_with_paging());
    let step = populate(&plan.nodes[1]);
    assert_eq!(step.skip, Some(1));
    assert_eq!(step.take, Some(2));
    assert_eq!(step.order_by.len(), 1);
}

#[test]
fn test_custom_table_prefix() {
    let config = LoweringConfig {
        transition_table_prefix: "tmp_".to_string(),
        ..LoweringConfig::default()
    };
    let (plan, _) = lower_with(&QueryFixtures::simple_select(), &config);
    assert_eq!(plan.result, "tmp_0_select");
}

#[test]
fn test_result_table_recorded_on_scope() {
    let (plan, analysis) = lower_with(&QueryFixtures::simple_select(), &LoweringConfig::default());
    assert_eq!(
        analysis
            .scopes
            .attribute(analysis.query.scope, TRANSITION_TABLE_ATTRIBUTE),
        Some(plan.result.as_str())
    );
}

#[test]
fn test_lowering_is_deterministic() {
    let query = QueryFixtures::group_by_with_having();
    assert_eq!(lower_query(&query), lower_query(&query));
}

// ===== Joins and applies =====

#[test]
fn test_join_tables_are_trimmed_to_downstream_columns() {
    // select a.Name, b.Amount from #A.entities() a
    //   inner join #B.orders() b on a.Id = b.PersonId
    //   inner join recent r on r.Name = a.Name
    let from = QueryFixtures::entities("a")
        .join(
            QueryFixtures::orders("b"),
            JoinType::Inner,
            Expr::eq(Expr::column("a", "Id"), Expr::column("b", "PersonId")),
        )
        .join(
            FromSource::in_memory("recent").with_alias("r"),
            JoinType::Inner,
            Expr::eq(Expr::column("r", "Name"), Expr::column("a", "Name")),
        );
    let query = Query::select(
        SelectStatement::new()
            .select(Expr::column("a", "Name"))
            .select(Expr::column("b", "Amount"))
            .with_from(from),
    );
    let plan = lower_query(&query);

    assert_eq!(shape(&plan), "CPCPCP");

    // The first pair keeps a.Name for the second ON, but not its own keys
    assert_column_types(
        plan.table_columns("__t0_join").expect("first pair"),
        &[("a.Name", DataType::String), ("b.Amount", DataType::Decimal)],
    );
    assert_columns(
        plan.table_columns("__t1_join").expect("second pair"),
        &["a.Name", "b.Amount"],
    );

    let second = populate(&plan.nodes[3]);
    let ScanSource::NestedLoop(nested) = &second.source else {
        panic!("Expected a nested loop, found {}", second.source);
    };
    assert_eq!(nested.kind, LoopKind::InnerJoin);
    assert!(matches!(
        &nested.left,
        ScanSource::Transition { table, .. } if table == "__t0_join"
    ));
    let predicate = nested.predicate.as_ref().expect("join predicate");
    let BoundExprKind::Binary { left, right, .. } = &predicate.kind else {
        panic!("Expected a comparison, found {}", predicate);
    };
    assert!(matches!(&left.kind, BoundExprKind::Column { alias, .. } if alias == "r"));
    assert_eq!(right.kind, transition_column("__t0_join", "a.Name"));

    let projection = populate(&plan.nodes[5]);
    assert_eq!(
        projection.select[1].kind,
        transition_column("__t1_join", "b.Amount")
    );
}

#[test]
fn test_left_outer_join_pads_the_right_side() {
    let plan = lower_query(&QueryFixtures::join(JoinType::LeftOuter));

    assert_eq!(shape(&plan), "CPCP");
    assert_column_types(
        plan.table_columns("__t0_join").expect("join table"),
        &[
            ("a.Name", DataType::String),
            ("b.Amount", DataType::Decimal.to_nullable()),
        ],
    );

    let step = populate(&plan.nodes[1]);
    let ScanSource::NestedLoop(nested) = &step.source else {
        panic!("Expected a nested loop, found {}", step.source);
    };
    assert_eq!(nested.kind, LoopKind::LeftOuterJoin);
    let padding = nested.padding.as_ref().expect("outer joins pad");
    assert_eq!(padding.preserved, JoinSide::Left);
    assert_eq!(padding.nulls.len(), 1);
    assert_eq!(padding.nulls[0].name, "b.Amount");
    assert_eq!(padding.nulls[0].data_type, DataType::Decimal.to_nullable());
}

#[test]
fn test_right_outer_join_pads_the_left_side() {
    let plan = lower_query(&QueryFixtures::join(JoinType::RightOuter));

    let step = populate(&plan.nodes[1]);
    let ScanSource::NestedLoop(nested) = &step.source else {
        panic!("Expected a nested loop, found {}", step.source);
    };
    let padding = nested.padding.as_ref().expect("outer joins pad");
    assert_eq!(padding.preserved, JoinSide::Right);
    assert_eq!(padding.nulls.len(), 1);
    assert_eq!(padding.nulls[0].name, "a.Name");
    assert_eq!(padding.nulls[0].data_type, DataType::String.to_nullable());
}

#[test]
fn test_inner_join_has_no_padding() {
    let plan = lower_query(&QueryFixtures::join(JoinType::Inner));
    let step = populate(&plan.nodes[1]);
    let ScanSource::NestedLoop(nested) = &step.source else {
        panic!("Expected a nested loop, found {}", step.source);
    };
    assert!(nested.padding.is_none());
}

#[test]
fn test_cross_apply_reads_the_left_row() {
    let plan = lower_query(&QueryFixtures::cross_apply());

    assert_eq!(shape(&plan), "CPCP");
    assert_columns(
        plan.table_columns("__t0_join").expect("apply table"),
        &["a.Name", "i.Label"],
    );

    let step = populate(&plan.nodes[1]);
    let ScanSource::NestedLoop(nested) = &step.source else {
        panic!("Expected a nested loop, found {}", step.source);
    };
    assert_eq!(nested.kind, LoopKind::CrossApply);
    assert!(nested.predicate.is_none());
    let ScanSource::Schema { method, args, .. } = &nested.right else {
        panic!("Expected a schema scan, found {}", nested.right);
    };
    assert_eq!(method, "items");
    assert!(matches!(
        &args[0].kind,
        BoundExprKind::Column { alias, name, .. } if alias == "a" && name == "Id"
    ));
}

#[test]
fn test_outer_apply_pads_the_applied_side() {
    // select a.Name, i.Label from #A.entities() a outer apply #A.items(a.Id) i
    let query = Query::select(
        SelectStatement::new()
            .select(Expr::column("a", "Name"))
            .select(Expr::column("i", "Label"))
            .with_from(QueryFixtures::entities("a").apply(
                FromSource::schema("A", "items", vec![Expr::column("a", "Id")]).with_alias("i"),
                ApplyType::Outer,
            )),
    );
    let plan = lower_query(&query);

    assert_eq!(shape(&plan), "CPCP");
    let step = populate(&plan.nodes[1]);
    let ScanSource::NestedLoop(nested) = &step.source else {
        panic!("Expected a nested loop, found {}", step.source);
    };
    assert_eq!(nested.kind, LoopKind::OuterApply);
    assert!(nested.predicate.is_none());
    let padding = nested.padding.as_ref().expect("outer applies pad");
    assert_eq!(padding.preserved, JoinSide::Left);
    assert_eq!(padding.nulls.len(), 1);
    assert_eq!(padding.nulls[0].name, "i.Label");
    assert_eq!(padding.nulls[0].data_type, DataType::String.to_nullable());
}

#[test]
fn test_left_join_followed_by_inner_join() {
    // select a.Name, b.Amount from #A.entities() a
    //   left outer join #B.orders() b on a.Id = b.PersonId
    //   inner join recent r on r.Name = a.Name
    let from = QueryFixtures::entities("a")
        .join(
            QueryFixtures::orders("b"),
            JoinType::LeftOuter,
            Expr::eq(Expr::column("a", "Id"), Expr::column("b", "PersonId")),
        )
        .join(
            FromSource::in_memory("recent").with_alias("r"),
            JoinType::Inner,
            Expr::eq(Expr::column("r", "Name"), Expr::column("a", "Name")),
        );
    let query = Query::select(
        SelectStatement::new()
            .select(Expr::column("a", "Name"))
            .select(Expr::column("b", "Amount"))
            .with_from(from),
    );
    let plan = lower_query(&query);

    assert_eq!(shape(&plan), "CPCPCP");

    let first = populate(&plan.nodes[1]);
    let ScanSource::NestedLoop(outer) = &first.source else {
        panic!("Expected a nested loop, found {}", first.source);
    };
    assert_eq!(outer.kind, LoopKind::LeftOuterJoin);
    assert_eq!(
        outer.padding.as_ref().expect("outer joins pad").preserved,
        JoinSide::Left
    );

    // The padded column stays nullable through the next pair
    let expected = [
        ("a.Name", DataType::String),
        ("b.Amount", DataType::Decimal.to_nullable()),
    ];
    assert_column_types(plan.table_columns("__t0_join").expect("first pair"), &expected);
    assert_column_types(plan.table_columns("__t1_join").expect("second pair"), &expected);

    let second = populate(&plan.nodes[3]);
    let ScanSource::NestedLoop(inner) = &second.source else {
        panic!("Expected a nested loop, found {}", second.source);
    };
    assert_eq!(inner.kind, LoopKind::InnerJoin);
    assert!(inner.padding.is_none());
    assert!(matches!(
        &inner.left,
        ScanSource::Transition { table, .. } if table == "__t0_join"
    ));
    assert!(matches!(
        &second.select[1].kind,
        BoundExprKind::TransitionColumn { table, name } if table == "__t0_join" && name == "b.Amount"
    ));
}

// ===== GROUP BY =====

#[test]
fn test_group_by_end_to_end() {
    // select Country, Count(City) from #A.entities() a group by Country
    //
    // Unaliased fields are named by their rendered expression, so the
    // aggregate lands in the score table as `Count(City)`.
    let query = Query::select(
        SelectStatement::new()
            .select(Expr::ident("Country"))
            .select(Expr::call("Count", vec![Expr::ident("City")]))
            .with_from(QueryFixtures::entities("a"))
            .with_group_by(vec![Expr::ident("Country")]),
    );
    let plan = lower_query(&query);

    assert_eq!(shape(&plan), "CACP");

    let PlanNode::CreateTransitionTable {
        name,
        columns,
        for_grouping,
    } = &plan.nodes[0]
    else {
        panic!("Expected the grouping table first");
    };
    assert_eq!(name, "__t0_group");
    assert!(*for_grouping);
    assert_column_types(
        columns,
        &[("Country", DataType::String), ("Count(City)", DataType::Long)],
    );

    let step = aggregate(&plan.nodes[1]);
    assert_eq!(step.target, "__t0_group");
    assert_eq!(step.keys.len(), 1);
    assert!(matches!(
        &step.keys[0].kind,
        BoundExprKind::Column { name, .. } if name == "Country"
    ));
    let refresh: Vec<String> = step.refresh.iter().map(ToString::to_string).collect();
    assert_eq!(refresh, vec!["SetCount('Count(City)', City)"]);
    assert_eq!(step.aggregates.len(), 1);

    let PlanNode::CreateTransitionTable {
        name: score,
        columns: score_columns,
        for_grouping,
    } = &plan.nodes[2]
    else {
        panic!("Expected the score table third");
    };
    assert!(!*for_grouping);
    assert_eq!(score_columns, &plan.output);
    assert_eq!(plan.result, *score);

    let projection = populate(&plan.nodes[3]);
    assert_eq!(&projection.target, score);
    assert!(matches!(
        &projection.source,
        ScanSource::Transition { table, .. } if table == "__t0_group"
    ));
    assert_eq!(projection.select[0].kind, BoundExprKind::GroupField(0));
    assert_eq!(
        projection.select[1].kind,
        transition_column("__t0_group", "Count(City)")
    );
}

#[test]
fn test_grouped_queries_have_two_tables_one_aggregate_one_projection() {
    let queries = [
        QueryFixtures::group_by_city(),
        QueryFixtures::group_by_with_having(),
        QueryFixtures::implicit_group(),
    ];
    for query in &queries {
        let plan = lower_query(query);
        let tables: Vec<bool> = plan
            .transition_tables()
            .map(|(_, _, for_grouping)| for_grouping)
            .collect();
        assert_eq!(tables, vec![true, false], "plan:\n{}", plan);
        assert_eq!(shape(&plan), "CACP", "plan:\n{}", plan);
    }
}

#[test]
fn test_having_reads_the_accumulator() {
    let plan = lower_query(&QueryFixtures::group_by_with_having());
    let projection = populate(&plan.nodes[3]);
    let having = projection.filter.as_ref().expect("HAVING becomes the filter");
    let BoundExprKind::Binary { left, .. } = &having.kind else {
        panic!("Expected a comparison, found {}", having);
    };
    assert_eq!(
        left.kind,
        transition_column("__t0_group", "Sum(Population)")
    );
}

#[test]
fn test_implicit_group_has_no_keys() {
    let plan = lower_query(&QueryFixtures::implicit_group());
    let step = aggregate(&plan.nodes[1]);
    assert!(step.keys.is_empty());
    assert_eq!(step.key_prefixes().count(), 0);
    assert_columns(
        plan.table_columns("__t0_group").expect("grouping table"),
        &["Count(Name)"],
    );
}

#[test]
fn test_where_filters_the_aggregation() {
    // select City, Count(City) from #A.entities() a where a.Population > 1000 group by City
    let query = Query::select(
        SelectStatement::new()
            .select(Expr::ident("City"))
            .select(Expr::call("Count", vec![Expr::ident("City")]))
            .with_from(QueryFixtures::entities("a"))
            .with_where(Expr::binary(
                Expr::column("a", "Population"),
                polyschema_sql_ir::BinaryOp::Gt,
                Expr::int(1000),
            ))
            .with_group_by(vec![Expr::ident("City")]),
    );
    let plan = lower_query(&query);
    assert!(aggregate(&plan.nodes[1]).filter.is_some());
    assert!(populate(&plan.nodes[3]).filter.is_none());
}

#[test]
fn test_group_by_over_a_join_reads_the_join_table() {
    // select a.City, Count(b.Amount) from a inner join b on a.Id = b.PersonId group by a.City
    let query = Query::select(
        SelectStatement::new()
            .select(Expr::column("a", "City"))
            .select(Expr::call("Count", vec![Expr::column("b", "Amount")]))
            .with_from(QueryFixtures::entities("a").join(
                QueryFixtures::orders("b"),
                JoinType::Inner,
                Expr::eq(Expr::column("a", "Id"), Expr::column("b", "PersonId")),
            ))
            .with_group_by(vec![Expr::column("a", "City")]),
    );
    let plan = lower_query(&query);

    assert_eq!(shape(&plan), "CPCACP");
    assert_columns(
        plan.table_columns("__t0_join").expect("join table"),
        &["a.City", "b.Amount"],
    );

    let step = aggregate(&plan.nodes[3]);
    assert!(matches!(
        &step.source,
        ScanSource::Transition { table, .. } if table == "__t0_join"
    ));
    assert_eq!(step.keys[0].kind, transition_column("__t0_join", "a.City"));
    assert_eq!(
        step.refresh[0].args[0].kind,
        transition_column("__t0_join", "b.Amount")
    );
}

#[test]
fn test_distinct_groups_by_every_field() {
    let query = Query::select(
        SelectStatement::new()
            .select(Expr::ident("Name"))
            .select(Expr::ident("City"))
            .with_from(QueryFixtures::entities("a"))
            .with_distinct(),
    );
    let plan = lower_query(&query);

    assert_eq!(shape(&plan), "CACP");
    let step = aggregate(&plan.nodes[1]);
    assert_eq!(step.keys.len(), 2);
    assert!(step.refresh.is_empty());
    let projection = populate(&plan.nodes[3]);
    assert_eq!(projection.select[0].kind, BoundExprKind::GroupField(0));
    assert_eq!(projection.select[1].kind, BoundExprKind::GroupField(1));
}

// ===== Set operators =====

#[test]
fn test_union_matches_absent_keys_into_the_left_table() {
    let plan = lower_query(&QueryFixtures::union(false));

    assert_eq!(shape(&plan), "CPCPM");
    let step = set_match(&plan.nodes[4]);
    assert_eq!(step.target, "__t0_select");
    assert_eq!(step.source, "__t1_select");
    assert_eq!(step.probe, "__t0_select");
    assert_eq!(step.key_columns, vec!["Name".to_string()]);
    assert_eq!(step.expected, Presence::Absent);
    assert_eq!(plan.result, "__t0_select");
}

#[test]
fn test_union_all_appends_into_the_left_table() {
    let plan = lower_query(&QueryFixtures::union(true));

    assert_eq!(shape(&plan), "CPP");
    assert_eq!(populate(&plan.nodes[1]).target, "__t0_select");
    assert_eq!(populate(&plan.nodes[2]).target, "__t0_select");
    assert_eq!(plan.result, "__t0_select");
}

#[test]
fn test_intersect_keeps_right_rows_present_on_the_left() {
    let plan = lower_query(&QueryFixtures::intersect());

    assert_eq!(shape(&plan), "CPCPCM");
    let step = set_match(&plan.nodes[5]);
    assert_eq!(step.target, "__t2_intersect");
    assert_eq!(step.source, "__t1_select");
    assert_eq!(step.probe, "__t0_select");
    assert_eq!(step.expected, Presence::Present);
    assert_eq!(plan.result, "__t2_intersect");
    assert_columns(
        plan.table_columns("__t2_intersect").expect("declared"),
        &["Name", "City"],
    );
}

#[test]
fn test_except_keeps_left_rows_absent_on_the_right() {
    let plan = lower_query(&QueryFixtures::except());

    let step = set_match(&plan.nodes[5]);
    assert_eq!(step.target, "__t2_except");
    assert_eq!(step.source, "__t0_select");
    assert_eq!(step.probe, "__t1_select");
    assert_eq!(step.expected, Presence::Absent);
}

/// Every key column of every match step exists in the three tables it touches
fn assert_match_keys_resolve(plan: &Plan) {
    let mut matches = 0;
    for node in &plan.nodes {
        let PlanNode::SetMatch(step) = node else {
            continue;
        };
        matches += 1;
        for table in [&step.target, &step.source, &step.probe] {
            let columns = plan
                .table_columns(table)
                .unwrap_or_else(|| panic!("table {} is not declared", table));
            for key in &step.key_columns {
                assert!(
                    columns.iter().any(|c| &c.name == key),
                    "key {} missing from {} in\n{}",
                    key,
                    table,
                    plan
                );
            }
        }
    }
    assert!(matches > 0, "no match step in\n{}", plan);
}

#[test]
fn test_right_operand_takes_left_column_names() {
    // select Name, City from #A.entities() a
    // except (Name)
    // select Name as N, City from #A.entities() b
    let right = Query::select(
        SelectStatement::new()
            .select_as(Expr::ident("Name"), "N")
            .select(Expr::ident("City"))
            .with_from(QueryFixtures::entities("b")),
    );
    let plan = lower_query(&Query::except(QueryFixtures::name_city("a"), right, &["Name"]));

    assert_eq!(shape(&plan), "CPCPCM");
    assert_columns(
        plan.table_columns("__t1_select").expect("right table"),
        &["Name", "City"],
    );
    assert_match_keys_resolve(&plan);
}

#[test]
fn test_right_wildcard_over_aliased_source_matches_keys() {
    // select * from #A.entities() union (Name) select * from #A.entities() b
    let right = Query::select(
        SelectStatement::new()
            .select_all()
            .with_from(QueryFixtures::entities("b")),
    );
    let (plan, analysis) = lower_with(
        &Query::union(QueryFixtures::select_all(), right, false, &["Name"]),
        &LoweringConfig::default(),
    );

    let BoundBody::SetOperation(operation) = &analysis.query.body else {
        panic!("Expected a set operation");
    };
    assert_eq!(operation.right.output[0].name, "b.Name");
    assert_match_keys_resolve(&plan);
}

#[test]
fn test_right_operand_is_matched_by_position() {
    // select Name, City from #A.entities() a
    // intersect (Name)
    // select City as Name, Name as City from #A.entities() b
    let right = Query::select(
        SelectStatement::new()
            .select_as(Expr::ident("City"), "Name")
            .select_as(Expr::ident("Name"), "City")
            .with_from(QueryFixtures::entities("b")),
    );
    let plan = lower_query(&Query::intersect(QueryFixtures::name_city("a"), right, &["Name"]));

    let step = populate(&plan.nodes[3]);
    assert_eq!(step.target, "__t1_select");
    assert!(matches!(
        &step.select[0].kind,
        BoundExprKind::Column { alias, name, .. } if alias == "b" && name == "City"
    ));
    assert_match_keys_resolve(&plan);
}

#[test]
fn test_set_operator_keys_resolve_in_every_table() {
    for query in [
        QueryFixtures::union(false),
        QueryFixtures::intersect(),
        QueryFixtures::except(),
    ] {
        assert_match_keys_resolve(&lower_query(&query));
    }
}

#[test]
fn test_set_operator_chain_reuses_the_leftmost_table() {
    let inner = Query::union(
        QueryFixtures::name_city("a"),
        QueryFixtures::name_city("b"),
        true,
        &["Name"],
    );
    let query = Query::union(inner, QueryFixtures::name_city("c"), false, &["Name"]);
    let plan = lower_query(&query);

    assert_eq!(shape(&plan), "CPPCPM");
    let step = set_match(&plan.nodes[5]);
    assert_eq!(step.target, "__t0_select");
    assert_eq!(step.source, "__t1_select");
    assert_eq!(plan.result, "__t0_select");
}

#[test]
fn test_ordered_set_operator_copies_the_result() {
    let query = QueryFixtures::union(false)
        .with_order_by(vec![OrderBy::desc(Expr::ident("Name"))])
        .with_take(1);
    let plan = lower_query(&query);

    assert_eq!(shape(&plan), "CPCPMCP");
    assert_eq!(plan.result, "__t2_result");
    let copy = populate(&plan.nodes[6]);
    assert!(matches!(
        &copy.source,
        ScanSource::Transition { table, .. } if table == "__t0_select"
    ));
    assert_eq!(copy.take, Some(1));
    assert_eq!(
        copy.order_by[0].expr.kind,
        transition_column("__t0_select", "Name")
    );
}

// ===== CTEs and nested queries =====

#[test]
fn test_cte_is_lowered_first_and_renamed() {
    let (plan, analysis) = lower_with(&QueryFixtures::simple_cte(), &LoweringConfig::default());

    assert_eq!(shape(&plan), "CPRCP");
    assert_eq!(
        plan.nodes[2],
        PlanNode::Rename {
            from: "__t0_select".to_string(),
            to: "p".to_string(),
        }
    );
    assert!(matches!(
        &populate(&plan.nodes[4]).source,
        ScanSource::Transition { alias, table } if alias == "p" && table == "p"
    ));
    assert_eq!(plan.result, "__t1_select");

    let cte_scope = analysis.query.ctes[0].query.scope;
    assert_eq!(
        analysis.scopes.attribute(cte_scope, TRANSITION_TABLE_ATTRIBUTE),
        Some("__t0_select")
    );
}

#[test]
fn test_ctes_are_lowered_in_declaration_order() {
    // with p as (...), q as (select Name from p) select Name from q
    let query = Query::select(
        SelectStatement::new()
            .select(Expr::ident("Name"))
            .with_from(FromSource::in_memory("q")),
    )
    .with_ctes([
        CommonTableExpr::new("p", QueryFixtures::name_city("a")),
        CommonTableExpr::new(
            "q",
            Query::select(
                SelectStatement::new()
                    .select(Expr::ident("Name"))
                    .with_from(FromSource::in_memory("p")),
            ),
        ),
    ]);
    let plan = lower_query(&query);

    let renames: Vec<&str> = plan
        .nodes
        .iter()
        .filter_map(|node| match node {
            PlanNode::Rename { to, .. } => Some(to.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(renames, vec!["p", "q"]);
    assert_eq!(shape(&plan), "CPRCPRCP");
}

#[test]
fn test_nested_query_is_lowered_before_its_reader() {
    let inner = Query::select(
        SelectStatement::new()
            .select(Expr::ident("Name"))
            .with_from(QueryFixtures::entities("a")),
    );
    let query = Query::select(
        SelectStatement::new()
            .select(Expr::column("x", "Name"))
            .with_from(FromSource::subquery(inner).with_alias("x")),
    );
    let plan = lower_query(&query);

    assert_eq!(shape(&plan), "CPCP");
    assert!(matches!(
        &populate(&plan.nodes[3]).source,
        ScanSource::Transition { alias, table } if alias == "x" && table == "__t0_select"
    ));
}

#[test]
fn test_host_table_is_scanned_in_memory() {
    let query = Query::select(
        SelectStatement::new()
            .select(Expr::ident("Seen"))
            .with_from(FromSource::in_memory("recent")),
    );
    let plan = lower_query(&query);
    assert!(matches!(
        &populate(&plan.nodes[1]).source,
        ScanSource::InMemory { table, .. } if table == "recent"
    ));
}

#[test]
fn test_recursion_limit() {
    let config = LoweringConfig {
        max_depth: 1,
        ..LoweringConfig::default()
    };
    let mut analysis = analyze(&QueryFixtures::simple_cte());
    let err = lower(&mut analysis.scopes, &analysis.query, &config).unwrap_err();
    assert_eq!(
        err,
        LoweringError::RecursionLimitExceeded {
            context: "query lowering".to_string(),
            depth: 2,
            limit: 1,
        }
    );
}

// ===== Rendering =====

#[test]
fn test_plan_display() {
    let plan = lower_query(&QueryFixtures::group_by_city());
    let rendered = plan.to_string();
    let lines: Vec<&str> = rendered.lines().collect();

    assert_eq!(lines.len(), plan.nodes.len() + 1);
    assert!(lines[0].starts_with("CreateTransitionTable __t0_group ("));
    assert!(lines[0].ends_with("for grouping"));
    assert!(lines[1].starts_with("Aggregate into __t0_group from #A.entities() a"));
    assert!(lines[1].contains("refresh (SetCount('Count(City)', City))"));
    assert_eq!(lines[4], "Result: __t1_score");
}

#[test]
fn test_plan_serializes() {
    let plan = lower_query(&QueryFixtures::join(JoinType::LeftOuter));
    let json = serde_json::to_value(&plan).expect("plan serializes");
    assert_eq!(json["result"], "__t1_select");
    let back: Plan = serde_json::from_value(json).expect("plan deserializes");
    assert_eq!(back, plan);
}

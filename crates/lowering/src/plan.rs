// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Plan representation
//!
//! A [`Plan`] is a totally ordered list of [`PlanNode`]s. Every node may read
//! tables created by an earlier node, so the order is part of the contract:
//! a code generator translates the nodes one by one, top to bottom.
//!
//! ```text
//! CreateTransitionTable __t0_group (Country string, Count(City) long) for grouping
//! Aggregate into __t0_group from #A.entities() a keys (Country) refresh (SetCount('Count(City)', City))
//! CreateTransitionTable __t1_score (Country string, Count(City) long)
//! Populate __t1_score from __t0_group a select (group[0], __t0_group[Count(City)])
//! ```

use std::fmt;

use polyschema_sql_ir::SchemaColumn;
use polyschema_sql_ir::expr::write_list;
use polyschema_sql_semantic::{AggregateCall, BoundExpr, BoundOrderBy, RefreshCall};
use serde::{Deserialize, Serialize};

/// A lowered query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub nodes: Vec<PlanNode>,
    /// Table holding the query result once every node ran
    pub result: String,
    /// Columns of the result table
    pub output: Vec<SchemaColumn>,
}

impl Plan {
    /// Transition tables declared by the plan, in creation order
    pub fn transition_tables(&self) -> impl Iterator<Item = (&str, &[SchemaColumn], bool)> {
        self.nodes.iter().filter_map(|node| match node {
            PlanNode::CreateTransitionTable {
                name,
                columns,
                for_grouping,
            } => Some((name.as_str(), columns.as_slice(), *for_grouping)),
            _ => None,
        })
    }

    /// Columns of a transition table declared by the plan
    pub fn table_columns(&self, table: &str) -> Option<&[SchemaColumn]> {
        self.transition_tables()
            .find(|(name, _, _)| *name == table)
            .map(|(_, columns, _)| columns)
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for node in &self.nodes {
            writeln!(f, "{}", node)?;
        }
        write!(f, "Result: {}", self.result)
    }
}

/// One primitive materialization step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlanNode {
    /// Declare a table with a fixed column list
    ///
    /// A grouping table holds one row per group key with its accumulators.
    CreateTransitionTable {
        name: String,
        columns: Vec<SchemaColumn>,
        for_grouping: bool,
    },

    /// Scan a source and append one row per surviving input row
    Populate(PopulateStep),

    /// Scan a source, group the rows and update accumulators
    Aggregate(AggregateStep),

    /// Append the rows of one table filtered by key presence in another
    SetMatch(SetMatchStep),

    /// Expose a table under another name
    Rename { from: String, to: String },
}

impl PlanNode {
    /// Name of the table the node writes, if any
    pub fn target(&self) -> &str {
        match self {
            PlanNode::CreateTransitionTable { name, .. } => name,
            PlanNode::Populate(step) => &step.target,
            PlanNode::Aggregate(step) => &step.target,
            PlanNode::SetMatch(step) => &step.target,
            PlanNode::Rename { to, .. } => to,
        }
    }
}

impl fmt::Display for PlanNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanNode::CreateTransitionTable {
                name,
                columns,
                for_grouping,
            } => {
                write!(f, "CreateTransitionTable {} (", name)?;
                for (i, column) in columns.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} {}", column.name, column.data_type)?;
                }
                write!(f, ")")?;
                if *for_grouping {
                    write!(f, " for grouping")?;
                }
                Ok(())
            }
            PlanNode::Populate(step) => write!(f, "{}", step),
            PlanNode::Aggregate(step) => write!(f, "{}", step),
            PlanNode::SetMatch(step) => write!(f, "{}", step),
            PlanNode::Rename { from, to } => write!(f, "Rename {} to {}", from, to),
        }
    }
}

/// Kind of a nested loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoopKind {
    InnerJoin,
    LeftOuterJoin,
    RightOuterJoin,
    CrossApply,
    OuterApply,
}

impl fmt::Display for LoopKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LoopKind::InnerJoin => "inner join",
            LoopKind::LeftOuterJoin => "left outer join",
            LoopKind::RightOuterJoin => "right outer join",
            LoopKind::CrossApply => "cross apply",
            LoopKind::OuterApply => "outer apply",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinSide {
    Left,
    Right,
}

/// Row emitted for a preserved-side row without any match
///
/// Each column of `nulls` is set to a null of its declared type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Padding {
    pub preserved: JoinSide,
    pub nulls: Vec<SchemaColumn>,
}

/// A pairwise nested loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NestedLoop {
    pub kind: LoopKind,
    pub left: ScanSource,
    pub right: ScanSource,
    /// Join predicate, evaluated per candidate pair; `None` for applies
    pub predicate: Option<BoundExpr>,
    pub padding: Option<Padding>,
}

/// What a step scans
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScanSource {
    /// Rows produced by a schema table method
    Schema {
        alias: String,
        schema: String,
        method: String,
        args: Vec<BoundExpr>,
    },
    /// Rows of a host-provided in-memory table
    InMemory { alias: String, table: String },
    /// Rows of a transition table (or of a renamed CTE table)
    Transition { alias: String, table: String },
    /// Pairs of rows of two sources
    NestedLoop(Box<NestedLoop>),
}

impl ScanSource {
    /// Row variable the scan binds
    pub fn alias(&self) -> String {
        match self {
            ScanSource::Schema { alias, .. }
            | ScanSource::InMemory { alias, .. }
            | ScanSource::Transition { alias, .. } => alias.clone(),
            ScanSource::NestedLoop(nested) => {
                format!("{}+{}", nested.left.alias(), nested.right.alias())
            }
        }
    }
}

impl fmt::Display for ScanSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanSource::Schema {
                alias,
                schema,
                method,
                args,
            } => {
                write!(f, "#{}.{}(", schema, method)?;
                write_list(f, args)?;
                write!(f, ") {}", alias)
            }
            ScanSource::InMemory { alias, table } | ScanSource::Transition { alias, table } => {
                write!(f, "{} {}", table, alias)
            }
            ScanSource::NestedLoop(nested) => {
                write!(f, "({}) {} ({})", nested.left, nested.kind, nested.right)?;
                if let Some(predicate) = &nested.predicate {
                    write!(f, " on {}", predicate)?;
                }
                if let Some(padding) = &nested.padding {
                    write!(f, " padding {:?}", padding.preserved)?;
                }
                Ok(())
            }
        }
    }
}

/// Scan, filter, project and append
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulateStep {
    pub target: String,
    pub source: ScanSource,
    pub filter: Option<BoundExpr>,
    pub skip: Option<u64>,
    pub take: Option<u64>,
    /// One expression per target column
    pub select: Vec<BoundExpr>,
    /// Applied before SKIP and TAKE
    pub order_by: Vec<BoundOrderBy>,
}

impl fmt::Display for PopulateStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Populate {} from {}", self.target, self.source)?;
        if let Some(filter) = &self.filter {
            write!(f, " where {}", filter)?;
        }
        write!(f, " select (")?;
        write_list(f, &self.select)?;
        write!(f, ")")?;
        if !self.order_by.is_empty() {
            write!(f, " order by ")?;
            for (i, order) in self.order_by.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{} {:?}", order.expr, order.direction)?;
            }
        }
        if let Some(skip) = self.skip {
            write!(f, " skip {}", skip)?;
        }
        if let Some(take) = self.take {
            write!(f, " take {}", take)?;
        }
        Ok(())
    }
}

/// First phase of a grouped query
///
/// Per input row surviving `filter`, the step computes the group key one
/// prefix at a time ([`AggregateStep::key_prefixes`]), creates the group row
/// in `target` the first time a full key is seen, and runs every `refresh`
/// call against that group. A group row is written once, however many rows
/// share its key. An empty key list puts every row in a single group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateStep {
    pub target: String,
    pub source: ScanSource,
    pub filter: Option<BoundExpr>,
    pub keys: Vec<BoundExpr>,
    /// Accumulators seeded for each new group, deduplicated by name
    pub aggregates: Vec<AggregateCall>,
    pub refresh: Vec<RefreshCall>,
}

impl AggregateStep {
    /// Key variants from the outermost to the full key
    pub fn key_prefixes(&self) -> impl Iterator<Item = &[BoundExpr]> {
        (1..=self.keys.len()).map(|n| &self.keys[..n])
    }
}

impl fmt::Display for AggregateStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Aggregate into {} from {}", self.target, self.source)?;
        if let Some(filter) = &self.filter {
            write!(f, " where {}", filter)?;
        }
        write!(f, " keys (")?;
        write_list(f, &self.keys)?;
        write!(f, ") refresh (")?;
        write_list(f, &self.refresh)?;
        write!(f, ")")
    }
}

/// Whether a key must already be present in the probe table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Presence {
    Present,
    Absent,
}

/// Key-matched append realizing UNION, INTERSECT and EXCEPT
///
/// Every row of `source` is appended to `target` when the presence of its
/// key values in `probe` equals `expected`. Keys compare column by column
/// with equality. When `probe` and `target` are the same table, appended
/// rows take part in later probes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetMatchStep {
    pub target: String,
    pub source: String,
    pub probe: String,
    pub key_columns: Vec<String>,
    pub expected: Presence,
}

impl fmt::Display for SetMatchStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SetMatch into {} from {} where ({}) {:?} in {}",
            self.target,
            self.source,
            self.key_columns.join(", "),
            self.expected,
            self.probe
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polyschema_sql_ir::{DataType, Literal};

    #[test]
    fn test_key_prefixes() {
        let key = |v: i64| BoundExpr::literal(Literal::Integer(v), DataType::Int);
        let step = AggregateStep {
            target: "g".to_string(),
            source: ScanSource::InMemory {
                alias: "r".to_string(),
                table: "recent".to_string(),
            },
            filter: None,
            keys: vec![key(1), key(2)],
            aggregates: Vec::new(),
            refresh: Vec::new(),
        };
        let prefixes: Vec<usize> = step.key_prefixes().map(<[BoundExpr]>::len).collect();
        assert_eq!(prefixes, vec![1, 2]);
    }

    #[test]
    fn test_display() {
        let create = PlanNode::CreateTransitionTable {
            name: "__t0_select".to_string(),
            columns: vec![SchemaColumn::new("Name", 0, DataType::String)],
            for_grouping: false,
        };
        assert_eq!(create.to_string(), "CreateTransitionTable __t0_select (Name string)");

        let matched = PlanNode::SetMatch(SetMatchStep {
            target: "t".to_string(),
            source: "r".to_string(),
            probe: "t".to_string(),
            key_columns: vec!["Name".to_string()],
            expected: Presence::Absent,
        });
        assert_eq!(matched.to_string(), "SetMatch into t from r where (Name) Absent in t");
        assert_eq!(matched.target(), "t");
    }
}

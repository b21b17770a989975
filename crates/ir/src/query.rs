// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Query Representation
//!
//! This module represents queries of the language in the IR.
//!
//! ## Query Structure
//!
//! A [`Query`] consists of:
//!
//! - **CTEs**: Common Table Expressions, declared before the body and
//!   visible to later CTEs and to the body
//! - **Body**: The main query (SELECT or set operation)
//! - **ORDER BY**: Sort keys and directions
//! - **SKIP / TAKE**: Row offset and row count limit
//!
//! ## Set Operations
//!
//! [`SetOp`] represents set operations and query combinations:
//!
//! - `Select`: A single SELECT statement
//! - `Union`: UNION [ALL] of two queries
//! - `Intersect`: INTERSECT of two queries
//! - `Except`: EXCEPT of two queries
//!
//! Every set operator carries an explicit list of key columns. Row presence
//! on either side is decided by comparing only those columns:
//!
//! ```text
//! select Name, City from #A.entities()
//! union (Name)
//! select Name, City from #B.entities()
//! ```
//!
//! Chains are left-associated: `q1 union q2 except q3` is
//! `Except { left: Union { q1, q2 }, right: q3 }`.
//!
//! ## FROM Sources
//!
//! [`FromSource`] is a closed set of source kinds:
//!
//! - **Schema**: `#schema.method(args) alias`, a table produced by a schema
//! - **InMemory**: a CTE name or a host-registered in-memory table
//! - **Subquery**: `(select ...) alias`
//! - **Join**: `left inner|left outer|right outer join right on predicate`
//! - **Apply**: `left cross|outer apply right`, where the right side may
//!   reference columns of the left side in its arguments
//!
//! Joins and applies nest left-deep: `a join b join c` is
//! `Join { left: Join { a, b }, right: c }`.

use serde::{Deserialize, Serialize};

use crate::expr::Expr;

/// A query (SELECT statement or set operation)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    /// The main body of the query
    pub body: SetOp,

    /// ORDER BY clause
    pub order_by: Vec<OrderBy>,

    /// SKIP clause
    pub skip: Option<u64>,

    /// TAKE clause
    pub take: Option<u64>,

    /// WITH clause (CTE)
    pub ctes: Vec<CommonTableExpr>,
}

impl Query {
    pub fn new(body: SetOp) -> Self {
        Self {
            body,
            order_by: Vec::new(),
            skip: None,
            take: None,
            ctes: Vec::new(),
        }
    }

    /// Query consisting of a single SELECT statement
    pub fn select(select: SelectStatement) -> Self {
        Self::new(SetOp::Select(Box::new(select)))
    }

    /// `left UNION [ALL] (keys) right`
    pub fn union(left: Query, right: Query, all: bool, keys: &[&str]) -> Self {
        Self::new(SetOp::Union {
            left: Box::new(left),
            right: Box::new(right),
            all,
            keys: to_strings(keys),
        })
    }

    /// `left INTERSECT (keys) right`
    pub fn intersect(left: Query, right: Query, keys: &[&str]) -> Self {
        Self::new(SetOp::Intersect {
            left: Box::new(left),
            right: Box::new(right),
            keys: to_strings(keys),
        })
    }

    /// `left EXCEPT (keys) right`
    pub fn except(left: Query, right: Query, keys: &[&str]) -> Self {
        Self::new(SetOp::Except {
            left: Box::new(left),
            right: Box::new(right),
            keys: to_strings(keys),
        })
    }

    pub fn with_ctes(mut self, ctes: impl IntoIterator<Item = CommonTableExpr>) -> Self {
        self.ctes = ctes.into_iter().collect();
        self
    }

    pub fn with_skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn with_take(mut self, take: u64) -> Self {
        self.take = Some(take);
        self
    }

    pub fn with_order_by(mut self, order_by: Vec<OrderBy>) -> Self {
        self.order_by = order_by;
        self
    }
}

fn to_strings(keys: &[&str]) -> Vec<String> {
    keys.iter().map(|k| k.to_string()).collect()
}

/// Set operation (UNION, INTERSECT, EXCEPT) or SELECT
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SetOp {
    /// SELECT statement
    Select(Box<SelectStatement>),

    /// UNION [ALL]
    Union {
        left: Box<Query>,
        right: Box<Query>,
        all: bool,
        keys: Vec<String>,
    },

    /// INTERSECT
    Intersect {
        left: Box<Query>,
        right: Box<Query>,
        keys: Vec<String>,
    },

    /// EXCEPT
    Except {
        left: Box<Query>,
        right: Box<Query>,
        keys: Vec<String>,
    },
}

/// SELECT statement
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectStatement {
    /// SELECT DISTINCT
    pub distinct: bool,

    /// Projection list (columns to select)
    pub projection: Vec<SelectItem>,

    /// FROM clause; `None` is a malformed query
    pub from: Option<FromSource>,

    /// WHERE clause
    pub where_clause: Option<Expr>,

    /// GROUP BY clause
    pub group_by: Vec<Expr>,

    /// HAVING clause
    pub having: Option<Expr>,
}

impl SelectStatement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_from(mut self, from: FromSource) -> Self {
        self.from = Some(from);
        self
    }

    pub fn with_projection(mut self, projection: Vec<SelectItem>) -> Self {
        self.projection = projection;
        self
    }

    /// Append an unnamed expression to the projection
    pub fn select(mut self, expr: Expr) -> Self {
        self.projection.push(SelectItem::UnnamedExpr(expr));
        self
    }

    /// Append an aliased expression to the projection
    pub fn select_as(mut self, expr: Expr, alias: impl Into<String>) -> Self {
        self.projection.push(SelectItem::AliasedExpr {
            expr,
            alias: alias.into(),
        });
        self
    }

    /// Append `*` to the projection
    pub fn select_all(mut self) -> Self {
        self.projection.push(SelectItem::Wildcard);
        self
    }

    pub fn with_where(mut self, predicate: Expr) -> Self {
        self.where_clause = Some(predicate);
        self
    }

    pub fn with_group_by(mut self, group_by: Vec<Expr>) -> Self {
        self.group_by = group_by;
        self
    }

    pub fn with_having(mut self, predicate: Expr) -> Self {
        self.having = Some(predicate);
        self
    }

    pub fn with_distinct(mut self) -> Self {
        self.distinct = true;
        self
    }
}

/// Item in a SELECT projection list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SelectItem {
    /// Unnamed expression (e.g., `column` or `a + b`)
    UnnamedExpr(Expr),

    /// Expression with alias (e.g., `col AS name`)
    AliasedExpr { expr: Expr, alias: String },

    /// Qualified wildcard (e.g., `a.*`)
    QualifiedWildcard(String),

    /// Unqualified wildcard (`*`)
    Wildcard,
}

/// A source in the FROM clause
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FromSource {
    /// Table produced by a schema method (`#schema.method(args) alias`)
    Schema {
        schema: String,
        method: String,
        args: Vec<Expr>,
        alias: Option<String>,
    },

    /// CTE or host-registered in-memory table
    InMemory { name: String, alias: Option<String> },

    /// Nested query
    Subquery {
        query: Box<Query>,
        alias: Option<String>,
    },

    /// Pairwise join
    Join {
        left: Box<FromSource>,
        right: Box<FromSource>,
        join_type: JoinType,
        on: Expr,
    },

    /// Pairwise apply
    Apply {
        left: Box<FromSource>,
        right: Box<FromSource>,
        apply_type: ApplyType,
    },
}

impl FromSource {
    /// `#schema.method(args)`
    pub fn schema(schema: impl Into<String>, method: impl Into<String>, args: Vec<Expr>) -> Self {
        FromSource::Schema {
            schema: schema.into(),
            method: method.into(),
            args,
            alias: None,
        }
    }

    /// CTE or in-memory table reference
    pub fn in_memory(name: impl Into<String>) -> Self {
        FromSource::InMemory {
            name: name.into(),
            alias: None,
        }
    }

    /// Nested query source
    pub fn subquery(query: Query) -> Self {
        FromSource::Subquery {
            query: Box::new(query),
            alias: None,
        }
    }

    /// Set the alias of a leaf source; joins and applies are left untouched
    pub fn with_alias(mut self, new_alias: impl Into<String>) -> Self {
        match &mut self {
            FromSource::Schema { alias, .. }
            | FromSource::InMemory { alias, .. }
            | FromSource::Subquery { alias, .. } => *alias = Some(new_alias.into()),
            FromSource::Join { .. } | FromSource::Apply { .. } => {}
        }
        self
    }

    /// Join `right` onto this source
    pub fn join(self, right: FromSource, join_type: JoinType, on: Expr) -> Self {
        FromSource::Join {
            left: Box::new(self),
            right: Box::new(right),
            join_type,
            on,
        }
    }

    /// Apply `right` to every row of this source
    pub fn apply(self, right: FromSource, apply_type: ApplyType) -> Self {
        FromSource::Apply {
            left: Box::new(self),
            right: Box::new(right),
            apply_type,
        }
    }
}

/// Join type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JoinType {
    Inner,
    LeftOuter,
    RightOuter,
}

/// Apply type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApplyType {
    Cross,
    Outer,
}

/// ORDER BY item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBy {
    pub expr: Expr,
    pub direction: SortDirection,
}

impl OrderBy {
    pub fn asc(expr: Expr) -> Self {
        Self {
            expr,
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(expr: Expr) -> Self {
        Self {
            expr,
            direction: SortDirection::Desc,
        }
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Common Table Expression (CTE)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommonTableExpr {
    pub name: String,
    /// Optional renamed output columns
    pub columns: Vec<String>,
    pub query: Box<Query>,
}

impl CommonTableExpr {
    pub fn new(name: impl Into<String>, query: Query) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            query: Box::new(query),
        }
    }

    pub fn with_columns(mut self, columns: &[&str]) -> Self {
        self.columns = to_strings(columns);
        self
    }
}

// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Expressions
//!
//! This module represents expressions of the query language.
//!
//! ## Design
//!
//! [`Expr`] is a closed sum type: every consumer matches it exhaustively, so
//! adding a node kind is a compile error everywhere it is not yet handled.
//! Expressions can represent:
//!
//! - **Identifiers**: a bare name such as `Name`, resolved against the active
//!   FROM source
//! - **Column references**: `alias.Column`, or `column.Property` when the
//!   qualifier is not a known alias
//! - **Property access**: `Address.City` on entity-typed values
//! - **Literal values**: Numbers, strings, booleans, NULL
//! - **Binary and unary operations**
//! - **Method calls**: `Count(City)`, `ToUpper(Name)`, `a.Describe()`
//! - **CASE expressions**, **CAST expressions** and **value lists**
//! - **Field links**: `::1` refers to the first GROUP BY expression
//!
//! ## Rendering
//!
//! `Display` produces a canonical textual form. The resolver uses it to name
//! unaliased output fields and to deduplicate aggregate calls, so two
//! expressions render identically exactly when they are structurally equal:
//!
//! ```text
//! Function { name: "Count", args: [Identifier("City")] }   =>  Count(City)
//! BinaryOp { Column(a.Age), Gt, Literal(18) }               =>  a.Age > 18
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// An expression of the query language
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// Literal value
    Literal(Literal),

    /// Bare name, resolved as a column of the active source
    Identifier(String),

    /// Qualified column reference (e.g., `a.Name`)
    Column(ColumnRef),

    /// Property access on a complex value (e.g., `Address.City`)
    Property { expr: Box<Expr>, name: String },

    /// Binary operation (e.g., `a + b`, `x = 5`)
    BinaryOp {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },

    /// Unary operation (e.g., `-x`, `NOT a`)
    UnaryOp { op: UnaryOp, expr: Box<Expr> },

    /// Method call, optionally qualified with a source alias (`a.Method()`)
    Function {
        name: String,
        qualifier: Option<String>,
        args: Vec<Expr>,
    },

    /// CASE expression
    Case {
        conditions: Vec<Expr>,
        results: Vec<Expr>,
        else_result: Option<Box<Expr>>,
    },

    /// CAST expression
    Cast { expr: Box<Expr>, type_name: String },

    /// Parenthesized expression
    Paren(Box<Expr>),

    /// List of expressions (e.g., for IN clause)
    List(Vec<Expr>),

    /// 1-based reference to a GROUP BY expression (`::n`)
    FieldLink(usize),
}

impl Expr {
    /// Bare identifier
    pub fn ident(name: impl Into<String>) -> Self {
        Expr::Identifier(name.into())
    }

    /// Qualified column reference
    pub fn column(alias: impl Into<String>, column: impl Into<String>) -> Self {
        Expr::Column(ColumnRef::new(column).with_table(alias))
    }

    /// Property access
    pub fn property(self, name: impl Into<String>) -> Self {
        Expr::Property {
            expr: Box::new(self),
            name: name.into(),
        }
    }

    /// Unqualified method call
    pub fn call(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Function {
            name: name.into(),
            qualifier: None,
            args,
        }
    }

    /// Method call qualified with a source alias
    pub fn qualified_call(
        qualifier: impl Into<String>,
        name: impl Into<String>,
        args: Vec<Expr>,
    ) -> Self {
        Expr::Function {
            name: name.into(),
            qualifier: Some(qualifier.into()),
            args,
        }
    }

    /// Binary operation
    pub fn binary(left: Expr, op: BinaryOp, right: Expr) -> Self {
        Expr::BinaryOp {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    /// Equality comparison
    pub fn eq(left: Expr, right: Expr) -> Self {
        Expr::binary(left, BinaryOp::Eq, right)
    }

    /// Logical conjunction
    pub fn and(left: Expr, right: Expr) -> Self {
        Expr::binary(left, BinaryOp::And, right)
    }

    /// Logical negation
    pub fn not(expr: Expr) -> Self {
        Expr::UnaryOp {
            op: UnaryOp::Not,
            expr: Box::new(expr),
        }
    }

    /// Integer literal
    pub fn int(value: i64) -> Self {
        Expr::Literal(Literal::Integer(value))
    }

    /// String literal
    pub fn string(value: impl Into<String>) -> Self {
        Expr::Literal(Literal::String(value.into()))
    }

    /// Boolean literal
    pub fn boolean(value: bool) -> Self {
        Expr::Literal(Literal::Boolean(value))
    }

    /// NULL literal
    pub fn null() -> Self {
        Expr::Literal(Literal::Null)
    }

    /// CASE expression from `(condition, result)` branches
    pub fn case(branches: Vec<(Expr, Expr)>, else_result: Option<Expr>) -> Self {
        let (conditions, results) = branches.into_iter().unzip();
        Expr::Case {
            conditions,
            results,
            else_result: else_result.map(Box::new),
        }
    }

    /// CAST expression
    pub fn cast(expr: Expr, type_name: impl Into<String>) -> Self {
        Expr::Cast {
            expr: Box::new(expr),
            type_name: type_name.into(),
        }
    }

    /// Check whether the expression contains a method call anywhere
    pub fn contains_call(&self) -> bool {
        match self {
            Expr::Function { .. } => true,
            Expr::Literal(_) | Expr::Identifier(_) | Expr::Column(_) | Expr::FieldLink(_) => false,
            Expr::Property { expr, .. }
            | Expr::UnaryOp { expr, .. }
            | Expr::Cast { expr, .. }
            | Expr::Paren(expr) => expr.contains_call(),
            Expr::BinaryOp { left, right, .. } => left.contains_call() || right.contains_call(),
            Expr::Case {
                conditions,
                results,
                else_result,
            } => {
                conditions.iter().chain(results).any(Expr::contains_call)
                    || else_result.as_ref().is_some_and(|e| e.contains_call())
            }
            Expr::List(items) => items.iter().any(Expr::contains_call),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(lit) => write!(f, "{}", lit),
            Expr::Identifier(name) => write!(f, "{}", name),
            Expr::Column(col) => write!(f, "{}", col.qualified()),
            Expr::Property { expr, name } => write!(f, "{}.{}", expr, name),
            Expr::BinaryOp { left, op, right } => write!(f, "{} {} {}", left, op, right),
            Expr::UnaryOp { op, expr } => match op {
                UnaryOp::Neg => write!(f, "-{}", expr),
                UnaryOp::Not => write!(f, "not {}", expr),
            },
            Expr::Function {
                name,
                qualifier,
                args,
            } => {
                if let Some(q) = qualifier {
                    write!(f, "{}.", q)?;
                }
                write!(f, "{}(", name)?;
                write_list(f, args)?;
                write!(f, ")")
            }
            Expr::Case {
                conditions,
                results,
                else_result,
            } => {
                write!(f, "case")?;
                for (condition, result) in conditions.iter().zip(results) {
                    write!(f, " when {} then {}", condition, result)?;
                }
                if let Some(e) = else_result {
                    write!(f, " else {}", e)?;
                }
                write!(f, " end")
            }
            Expr::Cast { expr, type_name } => write!(f, "cast({} as {})", expr, type_name),
            Expr::Paren(expr) => write!(f, "({})", expr),
            Expr::List(items) => {
                write!(f, "(")?;
                write_list(f, items)?;
                write!(f, ")")
            }
            Expr::FieldLink(index) => write!(f, "::{}", index),
        }
    }
}

/// Write a comma-separated list of displayable items
pub fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

/// Column reference
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnRef {
    /// Optional table/alias name
    pub table: Option<String>,
    /// Column name
    pub column: String,
}

impl ColumnRef {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            table: None,
            column: column.into(),
        }
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn qualified(&self) -> String {
        match &self.table {
            Some(table) => format!("{}.{}", table, self.column),
            None => self.column.clone(),
        }
    }
}

/// Literal value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => write!(f, "null"),
            Literal::Boolean(b) => write!(f, "{}", b),
            Literal::Integer(i) => write!(f, "{}", i),
            Literal::Float(x) => write!(f, "{:?}", x),
            Literal::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
        }
    }
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,

    // Comparison
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,

    // Null-safe comparison
    IsDistinctFrom,
    IsNotDistinctFrom,

    // Logical
    And,
    Or,

    // String
    Like,
    NotLike,

    // Other
    In,
    NotIn,
    Is,
    IsNot,
}

impl BinaryOp {
    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod
        )
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq
                | BinaryOp::NotEq
                | BinaryOp::Lt
                | BinaryOp::LtEq
                | BinaryOp::Gt
                | BinaryOp::GtEq
                | BinaryOp::IsDistinctFrom
                | BinaryOp::IsNotDistinctFrom
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }

    /// Operator keyword or symbol as rendered in expressions
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "=",
            BinaryOp::NotEq => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::IsDistinctFrom => "is distinct from",
            BinaryOp::IsNotDistinctFrom => "is not distinct from",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::Like => "like",
            BinaryOp::NotLike => "not like",
            BinaryOp::In => "in",
            BinaryOp::NotIn => "not in",
            BinaryOp::Is => "is",
            BinaryOp::IsNot => "is not",
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_ref() {
        let col = ColumnRef::new("id");
        assert_eq!(col.qualified(), "id");
        assert!(col.table.is_none());

        let qualified = col.with_table("users");
        assert_eq!(qualified.qualified(), "users.id");
        assert_eq!(qualified.table.as_deref(), Some("users"));
    }

    #[test]
    fn test_render_call_and_binary() {
        let count = Expr::call("Count", vec![Expr::ident("City")]);
        assert_eq!(count.to_string(), "Count(City)");

        let cmp = Expr::binary(Expr::column("a", "Age"), BinaryOp::GtEq, Expr::int(18));
        assert_eq!(cmp.to_string(), "a.Age >= 18");
    }

    #[test]
    fn test_render_case_and_literals() {
        let case = Expr::case(
            vec![(Expr::boolean(true), Expr::string("it's"))],
            None,
        );
        assert_eq!(case.to_string(), "case when true then 'it''s' end");
        assert_eq!(Expr::FieldLink(2).to_string(), "::2");
    }

    #[test]
    fn test_contains_call() {
        assert!(!Expr::ident("Name").contains_call());
        let nested = Expr::eq(
            Expr::ident("Name"),
            Expr::call("ToUpper", vec![Expr::ident("City")]),
        );
        assert!(nested.contains_call());
    }
}

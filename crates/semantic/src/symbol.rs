// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details
//
//! # Symbol types for semantic analysis
//!
//! This module defines the symbols stored in scope symbol tables: FROM-source
//! bindings ([`TableSymbol`]) and the accumulator updates of a grouped query
//! ([`RefreshMethodsSymbol`]).

use polyschema_sql_ir::{DataType, SchemaColumn};
use serde::{Deserialize, Serialize};

use crate::bound::RefreshCall;

/// A symbol bound to an alias in a scope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Symbol {
    Table(TableSymbol),
    RefreshMethods(RefreshMethodsSymbol),
}

/// Typed access to one variant of [`Symbol`]
pub trait SymbolKind: Sized {
    /// Name used in error messages
    const KIND: &'static str;

    fn from_symbol(symbol: &Symbol) -> Option<&Self>;

    fn from_symbol_mut(symbol: &mut Symbol) -> Option<&mut Self>;
}

impl SymbolKind for TableSymbol {
    const KIND: &'static str = "table";

    fn from_symbol(symbol: &Symbol) -> Option<&Self> {
        match symbol {
            Symbol::Table(table) => Some(table),
            Symbol::RefreshMethods(_) => None,
        }
    }

    fn from_symbol_mut(symbol: &mut Symbol) -> Option<&mut Self> {
        match symbol {
            Symbol::Table(table) => Some(table),
            Symbol::RefreshMethods(_) => None,
        }
    }
}

impl SymbolKind for RefreshMethodsSymbol {
    const KIND: &'static str = "refresh method list";

    fn from_symbol(symbol: &Symbol) -> Option<&Self> {
        match symbol {
            Symbol::RefreshMethods(refresh) => Some(refresh),
            Symbol::Table(_) => None,
        }
    }

    fn from_symbol_mut(symbol: &mut Symbol) -> Option<&mut Self> {
        match symbol {
            Symbol::RefreshMethods(refresh) => Some(refresh),
            Symbol::Table(_) => None,
        }
    }
}

/// Where the rows of a FROM source come from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableSource {
    /// A schema table method
    Schema { schema: String, method: String },
    /// A CTE declared in an enclosing query
    Cte(String),
    /// A host-registered in-memory table
    InMemory(String),
    /// A nested query
    Subquery,
    /// A join or apply of other sources
    Compound,
}

/// Represents one FROM-source binding
///
/// A plain symbol lists itself as its only compound table. A join or apply
/// produces a compound symbol with no columns of its own, listing the aliases
/// of its constituent sources in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSymbol {
    /// Alias the symbol is bound to
    pub alias: String,

    pub source: TableSource,

    /// Columns as described by the source
    pub columns: Vec<SchemaColumn>,

    /// Whether the alias was written in the query
    pub has_explicit_alias: bool,

    /// Aliases of the constituent sources
    pub compound_tables: Vec<String>,

    /// Whether every column is seen as nullable (outer side of a join)
    pub nullable: bool,

    /// Type injected into source-injecting methods
    pub row_type: DataType,
}

impl TableSymbol {
    /// Create a plain table symbol
    pub fn new(alias: impl Into<String>, source: TableSource, columns: Vec<SchemaColumn>) -> Self {
        let alias = alias.into();
        Self {
            compound_tables: vec![alias.clone()],
            alias,
            source,
            columns,
            has_explicit_alias: false,
            nullable: false,
            row_type: DataType::Object,
        }
    }

    /// Create a compound symbol over already registered sources
    pub fn compound(alias: impl Into<String>, compound_tables: Vec<String>) -> Self {
        Self {
            alias: alias.into(),
            source: TableSource::Compound,
            columns: Vec::new(),
            has_explicit_alias: false,
            compound_tables,
            nullable: false,
            row_type: DataType::Object,
        }
    }

    pub fn with_explicit_alias(mut self, explicit: bool) -> Self {
        self.has_explicit_alias = explicit;
        self
    }

    pub fn with_row_type(mut self, row_type: DataType) -> Self {
        self.row_type = row_type;
        self
    }

    pub fn is_compound(&self) -> bool {
        self.source == TableSource::Compound
    }

    /// Find a column, with the nullable transform applied
    ///
    /// # Examples
    ///
    /// ```
    /// use polyschema_sql_ir::{DataType, SchemaColumn};
    /// use polyschema_sql_semantic::{TableSource, TableSymbol};
    ///
    /// let mut table = TableSymbol::new(
    ///     "b",
    ///     TableSource::Subquery,
    ///     vec![SchemaColumn::new("Id", 0, DataType::Int)],
    /// );
    /// table.nullable = true;
    /// assert_eq!(table.column("Id").unwrap().data_type, DataType::Int.to_nullable());
    /// ```
    pub fn column(&self, name: &str) -> Option<SchemaColumn> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| self.transform(c))
    }

    /// All columns in declaration order, with the nullable transform applied
    pub fn visible_columns(&self) -> Vec<SchemaColumn> {
        self.columns.iter().map(|c| self.transform(c)).collect()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    fn transform(&self, column: &SchemaColumn) -> SchemaColumn {
        if self.nullable {
            column.to_nullable()
        } else {
            column.clone()
        }
    }
}

/// Key under which the refresh methods of an alias are stored
pub fn refresh_key(alias: &str) -> String {
    format!("{}#refresh", alias)
}

/// Ordered accumulator-update calls of one FROM alias
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RefreshMethodsSymbol {
    pub calls: Vec<RefreshCall>,
}

impl RefreshMethodsSymbol {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a call unless one with the same rendered signature exists
    ///
    /// Returns whether the call was added.
    pub fn add(&mut self, call: RefreshCall) -> bool {
        let rendered = call.to_string();
        if self.calls.iter().any(|c| c.to_string() == rendered) {
            return false;
        }
        self.calls.push(call);
        true
    }
}

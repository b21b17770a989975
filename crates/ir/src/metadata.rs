// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Column metadata
//!
//! Schemas describe the rows produced by a table method as an ordered list of
//! [`SchemaColumn`]s. A column is an immutable `(name, ordinal, type)` triple;
//! the ordinal is unique and stable within one table and is what generated
//! code uses to read the value out of a row.

use serde::{Deserialize, Serialize};

use crate::types::DataType;

/// Metadata for one column of a schema table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaColumn {
    /// Column name
    pub name: String,
    /// Position of the column in the row
    pub ordinal: usize,
    /// Data type
    pub data_type: DataType,
}

impl SchemaColumn {
    /// Create a new column
    pub fn new(name: impl Into<String>, ordinal: usize, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            ordinal,
            data_type,
        }
    }

    /// Copy of this column whose type admits null
    pub fn to_nullable(&self) -> Self {
        Self {
            name: self.name.clone(),
            ordinal: self.ordinal,
            data_type: self.data_type.clone().to_nullable(),
        }
    }
}

/// Build a column list from `(name, type)` pairs, assigning ordinals in order
pub fn columns<I, S>(defs: I) -> Vec<SchemaColumn>
where
    I: IntoIterator<Item = (S, DataType)>,
    S: Into<String>,
{
    defs.into_iter()
        .enumerate()
        .map(|(ordinal, (name, data_type))| SchemaColumn::new(name, ordinal, data_type))
        .collect()
}

/// Find a column by name (case-sensitive)
pub fn find_column<'a>(columns: &'a [SchemaColumn], name: &str) -> Option<&'a SchemaColumn> {
    columns.iter().find(|c| c.name == name)
}

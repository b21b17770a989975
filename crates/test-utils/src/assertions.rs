// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! Assertion helpers for output columns

use polyschema_sql_ir::{DataType, SchemaColumn};

/// Assert the column names, in order
pub fn assert_columns(columns: &[SchemaColumn], expected: &[&str]) {
    let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, expected, "Column names mismatch");
}

/// Assert column names and types, in order, with ordinals matching positions
pub fn assert_column_types(columns: &[SchemaColumn], expected: &[(&str, DataType)]) {
    assert_eq!(
        columns.len(),
        expected.len(),
        "Expected {} columns, found {:?}",
        expected.len(),
        columns
    );
    for (index, (column, (name, data_type))) in columns.iter().zip(expected).enumerate() {
        assert_eq!(column.name, *name, "Column {} name mismatch", index);
        assert_eq!(
            &column.data_type, data_type,
            "Column '{}' data type mismatch",
            name
        );
        assert_eq!(column.ordinal, index, "Column '{}' ordinal mismatch", name);
    }
}

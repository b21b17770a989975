// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! Builtin aggregate methods and their accumulator setters

use polyschema_sql_ir::{COMPARABLE_INTERFACE, DataType, NUMERIC_INTERFACE};

use crate::descriptor::MethodDescriptor;
use crate::shape::TypeShape;

/// Get all builtin aggregates, each followed by its setter
pub fn all_methods() -> Vec<MethodDescriptor> {
    let numeric = || TypeShape::implements(NUMERIC_INTERFACE);
    let ordered = || TypeShape::constrained("T", COMPARABLE_INTERFACE);

    vec![
        MethodDescriptor::aggregate("Count", TypeShape::concrete(DataType::Long))
            .param("value", TypeShape::Any)
            .with_description("Count the number of rows in the group"),
        MethodDescriptor::setter("Count").param("value", TypeShape::Any),
        MethodDescriptor::aggregate("Sum", TypeShape::concrete(DataType::Decimal))
            .param("value", numeric())
            .with_description("Sum of values"),
        MethodDescriptor::setter("Sum").param("value", numeric()),
        MethodDescriptor::aggregate("Avg", TypeShape::concrete(DataType::Decimal))
            .param("value", numeric())
            .with_description("Average of values"),
        MethodDescriptor::setter("Avg").param("value", numeric()),
        MethodDescriptor::aggregate("Min", TypeShape::generic("T"))
            .param("value", ordered())
            .with_description("Minimum value"),
        MethodDescriptor::setter("Min").param("value", ordered()),
        MethodDescriptor::aggregate("Max", TypeShape::generic("T"))
            .param("value", ordered())
            .with_description("Maximum value"),
        MethodDescriptor::setter("Max").param("value", ordered()),
        MethodDescriptor::aggregate(
            "AggregateValues",
            TypeShape::concrete(DataType::array_of(DataType::String)),
        )
        .param("value", TypeShape::Any)
        .with_description("Collect the textual form of values"),
        MethodDescriptor::setter("AggregateValues").param("value", TypeShape::Any),
    ]
}

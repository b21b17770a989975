// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! Builtin per-row methods

use polyschema_sql_ir::{DataType, NUMERIC_INTERFACE};

use crate::descriptor::MethodDescriptor;
use crate::shape::TypeShape;

/// Get all builtin scalar methods
pub fn all_methods() -> Vec<MethodDescriptor> {
    let string = || TypeShape::concrete(DataType::String);
    let int = || TypeShape::concrete(DataType::Int);
    let t = || TypeShape::generic("T");

    vec![
        // String methods
        MethodDescriptor::scalar("ToUpper", string())
            .param("value", string())
            .with_description("Convert to uppercase"),
        MethodDescriptor::scalar("ToLower", string())
            .param("value", string())
            .with_description("Convert to lowercase"),
        MethodDescriptor::scalar("Trim", string())
            .param("value", string())
            .with_description("Remove leading and trailing whitespace"),
        MethodDescriptor::scalar("Length", int())
            .param("value", string())
            .with_description("String length"),
        MethodDescriptor::scalar("Substring", string())
            .param("value", string())
            .param("index", int())
            .param("length", int())
            .with_description("Extract substring"),
        MethodDescriptor::scalar("Concat", string())
            .param("left", string())
            .param("right", string())
            .with_description("Concatenate strings"),
        // Numeric methods
        MethodDescriptor::scalar("Abs", TypeShape::generic("T"))
            .param("value", TypeShape::constrained("T", NUMERIC_INTERFACE))
            .with_description("Absolute value"),
        MethodDescriptor::scalar("Round", TypeShape::concrete(DataType::Decimal))
            .param("value", TypeShape::concrete(DataType::Decimal))
            .param("precision", int())
            .with_description("Round to the given number of decimals"),
        // Generic methods
        MethodDescriptor::scalar("Coalesce", t())
            .param("value", t())
            .param("fallback", t())
            .with_description("First non-null argument"),
        MethodDescriptor::scalar("Contains", TypeShape::concrete(DataType::Boolean))
            .param("values", TypeShape::sequence_of(t()))
            .param("value", t())
            .with_description("Check whether a sequence contains a value"),
        MethodDescriptor::scalar("First", t())
            .param("values", TypeShape::sequence_of(t()))
            .with_description("First element of a sequence"),
        MethodDescriptor::scalar("ElementAt", t())
            .param("values", TypeShape::sequence_of(t()))
            .param("index", int())
            .with_description("Element of a sequence at the given position"),
        // Injected methods
        MethodDescriptor::scalar("RowNumber", TypeShape::concrete(DataType::Long))
            .inject_stats()
            .with_description("Position of the current row"),
        MethodDescriptor::scalar("GetTypeName", string())
            .inject_source(TypeShape::Any)
            .with_description("Name of the type of the current row"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::MethodRegistry;
    use polyschema_sql_ir::TypeRegistry;

    #[test]
    fn test_element_type_instantiation() {
        let types = TypeRegistry::new();
        let registry = MethodRegistry::with_builtins();
        let first = registry
            .resolve_method(
                "First",
                &[DataType::sequence_of(DataType::DateTime)],
                None,
                &types,
            )
            .expect("First resolves");
        assert_eq!(first.return_type, DataType::DateTime);
    }

    #[test]
    fn test_coalesce_widens() {
        let types = TypeRegistry::new();
        let registry = MethodRegistry::with_builtins();
        let resolved = registry
            .resolve_method("Coalesce", &[DataType::Int, DataType::Decimal], None, &types)
            .expect("Coalesce resolves");
        assert_eq!(resolved.return_type, DataType::Decimal);
        assert!(registry
            .resolve_method("Coalesce", &[DataType::Int, DataType::String], None, &types)
            .is_none());
    }
}

// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! Mock catalog implementation for testing
//!
//! Provides schemas that record every table request, with a builder for the
//! standard test catalog.

use std::sync::{Arc, Mutex};

use polyschema_sql_catalog::{
    ArgValue, CatalogResult, DataType, RuntimeContext, Schema, SchemaCatalog, SchemaColumn,
    StaticSchema, StaticTable, TypeRegistry,
};
use polyschema_sql_functions::{MethodDescriptor, MethodRegistry, TypeShape};
use polyschema_sql_ir::{COMPARABLE_INTERFACE, EntityType};

/// Shared log of the contexts a schema was called with
pub type RequestLog = Arc<Mutex<Vec<RuntimeContext>>>;

/// Schema wrapper recording each `get_table` call
#[derive(Debug, Clone)]
pub struct MockSchema {
    inner: StaticSchema,
    requests: RequestLog,
}

impl MockSchema {
    pub fn new(inner: StaticSchema) -> Self {
        Self {
            inner,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Handle on the request log, usable after the schema moved into a catalog
    pub fn requests(&self) -> RequestLog {
        Arc::clone(&self.requests)
    }
}

impl Schema for MockSchema {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn get_table(
        &self,
        method: &str,
        context: &RuntimeContext,
        args: &[ArgValue],
    ) -> CatalogResult<Vec<SchemaColumn>> {
        if let Ok(mut log) = self.requests.lock() {
            log.push(context.clone());
        }
        self.inner.get_table(method, context, args)
    }

    fn row_type(&self, method: &str) -> DataType {
        self.inner.row_type(method)
    }

    fn table_names(&self) -> Vec<String> {
        self.inner.table_names()
    }

    fn methods(&self) -> &MethodRegistry {
        self.inner.methods()
    }
}

/// Entity types of the standard catalog
///
/// `Person { Name, Age, Address }`, `Address { City, Street }` and `Order`.
pub fn standard_types() -> TypeRegistry {
    TypeRegistry::new()
        .with_entity(
            EntityType::new("Person")
                .with_interface(COMPARABLE_INTERFACE)
                .with_property("Name", DataType::String)
                .with_property("Age", DataType::Int)
                .with_property("Address", DataType::entity("Address")),
        )
        .with_entity(
            EntityType::new("Address")
                .with_property("City", DataType::String)
                .with_property("Street", DataType::String),
        )
        .with_entity(EntityType::new("Order").with_property("Amount", DataType::Decimal))
}

/// Schema `A`: people, with `entities()` and `items(Int)`
pub fn people_schema() -> StaticSchema {
    let methods = MethodRegistry::with_builtins()
        .with_method(
            MethodDescriptor::scalar("Describe", TypeShape::concrete(DataType::String))
                .inject_source(TypeShape::concrete(DataType::entity("Person")))
                .with_description("Describe the current person"),
        )
        .with_method(
            MethodDescriptor::scalar("Tax", TypeShape::concrete(DataType::Decimal))
                .param("amount", TypeShape::concrete(DataType::Decimal)),
        )
        .with_method(
            MethodDescriptor::aggregate("Dominant", TypeShape::concrete(DataType::String))
                .param("value", TypeShape::concrete(DataType::String)),
        )
        .with_method(
            MethodDescriptor::setter("Dominant")
                .param("value", TypeShape::concrete(DataType::String)),
        );

    StaticSchema::new("A")
        .with_methods(methods)
        .with_types(standard_types())
        .with_table(
            StaticTable::new("entities")
                .with_column("Name", DataType::String)
                .with_column("City", DataType::String)
                .with_column("Country", DataType::String)
                .with_column("Population", DataType::Long)
                .with_column("Money", DataType::Decimal)
                .with_column("Id", DataType::Int)
                .with_column("Self", DataType::entity("Person"))
                .with_row_type(DataType::entity("Person")),
        )
        .with_table(
            StaticTable::new("items")
                .with_parameter(DataType::Int)
                .with_column("Value", DataType::Int)
                .with_column("Label", DataType::String),
        )
}

/// Schema `B`: orders, with `orders()`
pub fn orders_schema() -> StaticSchema {
    StaticSchema::new("B").with_types(standard_types()).with_table(
        StaticTable::new("orders")
            .with_column("Id", DataType::Int)
            .with_column("PersonId", DataType::Int)
            .with_column("Amount", DataType::Decimal)
            .with_column("IsPaid", DataType::Boolean.to_nullable())
            .with_row_type(DataType::entity("Order")),
    )
}

/// Builder for creating mock catalogs with a fluent API
pub struct MockCatalogBuilder {
    catalog: SchemaCatalog,
    logs: Vec<(String, RequestLog)>,
}

impl Default for MockCatalogBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCatalogBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self {
            catalog: SchemaCatalog::new().with_types(standard_types()),
            logs: Vec::new(),
        }
    }

    /// Add schemas `A` and `B` and the in-memory table `recent`
    pub fn with_standard_schema(self) -> Self {
        self.with_schema(people_schema())
            .with_schema(orders_schema())
            .with_in_memory_table(
                "recent",
                vec![
                    SchemaColumn::new("Name", 0, DataType::String),
                    SchemaColumn::new("Seen", 1, DataType::DateTime),
                ],
            )
    }

    /// Add a custom schema, wrapped so its requests are recorded
    pub fn with_schema(mut self, schema: StaticSchema) -> Self {
        let mock = MockSchema::new(schema);
        self.logs.push((mock.name().to_string(), mock.requests()));
        self.catalog = self.catalog.with_schema(mock);
        self
    }

    /// Add a schema from a YAML definition document
    pub fn with_yaml_schema(self, yaml: &str) -> Result<Self, serde_yaml::Error> {
        let definition = serde_yaml::from_str(yaml)?;
        Ok(self.with_schema(StaticSchema::from_definition(definition)))
    }

    pub fn with_in_memory_table(mut self, name: &str, columns: Vec<SchemaColumn>) -> Self {
        self.catalog = self.catalog.with_in_memory_table(name, columns);
        self
    }

    /// Request log of a schema added through this builder
    pub fn requests(&self, schema: &str) -> Option<RequestLog> {
        self.logs
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(schema))
            .map(|(_, log)| Arc::clone(log))
    }

    /// Build the mock catalog
    pub fn build(self) -> SchemaCatalog {
        self.catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_catalog() {
        let catalog = MockCatalogBuilder::new().with_standard_schema().build();
        assert_eq!(catalog.schema_names().len(), 2);
        assert!(catalog.schema("#A").is_some());
        assert!(catalog.in_memory_table("recent").is_some());
        assert!(catalog.types().entity("Person").is_some());
    }

    #[test]
    fn test_requests_are_recorded() {
        let builder = MockCatalogBuilder::new().with_standard_schema();
        let log = builder.requests("a").expect("schema A registered");
        let catalog = builder.build();

        let schema = catalog.schema("A").expect("schema A");
        let columns = schema
            .get_table("entities", &RuntimeContext::new("p"), &[])
            .expect("entities exists");
        assert_eq!(columns.len(), 7);
        assert_eq!(log.lock().expect("lock").len(), 1);
        assert_eq!(log.lock().expect("lock")[0].alias, "p");
    }

    #[test]
    fn test_items_takes_an_int() {
        let schema = people_schema();
        let ctx = RuntimeContext::new("i");
        assert!(schema.get_table("items", &ctx, &[]).is_err());
        assert!(
            schema
                .get_table("items", &ctx, &[ArgValue::Dynamic(DataType::Int)])
                .is_ok()
        );
    }

    #[test]
    fn test_yaml_schema() {
        let yaml = "name: os\ntables:\n  - method: files\n    columns:\n      - name: Name\n        dataType: String\n";
        let catalog = MockCatalogBuilder::new()
            .with_yaml_schema(yaml)
            .expect("valid yaml")
            .build();
        assert!(catalog.schema("os").is_some());
    }
}

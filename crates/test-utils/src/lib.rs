// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! Testing utilities for the polyschema SQL compiler
//!
//! This crate provides common testing components including:
//! - A mock schema that records what the compiler asked it for
//! - A standard catalog with people, orders and addresses
//! - Query fixtures built with the IR builders
//! - Assertion helpers

pub mod assertions;
pub mod fixtures;
pub mod mock_catalog;

// Re-exports for convenience
pub use assertions::{assert_column_types, assert_columns};
pub use fixtures::QueryFixtures;
pub use mock_catalog::{MockCatalogBuilder, MockSchema, RequestLog};

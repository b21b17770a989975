// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! Builtin method definitions
//!
//! This module contains the method library available to every query,
//! whichever schemas it reads from.

pub mod aggregate;
pub mod scalar;

use crate::descriptor::MethodDescriptor;

/// All builtin methods, aggregates first
pub fn all_methods() -> Vec<MethodDescriptor> {
    let mut methods = aggregate::all_methods();
    methods.extend(scalar::all_methods());
    methods
}

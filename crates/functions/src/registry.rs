// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

use polyschema_sql_ir::{DataType, TypeRegistry};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::builtin;
use crate::descriptor::{MethodDescriptor, MethodKind, ParamRole, setter_name};
use crate::shape::{Bindings, MatchScore};

/// A method selected for a call site, with generics instantiated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedMethod {
    /// Declared method name
    pub name: String,
    pub kind: MethodKind,
    /// Roles of all parameters in declaration order
    pub roles: Vec<ParamRole>,
    /// Instantiated types of the parameters matched against written arguments
    pub param_types: Vec<DataType>,
    pub return_type: DataType,
    pub bindings: Bindings,
    /// Signature of the selected descriptor
    pub signature: String,
}

impl ResolvedMethod {
    /// Check whether generated code must pass the source row
    pub fn injects_source(&self) -> bool {
        self.roles.contains(&ParamRole::InjectSource)
    }
}

/// An aggregate method together with its accumulator setter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateResolution {
    pub method: ResolvedMethod,
    pub setter: ResolvedMethod,
}

/// How `InjectSource` parameters take part in matching
#[derive(Debug, Clone, Copy)]
enum SourceMode<'a> {
    /// Supplied by generated code from the current row of this type
    Injected(Option<&'a DataType>),
    /// Passed explicitly as an ordinary argument
    Raw,
}

/// Registry of method descriptors
///
/// Names are matched case-insensitively. When several overloads match, the
/// one with the best total match score wins; ties go to the descriptor
/// registered first.
#[derive(Debug, Clone, Default)]
pub struct MethodRegistry {
    methods: Vec<MethodDescriptor>,
}

impl MethodRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry preloaded with the builtin library
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for method in builtin::all_methods() {
            registry.register(method);
        }
        registry
    }

    /// Register a method descriptor
    pub fn register(&mut self, method: MethodDescriptor) {
        trace!(method = %method.signature(), "Registering method");
        self.methods.push(method);
    }

    /// Builder-style variant of [`MethodRegistry::register`]
    pub fn with_method(mut self, method: MethodDescriptor) -> Self {
        self.register(method);
        self
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// All descriptors with the given name
    pub fn candidates<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a MethodDescriptor> {
        self.methods
            .iter()
            .filter(move |m| m.name.eq_ignore_ascii_case(name))
    }

    /// Check if any descriptor has the given name
    pub fn has_method(&self, name: &str) -> bool {
        self.candidates(name).next().is_some()
    }

    /// Distinct names of all callable methods (setters excluded)
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for m in &self.methods {
            if m.kind != MethodKind::AggregateSetter && !names.contains(&m.name) {
                names.push(m.name.clone());
            }
        }
        names
    }

    /// Resolve an ordinary (per-row) method
    ///
    /// `source` is the row type of the FROM source the call is evaluated
    /// against. Descriptors that inject the source only match when it is
    /// given and fits their declared shape.
    pub fn resolve_method(
        &self,
        name: &str,
        args: &[DataType],
        source: Option<&DataType>,
        types: &TypeRegistry,
    ) -> Option<ResolvedMethod> {
        self.best_match(name, MethodKind::Scalar, args, SourceMode::Injected(source), types)
    }

    /// Resolve a method without automatic source injection
    ///
    /// Source parameters are matched against written arguments like ordinary
    /// parameters.
    pub fn resolve_raw_method(
        &self,
        name: &str,
        args: &[DataType],
        types: &TypeRegistry,
    ) -> Option<ResolvedMethod> {
        self.best_match(name, MethodKind::Scalar, args, SourceMode::Raw, types)
    }

    /// Resolve an aggregate and its `Set<Name>` setter
    ///
    /// Returns `None` unless both the aggregate and a setter accepting the
    /// same argument types exist.
    pub fn resolve_aggregate(
        &self,
        name: &str,
        args: &[DataType],
        types: &TypeRegistry,
    ) -> Option<AggregateResolution> {
        let method = self.best_match(
            name,
            MethodKind::Aggregate,
            args,
            SourceMode::Injected(None),
            types,
        )?;
        let setter = self.best_match(
            &setter_name(&method.name),
            MethodKind::AggregateSetter,
            args,
            SourceMode::Injected(None),
            types,
        );

        match setter {
            Some(setter) => Some(AggregateResolution { method, setter }),
            None => {
                debug!(aggregate = %method.name, "Aggregate has no matching setter");
                None
            }
        }
    }

    fn best_match(
        &self,
        name: &str,
        kind: MethodKind,
        args: &[DataType],
        mode: SourceMode<'_>,
        types: &TypeRegistry,
    ) -> Option<ResolvedMethod> {
        let mut best: Option<(MatchScore, ResolvedMethod)> = None;

        for candidate in self.candidates(name).filter(|m| m.kind == kind) {
            let Some((score, resolved)) = try_match(candidate, args, mode, types) else {
                continue;
            };
            trace!(candidate = %candidate.signature(), score, "Candidate matched");
            if best.as_ref().is_none_or(|(s, _)| score > *s) {
                best = Some((score, resolved));
            }
        }

        if let Some((_, resolved)) = &best {
            debug!(method = %resolved.signature, return_type = %resolved.return_type, "Resolved method");
        }
        best.map(|(_, resolved)| resolved)
    }
}

fn try_match(
    candidate: &MethodDescriptor,
    args: &[DataType],
    mode: SourceMode<'_>,
    types: &TypeRegistry,
) -> Option<(MatchScore, ResolvedMethod)> {
    let mut bindings = Bindings::new();
    let mut score: MatchScore = 0;

    let matched: Vec<_> = candidate
        .params
        .iter()
        .filter(|p| match p.role {
            ParamRole::Ordinary => true,
            ParamRole::InjectSource => matches!(mode, SourceMode::Raw),
            _ => false,
        })
        .collect();
    if matched.len() != args.len() {
        return None;
    }

    if let (SourceMode::Injected(source), Some(param)) = (mode, candidate.source_param()) {
        score += param.shape.unify(source?, &mut bindings, types)?;
    }

    for (param, arg) in matched.iter().zip(args) {
        score += param.shape.unify(arg, &mut bindings, types)?;
    }

    let roles = candidate
        .params
        .iter()
        .map(|p| match (p.role, mode) {
            (ParamRole::InjectSource, SourceMode::Raw) => ParamRole::Ordinary,
            (role, _) => role,
        })
        .collect();

    Some((
        score,
        ResolvedMethod {
            name: candidate.name.clone(),
            kind: candidate.kind,
            roles,
            param_types: matched
                .iter()
                .map(|p| p.shape.instantiate(&bindings))
                .collect(),
            return_type: candidate.returns.instantiate(&bindings),
            bindings,
            signature: candidate.signature(),
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::TypeShape;

    fn registry() -> MethodRegistry {
        MethodRegistry::with_builtins()
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let registry = registry();
        assert!(registry.has_method("count"));
        assert!(registry.has_method("TOUPPER"));
        assert!(!registry.has_method("NoSuchMethod"));
    }

    #[test]
    fn test_names_exclude_setters() {
        let names = registry().names();
        assert!(names.contains(&"Count".to_string()));
        assert!(!names.iter().any(|n| n.starts_with("Set")));
    }

    #[test]
    fn test_resolve_generic_aggregate() {
        let types = TypeRegistry::new();
        let resolution = registry()
            .resolve_aggregate("Max", &[DataType::Int], &types)
            .expect("Max resolves");
        assert_eq!(resolution.method.return_type, DataType::Int);
        assert_eq!(resolution.setter.name, "SetMax");
        assert_eq!(
            resolution.method.roles[..2],
            [ParamRole::InjectGroup, ParamRole::AccumulatorName]
        );
    }

    #[test]
    fn test_aggregate_without_setter_is_rejected() {
        let types = TypeRegistry::new();
        let registry = MethodRegistry::new().with_method(
            MethodDescriptor::aggregate("Lonely", TypeShape::concrete(DataType::Int))
                .param("value", TypeShape::Any),
        );
        assert!(registry.resolve_aggregate("Lonely", &[DataType::Int], &types).is_none());
    }

    #[test]
    fn test_scalar_is_not_an_aggregate() {
        let types = TypeRegistry::new();
        assert!(registry()
            .resolve_aggregate("ToUpper", &[DataType::String], &types)
            .is_none());
        assert!(registry()
            .resolve_method("Count", &[DataType::String], None, &types)
            .is_none());
    }

    #[test]
    fn test_best_overload_wins() {
        let types = TypeRegistry::new();
        let registry = MethodRegistry::new()
            .with_method(
                MethodDescriptor::scalar("Pick", TypeShape::concrete(DataType::String))
                    .param("value", TypeShape::Any),
            )
            .with_method(
                MethodDescriptor::scalar("Pick", TypeShape::concrete(DataType::Int))
                    .param("value", TypeShape::concrete(DataType::Int)),
            );
        let picked = registry
            .resolve_method("Pick", &[DataType::Int], None, &types)
            .expect("resolves");
        assert_eq!(picked.return_type, DataType::Int);

        let fallback = registry
            .resolve_method("Pick", &[DataType::Boolean], None, &types)
            .expect("resolves");
        assert_eq!(fallback.return_type, DataType::String);
    }

    #[test]
    fn test_source_injection_versus_raw() {
        let types = TypeRegistry::new();
        let registry = registry();
        let row = DataType::entity("Person");

        let injected = registry
            .resolve_method("GetTypeName", &[], Some(&row), &types)
            .expect("injected resolves");
        assert!(injected.injects_source());

        assert!(registry.resolve_method("GetTypeName", &[], None, &types).is_none());

        let raw = registry
            .resolve_raw_method("GetTypeName", &[row], &types)
            .expect("raw resolves");
        assert!(!raw.injects_source());
    }

    #[test]
    fn test_arity_mismatch() {
        let types = TypeRegistry::new();
        assert!(registry()
            .resolve_method("ToUpper", &[DataType::String, DataType::String], None, &types)
            .is_none());
    }
}

// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details
//
//! # Scope management for semantic analysis
//!
//! This module defines scope types and the scope manager for tracking
//! symbols and their visibility across nested query blocks.
//!
//! Scopes live in an arena owned by [`ScopeManager`] and refer to their
//! parent by id. Lookups walk the parent chain outward, so a set-operator
//! operand sees the CTEs of its enclosing query while two sibling operands
//! never see each other's aliases.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{SemanticError, SemanticResult};
use crate::symbol::{Symbol, SymbolKind, TableSymbol};

/// Identifier of a scope in the [`ScopeManager`] arena
pub type ScopeId = usize;

/// Type of scope in a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScopeType {
    /// Query block (root query or set-operator operand)
    Query,
    /// Common Table Expression (CTE) body
    Cte,
    /// Container of the two operands of a set operator
    SetOperator,
    /// Nested query in a FROM clause
    Subquery,
}

/// Represents a lexical scope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scope {
    /// Unique identifier for this scope
    pub id: ScopeId,

    /// Parent scope ID (if any)
    pub parent_id: Option<ScopeId>,

    /// Type of this scope
    pub scope_type: ScopeType,

    /// Descriptive name (e.g. the CTE name)
    pub name: String,

    /// String attributes attached by the passes
    pub attributes: BTreeMap<String, String>,

    /// Symbols in registration order
    symbols: Vec<(String, Symbol)>,
}

impl Scope {
    /// Create a new scope
    ///
    /// # Examples
    ///
    /// ```
    /// use polyschema_sql_semantic::{Scope, ScopeType};
    ///
    /// let scope = Scope::new(0, ScopeType::Query, "Query");
    /// assert_eq!(scope.id, 0);
    /// assert!(scope.symbol_names().is_empty());
    /// ```
    pub fn new(id: ScopeId, scope_type: ScopeType, name: impl Into<String>) -> Self {
        Self {
            id,
            parent_id: None,
            scope_type,
            name: name.into(),
            attributes: BTreeMap::new(),
            symbols: Vec::new(),
        }
    }

    /// Set the parent scope
    pub fn with_parent(mut self, parent_id: ScopeId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    /// Find a symbol in this scope only
    pub fn find_symbol(&self, alias: &str) -> Option<&Symbol> {
        self.symbols.iter().find(|(a, _)| a == alias).map(|(_, s)| s)
    }

    fn find_symbol_mut(&mut self, alias: &str) -> Option<&mut Symbol> {
        self.symbols
            .iter_mut()
            .find(|(a, _)| a == alias)
            .map(|(_, s)| s)
    }

    /// Aliases bound in this scope, in registration order
    pub fn symbol_names(&self) -> Vec<&str> {
        self.symbols.iter().map(|(a, _)| a.as_str()).collect()
    }
}

/// Manages hierarchical scopes and symbol resolution
///
/// The manager keeps a cursor on the scope being analyzed:
/// [`ScopeManager::enter_scope`] opens a child of the current scope and
/// [`ScopeManager::leave_scope`] returns to its parent. Symbol operations
/// take the scope to start from explicitly.
#[derive(Debug, Clone, Default)]
pub struct ScopeManager {
    /// All scopes managed by this manager
    scopes: Vec<Scope>,

    /// Scope being analyzed
    current: Option<ScopeId>,
}

impl ScopeManager {
    /// Create a new scope manager
    ///
    /// # Examples
    ///
    /// ```
    /// use polyschema_sql_semantic::ScopeManager;
    ///
    /// let manager = ScopeManager::new();
    /// assert_eq!(manager.scope_count(), 0);
    /// assert!(manager.current().is_none());
    /// ```
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a scope without moving the cursor
    pub fn create_scope(
        &mut self,
        scope_type: ScopeType,
        name: impl Into<String>,
        parent_id: Option<ScopeId>,
    ) -> ScopeId {
        let id = self.scopes.len();
        let mut scope = Scope::new(id, scope_type, name);
        if let Some(parent) = parent_id {
            scope = scope.with_parent(parent);
        }
        trace!(id, ?scope_type, parent = ?parent_id, "Created scope");
        self.scopes.push(scope);
        id
    }

    /// Open a child of the current scope and make it current
    ///
    /// # Examples
    ///
    /// ```
    /// use polyschema_sql_semantic::{ScopeManager, ScopeType};
    ///
    /// let mut manager = ScopeManager::new();
    /// let root = manager.enter_scope(ScopeType::Query, "Query");
    /// let cte = manager.enter_scope(ScopeType::Cte, "recent");
    ///
    /// assert_eq!(manager.get_scope(cte).unwrap().parent_id, Some(root));
    /// assert_eq!(manager.leave_scope().unwrap(), Some(root));
    /// ```
    pub fn enter_scope(&mut self, scope_type: ScopeType, name: impl Into<String>) -> ScopeId {
        let id = self.create_scope(scope_type, name, self.current);
        self.current = Some(id);
        id
    }

    /// Return to the parent of the current scope
    ///
    /// Returns the new current scope.
    pub fn leave_scope(&mut self) -> SemanticResult<Option<ScopeId>> {
        let current = self
            .current
            .ok_or_else(|| SemanticError::InvalidScope("no scope to leave".to_string()))?;
        self.current = self.scope(current)?.parent_id;
        Ok(self.current)
    }

    /// Scope being analyzed
    pub fn current(&self) -> Option<ScopeId> {
        self.current
    }

    /// Scope being analyzed, or an error when none is open
    pub fn require_current(&self) -> SemanticResult<ScopeId> {
        self.current
            .ok_or_else(|| SemanticError::InvalidScope("no open scope".to_string()))
    }

    /// Get a scope by ID
    pub fn get_scope(&self, id: ScopeId) -> Option<&Scope> {
        self.scopes.get(id)
    }

    /// All scopes, in creation order
    pub fn scopes(&self) -> &[Scope] {
        &self.scopes
    }

    fn scope(&self, id: ScopeId) -> SemanticResult<&Scope> {
        self.scopes
            .get(id)
            .ok_or_else(|| SemanticError::InvalidScope(format!("scope {}", id)))
    }

    fn scope_mut(&mut self, id: ScopeId) -> SemanticResult<&mut Scope> {
        self.scopes
            .get_mut(id)
            .ok_or_else(|| SemanticError::InvalidScope(format!("scope {}", id)))
    }

    /// Ids of `scope_id` and its ancestors, nearest first
    pub fn chain(&self, scope_id: ScopeId) -> SemanticResult<Vec<ScopeId>> {
        let mut chain = Vec::new();
        let mut current_id = Some(scope_id);
        while let Some(id) = current_id {
            chain.push(id);
            current_id = self.scope(id)?.parent_id;
        }
        Ok(chain)
    }

    /// Bind a symbol to an alias in a scope
    ///
    /// Fails with [`SemanticError::AliasAlreadyUsed`] when the alias is
    /// already bound anywhere in the visible chain.
    ///
    /// # Examples
    ///
    /// ```
    /// use polyschema_sql_semantic::{
    ///     ScopeManager, ScopeType, SemanticError, Symbol, TableSource, TableSymbol,
    /// };
    ///
    /// let mut manager = ScopeManager::new();
    /// let root = manager.enter_scope(ScopeType::Query, "Query");
    /// let table = TableSymbol::new("a", TableSource::Subquery, vec![]);
    ///
    /// manager.add_symbol(root, "a", Symbol::Table(table.clone())).unwrap();
    /// assert!(matches!(
    ///     manager.add_symbol(root, "a", Symbol::Table(table)),
    ///     Err(SemanticError::AliasAlreadyUsed(_))
    /// ));
    /// ```
    pub fn add_symbol(
        &mut self,
        scope_id: ScopeId,
        alias: impl Into<String>,
        symbol: Symbol,
    ) -> SemanticResult<()> {
        let alias = alias.into();
        if self.lookup(&alias, scope_id)?.is_some() {
            return Err(SemanticError::AliasAlreadyUsed(alias));
        }
        trace!(scope = scope_id, %alias, "Adding symbol");
        self.scope_mut(scope_id)?.symbols.push((alias, symbol));
        Ok(())
    }

    /// Find the symbol bound to an alias, walking outward from `scope_id`
    pub fn lookup(&self, alias: &str, scope_id: ScopeId) -> SemanticResult<Option<&Symbol>> {
        for id in self.chain(scope_id)? {
            if let Some(symbol) = self.scope(id)?.find_symbol(alias) {
                return Ok(Some(symbol));
            }
        }
        Ok(None)
    }

    /// Resolve an alias to a symbol of the expected kind
    ///
    /// Fails with [`SemanticError::UnknownColumnOrAlias`] when the alias is
    /// not bound, or [`SemanticError::UnexpectedSymbolKind`] when it is bound
    /// to another kind of symbol.
    pub fn resolve<T: SymbolKind>(&self, alias: &str, scope_id: ScopeId) -> SemanticResult<&T> {
        match self.lookup(alias, scope_id)? {
            Some(symbol) => T::from_symbol(symbol).ok_or_else(|| SemanticError::UnexpectedSymbolKind {
                alias: alias.to_string(),
                expected: T::KIND.to_string(),
            }),
            None => Err(SemanticError::UnknownColumnOrAlias {
                name: alias.to_string(),
                suggestions: Vec::new(),
            }),
        }
    }

    /// Like [`ScopeManager::resolve`], but `None` when the alias is not bound
    pub fn try_resolve<T: SymbolKind>(
        &self,
        alias: &str,
        scope_id: ScopeId,
    ) -> SemanticResult<Option<&T>> {
        match self.lookup(alias, scope_id)? {
            Some(_) => self.resolve(alias, scope_id).map(Some),
            None => Ok(None),
        }
    }

    /// Replace the symbol bound to an alias in place
    pub fn update_symbol(
        &mut self,
        alias: &str,
        scope_id: ScopeId,
        symbol: Symbol,
    ) -> SemanticResult<()> {
        for id in self.chain(scope_id)? {
            if let Some(slot) = self.scope_mut(id)?.find_symbol_mut(alias) {
                *slot = symbol;
                return Ok(());
            }
        }
        Err(SemanticError::UnknownColumnOrAlias {
            name: alias.to_string(),
            suggestions: Vec::new(),
        })
    }

    /// Modify the symbol bound to an alias in place
    pub fn modify<T, F>(&mut self, alias: &str, scope_id: ScopeId, f: F) -> SemanticResult<()>
    where
        T: SymbolKind,
        F: FnOnce(&mut T),
    {
        let mut symbol = self
            .lookup(alias, scope_id)?
            .cloned()
            .ok_or_else(|| SemanticError::UnknownColumnOrAlias {
                name: alias.to_string(),
                suggestions: Vec::new(),
            })?;
        let inner = T::from_symbol_mut(&mut symbol).ok_or_else(|| {
            SemanticError::UnexpectedSymbolKind {
                alias: alias.to_string(),
                expected: T::KIND.to_string(),
            }
        })?;
        f(inner);
        self.update_symbol(alias, scope_id, symbol)
    }

    /// Rebind the symbol of `from` to `to`, keeping its position
    pub fn move_symbol(&mut self, scope_id: ScopeId, from: &str, to: &str) -> SemanticResult<()> {
        if self.lookup(to, scope_id)?.is_some() {
            return Err(SemanticError::AliasAlreadyUsed(to.to_string()));
        }
        for id in self.chain(scope_id)? {
            let scope = self.scope_mut(id)?;
            if let Some(entry) = scope.symbols.iter_mut().find(|(a, _)| a == from) {
                entry.0 = to.to_string();
                if let Symbol::Table(table) = &mut entry.1 {
                    table.alias = to.to_string();
                }
                return Ok(());
            }
        }
        Err(SemanticError::UnknownColumnOrAlias {
            name: from.to_string(),
            suggestions: Vec::new(),
        })
    }

    /// Table symbols visible from a scope, nearest scope first
    pub fn visible_tables(&self, scope_id: ScopeId) -> SemanticResult<Vec<&TableSymbol>> {
        let mut tables = Vec::new();
        for id in self.chain(scope_id)? {
            tables.extend(
                self.scope(id)?
                    .symbols
                    .iter()
                    .filter_map(|(_, s)| TableSymbol::from_symbol(s)),
            );
        }
        Ok(tables)
    }

    /// Attach an attribute to a scope
    pub fn set_attribute(
        &mut self,
        scope_id: ScopeId,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> SemanticResult<()> {
        self.scope_mut(scope_id)?
            .attributes
            .insert(key.into(), value.into());
        Ok(())
    }

    /// Read an attribute of a scope
    pub fn attribute(&self, scope_id: ScopeId, key: &str) -> Option<&str> {
        self.scopes
            .get(scope_id)
            .and_then(|s| s.attributes.get(key))
            .map(String::as_str)
    }

    /// Get the total number of scopes
    pub fn scope_count(&self) -> usize {
        self.scopes.len()
    }
}

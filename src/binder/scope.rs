//! Scopes, scope entries and the scope stack.

use indexmap::IndexMap;
use tracing::trace;

use crate::config::ResolverConfig;
use crate::error::BindError;
use crate::types::DataType;

use super::expression::BoundExpression;

/// Name and type of a variable in a property-navigation chain.
#[derive(Debug, Clone, PartialEq)]
pub struct VarRef {
    /// Variable name.
    pub name: String,
    /// Variable type.
    pub data_type: DataType,
}

impl VarRef {
    /// Creates a variable reference descriptor.
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        VarRef {
            name: name.into(),
            data_type,
        }
    }

    fn from_expression(expr: &BoundExpression) -> Self {
        match expr {
            BoundExpression::VariableRef {
                variable,
                data_type,
            } => VarRef::new(variable.clone(), data_type.clone()),
            other => panic!("source variable is based on a non-variable expression: {other:?}"),
        }
    }

    fn to_expression(&self) -> BoundExpression {
        BoundExpression::variable(self.name.clone(), self.data_type.clone())
    }
}

/// A name introduced by a FROM item, a join, a group key or an aggregate.
///
/// The entry records how it was reached from the current input variable so
/// that it can be rebased when the input is rewritten (filter, join, group).
#[derive(Debug, Clone, PartialEq)]
pub struct SourceVariable {
    var_based: BoundExpression,
    prop_refs: Option<Vec<VarRef>>,
    group_var_based: Option<BoundExpression>,
    group_agg_based: Option<BoundExpression>,
    is_join_left: bool,
    alternative_name: Option<Vec<String>>,
}

impl SourceVariable {
    /// Creates an entry for a bound variable.
    #[must_use]
    pub fn new(variable: VarRef) -> Self {
        SourceVariable {
            var_based: variable.to_expression(),
            prop_refs: None,
            group_var_based: None,
            group_agg_based: None,
            is_join_left: false,
            alternative_name: None,
        }
    }

    /// Sets the dotted name the entry is also visible under.
    #[must_use]
    pub fn with_alternative_name(mut self, name: Vec<String>) -> Self {
        self.alternative_name = Some(name);
        self
    }

    /// Returns the expression the entry resolves to outside any aggregate.
    #[must_use]
    pub fn expression(&self) -> &BoundExpression {
        &self.var_based
    }

    /// Returns true while the left side of a join is being shadowed.
    #[must_use]
    pub fn is_join_left(&self) -> bool {
        self.is_join_left
    }

    /// Marks or unmarks the entry as left side of a join.
    pub fn set_join_left(&mut self, value: bool) {
        self.is_join_left = value;
    }

    /// Returns the dotted alternative name, if any.
    #[must_use]
    pub fn alternative_name(&self) -> Option<&[String]> {
        self.alternative_name.as_deref()
    }

    /// Returns true while adjusted to a group.
    #[must_use]
    pub fn is_group_adjusted(&self) -> bool {
        self.group_var_based.is_some()
    }

    /// Makes the entry a member of a new parent row variable.
    ///
    /// # Panics
    ///
    /// Panics while the entry is adjusted to a group.
    pub fn add_parent_var(&mut self, parent: &BoundExpression) {
        assert!(
            !self.is_group_adjusted(),
            "parent var cannot change while adjusted to a group"
        );
        let var_based = &self.var_based;
        let refs = self
            .prop_refs
            .get_or_insert_with(|| vec![VarRef::from_expression(var_based)]);

        let mut expr = parent.clone();
        for var in refs.iter().rev() {
            expr = expr.property(var.name.clone(), var.data_type.clone());
        }
        refs.push(VarRef::from_expression(parent));
        self.var_based = expr;
    }

    /// Replaces the innermost parent variable.
    ///
    /// # Panics
    ///
    /// Panics while the entry is adjusted to a group.
    pub fn replace_parent_var(&mut self, parent: &BoundExpression) {
        assert!(
            !self.is_group_adjusted(),
            "parent var cannot change while adjusted to a group"
        );
        match self.prop_refs.as_mut() {
            None => self.var_based = parent.clone(),
            Some(refs) => {
                refs.pop();
                self.add_parent_var(parent);
            }
        }
    }

    /// Rebases the entry onto a group input variable and records its
    /// group-variable and group-aggregate projections.
    ///
    /// # Panics
    ///
    /// Panics if already adjusted.
    pub fn adjust_to_group_var(
        &mut self,
        parent: &BoundExpression,
        group_var: &BoundExpression,
        group_agg_var: &BoundExpression,
    ) {
        assert!(!self.is_group_adjusted(), "group adjustment is not reentrant");
        self.replace_parent_var(parent);

        let mut by_group = group_var.clone();
        let mut by_agg = group_agg_var.clone();
        if let Some(refs) = &self.prop_refs {
            for var in refs.iter().rev().skip(1) {
                by_group = by_group.property(var.name.clone(), var.data_type.clone());
                by_agg = by_agg.property(var.name.clone(), var.data_type.clone());
            }
        }
        self.group_var_based = Some(by_group);
        self.group_agg_based = Some(by_agg);
    }

    /// Undoes [`SourceVariable::adjust_to_group_var`].
    pub fn rollback_adjustment_to_group_var(&mut self, pregroup_var: &BoundExpression) {
        self.group_var_based = None;
        self.group_agg_based = None;
        self.replace_parent_var(pregroup_var);
    }
}

/// Binding of a name in a scope.
#[derive(Debug, Clone, PartialEq)]
pub enum ScopeEntry {
    /// Name introduced by the query's sources.
    Source(SourceVariable),
    /// Fixed expression: a query variable or an inline function formal.
    Free(BoundExpression),
    /// Group key while aggregates are being searched.
    GroupKeyDefinition {
        var_based: BoundExpression,
        group_var_based: BoundExpression,
        group_agg_based: BoundExpression,
        alternative_name: Option<Vec<String>>,
    },
    /// SELECT item seen from ORDER BY.
    ProjectionItemDefinition(BoundExpression),
    /// Name that was hidden by a group-by.
    InvalidGroupInputRef,
}

impl ScopeEntry {
    /// Returns the plain expression the entry resolves to.
    ///
    /// # Errors
    ///
    /// Returns `InvalidGroupInputReference` for names hidden by a group-by.
    pub fn expression(&self, name: &str) -> Result<BoundExpression, BindError> {
        match self {
            ScopeEntry::Source(source) => Ok(source.expression().clone()),
            ScopeEntry::Free(expr) | ScopeEntry::ProjectionItemDefinition(expr) => Ok(expr.clone()),
            ScopeEntry::GroupKeyDefinition { var_based, .. } => Ok(var_based.clone()),
            ScopeEntry::InvalidGroupInputRef => {
                Err(BindError::InvalidGroupInputReference(name.to_string()))
            }
        }
    }

    /// Returns the group-variable and group-aggregate projections, if the
    /// entry currently has them.
    #[must_use]
    pub fn group_projections(&self) -> Option<(&BoundExpression, &BoundExpression)> {
        match self {
            ScopeEntry::Source(SourceVariable {
                group_var_based: Some(by_group),
                group_agg_based: Some(by_agg),
                ..
            })
            | ScopeEntry::GroupKeyDefinition {
                group_var_based: by_group,
                group_agg_based: by_agg,
                ..
            } => Some((by_group, by_agg)),
            _ => None,
        }
    }

    /// Returns the dotted alternative name, if any.
    #[must_use]
    pub fn alternative_name(&self) -> Option<&[String]> {
        match self {
            ScopeEntry::Source(source) => source.alternative_name(),
            ScopeEntry::GroupKeyDefinition {
                alternative_name, ..
            } => alternative_name.as_deref(),
            _ => None,
        }
    }

    /// Returns the source variable, if this is one.
    pub fn as_source_mut(&mut self) -> Option<&mut SourceVariable> {
        match self {
            ScopeEntry::Source(source) => Some(source),
            _ => None,
        }
    }
}

/// One lexical block: an ordered mapping of normalized names to entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scope {
    entries: IndexMap<String, ScopeEntry>,
}

impl Scope {
    /// Creates an empty scope.
    #[must_use]
    pub fn new() -> Self {
        Scope::default()
    }

    /// Adds an entry under a normalized key.
    pub fn add(&mut self, key: String, entry: ScopeEntry) {
        self.entries.insert(key, entry);
    }

    /// Replaces the entry stored under `key`.
    ///
    /// # Panics
    ///
    /// Panics if `key` is not present.
    pub fn replace(&mut self, key: &str, entry: ScopeEntry) {
        match self.entries.get_mut(key) {
            Some(slot) => *slot = entry,
            None => panic!("replacing missing scope entry '{key}'"),
        }
    }

    /// Returns true if `key` is bound in this scope.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Returns the entry bound to `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ScopeEntry> {
        self.entries.get(key)
    }

    /// Returns the entry bound to `key` mutably.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut ScopeEntry> {
        self.entries.get_mut(key)
    }

    /// Enumerates entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ScopeEntry)> {
        self.entries.iter()
    }

    /// Enumerates entries mutably in insertion order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&String, &mut ScopeEntry)> {
        self.entries.iter_mut()
    }

    /// Returns the normalized names bound in this scope.
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no names are bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Stack of scopes. Index 0 is the root scope and is never popped.
#[derive(Debug, Clone)]
pub struct ScopeManager {
    scopes: Vec<Scope>,
    config: ResolverConfig,
}

impl ScopeManager {
    /// Creates a manager holding only the root scope.
    #[must_use]
    pub fn new(config: ResolverConfig) -> Self {
        ScopeManager {
            scopes: vec![Scope::new()],
            config,
        }
    }

    /// Normalizes a name into a scope key.
    #[must_use]
    pub fn key(&self, name: &str) -> String {
        self.config.name_key(name)
    }

    /// Pushes an empty scope.
    pub fn enter_scope(&mut self) {
        self.scopes.push(Scope::new());
        trace!(index = self.current_scope_index(), "enter scope");
    }

    /// Pops the current scope.
    ///
    /// # Panics
    ///
    /// Panics on an attempt to pop the root scope.
    pub fn leave_scope(&mut self) {
        assert!(self.scopes.len() > 1, "cannot leave the root scope");
        trace!(index = self.current_scope_index(), "leave scope");
        self.scopes.pop();
    }

    /// Pops every scope above index `k`.
    ///
    /// # Panics
    ///
    /// Panics if scope `k` does not exist.
    pub fn rollback_to_scope(&mut self, k: usize) {
        assert!(
            k < self.scopes.len(),
            "rollback to missing scope {k} (current {})",
            self.current_scope_index()
        );
        trace!(from = self.current_scope_index(), to = k, "rollback scopes");
        self.scopes.truncate(k + 1);
    }

    /// Returns the index of the innermost scope.
    #[must_use]
    pub fn current_scope_index(&self) -> usize {
        self.scopes.len() - 1
    }

    /// Returns the innermost scope.
    #[must_use]
    pub fn current_scope(&self) -> &Scope {
        &self.scopes[self.current_scope_index()]
    }

    /// Returns the innermost scope mutably.
    pub fn current_scope_mut(&mut self) -> &mut Scope {
        let index = self.current_scope_index();
        &mut self.scopes[index]
    }

    /// Returns the scope at `index`.
    #[must_use]
    pub fn scope(&self, index: usize) -> &Scope {
        &self.scopes[index]
    }

    /// Returns the scope at `index` mutably.
    pub fn scope_mut(&mut self, index: usize) -> &mut Scope {
        &mut self.scopes[index]
    }

    /// Adds `name` to the innermost scope.
    pub fn add(&mut self, name: &str, entry: ScopeEntry) {
        let key = self.key(name);
        self.current_scope_mut().add(key, entry);
    }

    /// Returns true if `name` is bound in the innermost scope.
    #[must_use]
    pub fn current_scope_contains(&self, name: &str) -> bool {
        self.current_scope().contains(&self.key(name))
    }

    /// Finds the innermost binding of `name` and the index of its scope.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<(&ScopeEntry, usize)> {
        let key = self.key(name);
        self.scopes
            .iter()
            .enumerate()
            .rev()
            .find_map(|(index, scope)| scope.get(&key).map(|entry| (entry, index)))
    }
}

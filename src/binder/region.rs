//! Scope regions: the run of scopes belonging to one query block.

use std::collections::HashSet;

use super::aggregate::AggregateId;
use super::expression::ExpressionBinding;
use super::scope::{ScopeEntry, ScopeManager};

/// Per-query-block state consulted by aggregate placement.
#[derive(Debug, Clone)]
pub struct ScopeRegion {
    first_scope_index: usize,
    index: usize,
    group_aggregate_binding: Option<ExpressionBinding>,
    aggregates: Vec<AggregateId>,
    aggregate_names: HashSet<String>,
    was_resolution_correlated: bool,
}

impl ScopeRegion {
    /// Creates a region anchored at `first_scope_index`.
    #[must_use]
    pub fn new(first_scope_index: usize, index: usize) -> Self {
        ScopeRegion {
            first_scope_index,
            index,
            group_aggregate_binding: None,
            aggregates: Vec::new(),
            aggregate_names: HashSet::new(),
            was_resolution_correlated: false,
        }
    }

    /// Index of the first scope of the region.
    #[must_use]
    pub fn first_scope_index(&self) -> usize {
        self.first_scope_index
    }

    /// Position of the region in the region stack.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Returns true if `scope_index` belongs to this region or an inner one.
    #[must_use]
    pub fn contains_scope(&self, scope_index: usize) -> bool {
        scope_index >= self.first_scope_index
    }

    /// Returns true while a group operation is in effect.
    #[must_use]
    pub fn is_aggregating(&self) -> bool {
        self.group_aggregate_binding.is_some()
    }

    /// Binding of the group partition item, present while aggregating.
    #[must_use]
    pub fn group_aggregate_binding(&self) -> Option<&ExpressionBinding> {
        self.group_aggregate_binding.as_ref()
    }

    /// Starts a group operation.
    ///
    /// # Panics
    ///
    /// Panics if the region is already aggregating.
    pub fn enter_group_operation(&mut self, binding: ExpressionBinding) {
        assert!(
            !self.is_aggregating(),
            "region {} is already aggregating",
            self.index
        );
        self.group_aggregate_binding = Some(binding);
    }

    /// Ends a speculative group operation.
    pub fn rollback_group_operation(&mut self) {
        self.group_aggregate_binding = None;
    }

    /// Aggregates evaluated in this region, in discovery order.
    #[must_use]
    pub fn aggregates(&self) -> &[AggregateId] {
        &self.aggregates
    }

    /// Appends an aggregate evaluated in this region.
    pub fn add_aggregate(&mut self, id: AggregateId) {
        self.aggregates.push(id);
    }

    /// Removes and returns all aggregates of the region.
    pub fn take_aggregates(&mut self) -> Vec<AggregateId> {
        std::mem::take(&mut self.aggregates)
    }

    /// Reserves an aggregate result name.
    ///
    /// # Panics
    ///
    /// Panics if the name was already registered.
    pub fn register_aggregate_name(&mut self, name: &str) {
        let inserted = self.aggregate_names.insert(name.to_string());
        assert!(inserted, "aggregate name '{name}' registered twice");
    }

    /// Returns true if `name` is a registered aggregate result name.
    #[must_use]
    pub fn has_aggregate_name(&self, name: &str) -> bool {
        self.aggregate_names.contains(name)
    }

    /// Returns whether a name of this region was resolved since the last reset.
    #[must_use]
    pub fn was_resolution_correlated(&self) -> bool {
        self.was_resolution_correlated
    }

    /// Sets the correlation flag.
    pub fn set_resolution_correlated(&mut self, value: bool) {
        self.was_resolution_correlated = value;
    }

    /// Applies `f` to every entry of every scope of the region.
    pub fn apply_to_entries(&self, scopes: &mut ScopeManager, mut f: impl FnMut(&mut ScopeEntry)) {
        for index in self.first_scope_index..=scopes.current_scope_index() {
            for (_, entry) in scopes.scope_mut(index).iter_mut() {
                f(entry);
            }
        }
    }

    /// Pops every scope of the region.
    pub fn rollback_all_scopes(&self, scopes: &mut ScopeManager) {
        scopes.rollback_to_scope(self.first_scope_index - 1);
    }
}

//! Name and aggregate resolution over the scope stack.
//!
//! The [`Resolver`] owns the scope stack, the region stack and the aggregate
//! arena of one statement. Query blocks and aggregate arguments are entered
//! through guards that deref to the resolver and undo their effect on drop,
//! so every early return leaves the resolver consistent.

use std::cell::Cell;
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::rc::Rc;

use tracing::{debug, trace};

use crate::catalog::{ContainerMember, Metadata, MetadataMember};
use crate::config::ResolverConfig;
use crate::error::{BindError, ErrorContext, Result};
use crate::parser::ast::NodeId;
use crate::types::DataType;

use super::aggregate::{AggregateArena, AggregateId, AggregateKind, Interpretation};
use super::expression::BoundExpression;
use super::inline::InlineFunctionTable;
use super::region::ScopeRegion;
use super::scope::{ScopeEntry, ScopeManager};

/// Result of resolving a name.
#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionResolution {
    /// The name denotes a value.
    Value(BoundExpression),
    /// The name denotes a namespace, type or function group.
    MetadataMember(MetadataMember),
    /// The name denotes an entity container.
    EntityContainer(String),
}

/// Resolves names and aggregates of one statement.
pub struct Resolver<'m> {
    pub(super) metadata: &'m dyn Metadata,
    pub(super) config: ResolverConfig,
    pub(super) scopes: ScopeManager,
    pub(super) regions: Vec<ScopeRegion>,
    pub(super) aggregates: AggregateArena,
    aggregate_contexts: Vec<AggregateId>,
    attached: HashMap<NodeId, AggregateId>,
    parameters: HashMap<String, (String, DataType)>,
    pub(super) inline_functions: Rc<InlineFunctionTable>,
    name_counter: Rc<Cell<usize>>,
    ignore_container_names: bool,
}

impl<'m> Resolver<'m> {
    /// Creates a resolver with an empty root scope and root region.
    #[must_use]
    pub fn new(metadata: &'m dyn Metadata, config: ResolverConfig) -> Self {
        Resolver {
            metadata,
            config,
            scopes: ScopeManager::new(config),
            regions: vec![ScopeRegion::new(0, 0)],
            aggregates: AggregateArena::new(),
            aggregate_contexts: Vec::new(),
            attached: HashMap::new(),
            parameters: HashMap::new(),
            inline_functions: Rc::new(InlineFunctionTable::new()),
            name_counter: Rc::new(Cell::new(0)),
            ignore_container_names: false,
        }
    }

    /// Declares a query parameter.
    #[must_use]
    pub fn with_parameter(mut self, name: &str, data_type: DataType) -> Self {
        let key = self.config.name_key(name);
        self.parameters.insert(key, (name.to_string(), data_type));
        self
    }

    /// Declares a query variable in the root scope.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateVariable` if the name is already declared.
    pub fn with_variable(mut self, name: &str, data_type: DataType) -> Result<Self> {
        if self.scopes.scope(0).contains(&self.scopes.key(name)) {
            return Err(BindError::DuplicateVariable(name.to_string()).at(ErrorContext::default()));
        }
        let variable = BoundExpression::variable(name, data_type);
        let key = self.scopes.key(name);
        self.scopes.scope_mut(0).add(key, ScopeEntry::Free(variable));
        Ok(self)
    }

    /// Installs the inline functions of the statement.
    pub fn set_inline_functions(&mut self, table: Rc<InlineFunctionTable>) {
        self.inline_functions = table;
    }

    /// Creates a resolver for an inline function body: same metadata,
    /// configuration, parameters and functions, but no scopes.
    #[must_use]
    pub fn fork(&self) -> Resolver<'m> {
        Resolver {
            metadata: self.metadata,
            config: self.config,
            scopes: ScopeManager::new(self.config),
            regions: vec![ScopeRegion::new(0, 0)],
            aggregates: AggregateArena::new(),
            aggregate_contexts: Vec::new(),
            attached: HashMap::new(),
            parameters: self.parameters.clone(),
            inline_functions: Rc::clone(&self.inline_functions),
            name_counter: Rc::clone(&self.name_counter),
            ignore_container_names: false,
        }
    }

    /// Returns the resolver configuration.
    #[must_use]
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Returns the scope stack.
    #[must_use]
    pub fn scopes(&self) -> &ScopeManager {
        &self.scopes
    }

    /// Returns the region stack, outermost first.
    #[must_use]
    pub fn regions(&self) -> &[ScopeRegion] {
        &self.regions
    }

    /// Returns the aggregate arena.
    #[must_use]
    pub fn aggregates(&self) -> &AggregateArena {
        &self.aggregates
    }

    /// Generates a name that cannot clash with user identifiers.
    pub fn generate_internal_name(&self, hint: &str) -> String {
        let n = self.name_counter.get() + 1;
        self.name_counter.set(n);
        format!("_##{hint}{n}")
    }

    // ---------------------------------------------------------------------
    // Scopes and regions
    // ---------------------------------------------------------------------

    /// Index of the innermost scope.
    #[must_use]
    pub fn current_scope_index(&self) -> usize {
        self.scopes.current_scope_index()
    }

    /// Pushes an empty scope.
    pub fn enter_scope(&mut self) {
        self.scopes.enter_scope();
    }

    /// Pops the innermost scope.
    pub fn leave_scope(&mut self) {
        self.scopes.leave_scope();
    }

    /// Pops every scope above `k`.
    pub fn rollback_to_scope(&mut self, k: usize) {
        self.scopes.rollback_to_scope(k);
    }

    /// Innermost region.
    #[must_use]
    pub fn current_region(&self) -> &ScopeRegion {
        let last = self.regions.len() - 1;
        &self.regions[last]
    }

    /// Innermost region, mutably.
    pub fn current_region_mut(&mut self) -> &mut ScopeRegion {
        let last = self.regions.len() - 1;
        &mut self.regions[last]
    }

    /// Applies `f` to every entry of the innermost region.
    pub fn apply_to_region_entries(&mut self, f: impl FnMut(&mut ScopeEntry)) {
        let last = self.regions.len() - 1;
        self.regions[last].apply_to_entries(&mut self.scopes, f);
    }

    /// Enters a query block: pushes a scope and a region anchored at it.
    pub fn enter_scope_region(&mut self) -> RegionGuard<'_, 'm> {
        self.scopes.enter_scope();
        let index = self.regions.len();
        let first = self.scopes.current_scope_index();
        self.regions.push(ScopeRegion::new(first, index));
        debug!(region = index, first_scope = first, "enter scope region");
        RegionGuard { resolver: self }
    }

    fn leave_scope_region(&mut self) {
        assert!(self.regions.len() > 1, "cannot leave the root region");
        let last = self.regions.len() - 1;
        for id in self.regions[last].take_aggregates() {
            self.detach_aggregate(id);
        }
        let first = self.regions[last].first_scope_index();
        self.scopes.rollback_to_scope(first - 1);
        self.regions.pop();
        debug!(region = last, "leave scope region");
    }

    /// Returns true if any region on the stack is aggregating.
    #[must_use]
    pub fn is_in_any_group_scope(&self) -> bool {
        self.regions.iter().any(ScopeRegion::is_aggregating)
    }

    /// Index of the innermost region containing scope `scope_index`.
    #[must_use]
    pub fn defining_region_of_scope(&self, scope_index: usize) -> usize {
        self.regions
            .iter()
            .rev()
            .find(|r| r.contains_scope(scope_index))
            .map_or(0, ScopeRegion::index)
    }

    pub(super) fn set_scope_region_correlation_flag(&mut self, scope_index: usize) {
        let region = self.defining_region_of_scope(scope_index);
        self.regions[region].set_resolution_correlated(true);
    }

    /// Suppresses entity container names until the guard is dropped.
    pub fn ignore_entity_container_names(&mut self) -> IgnoreContainerGuard<'_, 'm> {
        let previous = self.ignore_container_names;
        self.ignore_container_names = true;
        IgnoreContainerGuard {
            resolver: self,
            previous,
        }
    }

    // ---------------------------------------------------------------------
    // Name resolution
    // ---------------------------------------------------------------------

    /// Resolves a simple name: scopes, default container, containers, metadata.
    ///
    /// # Errors
    ///
    /// Returns an error for references to the left side of a join, to names
    /// hidden by a group-by, for ambiguous metadata names and for names that
    /// resolve to nothing.
    pub fn resolve_simple_name(
        &mut self,
        name: &str,
        left_of_member_access: bool,
        context: ErrorContext,
    ) -> Result<ExpressionResolution> {
        if let Some((entry, scope_index)) = self.try_scope_lookup(name) {
            if let ScopeEntry::Source(source) = &entry {
                if source.is_join_left() {
                    return Err(BindError::InvalidJoinLeftCorrelation.at(context));
                }
            }
            self.set_scope_region_correlation_flag(scope_index);
            trace!(name, scope = scope_index, "resolved name from scope");
            let expr = self
                .get_expression_from_entry(&entry, scope_index, name)
                .map_err(|e| e.at(context))?;
            return Ok(ExpressionResolution::Value(expr));
        }

        let metadata = self.metadata;
        let ignore_case = self.config.case_insensitive_names;
        if let Some(container) = metadata.default_container() {
            match metadata.container_member(container, name, ignore_case) {
                Some(ContainerMember::EntitySet(set)) => {
                    return Ok(ExpressionResolution::Value(BoundExpression::Scan {
                        container: container.name.clone(),
                        entity_set: set.name.clone(),
                        data_type: set.collection_type(),
                    }));
                }
                Some(ContainerMember::FunctionImport(function)) => {
                    return Ok(ExpressionResolution::MetadataMember(
                        MetadataMember::FunctionGroup {
                            name: format!("{}.{}", container.name, function.name),
                            overloads: vec![function.clone()],
                        },
                    ));
                }
                None => {}
            }
        }

        if !self.ignore_container_names {
            if let Some(container) = metadata.entity_container(name, ignore_case) {
                return Ok(ExpressionResolution::EntityContainer(container.name.clone()));
            }
        }

        match self.resolve_metadata_name(name, context)? {
            Some(member) => Ok(ExpressionResolution::MetadataMember(member)),
            None if left_of_member_access => Ok(ExpressionResolution::MetadataMember(
                MetadataMember::Namespace(name.to_string()),
            )),
            None => Err(BindError::UnresolvedIdentifier(name.to_string()).at(context)),
        }
    }

    /// Resolves the name of a call written without qualification.
    ///
    /// Local scopes are skipped. A name that is not found, or is only a
    /// namespace, is tried as a function import of the default container.
    ///
    /// # Errors
    ///
    /// Returns `UnresolvedIdentifier` if nothing matches, or an ambiguity error.
    pub fn resolve_simple_function_name(
        &self,
        name: &str,
        context: ErrorContext,
    ) -> Result<MetadataMember> {
        let resolved = self.resolve_metadata_name(name, context)?;
        if let Some(member) = &resolved {
            if !matches!(member, MetadataMember::Namespace(_)) {
                return Ok(member.clone());
            }
        }
        let metadata = self.metadata;
        if let Some(container) = metadata.default_container() {
            if let Some(ContainerMember::FunctionImport(function)) =
                metadata.container_member(container, name, self.config.case_insensitive_names)
            {
                return Ok(MetadataMember::FunctionGroup {
                    name: format!("{}.{}", container.name, function.name),
                    overloads: vec![function.clone()],
                });
            }
        }
        resolved.ok_or_else(|| BindError::UnresolvedIdentifier(name.to_string()).at(context))
    }

    /// Resolves an unqualified metadata name; inline functions come first.
    fn resolve_metadata_name(
        &self,
        name: &str,
        context: ErrorContext,
    ) -> Result<Option<MetadataMember>> {
        if self.inline_functions.group(&self.config.name_key(name)).is_some() {
            return Ok(Some(MetadataMember::InlineFunctionGroup(name.to_string())));
        }
        self.metadata
            .resolve_unqualified_name(name, self.config.case_insensitive_names)
            .map_err(|a| {
                BindError::AmbiguousMetadataMember {
                    name: a.name,
                    candidates: a.candidates,
                }
                .at(context)
            })
    }

    /// Resolves a metadata function name, skipping inline functions.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is ambiguous.
    pub fn resolve_metadata_function_name(
        &self,
        name: &str,
        context: ErrorContext,
    ) -> Result<Option<MetadataMember>> {
        self.metadata
            .resolve_unqualified_name(name, self.config.case_insensitive_names)
            .map_err(|a| {
                BindError::AmbiguousMetadataMember {
                    name: a.name,
                    candidates: a.candidates,
                }
                .at(context)
            })
    }

    /// Resolves a dotted name against metadata only, ignoring local scopes.
    ///
    /// # Errors
    ///
    /// Returns an error if a component is not found, is ambiguous, or the
    /// name does not denote a metadata member.
    pub fn resolve_metadata_member_name(
        &mut self,
        parts: &[String],
        context: ErrorContext,
    ) -> Result<MetadataMember> {
        let Some((first, rest)) = parts.split_first() else {
            return Err(BindError::UnresolvedIdentifier(String::new()).at(context));
        };
        let metadata = self.metadata;
        let container = if self.ignore_container_names {
            None
        } else {
            metadata.entity_container(first, self.config.case_insensitive_names)
        };
        let mut current = match container {
            Some(container) => ExpressionResolution::EntityContainer(container.name.clone()),
            None => match self.resolve_metadata_name(first, context)? {
                Some(member) => ExpressionResolution::MetadataMember(member),
                None if !rest.is_empty() => {
                    ExpressionResolution::MetadataMember(MetadataMember::Namespace(first.clone()))
                }
                None => return Err(BindError::UnresolvedIdentifier(first.clone()).at(context)),
            },
        };
        for part in rest {
            current = self.resolve_member_access(current, part, context)?;
        }
        match current {
            ExpressionResolution::MetadataMember(member) => Ok(member),
            _ => Err(BindError::NotAFunction(parts.join(".")).at(context)),
        }
    }

    /// Resolves `member` relative to an already resolved left side.
    ///
    /// # Errors
    ///
    /// Returns a not-a-member error matching the kind of the left side.
    pub fn resolve_member_access(
        &mut self,
        left: ExpressionResolution,
        member: &str,
        context: ErrorContext,
    ) -> Result<ExpressionResolution> {
        let metadata = self.metadata;
        let ignore_case = self.config.case_insensitive_names;
        match left {
            ExpressionResolution::Value(instance) => {
                let instance_type = instance.data_type().clone();
                match instance_type.property(member, ignore_case) {
                    Some(field) => {
                        let (name, data_type) = (field.name.clone(), field.data_type.clone());
                        Ok(ExpressionResolution::Value(instance.property(name, data_type)))
                    }
                    None if instance_type.is_collection() => Err(BindError::NotAMemberOfCollection {
                        member: member.to_string(),
                        type_name: instance_type.to_string(),
                    }
                    .at(context)),
                    None => Err(BindError::NotAMemberOfType {
                        member: member.to_string(),
                        type_name: instance_type.to_string(),
                    }
                    .at(context)),
                }
            }
            ExpressionResolution::EntityContainer(name) => {
                let not_found = || {
                    BindError::NotAMemberOfContainer {
                        member: member.to_string(),
                        container: name.clone(),
                    }
                    .at(context)
                };
                let container = metadata
                    .entity_container(&name, ignore_case)
                    .ok_or_else(not_found)?;
                match metadata.container_member(container, member, ignore_case) {
                    Some(ContainerMember::EntitySet(set)) => {
                        Ok(ExpressionResolution::Value(BoundExpression::Scan {
                            container: container.name.clone(),
                            entity_set: set.name.clone(),
                            data_type: set.collection_type(),
                        }))
                    }
                    Some(ContainerMember::FunctionImport(function)) => Ok(
                        ExpressionResolution::MetadataMember(MetadataMember::FunctionGroup {
                            name: format!("{}.{}", container.name, function.name),
                            overloads: vec![function.clone()],
                        }),
                    ),
                    None => Err(not_found()),
                }
            }
            ExpressionResolution::MetadataMember(MetadataMember::Namespace(namespace)) => {
                match metadata.resolve_member(&namespace, member, ignore_case) {
                    Ok(Some(found)) => Ok(ExpressionResolution::MetadataMember(found)),
                    Ok(None) => Err(BindError::NotAMemberOfNamespace {
                        member: member.to_string(),
                        namespace,
                    }
                    .at(context)),
                    Err(a) => Err(BindError::AmbiguousMetadataMember {
                        name: a.name,
                        candidates: a.candidates,
                    }
                    .at(context)),
                }
            }
            ExpressionResolution::MetadataMember(other) => Err(BindError::NotAMemberOfType {
                member: member.to_string(),
                type_name: other.name().to_string(),
            }
            .at(context)),
        }
    }

    /// Resolves `@name`.
    ///
    /// # Errors
    ///
    /// Returns `ParameterNotFound` for undeclared parameters.
    pub fn resolve_parameter(&self, name: &str, context: ErrorContext) -> Result<BoundExpression> {
        match self.parameters.get(&self.config.name_key(name)) {
            Some((declared, data_type)) => Ok(BoundExpression::Parameter {
                name: declared.clone(),
                data_type: data_type.clone(),
            }),
            None => Err(BindError::ParameterNotFound(name.to_string()).at(context)),
        }
    }

    /// Looks `name` up in the scope stack.
    #[must_use]
    pub fn try_scope_lookup(&self, name: &str) -> Option<(ScopeEntry, usize)> {
        self.scopes
            .lookup(name)
            .map(|(entry, index)| (entry.clone(), index))
    }

    /// Reads an entry as seen from the current aggregate context.
    ///
    /// Inside an aggregate argument, entries of the aggregate's own region or
    /// an outer one mark the aggregate as referencing that region, and
    /// group-adjusted entries yield their group-variable or group-aggregate
    /// projection depending on the kind of the matching aggregate.
    ///
    /// # Errors
    ///
    /// Returns `InvalidGroupInputReference` for names hidden by a group-by.
    pub fn get_expression_from_entry(
        &mut self,
        entry: &ScopeEntry,
        scope_index: usize,
        name: &str,
    ) -> std::result::Result<BoundExpression, BindError> {
        let expr = entry.expression(name)?;
        let Some(current) = self.current_aggregate() else {
            return Ok(expr);
        };
        let entry_region = self.defining_region_of_scope(scope_index);
        if entry_region > self.aggregates.get(current).defining_region {
            return Ok(expr);
        }
        self.aggregates.update_referenced_region(current, entry_region);

        let Some((by_group, by_aggregate)) = entry.group_projections() else {
            return Ok(expr);
        };

        let mut candidate = Some(current);
        let mut matching = None;
        while let Some(id) = candidate {
            let item = self.aggregates.get(id);
            if item.defining_region < entry_region {
                break;
            }
            if item.defining_region == entry_region {
                matching = Some(id);
                break;
            }
            candidate = item.containing;
        }
        let context = matching.unwrap_or(current);

        Ok(match self.aggregates.get(context).kind.interpretation() {
            Interpretation::Function => by_group.clone(),
            Interpretation::Partition => by_aggregate.clone(),
            Interpretation::Key => expr,
        })
    }

    // ---------------------------------------------------------------------
    // Aggregates
    // ---------------------------------------------------------------------

    /// Aggregate whose argument is being converted, if any.
    #[must_use]
    pub fn current_aggregate(&self) -> Option<AggregateId> {
        self.aggregate_contexts.last().copied()
    }

    /// Starts conversion of a function aggregate's arguments.
    pub fn enter_function_aggregate(
        &mut self,
        node: NodeId,
        context: ErrorContext,
    ) -> AggregateGuard<'_, 'm> {
        self.enter_aggregate(AggregateKind::Function, Some(node), context)
    }

    /// Starts conversion of a GROUPPARTITION argument.
    pub fn enter_group_partition(
        &mut self,
        node: NodeId,
        context: ErrorContext,
    ) -> AggregateGuard<'_, 'm> {
        self.enter_aggregate(AggregateKind::GroupPartition, Some(node), context)
    }

    /// Starts conversion of a group key under one interpretation.
    pub fn enter_group_key_definition(
        &mut self,
        interpretation: Interpretation,
        context: ErrorContext,
    ) -> AggregateGuard<'_, 'm> {
        self.enter_aggregate(AggregateKind::GroupKey(interpretation), None, context)
    }

    fn enter_aggregate(
        &mut self,
        kind: AggregateKind,
        node: Option<NodeId>,
        context: ErrorContext,
    ) -> AggregateGuard<'_, 'm> {
        let defining = self.current_region().index();
        let containing = self.current_aggregate();
        let id = self.aggregates.create(kind, node, context, defining, containing);
        self.aggregate_contexts.push(id);
        trace!(aggregate = id.0, ?kind, region = defining, "enter aggregate context");
        AggregateGuard {
            resolver: self,
            id,
            finished: false,
        }
    }

    fn pop_aggregate_context(&mut self, id: AggregateId) {
        let popped = self.aggregate_contexts.pop();
        assert_eq!(popped, Some(id), "aggregate contexts popped out of order");
    }

    fn seal_aggregate(&mut self, id: AggregateId) -> Result<AggregateId> {
        let regions = &self.regions;
        let context = self.aggregates.get(id).context;
        self.aggregates
            .seal(id, regions.len(), |r| regions[r].is_aggregating())
            .map_err(|e| e.at(context))?;
        Ok(id)
    }

    /// Returns the innermost referenced region of the current aggregate, to
    /// be restored if a tentative conversion is discarded.
    #[must_use]
    pub fn save_referenced_region(&self) -> Option<(AggregateId, Option<usize>)> {
        self.current_aggregate()
            .map(|id| (id, self.aggregates.get(id).innermost_referenced_region))
    }

    /// Restores a value saved by [`Resolver::save_referenced_region`].
    pub fn restore_referenced_region(&mut self, saved: Option<(AggregateId, Option<usize>)>) {
        if let Some((id, region)) = saved {
            self.aggregates.restore_referenced_region(id, region);
        }
    }

    /// Returns the aggregate attached to a syntax node, if any.
    #[must_use]
    pub fn attached_aggregate(&self, node: NodeId) -> Option<AggregateId> {
        self.attached.get(&node).copied()
    }

    /// Result name and placeholder of an attached aggregate.
    ///
    /// # Panics
    ///
    /// Panics if the aggregate was never attached.
    #[must_use]
    pub fn attached_result(&self, id: AggregateId) -> (String, BoundExpression) {
        let item = self.aggregates.get(id);
        match (&item.result_name, &item.result_stub) {
            (Some(name), Some(stub)) => (name.clone(), stub.clone()),
            _ => panic!("aggregate {} has no attached result", id.0),
        }
    }

    /// Attaches a sealed aggregate to its node and to its evaluating region.
    ///
    /// # Panics
    ///
    /// Panics if the aggregate is not sealed or has no node.
    pub fn attach_aggregate(
        &mut self,
        id: AggregateId,
        result_name: String,
        result_stub: BoundExpression,
        definition: BoundExpression,
    ) {
        let item = self.aggregates.get_mut(id);
        let (Some(node), Some(evaluating)) = (item.node, item.evaluating_region) else {
            panic!("attaching aggregate {} before it is sealed", id.0);
        };
        item.result_name = Some(result_name);
        item.result_stub = Some(result_stub);
        item.definition = Some(definition);
        self.attached.insert(node, id);
        self.regions[evaluating].add_aggregate(id);
    }

    fn detach_aggregate(&mut self, id: AggregateId) {
        let item = self.aggregates.get_mut(id);
        if let Some(node) = item.node.take() {
            if self.attached.get(&node) == Some(&id) {
                self.attached.remove(&node);
            }
        }
        trace!(aggregate = id.0, "detached aggregate");
    }

    /// Re-links an already discovered aggregate under the current context.
    pub fn rewire_to_current_aggregate(&mut self, id: AggregateId) {
        let current = self.current_aggregate();
        self.aggregates.set_containing(id, current);
    }

    /// Resolves the post-group entry of an aggregate result, if the group
    /// has been committed.
    ///
    /// # Errors
    ///
    /// Returns `InvalidGroupInputReference` if the entry was hidden.
    pub fn try_resolve_internal_aggregate_name(
        &mut self,
        name: &str,
        context: ErrorContext,
    ) -> Result<Option<BoundExpression>> {
        let Some((entry, scope_index)) = self.try_scope_lookup(name) else {
            return Ok(None);
        };
        self.set_scope_region_correlation_flag(scope_index);
        entry.expression(name).map(Some).map_err(|e| e.at(context))
    }
}

/// A query block in progress; tears the region down on drop.
pub struct RegionGuard<'a, 'm> {
    resolver: &'a mut Resolver<'m>,
}

impl<'m> Deref for RegionGuard<'_, 'm> {
    type Target = Resolver<'m>;

    fn deref(&self) -> &Self::Target {
        self.resolver
    }
}

impl DerefMut for RegionGuard<'_, '_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.resolver
    }
}

impl Drop for RegionGuard<'_, '_> {
    fn drop(&mut self) {
        self.resolver.leave_scope_region();
    }
}

/// An aggregate argument in progress.
///
/// [`AggregateGuard::finish`] seals the descriptor. Dropping the guard
/// without finishing discards the context.
pub struct AggregateGuard<'a, 'm> {
    resolver: &'a mut Resolver<'m>,
    id: AggregateId,
    finished: bool,
}

impl AggregateGuard<'_, '_> {
    /// Handle of the descriptor being built.
    #[must_use]
    pub fn id(&self) -> AggregateId {
        self.id
    }

    /// Leaves the aggregate context and seals the descriptor.
    ///
    /// # Errors
    ///
    /// Returns an error if no region can host the aggregate or if a nested
    /// aggregate evaluates in a forbidden region.
    pub fn finish(mut self) -> Result<AggregateId> {
        self.finished = true;
        self.resolver.pop_aggregate_context(self.id);
        self.resolver.seal_aggregate(self.id)
    }
}

impl<'m> Deref for AggregateGuard<'_, 'm> {
    type Target = Resolver<'m>;

    fn deref(&self) -> &Self::Target {
        self.resolver
    }
}

impl DerefMut for AggregateGuard<'_, '_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.resolver
    }
}

impl Drop for AggregateGuard<'_, '_> {
    fn drop(&mut self) {
        if !self.finished {
            self.resolver.pop_aggregate_context(self.id);
        }
    }
}

/// Restores container-name resolution on drop.
pub struct IgnoreContainerGuard<'a, 'm> {
    resolver: &'a mut Resolver<'m>,
    previous: bool,
}

impl<'m> Deref for IgnoreContainerGuard<'_, 'm> {
    type Target = Resolver<'m>;

    fn deref(&self) -> &Self::Target {
        self.resolver
    }
}

impl DerefMut for IgnoreContainerGuard<'_, '_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.resolver
    }
}

impl Drop for IgnoreContainerGuard<'_, '_> {
    fn drop(&mut self) {
        self.resolver.ignore_container_names = self.previous;
    }
}

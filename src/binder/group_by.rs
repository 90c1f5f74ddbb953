//! GROUP BY processing and group aggregates.
//!
//! A query block whose SELECT, HAVING or ORDER BY contains a call is grouped
//! speculatively even without a GROUP BY clause. The aggregate search
//! converts those clauses once to discover aggregates and where they
//! evaluate; if none evaluate in the block, the speculative group is undone
//! and the block is converted as if nothing happened.

use tracing::{debug, trace};

use crate::catalog::{resolve_overloads, FunctionOverload, OverloadResolution};
use crate::error::{BindError, Clause, Result};
use crate::parser::ast::{AliasedExpr, Expr, QueryExpr};
use crate::types::DataType;

use super::aggregate::{AggregateKind, Interpretation};
use super::expression::{BoundExpression, ExpressionBinding, GroupBinding};
use super::resolver::Resolver;
use super::scope::{ScopeEntry, SourceVariable, VarRef};
use super::semantic::{overload_parameters, type_names, typed_args};

/// A converted GROUP BY key under its three interpretations.
struct GroupKey {
    name: String,
    expression: BoundExpression,
    by_group: BoundExpression,
    by_aggregate: BoundExpression,
    alternative_name: Option<Vec<String>>,
}

impl GroupKey {
    fn definition(&self) -> ScopeEntry {
        ScopeEntry::GroupKeyDefinition {
            var_based: self.expression.clone(),
            group_var_based: self.by_group.clone(),
            group_agg_based: self.by_aggregate.clone(),
            alternative_name: self.alternative_name.clone(),
        }
    }
}

impl<'m> Resolver<'m> {
    /// Groups the source of the current block, explicitly or speculatively.
    ///
    /// Returns the source unchanged when there is nothing to group.
    pub(super) fn process_group_by_clause(
        &mut self,
        source: ExpressionBinding,
        query: &QueryExpr,
    ) -> Result<ExpressionBinding> {
        let implicit = query.group_by.is_none();
        if implicit && !query.has_method_call() {
            return Ok(source);
        }

        let group_input = GroupBinding::new(
            source.expression.as_ref().clone(),
            self.generate_internal_name("geb"),
            self.generate_internal_name("group"),
        );
        let element_type = group_input.element_type.clone();
        let group_aggregate_type = DataType::collection(element_type);
        let group_aggregate_name = self.generate_internal_name("groupAggregate");
        let partition_item = ExpressionBinding::new(
            BoundExpression::variable(group_aggregate_name.clone(), group_aggregate_type.clone()),
            self.generate_internal_name("gpi"),
        );
        self.current_region_mut()
            .enter_group_operation(partition_item.clone());

        let element_ref = group_input.variable_ref();
        let group_ref = group_input.group_variable_ref();
        let item_ref = partition_item.variable_ref();
        self.apply_to_region_entries(|entry| {
            if let Some(source) = entry.as_source_mut() {
                source.adjust_to_group_var(&element_ref, &group_ref, &item_ref);
            }
        });
        debug!(
            region = self.current_region().index(),
            implicit, "entered group operation"
        );

        let keys = match &query.group_by {
            Some(group_by) => self.convert_group_keys(&group_by.items)?,
            None => Vec::new(),
        };

        let saved_scope_index = self.current_scope_index();
        self.enter_scope();
        for key in &keys {
            if let Some(alternative) = &key.alternative_name {
                let full_name = alternative.join(".");
                if !self.scopes.current_scope_contains(&full_name) {
                    self.scopes.add(&full_name, key.definition());
                }
            }
            self.scopes.add(&key.name, key.definition());
        }

        self.search_aggregates(query)?;

        if implicit && self.current_region().aggregates().is_empty() {
            self.rollback_to_scope(saved_scope_index);
            let source_ref = source.variable_ref();
            self.apply_to_region_entries(|entry| {
                if let Some(source) = entry.as_source_mut() {
                    source.rollback_adjustment_to_group_var(&source_ref);
                }
            });
            self.current_region_mut().rollback_group_operation();
            debug!(
                region = self.current_region().index(),
                "rolled back implicit group"
            );
            return Ok(source);
        }

        // Commit: build the group-by and expose only keys and aggregates.
        let aggregate_ids = self.current_region().aggregates().to_vec();
        let mut function_aggregates: Vec<(String, BoundExpression)> = Vec::new();
        let mut partitions: Vec<(String, BoundExpression)> = Vec::new();
        for &id in &aggregate_ids {
            let item = self.aggregates.get(id);
            let (Some(name), Some(definition)) = (&item.result_name, &item.definition) else {
                continue;
            };
            match item.kind {
                AggregateKind::Function => function_aggregates.push((name.clone(), definition.clone())),
                AggregateKind::GroupPartition => partitions.push((name.clone(), definition.clone())),
                AggregateKind::GroupKey(_) => {}
            }
        }

        let mut aggregates = function_aggregates.clone();
        if !partitions.is_empty() {
            aggregates.push((
                group_aggregate_name.clone(),
                BoundExpression::GroupAggregate {
                    argument: Box::new(group_input.group_variable_ref()),
                    data_type: group_aggregate_type.clone(),
                },
            ));
        }
        let key_columns: Vec<(String, BoundExpression)> = keys
            .iter()
            .map(|key| (key.name.clone(), key.expression.clone()))
            .collect();
        let row_type = DataType::row(
            key_columns
                .iter()
                .chain(&aggregates)
                .map(|(name, expr)| (name.clone(), expr.data_type().clone())),
        );
        let group_by = BoundExpression::GroupBy {
            input: group_input,
            keys: key_columns,
            aggregates,
            data_type: DataType::collection(row_type),
        };
        let mut group_binding = ExpressionBinding::new(group_by, self.generate_internal_name("group"));

        if !partitions.is_empty() {
            let out = group_binding.variable_ref();
            let mut fields: Vec<(String, BoundExpression)> = Vec::new();
            for (name, definition) in partitions {
                let data_type = definition.data_type().clone();
                let lambda = BoundExpression::Lambda {
                    parameters: vec![(group_aggregate_name.clone(), group_aggregate_type.clone())],
                    body: Box::new(definition),
                    data_type: data_type.clone(),
                };
                let argument = out
                    .clone()
                    .property(group_aggregate_name.clone(), group_aggregate_type.clone());
                fields.push((
                    name,
                    BoundExpression::Invoke {
                        lambda: Box::new(lambda),
                        args: vec![argument],
                        data_type,
                    },
                ));
            }
            for key in &keys {
                let data_type = key.expression.data_type().clone();
                fields.push((key.name.clone(), out.clone().property(key.name.clone(), data_type)));
            }
            for (name, definition) in &function_aggregates {
                let data_type = definition.data_type().clone();
                fields.push((name.clone(), out.clone().property(name.clone(), data_type)));
            }

            let row_type = DataType::row(
                fields
                    .iter()
                    .map(|(name, expr)| (name.clone(), expr.data_type().clone())),
            );
            let project = BoundExpression::Project {
                input: group_binding,
                projection: Box::new(BoundExpression::NewRow {
                    fields,
                    data_type: row_type.clone(),
                }),
                data_type: DataType::collection(row_type),
            };
            group_binding = ExpressionBinding::new(project, self.generate_internal_name("groupPartitionDefs"));
        }

        self.rollback_to_scope(saved_scope_index);
        self.apply_to_region_entries(|entry| *entry = ScopeEntry::InvalidGroupInputRef);
        self.enter_scope();

        let parent = group_binding.variable_ref();
        for key in &keys {
            let variable = VarRef::new(key.name.clone(), key.expression.data_type().clone());
            let mut entry = SourceVariable::new(variable.clone());
            entry.add_parent_var(&parent);
            self.scopes.add(&key.name, ScopeEntry::Source(entry));

            if let Some(alternative) = &key.alternative_name {
                let mut entry = SourceVariable::new(variable).with_alternative_name(alternative.clone());
                entry.add_parent_var(&parent);
                self.scopes.add(&alternative.join("."), ScopeEntry::Source(entry));
            }
        }

        for &id in &aggregate_ids {
            let (name, stub) = self.attached_result(id);
            if self.current_region().has_aggregate_name(&name) || self.scopes.current_scope_contains(&name) {
                let context = self.aggregates.get(id).context;
                return Err(BindError::DuplicateAggregateName(name).at(context));
            }
            let mut entry = SourceVariable::new(VarRef::new(name.clone(), stub.data_type().clone()));
            entry.add_parent_var(&parent);
            self.scopes.add(&name, ScopeEntry::Source(entry));
            self.current_region_mut().register_aggregate_name(&name);
        }

        debug!(
            region = self.current_region().index(),
            keys = keys.len(),
            aggregates = aggregate_ids.len(),
            "committed group by"
        );
        Ok(group_binding)
    }

    fn convert_group_keys(&mut self, items: &[AliasedExpr]) -> Result<Vec<GroupKey>> {
        let mut keys: Vec<GroupKey> = Vec::with_capacity(items.len());
        for item in items {
            let ctx = item.expr.context;

            self.current_region_mut().set_resolution_correlated(false);
            let expression = self.convert_group_key(&item.expr, Interpretation::Key)?;
            if !self.current_region().was_resolution_correlated() {
                return Err(BindError::KeyMustBeCorrelated("GROUP BY").at(ctx));
            }
            if !expression.data_type().is_valid_group_key() {
                return Err(BindError::GroupingKeyNotEqualComparable(expression.data_type().to_string()).at(ctx));
            }
            let by_group = self.convert_group_key(&item.expr, Interpretation::Function)?;
            let by_aggregate = self.convert_group_key(&item.expr, Interpretation::Partition)?;

            let mut name = self.infer_alias_name(item, &expression);
            if keys.iter().any(|key| self.config.names_equal(&key.name, &name)) {
                match &item.alias {
                    Some(alias) => return Err(BindError::AliasAlreadyUsed(name).at(alias.context)),
                    None => name = self.generate_internal_name("autoGroup"),
                }
            }

            let alternative_name = match (&item.alias, item.expr.multipart_identifier()) {
                (None, Some(parts)) if parts.len() > 1 => Some(parts),
                _ => None,
            };
            if let Some(alternative) = &alternative_name {
                let full_name = alternative.join(".");
                let taken = keys
                    .iter()
                    .filter_map(|key| key.alternative_name.as_ref())
                    .any(|other| self.config.names_equal(&other.join("."), &full_name));
                if taken {
                    return Err(BindError::AliasAlreadyUsed(full_name).at(ctx));
                }
            }

            trace!(key = %name, "converted group key");
            keys.push(GroupKey {
                name,
                expression,
                by_group,
                by_aggregate,
                alternative_name,
            });
        }
        Ok(keys)
    }

    fn convert_group_key(&mut self, expr: &Expr, interpretation: Interpretation) -> Result<BoundExpression> {
        let mut key = self.enter_group_key_definition(interpretation, expr.context);
        let converted = key.convert_value_expression(expr)?;
        key.finish()?;
        Ok(converted)
    }

    /// First pass over HAVING, SELECT and ORDER BY. Results are discarded;
    /// the point is discovering aggregates.
    fn search_aggregates(&mut self, query: &QueryExpr) -> Result<()> {
        if let Some(having) = query.having.as_ref().filter(|h| h.has_method_call()) {
            self.convert_value_expression(having)
                .map_err(|e| e.in_clause(Clause::Having))?;
        }

        if query.order_by.is_none() && !query.select.has_method_call() {
            return Ok(());
        }

        let mut projection: Vec<(String, BoundExpression)> = Vec::with_capacity(query.select.items.len());
        for item in &query.select.items {
            let converted = self
                .convert_value_expression(&item.expr)
                .map_err(|e| e.in_clause(Clause::Select))?;
            let stand_in = BoundExpression::null(converted.data_type().clone());
            let mut alias = self.infer_alias_name(item, &stand_in);
            if projection.iter().any(|(name, _)| self.config.names_equal(name, &alias)) {
                match &item.alias {
                    Some(explicit) => {
                        return Err(BindError::AliasAlreadyUsed(alias)
                            .at(explicit.context.in_clause(Clause::Select)));
                    }
                    None => alias = self.generate_internal_name("autoProject"),
                }
            }
            projection.push((alias, stand_in));
        }

        let Some(order_by) = query.order_by.as_ref().filter(|o| o.has_method_call()) else {
            return Ok(());
        };
        self.enter_scope();
        for (name, stand_in) in projection {
            self.scopes
                .add(&name, ScopeEntry::ProjectionItemDefinition(stand_in));
        }
        for item in &order_by.items {
            self.current_region_mut().set_resolution_correlated(false);
            self.convert_value_expression(&item.expr)
                .map_err(|e| e.in_clause(Clause::OrderBy))?;
            if !self.current_region().was_resolution_correlated() {
                return Err(BindError::KeyMustBeCorrelated("ORDER BY")
                    .at(item.expr.context.in_clause(Clause::OrderBy)));
            }
        }
        self.leave_scope();
        Ok(())
    }

    /// Reuses an aggregate discovered earlier at the same node: its group
    /// column once the group is built, its placeholder before.
    fn try_convert_as_resolved_aggregate(&mut self, expr: &Expr) -> Result<Option<BoundExpression>> {
        let Some(id) = self.attached_aggregate(expr.id) else {
            return Ok(None);
        };
        self.rewire_to_current_aggregate(id);
        let (name, stub) = self.attached_result(id);
        let resolved = self.try_resolve_internal_aggregate_name(&name, expr.context)?;
        Ok(Some(resolved.unwrap_or(stub)))
    }

    /// Converts a call of an aggregate function group inside a group scope.
    ///
    /// The call is first tried as an ordinary call over collections, as in
    /// `MAX(SELECT VALUE ...)`; only if that fails is it a group aggregate.
    pub(super) fn convert_aggregate_in_group_scope(
        &mut self,
        expr: &Expr,
        name: &str,
        overloads: &[FunctionOverload],
        args: &[Expr],
        distinct: bool,
    ) -> Result<BoundExpression> {
        if let Some(resolved) = self.try_convert_as_resolved_aggregate(expr)? {
            return Ok(resolved);
        }

        if !distinct {
            let saved = self.save_referenced_region();
            let (converted, arg_types) = self.convert_function_args(args)?;
            if resolve_overloads(overloads, &arg_types, overload_parameters, false)
                != OverloadResolution::NotFound
            {
                return self.resolve_function_call(name, overloads, converted, &arg_types, expr.context);
            }
            self.restore_referenced_region(saved);
        }

        let ctx = expr.context;
        let mut aggregate = self.enter_function_aggregate(expr.id, ctx);
        let (converted, arg_types) = aggregate.convert_function_args(args)?;
        let function = match resolve_overloads(overloads, &arg_types, overload_parameters, true) {
            OverloadResolution::Resolved(index) => &overloads[index],
            OverloadResolution::NotFound => {
                return Err(BindError::FunctionOverloadNotFound {
                    name: name.to_string(),
                    args: type_names(&arg_types),
                }
                .at(ctx));
            }
            OverloadResolution::Ambiguous => {
                return Err(BindError::AmbiguousFunctionOverload(name.to_string()).at(ctx));
            }
        };
        let id = aggregate.finish()?;

        let data_type = function.return_type.clone();
        let definition = BoundExpression::Aggregate {
            function: function.full_name(),
            args: typed_args(converted, &function.parameters, true),
            distinct,
            data_type: data_type.clone(),
        };
        let result_name = self.generate_internal_name(&format!("groupAgg{}", function.name));
        let stub = BoundExpression::null(data_type);
        trace!(aggregate = id.0, name = %result_name, "discovered function aggregate");
        self.attach_aggregate(id, result_name, stub.clone(), definition);
        Ok(stub)
    }

    /// Converts `GROUPPARTITION([DISTINCT] arg)`.
    pub(super) fn convert_group_partition(&mut self, expr: &Expr, arg: &Expr, distinct: bool) -> Result<BoundExpression> {
        let ctx = expr.context;
        if self.config.is_restricted() {
            return Err(BindError::NotSupportedInRestrictedMode("GROUPPARTITION").at(ctx));
        }
        if !self.is_in_any_group_scope() {
            return Err(BindError::GroupPartitionOutOfContext.at(ctx));
        }
        if let Some(resolved) = self.try_convert_as_resolved_aggregate(expr)? {
            return Ok(resolved);
        }

        let mut partition = self.enter_group_partition(expr.id, ctx);
        let argument = partition.convert_value_expression(arg)?;
        let id = partition.finish()?;

        let binding = self
            .aggregates
            .get(id)
            .evaluating_region
            .and_then(|region| self.regions[region].group_aggregate_binding())
            .cloned()
            .ok_or_else(|| BindError::AggregateHasNoAggregatingScope.at(ctx))?;
        let element_type = argument.data_type().clone();
        if distinct && !element_type.is_equal_comparable() {
            return Err(BindError::DistinctNotEqualComparable(element_type.to_string()).at(ctx));
        }
        let data_type = DataType::collection(element_type);
        let project = BoundExpression::Project {
            input: binding,
            projection: Box::new(argument),
            data_type: data_type.clone(),
        };
        let definition = if distinct {
            BoundExpression::Distinct {
                input: Box::new(project),
                data_type: data_type.clone(),
            }
        } else {
            project
        };

        let result_name = self.generate_internal_name("groupPartition");
        let stub = BoundExpression::null(data_type);
        trace!(aggregate = id.0, name = %result_name, "discovered group partition");
        self.attach_aggregate(id, result_name, stub.clone(), definition);
        Ok(stub)
    }
}

#[cfg(test)]
mod tests {
    use crate::binder::expression::BoundExpression;
    use crate::binder::resolver::Resolver;
    use crate::binder::scope::Scope;
    use crate::binder::semantic::{Binder, BoundStatement};
    use crate::catalog::{Catalog, EntityContainer};
    use crate::config::ResolverConfig;
    use crate::error::{BindError, Result};
    use crate::parser::ast::ExprKind;
    use crate::parser::parse_query;
    use crate::types::DataType;

    fn catalog() -> Catalog {
        let mut catalog = Catalog::with_builtins();
        catalog
            .add_container(EntityContainer::new("Store").with_entity_set(
                "Products",
                DataType::row([("Name", DataType::String), ("Price", DataType::Int32)]),
            ))
            .unwrap();
        catalog.set_default_container("Store").unwrap();
        catalog
    }

    fn bind(query: &str) -> Result<BoundStatement> {
        let catalog = catalog();
        let statement = parse_query(query).unwrap();
        Binder::new(&catalog).bind_statement(&statement)
    }

    fn projection_input(bound: &BoundStatement) -> &BoundExpression {
        match &bound.expression {
            BoundExpression::Project { input, .. } => &input.expression,
            other => panic!("expected projection, got {other:?}"),
        }
    }

    #[test]
    fn test_scalar_call_does_not_group() {
        let bound = bind("SELECT VALUE abs(x) FROM {1, -2} AS x").unwrap();
        let BoundExpression::Project { input, projection, .. } = &bound.expression else {
            panic!("expected projection");
        };
        assert_eq!(input.variable, "x");
        assert!(matches!(input.expression.as_ref(), BoundExpression::NewCollection { .. }));
        let BoundExpression::FunctionCall { function, args, .. } = projection.as_ref() else {
            panic!("expected call");
        };
        assert_eq!(function, "Edm.ABS");
        assert_eq!(args[0], BoundExpression::variable("x", DataType::Int64));
    }

    #[test]
    fn test_implicit_group_for_aggregate() {
        let bound = bind("SELECT VALUE max(x) FROM {1, 2} AS x").unwrap();
        let BoundExpression::GroupBy { keys, aggregates, input, .. } = projection_input(&bound) else {
            panic!("expected group by");
        };
        assert!(keys.is_empty());
        assert_eq!(aggregates.len(), 1);
        let BoundExpression::Aggregate { function, args, .. } = &aggregates[0].1 else {
            panic!("expected aggregate");
        };
        assert_eq!(function, "Edm.MAX");
        assert_eq!(args[0], input.group_variable_ref());
        assert!(aggregates[0].0.starts_with("_##groupAggMAX"));
        assert_eq!(bound.data_type(), &DataType::collection(DataType::Int64));
    }

    #[test]
    fn test_explicit_keys_and_aggregates() {
        let bound = bind("SELECT k, count(x) AS n FROM {1, 2, 3} AS x GROUP BY x % 2 AS k").unwrap();
        let BoundExpression::GroupBy { keys, aggregates, input, .. } = projection_input(&bound) else {
            panic!("expected group by");
        };
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].0, "k");
        let BoundExpression::Arithmetic { left, .. } = &keys[0].1 else {
            panic!("expected arithmetic key");
        };
        assert_eq!(left.as_ref(), &input.variable_ref());
        assert_eq!(aggregates.len(), 1);
        assert_eq!(
            bound.data_type(),
            &DataType::collection(DataType::row([("k", DataType::Int64), ("n", DataType::Int32)]))
        );
    }

    #[test]
    fn test_dotted_key_keeps_alternative_name() {
        let bound = bind("SELECT p.Price, count(p.Name) AS n FROM Products AS p GROUP BY p.Price").unwrap();
        assert_eq!(
            bound.data_type(),
            &DataType::collection(DataType::row([("Price", DataType::Int32), ("n", DataType::Int32)]))
        );
    }

    #[test]
    fn test_non_key_reference_after_group_fails() {
        let err = bind("SELECT p.Name FROM Products AS p GROUP BY p.Price").unwrap_err();
        assert_eq!(
            err.bind_error(),
            Some(&BindError::InvalidGroupInputReference("p".into()))
        );
    }

    #[test]
    fn test_group_key_must_be_correlated() {
        let err = bind("SELECT VALUE k FROM {1} AS x GROUP BY 1 AS k").unwrap_err();
        assert_eq!(err.bind_error(), Some(&BindError::KeyMustBeCorrelated("GROUP BY")));
    }

    #[test]
    fn test_having_filters_groups() {
        let bound = bind("SELECT VALUE k FROM {1, 2} AS x GROUP BY x AS k HAVING count(x) > 1").unwrap();
        let BoundExpression::Filter { input, .. } = projection_input(&bound) else {
            panic!("expected filter");
        };
        let BoundExpression::GroupBy { aggregates, .. } = input.expression.as_ref() else {
            panic!("expected group by under having");
        };
        assert_eq!(aggregates.len(), 1);
    }

    #[test]
    fn test_group_partition_is_projected() {
        let bound = bind("SELECT VALUE GROUPPARTITION(x) FROM {1, 2} AS x GROUP BY x % 2 AS k").unwrap();
        let BoundExpression::Project { input, .. } = projection_input(&bound) else {
            panic!("expected partition projection");
        };
        let BoundExpression::GroupBy { aggregates, .. } = input.expression.as_ref() else {
            panic!("expected group by");
        };
        assert!(aggregates
            .iter()
            .any(|(_, agg)| matches!(agg, BoundExpression::GroupAggregate { .. })));
        assert_eq!(
            bound.data_type(),
            &DataType::collection(DataType::collection(DataType::Int64))
        );
    }

    #[test]
    fn test_group_partition_requires_group() {
        let err = bind("SELECT VALUE x FROM {1} AS x WHERE GROUPPARTITION(x) IS NULL").unwrap_err();
        assert_eq!(err.bind_error(), Some(&BindError::GroupPartitionOutOfContext));
    }

    #[test]
    fn test_nested_aggregate_rejected() {
        let err = bind("SELECT VALUE max(x + max(x)) FROM {1, 2} AS x").unwrap_err();
        assert_eq!(err.bind_error(), Some(&BindError::NestedAggregateInAggregate));
    }

    #[test]
    fn test_outer_aggregate_in_subquery() {
        let bound = bind("SELECT VALUE (SELECT VALUE max(x) FROM {1} AS y) FROM {1, 2} AS x").unwrap();
        let BoundExpression::GroupBy { aggregates, .. } = projection_input(&bound) else {
            panic!("expected the outer block to be grouped");
        };
        assert_eq!(aggregates.len(), 1);
    }

    #[test]
    fn test_collection_argument_is_not_a_group_aggregate() {
        let bound = bind("SELECT VALUE max(SELECT VALUE y FROM {x} AS y) FROM {1, 2} AS x").unwrap();
        let BoundExpression::Project { input, projection, .. } = &bound.expression else {
            panic!("expected projection");
        };
        assert_eq!(input.variable, "x");
        assert!(matches!(projection.as_ref(), BoundExpression::FunctionCall { .. }));
    }

    #[test]
    fn test_aggregate_in_group_key_rejected() {
        let err = bind("SELECT VALUE k FROM {1, 2} AS x GROUP BY max(x) AS k").unwrap_err();
        assert_eq!(err.bind_error(), Some(&BindError::NestedAggregateInAggregate));
    }

    fn snapshot(resolver: &Resolver<'_>) -> (Vec<Scope>, Vec<bool>) {
        let scopes = resolver.scopes();
        let all = (0..=scopes.current_scope_index())
            .map(|i| scopes.scope(i).clone())
            .collect();
        let flags = resolver.regions().iter().map(|r| r.is_aggregating()).collect();
        (all, flags)
    }

    #[test]
    fn test_implicit_group_rollback_restores_resolver_state() {
        let catalog = catalog();
        let statement = parse_query("SELECT VALUE abs(x) FROM {1, -2} AS x WHERE x > 0").unwrap();
        let ExprKind::Query(query) = &statement.query.kind else {
            panic!("expected query block");
        };
        let mut resolver = Resolver::new(&catalog, ResolverConfig::default());
        let mut region = resolver.enter_scope_region();

        let source = region.process_from_clause(&query.from).unwrap();
        let predicate = query.where_clause.as_ref().unwrap();
        let source = region.process_filter(source, predicate, "where").unwrap();
        let before = snapshot(&region);

        let result = region.process_group_by_clause(source.clone(), query).unwrap();
        assert_eq!(result, source);
        assert_eq!(snapshot(&region), before);
        assert!(!region.current_region().is_aggregating());
    }
}

//! Unit tests for queryscope.

use queryscope::binder::{AggregateArena, AggregateId, AggregateKind, ScopeEntry, ScopeManager};
use queryscope::catalog::{
    resolve_overloads, Catalog, EntityContainer, FunctionOverload, FunctionParameter, Metadata, MetadataMember,
    OverloadResolution,
};
use queryscope::error::{BindError, Clause, ErrorContext, QueryError};
use queryscope::parser::ast::{ExprKind, SelectKind};
use queryscope::parser::parse_query;
use queryscope::types::{DataType, Value};
use queryscope::{BoundExpression, ResolverConfig};

// =============================================================================
// Error Tests
// =============================================================================

mod error_tests {
    use super::*;

    #[test]
    fn test_parse_error_display() {
        let err = QueryError::ParseError {
            line: 1,
            col: 5,
            message: "unexpected token".into(),
        };
        assert!(err.to_string().contains("line 1"));
        assert!(err.to_string().contains("column 5"));
        assert!(err.to_string().contains("unexpected token"));
    }

    #[test]
    fn test_metadata_error_display() {
        let err = QueryError::Metadata("Entity container 'Store' already exists".into());
        assert!(err.to_string().contains("Metadata error"));
        assert!(err.to_string().contains("Store"));
    }

    #[test]
    fn test_type_mismatch_display() {
        let err = BindError::TypeMismatch {
            expected: "INT64".into(),
            actual: "STRING".into(),
        };
        assert!(err.to_string().contains("INT64"));
        assert!(err.to_string().contains("STRING"));
    }

    #[test]
    fn test_clause_tag_is_kept_by_inner_clause() {
        let err = BindError::ExpressionCannotBeNull
            .at(ErrorContext::new(2, 7))
            .in_clause(Clause::OrderBy)
            .in_clause(Clause::Select);
        assert_eq!(err.context().and_then(|c| c.clause), Some(Clause::OrderBy));
        assert!(err.to_string().contains("ORDER BY clause"));
    }
}

// =============================================================================
// Types Tests
// =============================================================================

mod types_tests {
    use super::*;

    #[test]
    fn test_numeric_promotion_chain() {
        assert!(DataType::Int32.is_promotable_to(&DataType::Int64));
        assert!(DataType::Int64.is_promotable_to(&DataType::Float64));
        assert!(!DataType::Float64.is_promotable_to(&DataType::Int64));
        assert!(!DataType::String.is_promotable_to(&DataType::Int64));
    }

    #[test]
    fn test_common_supertype() {
        assert_eq!(
            DataType::Int32.common_supertype(&DataType::Float64),
            Some(DataType::Float64)
        );
        assert_eq!(DataType::Bool.common_supertype(&DataType::Int32), None);
        assert_eq!(
            DataType::collection(DataType::Int32).common_supertype(&DataType::collection(DataType::Int64)),
            Some(DataType::collection(DataType::Int64))
        );
    }

    #[test]
    fn test_comparability() {
        let row = DataType::row([("a", DataType::Int32), ("b", DataType::String)]);
        assert!(row.is_equal_comparable());
        assert!(!row.is_order_comparable());
        assert!(!DataType::collection(DataType::Int32).is_valid_group_key());
        assert!(DataType::String.is_order_comparable());
    }

    #[test]
    fn test_row_property_lookup() {
        let row = DataType::row([("Name", DataType::String)]);
        assert!(row.property("name", true).is_some());
        assert!(row.property("name", false).is_none());
    }

    #[test]
    fn test_display() {
        let t = DataType::collection(DataType::row([("k", DataType::Int64)]));
        assert_eq!(t.to_string(), "COLLECTION(ROW(k INT64))");
        assert_eq!(Value::String("x".into()).data_type(), DataType::String);
    }
}

// =============================================================================
// Catalog Tests
// =============================================================================

mod catalog_tests {
    use super::*;

    fn store() -> Catalog {
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

    #[test]
    fn test_default_container_members() {
        let catalog = store();
        let container = catalog.default_container().unwrap();
        assert!(catalog.container_member(container, "products", true).is_some());
        assert!(catalog.container_member(container, "products", false).is_none());
    }

    #[test]
    fn test_duplicate_container_rejected() {
        let mut catalog = store();
        let err = catalog.add_container(EntityContainer::new("Store")).unwrap_err();
        assert!(matches!(err, QueryError::Metadata(_)));
    }

    #[test]
    fn test_unknown_default_container() {
        let mut catalog = Catalog::new();
        assert!(catalog.set_default_container("Nope").is_err());
    }

    #[test]
    fn test_user_namespace_function() {
        let mut catalog = store();
        catalog
            .add_function(FunctionOverload::scalar(
                "Sales",
                "Discount",
                vec![FunctionParameter::new("price", DataType::Float64)],
                DataType::Float64,
            ))
            .unwrap();
        assert!(catalog.resolve_unqualified_name("Discount", true).unwrap().is_none());
        match catalog.resolve_member("Sales", "discount", true).unwrap() {
            Some(MetadataMember::FunctionGroup { name, overloads }) => {
                assert_eq!(name, "Sales.Discount");
                assert_eq!(overloads.len(), 1);
            }
            other => panic!("expected function group, got {other:?}"),
        }

        catalog.import_namespace("Sales");
        assert!(catalog.resolve_unqualified_name("Discount", true).unwrap().is_some());
    }

    #[test]
    fn test_overload_resolution_prefers_exact_match() {
        let overloads = vec![
            FunctionOverload::scalar("N", "F", vec![FunctionParameter::new("v", DataType::Int64)], DataType::Int64),
            FunctionOverload::scalar(
                "N",
                "F",
                vec![FunctionParameter::new("v", DataType::Float64)],
                DataType::Float64,
            ),
        ];
        fn params(f: &FunctionOverload) -> &[FunctionParameter] {
            f.parameters.as_slice()
        }
        assert_eq!(
            resolve_overloads(&overloads, &[Some(DataType::Int64)], params, false),
            OverloadResolution::Resolved(0)
        );
        assert_eq!(
            resolve_overloads(&overloads, &[Some(DataType::Float64)], params, false),
            OverloadResolution::Resolved(1)
        );
        assert_eq!(
            resolve_overloads(&overloads, &[Some(DataType::String)], params, false),
            OverloadResolution::NotFound
        );
    }

    #[test]
    fn test_group_mode_matches_element_type() {
        let overloads = vec![FunctionOverload::aggregate("Edm", "MAX", DataType::Int64, DataType::Int64)];
        fn params(f: &FunctionOverload) -> &[FunctionParameter] {
            f.parameters.as_slice()
        }
        assert_eq!(
            resolve_overloads(&overloads, &[Some(DataType::Int64)], params, false),
            OverloadResolution::NotFound
        );
        assert_eq!(
            resolve_overloads(&overloads, &[Some(DataType::Int64)], params, true),
            OverloadResolution::Resolved(0)
        );
    }
}

// =============================================================================
// Parser Tests
// =============================================================================

mod parser_tests {
    use super::*;

    #[test]
    fn test_select_value_query() {
        let stmt = parse_query("SELECT VALUE x FROM {1, 2} AS x").unwrap();
        let ExprKind::Query(query) = &stmt.query.kind else {
            panic!("expected query");
        };
        assert_eq!(query.select.kind, SelectKind::Value);
        assert_eq!(query.select.items.len(), 1);
        assert!(query.group_by.is_none());
    }

    #[test]
    fn test_from_first_query() {
        let stmt = parse_query("FROM Products AS p WHERE p.Price > 1 SELECT p.Name").unwrap();
        let ExprKind::Query(query) = &stmt.query.kind else {
            panic!("expected query");
        };
        assert!(query.where_clause.is_some());
        assert_eq!(query.select.kind, SelectKind::Row);
    }

    #[test]
    fn test_parse_error_position() {
        let err = parse_query("SELECT VALUE FROM x").unwrap_err();
        let ctx = err.context().unwrap();
        assert_eq!(ctx.line, 1);
        assert!(ctx.col > 1);
    }

    #[test]
    fn test_method_call_detection() {
        let stmt = parse_query("SELECT VALUE (SELECT VALUE max(y) FROM {1} AS y) FROM {1} AS x").unwrap();
        let ExprKind::Query(query) = &stmt.query.kind else {
            panic!("expected query");
        };
        assert!(query.has_method_call());
        let stmt = parse_query("SELECT VALUE x + 1 FROM {1} AS x").unwrap();
        let ExprKind::Query(query) = &stmt.query.kind else {
            panic!("expected query");
        };
        assert!(!query.has_method_call());
    }
}

// =============================================================================
// Scope Tests
// =============================================================================

mod scope_tests {
    use super::*;

    fn free(v: i64) -> ScopeEntry {
        ScopeEntry::Free(BoundExpression::literal(Value::Int64(v)))
    }

    #[test]
    fn test_lookup_prefers_innermost() {
        let mut scopes = ScopeManager::new(ResolverConfig::default());
        scopes.add("x", free(1));
        scopes.enter_scope();
        scopes.add("X", free(2));
        let (entry, index) = scopes.lookup("x").unwrap();
        assert_eq!(index, 1);
        assert_eq!(entry, &free(2));
        scopes.leave_scope();
        assert_eq!(scopes.lookup("x").unwrap().1, 0);
    }

    #[test]
    fn test_case_sensitive_keys() {
        let mut scopes = ScopeManager::new(ResolverConfig::default().case_sensitive());
        scopes.add("Name", free(1));
        assert!(scopes.lookup("name").is_none());
        assert!(scopes.current_scope_contains("Name"));
    }

    #[test]
    fn test_rollback_to_scope() {
        let mut scopes = ScopeManager::new(ResolverConfig::default());
        scopes.enter_scope();
        scopes.enter_scope();
        scopes.enter_scope();
        scopes.rollback_to_scope(1);
        assert_eq!(scopes.current_scope_index(), 1);
    }

    #[test]
    fn test_hidden_group_input() {
        let err = ScopeEntry::InvalidGroupInputRef.expression("p").unwrap_err();
        assert_eq!(err, BindError::InvalidGroupInputReference("p".into()));
    }
}

// =============================================================================
// Aggregate Arena Tests
// =============================================================================

mod aggregate_arena_tests {
    use super::*;

    fn create(arena: &mut AggregateArena, defining: usize, containing: Option<AggregateId>) -> AggregateId {
        arena.create(AggregateKind::Function, None, ErrorContext::default(), defining, containing)
    }

    #[test]
    fn test_no_aggregating_region() {
        let mut arena = AggregateArena::new();
        let id = create(&mut arena, 1, None);
        assert_eq!(
            arena.seal(id, 2, |_| false),
            Err(BindError::AggregateHasNoAggregatingScope)
        );
    }

    #[test]
    fn test_search_moves_inward() {
        let mut arena = AggregateArena::new();
        let id = create(&mut arena, 3, None);
        arena.update_referenced_region(id, 1);
        assert_eq!(arena.seal(id, 4, |r| r == 2), Ok(2));
    }

    #[test]
    fn test_rewire_moves_containment() {
        let mut arena = AggregateArena::new();
        let outer = create(&mut arena, 1, None);
        let inner = create(&mut arena, 1, Some(outer));
        let other = create(&mut arena, 1, None);
        arena.set_containing(inner, Some(other));
        assert!(arena.get(outer).contained.is_empty());
        assert_eq!(arena.get(other).contained, vec![inner]);
    }
}

// =============================================================================
// Property Tests
// =============================================================================

mod proptest_binding {
    use super::*;
    use proptest::prelude::*;

    fn catalog() -> Catalog {
        Catalog::with_builtins()
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        /// Property: integer collections bind to COLLECTION(INT64)
        #[test]
        fn test_integer_collection_type(values in proptest::collection::vec(-1000i64..1000, 1..10)) {
            let items: Vec<String> = values.iter().map(ToString::to_string).collect();
            let query = format!("SELECT VALUE x FROM {{{}}} AS x", items.join(", "));
            let bound = queryscope::bind(&query, &catalog(), &ResolverConfig::default()).unwrap();
            prop_assert_eq!(bound.data_type(), &DataType::collection(DataType::Int64));
        }

        /// Property: name resolution ignores case by default
        #[test]
        fn test_alias_case_insensitive(alias in "[a-z][a-z0-9_]{0,8}") {
            prop_assume!(!matches!(
                alias.as_str(),
                "as" | "by" | "or" | "on" | "is" | "not" | "and" | "all" | "asc" | "desc" | "null"
                    | "true" | "false" | "from" | "join" | "left" | "full" | "cross" | "outer"
                    | "inner" | "apply" | "group" | "order" | "right" | "value" | "where"
                    | "select" | "having" | "distinct" | "function" | "grouppartition"
            ));
            let query = format!("SELECT VALUE {} FROM {{1}} AS {alias}", alias.to_uppercase());
            let bound = queryscope::bind(&query, &catalog(), &ResolverConfig::default()).unwrap();
            prop_assert_eq!(bound.data_type(), &DataType::collection(DataType::Int64));
        }

        /// Property: rollback leaves exactly the scopes up to the target index
        #[test]
        fn test_scope_stack_discipline(pushes in 0usize..20, target in 0usize..20) {
            let mut scopes = ScopeManager::new(ResolverConfig::default());
            for depth in 0..pushes {
                scopes.enter_scope();
                scopes.add(&format!("v{depth}"), ScopeEntry::Free(BoundExpression::literal(Value::Int64(0))));
            }
            prop_assert_eq!(scopes.current_scope_index(), pushes);
            let target = target.min(pushes);
            scopes.rollback_to_scope(target);
            prop_assert_eq!(scopes.current_scope_index(), target);
            for depth in 0..pushes {
                prop_assert_eq!(scopes.lookup(&format!("v{depth}")).is_some(), depth < target);
            }
        }

        /// Property: lookup returns the binding of the innermost scope that has one
        #[test]
        fn test_scope_shadowing(bindings in proptest::collection::vec(any::<bool>(), 1..12)) {
            let mut scopes = ScopeManager::new(ResolverConfig::default());
            let mut innermost = None;
            for (index, binds) in bindings.iter().enumerate() {
                if index > 0 {
                    scopes.enter_scope();
                }
                if *binds {
                    let value = i64::try_from(index).unwrap();
                    scopes.add("name", ScopeEntry::Free(BoundExpression::literal(Value::Int64(value))));
                    innermost = Some(index);
                }
            }
            match innermost {
                Some(index) => {
                    let (entry, scope) = scopes.lookup("NAME").unwrap();
                    prop_assert_eq!(scope, index);
                    let value = i64::try_from(index).unwrap();
                    prop_assert_eq!(entry, &ScopeEntry::Free(BoundExpression::literal(Value::Int64(value))));
                }
                None => prop_assert!(scopes.lookup("name").is_none()),
            }
        }

        /// Property: the evaluating region lies between the referenced and the last region
        #[test]
        fn test_seal_region_bounds(defining in 1usize..6, referenced in 0usize..6, aggregating in 0usize..6) {
            let mut arena = AggregateArena::new();
            let id = arena.create(AggregateKind::Function, None, ErrorContext::default(), defining, None);
            arena.update_referenced_region(id, referenced.min(defining));
            match arena.seal(id, defining + 1, |r| r == aggregating) {
                Ok(region) => {
                    prop_assert_eq!(region, aggregating);
                    prop_assert!(region >= referenced.min(defining));
                    prop_assert!(region <= defining);
                }
                Err(err) => prop_assert_eq!(err, BindError::AggregateHasNoAggregatingScope),
            }
        }
    }
}

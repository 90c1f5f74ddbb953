//! Integration tests for the full parse-and-bind workflow.

use queryscope::catalog::{Catalog, EntityContainer, FunctionOverload, FunctionParameter};
use queryscope::error::BindError;
use queryscope::parser::parse_query;
use queryscope::types::DataType;
use queryscope::{bind, Binder, BoundExpression, ResolverConfig};

fn store() -> Catalog {
    let mut catalog = Catalog::with_builtins();
    catalog
        .add_container(
            EntityContainer::new("Store")
                .with_entity_set(
                    "Products",
                    DataType::row([
                        ("Id", DataType::Int64),
                        ("Name", DataType::String),
                        ("Category", DataType::String),
                        ("Price", DataType::Int32),
                    ]),
                )
                .with_entity_set(
                    "Orders",
                    DataType::row([("ProductId", DataType::Int64), ("Quantity", DataType::Int32)]),
                )
                .with_function_import(FunctionOverload::scalar(
                    "Store",
                    "Restock",
                    vec![FunctionParameter::new("quantity", DataType::Int32)],
                    DataType::Int32,
                )),
        )
        .unwrap();
    catalog.set_default_container("Store").unwrap();
    catalog
        .add_function(FunctionOverload::scalar(
            "Sales",
            "Discount",
            vec![FunctionParameter::new("price", DataType::Float64)],
            DataType::Float64,
        ))
        .unwrap();
    catalog
}

fn row(fields: &[(&str, DataType)]) -> DataType {
    DataType::row(fields.iter().map(|(n, t)| (*n, t.clone())))
}

// =============================================================================
// Grouping Integration Tests
// =============================================================================

mod grouping_integration {
    use super::*;

    #[test]
    fn test_group_by_with_having_and_order_by() {
        let bound = bind(
            "SELECT p.Category, count(p.Id) AS n, max(p.Price) AS top
             FROM Products AS p
             WHERE p.Price > 0
             GROUP BY p.Category
             HAVING count(p.Id) > 1
             ORDER BY max(p.Price) DESC",
            &store(),
            &ResolverConfig::default(),
        )
        .unwrap();
        assert_eq!(
            bound.data_type(),
            &DataType::collection(row(&[
                ("Category", DataType::String),
                ("n", DataType::Int32),
                ("top", DataType::Int32),
            ]))
        );

        let BoundExpression::Project { input, .. } = &bound.expression else {
            panic!("expected projection");
        };
        let BoundExpression::Sort { input, .. } = input.expression.as_ref() else {
            panic!("expected sort");
        };
        let BoundExpression::Filter { input, .. } = input.expression.as_ref() else {
            panic!("expected having filter");
        };
        let BoundExpression::GroupBy { keys, aggregates, .. } = input.expression.as_ref() else {
            panic!("expected group by");
        };
        assert_eq!(keys.len(), 1);
        // count(p.Id) appears twice but each occurrence is its own aggregate
        assert_eq!(aggregates.len(), 4);
    }

    #[test]
    fn test_group_key_expression_referenced_by_alias() {
        let bound = bind(
            "SELECT k, sum(o.Quantity) AS total FROM Orders AS o GROUP BY o.ProductId % 10 AS k",
            &store(),
            &ResolverConfig::default(),
        )
        .unwrap();
        assert_eq!(
            bound.data_type(),
            &DataType::collection(row(&[("k", DataType::Int64), ("total", DataType::Int32)]))
        );
    }

    #[test]
    fn test_group_over_join() {
        let bound = bind(
            "SELECT p.Name, sum(o.Quantity) AS total
             FROM Products AS p JOIN Orders AS o ON p.Id = o.ProductId
             GROUP BY p.Name",
            &store(),
            &ResolverConfig::default(),
        )
        .unwrap();
        assert_eq!(
            bound.data_type(),
            &DataType::collection(row(&[("Name", DataType::String), ("total", DataType::Int32)]))
        );
    }

    #[test]
    fn test_group_partition_with_distinct() {
        let bound = bind(
            "SELECT p.Category, GROUPPARTITION(DISTINCT p.Price) AS prices FROM Products AS p GROUP BY p.Category",
            &store(),
            &ResolverConfig::default(),
        )
        .unwrap();
        assert_eq!(
            bound.data_type(),
            &DataType::collection(row(&[
                ("Category", DataType::String),
                ("prices", DataType::collection(DataType::Int32)),
            ]))
        );
    }

    #[test]
    fn test_duplicate_group_key_alias() {
        let err = bind(
            "SELECT VALUE k FROM Products AS p GROUP BY p.Name AS k, p.Price AS k",
            &store(),
            &ResolverConfig::default(),
        )
        .unwrap_err();
        assert_eq!(err.bind_error(), Some(&BindError::AliasAlreadyUsed("k".into())));
    }

    #[test]
    fn test_group_key_must_be_equality_comparable() {
        let err = bind(
            "SELECT VALUE 1 FROM Products AS p GROUP BY {p.Price} AS k",
            &store(),
            &ResolverConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err.bind_error(),
            Some(BindError::GroupingKeyNotEqualComparable(_))
        ));
    }
}

// =============================================================================
// Join and Apply Integration Tests
// =============================================================================

mod join_integration {
    use super::*;

    fn join_kind(query: &str) -> queryscope::binder::JoinKind {
        let bound = bind(query, &store(), &ResolverConfig::default()).unwrap();
        let BoundExpression::Project { input, .. } = &bound.expression else {
            panic!("expected projection");
        };
        match input.expression.as_ref() {
            BoundExpression::Join { kind, .. } => *kind,
            other => panic!("expected join, got {other:?}"),
        }
    }

    #[test]
    fn test_join_kinds() {
        use queryscope::binder::JoinKind;
        assert_eq!(
            join_kind("SELECT p.Name FROM Products AS p JOIN Orders AS o ON p.Id = o.ProductId"),
            JoinKind::Inner
        );
        assert_eq!(
            join_kind("SELECT p.Name FROM Products AS p LEFT OUTER JOIN Orders AS o ON p.Id = o.ProductId"),
            JoinKind::LeftOuter
        );
        assert_eq!(
            join_kind("SELECT p.Name FROM Orders AS o RIGHT JOIN Products AS p ON p.Id = o.ProductId"),
            JoinKind::LeftOuter
        );
        assert_eq!(
            join_kind("SELECT p.Name FROM Products AS p CROSS JOIN Orders AS o"),
            JoinKind::Cross
        );
    }

    #[test]
    fn test_join_predicate_rules() {
        let err = bind(
            "SELECT p.Name FROM Products AS p JOIN Orders AS o",
            &store(),
            &ResolverConfig::default(),
        )
        .unwrap_err();
        assert_eq!(err.bind_error(), Some(&BindError::InnerJoinMustHaveOnPredicate));

        let err = bind(
            "SELECT p.Name FROM Products AS p CROSS JOIN Orders AS o ON true",
            &store(),
            &ResolverConfig::default(),
        )
        .unwrap_err();
        assert_eq!(err.bind_error(), Some(&BindError::InvalidPredicateForCrossJoin));
    }

    #[test]
    fn test_comma_separated_sources() {
        let bound = bind(
            "SELECT p.Name, o.Quantity FROM Products AS p, Orders AS o WHERE p.Id = o.ProductId",
            &store(),
            &ResolverConfig::default(),
        )
        .unwrap();
        assert_eq!(
            bound.data_type(),
            &DataType::collection(row(&[("Name", DataType::String), ("Quantity", DataType::Int32)]))
        );
    }

    #[test]
    fn test_outer_apply_over_correlated_subquery() {
        let bound = bind(
            "SELECT p.Name, q FROM Products AS p
             OUTER APPLY (SELECT VALUE o.Quantity FROM Orders AS o WHERE o.ProductId = p.Id) AS q",
            &store(),
            &ResolverConfig::default(),
        )
        .unwrap();
        assert_eq!(
            bound.data_type(),
            &DataType::collection(row(&[("Name", DataType::String), ("q", DataType::Int32)]))
        );
    }
}

// =============================================================================
// Function Integration Tests
// =============================================================================

mod function_integration {
    use super::*;

    #[test]
    fn test_namespace_qualified_function() {
        let bound = bind(
            "SELECT VALUE Sales.Discount(p.Price) FROM Products AS p",
            &store(),
            &ResolverConfig::default(),
        )
        .unwrap();
        assert_eq!(bound.data_type(), &DataType::collection(DataType::Float64));
    }

    #[test]
    fn test_default_container_function_import() {
        let bound = bind(
            "SELECT VALUE Restock(o.Quantity) FROM Orders AS o",
            &store(),
            &ResolverConfig::default(),
        )
        .unwrap();
        let BoundExpression::Project { projection, .. } = &bound.expression else {
            panic!("expected projection");
        };
        let BoundExpression::FunctionCall { function, data_type, .. } = projection.as_ref() else {
            panic!("expected a function import call");
        };
        assert_eq!(function, "Store.Restock");
        assert_eq!(data_type, &DataType::Int32);
    }

    #[test]
    fn test_container_qualified_call_not_a_function_import() {
        // Qualified call names skip entity containers.
        let err = bind(
            "SELECT VALUE Store.Restock(o.Quantity) FROM Orders AS o",
            &store(),
            &ResolverConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err.bind_error(),
            Some(BindError::NotAMemberOfNamespace { .. })
        ));
    }

    #[test]
    fn test_no_matching_overload() {
        let err = bind(
            "SELECT VALUE length(p.Price) FROM Products AS p",
            &store(),
            &ResolverConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err.bind_error(),
            Some(BindError::FunctionOverloadNotFound { .. })
        ));
    }

    #[test]
    fn test_inline_function_overloads() {
        let bound = bind(
            "FUNCTION f(v Int64) AS (v + 1)
             FUNCTION f(v String) AS (length(v))
             SELECT VALUE f(p.Name) + f(p.Id) FROM Products AS p",
            &store(),
            &ResolverConfig::default(),
        )
        .unwrap();
        assert_eq!(bound.data_type(), &DataType::collection(DataType::Int64));
    }

    #[test]
    fn test_inline_function_calling_inline_function() {
        let bound = bind(
            "FUNCTION twice(v Int64) AS (v * 2)
             FUNCTION quad(v Int64) AS (twice(twice(v)))
             SELECT VALUE quad(x) FROM {1, 2} AS x",
            &store(),
            &ResolverConfig::default(),
        )
        .unwrap();
        assert_eq!(bound.data_type(), &DataType::collection(DataType::Int64));
    }

    #[test]
    fn test_recursive_inline_function_rejected() {
        let err = bind(
            "FUNCTION f(v Int64) AS (f(v)) SELECT VALUE f(x) FROM {1} AS x",
            &store(),
            &ResolverConfig::default(),
        )
        .unwrap_err();
        assert_eq!(err.bind_error(), Some(&BindError::RecursiveInlineFunction("f".into())));
    }

    #[test]
    fn test_inline_function_body_is_a_query() {
        let bound = bind(
            "FUNCTION cheap(limit Int64) AS (SELECT VALUE p.Name FROM Products AS p WHERE p.Price < limit)
             SELECT VALUE cheap(10) FROM {1} AS x",
            &store(),
            &ResolverConfig::default(),
        )
        .unwrap();
        assert_eq!(
            bound.data_type(),
            &DataType::collection(DataType::collection(DataType::String))
        );
    }
}

// =============================================================================
// Statement Integration Tests
// =============================================================================

mod statement_integration {
    use super::*;

    #[test]
    fn test_parameters_and_variables() {
        let catalog = store();
        let statement = parse_query("SELECT VALUE p.Name FROM Products AS p WHERE p.Price > @min AND p.Id <> skip").unwrap();
        let bound = Binder::new(&catalog)
            .with_parameter("min", DataType::Int32)
            .with_variable("skip", DataType::Int64)
            .bind_statement(&statement)
            .unwrap();
        assert_eq!(bound.data_type(), &DataType::collection(DataType::String));
    }

    #[test]
    fn test_scalar_statement() {
        let bound = bind("1 + 2", &store(), &ResolverConfig::default()).unwrap();
        assert_eq!(bound.data_type(), &DataType::Int64);
    }

    #[test]
    fn test_entity_set_qualified_by_container() {
        let bound = bind(
            "SELECT VALUE p.Name FROM Store.Products AS p",
            &store(),
            &ResolverConfig::default(),
        )
        .unwrap();
        assert_eq!(bound.data_type(), &DataType::collection(DataType::String));
    }

    #[test]
    fn test_parse_errors_surface_as_query_errors() {
        let err = bind("SELECT VALUE FROM", &store(), &ResolverConfig::default()).unwrap_err();
        assert!(matches!(err, queryscope::QueryError::ParseError { .. }));
    }
}

// =============================================================================
// End-to-End Scenario Tests
// =============================================================================

mod scenario_integration {
    use super::*;

    fn group_by_of(expr: &BoundExpression) -> &BoundExpression {
        let BoundExpression::Project { input, .. } = expr else {
            panic!("expected projection, got {expr:?}");
        };
        input.expression.as_ref()
    }

    #[test]
    fn test_filter_over_plain_source() {
        let bound = bind(
            "SELECT VALUE x FROM {1, 2, 3} AS x WHERE x > 1",
            &store(),
            &ResolverConfig::default(),
        )
        .unwrap();
        assert!(matches!(group_by_of(&bound.expression), BoundExpression::Filter { .. }));
        assert_eq!(bound.data_type(), &DataType::collection(DataType::Int64));
    }

    #[test]
    fn test_group_exposes_keys_and_aggregates_only() {
        let bound = bind(
            "FROM {1, 2} AS x GROUP BY x AS k SELECT max(x), k",
            &store(),
            &ResolverConfig::default(),
        )
        .unwrap();
        let BoundExpression::GroupBy { keys, aggregates, .. } = group_by_of(&bound.expression) else {
            panic!("expected group by");
        };
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].0, "k");
        assert_eq!(aggregates.len(), 1);
        assert!(matches!(aggregates[0].1, BoundExpression::Aggregate { .. }));

        let err = bind(
            "FROM {1, 2} AS x GROUP BY x AS k SELECT max(x), x",
            &store(),
            &ResolverConfig::default(),
        )
        .unwrap_err();
        assert_eq!(err.bind_error(), Some(&BindError::InvalidGroupInputReference("x".into())));
    }

    #[test]
    fn test_inner_aggregate_lifted_to_outer_group() {
        let bound = bind(
            "SELECT (SELECT max(x) FROM {1, 2} AS y) FROM {1, 2} AS x GROUP BY x AS k",
            &store(),
            &ResolverConfig::default(),
        )
        .unwrap();
        let BoundExpression::GroupBy { keys, aggregates, .. } = group_by_of(&bound.expression) else {
            panic!("expected the outer block to be grouped");
        };
        assert_eq!(keys.len(), 1);
        assert_eq!(aggregates.len(), 1);

        let BoundExpression::Project { projection, .. } = &bound.expression else {
            unreachable!();
        };
        let BoundExpression::NewRow { fields, .. } = projection.as_ref() else {
            panic!("expected row projection");
        };
        let inner_input = group_by_of(&fields[0].1);
        assert!(!matches!(inner_input, BoundExpression::GroupBy { .. }));
    }
}

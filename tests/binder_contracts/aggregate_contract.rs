//! Aggregate placement contracts.

use queryscope::binder::ExpressionBinding;
use queryscope::error::BindError;
use queryscope::types::DataType;
use queryscope::BoundExpression;

use super::{bind, bind_err};

fn projection_input(expr: &BoundExpression) -> &ExpressionBinding {
    match expr {
        BoundExpression::Project { input, .. } => input,
        other => panic!("expected projection, got {other:?}"),
    }
}

fn is_group_by(binding: &ExpressionBinding) -> bool {
    matches!(binding.expression.as_ref(), BoundExpression::GroupBy { .. })
}

// -------------------------------------------------------------------------
// Evaluating region
// -------------------------------------------------------------------------

#[test]
fn test_aggregate_over_outer_source_groups_outer_block() {
    let bound = bind("SELECT VALUE (SELECT VALUE count(x) FROM {1, 2} AS y) FROM {1} AS x").unwrap();
    let outer = projection_input(&bound.expression);
    assert!(is_group_by(outer));

    let BoundExpression::Project { projection, .. } = &bound.expression else {
        unreachable!();
    };
    let inner = projection_input(projection);
    assert_eq!(inner.variable, "y");
    assert!(!is_group_by(inner));
}

#[test]
fn test_aggregate_over_inner_source_groups_inner_block() {
    let bound = bind("SELECT VALUE (SELECT VALUE count(y) FROM {1, 2} AS y) FROM {1} AS x").unwrap();
    let outer = projection_input(&bound.expression);
    assert_eq!(outer.variable, "x");
    assert!(!is_group_by(outer));

    let BoundExpression::Project { projection, .. } = &bound.expression else {
        unreachable!();
    };
    assert!(is_group_by(projection_input(projection)));
    assert_eq!(
        bound.data_type(),
        &DataType::collection(DataType::collection(DataType::Int32))
    );
}

#[test]
fn test_constant_aggregate_evaluates_in_defining_block() {
    let bound = bind("SELECT VALUE count(1) FROM {1, 2} AS x").unwrap();
    assert!(is_group_by(projection_input(&bound.expression)));
}

#[test]
fn test_aggregates_split_across_blocks() {
    let bound = bind(
        "SELECT VALUE (SELECT VALUE max(y + count(x)) FROM {1} AS y) FROM {1, 2} AS x",
    )
    .unwrap();
    let BoundExpression::GroupBy { aggregates, .. } = projection_input(&bound.expression).expression.as_ref()
    else {
        panic!("expected the outer block to be grouped");
    };
    assert_eq!(aggregates.len(), 1);
    assert!(aggregates[0].0.starts_with("_##groupAggCOUNT"));

    let BoundExpression::Project { projection, .. } = &bound.expression else {
        unreachable!();
    };
    let BoundExpression::GroupBy { aggregates, .. } = projection_input(projection).expression.as_ref() else {
        panic!("expected the inner block to be grouped");
    };
    assert_eq!(aggregates.len(), 1);
    assert!(aggregates[0].0.starts_with("_##groupAggMAX"));
}

// -------------------------------------------------------------------------
// Containment
// -------------------------------------------------------------------------

#[test]
fn test_directly_nested_aggregate_rejected() {
    let err = bind_err("SELECT VALUE max(max(x)) FROM {1, 2} AS x");
    assert_eq!(err.bind_error(), Some(&BindError::NestedAggregateInAggregate));
}

#[test]
fn test_aggregate_in_group_partition_rejected() {
    let err = bind_err("SELECT VALUE GROUPPARTITION(count(x)) FROM {1, 2} AS x");
    assert_eq!(err.bind_error(), Some(&BindError::NestedAggregateInAggregate));
}

#[test]
fn test_collection_aggregate_is_not_a_group_aggregate() {
    let bound = bind("SELECT VALUE count(SELECT VALUE p.Id FROM Products AS p) FROM {1} AS x").unwrap();
    let input = projection_input(&bound.expression);
    assert!(!is_group_by(input));
    assert!(matches!(
        bound.expression,
        BoundExpression::Project { ref projection, .. }
            if matches!(projection.as_ref(), BoundExpression::FunctionCall { .. })
    ));
}

// -------------------------------------------------------------------------
// Speculative grouping
// -------------------------------------------------------------------------

#[test]
fn test_scalar_call_leaves_no_group() {
    let with_call = bind("SELECT VALUE abs(x) FROM {1, 2} AS x").unwrap();
    let input = projection_input(&with_call.expression);
    assert_eq!(input.variable, "x");
    assert!(matches!(
        input.expression.as_ref(),
        BoundExpression::NewCollection { .. }
    ));

    let BoundExpression::Project { projection, .. } = &with_call.expression else {
        unreachable!();
    };
    let BoundExpression::FunctionCall { function, args, .. } = projection.as_ref() else {
        panic!("expected a scalar call");
    };
    assert_eq!(function, "Edm.ABS");
    assert_eq!(args, &vec![BoundExpression::variable("x", DataType::Int64)]);
}

#[test]
fn test_rollback_restores_filter_rebinding() {
    let bound = bind("SELECT VALUE length(p.Name) FROM Products AS p WHERE p.Price > 1").unwrap();
    let input = projection_input(&bound.expression);
    assert!(matches!(input.expression.as_ref(), BoundExpression::Filter { .. }));
    let BoundExpression::Project { projection, .. } = &bound.expression else {
        unreachable!();
    };
    let BoundExpression::FunctionCall { args, .. } = projection.as_ref() else {
        panic!("expected a scalar call");
    };
    let BoundExpression::Property { instance, .. } = &args[0] else {
        panic!("expected a property access");
    };
    assert_eq!(instance.as_variable(), Some(input.variable.as_str()));
}

#[test]
fn test_having_requires_group_by() {
    let err = bind_err("SELECT VALUE x FROM {1} AS x HAVING count(x) > 1");
    assert_eq!(err.bind_error(), Some(&BindError::HavingRequiresGroupClause));
}

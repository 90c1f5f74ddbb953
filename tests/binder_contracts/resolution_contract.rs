//! Name resolution and diagnostics contracts.

use queryscope::error::{BindError, Clause};
use queryscope::types::DataType;
use queryscope::{BoundExpression, CompilationMode, ResolverConfig};

use super::{bind, bind_err, store};

// -------------------------------------------------------------------------
// Positions and clauses
// -------------------------------------------------------------------------

#[test]
fn test_unresolved_name_reports_position_and_clause() {
    let err = bind_err("SELECT VALUE x\nFROM {1} AS x\nWHERE missing > 1");
    assert_eq!(err.bind_error(), Some(&BindError::UnresolvedIdentifier("missing".into())));
    let ctx = err.context().unwrap();
    assert_eq!((ctx.line, ctx.col), (3, 7));
    assert_eq!(ctx.clause, Some(Clause::Where));
}

#[test]
fn test_errors_tagged_with_their_clause() {
    let cases = [
        ("SELECT VALUE nope FROM {1} AS x", Clause::Select),
        ("SELECT VALUE x FROM nope AS x", Clause::From),
        ("SELECT VALUE k FROM {1} AS x GROUP BY nope AS k", Clause::GroupBy),
        ("SELECT VALUE k FROM {1} AS x GROUP BY x AS k HAVING nope", Clause::Having),
        ("SELECT VALUE x FROM {1} AS x ORDER BY nope", Clause::OrderBy),
    ];
    for (query, clause) in cases {
        let err = bind_err(query);
        assert_eq!(err.context().and_then(|c| c.clause), Some(clause), "{query}");
    }
}

#[test]
fn test_inline_function_errors_point_at_definition() {
    let err = bind_err("FUNCTION f(v Int64) AS (v + nope) SELECT VALUE f(x) FROM {1} AS x");
    assert_eq!(err.bind_error(), Some(&BindError::UnresolvedIdentifier("nope".into())));
    assert_eq!(err.context().and_then(|c| c.clause), Some(Clause::Function));
}

// -------------------------------------------------------------------------
// Scopes
// -------------------------------------------------------------------------

#[test]
fn test_inner_alias_shadows_outer() {
    let bound = bind("SELECT VALUE (SELECT VALUE x FROM {'a'} AS x) FROM {1} AS x").unwrap();
    assert_eq!(
        bound.data_type(),
        &DataType::collection(DataType::collection(DataType::String))
    );
}

#[test]
fn test_right_side_of_join_cannot_see_left() {
    let err = bind_err("SELECT VALUE a FROM {1} AS a JOIN (SELECT VALUE a FROM {1} AS b) AS c ON true");
    assert_eq!(err.bind_error(), Some(&BindError::InvalidJoinLeftCorrelation));
}

#[test]
fn test_apply_right_side_sees_left() {
    let bound = bind("SELECT a, c FROM {1} AS a CROSS APPLY (SELECT VALUE a + 1 FROM {1} AS b) AS c").unwrap();
    assert_eq!(
        bound.data_type(),
        &DataType::collection(DataType::row([("a", DataType::Int64), ("c", DataType::Int64)]))
    );
}

#[test]
fn test_group_hides_non_key_sources() {
    let err = bind_err("SELECT p.Name FROM Products AS p GROUP BY p.Price");
    assert_eq!(err.bind_error(), Some(&BindError::InvalidGroupInputReference("p".into())));
}

// -------------------------------------------------------------------------
// Restricted mode
// -------------------------------------------------------------------------

#[test]
fn test_restricted_mode_rejects_grouping_clauses() {
    let config = ResolverConfig::default().with_compilation_mode(CompilationMode::RestrictedViewGeneration);
    let catalog = store();
    let cases = [
        ("SELECT VALUE k FROM {1} AS x GROUP BY x AS k", "GROUP BY"),
        ("SELECT VALUE x FROM {1} AS x ORDER BY x", "ORDER BY"),
        ("SELECT VALUE GROUPPARTITION(x) FROM {1} AS x", "GROUPPARTITION"),
    ];
    for (query, feature) in cases {
        let err = queryscope::bind(query, &catalog, &config).unwrap_err();
        assert_eq!(
            err.bind_error(),
            Some(&BindError::NotSupportedInRestrictedMode(feature)),
            "{query}"
        );
    }

    let bound = queryscope::bind("SELECT VALUE p.Name FROM Products AS p", &catalog, &config).unwrap();
    assert!(matches!(bound.expression, BoundExpression::Project { .. }));
}

//! Assertion helpers for refined queries.

use helios_refine::Refinement;
use helios_refine::sql::{SqlParam, SqlQuery};

fn query(refinement: &Refinement<SqlQuery>) -> &SqlQuery {
    refinement
        .query()
        .expect("refinement should have a bound builder")
}

/// Asserts the rendered `WHERE` body.
pub fn assert_where(refinement: &Refinement<SqlQuery>, expected: &str) {
    let actual = query(refinement).where_sql().sql;
    assert_eq!(
        actual, expected,
        "WHERE mismatch: expected {}, got {}",
        expected, actual
    );
}

/// Asserts the bound parameters of the `WHERE` body.
pub fn assert_params(refinement: &Refinement<SqlQuery>, expected: &[SqlParam]) {
    assert_eq!(query(refinement).where_sql().params, expected);
}

/// Asserts the ordering clauses.
pub fn assert_orders(refinement: &Refinement<SqlQuery>, expected: &[&str]) {
    assert_eq!(query(refinement).orders(), expected);
}

/// Asserts that no predicate was attached.
pub fn assert_unfiltered(refinement: &Refinement<SqlQuery>) {
    assert!(
        !query(refinement).has_conditions(),
        "expected no predicates, got {}",
        query(refinement).where_sql().sql
    );
}

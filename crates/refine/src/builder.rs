//! The query builder boundary.
//!
//! The engine never renders queries itself. Everything it decides is expressed
//! as calls on a [`QueryBuilder`], which hosts implement for their own query
//! representation. [`crate::sql::SqlQuery`] is a reference implementation
//! that renders parameterised SQL.

use chrono::{NaiveDate, NaiveTime};
use serde_json::Value;

use crate::error::{RefineError, RefineResult};
use crate::types::{Boolean, Direction, Operator};

/// A callback that configures a nested builder.
pub type Constraint<'a, B> = &'a mut dyn FnMut(&mut B) -> RefineResult<()>;

/// Primitive operations the engine needs from a query builder.
///
/// Every predicate method takes the [`Boolean`] that joins it to the
/// predicates already attached at the same nesting level.
pub trait QueryBuilder: Sized {
    /// Returns the name of the table being queried.
    fn table(&self) -> &str;

    /// Prefixes a bare column with its table. Dotted names are returned as is.
    fn qualify_column(&self, column: &str) -> String;

    /// Attaches `column <operator> value`.
    fn where_compare(&mut self, column: &str, operator: Operator, value: Value, boolean: Boolean);

    /// Attaches `column IN (values)`.
    fn where_in(&mut self, column: &str, values: Vec<Value>, boolean: Boolean);

    /// Attaches `column NOT IN (values)`.
    fn where_not_in(&mut self, column: &str, values: Vec<Value>, boolean: Boolean);

    /// Attaches `column IS NULL`.
    fn where_null(&mut self, column: &str, boolean: Boolean);

    /// Attaches `column IS NOT NULL`.
    fn where_not_null(&mut self, column: &str, boolean: Boolean);

    /// Attaches `LOWER(column) <operator> pattern`.
    fn where_lower(&mut self, column: &str, operator: Operator, pattern: String, boolean: Boolean);

    /// Attaches a comparison on the date part of `column`.
    fn where_date(&mut self, column: &str, operator: Operator, date: NaiveDate, boolean: Boolean);

    /// Attaches a comparison on the time part of `column`.
    fn where_time(&mut self, column: &str, operator: Operator, time: NaiveTime, boolean: Boolean);

    /// Attaches a parenthesised group built by `build`.
    ///
    /// Implementations must drop the group when `build` attaches nothing.
    fn where_nested(&mut self, boolean: Boolean, build: Constraint<'_, Self>) -> RefineResult<()>;

    /// Appends an ordering clause.
    fn order_by(&mut self, column: &str, direction: Direction);

    /// Attaches a full-text predicate over `columns`.
    ///
    /// The default matches the lower-cased term as a substring of any column.
    fn where_full_text(&mut self, columns: &[String], term: &str, boolean: Boolean) -> RefineResult<()> {
        let pattern = format!("%{}%", term.to_lowercase());
        self.where_nested(boolean, &mut |query: &mut Self| -> RefineResult<()> {
            for column in columns {
                query.where_lower(column, Operator::Like, pattern.clone(), Boolean::Or);
            }
            Ok(())
        })
    }

    /// Attaches `first <operator> second` comparing two columns.
    fn where_column(
        &mut self,
        _first: &str,
        _operator: Operator,
        _second: &str,
        _boolean: Boolean,
    ) -> RefineResult<()> {
        Err(RefineError::Builder(
            "column comparisons are not supported by this builder".to_string(),
        ))
    }

    /// Attaches a relation existence check, optionally constrained.
    fn where_has(
        &mut self,
        _relation: &str,
        _constraint: Option<Constraint<'_, Self>>,
        _negate: bool,
        _boolean: Boolean,
    ) -> RefineResult<()> {
        Err(RefineError::Builder(
            "relation checks are not supported by this builder".to_string(),
        ))
    }
}

//! Reference SQL query builder.
//!
//! [`SqlQuery`] implements [`QueryBuilder`] by collecting parameterised
//! predicates and ordering clauses, then rendering a `SELECT` statement with
//! positional `?` placeholders.

use chrono::{NaiveDate, NaiveTime};
use serde_json::Value;

use crate::builder::{Constraint, QueryBuilder};
use crate::error::RefineResult;
use crate::types::{Boolean, DATE_FORMAT, Direction, Operator, TIME_FORMAT};

/// A fragment of SQL with bound parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SqlFragment {
    /// The SQL clause.
    pub sql: String,
    /// Bound parameter values.
    pub params: Vec<SqlParam>,
}

/// A bound SQL parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    /// String parameter.
    String(String),
    /// Integer parameter.
    Integer(i64),
    /// Float parameter.
    Float(f64),
    /// Boolean parameter.
    Bool(bool),
    /// Null parameter.
    Null,
}

impl SqlParam {
    /// Creates a string parameter.
    pub fn string(s: impl Into<String>) -> Self {
        SqlParam::String(s.into())
    }
}

impl From<Value> for SqlParam {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => SqlParam::Null,
            Value::Bool(b) => SqlParam::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => SqlParam::Integer(i),
                None => SqlParam::Float(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => SqlParam::String(s),
            other => SqlParam::String(other.to_string()),
        }
    }
}

impl SqlFragment {
    /// Creates a new SQL fragment.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Creates a fragment with parameters.
    pub fn with_params(sql: impl Into<String>, params: Vec<SqlParam>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// Returns true if this fragment is empty.
    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }
}

#[derive(Debug, Clone)]
enum Condition {
    Fragment(SqlFragment),
    Group(Vec<(Boolean, Condition)>),
}

impl Condition {
    fn render(&self, out: &mut SqlFragment) {
        match self {
            Condition::Fragment(fragment) => {
                out.sql.push_str(&fragment.sql);
                out.params.extend(fragment.params.iter().cloned());
            }
            Condition::Group(conditions) => {
                out.sql.push('(');
                render_conditions(conditions, out);
                out.sql.push(')');
            }
        }
    }
}

fn render_conditions(conditions: &[(Boolean, Condition)], out: &mut SqlFragment) {
    for (index, (boolean, condition)) in conditions.iter().enumerate() {
        if index > 0 {
            out.sql.push_str(&format!(" {} ", boolean));
        }
        condition.render(out);
    }
}

/// Builds a SQL `SELECT` from refinement calls.
#[derive(Debug, Clone)]
pub struct SqlQuery {
    table: String,
    conditions: Vec<(Boolean, Condition)>,
    orders: Vec<String>,
}

impl SqlQuery {
    /// Creates a query over `table`.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            conditions: Vec::new(),
            orders: Vec::new(),
        }
    }

    /// Returns the rendered `WHERE` body, without the keyword.
    pub fn where_sql(&self) -> SqlFragment {
        let mut out = SqlFragment::default();
        render_conditions(&self.conditions, &mut out);
        out
    }

    /// Returns the ordering clauses in the order they were added.
    pub fn orders(&self) -> &[String] {
        &self.orders
    }

    /// Returns true if no predicate has been attached.
    pub fn has_conditions(&self) -> bool {
        !self.conditions.is_empty()
    }

    /// Renders the complete statement.
    pub fn to_sql(&self) -> SqlFragment {
        let mut out = SqlFragment::new(format!("SELECT * FROM {}", self.table));
        if !self.conditions.is_empty() {
            let body = self.where_sql();
            out.sql.push_str(" WHERE ");
            out.sql.push_str(&body.sql);
            out.params = body.params;
        }
        if !self.orders.is_empty() {
            out.sql.push_str(" ORDER BY ");
            out.sql.push_str(&self.orders.join(", "));
        }
        out
    }

    fn push(&mut self, boolean: Boolean, fragment: SqlFragment) {
        self.conditions.push((boolean, Condition::Fragment(fragment)));
    }

    fn child(&self, table: &str) -> Self {
        Self::new(table)
    }
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

fn sql_operator(operator: Operator) -> String {
    operator.as_sql().to_uppercase()
}

impl QueryBuilder for SqlQuery {
    fn table(&self) -> &str {
        &self.table
    }

    fn qualify_column(&self, column: &str) -> String {
        if column.contains('.') {
            column.to_string()
        } else {
            format!("{}.{}", self.table, column)
        }
    }

    fn where_compare(&mut self, column: &str, operator: Operator, value: Value, boolean: Boolean) {
        let fragment = SqlFragment::with_params(
            format!("{} {} ?", column, sql_operator(operator)),
            vec![SqlParam::from(value)],
        );
        self.push(boolean, fragment);
    }

    fn where_in(&mut self, column: &str, values: Vec<Value>, boolean: Boolean) {
        if values.is_empty() {
            self.push(boolean, SqlFragment::new("1 = 0"));
            return;
        }
        let fragment = SqlFragment::with_params(
            format!("{} IN ({})", column, placeholders(values.len())),
            values.into_iter().map(SqlParam::from).collect(),
        );
        self.push(boolean, fragment);
    }

    fn where_not_in(&mut self, column: &str, values: Vec<Value>, boolean: Boolean) {
        if values.is_empty() {
            self.push(boolean, SqlFragment::new("1 = 1"));
            return;
        }
        let fragment = SqlFragment::with_params(
            format!("{} NOT IN ({})", column, placeholders(values.len())),
            values.into_iter().map(SqlParam::from).collect(),
        );
        self.push(boolean, fragment);
    }

    fn where_null(&mut self, column: &str, boolean: Boolean) {
        self.push(boolean, SqlFragment::new(format!("{} IS NULL", column)));
    }

    fn where_not_null(&mut self, column: &str, boolean: Boolean) {
        self.push(boolean, SqlFragment::new(format!("{} IS NOT NULL", column)));
    }

    fn where_lower(&mut self, column: &str, operator: Operator, pattern: String, boolean: Boolean) {
        let fragment = SqlFragment::with_params(
            format!("LOWER({}) {} ?", column, sql_operator(operator)),
            vec![SqlParam::String(pattern)],
        );
        self.push(boolean, fragment);
    }

    fn where_date(&mut self, column: &str, operator: Operator, date: NaiveDate, boolean: Boolean) {
        let fragment = SqlFragment::with_params(
            format!("DATE({}) {} ?", column, sql_operator(operator)),
            vec![SqlParam::string(date.format(DATE_FORMAT).to_string())],
        );
        self.push(boolean, fragment);
    }

    fn where_time(&mut self, column: &str, operator: Operator, time: NaiveTime, boolean: Boolean) {
        let fragment = SqlFragment::with_params(
            format!("TIME({}) {} ?", column, sql_operator(operator)),
            vec![SqlParam::string(time.format(TIME_FORMAT).to_string())],
        );
        self.push(boolean, fragment);
    }

    fn where_nested(&mut self, boolean: Boolean, build: Constraint<'_, Self>) -> RefineResult<()> {
        let mut nested = self.child(&self.table);
        build(&mut nested)?;
        if !nested.conditions.is_empty() {
            self.conditions
                .push((boolean, Condition::Group(nested.conditions)));
        }
        Ok(())
    }

    fn order_by(&mut self, column: &str, direction: Direction) {
        self.orders.push(format!("{} {}", column, direction.as_sql()));
    }

    fn where_full_text(&mut self, columns: &[String], term: &str, boolean: Boolean) -> RefineResult<()> {
        let document = columns.join(" || ' ' || ");
        let fragment = SqlFragment::with_params(
            format!("to_tsvector({}) @@ plainto_tsquery(?)", document),
            vec![SqlParam::string(term)],
        );
        self.push(boolean, fragment);
        Ok(())
    }

    fn where_column(
        &mut self,
        first: &str,
        operator: Operator,
        second: &str,
        boolean: Boolean,
    ) -> RefineResult<()> {
        self.push(
            boolean,
            SqlFragment::new(format!("{} {} {}", first, sql_operator(operator), second)),
        );
        Ok(())
    }

    /// Renders `EXISTS (SELECT 1 FROM relation WHERE ...)`.
    ///
    /// The correlation between the two tables is left to the constraint.
    fn where_has(
        &mut self,
        relation: &str,
        constraint: Option<Constraint<'_, Self>>,
        negate: bool,
        boolean: Boolean,
    ) -> RefineResult<()> {
        let mut inner = self.child(relation);
        if let Some(constraint) = constraint {
            constraint(&mut inner)?;
        }

        let keyword = if negate { "NOT EXISTS" } else { "EXISTS" };
        let mut fragment = SqlFragment::new(format!("{} (SELECT 1 FROM {}", keyword, relation));
        if inner.has_conditions() {
            let body = inner.where_sql();
            fragment.sql.push_str(" WHERE ");
            fragment.sql.push_str(&body.sql);
            fragment.params = body.params;
        }
        fragment.sql.push(')');
        self.push(boolean, fragment);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_compare_and_order() {
        let mut query = SqlQuery::new("products");
        let column = query.qualify_column("price");
        query.where_compare(&column, Operator::Gte, json!(100), Boolean::And);
        query.order_by("products.name", Direction::Desc);

        let sql = query.to_sql();
        assert_eq!(
            sql.sql,
            "SELECT * FROM products WHERE products.price >= ? ORDER BY products.name DESC"
        );
        assert_eq!(sql.params, vec![SqlParam::Integer(100)]);
    }

    #[test]
    fn test_qualify_keeps_dotted() {
        let query = SqlQuery::new("products");
        assert_eq!(query.qualify_column("category.name"), "category.name");
    }

    #[test]
    fn test_nested_group() {
        let mut query = SqlQuery::new("products");
        query
            .where_nested(Boolean::And, &mut |q: &mut SqlQuery| -> RefineResult<()> {
                q.where_lower("name", Operator::Like, "%a%".to_string(), Boolean::And);
                q.where_lower("sku", Operator::Like, "%a%".to_string(), Boolean::Or);
                Ok(())
            })
            .unwrap();
        query.where_compare("stock", Operator::Gt, json!(0), Boolean::And);

        assert_eq!(
            query.where_sql().sql,
            "(LOWER(name) LIKE ? OR LOWER(sku) LIKE ?) AND stock > ?"
        );
    }

    #[test]
    fn test_empty_group_is_dropped() {
        let mut query = SqlQuery::new("products");
        query
            .where_nested(Boolean::And, &mut |_q: &mut SqlQuery| -> RefineResult<()> { Ok(()) })
            .unwrap();
        assert!(!query.has_conditions());
    }

    #[test]
    fn test_in_lists() {
        let mut query = SqlQuery::new("products");
        query.where_in("id", vec![json!(1), json!(2)], Boolean::And);
        query.where_not_in("id", vec![], Boolean::And);
        let sql = query.where_sql();
        assert_eq!(sql.sql, "id IN (?, ?) AND 1 = 1");
        assert_eq!(sql.params.len(), 2);
    }

    #[test]
    fn test_where_has() {
        let mut query = SqlQuery::new("posts");
        query
            .where_has(
                "comments",
                Some(&mut |q: &mut SqlQuery| -> RefineResult<()> {
                    q.where_compare("votes", Operator::Gt, json!(5), Boolean::And);
                    Ok(())
                }),
                false,
                Boolean::And,
            )
            .unwrap();
        assert_eq!(
            query.where_sql().sql,
            "EXISTS (SELECT 1 FROM comments WHERE votes > ?)"
        );
    }
}

//! Filters: typed request values turned into predicates.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use super::{Persistable, Qualifiable, Refiner, RefinerBase};
use super::capabilities::OptionSet;
use crate::builder::QueryBuilder;
use crate::error::RefineResult;
use crate::expression::{Bindings, Expression, ExpressionRegistry};
use crate::request::QueryParams;
use crate::store::StoreKind;
use crate::types::{
    Boolean, Operator, RefinerOption, Rule, ValueKind, is_blank, parse_date, parse_time, stringify,
};

/// How a `like` family operator wraps the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// The value as is.
    Exact,
    /// `%value%` (default).
    #[default]
    Like,
    /// `value%`
    StartsWith,
    /// `%value`
    EndsWith,
}

impl Mode {
    /// Builds the lower-cased pattern for `value`.
    pub fn pattern(&self, value: &str) -> String {
        let value = value.to_lowercase();
        match self {
            Mode::Exact => value,
            Mode::Like => format!("%{}%", value),
            Mode::StartsWith => format!("{}%", value),
            Mode::EndsWith => format!("%{}", value),
        }
    }
}

/// Where a filter's raw value came from.
#[derive(Debug, Clone, PartialEq)]
pub enum Input<'a> {
    /// The request carried the key, possibly empty.
    Request(&'a str),
    /// The request lacked the key; the value was restored from the store.
    Persisted(Value),
    /// Neither the request nor the store had a value.
    Absent,
}

/// A typed request value applied as a predicate.
pub struct Filter<B> {
    base: RefinerBase,
    column: Qualifiable,
    operator: Operator,
    mode: Mode,
    options: OptionSet,
    nullable: bool,
    kind: ValueKind,
    default: Option<Value>,
    rules: Vec<Rule>,
    expression: Option<Expression<B>>,
    raw: Value,
    value: Value,
    active: bool,
}

impl<B> Clone for Filter<B> {
    fn clone(&self) -> Self {
        Self {
            base: self.base.clone(),
            column: self.column,
            operator: self.operator,
            mode: self.mode,
            options: self.options.clone(),
            nullable: self.nullable,
            kind: self.kind,
            default: self.default.clone(),
            rules: self.rules.clone(),
            expression: self.expression.clone(),
            raw: self.raw.clone(),
            value: self.value.clone(),
            active: self.active,
        }
    }
}

impl<B> fmt::Debug for Filter<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filter")
            .field("base", &self.base)
            .field("operator", &self.operator)
            .field("mode", &self.mode)
            .field("options", &self.options)
            .field("nullable", &self.nullable)
            .field("kind", &self.kind)
            .field("default", &self.default)
            .field("rules", &self.rules)
            .field("expression", &self.expression)
            .field("value", &self.value)
            .field("active", &self.active)
            .finish()
    }
}

impl<B> Filter<B> {
    /// Creates an equality filter on `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            base: RefinerBase::new(name),
            column: Qualifiable::new(false),
            operator: Operator::Eq,
            mode: Mode::default(),
            options: OptionSet::default(),
            nullable: false,
            kind: ValueKind::default(),
            default: None,
            rules: Vec::new(),
            expression: None,
            raw: Value::Null,
            value: Value::Null,
            active: false,
        }
    }

    /// Sets the comparison operator.
    pub fn operator(mut self, operator: Operator) -> Self {
        self.operator = operator;
        self
    }

    /// Sets the pattern mode used by `like` operators.
    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the value kind.
    pub fn kind(mut self, kind: ValueKind) -> Self {
        self.kind = kind;
        self
    }

    /// Declares the selectable options.
    pub fn options<I, O>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = O>,
        O: Into<RefinerOption>,
    {
        self.options.options = options.into_iter().map(Into::into).collect();
        self
    }

    /// Overrides option strictness.
    pub fn strict(mut self, strict: bool) -> Self {
        self.options.strict = Some(strict);
        self
    }

    /// Accepts a delimiter separated list of values.
    pub fn multiple(mut self) -> Self {
        self.options.multiple = true;
        self
    }

    /// Turns a present but empty request value into `IS NULL`.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Sets the value used when the request and the store are both silent.
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Adds a validation rule.
    pub fn rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Replaces the default predicate with an expression.
    pub fn expression(mut self, expression: Expression<B>) -> Self {
        self.expression = Some(expression);
        self
    }

    /// Prefixes the column with the builder's table.
    pub fn qualified(mut self) -> Self {
        self.column.set(true);
        self
    }

    /// Returns the resolved value of the last refinement.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Returns the interpreted request value before option narrowing.
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// Returns the options with their active flags.
    pub fn option_list(&self) -> &[RefinerOption] {
        &self.options.options
    }

    /// Returns true if several values may be selected.
    pub fn is_multiple(&self) -> bool {
        self.options.multiple
    }

    /// Returns the declared expression, if any.
    pub fn declared_expression(&self) -> Option<&Expression<B>> {
        self.expression.as_ref()
    }

    fn interpret(&self, input: Input<'_>, delimiter: &str) -> Option<Value> {
        match input {
            Input::Request(raw) if raw.trim().is_empty() => self.nullable.then_some(Value::Null),
            Input::Request(raw) => self.kind.interpret(raw, self.options.multiple, delimiter),
            Input::Persisted(value) => self.restore(&value, delimiter).or_else(|| {
                tracing::debug!(filter = %self.parameter(), %value, "stored value rejected");
                self.default.clone()
            }),
            Input::Absent => self.default.clone(),
        }
    }

    /// Re-interprets a stored value through the declared kind.
    fn restore(&self, value: &Value, delimiter: &str) -> Option<Value> {
        let list = self.options.multiple || self.kind == ValueKind::Array;
        match value {
            Value::Null => self.nullable.then_some(Value::Null),
            Value::Array(items) if list => {
                let raw = items.iter().map(stringify).collect::<Vec<_>>().join(delimiter);
                self.kind.interpret(&raw, true, delimiter)
            }
            Value::Array(_) | Value::Object(_) => None,
            scalar => self.kind.interpret(&stringify(scalar), list, delimiter),
        }
    }

    fn reset(&mut self) {
        self.raw = Value::Null;
        self.value = Value::Null;
        self.active = false;
        self.options.reset();
    }
}

impl<B: QueryBuilder> Filter<B> {
    /// Applies the filter to `builder`.
    ///
    /// Returns true when a predicate was attached. Values that fail coercion,
    /// fail a rule, or narrow to nothing leave the filter inactive.
    pub fn refine(
        &mut self,
        builder: &mut B,
        registry: &ExpressionRegistry<B>,
        input: Input<'_>,
        delimiter: &str,
        default_strict: bool,
    ) -> RefineResult<bool> {
        self.reset();

        let Some(raw) = self.interpret(input, delimiter) else {
            tracing::trace!(filter = %self.parameter(), "no usable value");
            return Ok(false);
        };
        self.raw = raw.clone();

        if raw.is_null() {
            if !self.nullable {
                return Ok(false);
            }
            let column = self.column.column(self.name(), builder);
            builder.where_null(&column, Boolean::And);
            self.active = true;
            return Ok(true);
        }

        if let Some(rule) = self.rules.iter().find(|rule| !rule.check(&raw)) {
            tracing::debug!(filter = %self.parameter(), ?rule, "value rejected by rule");
            return Ok(false);
        }

        let value = if self.options.is_empty() {
            raw
        } else {
            self.options.activate(&raw, default_strict)
        };
        if is_blank(&value) {
            tracing::trace!(filter = %self.parameter(), "value narrowed to nothing");
            return Ok(false);
        }
        self.value = value;

        self.apply(builder, registry)?;
        self.active = true;
        tracing::debug!(filter = %self.parameter(), value = %self.value, "filter applied");
        Ok(true)
    }

    fn apply(&self, builder: &mut B, registry: &ExpressionRegistry<B>) -> RefineResult<()> {
        if let Some(expression) = &self.expression {
            let bindings = Bindings::new()
                .with("value", self.value.clone())
                .with("column", self.name())
                .with("table", builder.table());
            return registry.resolve(builder, expression, &bindings);
        }

        let column = self.column.column(self.name(), builder);
        let value = self.value.clone();

        if self.operator.is_like() {
            let pattern = self.mode.pattern(&stringify(&value));
            builder.where_lower(&column, self.operator, pattern, Boolean::And);
            return Ok(());
        }

        match value {
            Value::Array(values) if self.operator == Operator::NotEq => {
                builder.where_not_in(&column, values, Boolean::And)
            }
            Value::Array(values) => builder.where_in(&column, values, Boolean::And),
            value => match self.kind {
                ValueKind::Date => match parse_date(&stringify(&value)) {
                    Some(date) => builder.where_date(&column, self.operator, date, Boolean::And),
                    None => builder.where_compare(&column, self.operator, value, Boolean::And),
                },
                ValueKind::Time => match parse_time(&stringify(&value)) {
                    Some(time) => builder.where_time(&column, self.operator, time, Boolean::And),
                    None => builder.where_compare(&column, self.operator, value, Boolean::And),
                },
                _ => builder.where_compare(&column, self.operator, value, Boolean::And),
            },
        }
        Ok(())
    }
}

impl<B> Refiner for Filter<B> {
    fn base(&self) -> &RefinerBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut RefinerBase {
        &mut self.base
    }

    fn default_type(&self) -> &'static str {
        if self.options.is_empty() {
            "filter"
        } else {
            "select"
        }
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn extend_json(&self, out: &mut Map<String, Value>) {
        out.insert("value".to_string(), self.value.clone());
        out.insert("options".to_string(), json!(self.options.options));
        out.insert("multiple".to_string(), json!(self.options.multiple));
    }
}

/// The filters of a refinement.
pub struct Filters<B> {
    items: Vec<Filter<B>>,
    strict: Option<bool>,
    delimiter: Option<String>,
    persist: Persistable,
}

impl<B> Default for Filters<B> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            strict: None,
            delimiter: None,
            persist: Persistable::default(),
        }
    }
}

impl<B> fmt::Debug for Filters<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filters")
            .field("items", &self.items)
            .field("strict", &self.strict)
            .field("delimiter", &self.delimiter)
            .field("persist", &self.persist)
            .finish()
    }
}

impl<B> Filters<B> {
    /// Creates an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a filter.
    pub fn with(mut self, filter: Filter<B>) -> Self {
        self.items.push(filter);
        self
    }

    /// Sets the default option strictness for every filter.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = Some(strict);
        self
    }

    /// Sets the list delimiter.
    pub fn delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = Some(delimiter.into());
        self
    }

    /// Persists selections in a store of `kind`.
    pub fn persist(mut self, kind: StoreKind) -> Self {
        self.persist.kind = Some(kind);
        self
    }

    /// Persists selections under an explicit store key.
    pub fn persist_as(mut self, kind: StoreKind, key: impl Into<String>) -> Self {
        self.persist = Persistable {
            kind: Some(kind),
            key: Some(key.into()),
        };
        self
    }

    /// Returns the persistence settings.
    pub fn persistence(&self) -> &Persistable {
        &self.persist
    }

    /// Returns the strictness override.
    pub fn strictness(&self) -> Option<bool> {
        self.strict
    }

    /// Returns the delimiter override.
    pub fn delimiter_override(&self) -> Option<&str> {
        self.delimiter.as_deref()
    }

    /// Returns a filter by request key.
    pub fn get(&self, parameter: &str) -> Option<&Filter<B>> {
        self.items.iter().find(|f| f.parameter() == parameter)
    }

    /// Iterates the filters.
    pub fn iter(&self) -> impl Iterator<Item = &Filter<B>> {
        self.items.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Filter<B>> {
        self.items.iter_mut()
    }

    /// Iterates the filters that applied.
    pub fn active(&self) -> impl Iterator<Item = &Filter<B>> {
        self.items.iter().filter(|f| f.is_active())
    }

    /// Returns the number of filters.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if there are no filters.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Drops filters that are not visible for `params`.
    pub fn freeze(&mut self, params: &QueryParams) {
        self.items.retain(|f| f.base().is_visible(params));
    }

    /// Serializes every filter.
    pub fn to_json(&self) -> Value {
        Value::Array(self.items.iter().map(Refiner::to_json).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::{SqlParam, SqlQuery};
    use serde_json::json;

    fn refine(filter: &mut Filter<SqlQuery>, input: Input<'_>) -> (bool, SqlQuery) {
        let mut query = SqlQuery::new("products");
        let registry = ExpressionRegistry::standard();
        let active = filter.refine(&mut query, &registry, input, ",", false).unwrap();
        (active, query)
    }

    #[test]
    fn test_scalar_without_options() {
        let mut filter = Filter::new("price").kind(ValueKind::Integer);
        let (active, query) = refine(&mut filter, Input::Request("42"));
        assert!(active);
        assert_eq!(filter.value(), &json!(42));
        let sql = query.where_sql();
        assert_eq!(sql.sql, "price = ?");
        assert_eq!(sql.params, vec![SqlParam::Integer(42)]);
    }

    #[test]
    fn test_strict_options() {
        let mut filter = Filter::new("price")
            .operator(Operator::Gte)
            .kind(ValueKind::Integer)
            .options([10, 20, 50, 100].map(RefinerOption::from_value))
            .strict(true);

        let (active, query) = refine(&mut filter, Input::Request("100"));
        assert!(active);
        assert_eq!(query.where_sql().sql, "price >= ?");
        assert!(filter.option_list()[3].active);

        let (active, query) = refine(&mut filter, Input::Request("999"));
        assert!(!active);
        assert!(!query.has_conditions());
        assert!(filter.option_list().iter().all(|o| !o.active));
    }

    #[test]
    fn test_strict_multiple_narrows() {
        let mut filter = Filter::new("price")
            .kind(ValueKind::Integer)
            .options([10, 20, 50, 100].map(RefinerOption::from_value))
            .strict(true)
            .multiple();

        let (active, query) = refine(&mut filter, Input::Request("20,100,999"));
        assert!(active);
        assert_eq!(filter.raw(), &json!([20, 100, 999]));
        assert_eq!(filter.value(), &json!([20, 100]));
        assert_eq!(query.where_sql().sql, "price IN (?, ?)");
    }

    #[test]
    fn test_lax_keeps_unknown_values() {
        let mut filter = Filter::new("status").options(["open", "closed"].map(RefinerOption::from_value));
        let (active, _) = refine(&mut filter, Input::Request("archived"));
        assert!(active);
        assert_eq!(filter.value(), &json!("archived"));
    }

    #[test]
    fn test_like_modes() {
        let mut filter = Filter::new("name").operator(Operator::Like).mode(Mode::StartsWith);
        let (_, query) = refine(&mut filter, Input::Request("Foo"));
        let sql = query.where_sql();
        assert_eq!(sql.sql, "LOWER(name) LIKE ?");
        assert_eq!(sql.params, vec![SqlParam::string("foo%")]);

        assert_eq!(Mode::Like.pattern("A"), "%a%");
        assert_eq!(Mode::EndsWith.pattern("A"), "%a");
        assert_eq!(Mode::Exact.pattern("A"), "a");
    }

    #[test]
    fn test_coercion_failure_is_inactive() {
        let mut filter = Filter::new("price").kind(ValueKind::Integer).multiple();
        let (active, query) = refine(&mut filter, Input::Request("1,x"));
        assert!(!active);
        assert!(!query.has_conditions());
    }

    #[test]
    fn test_rules() {
        let mut filter = Filter::new("price")
            .kind(ValueKind::Integer)
            .rule(Rule::Min(1.0))
            .rule(Rule::Max(500.0));
        assert!(refine(&mut filter, Input::Request("20")).0);
        assert!(!refine(&mut filter, Input::Request("0")).0);
        assert!(!refine(&mut filter, Input::Request("501")).0);
    }

    #[test]
    fn test_default_and_clear() {
        let mut filter = Filter::new("status").default_value("open");
        let (active, _) = refine(&mut filter, Input::Absent);
        assert!(active);
        assert_eq!(filter.value(), &json!("open"));

        let (active, _) = refine(&mut filter, Input::Request(""));
        assert!(!active);
    }

    #[test]
    fn test_nullable_empty_value() {
        let mut filter = Filter::new("deleted_at").nullable();
        let (active, query) = refine(&mut filter, Input::Request(""));
        assert!(active);
        assert_eq!(query.where_sql().sql, "deleted_at IS NULL");
    }

    #[test]
    fn test_persisted_value() {
        let mut filter = Filter::new("price").kind(ValueKind::Integer);
        let (active, query) = refine(&mut filter, Input::Persisted(json!(100)));
        assert!(active);
        assert_eq!(query.where_sql().params, vec![SqlParam::Integer(100)]);
    }

    #[test]
    fn test_date_and_not_in() {
        let mut filter = Filter::new("created_at").kind(ValueKind::Date).operator(Operator::Gte);
        let (_, query) = refine(&mut filter, Input::Request("2024-03-01"));
        assert_eq!(query.where_sql().sql, "DATE(created_at) >= ?");

        let mut filter = Filter::new("id")
            .kind(ValueKind::Integer)
            .operator(Operator::NotEq)
            .multiple();
        let (_, query) = refine(&mut filter, Input::Request("1,2"));
        assert_eq!(query.where_sql().sql, "id NOT IN (?, ?)");
    }

    #[test]
    fn test_time_comparison() {
        let mut filter = Filter::new("opens_at").kind(ValueKind::Time).operator(Operator::Lte);
        let (active, query) = refine(&mut filter, Input::Request("09:30"));
        assert!(active);
        let sql = query.where_sql();
        assert_eq!(sql.sql, "TIME(opens_at) <= ?");
        assert_eq!(sql.params, vec![SqlParam::string("09:30:00")]);
    }

    #[test]
    fn test_negated_multiple_uses_not_in() {
        let mut filter = Filter::new("status").operator(Operator::NotEq).multiple();
        let (active, query) = refine(&mut filter, Input::Request("closed,archived"));
        assert!(active);
        let sql = query.where_sql();
        assert_eq!(sql.sql, "status NOT IN (?, ?)");
        assert_eq!(
            sql.params,
            vec![SqlParam::string("closed"), SqlParam::string("archived")]
        );
    }

    #[test]
    fn test_ilike_operators() {
        let mut filter = Filter::new("name").operator(Operator::ILike);
        let (_, query) = refine(&mut filter, Input::Request("Foo"));
        let sql = query.where_sql();
        assert_eq!(sql.sql, "LOWER(name) ILIKE ?");
        assert_eq!(sql.params, vec![SqlParam::string("%foo%")]);

        let mut filter = Filter::new("name").operator(Operator::NotILike).mode(Mode::EndsWith);
        let (_, query) = refine(&mut filter, Input::Request("Bar"));
        let sql = query.where_sql();
        assert_eq!(sql.sql, "LOWER(name) NOT ILIKE ?");
        assert_eq!(sql.params, vec![SqlParam::string("%bar")]);
    }

    #[test]
    fn test_persisted_value_is_coerced() {
        let mut filter = Filter::new("price").operator(Operator::Gte).kind(ValueKind::Integer);
        let (active, query) = refine(&mut filter, Input::Persisted(json!("abc")));
        assert!(!active);
        assert!(!query.has_conditions());

        let (active, query) = refine(&mut filter, Input::Persisted(json!("20")));
        assert!(active);
        assert_eq!(query.where_sql().params, vec![SqlParam::Integer(20)]);

        let mut filter = Filter::new("price").kind(ValueKind::Integer).default_value(10);
        let (active, _) = refine(&mut filter, Input::Persisted(json!({"min": 1})));
        assert!(active);
        assert_eq!(filter.value(), &json!(10));
    }

    #[test]
    fn test_persisted_list_is_coerced() {
        let mut filter = Filter::new("id").kind(ValueKind::Integer).multiple();
        let (_, query) = refine(&mut filter, Input::Persisted(json!([1, "2"])));
        assert_eq!(
            query.where_sql().params,
            vec![SqlParam::Integer(1), SqlParam::Integer(2)]
        );

        let (active, _) = refine(&mut filter, Input::Persisted(json!([1, "x"])));
        assert!(!active);
    }

    #[test]
    fn test_expression_bindings() {
        let mut filter = Filter::new("rating")
            .kind(ValueKind::Integer)
            .expression(Expression::declare("whereRelation", ["reviews", ":column", ">=", ":value"]).unwrap());
        let (active, query) = refine(&mut filter, Input::Request("4"));
        assert!(active);
        let sql = query.where_sql();
        assert_eq!(sql.sql, "EXISTS (SELECT 1 FROM reviews WHERE rating >= ?)");
        assert_eq!(sql.params, vec![SqlParam::Integer(4)]);
    }

    #[test]
    fn test_to_json() {
        let mut filter = Filter::new("status")
            .options([RefinerOption::new("open", "Open")])
            .strict(true)
            .meta("icon", "flag");
        refine(&mut filter, Input::Request("open"));
        assert_eq!(
            filter.to_json(),
            json!({
                "name": "status",
                "label": "Status",
                "type": "select",
                "active": true,
                "meta": {"icon": "flag"},
                "value": "open",
                "options": [{"value": "open", "label": "Open", "active": true}],
                "multiple": false
            })
        );
    }
}

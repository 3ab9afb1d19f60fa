//! Verb registry and expression dispatch.
//!
//! The registry maps each verb a declarative expression may name to a
//! [`Handler`] that turns a resolved [`Call`] into [`QueryBuilder`] calls.
//! Verbs are looked up before anything touches the builder, so an unknown
//! verb never leaves a half-mutated query behind.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use super::{Bindings, Declaration, Expression, Term};
use crate::builder::{Constraint, QueryBuilder};
use crate::error::{ConfigError, ExpressionError, RefineError, RefineResult};
use crate::types::{Boolean, Direction, Operator, parse_date, parse_time, stringify};

/// A resolved builder call, after binding substitution and shape dispatch.
pub enum Call<'a, B> {
    /// `verb(reference)`
    Reference {
        /// Substituted reference.
        reference: String,
    },
    /// `verb(reference, callback)`
    Nested {
        /// Substituted reference.
        reference: String,
        /// The callback, already bound.
        constraint: Constraint<'a, B>,
    },
    /// `verb(reference, operator, value)`
    Compare {
        /// Substituted reference.
        reference: String,
        /// Comparison operator.
        operator: Operator,
        /// Substituted value, null when omitted.
        value: Value,
    },
    /// `verb(reference, column, operator, value)`
    Relation {
        /// Substituted reference.
        reference: String,
        /// Column inside the relation.
        column: Value,
        /// Comparison operator.
        operator: Operator,
        /// Substituted value.
        value: Value,
    },
    /// `verb(reference, value)`
    Value {
        /// Substituted reference.
        reference: String,
        /// The operator slot, read as a value.
        value: Value,
    },
}

impl<B> Call<'_, B> {
    /// Names the call shape for diagnostics.
    pub fn shape(&self) -> &'static str {
        match self {
            Call::Reference { .. } => "reference",
            Call::Nested { .. } => "nested",
            Call::Compare { .. } => "comparison",
            Call::Relation { .. } => "relation",
            Call::Value { .. } => "value",
        }
    }

    /// The substituted reference.
    pub fn reference(&self) -> &str {
        match self {
            Call::Reference { reference }
            | Call::Nested { reference, .. }
            | Call::Compare { reference, .. }
            | Call::Relation { reference, .. }
            | Call::Value { reference, .. } => reference,
        }
    }
}

impl<B> fmt::Debug for Call<'_, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Call")
            .field("shape", &self.shape())
            .field("reference", &self.reference())
            .finish()
    }
}

/// Turns a resolved call into builder operations.
pub type Handler<B> = Arc<dyn Fn(&mut B, Call<'_, B>) -> RefineResult<()>>;

/// Registry of the verbs declarative expressions may use.
pub struct ExpressionRegistry<B> {
    handlers: HashMap<String, Handler<B>>,
}

impl<B> Clone for ExpressionRegistry<B> {
    fn clone(&self) -> Self {
        Self {
            handlers: self.handlers.clone(),
        }
    }
}

impl<B> fmt::Debug for ExpressionRegistry<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut verbs: Vec<_> = self.handlers.keys().collect();
        verbs.sort();
        f.debug_struct("ExpressionRegistry")
            .field("verbs", &verbs)
            .finish()
    }
}

impl<B: QueryBuilder> Default for ExpressionRegistry<B> {
    fn default() -> Self {
        Self::standard()
    }
}

impl<B: QueryBuilder> ExpressionRegistry<B> {
    /// Creates a registry with no verbs.
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Creates a registry with the standard `where*` and `orderBy*` verbs.
    pub fn standard() -> Self {
        let mut registry = Self::empty();

        for (verb, boolean) in [("where", Boolean::And), ("orWhere", Boolean::Or)] {
            registry.register(verb, move |b: &mut B, call: Call<'_, B>| compare(b, call, verb, boolean));
        }
        for (verb, boolean, negate) in [
            ("whereIn", Boolean::And, false),
            ("orWhereIn", Boolean::Or, false),
            ("whereNotIn", Boolean::And, true),
            ("orWhereNotIn", Boolean::Or, true),
        ] {
            registry.register(verb, move |b: &mut B, call: Call<'_, B>| {
                within(b, call, verb, negate, boolean)
            });
        }
        for (verb, boolean, negate) in [
            ("whereNull", Boolean::And, false),
            ("orWhereNull", Boolean::Or, false),
            ("whereNotNull", Boolean::And, true),
            ("orWhereNotNull", Boolean::Or, true),
        ] {
            registry.register(verb, move |b: &mut B, call: Call<'_, B>| {
                null(b, call, verb, negate, boolean)
            });
        }
        for (verb, boolean) in [("whereDate", Boolean::And), ("orWhereDate", Boolean::Or)] {
            registry.register(verb, move |b: &mut B, call: Call<'_, B>| date(b, call, verb, boolean));
        }
        for (verb, boolean) in [("whereTime", Boolean::And), ("orWhereTime", Boolean::Or)] {
            registry.register(verb, move |b: &mut B, call: Call<'_, B>| time(b, call, verb, boolean));
        }
        for (verb, boolean) in [("whereColumn", Boolean::And), ("orWhereColumn", Boolean::Or)] {
            registry.register(verb, move |b: &mut B, call: Call<'_, B>| column(b, call, verb, boolean));
        }
        for (verb, boolean) in [("whereLike", Boolean::And), ("orWhereLike", Boolean::Or)] {
            registry.register(verb, move |b: &mut B, call: Call<'_, B>| like(b, call, verb, boolean));
        }
        for (verb, boolean, negate) in [
            ("whereHas", Boolean::And, false),
            ("orWhereHas", Boolean::Or, false),
            ("whereDoesntHave", Boolean::And, true),
            ("orWhereDoesntHave", Boolean::Or, true),
        ] {
            registry.register(verb, move |b: &mut B, call: Call<'_, B>| {
                has(b, call, verb, negate, boolean)
            });
        }
        for (verb, boolean) in [("whereRelation", Boolean::And), ("orWhereRelation", Boolean::Or)] {
            registry.register(verb, move |b: &mut B, call: Call<'_, B>| relation(b, call, verb, boolean));
        }
        registry.register("orderBy", |b: &mut B, call: Call<'_, B>| order(b, call, "orderBy", None));
        registry.register("orderByDesc", |b: &mut B, call: Call<'_, B>| {
            order(b, call, "orderByDesc", Some(Direction::Desc))
        });

        registry
    }

    /// Registers or replaces a verb.
    pub fn register(
        &mut self,
        verb: impl Into<String>,
        handler: impl Fn(&mut B, Call<'_, B>) -> RefineResult<()> + 'static,
    ) -> &mut Self {
        self.handlers.insert(verb.into(), Arc::new(handler));
        self
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(
        mut self,
        verb: impl Into<String>,
        handler: impl Fn(&mut B, Call<'_, B>) -> RefineResult<()> + 'static,
    ) -> Self {
        self.register(verb, handler);
        self
    }

    /// Returns true if `verb` is registered.
    pub fn contains(&self, verb: &str) -> bool {
        self.handlers.contains_key(verb)
    }

    /// Checks that an expression only names registered verbs.
    pub fn validate(&self, expression: &Expression<B>) -> Result<(), ConfigError> {
        match expression {
            Expression::Function(_) => Ok(()),
            Expression::Declarative(declaration) if self.contains(declaration.verb()) => Ok(()),
            Expression::Declarative(declaration) => Err(ConfigError::UnknownVerb {
                verb: declaration.verb().to_string(),
            }),
        }
    }

    /// Applies an expression to the builder.
    pub fn resolve(
        &self,
        builder: &mut B,
        expression: &Expression<B>,
        bindings: &Bindings,
    ) -> RefineResult<()> {
        match expression {
            Expression::Function(f) => f(builder, bindings),
            Expression::Declarative(declaration) => self.dispatch(builder, declaration, bindings),
        }
    }

    fn dispatch(
        &self,
        builder: &mut B,
        declaration: &Declaration<B>,
        bindings: &Bindings,
    ) -> RefineResult<()> {
        let handler = self
            .handlers
            .get(declaration.verb())
            .ok_or_else(|| ConfigError::UnknownVerb {
                verb: declaration.verb().to_string(),
            })?;

        let verb = declaration.verb();
        let reference = bindings.substitute_str(declaration.reference());
        let literal = |term: Option<&Term<B>>, argument: &'static str| -> RefineResult<Value> {
            match term {
                None => Ok(Value::Null),
                Some(Term::Value(value)) => Ok(bindings.substitute(value)),
                Some(Term::Callback(_)) => Err(ExpressionError::InvalidArgument {
                    verb: verb.to_string(),
                    argument,
                    expected: "a value",
                }
                .into()),
            }
        };

        let call = match declaration.operator() {
            None => Call::Reference { reference },
            Some(Term::Callback(callback)) => {
                let callback = Arc::clone(callback);
                let mut bound = move |nested: &mut B| -> RefineResult<()> { callback(nested, bindings) };
                tracing::trace!(verb, reference = %reference, shape = "nested", "dispatching expression");
                return handler(
                    builder,
                    Call::Nested {
                        reference,
                        constraint: &mut bound,
                    },
                );
            }
            // The shape is fixed by the declared terms; bound request data
            // never turns a slot into an operator.
            Some(Term::Value(slot)) => {
                let declared_value = match declaration.value() {
                    Some(Term::Value(value)) => comparison(value),
                    _ => None,
                };
                match (comparison(slot), declared_value) {
                    (Some(operator), _) => Call::Compare {
                        reference,
                        operator,
                        value: literal(declaration.value(), "value")?,
                    },
                    (None, Some(operator)) if declaration.arity() == 5 => Call::Relation {
                        reference,
                        column: bindings.substitute(slot),
                        operator,
                        value: literal(declaration.optional(), "optional")?,
                    },
                    _ => Call::Value {
                        reference,
                        value: bindings.substitute(slot),
                    },
                }
            }
        };

        tracing::trace!(verb, reference = %call.reference(), shape = call.shape(), "dispatching expression");
        handler(builder, call)
    }
}

fn comparison(value: &Value) -> Option<Operator> {
    value.as_str().and_then(Operator::parse)
}

fn unsupported<B>(verb: &str, call: &Call<'_, B>) -> RefineResult<()> {
    Err(ExpressionError::UnsupportedShape {
        verb: verb.to_string(),
        shape: call.shape(),
    }
    .into())
}

fn invalid(verb: &str, argument: &'static str, expected: &'static str) -> RefineError {
    ExpressionError::InvalidArgument {
        verb: verb.to_string(),
        argument,
        expected,
    }
    .into()
}

fn list(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        other => vec![other],
    }
}

fn compare<B: QueryBuilder>(b: &mut B, call: Call<'_, B>, verb: &str, boolean: Boolean) -> RefineResult<()> {
    match call {
        Call::Compare {
            reference,
            operator,
            value,
        } => {
            b.where_compare(&reference, operator, value, boolean);
            Ok(())
        }
        Call::Value { reference, value } => {
            match value {
                Value::Null => b.where_null(&reference, boolean),
                Value::Array(items) => b.where_in(&reference, items, boolean),
                value => b.where_compare(&reference, Operator::Eq, value, boolean),
            }
            Ok(())
        }
        other => unsupported(verb, &other),
    }
}

fn within<B: QueryBuilder>(
    b: &mut B,
    call: Call<'_, B>,
    verb: &str,
    negate: bool,
    boolean: Boolean,
) -> RefineResult<()> {
    match call {
        Call::Value { reference, value } => {
            if negate {
                b.where_not_in(&reference, list(value), boolean);
            } else {
                b.where_in(&reference, list(value), boolean);
            }
            Ok(())
        }
        other => unsupported(verb, &other),
    }
}

fn null<B: QueryBuilder>(
    b: &mut B,
    call: Call<'_, B>,
    verb: &str,
    negate: bool,
    boolean: Boolean,
) -> RefineResult<()> {
    match call {
        Call::Reference { reference } => {
            if negate {
                b.where_not_null(&reference, boolean);
            } else {
                b.where_null(&reference, boolean);
            }
            Ok(())
        }
        other => unsupported(verb, &other),
    }
}

fn split_comparison<B>(call: Call<'_, B>) -> Result<(String, Operator, Value), Call<'_, B>> {
    match call {
        Call::Compare {
            reference,
            operator,
            value,
        } => Ok((reference, operator, value)),
        Call::Value { reference, value } => Ok((reference, Operator::Eq, value)),
        other => Err(other),
    }
}

fn date<B: QueryBuilder>(b: &mut B, call: Call<'_, B>, verb: &str, boolean: Boolean) -> RefineResult<()> {
    let (reference, operator, value) = match split_comparison(call) {
        Ok(parts) => parts,
        Err(other) => return unsupported(verb, &other),
    };
    let date = parse_date(&stringify(&value)).ok_or_else(|| invalid(verb, "value", "a date"))?;
    b.where_date(&reference, operator, date, boolean);
    Ok(())
}

fn time<B: QueryBuilder>(b: &mut B, call: Call<'_, B>, verb: &str, boolean: Boolean) -> RefineResult<()> {
    let (reference, operator, value) = match split_comparison(call) {
        Ok(parts) => parts,
        Err(other) => return unsupported(verb, &other),
    };
    let time = parse_time(&stringify(&value)).ok_or_else(|| invalid(verb, "value", "a time"))?;
    b.where_time(&reference, operator, time, boolean);
    Ok(())
}

fn column<B: QueryBuilder>(b: &mut B, call: Call<'_, B>, verb: &str, boolean: Boolean) -> RefineResult<()> {
    let (reference, operator, value) = match split_comparison(call) {
        Ok(parts) => parts,
        Err(other) => return unsupported(verb, &other),
    };
    let second = value
        .as_str()
        .ok_or_else(|| invalid(verb, "value", "a column name"))?;
    b.where_column(&reference, operator, second, boolean)
}

fn like<B: QueryBuilder>(b: &mut B, call: Call<'_, B>, verb: &str, boolean: Boolean) -> RefineResult<()> {
    match call {
        Call::Value { reference, value } => {
            b.where_lower(&reference, Operator::Like, stringify(&value).to_lowercase(), boolean);
            Ok(())
        }
        other => unsupported(verb, &other),
    }
}

fn has<B: QueryBuilder>(
    b: &mut B,
    call: Call<'_, B>,
    verb: &str,
    negate: bool,
    boolean: Boolean,
) -> RefineResult<()> {
    match call {
        Call::Reference { reference } => b.where_has(&reference, None, negate, boolean),
        Call::Nested {
            reference,
            constraint,
        } => b.where_has(&reference, Some(constraint), negate, boolean),
        other => unsupported(verb, &other),
    }
}

fn relation<B: QueryBuilder>(b: &mut B, call: Call<'_, B>, verb: &str, boolean: Boolean) -> RefineResult<()> {
    match call {
        Call::Relation {
            reference,
            column,
            operator,
            value,
        } => {
            let column = column
                .as_str()
                .ok_or_else(|| invalid(verb, "column", "a column name"))?
                .to_string();
            let mut constraint = move |nested: &mut B| -> RefineResult<()> {
                nested.where_compare(&column, operator, value.clone(), Boolean::And);
                Ok(())
            };
            b.where_has(&reference, Some(&mut constraint), false, boolean)
        }
        other => unsupported(verb, &other),
    }
}

fn order<B: QueryBuilder>(
    b: &mut B,
    call: Call<'_, B>,
    verb: &str,
    fixed: Option<Direction>,
) -> RefineResult<()> {
    match (call, fixed) {
        (Call::Reference { reference }, fixed) => {
            b.order_by(&reference, fixed.unwrap_or_default());
            Ok(())
        }
        (Call::Value { reference, value }, None) => {
            let direction = Direction::parse(&stringify(&value))
                .ok_or_else(|| invalid(verb, "direction", "asc or desc"))?;
            b.order_by(&reference, direction);
            Ok(())
        }
        (other, _) => unsupported(verb, &other),
    }
}

//! Query expressions.
//!
//! An [`Expression`] tells a filter or sort *which* builder call to make
//! instead of the default predicate. It is either a closure receiving the
//! builder and the [`Bindings`], or a declarative tuple
//! `(verb, reference, operator?, value?, optional?)` dispatched through an
//! [`ExpressionRegistry`].
//!
//! ```
//! use helios_refine::expression::{Expression, Term};
//! use helios_refine::sql::SqlQuery;
//!
//! // whereHas('tags', ...) style relation check
//! let expr: Expression<SqlQuery> = Expression::declare("whereHas", ["tags"]).unwrap();
//! assert_eq!(expr.arity(), Some(2));
//!
//! // where(':column', '>=', ':value')
//! let expr: Expression<SqlQuery> =
//!     Expression::declare("where", [":column", ">=", ":value"]).unwrap();
//! assert_eq!(expr.verb(), Some("where"));
//!
//! // a tuple without a reference is a configuration error
//! assert!(Expression::<SqlQuery>::declare("whereNull", Vec::<Term<SqlQuery>>::new()).is_err());
//! ```

mod bindings;
mod registry;

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{ConfigError, RefineResult};
use crate::types::stringify;

pub use bindings::Bindings;
pub use registry::{Call, ExpressionRegistry, Handler};

/// A closure expression.
pub type ExpressionFn<B> = Arc<dyn Fn(&mut B, &Bindings) -> RefineResult<()>>;

/// One element of a declarative expression.
pub enum Term<B> {
    /// A literal, possibly containing `:name` tokens.
    Value(Value),
    /// A callback configuring a nested builder.
    Callback(ExpressionFn<B>),
}

impl<B> Term<B> {
    /// Creates a callback term.
    pub fn callback(f: impl Fn(&mut B, &Bindings) -> RefineResult<()> + 'static) -> Self {
        Term::Callback(Arc::new(f))
    }
}

impl<B> Clone for Term<B> {
    fn clone(&self) -> Self {
        match self {
            Term::Value(value) => Term::Value(value.clone()),
            Term::Callback(f) => Term::Callback(Arc::clone(f)),
        }
    }
}

impl<B> fmt::Debug for Term<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Value(value) => write!(f, "Value({})", value),
            Term::Callback(_) => write!(f, "Callback(..)"),
        }
    }
}

impl<B> From<Value> for Term<B> {
    fn from(value: Value) -> Self {
        Term::Value(value)
    }
}

impl<B> From<&str> for Term<B> {
    fn from(value: &str) -> Self {
        Term::Value(Value::String(value.to_string()))
    }
}

impl<B> From<String> for Term<B> {
    fn from(value: String) -> Self {
        Term::Value(Value::String(value))
    }
}

impl<B> From<i64> for Term<B> {
    fn from(value: i64) -> Self {
        Term::Value(Value::from(value))
    }
}

impl<B> From<i32> for Term<B> {
    fn from(value: i32) -> Self {
        Term::Value(Value::from(value))
    }
}

impl<B> From<f64> for Term<B> {
    fn from(value: f64) -> Self {
        Term::Value(Value::from(value))
    }
}

impl<B> From<bool> for Term<B> {
    fn from(value: bool) -> Self {
        Term::Value(Value::Bool(value))
    }
}

/// A declarative `(verb, reference, operator?, value?, optional?)` tuple.
pub struct Declaration<B> {
    verb: String,
    reference: String,
    operator: Option<Term<B>>,
    value: Option<Term<B>>,
    optional: Option<Term<B>>,
}

impl<B> Declaration<B> {
    /// The builder verb.
    pub fn verb(&self) -> &str {
        &self.verb
    }

    /// The unsubstituted reference.
    pub fn reference(&self) -> &str {
        &self.reference
    }

    /// Number of elements including the verb.
    pub fn arity(&self) -> usize {
        2 + [&self.operator, &self.value, &self.optional]
            .iter()
            .filter(|slot| slot.is_some())
            .count()
    }

    pub(crate) fn operator(&self) -> Option<&Term<B>> {
        self.operator.as_ref()
    }

    pub(crate) fn value(&self) -> Option<&Term<B>> {
        self.value.as_ref()
    }

    pub(crate) fn optional(&self) -> Option<&Term<B>> {
        self.optional.as_ref()
    }
}

impl<B> Clone for Declaration<B> {
    fn clone(&self) -> Self {
        Self {
            verb: self.verb.clone(),
            reference: self.reference.clone(),
            operator: self.operator.clone(),
            value: self.value.clone(),
            optional: self.optional.clone(),
        }
    }
}

impl<B> fmt::Debug for Declaration<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Declaration")
            .field("verb", &self.verb)
            .field("reference", &self.reference)
            .field("operator", &self.operator)
            .field("value", &self.value)
            .field("optional", &self.optional)
            .finish()
    }
}

/// How a refiner mutates the builder when active.
pub enum Expression<B> {
    /// A closure receiving the builder and bindings.
    Function(ExpressionFn<B>),
    /// A tuple dispatched through the registry.
    Declarative(Declaration<B>),
}

impl<B> Expression<B> {
    /// Creates a closure expression.
    pub fn function(f: impl Fn(&mut B, &Bindings) -> RefineResult<()> + 'static) -> Self {
        Expression::Function(Arc::new(f))
    }

    /// Declares a tuple expression.
    ///
    /// `args` holds everything after the verb: the reference first, then up
    /// to three of operator, value and optional. A missing reference or more
    /// than five elements in total is rejected here, at declaration time.
    pub fn declare<I, T>(verb: impl Into<String>, args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<Term<B>>,
    {
        let verb = verb.into();
        let mut args = args.into_iter().map(Into::into).collect::<Vec<Term<B>>>();

        if args.len() > 4 {
            return Err(ConfigError::TooManyArguments {
                arity: args.len() + 1,
                verb,
            });
        }

        let mut rest = args.split_off(1.min(args.len())).into_iter();
        let reference = match args.pop() {
            Some(Term::Value(Value::Null)) | Some(Term::Callback(_)) | None => {
                return Err(ConfigError::MissingReference { verb });
            }
            Some(Term::Value(Value::String(s))) if s.trim().is_empty() => {
                return Err(ConfigError::MissingReference { verb });
            }
            Some(Term::Value(value)) => stringify(&value),
        };

        Ok(Expression::Declarative(Declaration {
            verb,
            reference,
            operator: rest.next(),
            value: rest.next(),
            optional: rest.next(),
        }))
    }

    /// Returns the verb of a declarative expression.
    pub fn verb(&self) -> Option<&str> {
        match self {
            Expression::Function(_) => None,
            Expression::Declarative(declaration) => Some(declaration.verb()),
        }
    }

    /// Returns the arity of a declarative expression.
    pub fn arity(&self) -> Option<usize> {
        match self {
            Expression::Function(_) => None,
            Expression::Declarative(declaration) => Some(declaration.arity()),
        }
    }
}

impl<B> Clone for Expression<B> {
    fn clone(&self) -> Self {
        match self {
            Expression::Function(f) => Expression::Function(Arc::clone(f)),
            Expression::Declarative(declaration) => Expression::Declarative(declaration.clone()),
        }
    }
}

impl<B> fmt::Debug for Expression<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Function(_) => write!(f, "Function(..)"),
            Expression::Declarative(declaration) => declaration.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::SqlQuery;
    use serde_json::json;

    type Expr = Expression<SqlQuery>;

    #[test]
    fn test_declare_arity() {
        assert_eq!(Expr::declare("whereNull", ["deleted_at"]).unwrap().arity(), Some(2));
        assert_eq!(
            Expr::declare("where", [":column", ">=", ":value"]).unwrap().arity(),
            Some(4)
        );
        assert_eq!(Expr::function(|_, _| Ok(())).arity(), None);
    }

    #[test]
    fn test_declare_rejects_missing_reference() {
        let err = Expr::declare("where", Vec::<Term<SqlQuery>>::new()).unwrap_err();
        assert_eq!(
            err,
            ConfigError::MissingReference {
                verb: "where".to_string()
            }
        );

        let err = Expr::declare("where", [json!(null)]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingReference { .. }));

        let err = Expr::declare("where", [""]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingReference { .. }));
    }

    #[test]
    fn test_declare_rejects_too_many() {
        let err = Expr::declare("where", ["a", "b", "c", "d", "e"]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::TooManyArguments {
                verb: "where".to_string(),
                arity: 6
            }
        );
    }

    #[test]
    fn test_declare_keeps_slots() {
        let expr = Expr::declare("whereRelation", ["posts", "votes", ">=", "10"]).unwrap();
        let Expression::Declarative(declaration) = expr else {
            panic!("expected a declaration");
        };
        assert_eq!(declaration.verb(), "whereRelation");
        assert_eq!(declaration.reference(), "posts");
        assert!(matches!(declaration.operator(), Some(Term::Value(v)) if v == "votes"));
        assert!(matches!(declaration.optional(), Some(Term::Value(v)) if v == "10"));
    }

    #[test]
    fn test_numeric_reference_is_stringified() {
        let expr = Expr::declare("where", [json!(1), json!(1)]).unwrap();
        let Expression::Declarative(declaration) = expr else {
            panic!("expected a declaration");
        };
        assert_eq!(declaration.reference(), "1");
    }
}

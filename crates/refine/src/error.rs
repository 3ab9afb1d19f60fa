//! Error types for the refinement engine.
//!
//! Errors are split by who has to act on them: configuration errors are
//! developer mistakes caught before any query mutation, expression errors come
//! out of the verb registry, and store errors come from persistence drivers.
//! Invalid request input is never an error; the affected refiner simply stays
//! inactive.

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use thiserror::Error;

/// The primary error type for refinement operations.
#[derive(Error, Debug)]
pub enum RefineError {
    /// Configuration errors
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Expression dispatch errors
    #[error(transparent)]
    Expression(#[from] ExpressionError),

    /// Persistence errors
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The query builder rejected a call.
    #[error("query builder error: {0}")]
    Builder(String),
}

/// Errors in how refiners, expressions or the pipeline were declared.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A declarative expression was given fewer than two elements.
    #[error("expression '{verb}' is missing a reference")]
    MissingReference { verb: String },

    /// A declarative expression was given more than five elements.
    #[error("expression '{verb}' has {arity} elements, at most 5 are allowed")]
    TooManyArguments { verb: String, arity: usize },

    /// The verb of a declarative expression is not an element of the registry.
    #[error("unknown expression verb '{verb}'")]
    UnknownVerb { verb: String },

    /// The pipeline was started without a query builder.
    #[error("no query builder is bound to the refinement")]
    UnboundBuilder,

    /// A refiner was declared with an empty name.
    #[error("refiner name cannot be empty")]
    EmptyName,

    /// A collection persists to a store kind with no registered driver.
    #[error("no {kind} store driver is registered")]
    MissingStore { kind: String },

    /// The configuration failed validation.
    #[error("invalid configuration: {}", .0.join(", "))]
    Invalid(Vec<String>),
}

/// Errors raised while dispatching an expression to the builder.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExpressionError {
    /// The verb exists but does not accept the resolved call shape.
    #[error("verb '{verb}' does not accept a {shape} call")]
    UnsupportedShape { verb: String, shape: &'static str },

    /// An argument had the wrong type after binding substitution.
    #[error("verb '{verb}' expected {expected} for argument '{argument}'")]
    InvalidArgument {
        verb: String,
        argument: &'static str,
        expected: &'static str,
    },

    /// A callable expression returned an error.
    #[error("expression callback failed: {0}")]
    Callback(String),
}

/// Errors from persistence store drivers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The driver could not read its backing storage.
    #[error("failed to read '{key}': {message}")]
    Read { key: String, message: String },

    /// The driver could not write its backing storage.
    #[error("failed to write '{key}': {message}")]
    Write { key: String, message: String },
}

/// Result type for refinement operations.
pub type RefineResult<T> = Result<T, RefineError>;

/// Result type for store driver operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::MissingReference {
            verb: "where".to_string(),
        };
        assert_eq!(err.to_string(), "expression 'where' is missing a reference");

        let err = ConfigError::Invalid(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(err.to_string(), "invalid configuration: a, b");
    }

    #[test]
    fn test_refine_error_from() {
        let err: RefineError = ConfigError::UnboundBuilder.into();
        assert!(matches!(err, RefineError::Config(ConfigError::UnboundBuilder)));
        assert_eq!(
            err.to_string(),
            "no query builder is bound to the refinement"
        );

        let err: RefineError = StoreError::Write {
            key: "refine_sort".to_string(),
            message: "disk full".to_string(),
        }
        .into();
        assert!(err.to_string().contains("refine_sort"));
    }
}

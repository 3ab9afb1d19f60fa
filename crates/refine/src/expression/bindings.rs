//! Named bindings and `:name` substitution.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;

use crate::types::stringify;

static TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r":([A-Za-z_][A-Za-z0-9_]*)").expect("valid binding token pattern"));

/// Values an expression can refer to as `:name`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bindings {
    values: BTreeMap<String, Value>,
}

impl Bindings {
    /// Creates empty bindings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a binding.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// Returns a binding by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Substitutes binding tokens in a value.
    ///
    /// Only strings are rewritten. A string that is exactly one known token is
    /// replaced by the bound value itself, keeping its type. Known tokens
    /// inside a longer string are replaced by their string form. Unknown
    /// tokens are left as written.
    pub fn substitute(&self, value: &Value) -> Value {
        let Value::String(text) = value else {
            return value.clone();
        };

        if let Some(name) = text.strip_prefix(':') {
            if let Some(bound) = self.values.get(name) {
                return bound.clone();
            }
        }

        let replaced = TOKEN.replace_all(text, |caps: &Captures<'_>| match self.values.get(&caps[1]) {
            Some(bound) => stringify(bound),
            None => caps[0].to_string(),
        });
        Value::String(replaced.into_owned())
    }

    /// Substitutes tokens and returns the result as a string.
    pub fn substitute_str(&self, text: &str) -> String {
        stringify(&self.substitute(&Value::String(text.to_string())))
    }
}

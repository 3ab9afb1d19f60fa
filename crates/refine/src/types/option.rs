//! Filter options and the activation algorithm.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::value::stringify;

/// A selectable value/label pair offered by a filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefinerOption {
    /// The value sent in the request.
    pub value: Value,
    /// Human-readable label.
    pub label: String,
    /// Whether the current request selected this option.
    #[serde(default)]
    pub active: bool,
}

impl RefinerOption {
    /// Creates an option with an explicit label.
    pub fn new(value: impl Into<Value>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
            active: false,
        }
    }

    /// Creates an option labelled by its own value.
    pub fn from_value(value: impl Into<Value>) -> Self {
        let value = value.into();
        let label = stringify(&value);
        Self {
            value,
            label,
            active: false,
        }
    }

    /// Returns true if `raw` selects this option.
    ///
    /// Comparison is strict on both type and value: the integer `20` does
    /// not select an option whose value is the string `"20"`.
    pub fn matches(&self, raw: &Value) -> bool {
        match raw {
            Value::Array(items) => items.contains(&self.value),
            other => *other == self.value,
        }
    }
}

/// How a filter's options narrow its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActivationPolicy {
    /// The first active option's value, or null.
    StrictSingle,
    /// Every active option's value.
    StrictMultiple,
    /// The raw value; options are informational.
    LaxSingle,
    /// The raw list; options are informational.
    LaxMultiple,
}

impl ActivationPolicy {
    /// Resolves the policy from the two filter flags.
    pub fn from_flags(strict: bool, multiple: bool) -> Self {
        match (strict, multiple) {
            (true, true) => ActivationPolicy::StrictMultiple,
            (true, false) => ActivationPolicy::StrictSingle,
            (false, true) => ActivationPolicy::LaxMultiple,
            (false, false) => ActivationPolicy::LaxSingle,
        }
    }

    /// Returns true for the strict variants.
    pub fn is_strict(&self) -> bool {
        matches!(
            self,
            ActivationPolicy::StrictSingle | ActivationPolicy::StrictMultiple
        )
    }

    /// Returns true for the multiple variants.
    pub fn is_multiple(&self) -> bool {
        matches!(
            self,
            ActivationPolicy::StrictMultiple | ActivationPolicy::LaxMultiple
        )
    }

    /// Marks matching options active and returns the resolved value.
    pub fn activate(&self, options: &mut [RefinerOption], raw: &Value) -> Value {
        for option in options.iter_mut() {
            option.active = option.matches(raw);
        }

        match self {
            ActivationPolicy::StrictMultiple => Value::Array(
                options
                    .iter()
                    .filter(|o| o.active)
                    .map(|o| o.value.clone())
                    .collect(),
            ),
            ActivationPolicy::StrictSingle => options
                .iter()
                .find(|o| o.active)
                .map(|o| o.value.clone())
                .unwrap_or(Value::Null),
            ActivationPolicy::LaxSingle | ActivationPolicy::LaxMultiple => raw.clone(),
        }
    }
}

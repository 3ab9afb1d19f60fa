//! Request value interpretation.
//!
//! Raw request values are plain strings. A [`ValueKind`] turns them into typed
//! JSON values, and [`Rule`]s decide whether the typed value is acceptable.
//! Anything that fails either step is treated as "no value" by the caller.

use std::fmt;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

/// Canonical date format for interpreted values.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Canonical time format for interpreted values.
pub const TIME_FORMAT: &str = "%H:%M:%S";

/// The primitive type a filter reads its request value as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    /// `1`, `true`, `on`, `yes` and their negations.
    Boolean,
    /// Signed 64-bit integer.
    Integer,
    /// Finite float.
    Float,
    /// Any string (default).
    #[default]
    String,
    /// Calendar date, `YYYY-MM-DD` (a trailing time is ignored).
    Date,
    /// Time of day, `HH:MM` or `HH:MM:SS`.
    Time,
    /// Delimiter separated list of strings.
    Array,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Boolean => write!(f, "boolean"),
            ValueKind::Integer => write!(f, "integer"),
            ValueKind::Float => write!(f, "float"),
            ValueKind::String => write!(f, "string"),
            ValueKind::Date => write!(f, "date"),
            ValueKind::Time => write!(f, "time"),
            ValueKind::Array => write!(f, "array"),
        }
    }
}

impl ValueKind {
    /// Coerces a single raw token. Returns None when the token is not a valid
    /// instance of this kind.
    pub fn coerce(&self, raw: &str) -> Option<Value> {
        let raw = raw.trim();
        match self {
            ValueKind::Boolean => match raw.to_lowercase().as_str() {
                "1" | "true" | "on" | "yes" => Some(Value::Bool(true)),
                "0" | "false" | "off" | "no" => Some(Value::Bool(false)),
                _ => None,
            },
            ValueKind::Integer => raw.parse::<i64>().ok().map(Value::from),
            ValueKind::Float => raw
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number),
            ValueKind::String | ValueKind::Array => Some(Value::String(raw.to_string())),
            ValueKind::Date => parse_date(raw).map(|d| Value::String(d.format(DATE_FORMAT).to_string())),
            ValueKind::Time => parse_time(raw).map(|t| Value::String(t.format(TIME_FORMAT).to_string())),
        }
    }

    /// Interprets a raw request value.
    ///
    /// When `list` is set, or for [`ValueKind::Array`], the value is split on
    /// `delimiter`, blank parts are skipped and each part is coerced. A single
    /// part that fails coercion rejects the whole value.
    pub fn interpret(&self, raw: &str, list: bool, delimiter: &str) -> Option<Value> {
        if list || *self == ValueKind::Array {
            let element = if *self == ValueKind::Array {
                ValueKind::String
            } else {
                *self
            };
            raw.split(delimiter)
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(|part| element.coerce(part))
                .collect::<Option<Vec<_>>>()
                .map(Value::Array)
        } else {
            self.coerce(raw)
        }
    }
}

/// Parses a date, accepting a trailing time component.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|dt| dt.date())
        })
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .map(|dt| dt.date())
        })
}

/// Parses a time of day with or without seconds.
pub fn parse_time(raw: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(raw, TIME_FORMAT)
        .ok()
        .or_else(|| NaiveTime::parse_from_str(raw, "%H:%M").ok())
}

/// Returns true for null, empty strings and empty lists.
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Renders a value the way it appears inside a larger string.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(stringify).collect::<Vec<_>>().join(","),
        other => other.to_string(),
    }
}

/// A validation rule applied to interpreted filter values.
///
/// List values are valid when every element passes.
#[derive(Clone)]
pub enum Rule {
    /// Numeric lower bound, or minimum length for strings.
    Min(f64),
    /// Numeric upper bound, or maximum length for strings.
    Max(f64),
    /// Strings must match the pattern.
    Pattern(Regex),
    /// Arbitrary predicate.
    Custom(Arc<dyn Fn(&Value) -> bool>),
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::Min(n) => write!(f, "Min({})", n),
            Rule::Max(n) => write!(f, "Max({})", n),
            Rule::Pattern(re) => write!(f, "Pattern({})", re.as_str()),
            Rule::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

impl Rule {
    /// Creates a custom rule from a closure.
    pub fn custom(check: impl Fn(&Value) -> bool + 'static) -> Self {
        Rule::Custom(Arc::new(check))
    }

    /// Returns true if the value passes this rule.
    pub fn check(&self, value: &Value) -> bool {
        if let Value::Array(items) = value {
            return items.iter().all(|item| self.check(item));
        }

        match self {
            Rule::Min(min) => measure(value).is_some_and(|n| n >= *min),
            Rule::Max(max) => measure(value).is_some_and(|n| n <= *max),
            Rule::Pattern(re) => value.as_str().is_some_and(|s| re.is_match(s)),
            Rule::Custom(check) => check(value),
        }
    }
}

fn measure(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => Some(s.chars().count() as f64),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_coerce_scalars() {
        assert_eq!(ValueKind::Integer.coerce(" 42 "), Some(json!(42)));
        assert_eq!(ValueKind::Integer.coerce("4.2"), None);
        assert_eq!(ValueKind::Float.coerce("4.5"), Some(json!(4.5)));
        assert_eq!(ValueKind::Boolean.coerce("on"), Some(json!(true)));
        assert_eq!(ValueKind::Boolean.coerce("maybe"), None);
        assert_eq!(ValueKind::String.coerce("abc"), Some(json!("abc")));
    }

    #[test]
    fn test_coerce_temporal() {
        assert_eq!(ValueKind::Date.coerce("2024-02-29"), Some(json!("2024-02-29")));
        assert_eq!(
            ValueKind::Date.coerce("2024-02-29T10:00:00"),
            Some(json!("2024-02-29"))
        );
        assert_eq!(ValueKind::Date.coerce("2023-02-29"), None);
        assert_eq!(ValueKind::Time.coerce("09:30"), Some(json!("09:30:00")));
        assert_eq!(ValueKind::Time.coerce("25:00"), None);
    }

    #[test]
    fn test_interpret_lists() {
        assert_eq!(
            ValueKind::Integer.interpret("20,100,999", true, ","),
            Some(json!([20, 100, 999]))
        );
        assert_eq!(
            ValueKind::Array.interpret("a| b ||c", false, "|"),
            Some(json!(["a", "b", "c"]))
        );
        assert_eq!(ValueKind::Integer.interpret("1,x", true, ","), None);
    }

    #[test]
    fn test_rules() {
        assert!(Rule::Min(10.0).check(&json!(10)));
        assert!(!Rule::Min(10.0).check(&json!(9)));
        assert!(Rule::Max(3.0).check(&json!("abc")));
        assert!(!Rule::Max(3.0).check(&json!(["ab", "abcd"])));

        let pattern = Rule::Pattern(Regex::new("^[a-z]+$").unwrap());
        assert!(pattern.check(&json!("slug")));
        assert!(!pattern.check(&json!(12)));

        let even = Rule::custom(|v| v.as_i64().is_some_and(|n| n % 2 == 0));
        assert!(even.check(&json!(4)));
        assert!(!even.check(&json!(5)));
    }

    #[test]
    fn test_blank_and_stringify() {
        assert!(is_blank(&json!(null)));
        assert!(is_blank(&json!("  ")));
        assert!(is_blank(&json!([])));
        assert!(!is_blank(&json!(0)));
        assert_eq!(stringify(&json!([1, "a"])), "1,a");
        assert_eq!(stringify(&json!(2.5)), "2.5");
    }
}

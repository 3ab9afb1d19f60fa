//! Request query parameters.
//!
//! [`QueryParams`] is the engine's only view of the incoming request. It can
//! be built from an already parsed map or from a raw query string, and it
//! answers scoped lookups while keeping "absent" and "present but empty"
//! apart: the pipeline falls back to persisted state only for the former.

use std::collections::HashMap;

/// Parsed request query parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    params: HashMap<String, String>,
    form_decoded: bool,
}

impl QueryParams {
    /// Creates empty query parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates query parameters from a map the host extracted itself.
    ///
    /// Values are taken as is; they have not been form-decoded by this type.
    pub fn from_map(params: HashMap<String, String>) -> Self {
        Self {
            params,
            form_decoded: false,
        }
    }

    /// Parses a raw `application/x-www-form-urlencoded` query string.
    ///
    /// A leading `?` is ignored. Repeated keys keep the last value.
    pub fn from_query_string(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        let params = url::form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect();
        Self {
            params,
            form_decoded: true,
        }
    }

    /// Adds or replaces a parameter.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Returns a specific parameter value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Checks if a parameter is present.
    pub fn contains(&self, key: &str) -> bool {
        self.params.contains_key(key)
    }

    /// Returns the value for `key` under an optional scope.
    ///
    /// With a scope, both the nested `scope[key]` form and the flat
    /// `scope_key` form are accepted, nested first.
    pub fn scoped(&self, scope: Option<&str>, key: &str) -> Option<&str> {
        match scope {
            None => self.get(key),
            Some(scope) => self
                .get(&nested_key(scope, key))
                .or_else(|| self.get(&format!("{}_{}", scope, key))),
        }
    }

    /// Returns true if the values came through form decoding, so a `+` has
    /// already become a space and any remaining `+` is literal.
    pub fn is_form_decoded(&self) -> bool {
        self.form_decoded
    }

    /// Returns the number of parameters.
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Returns true if there are no parameters.
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

/// Builds the request key a refiner listens on under an optional scope.
pub fn scoped_key(scope: Option<&str>, key: &str) -> String {
    match scope {
        Some(scope) => nested_key(scope, key),
        None => key.to_string(),
    }
}

fn nested_key(scope: &str, key: &str) -> String {
    format!("{}[{}]", scope, key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_query_string_decodes() {
        let params = QueryParams::from_query_string("?search=foo+bar&price=%3E10&empty=");
        assert_eq!(params.get("search"), Some("foo bar"));
        assert_eq!(params.get("price"), Some(">10"));
        assert_eq!(params.get("empty"), Some(""));
        assert_eq!(params.get("missing"), None);
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn test_form_decoding_flag() {
        let decoded = QueryParams::from_query_string("search=c%2B%2B");
        assert_eq!(decoded.get("search"), Some("c++"));
        assert!(decoded.is_form_decoded());

        let raw = QueryParams::from_map(HashMap::from([("search".to_string(), "a+b".to_string())]));
        assert!(!raw.is_form_decoded());
        assert!(!QueryParams::new().is_form_decoded());
    }

    #[test]
    fn test_scoped_lookup() {
        let params = QueryParams::from_query_string("users%5Bsort%5D=-name&orders_sort=total&sort=id");
        assert_eq!(params.scoped(Some("users"), "sort"), Some("-name"));
        assert_eq!(params.scoped(Some("orders"), "sort"), Some("total"));
        assert_eq!(params.scoped(None, "sort"), Some("id"));
        assert_eq!(params.scoped(Some("items"), "sort"), None);
    }

    #[test]
    fn test_scoped_key() {
        assert_eq!(scoped_key(Some("users"), "sort"), "users[sort]");
        assert_eq!(scoped_key(None, "sort"), "sort");
    }
}

//! Refiners: filters, sorts and searches.
//!
//! A refiner reads one request key, decides whether it applies, and when it
//! does, attaches a predicate or ordering clause to the query builder. Every
//! refiner kind shares the [`RefinerBase`] identity and presentation data and
//! implements the [`Refiner`] contract. The chainable setters on [`Refiner`]
//! configure that shared part:
//!
//! ```
//! use helios_refine::refiners::{Filter, Refiner};
//! use helios_refine::sql::SqlQuery;
//!
//! let filter: Filter<SqlQuery> = Filter::new("category.created_at").meta("group", "dates");
//! assert_eq!(filter.parameter(), "created_at");
//! assert_eq!(filter.label(), "Created at");
//! ```

mod capabilities;
mod filter;
mod search;
mod sort;

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value, json};

use crate::request::{QueryParams, scoped_key};

pub use capabilities::{Aliasable, Directional, OptionSet, Persistable, Qualifiable};
pub use filter::{Filter, Filters, Input, Mode};
pub use search::{Matches, Search, Searches};
pub use sort::{Sort, Sorts};

type Visibility = Arc<dyn Fn(&QueryParams) -> bool>;

/// Identity and presentation data shared by every refiner.
#[derive(Clone)]
pub struct RefinerBase {
    identity: Aliasable,
    label: Option<String>,
    type_tag: Option<String>,
    meta: Map<String, Value>,
    hidden: bool,
    when: Option<Visibility>,
}

impl fmt::Debug for RefinerBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefinerBase")
            .field("identity", &self.identity)
            .field("label", &self.label)
            .field("type_tag", &self.type_tag)
            .field("meta", &self.meta)
            .field("hidden", &self.hidden)
            .field("when", &self.when.as_ref().map(|_| ".."))
            .finish()
    }
}

impl RefinerBase {
    /// Creates the base for a refiner named `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            identity: Aliasable::new(name),
            label: None,
            type_tag: None,
            meta: Map::new(),
            hidden: false,
            when: None,
        }
    }

    /// Returns the declared name.
    pub fn name(&self) -> &str {
        self.identity.name()
    }

    /// Returns the request key.
    pub fn parameter(&self) -> &str {
        self.identity.parameter()
    }

    /// Returns the identity capability.
    pub fn identity(&self) -> &Aliasable {
        &self.identity
    }

    /// Returns the label, defaulting to the humanised parameter.
    pub fn label(&self) -> String {
        self.label
            .clone()
            .unwrap_or_else(|| humanise(self.parameter()))
    }

    /// Returns the explicit type tag, if any.
    pub fn type_tag(&self) -> Option<&str> {
        self.type_tag.as_deref()
    }

    /// Returns the metadata map.
    pub fn meta(&self) -> &Map<String, Value> {
        &self.meta
    }

    /// Returns true if the refiner takes part in a refinement of `params`.
    pub fn is_visible(&self, params: &QueryParams) -> bool {
        !self.hidden && self.when.as_ref().is_none_or(|when| when(params))
    }
}

/// Turns `created_at` into `Created at`.
pub fn humanise(parameter: &str) -> String {
    let spaced = parameter.replace(['_', '-'], " ");
    let mut chars = spaced.trim().chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// The contract shared by every refiner kind.
pub trait Refiner {
    /// Returns the shared identity and presentation data.
    fn base(&self) -> &RefinerBase;

    /// Returns the shared data mutably.
    fn base_mut(&mut self) -> &mut RefinerBase;

    /// Returns the type tag used when none was set explicitly.
    fn default_type(&self) -> &'static str;

    /// Returns true if the refiner applied in the last refinement.
    fn is_active(&self) -> bool;

    /// Adds kind-specific fields to the serialized form.
    fn extend_json(&self, out: &mut Map<String, Value>);

    /// Returns the declared name.
    fn name(&self) -> &str {
        self.base().name()
    }

    /// Returns the request key: the alias, or the last segment of the name.
    fn parameter(&self) -> &str {
        self.base().parameter()
    }

    /// Returns the display label.
    fn label(&self) -> String {
        self.base().label()
    }

    /// Returns the type tag.
    fn type_tag(&self) -> &str {
        self.base().type_tag().unwrap_or(self.default_type())
    }

    /// Returns the request key under an optional scope.
    fn scoped_key(&self, scope: Option<&str>) -> String {
        scoped_key(scope, self.parameter())
    }

    /// Serializes the refiner for client consumption.
    fn to_json(&self) -> Value {
        let mut out = Map::new();
        out.insert("name".to_string(), json!(self.parameter()));
        out.insert("label".to_string(), json!(self.label()));
        out.insert("type".to_string(), json!(self.type_tag()));
        out.insert("active".to_string(), json!(self.is_active()));
        out.insert("meta".to_string(), Value::Object(self.base().meta().clone()));
        self.extend_json(&mut out);
        Value::Object(out)
    }

    /// Sets the request-facing alias.
    fn alias(mut self, alias: impl Into<String>) -> Self
    where
        Self: Sized,
    {
        self.base_mut().identity.set_alias(alias);
        self
    }

    /// Sets the display label.
    fn with_label(mut self, label: impl Into<String>) -> Self
    where
        Self: Sized,
    {
        self.base_mut().label = Some(label.into());
        self
    }

    /// Sets the type tag.
    fn with_type(mut self, type_tag: impl Into<String>) -> Self
    where
        Self: Sized,
    {
        self.base_mut().type_tag = Some(type_tag.into());
        self
    }

    /// Adds a metadata entry.
    fn meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self
    where
        Self: Sized,
    {
        self.base_mut().meta.insert(key.into(), value.into());
        self
    }

    /// Hides the refiner; hidden refiners are dropped before refinement.
    fn hidden(mut self) -> Self
    where
        Self: Sized,
    {
        self.base_mut().hidden = true;
        self
    }

    /// Makes the refiner visible only when `when` holds for the request.
    fn when(mut self, when: impl Fn(&QueryParams) -> bool + 'static) -> Self
    where
        Self: Sized,
    {
        self.base_mut().when = Some(Arc::new(when));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_humanise() {
        assert_eq!(humanise("created_at"), "Created at");
        assert_eq!(humanise("price"), "Price");
        assert_eq!(humanise("sale-price"), "Sale price");
        assert_eq!(humanise(""), "");
    }

    #[test]
    fn test_visibility() {
        let params = QueryParams::new().with("admin", "1");
        let base = RefinerBase::new("name");
        assert!(base.is_visible(&params));

        let mut hidden = RefinerBase::new("name");
        hidden.hidden = true;
        assert!(!hidden.is_visible(&params));

        let mut conditional = RefinerBase::new("name");
        conditional.when = Some(Arc::new(|p: &QueryParams| p.contains("admin")));
        assert!(conditional.is_visible(&params));
        assert!(!conditional.is_visible(&QueryParams::new()));
    }

    #[test]
    fn test_label_override() {
        let mut base = RefinerBase::new("created_at");
        assert_eq!(base.label(), "Created at");
        base.label = Some("Created".to_string());
        assert_eq!(base.label(), "Created");
    }
}

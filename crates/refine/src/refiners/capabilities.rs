//! Capabilities shared by refiner kinds.
//!
//! Each capability is a small struct embedded by the refiners that need it,
//! so the behaviour lives in one place and each refiner only exposes the
//! knobs that apply to it.

use serde_json::Value;

use crate::builder::QueryBuilder;
use crate::store::StoreKind;
use crate::types::{ActivationPolicy, Direction, RefinerOption};

/// A name with an optional request-facing alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aliasable {
    name: String,
    alias: Option<String>,
}

impl Aliasable {
    /// Creates an identity from a possibly dotted name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
        }
    }

    /// Sets the alias.
    pub fn set_alias(&mut self, alias: impl Into<String>) {
        self.alias = Some(alias.into());
    }

    /// Returns the declared name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the alias, if any.
    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    /// Returns the request key: the alias, or the last segment of the name.
    pub fn parameter(&self) -> &str {
        match &self.alias {
            Some(alias) => alias.as_str(),
            None => self.name.rsplit('.').next().unwrap_or(self.name.as_str()),
        }
    }
}

/// Whether a refiner's column is prefixed with the builder's table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Qualifiable {
    qualify: bool,
}

impl Qualifiable {
    /// Creates the capability.
    pub fn new(qualify: bool) -> Self {
        Self { qualify }
    }

    /// Changes the setting.
    pub fn set(&mut self, qualify: bool) {
        self.qualify = qualify;
    }

    /// Returns the column to use for `name` against `builder`.
    pub fn column<B: QueryBuilder>(&self, name: &str, builder: &B) -> String {
        if self.qualify {
            builder.qualify_column(name)
        } else {
            name.to_string()
        }
    }
}

/// Direction state of a sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Directional {
    /// Direction applied in the current pass.
    pub direction: Option<Direction>,
    /// Direction the sort is locked to.
    pub fixed: Option<Direction>,
    /// Toggle descending first.
    pub inverted: bool,
}

impl Directional {
    /// Returns the effective direction: the fixed one, else the applied one.
    pub fn direction(&self) -> Option<Direction> {
        self.fixed.or(self.direction)
    }

    /// Returns true if a request for `requested` may activate the sort.
    pub fn accepts(&self, requested: Option<Direction>) -> bool {
        match (self.fixed, requested) {
            (Some(fixed), Some(requested)) => fixed == requested,
            _ => true,
        }
    }

    /// Resolves the direction to apply for `requested`.
    pub fn resolve(&self, requested: Option<Direction>) -> Direction {
        self.fixed.or(requested).unwrap_or_default()
    }

    /// Returns the direction a toggle moves to from `current`, None meaning
    /// the neutral, unsorted state.
    pub fn next(&self, current: Option<Direction>) -> Option<Direction> {
        if let Some(fixed) = self.fixed {
            return Some(fixed);
        }
        match (self.inverted, current) {
            (false, None) => Some(Direction::Asc),
            (false, Some(Direction::Asc)) => Some(Direction::Desc),
            (false, Some(Direction::Desc)) => None,
            (true, None) => Some(Direction::Desc),
            (true, Some(Direction::Desc)) => Some(Direction::Asc),
            (true, Some(Direction::Asc)) => None,
        }
    }
}

/// The selectable options of a filter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionSet {
    /// Declared options.
    pub options: Vec<RefinerOption>,
    /// Strictness override; None defers to the collection or configuration.
    pub strict: Option<bool>,
    /// Whether several options may be selected.
    pub multiple: bool,
}

impl OptionSet {
    /// Returns true if no options are declared.
    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    /// Resolves the activation policy given the inherited strictness.
    pub fn policy(&self, default_strict: bool) -> ActivationPolicy {
        ActivationPolicy::from_flags(self.strict.unwrap_or(default_strict), self.multiple)
    }

    /// Marks matching options active and returns the narrowed value.
    pub fn activate(&mut self, raw: &Value, default_strict: bool) -> Value {
        let policy = self.policy(default_strict);
        policy.activate(&mut self.options, raw)
    }

    /// Clears every active flag.
    pub fn reset(&mut self) {
        for option in &mut self.options {
            option.active = false;
        }
    }
}

/// Where a refiner collection keeps its selection between requests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Persistable {
    /// Store kind; None disables persistence.
    pub kind: Option<StoreKind>,
    /// Entry key override; defaults to `{prefix}_{scope}_{stage}`.
    pub key: Option<String>,
}

impl Persistable {
    /// Returns true if the collection persists.
    pub fn is_enabled(&self) -> bool {
        self.kind.is_some()
    }

    /// Returns the store key for `stage`.
    pub fn store_key(&self, prefix: &str, scope: Option<&str>, stage: &str) -> String {
        if let Some(key) = &self.key {
            return key.clone();
        }
        match scope {
            Some(scope) => format!("{}_{}_{}", prefix, scope, stage),
            None => format!("{}_{}", prefix, stage),
        }
    }
}

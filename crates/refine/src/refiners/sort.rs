//! Sorts: a name and direction token turned into an ordering clause.

use std::fmt;

use serde_json::{Map, Value, json};

use super::{Directional, Persistable, Qualifiable, Refiner, RefinerBase};
use crate::builder::QueryBuilder;
use crate::error::RefineResult;
use crate::expression::{Bindings, Expression, ExpressionRegistry};
use crate::request::QueryParams;
use crate::store::StoreKind;
use crate::types::{Direction, SortToken};

/// An orderable column.
pub struct Sort<B> {
    base: RefinerBase,
    column: Qualifiable,
    directional: Directional,
    is_default: bool,
    expression: Option<Expression<B>>,
    active: bool,
}

impl<B> Clone for Sort<B> {
    fn clone(&self) -> Self {
        Self {
            base: self.base.clone(),
            column: self.column,
            directional: self.directional,
            is_default: self.is_default,
            expression: self.expression.clone(),
            active: self.active,
        }
    }
}

impl<B> fmt::Debug for Sort<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sort")
            .field("base", &self.base)
            .field("directional", &self.directional)
            .field("is_default", &self.is_default)
            .field("expression", &self.expression)
            .field("active", &self.active)
            .finish()
    }
}

impl<B> Sort<B> {
    /// Creates a sort on `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            base: RefinerBase::new(name),
            column: Qualifiable::new(true),
            directional: Directional::default(),
            is_default: false,
            expression: None,
            active: false,
        }
    }

    /// Applies this sort when the request names none.
    pub fn default_sort(mut self) -> Self {
        self.is_default = true;
        self
    }

    /// Locks the sort to one direction.
    pub fn fixed(mut self, direction: Direction) -> Self {
        self.directional.fixed = Some(direction);
        self
    }

    /// Toggles descending first.
    pub fn inverted(mut self) -> Self {
        self.directional.inverted = true;
        self
    }

    /// Orders by the bare column name instead of the qualified one.
    pub fn unqualified(mut self) -> Self {
        self.column.set(false);
        self
    }

    /// Replaces the ordering clause with an expression.
    pub fn expression(mut self, expression: Expression<B>) -> Self {
        self.expression = Some(expression);
        self
    }

    /// Returns true if this is the default sort.
    pub fn is_default(&self) -> bool {
        self.is_default
    }

    /// Returns the fixed direction, else the direction of the last refinement.
    pub fn direction(&self) -> Option<Direction> {
        self.directional.direction()
    }

    /// Returns the token requesting ascending order.
    pub fn ascending_value(&self) -> String {
        self.parameter().to_string()
    }

    /// Returns the token requesting descending order.
    ///
    /// A fixed sort has a single token.
    pub fn descending_value(&self) -> String {
        if self.directional.fixed.is_some() {
            self.parameter().to_string()
        } else {
            format!("-{}", self.parameter())
        }
    }

    /// Returns the token a UI toggle should send next, None meaning "remove
    /// the sort key".
    pub fn next_direction(&self) -> Option<String> {
        let current = if self.active {
            self.directional.direction
        } else {
            None
        };
        self.directional.next(current).map(|direction| match direction {
            Direction::Asc => self.ascending_value(),
            Direction::Desc => self.descending_value(),
        })
    }

    /// Returns the declared expression, if any.
    pub fn declared_expression(&self) -> Option<&Expression<B>> {
        self.expression.as_ref()
    }

    /// Returns true if `token` selects this sort.
    pub fn matches(&self, token: &SortToken) -> bool {
        token.name.as_deref() == Some(self.parameter()) && self.directional.accepts(token.direction)
    }

    fn reset(&mut self) {
        self.active = false;
        self.directional.direction = None;
    }
}

impl<B: QueryBuilder> Sort<B> {
    /// Applies the sort when `token` selects it.
    pub fn refine(
        &mut self,
        builder: &mut B,
        registry: &ExpressionRegistry<B>,
        token: &SortToken,
    ) -> RefineResult<bool> {
        self.reset();
        if !self.matches(token) {
            return Ok(false);
        }
        self.apply(builder, registry, token.direction)?;
        Ok(true)
    }

    fn apply(
        &mut self,
        builder: &mut B,
        registry: &ExpressionRegistry<B>,
        requested: Option<Direction>,
    ) -> RefineResult<()> {
        let direction = self.directional.resolve(requested);

        match &self.expression {
            Some(expression) => {
                let bindings = Bindings::new()
                    .with("direction", direction.as_str())
                    .with("column", self.name())
                    .with("table", builder.table());
                registry.resolve(builder, expression, &bindings)?;
            }
            None => {
                let column = self.column.column(self.name(), builder);
                builder.order_by(&column, direction);
            }
        }

        self.directional.direction = Some(direction);
        self.active = true;
        tracing::debug!(sort = %self.parameter(), %direction, "sort applied");
        Ok(())
    }
}

impl<B> Refiner for Sort<B> {
    fn base(&self) -> &RefinerBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut RefinerBase {
        &mut self.base
    }

    fn default_type(&self) -> &'static str {
        "sort"
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn extend_json(&self, out: &mut Map<String, Value>) {
        out.insert(
            "direction".to_string(),
            json!(self.direction().map(|d| d.as_str())),
        );
        out.insert("next".to_string(), json!(self.next_direction()));
    }
}

/// The sorts of a refinement. At most one applies per pass.
pub struct Sorts<B> {
    items: Vec<Sort<B>>,
    key: Option<String>,
    persist: Persistable,
}

impl<B> Default for Sorts<B> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            key: None,
            persist: Persistable::default(),
        }
    }
}

impl<B> fmt::Debug for Sorts<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sorts")
            .field("items", &self.items)
            .field("key", &self.key)
            .field("persist", &self.persist)
            .finish()
    }
}

impl<B> Sorts<B> {
    /// Creates an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a sort.
    pub fn with(mut self, sort: Sort<B>) -> Self {
        self.items.push(sort);
        self
    }

    /// Overrides the request key carrying the sort token.
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Persists the selection in a store of `kind`.
    pub fn persist(mut self, kind: StoreKind) -> Self {
        self.persist.kind = Some(kind);
        self
    }

    /// Persists the selection under an explicit store key.
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

    /// Returns the request key override.
    pub fn key_override(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Returns a sort by request key.
    pub fn get(&self, parameter: &str) -> Option<&Sort<B>> {
        self.items.iter().find(|s| s.parameter() == parameter)
    }

    /// Iterates the sorts.
    pub fn iter(&self) -> impl Iterator<Item = &Sort<B>> {
        self.items.iter()
    }

    /// Returns the sort that applied, if any.
    pub fn active(&self) -> Option<&Sort<B>> {
        self.items.iter().find(|s| s.is_active())
    }

    /// Returns the first sort marked as default.
    pub fn default_sort(&self) -> Option<&Sort<B>> {
        self.items.iter().find(|s| s.is_default())
    }

    /// Returns the number of sorts.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if there are no sorts.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Drops sorts that are not visible for `params`.
    pub fn freeze(&mut self, params: &QueryParams) {
        self.items.retain(|s| s.base().is_visible(params));
    }

    /// Serializes every sort.
    pub fn to_json(&self) -> Value {
        Value::Array(self.items.iter().map(Refiner::to_json).collect())
    }
}

impl<B: QueryBuilder> Sorts<B> {
    /// Applies the sort selected by `token`, or the default sort.
    ///
    /// Returns true when the token selected a sort, false when the default
    /// applied or nothing did.
    pub fn refine(
        &mut self,
        builder: &mut B,
        registry: &ExpressionRegistry<B>,
        token: &SortToken,
    ) -> RefineResult<bool> {
        for sort in &mut self.items {
            sort.reset();
        }

        if let Some(sort) = self.items.iter_mut().find(|s| s.matches(token)) {
            return sort.refine(builder, registry, token);
        }

        if let Some(sort) = self.items.iter_mut().find(|s| s.is_default()) {
            tracing::trace!(sort = %sort.parameter(), "falling back to default sort");
            sort.apply(builder, registry, None)?;
        }
        Ok(false)
    }
}

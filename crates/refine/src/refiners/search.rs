//! Searches: a free-text term matched against allowed columns.

use serde_json::{Map, Value, json};

use super::{Persistable, Qualifiable, Refiner, RefinerBase};
use crate::builder::QueryBuilder;
use crate::error::RefineResult;
use crate::request::QueryParams;
use crate::store::StoreKind;
use crate::types::{Boolean, Operator};

/// Which searches the request allows.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Matches {
    /// Every search applies.
    #[default]
    All,
    /// Only searches whose parameter is listed apply.
    Only(Vec<String>),
}

impl Matches {
    /// Parses a delimiter separated match list. A blank list allows all.
    pub fn parse(raw: &str, delimiter: &str) -> Self {
        let names: Vec<String> = raw
            .split(delimiter)
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();
        if names.is_empty() {
            Matches::All
        } else {
            Matches::Only(names)
        }
    }

    /// Returns true if `parameter` may be searched.
    pub fn allows(&self, parameter: &str) -> bool {
        match self {
            Matches::All => true,
            Matches::Only(names) => names.iter().any(|name| name == parameter),
        }
    }

    /// Returns the persisted form: null for all, else the list.
    pub fn to_value(&self) -> Value {
        match self {
            Matches::All => Value::Null,
            Matches::Only(names) => json!(names),
        }
    }

    /// Restores the persisted form.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Array(items) => {
                let names: Vec<String> = items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect();
                if names.is_empty() {
                    Matches::All
                } else {
                    Matches::Only(names)
                }
            }
            _ => Matches::All,
        }
    }
}

/// A searchable column.
#[derive(Debug, Clone)]
pub struct Search {
    base: RefinerBase,
    column: Qualifiable,
    full_text: bool,
    boolean: Option<Boolean>,
    active: bool,
}

impl Search {
    /// Creates a search on `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            base: RefinerBase::new(name),
            column: Qualifiable::new(true),
            full_text: false,
            boolean: None,
            active: false,
        }
    }

    /// Uses the builder's full-text predicate instead of `LIKE`.
    pub fn full_text(mut self) -> Self {
        self.full_text = true;
        self
    }

    /// Matches the bare column name instead of the qualified one.
    pub fn unqualified(mut self) -> Self {
        self.column.set(false);
        self
    }

    /// Returns true if the search uses full-text matching.
    pub fn is_full_text(&self) -> bool {
        self.full_text
    }

    /// Returns how the search was joined in the last refinement.
    pub fn boolean(&self) -> Option<Boolean> {
        self.boolean
    }

    /// Applies the search when `term` is non-empty and `matches` allows it.
    ///
    /// `boolean` joins the predicate to the searches already applied in the
    /// group.
    pub fn refine<B: QueryBuilder>(
        &mut self,
        builder: &mut B,
        term: &str,
        matches: &Matches,
        boolean: Boolean,
    ) -> RefineResult<bool> {
        self.active = false;
        self.boolean = None;

        if term.is_empty() || !matches.allows(self.parameter()) {
            return Ok(false);
        }

        let column = self.column.column(self.name(), builder);
        if self.full_text {
            builder.where_full_text(&[column], term, boolean)?;
        } else {
            builder.where_lower(
                &column,
                Operator::Like,
                format!("%{}%", term.to_lowercase()),
                boolean,
            );
        }

        self.active = true;
        self.boolean = Some(boolean);
        Ok(true)
    }
}

impl Refiner for Search {
    fn base(&self) -> &RefinerBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut RefinerBase {
        &mut self.base
    }

    fn default_type(&self) -> &'static str {
        "search"
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn extend_json(&self, out: &mut Map<String, Value>) {
        out.insert("full_text".to_string(), json!(self.full_text));
    }
}

/// The searches of a refinement, applied as one nested group.
#[derive(Debug, Clone, Default)]
pub struct Searches {
    items: Vec<Search>,
    key: Option<String>,
    match_key: Option<String>,
    matches: Option<bool>,
    persist: Persistable,
    term: String,
}

impl Searches {
    /// Creates an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a search.
    pub fn with(mut self, search: Search) -> Self {
        self.items.push(search);
        self
    }

    /// Overrides the request key carrying the term.
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Overrides the request key listing the searches to match.
    pub fn match_key(mut self, key: impl Into<String>) -> Self {
        self.match_key = Some(key.into());
        self
    }

    /// Enables or disables the match key.
    pub fn matches(mut self, enabled: bool) -> Self {
        self.matches = Some(enabled);
        self
    }

    /// Persists the term in a store of `kind`.
    pub fn persist(mut self, kind: StoreKind) -> Self {
        self.persist.kind = Some(kind);
        self
    }

    /// Persists the term under an explicit store key.
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

    /// Returns the match key override.
    pub fn match_key_override(&self) -> Option<&str> {
        self.match_key.as_deref()
    }

    /// Returns the match toggle override.
    pub fn matches_override(&self) -> Option<bool> {
        self.matches
    }

    /// Returns the term of the last refinement.
    pub fn term(&self) -> &str {
        &self.term
    }

    /// Returns a search by request key.
    pub fn get(&self, parameter: &str) -> Option<&Search> {
        self.items.iter().find(|s| s.parameter() == parameter)
    }

    /// Iterates the searches.
    pub fn iter(&self) -> impl Iterator<Item = &Search> {
        self.items.iter()
    }

    /// Iterates the searches that applied.
    pub fn active(&self) -> impl Iterator<Item = &Search> {
        self.items.iter().filter(|s| s.is_active())
    }

    /// Returns the number of searches.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if there are no searches.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Drops searches that are not visible for `params`.
    pub fn freeze(&mut self, params: &QueryParams) {
        self.items.retain(|s| s.base().is_visible(params));
    }

    /// Applies every allowed search as a single nested group.
    ///
    /// The first applied search joins the group with AND, later ones with
    /// OR, and the group itself joins the query with AND. Returns the number
    /// of searches applied.
    pub fn refine<B: QueryBuilder>(
        &mut self,
        builder: &mut B,
        term: &str,
        matches: &Matches,
    ) -> RefineResult<usize> {
        let term = term.trim();
        self.term = term.to_string();

        let mut applied = 0;
        let items = &mut self.items;
        builder.where_nested(Boolean::And, &mut |group: &mut B| -> RefineResult<()> {
            applied = 0;
            for search in items.iter_mut() {
                let boolean = if applied == 0 { Boolean::And } else { Boolean::Or };
                if search.refine(group, term, matches, boolean)? {
                    applied += 1;
                }
            }
            Ok(())
        })?;

        tracing::debug!(term, applied, "search group applied");
        Ok(applied)
    }

    /// Serializes every search.
    pub fn to_json(&self) -> Value {
        Value::Array(self.items.iter().map(Refiner::to_json).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::{SqlParam, SqlQuery};

    fn searches() -> Searches {
        Searches::new()
            .with(Search::new("name"))
            .with(Search::new("description"))
    }

    #[test]
    fn test_group_joins_with_or() {
        let mut searches = searches();
        let mut query = SqlQuery::new("products");
        query.where_compare("stock", Operator::Gt, json!(0), Boolean::And);
        let applied = searches.refine(&mut query, "Foo", &Matches::All).unwrap();

        assert_eq!(applied, 2);
        let sql = query.where_sql();
        assert_eq!(
            sql.sql,
            "stock > ? AND (LOWER(products.name) LIKE ? OR LOWER(products.description) LIKE ?)"
        );
        assert_eq!(sql.params[1], SqlParam::string("%foo%"));
        assert_eq!(searches.get("name").unwrap().boolean(), Some(Boolean::And));
        assert_eq!(searches.get("description").unwrap().boolean(), Some(Boolean::Or));
    }

    #[test]
    fn test_match_list_restricts() {
        let mut searches = searches();
        let mut query = SqlQuery::new("products");
        let matches = Matches::parse("description", ",");
        searches.refine(&mut query, "foo", &matches).unwrap();

        assert_eq!(query.where_sql().sql, "(LOWER(products.description) LIKE ?)");
        assert!(!searches.get("name").unwrap().is_active());
        assert_eq!(
            searches.get("description").unwrap().boolean(),
            Some(Boolean::And)
        );
    }

    #[test]
    fn test_empty_term_adds_nothing() {
        let mut searches = searches();
        let mut query = SqlQuery::new("products");
        assert_eq!(searches.refine(&mut query, "  ", &Matches::All).unwrap(), 0);
        assert!(!query.has_conditions());
    }

    #[test]
    fn test_full_text() {
        let mut searches = Searches::new().with(Search::new("body").full_text().unqualified());
        let mut query = SqlQuery::new("posts");
        searches.refine(&mut query, "rust", &Matches::All).unwrap();
        assert_eq!(
            query.where_sql().sql,
            "(to_tsvector(body) @@ plainto_tsquery(?))"
        );
    }

    #[test]
    fn test_matches_round_trip() {
        assert_eq!(Matches::parse(" , ", ","), Matches::All);
        let only = Matches::parse("name, sku", ",");
        assert_eq!(only, Matches::Only(vec!["name".to_string(), "sku".to_string()]));
        assert_eq!(Matches::from_value(&only.to_value()), only);
        assert_eq!(Matches::from_value(&Value::Null), Matches::All);
    }
}

//! The refinement pipeline.
//!
//! A [`Refinement`] binds one query builder to one request and runs the
//! configured refiners over it in a fixed order:
//!
//! 1. before hook
//! 2. searches
//! 3. filters
//! 4. sorts
//! 5. after hook
//! 6. persistence flush
//!
//! Everything that can be wrong with the declaration itself (a missing
//! builder, invalid configuration, unknown expression verbs, missing store
//! drivers) is checked before the first stage touches the builder.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{Value, json};

use crate::builder::QueryBuilder;
use crate::config::RefineConfig;
use crate::error::{ConfigError, RefineResult};
use crate::expression::ExpressionRegistry;
use crate::refiners::{Filters, Input, Matches, Persistable, Refiner, Searches, Sorts};
use crate::request::QueryParams;
use crate::store::{Store, StoreDriver, StoreKind};
use crate::types::{Direction, SortToken, stringify};

/// A hook run before or after the refiner stages.
pub type Hook<B> = Box<dyn FnOnce(&mut B, &QueryParams) -> RefineResult<()>>;

const SEARCH_STAGE: &str = "search";
const FILTER_STAGE: &str = "filters";
const SORT_STAGE: &str = "sort";

/// One request's refinement of one query.
pub struct Refinement<B: QueryBuilder> {
    builder: Option<B>,
    params: QueryParams,
    config: RefineConfig,
    scope: Option<String>,
    registry: ExpressionRegistry<B>,
    filters: Filters<B>,
    sorts: Sorts<B>,
    searches: Searches,
    drivers: HashMap<StoreKind, Arc<dyn StoreDriver>>,
    before: Option<Hook<B>>,
    after: Option<Hook<B>>,
    refined: bool,
}

impl<B: QueryBuilder + fmt::Debug> fmt::Debug for Refinement<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Refinement")
            .field("builder", &self.builder)
            .field("params", &self.params)
            .field("config", &self.config)
            .field("scope", &self.scope)
            .field("filters", &self.filters)
            .field("sorts", &self.sorts)
            .field("searches", &self.searches)
            .field("drivers", &self.drivers)
            .field("refined", &self.refined)
            .finish()
    }
}

impl<B: QueryBuilder> Refinement<B> {
    /// Creates a refinement of `params` with default configuration.
    pub fn new(params: QueryParams) -> Self {
        Self {
            builder: None,
            params,
            config: RefineConfig::default(),
            scope: None,
            registry: ExpressionRegistry::standard(),
            filters: Filters::new(),
            sorts: Sorts::new(),
            searches: Searches::new(),
            drivers: HashMap::new(),
            before: None,
            after: None,
            refined: false,
        }
    }

    /// Binds the query builder.
    pub fn builder(mut self, builder: B) -> Self {
        self.builder = Some(builder);
        self
    }

    /// Replaces the configuration.
    pub fn config(mut self, config: RefineConfig) -> Self {
        self.config = config;
        self
    }

    /// Nests every request key and store key under `scope`.
    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Replaces the expression registry.
    pub fn registry(mut self, registry: ExpressionRegistry<B>) -> Self {
        self.registry = registry;
        self
    }

    /// Sets the filters.
    pub fn filters(mut self, filters: Filters<B>) -> Self {
        self.filters = filters;
        self
    }

    /// Sets the sorts.
    pub fn sorts(mut self, sorts: Sorts<B>) -> Self {
        self.sorts = sorts;
        self
    }

    /// Sets the searches.
    pub fn searches(mut self, searches: Searches) -> Self {
        self.searches = searches;
        self
    }

    /// Registers the driver used by collections persisting to its kind.
    pub fn store(mut self, driver: Arc<dyn StoreDriver>) -> Self {
        self.drivers.insert(driver.kind(), driver);
        self
    }

    /// Runs `hook` before the refiner stages.
    pub fn before(mut self, hook: impl FnOnce(&mut B, &QueryParams) -> RefineResult<()> + 'static) -> Self {
        self.before = Some(Box::new(hook));
        self
    }

    /// Runs `hook` after the refiner stages, before the flush.
    pub fn after(mut self, hook: impl FnOnce(&mut B, &QueryParams) -> RefineResult<()> + 'static) -> Self {
        self.after = Some(Box::new(hook));
        self
    }

    /// Returns true once [`refine`](Self::refine) has passed validation and
    /// started on the builder, whether or not a later stage failed.
    pub fn is_refined(&self) -> bool {
        self.refined
    }

    /// Returns the bound builder.
    pub fn query(&self) -> Option<&B> {
        self.builder.as_ref()
    }

    /// Consumes the refinement and returns the builder.
    pub fn into_builder(self) -> Option<B> {
        self.builder
    }

    /// Returns the request parameters.
    pub fn params(&self) -> &QueryParams {
        &self.params
    }

    /// Returns the filters.
    pub fn filter_list(&self) -> &Filters<B> {
        &self.filters
    }

    /// Returns the sorts.
    pub fn sort_list(&self) -> &Sorts<B> {
        &self.sorts
    }

    /// Returns the searches.
    pub fn search_list(&self) -> &Searches {
        &self.searches
    }

    /// Serializes every refiner for client consumption.
    pub fn to_json(&self) -> Value {
        json!({
            "filters": self.filters.to_json(),
            "sorts": self.sorts.to_json(),
            "searches": self.searches.to_json(),
        })
    }

    /// Runs the pipeline. A second call is a no-op, including after a stage
    /// or hook error; declaration errors leave the builder untouched and may
    /// be fixed and retried.
    pub fn refine(&mut self) -> RefineResult<()> {
        if self.refined {
            tracing::trace!("refinement already ran");
            return Ok(());
        }

        self.validate()?;
        self.filters.freeze(&self.params);
        self.sorts.freeze(&self.params);
        self.searches.freeze(&self.params);

        let Self {
            builder,
            params,
            config,
            scope,
            registry,
            filters,
            sorts,
            searches,
            drivers,
            before,
            after,
            refined,
        } = self;
        let builder = builder.as_mut().ok_or(ConfigError::UnboundBuilder)?;
        let scope = scope.as_deref();
        let mut stores = Vec::new();

        // Stages mutate the builder; a failed pass is not retried on it.
        *refined = true;
        tracing::debug!(scope, table = builder.table(), "refinement started");

        if let Some(hook) = before.take() {
            hook(&mut *builder, params)?;
        }

        let mut store = open(drivers, searches.persistence(), config, scope, SEARCH_STAGE);
        search_stage(builder, params, config, scope, searches, store.as_mut())?;
        stores.extend(store);

        let mut store = open(drivers, filters.persistence(), config, scope, FILTER_STAGE);
        filter_stage(builder, params, config, scope, registry, filters, store.as_mut())?;
        stores.extend(store);

        let mut store = open(drivers, sorts.persistence(), config, scope, SORT_STAGE);
        sort_stage(builder, params, config, scope, registry, sorts, store.as_mut())?;
        stores.extend(store);

        if let Some(hook) = after.take() {
            hook(&mut *builder, params)?;
        }

        for store in &mut stores {
            store.persist()?;
        }

        tracing::debug!(scope, "refinement finished");
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.builder.is_none() {
            return Err(ConfigError::UnboundBuilder);
        }
        self.config.validate().map_err(ConfigError::Invalid)?;

        let names = self
            .filters
            .iter()
            .map(|f| f.name())
            .chain(self.sorts.iter().map(|s| s.name()))
            .chain(self.searches.iter().map(|s| s.name()));
        for name in names {
            if name.trim().is_empty() {
                return Err(ConfigError::EmptyName);
            }
        }

        let expressions = self
            .filters
            .iter()
            .filter_map(|f| f.declared_expression())
            .chain(self.sorts.iter().filter_map(|s| s.declared_expression()));
        for expression in expressions {
            self.registry.validate(expression)?;
        }

        for persist in [
            self.filters.persistence(),
            self.sorts.persistence(),
            self.searches.persistence(),
        ] {
            if let Some(kind) = persist.kind
                && !self.drivers.contains_key(&kind)
            {
                return Err(ConfigError::MissingStore {
                    kind: kind.to_string(),
                });
            }
        }
        Ok(())
    }
}

fn open(
    drivers: &HashMap<StoreKind, Arc<dyn StoreDriver>>,
    persist: &Persistable,
    config: &RefineConfig,
    scope: Option<&str>,
    stage: &str,
) -> Option<Store> {
    let driver = drivers.get(&persist.kind?)?;
    let key = persist.store_key(&config.store_prefix, scope, stage);
    Some(Store::new(key, Arc::clone(driver)))
}

fn search_stage<B: QueryBuilder>(
    builder: &mut B,
    params: &QueryParams,
    config: &RefineConfig,
    scope: Option<&str>,
    searches: &mut Searches,
    mut store: Option<&mut Store>,
) -> RefineResult<()> {
    if searches.is_empty() {
        return Ok(());
    }

    let key = searches.key_override().unwrap_or(&config.search_key).to_string();
    let match_key = searches.match_key_override().unwrap_or(&config.match_key).to_string();
    let honour_matches = searches.matches_override().unwrap_or(config.matches);

    let (term, matches) = match params.scoped(scope, &key) {
        Some(term) => {
            let matches = match params.scoped(scope, &match_key) {
                Some(raw) if honour_matches => Matches::parse(raw, &config.delimiter),
                _ => Matches::All,
            };
            let term = if params.is_form_decoded() {
                term.to_string()
            } else {
                term.replace('+', " ")
            };
            (term, matches)
        }
        None => match store.as_deref_mut() {
            Some(store) => {
                let term = store.get("term")?.as_ref().map(stringify).unwrap_or_default();
                let matches = match store.get("cols")? {
                    Some(cols) if honour_matches => Matches::from_value(&cols),
                    _ => Matches::All,
                };
                (term, matches)
            }
            None => (String::new(), Matches::All),
        },
    };
    let term = term.trim();

    searches.refine(builder, term, &matches)?;

    if let Some(store) = store
        && !term.is_empty()
    {
        store.put("term", json!(term));
        store.put("cols", matches.to_value());
    }
    Ok(())
}

fn filter_stage<B: QueryBuilder>(
    builder: &mut B,
    params: &QueryParams,
    config: &RefineConfig,
    scope: Option<&str>,
    registry: &ExpressionRegistry<B>,
    filters: &mut Filters<B>,
    mut store: Option<&mut Store>,
) -> RefineResult<()> {
    let delimiter = filters
        .delimiter_override()
        .unwrap_or(&config.delimiter)
        .to_string();
    let strict = filters.strictness().unwrap_or(config.strict_options);
    let persisted = match store.as_deref_mut() {
        Some(store) => store.all()?.unwrap_or_default(),
        None => Default::default(),
    };

    for filter in filters.iter_mut() {
        let parameter = filter.parameter().to_string();
        let input = match params.scoped(scope, &parameter) {
            Some(raw) => Input::Request(raw),
            None => match persisted.get(&parameter) {
                Some(value) => Input::Persisted(value.clone()),
                None => Input::Absent,
            },
        };
        let explicit = !matches!(input, Input::Absent);

        let active = filter.refine(builder, registry, input, &delimiter, strict)?;
        if let Some(store) = store.as_deref_mut()
            && active
            && explicit
        {
            store.put(parameter, filter.value().clone());
        }
    }
    Ok(())
}

fn sort_stage<B: QueryBuilder>(
    builder: &mut B,
    params: &QueryParams,
    config: &RefineConfig,
    scope: Option<&str>,
    registry: &ExpressionRegistry<B>,
    sorts: &mut Sorts<B>,
    mut store: Option<&mut Store>,
) -> RefineResult<()> {
    if sorts.is_empty() {
        return Ok(());
    }

    let key = sorts.key_override().unwrap_or(&config.sort_key).to_string();
    let token = match params.scoped(scope, &key) {
        Some(raw) => SortToken::parse(raw),
        None => match store.as_deref_mut() {
            Some(store) => {
                let name = store.get("col")?.as_ref().map(stringify).filter(|n| !n.is_empty());
                let direction = store
                    .get("dir")?
                    .and_then(|d| d.as_str().and_then(Direction::parse));
                SortToken::new(name, direction)
            }
            None => SortToken::default(),
        },
    };

    let explicit = sorts.refine(builder, registry, &token)?;

    if let Some(store) = store
        && explicit
        && let Some(sort) = sorts.active()
    {
        store.put("col", json!(sort.parameter()));
        store.put("dir", json!(token.direction.map(|d| d.as_str())));
    }
    Ok(())
}

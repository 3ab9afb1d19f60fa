//! Refiner fixtures over a `products` table.

use std::sync::Arc;

use helios_refine::prelude::*;
use helios_refine::sql::SqlQuery;

/// The table every fixture queries.
pub const TABLE: &str = "products";

/// Parses a raw query string.
pub fn params(query: &str) -> QueryParams {
    QueryParams::from_query_string(query)
}

/// A strict `price >=` filter with four price points.
pub fn price_filter() -> Filter<SqlQuery> {
    Filter::new("price")
        .operator(Operator::Gte)
        .kind(ValueKind::Integer)
        .options([10, 20, 50, 100].map(RefinerOption::from_value))
        .strict(true)
}

/// A multiple-choice status filter.
pub fn status_filter() -> Filter<SqlQuery> {
    Filter::new("status")
        .options([
            RefinerOption::new("open", "Open"),
            RefinerOption::new("closed", "Closed"),
        ])
        .strict(true)
        .multiple()
}

/// Filters on price and status.
pub fn product_filters() -> Filters<SqlQuery> {
    Filters::new().with(price_filter()).with(status_filter())
}

/// Sorts on name (default) and price.
pub fn product_sorts() -> Sorts<SqlQuery> {
    Sorts::new()
        .with(Sort::new("name").default_sort())
        .with(Sort::new("price"))
}

/// Searches on name and description.
pub fn product_searches() -> Searches {
    Searches::new()
        .with(Search::new("name"))
        .with(Search::new("description"))
}

/// A refinement of `query` over the product fixtures.
pub fn refinement(query: &str) -> Refinement<SqlQuery> {
    Refinement::new(params(query))
        .builder(SqlQuery::new(TABLE))
        .filters(product_filters())
        .sorts(product_sorts())
        .searches(product_searches())
}

/// A refinement whose collections persist in `session`.
pub fn persisted_refinement(query: &str, session: &SessionStore) -> Refinement<SqlQuery> {
    Refinement::new(params(query))
        .builder(SqlQuery::new(TABLE))
        .filters(product_filters().persist(StoreKind::Transient))
        .sorts(product_sorts().persist(StoreKind::Transient))
        .searches(product_searches().persist(StoreKind::Transient))
        .store(Arc::new(session.clone()))
}

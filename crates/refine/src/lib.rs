//! Helios Refine
//!
//! This crate turns request query parameters into filtering, sorting and
//! free-text search on a query builder, and remembers the user's last
//! selections across requests in an interchangeable store.
//!
//! # Features
//!
//! - **Filters**: typed values, selectable options with strict or lax
//!   activation, validation rules, defaults and null handling
//! - **Sorts**: `name` / `-name` tokens, fixed directions, a default sort and
//!   direction toggling for UI links
//! - **Searches**: one nested group of `LIKE` or full-text predicates,
//!   restricted by an optional match list
//! - **Expressions**: declarative `(verb, reference, ...)` tuples or closures
//!   replacing the default predicate, dispatched through a verb registry
//! - **Persistence**: transient (session) and durable (cookie) stores
//!
//! # Architecture
//!
//! - [`types`] - Operators, directions, value kinds, rules and options
//! - [`builder`] - The [`QueryBuilder`] trait hosts implement
//! - [`sql`] - A reference builder rendering parameterised SQL
//! - [`expression`] - Expressions, bindings and the verb registry
//! - [`refiners`] - Filters, sorts and searches
//! - [`store`] - Persistence stores and drivers
//! - [`pipeline`] - The ordered [`Refinement`] pipeline
//!
//! # Quick Start
//!
//! ```
//! use helios_refine::prelude::*;
//! use helios_refine::sql::SqlQuery;
//!
//! let params = QueryParams::from_query_string("price=100&sort=-name&search=foo+bar");
//!
//! let mut refinement = Refinement::new(params)
//!     .builder(SqlQuery::new("products"))
//!     .filters(
//!         Filters::new().with(
//!             Filter::new("price")
//!                 .operator(Operator::Gte)
//!                 .kind(ValueKind::Integer)
//!                 .options([10, 20, 50, 100].map(RefinerOption::from_value))
//!                 .strict(true),
//!         ),
//!     )
//!     .sorts(Sorts::new().with(Sort::new("name")).with(Sort::new("id").default_sort()))
//!     .searches(Searches::new().with(Search::new("name")));
//!
//! refinement.refine().unwrap();
//!
//! let sql = refinement.query().unwrap().to_sql();
//! assert_eq!(
//!     sql.sql,
//!     "SELECT * FROM products WHERE (LOWER(products.name) LIKE ?) AND price >= ? \
//!      ORDER BY products.name DESC"
//! );
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod builder;
pub mod config;
pub mod error;
pub mod expression;
pub mod pipeline;
pub mod refiners;
pub mod request;
pub mod sql;
pub mod store;
pub mod types;

// Re-export commonly used types at crate root
pub use builder::QueryBuilder;
pub use config::RefineConfig;
pub use error::{ConfigError, ExpressionError, RefineError, RefineResult, StoreError, StoreResult};
pub use pipeline::Refinement;
pub use request::QueryParams;

/// Everything needed to declare and run a refinement.
pub mod prelude {
    pub use crate::builder::QueryBuilder;
    pub use crate::config::RefineConfig;
    pub use crate::error::{RefineError, RefineResult};
    pub use crate::expression::{Bindings, Expression, ExpressionRegistry, Term};
    pub use crate::pipeline::Refinement;
    pub use crate::refiners::{
        Filter, Filters, Matches, Mode, Refiner, Search, Searches, Sort, Sorts,
    };
    pub use crate::request::QueryParams;
    pub use crate::store::{CookieStore, SessionStore, StoreDriver, StoreKind};
    pub use crate::types::{Boolean, Direction, Operator, RefinerOption, Rule, ValueKind};
}

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");

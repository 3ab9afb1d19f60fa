//! Core types for refiners.
//!
//! This module contains the query vocabulary ([`Operator`], [`Boolean`],
//! [`Direction`]), request value interpretation ([`ValueKind`], [`Rule`]) and
//! filter options with their [`ActivationPolicy`].

mod option;
mod query;
mod value;

pub use option::{ActivationPolicy, RefinerOption};
pub use query::{Boolean, Direction, Operator, SortToken};
pub use value::{
    DATE_FORMAT, Rule, TIME_FORMAT, ValueKind, is_blank, parse_date, parse_time, stringify,
};

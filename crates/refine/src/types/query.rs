//! Query vocabulary shared by refiners and builders.
//!
//! This module defines comparison operators, boolean joins and sort
//! directions, together with their request-facing string forms.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Comparison operators understood by filters and expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Operator {
    /// Equal (default).
    #[default]
    #[serde(rename = "=")]
    Eq,
    /// Not equal.
    #[serde(rename = "!=")]
    NotEq,
    /// Greater than.
    #[serde(rename = ">")]
    Gt,
    /// Greater than or equal.
    #[serde(rename = ">=")]
    Gte,
    /// Less than.
    #[serde(rename = "<")]
    Lt,
    /// Less than or equal.
    #[serde(rename = "<=")]
    Lte,
    /// Case-sensitive pattern match.
    #[serde(rename = "like")]
    Like,
    /// Negated pattern match.
    #[serde(rename = "not like")]
    NotLike,
    /// Case-insensitive pattern match.
    #[serde(rename = "ilike")]
    ILike,
    /// Negated case-insensitive pattern match.
    #[serde(rename = "not ilike")]
    NotILike,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for Operator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operator::parse(s).ok_or_else(|| format!("unknown operator: {}", s))
    }
}

impl Operator {
    /// Parses a comparison token, returning None for anything unrecognized.
    ///
    /// Keyword operators are matched case-insensitively and tolerate repeated
    /// inner whitespace (`NOT   LIKE`).
    pub fn parse(s: &str) -> Option<Self> {
        let normalized = s.split_whitespace().collect::<Vec<_>>().join(" ");
        match normalized.to_lowercase().as_str() {
            "=" | "==" => Some(Operator::Eq),
            "!=" | "<>" => Some(Operator::NotEq),
            ">" => Some(Operator::Gt),
            ">=" => Some(Operator::Gte),
            "<" => Some(Operator::Lt),
            "<=" => Some(Operator::Lte),
            "like" => Some(Operator::Like),
            "not like" => Some(Operator::NotLike),
            "ilike" => Some(Operator::ILike),
            "not ilike" => Some(Operator::NotILike),
            _ => None,
        }
    }

    /// Returns the SQL token for this operator.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::NotEq => "!=",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::Like => "like",
            Operator::NotLike => "not like",
            Operator::ILike => "ilike",
            Operator::NotILike => "not ilike",
        }
    }

    /// Returns true for the pattern-matching family.
    pub fn is_like(&self) -> bool {
        matches!(
            self,
            Operator::Like | Operator::NotLike | Operator::ILike | Operator::NotILike
        )
    }

    /// Returns true if the operator negates its comparison.
    pub fn is_negated(&self) -> bool {
        matches!(
            self,
            Operator::NotEq | Operator::NotLike | Operator::NotILike
        )
    }
}

/// How a predicate joins the predicates before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Boolean {
    /// Conjunction (default).
    #[default]
    And,
    /// Disjunction.
    Or,
}

impl fmt::Display for Boolean {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Boolean::And => write!(f, "AND"),
            Boolean::Or => write!(f, "OR"),
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Ascending order.
    #[default]
    Asc,
    /// Descending order.
    Desc,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Direction::parse(s).ok_or_else(|| format!("unknown sort direction: {}", s))
    }
}

impl Direction {
    /// Parses `asc`/`desc` in any case.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "asc" | "ascending" => Some(Direction::Asc),
            "desc" | "descending" => Some(Direction::Desc),
            _ => None,
        }
    }

    /// Returns the lowercase name used in persisted payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Asc => "asc",
            Direction::Desc => "desc",
        }
    }

    /// Returns the SQL keyword.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

/// A parsed sort token from the request (e.g. `-price`).
///
/// A bare name carries no explicit direction; a leading `-` asks for
/// descending order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SortToken {
    /// The requested sort parameter, if any.
    pub name: Option<String>,
    /// The explicit direction, if any.
    pub direction: Option<Direction>,
}

impl SortToken {
    /// Parses a sort parameter value. Empty input yields an empty token.
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        if let Some(stripped) = s.strip_prefix('-') {
            let stripped = stripped.trim();
            if stripped.is_empty() {
                return Self::default();
            }
            Self {
                name: Some(stripped.to_string()),
                direction: Some(Direction::Desc),
            }
        } else if s.is_empty() {
            Self::default()
        } else {
            Self {
                name: Some(s.to_string()),
                direction: None,
            }
        }
    }

    /// Creates a token from already separated parts.
    pub fn new(name: Option<String>, direction: Option<Direction>) -> Self {
        Self { name, direction }
    }

    /// Returns true if no sort was requested.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
    }
}

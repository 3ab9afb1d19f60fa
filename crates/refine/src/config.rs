//! Refinement configuration.
//!
//! Defaults shared by every refiner collection, supporting both programmatic
//! configuration and environment variable overrides. Collections can override
//! most of these per instance.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `REFINE_SORT_KEY` | sort | Request key carrying the sort token |
//! | `REFINE_SEARCH_KEY` | search | Request key carrying the search term |
//! | `REFINE_MATCH_KEY` | match | Request key restricting searched columns |
//! | `REFINE_DELIMITER` | , | Separator for list values |
//! | `REFINE_STRICT_OPTIONS` | false | Filters discard values outside their options |
//! | `REFINE_MATCHES` | false | Honour the match key |
//! | `REFINE_STORE_PREFIX` | refine | Prefix for persisted store keys |
//! | `REFINE_COOKIE_LIFETIME` | 2628000 | Durable store lifetime (minutes) |
//!
//! # Example
//!
//! ```rust
//! use helios_refine::RefineConfig;
//!
//! let config = RefineConfig {
//!     delimiter: "|".to_string(),
//!     matches: true,
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! ```

use clap::Parser;

/// Configuration for a refinement pipeline.
#[derive(Debug, Clone, Parser)]
#[command(name = "refine")]
#[command(about = "Request refinement defaults")]
pub struct RefineConfig {
    /// Request key carrying the sort token.
    #[arg(long, env = "REFINE_SORT_KEY", default_value = "sort")]
    pub sort_key: String,

    /// Request key carrying the search term.
    #[arg(long, env = "REFINE_SEARCH_KEY", default_value = "search")]
    pub search_key: String,

    /// Request key listing the search parameters to match.
    #[arg(long, env = "REFINE_MATCH_KEY", default_value = "match")]
    pub match_key: String,

    /// Separator for list values.
    #[arg(long, env = "REFINE_DELIMITER", default_value = ",")]
    pub delimiter: String,

    /// Whether filters with options discard unknown values by default.
    #[arg(long, env = "REFINE_STRICT_OPTIONS", default_value = "false")]
    pub strict_options: bool,

    /// Whether the match key restricts searched columns by default.
    #[arg(long, env = "REFINE_MATCHES", default_value = "false")]
    pub matches: bool,

    /// Prefix for persisted store keys.
    #[arg(long, env = "REFINE_STORE_PREFIX", default_value = "refine")]
    pub store_prefix: String,

    /// Lifetime of durable store entries in minutes.
    #[arg(long, env = "REFINE_COOKIE_LIFETIME", default_value = "2628000")]
    pub cookie_lifetime: i64,
}

impl Default for RefineConfig {
    fn default() -> Self {
        Self {
            sort_key: "sort".to_string(),
            search_key: "search".to_string(),
            match_key: "match".to_string(),
            delimiter: ",".to_string(),
            strict_options: false,
            matches: false,
            store_prefix: "refine".to_string(),
            cookie_lifetime: 2_628_000, // five years
        }
    }
}

impl RefineConfig {
    /// Creates a configuration from environment variables, falling back to
    /// defaults when they cannot be parsed.
    pub fn from_env() -> Self {
        Self::try_parse_from(["refine"]).unwrap_or_default()
    }

    /// Returns the durable store lifetime.
    pub fn cookie_lifetime(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.cookie_lifetime)
    }

    /// Validates the configuration and returns errors if any.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        for (name, key) in [
            ("Sort key", &self.sort_key),
            ("Search key", &self.search_key),
            ("Match key", &self.match_key),
        ] {
            if key.trim().is_empty() {
                errors.push(format!("{} cannot be empty", name));
            }
        }

        if self.sort_key == self.search_key || self.sort_key == self.match_key {
            errors.push("Sort key must differ from the search and match keys".to_string());
        }

        if self.search_key == self.match_key {
            errors.push("Search key must differ from the match key".to_string());
        }

        if self.delimiter.is_empty() {
            errors.push("Delimiter cannot be empty".to_string());
        }

        if self.store_prefix.trim().is_empty() {
            errors.push("Store prefix cannot be empty".to_string());
        }

        if self.cookie_lifetime <= 0 {
            errors.push("Cookie lifetime must be positive".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

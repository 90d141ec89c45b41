//! # Search Configuration
//!
//! One explicit struct for everything a single search can be tuned by: tier
//! boundaries, page range, retry ceiling, fetch concurrency and the overall
//! wall-clock budget. Loaded as the `search` section of `ranker-config.yaml`.
//!
//! ```yaml
//! search:
//!   tiers:
//!     boundaries: [1, 5]
//!   max_page: 13
//!   max_retries: 3
//!   max_concurrent_fetches: 10
//!   timeout_budget_ms: 20000
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::ConfigurationError;
use crate::constants;

/// Partition of the page space into ordered tiers of increasing size.
///
/// Each boundary is the last page of a tier; everything after the final
/// boundary up to `max_page` forms the last tier. With the default `[1, 5]`
/// and `max_page = 13` the tiers are `{1}`, `{2..=5}` and `{6..=13}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TierConfig {
    pub boundaries: Vec<u32>,
}

impl Default for TierConfig {
    fn default() -> Self {
        Self {
            boundaries: constants::search::DEFAULT_TIER_BOUNDARIES.to_vec(),
        }
    }
}

impl TierConfig {
    pub fn new(boundaries: Vec<u32>) -> Self {
        Self { boundaries }
    }

    /// Concrete page lists for a search that stops at `max_page`.
    ///
    /// Boundaries past `max_page` are clamped and empty tiers are dropped.
    pub fn pages_for(&self, max_page: u32) -> Vec<Vec<u32>> {
        let mut tiers = Vec::new();
        let mut start = 1;

        for &boundary in &self.boundaries {
            let end = boundary.min(max_page);
            if end >= start {
                tiers.push((start..=end).collect());
                start = end + 1;
            }
        }

        if start <= max_page {
            tiers.push((start..=max_page).collect());
        }

        tiers
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let mut previous = 0;
        for &boundary in &self.boundaries {
            if boundary <= previous {
                return Err(ConfigurationError::invalid_value(
                    "search.tiers.boundaries",
                    format!("{:?}", self.boundaries),
                    "boundaries must be positive and strictly increasing",
                ));
            }
            previous = boundary;
        }
        Ok(())
    }
}

/// Tunables for one search invocation
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SearchConfig {
    pub tiers: TierConfig,
    /// Last page searched, inclusive
    pub max_page: u32,
    /// Sequential retry rounds for unresolved pages after each tier
    pub max_retries: u32,
    /// Ceiling on simultaneous fetches for one session/endpoint pair
    pub max_concurrent_fetches: usize,
    /// Wall-clock budget for the entire search
    pub timeout_budget_ms: u64,
    /// Stop when a later tier resolves completely with zero products
    pub stop_on_empty_tier: bool,
    /// Retry `http_error` pages alongside `network_error` pages
    pub retry_http_errors: bool,
    /// Sponsored placements take part in matching and ranking
    pub include_sponsored: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            tiers: TierConfig::default(),
            max_page: constants::search::DEFAULT_MAX_PAGE,
            max_retries: constants::search::DEFAULT_MAX_RETRIES,
            max_concurrent_fetches: constants::search::DEFAULT_MAX_CONCURRENT_FETCHES,
            timeout_budget_ms: constants::search::DEFAULT_TIMEOUT_BUDGET_MS,
            stop_on_empty_tier: true,
            retry_http_errors: true,
            include_sponsored: true,
        }
    }
}

impl SearchConfig {
    pub fn timeout_budget(&self) -> Duration {
        Duration::from_millis(self.timeout_budget_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.max_page == 0 || self.max_page > constants::search::MAX_ALLOWED_PAGE {
            return Err(ConfigurationError::invalid_value(
                "search.max_page",
                self.max_page.to_string(),
                format!(
                    "must be between 1 and {}",
                    constants::search::MAX_ALLOWED_PAGE
                ),
            ));
        }

        if self.max_concurrent_fetches == 0 {
            return Err(ConfigurationError::invalid_value(
                "search.max_concurrent_fetches",
                "0",
                "at least one fetch must be allowed",
            ));
        }

        if self.timeout_budget_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "search.timeout_budget_ms",
                "0",
                "timeout budget must be greater than 0",
            ));
        }

        self.tiers.validate()
    }
}
